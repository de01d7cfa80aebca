//! # 力常数组装
//!
//! 由有序的正/反位移力文件和位移方案得到实空间力常数矩阵
//! Φ (3·N_super x 3·N_unit_mobile)，单位 N/m。
//!
//! ## 步骤
//! 1. 对每个 required 原子按方向取力：计算得到的方向直接取文件，
//!    `Rotated` 方向由种子的力经对称操作旋转并重排超胞原子得到
//! 2. Φ_block = −(F_fwd − F_bwd)·D⁻¹ / (2d)，D 的列为位移方向
//! 3. covered 原子：Φ(s, a) = W⁻¹·Φ(W(s), p)·W
//!
//! 无对称性时 D 为单位阵，等价于逐列差分。
//!
//! ## 依赖关系
//! - 被 `commands/post.rs`, `phonon/dynmat.rs` 使用
//! - 使用 `symmetry/` 的位移方案与像原子映射

use crate::error::{PhononError, Result};
use crate::models::PeriodicStructure;
use crate::symmetry::plan::{DirectionSource, DisplacementPlan, RequiredAtom};
use crate::symmetry::SymmetryReduction;

use nalgebra::{DMatrix, Matrix3, MatrixXx3, Vector3};

/// eV/Å -> N
pub const EV_PER_ANGSTROM_TO_NEWTON: f64 = 1.602e-19 / 1e-10;

/// Å -> m
pub const ANGSTROM: f64 = 1e-10;

/// 一个力文件中全部超胞原子的力 (eV/Å)
pub type ForceSet = Vec<Vector3<f64>>;

/// 实空间力常数
#[derive(Debug, Clone)]
pub struct ForceConstants {
    /// 行：超胞全部原子的自由度；列：原胞可移动自由度
    pub matrix: DMatrix<f64>,
}

impl ForceConstants {
    pub fn zeros(num_super_atoms: usize, num_unit_mobile: usize) -> Self {
        ForceConstants {
            matrix: DMatrix::zeros(3 * num_super_atoms, 3 * num_unit_mobile),
        }
    }

    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    /// 超胞原子 `super_atom` 对原胞可移动原子 `unit_mobile` 的 3x3 块
    pub fn block(&self, super_atom: usize, unit_mobile: usize) -> Matrix3<f64> {
        self.matrix
            .fixed_view::<3, 3>(3 * super_atom, 3 * unit_mobile)
            .into_owned()
    }

    fn set_block(&mut self, super_atom: usize, unit_mobile: usize, block: &Matrix3<f64>) {
        self.matrix
            .fixed_view_mut::<3, 3>(3 * super_atom, 3 * unit_mobile)
            .copy_from(block);
    }
}

/// 组装力常数
///
/// `forces` 按文件顺序排列：正向、反向交替，顺序与 `plan.samples()` 一致。
/// `symmetry` 为 None 时 `plan` 只能包含直接计算的方向。
pub fn assemble(
    forces: &[ForceSet],
    plan: &DisplacementPlan,
    symmetry: Option<&SymmetryReduction>,
    supercell: &PeriodicStructure,
    displacement: f64,
) -> Result<ForceConstants> {
    let expected = plan.file_count();
    if forces.len() != expected {
        return Err(PhononError::ForceCountMismatch {
            expected,
            pairs: plan.sample_count(),
            found: forces.len(),
        });
    }

    let num_super = supercell.num_atoms();
    for (i, set) in forces.iter().enumerate() {
        if set.len() != num_super {
            return Err(PhononError::ForceAtomCount {
                path: format!("force set #{}", i + 1),
                expected: num_super,
                found: set.len(),
            });
        }
    }

    let num_unit_mobile = plan.required.len() + plan.covered.len();
    let super_mobile = supercell.mobile_indices();
    let mut fc = ForceConstants::zeros(num_super, num_unit_mobile);

    let mut pairs = forces.chunks_exact(2);
    for required in &plan.required {
        let block = required_block(
            required,
            &mut pairs,
            symmetry,
            &super_mobile,
            num_super,
            displacement,
        )?;
        fc.matrix
            .view_mut((0, 3 * required.atom), (3 * num_super, 3))
            .copy_from(&block);
    }

    if !plan.covered.is_empty() {
        let reduction = symmetry.ok_or_else(|| {
            PhononError::Other("covered atoms need symmetry operations".to_string())
        })?;
        for covered in &plan.covered {
            let w = reduction.operations.cartesian(covered.operation);
            let w_inv = w.try_inverse().ok_or_else(|| {
                PhononError::SingularMatrix(format!("operation #{}", covered.operation))
            })?;
            let row = reduction.images.row(covered.operation, covered.atom);
            for (s, &image) in row.iter().enumerate() {
                let source = fc.block(super_mobile[image], covered.partner);
                fc.set_block(super_mobile[s], covered.atom, &(w_inv * source * w));
            }
        }
    }

    Ok(fc)
}

/// 一个 required 原子的 3·N_super x 3 列块
fn required_block<'a>(
    required: &RequiredAtom,
    pairs: &mut impl Iterator<Item = &'a [ForceSet]>,
    symmetry: Option<&SymmetryReduction>,
    super_mobile: &[usize],
    num_super: usize,
    displacement: f64,
) -> Result<MatrixXx3<f64>> {
    let mut difference = MatrixXx3::zeros(3 * num_super);
    let mut seed: Option<&'a [ForceSet]> = None;

    for (column, direction) in required.directions.iter().enumerate() {
        let (forward, backward) = match direction.source {
            DirectionSource::Seed { .. } | DirectionSource::Fallback => {
                let pair = pairs.next().ok_or_else(|| {
                    PhononError::Other("force sets exhausted before plan".to_string())
                })?;
                if matches!(direction.source, DirectionSource::Seed { .. }) {
                    seed = Some(pair);
                }
                (pair[0].clone(), pair[1].clone())
            }
            DirectionSource::Rotated { operation } => {
                let pair = seed.ok_or_else(|| {
                    PhononError::Other("rotated direction without seed forces".to_string())
                })?;
                let reduction = symmetry.ok_or_else(|| {
                    PhononError::Other("rotated direction needs symmetry operations".to_string())
                })?;
                let w = reduction.operations.cartesian(operation);
                let row = reduction.images.row(operation, required.atom);
                (
                    rotate_forces(&pair[0], &w, row, super_mobile),
                    rotate_forces(&pair[1], &w, row, super_mobile),
                )
            }
        };

        for atom in 0..num_super {
            let delta = (forward[atom] - backward[atom]) * EV_PER_ANGSTROM_TO_NEWTON;
            for xyz in 0..3 {
                difference[(3 * atom + xyz, column)] = delta[xyz];
            }
        }
    }

    let to_displacement = required.to_displacement();
    let inverse = to_displacement.try_inverse().ok_or_else(|| {
        PhononError::SingularMatrix(format!("displacement directions of atom {}", required.atom))
    })?;

    Ok(-(difference * inverse) / (2.0 * displacement * ANGSTROM))
}

/// 种子力在操作 W 下的像：F'[W(s)] = W·F[s]，非可移动原子保持原值
fn rotate_forces(
    forces: &[Vector3<f64>],
    w: &Matrix3<f64>,
    images: &[usize],
    super_mobile: &[usize],
) -> ForceSet {
    let mut rotated = forces.to_vec();
    for (s, &image) in images.iter().enumerate() {
        rotated[super_mobile[image]] = w * forces[super_mobile[s]];
    }
    rotated
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Atom, Enlargement, Lattice, Periodicity};
    use crate::symmetry;
    use crate::symmetry::point_group::tests::square_ab;

    /// 最近邻弹簧模型：原子 `atom` 位移 u 时各原子受力（任意单位，线性）
    pub(crate) fn spring_forces(
        sc: &PeriodicStructure,
        atom: usize,
        u: &Vector3<f64>,
        cutoff: f64,
    ) -> ForceSet {
        let cart = sc.cartesian_positions();
        let periodic = sc.periodicity.periodic_axes();
        let mut forces = vec![Vector3::zeros(); sc.num_atoms()];

        for j in 0..sc.num_atoms() {
            if j == atom {
                continue;
            }
            for n0 in -2i32..=2 {
                for n1 in -2i32..=2 {
                    let mut shift = [0i32; 3];
                    shift[periodic[0]] = n0;
                    shift[periodic[1]] = n1;
                    let t = sc.lattice.vector(0) * shift[0] as f64
                        + sc.lattice.vector(1) * shift[1] as f64
                        + sc.lattice.vector(2) * shift[2] as f64;
                    let r = cart[j] - cart[atom] + t;
                    if r.norm() < cutoff {
                        let r_hat = r.normalize();
                        let f = r_hat * r_hat.dot(u);
                        forces[j] += f;
                        forces[atom] -= f;
                    }
                }
            }
        }
        forces
    }

    /// 按位移方案生成力文件序列
    pub(crate) fn synthetic_forces(
        unit: &PeriodicStructure,
        sc: &PeriodicStructure,
        plan: &DisplacementPlan,
        displacement: f64,
    ) -> Vec<ForceSet> {
        let unit_mobile = unit.mobile_indices();
        let mut out = Vec::new();
        for sample in plan.samples() {
            let atom = unit_mobile[sample.atom] * sc.replicas();
            let u = Vector3::from(sample.direction) * displacement;
            out.push(spring_forces(sc, atom, &u, 3.1));
            out.push(spring_forces(sc, atom, &(-u), 3.1));
        }
        out
    }

    fn trivial_reference(unit: &PeriodicStructure, sc: &PeriodicStructure) -> ForceConstants {
        let plan = DisplacementPlan::trivial(unit.mobile_indices().len());
        let forces = synthetic_forces(unit, sc, &plan, 0.01);
        assemble(&forces, &plan, None, sc, 0.01).unwrap()
    }

    fn pair_cell() -> PeriodicStructure {
        let lattice =
            Lattice::from_vectors([[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 15.0]]);
        let atoms = vec![
            Atom::new("Cu", [0.0, 0.0, 0.5]),
            Atom::new("Cu", [0.1, 0.2, 0.5]),
        ];
        PeriodicStructure::new("pair", lattice, atoms, Periodicity([true, true, false]))
    }

    #[test]
    fn test_trivial_columns_are_central_differences() {
        let unit = square_ab();
        let sc = unit.build_supercell(Enlargement([2, 2, 1])).unwrap();
        let fc = trivial_reference(&unit, &sc);

        assert_eq!(fc.nrows(), 24);
        assert_eq!(fc.ncols(), 6);

        // 自作用块 = −(−Σ k r̂r̂ᵀ) 的正定性：对角元为正
        let onsite = fc.block(0, 0);
        for i in 0..3 {
            assert!(onsite[(i, i)] >= 0.0);
        }
        assert!(onsite[(0, 0)] > 0.0);
    }

    #[test]
    fn test_symmetric_assembly_matches_full_calculation() {
        let unit = square_ab();
        let sc = unit.build_supercell(Enlargement([2, 2, 1])).unwrap();
        let reduction = symmetry::reduce(&unit, &sc).unwrap();
        assert_eq!(reduction.plan.sample_count(), 2);

        let forces = synthetic_forces(&unit, &sc, &reduction.plan, 0.01);
        let fc = assemble(&forces, &reduction.plan, Some(&reduction), &sc, 0.01).unwrap();
        let reference = trivial_reference(&unit, &sc);

        let scale = reference.matrix.amax();
        assert!((fc.matrix - &reference.matrix).amax() < 1e-8 * scale);
    }

    #[test]
    fn test_covered_atom_rotation_consistency() {
        let unit = pair_cell();
        let sc = unit.build_supercell(Enlargement([2, 2, 1])).unwrap();
        let reduction = symmetry::reduce(&unit, &sc).unwrap();
        assert_eq!(reduction.plan.covered.len(), 1);

        let forces = synthetic_forces(&unit, &sc, &reduction.plan, 0.01);
        let fc = assemble(&forces, &reduction.plan, Some(&reduction), &sc, 0.01).unwrap();

        let covered = &reduction.plan.covered[0];
        let w = reduction.operations.cartesian(covered.operation);
        let w_inv = w.try_inverse().unwrap();
        let row = reduction.images.row(covered.operation, covered.atom);
        for (s, &image) in row.iter().enumerate() {
            let expected = w_inv * fc.block(image, covered.partner) * w;
            assert!((fc.block(s, covered.atom) - expected).amax() < 1e-9);
        }

        let reference = trivial_reference(&unit, &sc);
        let scale = reference.matrix.amax();
        assert!((fc.matrix - &reference.matrix).amax() < 1e-8 * scale);
    }

    #[test]
    fn test_force_count_mismatch() {
        let unit = square_ab();
        let sc = unit.build_supercell(Enlargement([2, 2, 1])).unwrap();
        let plan = DisplacementPlan::trivial(2);
        let mut forces = synthetic_forces(&unit, &sc, &plan, 0.01);
        forces.pop();

        let err = assemble(&forces, &plan, None, &sc, 0.01).unwrap_err();
        assert!(matches!(
            err,
            PhononError::ForceCountMismatch {
                expected: 12,
                pairs: 6,
                found: 11
            }
        ));
    }
}
