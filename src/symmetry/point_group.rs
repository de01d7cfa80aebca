//! # 二维点群搜索
//!
//! 在两个周期方向上搜索与晶格度规相容、并把全部可移动原子映射到自身的操作 (W, w)，
//! 再按 (trace, det) 计数查表得到点群。
//!
//! ## 步骤
//! 1. 度规张量 G = L·Lᵗ（只取周期方向的 2x2 子块）
//! 2. 候选 W 满足 WᵗGW = G 即与晶格相容
//! 3. 平移先试零向量，再试把第 0 个可移动原子转到同种原子上的差矢量
//! 4. 原子比较：分数差取整后转笛卡尔，各分量 ≤ 1e-6 Å
//!
//! ## 依赖关系
//! - 被 `symmetry/plan.rs`, `symmetry/image.rs`, `phonon/force_constant.rs` 使用
//! - 使用 `symmetry/catalog.rs` 的候选表与查找表

use crate::error::{PhononError, Result};
use crate::models::PeriodicStructure;
use crate::symmetry::catalog::{OperationKind, PointGroup, Rotation2, CANDIDATES};

use nalgebra::{Matrix2, Matrix3, Vector3};

/// 位置比较容差 (Å)
pub const SYMPREC: f64 = 1e-6;

/// 一个对称操作（分数坐标表示）
#[derive(Debug, Clone)]
pub struct SymmetryOperation {
    /// 在候选表中的位置
    pub candidate: usize,

    /// 周期平面内的 2x2 整数块
    pub rotation_2d: Rotation2,

    /// 嵌入 3x3 后的旋转，非周期方向为恒等
    pub rotation: Matrix3<f64>,

    /// 分数平移
    pub translation: Vector3<f64>,

    pub kind: OperationKind,

    /// 可移动原子序号 -> 像的可移动原子序号
    pub atom_map: Vec<usize>,
}

/// 点群及其操作集合
#[derive(Debug, Clone)]
pub struct SymmetryOperations {
    pub point_group: PointGroup,
    pub operations: Vec<SymmetryOperation>,
    to_cart: Matrix3<f64>,
    to_frac: Matrix3<f64>,
}

impl SymmetryOperations {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// 第 `index` 个操作的笛卡尔表示 A·W·A⁻¹（A 为单位化的晶格基）
    pub fn cartesian(&self, index: usize) -> Matrix3<f64> {
        self.to_cart * self.operations[index].rotation * self.to_frac
    }

    /// 按旋转部分查找操作序号
    pub fn find(&self, rotation: &Matrix3<f64>) -> Option<usize> {
        self.operations
            .iter()
            .position(|op| allclose3(&op.rotation, rotation))
    }

    /// 恒等操作的序号
    pub fn identity(&self) -> Option<usize> {
        self.find(&Matrix3::identity())
    }

    /// 原子 `atom`（可移动序号）在操作 `index` 下的像
    pub fn image_of(&self, index: usize, atom: usize) -> usize {
        self.operations[index].atom_map[atom]
    }
}

/// 把 2x2 块嵌入 3x3，非周期方向保持恒等
pub fn embed(w: &Rotation2, axes: &[usize]) -> Matrix3<f64> {
    let mut m = Matrix3::identity();
    for (r, &i) in axes.iter().enumerate() {
        for (c, &j) in axes.iter().enumerate() {
            m[(i, j)] = w[r][c] as f64;
        }
    }
    m
}

/// 单位化晶格基 A 及其逆（列为 a_i / |a_i|）
pub fn normalized_basis(structure: &PeriodicStructure) -> Result<(Matrix3<f64>, Matrix3<f64>)> {
    let lattice = &structure.lattice;
    let columns = [
        lattice.vector(0).normalize(),
        lattice.vector(1).normalize(),
        lattice.vector(2).normalize(),
    ];
    let to_cart = Matrix3::from_columns(&columns);
    let to_frac = to_cart
        .try_inverse()
        .ok_or_else(|| PhononError::SingularMatrix("normalized lattice basis".to_string()))?;
    Ok((to_cart, to_frac))
}

/// 搜索点群
pub fn discover(structure: &PeriodicStructure) -> Result<SymmetryOperations> {
    let axes = structure.periodicity.periodic_axes();
    if axes.len() != 2 {
        return Err(PhononError::SymmetryDimension(axes.len()));
    }

    let l = structure.lattice.matrix;
    let sub = Matrix2::new(
        l[axes[0]][axes[0]],
        l[axes[0]][axes[1]],
        l[axes[1]][axes[0]],
        l[axes[1]][axes[1]],
    );
    let metric = sub * sub.transpose();

    let mobile = structure.mobile_indices();
    let frac: Vec<Vector3<f64>> = mobile
        .iter()
        .map(|&i| structure.atoms[i].frac())
        .collect();
    let lattice_t = structure.lattice.to_matrix().transpose();
    let open_axis = 3 - axes[0] - axes[1];

    let mut operations = Vec::new();
    let mut signature = [0usize; 6];

    for (candidate, w) in CANDIDATES.iter().enumerate() {
        let w2 = Matrix2::new(w[0][0] as f64, w[0][1] as f64, w[1][0] as f64, w[1][1] as f64);
        let rotated_metric = w2.transpose() * metric * w2;
        if !allclose2(&metric, &rotated_metric) {
            continue;
        }

        let rotation = embed(w, &axes);
        let rotated: Vec<Vector3<f64>> = frac.iter().map(|p| rotation * p).collect();

        let found = translation_candidates(structure, &mobile, &frac, &rotated, open_axis)
            .into_iter()
            .find_map(|t| {
                match_atoms(structure, &mobile, &frac, &rotated, &t, &lattice_t).map(|m| (t, m))
            });

        if let Some((translation, atom_map)) = found {
            let kind = OperationKind::classify(w)
                .ok_or(PhononError::UnrecognizedPointGroup { signature })?;
            signature[kind.slot()] += 1;
            operations.push(SymmetryOperation {
                candidate,
                rotation_2d: *w,
                rotation,
                translation,
                kind,
                atom_map,
            });
        }
    }

    let point_group = PointGroup::from_signature(&signature)
        .ok_or(PhononError::UnrecognizedPointGroup { signature })?;
    let (to_cart, to_frac) = normalized_basis(structure)?;

    Ok(SymmetryOperations {
        point_group,
        operations,
        to_cart,
        to_frac,
    })
}

/// 平移候选：零向量优先，其后为第 0 个原子旋转后指向同种原子的差矢量
fn translation_candidates(
    structure: &PeriodicStructure,
    mobile: &[usize],
    frac: &[Vector3<f64>],
    rotated: &[Vector3<f64>],
    open_axis: usize,
) -> Vec<Vector3<f64>> {
    let mut candidates = vec![Vector3::zeros()];
    let Some(&first) = mobile.first() else {
        return candidates;
    };
    let element = &structure.atoms[first].element;

    for (j, &atom) in mobile.iter().enumerate() {
        if structure.atoms[atom].element != *element {
            continue;
        }
        let w = (frac[j] - rotated[0]).map(|x| x - x.round());
        if w[open_axis].abs() > SYMPREC {
            continue;
        }
        let mut w = w;
        w[open_axis] = 0.0;
        if candidates.iter().all(|c| (c - w).amax() > SYMPREC) {
            candidates.push(w);
        }
    }
    candidates
}

/// 在 (W, w) 下寻找可移动原子的置换；非双射或类型不符返回 None
fn match_atoms(
    structure: &PeriodicStructure,
    mobile: &[usize],
    frac: &[Vector3<f64>],
    rotated: &[Vector3<f64>],
    translation: &Vector3<f64>,
    lattice_t: &Matrix3<f64>,
) -> Option<Vec<usize>> {
    let mut map = Vec::with_capacity(mobile.len());
    let mut used = vec![false; mobile.len()];

    for (i, &atom) in mobile.iter().enumerate() {
        let moved = rotated[i] + translation;
        let element = &structure.atoms[atom].element;
        let image = (0..mobile.len()).find(|&j| {
            structure.atoms[mobile[j]].element == *element
                && same_site(&moved, &frac[j], lattice_t)
        })?;
        if used[image] {
            return None;
        }
        used[image] = true;
        map.push(image);
    }
    Some(map)
}

/// 两个分数坐标是否只差一个晶格平移
pub fn same_site(a: &Vector3<f64>, b: &Vector3<f64>, lattice_t: &Matrix3<f64>) -> bool {
    let reduced = (a - b).map(|x| x - x.round());
    let cart = lattice_t * reduced;
    cart.iter().all(|x| x.abs() <= SYMPREC)
}

fn allclose2(a: &Matrix2<f64>, b: &Matrix2<f64>) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (x - y).abs() <= SYMPREC + 1e-5 * y.abs())
}

fn allclose3(a: &Matrix3<f64>, b: &Matrix3<f64>) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (x - y).abs() <= SYMPREC + 1e-5 * y.abs())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Atom, Lattice, Periodicity};

    pub(crate) fn square_ab() -> PeriodicStructure {
        let lattice =
            Lattice::from_vectors([[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 15.0]]);
        let atoms = vec![
            Atom::new("Cu", [0.0, 0.0, 0.40]),
            Atom::new("O", [0.5, 0.5, 0.45]),
        ];
        PeriodicStructure::new("square", lattice, atoms, Periodicity([true, true, false]))
    }

    #[test]
    fn test_square_lattice_is_4mm() {
        let ops = discover(&square_ab()).unwrap();
        assert_eq!(ops.point_group, PointGroup::P4mm);
        assert_eq!(ops.len(), 8);
        for op in &ops.operations {
            assert_eq!(op.atom_map, vec![0, 1]);
            assert!(op.translation.norm() < 1e-12);
        }
    }

    #[test]
    fn test_rectangular_lattice_is_2mm() {
        let lattice =
            Lattice::from_vectors([[3.0, 0.0, 0.0], [0.0, 4.5, 0.0], [0.0, 0.0, 15.0]]);
        let atoms = vec![Atom::new("Si", [0.0, 0.0, 0.5])];
        let s = PeriodicStructure::new("rect", lattice, atoms, Periodicity([true, true, false]));
        let ops = discover(&s).unwrap();
        assert_eq!(ops.point_group, PointGroup::P2mm);
    }

    #[test]
    fn test_hexagonal_lattice_is_6mm() {
        let a = 2.46;
        let lattice = Lattice::from_vectors([
            [a, 0.0, 0.0],
            [-a / 2.0, a * 3.0_f64.sqrt() / 2.0, 0.0],
            [0.0, 0.0, 20.0],
        ]);
        let atoms = vec![Atom::new("C", [0.0, 0.0, 0.5])];
        let s = PeriodicStructure::new("hex", lattice, atoms, Periodicity([true, true, false]));
        let ops = discover(&s).unwrap();
        assert_eq!(ops.point_group, PointGroup::P6mm);
        assert_eq!(ops.len(), 12);
    }

    #[test]
    fn test_translation_search_finds_two_fold() {
        let lattice =
            Lattice::from_vectors([[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 15.0]]);
        let atoms = vec![
            Atom::new("Cu", [0.0, 0.0, 0.5]),
            Atom::new("Cu", [0.1, 0.2, 0.5]),
        ];
        let s = PeriodicStructure::new("pair", lattice, atoms, Periodicity([true, true, false]));
        let ops = discover(&s).unwrap();

        assert_eq!(ops.point_group, PointGroup::P2);
        let two_fold = ops
            .operations
            .iter()
            .find(|op| op.kind == OperationKind::TwoFold)
            .unwrap();
        assert_eq!(two_fold.atom_map, vec![1, 0]);
        assert!((two_fold.translation - Vector3::new(0.1, 0.2, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_requires_two_periodic_axes() {
        let mut s = square_ab();
        s.periodicity = Periodicity([true, true, true]);
        assert!(matches!(
            discover(&s),
            Err(PhononError::SymmetryDimension(3))
        ));
    }

    #[test]
    fn test_cartesian_four_fold_is_rotation() {
        let ops = discover(&square_ab()).unwrap();
        let idx = ops
            .operations
            .iter()
            .position(|op| op.kind == OperationKind::FourFold)
            .unwrap();
        let w = ops.cartesian(idx);
        assert!((w * w.transpose() - Matrix3::identity()).amax() < 1e-12);
        assert!((w.determinant() - 1.0).abs() < 1e-12);
        assert_eq!(ops.identity(), Some(4));
    }
}
