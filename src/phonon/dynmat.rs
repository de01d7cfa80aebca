//! # 动力学矩阵
//!
//! D(q)_{ij} = Σ_s Φ_{s i, j}·exp(i q·r_s) / sqrt(m_i m_j)
//!
//! ## 约定
//! - 倒格矢 b_i = 2π (a_{i+1} × a_{i+2}) / V，q = k_frac·B
//! - r 为超胞原子到原胞原子的笛卡尔矢量，按周期方向 {−1, 0, 1} 嵌套循环取最短；
//!   循环中 r 就地更新，只在严格变短时替换
//! - 超胞可移动原子 s 折叠到原胞行 s / E（同一原胞原子的 E 个复制连续存放）
//!
//! ## 依赖关系
//! - 被 `phonon/spectrum.rs`, `commands/post.rs` 使用
//! - 使用 `phonon/force_constant.rs`

use crate::error::{PhononError, Result};
use crate::models::PeriodicStructure;
use crate::phonon::force_constant::ForceConstants;

use nalgebra::{DMatrix, Matrix3, Vector3};
use num_complex::Complex64;
use std::f64::consts::PI;

/// 倒格矢矩阵（行为 b_1, b_2, b_3，含 2π）
pub fn reciprocal_lattice(structure: &PeriodicStructure) -> Result<Matrix3<f64>> {
    let volume = structure.lattice.volume();
    if volume.abs() < 1e-12 {
        return Err(PhononError::SingularMatrix("lattice volume is zero".to_string()));
    }
    let a = [
        structure.lattice.vector(0),
        structure.lattice.vector(1),
        structure.lattice.vector(2),
    ];
    let rows: Vec<Vector3<f64>> = (0..3)
        .map(|i| a[(i + 1) % 3].cross(&a[(i + 2) % 3]) * (2.0 * PI / volume))
        .collect();
    Ok(Matrix3::from_rows(&[
        rows[0].transpose(),
        rows[1].transpose(),
        rows[2].transpose(),
    ]))
}

/// 按周期方向的 {−1, 0, 1} 组合搜索最短像
pub fn minimum_image(mut r: Vector3<f64>, translations: &[Vector3<f64>]) -> Vector3<f64> {
    let steps = [-1.0, 0.0, 1.0];
    match translations {
        [] => {}
        [t0] => {
            for a in steps {
                let candidate = r + t0 * a;
                if r.norm_squared() > candidate.norm_squared() {
                    r = candidate;
                }
            }
        }
        [t0, t1] => {
            for a in steps {
                for b in steps {
                    let candidate = r + t0 * a + t1 * b;
                    if r.norm_squared() > candidate.norm_squared() {
                        r = candidate;
                    }
                }
            }
        }
        [t0, t1, t2, ..] => {
            for a in steps {
                for b in steps {
                    for c in steps {
                        let candidate = r + t0 * a + t1 * b + t2 * c;
                        if r.norm_squared() > candidate.norm_squared() {
                            r = candidate;
                        }
                    }
                }
            }
        }
    }
    r
}

/// 给定 q 构造动力学矩阵
pub struct DynamicalMatrixBuilder<'a> {
    force_constants: &'a ForceConstants,
    reciprocal: Matrix3<f64>,
    /// 超胞可移动原子的完整下标
    super_mobile: Vec<usize>,
    /// separations[s][u]：超胞可移动原子 s 到原胞可移动原子 u 的最短像
    separations: Vec<Vec<Vector3<f64>>>,
    /// 每个可移动自由度的 sqrt(m)
    sqrt_mass: Vec<f64>,
    replicas: usize,
}

impl<'a> DynamicalMatrixBuilder<'a> {
    pub fn new(
        unit: &PeriodicStructure,
        supercell: &PeriodicStructure,
        force_constants: &'a ForceConstants,
    ) -> Result<Self> {
        let reciprocal = reciprocal_lattice(unit)?;
        let unit_mobile = unit.mobile_indices();
        let super_mobile = supercell.mobile_indices();

        let translations: Vec<Vector3<f64>> = supercell
            .periodicity
            .periodic_axes()
            .into_iter()
            .map(|axis| supercell.lattice.vector(axis))
            .collect();

        let unit_cart: Vec<Vector3<f64>> = unit_mobile.iter().map(|&u| unit.cartesian(u)).collect();
        let separations = super_mobile
            .iter()
            .map(|&s| {
                let origin = supercell.cartesian(s);
                unit_cart
                    .iter()
                    .map(|u| minimum_image(origin - u, &translations))
                    .collect()
            })
            .collect();

        let sqrt_mass = unit.mobile_masses()?.into_iter().map(f64::sqrt).collect();

        Ok(DynamicalMatrixBuilder {
            force_constants,
            reciprocal,
            super_mobile,
            separations,
            sqrt_mass,
            replicas: supercell.replicas(),
        })
    }

    /// 自由度数 3·N_mobile
    pub fn dimension(&self) -> usize {
        self.sqrt_mass.len()
    }

    /// 分数坐标 k -> 笛卡尔 q (1/Å)
    pub fn cartesian_q(&self, kpoint: &[f64; 3]) -> Vector3<f64> {
        self.reciprocal.transpose() * Vector3::from(*kpoint)
    }

    pub fn build(&self, kpoint: &[f64; 3]) -> DMatrix<Complex64> {
        let q = self.cartesian_q(kpoint);
        let n = self.dimension();
        let fc = &self.force_constants.matrix;
        let mut d = DMatrix::<Complex64>::zeros(n, n);

        for (s, &satom) in self.super_mobile.iter().enumerate() {
            let row_atom = s / self.replicas;
            for (u, r) in self.separations[s].iter().enumerate() {
                let phase = Complex64::from_polar(1.0, q.dot(r));
                for a in 0..3 {
                    for b in 0..3 {
                        d[(3 * row_atom + a, 3 * u + b)] += phase * fc[(3 * satom + a, 3 * u + b)];
                    }
                }
            }
        }

        for i in 0..n {
            for j in 0..n {
                d[(i, j)] /= self.sqrt_mass[i] * self.sqrt_mass[j];
            }
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Enlargement;
    use crate::phonon::force_constant::{assemble, tests::synthetic_forces};
    use crate::symmetry::point_group::tests::square_ab;
    use crate::symmetry::DisplacementPlan;

    #[test]
    fn test_reciprocal_lattice_orthogonality() {
        let unit = square_ab();
        let b = reciprocal_lattice(&unit).unwrap();
        let a = unit.lattice.to_matrix();
        let product = a * b.transpose();
        assert!((product - Matrix3::identity() * (2.0 * PI)).amax() < 1e-12);
    }

    #[test]
    fn test_minimum_image_prefers_shorter_vector() {
        let t = [Vector3::new(6.0, 0.0, 0.0), Vector3::new(0.0, 6.0, 0.0)];
        let r = minimum_image(Vector3::new(5.0, -4.0, 1.0), &t);
        assert!((r - Vector3::new(-1.0, 2.0, 1.0)).norm() < 1e-12);

        // 无周期方向时保持不变
        let r0 = minimum_image(Vector3::new(5.0, 0.0, 0.0), &[]);
        assert_eq!(r0, Vector3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_gamma_matrix_is_hermitian() {
        let unit = square_ab();
        let sc = unit.build_supercell(Enlargement([2, 2, 1])).unwrap();
        let plan = DisplacementPlan::trivial(2);
        let forces = synthetic_forces(&unit, &sc, &plan, 0.01);
        let fc = assemble(&forces, &plan, None, &sc, 0.01).unwrap();
        let builder = DynamicalMatrixBuilder::new(&unit, &sc, &fc).unwrap();

        let d = builder.build(&[0.0, 0.0, 0.0]);
        let scale = d.iter().map(|z| z.norm()).fold(0.0, f64::max);
        let diff = (&d - d.adjoint()).iter().map(|z| z.norm()).fold(0.0, f64::max);
        assert!(diff < 1e-6 * scale);
        assert_eq!(builder.dimension(), 6);
    }
}
