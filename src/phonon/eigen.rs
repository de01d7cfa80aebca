//! # 本征值求解
//!
//! 默认使用一般复矩阵求解（Schur 分解 + 上三角回代），不假设 Hermite；
//! `Hermitian` 模式使用 `SymmetricEigen`，数值结果在 1e-10 ~ 1e-6 量级上不同。
//!
//! ## 依赖关系
//! - 被 `phonon/spectrum.rs` 使用

use nalgebra::{DMatrix, DVector, Schur, SymmetricEigen};
use num_complex::Complex64;
use serde::Serialize;

const EPSILON: f64 = 1e-14;
const MAX_ITERATIONS: usize = 10_000;

/// 求解器选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum EigenSolver {
    #[default]
    General,
    Hermitian,
}

/// 本征值与本征向量（列）
pub struct EigenDecomposition {
    pub values: Vec<Complex64>,
    pub vectors: DMatrix<Complex64>,
}

/// 求解；不收敛返回 None
pub fn decompose(matrix: DMatrix<Complex64>, solver: EigenSolver) -> Option<EigenDecomposition> {
    match solver {
        EigenSolver::General => general(matrix),
        EigenSolver::Hermitian => hermitian(matrix),
    }
}

fn hermitian(matrix: DMatrix<Complex64>) -> Option<EigenDecomposition> {
    let eigen = SymmetricEigen::try_new(matrix, EPSILON, MAX_ITERATIONS)?;
    Some(EigenDecomposition {
        values: eigen
            .eigenvalues
            .iter()
            .map(|&v| Complex64::new(v, 0.0))
            .collect(),
        vectors: eigen.eigenvectors,
    })
}

fn general(matrix: DMatrix<Complex64>) -> Option<EigenDecomposition> {
    let n = matrix.nrows();
    let scale = matrix.iter().map(|z| z.norm()).fold(0.0, f64::max).max(1.0);
    let schur = Schur::try_new(matrix, EPSILON, MAX_ITERATIONS)?;
    let (q, t) = schur.unpack();

    let values: Vec<Complex64> = (0..n).map(|i| t[(i, i)]).collect();
    let small = scale * f64::EPSILON;

    let mut vectors = DMatrix::<Complex64>::zeros(n, n);
    for k in 0..n {
        // (T − λ_k) y = 0，y_k = 1，自下而上回代
        let mut y = vec![Complex64::new(0.0, 0.0); n];
        y[k] = Complex64::new(1.0, 0.0);
        for i in (0..k).rev() {
            let mut sum = Complex64::new(0.0, 0.0);
            for j in (i + 1)..=k {
                sum += t[(i, j)] * y[j];
            }
            let mut denominator = t[(i, i)] - values[k];
            if denominator.norm() < small {
                denominator = Complex64::new(small, 0.0);
            }
            y[i] = -sum / denominator;
        }

        let mut x = DVector::<Complex64>::zeros(n);
        for i in 0..n {
            for (j, yj) in y.iter().enumerate().take(k + 1) {
                x[i] += q[(i, j)] * yj;
            }
        }
        let norm = x.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
        if norm > 0.0 {
            x /= Complex64::new(norm, 0.0);
        }
        vectors.set_column(k, &x);
    }

    Some(EigenDecomposition { values, vectors })
}

/// 本征值 -> 频率 (THz)，虚频记为负值
pub fn frequency_thz(eigenvalue: Complex64) -> f64 {
    let root = eigenvalue.sqrt();
    (root.re - root.im.abs()) / (2.0 * std::f64::consts::PI) / 1e12
}

/// 残差 |A v − λ v|
#[cfg(test)]
fn residual(matrix: &DMatrix<Complex64>, value: Complex64, vector: &DVector<Complex64>) -> f64 {
    let av = matrix * vector;
    let lv = vector.map(|z| z * value);
    (av - lv).iter().map(|z| z.norm()).fold(0.0, f64::max)
}
