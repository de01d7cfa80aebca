//! # 声子谱
//!
//! 对每个 k 点求解动力学矩阵，频率升序排列，本征向量按同一置换重排，
//! 按行存放（第 band 行为该支的本征向量）。
//!
//! ## 依赖关系
//! - 被 `dos/`, `analysis/`, `commands/post.rs` 使用
//! - 使用 `phonon/dynmat.rs`, `phonon/eigen.rs`

use crate::error::{PhononError, Result};
use crate::phonon::dynmat::DynamicalMatrixBuilder;
use crate::phonon::eigen::{self, EigenSolver};

use nalgebra::DMatrix;
use num_complex::Complex64;

/// 一个 k 点上的频率与本征向量
#[derive(Debug, Clone)]
pub struct ModeSet {
    pub kpoint: [f64; 3],
    /// 升序频率 (THz)，负值表示虚频
    pub frequencies: Vec<f64>,
    /// 行 = 支，列 = 可移动自由度
    pub eigenvectors: DMatrix<Complex64>,
}

impl ModeSet {
    pub fn num_bands(&self) -> usize {
        self.frequencies.len()
    }

    /// 第 `band` 支在自由度 `dof` 上的权重 |v|²
    pub fn weight(&self, band: usize, dof: usize) -> f64 {
        self.eigenvectors[(band, dof)].norm_sqr()
    }
}

/// 全部 k 点的声子谱
#[derive(Debug, Clone, Default)]
pub struct PhononSpectrum {
    pub modes: Vec<ModeSet>,
}

impl PhononSpectrum {
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn num_bands(&self) -> usize {
        self.modes.first().map_or(0, ModeSet::num_bands)
    }

    pub fn kpoints(&self) -> Vec<[f64; 3]> {
        self.modes.iter().map(|m| m.kpoint).collect()
    }

    /// 全部频率的最小、最大值
    pub fn frequency_range(&self) -> Option<(f64, f64)> {
        let mut all = self.modes.iter().flat_map(|m| m.frequencies.iter().copied());
        let first = all.next()?;
        Some(all.fold((first, first), |(lo, hi), f| (lo.min(f), hi.max(f))))
    }

    /// 按分数坐标查找 k 点（np.allclose 语义）
    pub fn find(&self, kpoint: &[f64; 3]) -> Option<&ModeSet> {
        self.modes.iter().find(|m| {
            m.kpoint
                .iter()
                .zip(kpoint.iter())
                .all(|(a, b)| (a - b).abs() <= 1e-8 + 1e-5 * b.abs())
        })
    }
}

/// 单个 k 点
pub fn solve_kpoint(
    builder: &DynamicalMatrixBuilder,
    kpoint: &[f64; 3],
    solver: EigenSolver,
) -> Result<ModeSet> {
    let matrix = builder.build(kpoint);
    let decomposition =
        eigen::decompose(matrix, solver).ok_or(PhononError::EigenNotConverged(*kpoint))?;

    let raw: Vec<f64> = decomposition
        .values
        .iter()
        .map(|&v| eigen::frequency_thz(v))
        .collect();
    let mut order: Vec<usize> = (0..raw.len()).collect();
    order.sort_by(|&a, &b| raw[a].total_cmp(&raw[b]));

    let n = raw.len();
    let frequencies = order.iter().map(|&i| raw[i]).collect();
    let eigenvectors =
        DMatrix::from_fn(n, n, |band, dof| decomposition.vectors[(dof, order[band])]);

    Ok(ModeSet {
        kpoint: *kpoint,
        frequencies,
        eigenvectors,
    })
}

/// 逐个 k 点求解，`on_progress` 在每个 k 点完成后调用
pub fn evaluate(
    builder: &DynamicalMatrixBuilder,
    kpoints: &[[f64; 3]],
    solver: EigenSolver,
    mut on_progress: impl FnMut(),
) -> Result<PhononSpectrum> {
    let mut modes = Vec::with_capacity(kpoints.len());
    for kpoint in kpoints {
        modes.push(solve_kpoint(builder, kpoint, solver)?);
        on_progress();
    }
    Ok(PhononSpectrum { modes })
}
