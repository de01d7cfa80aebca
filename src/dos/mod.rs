//! # 布里渊区积分：声子态密度
//!
//! ## 子模块
//! - `gaussian`: 高斯展宽 (σ > 0)
//! - `tetrahedron`: 线性线段 / 三角形 / 四面体法 (σ = 0)
//!
//! 频率轴为 f_min − 2 到 f_max + 2（不含终点），步长 (f_max − f_min + 4)/num_dos。
//! 0D 体系直接给出 Γ 点的离散频率，每个频率权重为 1。
//!
//! ## 依赖关系
//! - 被 `commands/post.rs`, `export.rs`, `plot.rs` 使用
//! - 使用 `phonon/spectrum.rs`, `phonon/kpoints.rs`

pub mod gaussian;
pub mod tetrahedron;

use crate::error::{PhononError, Result};
use crate::models::Periodicity;
use crate::phonon::{BZGrid, PhononSpectrum};

/// 积分方法
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DosMethod {
    Gaussian { sigma: f64 },
    Tetrahedron,
    /// 0D：离散频率
    Discrete,
}

impl DosMethod {
    /// 写入文件头的说明
    pub fn describe(&self) -> String {
        match self {
            DosMethod::Gaussian { sigma } => {
                format!("Gaussian Smearing with Sigma = {:.6}", sigma)
            }
            DosMethod::Tetrahedron => "Linear Tetrahedron Method".to_string(),
            DosMethod::Discrete => "Discrete frequencies at Gamma point".to_string(),
        }
    }
}

/// 态密度结果
#[derive(Debug, Clone)]
pub struct DensityOfStates {
    pub frequencies: Vec<f64>,
    /// pdos[自由度][频率点]
    pub pdos: Vec<Vec<f64>>,
    pub tdos: Vec<f64>,
    pub method: DosMethod,
}

/// 频率轴
pub fn frequency_axis(spectrum: &PhononSpectrum, num_dos: usize) -> Vec<f64> {
    let (lo, hi) = spectrum.frequency_range().unwrap_or((0.0, 0.0));
    let step = (hi - lo + 4.0) / num_dos as f64;
    (0..num_dos).map(|i| lo - 2.0 + i as f64 * step).collect()
}

fn total(pdos: &[Vec<f64>], len: usize) -> Vec<f64> {
    (0..len).map(|x| pdos.iter().map(|row| row[x]).sum()).collect()
}

/// 积分；σ = 0 时使用四面体法，需要自动网格
pub fn integrate(
    spectrum: &PhononSpectrum,
    grid: &BZGrid,
    periodicity: &Periodicity,
    sigma: f64,
    num_dos: usize,
) -> Result<DensityOfStates> {
    if num_dos == 0 {
        return Err(PhononError::InvalidArgument("num_dos must be positive".to_string()));
    }
    if spectrum.is_empty() {
        return Err(PhononError::Other("phonon spectrum is empty".to_string()));
    }

    if sigma > 0.0 {
        let frequencies = frequency_axis(spectrum, num_dos);
        let pdos = gaussian::accumulate(&frequencies, spectrum, sigma);
        let tdos = total(&pdos, frequencies.len());
        return Ok(DensityOfStates {
            frequencies,
            pdos,
            tdos,
            method: DosMethod::Gaussian { sigma },
        });
    }
    if sigma < 0.0 {
        return Err(PhononError::InvalidArgument(format!(
            "sigma must be non-negative, got {}",
            sigma
        )));
    }

    let axes = periodicity.periodic_axes();
    if axes.is_empty() {
        let modes = &spectrum.modes[0];
        let frequencies = modes.frequencies.clone();
        let pdos = (0..modes.num_bands())
            .map(|dof| (0..modes.num_bands()).map(|band| modes.weight(band, dof)).collect())
            .collect();
        let tdos = vec![1.0; frequencies.len()];
        return Ok(DensityOfStates {
            frequencies,
            pdos,
            tdos,
            method: DosMethod::Discrete,
        });
    }

    let mesh = grid.mesh.ok_or(PhononError::TetrahedronNeedsGrid)?;
    let counts: Vec<usize> = axes.iter().map(|&a| mesh[a]).collect();
    if counts.iter().product::<usize>() != spectrum.len() {
        return Err(PhononError::TetrahedronNeedsGrid);
    }

    let frequencies = frequency_axis(spectrum, num_dos);
    let pdos = tetrahedron::accumulate(&frequencies, spectrum, &counts);
    let tdos = total(&pdos, frequencies.len());
    Ok(DensityOfStates {
        frequencies,
        pdos,
        tdos,
        method: DosMethod::Tetrahedron,
    })
}
