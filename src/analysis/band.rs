//! # 声子能带
//!
//! 路径长度按分数坐标的 |Δk| 累加；相邻 k 点重合处（线路径两段的衔接点）
//! 记为高对称点，首尾两点总是高对称点。
//!
//! ## 依赖关系
//! - 被 `commands/post.rs`, `export.rs`, `plot.rs` 使用
//! - 使用 `phonon/spectrum.rs`

use crate::phonon::PhononSpectrum;

/// 能带数据
#[derive(Debug, Clone)]
pub struct BandStructure {
    /// 每个 k 点处的累计路径长度
    pub path_length: Vec<f64>,
    /// 高对称点在 k 点序列中的下标
    pub high_symmetry: Vec<usize>,
    /// frequencies[k][band]
    pub frequencies: Vec<Vec<f64>>,
    /// projections[k][band][dof] = |v|²
    pub projections: Vec<Vec<Vec<f64>>>,
}

impl BandStructure {
    pub fn from_spectrum(spectrum: &PhononSpectrum) -> Self {
        let kpoints = spectrum.kpoints();
        let mut path_length = vec![0.0; kpoints.len()];
        let mut high_symmetry = vec![0];

        for i in 1..kpoints.len() {
            let (a, b) = (kpoints[i - 1], kpoints[i]);
            let step = ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2) + (b[2] - a[2]).powi(2)).sqrt();
            path_length[i] = path_length[i - 1] + step;

            if a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= 1e-8 + 1e-5 * x.abs()) {
                high_symmetry.push(i);
            }
        }
        if kpoints.len() > 1 {
            high_symmetry.push(kpoints.len() - 1);
        }

        let frequencies = spectrum.modes.iter().map(|m| m.frequencies.clone()).collect();
        let projections = spectrum
            .modes
            .iter()
            .map(|m| {
                (0..m.num_bands())
                    .map(|band| (0..m.num_bands()).map(|dof| m.weight(band, dof)).collect())
                    .collect()
            })
            .collect();

        BandStructure {
            path_length,
            high_symmetry,
            frequencies,
            projections,
        }
    }
}
