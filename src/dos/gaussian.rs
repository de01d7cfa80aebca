//! # 高斯展宽
//!
//! g_i(f) = Σ_k Σ_band exp(−(f − f_kb)² / 2σ²) / (σ√(2π)) / N_k · |v_kb,i|²
//!
//! ## 依赖关系
//! - 被 `dos/mod.rs` 使用

use crate::phonon::PhononSpectrum;

use std::f64::consts::PI;

/// 返回 pdos[自由度][频率点]
pub fn accumulate(axis: &[f64], spectrum: &PhononSpectrum, sigma: f64) -> Vec<Vec<f64>> {
    let dofs = spectrum.num_bands();
    let mut pdos = vec![vec![0.0; axis.len()]; dofs];
    let norm = 1.0 / (sigma * (2.0 * PI).sqrt()) / spectrum.len() as f64;

    for modes in &spectrum.modes {
        for (band, &center) in modes.frequencies.iter().enumerate() {
            let kernel: Vec<f64> = axis
                .iter()
                .map(|f| norm * (-(f - center).powi(2) / (2.0 * sigma * sigma)).exp())
                .collect();
            for (dof, row) in pdos.iter_mut().enumerate() {
                let weight = modes.weight(band, dof);
                for (value, k) in row.iter_mut().zip(kernel.iter()) {
                    *value += k * weight;
                }
            }
        }
    }

    pdos
}
