//! # 热力学性质（每原子）
//!
//! 对全部 k 点与声子支求和，再除以 N_k 与 N_band/3：
//! - F = ½hν + k_BT·ln(1 − e^{−x})
//! - S = k_B·[x/(eˣ − 1) − ln(1 − e^{−x})]
//! - C_v = k_B·x²eˣ/(eˣ − 1)²
//!
//! 其中 x = hν/k_BT。T = 0 时 F 为零点能，S 与 C_v 为 0。
//! 非正频率（虚频与 Γ 点声学支）跳过，并计数供调用方警告。
//!
//! ## 依赖关系
//! - 被 `commands/post.rs`, `export.rs`, `plot.rs` 使用
//! - 使用 `phonon/spectrum.rs`

use crate::error::{PhononError, Result};
use crate::phonon::PhononSpectrum;

/// Boltzmann 常数 (eV/K)
pub const KB: f64 = 1.38e-23 / 1.602e-19;
/// Planck 常数 (eV·s)
pub const PLANCK: f64 = 6.626e-34 / 1.602e-19;

#[derive(Debug, Clone)]
pub struct ThermalProperties {
    pub temperatures: Vec<f64>,
    /// eV/atom
    pub free_energy: Vec<f64>,
    /// eV/K/atom
    pub entropy: Vec<f64>,
    /// eV/K/atom
    pub heat_capacity: Vec<f64>,
    /// 被跳过的 (k 点, 支) 数
    pub skipped: usize,
}

/// [tmin, tmax) 以 tstep 为步长
pub fn temperature_range(tmin: f64, tmax: f64, tstep: f64) -> Result<Vec<f64>> {
    if tstep <= 0.0 || tmin < 0.0 || tmax <= tmin {
        return Err(PhononError::InvalidArgument(format!(
            "temperature range needs 0 <= tmin < tmax and tstep > 0, got {}..{} step {}",
            tmin, tmax, tstep
        )));
    }
    let count = ((tmax - tmin) / tstep).ceil() as usize;
    Ok((0..count).map(|i| tmin + i as f64 * tstep).collect())
}

pub fn compute(spectrum: &PhononSpectrum, temperatures: &[f64]) -> ThermalProperties {
    let n = temperatures.len();
    let mut free_energy = vec![0.0; n];
    let mut entropy = vec![0.0; n];
    let mut heat_capacity = vec![0.0; n];
    let mut skipped = 0;

    let atoms = spectrum.num_bands() as f64 / 3.0;
    let norm = 1.0 / spectrum.len().max(1) as f64 / atoms.max(1.0);

    for modes in &spectrum.modes {
        for &thz in &modes.frequencies {
            if thz <= 0.0 {
                skipped += 1;
                continue;
            }
            let energy = PLANCK * thz * 1e12;

            for (i, &t) in temperatures.iter().enumerate() {
                if t <= 0.0 {
                    free_energy[i] += 0.5 * energy * norm;
                    continue;
                }
                let x = energy / (KB * t);
                let boltzmann = (-x).exp();
                // ln(1 − e^{−x}) 与 x/(eˣ − 1) 在大 x 时都趋于 0
                let log_term = (-boltzmann).ln_1p();
                let occupation = x * boltzmann / (1.0 - boltzmann);

                free_energy[i] += (0.5 * energy + KB * t * log_term) * norm;
                entropy[i] += KB * (occupation - log_term) * norm;
                heat_capacity[i] +=
                    KB * x * x * boltzmann / (1.0 - boltzmann).powi(2) * norm;
            }
        }
    }

    ThermalProperties {
        temperatures: temperatures.to_vec(),
        free_energy,
        entropy,
        heat_capacity,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phonon::spectrum::ModeSet;
    use nalgebra::DMatrix;
    use num_complex::Complex64;

    fn single_atom(frequencies: Vec<f64>) -> PhononSpectrum {
        PhononSpectrum {
            modes: vec![ModeSet {
                kpoint: [0.0; 3],
                frequencies,
                eigenvectors: DMatrix::identity(3, 3).map(|x: f64| Complex64::new(x, 0.0)),
            }],
        }
    }

    #[test]
    fn test_zero_temperature_gives_zero_point_energy() {
        let spectrum = single_atom(vec![2.0, 4.0, 6.0]);
        let t = compute(&spectrum, &[0.0, 300.0]);
        let zpe = 0.5 * PLANCK * 12.0e12;
        assert!((t.free_energy[0] - zpe).abs() < 1e-12);
        assert_eq!(t.entropy[0], 0.0);
        assert_eq!(t.heat_capacity[0], 0.0);
        assert!(t.free_energy[1] < zpe);
        assert!(t.entropy[1] > 0.0);
    }

    #[test]
    fn test_high_temperature_heat_capacity_limit() {
        let spectrum = single_atom(vec![1.0, 1.0, 1.0]);
        let t = compute(&spectrum, &[1.0e5]);
        assert!((t.heat_capacity[0] - 3.0 * KB).abs() < 1e-4 * KB);
    }

    #[test]
    fn test_non_positive_frequencies_skipped() {
        let spectrum = single_atom(vec![-0.5, 0.0, 3.0]);
        let t = compute(&spectrum, &[100.0]);
        assert_eq!(t.skipped, 2);
        assert!(t.heat_capacity[0] > 0.0);
    }

    #[test]
    fn test_low_temperature_is_finite() {
        let spectrum = single_atom(vec![30.0, 30.0, 30.0]);
        let t = compute(&spectrum, &[1.0]);
        assert!(t.free_energy[0].is_finite());
        assert!(t.entropy[0].abs() < 1e-20);
    }

    #[test]
    fn test_temperature_range() {
        let range = temperature_range(0.0, 1000.0, 10.0).unwrap();
        assert_eq!(range.len(), 100);
        assert_eq!(range[99], 990.0);
        assert!(temperature_range(100.0, 10.0, 10.0).is_err());
    }
}
