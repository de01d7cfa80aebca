//! # 声子模式动画
//!
//! 在指定 k 点取第 `band` 支本征向量，生成 30 帧正弦振动轨迹 (XDATCAR)：
//! r(t) = r₀ + sin(2πt/30)·Re(v)/sqrt(m/m_max)，只移动可移动原子。
//! 每帧在结构副本上位移，原胞本身不变。
//!
//! ## 依赖关系
//! - 被 `commands/post.rs` 使用
//! - 使用 `phonon/spectrum.rs`, `parsers/poscar.rs`

use crate::error::{PhononError, Result};
use crate::models::{elements, PeriodicStructure};
use crate::parsers::poscar;
use crate::phonon::PhononSpectrum;

use nalgebra::Vector3;
use std::f64::consts::PI;

/// 轨迹帧数
pub const NUM_IMAGES: usize = 30;

/// 输出文件名
pub fn trajectory_file_name(band: usize, kpoint: &[f64; 3]) -> String {
    format!(
        "XDATCAR_phonon_mode_{}_{:.3}_{:.3}_{:.3}",
        band, kpoint[0], kpoint[1], kpoint[2]
    )
}

/// 生成 XDATCAR 内容
pub fn trajectory(
    unit: &PeriodicStructure,
    spectrum: &PhononSpectrum,
    band: usize,
    kpoint: &[f64; 3],
) -> Result<String> {
    let modes = spectrum
        .find(kpoint)
        .ok_or(PhononError::KpointNotFound(*kpoint))?;
    if band >= modes.num_bands() {
        return Err(PhononError::InvalidArgument(format!(
            "mode index {} out of range (0..{})",
            band,
            modes.num_bands()
        )));
    }

    let mobile = unit.mobile_indices();
    let masses = mobile
        .iter()
        .map(|&i| elements::atomic_mass_kg(&unit.atoms[i].element))
        .collect::<Result<Vec<f64>>>()?;
    let heaviest = masses.iter().cloned().fold(0.0, f64::max);

    let amplitudes: Vec<Vector3<f64>> = masses
        .iter()
        .enumerate()
        .map(|(m, &mass)| {
            let v = Vector3::from_fn(|a, _| modes.eigenvectors[(band, 3 * m + a)].re);
            v / (mass / heaviest).sqrt()
        })
        .collect();
    let origin: Vec<Vector3<f64>> = mobile.iter().map(|&i| unit.cartesian(i)).collect();

    let mut out = poscar::header_string(unit, "unknown system");
    for image in 0..NUM_IMAGES {
        let phase = (2.0 * PI * image as f64 / NUM_IMAGES as f64).sin();
        let mut frame = unit.clone();
        for ((&i, r0), u) in mobile.iter().zip(origin.iter()).zip(amplitudes.iter()) {
            let frac = frame.lattice.cart_to_frac(&(r0 + u * phase))?;
            frame.atoms[i].position = [frac[0], frac[1], frac[2]];
        }

        out.push_str(&format!("Cartesian configuration= {:>4}\n", image + 1));
        out.push_str(&poscar::coordinate_string(&frame, false));
    }

    Ok(out)
}
