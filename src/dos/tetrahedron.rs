//! # 线性四面体法
//!
//! 自动网格的每个格元按维度剖分为单纯形：
//! - 1D：线段 0-1
//! - 2D：三角形 0-1-3, 0-2-3
//! - 3D：四面体 0-1-5-7, 0-1-3-7, 0-2-3-7, 0-4-5-7, 0-4-6-7, 0-2-6-7
//!
//! 顶点编号的二进制位对应周期方向上的 +1 步（最低位为最后一个周期方向），
//! 超出网格时周期回绕。单纯形内频率线性插值，按角点频率升序给出闭式权重，
//! 权重 |v|² 随频率同步排序。每个单纯形的体积占比为 1/(d!·N_cells)。
//! 角点频率全部相同的单纯形是 δ 峰，整体计入该频率所在的频率格。
//!
//! ## 参考
//! - Lehmann & Taut, phys. stat. sol. (b) 54, 469 (1972)
//! - Kawamura, Comput. Phys. Commun. 239, 197 (2019)
//!
//! ## 依赖关系
//! - 被 `dos/mod.rs` 使用

use crate::phonon::PhononSpectrum;

/// 角点频率跨度不超过该值 (THz) 时按 δ 峰处理
const DEGENERATE_WIDTH: f64 = 1e-10;

const LINES: &[&[usize]] = &[&[0, 1]];
const TRIANGLES: &[&[usize]] = &[&[0, 1, 3], &[0, 2, 3]];
const TETRAHEDRA: &[&[usize]] = &[
    &[0, 1, 5, 7],
    &[0, 1, 3, 7],
    &[0, 2, 3, 7],
    &[0, 4, 5, 7],
    &[0, 4, 6, 7],
    &[0, 2, 6, 7],
];

/// 按周期方向的网格点数剖分，返回每个单纯形角点的 k 点下标
pub fn simplices(counts: &[usize]) -> Vec<Vec<usize>> {
    let d = counts.len();
    let shapes = match d {
        1 => LINES,
        2 => TRIANGLES,
        3 => TETRAHEDRA,
        _ => return Vec::new(),
    };

    let cells: usize = counts.iter().product();
    let mut result = Vec::with_capacity(cells * shapes.len());
    for cell in 0..cells {
        // 行主序展开：第一个周期方向为最外层
        let mut coords = vec![0; d];
        let mut rest = cell;
        for a in (0..d).rev() {
            coords[a] = rest % counts[a];
            rest /= counts[a];
        }

        let vertex = |bits: usize| -> usize {
            (0..d).fold(0, |index, a| {
                let step = (bits >> (d - 1 - a)) & 1;
                index * counts[a] + (coords[a] + step) % counts[a]
            })
        };

        for shape in shapes {
            result.push(shape.iter().map(|&bits| vertex(bits)).collect());
        }
    }
    result
}

/// 单纯形体积占比 1/(d!·N_cells)
pub fn simplex_fraction(counts: &[usize]) -> f64 {
    let factorial: usize = (1..=counts.len()).product();
    1.0 / (factorial * counts.iter().product::<usize>()) as f64
}

/// 频率 f 处的态密度 g 与各角点插值权重 I；f 不在 [w_0, w_d) 内时返回 None
///
/// `w` 必须已升序排列。
pub fn bracket(f: f64, w: &[f64]) -> Option<(f64, Vec<f64>)> {
    match *w {
        [w0, w1] => {
            if w0 <= f && f < w1 {
                let g = 1.0 / (w1 - w0);
                Some((g, vec![(f - w1) / (w0 - w1), (f - w0) / (w1 - w0)]))
            } else {
                None
            }
        }
        [w0, w1, w2] => {
            if w0 <= f && f < w1 {
                let g = 2.0 * (f - w0) / (w1 - w0) / (w2 - w0);
                let i = vec![
                    0.5 * ((f - w1) / (w0 - w1) + (f - w2) / (w0 - w2)),
                    0.5 * (f - w0) / (w1 - w0),
                    0.5 * (f - w0) / (w2 - w0),
                ];
                Some((g, i))
            } else if w1 <= f && f < w2 {
                let g = 2.0 * (w2 - f) / (w2 - w1) / (w2 - w0);
                let i = vec![
                    0.5 * (f - w2) / (w0 - w2),
                    0.5 * (f - w2) / (w1 - w2),
                    0.5 * ((f - w0) / (w2 - w0) + (f - w1) / (w2 - w1)),
                ];
                Some((g, i))
            } else {
                None
            }
        }
        [w0, w1, w2, w3] => {
            let third = 1.0 / 3.0;
            if w0 <= f && f < w1 {
                let g = 3.0 * (f - w0).powi(2) / (w1 - w0) / (w2 - w0) / (w3 - w0);
                let i = vec![
                    third * ((f - w1) / (w0 - w1) + (f - w2) / (w0 - w2) + (f - w3) / (w0 - w3)),
                    third * (f - w0) / (w1 - w0),
                    third * (f - w0) / (w2 - w0),
                    third * (f - w0) / (w3 - w0),
                ];
                Some((g, i))
            } else if w1 <= f && f < w2 {
                let g = 3.0 / (w3 - w0)
                    * ((f - w1) * (f - w3) / ((w2 - w1) * (w1 - w3))
                        + (f - w0) * (f - w2) / ((w2 - w0) * (w1 - w2)));
                if g == 0.0 {
                    return None;
                }
                let tail = g * (w3 - w0);
                let i = vec![
                    third * (f - w3) / (w0 - w3)
                        + (f - w2) / (w0 - w2) * (f - w0) / (w2 - w0) * (f - w2) / (w1 - w2) / tail,
                    third * (f - w2) / (w1 - w2)
                        + (f - w3) / (w1 - w3) * (f - w3) / (w1 - w3) * (f - w1) / (w2 - w1) / tail,
                    third * (f - w1) / (w2 - w1)
                        + (f - w0) / (w2 - w0) * (f - w0) / (w2 - w0) * (f - w2) / (w1 - w2) / tail,
                    third * (f - w0) / (w3 - w0)
                        + (f - w1) / (w3 - w1) * (f - w3) / (w1 - w3) * (f - w1) / (w2 - w1) / tail,
                ];
                Some((g, i))
            } else if w2 <= f && f < w3 {
                let g = 3.0 * (w3 - f).powi(2) / (w3 - w0) / (w3 - w1) / (w3 - w2);
                let i = vec![
                    third * (f - w3) / (w0 - w3),
                    third * (f - w3) / (w1 - w3),
                    third * (f - w3) / (w2 - w3),
                    third * ((f - w0) / (w3 - w0) + (f - w1) / (w3 - w1) + (f - w2) / (w3 - w2)),
                ];
                Some((g, i))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// 返回 pdos[自由度][频率点]；`counts` 为各周期方向的网格点数
pub fn accumulate(axis: &[f64], spectrum: &PhononSpectrum, counts: &[usize]) -> Vec<Vec<f64>> {
    let dofs = spectrum.num_bands();
    let mut pdos = vec![vec![0.0; axis.len()]; dofs];
    let fraction = simplex_fraction(counts);
    let step = match axis {
        [first, second, ..] => second - first,
        _ => 0.0,
    };

    for corners in simplices(counts) {
        for band in 0..spectrum.num_bands() {
            let mut order: Vec<usize> = corners.clone();
            order.sort_by(|&a, &b| {
                spectrum.modes[a].frequencies[band].total_cmp(&spectrum.modes[b].frequencies[band])
            });
            let w: Vec<f64> = order
                .iter()
                .map(|&k| spectrum.modes[k].frequencies[band])
                .collect();

            let (lo, hi) = (w[0], w[w.len() - 1]);
            if hi - lo <= DEGENERATE_WIDTH {
                let Some(x) = delta_bin(axis, step, lo) else {
                    continue;
                };
                let share = fraction / (step * order.len() as f64);
                for (dof, row) in pdos.iter_mut().enumerate() {
                    let projected: f64 = order
                        .iter()
                        .map(|&k| spectrum.modes[k].weight(band, dof))
                        .sum();
                    row[x] += share * projected;
                }
                continue;
            }

            for (x, &f) in axis.iter().enumerate() {
                if f < lo || f >= hi {
                    continue;
                }
                let Some((g, weights)) = bracket(f, &w) else {
                    continue;
                };
                for (dof, row) in pdos.iter_mut().enumerate() {
                    let projected: f64 = order
                        .iter()
                        .zip(weights.iter())
                        .map(|(&k, i)| i * spectrum.modes[k].weight(band, dof))
                        .sum();
                    row[x] += fraction * g * projected;
                }
            }
        }
    }

    pdos
}

/// 频率 f 所在的格 [axis[x], axis[x] + step)
fn delta_bin(axis: &[f64], step: f64, f: f64) -> Option<usize> {
    if step <= 0.0 || f < axis[0] {
        return None;
    }
    let x = ((f - axis[0]) / step).floor() as usize;
    (x < axis.len()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phonon::spectrum::ModeSet;

    use nalgebra::DMatrix;
    use num_complex::Complex64;
    use std::f64::consts::PI;

    /// 两支色散带，网格顺序与 `simplices` 一致（第一个方向为外层）
    fn two_band_spectrum(counts: &[usize]) -> PhononSpectrum {
        let total: usize = counts.iter().product();
        let modes = (0..total)
            .map(|index| {
                let mut kpoint = [0.0; 3];
                let mut rest = index;
                for a in (0..counts.len()).rev() {
                    kpoint[a] = (rest % counts[a]) as f64 / counts[a] as f64;
                    rest /= counts[a];
                }
                let ripple: f64 = kpoint.iter().map(|k| (2.0 * PI * k).cos()).sum();
                ModeSet {
                    kpoint,
                    frequencies: vec![2.0 + 0.4 * ripple, 6.0 - 0.7 * ripple],
                    eigenvectors: DMatrix::from_fn(2, 2, |r, c| {
                        Complex64::new(if r == c { 1.0 } else { 0.0 }, 0.0)
                    }),
                }
            })
            .collect();
        PhononSpectrum { modes }
    }

    fn integral(axis: &[f64], pdos: &[Vec<f64>]) -> f64 {
        let step = axis[1] - axis[0];
        pdos.iter().flatten().sum::<f64>() * step
    }

    #[test]
    fn test_pdos_normalized_in_every_dimension() {
        for counts in [vec![12], vec![6, 6], vec![6, 6, 6]] {
            let spectrum = two_band_spectrum(&counts);
            let axis = crate::dos::frequency_axis(&spectrum, 8000);
            let pdos = accumulate(&axis, &spectrum, &counts);

            let total = integral(&axis, &pdos);
            assert!((total - 2.0).abs() < 1e-2, "{:?}: {}", counts, total);
            // 每个自由度只属于一支
            let first = pdos[0].iter().sum::<f64>() * (axis[1] - axis[0]);
            assert!((first - 1.0).abs() < 1e-2, "{:?}: {}", counts, first);
        }
    }

    #[test]
    fn test_flat_band_is_a_delta_peak() {
        let counts = [4, 4];
        let mut spectrum = two_band_spectrum(&counts);
        for modes in &mut spectrum.modes {
            modes.frequencies[0] = 5.0;
        }
        let axis: Vec<f64> = (0..400).map(|i| 3.0 + i as f64 * 0.01).collect();
        let pdos = accumulate(&axis, &spectrum, &counts);

        let flat = pdos[0].iter().sum::<f64>() * 0.01;
        assert!((flat - 1.0).abs() < 1e-9, "flat band integral = {}", flat);
        let hits: Vec<usize> = (0..axis.len()).filter(|&x| pdos[0][x] > 0.0).collect();
        assert_eq!(hits.len(), 1);
        assert!((axis[hits[0]] - 5.0).abs() <= 0.01 + 1e-9);

        // 轴外的平带不计入
        let far: Vec<f64> = (0..100).map(|i| 10.0 + i as f64 * 0.01).collect();
        assert!(accumulate(&far, &spectrum, &counts)[0].iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_square_mesh_simplices() {
        let s = simplices(&[2, 3]);
        assert_eq!(s.len(), 12);
        // 格元 (0,0)：角点 0=(0,0), 1=(0,1), 2=(1,0), 3=(1,1)
        assert_eq!(s[0], vec![0, 1, 4]);
        assert_eq!(s[1], vec![0, 3, 4]);
        // 格元 (1,2) 两个方向都回绕
        assert_eq!(s[10], vec![5, 3, 0]);
    }

    #[test]
    fn test_cube_mesh_simplices() {
        let s = simplices(&[2, 2, 2]);
        assert_eq!(s.len(), 48);
        assert_eq!(s[0], vec![0, 1, 5, 7]);
        assert!((simplex_fraction(&[2, 2, 2]) - 1.0 / 48.0).abs() < 1e-15);
    }

    #[test]
    fn test_bracket_weights_sum_to_one() {
        let w = [1.0, 2.0, 3.5, 4.0];
        for f in [1.2, 2.5, 3.9] {
            let (g, i) = bracket(f, &w).unwrap();
            assert!(g > 0.0);
            assert!((i.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
        assert!(bracket(4.0, &w).is_none());

        let (_, i) = bracket(1.7, &[1.0, 2.0, 3.0]).unwrap();
        assert!((i.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tetrahedron_density_integrates_to_one() {
        // 单个四面体上 g 的积分为 1
        let w = [0.0, 1.0, 1.5, 3.0];
        let step = 1e-4;
        let total: f64 = (0..30_000)
            .filter_map(|n| bracket(n as f64 * step, &w))
            .map(|(g, _)| g * step)
            .sum();
        assert!((total - 1.0).abs() < 1e-3);
    }
}
