//! # 布里渊区 k 点
//!
//! 自动网格（Gamma / Monkhorst-Pack）、高对称线路径与显式列表。
//! k 点一律为分数坐标；非周期方向分量恒为 0。
//!
//! ## 依赖关系
//! - 被 `parsers/kpoints.rs`, `dos/`, `analysis/band.rs`, `commands/post.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{PhononError, Result};
use crate::models::Periodicity;

/// 自动网格方案
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridScheme {
    /// k = (i + shift) / n
    Gamma,
    /// k = (i + shift + 0.5) / n
    MonkhorstPack,
}

impl GridScheme {
    fn offset(&self) -> f64 {
        match self {
            GridScheme::Gamma => 0.0,
            GridScheme::MonkhorstPack => 0.5,
        }
    }
}

/// 有序 k 点集合；自动网格额外记录每个方向的点数
#[derive(Debug, Clone, PartialEq)]
pub struct BZGrid {
    pub kpoints: Vec<[f64; 3]>,
    pub mesh: Option<[usize; 3]>,
}

impl BZGrid {
    /// 仅含 Γ 点（0D 体系）
    pub fn gamma_only() -> Self {
        BZGrid {
            kpoints: vec![[0.0; 3]],
            mesh: Some([1, 1, 1]),
        }
    }

    /// 自动网格，按周期方向顺序嵌套循环（先出现的方向为外层）
    pub fn automatic(
        scheme: GridScheme,
        mesh: [usize; 3],
        shift: [f64; 3],
        periodicity: &Periodicity,
    ) -> Result<Self> {
        for axis in periodicity.open_axes() {
            if mesh[axis] != 1 {
                return Err(PhononError::KpointAxisMismatch {
                    axis,
                    reason: format!("grid count {} along a non-periodic axis", mesh[axis]),
                });
            }
        }
        let axes = periodicity.periodic_axes();
        if let Some(&axis) = axes.iter().find(|&&axis| mesh[axis] == 0) {
            return Err(PhononError::KpointAxisMismatch {
                axis,
                reason: "grid count must be positive".to_string(),
            });
        }

        if axes.is_empty() {
            return Ok(BZGrid::gamma_only());
        }

        let offset = scheme.offset();
        let mut kpoints = vec![[0.0; 3]];
        for &axis in &axes {
            let n = mesh[axis];
            kpoints = kpoints
                .into_iter()
                .flat_map(|k| {
                    (0..n).map(move |i| {
                        let mut next = k;
                        next[axis] = (i as f64 + shift[axis] + offset) / n as f64;
                        next
                    })
                })
                .collect();
        }

        Ok(BZGrid {
            kpoints,
            mesh: Some(mesh),
        })
    }

    /// 高对称线路径；端点成对给出，每段含首尾共 `per_segment` 个点
    pub fn line_path(
        endpoints: &[[f64; 3]],
        per_segment: usize,
        periodicity: &Periodicity,
    ) -> Result<Self> {
        if endpoints.len() % 2 != 0 {
            return Err(PhononError::OddLinePathEndpoints(endpoints.len()));
        }
        for point in endpoints {
            check_open_axes(point, periodicity)?;
        }

        let mut kpoints = Vec::with_capacity(endpoints.len() / 2 * per_segment);
        for pair in endpoints.chunks_exact(2) {
            let (start, end) = (pair[0], pair[1]);
            match per_segment {
                0 => {}
                1 => kpoints.push(start),
                n => {
                    let last = (n - 1) as f64;
                    kpoints.extend((0..n).map(|i| {
                        let t = i as f64 / last;
                        [
                            start[0] + (end[0] - start[0]) * t,
                            start[1] + (end[1] - start[1]) * t,
                            start[2] + (end[2] - start[2]) * t,
                        ]
                    }));
                }
            }
        }

        Ok(BZGrid {
            kpoints,
            mesh: None,
        })
    }

    /// 显式 k 点列表
    pub fn explicit(kpoints: Vec<[f64; 3]>, periodicity: &Periodicity) -> Result<Self> {
        for point in &kpoints {
            check_open_axes(point, periodicity)?;
        }
        Ok(BZGrid {
            kpoints,
            mesh: None,
        })
    }

    pub fn len(&self) -> usize {
        self.kpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kpoints.is_empty()
    }
}

fn check_open_axes(point: &[f64; 3], periodicity: &Periodicity) -> Result<()> {
    for axis in periodicity.open_axes() {
        if point[axis] != 0.0 {
            return Err(PhononError::KpointAxisMismatch {
                axis,
                reason: format!("k-point {:?} has a component along a non-periodic axis", point),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLAB: Periodicity = Periodicity([true, true, false]);

    #[test]
    fn test_gamma_grid_order() {
        let grid = BZGrid::automatic(GridScheme::Gamma, [2, 3, 1], [0.0; 3], &SLAB).unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.kpoints[0], [0.0, 0.0, 0.0]);
        assert!((grid.kpoints[1][1] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(grid.kpoints[3][0], 0.5);
        assert_eq!(grid.kpoints[3][1], 0.0);
        assert_eq!(grid.mesh, Some([2, 3, 1]));
    }

    #[test]
    fn test_monkhorst_pack_offset() {
        let wire = Periodicity([false, false, true]);
        let grid =
            BZGrid::automatic(GridScheme::MonkhorstPack, [1, 1, 4], [0.0; 3], &wire).unwrap();
        let z: Vec<f64> = grid.kpoints.iter().map(|k| k[2]).collect();
        assert_eq!(z, vec![0.125, 0.375, 0.625, 0.875]);
    }

    #[test]
    fn test_bulk_grid_counts() {
        let bulk = Periodicity([true, true, true]);
        let grid = BZGrid::automatic(GridScheme::Gamma, [2, 2, 3], [0.0; 3], &bulk).unwrap();
        assert_eq!(grid.len(), 12);
        // 最内层为第三个方向
        assert!((grid.kpoints[1][2] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_grid_count_on_open_axis_rejected() {
        let err = BZGrid::automatic(GridScheme::Gamma, [4, 4, 2], [0.0; 3], &SLAB).unwrap_err();
        assert!(matches!(err, PhononError::KpointAxisMismatch { axis: 2, .. }));
    }

    #[test]
    fn test_zero_dimensional_grid_is_gamma() {
        let molecule = Periodicity([false, false, false]);
        let grid = BZGrid::automatic(GridScheme::Gamma, [1, 1, 1], [0.0; 3], &molecule).unwrap();
        assert_eq!(grid.kpoints, vec![[0.0; 3]]);
    }

    #[test]
    fn test_line_path_inclusive() {
        let ends = [[0.0, 0.0, 0.0], [0.5, 0.0, 0.0], [0.5, 0.0, 0.0], [0.5, 0.5, 0.0]];
        let grid = BZGrid::line_path(&ends, 5, &SLAB).unwrap();
        assert_eq!(grid.len(), 10);
        assert_eq!(grid.kpoints[4], [0.5, 0.0, 0.0]);
        assert_eq!(grid.kpoints[5], [0.5, 0.0, 0.0]);
        assert!((grid.kpoints[7][1] - 0.25).abs() < 1e-12);
        assert!(grid.mesh.is_none());
    }

    #[test]
    fn test_line_path_errors() {
        let odd = [[0.0; 3], [0.5, 0.0, 0.0], [0.5, 0.5, 0.0]];
        assert!(matches!(
            BZGrid::line_path(&odd, 10, &SLAB),
            Err(PhononError::OddLinePathEndpoints(3))
        ));

        // 终点含非周期分量同样拒绝
        let bad_end = [[0.0; 3], [0.5, 0.0, 0.5]];
        assert!(BZGrid::line_path(&bad_end, 10, &SLAB).is_err());
    }
}
