//! # VASP KPOINTS 格式解析器
//!
//! 第 3 行首字母决定模式（不区分大小写）：
//! - `G` / `M`：Gamma / Monkhorst-Pack 网格，第 4 行为点数，第 5 行为可选平移
//! - `L`：线路径，第 2 行为每段点数，第 4 行起为成对端点
//! - `R`：显式列表，第 2 行为点数，第 4 行起为 k 点
//!
//! ## 依赖关系
//! - 被 `commands/post.rs` 使用
//! - 使用 `phonon/kpoints.rs`

use crate::error::{PhononError, Result};
use crate::models::Periodicity;
use crate::phonon::{BZGrid, GridScheme};

use std::fs;
use std::path::Path;

/// 解析 KPOINTS 文件
pub fn parse_kpoints_file(path: &Path, periodicity: &Periodicity) -> Result<BZGrid> {
    let content = fs::read_to_string(path).map_err(|e| PhononError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_kpoints_content(&content, &path.display().to_string(), periodicity)
}

fn parse_error(path: &str, reason: impl Into<String>) -> PhononError {
    PhononError::ParseError {
        format: "kpoints".to_string(),
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn parse_triple<T: std::str::FromStr>(line: &str) -> Option<[T; 3]> {
    let mut parts = line.split_whitespace().map(|s| s.parse::<T>());
    let a = parts.next()?.ok()?;
    let b = parts.next()?.ok()?;
    let c = parts.next()?.ok()?;
    Some([a, b, c])
}

fn leading_count(lines: &[&str], path: &str) -> Result<usize> {
    lines
        .get(1)
        .and_then(|l| l.split_whitespace().next())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| parse_error(path, "Invalid point count at line 2"))
}

/// 从字符串内容解析
pub fn parse_kpoints_content(content: &str, path: &str, periodicity: &Periodicity) -> Result<BZGrid> {
    let lines: Vec<&str> = content.lines().collect();

    let mode = lines
        .get(2)
        .and_then(|l| l.trim().chars().next())
        .map(|c| c.to_ascii_uppercase())
        .ok_or_else(|| parse_error(path, "Missing mode at line 3"))?;

    let grid = match mode {
        'G' | 'M' => {
            let scheme = if mode == 'G' {
                GridScheme::Gamma
            } else {
                GridScheme::MonkhorstPack
            };
            let mesh: [usize; 3] = lines
                .get(3)
                .and_then(|l| parse_triple(l))
                .ok_or_else(|| parse_error(path, "Invalid grid counts at line 4"))?;
            let shift: [f64; 3] = lines.get(4).and_then(|l| parse_triple(l)).unwrap_or([0.0; 3]);
            BZGrid::automatic(scheme, mesh, shift, periodicity)
        }
        'L' => {
            let per_segment = leading_count(&lines, path)?;
            let endpoints = lines
                .iter()
                .enumerate()
                .skip(3)
                .filter(|(_, l)| !l.trim().is_empty())
                .map(|(i, l)| {
                    parse_triple(l)
                        .ok_or_else(|| parse_error(path, format!("Invalid k-point at line {}", i + 1)))
                })
                .collect::<Result<Vec<[f64; 3]>>>()?;
            BZGrid::line_path(&endpoints, per_segment, periodicity)
        }
        'R' => {
            let count = leading_count(&lines, path)?;
            let kpoints = lines
                .iter()
                .enumerate()
                .skip(3)
                .take(count)
                .filter(|(_, l)| !l.trim().is_empty())
                .map(|(i, l)| {
                    parse_triple(l)
                        .ok_or_else(|| parse_error(path, format!("Invalid k-point at line {}", i + 1)))
                })
                .collect::<Result<Vec<[f64; 3]>>>()?;
            BZGrid::explicit(kpoints, periodicity)
        }
        other => Err(parse_error(
            path,
            format!("Unknown k-point mode '{}' (expected G, M, L or R)", other),
        )),
    }?;

    if grid.is_empty() {
        return Err(parse_error(path, "No k-point listed"));
    }
    Ok(grid)
}
