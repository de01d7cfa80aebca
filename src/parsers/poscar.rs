//! # VASP POSCAR 格式解析器
//!
//! 读写原胞、超胞与位移超胞 (POSCAR-0001 ...)。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1 [T T T]       # atom positions
//! ...
//! ```
//!
//! 带 selective dynamics 时，行中含任一 `T` 的原子为可移动原子；否则全部可移动。
//!
//! ## 依赖关系
//! - 被 `commands/pre.rs`, `commands/post.rs`, `analysis/mode.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{PhononError, Result};
use crate::models::{Atom, Lattice, PeriodicStructure, Periodicity};

use nalgebra::Vector3;
use std::fs;
use std::path::Path;

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path, periodicity: Periodicity) -> Result<PeriodicStructure> {
    let content = fs::read_to_string(path).map_err(|e| PhononError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_poscar_content(&content, &path.display().to_string(), periodicity)
}

fn parse_error(path: &str, reason: impl Into<String>) -> PhononError {
    PhononError::ParseError {
        format: "poscar".to_string(),
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(
    content: &str,
    path: &str,
    periodicity: Periodicity,
) -> Result<PeriodicStructure> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err(parse_error(path, "File too short"));
    }

    // Line 0: Comment/name
    let name = lines[0].trim().to_string();

    // Line 1: Scaling factor
    let scale: f64 = lines[1]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| parse_error(path, "Invalid scaling factor at line 2"))?;

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for (i, row) in matrix.iter_mut().enumerate() {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(parse_error(
                path,
                format!("Invalid lattice vector at line {}", 3 + i),
            ));
        }
        *row = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
    }
    let lattice = Lattice::from_vectors(matrix);

    // Line 5: Element symbols; line 6: counts
    let elements: Vec<String> = lines[5].split_whitespace().map(str::to_string).collect();
    if elements.is_empty() || elements[0].parse::<usize>().is_ok() {
        return Err(parse_error(
            path,
            "Element symbols are required at line 6 (VASP 5 format)",
        ));
    }
    let counts: Vec<usize> = lines[6]
        .split_whitespace()
        .map(|s| s.parse())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| parse_error(path, "Invalid atom counts at line 7"))?;
    if counts.len() != elements.len() {
        return Err(parse_error(
            path,
            format!(
                "{} element symbols but {} atom counts",
                elements.len(),
                counts.len()
            ),
        ));
    }
    let total: usize = counts.iter().sum();

    // Check for "Selective dynamics" line
    let mut coord_line = 7;
    let selective = lines[coord_line].trim().to_lowercase().starts_with('s');
    if selective {
        coord_line += 1;
    }

    if lines.len() <= coord_line {
        return Err(parse_error(path, "Missing coordinate type line"));
    }
    let coord_type = lines[coord_line].trim().to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    let first = coord_line + 1;
    if lines.len() < first + total {
        return Err(parse_error(
            path,
            format!("Expected {} atom positions", total),
        ));
    }

    let species = elements
        .iter()
        .zip(counts.iter())
        .flat_map(|(el, &n)| std::iter::repeat(el.clone()).take(n));

    let mut atoms = Vec::with_capacity(total);
    for (offset, element) in species.enumerate() {
        let line = lines[first + offset];
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let parts: Vec<f64> = tokens
            .iter()
            .take(3)
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(parse_error(
                path,
                format!("Invalid atom position at line {}", first + offset + 1),
            ));
        }

        let position = if is_cartesian {
            let frac = lattice.cart_to_frac(&Vector3::new(parts[0], parts[1], parts[2]))?;
            [frac[0], frac[1], frac[2]]
        } else {
            [parts[0], parts[1], parts[2]]
        };

        let mobile = !selective || tokens.iter().skip(3).any(|t| *t == "T");
        let atom = Atom::new(element, position);
        atoms.push(if mobile { atom } else { atom.fixed() });
    }

    Ok(PeriodicStructure::new(name, lattice, atoms, periodicity))
}

/// 头部：注释、缩放因子、晶格、元素与数目
pub fn header_string(structure: &PeriodicStructure, comment: &str) -> String {
    let mut result = String::new();

    result.push_str(&format!("{}\n", comment));
    result.push_str("1.00000000000000\n");

    for row in &structure.lattice.matrix {
        result.push_str(&format!(
            " {:>20.16}  {:>20.16}  {:>20.16}\n",
            row[0], row[1], row[2]
        ));
    }

    let species = structure.species_counts();
    let names: Vec<&str> = species.iter().map(|(el, _)| el.as_str()).collect();
    let counts: Vec<String> = species.iter().map(|(_, n)| n.to_string()).collect();
    result.push_str(&format!("{}\n", names.join("    ")));
    result.push_str(&format!("{}\n", counts.join("    ")));

    result
}

/// 笛卡尔坐标行；`flags` 为真时附加 T/F 标记
pub fn coordinate_string(structure: &PeriodicStructure, flags: bool) -> String {
    let mut result = String::new();
    for (atom, c) in structure.atoms.iter().zip(structure.cartesian_positions()) {
        result.push_str(&format!(" {:>20.16}  {:>20.16}  {:>20.16}", c[0], c[1], c[2]));
        if flags {
            result.push_str(if atom.mobile { "   T   T   T" } else { "   F   F   F" });
        }
        result.push('\n');
    }
    result
}

/// 将结构转换为 POSCAR 字符串（笛卡尔坐标，有固定原子时写 selective dynamics）
pub fn to_poscar_string(structure: &PeriodicStructure, comment: &str) -> String {
    let mut result = header_string(structure, comment);

    let selective = structure.atoms.iter().any(|a| !a.mobile);
    if selective {
        result.push_str("Selective dynamics\n");
    }
    result.push_str("Cartesian\n");
    result.push_str(&coordinate_string(structure, selective));

    result
}

/// 写 POSCAR 文件
pub fn write_poscar_file(path: &Path, structure: &PeriodicStructure, comment: &str) -> Result<()> {
    fs::write(path, to_poscar_string(structure, comment)).map_err(|e| {
        PhononError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        }
    })
}
