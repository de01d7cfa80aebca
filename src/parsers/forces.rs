//! # VASP 力文件解析器
//!
//! 从 `vasprun.xml` 或 `OUTCAR` 读取前 N 个原子的受力 (eV/Å)。
//!
//! - `vasprun.xml`：第一个 `<varray name="forces">` 之后的 N 行 `<v> fx fy fz </v>`
//! - `OUTCAR`：第一个 `TOTAL-FORCE` 标题，跳过分隔线，读取 N 行的第 4~6 列
//!
//! ## 依赖关系
//! - 被 `batch/runner.rs` 使用
//! - 使用 `phonon/force_constant.rs` 的 `ForceSet`

use crate::error::{PhononError, Result};
use crate::phonon::ForceSet;

use nalgebra::Vector3;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static VASPRUN_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<v>\s*([-+0-9.eEdD]+)\s+([-+0-9.eEdD]+)\s+([-+0-9.eEdD]+)\s*</v>")
        .expect("vasprun force row pattern")
});

/// 位置三列之后的三列受力
static OUTCAR_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\S+\s+\S+\s+\S+\s+([-+0-9.eE]+)\s+([-+0-9.eE]+)\s+([-+0-9.eE]+)")
        .expect("OUTCAR force row pattern")
});

/// 力文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceFormat {
    Vasprun,
    Outcar,
}

impl ForceFormat {
    /// 按文件名推断格式
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        if name.ends_with(".xml") || name.starts_with("vasprun") {
            Some(ForceFormat::Vasprun)
        } else if name.starts_with("outcar") {
            Some(ForceFormat::Outcar)
        } else {
            None
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ForceFormat::Vasprun => "vasprun.xml",
            ForceFormat::Outcar => "OUTCAR",
        }
    }

    fn row_pattern(&self) -> &'static Regex {
        match self {
            ForceFormat::Vasprun => &VASPRUN_ROW,
            ForceFormat::Outcar => &OUTCAR_ROW,
        }
    }
}

/// 解析力文件
pub fn parse_force_file(path: &Path, num_atoms: usize) -> Result<ForceSet> {
    let format = ForceFormat::detect(path).ok_or_else(|| PhononError::ParseError {
        format: "force".to_string(),
        path: path.display().to_string(),
        reason: "expected a vasprun.xml or OUTCAR file".to_string(),
    })?;

    let content = fs::read_to_string(path).map_err(|e| PhononError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_force_content(&content, format, num_atoms, &path.display().to_string())
}

/// 从字符串内容解析
pub fn parse_force_content(
    content: &str,
    format: ForceFormat,
    num_atoms: usize,
    path: &str,
) -> Result<ForceSet> {
    let parse_error = |reason: String| PhononError::ParseError {
        format: format.label().to_string(),
        path: path.to_string(),
        reason,
    };

    let lines: Vec<&str> = content.lines().collect();
    let (marker, skip) = match format {
        ForceFormat::Vasprun => ("forces", 1),
        ForceFormat::Outcar => ("TOTAL-FORCE", 2),
    };
    let start = lines
        .iter()
        .position(|line| line.contains(marker))
        .ok_or_else(|| parse_error(format!("no '{}' block", marker)))?
        + skip;

    let block = lines.get(start..start + num_atoms).ok_or_else(|| {
        PhononError::ForceAtomCount {
            path: path.to_string(),
            expected: num_atoms,
            found: lines.len().saturating_sub(start),
        }
    })?;

    let row = format.row_pattern();

    block
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let caps = row.captures(line).ok_or_else(|| PhononError::ForceAtomCount {
                path: path.to_string(),
                expected: num_atoms,
                found: i,
            })?;
            let mut force = Vector3::zeros();
            for k in 0..3 {
                force[k] = caps[k + 1]
                    .replace(['d', 'D'], "e")
                    .parse()
                    .map_err(|_| parse_error(format!("invalid force value on line {}", start + i + 1)))?;
            }
            Ok(force)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VASPRUN: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<modeling>
 <calculation>
  <varray name="forces" >
   <v>       0.01000000      -0.02000000       0.30000000 </v>
   <v>      -0.01000000       0.02000000      -0.30000000 </v>
   <v>       0.00000000       0.00000000       0.00000000 </v>
  </varray>
  <varray name="stress" >
   <v>       1.0 2.0 3.0 </v>
  </varray>
 </calculation>
</modeling>
"#;

    const OUTCAR: &str = r#" POSITION                                       TOTAL-FORCE (eV/Angst)
 -----------------------------------------------------------------------------------
      0.00000      0.00000      6.00000         0.123000     -0.045000      1.500000
      1.27500      1.27500      7.80000        -0.123000      0.045000     -1.500000
 -----------------------------------------------------------------------------------
    total drift:                                0.000000      0.000000      0.000000
"#;

    #[test]
    fn test_vasprun_forces() {
        let forces = parse_force_content(VASPRUN, ForceFormat::Vasprun, 3, "vasprun.xml").unwrap();
        assert_eq!(forces.len(), 3);
        assert!((forces[0][2] - 0.3).abs() < 1e-12);
        assert!((forces[1][1] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_outcar_forces() {
        let forces = parse_force_content(OUTCAR, ForceFormat::Outcar, 2, "OUTCAR").unwrap();
        assert!((forces[0][0] - 0.123).abs() < 1e-12);
        assert!((forces[1][2] + 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_rows_is_atom_count_error() {
        let err = parse_force_content(OUTCAR, ForceFormat::Outcar, 4, "OUTCAR").unwrap_err();
        assert!(matches!(err, PhononError::ForceAtomCount { expected: 4, .. }));
    }

    #[test]
    fn test_row_patterns_are_shared() {
        assert!(std::ptr::eq(
            ForceFormat::Vasprun.row_pattern(),
            ForceFormat::Vasprun.row_pattern()
        ));
        let fortran = "<varray name=\"forces\" >\n <v> 1.5D-01 -2.0d+00 0.0 </v>\n";
        for _ in 0..3 {
            let forces = parse_force_content(fortran, ForceFormat::Vasprun, 1, "vasprun.xml").unwrap();
            assert!((forces[0][0] - 0.15).abs() < 1e-12);
            assert!((forces[0][1] + 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            ForceFormat::detect(Path::new("disp-001/vasprun.xml")),
            Some(ForceFormat::Vasprun)
        );
        assert_eq!(
            ForceFormat::detect(Path::new("disp-001/OUTCAR")),
            Some(ForceFormat::Outcar)
        );
        assert_eq!(ForceFormat::detect(Path::new("POSCAR")), None);
    }
}
