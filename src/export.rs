//! # 结果导出
//!
//! 纯文本表格，数值列宽 16、保留 9 位小数。
//!
//! ## 支持格式
//! - `total_dos.dat` / `projected_dos.dat`
//! - `band.dat` / `projected_band.dat`
//! - `thermal_properties.dat`
//! - `frequency_at_gamma_point.dat`（0D 体系）
//! - `displacements.csv`：位移超胞记录（csv + serde）
//!
//! ## 依赖关系
//! - 被 `commands/pre.rs`, `commands/post.rs` 调用
//! - 使用 `dos/`, `analysis/` 的结果结构

use crate::analysis::{BandStructure, ThermalProperties};
use crate::dos::DensityOfStates;
use crate::error::{PhononError, Result};

use serde::Serialize;
use std::fs;
use std::path::Path;

fn write_text(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| PhononError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

fn column(value: f64) -> String {
    format!(" {:16.9} ", value)
}

/// 总态密度
pub fn write_total_dos(dos: &DensityOfStates, path: &Path) -> Result<()> {
    let mut out = format!("Total phonon DOS by {}\n", dos.method.describe());
    out.push_str("    Frequency (THz)    Total_Density_of_State\n");
    for (f, g) in dos.frequencies.iter().zip(dos.tdos.iter()) {
        out.push_str(&column(*f));
        out.push_str(&column(*g));
        out.push('\n');
    }
    write_text(path, &out)
}

/// 分自由度投影态密度；`xyz_true` 为每个自由度所属的原子下标
pub fn write_projected_dos(dos: &DensityOfStates, xyz_true: &[usize], path: &Path) -> Result<()> {
    let mut out = format!("Projected phonon DOS by {}\n", dos.method.describe());
    out.push_str("    Frequency (THz)");
    for atom in xyz_true {
        out.push_str(&format!("   pdos-atom-{:0>3}  ", atom));
    }
    out.push('\n');

    for (x, f) in dos.frequencies.iter().enumerate() {
        out.push_str(&column(*f));
        for row in &dos.pdos {
            out.push_str(&column(row[x]));
        }
        out.push('\n');
    }
    write_text(path, &out)
}

/// 能带
pub fn write_band(band: &BandStructure, path: &Path) -> Result<()> {
    let mut out = String::from("Phonon Band\n    K_Points_Path    Frequency (THz)\n");
    for (x, frequencies) in band.path_length.iter().zip(band.frequencies.iter()) {
        out.push_str(&column(*x));
        for f in frequencies {
            out.push_str(&column(*f));
        }
        out.push('\n');
    }
    write_text(path, &out)
}

/// 能带在各可移动原子上的投影 |v|²（原子的 3 个自由度求和）
pub fn write_band_projection(band: &BandStructure, xyz_true: &[usize], path: &Path) -> Result<()> {
    let atoms: Vec<usize> = xyz_true.iter().step_by(3).copied().collect();

    let mut out = String::from("Projected Phonon Band\n    K_Points_Path    Band    Frequency (THz)");
    for atom in &atoms {
        out.push_str(&format!("   proj-atom-{:0>3}  ", atom));
    }
    out.push('\n');

    for (k, x) in band.path_length.iter().enumerate() {
        for (b, f) in band.frequencies[k].iter().enumerate() {
            out.push_str(&column(*x));
            out.push_str(&format!(" {:>5} ", b));
            out.push_str(&column(*f));
            for chunk in band.projections[k][b].chunks(3) {
                out.push_str(&column(chunk.iter().sum()));
            }
            out.push('\n');
        }
    }
    write_text(path, &out)
}

/// 热力学性质，熵与热容写为 meV/K/atom
pub fn write_thermal(thermal: &ThermalProperties, path: &Path) -> Result<()> {
    let mut out = String::from("Thermal Properties / atom\n");
    out.push_str(
        "    Temperature (K)    Free_energy (eV/atom)    Entropy (meV/K/atom)    Heat_capacity (meV/K/atom)\n",
    );
    for (i, t) in thermal.temperatures.iter().enumerate() {
        out.push_str(&format!(
            " {:20.9}  {:20.9}  {:20.9}  {:20.9} \n",
            t,
            thermal.free_energy[i],
            thermal.entropy[i] * 1000.0,
            thermal.heat_capacity[i] * 1000.0
        ));
    }
    write_text(path, &out)
}

/// 0D 体系的离散频率
pub fn write_gamma_frequencies(frequencies: &[f64], path: &Path) -> Result<()> {
    let mut out = String::from("Discrete frequency of non-periodic system\n    Frequency (THz)\n");
    for f in frequencies {
        out.push_str(&column(*f));
        out.push('\n');
    }
    write_text(path, &out)
}

/// 一个位移超胞的记录
#[derive(Debug, Clone, Serialize)]
pub struct DisplacementRecord {
    pub file: String,
    /// 原胞中的原子下标
    pub unit_atom: usize,
    /// 超胞中被移动的原子下标
    pub super_atom: usize,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    /// +1 为正向，-1 为反向
    pub sign: i8,
    pub source: String,
}

/// 导出 displacements.csv
pub fn write_displacements(records: &[DisplacementRecord], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush().map_err(|e| PhononError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dos::DosMethod;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("interphon_export_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_total_dos_layout() {
        let dos = DensityOfStates {
            frequencies: vec![0.0, 0.5],
            pdos: vec![vec![0.1, 0.2], vec![0.3, 0.4]],
            tdos: vec![0.4, 0.6],
            method: DosMethod::Gaussian { sigma: 0.1 },
        };
        let path = temp_path("total_dos.dat");
        write_total_dos(&dos, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Total phonon DOS by Gaussian Smearing with Sigma = 0.100000");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "      0.500000000       0.600000000 ");

        let pdos_path = temp_path("projected_dos.dat");
        write_projected_dos(&dos, &[1, 1], &pdos_path).unwrap();
        let text = fs::read_to_string(&pdos_path).unwrap();
        assert!(text.lines().nth(1).unwrap().contains("pdos-atom-001"));
        let _ = fs::remove_file(path);
        let _ = fs::remove_file(pdos_path);
    }

    #[test]
    fn test_band_projection_sums_atom_dofs() {
        let band = BandStructure {
            path_length: vec![0.0],
            high_symmetry: vec![0],
            frequencies: vec![vec![1.0, 2.0]],
            projections: vec![vec![
                vec![0.1, 0.2, 0.3, 0.4, 0.0, 0.0],
                vec![0.0, 0.0, 0.0, 0.2, 0.3, 0.5],
            ]],
        };
        let path = temp_path("projected_band.dat");
        write_band_projection(&band, &[0, 0, 0, 2, 2, 2], &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("proj-atom-000") && lines[1].contains("proj-atom-002"));
        let values: Vec<f64> = lines[2].split_whitespace().map(|t| t.parse().unwrap()).collect();
        assert_eq!(values.len(), 5);
        assert!((values[3] - 0.6).abs() < 1e-9);
        assert!((values[4] - 0.4).abs() < 1e-9);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_displacements_csv_header() {
        let records = vec![DisplacementRecord {
            file: "POSCAR-0001".to_string(),
            unit_atom: 0,
            super_atom: 0,
            dx: 0.02,
            dy: 0.0,
            dz: 0.0,
            sign: 1,
            source: "axis".to_string(),
        }];
        let path = temp_path("displacements.csv");
        write_displacements(&records, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("file,unit_atom,super_atom,dx,dy,dz,sign,source"));
        assert!(text.contains("POSCAR-0001,0,0,0.02,0.0,0.0,1,axis"));
        let _ = fs::remove_file(path);
    }
}
