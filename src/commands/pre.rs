//! # pre 命令实现
//!
//! ## 功能
//! - 读取原胞 POSCAR，按扩胞倍数构造超胞并写出 `SUPERCELL`
//! - 对称性约化得到位移方案
//! - 每个采样方向写一对位移超胞：奇数编号为正向，偶数编号为反向
//! - 写出 `displacements.csv`
//!
//! ## 依赖关系
//! - 使用 `cli/pre.rs` 定义的参数, `config.rs`
//! - 使用 `parsers/poscar.rs`, `symmetry/`, `export.rs`
//! - 使用 `utils/output.rs`

use super::{plan_of, print_plan_table, symmetry_reduction};
use crate::cli::pre::PreArgs;
use crate::config::{ArgumentFile, PreSettings};
use crate::error::{PhononError, Result};
use crate::export::{self, DisplacementRecord};
use crate::models::PeriodicStructure;
use crate::parsers::{parse_poscar_file, write_poscar_file};
use crate::symmetry::plan::{DirectionSource, DisplacementPlan};
use crate::utils::output;

use nalgebra::Vector3;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// 执行 pre 命令
pub fn execute(args: PreArgs) -> Result<()> {
    let started = Instant::now();
    output::print_header("interphon pre-process");

    let file = ArgumentFile::load_optional(args.cell.args_file.as_deref())?;
    if !file.is_empty() {
        output::print_info(&format!("{} entries read from the argument file", file.len()));
    }
    let settings = PreSettings::resolve(&args, &file)?;
    let cell = &settings.cell;

    output::print_setting("Unit cell", cell.unitcell.display());
    output::print_setting("Displacement (Å)", cell.displacement);
    output::print_setting("Enlargement", cell.enlargement);
    output::print_setting("Periodicity", cell.periodicity);

    let unit = parse_poscar_file(&cell.unitcell, cell.periodicity)?;
    let mobile = unit.mobile_indices();
    if mobile.is_empty() {
        return Err(PhononError::InvalidArgument(format!(
            "no mobile atom in '{}' (selective dynamics flags are all F)",
            cell.unitcell.display()
        )));
    }
    let [a, b, c] = unit.lattice.lengths();
    output::print_setting("Lattice (Å)", &format!("{:.4}  {:.4}  {:.4}", a, b, c));
    output::print_info(&format!(
        "{} atoms in the unit cell, {} mobile",
        unit.num_atoms(),
        mobile.len()
    ));

    let supercell = unit.build_supercell(cell.enlargement)?;

    fs::create_dir_all(&settings.output_dir).map_err(|e| PhononError::FileWriteError {
        path: settings.output_dir.display().to_string(),
        source: e,
    })?;

    let supercell_path = settings.output_dir.join("SUPERCELL");
    write_poscar_file(&supercell_path, &supercell, "Supercell")?;
    output::print_written(&supercell_path);

    let reduction = symmetry_reduction(&unit, &supercell, cell.use_symmetry)?;
    let plan = plan_of(reduction.as_ref(), mobile.len());
    print_plan_table(&unit, &plan, reduction.as_ref());

    let records = write_displaced_cells(
        &settings.output_dir,
        &unit,
        &supercell,
        &plan,
        cell.displacement,
    )?;

    let csv_path = settings.output_dir.join("displacements.csv");
    export::write_displacements(&records, &csv_path)?;
    output::print_written(&csv_path);

    output::print_done(&format!(
        "Wrote {} displaced super cells ({} forward/backward pairs)",
        records.len(),
        plan.sample_count()
    ), started);
    Ok(())
}

/// 按方案写出全部位移超胞
fn write_displaced_cells(
    dir: &Path,
    unit: &PeriodicStructure,
    supercell: &PeriodicStructure,
    plan: &DisplacementPlan,
    displacement: f64,
) -> Result<Vec<DisplacementRecord>> {
    let unit_mobile = unit.mobile_indices();
    let replicas = supercell.replicas();
    let mut records = Vec::with_capacity(plan.file_count());

    for sample in plan.samples() {
        let unit_atom = unit_mobile[sample.atom];
        let super_atom = unit_atom * replicas;
        let source = match sample.source {
            DirectionSource::Seed { .. } => "seed",
            DirectionSource::Rotated { .. } => "rotated",
            DirectionSource::Fallback => "fallback",
        };

        for sign in [1i8, -1i8] {
            let shift = Vector3::from(sample.direction) * (displacement * f64::from(sign));
            let displaced = displace(supercell, super_atom, &shift)?;

            let name = format!("POSCAR-{:04}", records.len() + 1);
            write_poscar_file(&dir.join(&name), &displaced, &name)?;
            records.push(DisplacementRecord {
                file: name,
                unit_atom,
                super_atom,
                dx: shift[0],
                dy: shift[1],
                dz: shift[2],
                sign,
                source: source.to_string(),
            });
        }
    }

    Ok(records)
}

/// 超胞副本中移动一个原子（笛卡尔位移）
fn displace(
    supercell: &PeriodicStructure,
    atom: usize,
    shift: &Vector3<f64>,
) -> Result<PeriodicStructure> {
    let mut displaced = supercell.clone();
    let moved = supercell.cartesian(atom) + shift;
    let frac = displaced.lattice.cart_to_frac(&moved)?;
    displaced.atoms[atom].position = [frac[0], frac[1], frac[2]];
    Ok(displaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Enlargement;
    use crate::parsers::poscar::parse_poscar_content;
    use crate::symmetry::point_group::tests::square_ab;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("interphon_pre_{}_{}", std::process::id(), name));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_trivial_plan_files() {
        let unit = square_ab();
        let sc = unit.build_supercell(Enlargement([2, 2, 1])).unwrap();
        let plan = DisplacementPlan::trivial(unit.mobile_indices().len());
        let dir = temp_dir("trivial");

        let records = write_displaced_cells(&dir, &unit, &sc, &plan, 0.01).unwrap();
        assert_eq!(records.len(), 12);
        assert_eq!(records[0].file, "POSCAR-0001");
        assert_eq!(records[0].sign, 1);
        assert_eq!(records[1].sign, -1);
        assert!((records[0].dx - 0.01).abs() < 1e-15);
        assert!((records[1].dx + 0.01).abs() < 1e-15);
        // 第二个原子的超胞下标为 1·E
        assert_eq!(records[6].super_atom, 4);

        let text = fs::read_to_string(dir.join("POSCAR-0001")).unwrap();
        let displaced = parse_poscar_content(&text, "POSCAR-0001", sc.periodicity).unwrap();
        let moved = displaced.cartesian(0) - sc.cartesian(0);
        assert!((moved - Vector3::new(0.01, 0.0, 0.0)).norm() < 1e-8);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_displace_leaves_source_cell() {
        let unit = square_ab();
        let sc = unit.build_supercell(Enlargement([2, 2, 1])).unwrap();
        let displaced = displace(&sc, 3, &Vector3::new(0.0, 0.0, -0.02)).unwrap();
        assert_eq!(sc.atoms[3].position, unit.build_supercell(Enlargement([2, 2, 1])).unwrap().atoms[3].position);
        assert!(((displaced.cartesian(3) - sc.cartesian(3)).z + 0.02).abs() < 1e-10);
    }
}
