//! # post 命令实现
//!
//! ## 流程
//! 1. 读取原胞与超胞，校验扩胞关系
//! 2. 对称性约化（失败时降级为无对称方案）
//! 3. 收集并并行解析力文件，组装力常数
//! 4. 在 DOS 网格上求解声子谱：态密度、热力学性质
//! 5. 在能带路径上求解声子谱：能带、模式轨迹
//!
//! 0D 体系只在 Γ 点求解，离散频率写入 `frequency_at_gamma_point.dat`。
//!
//! ## 依赖关系
//! - 使用 `cli/post.rs` 定义的参数, `config.rs`
//! - 使用 `parsers/`, `symmetry/`, `phonon/`, `dos/`, `analysis/`
//! - 使用 `batch/`, `export.rs`, `plot.rs`, `utils/`

use super::{plan_of, print_plan_table, symmetry_reduction};
use crate::analysis::{mode, thermal, BandStructure};
use crate::batch::{BatchRunner, FileCollector};
use crate::cli::post::PostArgs;
use crate::config::{ArgumentFile, BandSettings, DosSettings, ModeSettings, PostSettings, ThermalSettings};
use crate::dos;
use crate::error::{PhononError, Result};
use crate::export;
use crate::models::{PeriodicStructure, Periodicity};
use crate::parsers::{parse_force_file, parse_kpoints_file, parse_poscar_file};
use crate::phonon::{assemble, evaluate, BZGrid, DynamicalMatrixBuilder, EigenSolver, PhononSpectrum};
use crate::plot::{self, PlotOptions};
use crate::utils::{output, progress};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tabled::{Table, Tabled};

/// 执行 post 命令
pub fn execute(args: PostArgs) -> Result<()> {
    let started = Instant::now();
    output::print_header("interphon post-process");

    let file = ArgumentFile::load_optional(args.cell.args_file.as_deref())?;
    if !file.is_empty() {
        output::print_info(&format!("{} entries read from the argument file", file.len()));
    }
    let settings = PostSettings::resolve(&args, &file)?;
    let cell = &settings.cell;

    output::print_setting("Unit cell", cell.unitcell.display());
    output::print_setting("Super cell", settings.supercell.display());
    output::print_setting("Displacement (Å)", cell.displacement);
    output::print_setting("Enlargement", cell.enlargement);
    output::print_setting("Periodicity", cell.periodicity);
    if settings.solver == EigenSolver::Hermitian {
        output::print_setting("Eigen solver", "Hermitian");
    }

    fs::create_dir_all(&settings.output_dir).map_err(|e| PhononError::FileWriteError {
        path: settings.output_dir.display().to_string(),
        source: e,
    })?;

    let unit = parse_poscar_file(&cell.unitcell, cell.periodicity)?;
    let supercell = unit.adopt_supercell(
        parse_poscar_file(&settings.supercell, cell.periodicity)?,
        cell.enlargement,
    )?;
    let num_mobile = unit.mobile_indices().len();
    if num_mobile == 0 {
        return Err(PhononError::InvalidArgument(format!(
            "no mobile atom in '{}'",
            cell.unitcell.display()
        )));
    }

    let reduction = symmetry_reduction(&unit, &supercell, cell.use_symmetry)?;
    let plan = plan_of(reduction.as_ref(), num_mobile);
    print_plan_table(&unit, &plan, reduction.as_ref());

    // ── 力常数 ──
    let files = FileCollector::new(settings.forces.clone())
        .with_pattern(&settings.force_pattern)
        .collect()?;
    if files.len() != plan.file_count() {
        return Err(PhononError::ForceCountMismatch {
            expected: plan.file_count(),
            pairs: plan.sample_count(),
            found: files.len(),
        });
    }
    let runner = BatchRunner::new(settings.jobs);
    output::print_info(&format!(
        "Found {} force files, reading with {} jobs",
        files.len(),
        runner.jobs()
    ));

    let num_super = supercell.num_atoms();
    let forces = runner.run(&files, "Reading forces", |path| {
        parse_force_file(path, num_super)
    })?;
    let force_constants = assemble(
        &forces,
        &plan,
        reduction.as_ref(),
        &supercell,
        cell.displacement,
    )?;
    output::print_success("Force constants assembled");

    let builder = DynamicalMatrixBuilder::new(&unit, &supercell, &force_constants)?;
    let out = settings.output_dir.as_path();

    // ── DOS 网格 ──
    let mut dos_spectrum = None;
    if let Some(dos_settings) = &settings.dos {
        let grid = load_grid(dos_settings.kpoints.as_deref(), &cell.periodicity)?;
        let spectrum = solve(&builder, &grid, settings.solver, "Phonon on DOS grid")?;

        if cell.periodicity.dimension() == 0 {
            report_gamma(&spectrum, out)?;
        }
        run_dos(&spectrum, &grid, &unit, dos_settings, settings.plot, out)?;
        if let Some(thermal_settings) = &settings.thermal {
            run_thermal(&spectrum, thermal_settings, settings.plot, out)?;
        }
        dos_spectrum = Some(spectrum);
    }

    // ── 能带路径 ──
    let mut band_spectrum = None;
    if let Some(band_settings) = &settings.band {
        let grid = parse_kpoints_file(&band_settings.kpoints, &cell.periodicity)?;
        let spectrum = solve(&builder, &grid, settings.solver, "Phonon on band path")?;
        run_band(&spectrum, &unit, band_settings, settings.plot, out)?;
        band_spectrum = Some(spectrum);
    }

    if let Some(mode_settings) = &settings.mode {
        let spectrum = mode_spectrum(
            [band_spectrum, dos_spectrum],
            &mode_settings.kpoint,
            &builder,
            settings.solver,
        )?;
        run_mode(&unit, &spectrum, mode_settings, out)?;
    }

    output::print_done("Post-process finished", started);
    Ok(())
}

/// 依次取第一个含该 k 点的已有谱，都不含时单独求解该点
fn mode_spectrum(
    candidates: [Option<PhononSpectrum>; 2],
    kpoint: &[f64; 3],
    builder: &DynamicalMatrixBuilder,
    solver: EigenSolver,
) -> Result<PhononSpectrum> {
    match candidates
        .into_iter()
        .flatten()
        .find(|s| s.find(kpoint).is_some())
    {
        Some(spectrum) => Ok(spectrum),
        None => evaluate(builder, &[*kpoint], solver, || {}),
    }
}

/// 0D 体系只用 Γ 点，其余读取 KPOINTS
fn load_grid(kpoints: Option<&Path>, periodicity: &Periodicity) -> Result<BZGrid> {
    if periodicity.dimension() == 0 {
        if kpoints.is_some() {
            output::print_info("Non-periodic system, the k-point file is ignored (Gamma only)");
        }
        return Ok(BZGrid::gamma_only());
    }
    let path = kpoints.ok_or_else(|| PhononError::MissingArgument("--kpoint-dos".to_string()))?;
    parse_kpoints_file(path, periodicity)
}

/// 逐 k 点求解并显示进度
fn solve(
    builder: &DynamicalMatrixBuilder,
    grid: &BZGrid,
    solver: EigenSolver,
    message: &str,
) -> Result<PhononSpectrum> {
    let pb = progress::create_progress_bar(grid.len() as u64, message);
    let spectrum = evaluate(builder, &grid.kpoints, solver, || pb.inc(1));
    pb.finish_and_clear();
    let spectrum = spectrum?;

    if let Some((lo, hi)) = spectrum.frequency_range() {
        output::print_frequency_summary(message, spectrum.len(), lo, hi);
    }
    Ok(spectrum)
}

fn figure_path(dir: &Path, stem: &str, options: &PlotOptions) -> PathBuf {
    dir.join(format!("{}.{}", stem, options.extension()))
}

fn report_gamma(spectrum: &PhononSpectrum, dir: &Path) -> Result<()> {
    #[derive(Tabled)]
    struct GammaRow {
        #[tabled(rename = "Band")]
        band: usize,
        #[tabled(rename = "Frequency (THz)")]
        frequency: String,
    }

    let Some(modes) = spectrum.modes.first() else {
        return Ok(());
    };
    let rows: Vec<GammaRow> = modes
        .frequencies
        .iter()
        .enumerate()
        .map(|(band, f)| GammaRow {
            band,
            frequency: format!("{:.6}", f),
        })
        .collect();
    output::print_header("Frequencies at Gamma");
    println!("{}", Table::new(&rows));

    let path = dir.join("frequency_at_gamma_point.dat");
    export::write_gamma_frequencies(&modes.frequencies, &path)?;
    output::print_written(&path);
    Ok(())
}

fn run_dos(
    spectrum: &PhononSpectrum,
    grid: &BZGrid,
    unit: &PeriodicStructure,
    settings: &DosSettings,
    plot_options: Option<PlotOptions>,
    dir: &Path,
) -> Result<()> {
    let density = dos::integrate(spectrum, grid, &unit.periodicity, settings.sigma, settings.num_dos)?;
    output::print_setting("DOS method", &density.method.describe());

    let total = dir.join("total_dos.dat");
    export::write_total_dos(&density, &total)?;
    output::print_written(&total);

    let projected = dir.join("projected_dos.dat");
    export::write_projected_dos(&density, &unit.xyz_true(), &projected)?;
    output::print_written(&projected);

    if let Some(options) = plot_options {
        let path = figure_path(dir, "dos", &options);
        plot::plot_dos(&density, &path, options)?;
        output::print_written(&path);
    }
    Ok(())
}

fn run_thermal(
    spectrum: &PhononSpectrum,
    settings: &ThermalSettings,
    plot_options: Option<PlotOptions>,
    dir: &Path,
) -> Result<()> {
    let temperatures = thermal::temperature_range(settings.tmin, settings.tmax, settings.tstep)?;
    let properties = thermal::compute(spectrum, &temperatures);
    if properties.skipped > 0 {
        output::print_warning(&format!(
            "{} non-positive frequencies skipped in thermal properties",
            properties.skipped
        ));
    }

    let path = dir.join("thermal_properties.dat");
    export::write_thermal(&properties, &path)?;
    output::print_written(&path);

    if let Some(options) = plot_options {
        let path = figure_path(dir, "thermal_properties", &options);
        plot::plot_thermal(&properties, &path, options)?;
        output::print_written(&path);
    }
    Ok(())
}

fn run_band(
    spectrum: &PhononSpectrum,
    unit: &PeriodicStructure,
    settings: &BandSettings,
    plot_options: Option<PlotOptions>,
    dir: &Path,
) -> Result<()> {
    let band = BandStructure::from_spectrum(spectrum);
    if !settings.labels.is_empty() && settings.labels.len() != band.high_symmetry.len() {
        output::print_warning(&format!(
            "{} k-point labels given for {} high-symmetry points",
            settings.labels.len(),
            band.high_symmetry.len()
        ));
    }

    let path = dir.join("band.dat");
    export::write_band(&band, &path)?;
    output::print_written(&path);

    let projected = dir.join("projected_band.dat");
    export::write_band_projection(&band, &unit.xyz_true(), &projected)?;
    output::print_written(&projected);

    if let Some(options) = plot_options {
        let path = figure_path(dir, "band", &options);
        plot::plot_band(&band, &settings.labels, &path, options)?;
        output::print_written(&path);
    }
    Ok(())
}

fn run_mode(
    unit: &PeriodicStructure,
    spectrum: &PhononSpectrum,
    settings: &ModeSettings,
    dir: &Path,
) -> Result<()> {
    for &band in &settings.bands {
        let content = mode::trajectory(unit, spectrum, band, &settings.kpoint)?;
        let path = dir.join(mode::trajectory_file_name(band, &settings.kpoint));
        fs::write(&path, content).map_err(|e| PhononError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;
        output::print_written(&path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Enlargement;
    use crate::parsers::write_poscar_file;
    use crate::phonon::force_constant::tests::synthetic_forces;
    use crate::phonon::spectrum::tests::square_model;
    use crate::phonon::GridScheme;
    use crate::symmetry::point_group::tests::square_ab;
    use crate::symmetry::DisplacementPlan;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: PostArgs,
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// 2 原子方格：原胞、超胞、合成力与两个 KPOINTS
    fn write_square_inputs(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
        fs::create_dir_all(dir).unwrap();

        let unit = square_ab();
        let sc = unit.build_supercell(Enlargement([2, 2, 1])).unwrap();
        write_poscar_file(&dir.join("POSCAR"), &unit, "square").unwrap();
        write_poscar_file(&dir.join("SUPERCELL"), &sc, "Supercell").unwrap();

        let plan = DisplacementPlan::trivial(2);
        for (i, set) in synthetic_forces(&unit, &sc, &plan, 0.01).iter().enumerate() {
            let mut xml = String::from("<modeling>\n  <varray name=\"forces\" >\n");
            for f in set {
                xml.push_str(&format!("   <v> {:.10} {:.10} {:.10} </v>\n", f[0], f[1], f[2]));
            }
            xml.push_str("  </varray>\n</modeling>\n");
            write(&dir.join(format!("forces/{:04}/vasprun.xml", i + 1)), &xml);
        }

        write(&dir.join("KPOINTS_dos"), "mesh\n0\nGamma\n4 4 1\n");
        write(
            &dir.join("KPOINTS_band"),
            "G-X\n5\nLine-mode\n0.0 0.0 0.0\n0.5 0.0 0.0\n\n0.5 0.0 0.0\n0.5 0.5 0.0\n",
        );
    }

    #[test]
    fn test_post_process_end_to_end() {
        let dir = std::env::temp_dir().join(format!("interphon_post_{}", std::process::id()));
        write_square_inputs(&dir);
        let out = dir.join("out");

        let p = |name: &str| dir.join(name).display().to_string();
        let argv = vec![
            "post".to_string(),
            "--unitcell".to_string(),
            p("POSCAR"),
            "--supercell".to_string(),
            p("SUPERCELL"),
            "--enlargement".to_string(),
            "2 2 1".to_string(),
            "--no-sym".to_string(),
            "--forces".to_string(),
            p("forces"),
            "--dos".to_string(),
            "--kpoint-dos".to_string(),
            p("KPOINTS_dos"),
            "--thermal".to_string(),
            "--tmax".to_string(),
            "300".to_string(),
            "--tstep".to_string(),
            "100".to_string(),
            "--band".to_string(),
            "--kpoint-band".to_string(),
            p("KPOINTS_band"),
            "--mode".to_string(),
            "--mode-kpoint".to_string(),
            "0.5 0.0 0.0".to_string(),
            "--jobs".to_string(),
            "2".to_string(),
            "--output-dir".to_string(),
            out.display().to_string(),
        ];
        execute(Harness::parse_from(argv).args).unwrap();

        let total = fs::read_to_string(out.join("total_dos.dat")).unwrap();
        assert_eq!(total.lines().count(), 2 + 200);
        let thermal = fs::read_to_string(out.join("thermal_properties.dat")).unwrap();
        assert_eq!(thermal.lines().count(), 2 + 3);
        let band = fs::read_to_string(out.join("band.dat")).unwrap();
        assert_eq!(band.lines().count(), 2 + 10);
        assert!(out.join("projected_dos.dat").exists());
        assert!(out.join("projected_band.dat").exists());
        assert!(out.join("XDATCAR_phonon_mode_0_0.500_0.000_0.000").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_mode_kpoint_off_band_path() {
        let dir = std::env::temp_dir().join(format!("interphon_post_mode_{}", std::process::id()));
        write_square_inputs(&dir);
        let out = dir.join("out");

        let p = |name: &str| dir.join(name).display().to_string();
        let argv = vec![
            "post".to_string(),
            "-c".to_string(),
            p("POSCAR"),
            "--supercell".to_string(),
            p("SUPERCELL"),
            "--enlargement".to_string(),
            "2 2 1".to_string(),
            "--no-sym".to_string(),
            "-f".to_string(),
            p("forces"),
            "--band".to_string(),
            "--kpoint-band".to_string(),
            p("KPOINTS_band"),
            "--mode".to_string(),
            "--mode-kpoint".to_string(),
            "0.25 0.1 0.0".to_string(),
            "-o".to_string(),
            out.display().to_string(),
        ];
        execute(Harness::parse_from(argv).args).unwrap();

        assert!(out.join("band.dat").exists());
        let trajectory = out.join("XDATCAR_phonon_mode_0_0.250_0.100_0.000");
        assert!(trajectory.exists());
        assert!(fs::read_to_string(trajectory).unwrap().contains("configuration=   30"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_mode_spectrum_prefers_first_containing_kpoint() {
        let (unit, sc, fc) = square_model();
        let builder = DynamicalMatrixBuilder::new(&unit, &sc, &fc).unwrap();
        let slab = Periodicity([true, true, false]);
        let path = BZGrid::line_path(&[[0.0; 3], [0.5, 0.0, 0.0]], 5, &slab).unwrap();
        let mesh = BZGrid::automatic(GridScheme::Gamma, [4, 4, 1], [0.0; 3], &slab).unwrap();
        let spectra = || {
            [
                Some(evaluate(&builder, &path.kpoints, EigenSolver::General, || {}).unwrap()),
                Some(evaluate(&builder, &mesh.kpoints, EigenSolver::General, || {}).unwrap()),
            ]
        };

        let on_path = mode_spectrum(spectra(), &[0.5, 0.0, 0.0], &builder, EigenSolver::General).unwrap();
        assert_eq!(on_path.len(), 5);

        let on_mesh = mode_spectrum(spectra(), &[0.25, 0.25, 0.0], &builder, EigenSolver::General).unwrap();
        assert_eq!(on_mesh.len(), 16);

        let single = mode_spectrum(spectra(), &[0.1, 0.3, 0.0], &builder, EigenSolver::General).unwrap();
        assert_eq!(single.len(), 1);
        assert!(single.find(&[0.1, 0.3, 0.0]).is_some());

        let none = mode_spectrum([None, None], &[0.0; 3], &builder, EigenSolver::General).unwrap();
        assert_eq!(none.len(), 1);
    }

    #[test]
    fn test_force_count_mismatch() {
        let dir = std::env::temp_dir().join(format!("interphon_post_count_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let unit = square_ab();
        let sc = unit.build_supercell(Enlargement([2, 2, 1])).unwrap();
        write_poscar_file(&dir.join("POSCAR"), &unit, "square").unwrap();
        write_poscar_file(&dir.join("SUPERCELL"), &sc, "Supercell").unwrap();
        write(&dir.join("forces/0001/vasprun.xml"), "<varray name=\"forces\" >\n");

        let p = |name: &str| dir.join(name).display().to_string();
        let argv = vec![
            "post".to_string(),
            "-c".to_string(),
            p("POSCAR"),
            "--supercell".to_string(),
            p("SUPERCELL"),
            "--enlargement".to_string(),
            "2 2 1".to_string(),
            "--no-sym".to_string(),
            "-f".to_string(),
            p("forces"),
            "--mode".to_string(),
            "-o".to_string(),
            dir.join("out").display().to_string(),
        ];
        let result = execute(Harness::parse_from(argv).args);
        assert!(matches!(
            result,
            Err(PhononError::ForceCountMismatch { expected: 12, found: 1, .. })
        ));

        let _ = fs::remove_dir_all(dir);
    }
}
