//! # post 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 由 `config.rs` 校验为 `PostSettings`

use super::pre::CellArgs;
use clap::Args;
use std::path::PathBuf;

/// post 子命令参数
#[derive(Args, Debug)]
pub struct PostArgs {
    #[command(flatten)]
    pub cell: CellArgs,

    /// Super cell POSCAR written by `interphon pre`
    #[arg(long)]
    pub supercell: Option<PathBuf>,

    /// Force files, directories or glob patterns, in displacement order
    #[arg(short, long, num_args = 1..)]
    pub forces: Vec<String>,

    /// Comma-separated file names searched inside force directories [default: vasprun.xml]
    #[arg(long)]
    pub force_pattern: Option<String>,

    // ── DOS ──
    /// Compute the phonon density of states
    #[arg(long, default_value_t = false)]
    pub dos: bool,

    /// KPOINTS file for DOS and thermal properties
    #[arg(long)]
    pub kpoint_dos: Option<PathBuf>,

    /// Gaussian smearing width in THz, 0 selects tetrahedron integration [default: 0.1]
    #[arg(long)]
    pub sigma: Option<f64>,

    /// Number of DOS sampling points [default: 200]
    #[arg(long)]
    pub num_dos: Option<usize>,

    // ── 热力学 ──
    /// Compute free energy, entropy and heat capacity
    #[arg(long, default_value_t = false)]
    pub thermal: bool,

    /// Lowest temperature in K [default: 0]
    #[arg(long)]
    pub tmin: Option<f64>,

    /// Upper temperature bound in K, exclusive [default: 1000]
    #[arg(long)]
    pub tmax: Option<f64>,

    /// Temperature step in K [default: 10]
    #[arg(long)]
    pub tstep: Option<f64>,

    // ── 能带 ──
    /// Compute the phonon band along a line-mode KPOINTS path
    #[arg(long, default_value_t = false)]
    pub band: bool,

    /// KPOINTS file for the band path
    #[arg(long)]
    pub kpoint_band: Option<PathBuf>,

    /// High-symmetry point labels, e.g. "G X M G"
    #[arg(long)]
    pub kpoint_label_band: Option<String>,

    // ── 模式 ──
    /// Write vibration trajectories of selected modes
    #[arg(long, default_value_t = false)]
    pub mode: bool,

    /// Band indices of the modes, e.g. "0 1 2" [default: "0"]
    #[arg(long)]
    pub mode_index: Option<String>,

    /// Fractional k-point of the modes [default: "0 0 0"]
    #[arg(long)]
    pub mode_kpoint: Option<String>,

    // ── 输出 ──
    /// Draw DOS, band and thermal figures
    #[arg(long, default_value_t = false)]
    pub plot: bool,

    /// Write figures as SVG instead of PNG
    #[arg(long, default_value_t = false)]
    pub svg: bool,

    /// Frequency window of the figures in THz, e.g. "-1 12"
    #[arg(long)]
    pub energy_limit: Option<String>,

    /// Diagonalize with the Hermitian solver instead of the general one
    #[arg(long, default_value_t = false)]
    pub hermitian: bool,

    /// Parallel jobs for reading force files (0 = all CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}
