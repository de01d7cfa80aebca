//! # pre 子命令 CLI 定义
//!
//! 结构相关参数 `CellArgs` 由 `pre` 与 `post` 共用。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs`, `cli/post.rs` 使用
//! - 由 `config.rs` 校验为 `PreSettings`

use clap::Args;
use std::path::PathBuf;

/// 原胞、位移与扩胞参数
#[derive(Args, Debug, Clone)]
pub struct CellArgs {
    /// Argument file with `key = value` lines
    #[arg(long = "args", env = "INTERPHON_ARGS")]
    pub args_file: Option<PathBuf>,

    /// Unit cell POSCAR (selective dynamics marks the mobile atoms)
    #[arg(short = 'c', long)]
    pub unitcell: Option<PathBuf>,

    /// Displacement length in Angstrom [default: 0.01]
    #[arg(long)]
    pub displacement: Option<f64>,

    /// Enlargement along the lattice vectors, e.g. "2 2 1" [default: "1 1 1"]
    #[arg(long)]
    pub enlargement: Option<String>,

    /// Periodic lattice directions, e.g. "1 1 0" [default: "1 1 0"]
    #[arg(long)]
    pub periodicity: Option<String>,

    /// Skip the point-group search and displace every mobile atom along x, y, z
    #[arg(long, default_value_t = false)]
    pub no_sym: bool,
}

/// pre 子命令参数
#[derive(Args, Debug)]
pub struct PreArgs {
    #[command(flatten)]
    pub cell: CellArgs,

    /// Directory for SUPERCELL, POSCAR-xxxx and displacements.csv
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}
