//! # interphon - 界面与表面声子计算
//!
//! 以有限位移法从 DFT 力计算低维（表面、界面、分子）体系的声子性质。
//!
//! ## 子命令
//! - `pre`  - 构造超胞，按二维点群约化后写出位移超胞
//! - `post` - 读取力文件，组装力常数并计算 DOS、能带、热力学性质与振动模式
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── config.rs   (参数文件与设置校验)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── parsers/   (POSCAR, KPOINTS, 力文件)
//!   │     ├── symmetry/  (点群与位移方案)
//!   │     ├── phonon/    (力常数、动力学矩阵、声子谱)
//!   │     ├── dos/       (布里渊区积分)
//!   │     ├── analysis/  (能带、热力学、模式)
//!   │     ├── export.rs, plot.rs
//!   │     └── batch/     (力文件收集与并行解析)
//!   ├── models/     (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod analysis;
mod batch;
mod cli;
mod commands;
mod config;
mod dos;
mod error;
mod export;
mod models;
mod parsers;
mod phonon;
mod plot;
mod symmetry;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
