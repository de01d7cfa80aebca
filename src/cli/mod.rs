//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `pre`: 生成超胞与位移超胞
//! - `post`: 由力文件计算声子（DOS、能带、热力学性质、模式）
//!
//! 两个子命令都接受 `--args <FILE>`（或环境变量 `INTERPHON_ARGS`）指定的参数文件，
//! 命令行中给出的值优先。
//!
//! ## 依赖关系
//! - 被 `main.rs`, `config.rs` 使用
//! - 子模块: pre, post

pub mod post;
pub mod pre;

use clap::{Parser, Subcommand};

/// interphon - 界面与表面声子计算
#[derive(Parser)]
#[command(name = "interphon")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(
    about = "Interfacial and surface phonon calculations from finite-difference DFT forces",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Pre-process: write the super cell and the displaced super cells
    Pre(pre::PreArgs),

    /// Post-process: build force constants and evaluate phonon properties
    Post(post::PostArgs),
}
