//! # 批量处理模块
//!
//! 收集位移超胞的力文件，并行解析且保持顺序。
//!
//! ## 功能
//! - 输入可以是单文件、glob 模式或目录
//! - 结果按文件名排序，与 POSCAR-0001… 的顺序对应
//! - 并行解析，进度反馈
//!
//! ## 依赖关系
//! - 被 `commands/post.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::BatchRunner;
