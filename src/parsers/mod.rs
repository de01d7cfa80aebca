//! # 解析器模块
//!
//! VASP 格式的结构、力与 k 点文件读写。
//!
//! ## 依赖关系
//! - 被 `commands/`, `batch/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar, forces, kpoints

pub mod forces;
pub mod kpoints;
pub mod poscar;

pub use forces::parse_force_file;
pub use kpoints::parse_kpoints_file;
pub use poscar::{parse_poscar_file, write_poscar_file};
