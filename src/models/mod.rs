//! # 数据模型模块
//!
//! 定义周期结构（原胞 / 超胞）与元素数据。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `symmetry/`, `phonon/`, `commands/` 使用
//! - 子模块: structure, elements

pub mod elements;
pub mod structure;

pub use structure::{Atom, Enlargement, Lattice, PeriodicStructure, Periodicity};
