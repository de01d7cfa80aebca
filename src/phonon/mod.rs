//! # 声子计算核心
//!
//! 力常数组装、动力学矩阵、本征求解与 k 点网格。
//!
//! ## 依赖关系
//! - 被 `dos/`, `analysis/`, `commands/` 使用
//! - 使用 `models/`, `symmetry/`
//! - 子模块: force_constant, dynmat, eigen, spectrum, kpoints

pub mod dynmat;
pub mod eigen;
pub mod force_constant;
pub mod kpoints;
pub mod spectrum;

pub use dynmat::DynamicalMatrixBuilder;
pub use eigen::EigenSolver;
pub use force_constant::{assemble, ForceSet};
pub use kpoints::{BZGrid, GridScheme};
pub use spectrum::{evaluate, PhononSpectrum};
