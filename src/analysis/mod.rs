//! # 声子谱分析
//!
//! ## 子模块
//! - `band`: 能带路径与投影权重
//! - `thermal`: 自由能、熵与热容
//! - `mode`: 本征模式振动轨迹
//!
//! ## 依赖关系
//! - 被 `commands/post.rs`, `export.rs`, `plot.rs` 使用
//! - 使用 `phonon/spectrum.rs`

pub mod band;
pub mod mode;
pub mod thermal;

pub use band::BandStructure;
pub use thermal::ThermalProperties;
