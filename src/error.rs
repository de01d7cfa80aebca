//! # 统一错误处理模块
//!
//! 定义 interphon 的所有错误类型，使用 `thiserror` 派生。
//!
//! 错误分为两类：
//! - 致命错误：参数不合法、k 点与周期性不符、力文件数目不匹配等，直接向上传播
//! - 可降级错误：`UnrecognizedPointGroup`，调用方关闭对称性后继续计算
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// interphon 统一错误类型
#[derive(Error, Debug)]
pub enum PhononError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Unknown element symbol '{0}' (no atomic weight available)")]
    UnknownElement(String),

    // ─────────────────────────────────────────────────────────────
    // 周期性 / 扩胞参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Periodicity must have exactly 3 components (0 or 1), got '{0}'")]
    InvalidPeriodicity(String),

    #[error("Enlargement must have exactly 3 positive integers, got '{0}'")]
    InvalidEnlargement(String),

    #[error("Enlargement along non-periodic axis {axis} must be 1, got {value}")]
    EnlargementAlongNonPeriodic { axis: usize, value: usize },

    #[error(
        "Super cell lattice is inconsistent with unit cell x enlargement along axis {axis}\n\
         expected {expected:?}, found {found:?}"
    )]
    EnlargementMismatch {
        axis: usize,
        expected: [f64; 3],
        found: [f64; 3],
    },

    #[error("Super cell holds {found} atoms, expected {expected} from the unit cell and enlargement")]
    SupercellAtomCount { expected: usize, found: usize },

    // ─────────────────────────────────────────────────────────────
    // 对称性
    // ─────────────────────────────────────────────────────────────
    #[error(
        "Cannot identify the 2D point group from operation counts \
         [m, 1, 2, 3, 4, 6] = {signature:?}"
    )]
    UnrecognizedPointGroup { signature: [usize; 6] },

    #[error("Point-group search supports exactly 2 periodic axes, structure has {0}")]
    SymmetryDimension(usize),

    #[error("Super cell is not invariant under operation #{operation}: no image for super atom {atom}")]
    SupercellBreaksSymmetry { operation: usize, atom: usize },

    // ─────────────────────────────────────────────────────────────
    // k 点错误
    // ─────────────────────────────────────────────────────────────
    #[error("K-point specification conflicts with periodicity along axis {axis}: {reason}")]
    KpointAxisMismatch { axis: usize, reason: String },

    #[error("Line-path k-points need pairs of end points, got {0} points")]
    OddLinePathEndpoints(usize),

    #[error("K-point {0:?} is not among the evaluated k-points")]
    KpointNotFound([f64; 3]),

    #[error("Tetrahedron integration needs an automatic (Gamma/Monkhorst-Pack) k-point grid")]
    TetrahedronNeedsGrid,

    // ─────────────────────────────────────────────────────────────
    // 输入一致性
    // ─────────────────────────────────────────────────────────────
    #[error("Expected {expected} force files ({pairs} forward/backward pairs), found {found}")]
    ForceCountMismatch {
        expected: usize,
        pairs: usize,
        found: usize,
    },

    #[error("Force file '{path}' holds {found} atoms, super cell has {expected}")]
    ForceAtomCount {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("Singular matrix encountered: {0}")]
    SingularMatrix(String),

    #[error("Eigen decomposition did not converge for k-point {0:?}")]
    EigenNotConverged([f64; 3]),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, PhononError>;

impl PhononError {
    /// 对称性相关、可降级为无对称计算的错误
    pub fn disables_symmetry(&self) -> bool {
        matches!(
            self,
            PhononError::UnrecognizedPointGroup { .. }
                | PhononError::SymmetryDimension(_)
                | PhononError::SupercellBreaksSymmetry { .. }
        )
    }
}
