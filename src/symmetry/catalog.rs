//! # 二维点群候选操作与查找表
//!
//! - `CANDIDATES`: 40 个整数 2x2 候选旋转矩阵（分数坐标），顺序固定，
//!   后续“按操作列表顺序第一个匹配”依赖这个顺序
//! - `POINT_GROUP_TABLE`: 操作计数签名 -> 点群，只构建一次
//!
//! 签名顺序为 [m, 1, 2, 3, 4, 6]，由 2x2 块的 (trace, det) 区分。
//!
//! ## 依赖关系
//! - 被 `symmetry/point_group.rs` 使用
//! - 纯静态数据

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// 整数 2x2 旋转矩阵
pub type Rotation2 = [[i32; 2]; 2];

/// 候选操作（顺序与结果有关，不可随意调整）
pub const CANDIDATES: [Rotation2; 40] = [
    [[0, 1], [1, 0]],
    [[0, 1], [-1, 0]],
    [[0, -1], [1, 0]],
    [[0, -1], [-1, 0]],
    [[0, 1], [1, 1]],
    [[0, 1], [1, -1]],
    [[0, 1], [-1, 1]],
    [[0, -1], [1, 1]],
    [[0, -1], [-1, 1]],
    [[0, -1], [1, -1]],
    [[0, 1], [-1, -1]],
    [[0, -1], [-1, -1]],
    [[1, 0], [0, 1]],
    [[1, 0], [0, -1]],
    [[-1, 0], [0, 1]],
    [[-1, 0], [0, -1]],
    [[1, 0], [1, 1]],
    [[1, 0], [1, -1]],
    [[1, 0], [-1, 1]],
    [[-1, 0], [1, 1]],
    [[-1, 0], [-1, 1]],
    [[-1, 0], [1, -1]],
    [[1, 0], [-1, -1]],
    [[-1, 0], [-1, -1]],
    [[1, 1], [0, 1]],
    [[1, 1], [0, -1]],
    [[1, -1], [0, 1]],
    [[-1, 1], [0, 1]],
    [[-1, -1], [0, 1]],
    [[-1, 1], [0, -1]],
    [[1, -1], [0, -1]],
    [[-1, -1], [0, -1]],
    [[1, 1], [1, 0]],
    [[1, 1], [-1, 0]],
    [[1, -1], [1, 0]],
    [[-1, 1], [1, 0]],
    [[-1, -1], [1, 0]],
    [[-1, 1], [-1, 0]],
    [[1, -1], [-1, 0]],
    [[-1, -1], [-1, 0]],
];

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
    Mirror,
    Identity,
    TwoFold,
    ThreeFold,
    FourFold,
    SixFold,
}

impl OperationKind {
    /// 由 (trace, det) 判定操作类型
    pub fn classify(w: &Rotation2) -> Option<Self> {
        let trace = w[0][0] + w[1][1];
        let det = w[0][0] * w[1][1] - w[0][1] * w[1][0];
        match (trace, det) {
            (0, -1) => Some(OperationKind::Mirror),
            (2, 1) => Some(OperationKind::Identity),
            (-2, 1) => Some(OperationKind::TwoFold),
            (-1, 1) => Some(OperationKind::ThreeFold),
            (0, 1) => Some(OperationKind::FourFold),
            (1, 1) => Some(OperationKind::SixFold),
            _ => None,
        }
    }

    /// 在签名数组中的位置
    pub fn slot(&self) -> usize {
        match self {
            OperationKind::Mirror => 0,
            OperationKind::Identity => 1,
            OperationKind::TwoFold => 2,
            OperationKind::ThreeFold => 3,
            OperationKind::FourFold => 4,
            OperationKind::SixFold => 5,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            OperationKind::Mirror => "m",
            OperationKind::Identity => "1",
            OperationKind::TwoFold => "2",
            OperationKind::ThreeFold => "3",
            OperationKind::FourFold => "4",
            OperationKind::SixFold => "6",
        }
    }
}

/// 十二个二维点群
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PointGroup {
    P1,
    P2,
    M,
    P2mm,
    Cm,
    C2mm,
    P4,
    P4mm,
    P3,
    P3m,
    P6,
    P6mm,
}

impl PointGroup {
    pub const ALL: [PointGroup; 12] = [
        PointGroup::P1,
        PointGroup::P2,
        PointGroup::M,
        PointGroup::P2mm,
        PointGroup::Cm,
        PointGroup::C2mm,
        PointGroup::P4,
        PointGroup::P4mm,
        PointGroup::P3,
        PointGroup::P3m,
        PointGroup::P6,
        PointGroup::P6mm,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PointGroup::P1 => "1",
            PointGroup::P2 => "2",
            PointGroup::M => "m",
            PointGroup::P2mm => "2mm",
            PointGroup::Cm => "cm",
            PointGroup::C2mm => "c2mm",
            PointGroup::P4 => "4",
            PointGroup::P4mm => "4mm",
            PointGroup::P3 => "3",
            PointGroup::P3m => "3m",
            PointGroup::P6 => "6",
            PointGroup::P6mm => "6mm",
        }
    }

    /// 操作计数签名 [m, 1, 2, 3, 4, 6]
    pub fn signature(&self) -> [usize; 6] {
        match self {
            PointGroup::P1 => [0, 1, 0, 0, 0, 0],
            PointGroup::P2 => [0, 1, 1, 0, 0, 0],
            PointGroup::M => [1, 1, 0, 0, 0, 0],
            PointGroup::P2mm => [2, 1, 1, 0, 0, 0],
            PointGroup::Cm => [2, 2, 0, 0, 0, 0],
            PointGroup::C2mm => [4, 2, 2, 0, 0, 0],
            PointGroup::P4 => [0, 1, 1, 0, 2, 0],
            PointGroup::P4mm => [4, 1, 1, 0, 2, 0],
            PointGroup::P3 => [0, 1, 0, 2, 0, 0],
            PointGroup::P3m => [3, 1, 0, 2, 0, 0],
            PointGroup::P6 => [0, 1, 1, 2, 0, 2],
            PointGroup::P6mm => [6, 1, 1, 2, 0, 2],
        }
    }

    /// 按签名查表
    pub fn from_signature(signature: &[usize; 6]) -> Option<Self> {
        POINT_GROUP_TABLE.get(signature).copied()
    }
}

impl fmt::Display for PointGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 签名 -> 点群
pub static POINT_GROUP_TABLE: LazyLock<HashMap<[usize; 6], PointGroup>> = LazyLock::new(|| {
    PointGroup::ALL
        .iter()
        .map(|pg| (pg.signature(), *pg))
        .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_basic_operations() {
        assert_eq!(
            OperationKind::classify(&[[1, 0], [0, 1]]),
            Some(OperationKind::Identity)
        );
        assert_eq!(
            OperationKind::classify(&[[0, -1], [1, 0]]),
            Some(OperationKind::FourFold)
        );
        assert_eq!(
            OperationKind::classify(&[[0, -1], [1, -1]]),
            Some(OperationKind::ThreeFold)
        );
        assert_eq!(
            OperationKind::classify(&[[0, 1], [1, 0]]),
            Some(OperationKind::Mirror)
        );
        // 黄金比例型剪切不是有限阶操作
        assert_eq!(OperationKind::classify(&[[0, 1], [1, 1]]), None);
    }

    #[test]
    fn test_identity_position() {
        let idx = CANDIDATES
            .iter()
            .position(|w| *w == [[1, 0], [0, 1]])
            .unwrap();
        assert_eq!(idx, 12);
    }

    #[test]
    fn test_signatures_are_unique() {
        assert_eq!(POINT_GROUP_TABLE.len(), 12);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(
            PointGroup::from_signature(&[4, 1, 1, 0, 2, 0]),
            Some(PointGroup::P4mm)
        );
        assert_eq!(PointGroup::from_signature(&[1, 1, 1, 0, 0, 0]), None);
    }
}
