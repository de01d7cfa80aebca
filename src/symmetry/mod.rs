//! # 二维对称性约化
//!
//! 对两个周期方向的结构搜索平面点群，给出最少的位移方案，
//! 以及组装力常数时把计算结果旋转到等价原子所需的映射。
//!
//! ## 流程
//! 1. `point_group::discover`: 点群与原子置换
//! 2. `plan::plan_displacements`: required / covered 划分、稳定子群、位移方向
//! 3. `image::CellImageMap::build`: 超胞像原子映射
//!
//! 任何一步失败（点群无法识别、超胞破坏对称性、周期维数不为 2）都返回
//! `disables_symmetry()` 为真的错误，调用方改用无对称方案。
//!
//! ## 依赖关系
//! - 被 `commands/pre.rs`, `commands/post.rs`, `phonon/force_constant.rs` 使用
//! - 子模块: catalog, point_group, plan, image

pub mod catalog;
pub mod image;
pub mod plan;
pub mod point_group;

pub use catalog::PointGroup;
pub use image::CellImageMap;
pub use plan::DisplacementPlan;
pub use point_group::{discover, SymmetryOperations};

use crate::error::Result;
use crate::models::PeriodicStructure;

/// 对称性约化的全部结果
#[derive(Debug, Clone)]
pub struct SymmetryReduction {
    pub operations: SymmetryOperations,
    pub images: CellImageMap,
    pub plan: DisplacementPlan,
}

impl SymmetryReduction {
    pub fn point_group(&self) -> PointGroup {
        self.operations.point_group
    }
}

/// 原胞 + 超胞 -> 点群、位移方案与像原子映射
pub fn reduce(unit: &PeriodicStructure, supercell: &PeriodicStructure) -> Result<SymmetryReduction> {
    let operations = discover(unit)?;
    let images = CellImageMap::build(unit, supercell, &operations)?;
    let plan = plan::plan_displacements(&operations, unit.mobile_indices().len());

    Ok(SymmetryReduction {
        operations,
        images,
        plan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Enlargement, Periodicity};
    use crate::symmetry::point_group::tests::square_ab;

    #[test]
    fn test_square_two_atom_scenario() {
        let unit = square_ab();
        let sc = unit.build_supercell(Enlargement([2, 2, 1])).unwrap();

        let reduction = reduce(&unit, &sc).unwrap();
        assert_eq!(reduction.point_group(), PointGroup::P4mm);
        assert_eq!(reduction.plan.required.len(), 2);
        assert_eq!(reduction.plan.sample_count(), 2);

        assert_eq!(reduction.plan.file_count(), 4);

        let trivial = DisplacementPlan::trivial(2);
        assert_eq!(trivial.file_count(), 12);
    }

    #[test]
    fn test_bulk_disables_symmetry() {
        let mut unit = square_ab();
        unit.periodicity = Periodicity([true, true, true]);
        let sc = unit.build_supercell(Enlargement([2, 2, 1])).unwrap();
        let err = reduce(&unit, &sc).unwrap_err();
        assert!(err.disables_symmetry());
    }
}
