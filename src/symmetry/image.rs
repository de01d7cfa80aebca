//! # 超胞像原子映射
//!
//! 对每个操作 W、每个原胞可移动原子 a，给出超胞可移动原子 s 在 W 下的像。
//! 以 a 的第 0 个复制为原点，把相对向量在原胞分数坐标中旋转后接到 a' = W(a)
//! 的第 0 个复制上，平移部分由 a' 的位置吸收。
//!
//! ## 依赖关系
//! - 被 `symmetry/mod.rs`, `phonon/force_constant.rs` 使用
//! - 使用 `symmetry/point_group.rs` 的操作与位置比较

use crate::error::{PhononError, Result};
use crate::models::PeriodicStructure;
use crate::symmetry::point_group::{same_site, SymmetryOperations};

use nalgebra::Vector3;

/// `maps[op][a][s]`：超胞可移动序号 -> 像的超胞可移动序号
#[derive(Debug, Clone)]
pub struct CellImageMap {
    maps: Vec<Vec<Vec<usize>>>,
}

impl CellImageMap {
    pub fn build(
        unit: &PeriodicStructure,
        supercell: &PeriodicStructure,
        operations: &SymmetryOperations,
    ) -> Result<Self> {
        let replicas = supercell.replicas();
        let unit_mobile = unit.mobile_indices();
        let super_mobile = supercell.mobile_indices();

        let unit_t = unit.lattice.to_matrix().transpose();
        let unit_inv = unit_t
            .try_inverse()
            .ok_or_else(|| PhononError::SingularMatrix("unit cell lattice".to_string()))?;
        let super_t = supercell.lattice.to_matrix().transpose();
        let super_inv = super_t
            .try_inverse()
            .ok_or_else(|| PhononError::SingularMatrix("super cell lattice".to_string()))?;

        let super_cart: Vec<Vector3<f64>> =
            super_mobile.iter().map(|&s| supercell.cartesian(s)).collect();
        let super_frac: Vec<Vector3<f64>> =
            super_mobile.iter().map(|&s| supercell.atoms[s].frac()).collect();

        let mut maps = Vec::with_capacity(operations.len());
        for (index, op) in operations.operations.iter().enumerate() {
            let mut per_atom = Vec::with_capacity(unit_mobile.len());

            for (a, &atom) in unit_mobile.iter().enumerate() {
                let image_atom = unit_mobile[op.atom_map[a]];
                let origin = supercell.cartesian(atom * replicas);
                let image_origin = supercell.cartesian(image_atom * replicas);

                let mut row = Vec::with_capacity(super_mobile.len());
                let mut taken = vec![false; super_mobile.len()];
                for (s, &satom) in super_mobile.iter().enumerate() {
                    let relative = unit_inv * (super_cart[s] - origin);
                    let target = image_origin + unit_t * (op.rotation * relative);
                    let target_frac = super_inv * target;

                    let element = &supercell.atoms[satom].element;
                    let image = (0..super_mobile.len())
                        .find(|&j| {
                            supercell.atoms[super_mobile[j]].element == *element
                                && same_site(&target_frac, &super_frac[j], &super_t)
                        })
                        .ok_or(PhononError::SupercellBreaksSymmetry {
                            operation: index,
                            atom: satom,
                        })?;
                    if taken[image] {
                        return Err(PhononError::SupercellBreaksSymmetry {
                            operation: index,
                            atom: satom,
                        });
                    }
                    taken[image] = true;
                    row.push(image);
                }
                per_atom.push(row);
            }
            maps.push(per_atom);
        }

        Ok(CellImageMap { maps })
    }

    /// 以原胞原子 `atom` 为原点时，操作 `operation` 下超胞原子 `s` 的像
    pub fn image(&self, operation: usize, atom: usize, s: usize) -> usize {
        self.maps[operation][atom][s]
    }

    pub fn row(&self, operation: usize, atom: usize) -> &[usize] {
        &self.maps[operation][atom]
    }
}
