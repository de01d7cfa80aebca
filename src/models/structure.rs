//! # 周期结构数据模型
//!
//! 单一的 `PeriodicStructure` 值类型同时表示原胞与超胞，二者只在扩胞信息上不同。
//!
//! ## 约定
//! - 晶格矩阵按行存放 a, b, c (Å)
//! - 原子位置统一存分数坐标
//! - 超胞中原胞第 `a` 个原子的第 `k` 个复制位于下标 `a * E + k`，
//!   其中 `E` 为各周期方向扩胞倍数之积
//! - 可移动原子来自 selective dynamics，超胞复制全部继承
//!
//! ## 依赖关系
//! - 被 `parsers/`, `symmetry/`, `phonon/` 等几乎所有模块使用
//! - 使用 `models/elements.rs` 计算质量

use crate::error::{PhononError, Result};
use crate::models::elements;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 晶格
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 行向量形式的 nalgebra 矩阵
    pub fn to_matrix(&self) -> Matrix3<f64> {
        let m = self.matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        )
    }

    /// 第 `i` 个晶格向量
    pub fn vector(&self, i: usize) -> Vector3<f64> {
        Vector3::from(self.matrix[i])
    }

    /// 晶格向量长度 |a|, |b|, |c|
    pub fn lengths(&self) -> [f64; 3] {
        [
            self.vector(0).norm(),
            self.vector(1).norm(),
            self.vector(2).norm(),
        ]
    }

    /// 晶胞体积（带符号）
    pub fn volume(&self) -> f64 {
        self.vector(0).dot(&self.vector(1).cross(&self.vector(2)))
    }

    /// 按各方向倍数放大
    pub fn scaled(&self, factors: [usize; 3]) -> Self {
        let mut matrix = self.matrix;
        for (row, &n) in matrix.iter_mut().zip(factors.iter()) {
            for x in row.iter_mut() {
                *x *= n as f64;
            }
        }
        Lattice { matrix }
    }

    /// 分数坐标转笛卡尔坐标
    pub fn frac_to_cart(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.to_matrix().transpose() * frac
    }

    /// 笛卡尔坐标转分数坐标
    pub fn cart_to_frac(&self, cart: &Vector3<f64>) -> Result<Vector3<f64>> {
        let inv = self
            .to_matrix()
            .transpose()
            .try_inverse()
            .ok_or_else(|| PhononError::SingularMatrix("lattice matrix".to_string()))?;
        Ok(inv * cart)
    }
}

// ─────────────────────────────────────────────────────────────
// 周期性与扩胞
// ─────────────────────────────────────────────────────────────

/// 各晶格方向是否周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Periodicity(pub [bool; 3]);

impl Periodicity {
    /// 解析 "1 1 0" / "T T F" 形式
    pub fn parse(input: &str) -> Result<Self> {
        let tokens: Vec<&str> = input
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .collect();
        if tokens.len() != 3 {
            return Err(PhononError::InvalidPeriodicity(input.to_string()));
        }

        let mut flags = [false; 3];
        for (flag, token) in flags.iter_mut().zip(tokens.iter()) {
            *flag = match token.to_lowercase().as_str() {
                "1" | "t" | "true" => true,
                "0" | "f" | "false" => false,
                _ => return Err(PhononError::InvalidPeriodicity(input.to_string())),
            };
        }
        Ok(Periodicity(flags))
    }

    /// 周期方向的下标（升序）
    pub fn periodic_axes(&self) -> Vec<usize> {
        (0..3).filter(|&i| self.0[i]).collect()
    }

    /// 非周期方向的下标
    pub fn open_axes(&self) -> Vec<usize> {
        (0..3).filter(|&i| !self.0[i]).collect()
    }

    /// 周期维数 (0-3)
    pub fn dimension(&self) -> usize {
        self.0.iter().filter(|&&p| p).count()
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: Vec<&str> = self.0.iter().map(|&p| if p { "1" } else { "0" }).collect();
        write!(f, "{}", s.join(" "))
    }
}

/// 各晶格方向的扩胞倍数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enlargement(pub [usize; 3]);

impl Enlargement {
    /// 原胞（不扩胞）
    pub const UNIT: Enlargement = Enlargement([1, 1, 1]);

    /// 解析 "2 2 1" 形式
    pub fn parse(input: &str) -> Result<Self> {
        let values: Vec<usize> = input
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<usize>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| PhononError::InvalidEnlargement(input.to_string()))?;

        if values.len() != 3 || values.iter().any(|&v| v == 0) {
            return Err(PhononError::InvalidEnlargement(input.to_string()));
        }
        Ok(Enlargement([values[0], values[1], values[2]]))
    }

    /// 检查非周期方向倍数为 1
    pub fn validate(&self, periodicity: &Periodicity) -> Result<()> {
        for axis in periodicity.open_axes() {
            if self.0[axis] != 1 {
                return Err(PhononError::EnlargementAlongNonPeriodic {
                    axis,
                    value: self.0[axis],
                });
            }
        }
        Ok(())
    }

    /// 每个原胞原子在超胞中的复制数 E
    pub fn replicas(&self, periodicity: &Periodicity) -> usize {
        periodicity
            .periodic_axes()
            .into_iter()
            .map(|axis| self.0[axis])
            .product()
    }
}

impl fmt::Display for Enlargement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.0[0], self.0[1], self.0[2])
    }
}

// ─────────────────────────────────────────────────────────────
// 原子与结构
// ─────────────────────────────────────────────────────────────

/// 原子信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],

    /// 是否允许移动（selective dynamics 中含 T）
    pub mobile: bool,
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
            mobile: true,
        }
    }

    pub fn fixed(mut self) -> Self {
        self.mobile = false;
        self
    }

    pub fn frac(&self) -> Vector3<f64> {
        Vector3::from(self.position)
    }
}

/// 周期结构（原胞或超胞）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicStructure {
    /// 结构名称（POSCAR 注释行）
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表
    pub atoms: Vec<Atom>,

    /// 周期性
    pub periodicity: Periodicity,

    /// 相对原胞的扩胞倍数，原胞为 [1, 1, 1]
    pub enlargement: Enlargement,
}

impl PeriodicStructure {
    pub fn new(
        name: impl Into<String>,
        lattice: Lattice,
        atoms: Vec<Atom>,
        periodicity: Periodicity,
    ) -> Self {
        PeriodicStructure {
            name: name.into(),
            lattice,
            atoms,
            periodicity,
            enlargement: Enlargement::UNIT,
        }
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// 第 `i` 个原子的笛卡尔坐标
    pub fn cartesian(&self, i: usize) -> Vector3<f64> {
        self.lattice.frac_to_cart(&self.atoms[i].frac())
    }

    /// 全部原子的笛卡尔坐标
    pub fn cartesian_positions(&self) -> Vec<Vector3<f64>> {
        (0..self.atoms.len()).map(|i| self.cartesian(i)).collect()
    }

    /// 可移动原子的下标（升序）
    pub fn mobile_indices(&self) -> Vec<usize> {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.mobile)
            .map(|(i, _)| i)
            .collect()
    }

    /// 每个可移动自由度对应的原子下标（每个原子重复 3 次）
    pub fn xyz_true(&self) -> Vec<usize> {
        self.mobile_indices()
            .into_iter()
            .flat_map(|i| [i, i, i])
            .collect()
    }

    /// 每个可移动自由度的质量 (kg)
    pub fn mobile_masses(&self) -> Result<Vec<f64>> {
        self.xyz_true()
            .into_iter()
            .map(|i| elements::atomic_mass_kg(&self.atoms[i].element))
            .collect()
    }

    /// 相对原胞的复制数 E
    pub fn replicas(&self) -> usize {
        self.enlargement.replicas(&self.periodicity)
    }

    /// 按元素首次出现的顺序统计（用于写 POSCAR）
    pub fn species_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for atom in &self.atoms {
            match counts.last_mut() {
                Some((el, n)) if *el == atom.element => *n += 1,
                _ => counts.push((atom.element.clone(), 1)),
            }
        }
        counts
    }

    /// 由原胞构造超胞
    pub fn build_supercell(&self, enlargement: Enlargement) -> Result<PeriodicStructure> {
        enlargement.validate(&self.periodicity)?;

        let n = enlargement.0;
        let lattice = self.lattice.scaled(n);

        let mut offsets = Vec::with_capacity(n[0] * n[1] * n[2]);
        for x in 0..n[0] {
            for y in 0..n[1] {
                for z in 0..n[2] {
                    offsets.push([
                        x as f64 / n[0] as f64,
                        y as f64 / n[1] as f64,
                        z as f64 / n[2] as f64,
                    ]);
                }
            }
        }

        let mut atoms = Vec::with_capacity(self.atoms.len() * offsets.len());
        for atom in &self.atoms {
            for offset in &offsets {
                let position = [
                    atom.position[0] / n[0] as f64 + offset[0],
                    atom.position[1] / n[1] as f64 + offset[1],
                    atom.position[2] / n[2] as f64 + offset[2],
                ];
                atoms.push(Atom {
                    element: atom.element.clone(),
                    position,
                    mobile: atom.mobile,
                });
            }
        }

        Ok(PeriodicStructure {
            name: format!("{} supercell", self.name),
            lattice,
            atoms,
            periodicity: self.periodicity,
            enlargement,
        })
    }

    /// 接受外部读入的超胞：校验晶格与原子数，可移动性按原胞继承
    pub fn adopt_supercell(
        &self,
        mut supercell: PeriodicStructure,
        enlargement: Enlargement,
    ) -> Result<PeriodicStructure> {
        enlargement.validate(&self.periodicity)?;

        let expected = self.lattice.scaled(enlargement.0);
        for axis in 0..3 {
            let diff = (expected.vector(axis) - supercell.lattice.vector(axis)).norm();
            if diff > 1e-4 {
                return Err(PhononError::EnlargementMismatch {
                    axis,
                    expected: expected.matrix[axis],
                    found: supercell.lattice.matrix[axis],
                });
            }
        }

        let replicas = enlargement.replicas(&self.periodicity);
        let expected_atoms = self.atoms.len() * replicas;
        if supercell.atoms.len() != expected_atoms {
            return Err(PhononError::SupercellAtomCount {
                expected: expected_atoms,
                found: supercell.atoms.len(),
            });
        }

        for (i, atom) in supercell.atoms.iter_mut().enumerate() {
            atom.mobile = self.atoms[i / replicas].mobile;
        }
        supercell.periodicity = self.periodicity;
        supercell.enlargement = enlargement;
        Ok(supercell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_cell() -> PeriodicStructure {
        let lattice =
            Lattice::from_vectors([[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 20.0]]);
        let atoms = vec![
            Atom::new("Cu", [0.0, 0.0, 0.3]),
            Atom::new("O", [0.5, 0.5, 0.35]),
            Atom::new("Cu", [0.0, 0.0, 0.2]).fixed(),
        ];
        PeriodicStructure::new("test", lattice, atoms, Periodicity([true, true, false]))
    }

    #[test]
    fn test_periodicity_parse() {
        let p = Periodicity::parse("1 1 0").unwrap();
        assert_eq!(p.periodic_axes(), vec![0, 1]);
        assert_eq!(p.dimension(), 2);
        assert!(Periodicity::parse("1 1").is_err());
        assert!(Periodicity::parse("1 1 2").is_err());
    }

    #[test]
    fn test_enlargement_parse_and_validate() {
        let p = Periodicity([true, true, false]);
        let e = Enlargement::parse("2 3 1").unwrap();
        assert!(e.validate(&p).is_ok());
        assert_eq!(e.replicas(&p), 6);

        let bad = Enlargement::parse("2 2 2").unwrap();
        assert!(matches!(
            bad.validate(&p),
            Err(PhononError::EnlargementAlongNonPeriodic { axis: 2, value: 2 })
        ));
        assert!(Enlargement::parse("2 2").is_err());
    }

    #[test]
    fn test_lattice_volume_and_conversion() {
        let cell = square_cell();
        assert!((cell.lattice.volume() - 180.0).abs() < 1e-9);

        let cart = cell.cartesian(1);
        assert!((cart - Vector3::new(1.5, 1.5, 7.0)).norm() < 1e-9);
        let back = cell.lattice.cart_to_frac(&cart).unwrap();
        assert!((back - Vector3::new(0.5, 0.5, 0.35)).norm() < 1e-12);
    }

    #[test]
    fn test_mobile_views() {
        let cell = square_cell();
        assert_eq!(cell.mobile_indices(), vec![0, 1]);
        assert_eq!(cell.xyz_true(), vec![0, 0, 0, 1, 1, 1]);
        let masses = cell.mobile_masses().unwrap();
        assert_eq!(masses.len(), 6);
        assert!(masses[0] > masses[3]);
    }

    #[test]
    fn test_build_supercell_layout() {
        let cell = square_cell();
        let sc = cell.build_supercell(Enlargement([2, 2, 1])).unwrap();

        assert_eq!(sc.num_atoms(), 12);
        assert_eq!(sc.replicas(), 4);
        assert!((sc.lattice.matrix[0][0] - 6.0).abs() < 1e-12);

        // 原子 1 的 4 个复制连续存放，且首个复制与原胞位置重合
        let c0 = cell.cartesian(1);
        let s0 = sc.cartesian(4);
        assert!((c0 - s0).norm() < 1e-12);
        // 第二个复制沿 y 平移一个原胞长度
        let s1 = sc.cartesian(5);
        assert!((s1 - s0 - Vector3::new(0.0, 3.0, 0.0)).norm() < 1e-12);

        // 固定原子的复制仍固定
        assert_eq!(sc.mobile_indices(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_adopt_supercell_checks_lattice() {
        let cell = square_cell();
        let sc = cell.build_supercell(Enlargement([2, 2, 1])).unwrap();

        assert!(cell
            .adopt_supercell(sc.clone(), Enlargement([2, 2, 1]))
            .is_ok());
        assert!(matches!(
            cell.adopt_supercell(sc, Enlargement([3, 2, 1])),
            Err(PhononError::EnlargementMismatch { axis: 0, .. })
        ));
    }

    #[test]
    fn test_species_counts() {
        let cell = square_cell();
        let counts = cell.species_counts();
        assert_eq!(
            counts,
            vec![
                ("Cu".to_string(), 1),
                ("O".to_string(), 1),
                ("Cu".to_string(), 1)
            ]
        );
    }
}
