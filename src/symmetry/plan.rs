//! # 位移方案
//!
//! 决定哪些可移动原子需要真正做有限差分（required），哪些可以由对称操作
//! 从伙伴原子旋转得到（covered），以及每个 required 原子的位移方向。
//!
//! ## 方向来源
//! - `Seed`: 参考方向 (1,0,1)/√2，需要计算
//! - `Rotated`: 种子在稳定子群下的像，由种子的力旋转得到，不需要计算
//! - `Fallback`: 轨道不足 3 个方向时补齐，需要计算
//!
//! 无对称性（或点群为 1）时退化为每个原子沿 x, y, z 三个方向各一对位移。
//!
//! ## 依赖关系
//! - 被 `symmetry/mod.rs`, `phonon/force_constant.rs`, `commands/pre.rs` 使用
//! - 使用 `symmetry/point_group.rs`

use crate::symmetry::catalog::PointGroup;
use crate::symmetry::point_group::SymmetryOperations;

use nalgebra::{DMatrix, Matrix3, Vector3};
use serde::Serialize;

/// 线性无关判据
const INDEPENDENCE_TOL: f64 = 1e-6;

/// 每个原子最多需要的独立方向数
const MAX_DIRECTIONS: usize = 3;

/// 参考方向 (1, 0, 1)/√2
pub fn seed_direction() -> Vector3<f64> {
    Vector3::new(1.0, 0.0, 1.0).normalize()
}

/// 补充方向候选，依次尝试
fn fallback_candidates() -> [Vector3<f64>; 5] {
    [
        Vector3::new(0.0, 1.0, 1.0).normalize(),
        Vector3::new(1.0, 1.0, 0.0).normalize(),
        Vector3::x(),
        Vector3::y(),
        Vector3::z(),
    ]
}

/// 位移方向的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DirectionSource {
    /// 参考方向本身，`operation` 为恒等操作序号
    Seed { operation: usize },
    /// 种子经 `operation` 旋转得到
    Rotated { operation: usize },
    Fallback,
}

/// 一个笛卡尔单位位移方向
#[derive(Debug, Clone, Serialize)]
pub struct Direction {
    pub vector: [f64; 3],
    pub source: DirectionSource,
}

impl Direction {
    fn new(vector: Vector3<f64>, source: DirectionSource) -> Self {
        Direction {
            vector: [vector[0], vector[1], vector[2]],
            source,
        }
    }

    pub fn vector(&self) -> Vector3<f64> {
        Vector3::from(self.vector)
    }

    /// 是否需要单独的力计算
    pub fn is_sampled(&self) -> bool {
        !matches!(self.source, DirectionSource::Rotated { .. })
    }
}

/// 需要计算的原子
#[derive(Debug, Clone, Serialize)]
pub struct RequiredAtom {
    /// 可移动原子序号
    pub atom: usize,
    /// 稳定子群（操作序号）
    pub stabilizer: Vec<usize>,
    /// 3 个线性无关方向：轨道方向在前，补充方向在后
    pub directions: Vec<Direction>,
}

impl RequiredAtom {
    pub fn sampled(&self) -> impl Iterator<Item = &Direction> {
        self.directions.iter().filter(|d| d.is_sampled())
    }

    /// 列为位移方向的 3x3 矩阵
    pub fn to_displacement(&self) -> Matrix3<f64> {
        let columns: Vec<Vector3<f64>> = self.directions.iter().map(|d| d.vector()).collect();
        Matrix3::from_columns(&columns)
    }
}

/// 由对称操作重建的原子
#[derive(Debug, Clone, Serialize)]
pub struct CoveredAtom {
    /// 可移动原子序号
    pub atom: usize,
    /// 伙伴（required）原子的可移动序号
    pub partner: usize,
    /// 把 `atom` 映射到 `partner` 的操作序号
    pub operation: usize,
}

/// 一次有限差分采样（对应一对正反位移）
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Sample {
    pub atom: usize,
    pub direction: [f64; 3],
    pub source: DirectionSource,
}

/// 位移方案
#[derive(Debug, Clone, Serialize)]
pub struct DisplacementPlan {
    pub required: Vec<RequiredAtom>,
    pub covered: Vec<CoveredAtom>,
}

impl DisplacementPlan {
    /// 无对称性：每个可移动原子沿 x, y, z 三个方向
    pub fn trivial(num_mobile: usize) -> Self {
        let axes = [Vector3::x(), Vector3::y(), Vector3::z()];
        let required = (0..num_mobile)
            .map(|atom| RequiredAtom {
                atom,
                stabilizer: Vec::new(),
                directions: axes
                    .iter()
                    .map(|v| Direction::new(*v, DirectionSource::Fallback))
                    .collect(),
            })
            .collect();
        DisplacementPlan {
            required,
            covered: Vec::new(),
        }
    }

    /// 需要的正反位移对数
    pub fn sample_count(&self) -> usize {
        self.required.iter().map(|r| r.sampled().count()).sum()
    }

    /// 需要的力文件数（每对正反各一个）
    pub fn file_count(&self) -> usize {
        2 * self.sample_count()
    }

    /// 按计算顺序展开的采样列表
    pub fn samples(&self) -> Vec<Sample> {
        self.required
            .iter()
            .flat_map(|r| {
                r.sampled().map(move |d| Sample {
                    atom: r.atom,
                    direction: d.vector,
                    source: d.source,
                })
            })
            .collect()
    }

    pub fn is_trivial(&self) -> bool {
        self.covered.is_empty()
            && self
                .required
                .iter()
                .all(|r| r.directions.iter().all(|d| d.source == DirectionSource::Fallback))
    }
}

/// 由点群操作生成位移方案
pub fn plan_displacements(operations: &SymmetryOperations, num_mobile: usize) -> DisplacementPlan {
    if operations.point_group == PointGroup::P1 {
        return DisplacementPlan::trivial(num_mobile);
    }

    let (required_atoms, covered) = partition(operations, num_mobile);

    let required = required_atoms
        .into_iter()
        .map(|atom| {
            let stabilizer: Vec<usize> = (0..operations.len())
                .filter(|&op| operations.image_of(op, atom) == atom)
                .collect();
            let mut directions = orbit_directions(operations, &stabilizer);
            append_fallbacks(&mut directions);
            RequiredAtom {
                atom,
                stabilizer,
                directions,
            }
        })
        .collect();

    DisplacementPlan { required, covered }
}

/// 按升序贪心划分：能被已有 required 原子经某个操作覆盖的原子为 covered
fn partition(operations: &SymmetryOperations, num_mobile: usize) -> (Vec<usize>, Vec<CoveredAtom>) {
    let mut required: Vec<usize> = Vec::new();
    let mut covered = Vec::new();

    for atom in 0..num_mobile {
        let cover = (0..operations.len()).find_map(|op| {
            let partner = operations.image_of(op, atom);
            required.contains(&partner).then_some((op, partner))
        });
        match cover {
            Some((operation, partner)) => covered.push(CoveredAtom {
                atom,
                partner,
                operation,
            }),
            None => required.push(atom),
        }
    }
    (required, covered)
}

/// 种子方向在稳定子群各循环子群下的轨道，保留两两无关的前 3 个
fn orbit_directions(operations: &SymmetryOperations, stabilizer: &[usize]) -> Vec<Direction> {
    let seed = seed_direction();
    let identity = Matrix3::identity();

    let mut candidates: Vec<(usize, Vector3<f64>)> = Vec::new();
    for &op in stabilizer {
        let generator = operations.operations[op].rotation;
        let mut power = identity;
        for _ in 0..operations.len() {
            if let Some(index) = operations.find(&power) {
                candidates.push((index, operations.cartesian(index) * seed));
            }
            power *= generator;
            if (power - identity).amax() < 1e-6 {
                break;
            }
        }
    }

    let Some(&(first_op, first)) = candidates.first() else {
        return Vec::new();
    };
    let mut kept = vec![Direction::new(first, DirectionSource::Seed { operation: first_op })];

    for i in 1..candidates.len() {
        let (op, v) = candidates[i];
        let independent = candidates[..i]
            .iter()
            .all(|(_, u)| pairwise_independent(&v, u));
        if independent {
            if kept.len() < MAX_DIRECTIONS {
                kept.push(Direction::new(v, DirectionSource::Rotated { operation: op }));
            } else {
                break;
            }
        }
    }
    kept
}

/// Cauchy–Schwarz 判据：|a|²|b|² − (a·b)² ≥ tol
fn pairwise_independent(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
    let inner = a.dot(b);
    a.norm_squared() * b.norm_squared() - inner * inner >= INDEPENDENCE_TOL
}

/// 向量组的 Gram 行列式
fn gram_determinant(vectors: &[Vector3<f64>]) -> f64 {
    let n = vectors.len();
    DMatrix::from_fn(n, n, |i, j| vectors[i].dot(&vectors[j])).determinant()
}

fn append_fallbacks(directions: &mut Vec<Direction>) {
    let mut vectors: Vec<Vector3<f64>> = directions.iter().map(|d| d.vector()).collect();
    for candidate in fallback_candidates() {
        if vectors.len() >= MAX_DIRECTIONS {
            break;
        }
        vectors.push(candidate);
        if gram_determinant(&vectors) > INDEPENDENCE_TOL {
            directions.push(Direction::new(candidate, DirectionSource::Fallback));
        } else {
            vectors.pop();
        }
    }
}
