//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `config.rs`, `parsers/`, `symmetry/`, `utils/`
//! - 子模块: pre, post

pub mod post;
pub mod pre;

use crate::cli::Commands;
use crate::error::Result;
use crate::models::PeriodicStructure;
use crate::symmetry::{self, DisplacementPlan, SymmetryReduction};
use crate::utils::output;

use tabled::{Table, Tabled};

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Pre(args) => pre::execute(args),
        Commands::Post(args) => post::execute(args),
    }
}

/// 对称性约化；可降级的错误打印警告后返回 None
pub(crate) fn symmetry_reduction(
    unit: &PeriodicStructure,
    supercell: &PeriodicStructure,
    use_symmetry: bool,
) -> Result<Option<SymmetryReduction>> {
    if !use_symmetry {
        output::print_info("Symmetry disabled, every mobile atom is displaced along x, y and z");
        return Ok(None);
    }

    match symmetry::reduce(unit, supercell) {
        Ok(reduction) => {
            output::print_setting("Point group", reduction.point_group().label());
            output::print_setting("Operations", reduction.operations.len());
            print_operation_table(&reduction);
            if reduction.plan.is_trivial() {
                output::print_info("No displacement saved by symmetry");
            }
            Ok(Some(reduction))
        }
        Err(e) if e.disables_symmetry() => {
            output::print_warning(&format!("{}", e));
            output::print_warning("Continuing without symmetry");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn print_operation_table(reduction: &SymmetryReduction) {
    #[derive(Tabled)]
    struct OperationRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Kind")]
        kind: &'static str,
        #[tabled(rename = "Candidate")]
        candidate: usize,
        #[tabled(rename = "W (in-plane)")]
        rotation: String,
        #[tabled(rename = "w (fractional)")]
        translation: String,
    }

    let rows: Vec<OperationRow> = reduction
        .operations
        .operations
        .iter()
        .enumerate()
        .map(|(index, op)| {
            let w = op.rotation_2d;
            OperationRow {
                index,
                kind: op.kind.symbol(),
                candidate: op.candidate,
                rotation: format!("[{} {}; {} {}]", w[0][0], w[0][1], w[1][0], w[1][1]),
                translation: format!(
                    "{:.4} {:.4} {:.4}",
                    op.translation[0], op.translation[1], op.translation[2]
                ),
            }
        })
        .collect();

    output::print_header(&format!("Point Group {}", reduction.point_group()));
    println!("{}", Table::new(&rows));
}

/// 约化结果中的位移方案，无对称性时为逐轴方案
pub(crate) fn plan_of(reduction: Option<&SymmetryReduction>, num_mobile: usize) -> DisplacementPlan {
    reduction
        .map(|r| r.plan.clone())
        .unwrap_or_else(|| DisplacementPlan::trivial(num_mobile))
}

/// 打印每个可移动原子的角色
pub(crate) fn print_plan_table(
    unit: &PeriodicStructure,
    plan: &DisplacementPlan,
    reduction: Option<&SymmetryReduction>,
) {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "Atom")]
        atom: usize,
        #[tabled(rename = "Element")]
        element: String,
        #[tabled(rename = "Role")]
        role: String,
        #[tabled(rename = "Sampled")]
        sampled: usize,
        #[tabled(rename = "Derived")]
        derived: usize,
    }

    let mobile = unit.mobile_indices();
    let mut rows: Vec<PlanRow> = Vec::with_capacity(mobile.len());

    for required in &plan.required {
        let sampled = required.sampled().count();
        rows.push(PlanRow {
            atom: mobile[required.atom],
            element: unit.atoms[mobile[required.atom]].element.clone(),
            role: "required".to_string(),
            sampled,
            derived: required.directions.len() - sampled,
        });
    }
    for covered in &plan.covered {
        let symbol = reduction
            .map(|r| r.operations.operations[covered.operation].kind.symbol())
            .unwrap_or("?");
        rows.push(PlanRow {
            atom: mobile[covered.atom],
            element: unit.atoms[mobile[covered.atom]].element.clone(),
            role: format!("from atom {} by #{} ({})", mobile[covered.partner], covered.operation, symbol),
            sampled: 0,
            derived: 3,
        });
    }
    rows.sort_by_key(|r| r.atom);

    output::print_header("Displacement Plan");
    println!("{}", Table::new(&rows));
}
