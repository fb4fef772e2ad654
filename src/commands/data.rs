//! # data 命令实现
//!
//! 检视 GTH 赝势库与高斯基组库文件。
//!
//! ## 功能
//! - 容错批量解码 (坏记录逐条报告, 不中止扫描)
//! - 按元素 / 名称筛选记录
//! - JSON 导出与 CP2K 文本重编码
//!
//! ## 依赖关系
//! - 使用 `cli/data.rs` 定义的参数
//! - 使用 `parsers/pseudopotential.rs`, `parsers/basisset.rs`
//! - 使用 `utils/output.rs`, `tabled`

use crate::cli::data::{BasisArgs, DataArgs, DataCommands, DataSelectArgs, PotArgs};
use crate::error::{CpkitError, Result};
use crate::models::{BasisSet, GthPotential};
use crate::parsers::{basisset, pseudopotential, ScanFailure};
use crate::utils::output;

use serde::Serialize;
use std::fs;
use std::path::Path;
use tabled::{Table, Tabled};

/// 执行 data 命令
pub fn execute(args: DataArgs) -> Result<()> {
    match args.command {
        DataCommands::Pot(args) => execute_pot(args),
        DataCommands::Basis(args) => execute_basis(args),
    }
}

// ─────────────────────────────────────────────────────────────
// pot 子命令
// ─────────────────────────────────────────────────────────────

/// 赝势记录表的一行
#[derive(Debug, Clone, Tabled)]
struct PotRow {
    #[tabled(rename = "Element")]
    element: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Aliases")]
    aliases: String,
    #[tabled(rename = "q")]
    electrons: u64,
    #[tabled(rename = "Config")]
    config: String,
    #[tabled(rename = "XC")]
    xc: String,
}

fn execute_pot(args: PotArgs) -> Result<()> {
    output::print_header("GTH Potential Library");

    let scan = pseudopotential::parse_potential_file(&args.file)?;
    report_failures(&scan.failures);

    let selected: Vec<&GthPotential> = scan
        .records
        .iter()
        .filter(|pot| {
            matches_element(&args.select, &pot.element)
                && matches_name(&args.select, pot.names.iter().map(|s| s.as_str()))
        })
        .collect();

    output::print_info(&format!(
        "{} records decoded, {} selected",
        scan.records.len(),
        selected.len()
    ));

    if selected.is_empty() {
        output::print_warning("No records match the given filters.");
        return Ok(());
    }

    let rows: Vec<PotRow> = selected
        .iter()
        .map(|pot| PotRow {
            element: pot.element.clone(),
            name: pot.display_name().to_string(),
            aliases: pot.names.iter().skip(1).cloned().collect::<Vec<_>>().join(" "),
            electrons: pot.electron_count(),
            config: pot
                .n_elec
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            xc: pot.xc_functional.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", Table::new(&rows));

    export_selected(&args.select, &selected, |pot| {
        Ok(pseudopotential::to_potential_string(pot))
    })
}

// ─────────────────────────────────────────────────────────────
// basis 子命令
// ─────────────────────────────────────────────────────────────

/// 基组记录表的一行
#[derive(Debug, Clone, Tabled)]
struct BasisRow {
    #[tabled(rename = "Element")]
    element: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Orbitals")]
    orbitals: usize,
    #[tabled(rename = "Max l")]
    max_l: u32,
}

fn execute_basis(args: BasisArgs) -> Result<()> {
    output::print_header("Gaussian Basis Set Library");

    let scan = basisset::parse_basisset_file(&args.file)?;
    report_failures(&scan.failures);

    let selected: Vec<&BasisSet> = scan
        .records
        .iter()
        .filter(|basis| {
            matches_element(&args.select, &basis.element)
                && matches_name(
                    &args.select,
                    std::iter::once(basis.name.as_str())
                        .chain(basis.tags.iter().map(|s| s.as_str())),
                )
        })
        .collect();

    output::print_info(&format!(
        "{} records decoded, {} selected",
        scan.records.len(),
        selected.len()
    ));

    if selected.is_empty() {
        output::print_warning("No records match the given filters.");
        return Ok(());
    }

    let rows: Vec<BasisRow> = selected
        .iter()
        .map(|basis| BasisRow {
            element: basis.element.clone(),
            name: basis.name.clone(),
            orbitals: basis.n_orbitals(),
            max_l: basis.max_l(),
        })
        .collect();
    println!("{}", Table::new(&rows));

    export_selected(&args.select, &selected, |basis| {
        basisset::to_basisset_string(basis)
    })
}

// ─────────────────────────────────────────────────────────────
// 共用辅助
// ─────────────────────────────────────────────────────────────

/// 逐条报告坏记录, 不中止
fn report_failures(failures: &[ScanFailure]) {
    for failure in failures {
        output::print_warning(&format!(
            "Bad record starting at '{}': {}",
            failure.context, failure.error
        ));
    }
}

/// 元素筛选: 大小写不敏感的全等
fn matches_element(select: &DataSelectArgs, element: &str) -> bool {
    match &select.element {
        Some(wanted) => wanted.eq_ignore_ascii_case(element),
        None => true,
    }
}

/// 名称筛选: 任一名称 / 别名包含给定子串 (大小写不敏感)
fn matches_name<'a>(select: &DataSelectArgs, mut names: impl Iterator<Item = &'a str>) -> bool {
    match &select.name {
        Some(wanted) => {
            let wanted = wanted.to_uppercase();
            names.any(|name| name.to_uppercase().contains(&wanted))
        }
        None => true,
    }
}

/// 按参数导出选中记录 (JSON 和 / 或重编码文本)
fn export_selected<T, F>(select: &DataSelectArgs, selected: &[&T], encode: F) -> Result<()>
where
    T: Serialize,
    F: Fn(&T) -> Result<String>,
{
    if let Some(ref json_path) = select.json {
        let json = serde_json::to_string_pretty(selected)?;
        write_text(json_path, &json)?;
        output::print_success(&format!("Records JSON saved to '{}'", json_path.display()));
    }

    if let Some(ref encode_path) = select.encode {
        let mut chunks = Vec::with_capacity(selected.len());
        for &record in selected {
            chunks.push(encode(record)?);
        }
        write_text(encode_path, &chunks.join("\n"))?;
        output::print_success(&format!(
            "Re-encoded records saved to '{}'",
            encode_path.display()
        ));
    }

    Ok(())
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| CpkitError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
