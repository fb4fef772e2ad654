//! # collect 命令实现
//!
//! 批量收集并扫描运行目录下的 CP2K 输出文件。
//!
//! ## 功能
//! - 按 glob 模式在目录树中定位输出文件
//! - rayon 并行扫描, 单个文件失败不影响整批
//! - tabled 汇总表与完整 CSV 导出
//!
//! ## 依赖关系
//! - 使用 `cli/collect.rs` 定义的参数
//! - 使用 `batch/`, `parsers/output.rs`
//! - 使用 `utils/output.rs`, `tabled`, `csv`

use crate::batch::{BatchRunner, FileCollector};
use crate::cli::collect::CollectArgs;
use crate::error::{CpkitError, Result};
use crate::models::RunReport;
use crate::parsers;
use crate::utils::output;

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

/// 执行 collect 命令
pub fn execute(args: CollectArgs) -> Result<()> {
    output::print_header("Collecting CP2K Runs");

    let files = FileCollector::new(args.run_dir.clone())
        .with_pattern(&args.pattern)
        .recursive(!args.no_recurse)
        .collect()?;

    if files.is_empty() {
        return Err(CpkitError::NoFilesFound {
            pattern: args.pattern.clone(),
        });
    }

    output::print_info(&format!("Scanning {} output files...", files.len()));

    let runner = BatchRunner::new(args.jobs);
    let outcome = runner.run(files, |path| parsers::output::parse_output_file(path));

    let n_ok = outcome.n_ok();
    let n_failed = outcome.n_failed();

    let mut rows = outcome.items;
    if args.sort_energy {
        rows.sort_by(|a, b| compare_energies(&a.1, &b.1));
    }

    // 汇总表
    let table_rows: Vec<RunRow> = rows
        .iter()
        .map(|(path, report)| RunRow {
            run: run_label(&args.run_dir, path),
            status: report.status.to_string(),
            energy: report
                .energy_au
                .map(|e| format!("{:.8}", e))
                .unwrap_or_else(|| "-".to_string()),
            steps: report.n_motion_steps().to_string(),
            warnings: report
                .n_warnings
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let table = Table::new(&table_rows);
    println!("{}", table);

    // 单个文件的失败不中止整批, 逐条报告
    for (path, reason) in &outcome.failures {
        output::print_warning(&format!("Failed to scan '{}': {}", path.display(), reason));
    }

    if let Some(ref csv_path) = args.csv {
        save_collect_csv(&rows, &args.run_dir, csv_path)?;
        output::print_success(&format!("Full report saved to '{}'", csv_path.display()));
    }

    output::print_separator();
    output::print_done(&format!("Scanned {} runs ({} failed)", n_ok, n_failed));

    Ok(())
}

/// 汇总表的一行
#[derive(Debug, Clone, Tabled)]
struct RunRow {
    #[tabled(rename = "Run")]
    run: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Energy (a.u.)")]
    energy: String,
    #[tabled(rename = "Steps")]
    steps: String,
    #[tabled(rename = "Warnings")]
    warnings: String,
}

/// 能量升序, 无能量的排最后
fn compare_energies(a: &RunReport, b: &RunReport) -> Ordering {
    match (a.energy_au, b.energy_au) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// 运行标签: 相对根目录的路径
fn run_label(root: &Path, file: &Path) -> String {
    file.strip_prefix(root)
        .unwrap_or(file)
        .display()
        .to_string()
}

/// 保存完整报告 CSV
fn save_collect_csv(rows: &[(PathBuf, RunReport)], root: &Path, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "run",
        "status",
        "run_type",
        "energy_au",
        "n_steps",
        "n_warnings",
        "walltime_exceeded",
        "version",
        "gap_spin1_au",
        "gap_spin2_au",
    ])?;

    for (file, report) in rows {
        wtr.write_record([
            run_label(root, file),
            report.status.to_string(),
            report.run_type.clone().unwrap_or_default(),
            report
                .energy_au
                .map(|e| format!("{:.10}", e))
                .unwrap_or_default(),
            report.n_motion_steps().to_string(),
            report.n_warnings.map(|n| n.to_string()).unwrap_or_default(),
            report.walltime_exceeded.to_string(),
            report.version.map(|v| v.to_string()).unwrap_or_default(),
            report
                .band_gaps
                .first()
                .map(|g| format!("{:.8}", g.gap_au))
                .unwrap_or_default(),
            report
                .band_gaps
                .get(1)
                .map(|g| format!("{:.8}", g.gap_au))
                .unwrap_or_default(),
        ])?;
    }

    wtr.flush().map_err(|e| CpkitError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}
