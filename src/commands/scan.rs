//! # scan 命令实现
//!
//! 解析单个 CP2K 输出文件并展示 / 导出扫描报告。
//!
//! ## 功能
//! - 摘要: 状态、运行类型、末次能量、警告数等
//! - 可选的逐步指标表与 Mulliken 布居表
//! - 完整报告 JSON 导出
//! - 能带结构 CSV 导出与 PNG 绘图
//!
//! ## 依赖关系
//! - 使用 `cli/scan.rs` 定义的参数
//! - 使用 `parsers/output.rs`, `models/report.rs`
//! - 使用 `utils/output.rs`, `utils/progress.rs`, `tabled`, `csv`, `plotters`

use crate::cli::scan::ScanArgs;
use crate::error::{CpkitError, Result};
use crate::models::{BandStructure, RunReport, RunStatus};
use crate::parsers;
use crate::utils::{output, progress};

use colored::Colorize;
use std::fs;
use std::path::Path;
use tabled::{Table, Tabled};

/// 执行 scan 命令
pub fn execute(args: ScanArgs) -> Result<()> {
    output::print_header("Scanning CP2K Output");

    // MD 输出可达几十 MB
    let spinner = progress::create_spinner("Parsing");
    let parsed = parsers::output::parse_output_file(&args.output_file);
    spinner.finish_and_clear();
    let report = parsed?;

    print_summary(&args.output_file, &report);

    if args.steps {
        print_motion_table(&report);
    }

    if args.mulliken {
        print_mulliken_table(&report);
    }

    if let Some(ref path) = args.json {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).map_err(|e| CpkitError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;
        output::print_success(&format!("Report JSON saved to '{}'", path.display()));
    }

    if args.bands_csv.is_some() || args.bands_plot.is_some() {
        let bands = report
            .band_structure
            .as_ref()
            .ok_or_else(|| CpkitError::InvalidData {
                kind: "band structure".to_string(),
                reason: "output contains no band structure block".to_string(),
            })?;

        if let Some(ref path) = args.bands_csv {
            save_bands_csv(bands, path)?;
            output::print_success(&format!("Band structure CSV saved to '{}'", path.display()));
        }

        if let Some(ref path) = args.bands_plot {
            plot_bands(bands, path, args.width, args.height)?;
            output::print_success(&format!("Band structure plot saved to '{}'", path.display()));
        }
    }

    Ok(())
}

/// 打印扫描摘要
fn print_summary(path: &Path, report: &RunReport) {
    output::print_key_value("File", &path.display().to_string());

    let status_text = report.status.to_string();
    let status_colored = match report.status {
        RunStatus::Completed => status_text.green().bold().to_string(),
        RunStatus::Incomplete => status_text.yellow().bold().to_string(),
        RunStatus::Aborted | RunStatus::ScfNotConverged => status_text.red().bold().to_string(),
    };
    output::print_key_value("Status", &status_colored);

    if let Some(ref run_type) = report.run_type {
        output::print_key_value("Run type", run_type);
    }
    if let Some(version) = report.version {
        output::print_key_value("CP2K version", &format!("{}", version));
    }
    if let Some(unrestricted) = report.spin_unrestricted {
        let label = if unrestricted {
            "unrestricted (UKS)"
        } else {
            "restricted (RKS)"
        };
        output::print_key_value("Spin", label);
    }
    if let Some(energy) = report.energy_au {
        output::print_key_value("Final energy (a.u.)", &format!("{:.10}", energy));
    }
    if let Some(n) = report.n_warnings {
        output::print_key_value("Warnings", &n.to_string());
    }
    if report.walltime_exceeded {
        output::print_warning("Requested walltime was exceeded");
    }
    if !report.motion_steps.is_empty() {
        output::print_key_value("Motion steps", &report.n_motion_steps().to_string());
    }
    for (i, gap) in report.band_gaps.iter().enumerate() {
        output::print_key_value(
            &format!("Band gap spin {} (a.u.)", i + 1),
            &format!(
                "{:.8}  (HOMO {:.8}, LUMO {:.8})",
                gap.gap_au, gap.homo_au, gap.lumo_au
            ),
        );
    }
    if let Some(ref bands) = report.band_structure {
        output::print_key_value(
            "Band structure",
            &format!(
                "{} k-points, {} spin channel(s), {} labels",
                bands.n_kpoints(),
                bands.n_spins(),
                bands.labels.len()
            ),
        );
    }
}

/// 逐步指标表的一行
#[derive(Debug, Clone, Tabled)]
struct StepRow {
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "E (a.u.)")]
    energy: String,
    #[tabled(rename = "Max grad")]
    max_grad: String,
    #[tabled(rename = "RMS grad")]
    rms_grad: String,
    #[tabled(rename = "Max step")]
    max_step: String,
    #[tabled(rename = "RMS step")]
    rms_step: String,
    #[tabled(rename = "P (bar)")]
    pressure: String,
    #[tabled(rename = "V (Å³)")]
    volume: String,
    #[tabled(rename = "SCF")]
    scf: String,
}

/// 打印逐步优化 / MD 指标表
fn print_motion_table(report: &RunReport) {
    if report.motion_steps.is_empty() {
        output::print_warning("No per-step data in this output.");
        return;
    }

    let rows: Vec<StepRow> = report
        .motion_steps
        .iter()
        .map(|s| StepRow {
            step: s.step.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
            energy: fmt_opt(s.energy_au, 8),
            max_grad: fmt_opt(s.max_grad_au, 6),
            rms_grad: fmt_opt(s.rms_grad_au, 6),
            max_step: fmt_opt(s.max_step_au, 6),
            rms_step: fmt_opt(s.rms_step_au, 6),
            pressure: fmt_opt(s.pressure_bar, 2),
            volume: fmt_opt(s.cell_volume_angs3, 3),
            scf: match s.scf_converged {
                Some(true) => "yes".to_string(),
                Some(false) => "NO".to_string(),
                None => "-".to_string(),
            },
        })
        .collect();

    println!("{}", Table::new(&rows));
}

/// Mulliken 布居表的一行
#[derive(Debug, Clone, Tabled)]
struct MullikenRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Element")]
    element: String,
    #[tabled(rename = "Population")]
    population: String,
    #[tabled(rename = "Spin")]
    spin: String,
    #[tabled(rename = "Charge")]
    charge: String,
}

/// 打印 Mulliken 布居表
fn print_mulliken_table(report: &RunReport) {
    if report.mulliken.is_empty() {
        output::print_warning("No Mulliken population block in this output.");
        return;
    }

    let rows: Vec<MullikenRow> = report
        .mulliken
        .iter()
        .enumerate()
        .map(|(i, site)| MullikenRow {
            index: i + 1,
            element: site.element.clone(),
            population: format!("{:.6}", site.population),
            spin: fmt_opt(site.spin_moment, 6),
            charge: format!("{:.6}", site.charge),
        })
        .collect();

    println!("{}", Table::new(&rows));
}

/// 能带结构导出为长表 CSV: 每行一个 (k 点, 自旋, 能带) 条目
fn save_bands_csv(bands: &BandStructure, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(["kpoint", "kx", "ky", "kz", "label", "spin", "band", "energy_ev"])?;

    for (i_k, kpoint) in bands.kpoints.iter().enumerate() {
        let label = bands
            .labels
            .iter()
            .find(|(idx, _)| *idx == i_k)
            .map(|(_, l)| l.clone())
            .unwrap_or_default();
        for (i_spin, spin_bands) in bands.bands.iter().enumerate() {
            let energies = match spin_bands.get(i_k) {
                Some(e) => e,
                None => continue,
            };
            for (i_band, energy) in energies.iter().enumerate() {
                wtr.write_record([
                    i_k.to_string(),
                    format!("{:.8}", kpoint[0]),
                    format!("{:.8}", kpoint[1]),
                    format!("{:.8}", kpoint[2]),
                    label.clone(),
                    (i_spin + 1).to_string(),
                    (i_band + 1).to_string(),
                    format!("{:.8}", energy),
                ])?;
            }
        }
    }

    wtr.flush().map_err(|e| CpkitError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// 绘制能带结构图 (PNG)
fn plot_bands(bands: &BandStructure, path: &Path, width: u32, height: u32) -> Result<()> {
    use plotters::prelude::*;

    let n_k = bands.n_kpoints();
    if n_k == 0 {
        return Err(CpkitError::Other("No band data to plot".to_string()));
    }

    let all_energies = bands.bands.iter().flatten().flatten();
    let y_min = all_energies
        .clone()
        .fold(f64::INFINITY, |acc, &e| acc.min(e));
    let y_max = all_energies.fold(f64::NEG_INFINITY, |acc, &e| acc.max(e));
    let y_margin = ((y_max - y_min).abs() * 0.05).max(0.1);

    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| CpkitError::Other(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Band Structure", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(
            -0.5..(n_k as f64 - 0.5),
            (y_min - y_margin)..(y_max + y_margin),
        )
        .map_err(|e| CpkitError::Other(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc("k-point path")
        .y_desc("E (eV)")
        .draw()
        .map_err(|e| CpkitError::Other(e.to_string()))?;

    // 标出显式命名的特殊点
    for (idx, _label) in &bands.labels {
        chart
            .draw_series(LineSeries::new(
                vec![
                    (*idx as f64, y_min - y_margin),
                    (*idx as f64, y_max + y_margin),
                ],
                BLACK.mix(0.3),
            ))
            .map_err(|e| CpkitError::Other(e.to_string()))?;
    }

    // 每条能带一条折线, 自旋 1 红色, 自旋 2 蓝色
    for (i_spin, spin_bands) in bands.bands.iter().enumerate() {
        let color = if i_spin == 0 { RED } else { BLUE };
        let n_bands = spin_bands.iter().map(|b| b.len()).max().unwrap_or(0);

        for i_band in 0..n_bands {
            let series: Vec<(f64, f64)> = spin_bands
                .iter()
                .enumerate()
                .filter_map(|(i_k, energies)| energies.get(i_band).map(|e| (i_k as f64, *e)))
                .collect();
            chart
                .draw_series(LineSeries::new(series, color.stroke_width(1)))
                .map_err(|e| CpkitError::Other(e.to_string()))?;
        }
    }

    root.present()
        .map_err(|e| CpkitError::Other(e.to_string()))?;

    Ok(())
}

/// 可选浮点值的定宽格式化
fn fmt_opt(value: Option<f64>, digits: usize) -> String {
    value
        .map(|v| format!("{:.*}", digits, v))
        .unwrap_or_else(|| "-".to_string())
}
