//! # CP2K 标准输出扫描器
//!
//! 对主输出做单次正向逐行扫描, 各触发行相互独立。提取总能量、
//! 警告数、运行类型与版本、自旋设定、逐步优化 / MD 指标、
//! Mulliken 布居、占据 / 空轨道本征值 (HOMO / LUMO / 带隙)
//! 以及能带结构 (窗口解析交给 `parsers/bands.rs`)。
//!
//! ## 格式说明
//! ```text
//!  CP2K| version string:                                       CP2K version 9.1
//!  GLOBAL| Run type                                                     GEO_OPT
//!  ENERGY| Total FORCE_EVAL ( QS ) energy [a.u.]:              -17.1646143300
//!  --------  Informations at step =     1 ------------
//!   Max. step size             =         0.0266732757
//!  ---------------------------------------------------
//! ```
//! 逐步指标边扫边累积: GEO_OPT / CELL_OPT 在 51 连字符分隔行落表,
//! MD 在下一个 `STEP NUMBER` 行落表, 文件尾再补一次。
//! ` ENERGY| ` 行取最后一次出现。缺少末尾警告行或
//! `PROGRAM ENDED AT` 标记的输出判为 incomplete; 出现 `ABORT`
//! 判为 aborted, 若同时有 `SCF run NOT converged` 则归为
//! scf-not-converged。
//!
//! ## 依赖关系
//! - 被 `commands/scan.rs`, `commands/collect.rs` 使用
//! - 使用 `parsers/bands.rs`, `models/report.rs`

use std::collections::BTreeMap;
use std::fs;
use std::mem;
use std::path::Path;

use crate::error::{CpkitError, Result};
use crate::models::{BandGapInfo, MotionStep, MullikenSite, RunKind, RunReport, RunStatus};
use crate::parsers::bands;

const BOHR_TO_ANGSTROM: f64 = 0.529177208590000;

/// 本征值块的收集窗口: (是否空轨道块, 自旋)
#[derive(Clone, Copy)]
enum EigenWindow {
    Occupied(u32),
    Unoccupied(u32),
}

/// 解析 CP2K 主输出文件
pub fn parse_output_file(path: &Path) -> Result<RunReport> {
    let content = fs::read_to_string(path).map_err(|e| CpkitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return Err(CpkitError::EmptyFile {
            path: path.display().to_string(),
        });
    }
    Ok(parse_output_content(&content))
}

/// 单遍扫描输出文本, 生成运行报告
pub fn parse_output_content(content: &str) -> RunReport {
    let lines: Vec<&str> = content.lines().collect();
    let mut report = RunReport::new();

    let mut current = MotionStep::default();
    let mut aborted = false;
    let mut scf_failed = false;
    let mut program_ended = false;

    let mut eigen: Option<EigenWindow> = None;
    let mut occupied_eigen: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    let mut unoccupied_eigen: BTreeMap<u32, Vec<f64>> = BTreeMap::new();

    let mut mulliken_active = false;
    let mut mulliken_rows: Vec<MullikenSite> = Vec::new();

    let dash_rule = "-".repeat(51);

    for (i_line, &line) in lines.iter().enumerate() {
        let trimmed = line.trim();

        // ─── 本征值收集窗口 ───
        if let Some(window) = eigen {
            let is_rule = !trimmed.is_empty() && trimmed.chars().all(|c| c == '-');
            let mid_block = matches!(window, EigenWindow::Unoccupied(_))
                && trimmed.contains("onvergence");
            if trimmed.is_empty() || is_rule || mid_block {
                continue;
            }
            let values: Option<Vec<f64>> = trimmed
                .split_whitespace()
                .map(|t| t.parse::<f64>().ok())
                .collect();
            match values {
                Some(values) if !values.is_empty() => {
                    let (bucket, spin) = match window {
                        EigenWindow::Occupied(s) => (&mut occupied_eigen, s),
                        EigenWindow::Unoccupied(s) => (&mut unoccupied_eigen, s),
                    };
                    if let Some(list) = bucket.get_mut(&spin) {
                        list.extend(values);
                    }
                    continue;
                }
                _ => eigen = None,
            }
        }

        // ─── Mulliken 布居块 ───
        if mulliken_active {
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('#') {
                if trimmed.contains("Total charge") {
                    report.mulliken = mem::take(&mut mulliken_rows);
                    mulliken_active = false;
                }
                continue;
            }
            if let Some(site) = parse_mulliken_row(trimmed) {
                mulliken_rows.push(site);
                continue;
            }
            mulliken_active = false;
        }

        // ─── 全局标志, 可与其他触发同行 ───
        if line.contains("ABORT") {
            aborted = true;
        }
        if line.contains("exceeded requested execution time") {
            report.walltime_exceeded = true;
        }
        if line.contains("PROGRAM ENDED AT") {
            program_ended = true;
        }

        // ─── 逐行触发 ───
        if line.starts_with(" ENERGY| ") {
            // 最后一次出现覆盖之前的
            if let Some(value) = last_f64(line) {
                report.energy_au = Some(value);
                current.energy_au = Some(value);
            }
        } else if line.starts_with(" CP2K| version string:") {
            report.version = line
                .split_whitespace()
                .rev()
                .find_map(|t| t.parse::<f64>().ok());
        } else if line.starts_with(" GLOBAL| Run type") {
            report.run_type = line.split_whitespace().last().map(|t| t.to_string());
        } else if line.starts_with(" MD| Ensemble") {
            // 运行类型带上系综后缀, 如 MD-NVT
            if let (Some(run_type), Some(ensemble)) =
                (report.run_type.as_mut(), line.split_whitespace().last())
            {
                run_type.push('-');
                run_type.push_str(ensemble);
            }
        } else if line.starts_with(" DFT| Spin") {
            report.spin_unrestricted = Some(line.contains("unrestricted"));
        } else if line.contains("The number of warnings for this run is") {
            report.n_warnings = line.split_whitespace().last().and_then(|t| t.parse().ok());
        } else if line.contains("SCF run NOT converged") {
            scf_failed = true;
            current.scf_converged = Some(false);
        } else if line.contains("SCF run converged") {
            current.scf_converged = Some(true);
        } else if line.contains("Electronic density on regular grids") {
            current.edens_rspace = last_f64(line);
        } else if line.contains("Dispersion energy") {
            current.dispersion_energy_au = last_f64(line);
        } else if line.contains("Informations at step") {
            current.step = first_after_equals(line).and_then(|t| t.parse().ok());
        } else if trimmed.starts_with("Total Energy") && line.contains('=') {
            current.energy_au = last_f64(line);
        } else if trimmed.starts_with("Max. step size") {
            current.max_step_au = last_f64(line);
        } else if trimmed.starts_with("RMS step size") {
            current.rms_step_au = last_f64(line);
        } else if trimmed.starts_with("Max. gradient") {
            current.max_grad_au = last_f64(line);
        } else if trimmed.starts_with("RMS gradient") {
            current.rms_grad_au = last_f64(line);
        } else if line.contains("STEP NUMBER") {
            // 新的 MD 步块开始, 先把上一步落表
            if report.run_kind() == RunKind::Md {
                flush_step(&mut report.motion_steps, &mut current);
            }
            current.step = first_after_equals(line).and_then(|t| t.parse().ok());
        } else if line.contains("POTENTIAL ENERGY[hartree]") {
            current.energy_au = first_after_equals(line).and_then(|t| t.parse().ok());
        } else if line.contains("PRESSURE [bar]") || line.contains("Pressure [bar]") {
            current.pressure_bar = first_after_equals(line).and_then(|t| t.parse().ok());
        } else if line.contains("VOLUME[bohr^3]") {
            current.cell_volume_angs3 = first_after_equals(line)
                .and_then(|t| t.parse::<f64>().ok())
                .map(|v| v * BOHR_TO_ANGSTROM.powi(3));
        } else if line.contains("CELL LNTHS[bohr]") {
            let lengths = values_after_equals(line);
            if lengths.len() >= 3 {
                current.cell_a_angs = Some(lengths[0] * BOHR_TO_ANGSTROM);
                current.cell_b_angs = Some(lengths[1] * BOHR_TO_ANGSTROM);
                current.cell_c_angs = Some(lengths[2] * BOHR_TO_ANGSTROM);
            }
        } else if line.contains("CELL ANGLS[deg]") {
            let angles = values_after_equals(line);
            if angles.len() >= 3 {
                current.cell_alpha_deg = Some(angles[0]);
                current.cell_beta_deg = Some(angles[1]);
                current.cell_gamma_deg = Some(angles[2]);
            }
        } else if line.starts_with(" CELL|") {
            if line.contains("Vector a") {
                current.cell_a_angs = last_f64(line);
            } else if line.contains("Vector b") {
                current.cell_b_angs = last_f64(line);
            } else if line.contains("Vector c") {
                current.cell_c_angs = last_f64(line);
            } else if line.contains("alpha") {
                current.cell_alpha_deg = last_f64(line);
            } else if line.contains("beta") {
                current.cell_beta_deg = last_f64(line);
            } else if line.contains("gamma") {
                current.cell_gamma_deg = last_f64(line);
            } else if line.contains("Volume") {
                current.cell_volume_angs3 = last_f64(line);
            }
        } else if line.contains("igenvalues of the unoccupied subspace spin") {
            if let Some(spin) = line.split_whitespace().last().and_then(|t| t.parse().ok()) {
                unoccupied_eigen.insert(spin, Vec::new());
                eigen = Some(EigenWindow::Unoccupied(spin));
            }
        } else if line.contains("igenvalues of the occupied subspace spin") {
            if let Some(spin) = line.split_whitespace().last().and_then(|t| t.parse().ok()) {
                occupied_eigen.insert(spin, Vec::new());
                eigen = Some(EigenWindow::Occupied(spin));
            }
        } else if line.contains("Mulliken Population Analysis") {
            mulliken_active = true;
            mulliken_rows.clear();
        } else if line.contains("KPOINTS| Band Structure Calculation") {
            report.band_structure = bands::parse_band_window(&lines[i_line..], report.version);
        } else if trimmed == dash_rule {
            // GEO_OPT / CELL_OPT 步块的收尾分隔行
            if matches!(report.run_kind(), RunKind::GeoOpt | RunKind::CellOpt) {
                flush_step(&mut report.motion_steps, &mut current);
            }
        }
    }

    // 文件尾: 没有收尾分隔行的运行类型补落最后一步
    if !matches!(report.run_kind(), RunKind::GeoOpt | RunKind::CellOpt) {
        flush_step(&mut report.motion_steps, &mut current);
    }
    if mulliken_active && !mulliken_rows.is_empty() {
        report.mulliken = mulliken_rows;
    }

    for (&spin, occ) in &occupied_eigen {
        let unocc = match unoccupied_eigen.get(&spin) {
            Some(u) if !u.is_empty() => u,
            _ => continue,
        };
        if occ.is_empty() {
            continue;
        }
        let homo = occ.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lumo = unocc.iter().cloned().fold(f64::INFINITY, f64::min);
        report.band_gaps.push(BandGapInfo {
            homo_au: homo,
            lumo_au: lumo,
            gap_au: lumo - homo,
        });
    }
    // 自旋限制时把自旋 1 的带隙复制为自旋 2
    if report.spin_unrestricted == Some(false) && report.band_gaps.len() == 1 {
        let copy = report.band_gaps[0];
        report.band_gaps.push(copy);
    }

    report.status = if aborted {
        if scf_failed {
            RunStatus::ScfNotConverged
        } else {
            RunStatus::Aborted
        }
    } else if report.n_warnings.is_some() && program_ended {
        RunStatus::Completed
    } else {
        RunStatus::Incomplete
    };

    report
}

fn flush_step(steps: &mut Vec<MotionStep>, current: &mut MotionStep) {
    if !current.is_empty() {
        steps.push(mem::take(current));
    }
}

fn last_f64(line: &str) -> Option<f64> {
    line.split_whitespace().last()?.parse().ok()
}

/// `=` 右侧的第一个 token
fn first_after_equals(line: &str) -> Option<&str> {
    line.split('=').nth(1)?.split_whitespace().next()
}

fn values_after_equals(line: &str) -> Vec<f64> {
    line.split('=')
        .nth(1)
        .map(|rest| {
            rest.split_whitespace()
                .filter_map(|t| t.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Mulliken 数据行: 序号 元素 kind, 后接 2 列 (布居, 电荷)
/// 或 4 列 (alpha, beta, 自旋矩, 电荷)
fn parse_mulliken_row(line: &str) -> Option<MullikenSite> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 5 {
        return None;
    }
    tokens[0].parse::<usize>().ok()?;
    let element = tokens[1];
    if !element.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    tokens[2].parse::<u32>().ok()?;
    let numbers: Vec<f64> = tokens[3..]
        .iter()
        .map(|t| t.parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;

    match numbers.len() {
        2 => Some(MullikenSite {
            element: element.to_string(),
            population: numbers[0],
            spin_moment: None,
            charge: numbers[1],
        }),
        4 => Some(MullikenSite {
            element: element.to_string(),
            population: numbers[0] + numbers[1],
            spin_moment: Some(numbers[2]),
            charge: numbers[3],
        }),
        _ => None,
    }
}
