//! # traj 命令实现
//!
//! 拼接 XYZ 轨迹片段, 合并力与晶胞流, 导出合并结果。
//!
//! ## 功能
//! - 多个坐标轨迹按给定顺序拼接 (重启运行的续段)
//! - 每个片段可配一个力轨迹与一个晶胞表, 按步号对齐合并
//! - 可选去掉重启边界上的重复步 (保留首次出现)
//! - 导出合并轨迹 JSON 或末帧结构 JSON
//!
//! ## 依赖关系
//! - 使用 `cli/traj.rs` 定义的参数
//! - 使用 `parsers/xyz.rs`, `models/trajectory.rs`
//! - 使用 `utils/output.rs`

use crate::cli::traj::TrajArgs;
use crate::error::{CpkitError, Result};
use crate::parsers::xyz;
use crate::utils::output;

use std::fs;
use std::path::Path;

/// 执行 traj 命令
pub fn execute(args: TrajArgs) -> Result<()> {
    output::print_header("Joining Trajectory Fragments");

    if !args.forces.is_empty() && args.forces.len() != args.positions.len() {
        return Err(CpkitError::InvalidArgument(format!(
            "Expected one force file per position file, got {} force files for {} position files",
            args.forces.len(),
            args.positions.len()
        )));
    }
    if !args.cells.is_empty() && args.cells.len() != args.positions.len() {
        return Err(CpkitError::InvalidArgument(format!(
            "Expected one cell table per position file, got {} cell tables for {} position files",
            args.cells.len(),
            args.positions.len()
        )));
    }

    let mut fragments = Vec::with_capacity(args.positions.len());
    for (i, pos_path) in args.positions.iter().enumerate() {
        let frames = xyz::parse_xyz_file(pos_path)?;
        let mut traj = xyz::frames_to_trajectory(&frames)?;

        if let Some(frc_path) = args.forces.get(i) {
            let force_frames = xyz::parse_xyz_file(frc_path)?;
            xyz::merge_force_frames(&mut traj, &force_frames)?;
        }
        if let Some(cell_path) = args.cells.get(i) {
            let rows = xyz::parse_cell_table_file(cell_path)?;
            xyz::merge_cell_rows(&mut traj, &rows)?;
        }

        output::print_info(&format!(
            "'{}': {} frames, {} atoms",
            pos_path.display(),
            traj.n_frames(),
            traj.n_atoms()
        ));
        fragments.push(traj);
    }

    let joined = xyz::concat_fragments(fragments, args.dedup)?;
    output::print_success(&format!(
        "Joined trajectory: {} frames, {} atoms",
        joined.n_frames(),
        joined.n_atoms()
    ));

    if let Some(ref path) = args.json {
        write_text(path, &serde_json::to_string_pretty(&joined)?)?;
        output::print_success(&format!("Trajectory JSON saved to '{}'", path.display()));
    }

    if let Some(ref path) = args.last_structure {
        let structure = joined
            .last_structure(None)
            .ok_or_else(|| CpkitError::InvalidData {
                kind: "trajectory".to_string(),
                reason: "joined trajectory has no frames".to_string(),
            })?;
        write_text(path, &serde_json::to_string_pretty(&structure)?)?;
        output::print_success(&format!(
            "Final frame ({}) saved to '{}'",
            structure.formula(),
            path.display()
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
