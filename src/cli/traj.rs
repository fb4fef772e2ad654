//! # traj 子命令 CLI 定义
//!
//! 拼接 XYZ 轨迹片段, 合并力与晶胞流, 导出合并结果。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/traj.rs`

use clap::Args;
use std::path::PathBuf;

/// traj 子命令参数
#[derive(Args, Debug)]
pub struct TrajArgs {
    /// Position trajectory files (XYZ), joined in the given order
    #[arg(required = true)]
    pub positions: Vec<PathBuf>,

    /// Force trajectory files (XYZ), one per position file
    #[arg(long, num_args = 1..)]
    pub forces: Vec<PathBuf>,

    /// Cell table files, one per position file
    #[arg(long, num_args = 1..)]
    pub cells: Vec<PathBuf>,

    /// Drop repeated step ids at restart boundaries (first occurrence wins)
    #[arg(long, default_value_t = false)]
    pub dedup: bool,

    /// Write the joined trajectory as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Write the final frame as structure JSON
    #[arg(long)]
    pub last_structure: Option<PathBuf>,
}
