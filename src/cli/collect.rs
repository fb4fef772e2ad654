//! # collect 子命令 CLI 定义
//!
//! 批量收集并扫描运行目录下的 CP2K 输出文件。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/collect.rs`

use clap::Args;
use std::path::PathBuf;

/// collect 子命令参数
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Root directory containing CP2K run folders (or a single output file)
    pub run_dir: PathBuf,

    /// Glob pattern for output files (comma-separated alternatives)
    #[arg(long, default_value = "*.out")]
    pub pattern: String,

    /// Only scan the top level of the directory (no recursion)
    #[arg(long, default_value_t = false)]
    pub no_recurse: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Filename for the CSV export
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Sort the table by final energy instead of by path
    #[arg(long, default_value_t = false)]
    pub sort_energy: bool,
}
