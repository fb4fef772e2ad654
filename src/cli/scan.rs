//! # scan 子命令 CLI 定义
//!
//! 解析单个 CP2K 输出文件并展示 / 导出扫描报告。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/scan.rs`

use clap::Args;
use std::path::PathBuf;

/// scan 子命令参数
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// CP2K output file to scan
    pub output_file: PathBuf,

    /// Print the per-step table for GEO_OPT / CELL_OPT / MD runs
    #[arg(long, default_value_t = false)]
    pub steps: bool,

    /// Print the Mulliken population table (when present)
    #[arg(long, default_value_t = false)]
    pub mulliken: bool,

    /// Write the full report as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Export the band structure as CSV
    #[arg(long)]
    pub bands_csv: Option<PathBuf>,

    /// Plot the band structure as PNG
    #[arg(long)]
    pub bands_plot: Option<PathBuf>,

    /// Figure width in pixels
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels
    #[arg(long, default_value_t = 800)]
    pub height: u32,
}
