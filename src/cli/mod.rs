//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `render`: 参数树 JSON 渲染为 CP2K 输入文件
//! - `scan`: 解析单个 CP2K 输出文件
//! - `collect`: 批量收集运行目录下的输出
//! - `data`: 定义库文件工具（嵌套子命令）
//!   - `pot`: GTH 赝势库
//!   - `basis`: 高斯基组库
//! - `traj`: 拼接与导出轨迹文件
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: render, scan, collect, data, traj

pub mod collect;
pub mod data;
pub mod render;
pub mod scan;
pub mod traj;

use clap::{Parser, Subcommand};

/// cpkit - CP2K 输入生成与输出解析工具箱
#[derive(Parser)]
#[command(name = "cpkit")]
#[command(version)]
#[command(about = "A CP2K input generation and output parsing toolkit", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Render a CP2K input deck from parameter tree JSON files
    Render(render::RenderArgs),

    /// Scan a CP2K output file and report energies, steps and status
    Scan(scan::ScanArgs),

    /// Collect and scan CP2K outputs from a directory of run folders
    Collect(collect::CollectArgs),

    /// Inspect GTH potential and Gaussian basis set library files
    Data(data::DataArgs),

    /// Join trajectory fragments and export merged data
    Traj(traj::TrajArgs),
}
