//! # data 子命令 CLI 定义
//!
//! 定义库文件工具统一入口，包含两个子命令：
//! - `pot`: GTH 赝势库文件
//! - `basis`: 高斯基组库文件
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/data.rs`

use clap::{Args, Subcommand};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────
// Data 主命令
// ─────────────────────────────────────────────────────────────

/// data 主命令参数
#[derive(Args, Debug)]
pub struct DataArgs {
    #[command(subcommand)]
    pub command: DataCommands,
}

/// data 子命令
#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Inspect a GTH pseudopotential library file (e.g. GTH_POTENTIALS)
    Pot(PotArgs),

    /// Inspect a Gaussian basis set library file (e.g. BASIS_MOLOPT)
    Basis(BasisArgs),
}

// ─────────────────────────────────────────────────────────────
// 共用选择 / 导出参数
// ─────────────────────────────────────────────────────────────

/// 记录选择与导出参数（pot / basis 共用）
#[derive(Args, Debug)]
pub struct DataSelectArgs {
    /// Keep only records for this element symbol
    #[arg(short, long)]
    pub element: Option<String>,

    /// Keep only records whose name or alias contains this string
    #[arg(short, long)]
    pub name: Option<String>,

    /// Write the selected records as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Re-encode the selected records to CP2K text at this path
    #[arg(long)]
    pub encode: Option<PathBuf>,
}

/// pot 子命令参数
#[derive(Args, Debug)]
pub struct PotArgs {
    /// Potential library file
    pub file: PathBuf,

    #[command(flatten)]
    pub select: DataSelectArgs,
}

/// basis 子命令参数
#[derive(Args, Debug)]
pub struct BasisArgs {
    /// Basis set library file
    pub file: PathBuf,

    #[command(flatten)]
    pub select: DataSelectArgs,
}
