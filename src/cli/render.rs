//! # render 子命令 CLI 定义
//!
//! 从参数树 JSON 文件渲染 CP2K 输入文件, 可选注入结构。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/render.rs`

use clap::Args;
use std::path::PathBuf;

/// render 子命令参数
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Parameter tree JSON files, merged left to right (later files win)
    #[arg(required = true)]
    pub params: Vec<PathBuf>,

    /// Structure file injected into FORCE_EVAL/SUBSYS (.restart or .xyz)
    #[arg(short, long)]
    pub structure: Option<PathBuf>,

    /// Output path for the rendered input deck ('-' for stdout)
    #[arg(short, long, default_value = "cp2k.inp")]
    pub output: PathBuf,

    /// Print the merged parameter tree as JSON instead of rendering
    #[arg(long, default_value_t = false)]
    pub dump_json: bool,
}
