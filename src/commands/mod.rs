//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `models/`, `utils/`
//! - 子模块: render, scan, collect, data, traj

pub mod collect;
pub mod data;
pub mod render;
pub mod scan;
pub mod traj;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Render(args) => render::execute(args),
        Commands::Scan(args) => scan::execute(args),
        Commands::Collect(args) => collect::execute(args),
        Commands::Data(args) => data::execute(args),
        Commands::Traj(args) => traj::execute(args),
    }
}
