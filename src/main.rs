//! # cpkit - CP2K 输入生成与输出解析工具箱
//!
//! 围绕 CP2K 计算的输入生成与输出解析, 统一成单一可执行文件。
//!
//! ## 子命令
//! - `render`  - 参数树 JSON 渲染为 CP2K 输入文件
//! - `scan`    - 解析单个 CP2K 输出文件
//! - `collect` - 批量收集运行目录下的输出
//! - `data`    - 定义库文件工具
//!   - `pot`   - GTH 赝势库
//!   - `basis` - 高斯基组库
//! - `traj`    - 拼接与导出轨迹文件

use clap::Parser;
use cpkit::cli::Cli;
use cpkit::{commands, utils};

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
