//! # cpkit
//!
//! CP2K 输入生成与输出解析工具箱。
//!
//! 库部分提供参数树、输入渲染器与各类解析器, 可被工作流引擎直接调用;
//! 二进制部分把同样的操作暴露为子命令。
//!
//! ## 模块结构
//! ```text
//! lib.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   ├── parsers/    (输入甲板 / 定义库 / 输出解析器)
//!   ├── models/     (数据模型)
//!   ├── batch/      (文件收集与并行批处理)
//!   ├── utils/      (终端输出与进度条)
//!   └── error.rs    (统一错误处理)
//! ```

pub mod batch;
pub mod cli;
pub mod commands;
pub mod error;
pub mod models;
pub mod parsers;
pub mod utils;

pub use error::{CpkitError, Result};
pub use models::{InputTree, RunReport, Structure, Trajectory, TreeValue};
pub use parsers::deck::{parse_deck_content, render_deck};
pub use parsers::output::{parse_output_content, parse_output_file};
