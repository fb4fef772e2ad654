//! # render 命令实现
//!
//! 从参数树 JSON 文件渲染 CP2K 输入文件。
//!
//! ## 功能
//! - 多个参数文件从左到右深度合并 (协议默认值在前, 用户覆盖在后)
//! - 可选从 .restart / .xyz 文件注入结构 (CELL + COORD)
//! - 渲染为确定性排序的 CP2K 输入文本
//!
//! ## 依赖关系
//! - 使用 `cli/render.rs` 定义的参数
//! - 使用 `models/tree.rs`, `models/structure.rs`, `parsers/deck.rs`
//! - 使用 `utils/output.rs`

use crate::cli::render::RenderArgs;
use crate::error::{CpkitError, Result};
use crate::models::{InputTree, Structure};
use crate::parsers::{deck, restart, xyz};
use crate::utils::output;

use std::fs;
use std::path::Path;

/// 执行 render 命令
pub fn execute(args: RenderArgs) -> Result<()> {
    output::print_header("Rendering CP2K Input");

    // 从左到右合并参数文件
    let mut tree = InputTree::new();
    for path in &args.params {
        let content = fs::read_to_string(path).map_err(|e| CpkitError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let layer = InputTree::from_json(&content)?;
        tree.merge(&layer);
        output::print_info(&format!("Merged parameter file '{}'", path.display()));
    }

    // 注入结构 (不覆盖参数文件里已有的关键词)
    if let Some(ref structure_path) = args.structure {
        let structure = load_structure(structure_path)?;
        output::print_info(&format!(
            "Injecting structure: {} ({} atoms)",
            structure.formula(),
            structure.n_atoms()
        ));
        structure.merge_into_tree(&mut tree)?;
    }

    if args.dump_json {
        println!("{}", tree.to_json()?);
        return Ok(());
    }

    let deck = deck::render_deck(&tree)?;

    if args.output.as_os_str() == "-" {
        print!("{}", deck);
    } else {
        fs::write(&args.output, &deck).map_err(|e| CpkitError::FileWriteError {
            path: args.output.display().to_string(),
            source: e,
        })?;
        output::print_done(&format!(
            "Input deck written to '{}'",
            args.output.display()
        ));
    }

    Ok(())
}

/// 按扩展名选择结构文件解码器
fn load_structure(path: &Path) -> Result<Structure> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "restart" | "inp" => restart::parse_restart_file(path),
        "xyz" => {
            let frames = xyz::parse_xyz_file(path)?;
            let traj = xyz::frames_to_trajectory(&frames)?;
            traj.last_structure(None)
                .ok_or_else(|| CpkitError::InvalidData {
                    kind: "xyz".to_string(),
                    reason: format!("no frames in '{}'", path.display()),
                })
        }
        other => Err(CpkitError::InvalidArgument(format!(
            "Unsupported structure format '{}' (expected .restart, .inp or .xyz)",
            other
        ))),
    }
}
