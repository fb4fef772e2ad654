//! # 解析器模块
//!
//! 提供 CP2K 输入甲板、数据库和各类输出格式的解析器。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: deck, pseudopotential, basisset, output, bands, restart, xyz

pub mod bands;
pub mod basisset;
pub mod deck;
pub mod output;
pub mod pseudopotential;
pub mod restart;
pub mod xyz;

use crate::error::CpkitError;

/// 一条解码失败的记录: 上下文 (通常是记录首行) + 原因
#[derive(Debug)]
pub struct ScanFailure {
    pub context: String,
    pub error: CpkitError,
}
