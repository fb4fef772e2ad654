//! # 统一错误处理模块
//!
//! 定义 cpkit 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 错误分类
//! - 文件 I/O 错误：读写失败、文件缺失或为空
//! - 语法错误：文本不符合对应格式的文法（按记录报告，批量扫描可继续）
//! - 语义错误：结构合法但违反跨字段不变量（价电子数、系数矩阵长度等）
//! - 输入树错误：关键词路径缺失 / 类型不符 / 非法关键词
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// cpkit 统一错误类型
#[derive(Error, Debug)]
pub enum CpkitError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("File is empty: {path}")]
    EmptyFile { path: String },

    // ─────────────────────────────────────────────────────────────
    // 语法错误（文本不符合格式文法）
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format}: {context}\nReason: {reason}")]
    ParseError {
        format: String,
        context: String,
        reason: String,
    },

    /// 单条记录解码失败（携带元素与名称，便于在批量扫描中定位）
    #[error("Bad {format} record for {element} [{names}]: {reason}")]
    RecordError {
        format: String,
        element: String,
        names: String,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // 语义错误（跨字段不变量被违反）
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid {kind} data: {reason}")]
    InvalidData { kind: String, reason: String },

    #[error("Trajectory streams do not line up: {reason}")]
    TrajectoryMismatch { reason: String },

    // ─────────────────────────────────────────────────────────────
    // 输入树错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid keyword '{key}': {reason}")]
    InvalidKeyword { key: String, reason: String },

    #[error("No keyword or section at path: {path}")]
    KeywordMissing { path: String },

    #[error("Wrong node kind at path '{path}': {reason}")]
    KeywordType { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // CSV / JSON 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, CpkitError>;
