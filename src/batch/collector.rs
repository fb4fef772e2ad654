//! # 输出文件收集器
//!
//! 在运行目录树里按文件名模式定位 CP2K 输出文件。
//!
//! ## 功能
//! - 支持单文件和目录输入
//! - glob 模式匹配 (逗号分隔的多模式)
//! - 递归目录搜索
//!
//! ## 依赖关系
//! - 被 `commands/collect.rs` 调用
//! - 使用 `walkdir` 遍历目录, `glob` 做模式匹配

use std::path::PathBuf;
use walkdir::WalkDir;

use crate::error::{CpkitError, Result};

/// 输出文件收集器
pub struct FileCollector {
    /// 输入路径
    input: PathBuf,
    /// 匹配模式列表
    patterns: Vec<String>,
    /// 是否递归
    recursive: bool,
}

impl FileCollector {
    /// 创建新的收集器, 缺省匹配 `*.out`
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: vec!["*.out".to_string()],
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.patterns = pattern
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if self.patterns.is_empty() {
            self.patterns = vec!["*.out".to_string()];
        }
        self
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件, 按路径排序
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if self.input.is_file() {
            return Ok(vec![self.input.clone()]);
        }
        if !self.input.is_dir() {
            return Err(CpkitError::DirectoryNotFound {
                path: self.input.display().to_string(),
            });
        }

        let patterns = self
            .patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| {
                    CpkitError::InvalidArgument(format!("Invalid pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| patterns.iter().any(|p| p.matches(name)))
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect();

        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_list_parsing() {
        let collector = FileCollector::new(PathBuf::from(".")).with_pattern("*.out, *.log,,");
        assert_eq!(collector.patterns, vec!["*.out", "*.log"]);
    }

    #[test]
    fn test_empty_pattern_falls_back_to_default() {
        let collector = FileCollector::new(PathBuf::from(".")).with_pattern("  ,  ");
        assert_eq!(collector.patterns, vec!["*.out"]);
    }

    #[test]
    fn test_bad_pattern_is_reported() {
        let collector = FileCollector::new(PathBuf::from(".")).with_pattern("[");
        // "." 是目录, 走到模式编译这步
        assert!(matches!(
            collector.collect(),
            Err(CpkitError::InvalidArgument(_))
        ));
    }
}
