//! # 并行批量处理器
//!
//! 用 rayon 线程池对一批文件并行执行同一个处理函数,
//! 保留输入顺序, 分别收集成功结果和失败信息。
//!
//! ## 依赖关系
//! - 被 `commands/collect.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::utils::progress;

/// 批量处理的汇总结果
pub struct BatchOutcome<T> {
    /// 成功处理的文件及其结果, 按输入顺序
    pub items: Vec<(PathBuf, T)>,
    /// 失败的文件及错误信息
    pub failures: Vec<(PathBuf, String)>,
}

impl<T> BatchOutcome<T> {
    /// 成功数量
    pub fn n_ok(&self) -> usize {
        self.items.len()
    }

    /// 失败数量
    pub fn n_failed(&self) -> usize {
        self.failures.len()
    }

    /// 总处理数量
    pub fn total(&self) -> usize {
        self.items.len() + self.failures.len()
    }
}

/// 并行批量处理器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
}

impl BatchRunner {
    /// 创建处理器, `jobs = 0` 表示使用全部 CPU 核心
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    /// 并行处理文件列表, 返回按输入顺序排列的结果
    pub fn run<T, F>(&self, files: Vec<PathBuf>, processor: F) -> BatchOutcome<T>
    where
        T: Send,
        F: Fn(&Path) -> Result<T> + Sync,
    {
        let pb = progress::create_progress_bar(files.len() as u64, "Scanning");

        // 配置 rayon 线程池
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build();

        let results: Vec<(PathBuf, Result<T>)> = match pool {
            Ok(pool) => pool.install(|| {
                files
                    .into_par_iter()
                    .map(|file| {
                        let result = processor(&file);
                        pb.inc(1);
                        (file, result)
                    })
                    .collect()
            }),
            // 线程池创建失败时退化为串行处理
            Err(_) => files
                .into_iter()
                .map(|file| {
                    let result = processor(&file);
                    pb.inc(1);
                    (file, result)
                })
                .collect(),
        };

        pb.finish_and_clear();

        // 汇总结果
        let mut outcome = BatchOutcome {
            items: Vec::new(),
            failures: Vec::new(),
        };
        for (file, result) in results {
            match result {
                Ok(value) => outcome.items.push((file, value)),
                Err(e) => outcome.failures.push((file, e.to_string())),
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CpkitError;

    #[test]
    fn test_outcome_counts() {
        let outcome = BatchOutcome {
            items: vec![(PathBuf::from("a.out"), 1u32), (PathBuf::from("b.out"), 2)],
            failures: vec![(PathBuf::from("c.out"), "bad".to_string())],
        };
        assert_eq!(outcome.n_ok(), 2);
        assert_eq!(outcome.n_failed(), 1);
        assert_eq!(outcome.total(), 3);
    }

    #[test]
    fn test_run_keeps_input_order() {
        let runner = BatchRunner::new(2);
        let files = vec![
            PathBuf::from("3.out"),
            PathBuf::from("1.out"),
            PathBuf::from("2.out"),
        ];
        let outcome = runner.run(files, |path| {
            let name = path.display().to_string();
            if name.starts_with('1') {
                Err(CpkitError::InvalidData {
                    kind: "test".to_string(),
                    reason: "marked as bad".to_string(),
                })
            } else {
                Ok(name)
            }
        });
        assert_eq!(outcome.n_ok(), 2);
        assert_eq!(outcome.items[0].1, "3.out");
        assert_eq!(outcome.items[1].1, "2.out");
        assert_eq!(outcome.failures[0].0, PathBuf::from("1.out"));
    }
}
