//! # 批量执行器
//!
//! 并行执行批量处理任务，结果保持输入顺序。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代
//! - 进度条显示
//! - 失败计数
//!
//! ## 依赖关系
//! - 被 `engine/slurm.rs` 调用（解析导入目录）
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::error::Result;
use crate::utils::progress;

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
}

impl BatchRunner {
    /// 创建新的批量执行器，0 表示使用全部 CPU
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理，按输入顺序返回每项结果
    pub fn run<T, R, F>(&self, items: &[T], message: &str, processor: F) -> Vec<Result<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<R> + Sync + Send,
    {
        let pb = progress::create_progress_bar(items.len() as u64, message);
        let failed_count = AtomicUsize::new(0);

        let work = || {
            items
                .par_iter()
                .map(|item| {
                    let result = processor(item);
                    if result.is_err() {
                        failed_count.fetch_add(1, Ordering::Relaxed);
                    }
                    pb.inc(1);
                    result
                })
                .collect::<Vec<_>>()
        };

        // 线程池创建失败时退回全局线程池
        let results = match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
            Ok(pool) => pool.install(work),
            Err(_) => work(),
        };

        pb.finish_and_clear();
        let failed = failed_count.load(Ordering::Relaxed);
        if failed > 0 {
            crate::utils::output::print_warning(&format!(
                "{} of {} items failed",
                failed,
                items.len()
            ));
        }
        results
    }
}
