// 有界并发工作池
//
// 文件级和分片级共用同一套调度：
// - N 个工作协程共享一个单调递增的游标，依次从只读的有序列表中领取任务
// - 空闲协程立即领取下一项，不做静态分配
// - 领取后先检查中止标志：已置位则不执行，直接记为 Skipped
// - 中止只影响之后的领取，已在执行的任务照常完成

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// 单向中止标志（Clear -> Set，不可复位）
#[derive(Debug, Default)]
pub struct AbortFlag(AtomicBool);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 置位，返回是否为本次首次置位
    pub fn set(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 单个工作项的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome<R> {
    /// 已执行
    Completed(R),
    /// 领取时中止标志已置位，未执行
    Skipped,
}

/// 有界并发工作池
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// 创建工作池，并发数至少为 1
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 用 N 个工作协程处理完所有工作项
    ///
    /// 返回值按工作项原始顺序排列，每项恰好出现一次
    pub async fn drain<T, R, F, Fut>(
        self,
        items: Vec<T>,
        abort: Arc<AbortFlag>,
        op: F,
    ) -> Vec<(T, WorkOutcome<R>)>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let items = Arc::new(items);
        let cursor = Arc::new(AtomicUsize::new(0));
        let op = Arc::new(op);

        let mut join_set = JoinSet::new();
        for worker_id in 0..self.workers.min(total) {
            let items = items.clone();
            let cursor = cursor.clone();
            let abort = abort.clone();
            let op = op.clone();

            join_set.spawn(async move {
                let mut finished = Vec::new();
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(item) = items.get(index) else {
                        break;
                    };

                    let outcome = if abort.is_set() {
                        WorkOutcome::Skipped
                    } else {
                        WorkOutcome::Completed(op(item.clone()).await)
                    };
                    finished.push((index, outcome));
                }
                debug!("工作协程 #{} 退出, 共处理 {} 项", worker_id, finished.len());
                finished
            });
        }

        let mut outcomes: Vec<Option<WorkOutcome<R>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(finished) => {
                    for (index, outcome) in finished {
                        outcomes[index] = Some(outcome);
                    }
                }
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => error!("工作协程异常退出: {}", e),
            }
        }

        // 所有工作协程都已结束，这里通常是唯一引用
        let items = Arc::try_unwrap(items).unwrap_or_else(|shared| shared.as_ref().clone());

        items
            .into_iter()
            .zip(outcomes)
            .filter_map(|(item, outcome)| outcome.map(|o| (item, o)))
            .collect()
    }
}
