// 制品上传
//
// 一次制品上传 = 创建容器 + 并发上传所有文件 + 更新制品大小
//
// 文件级调度：
// - file_concurrency 个协程从文件列表中依次领取
// - 某个文件失败时记入 failed_items；continue_on_error = false 时置位制品级中止标志，
//   之后领取到的文件不再上传，直接记为失败（不计字节），已在上传的文件照常完成
// - total_size 为所有已上传文件的成功字节之和（包括部分失败的文件）

use crate::config::UploadConfig;
use crate::service::{
    item_resource_url, parse_url, ArtifactError, ChunkTransport, ContainerService,
};
use crate::uploader::folder::format_bytes;
use crate::uploader::{
    AbortFlag, ChunkUploader, FileUploadResult, FileUploader, RetryDelay, TokioDelay,
    WorkOutcome, WorkerPool,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 待上传文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    /// 本地文件路径
    pub local_path: PathBuf,
    /// 容器内的相对路径（作为 itemPath 参数）
    pub remote_item_path: String,
}

impl UploadTarget {
    pub fn new(local_path: impl Into<PathBuf>, remote_item_path: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            remote_item_path: remote_item_path.into(),
        }
    }
}

/// 上传选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// 某个文件失败后是否继续上传其余文件（默认 true）
    pub continue_on_error: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            continue_on_error: true,
        }
    }
}

impl From<&UploadConfig> for UploadOptions {
    fn from(config: &UploadConfig) -> Self {
        Self {
            continue_on_error: config.continue_on_error,
        }
    }
}

/// 单个文件的最终状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// 全部分片上传成功
    Succeeded,
    /// 至少一个分片失败
    Failed,
    /// 制品级中止后未上传
    Skipped,
}

/// 单个文件的上传报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    pub local_path: PathBuf,
    pub remote_item_path: String,
    pub status: ItemStatus,
    /// 计入总大小的字节数
    pub uploaded_size: u64,
}

/// 制品上传结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactUploadResult {
    /// 所有文件成功上传的字节总数
    pub total_size: u64,
    /// 未完全上传成功的本地文件（按文件列表顺序，不重复）
    pub failed_items: Vec<PathBuf>,
    /// 每个文件的报告
    pub items: Vec<ItemReport>,
}

/// 文件级工作项（预先解析好上传地址）
#[derive(Debug, Clone)]
struct FileWork {
    target: UploadTarget,
    resource_url: Url,
}

/// 制品上传器
pub struct ArtifactUploader {
    transport: Arc<dyn ChunkTransport>,
    delay: Arc<dyn RetryDelay>,
    retry_delay: Duration,
    file_concurrency: usize,
    chunk_concurrency: usize,
    max_chunk_size: u64,
}

impl ArtifactUploader {
    /// 创建上传器（使用 tokio 定时器等待重试）
    pub fn new(transport: Arc<dyn ChunkTransport>, config: &UploadConfig) -> Self {
        Self {
            transport,
            delay: Arc::new(TokioDelay),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            file_concurrency: config.file_concurrency,
            chunk_concurrency: config.chunk_concurrency,
            max_chunk_size: config.chunk_size,
        }
    }

    /// 替换重试等待实现
    pub fn with_retry_delay(mut self, delay: Arc<dyn RetryDelay>) -> Self {
        self.delay = delay;
        self
    }

    /// 完整上传流程：创建容器 -> 上传所有文件 -> 更新制品大小
    ///
    /// 只有创建容器和更新大小会返回错误；文件失败体现在结果中
    pub async fn upload_artifact<S>(
        &self,
        service: &S,
        artifact_name: &str,
        targets: &[UploadTarget],
        options: UploadOptions,
    ) -> Result<ArtifactUploadResult, ArtifactError>
    where
        S: ContainerService + ?Sized,
    {
        info!(
            "开始上传制品: {}, 文件数={}, continue_on_error={}",
            artifact_name,
            targets.len(),
            options.continue_on_error
        );

        let container = service.create_container(artifact_name).await?;

        let result = self
            .upload_to_file_container(&container.file_container_resource_url, targets, options)
            .await?;

        service
            .patch_artifact_size(result.total_size, artifact_name)
            .await?;

        info!(
            "制品 {} 上传结束: 总大小 {}, 失败文件 {} 个",
            artifact_name,
            format_bytes(result.total_size),
            result.failed_items.len()
        );

        Ok(result)
    }

    /// 并发上传所有文件到容器
    pub async fn upload_to_file_container(
        &self,
        upload_url: &str,
        targets: &[UploadTarget],
        options: UploadOptions,
    ) -> Result<ArtifactUploadResult, ArtifactError> {
        let upload_url = parse_url(upload_url)?;

        debug!(
            "文件并发数: {}, 分片并发数: {}, 分片大小: {} bytes",
            self.file_concurrency, self.chunk_concurrency, self.max_chunk_size
        );

        let work: Vec<FileWork> = targets
            .iter()
            .map(|target| FileWork {
                target: target.clone(),
                resource_url: item_resource_url(&upload_url, &target.remote_item_path),
            })
            .collect();

        let chunk_uploader = Arc::new(ChunkUploader::new(
            self.transport.clone(),
            self.delay.clone(),
            self.retry_delay,
        ));
        let file_uploader =
            FileUploader::new(chunk_uploader, self.chunk_concurrency, self.max_chunk_size);

        let abort = Arc::new(AbortFlag::new());
        let abort_pending = abort.clone();
        let continue_on_error = options.continue_on_error;

        let outcomes = WorkerPool::new(self.file_concurrency)
            .drain(work, abort, move |work: FileWork| {
                let file_uploader = file_uploader.clone();
                let abort = abort_pending.clone();
                async move {
                    let result = file_uploader
                        .upload(&work.target.local_path, &work.resource_url)
                        .await;
                    if !result.is_success && !continue_on_error && abort.set() {
                        warn!(
                            "文件 {} 上传失败，停止上传剩余文件",
                            work.target.local_path.display()
                        );
                    }
                    result
                }
            })
            .await;

        let result = aggregate(outcomes);
        info!(
            "所有文件上传结束, 总大小 {} bytes, 失败 {} 个",
            result.total_size,
            result.failed_items.len()
        );

        Ok(result)
    }
}

/// 汇总文件结果
fn aggregate(outcomes: Vec<(FileWork, WorkOutcome<FileUploadResult>)>) -> ArtifactUploadResult {
    let mut result = ArtifactUploadResult::default();

    for (work, outcome) in outcomes {
        let (status, uploaded_size) = match outcome {
            WorkOutcome::Completed(file) if file.is_success => {
                (ItemStatus::Succeeded, file.successful_upload_size)
            }
            WorkOutcome::Completed(file) => (ItemStatus::Failed, file.successful_upload_size),
            WorkOutcome::Skipped => (ItemStatus::Skipped, 0),
        };

        result.total_size += uploaded_size;
        if status != ItemStatus::Succeeded {
            result.failed_items.push(work.target.local_path.clone());
        }
        result.items.push(ItemReport {
            local_path: work.target.local_path,
            remote_item_path: work.target.remote_item_path,
            status,
            uploaded_size,
        });
    }

    result
}
