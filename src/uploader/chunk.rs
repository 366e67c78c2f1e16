// 上传分片
//
// 分片规则：
// - 文件按分片大小上限切成连续、不重叠的字节范围，按偏移升序排列
// - 最后一个分片可能小于上限
// - 空文件没有分片
//
// 单个分片的上传策略：
// - 成功状态码：成功
// - 可重试状态码（限流/临时性服务端错误）或传输层错误：固定等待后重试一次
// - 其他状态码，或重试仍失败：失败

use crate::service::{is_retryable_status, is_success_status, ChunkTransport, ContentRange};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error, info, warn};

/// 默认分片大小上限: 4MB
pub const DEFAULT_UPLOAD_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// 可重试错误的默认等待时间
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// 上传分片（字节范围为闭区间 [start, end]）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadChunk {
    /// 分片索引
    pub index: usize,
    /// 起始字节
    pub start: u64,
    /// 结束字节（包含）
    pub end: u64,
    /// 文件总大小
    pub total_size: u64,
}

impl UploadChunk {
    /// 分片大小
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// 对应的 Content-Range
    pub fn content_range(&self) -> ContentRange {
        ContentRange {
            start: self.start,
            end: self.end,
            total: self.total_size,
        }
    }

    /// 读取分片数据
    pub async fn read_data(&self, file_path: &Path) -> Result<Vec<u8>> {
        let mut file = File::open(file_path)
            .await
            .with_context(|| format!("打开上传文件失败: {}", file_path.display()))?;

        file.seek(std::io::SeekFrom::Start(self.start))
            .await
            .context("文件定位失败")?;

        let mut buffer = vec![0u8; self.size() as usize];
        file.read_exact(&mut buffer)
            .await
            .context("读取分片数据失败")?;

        Ok(buffer)
    }
}

/// 计算分片
///
/// 分片列表在上传开始前一次性算出，不随失败调整
pub fn calculate_chunks(total_size: u64, max_chunk_size: u64) -> Vec<UploadChunk> {
    let max_chunk_size = max_chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut offset = 0u64;
    let mut index = 0;

    while offset < total_size {
        let end = std::cmp::min(offset + max_chunk_size, total_size);
        chunks.push(UploadChunk {
            index,
            start: offset,
            end: end - 1,
            total_size,
        });
        offset = end;
        index += 1;
    }

    chunks
}

/// 单个分片的最终结果（包含重试）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Success,
    Failure,
}

impl ChunkOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ChunkOutcome::Success)
    }
}

/// 重试等待
///
/// 测试中可替换为不真正等待的实现
#[async_trait]
pub trait RetryDelay: Send + Sync {
    async fn wait(&self, delay: Duration);
}

/// 基于 tokio 定时器的等待
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl RetryDelay for TokioDelay {
    async fn wait(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// 一次 PUT 的结果分类
enum Attempt {
    Uploaded(StatusCode),
    Retryable(String),
    Rejected(StatusCode),
}

/// 分片上传器
///
/// 在所有文件和分片之间共享
pub struct ChunkUploader {
    transport: Arc<dyn ChunkTransport>,
    delay: Arc<dyn RetryDelay>,
    retry_delay: Duration,
}

impl ChunkUploader {
    pub fn new(
        transport: Arc<dyn ChunkTransport>,
        delay: Arc<dyn RetryDelay>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            delay,
            retry_delay,
        }
    }

    /// 从磁盘读取分片并上传
    pub async fn upload(
        &self,
        resource_url: &Url,
        file_path: &Path,
        chunk: &UploadChunk,
    ) -> ChunkOutcome {
        let data = match chunk.read_data(file_path).await {
            Ok(data) => data,
            Err(e) => {
                error!(
                    "[分片#{}] 读取失败: file={}, range={}, 错误: {:#}",
                    chunk.index,
                    file_path.display(),
                    chunk.content_range(),
                    e
                );
                return ChunkOutcome::Failure;
            }
        };

        self.upload_data(resource_url, data, chunk).await
    }

    /// 上传已读入内存的分片数据，可重试错误最多重试一次
    pub async fn upload_data(
        &self,
        resource_url: &Url,
        data: Vec<u8>,
        chunk: &UploadChunk,
    ) -> ChunkOutcome {
        let range = chunk.content_range();

        info!(
            "[分片#{}] 上传 {} bytes, 偏移 {}, Content-Range: {}",
            chunk.index,
            chunk.size(),
            chunk.start,
            range
        );

        match self.attempt(resource_url, data.clone(), range).await {
            Attempt::Uploaded(status) => {
                debug!(
                    "[分片#{}] ✓ 上传成功: status={}, range={}",
                    chunk.index, status, range
                );
                return ChunkOutcome::Success;
            }
            Attempt::Rejected(status) => {
                error!(
                    "[分片#{}] 上传失败（不可重试）: status={}, range={}",
                    chunk.index, status, range
                );
                return ChunkOutcome::Failure;
            }
            Attempt::Retryable(reason) => {
                warn!(
                    "[分片#{}] 上传失败: {}，{} 秒后重试 (偏移 {})",
                    chunk.index,
                    reason,
                    self.retry_delay.as_secs(),
                    chunk.start
                );
            }
        }

        self.delay.wait(self.retry_delay).await;

        match self.attempt(resource_url, data, range).await {
            Attempt::Uploaded(status) => {
                info!("[分片#{}] ✓ 重试后上传成功: status={}", chunk.index, status);
                ChunkOutcome::Success
            }
            Attempt::Rejected(status) => {
                error!(
                    "[分片#{}] 重试后仍然失败: status={}, range={}",
                    chunk.index, status, range
                );
                ChunkOutcome::Failure
            }
            Attempt::Retryable(reason) => {
                error!(
                    "[分片#{}] 重试后仍然失败: {}, range={}",
                    chunk.index, reason, range
                );
                ChunkOutcome::Failure
            }
        }
    }

    /// 发送一次 PUT 并分类结果
    async fn attempt(&self, resource_url: &Url, data: Vec<u8>, range: ContentRange) -> Attempt {
        match self.transport.put_chunk(resource_url, data, range).await {
            Ok(status) if is_success_status(status) => Attempt::Uploaded(status),
            Ok(status) if is_retryable_status(status) => {
                Attempt::Retryable(format!("HTTP {}", status))
            }
            Ok(status) => Attempt::Rejected(status),
            Err(e) => Attempt::Retryable(e.to_string()),
        }
    }
}
