// 单文件上传
//
// 流程：
// 1. 读取文件大小，空文件直接视为成功（大小 0）
// 2. 预先计算全部分片
// 3. 用 chunk_concurrency 个协程并发上传分片
// 4. 任一分片失败后置位文件级中止标志：
//    已在上传的分片照常完成，之后领取到的分片不再上传，直接计入失败字节
// 5. 汇总：成功字节 = 文件大小 - 失败（含跳过）分片字节

use crate::uploader::{
    calculate_chunks, AbortFlag, ChunkOutcome, ChunkUploader, UploadChunk, WorkOutcome,
    WorkerPool,
};
use reqwest::Url;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 单文件上传结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadResult {
    /// 所有分片是否都上传成功
    pub is_success: bool,
    /// 实际上传成功的字节数
    pub successful_upload_size: u64,
}

impl FileUploadResult {
    fn failed() -> Self {
        Self {
            is_success: false,
            successful_upload_size: 0,
        }
    }
}

/// 单文件上传器
#[derive(Clone)]
pub struct FileUploader {
    chunk_uploader: Arc<ChunkUploader>,
    chunk_concurrency: usize,
    max_chunk_size: u64,
}

impl FileUploader {
    pub fn new(
        chunk_uploader: Arc<ChunkUploader>,
        chunk_concurrency: usize,
        max_chunk_size: u64,
    ) -> Self {
        Self {
            chunk_uploader,
            chunk_concurrency,
            max_chunk_size,
        }
    }

    /// 上传单个文件
    ///
    /// 文件级的失败不会返回错误，而是体现在结果中
    pub async fn upload(&self, file: &Path, resource_url: &Url) -> FileUploadResult {
        let file_size = match tokio::fs::metadata(file).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                error!("读取文件信息失败: {}, 错误: {}", file.display(), e);
                return FileUploadResult::failed();
            }
        };

        let chunks = calculate_chunks(file_size, self.max_chunk_size);
        if chunks.is_empty() {
            debug!("空文件，无需上传分片: {}", file.display());
            return FileUploadResult {
                is_success: true,
                successful_upload_size: 0,
            };
        }

        info!(
            "开始上传文件: {}, 大小={} bytes, 分片数={}, 并发分片数={}",
            file.display(),
            file_size,
            chunks.len(),
            self.chunk_concurrency
        );

        let abort = Arc::new(AbortFlag::new());
        let chunk_uploader = self.chunk_uploader.clone();
        let file_path: Arc<PathBuf> = Arc::new(file.to_path_buf());
        let resource_url = Arc::new(resource_url.clone());
        let abort_on_failure = abort.clone();

        let outcomes = WorkerPool::new(self.chunk_concurrency)
            .drain(chunks, abort, move |chunk: UploadChunk| {
                let chunk_uploader = chunk_uploader.clone();
                let file_path = file_path.clone();
                let resource_url = resource_url.clone();
                let abort = abort_on_failure.clone();
                async move {
                    let outcome = chunk_uploader
                        .upload(&resource_url, &file_path, &chunk)
                        .await;
                    if !outcome.is_success() && abort.set() {
                        warn!("文件 {} 上传失败，中止剩余分片", file_path.display());
                    }
                    outcome
                }
            })
            .await;

        let result = summarize_chunks(file_size, &outcomes);
        if result.is_success {
            info!("✓ 文件上传完成: {}", file.display());
        } else {
            warn!(
                "文件上传未完成: {}, 已上传 {}/{} bytes",
                file.display(),
                result.successful_upload_size,
                file_size
            );
        }

        result
    }
}

/// 汇总分片结果：失败和跳过的分片都计入失败字节
fn summarize_chunks(
    file_size: u64,
    outcomes: &[(UploadChunk, WorkOutcome<ChunkOutcome>)],
) -> FileUploadResult {
    let mut failed_bytes = 0u64;
    let mut failed_chunks = 0usize;

    for (chunk, outcome) in outcomes {
        if !matches!(outcome, WorkOutcome::Completed(ChunkOutcome::Success)) {
            failed_bytes += chunk.size();
            failed_chunks += 1;
        }
    }

    if failed_chunks > 0 {
        debug!(
            "失败分片 {} 个, 失败字节 {} bytes",
            failed_chunks, failed_bytes
        );
    }

    FileUploadResult {
        is_success: failed_chunks == 0,
        successful_upload_size: file_size.saturating_sub(failed_bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::item_resource_url;
    use crate::uploader::testing::{RecordingDelay, ScriptedTransport};
    use crate::uploader::DEFAULT_RETRY_DELAY;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with_size(size: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        file.write_all(&content).unwrap();
        file
    }

    fn file_uploader(
        transport: Arc<ScriptedTransport>,
        chunk_concurrency: usize,
        max_chunk_size: u64,
    ) -> FileUploader {
        let chunk_uploader = ChunkUploader::new(
            transport,
            Arc::new(RecordingDelay::default()),
            DEFAULT_RETRY_DELAY,
        );
        FileUploader::new(Arc::new(chunk_uploader), chunk_concurrency, max_chunk_size)
    }

    fn url(item_path: &str) -> Url {
        item_resource_url(&Url::parse("http://localhost/upload/1").unwrap(), item_path)
    }

    #[tokio::test]
    async fn test_empty_file_is_success() {
        let file = file_with_size(0);
        let transport = Arc::new(ScriptedTransport::new());
        let uploader = file_uploader(transport.clone(), 2, 8);

        let result = uploader.upload(file.path(), &url("a/empty")).await;

        assert_eq!(
            result,
            FileUploadResult {
                is_success: true,
                successful_upload_size: 0
            }
        );
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_all_chunks_succeed() {
        let file = file_with_size(20);
        let transport = Arc::new(ScriptedTransport::new());
        let uploader = file_uploader(transport.clone(), 2, 8);

        let result = uploader.upload(file.path(), &url("a/file")).await;

        assert!(result.is_success);
        assert_eq!(result.successful_upload_size, 20);

        let mut ranges: Vec<String> = transport
            .calls()
            .iter()
            .map(|c| c.range.to_string())
            .collect();
        ranges.sort();
        assert_eq!(
            ranges,
            vec!["bytes 0-7/20", "bytes 16-19/20", "bytes 8-15/20"]
        );
    }

    #[tokio::test]
    async fn test_first_failure_short_circuits_remaining_chunks() {
        // 单协程，第一个分片失败：后续分片不再请求，全部计入失败
        let file = file_with_size(20);
        let transport = Arc::new(ScriptedTransport::new().script("a/file", 0, &[500]));
        let uploader = file_uploader(transport.clone(), 1, 8);

        let result = uploader.upload(file.path(), &url("a/file")).await;

        assert!(!result.is_success);
        assert_eq!(result.successful_upload_size, 0);
        assert_eq!(transport.calls_for("a/file"), 1);
    }

    #[tokio::test]
    async fn test_middle_failure_keeps_earlier_bytes() {
        let file = file_with_size(20);
        let transport = Arc::new(ScriptedTransport::new().script("a/file", 8, &[503, 503]));
        let uploader = file_uploader(transport.clone(), 1, 8);

        let result = uploader.upload(file.path(), &url("a/file")).await;

        // 分片 0 成功 (8 bytes)，分片 1 重试后失败，分片 2 被跳过
        assert!(!result.is_success);
        assert_eq!(result.successful_upload_size, 8);
        assert_eq!(transport.calls_for("a/file"), 3);
        assert!(transport.calls().iter().all(|c| c.range.start != 16));
    }

    #[tokio::test]
    async fn test_in_flight_chunk_finishes_after_abort() {
        // 两个协程：分片 0 挂起，分片 1 失败；分片 0 仍然完成并计入成功字节，分片 2 被跳过
        let file = file_with_size(20);
        let gate = Arc::new(tokio::sync::Notify::new());
        let transport = Arc::new(
            ScriptedTransport::new()
                .hold("a/file", 0, gate.clone())
                .script("a/file", 8, &[400]),
        );
        let uploader = file_uploader(transport.clone(), 2, 8);

        let path = file.path().to_path_buf();
        let handle = tokio::spawn(async move { uploader.upload(&path, &url("a/file")).await });

        while transport.calls_for("a/file") < 2 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        gate.notify_one();

        let result = handle.await.unwrap();
        assert!(!result.is_success);
        assert_eq!(result.successful_upload_size, 8);
        assert_eq!(transport.calls_for("a/file"), 2);
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        let uploader = file_uploader(transport.clone(), 1, 8);

        let result = uploader
            .upload(Path::new("/nonexistent/file.bin"), &url("a/missing"))
            .await;

        assert_eq!(result, FileUploadResult::failed());
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_summarize_counts_skipped_as_failed() {
        let chunks = calculate_chunks(20, 8);
        let outcomes = vec![
            (chunks[0], WorkOutcome::Completed(ChunkOutcome::Success)),
            (chunks[1], WorkOutcome::Completed(ChunkOutcome::Failure)),
            (chunks[2], WorkOutcome::Skipped),
        ];

        let result = summarize_chunks(20, &outcomes);
        assert!(!result.is_success);
        assert_eq!(result.successful_upload_size, 8);
    }
}
