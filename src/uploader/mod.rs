// 上传引擎模块
//
// 三层结构：
// - 制品：文件级并发，continue_on_error 控制失败后是否继续
// - 文件：分片级并发，任一分片失败后不再发起新的分片
// - 分片：单次 PUT，可重试错误固定等待后重试一次
//
// 文件级和分片级共用同一个有界工作池（pool）

pub mod artifact;
pub mod chunk;
pub mod file;
pub mod folder;
pub mod pool;

#[cfg(test)]
pub(crate) mod testing;

pub use artifact::{
    ArtifactUploadResult, ArtifactUploader, ItemReport, ItemStatus, UploadOptions, UploadTarget,
};
pub use chunk::{
    calculate_chunks, ChunkOutcome, ChunkUploader, RetryDelay, TokioDelay, UploadChunk,
    DEFAULT_RETRY_DELAY, DEFAULT_UPLOAD_CHUNK_SIZE,
};
pub use file::{FileUploadResult, FileUploader};
pub use folder::{FolderScanner, ScanOptions};
pub use pool::{AbortFlag, WorkOutcome, WorkerPool};
