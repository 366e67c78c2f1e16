// Artifact Uploader Rust Library
// 制品并发上传核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 制品服务模块
pub mod service;

// 上传引擎模块
pub mod uploader;

// 导出常用类型
pub use config::AppConfig;
pub use service::{ArtifactClient, ArtifactError, ChunkTransport, ContainerService};
pub use uploader::{
    ArtifactUploadResult, ArtifactUploader, FolderScanner, ItemReport, ItemStatus, UploadOptions,
    UploadTarget,
};
