// 制品服务模块
//
// 对外部制品服务的最小封装：
// - 创建容器（POST）
// - 分片上传（PUT）
// - 更新制品大小（PATCH）

pub mod client;
pub mod error;
pub mod types;

pub use client::{ArtifactClient, ChunkTransport, ContainerService};
pub use error::ArtifactError;
pub use types::*;
