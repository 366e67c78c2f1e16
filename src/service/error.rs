// 制品服务错误类型
//
// 只有创建容器和更新大小这两个调用会产生致命错误，
// 分片和文件级别的失败以数据形式汇总在上传结果中。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    /// 创建容器被服务端拒绝（或响应体为空）
    #[error("无法为制品 {name} 创建容器: HTTP {status}")]
    ContainerCreation { name: String, status: u16 },

    /// 创建容器成功但响应无法解析
    #[error("制品 {name} 的容器响应解析失败: {source}")]
    InvalidContainerResponse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// 更新大小时服务端返回 404
    #[error("未找到名为 {0} 的制品")]
    ArtifactNotFound(String),

    /// 更新大小时服务端返回其他非成功状态
    #[error("无法完成制品 {name} 的上传: HTTP {status}")]
    Finalize { name: String, status: u16 },

    /// 地址无法解析
    #[error("无效的地址 {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP 传输层错误
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),
}

impl ArtifactError {
    /// 是否为"制品不存在"
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArtifactError::ArtifactNotFound(_))
    }
}
