// 制品服务数据类型

use crate::service::ArtifactError;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 容器类型（固定值）
pub const CONTAINER_TYPE: &str = "actions_storage";

/// 分片上传时携带文件总大小的请求头
pub const FILE_LENGTH_HEADER: &str = "x-tfs-filelength";

/// 分片上传目标路径的查询参数名
pub const ITEM_PATH_PARAM: &str = "itemPath";

/// 更新大小时制品名的查询参数名
pub const ARTIFACT_NAME_PARAM: &str = "artifactName";

/// 创建容器请求
#[derive(Debug, Clone, Serialize)]
pub struct CreateArtifactParameters {
    #[serde(rename = "Type")]
    pub container_type: String,
    #[serde(rename = "Name")]
    pub name: String,
}

impl CreateArtifactParameters {
    pub fn new(name: &str) -> Self {
        Self {
            container_type: CONTAINER_TYPE.to_string(),
            name: name.to_string(),
        }
    }
}

/// 创建容器响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResponse {
    /// 容器ID（服务端可能返回数字或字符串）
    #[serde(default)]
    pub container_id: serde_json::Value,
    /// 初始大小（创建时为 -1）
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub signed_content: Option<String>,
    /// 分片上传的基础地址
    pub file_container_resource_url: String,
    #[serde(rename = "type", default)]
    pub artifact_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// 更新制品大小请求
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatchArtifactSize {
    #[serde(rename = "Size")]
    pub size: u64,
}

/// 分片的 Content-Range 描述（end 为闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// 是否为成功状态码（2xx）
pub fn is_success_status(status: StatusCode) -> bool {
    status.is_success()
}

/// 是否为可重试状态码（限流或临时性服务端错误）
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// 解析地址
pub fn parse_url(url: &str) -> Result<Url, ArtifactError> {
    Url::parse(url).map_err(|e| ArtifactError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// 在基础上传地址上追加 itemPath 参数，得到单个文件的上传地址
pub fn item_resource_url(upload_url: &Url, item_path: &str) -> Url {
    let mut url = upload_url.clone();
    url.query_pairs_mut().append_pair(ITEM_PATH_PARAM, item_path);
    url
}
