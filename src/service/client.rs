// 制品服务客户端实现

use crate::config::ServiceConfig;
use crate::service::{
    parse_url, ArtifactError, ArtifactResponse, ContentRange, CreateArtifactParameters,
    PatchArtifactSize, ARTIFACT_NAME_PARAM, FILE_LENGTH_HEADER,
};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, error, info};

/// 分片传输能力
///
/// 上传引擎只依赖这一个调用，传输实现需要支持并发使用
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    /// 发送一次分片 PUT，返回服务端状态码
    async fn put_chunk(
        &self,
        resource_url: &Url,
        data: Vec<u8>,
        range: ContentRange,
    ) -> Result<StatusCode, ArtifactError>;
}

/// 容器注册服务（上传前创建容器，上传后更新大小）
#[async_trait]
pub trait ContainerService: Send + Sync {
    async fn create_container(&self, artifact_name: &str)
        -> Result<ArtifactResponse, ArtifactError>;

    async fn patch_artifact_size(&self, size: u64, artifact_name: &str)
        -> Result<(), ArtifactError>;
}

/// 制品服务客户端
#[derive(Debug, Clone)]
pub struct ArtifactClient {
    /// HTTP客户端
    client: Client,
    /// 制品接口地址（创建容器、更新大小共用）
    artifact_url: Url,
    /// Accept 头中的 api-version
    api_version: String,
    /// 运行时令牌（可选）
    runtime_token: Option<String>,
}

impl ArtifactClient {
    /// 创建新的制品服务客户端
    pub fn new(config: &ServiceConfig) -> Result<Self, ArtifactError> {
        let artifact_url = parse_url(&config.artifact_url())?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        info!("初始化制品服务客户端: {}", artifact_url);

        Ok(Self {
            client,
            artifact_url,
            api_version: config.api_version.clone(),
            runtime_token: config.runtime_token.clone(),
        })
    }

    /// 制品接口地址
    pub fn artifact_url(&self) -> &Url {
        &self.artifact_url
    }

    /// 构建带公共请求头的请求
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url).header(
            ACCEPT,
            format!("application/json;api-version={}", self.api_version),
        );

        match &self.runtime_token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }
}

#[async_trait]
impl ChunkTransport for ArtifactClient {
    async fn put_chunk(
        &self,
        resource_url: &Url,
        data: Vec<u8>,
        range: ContentRange,
    ) -> Result<StatusCode, ArtifactError> {
        let response = self
            .request(Method::PUT, resource_url.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_RANGE, range.to_string())
            .header(FILE_LENGTH_HEADER, range.total.to_string())
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("分片上传响应: status={}, range={}, body={}", status, range, body);
        }

        Ok(status)
    }
}

#[async_trait]
impl ContainerService for ArtifactClient {
    async fn create_container(
        &self,
        artifact_name: &str,
    ) -> Result<ArtifactResponse, ArtifactError> {
        let parameters = CreateArtifactParameters::new(artifact_name);

        let response = self
            .request(Method::POST, self.artifact_url.clone())
            .json(&parameters)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() || body.is_empty() {
            error!(
                "创建容器失败: artifact={}, status={}, body={}",
                artifact_name, status, body
            );
            return Err(ArtifactError::ContainerCreation {
                name: artifact_name.to_string(),
                status: status.as_u16(),
            });
        }

        let container: ArtifactResponse =
            serde_json::from_str(&body).map_err(|source| {
                error!("解析容器响应失败: artifact={}, body={}", artifact_name, body);
                ArtifactError::InvalidContainerResponse {
                    name: artifact_name.to_string(),
                    source,
                }
            })?;

        info!(
            "容器创建成功: artifact={}, upload_url={}",
            artifact_name, container.file_container_resource_url
        );

        Ok(container)
    }

    async fn patch_artifact_size(
        &self,
        size: u64,
        artifact_name: &str,
    ) -> Result<(), ArtifactError> {
        let mut url = self.artifact_url.clone();
        url.query_pairs_mut()
            .append_pair(ARTIFACT_NAME_PARAM, artifact_name);

        debug!("更新制品大小: url={}", url);

        let response = self
            .request(Method::PATCH, url)
            .json(&PatchArtifactSize { size })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        check_patch_status(status, artifact_name).map_err(|e| {
            error!("更新制品大小失败: {}, body={}", e, body);
            e
        })?;

        debug!(
            "制品 {} 上传完成, 总大小 {} bytes, body={}",
            artifact_name, size, body
        );
        Ok(())
    }
}

/// 更新大小请求的状态码处理：404 单独区分
fn check_patch_status(status: StatusCode, artifact_name: &str) -> Result<(), ArtifactError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::NOT_FOUND {
        Err(ArtifactError::ArtifactNotFound(artifact_name.to_string()))
    } else {
        Err(ArtifactError::Finalize {
            name: artifact_name.to_string(),
            status: status.as_u16(),
        })
    }
}
