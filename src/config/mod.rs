// 配置管理模块

use crate::uploader::{DEFAULT_RETRY_DELAY, DEFAULT_UPLOAD_CHUNK_SIZE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 运行时服务地址环境变量
pub const ENV_RUNTIME_URL: &str = "ACTIONS_RUNTIME_URL";
/// 运行时令牌环境变量
pub const ENV_RUNTIME_TOKEN: &str = "ACTIONS_RUNTIME_TOKEN";
/// 工作流运行ID环境变量
pub const ENV_RUN_ID: &str = "GITHUB_RUN_ID";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 制品服务配置
    #[serde(default)]
    pub service: ServiceConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    false
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 同时上传的文件数
    #[serde(default = "default_file_concurrency")]
    pub file_concurrency: usize,
    /// 单个文件同时上传的分片数
    #[serde(default = "default_chunk_concurrency")]
    pub chunk_concurrency: usize,
    /// 分片大小上限（字节）
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// 可重试错误的等待时间（秒）
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// 某个文件失败后是否继续上传其余文件
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,
}

fn default_file_concurrency() -> usize {
    2
}

fn default_chunk_concurrency() -> usize {
    1
}

fn default_chunk_size() -> u64 {
    DEFAULT_UPLOAD_CHUNK_SIZE
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY.as_secs()
}

fn default_continue_on_error() -> bool {
    true
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            file_concurrency: default_file_concurrency(),
            chunk_concurrency: default_chunk_concurrency(),
            chunk_size: default_chunk_size(),
            retry_delay_secs: default_retry_delay_secs(),
            continue_on_error: default_continue_on_error(),
        }
    }
}

/// 制品服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// 运行时服务地址，如 "https://pipelines.actions.githubusercontent.com/xxx/"
    #[serde(default)]
    pub runtime_url: String,
    /// 工作流运行ID
    #[serde(default)]
    pub run_id: String,
    /// 运行时令牌（作为 Bearer 令牌发送）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_token: Option<String>,
    /// 接口版本
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// 单个请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_version() -> String {
    "6.0-preview".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            runtime_url: String::new(),
            run_id: String::new(),
            runtime_token: None,
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    /// 制品接口地址
    pub fn artifact_url(&self) -> String {
        let separator = if self.runtime_url.ends_with('/') { "" } else { "/" };
        format!(
            "{}{}_apis/pipelines/workflows/{}/artifacts?api-version={}",
            self.runtime_url, separator, self.run_id, self.api_version
        )
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("读取配置文件失败: {}", path))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path))?;

        Ok(config)
    }

    /// 使用环境变量覆盖服务配置
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// 使用给定的查找函数覆盖服务配置（空值忽略）
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_RUNTIME_URL) {
            self.service.runtime_url = url;
        }
        if let Some(token) = lookup(ENV_RUNTIME_TOKEN) {
            self.service.runtime_token = Some(token);
        }
        if let Some(run_id) = lookup(ENV_RUN_ID) {
            self.service.run_id = run_id;
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.upload.file_concurrency == 0 {
            anyhow::bail!("file_concurrency 必须大于 0");
        }
        if self.upload.chunk_concurrency == 0 {
            anyhow::bail!("chunk_concurrency 必须大于 0");
        }
        if self.upload.chunk_size == 0 {
            anyhow::bail!("chunk_size 必须大于 0");
        }
        if self.service.runtime_url.trim().is_empty() {
            anyhow::bail!("未配置运行时服务地址（{}）", ENV_RUNTIME_URL);
        }
        if self.service.run_id.trim().is_empty() {
            anyhow::bail!("未配置工作流运行ID（{}）", ENV_RUN_ID);
        }
        Ok(())
    }
}
