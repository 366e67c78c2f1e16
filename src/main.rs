use anyhow::Context;
use artifact_uploader_rust::{
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    logging, ArtifactClient, ArtifactUploader, FolderScanner, UploadOptions,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// 将本地文件夹作为制品并发上传到制品服务
#[derive(Debug, Parser)]
#[command(name = "artifact-uploader", version, about)]
struct Args {
    /// 制品名
    artifact_name: String,

    /// 要上传的本地文件夹
    root_dir: PathBuf,

    /// 配置文件路径（默认 config/app.toml，不存在时使用默认配置）
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 任一文件失败后停止上传剩余文件
    #[arg(long)]
    fail_fast: bool,
}

/// 加载配置
///
/// 显式指定的配置文件必须存在；默认路径不存在时返回默认配置和一条提示
async fn load_config(path: Option<&Path>) -> anyhow::Result<(AppConfig, Option<String>)> {
    match path {
        Some(path) => {
            let config = AppConfig::load_from_file(&path.to_string_lossy()).await?;
            Ok((config, None))
        }
        None if !Path::new(DEFAULT_CONFIG_PATH).exists() => Ok((
            AppConfig::default(),
            Some(format!("未找到配置文件 {}，使用默认配置", DEFAULT_CONFIG_PATH)),
        )),
        None => Ok((AppConfig::load_from_file(DEFAULT_CONFIG_PATH).await?, None)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (mut config, load_warning) = load_config(args.config.as_deref()).await?;
    config.apply_env_overrides();
    if args.fail_fast {
        config.upload.continue_on_error = false;
    }

    // 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&config.log);

    if let Some(message) = load_warning {
        warn!("{}", message);
    }

    info!("Artifact Uploader v{} 启动中...", env!("CARGO_PKG_VERSION"));

    config.validate().context("配置校验失败")?;

    let targets = FolderScanner::new()
        .scan(&args.root_dir, &args.artifact_name)
        .with_context(|| format!("扫描上传目录失败: {}", args.root_dir.display()))?;

    let client = ArtifactClient::new(&config.service).context("初始化制品服务客户端失败")?;
    let uploader = ArtifactUploader::new(Arc::new(client.clone()), &config.upload);

    let result = uploader
        .upload_artifact(
            &client,
            &args.artifact_name,
            &targets,
            UploadOptions::from(&config.upload),
        )
        .await
        .with_context(|| format!("上传制品失败: {}", args.artifact_name))?;

    for item in &result.failed_items {
        warn!("未完整上传: {}", item.display());
    }

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
