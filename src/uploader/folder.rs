//! 文件夹扫描模块
//!
//! 负责:
//! - 递归扫描本地文件夹
//! - 将相对路径映射为容器内的 itemPath（`<制品名>/<相对路径>`，统一使用 `/` 分隔）
//! - 生成按相对路径排序的上传列表

use crate::uploader::UploadTarget;
use anyhow::{Context, Result};
use std::path::{Component, Path};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// 文件夹扫描配置
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// 是否跟随符号链接
    pub follow_symlinks: bool,
    /// 跳过隐藏文件（以.开头的文件和文件夹）
    pub skip_hidden: bool,
}

/// 文件夹扫描器
#[derive(Debug, Clone, Default)]
pub struct FolderScanner {
    options: ScanOptions,
}

impl FolderScanner {
    /// 创建默认配置的扫描器
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建自定义配置的扫描器
    pub fn with_options(options: ScanOptions) -> Self {
        Self { options }
    }

    /// 扫描文件夹，生成上传列表
    ///
    /// # 参数
    /// - `root_path`: 要上传的文件夹
    /// - `artifact_name`: 制品名，作为所有 itemPath 的第一级目录
    ///
    /// # 返回
    /// - 所有常规文件，按相对路径排序
    pub fn scan<P: AsRef<Path>>(
        &self,
        root_path: P,
        artifact_name: &str,
    ) -> Result<Vec<UploadTarget>> {
        let root_path = root_path.as_ref();

        if !root_path.exists() {
            anyhow::bail!("扫描路径不存在: {}", root_path.display());
        }

        if !root_path.is_dir() {
            anyhow::bail!("扫描路径不是文件夹: {}", root_path.display());
        }

        info!("开始扫描文件夹: {}", root_path.display());

        let skip_hidden = self.options.skip_hidden;
        let walker = WalkDir::new(root_path)
            .follow_links(self.options.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            // 根目录本身不参与隐藏判断
            .filter_entry(move |entry| !(skip_hidden && entry.depth() > 0 && is_hidden(entry)));

        let mut targets = Vec::new();
        let mut total_size = 0u64;

        for entry in walker {
            let entry = entry.with_context(|| format!("遍历目录失败: {}", root_path.display()))?;

            if !entry.file_type().is_file() {
                if !entry.file_type().is_dir() {
                    debug!("跳过非常规文件: {}", entry.path().display());
                }
                continue;
            }

            let relative_path = entry.path().strip_prefix(root_path).with_context(|| {
                format!(
                    "计算相对路径失败: {} (root: {})",
                    entry.path().display(),
                    root_path.display()
                )
            })?;

            let size = entry
                .metadata()
                .with_context(|| format!("读取文件元数据失败: {}", entry.path().display()))?
                .len();
            total_size += size;

            let remote_item_path = remote_item_path(artifact_name, relative_path);
            debug!("扫描到文件: {} ({})", remote_item_path, format_bytes(size));

            targets.push(UploadTarget::new(entry.path(), remote_item_path));
        }

        targets.sort_by(|a, b| a.remote_item_path.cmp(&b.remote_item_path));

        info!(
            "文件夹扫描完成: {} 个文件，总大小 {}",
            targets.len(),
            format_bytes(total_size)
        );

        Ok(targets)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// 相对路径 -> `<制品名>/<a>/<b>`
fn remote_item_path(artifact_name: &str, relative_path: &Path) -> String {
    let mut item_path = artifact_name.trim_end_matches('/').to_string();
    for component in relative_path.components() {
        if let Component::Normal(part) = component {
            item_path.push('/');
            item_path.push_str(&part.to_string_lossy());
        }
    }
    item_path
}

/// 格式化字节大小
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
