//! PDF 加载器 - 基础设施层
//!
//! 只暴露"按页提取文本"的能力，不关心分块和题目

use lopdf::Document;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{AppResult, ExtractionError};
use crate::models::Page;

/// PDF 加载器
pub struct PdfLoader;

impl PdfLoader {
    /// 提取每一页的文本（页码从 1 开始）
    ///
    /// 解析是阻塞操作，放到 `spawn_blocking` 中执行
    pub async fn load(path: &Path) -> AppResult<Vec<Page>> {
        let owned = path.to_path_buf();
        // 后台线程沿用当前运行的日志分发器
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());
        let pages = tokio::task::spawn_blocking(move || {
            tracing::dispatcher::with_default(&dispatch, || Self::load_blocking(&owned))
        })
        .await
        .map_err(|e| ExtractionError::TaskFailed(e.to_string()))??;
        Ok(pages)
    }

    /// 同步版本
    pub fn load_blocking(path: &Path) -> AppResult<Vec<Page>> {
        if !path.exists() {
            return Err(ExtractionError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let doc = Document::load(path).map_err(|source| ExtractionError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let total = page_numbers.len();
        if total == 0 {
            return Err(ExtractionError::NoPages {
                path: path.to_path_buf(),
            }
            .into());
        }
        info!("📄 PDF 已打开: {} (共 {} 页)", display_name(path), total);

        let mut pages = Vec::with_capacity(total);
        for (idx, page_num) in page_numbers.into_iter().enumerate() {
            let text = page_text_or_empty(page_num, doc.extract_text(&[page_num]));
            debug!("第 {} 页: {} 字符", page_num, text.chars().count());
            pages.push(Page {
                page_num: idx + 1,
                text,
            });

            if (idx + 1) % 10 == 0 {
                info!("已提取 {}/{} 页...", idx + 1, total);
            }
        }

        Ok(pages)
    }
}

/// 单页提取失败时按空页处理，不影响整个文档
fn page_text_or_empty<E: std::fmt::Display>(
    page_num: u32,
    extracted: Result<String, E>,
) -> String {
    match extracted {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!("⚠️ 第 {} 页文本提取失败，按空页处理: {}", page_num, e);
            String::new()
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}
