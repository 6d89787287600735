//! 分块服务 - 业务能力层
//!
//! 把页面序列切分成若干生成批次，相同输入总是得到相同结果

use crate::config::{PartitionConfig, PartitionStrategy};
use crate::error::{AppError, AppResult};
use crate::models::{Chunk, Page};

/// 按配置切分页面
pub fn make_chunks(total_pages: usize, config: &PartitionConfig) -> AppResult<Vec<Chunk>> {
    match config.strategy {
        PartitionStrategy::Pages => {
            chunks_by_pages(total_pages, config.pages_per_partition, config.overlap_pages)
        }
        PartitionStrategy::Count => chunks_by_count(total_pages, config.chunk_count),
    }
}

/// 固定窗口 + 重叠
pub fn chunks_by_pages(
    total_pages: usize,
    pages_per_partition: usize,
    overlap_pages: usize,
) -> AppResult<Vec<Chunk>> {
    if pages_per_partition == 0 {
        return Err(AppError::invalid_field(
            "partitioning.pages_per_partition",
            "必须 >= 1",
        ));
    }
    if overlap_pages >= pages_per_partition {
        return Err(AppError::invalid_field(
            "partitioning.overlap_pages",
            "必须满足 0 <= overlap < pages_per_partition",
        ));
    }

    let stride = pages_per_partition - overlap_pages;
    let mut chunks = Vec::new();
    let mut start = 1;
    while start <= total_pages {
        let end = (start + pages_per_partition - 1).min(total_pages);
        chunks.push(Chunk::new(chunks.len() + 1, start, end));
        if end == total_pages {
            break;
        }
        start += stride;
    }
    Ok(chunks)
}

/// 固定块数，余数分给靠前的块
pub fn chunks_by_count(total_pages: usize, chunk_count: usize) -> AppResult<Vec<Chunk>> {
    if chunk_count == 0 {
        return Err(AppError::invalid_field(
            "partitioning.chunk_count",
            "必须 >= 1",
        ));
    }

    let count = chunk_count.min(total_pages);
    if count == 0 {
        return Ok(Vec::new());
    }
    let base = total_pages / count;
    let remainder = total_pages % count;

    let mut chunks = Vec::with_capacity(count);
    let mut start = 1;
    for i in 0..count {
        let size = base + usize::from(i < remainder);
        let end = start + size - 1;
        chunks.push(Chunk::new(i + 1, start, end));
        start = end + 1;
    }
    Ok(chunks)
}

/// 拼接分块文本，每页前加 `[Page N]` 标记
pub fn build_chunk_text(pages: &[Page], chunk: &Chunk) -> String {
    let parts: Vec<String> = (chunk.page_start..=chunk.page_end)
        .map(|n| {
            let text = pages
                .iter()
                .find(|p| p.page_num == n)
                .map(|p| p.text.as_str())
                .unwrap_or("");
            format!("[Page {}]\n{}", n, text).trim().to_string()
        })
        .collect();
    parts.join("\n\n").trim().to_string()
}
