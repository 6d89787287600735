//! 分块处理上下文
//!
//! 封装"我正在处理哪个运行的第几个分块"这一信息

use std::fmt::Display;

use crate::models::Chunk;

/// 分块处理上下文
#[derive(Debug, Clone)]
pub struct ChunkCtx<'a> {
    /// 运行ID（仅用于日志显示）
    pub run_id: &'a str,

    /// 当前分块
    pub chunk: &'a Chunk,

    /// 分块序号（从1开始）
    pub chunk_index: usize,

    /// 分块总数
    pub total_chunks: usize,
}

impl<'a> ChunkCtx<'a> {
    pub fn new(run_id: &'a str, chunk: &'a Chunk, chunk_index: usize, total_chunks: usize) -> Self {
        Self {
            run_id,
            chunk,
            chunk_index,
            total_chunks,
        }
    }
}

impl Display for ChunkCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[分块 {} {}/{} 页 {}-{}]",
            self.chunk.chunk_id,
            self.chunk_index,
            self.total_chunks,
            self.chunk.page_start,
            self.chunk.page_end
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let chunk = Chunk::new(2, 6, 10);
        let ctx = ChunkCtx::new("run", &chunk, 2, 3);
        assert_eq!(ctx.to_string(), "[分块 chunk_002 2/3 页 6-10]");
    }
}
