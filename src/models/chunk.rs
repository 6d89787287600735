use serde::{Deserialize, Serialize};

/// PDF 单页文本，页码从 1 开始
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_num: usize,
    pub text: String,
}

/// 页面分块，`page_start..=page_end`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub page_start: usize,
    pub page_end: usize,
}

impl Chunk {
    pub fn new(index: usize, page_start: usize, page_end: usize) -> Self {
        Self {
            chunk_id: format!("chunk_{:03}", index),
            page_start,
            page_end,
        }
    }
}
