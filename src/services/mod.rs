//! 业务能力层（Services）
//!
//! 每个模块只描述"我能做什么"，不关心流程顺序

pub mod chunker;
pub mod explainer;
pub mod llm_service;
pub mod mock_llm;
pub mod prompt_assembler;
pub mod response_parser;
pub mod schema;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{Chunk, QuestionType};

pub use explainer::Explainer;
pub use llm_service::LlmService;
pub use mock_llm::MockLlm;
pub use prompt_assembler::PromptAssembler;

/// 一次生成请求（一个分块）
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub chunk: &'a Chunk,
    /// 已组装好的完整提示词
    pub prompt: &'a str,
    pub question_type: QuestionType,
    pub choices_per_question: usize,
    pub questions_per_partition: usize,
    /// 多选题每道题的正确答案数；单选题为空
    pub correct_counts: &'a [usize],
}

/// 模型能力
///
/// 在线服务和离线 mock 实现同一接口，流程层不区分两者
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// 用于日志和 manifest 的简短描述
    fn describe(&self) -> String;

    /// 为一个分块生成题目，返回原始 JSON 文本
    async fn generate(&self, request: &GenerationRequest<'_>) -> AppResult<String>;

    /// 返回一道题的解析文本
    async fn explain(&self, prompt: &str) -> AppResult<String>;
}
