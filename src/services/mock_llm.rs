//! 离线 LLM - 业务能力层
//!
//! 不访问网络，按请求生成确定的占位题目，输出结构与在线模型相同

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::services::schema::{RawBatch, RawChoice, RawQuestion};
use crate::services::{GenerationRequest, LlmBackend};

/// 离线占位模型
#[derive(Debug, Default, Clone)]
pub struct MockLlm;

impl MockLlm {
    pub fn new() -> Self {
        Self
    }

    /// 生成一个分块的占位题目
    pub fn mock_batch(request: &GenerationRequest<'_>) -> RawBatch {
        let n_choices = request.choices_per_question;
        let chunk = request.chunk;

        let questions = (0..request.questions_per_partition)
            .map(|i| {
                let choices: Vec<RawChoice> = (1..=n_choices)
                    .map(|k| RawChoice {
                        id: format!("c{}", k),
                        text: format!("Mock option {} ({})", k, chunk.chunk_id),
                    })
                    .collect();

                let wanted = request.correct_counts.get(i).copied().unwrap_or(1).clamp(1, n_choices);
                // 从一个随题目位置变化的起点连续取 wanted 个
                let offset = (i + 1) % n_choices;
                let correct_choice_ids = (0..wanted)
                    .map(|j| choices[(offset + j) % n_choices].id.clone())
                    .collect();

                RawQuestion {
                    stem: format!(
                        "[MOCK] Q{} for {} (pages {}-{}): Which option is correct?",
                        i + 1,
                        chunk.chunk_id,
                        chunk.page_start,
                        chunk.page_end
                    ),
                    choices,
                    correct_choice_ids,
                }
            })
            .collect();

        RawBatch { questions }
    }
}

#[async_trait]
impl LlmBackend for MockLlm {
    fn describe(&self) -> String {
        "mock".to_string()
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> AppResult<String> {
        let batch = Self::mock_batch(request);
        debug!(
            "Mock 为 {} 生成 {} 道题目",
            request.chunk.chunk_id,
            batch.questions.len()
        );
        serde_json::to_string_pretty(&batch)
            .map_err(|e| AppError::parse_json("无法序列化 mock 输出", e))
    }

    async fn explain(&self, prompt: &str) -> AppResult<String> {
        let first_line = prompt.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        Ok(format!(
            "[MOCK] Explanation generated offline. Prompt starts with: {}",
            first_line.trim()
        ))
    }
}
