//! 分块生成流程 - 流程层
//!
//! 核心职责：定义"一个分块"的完整生成流程
//!
//! 流程顺序：
//! 1. 拼接分块文本
//! 2. 多选题抽取每道题的正确答案数
//! 3. 组装提示词 → 调用模型
//! 4. 解析并校验输出

use rand::Rng;
use tracing::{debug, error, info};

use crate::error::AppResult;
use crate::models::{Page, Question, QuestionType};
use crate::services::chunker::build_chunk_text;
use crate::services::prompt_assembler::draw_correct_counts;
use crate::services::response_parser::{parse_chunk_response, ChunkExpectation};
use crate::services::{GenerationRequest, LlmBackend, PromptAssembler};
use crate::utils::logging::truncate_text;
use crate::workflow::chunk_ctx::ChunkCtx;

/// 分块生成流程
///
/// - 编排单个分块的生成流程
/// - 不持有任何文件或运行目录
/// - 只依赖业务能力（services）
pub struct ChunkFlow<'a> {
    backend: &'a dyn LlmBackend,
    assembler: &'a PromptAssembler,
    question_type: QuestionType,
    choices_per_question: usize,
    questions_per_partition: usize,
}

impl<'a> ChunkFlow<'a> {
    pub fn new(
        backend: &'a dyn LlmBackend,
        assembler: &'a PromptAssembler,
        question_type: QuestionType,
        choices_per_question: usize,
        questions_per_partition: usize,
    ) -> Self {
        Self {
            backend,
            assembler,
            question_type,
            choices_per_question,
            questions_per_partition,
        }
    }

    /// 生成一个分块的题目
    ///
    /// 随机数只在多选题中用于抽取正确答案数
    pub async fn run<R: Rng + ?Sized>(
        &self,
        pages: &[Page],
        ctx: &ChunkCtx<'_>,
        rng: &mut R,
    ) -> AppResult<Vec<Question>> {
        let chunk = ctx.chunk;
        let chunk_text = build_chunk_text(pages, chunk);
        debug!("{} 📄 文本预览: {}", ctx, truncate_text(&chunk_text, 80));

        let correct_counts = match self.question_type {
            QuestionType::Mcq => Vec::new(),
            QuestionType::Sata => {
                let counts =
                    draw_correct_counts(rng, self.questions_per_partition, self.choices_per_question);
                debug!("{} 🎯 正确答案数: {:?}", ctx, counts);
                counts
            }
        };

        let prompt = self.assembler.assemble(&chunk_text, &correct_counts);
        debug!("{} 提示词长度: {} 字符", ctx, prompt.len());

        info!("{} 🤖 正在请求 {} 生成题目...", ctx, self.backend.describe());
        let request = GenerationRequest {
            chunk,
            prompt: &prompt,
            question_type: self.question_type,
            choices_per_question: self.choices_per_question,
            questions_per_partition: self.questions_per_partition,
            correct_counts: &correct_counts,
        };
        let raw = self.backend.generate(&request).await.map_err(|e| {
            error!("{} ❌ 模型调用失败: {}", ctx, e);
            e
        })?;

        let expectation = ChunkExpectation {
            chunk_id: &chunk.chunk_id,
            question_type: self.question_type,
            choices_per_question: self.choices_per_question,
            questions_per_partition: self.questions_per_partition,
            correct_counts: &correct_counts,
        };
        let questions = parse_chunk_response(&raw, &expectation).map_err(|e| {
            error!("{} ❌ 输出校验失败: {}", ctx, e);
            debug!("{} 原始输出: {}", ctx, truncate_text(&raw, 500));
            e
        })?;

        info!("{} ✓ 生成 {} 道题目", ctx, questions.len());
        Ok(questions)
    }
}
