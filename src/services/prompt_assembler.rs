//! 提示词组装 - 业务能力层
//!
//! `最终提示词 = 用户提示词 + 题型固定提示词`，再做一次占位符替换。
//! 除了读取模板文件之外没有副作用。

use rand::Rng;
use std::path::Path;
use tracing::warn;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::QuestionType;
use crate::services::schema::generation_schema;

/// 生成提示词组装器
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    template: String,
    question_type: QuestionType,
    choices_per_question: usize,
    questions_per_partition: usize,
}

impl PromptAssembler {
    /// 读取用户提示词和题型对应的固定提示词
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        let question_type = config.generation.question_type;
        let user_text = read_template(&config.prompts.user_prompt_file).await?;
        let fixed_text = read_template(config.prompts.fixed_prompt_file(question_type)).await?;
        Ok(Self::new(
            &user_text,
            &fixed_text,
            question_type,
            config.generation.choices_per_question,
            config.generation.questions_per_partition,
        ))
    }

    pub fn new(
        user_text: &str,
        fixed_text: &str,
        question_type: QuestionType,
        choices_per_question: usize,
        questions_per_partition: usize,
    ) -> Self {
        let template = format!("{}\n\n{}", user_text.trim(), fixed_text.trim())
            .trim()
            .to_string();
        Self {
            template,
            question_type,
            choices_per_question,
            questions_per_partition,
        }
    }

    /// 为一个分块生成最终提示词
    ///
    /// `correct_counts` 只在多选题中使用，长度等于每块题目数
    pub fn assemble(&self, chunk_text: &str, correct_counts: &[usize]) -> String {
        let note = match self.question_type {
            QuestionType::Mcq => String::new(),
            QuestionType::Sata => correct_counts_note(correct_counts),
        };
        let schema = serde_json::to_string_pretty(&generation_schema(self.choices_per_question))
            .unwrap_or_default();

        render_template(
            &self.template,
            &[
                ("question_type", self.question_type.to_string()),
                ("choices_per_question", self.choices_per_question.to_string()),
                ("questions_per_partition", self.questions_per_partition.to_string()),
                ("context", chunk_text.to_string()),
                ("correct_counts_note", note),
                ("output_schema", schema),
            ],
        )
    }
}

pub async fn read_template(path: &Path) -> AppResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::io(path, e))
}

/// 多选题每道题的正确答案数，均匀取自 `1..=choices_per_question`
pub fn draw_correct_counts<R: Rng + ?Sized>(
    rng: &mut R,
    questions: usize,
    choices_per_question: usize,
) -> Vec<usize> {
    (0..questions)
        .map(|_| rng.gen_range(1..=choices_per_question))
        .collect()
}

pub fn correct_counts_note(counts: &[usize]) -> String {
    if counts.is_empty() {
        return String::new();
    }
    let list: Vec<String> = counts.iter().map(|c| c.to_string()).collect();
    format!(
        "SATA only: Use these exact correct-choice counts per question, in order: {}.",
        list.join(", ")
    )
}

/// 单遍替换 `{name}` 占位符
///
/// - 替换后的内容不会再被扫描（PDF 文本中的花括号是安全的）
/// - `{{` / `}}` 输出字面量花括号
/// - 未知占位符原样保留
pub fn render_template(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !name.is_empty() && chars.peek() == Some(&'}') {
                    chars.next();
                    match vars.iter().find(|(k, _)| *k == name) {
                        Some((_, value)) => out.push_str(value),
                        None => {
                            warn!("⚠️ 提示词中存在未知占位符: {{{}}}", name);
                            out.push('{');
                            out.push_str(&name);
                            out.push('}');
                        }
                    }
                } else {
                    out.push('{');
                    out.push_str(&name);
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(ch),
        }
    }

    out
}
