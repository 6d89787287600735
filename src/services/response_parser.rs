//! 响应解析与校验 - 业务能力层
//!
//! 把模型原始输出转成题目记录，并按配置校验选项数与正确答案数

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{AppError, AppResult, ValidationError};
use crate::models::question::format_question_id;
use crate::models::{Choice, Question, QuestionType};
use crate::services::schema::RawBatch;

/// 对一个分块输出的期望
#[derive(Debug, Clone, Copy)]
pub struct ChunkExpectation<'a> {
    pub chunk_id: &'a str,
    pub question_type: QuestionType,
    pub choices_per_question: usize,
    pub questions_per_partition: usize,
    /// 多选题每道题要求的正确答案数；单选题为空
    pub correct_counts: &'a [usize],
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").ok())
        .as_ref()
}

/// 从模型输出中取出 JSON 对象（去掉代码块和前后说明文字）
pub fn extract_json(raw: &str) -> Option<&str> {
    let body = match fence_regex()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
    {
        Some(m) => m.as_str(),
        None => raw,
    };
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&body[start..=end])
}

/// 解析并校验一个分块的输出
///
/// 返回的题目还没有编号，编号在 [`finalize_questions`] 中统一分配
pub fn parse_chunk_response(raw: &str, exp: &ChunkExpectation<'_>) -> AppResult<Vec<Question>> {
    let json = extract_json(raw)
        .ok_or_else(|| AppError::parse(format!("{}: 模型输出中没有 JSON 对象", exp.chunk_id)))?;
    let batch: RawBatch = serde_json::from_str(json).map_err(|e| {
        AppError::parse_json(format!("{}: 模型输出不是合法的题目 JSON", exp.chunk_id), e)
    })?;

    if batch.questions.len() != exp.questions_per_partition {
        return Err(ValidationError::QuestionCount {
            chunk_id: exp.chunk_id.to_string(),
            expected: exp.questions_per_partition,
            actual: batch.questions.len(),
        }
        .into());
    }

    let mut questions = Vec::with_capacity(batch.questions.len());
    for (idx, raw_q) in batch.questions.into_iter().enumerate() {
        let position = idx + 1;

        let stem = raw_q.stem.trim().to_string();
        if stem.is_empty() {
            return Err(AppError::malformed(exp.chunk_id, position, "题干为空"));
        }

        if raw_q.choices.len() != exp.choices_per_question {
            return Err(ValidationError::ChoiceCount {
                chunk_id: exp.chunk_id.to_string(),
                position,
                expected: exp.choices_per_question,
                actual: raw_q.choices.len(),
            }
            .into());
        }

        let mut seen = HashSet::new();
        let mut choices = Vec::with_capacity(raw_q.choices.len());
        for c in raw_q.choices {
            let id = c.id.trim().to_string();
            let text = c.text.trim().to_string();
            if id.is_empty() || !seen.insert(id.clone()) {
                return Err(AppError::malformed(exp.chunk_id, position, "选项ID必须非空且唯一"));
            }
            if text.is_empty() {
                return Err(AppError::malformed(
                    exp.chunk_id,
                    position,
                    format!("选项 {} 内容为空", id),
                ));
            }
            choices.push(Choice { id, text });
        }

        let correct: Vec<String> = raw_q
            .correct_choice_ids
            .iter()
            .map(|id| id.trim().to_string())
            .collect();
        let unique: HashSet<&String> = correct.iter().collect();
        if correct.is_empty() || unique.len() != correct.len() {
            return Err(AppError::malformed(
                exp.chunk_id,
                position,
                "正确答案必须非空且不重复",
            ));
        }
        if let Some(unknown) = correct.iter().find(|id| !seen.contains(*id)) {
            return Err(AppError::malformed(
                exp.chunk_id,
                position,
                format!("正确答案 {} 不在选项中", unknown),
            ));
        }

        let expected_correct = match exp.question_type {
            QuestionType::Mcq => 1,
            QuestionType::Sata => *exp.correct_counts.get(idx).ok_or_else(|| {
                AppError::malformed(exp.chunk_id, position, "缺少该题的正确答案数量要求")
            })?,
        };
        if correct.len() != expected_correct {
            return Err(ValidationError::CorrectCount {
                chunk_id: exp.chunk_id.to_string(),
                position,
                expected: expected_correct,
                actual: correct.len(),
            }
            .into());
        }

        questions.push(Question {
            id: String::new(),
            question_type: exp.question_type,
            stem,
            choices,
            correct_choice_ids: correct,
            chunk_id: exp.chunk_id.to_string(),
            explanation: String::new(),
        });
    }

    debug!("{}: 解析出 {} 道题目", exp.chunk_id, questions.len());
    Ok(questions)
}

/// 打乱题目 / 选项顺序后统一编号 `q_0001...`
///
/// 选项ID稳定，打乱选项不需要重新映射正确答案
pub fn finalize_questions<R: Rng + ?Sized>(
    mut questions: Vec<Question>,
    randomize_questions: bool,
    randomize_options: bool,
    rng: &mut R,
) -> Vec<Question> {
    if randomize_questions {
        questions.shuffle(rng);
    }
    if randomize_options {
        for q in questions.iter_mut() {
            q.choices.shuffle(rng);
        }
    }
    for (i, q) in questions.iter_mut().enumerate() {
        q.id = format_question_id(i + 1);
    }
    questions
}
