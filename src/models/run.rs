use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::question::{Question, QuestionType};

pub const SCHEMA_VERSION: u32 = 1;

/// 运行清单（manifest.json）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub run_id: String,
    pub created_at: String,
    pub context_file: String,
    pub config_file: String,
    /// `live` 或 `mock`
    pub llm_mode: String,
    pub prompt_files: PromptFiles,
    pub llm: LlmSnapshot,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// 本次运行使用的提示词文件（绝对路径）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptFiles {
    pub user: String,
    pub mcq_fixed: String,
    pub sata_fixed: String,
    pub explanation: String,
}

/// 模型参数快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSnapshot {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub explain_max_output_tokens: u32,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
}

/// 题目集合（output.json）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub schema_version: u32,
    pub run_id: String,
    pub context_file: String,
    pub settings: RunSettings,
    pub questions: Vec<Question>,
}

impl RunOutput {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn question_mut(&mut self, id: &str) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| q.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub question_type: QuestionType,
    pub choices_per_question: usize,
    pub questions_per_partition: usize,
    pub randomize_questions: bool,
    pub randomize_options: bool,
}

/// 答错题目列表（wrong_ids.json）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrongAnswers {
    pub wrong_question_ids: Vec<String>,
}

/// 作答记录（results.json）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResults {
    pub run_id: String,
    pub finished_at: String,
    pub total: usize,
    pub correct: usize,
    pub percent: f64,
    /// 题目ID -> 选择的选项ID
    pub answers: BTreeMap<String, Vec<String>>,
    pub wrong_question_ids: Vec<String>,
}
