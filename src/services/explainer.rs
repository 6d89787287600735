//! 错题解析服务 - 业务能力层
//!
//! 按题目ID查找错题，为每道题构建解析提示词并调用模型

use std::collections::{BTreeMap, HashSet};
use tracing::info;

use crate::error::{AppResult, NotFoundError};
use crate::models::question::index_to_letter;
use crate::models::{Question, RunOutput};
use crate::services::prompt_assembler::render_template;
use crate::services::LlmBackend;

/// 错题解析器
pub struct Explainer<'a> {
    backend: &'a dyn LlmBackend,
    template: String,
}

impl<'a> Explainer<'a> {
    pub fn new(backend: &'a dyn LlmBackend, template: impl Into<String>) -> Self {
        Self {
            backend,
            template: template.into(),
        }
    }

    /// 为错题写入解析
    ///
    /// 先校验所有ID，任何一个不存在就直接失败，不会调用模型。
    /// 重复ID只解析一次。第一次调用失败即终止，此时 `output` 保持不变。
    pub async fn explain(
        &self,
        output: &mut RunOutput,
        wrong_ids: &[String],
    ) -> AppResult<BTreeMap<String, String>> {
        let mut seen = HashSet::new();
        let ids: Vec<&String> = wrong_ids.iter().filter(|id| seen.insert(*id)).collect();

        let missing: Vec<String> = ids
            .iter()
            .filter(|id| output.question(id).is_none())
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(NotFoundError::QuestionIds {
                run_id: output.run_id.clone(),
                ids: missing,
            }
            .into());
        }

        let mut explanations = BTreeMap::new();
        for (idx, id) in ids.iter().enumerate() {
            let Some(question) = output.question(id) else {
                continue;
            };
            info!("🤖 正在解析 {} ({}/{})", id, idx + 1, ids.len());

            let prompt = self.build_prompt(question);
            let explanation = self.backend.explain(&prompt).await?.trim().to_string();
            explanations.insert(id.to_string(), explanation);
        }

        // 全部成功后才写入题目
        for (id, explanation) in &explanations {
            if let Some(q) = output.question_mut(id) {
                q.explanation = explanation.clone();
            }
        }

        info!("✓ 已添加 {} 条解析", explanations.len());
        Ok(explanations)
    }

    /// 构建解析提示词
    pub fn build_prompt(&self, question: &Question) -> String {
        render_template(
            &self.template,
            &[
                ("stem", question.stem.clone()),
                ("choices", format_choices_with_letters(question)),
                ("correct_answers", format_correct_letters(question)),
                ("question_type", question.question_type.to_string()),
            ],
        )
    }
}

/// 按当前顺序输出 `A. text` 行
pub fn format_choices_with_letters(question: &Question) -> String {
    question
        .choices
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", index_to_letter(i), c.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 正确答案字母，逗号分隔
pub fn format_correct_letters(question: &Question) -> String {
    question
        .correct_letters()
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, LlmError};
    use crate::models::{Choice, QuestionType, RunSettings};
    use crate::services::GenerationRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 记录收到的提示词
    #[derive(Default)]
    struct RecordingBackend {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmBackend for RecordingBackend {
        fn describe(&self) -> String {
            "recording".to_string()
        }

        async fn generate(&self, _request: &GenerationRequest<'_>) -> AppResult<String> {
            unreachable!("explain tests never generate")
        }

        async fn explain(&self, prompt: &str) -> AppResult<String> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            Ok(format!("  because #{}  ", prompts.len()))
        }
    }

    /// 第二次调用失败
    #[derive(Default)]
    struct FlakyBackend {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl LlmBackend for FlakyBackend {
        fn describe(&self) -> String {
            "flaky".to_string()
        }

        async fn generate(&self, _request: &GenerationRequest<'_>) -> AppResult<String> {
            unreachable!("explain tests never generate")
        }

        async fn explain(&self, _prompt: &str) -> AppResult<String> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 2 {
                return Err(LlmError::ApiCallFailed {
                    model: "flaky".to_string(),
                    message: "rate limited".to_string(),
                }
                .into());
            }
            Ok("because".to_string())
        }
    }

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            question_type: QuestionType::Mcq,
            stem: format!("Stem of {}", id),
            choices: vec![
                Choice { id: "c2".to_string(), text: "Nucleus".to_string() },
                Choice { id: "c1".to_string(), text: "Mitochondria".to_string() },
            ],
            correct_choice_ids: vec!["c1".to_string()],
            chunk_id: "chunk_001".to_string(),
            explanation: String::new(),
        }
    }

    fn output() -> RunOutput {
        RunOutput {
            schema_version: 1,
            run_id: "run_x".to_string(),
            context_file: "bio.pdf".to_string(),
            settings: RunSettings {
                question_type: QuestionType::Mcq,
                choices_per_question: 2,
                questions_per_partition: 3,
                randomize_questions: false,
                randomize_options: false,
            },
            questions: vec![question("q_0001"), question("q_0002"), question("q_0003")],
        }
    }

    const TEMPLATE: &str = "Q: {stem}\n{choices}\nCorrect: {correct_answers}";

    #[tokio::test]
    async fn test_explains_only_requested_ids() {
        let backend = RecordingBackend::default();
        let explainer = Explainer::new(&backend, TEMPLATE);
        let mut out = output();

        let ids = vec!["q_0003".to_string(), "q_0001".to_string(), "q_0003".to_string()];
        let result = explainer.explain(&mut out, &ids).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(out.questions[0].explanation, "because #2");
        assert_eq!(out.questions[1].explanation, "");
        assert_eq!(out.questions[2].explanation, "because #1");

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(
            prompts[0],
            "Q: Stem of q_0003\nA. Nucleus\nB. Mitochondria\nCorrect: B"
        );
    }

    #[tokio::test]
    async fn test_unknown_id_fails_before_any_call() {
        let backend = RecordingBackend::default();
        let explainer = Explainer::new(&backend, TEMPLATE);
        let mut out = output();

        let ids = vec!["q_0001".to_string(), "q_0099".to_string()];
        let err = explainer.explain(&mut out, &ids).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::NotFound(NotFoundError::QuestionIds { ref ids, .. }) if ids == &vec!["q_0099".to_string()]
        ));
        assert!(backend.prompts.lock().unwrap().is_empty());
        assert!(out.questions.iter().all(|q| q.explanation.is_empty()));
    }

    #[tokio::test]
    async fn test_call_failure_stops_and_leaves_output_untouched() {
        let backend = FlakyBackend::default();
        let explainer = Explainer::new(&backend, TEMPLATE);
        let mut out = output();

        let ids = vec![
            "q_0001".to_string(),
            "q_0002".to_string(),
            "q_0003".to_string(),
        ];
        let err = explainer.explain(&mut out, &ids).await.unwrap_err();

        assert!(matches!(err, AppError::Llm(LlmError::ApiCallFailed { .. })));
        assert_eq!(*backend.calls.lock().unwrap(), 2);
        assert!(out.questions.iter().all(|q| q.explanation.is_empty()));
    }
}
