//! 终端答题 - 编排层
//!
//! ## 职责
//!
//! 1. **逐题展示**：题干 + 字母选项（A, B, C ...）
//! 2. **读取答案**：`A` 或 `A,C`，无效输入重新提示
//! 3. **判分**：所选选项集合与正确答案集合完全相同才算对
//! 4. **保存**：wrong_ids.json（供 explain 使用）和 results.json
//!
//! 输入输出是泛型的，测试中用内存缓冲代替终端

use chrono::Local;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::infrastructure::run_store::{RESULTS_FILE, WRONG_IDS_FILE};
use crate::infrastructure::RunStore;
use crate::models::question::{index_to_letter, letter_to_index};
use crate::models::{Question, QuestionType, QuizResults, RunOutput, WrongAnswers};

const STDIN: &str = "<stdin>";
const STDOUT: &str = "<stdout>";

/// 答题命令参数
#[derive(Debug, Clone)]
pub struct QuizOptions {
    pub run_dir: PathBuf,
    /// 错题列表输出路径，默认写入运行目录
    pub wrong_ids_out: Option<PathBuf>,
}

/// 在终端中完成一次答题并保存结果
pub async fn quiz_run(options: &QuizOptions) -> AppResult<QuizResults> {
    let store = RunStore::open(&options.run_dir)?;
    let output = store.read_output().await?;
    info!("📝 运行 {}，共 {} 道题目", store.run_id(), output.questions.len());

    let results = {
        let stdin = io::stdin();
        let stdout = io::stdout();
        QuizRunner::new(&output).run(stdin.lock(), stdout.lock())?
    };

    let wrong_path = save_quiz_results(&store, &results, options.wrong_ids_out.as_deref()).await?;
    info!(
        "✅ 得分 {}/{} ({:.1}%)，错题列表: {}",
        results.correct,
        results.total,
        results.percent,
        wrong_path.display()
    );
    Ok(results)
}

/// 写入 wrong_ids.json 和 results.json
///
/// # 返回
/// 返回 wrong_ids.json 的实际路径
pub async fn save_quiz_results(
    store: &RunStore,
    results: &QuizResults,
    wrong_ids_out: Option<&Path>,
) -> AppResult<PathBuf> {
    let wrong = WrongAnswers {
        wrong_question_ids: results.wrong_question_ids.clone(),
    };
    let wrong_path = match wrong_ids_out {
        Some(path) => {
            let content = serde_json::to_string_pretty(&wrong)
                .map_err(|e| AppError::parse_json("无法序列化错题列表", e))?;
            tokio::fs::write(path, content)
                .await
                .map_err(|e| AppError::io(path, e))?;
            path.to_path_buf()
        }
        None => {
            store.write_json(WRONG_IDS_FILE, &wrong).await?;
            store.path(WRONG_IDS_FILE)
        }
    };
    store.write_json(RESULTS_FILE, results).await?;
    Ok(wrong_path)
}

/// 终端答题器
pub struct QuizRunner<'a> {
    output: &'a RunOutput,
}

impl<'a> QuizRunner<'a> {
    pub fn new(output: &'a RunOutput) -> Self {
        Self { output }
    }

    /// 依次作答所有题目
    ///
    /// 输入提前结束（EOF）视为错误，不会保存不完整的结果
    pub fn run<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> AppResult<QuizResults> {
        let questions = &self.output.questions;
        let total = questions.len();
        let mut answers = BTreeMap::new();
        let mut wrong_question_ids = Vec::new();
        let mut correct = 0;

        for (idx, question) in questions.iter().enumerate() {
            show_question(&mut writer, question, idx + 1, total).map_err(stdout_err)?;
            let selected = read_answer(&mut reader, &mut writer, question)?;

            let selected_ids: Vec<String> = selected
                .iter()
                .map(|&i| question.choices[i].id.clone())
                .collect();
            let chosen: BTreeSet<&String> = selected_ids.iter().collect();
            let expected: BTreeSet<&String> = question.correct_choice_ids.iter().collect();

            if chosen == expected {
                correct += 1;
                writeln!(writer, "✓ 正确\n").map_err(stdout_err)?;
            } else {
                wrong_question_ids.push(question.id.clone());
                let letters: Vec<String> = question
                    .correct_letters()
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                writeln!(writer, "✗ 错误，正确答案: {}\n", letters.join(", "))
                    .map_err(stdout_err)?;
            }
            answers.insert(question.id.clone(), selected_ids);
        }

        let percent = if total == 0 {
            0.0
        } else {
            correct as f64 * 100.0 / total as f64
        };
        writeln!(writer, "得分: {}/{} ({:.1}%)", correct, total, percent).map_err(stdout_err)?;
        writer.flush().map_err(stdout_err)?;

        Ok(QuizResults {
            run_id: self.output.run_id.clone(),
            finished_at: Local::now().to_rfc3339(),
            total,
            correct,
            percent,
            answers,
            wrong_question_ids,
        })
    }
}

fn show_question<W: Write>(
    writer: &mut W,
    question: &Question,
    number: usize,
    total: usize,
) -> io::Result<()> {
    let hint = match question.question_type {
        QuestionType::Mcq => "单选",
        QuestionType::Sata => "多选，选出所有正确项",
    };
    writeln!(writer, "[{}/{}] ({}) {}", number, total, hint, question.stem)?;
    for (i, choice) in question.choices.iter().enumerate() {
        writeln!(writer, "  {}. {}", index_to_letter(i), choice.text)?;
    }
    Ok(())
}

/// 读取一行答案，直到输入有效为止
fn read_answer<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    question: &Question,
) -> AppResult<Vec<usize>> {
    loop {
        write!(writer, "你的答案: ").map_err(stdout_err)?;
        writer.flush().map_err(stdout_err)?;

        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| AppError::io(STDIN, e))?;
        if read == 0 {
            return Err(AppError::io(
                STDIN,
                io::Error::new(io::ErrorKind::UnexpectedEof, "答题未完成，输入已结束"),
            ));
        }

        match parse_answer(&line, question.choices.len(), question.question_type) {
            Ok(selected) => return Ok(selected),
            Err(reason) => writeln!(writer, "⚠️ {}", reason).map_err(stdout_err)?,
        }
    }
}

/// 解析 `A` / `a,c` / `B D`，返回去重排序后的选项位置
pub fn parse_answer(
    input: &str,
    choice_count: usize,
    question_type: QuestionType,
) -> Result<Vec<usize>, String> {
    let mut selected = BTreeSet::new();
    for token in input
        .split(|c: char| c == ',' || c == '，' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let mut chars = token.chars();
        let index = match (chars.next(), chars.next()) {
            (Some(letter), None) => letter_to_index(letter),
            _ => None,
        };
        match index {
            Some(i) if i < choice_count => {
                selected.insert(i);
            }
            _ => {
                return Err(format!(
                    "无效选项 \"{}\"，请输入 A-{}",
                    token,
                    index_to_letter(choice_count.saturating_sub(1))
                ))
            }
        }
    }

    if selected.is_empty() {
        return Err("请至少选择一个选项".to_string());
    }
    if question_type == QuestionType::Mcq && selected.len() > 1 {
        return Err("单选题只能选择一个选项".to_string());
    }
    Ok(selected.into_iter().collect())
}

fn stdout_err(e: io::Error) -> AppError {
    AppError::io(STDOUT, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Choice, RunSettings};
    use std::io::Cursor;

    fn question(id: &str, question_type: QuestionType, correct: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            question_type,
            stem: format!("stem {}", id),
            choices: ["c3", "c1", "c2"]
                .iter()
                .map(|c| Choice {
                    id: c.to_string(),
                    text: format!("text {}", c),
                })
                .collect(),
            correct_choice_ids: correct.iter().map(|c| c.to_string()).collect(),
            chunk_id: "chunk_001".to_string(),
            explanation: String::new(),
        }
    }

    fn output(questions: Vec<Question>) -> RunOutput {
        RunOutput {
            schema_version: 1,
            run_id: "run_q".to_string(),
            context_file: "ctx.pdf".to_string(),
            settings: RunSettings {
                question_type: QuestionType::Sata,
                choices_per_question: 3,
                questions_per_partition: 1,
                randomize_questions: false,
                randomize_options: true,
            },
            questions,
        }
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("b\n", 3, QuestionType::Mcq), Ok(vec![1]));
        assert_eq!(parse_answer("C, a ,A", 3, QuestionType::Sata), Ok(vec![0, 2]));
        assert!(parse_answer("   \n", 3, QuestionType::Mcq).is_err());
        assert!(parse_answer("D", 3, QuestionType::Sata).is_err());
        assert!(parse_answer("A,B", 3, QuestionType::Mcq).is_err());
        assert!(parse_answer("AB", 3, QuestionType::Sata).is_err());
    }

    #[test]
    fn test_scores_by_set_equality() {
        // 当前顺序 A=c3 B=c1 C=c2
        let out = output(vec![
            question("q_0001", QuestionType::Mcq, &["c1"]),
            question("q_0002", QuestionType::Sata, &["c2", "c3"]),
            question("q_0003", QuestionType::Sata, &["c1", "c2"]),
        ]);
        let input = Cursor::new("B\nC,A\nB\n");
        let mut screen = Vec::new();

        let results = QuizRunner::new(&out).run(input, &mut screen).unwrap();

        assert_eq!(results.total, 3);
        assert_eq!(results.correct, 2);
        assert_eq!(results.wrong_question_ids, vec!["q_0003"]);
        assert_eq!(results.answers["q_0002"], vec!["c3", "c2"]);
        let screen = String::from_utf8(screen).unwrap();
        assert!(screen.contains("  A. text c3"));
        assert!(screen.contains("正确答案: B, C"));
    }

    #[test]
    fn test_invalid_input_reprompts() {
        let out = output(vec![question("q_0001", QuestionType::Mcq, &["c2"])]);
        let input = Cursor::new("\nZ\nA,B\nc\n");
        let mut screen = Vec::new();

        let results = QuizRunner::new(&out).run(input, &mut screen).unwrap();

        assert_eq!(results.correct, 1);
        let screen = String::from_utf8(screen).unwrap();
        assert_eq!(screen.matches("你的答案").count(), 4);
    }

    #[test]
    fn test_eof_is_an_error() {
        let out = output(vec![question("q_0001", QuestionType::Mcq, &["c2"])]);
        let err = QuizRunner::new(&out)
            .run(Cursor::new(""), Vec::new())
            .unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
    }
}
