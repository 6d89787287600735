use serde::{Deserialize, Serialize};
use std::fmt;

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    /// 单选题，恰好一个正确选项
    #[serde(rename = "MCQ")]
    Mcq,
    /// 多选题（select all that apply），正确选项数量可变
    #[serde(rename = "SATA")]
    Sata,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::Sata => "SATA",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 选项，`id` 在打乱顺序后保持不变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub text: String,
}

/// 生成的题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// `q_0001` 形式的编号，在整个运行中唯一
    #[serde(default)]
    pub id: String,
    pub question_type: QuestionType,
    pub stem: String,
    pub choices: Vec<Choice>,
    pub correct_choice_ids: Vec<String>,
    /// 来源分块
    pub chunk_id: String,
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    /// 正确选项在当前选项顺序中的位置
    pub fn correct_indices(&self) -> Vec<usize> {
        self.choices
            .iter()
            .enumerate()
            .filter(|(_, c)| self.correct_choice_ids.contains(&c.id))
            .map(|(i, _)| i)
            .collect()
    }

    /// 正确答案的字母，按字母顺序
    pub fn correct_letters(&self) -> Vec<char> {
        self.correct_indices().into_iter().map(index_to_letter).collect()
    }
}

/// 0 -> 'A', 1 -> 'B' ...
pub fn index_to_letter(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

/// 'A' / 'a' -> 0 ...
pub fn letter_to_index(letter: char) -> Option<usize> {
    let upper = letter.to_ascii_uppercase();
    if upper.is_ascii_uppercase() {
        Some((upper as u8 - b'A') as usize)
    } else {
        None
    }
}

/// 按第几个生成的题目格式化编号
pub fn format_question_id(n: usize) -> String {
    format!("q_{:04}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Question {
        Question {
            id: "q_0012".to_string(),
            question_type: QuestionType::Sata,
            stem: "Which are primes?".to_string(),
            choices: vec![
                Choice { id: "c3".to_string(), text: "4".to_string() },
                Choice { id: "c1".to_string(), text: "2".to_string() },
                Choice { id: "c2".to_string(), text: "3".to_string() },
            ],
            correct_choice_ids: vec!["c1".to_string(), "c2".to_string()],
            chunk_id: "chunk_001".to_string(),
            explanation: String::new(),
        }
    }

    #[test]
    fn test_correct_indices_follow_current_order() {
        let q = sample();
        assert_eq!(q.correct_indices(), vec![1, 2]);
        assert_eq!(q.correct_letters(), vec!['B', 'C']);
    }

    #[test]
    fn test_question_id_format() {
        assert_eq!(format_question_id(7), "q_0007");
        assert_eq!(format_question_id(12345), "q_12345");
    }

    #[test]
    fn test_question_type_serde_names() {
        let json = serde_json::to_string(&QuestionType::Sata).unwrap();
        assert_eq!(json, "\"SATA\"");
        let t: QuestionType = serde_json::from_str("\"MCQ\"").unwrap();
        assert_eq!(t, QuestionType::Mcq);
    }

    #[test]
    fn test_letters() {
        assert_eq!(letter_to_index('c'), Some(2));
        assert_eq!(letter_to_index('1'), None);
        assert_eq!(index_to_letter(3), 'D');
    }
}
