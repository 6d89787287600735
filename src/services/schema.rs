//! 生成结果的 JSON 结构约定
//!
//! 写进提示词里告诉模型输出格式，解析器按同样的结构反序列化

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// 一个分块的模型输出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBatch {
    pub questions: Vec<RawQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawQuestion {
    pub stem: String,
    pub choices: Vec<RawChoice>,
    pub correct_choice_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawChoice {
    pub id: String,
    pub text: String,
}

/// 单个分块输出的 JSON Schema
pub fn generation_schema(choices_per_question: usize) -> JsonValue {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["questions"],
        "properties": {
            "questions": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["stem", "choices", "correct_choice_ids"],
                    "properties": {
                        "stem": { "type": "string", "minLength": 1 },
                        "choices": {
                            "type": "array",
                            "minItems": choices_per_question,
                            "maxItems": choices_per_question,
                            "items": {
                                "type": "object",
                                "additionalProperties": false,
                                "required": ["id", "text"],
                                "properties": {
                                    "id": { "type": "string", "minLength": 1 },
                                    "text": { "type": "string", "minLength": 1 }
                                }
                            }
                        },
                        "correct_choice_ids": {
                            "type": "array",
                            "minItems": 1,
                            "items": { "type": "string", "minLength": 1 }
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_pins_choice_count() {
        let schema = generation_schema(5);
        let choices = &schema["properties"]["questions"]["items"]["properties"]["choices"];
        assert_eq!(choices["minItems"], 5);
        assert_eq!(choices["maxItems"], 5);
    }
}
