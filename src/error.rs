use std::path::{Path, PathBuf};

use thiserror::Error;

/// 应用程序错误类型
///
/// 每个变体对应流水线中的一类失败，错误直接返回给 CLI，不做静默恢复。
#[derive(Debug, Error)]
pub enum AppError {
    /// PDF 提取错误
    #[error("PDF提取错误: {0}")]
    Extraction(#[from] ExtractionError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 模型输出解析失败
    #[error("解析错误: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
    /// 模型输出不符合配置约束
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 查找失败（运行目录、题目ID）
    #[error("未找到: {0}")]
    NotFound(#[from] NotFoundError),
    /// 文件读写错误
    #[error("文件错误 ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// PDF 提取错误
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// 文件不存在
    #[error("文件不存在: {}", path.display())]
    FileNotFound { path: PathBuf },
    /// 无法打开或解析 PDF
    #[error("无法打开PDF ({}): {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },
    /// PDF 没有任何页面
    #[error("PDF没有任何页面: {}", path.display())]
    NoPages { path: PathBuf },
    /// 后台提取任务失败
    #[error("提取任务异常终止: {0}")]
    TaskFailed(String),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 缺少 API 密钥
    #[error("未找到API密钥: 请设置 OPENAI_API_KEY 或提供密钥文件 {}", key_file.display())]
    MissingApiKey { key_file: PathBuf },
    /// 请求构建失败
    #[error("请求构建失败: {0}")]
    RequestBuild(String),
}

/// 校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 题目数量不符
    #[error("{chunk_id}: 题目数量不符，期望 {expected}，实际 {actual}")]
    QuestionCount {
        chunk_id: String,
        expected: usize,
        actual: usize,
    },
    /// 选项数量不符
    #[error("{chunk_id} 第 {position} 题: 选项数量不符，期望 {expected}，实际 {actual}")]
    ChoiceCount {
        chunk_id: String,
        position: usize,
        expected: usize,
        actual: usize,
    },
    /// 正确答案数量不符
    #[error("{chunk_id} 第 {position} 题: 正确答案数量不符，期望 {expected}，实际 {actual}")]
    CorrectCount {
        chunk_id: String,
        position: usize,
        expected: usize,
        actual: usize,
    },
    /// 其他结构问题
    #[error("{chunk_id} 第 {position} 题: {reason}")]
    Malformed {
        chunk_id: String,
        position: usize,
        reason: String,
    },
}

/// 查找失败
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// 题目ID不存在
    #[error("运行 {run_id} 中不存在题目: {}", ids.join(", "))]
    QuestionIds { run_id: String, ids: Vec<String> },
    /// 运行目录或其中的文件不存在
    #[error("运行文件不存在: {}", path.display())]
    RunFile { path: PathBuf },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 字段取值非法
    #[error("{field}: {reason}")]
    InvalidField { field: String, reason: String },
    /// 引用的文件不存在
    #[error("{field} 指向的文件不存在: {}", path.display())]
    MissingFile { field: String, path: PathBuf },
    /// YAML 解析失败
    #[error("YAML解析失败 ({}): {source}", path.display())]
    YamlParseFailed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({}): {source}", path.display())]
    TomlParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读写错误
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// 创建解析错误
    pub fn parse(message: impl Into<String>) -> Self {
        AppError::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带 JSON 源错误的解析错误
    pub fn parse_json(message: impl Into<String>, source: serde_json::Error) -> Self {
        AppError::Parse {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 创建配置字段错误
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// 创建 LLM API 调用错误
    pub fn llm_api_failed(model: impl Into<String>, message: impl ToString) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            message: message.to_string(),
        })
    }

    /// 创建题目校验错误
    pub fn malformed(chunk_id: &str, position: usize, reason: impl Into<String>) -> Self {
        AppError::Validation(ValidationError::Malformed {
            chunk_id: chunk_id.to_string(),
            position,
            reason: reason.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category_and_detail() {
        let err = AppError::from(ValidationError::CorrectCount {
            chunk_id: "chunk_001".to_string(),
            position: 2,
            expected: 3,
            actual: 1,
        });
        let msg = err.to_string();
        assert!(msg.starts_with("校验错误"));
        assert!(msg.contains("chunk_001"));
        assert!(msg.contains("期望 3"));
    }

    #[test]
    fn test_not_found_lists_all_ids() {
        let err = AppError::from(NotFoundError::QuestionIds {
            run_id: "r".to_string(),
            ids: vec!["q_0009".to_string(), "q_0010".to_string()],
        });
        assert!(err.to_string().contains("q_0009, q_0010"));
    }
}
