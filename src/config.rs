//! 程序配置
//!
//! - 生成配置来自 YAML 文件（题型、分块、随机化、提示词、模型参数）
//! - API 密钥来自环境变量或被 gitignore 的 TOML 密钥文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AppError, AppResult, ConfigError, LlmError};
use crate::models::run::LlmSnapshot;
use crate::models::QuestionType;

/// 生成配置文件
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub generation: GenerationConfig,
    #[serde(default)]
    pub partitioning: PartitionConfig,
    #[serde(default)]
    pub randomization: RandomizationConfig,
    pub prompts: PromptConfig,
    pub llm: LlmConfig,
    /// 配置文件自身路径（不写入快照）
    #[serde(skip)]
    pub source_path: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub question_type: QuestionType,
    pub choices_per_question: usize,
    pub questions_per_partition: usize,
}

/// 分块策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// 每块固定页数（可重叠）
    #[default]
    Pages,
    /// 固定块数，页数尽量平均
    Count,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    #[serde(default)]
    pub strategy: PartitionStrategy,
    #[serde(default = "default_pages_per_partition")]
    pub pages_per_partition: usize,
    #[serde(default)]
    pub overlap_pages: usize,
    #[serde(default)]
    pub chunk_count: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            strategy: PartitionStrategy::Pages,
            pages_per_partition: default_pages_per_partition(),
            overlap_pages: 0,
            chunk_count: 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomizationConfig {
    #[serde(default)]
    pub randomize_questions: bool,
    #[serde(default)]
    pub randomize_options: bool,
    /// 固定种子时，相同配置生成相同结果
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptConfig {
    pub user_prompt_file: PathBuf,
    pub mcq_prompt_file: PathBuf,
    pub sata_prompt_file: PathBuf,
    pub explanation_prompt_file: PathBuf,
}

impl PromptConfig {
    /// 按题型选择固定提示词
    pub fn fixed_prompt_file(&self, question_type: QuestionType) -> &Path {
        match question_type {
            QuestionType::Mcq => &self.mcq_prompt_file,
            QuestionType::Sata => &self.sata_prompt_file,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_explain_max_output_tokens")]
    pub explain_max_output_tokens: u32,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_api_key_file")]
    pub api_key_file: PathBuf,
}

impl LlmConfig {
    /// 从运行快照恢复模型参数（explain 模式使用）
    pub fn from_snapshot(snapshot: &LlmSnapshot) -> Self {
        Self {
            provider: snapshot.provider.clone(),
            model: snapshot.model.clone(),
            temperature: snapshot.temperature,
            max_output_tokens: snapshot.max_output_tokens,
            explain_max_output_tokens: snapshot.explain_max_output_tokens,
            api_base: snapshot.api_base.clone(),
            api_key_file: snapshot
                .api_key_file
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(default_api_key_file),
        }
    }

    pub fn snapshot(&self) -> LlmSnapshot {
        LlmSnapshot {
            provider: self.provider.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            explain_max_output_tokens: self.explain_max_output_tokens,
            api_base: self.api_base.clone(),
            api_key_file: Some(absolute_path(&self.api_key_file).to_string_lossy().to_string()),
        }
    }
}

/// 转为绝对路径：文件存在时取规范路径，否则以当前目录为基准
fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            return cwd.join(path);
        }
    }
    path.to_path_buf()
}

fn default_pages_per_partition() -> usize {
    5
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> u32 {
    4000
}

fn default_explain_max_output_tokens() -> u32 {
    500
}

fn default_api_key_file() -> PathBuf {
    PathBuf::from(".openai_key.toml")
}

impl Config {
    /// 读取、解析相对路径并校验配置文件
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let mut config = Self::from_yaml_str(&content, path)?;
        config.source_path = path.to_path_buf();

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base_dir);
        config.validate()?;

        debug!("配置已加载: {}", path.display());
        Ok(config)
    }

    /// 仅解析 YAML，不做路径解析和校验
    pub fn from_yaml_str(content: &str, path: &Path) -> AppResult<Self> {
        serde_yaml::from_str(content).map_err(|source| {
            AppError::Config(ConfigError::YamlParseFailed {
                path: path.to_path_buf(),
                source,
            })
        })
    }

    /// 相对路径以配置文件所在目录为基准
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        };
        resolve(&mut self.prompts.user_prompt_file);
        resolve(&mut self.prompts.mcq_prompt_file);
        resolve(&mut self.prompts.sata_prompt_file);
        resolve(&mut self.prompts.explanation_prompt_file);
        resolve(&mut self.llm.api_key_file);
    }

    pub fn validate(&self) -> AppResult<()> {
        let gen = &self.generation;
        if gen.choices_per_question < 2 {
            return Err(AppError::invalid_field(
                "generation.choices_per_question",
                "必须 >= 2",
            ));
        }
        if gen.choices_per_question > 26 {
            return Err(AppError::invalid_field(
                "generation.choices_per_question",
                "必须 <= 26",
            ));
        }
        if gen.questions_per_partition < 1 {
            return Err(AppError::invalid_field(
                "generation.questions_per_partition",
                "必须 >= 1",
            ));
        }

        let part = &self.partitioning;
        match part.strategy {
            PartitionStrategy::Pages => {
                if part.pages_per_partition < 1 {
                    return Err(AppError::invalid_field(
                        "partitioning.pages_per_partition",
                        "必须 >= 1",
                    ));
                }
                if part.overlap_pages >= part.pages_per_partition {
                    return Err(AppError::invalid_field(
                        "partitioning.overlap_pages",
                        "必须满足 0 <= overlap < pages_per_partition",
                    ));
                }
            }
            PartitionStrategy::Count => {
                if part.chunk_count < 1 {
                    return Err(AppError::invalid_field(
                        "partitioning.chunk_count",
                        "count 策略下必须 >= 1",
                    ));
                }
            }
        }

        let prompts = [
            ("prompts.user_prompt_file", &self.prompts.user_prompt_file),
            ("prompts.mcq_prompt_file", &self.prompts.mcq_prompt_file),
            ("prompts.sata_prompt_file", &self.prompts.sata_prompt_file),
            (
                "prompts.explanation_prompt_file",
                &self.prompts.explanation_prompt_file,
            ),
        ];
        for (field, path) in prompts {
            if !path.exists() {
                return Err(AppError::Config(ConfigError::MissingFile {
                    field: field.to_string(),
                    path: path.clone(),
                }));
            }
        }

        if self.llm.provider != "openai" {
            return Err(AppError::invalid_field(
                "llm.provider",
                "目前只支持 openai（兼容 OpenAI API 的服务可通过 api_base 指定）",
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(AppError::invalid_field("llm.model", "不能为空"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AppError::invalid_field("llm.temperature", "必须在 [0, 2] 之间"));
        }

        Ok(())
    }

    /// 写入运行目录的配置快照
    pub fn snapshot_yaml(&self) -> AppResult<String> {
        serde_yaml::to_string(self).map_err(|e| {
            AppError::invalid_field("snapshot", format!("无法序列化配置: {}", e))
        })
    }
}

// ========== API 密钥 ==========

/// 密钥文件内容
#[derive(Debug, Deserialize)]
struct KeyFile {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    api_base: Option<String>,
}

/// LLM 访问凭据
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_base: Option<String>,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"***")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ApiCredentials {
    /// 环境变量 `OPENAI_API_KEY` / `OPENAI_API_BASE` 优先，其次读取密钥文件
    pub fn load(key_file: &Path, configured_base: Option<&str>) -> AppResult<Self> {
        let file = if key_file.exists() {
            let content =
                std::fs::read_to_string(key_file).map_err(|e| AppError::io(key_file, e))?;
            Some(parse_key_file(&content, key_file)?)
        } else {
            None
        };

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| file.as_ref().and_then(|f| f.api_key.clone()))
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AppError::Llm(LlmError::MissingApiKey {
                    key_file: key_file.to_path_buf(),
                })
            })?;

        let api_base = std::env::var("OPENAI_API_BASE")
            .ok()
            .filter(|b| !b.trim().is_empty())
            .or_else(|| file.and_then(|f| f.api_base))
            .or_else(|| configured_base.map(str::to_string));

        Ok(Self {
            api_key: api_key.trim().to_string(),
            api_base,
        })
    }
}

fn parse_key_file(content: &str, path: &Path) -> AppResult<KeyFile> {
    toml::from_str(content).map_err(|source| {
        AppError::Config(ConfigError::TomlParseFailed {
            path: path.to_path_buf(),
            source,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
generation:
  question_type: SATA
  choices_per_question: 5
  questions_per_partition: 3
partitioning:
  pages_per_partition: 4
  overlap_pages: 1
randomization:
  randomize_questions: true
  randomize_options: false
  seed: 7
prompts:
  user_prompt_file: prompts/user.txt
  mcq_prompt_file: prompts/mcq.txt
  sata_prompt_file: prompts/sata.txt
  explanation_prompt_file: prompts/explain.txt
llm:
  model: gpt-4o-mini
"#;

    fn write_prompts(dir: &Path) {
        let prompts = dir.join("prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        for name in ["user.txt", "mcq.txt", "sata.txt", "explain.txt"] {
            std::fs::write(prompts.join(name), "x").unwrap();
        }
    }

    #[test]
    fn test_load_resolves_relative_paths_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_prompts(dir.path());
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, YAML).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.generation.question_type, QuestionType::Sata);
        assert_eq!(config.partitioning.strategy, PartitionStrategy::Pages);
        assert_eq!(config.randomization.seed, Some(7));
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.max_output_tokens, 4000);
        assert!(config.prompts.user_prompt_file.starts_with(dir.path()));
        assert!(config.llm.api_key_file.starts_with(dir.path()));
        assert_eq!(
            config.prompts.fixed_prompt_file(QuestionType::Sata),
            dir.path().join("prompts/sata.txt")
        );
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let dir = tempfile::tempdir().unwrap();
        write_prompts(dir.path());
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, YAML.replace("overlap_pages: 1", "overlap_pages: 4")).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::InvalidField { ref field, .. }) if field == "partitioning.overlap_pages"));
    }

    #[test]
    fn test_missing_prompt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, YAML).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::MissingFile { .. })));
    }

    #[test]
    fn test_count_strategy_requires_chunk_count() {
        let dir = tempfile::tempdir().unwrap();
        write_prompts(dir.path());
        let path = dir.path().join("config.yaml");
        let yaml = YAML.replace("pages_per_partition: 4", "strategy: count\n  pages_per_partition: 4");
        std::fs::write(&path, yaml).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("chunk_count"));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = Config::from_yaml_str("generation: [", Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::YamlParseFailed { .. })));
    }

    #[test]
    fn test_key_file_parsing() {
        let kf = parse_key_file(
            "api_key = \"sk-test\"\napi_base = \"http://localhost:1234/v1\"\n",
            Path::new("k.toml"),
        )
        .unwrap();
        assert_eq!(kf.api_key.as_deref(), Some("sk-test"));
        assert_eq!(kf.api_base.as_deref(), Some("http://localhost:1234/v1"));
        assert!(parse_key_file("api_key = ", Path::new("k.toml")).is_err());
    }

    #[test]
    fn test_snapshot_records_absolute_key_path() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join(".openai_key.toml");
        std::fs::write(&key, "api_key = \"sk-test\"\n").unwrap();

        let mut config = Config::from_yaml_str(YAML, Path::new("config.yaml")).unwrap();
        config.llm.api_key_file = key.clone();
        let snapshot = config.llm.snapshot();
        let recorded = PathBuf::from(snapshot.api_key_file.unwrap());
        assert!(recorded.is_absolute());
        assert_eq!(recorded, std::fs::canonicalize(&key).unwrap());

        config.llm.api_key_file = PathBuf::from("missing/.openai_key.toml");
        let recorded = PathBuf::from(config.llm.snapshot().api_key_file.unwrap());
        assert!(recorded.is_absolute());
        assert!(recorded.ends_with("missing/.openai_key.toml"));
    }
}
