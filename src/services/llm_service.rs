//! LLM 服务 - 业务能力层
//!
//! 只负责"调用模型"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure、本地推理服务等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{ApiCredentials, LlmConfig};
use crate::error::{AppError, AppResult, LlmError};
use crate::services::{GenerationRequest, LlmBackend};

const GENERATION_SYSTEM_MESSAGE: &str = "You write exam questions from source material. \
Reply with a single JSON object that matches the requested schema and nothing else.";

const EXPLAIN_SYSTEM_MESSAGE: &str = "You are a patient tutor. Explain concisely why the \
correct answer is correct and why the other options are not.";

/// 在线 LLM 服务
///
/// 职责：
/// - 调用兼容 OpenAI 的 chat completion 接口
/// - 每次只发出一个请求，不做重试
/// - 不解析题目，只返回原始文本
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_output_tokens: u32,
    explain_max_output_tokens: u32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(llm: &LlmConfig, credentials: &ApiCredentials) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&credentials.api_key);
        if let Some(base) = &credentials.api_base {
            openai_config = openai_config.with_api_base(base);
        }

        Self {
            client: Client::with_config(openai_config),
            model_name: llm.model.clone(),
            temperature: llm.temperature,
            max_output_tokens: llm.max_output_tokens,
            explain_max_output_tokens: llm.explain_max_output_tokens,
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `max_tokens`: 最大输出 token 数
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        max_tokens: u32,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| LlmError::RequestBuild(e.to_string()))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| LlmError::RequestBuild(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(max_tokens)
            .build()
            .map_err(|e| LlmError::RequestBuild(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl LlmBackend for LlmService {
    fn describe(&self) -> String {
        format!("live ({})", self.model_name)
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> AppResult<String> {
        self.send_to_llm(
            request.prompt,
            Some(GENERATION_SYSTEM_MESSAGE),
            self.max_output_tokens,
        )
        .await
    }

    async fn explain(&self, prompt: &str) -> AppResult<String> {
        self.send_to_llm(
            prompt,
            Some(EXPLAIN_SYSTEM_MESSAGE),
            self.explain_max_output_tokens,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// 创建测试用的 LlmService（从环境变量读取密钥）
    fn create_test_service() -> LlmService {
        let llm = LlmConfig {
            provider: "openai".to_string(),
            model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            temperature: 0.2,
            max_output_tokens: 512,
            explain_max_output_tokens: 256,
            api_base: None,
            api_key_file: PathBuf::from(".openai_key.toml"),
        };
        let credentials = ApiCredentials::load(&llm.api_key_file, None).expect("需要 API 密钥");
        LlmService::new(&llm, &credentials)
    }

    #[test]
    fn test_describe_names_model() {
        let llm = LlmConfig {
            provider: "openai".to_string(),
            model: "local-model".to_string(),
            temperature: 0.2,
            max_output_tokens: 100,
            explain_max_output_tokens: 100,
            api_base: Some("http://localhost:1234/v1".to_string()),
            api_key_file: PathBuf::from("unused.toml"),
        };
        let credentials = ApiCredentials {
            api_key: "sk-test".to_string(),
            api_base: llm.api_base.clone(),
        };
        let service = LlmService::new(&llm, &credentials);
        assert_eq!(service.describe(), "live (local-model)");
    }

    /// 测试通用 LLM 调用
    ///
    /// 运行方式：
    /// ```bash
    /// cargo test test_send_to_llm_simple -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_send_to_llm_simple() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = create_test_service();
        let response = service
            .send_to_llm("Reply with the single word: pong", None, 16)
            .await
            .expect("LLM 调用失败");

        println!("LLM 响应: {}", response);
        assert!(!response.is_empty());
    }
}
