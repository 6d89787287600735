//! # mcq_forge
//!
//! 从 PDF 资料生成单选（MCQ）/ 多选（SATA）题目，在终端作答，并为错题生成解析
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有文件资源，只暴露能力
//! - `PdfLoader` - 逐页提取 PDF 文本
//! - `RunStore` - 运行目录的创建与读写
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `chunker` - 页面分块
//! - `PromptAssembler` - 提示词组装
//! - `LlmBackend` - 模型能力（`LlmService` 在线 / `MockLlm` 离线）
//! - `response_parser` - 输出解析与校验
//! - `Explainer` - 错题解析
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个分块"的完整生成流程
//! - `ChunkCtx` - 上下文封装（run_id + chunk）
//! - `ChunkFlow` - 流程编排（文本 → 提示词 → 模型 → 校验）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/generate_processor` - 一次生成运行
//! - `orchestrator/quiz_runner` - 终端答题
//! - `orchestrator/explain_processor` - 错题解析
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{PdfLoader, RunStore};
pub use models::{Question, QuestionType, RunOutput};
pub use orchestrator::{explain_run, generate_run, quiz_run};
pub use services::{LlmBackend, LlmService, MockLlm};
pub use workflow::{ChunkCtx, ChunkFlow};
