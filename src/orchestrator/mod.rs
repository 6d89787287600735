//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 每个子命令对应一个处理器，负责资源准备、运行目录读写和统计输出。
//!
//! ## 模块划分
//!
//! ### `generate_processor` - 生成处理器
//! - 加载配置、提示词和模型后端
//! - 创建运行目录并写入 manifest / 配置快照 / run.log
//! - 遍历分块（委托 `ChunkFlow`），打乱并编号后写出 output.json
//!
//! ### `quiz_runner` - 终端答题
//! - 逐题作答并判分
//! - 写出 wrong_ids.json 和 results.json
//!
//! ### `explain_processor` - 解析处理器
//! - 按运行快照恢复模型参数
//! - 委托 `Explainer` 为错题生成解析并写回运行目录
//!
//! ## 层次关系
//!
//! ```text
//! generate_processor (处理 Vec<Chunk>)
//!     ↓
//! workflow::ChunkFlow (处理单个 Chunk)
//!     ↓
//! services (能力层：chunker / prompt / llm / parser / explainer)
//!     ↓
//! infrastructure (基础设施：PdfLoader / RunStore)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：每个处理器只对应一个子命令
//! 2. **资源隔离**：只有编排层读写运行目录
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure

pub mod explain_processor;
pub mod generate_processor;
pub mod quiz_runner;

// 重新导出主要类型
pub use explain_processor::{explain_run, explain_with_backend, ExplainOptions};
pub use generate_processor::{generate_run, GenerateOptions, GenerateSummary};
pub use quiz_runner::{quiz_run, save_quiz_results, QuizOptions, QuizRunner};
