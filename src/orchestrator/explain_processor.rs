//! 解析处理器 - 编排层
//!
//! 读取运行目录和错题列表，委托 `Explainer` 生成解析并写回运行目录

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::instrument::WithSubscriber;
use tracing::{error, info};

use crate::config::{ApiCredentials, LlmConfig};
use crate::error::AppResult;
use crate::infrastructure::run_store::{read_wrong_ids, EXPLANATIONS_FILE, LOG_FILE};
use crate::infrastructure::RunStore;
use crate::models::{Manifest, RunOutput};
use crate::services::prompt_assembler::read_template;
use crate::services::{Explainer, LlmBackend, LlmService, MockLlm};
use crate::utils::logging::{log_startup, run_dispatch};

/// 解析命令参数
#[derive(Debug, Clone)]
pub struct ExplainOptions {
    pub run_dir: PathBuf,
    pub wrong_ids_file: PathBuf,
    pub mock_llm: bool,
}

/// 为错题生成解析
///
/// 模型参数取自运行时的快照，保证与生成时一致
///
/// # 返回
/// 返回题目ID到解析文本的映射
pub async fn explain_run(options: &ExplainOptions) -> AppResult<BTreeMap<String, String>> {
    let store = RunStore::open(&options.run_dir)?;
    let manifest = store.read_manifest().await?;
    let wrong = read_wrong_ids(&options.wrong_ids_file).await?;

    let backend = backend_from_manifest(&manifest, options.mock_llm)?;
    let template = read_template(Path::new(&manifest.prompt_files.explanation)).await?;

    explain_with_backend(&store, backend.as_ref(), template, &wrong.wrong_question_ids).await
}

/// 使用给定模型后端解析错题并写回运行目录
///
/// 任何一步失败时 output.json 与 explanations.json 都不会被改动
pub async fn explain_with_backend(
    store: &RunStore,
    backend: &dyn LlmBackend,
    template: String,
    wrong_ids: &[String],
) -> AppResult<BTreeMap<String, String>> {
    let dispatch = run_dispatch(&store.path(LOG_FILE), "mcq_forge 解析日志")?;

    async {
        log_startup("explain", &backend.describe());
        info!("📋 运行 {}，错题 {} 道", store.run_id(), wrong_ids.len());

        let result = explain_and_save(store, backend, template, wrong_ids).await;
        match &result {
            Ok(explanations) => info!(
                "✅ 已写入 {} 条解析: {}",
                explanations.len(),
                store.path(EXPLANATIONS_FILE).display()
            ),
            Err(e) => error!("❌ 解析失败: {}", e),
        }
        result
    }
    .with_subscriber(dispatch)
    .await
}

async fn explain_and_save(
    store: &RunStore,
    backend: &dyn LlmBackend,
    template: String,
    wrong_ids: &[String],
) -> AppResult<BTreeMap<String, String>> {
    let mut output = store.read_output().await?;
    let explainer = Explainer::new(backend, template);
    let explanations = explainer.explain(&mut output, wrong_ids).await?;
    save_explanations(store, &output, explanations).await
}

/// 写回 output.json 并单独保存 explanations.json
async fn save_explanations(
    store: &RunStore,
    output: &RunOutput,
    explanations: BTreeMap<String, String>,
) -> AppResult<BTreeMap<String, String>> {
    store.write_output(output).await?;
    store.write_json(EXPLANATIONS_FILE, &explanations).await?;
    Ok(explanations)
}

fn backend_from_manifest(manifest: &Manifest, mock_llm: bool) -> AppResult<Box<dyn LlmBackend>> {
    if mock_llm {
        return Ok(Box::new(MockLlm::new()));
    }
    let llm = LlmConfig::from_snapshot(&manifest.llm);
    let credentials = ApiCredentials::load(&llm.api_key_file, llm.api_base.as_deref())?;
    Ok(Box::new(LlmService::new(&llm, &credentials)))
}
