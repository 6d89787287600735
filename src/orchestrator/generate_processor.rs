//! 生成处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责一次完整的生成运行，是运行级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **准备资源**：加载配置、提示词、模型后端（在线或 mock）
//! 2. **创建运行目录**：写入 manifest、配置快照，开启 run.log
//! 3. **提取与分块**：读取 PDF 页面并切分
//! 4. **遍历分块**：委托 `ChunkFlow` 逐块生成，第一次失败即终止
//! 5. **收尾**：打乱、编号并写出 output.json

use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::instrument::WithSubscriber;
use tracing::{error, info};

use crate::config::{ApiCredentials, Config};
use crate::error::{AppResult, ExtractionError};
use crate::infrastructure::run_store::{
    CHUNKS_FILE, CONFIG_SNAPSHOT_FILE, LOG_FILE, PAGES_FILE,
};
use crate::infrastructure::{PdfLoader, RunStore};
use crate::models::run::{PromptFiles, SCHEMA_VERSION};
use crate::models::{Manifest, Question, RunOutput, RunSettings};
use crate::services::chunker::make_chunks;
use crate::services::response_parser::finalize_questions;
use crate::services::{LlmBackend, LlmService, MockLlm, PromptAssembler};
use crate::utils::logging::{
    log_run_start, log_startup, print_generation_stats, run_dispatch,
};
use crate::workflow::{ChunkCtx, ChunkFlow};

/// 生成命令参数
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub config_path: PathBuf,
    pub context_pdf: PathBuf,
    pub runs_dir: PathBuf,
    pub mock_llm: bool,
}

/// 生成结果摘要
#[derive(Debug, Clone)]
pub struct GenerateSummary {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub total_questions: usize,
}

/// 执行一次生成运行
///
/// # 参数
/// - `options`: 配置文件、PDF、运行目录和模型模式
///
/// # 返回
/// 返回运行ID、运行目录和题目数量
pub async fn generate_run(options: &GenerateOptions) -> AppResult<GenerateSummary> {
    let config = Config::load(&options.config_path)?;

    if !options.context_pdf.is_file() {
        return Err(ExtractionError::FileNotFound {
            path: options.context_pdf.clone(),
        }
        .into());
    }

    let backend = build_backend(&config, options.mock_llm)?;
    let assembler = PromptAssembler::from_config(&config).await?;

    let store = RunStore::create(&options.runs_dir, &options.context_pdf).await?;
    let dispatch = run_dispatch(&store.path(LOG_FILE), "mcq_forge 生成日志")?;

    // 本次运行内的日志只进入自己的 run.log
    let result = async {
        log_startup("generate", &backend.describe());
        let result = run_pipeline(&store, &config, options, backend.as_ref(), &assembler).await;
        match &result {
            Ok(total) => print_generation_stats(store.run_id(), *total, store.dir()),
            Err(e) => error!("❌ 运行 {} 失败: {}", store.run_id(), e),
        }
        result
    }
    .with_subscriber(dispatch)
    .await;

    Ok(GenerateSummary {
        run_id: store.run_id().to_string(),
        run_dir: store.dir().to_path_buf(),
        total_questions: result?,
    })
}

/// 根据模式创建模型后端
pub fn build_backend(config: &Config, mock_llm: bool) -> AppResult<Box<dyn LlmBackend>> {
    if mock_llm {
        return Ok(Box::new(MockLlm::new()));
    }
    let credentials =
        ApiCredentials::load(&config.llm.api_key_file, config.llm.api_base.as_deref())?;
    Ok(Box::new(LlmService::new(&config.llm, &credentials)))
}

/// 运行目录创建之后的全部步骤，返回题目数量
async fn run_pipeline(
    store: &RunStore,
    config: &Config,
    options: &GenerateOptions,
    backend: &dyn LlmBackend,
    assembler: &PromptAssembler,
) -> AppResult<usize> {
    let manifest = build_manifest(store.run_id(), config, options);
    store.write_manifest(&manifest).await?;
    store
        .write_text(CONFIG_SNAPSHOT_FILE, &config.snapshot_yaml()?)
        .await?;

    info!("📖 正在读取 PDF: {}", options.context_pdf.display());
    let pages = PdfLoader::load(&options.context_pdf).await?;
    store.write_jsonl(PAGES_FILE, &pages).await?;

    let chunks = make_chunks(pages.len(), &config.partitioning)?;
    store.write_jsonl(CHUNKS_FILE, &chunks).await?;

    let generation = &config.generation;
    log_run_start(
        store.run_id(),
        pages.len(),
        chunks.len(),
        generation.questions_per_partition,
    );

    // 固定种子时整个运行可复现
    let mut rng = match config.randomization.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let flow = ChunkFlow::new(
        backend,
        assembler,
        generation.question_type,
        generation.choices_per_question,
        generation.questions_per_partition,
    );

    let mut questions: Vec<Question> =
        Vec::with_capacity(chunks.len() * generation.questions_per_partition);
    for (index, chunk) in chunks.iter().enumerate() {
        let ctx = ChunkCtx::new(store.run_id(), chunk, index + 1, chunks.len());
        questions.extend(flow.run(&pages, &ctx, &mut rng).await?);
    }

    let randomization = &config.randomization;
    let questions = finalize_questions(
        questions,
        randomization.randomize_questions,
        randomization.randomize_options,
        &mut rng,
    );

    let output = RunOutput {
        schema_version: SCHEMA_VERSION,
        run_id: store.run_id().to_string(),
        context_file: manifest.context_file.clone(),
        settings: RunSettings {
            question_type: generation.question_type,
            choices_per_question: generation.choices_per_question,
            questions_per_partition: generation.questions_per_partition,
            randomize_questions: randomization.randomize_questions,
            randomize_options: randomization.randomize_options,
        },
        questions,
    };
    store.write_output(&output).await?;

    Ok(output.questions.len())
}

fn build_manifest(run_id: &str, config: &Config, options: &GenerateOptions) -> Manifest {
    let prompts = &config.prompts;
    Manifest {
        schema_version: SCHEMA_VERSION,
        run_id: run_id.to_string(),
        created_at: Local::now().to_rfc3339(),
        context_file: context_file_name(&options.context_pdf),
        config_file: display_path(&options.config_path),
        llm_mode: if options.mock_llm { "mock" } else { "live" }.to_string(),
        prompt_files: PromptFiles {
            user: display_path(&prompts.user_prompt_file),
            mcq_fixed: display_path(&prompts.mcq_prompt_file),
            sata_fixed: display_path(&prompts.sata_prompt_file),
            explanation: display_path(&prompts.explanation_prompt_file),
        },
        llm: config.llm.snapshot(),
        seed: config.randomization.seed,
    }
}

/// 资料只记录文件名
fn context_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// 尽量写入绝对路径，explain 可能在其他工作目录下执行
fn display_path(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_file_name_drops_directories() {
        assert_eq!(
            context_file_name(Path::new("/data/notes/Cell Biology.pdf")),
            "Cell Biology.pdf"
        );
        assert_eq!(context_file_name(Path::new("bio.pdf")), "bio.pdf");
    }
}
