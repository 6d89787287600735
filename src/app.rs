//! 命令行入口
//!
//! 解析子命令并委托给编排层

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use mcq_forge::infrastructure::run_store::{list_pdfs, list_runs};
use mcq_forge::orchestrator::{
    explain_run, generate_run, quiz_run, ExplainOptions, GenerateOptions, QuizOptions,
};
use mcq_forge::utils::logging;

#[derive(Parser)]
#[command(name = "mcq_forge")]
#[command(about = "从 PDF 生成单选 / 多选题，终端答题并为错题生成解析")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 输出 debug 日志
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 从 PDF 生成题目，创建新的运行目录
    Generate {
        /// YAML 配置文件
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// 源 PDF；不指定时从 contexts 目录中选择
        #[arg(long, value_name = "PDF")]
        context: Option<PathBuf>,

        #[arg(long, value_name = "DIR", default_value = "./contexts")]
        contexts_dir: PathBuf,

        #[arg(long, value_name = "DIR", default_value = "./runs")]
        runs_dir: PathBuf,

        /// 使用离线 mock 模型，不访问网络
        #[arg(long)]
        mock_llm: bool,
    },

    /// 为错题生成解析
    Explain {
        /// 运行目录
        #[arg(long, value_name = "DIR")]
        run: PathBuf,

        /// 错题列表（wrong_ids.json）
        #[arg(long, value_name = "FILE")]
        wrong: PathBuf,

        #[arg(long)]
        mock_llm: bool,
    },

    /// 在终端中作答一次运行的题目
    Quiz {
        #[arg(long, value_name = "DIR")]
        run: PathBuf,

        /// 错题列表输出路径（默认写入运行目录）
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// 列出可用的 PDF
    ListContexts {
        #[arg(long, value_name = "DIR", default_value = "./contexts")]
        contexts_dir: PathBuf,
    },

    /// 列出最近的运行（新的在前）
    ListRuns {
        #[arg(long, value_name = "DIR", default_value = "./runs")]
        runs_dir: PathBuf,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

/// 解析命令行并执行
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Generate {
            config,
            context,
            contexts_dir,
            runs_dir,
            mock_llm,
        } => {
            let context_pdf = match context {
                Some(path) => path,
                None => select_context(&contexts_dir).await?,
            };
            let options = GenerateOptions {
                config_path: config,
                context_pdf,
                runs_dir,
                mock_llm,
            };
            let summary = generate_run(&options).await.context("生成失败")?;
            println!(
                "{} 道题目已写入 {}",
                summary.total_questions,
                summary.run_dir.display()
            );
        }
        Commands::Explain {
            run,
            wrong,
            mock_llm,
        } => {
            let options = ExplainOptions {
                run_dir: run,
                wrong_ids_file: wrong,
                mock_llm,
            };
            let explanations = explain_run(&options).await.context("解析失败")?;
            for (id, text) in &explanations {
                println!("{}: {}\n", id, text);
            }
        }
        Commands::Quiz { run, out } => {
            let options = QuizOptions {
                run_dir: run,
                wrong_ids_out: out,
            };
            quiz_run(&options).await.context("答题失败")?;
        }
        Commands::ListContexts { contexts_dir } => {
            for pdf in list_pdfs(&contexts_dir).await? {
                println!("{}", pdf.display());
            }
        }
        Commands::ListRuns { runs_dir, limit } => {
            for name in list_runs(&runs_dir, limit).await? {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

/// 列出 contexts 目录中的 PDF，由用户输入序号选择
async fn select_context(contexts_dir: &Path) -> Result<PathBuf> {
    let mut pdfs = list_pdfs(contexts_dir).await?;
    match pdfs.len() {
        0 => bail!("{} 中没有 PDF，请使用 --context 指定", contexts_dir.display()),
        1 => return Ok(pdfs.remove(0)),
        _ => {}
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for (i, pdf) in pdfs.iter().enumerate() {
        let name = pdf.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        writeln!(stdout, "  {}. {}", i + 1, name)?;
    }

    loop {
        write!(stdout, "选择 PDF [1-{}]: ", pdfs.len())?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            bail!("未选择 PDF");
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=pdfs.len()).contains(&n) => return Ok(pdfs.remove(n - 1)),
            _ => writeln!(stdout, "⚠️ 无效序号: {}", line.trim())?,
        }
    }
}
