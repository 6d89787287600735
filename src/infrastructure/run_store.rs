//! 运行目录存储 - 基础设施层
//!
//! 持有一个 `runs/<timestamp>__<context>/` 目录，只暴露读写能力

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, AppResult, NotFoundError};
use crate::models::{Manifest, RunOutput, WrongAnswers};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const OUTPUT_FILE: &str = "output.json";
pub const PAGES_FILE: &str = "pages.jsonl";
pub const CHUNKS_FILE: &str = "chunks.jsonl";
pub const CONFIG_SNAPSHOT_FILE: &str = "config.snapshot.yaml";
pub const LOG_FILE: &str = "run.log";
pub const WRONG_IDS_FILE: &str = "wrong_ids.json";
pub const RESULTS_FILE: &str = "results.json";
pub const EXPLANATIONS_FILE: &str = "explanations.json";

/// 运行目录
#[derive(Debug, Clone)]
pub struct RunStore {
    dir: PathBuf,
    run_id: String,
}

impl RunStore {
    /// 创建新的运行目录
    ///
    /// 同一秒内对同一个文件重复生成时追加 `_2`、`_3` 后缀
    pub async fn create(runs_dir: &Path, context_pdf: &Path) -> AppResult<Self> {
        fs::create_dir_all(runs_dir)
            .await
            .map_err(|e| AppError::io(runs_dir, e))?;

        let base_id = make_run_id(context_pdf, Local::now());
        let mut attempt = 1;
        loop {
            let run_id = if attempt == 1 {
                base_id.clone()
            } else {
                format!("{}_{}", base_id, attempt)
            };
            let dir = runs_dir.join(&run_id);
            match fs::create_dir(&dir).await {
                Ok(()) => {
                    debug!("创建运行目录: {}", dir.display());
                    return Ok(Self { dir, run_id });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(AppError::io(&dir, e)),
            }
        }
    }

    /// 打开已存在的运行目录
    pub fn open(dir: &Path) -> AppResult<Self> {
        if !dir.is_dir() {
            return Err(NotFoundError::RunFile {
                path: dir.to_path_buf(),
            }
            .into());
        }
        let run_id = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self {
            dir: dir.to_path_buf(),
            run_id,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    // ========== 通用读写 ==========

    pub async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> AppResult<()> {
        let path = self.path(name);
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| AppError::parse_json(format!("无法序列化 {}", name), e))?;
        fs::write(&path, content)
            .await
            .map_err(|e| AppError::io(&path, e))?;
        debug!("已写入 {}", name);
        Ok(())
    }

    pub async fn write_jsonl<T: Serialize>(&self, name: &str, rows: &[T]) -> AppResult<()> {
        let path = self.path(name);
        let mut content = String::new();
        for row in rows {
            let line = serde_json::to_string(row)
                .map_err(|e| AppError::parse_json(format!("无法序列化 {}", name), e))?;
            content.push_str(&line);
            content.push('\n');
        }
        fs::write(&path, content)
            .await
            .map_err(|e| AppError::io(&path, e))?;
        debug!("已写入 {} ({} 行)", name, rows.len());
        Ok(())
    }

    pub async fn write_text(&self, name: &str, content: &str) -> AppResult<()> {
        let path = self.path(name);
        fs::write(&path, content)
            .await
            .map_err(|e| AppError::io(&path, e))
    }

    pub async fn read_json<T: DeserializeOwned>(&self, name: &str) -> AppResult<T> {
        read_json_file(&self.path(name)).await
    }

    // ========== 具体文件 ==========

    pub async fn read_output(&self) -> AppResult<RunOutput> {
        self.read_json(OUTPUT_FILE).await
    }

    pub async fn write_output(&self, output: &RunOutput) -> AppResult<()> {
        self.write_json(OUTPUT_FILE, output).await
    }

    pub async fn read_manifest(&self) -> AppResult<Manifest> {
        self.read_json(MANIFEST_FILE).await
    }

    pub async fn write_manifest(&self, manifest: &Manifest) -> AppResult<()> {
        self.write_json(MANIFEST_FILE, manifest).await
    }
}

/// 读取 JSON 文件，文件不存在返回 NotFound
pub async fn read_json_file<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(NotFoundError::RunFile {
                path: path.to_path_buf(),
            }
            .into())
        }
        Err(e) => return Err(AppError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map_err(|e| AppError::parse_json(format!("无法解析 {}", path.display()), e))
}

/// 读取 `{"wrong_question_ids": [...]}`
pub async fn read_wrong_ids(path: &Path) -> AppResult<WrongAnswers> {
    read_json_file(path).await
}

/// 文件名转为目录安全的形式
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else if ch == ' ' || ch == '.' {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// `<YYYY-MM-DD_HH-MM-SS>__<slug>`
pub fn make_run_id(context_pdf: &Path, now: DateTime<Local>) -> String {
    let stem = context_pdf
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let slug = slugify(&stem);
    let slug = if slug.is_empty() { "context".to_string() } else { slug };
    format!("{}__{}", now.format("%Y-%m-%d_%H-%M-%S"), slug)
}

/// 列出运行目录（新的在前）
pub async fn list_runs(runs_dir: &Path, limit: usize) -> AppResult<Vec<String>> {
    if !runs_dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    let mut entries = fs::read_dir(runs_dir)
        .await
        .map_err(|e| AppError::io(runs_dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::io(runs_dir, e))?
    {
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort_unstable_by(|a, b| b.cmp(a));
    names.truncate(limit);
    Ok(names)
}

/// 列出目录下的 PDF（按文件名排序）
pub async fn list_pdfs(contexts_dir: &Path) -> AppResult<Vec<PathBuf>> {
    if !contexts_dir.exists() {
        return Ok(Vec::new());
    }
    let mut pdfs = Vec::new();
    let mut entries = fs::read_dir(contexts_dir)
        .await
        .map_err(|e| AppError::io(contexts_dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::io(contexts_dir, e))?
    {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if path.is_file() && is_pdf {
            pdfs.push(path);
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Cell Biology ch.3"), "Cell_Biology_ch_3");
        assert_eq!(slugify("  (draft)  "), "draft");
        assert_eq!(slugify("bio-101_v2"), "bio-101_v2");
    }

    #[test]
    fn test_make_run_id() {
        let now = Local.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap();
        let id = make_run_id(Path::new("/tmp/contexts/Cell Biology.pdf"), now);
        assert_eq!(id, "2026-03-09_14-05-07__Cell_Biology");
    }

    #[tokio::test]
    async fn test_create_never_reuses_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Path::new("bio.pdf");
        let a = RunStore::create(dir.path(), ctx).await.unwrap();
        let b = RunStore::create(dir.path(), ctx).await.unwrap();
        let c = RunStore::create(dir.path(), Path::new("chem.pdf")).await.unwrap();
        assert_ne!(a.run_id(), b.run_id());
        assert_ne!(a.run_id(), c.run_id());
        assert!(a.dir().is_dir() && b.dir().is_dir() && c.dir().is_dir());
    }

    #[tokio::test]
    async fn test_open_missing_run() {
        let err = RunStore::open(Path::new("/no/such/run")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(NotFoundError::RunFile { .. })));
    }

    #[tokio::test]
    async fn test_json_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let wrong = WrongAnswers {
            wrong_question_ids: vec!["q_0001".to_string()],
        };
        store.write_json(WRONG_IDS_FILE, &wrong).await.unwrap();
        let back = read_wrong_ids(&store.path(WRONG_IDS_FILE)).await.unwrap();
        assert_eq!(back, wrong);

        let err = store.read_output().await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_wrong_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wrong.json");
        std::fs::write(&path, r#"{"wrong_question_ids": [1, 2]}"#).unwrap();
        let err = read_wrong_ids(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_list_runs_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2026-01-01_00-00-00__a", "2026-02-01_00-00-00__b", "2025-12-31_00-00-00__c"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("stray.txt"), "x").unwrap();
        let runs = list_runs(dir.path(), 2).await.unwrap();
        assert_eq!(runs, vec!["2026-02-01_00-00-00__b", "2026-01-01_00-00-00__a"]);
    }

    #[tokio::test]
    async fn test_list_pdfs_filters_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let pdfs = list_pdfs(dir.path()).await.unwrap();
        let names: Vec<_> = pdfs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }
}
