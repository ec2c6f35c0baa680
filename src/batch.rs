//! File and directory extraction with bounded concurrency

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{ExtractorOptions, Selection};
use crate::error::{ExtractError, Result};
use crate::extract::{HtmlExtractor, JsonExtractor};
use crate::result::ExtractionResult;

/// Content type of the files in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    Html,
    Xml,
    Json,
}

impl ContentFormat {
    /// File extensions picked up when walking a directory.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Html => &["html", "htm", "xhtml"],
            Self::Xml => &["xml", "rss", "atom"],
            Self::Json => &["json"],
        }
    }

    pub fn matches(self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    pub fn extract(self, content: &str, selection: &Selection, options: &ExtractorOptions) -> Result<ExtractionResult> {
        match self {
            Self::Html => HtmlExtractor::new(options).extract(content, selection),
            Self::Xml => HtmlExtractor::new(options).extract_xml(content, selection),
            Self::Json => JsonExtractor.extract(content, selection),
        }
    }
}

/// Outcome for one file. A failing file never cancels its siblings.
#[derive(Debug)]
pub struct FileExtraction {
    pub path: PathBuf,
    pub outcome: Result<ExtractionResult>,
}

impl FileExtraction {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Read and extract a single file.
pub fn extract_file(
    path: &Path,
    format: ContentFormat,
    selection: &Selection,
    options: &ExtractorOptions,
) -> Result<ExtractionResult> {
    let content = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    format.extract(&content, selection, options)
}

/// Extract from a file, or from every matching file below a directory.
///
/// Files are processed on blocking tasks, at most
/// [`ExtractorOptions::worker_count`] at a time. Per-file failures are
/// reported in each [`FileExtraction`]; the call itself only fails when
/// `path` is neither a file nor a directory. Result order is unspecified.
pub async fn extract_path(
    path: impl AsRef<Path>,
    selection: &Selection,
    format: ContentFormat,
    options: &ExtractorOptions,
) -> Result<Vec<FileExtraction>> {
    let root = path.as_ref();
    let files = collect_files(root, format)?;
    let workers = options.worker_count();

    debug!(
        path = %root.display(),
        files = files.len(),
        workers,
        "starting batch extraction"
    );

    let selection = Arc::new(selection.clone());
    let options = Arc::new(options.clone());

    let results: Vec<FileExtraction> = stream::iter(files)
        .map(|file| {
            let selection = Arc::clone(&selection);
            let options = Arc::clone(&options);
            async move {
                let task_file = file.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    extract_file(&task_file, format, &selection, &options)
                })
                .await
                .unwrap_or_else(|e| Err(ExtractError::Task(e.to_string())));
                FileExtraction { path: file, outcome }
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut failed = 0;
    for result in &results {
        if let Err(e) = &result.outcome {
            failed += 1;
            warn!(path = %result.path.display(), error = %e, "file extraction failed");
        }
    }
    info!(
        path = %root.display(),
        files = results.len(),
        failed,
        "batch extraction complete"
    );

    Ok(results)
}

fn collect_files(path: &Path, format: ContentFormat) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(ExtractError::InvalidPath(path.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|file| format.matches(file))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::value::Value;

    fn title_selection() -> Selection {
        [("title", "//h1/text()")].into_iter().collect()
    }

    fn sorted(mut results: Vec<FileExtraction>) -> Vec<FileExtraction> {
        results.sort_by(|a, b| a.path.cmp(&b.path));
        results
    }

    #[test]
    fn test_format_matches_extensions() {
        assert!(ContentFormat::Html.matches(Path::new("a/page.HTML")));
        assert!(!ContentFormat::Html.matches(Path::new("feed.xml")));
        assert!(ContentFormat::Xml.matches(Path::new("feed.xml")));
        assert!(ContentFormat::Xml.matches(Path::new("news.RSS")));
        assert!(!ContentFormat::Html.matches(Path::new("data.json")));
        assert!(ContentFormat::Json.matches(Path::new("data.json")));
        assert!(!ContentFormat::Json.matches(Path::new("README")));
    }

    #[tokio::test]
    async fn test_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.txt");
        fs::write(&file, "<h1>Only</h1>").unwrap();

        // an explicit file is extracted whatever its extension
        let results = extract_path(&file, &title_selection(), ContentFormat::Html, &ExtractorOptions::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let result = results[0].outcome.as_ref().unwrap();
        assert_eq!(result.get_string("title").unwrap(), "Only");
    }

    #[tokio::test]
    async fn test_directory_walk() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.html"), "<h1>A</h1>").unwrap();
        fs::write(dir.path().join("b.htm"), "<h1>B</h1>").unwrap();
        fs::write(dir.path().join("nested/c.html"), "<p>no title</p>").unwrap();
        fs::write(dir.path().join("notes.txt"), "<h1>skipped</h1>").unwrap();

        let options = ExtractorOptions::default().with_workers(2);
        let results = sorted(
            extract_path(dir.path(), &title_selection(), ContentFormat::Html, &options)
                .await
                .unwrap(),
        );

        assert_eq!(results.len(), 3);
        let titles: Vec<_> = results
            .iter()
            .map(|r| r.outcome.as_ref().unwrap().get("title").cloned())
            .collect();
        assert_eq!(
            titles,
            vec![Some(Value::from("A")), Some(Value::from("B")), Some(Value::NotFound)]
        );
    }

    #[tokio::test]
    async fn test_failing_file_does_not_cancel_siblings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        fs::write(dir.path().join("good.json"), r#"{"a": {"b": 5}}"#).unwrap();

        let selection: Selection = [("n", "$.a.b")].into_iter().collect();
        let options = ExtractorOptions::default().with_workers(1);
        let results = sorted(
            extract_path(dir.path(), &selection, ContentFormat::Json, &options)
                .await
                .unwrap(),
        );

        assert_eq!(results.len(), 2);
        assert!(matches!(results[0].outcome, Err(ExtractError::Json(_))));
        assert!(!results[0].is_ok());
        assert_eq!(results[1].outcome.as_ref().unwrap().get_i64("n").unwrap(), 5);
    }

    #[tokio::test]
    async fn test_invalid_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        let err = extract_path(&missing, &title_selection(), ContentFormat::Html, &ExtractorOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPath(p) if p == missing));
    }

    #[test]
    fn test_extract_file_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_file(
            &dir.path().join("gone.html"),
            ContentFormat::Html,
            &title_selection(),
            &ExtractorOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
