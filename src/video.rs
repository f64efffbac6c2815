use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::chapters::{format_timestamp, parse_timestamp, Chapter};
use crate::config::{ScanConfig, ToolsConfig};
use crate::error::{ExtractorError, Result};

static CHAPTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^CHAPTER(\d+)=(.+)").unwrap());
static CHAPTER_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^CHAPTER(\d+)NAME=(.*)").unwrap());

/// Reads the chapters embedded in a media file
#[async_trait]
pub trait ChapterSource: Send + Sync {
    /// `Ok(vec![])` means the file was read and has no chapters.
    async fn read_chapters(&self, path: &Path) -> Result<Vec<Chapter>>;
}

/// Cuts a single chapter out of its source file
#[async_trait]
pub trait SegmentWriter: Send + Sync {
    /// Returns `true` when the segment was written.
    async fn extract(&self, chapter: &Chapter, output_path: &Path) -> bool;
}

/// Chapter count and duration reported by `mkvmerge -J`
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub chapter_count: usize,
    pub duration_secs: f64,
}

#[derive(Debug, Deserialize)]
struct IdentifyOutput {
    #[serde(default)]
    chapters: Vec<ChapterEdition>,
    container: IdentifyContainer,
}

#[derive(Debug, Deserialize)]
struct ChapterEdition {
    #[serde(default)]
    num_entries: usize,
}

#[derive(Debug, Deserialize)]
struct IdentifyContainer {
    #[serde(default)]
    properties: ContainerProperties,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerProperties {
    /// Nanoseconds
    duration: Option<u64>,
}

/// Parse `mkvmerge -J` output
pub fn parse_identify_output(json: &str) -> Result<FileInfo> {
    let identify: IdentifyOutput = serde_json::from_str(json)?;
    let duration_ns = identify
        .container
        .properties
        .duration
        .ok_or_else(|| ExtractorError::MalformedOutput("container duration missing".to_string()))?;

    Ok(FileInfo {
        chapter_count: identify.chapters.first().map_or(0, |edition| edition.num_entries),
        duration_secs: duration_ns as f64 / 1_000_000_000.0,
    })
}

/// Parse `mkvextract chapters --simple` output.
///
/// Each chapter ends where the next one starts; the last one ends at
/// `file_duration`. Chapters with an empty or negative span are dropped.
pub fn parse_simple_chapters(content: &str, file_duration: f64, source_file: &Path) -> Vec<Chapter> {
    let mut timestamps: BTreeMap<u32, f64> = BTreeMap::new();
    let mut names: BTreeMap<u32, String> = BTreeMap::new();

    for line in content.lines() {
        let line = line.trim_end();
        if let Some(caps) = CHAPTER_RE.captures(line) {
            if let (Ok(id), Some(ts)) = (caps[1].parse::<u32>(), parse_timestamp(&caps[2])) {
                timestamps.insert(id, ts);
            }
        } else if let Some(caps) = CHAPTER_NAME_RE.captures(line) {
            if let Ok(id) = caps[1].parse::<u32>() {
                names.insert(id, caps[2].trim().to_string());
            }
        }
    }

    let starts: Vec<(u32, f64)> = timestamps.into_iter().collect();
    let mut chapters = Vec::with_capacity(starts.len());

    for (i, &(id, start)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map_or(file_duration, |&(_, next)| next);
        let title = names.remove(&id).filter(|n| !n.is_empty());

        match Chapter::new(start, end, title, source_file) {
            Some(chapter) => chapters.push(chapter),
            None => debug!(
                "Dropping chapter {} of {}: {:.3}s..{:.3}s",
                id,
                source_file.display(),
                start,
                end
            ),
        }
    }

    chapters
}

/// Arguments for `mkvmerge` to cut `chapter` into `output_path`
pub fn split_args(chapter: &Chapter, output_path: &Path) -> Vec<OsString> {
    vec![
        "-o".into(),
        output_path.as_os_str().to_owned(),
        "--split".into(),
        format!(
            "parts:{}-{}",
            format_timestamp(chapter.start()),
            format_timestamp(chapter.end())
        )
        .into(),
        chapter.source_file().as_os_str().to_owned(),
    ]
}

/// mkvmerge exits with 0 on success, 1 on success with warnings and 2 on error
pub fn is_success_status(code: Option<i32>) -> bool {
    matches!(code, Some(0) | Some(1))
}

/// Find media files with the configured extension, sorted by path
pub fn discover_videos(dir: &Path, scan: &ScanConfig) -> Vec<PathBuf> {
    let max_depth = if scan.recursive { usize::MAX } else { 1 };
    let extension = scan.extension.to_lowercase();

    let mut videos: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map_or(false, |ext| ext.to_string_lossy().to_lowercase() == extension)
        })
        .collect();

    // Plain string order, so "a b/x" sorts before "a/x"
    videos.sort_by_cached_key(|path| path.to_string_lossy().into_owned());
    videos
}

/// mkvtoolnix-backed chapter reader and segment writer
#[derive(Debug, Clone)]
pub struct MkvToolnix {
    mkvmerge: PathBuf,
    mkvextract: PathBuf,
}

impl MkvToolnix {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            mkvmerge: tools.mkvmerge.clone(),
            mkvextract: tools.mkvextract.clone(),
        }
    }

    async fn run(tool: &Path, args: &[OsString]) -> Result<Output> {
        Command::new(tool)
            .args(args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ExtractorError::ToolNotFound(tool.display().to_string()),
                _ => ExtractorError::Io(e),
            })
    }

    fn check_status(tool: &Path, output: &Output) -> Result<()> {
        if is_success_status(output.status.code()) {
            return Ok(());
        }
        Err(ExtractorError::ToolFailed {
            tool: tool.display().to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Get chapter count and duration from `mkvmerge -J`
    pub async fn get_file_info(&self, path: &Path) -> Result<FileInfo> {
        let output = Self::run(&self.mkvmerge, &["-J".into(), path.as_os_str().to_owned()]).await?;
        Self::check_status(&self.mkvmerge, &output)?;
        parse_identify_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Dump chapters in the simple format through a temporary file
    async fn read_simple_chapters(&self, path: &Path) -> Result<String> {
        let tmp = tempfile::Builder::new().suffix(".txt").tempfile()?;
        let args = [
            path.as_os_str().to_owned(),
            "chapters".into(),
            "--simple".into(),
            tmp.path().as_os_str().to_owned(),
        ];

        let output = Self::run(&self.mkvextract, &args).await?;
        Self::check_status(&self.mkvextract, &output)?;
        Ok(tokio::fs::read_to_string(tmp.path()).await?)
    }
}

impl Default for MkvToolnix {
    fn default() -> Self {
        Self::new(&ToolsConfig::default())
    }
}

#[async_trait]
impl ChapterSource for MkvToolnix {
    async fn read_chapters(&self, path: &Path) -> Result<Vec<Chapter>> {
        let info = self.get_file_info(path).await?;
        if info.chapter_count == 0 {
            return Ok(Vec::new());
        }

        let content = self.read_simple_chapters(path).await?;
        let chapters = parse_simple_chapters(&content, info.duration_secs, path);
        debug!(
            "📖 Read {} chapters from {} ({:.1}s)",
            chapters.len(),
            path.display(),
            info.duration_secs
        );
        Ok(chapters)
    }
}

#[async_trait]
impl SegmentWriter for MkvToolnix {
    async fn extract(&self, chapter: &Chapter, output_path: &Path) -> bool {
        if let Some(parent) = output_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!("Cannot create {}: {}", parent.display(), e);
                return false;
            }
        }

        let output = match Self::run(&self.mkvmerge, &split_args(chapter, output_path)).await {
            Ok(output) => output,
            Err(e) => {
                error!("Error extracting {}: {}", output_path.display(), e);
                return false;
            }
        };

        if !is_success_status(output.status.code()) {
            error!(
                "Error extracting {}: {}",
                output_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return false;
        }

        info!("✂️ Extracted {}", output_path.display());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SIMPLE_CHAPTERS: &str = "\
CHAPTER01=00:00:00.000
CHAPTER01NAME=Intro
CHAPTER02=00:01:30.000
CHAPTER02NAME=Episode
CHAPTER03=00:23:00.000
CHAPTER03NAME=Ending
";

    const SIMPLE_NO_NAMES: &str = "\
CHAPTER01=00:00:00.000
CHAPTER01NAME=
CHAPTER02=00:05:00.000
CHAPTER02NAME=
";

    const IDENTIFY_JSON: &str = r#"{
  "chapters": [{"num_entries": 3}],
  "container": {"properties": {"duration": 1440000000000}}
}"#;

    const IDENTIFY_NO_CHAPTERS: &str = r#"{
  "chapters": [],
  "container": {"properties": {"duration": 1440000000000}}
}"#;

    fn missing_tools() -> MkvToolnix {
        MkvToolnix::new(&ToolsConfig {
            mkvmerge: PathBuf::from("/nonexistent/bin/mkvmerge"),
            mkvextract: PathBuf::from("/nonexistent/bin/mkvextract"),
        })
    }

    #[test]
    fn test_parse_simple_chapters() {
        let chapters = parse_simple_chapters(SIMPLE_CHAPTERS, 1440.0, Path::new("/fake/Show S01E01.mkv"));

        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title(), Some("Intro"));
        assert_eq!((chapters[0].start(), chapters[0].end()), (0.0, 90.0));
        assert_eq!(chapters[0].duration(), 90.0);
        assert_eq!(chapters[1].title(), Some("Episode"));
        assert_eq!((chapters[1].start(), chapters[1].end()), (90.0, 1380.0));
        assert_eq!(chapters[2].title(), Some("Ending"));
        assert_eq!((chapters[2].start(), chapters[2].end()), (1380.0, 1440.0));
        assert_eq!(chapters[2].duration(), 60.0);
        assert_eq!(chapters[2].source_file(), Path::new("/fake/Show S01E01.mkv"));
    }

    #[test]
    fn test_parse_simple_chapters_empty_names() {
        let chapters = parse_simple_chapters(SIMPLE_NO_NAMES, 1440.0, Path::new("/fake/a.mkv"));
        assert_eq!(chapters.len(), 2);
        assert!(chapters.iter().all(|c| c.title().is_none()));
    }

    #[test]
    fn test_parse_simple_chapters_numeric_order() {
        let content = "CHAPTER100=00:10:00.000\nCHAPTER99=00:05:00.000\nCHAPTER99NAME=Late\n";
        let chapters = parse_simple_chapters(content, 900.0, Path::new("/fake/a.mkv"));
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title(), Some("Late"));
        assert_eq!(chapters[0].end(), 600.0);
    }

    #[test]
    fn test_parse_simple_chapters_drops_empty_spans() {
        let content = "CHAPTER01=00:00:00.000\nCHAPTER02=00:24:00.000\n";
        let chapters = parse_simple_chapters(content, 1440.0, Path::new("/fake/a.mkv"));
        assert_eq!(chapters.len(), 1);
    }

    #[test]
    fn test_parse_identify_output() {
        let info = parse_identify_output(IDENTIFY_JSON).unwrap();
        assert_eq!(info, FileInfo { chapter_count: 3, duration_secs: 1440.0 });

        let info = parse_identify_output(IDENTIFY_NO_CHAPTERS).unwrap();
        assert_eq!(info.chapter_count, 0);

        let info = parse_identify_output(r#"{"container": {"properties": {"duration": 1000000000}}}"#).unwrap();
        assert_eq!(info.chapter_count, 0);
        assert_eq!(info.duration_secs, 1.0);
    }

    #[test]
    fn test_parse_identify_output_errors() {
        assert!(matches!(parse_identify_output("not json"), Err(ExtractorError::Json(_))));
        assert!(matches!(
            parse_identify_output(r#"{"container": {"properties": {}}}"#),
            Err(ExtractorError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_split_args() {
        let chapter = Chapter::new(90.0, 180.0, Some("Opening".into()), "/fake/Show S01E01.mkv").unwrap();
        let args = split_args(&chapter, Path::new("/tmp/out/S01E01-S01E12_Opening.mkv"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(
            args,
            vec![
                "-o",
                "/tmp/out/S01E01-S01E12_Opening.mkv",
                "--split",
                "parts:00:01:30.000-00:03:00.000",
                "/fake/Show S01E01.mkv",
            ]
        );
    }

    #[test]
    fn test_success_status() {
        assert!(is_success_status(Some(0)));
        assert!(is_success_status(Some(1)));
        assert!(!is_success_status(Some(2)));
        assert!(!is_success_status(None));
    }

    #[test]
    fn test_discover_videos() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir(root.join("season2")).unwrap();
        for name in ["b S01E02.mkv", "a S01E01.MKV", "notes.txt", "season2/c S02E01.mkv"] {
            std::fs::write(root.join(name), b"").unwrap();
        }

        let flat = discover_videos(root, &ScanConfig::default());
        assert_eq!(flat, vec![root.join("a S01E01.MKV"), root.join("b S01E02.mkv")]);

        let scan = ScanConfig {
            recursive: true,
            ..ScanConfig::default()
        };
        let all = discover_videos(root, &scan);
        assert_eq!(all.len(), 3);
        assert_eq!(all[2], root.join("season2/c S02E01.mkv"));
    }

    #[test]
    fn test_discover_videos_string_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for dir in ["a", "a b"] {
            std::fs::create_dir(root.join(dir)).unwrap();
            std::fs::write(root.join(dir).join("x.mkv"), b"").unwrap();
        }

        let scan = ScanConfig {
            recursive: true,
            ..ScanConfig::default()
        };
        assert_eq!(
            discover_videos(root, &scan),
            vec![root.join("a b/x.mkv"), root.join("a/x.mkv")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_videos_follows_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        let library = temp_dir.path().join("library");
        std::fs::create_dir(&real).unwrap();
        std::fs::create_dir(&library).unwrap();
        std::fs::write(real.join("Show S01E01.mkv"), b"").unwrap();
        std::os::unix::fs::symlink(real.join("Show S01E01.mkv"), library.join("Show S01E01.mkv")).unwrap();

        let found = discover_videos(&library, &ScanConfig::default());
        assert_eq!(found, vec![library.join("Show S01E01.mkv")]);
    }

    #[tokio::test]
    async fn test_read_chapters_tool_missing() {
        let result = missing_tools().read_chapters(Path::new("/fake/file.mkv")).await;
        assert!(matches!(result, Err(ExtractorError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn test_extract_tool_missing_creates_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("new_dir").join("out.mkv");
        let chapter = Chapter::new(0.0, 90.0, None, "/fake/Show S01E01.mkv").unwrap();

        assert!(!missing_tools().extract(&chapter, &output).await);
        assert!(temp_dir.path().join("new_dir").is_dir());
    }
}
