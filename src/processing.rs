use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::chapters::{format_timestamp, Chapter, ChapterPattern};
use crate::config::Config;
use crate::matcher::{filter_chapters, group_chapters};
use crate::naming;
use crate::parser::parse_episode;
use crate::video::{discover_videos, ChapterSource, MkvToolnix, SegmentWriter};

/// Report file written into the output directory when enabled
pub const REPORT_FILE_NAME: &str = "chapter_patterns.json";

/// Per-file outcome counters of the scan stage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSummary {
    pub total_files: usize,
    pub skipped_unreadable: usize,
    pub skipped_no_chapters: usize,
    pub skipped_no_episode: usize,
}

/// Result of a run that produced patterns
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Local>,
    pub summary: ScanSummary,
    pub patterns: Vec<ChapterPattern>,
    pub extracted: usize,
    pub failed: usize,
    pub dry_run: bool,
}

/// Reasons a run ends without anything to extract
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PipelineStop {
    #[error("Input directory not found: {}", .0.display())]
    InputDirMissing(PathBuf),

    #[error("No .{extension} files found in {}", .dir.display())]
    NoVideoFiles { dir: PathBuf, extension: String },

    #[error("No chapters found in any files.")]
    NoChapters,

    #[error("No chapters match the specified filters.")]
    NoFilterMatches,

    #[error("No patterns meet the minimum occurrence threshold.")]
    BelowThreshold,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunReport),
    Stopped(PipelineStop),
}

impl RunOutcome {
    /// 0 when every extraction succeeded (or on a dry run), 1 otherwise
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed(report) if report.failed == 0 => 0,
            _ => 1,
        }
    }
}

/// Assigns collision-free output paths, also avoiding names handed out
/// earlier in the same run.
///
/// Probing checks the filesystem and is not atomic; naming must stay on a
/// single task.
pub struct OutputNamer {
    output_dir: PathBuf,
    episode_parsing: bool,
    reserved: HashSet<PathBuf>,
}

impl OutputNamer {
    pub fn new(output_dir: PathBuf, episode_parsing: bool) -> Self {
        Self {
            output_dir,
            episode_parsing,
            reserved: HashSet::new(),
        }
    }

    pub fn name(&mut self, chapters: &[Chapter]) -> Option<PathBuf> {
        let base_name = naming::output_base_name(chapters, self.episode_parsing)?;
        let path = naming::unique_output_path(&self.output_dir, &base_name, |p| {
            self.reserved.contains(p) || p.exists()
        });

        self.reserved.insert(path.clone());
        Some(path)
    }
}

/// Render the human-readable pattern summary
pub fn format_summary(patterns: &[ChapterPattern], summary: &ScanSummary) -> String {
    let mut out = String::new();

    let _ = write!(out, "\nScanned {} files", summary.total_files);
    let skips: Vec<String> = [
        (summary.skipped_unreadable, "unreadable"),
        (summary.skipped_no_chapters, "no chapters"),
        (summary.skipped_no_episode, "no episode tag"),
    ]
    .into_iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, reason)| format!("{} skipped: {}", count, reason))
    .collect();
    if skips.is_empty() {
        out.push('\n');
    } else {
        let _ = writeln!(out, " ({})", skips.join(", "));
    }

    if patterns.is_empty() {
        out.push_str("\nNo matching patterns detected.\n");
        return out;
    }

    out.push_str("\nDetected patterns:\n");
    for (i, pattern) in patterns.iter().enumerate() {
        let first = &pattern.first_occurrence;
        let avg = pattern.avg_duration.trunc() as u64;
        let title = first.title().map_or_else(|| format!("{}s", avg), str::to_string);
        let _ = writeln!(
            out,
            "  [{}] {} ({}s avg) - {} ({} episodes)",
            i + 1,
            title,
            avg,
            pattern.episode_range,
            pattern.len()
        );

        let occurrence = first.episode().map_or_else(|| first.source_stem(), |e| e.to_string());
        let _ = writeln!(
            out,
            "      First occurrence: {} @ {} - {}",
            occurrence,
            format_timestamp(first.start()),
            format_timestamp(first.end())
        );
        let output_name = pattern
            .output_name
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let _ = writeln!(out, "      Output: {}", output_name);
    }

    out
}

/// Runs the full scan → match → extract pipeline
pub struct BatchProcessor {
    config: Config,
    source: Arc<dyn ChapterSource>,
    writer: Arc<dyn SegmentWriter>,
}

impl BatchProcessor {
    /// Processor backed by mkvtoolnix
    pub fn new(config: Config) -> Self {
        let tools = Arc::new(MkvToolnix::new(&config.tools));
        Self::with_backends(config, tools.clone(), tools)
    }

    pub fn with_backends(
        config: Config,
        source: Arc<dyn ChapterSource>,
        writer: Arc<dyn SegmentWriter>,
    ) -> Self {
        Self {
            config,
            source,
            writer,
        }
    }

    /// Run the pipeline.
    ///
    /// Stages with nothing left to work on end the run with
    /// [`RunOutcome::Stopped`]; only I/O on the output directory is an error.
    pub async fn run(&self) -> Result<RunOutcome> {
        let start_time = Instant::now();
        let input_dir = &self.config.scan.input_dir;
        let output_dir = &self.config.output.output_dir;

        if !input_dir.is_dir() {
            return Ok(RunOutcome::Stopped(PipelineStop::InputDirMissing(input_dir.clone())));
        }

        info!("🔍 Scanning {}", input_dir.display());
        let files = discover_videos(input_dir, &self.config.scan);
        if files.is_empty() {
            return Ok(RunOutcome::Stopped(PipelineStop::NoVideoFiles {
                dir: input_dir.clone(),
                extension: self.config.scan.extension.clone(),
            }));
        }
        info!("📹 Found {} files", files.len());

        let (chapters, summary) = self.collect_chapters(&files).await;
        if chapters.is_empty() {
            return Ok(RunOutcome::Stopped(PipelineStop::NoChapters));
        }
        info!("📖 Collected {} chapters", chapters.len());

        let matching = &self.config.matching;
        let filtered = filter_chapters(chapters, matching.duration_range, matching.chapter_names);
        if filtered.is_empty() {
            return Ok(RunOutcome::Stopped(PipelineStop::NoFilterMatches));
        }
        debug!("{} chapters pass the filters", filtered.len());

        let clusters = group_chapters(filtered, matching);
        if clusters.is_empty() {
            return Ok(RunOutcome::Stopped(PipelineStop::BelowThreshold));
        }

        let patterns = self.build_patterns(clusters);
        print!("{}", format_summary(&patterns, &summary));
        println!();

        let mut report = RunReport {
            generated_at: Local::now(),
            summary,
            patterns,
            extracted: 0,
            failed: 0,
            dry_run: self.config.output.dry_run,
        };

        if !report.dry_run {
            tokio::fs::create_dir_all(output_dir)
                .await
                .with_context(|| format!("Cannot create output directory {}", output_dir.display()))?;
            self.extract_patterns(&mut report).await;
            println!("\nDone. {} extracted, {} failed.", report.extracted, report.failed);
        }

        if self.config.output.save_report {
            self.save_report(&report).await?;
        }

        info!(
            "🎉 Finished in {:.2}s: {} patterns",
            start_time.elapsed().as_secs_f64(),
            report.patterns.len()
        );
        Ok(RunOutcome::Completed(report))
    }

    /// Read every file with bounded concurrency, keeping scan order
    async fn collect_chapters(&self, files: &[PathBuf]) -> (Vec<Chapter>, ScanSummary) {
        let workers = self.config.performance.max_workers.max(1);
        let results: Vec<_> = stream::iter(files)
            .map(|path| {
                let source = Arc::clone(&self.source);
                async move { (path, source.read_chapters(path).await) }
            })
            .buffered(workers)
            .collect()
            .await;

        let mut summary = ScanSummary {
            total_files: files.len(),
            ..ScanSummary::default()
        };
        let mut all_chapters = Vec::new();

        for (path, result) in results {
            let chapters = match result {
                Ok(chapters) if chapters.is_empty() => {
                    warn!("No chapters in {}, skipping.", path.display());
                    summary.skipped_no_chapters += 1;
                    continue;
                }
                Ok(chapters) => chapters,
                Err(e) => {
                    warn!("Could not read {}, skipping: {}", path.display(), e);
                    summary.skipped_unreadable += 1;
                    continue;
                }
            };

            if self.config.matching.episode_parsing {
                let Some(episode) = parse_episode(path) else {
                    warn!("No episode tag in {}, skipping.", file_name(path));
                    summary.skipped_no_episode += 1;
                    continue;
                };
                all_chapters.extend(chapters.into_iter().map(|c| c.with_episode(episode)));
            } else {
                all_chapters.extend(chapters);
            }
        }

        (all_chapters, summary)
    }

    fn build_patterns(&self, clusters: Vec<Vec<Chapter>>) -> Vec<ChapterPattern> {
        let episode_parsing = self.config.matching.episode_parsing;
        let mut namer = OutputNamer::new(self.config.output.output_dir.clone(), episode_parsing);

        clusters
            .into_iter()
            .filter_map(|cluster| {
                let output_name = namer.name(&cluster)?;
                ChapterPattern::new(cluster, output_name, episode_parsing)
            })
            .collect()
    }

    /// Extract the first occurrence of every pattern, one at a time
    async fn extract_patterns(&self, report: &mut RunReport) {
        for pattern in &report.patterns {
            let name = file_name(&pattern.output_name);
            info!("Extracting: {}", name);

            if self.writer.extract(&pattern.first_occurrence, &pattern.output_name).await {
                println!("Extracting: {}... OK", name);
                report.extracted += 1;
            } else {
                println!("Extracting: {}... FAILED", name);
                error!("❌ Extraction failed: {}", name);
                report.failed += 1;
            }
        }
    }

    async fn save_report(&self, report: &RunReport) -> Result<()> {
        let output_dir = &self.config.output.output_dir;
        tokio::fs::create_dir_all(output_dir).await?;

        let report_path = output_dir.join(REPORT_FILE_NAME);
        let json_data = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&report_path, json_data).await?;

        info!("💾 Report saved to: {}", report_path.display());
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
