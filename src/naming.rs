/// Output naming for detected chapter patterns
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::chapters::Chapter;

/// Extension of extracted segments
pub const OUTPUT_EXTENSION: &str = "mkv";

/// Titles shorter than this are not used as identifiers
const MIN_TITLE_CHARS: usize = 2;

static UNSAFE_CHARS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

/// Format the episode range of a cluster, e.g. `S01E01-S01E12`.
///
/// Falls back to the first chapter's source file stem when no chapter has
/// episode info. Returns `None` for an empty cluster.
pub fn format_episode_range(chapters: &[Chapter]) -> Option<String> {
    let first_chapter = chapters.first()?;
    let first = chapters.iter().filter_map(Chapter::episode).min();
    let last = chapters.iter().filter_map(Chapter::episode).max();

    match (first, last) {
        (Some(first), Some(last)) if first == last => Some(first.to_string()),
        (Some(first), Some(last)) => Some(format!("{}-{}", first, last)),
        _ => Some(first_chapter.source_stem()),
    }
}

/// Replace characters unsafe for filenames with `_` and trim whitespace
pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_CHARS_RE.replace_all(name, "_").trim().to_string()
}

/// Mean chapter duration in seconds, 0 for an empty cluster
pub fn average_duration(chapters: &[Chapter]) -> f64 {
    if chapters.is_empty() {
        return 0.0;
    }
    chapters.iter().map(Chapter::duration).sum::<f64>() / chapters.len() as f64
}

/// Most frequent usable title; ties go to the title seen first
fn most_common_title(chapters: &[Chapter]) -> Option<&str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for title in chapters.iter().filter_map(Chapter::title) {
        if title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }
        let count = counts.entry(title).or_insert(0);
        if *count == 0 {
            order.push(title);
        }
        *count += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for title in order {
        let count = counts[title];
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((title, count));
        }
    }
    best.map(|(title, _)| title)
}

/// Identifier part of an output name: sanitized title or `{avg}s`
pub fn chapter_identifier(chapters: &[Chapter]) -> String {
    match most_common_title(chapters) {
        Some(title) => sanitize_filename(title),
        None => format!("{}s", average_duration(chapters).trunc() as u64),
    }
}

/// Base output name `{prefix}_{identifier}` without extension
pub fn output_base_name(chapters: &[Chapter], episode_parsing: bool) -> Option<String> {
    let range_part = if episode_parsing {
        format_episode_range(chapters)?
    } else {
        chapters.first()?.source_stem()
    };

    Some(format!("{}_{}", range_part, chapter_identifier(chapters)))
}

/// First of `base.mkv`, `base_1.mkv`, `base_2.mkv`, … in `output_dir` for
/// which `is_taken` is false
pub fn unique_output_path<F>(output_dir: &Path, base_name: &str, is_taken: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    let mut output_path = output_dir.join(format!("{}.{}", base_name, OUTPUT_EXTENSION));

    let mut counter = 1u32;
    while is_taken(&output_path) {
        output_path = output_dir.join(format!("{}_{}.{}", base_name, counter, OUTPUT_EXTENSION));
        counter += 1;
    }

    output_path
}

/// Generate a unique output path for a chapter pattern.
///
/// Existing files are skipped by appending `_1`, `_2`, … before the
/// extension. The existence check and the later write are not atomic, so two
/// writers naming into the same directory concurrently can collide.
pub fn generate_output_name(
    chapters: &[Chapter],
    output_dir: &Path,
    episode_parsing: bool,
) -> Option<PathBuf> {
    let base_name = output_base_name(chapters, episode_parsing)?;
    Some(unique_output_path(output_dir, &base_name, Path::exists))
}
