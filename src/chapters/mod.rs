/// Chapter data model
///
/// Chapters are the timed sub-intervals embedded in a media file. The matcher
/// groups them across files into recurring patterns.

pub mod timestamp;

pub use timestamp::{format_timestamp, parse_timestamp};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::naming;

/// Season/episode identifier parsed from a filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeInfo {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

impl fmt::Display for EpisodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// A single chapter of a media file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chapter {
    start: f64,
    end: f64,
    duration: f64,
    title: Option<String>,
    source_file: PathBuf,
    episode: Option<EpisodeInfo>,
}

impl Chapter {
    /// Create a chapter spanning `start..end` seconds.
    ///
    /// Returns `None` unless `0 <= start < end`. Empty titles are stored as
    /// no title.
    pub fn new(
        start: f64,
        end: f64,
        title: Option<String>,
        source_file: impl Into<PathBuf>,
    ) -> Option<Self> {
        if !(start >= 0.0 && end > start) {
            return None;
        }

        Some(Self {
            start,
            end,
            duration: end - start,
            title: title.filter(|t| !t.is_empty()),
            source_file: source_file.into(),
            episode: None,
        })
    }

    /// Attach the episode parsed from the source filename
    pub fn with_episode(mut self, episode: EpisodeInfo) -> Self {
        self.episode = Some(episode);
        self
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    pub fn episode(&self) -> Option<EpisodeInfo> {
        self.episode
    }

    /// Source filename without directory or extension
    pub fn source_stem(&self) -> String {
        self.source_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_file.display().to_string())
    }
}

/// A group of chapters considered instances of the same recurring segment
#[derive(Debug, Clone, Serialize)]
pub struct ChapterPattern {
    /// Chapters in the pattern, sorted by episode when parsing is enabled
    pub chapters: Vec<Chapter>,
    /// Mean chapter duration in seconds
    pub avg_duration: f64,
    /// Display label such as `S01E01-S01E12`
    pub episode_range: String,
    /// Chapter that gets extracted for this pattern
    pub first_occurrence: Chapter,
    /// Collision-free output path
    pub output_name: PathBuf,
}

impl ChapterPattern {
    /// Build a pattern from a final cluster. Returns `None` for an empty cluster.
    pub fn new(mut chapters: Vec<Chapter>, output_name: PathBuf, episode_parsing: bool) -> Option<Self> {
        let episode_range = naming::format_episode_range(&chapters)?;
        let avg_duration = naming::average_duration(&chapters);

        if episode_parsing {
            chapters.sort_by_key(|c| c.episode().unwrap_or(EpisodeInfo::new(0, 0)));
        }
        let first_occurrence = chapters.first()?.clone();

        Some(Self {
            chapters,
            avg_duration,
            episode_range,
            first_occurrence,
            output_name,
        })
    }

    /// Number of chapters (episodes) in the pattern
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_display() {
        assert_eq!(EpisodeInfo::new(1, 1).to_string(), "S01E01");
        assert_eq!(EpisodeInfo::new(2, 13).to_string(), "S02E13");
        assert_eq!(EpisodeInfo::new(100, 1001).to_string(), "S100E1001");
    }

    #[test]
    fn test_episode_ordering() {
        let mut episodes = vec![
            EpisodeInfo::new(2, 1),
            EpisodeInfo::new(1, 12),
            EpisodeInfo::new(1, 3),
        ];
        episodes.sort();
        assert_eq!(
            episodes,
            vec![EpisodeInfo::new(1, 3), EpisodeInfo::new(1, 12), EpisodeInfo::new(2, 1)]
        );
    }

    #[test]
    fn test_chapter_duration_is_fixed_at_construction() {
        let chapter = Chapter::new(90.0, 180.5, Some("Opening".to_string()), "/fake/a.mkv").unwrap();
        assert_eq!(chapter.duration(), 90.5);
        assert_eq!(chapter.duration(), chapter.end() - chapter.start());
        assert_eq!(chapter.episode(), None);
    }

    #[test]
    fn test_chapter_rejects_invalid_bounds() {
        assert!(Chapter::new(10.0, 10.0, None, "a.mkv").is_none());
        assert!(Chapter::new(20.0, 10.0, None, "a.mkv").is_none());
        assert!(Chapter::new(-1.0, 10.0, None, "a.mkv").is_none());
        assert!(Chapter::new(f64::NAN, 10.0, None, "a.mkv").is_none());
    }

    #[test]
    fn test_chapter_empty_title_is_none() {
        let chapter = Chapter::new(0.0, 1.0, Some(String::new()), "a.mkv").unwrap();
        assert_eq!(chapter.title(), None);
    }

    #[test]
    fn test_pattern_sorted_by_episode() {
        let cluster: Vec<Chapter> = [3, 1, 2]
            .into_iter()
            .map(|ep| {
                Chapter::new(0.0, 90.0, Some("Opening".to_string()), format!("/fake/S01E0{ep}.mkv"))
                    .unwrap()
                    .with_episode(EpisodeInfo::new(1, ep))
            })
            .collect();

        let pattern = ChapterPattern::new(cluster, PathBuf::from("/out/x.mkv"), true).unwrap();
        assert_eq!(pattern.episode_range, "S01E01-S01E03");
        assert_eq!(pattern.first_occurrence.episode(), Some(EpisodeInfo::new(1, 1)));
        assert_eq!(pattern.avg_duration, 90.0);
        assert_eq!(pattern.len(), 3);
    }

    #[test]
    fn test_pattern_keeps_input_order_without_parsing() {
        let cluster = vec![
            Chapter::new(0.0, 90.0, None, "/fake/b.mkv").unwrap(),
            Chapter::new(0.0, 92.0, None, "/fake/a.mkv").unwrap(),
        ];

        let pattern = ChapterPattern::new(cluster, PathBuf::from("/out/b_91s.mkv"), false).unwrap();
        assert_eq!(pattern.first_occurrence.source_stem(), "b");
        assert_eq!(pattern.episode_range, "b");
        assert_eq!(pattern.avg_duration, 91.0);
    }

    #[test]
    fn test_pattern_from_empty_cluster() {
        assert!(ChapterPattern::new(Vec::new(), PathBuf::from("/out/x.mkv"), true).is_none());
    }
}
