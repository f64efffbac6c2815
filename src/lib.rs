/// Chapter Extractor
///
/// Detects recurring chapter segments (openings, endings, previews…) across a
/// collection of MKV files, groups them into named patterns and extracts one
/// representative cut per pattern with mkvtoolnix.

pub mod chapters;
pub mod cli;
pub mod config;
pub mod error;
pub mod matcher;
pub mod naming;
pub mod parser;
pub mod processing;
pub mod video;

// Re-export main types for easy access
pub use crate::chapters::{Chapter, ChapterPattern, EpisodeInfo};
pub use crate::config::{Config, ConfigBuilder, MatchingConfig};
pub use crate::error::ExtractorError;
pub use crate::matcher::Tolerance;
pub use crate::processing::{BatchProcessor, PipelineStop, RunOutcome, RunReport, ScanSummary};
pub use crate::video::{ChapterSource, MkvToolnix, SegmentWriter};
