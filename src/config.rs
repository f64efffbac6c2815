use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::matcher::Tolerance;

/// Configuration for the chapter extractor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filtering and clustering settings
    pub matching: MatchingConfig,

    /// Input scanning settings
    pub scan: ScanConfig,

    /// External tool locations
    pub tools: ToolsConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Performance and resource settings
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Inclusive `[min, max]` chapter duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_range: Option<(f64, f64)>,

    /// Keep only chapters whose title matches a known keyword
    pub chapter_names: bool,

    /// Minimum chapters per pattern (0 = every chapter is its own pattern)
    pub min_occurrences: usize,

    /// Duration tolerance for clustering
    pub tolerance: Tolerance,

    /// Parse `SxxEyy` tags from filenames
    pub episode_parsing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory to scan
    pub input_dir: PathBuf,

    /// Scan subdirectories
    pub recursive: bool,

    /// Media file extension, matched case-insensitively
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Path or name of the mkvmerge binary
    pub mkvmerge: PathBuf,

    /// Path or name of the mkvextract binary
    pub mkvextract: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for extracted segments
    pub output_dir: PathBuf,

    /// Preview detected patterns without extracting
    pub dry_run: bool,

    /// Write a JSON report of the run into the output directory
    pub save_report: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maximum number of files read concurrently
    pub max_workers: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            duration_range: None,
            chapter_names: false,
            min_occurrences: 5,
            tolerance: Tolerance::default(),
            episode_parsing: true,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            recursive: false,
            extension: "mkv".to_string(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            mkvmerge: PathBuf::from("mkvmerge"),
            mkvextract: PathBuf::from("mkvextract"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            dry_run: false,
            save_report: false,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get().min(8), // Use available cores, max 8
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Without one the usual locations
    /// are tried and the first parseable file wins, falling back to defaults.
    /// Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => Self::search_paths()
                .iter()
                .find_map(|path| match Self::from_file(path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        if path.exists() {
                            tracing::warn!("Failed to load config file {}: {:#}", path.display(), e);
                        }
                        None
                    }
                })
                .unwrap_or_default(),
        };

        config.apply_env();
        Ok(config)
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("chapter-extractor.toml"),
            PathBuf::from("config/chapter-extractor.toml"),
        ];
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home).join(".config/chapter-extractor/config.toml"));
        }
        paths
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Override settings from environment variables
    pub fn apply_env(&mut self) {
        if let Ok(workers) = std::env::var("CHAPTER_EXTRACTOR_WORKERS") {
            match workers.parse() {
                Ok(workers) => self.performance.max_workers = workers,
                Err(_) => tracing::warn!("Ignoring invalid CHAPTER_EXTRACTOR_WORKERS={}", workers),
            }
        }

        if let Some(mkvmerge) = std::env::var_os("CHAPTER_EXTRACTOR_MKVMERGE") {
            self.tools.mkvmerge = PathBuf::from(mkvmerge);
        }

        if let Some(mkvextract) = std::env::var_os("CHAPTER_EXTRACTOR_MKVEXTRACT") {
            self.tools.mkvextract = PathBuf::from(mkvextract);
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some((min, max)) = self.matching.duration_range {
            if !(min >= 0.0 && min <= max) {
                return Err(anyhow!("Invalid duration range: {}-{}", min, max));
            }
        }

        let tolerance = match self.matching.tolerance {
            Tolerance::Seconds(value) | Tolerance::Percent(value) => value,
        };
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(anyhow!("Tolerance must be a non-negative number"));
        }

        if self.performance.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if self.scan.extension.is_empty() {
            return Err(anyhow!("scan extension must not be empty"));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Chapter Extractor Configuration:\n\
            - Input Directory: {}\n\
            - Output Directory: {}\n\
            - Recursive: {}\n\
            - Duration Range: {}\n\
            - Chapter Names: {}\n\
            - Min Occurrences: {}\n\
            - Tolerance: {:?}\n\
            - Episode Parsing: {}\n\
            - Workers: {}",
            self.scan.input_dir.display(),
            self.output.output_dir.display(),
            self.scan.recursive,
            self.matching
                .duration_range
                .map_or("any".to_string(), |(min, max)| format!("{}-{}s", min, max)),
            self.matching.chapter_names,
            self.matching.min_occurrences,
            self.matching.tolerance,
            self.matching.episode_parsing,
            self.performance.max_workers,
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_input_dir(mut self, dir: PathBuf) -> Self {
        self.config.scan.input_dir = dir;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.output_dir = dir;
        self
    }

    pub fn with_duration_range(mut self, min: f64, max: f64) -> Self {
        self.config.matching.duration_range = Some((min, max));
        self
    }

    pub fn with_min_occurrences(mut self, min_occurrences: usize) -> Self {
        self.config.matching.min_occurrences = min_occurrences;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.config.matching.tolerance = tolerance;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.performance.max_workers = workers;
        self
    }

    pub fn chapter_names(mut self, enable: bool) -> Self {
        self.config.matching.chapter_names = enable;
        self
    }

    pub fn episode_parsing(mut self, enable: bool) -> Self {
        self.config.matching.episode_parsing = enable;
        self
    }

    pub fn dry_run(mut self, enable: bool) -> Self {
        self.config.output.dry_run = enable;
        self
    }

    pub fn save_report(mut self, enable: bool) -> Self {
        self.config.output.save_report = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
