//! Configuration loading for story-cluster.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! Default config file lives at ~/.config/story-cluster/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::StoryError;

/// Thresholds evaluated by a sweep when none are given explicitly.
pub const DEFAULT_SWEEP_THRESHOLDS: &[f64] = &[0.78, 0.82, 0.86, 0.88, 0.90, 0.92, 0.94];

/// Upper bound on the lookback window (one week).
pub const MAX_LOOKBACK_HOURS: u32 = 168;

/// Clustering, calibration and report settings for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringSettings {
    /// Lookback window in hours; clamped to 1..=168 when used
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,

    /// Minimum cosine similarity for an edge
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Clusters with fewer members are dropped
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Clusters spanning more days than this are dropped
    #[serde(default = "default_max_day_span")]
    pub max_day_span: f64,

    /// Thresholds evaluated by `sweep`
    #[serde(default = "default_sweep_thresholds")]
    pub sweep_thresholds: Vec<f64>,

    /// Compare fresh clusters with the persisted clustering
    #[serde(default)]
    pub reconcile: bool,

    /// Minimum members for a story candidate
    #[serde(default = "default_story_min_items")]
    pub story_min_items: usize,

    /// Minimum distinct authors for a story candidate
    #[serde(default = "default_story_min_authors")]
    pub story_min_authors: usize,

    /// Size at which a sweep counts a cluster as story-like
    #[serde(default = "default_story_like_size")]
    pub story_like_size: usize,

    /// Members sampled for coherence once a cluster exceeds this many
    #[serde(default = "default_coherence_sample_cap")]
    pub coherence_sample_cap: usize,

    /// Maximum tokens kept per item
    #[serde(default = "default_token_cap")]
    pub token_cap: usize,

    /// Seed for the coherence sampler; unseeded runs are not reproducible
    #[serde(default)]
    pub coherence_seed: Option<u64>,

    /// Items fetched per page from the item store
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Headlines sampled into each cluster record
    #[serde(default = "default_headline_samples")]
    pub headline_samples: usize,

    /// Member count at which a cluster is flagged as a mega cluster
    #[serde(default = "default_mega_cluster_size")]
    pub mega_cluster_size: usize,

    /// Coherence below this flags a cluster as low-coherence
    #[serde(default = "default_low_coherence_threshold")]
    pub low_coherence_threshold: f64,

    /// Low-coherence flag only applies at or above this size
    #[serde(default = "default_low_coherence_min_size")]
    pub low_coherence_min_size: usize,
}

fn default_lookback_hours() -> u32 {
    24
}

fn default_threshold() -> f64 {
    0.86
}

fn default_min_cluster_size() -> usize {
    2
}

fn default_max_day_span() -> f64 {
    3.0
}

fn default_sweep_thresholds() -> Vec<f64> {
    DEFAULT_SWEEP_THRESHOLDS.to_vec()
}

fn default_story_min_items() -> usize {
    3
}

fn default_story_min_authors() -> usize {
    2
}

fn default_story_like_size() -> usize {
    3
}

fn default_coherence_sample_cap() -> usize {
    40
}

fn default_token_cap() -> usize {
    240
}

fn default_page_size() -> usize {
    1000
}

fn default_headline_samples() -> usize {
    3
}

fn default_mega_cluster_size() -> usize {
    50
}

fn default_low_coherence_threshold() -> f64 {
    0.10
}

fn default_low_coherence_min_size() -> usize {
    3
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            threshold: default_threshold(),
            min_cluster_size: default_min_cluster_size(),
            max_day_span: default_max_day_span(),
            sweep_thresholds: default_sweep_thresholds(),
            reconcile: false,
            story_min_items: default_story_min_items(),
            story_min_authors: default_story_min_authors(),
            story_like_size: default_story_like_size(),
            coherence_sample_cap: default_coherence_sample_cap(),
            token_cap: default_token_cap(),
            coherence_seed: None,
            page_size: default_page_size(),
            headline_samples: default_headline_samples(),
            mega_cluster_size: default_mega_cluster_size(),
            low_coherence_threshold: default_low_coherence_threshold(),
            low_coherence_min_size: default_low_coherence_min_size(),
        }
    }
}

impl ClusteringSettings {
    /// Lookback window actually used: at least one hour, at most a week.
    pub fn effective_lookback_hours(&self) -> u32 {
        self.lookback_hours.clamp(1, MAX_LOOKBACK_HOURS)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        let in_range = |t: f64| (-1.0..=1.0).contains(&t);
        if !in_range(self.threshold) {
            return Err(format!("threshold must be -1.0..=1.0, got {}", self.threshold));
        }
        if let Some(bad) = self.sweep_thresholds.iter().find(|t| !in_range(**t)) {
            return Err(format!("sweep threshold must be -1.0..=1.0, got {}", bad));
        }
        if self.min_cluster_size == 0 {
            return Err("min_cluster_size must be > 0".to_string());
        }
        if self.max_day_span.is_nan() || self.max_day_span < 0.0 {
            return Err(format!("max_day_span must be >= 0, got {}", self.max_day_span));
        }
        if self.page_size == 0 {
            return Err("page_size must be > 0".to_string());
        }
        if self.coherence_sample_cap < 2 {
            return Err("coherence_sample_cap must be >= 2".to_string());
        }
        Ok(())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB item store
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Directory receiving report artifacts
    #[serde(default = "default_report_dir")]
    pub report_dir: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Clustering settings
    #[serde(default)]
    pub clustering: ClusteringSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "story-cluster")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_report_dir() -> String {
    ProjectDirs::from("", "", "story-cluster")
        .map(|p| p.data_local_dir().join("reports"))
        .unwrap_or_else(|| PathBuf::from("./reports"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            report_dir: default_report_dir(),
            log_level: default_log_level(),
            clustering: ClusteringSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/story-cluster/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (STORY_*, nested with `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, StoryError> {
        let config_dir = ProjectDirs::from("", "", "story-cluster")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| StoryError::Config(e.to_string()))?
            .set_default("report_dir", default_report_dir())
            .map_err(|e| StoryError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| StoryError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: STORY_DB_PATH, STORY_CLUSTERING__THRESHOLD,
        // STORY_CLUSTERING__SWEEP_THRESHOLDS=0.8,0.9
        builder = builder.add_source(
            Environment::with_prefix("STORY")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("clustering.sweep_thresholds")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| StoryError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| StoryError::Config(e.to_string()))?;

        settings
            .clustering
            .validate()
            .map_err(StoryError::Config)?;

        Ok(settings)
    }

    /// Expand ~ in db_path to actual home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }

    /// Expand ~ in report_dir to actual home directory
    pub fn expanded_report_dir(&self) -> PathBuf {
        expand_home(&self.report_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
