//! Configuration loading for the model worker.
//!
//! Settings are layered: built-in defaults, then the user config file
//! (`~/.config/hive/model-worker.toml`), then an explicit `--config` file,
//! then `HIVE_*` environment variables. CLI flags are applied by the caller.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::error::HiveError;

/// Requested operating mode, as written in settings or on the command line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// Pick full mode when real providers can be constructed, minimal otherwise
    #[default]
    Auto,
    /// Real embedding providers
    Full,
    /// Heuristic provider only
    Minimal,
}

impl FromStr for ServiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "full" => Ok(Self::Full),
            "minimal" => Ok(Self::Minimal),
            other => Err(format!(
                "invalid mode '{other}' (expected auto, full or minimal)"
            )),
        }
    }
}

/// Resolved process-wide mode. Decided once at startup and never changed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Full,
    Minimal,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Full => "full",
            Mode::Minimal => "minimal",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the provider registry does with a provider whose construction failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// A failed provider stays failed until the process restarts
    #[default]
    Cache,
    /// A failed provider is constructed again on its next reference
    Retry,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cache" => Ok(Self::Cache),
            "retry" => Ok(Self::Retry),
            other => Err(format!(
                "invalid failure policy '{other}' (expected cache or retry)"
            )),
        }
    }
}

/// Request size bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitSettings {
    /// Longest accepted request line in bytes.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,

    /// Largest accepted embed batch.
    #[serde(default = "default_max_texts_per_request")]
    pub max_texts_per_request: usize,

    /// Inputs longer than this many characters are truncated by the minimal provider.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_max_request_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_max_texts_per_request() -> usize {
    1024
}

fn default_max_input_chars() -> usize {
    32_768
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_request_bytes: default_max_request_bytes(),
            max_texts_per_request: default_max_texts_per_request(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

/// Constants used by the embedding analyzer.
///
/// The fixed quality fields (`consistency`, `completeness`, `quality_confidence`)
/// are reported verbatim and do not react to input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub quality_scale: f64,
    pub quality_floor: f64,
    pub quality_ceiling: f64,
    pub quality_default: f64,
    pub consistency: f64,
    pub completeness: f64,
    pub quality_confidence: f64,
    pub functional_mean_threshold: f64,
    pub complex_std_threshold: f64,
    pub detailed_dimension_threshold: usize,
    pub pattern_confidence: f64,
    pub cyclomatic_scale: f64,
    pub cognitive_scale: f64,
    pub cyclomatic_max: u32,
    pub cognitive_max: u32,
    pub generic_confidence: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            quality_scale: 100.0,
            quality_floor: 0.1,
            quality_ceiling: 0.9,
            quality_default: 0.5,
            consistency: 0.85,
            completeness: 0.90,
            quality_confidence: 0.88,
            functional_mean_threshold: 0.1,
            complex_std_threshold: 0.2,
            detailed_dimension_threshold: 500,
            pattern_confidence: 0.75,
            cyclomatic_scale: 50.0,
            cognitive_scale: 75.0,
            cyclomatic_max: 20,
            cognitive_max: 30,
            generic_confidence: 0.75,
        }
    }
}

impl AnalysisSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.quality_floor)
            || !(0.0..=1.0).contains(&self.quality_ceiling)
            || self.quality_floor > self.quality_ceiling
        {
            return Err(format!(
                "quality range must satisfy 0 <= floor <= ceiling <= 1, got {}..{}",
                self.quality_floor, self.quality_ceiling
            ));
        }
        if self.quality_scale <= 0.0 {
            return Err("quality_scale must be > 0".to_string());
        }
        if self.cyclomatic_max == 0 || self.cognitive_max == 0 {
            return Err("complexity maxima must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Constants used by the query route classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Queries longer than this many characters are always complex.
    pub simple_max_chars: usize,
    /// Case-insensitive substrings that mark a query as complex.
    pub complexity_keywords: Vec<String>,
    /// Confidence attached to every decision.
    pub confidence: f64,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            simple_max_chars: 100,
            complexity_keywords: [
                "analyze",
                "architecture",
                "design",
                "refactor",
                "implement",
                "optimize",
                "debug",
                "explain",
                "compare",
                "review",
                "security",
                "performance",
                "in depth",
                "in-depth",
                "comprehensive",
                "step by step",
                "trade-off",
                "tradeoff",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            confidence: 0.8,
        }
    }
}

/// Main worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory for downloaded model files
    #[serde(default = "default_model_cache_dir")]
    pub model_cache_dir: String,

    /// Requested operating mode
    #[serde(default)]
    pub mode: ServiceMode,

    /// Allow fetching model files from the Hugging Face Hub
    #[serde(default = "default_allow_download")]
    pub allow_download: bool,

    /// Behaviour for providers whose construction failed
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Overrides the mode's default provider for embed requests
    #[serde(default)]
    pub default_embed_model: Option<String>,

    /// Overrides the mode's default provider for analyze requests
    #[serde(default)]
    pub default_analyze_model: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<String>,

    #[serde(default)]
    pub limits: LimitSettings,

    #[serde(default)]
    pub analysis: AnalysisSettings,

    #[serde(default)]
    pub routing: RoutingSettings,
}

fn default_model_cache_dir() -> String {
    ProjectDirs::from("", "", "hive")
        .map(|p| p.cache_dir().join("models"))
        .unwrap_or_else(|| PathBuf::from("./models"))
        .to_string_lossy()
        .to_string()
}

fn default_allow_download() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_cache_dir: default_model_cache_dir(),
            mode: ServiceMode::default(),
            allow_download: default_allow_download(),
            failure_policy: FailurePolicy::default(),
            default_embed_model: None,
            default_analyze_model: None,
            log_level: default_log_level(),
            log_file: None,
            limits: LimitSettings::default(),
            analysis: AnalysisSettings::default(),
            routing: RoutingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/hive/model-worker.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (HIVE_*, nested keys separated by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, HiveError> {
        let config_dir = ProjectDirs::from("", "", "hive")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("model-worker");

        let mut builder = Config::builder()
            .set_default("model_cache_dir", default_model_cache_dir())
            .map_err(|e| HiveError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| HiveError::Config(e.to_string()))?
            .set_default("allow_download", default_allow_download())
            .map_err(|e| HiveError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // HIVE_MODE=minimal, HIVE_MODEL_CACHE_DIR=..., HIVE_ANALYSIS__QUALITY_SCALE=...
        builder = builder.add_source(
            Environment::with_prefix("HIVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| HiveError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| HiveError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the worker cannot run with.
    pub fn validate(&self) -> Result<(), HiveError> {
        if self.limits.max_request_bytes == 0 {
            return Err(HiveError::Config("limits.max_request_bytes must be > 0".into()));
        }
        if self.limits.max_texts_per_request == 0 {
            return Err(HiveError::Config(
                "limits.max_texts_per_request must be > 0".into(),
            ));
        }
        if self.limits.max_input_chars == 0 {
            return Err(HiveError::Config("limits.max_input_chars must be > 0".into()));
        }
        self.analysis
            .validate()
            .map_err(|e| HiveError::Config(format!("analysis: {e}")))?;
        if !(0.0..=1.0).contains(&self.routing.confidence) {
            return Err(HiveError::Config(format!(
                "routing.confidence must be 0.0-1.0, got {}",
                self.routing.confidence
            )));
        }
        Ok(())
    }

    /// Expand a leading `~/` in the model cache directory.
    pub fn expanded_cache_dir(&self) -> PathBuf {
        if let Some(rest) = self.model_cache_dir.strip_prefix("~/") {
            if let Some(base) = BaseDirs::new() {
                return base.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.model_cache_dir)
    }
}
