//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `imgpipe.toml`. User values are
//! layered over stock defaults, so a config file only needs the keys it
//! wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! backend = "rust"                   # "rust" or "magick"
//! manipulators = ["size", "encode"]  # Pipeline stages, in run order
//!
//! [defaults]                         # Parameters applied under every request
//! # q = 85
//!
//! [presets.thumb]                    # Selected with p=thumb
//! # w = 200
//! # fit = "crop"
//!
//! [limits]
//! max_image_size = 16777216          # Max output area in pixels
//!
//! [magick]
//! program = "magick"                 # ImageMagick executable
//!
//! [logging]
//! level = "info"                     # trace, debug, info, warn, error
//! format = "pretty"                  # pretty or json
//!
//! [processing]
//! max_processes = 4                  # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Parameter values may be written as strings or numbers; they reach the
//! pipeline as strings either way. Unknown keys are rejected to catch typos
//! early, except inside `[defaults]` and `[presets.*]`, where any parameter
//! name is allowed.

use crate::imaging::BackendKind;
use crate::imaging::magick_backend::DEFAULT_PROGRAM;
use crate::manipulators::size::DEFAULT_MAX_IMAGE_SIZE;
use crate::params::ParameterSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "imgpipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// A parameter value as written in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
        }
    }
}

pub type ParamTable = BTreeMap<String, ParamValue>;

fn to_parameter_set(table: &ParamTable) -> ParameterSet {
    table.iter().map(|(k, v)| (k.clone(), v.to_string())).collect()
}

/// Configuration loaded from `imgpipe.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Which imaging backend runs the pipeline.
    pub backend: BackendKind,
    /// Manipulator names, in run order.
    pub manipulators: Vec<String>,
    /// Parameters applied beneath every request.
    pub defaults: ParamTable,
    /// Named parameter sets, selected with the `p` parameter.
    pub presets: BTreeMap<String, ParamTable>,
    pub limits: LimitsConfig,
    pub magick: MagickConfig,
    pub logging: LoggingConfig,
    pub processing: ProcessingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            manipulators: crate::manipulators::MANIPULATOR_NAMES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            defaults: ParamTable::new(),
            presets: BTreeMap::new(),
            limits: LimitsConfig::default(),
            magick: MagickConfig::default(),
            logging: LoggingConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    ///
    /// Manipulator names are checked when the pipeline is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_image_size == 0 {
            return Err(ConfigError::Validation(
                "limits.max_image_size must be greater than 0".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be greater than 0".into(),
            ));
        }
        if self.magick.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "magick.program must not be empty".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        if let Some(name) = self.presets.keys().find(|name| {
            name.trim().is_empty() || name.contains(',')
        }) {
            return Err(ConfigError::Validation(format!(
                "invalid preset name '{name}': must be non-empty without commas"
            )));
        }
        Ok(())
    }

    /// `[defaults]` as request parameters.
    pub fn default_params(&self) -> ParameterSet {
        to_parameter_set(&self.defaults)
    }

    /// `[presets.*]` as request parameters, keyed by preset name.
    pub fn preset_params(&self) -> BTreeMap<String, ParameterSet> {
        self.presets
            .iter()
            .map(|(name, table)| (name.clone(), to_parameter_set(table)))
            .collect()
    }

    /// Layer defaults and selected presets under `request`.
    pub fn resolve_params(&self, request: &ParameterSet) -> ParameterSet {
        request.resolve(&self.default_params(), &self.preset_params())
    }
}

/// Resource limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum output area in pixels. Larger targets are scaled down.
    pub max_image_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}

/// ImageMagick backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MagickConfig {
    /// Executable name or path.
    pub program: String,
}

impl Default for MagickConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter level. `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is missing.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `imgpipe.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgpipe Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Imaging backend: "rust" (built in) or "magick" (ImageMagick subprocess).
backend = "rust"

# Pipeline stages, in run order. Available: "size", "encode".
manipulators = ["size", "encode"]

# ---------------------------------------------------------------------------
# Default parameters
# ---------------------------------------------------------------------------
# Applied beneath every request. Presets and explicit parameters override.
[defaults]
# q = 85
# fm = "webp"

# ---------------------------------------------------------------------------
# Presets
# ---------------------------------------------------------------------------
# Named parameter sets, selected with p=name (comma-separate several).
[presets]
# [presets.thumb]
# w = 200
# h = 200
# fit = "crop"

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Maximum output area in pixels; larger targets are scaled down.
max_image_size = 16777216

# ---------------------------------------------------------------------------
# ImageMagick
# ---------------------------------------------------------------------------
[magick]
# Executable used when backend = "magick".
program = "magick"

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# One of: trace, debug, info, warn, error. RUST_LOG overrides.
level = "info"

# "pretty" for humans, "json" for log collectors.
format = "pretty"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
