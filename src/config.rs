//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user file overrides only the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [crop]
//! aspect_ratio = [1, 1]     # width:height of the crop frame
//! initial_coverage = 90.0   # percent of the image the first frame covers
//! min_zoom = 0.5
//! max_zoom = 3.0
//!
//! [extract]
//! format = "jpeg"           # intermediate encoding of the confirmed crop
//! quality = 0.95
//!
//! [optimize]
//! max_width = 512
//! max_height = 512
//! quality = 0.85            # 0.0 - 1.0
//! format = "jpeg"           # jpeg | png | webp | avif
//!
//! [storage]
//! profile_prefix = "profile_pictures"
//! member_prefix = "family_members"
//! # public_base_url = "https://cdn.example.com"
//!
//! [sync]
//! optimistic_concurrency = true
//! delete_orphans = true
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "famille_photo=info"
}

/// Pipeline configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhotoConfig {
    /// Crop editor frame and zoom bounds.
    pub crop: CropConfig,
    /// Encoding of the confirmed crop before optimization.
    pub extract: ExtractConfig,
    /// Bounding box and encoding of the uploaded asset.
    pub optimize: OptimizeConfig,
    /// Object-store key layout.
    pub storage: StorageConfig,
    /// Metadata write policy.
    pub sync: SyncConfig,
}

impl PhotoConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let crop = &self.crop;
        if crop.aspect_ratio[0] == 0 || crop.aspect_ratio[1] == 0 {
            return Err(ConfigError::Validation(
                "crop.aspect_ratio values must be non-zero".into(),
            ));
        }
        if !(crop.initial_coverage > 0.0 && crop.initial_coverage <= 100.0) {
            return Err(ConfigError::Validation(
                "crop.initial_coverage must be in (0, 100]".into(),
            ));
        }
        if !(crop.min_zoom > 0.0 && crop.min_zoom <= 1.0 && crop.max_zoom >= 1.0) {
            return Err(ConfigError::Validation(
                "crop zoom bounds must satisfy 0 < min_zoom <= 1 <= max_zoom".into(),
            ));
        }
        for (key, quality) in [
            ("extract.quality", self.extract.quality),
            ("optimize.quality", self.optimize.quality),
        ] {
            if !(0.0..=1.0).contains(&quality) {
                return Err(ConfigError::Validation(format!("{key} must be 0.0-1.0")));
            }
        }
        if self.optimize.max_width == 0 || self.optimize.max_height == 0 {
            return Err(ConfigError::Validation(
                "optimize.max_width and optimize.max_height must be non-zero".into(),
            ));
        }
        for (key, prefix) in [
            ("storage.profile_prefix", &self.storage.profile_prefix),
            ("storage.member_prefix", &self.storage.member_prefix),
        ] {
            if prefix.is_empty() || prefix.starts_with('/') || prefix.ends_with('/') {
                return Err(ConfigError::Validation(format!(
                    "{key} must be non-empty without leading or trailing '/'"
                )));
            }
        }
        Ok(())
    }
}

/// Crop editor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    /// Aspect ratio as `[width, height]`, e.g. `[1, 1]` for avatars.
    pub aspect_ratio: [u32; 2],
    /// Share of the image (percent) covered by the initial centered frame.
    pub initial_coverage: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl CropConfig {
    pub fn aspect(&self) -> f64 {
        self.aspect_ratio[0] as f64 / self.aspect_ratio[1] as f64
    }
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: [1, 1],
            initial_coverage: 90.0,
            min_zoom: 0.5,
            max_zoom: 3.0,
        }
    }
}

/// Encoding of the confirmed crop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    pub format: OutputFormat,
    pub quality: f32,
}

impl ExtractConfig {
    pub fn quality(&self) -> Quality {
        Quality::from_fraction(self.quality)
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: 0.95,
        }
    }
}

/// Optimizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizeConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Encoding quality as a fraction (0.0 = worst, 1.0 = best).
    pub quality: f32,
    pub format: OutputFormat,
}

impl OptimizeConfig {
    pub fn quality(&self) -> Quality {
        Quality::from_fraction(self.quality)
    }
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            max_width: 512,
            max_height: 512,
            quality: 0.85,
            format: OutputFormat::Jpeg,
        }
    }
}

/// Object-store key layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub profile_prefix: String,
    pub member_prefix: String,
    /// Base URL under which the local object store is served. When absent,
    /// local uploads return `file://` URLs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            profile_prefix: "profile_pictures".to_string(),
            member_prefix: "family_members".to_string(),
            public_base_url: None,
        }
    }
}

/// Metadata write policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Make the final record write conditional on the etag read when the
    /// session opened.
    pub optimistic_concurrency: bool,
    /// Delete the uploaded object when the record write fails.
    pub delete_orphans: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            optimistic_concurrency: true,
            delete_orphans: true,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PhotoConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
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
) -> Result<PhotoConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PhotoConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a `config.toml` path.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<PhotoConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# famille-photo configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Crop editor
# ---------------------------------------------------------------------------
[crop]
# Crop frame aspect ratio as [width, height]. [1, 1] for round avatars.
aspect_ratio = [1, 1]

# Share of the image (percent) covered by the initial centered frame.
initial_coverage = 90.0

# Zoom slider bounds.
min_zoom = 0.5
max_zoom = 3.0

# ---------------------------------------------------------------------------
# Crop extraction
# ---------------------------------------------------------------------------
[extract]
# Encoding of the confirmed crop, before optimization.
format = "jpeg"
quality = 0.95

# ---------------------------------------------------------------------------
# Optimization
# ---------------------------------------------------------------------------
[optimize]
# Bounding box for the uploaded image. Never upscales.
max_width = 512
max_height = 512

# Encoding quality, 0.0 (worst) to 1.0 (best). Ignored for png and webp.
quality = 0.85

# Output format: jpeg, png, webp (lossless) or avif.
format = "jpeg"

# ---------------------------------------------------------------------------
# Object storage
# ---------------------------------------------------------------------------
[storage]
# Key prefixes: <profile_prefix>/<userId>/... and
# <member_prefix>/<familyId>/<memberId>/...
profile_prefix = "profile_pictures"
member_prefix = "family_members"

# URL the local object directory is served under.
# Omit to get file:// URLs.
# public_base_url = "https://cdn.example.com"

# ---------------------------------------------------------------------------
# Metadata sync
# ---------------------------------------------------------------------------
[sync]
# Refuse the final record write if the record changed since the session
# opened (another tab or device uploaded a photo meanwhile).
optimistic_concurrency = true

# Delete the uploaded object again when the record write fails.
delete_orphans = true
"##
}
