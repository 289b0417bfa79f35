use std::{collections::BTreeMap, fs, io, ops::RangeInclusive, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use crate::overlay::topology::SkeletonSchema;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown inference model `{0}` (configure it under [stream.models])")]
    UnknownModel(String),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub skeleton: SkeletonConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_token_path")]
    pub token_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// Selects the socket endpoint from `models`.
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, String>,
    #[serde(default = "default_token_param")]
    pub token_param: String,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// JPEG quality 1-100.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub index: usize,
    /// Pause between releasing one device and opening the next.
    #[serde(default = "default_switch_grace_ms")]
    pub switch_grace_ms: u64,
    #[serde(default = "default_clip_fps")]
    pub clip_fps: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_display_width")]
    pub width: u32,
    #[serde(default = "default_display_height")]
    pub height: u32,
    #[serde(default)]
    pub preview_path: Option<String>,
    #[serde(default = "default_preview_interval_ms")]
    pub preview_interval_ms: u64,
}

/// Upper bound on any configured keypoint index.
pub const MAX_KEYPOINT_INDEX: usize = 4095;

/// Index ranges per body part; empty lists fall back to COCO-WholeBody.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct SkeletonConfig {
    #[serde(default)]
    pub face: Vec<[usize; 2]>,
    #[serde(default)]
    pub left_hand: Vec<[usize; 2]>,
    #[serde(default)]
    pub right_hand: Vec<[usize; 2]>,
    #[serde(default)]
    pub upper_body: Vec<[usize; 2]>,
    #[serde(default)]
    pub lower_body: Vec<[usize; 2]>,
}

fn default_base_url() -> String { "http://localhost:8000".to_string() }
fn default_token_path() -> String { "/auth/ws-token".to_string() }
fn default_model_name() -> String { "rtmpose".to_string() }
fn default_models() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("rtmpose".to_string(), "ws://localhost:8891".to_string()),
        ("vitpose".to_string(), "ws://localhost:8892".to_string()),
    ])
}
fn default_token_param() -> String { "token".to_string() }
fn default_sample_interval_ms() -> u64 { 100 }
fn default_jpeg_quality() -> u8 { 80 }
fn default_switch_grace_ms() -> u64 { 150 }
fn default_clip_fps() -> u32 { 30 }
fn default_display_width() -> u32 { 1280 }
fn default_display_height() -> u32 { 720 }
fn default_preview_interval_ms() -> u64 { 500 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_path: default_token_path(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            models: default_models(),
            token_param: default_token_param(),
            sample_interval_ms: default_sample_interval_ms(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            switch_grace_ms: default_switch_grace_ms(),
            clip_fps: default_clip_fps(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_display_width(),
            height: default_display_height(),
            preview_path: None,
            preview_interval_ms: default_preview_interval_ms(),
        }
    }
}

impl StreamConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Socket endpoint for the configured model variant.
    pub fn endpoint(&self) -> Result<&str, ConfigError> {
        self.models
            .get(&self.model_name)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownModel(self.model_name.clone()))
    }
}

impl CameraConfig {
    pub fn switch_grace(&self) -> Duration {
        Duration::from_millis(self.switch_grace_ms)
    }
}

impl SkeletonConfig {
    fn check(&self) -> Result<(), ConfigError> {
        let parts = [
            ("skeleton.face", &self.face),
            ("skeleton.left_hand", &self.left_hand),
            ("skeleton.right_hand", &self.right_hand),
            ("skeleton.upper_body", &self.upper_body),
            ("skeleton.lower_body", &self.lower_body),
        ];
        for (field, ranges) in parts {
            for [lo, hi] in ranges.iter().copied() {
                if lo > hi {
                    return Err(ConfigError::Invalid {
                        field,
                        reason: format!("range [{lo}, {hi}] is reversed"),
                    });
                }
                if hi > MAX_KEYPOINT_INDEX {
                    return Err(ConfigError::Invalid {
                        field,
                        reason: format!("index {hi} exceeds {MAX_KEYPOINT_INDEX}"),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn to_schema(&self) -> SkeletonSchema {
        let mut schema = SkeletonSchema::coco_wholebody();
        let ranges = |pairs: &[[usize; 2]]| -> Vec<RangeInclusive<usize>> {
            pairs.iter().map(|[lo, hi]| *lo..=*hi).collect()
        };
        if !self.face.is_empty() {
            schema.parts.face = ranges(&self.face);
        }
        if !self.left_hand.is_empty() {
            schema.parts.left_hand = ranges(&self.left_hand);
        }
        if !self.right_hand.is_empty() {
            schema.parts.right_hand = ranges(&self.right_hand);
        }
        if !self.upper_body.is_empty() {
            schema.parts.upper_body = ranges(&self.upper_body);
        }
        if !self.lower_body.is_empty() {
            schema.parts.lower_body = ranges(&self.lower_body);
        }
        schema
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Loads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            log::info!(
                "no config at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stream.endpoint()?;
        if self.stream.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "stream.sample_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return Err(ConfigError::Invalid {
                field: "stream.jpeg_quality",
                reason: format!("{} is outside 1..=100", self.stream.jpeg_quality),
            });
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::Invalid {
                field: "display",
                reason: "width and height must be non-zero".to_string(),
            });
        }
        if self.camera.clip_fps == 0 {
            return Err(ConfigError::Invalid {
                field: "camera.clip_fps",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.skeleton.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.stream.sample_interval(), Duration::from_millis(100));
        assert_eq!(config.stream.jpeg_quality, 80);
        assert_eq!(config.stream.endpoint().unwrap(), "ws://localhost:8891");
        assert_eq!(config.camera.switch_grace(), Duration::from_millis(150));
        assert!(config.display.preview_path.is_none());
    }

    #[test]
    fn model_name_selects_endpoint() {
        let config = Config::parse(
            r#"
            [stream]
            model_name = "vitpose"
            "#,
        )
        .unwrap();

        assert_eq!(config.stream.endpoint().unwrap(), "ws://localhost:8892");
    }

    #[test]
    fn unknown_model_is_rejected() {
        let err = Config::parse(
            r#"
            [stream]
            model_name = "openpose"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::UnknownModel(name) if name == "openpose"));
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let err = Config::parse(
            r#"
            [stream]
            jpeg_quality = 0
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { field: "stream.jpeg_quality", .. }));
    }

    #[test]
    fn skeleton_ranges_override_defaults() {
        let config = Config::parse(
            r#"
            [skeleton]
            face = [[0, 4]]
            "#,
        )
        .unwrap();

        let schema = config.skeleton.to_schema();
        assert_eq!(schema.parts.face, vec![0..=4]);
        assert_eq!(
            schema.parts.left_hand,
            SkeletonSchema::coco_wholebody().parts.left_hand
        );
    }

    #[test]
    fn bad_skeleton_ranges_are_rejected() {
        let reversed = Config::parse(
            r#"
            [skeleton]
            upper_body = [[12, 5]]
            "#,
        )
        .unwrap_err();
        assert!(matches!(reversed, ConfigError::Invalid { field: "skeleton.upper_body", .. }));

        let huge = Config::parse(
            r#"
            [skeleton]
            face = [[0, 5000000000000]]
            "#,
        )
        .unwrap_err();
        assert!(matches!(huge, ConfigError::Invalid { field: "skeleton.face", .. }));

        let mut config = Config::default();
        config.skeleton.right_hand = vec![[112, MAX_KEYPOINT_INDEX + 1]];
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.stream.model_name, "rtmpose");
    }
}
