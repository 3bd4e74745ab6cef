use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config value out of range: {field} = {value}")]
    OutOfRange { field: &'static str, value: String },
}

/// Tunable liveness thresholds.
///
/// Geometry thresholds (distance areas, frame composition, eye-closed ratio,
/// stability tolerance) are fixed constants in their modules and are not
/// part of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Detector confidence a frame must exceed to count as a face.
    pub min_detection_confidence: f32,
    /// Horizontal bounding-box displacement (normalised) that counts as a head turn.
    pub head_movement_threshold: f32,
    /// How long the head must stay within tolerance to be considered stable.
    pub stability_duration_ms: u64,
    /// How long `is_blink_detected` stays raised after a blink.
    pub blink_detection_timeout_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            head_movement_threshold: 0.1,
            stability_duration_ms: 500,
            blink_detection_timeout_ms: 10_000,
        }
    }
}

impl LivenessConfig {
    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.min_detection_confidence) {
            return Err(ConfigError::OutOfRange {
                field: "min_detection_confidence",
                value: self.min_detection_confidence.to_string(),
            });
        }
        if !(self.head_movement_threshold > 0.0 && self.head_movement_threshold < 0.5) {
            return Err(ConfigError::OutOfRange {
                field: "head_movement_threshold",
                value: self.head_movement_threshold.to_string(),
            });
        }
        if self.blink_detection_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "blink_detection_timeout_ms",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn stability_duration(&self) -> Duration {
        Duration::from_millis(self.stability_duration_ms)
    }

    pub fn blink_detection_timeout(&self) -> Duration {
        Duration::from_millis(self.blink_detection_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LivenessConfig::from_toml_str("stability_duration_ms = 1200\n").unwrap();
        assert_eq!(config.stability_duration_ms, 1200);
        assert_eq!(config.min_detection_confidence, 0.5);
        assert_eq!(config.blink_detection_timeout_ms, 10_000);
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        let err = LivenessConfig::from_toml_str("min_detection_confidence = 1.5\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "min_detection_confidence",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let err = LivenessConfig::from_toml_str("head_movement_threshold = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = LivenessConfig::from_toml_str("stability_duration_ms = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = std::env::temp_dir().join("livecheck-config-does-not-exist.toml");
        let err = LivenessConfig::from_toml_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
