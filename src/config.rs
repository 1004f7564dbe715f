//! Profiling configuration.
//!
//! A [`ProfileConfig`] can be loaded from a YAML file; every field is optional
//! and falls back to its default. CLI flags override file values.

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, ProfileResult};

pub const DEFAULT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_INFERENCE_SAMPLE_SIZE: usize = 200;
pub const DEFAULT_PREVIEW_ROWS: usize = 5;
pub const DEFAULT_ENCODING_SAMPLE_BYTES: usize = 200_000;
pub const DEFAULT_DELIMITER_SAMPLE_BYTES: usize = 50_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProfileConfig {
    /// Minimum fraction of sampled values a cascade stage must parse to win.
    pub threshold: f64,
    /// Non-missing values per column examined by each cascade stage.
    pub inference_sample_size: usize,
    /// Rows copied into `sample_data`.
    pub preview_rows: usize,
    pub encoding_sample_bytes: usize,
    pub delimiter_sample_bytes: usize,
    /// Extra text tokens read as missing (compared after trimming, case-insensitive).
    pub null_tokens: Vec<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            inference_sample_size: DEFAULT_INFERENCE_SAMPLE_SIZE,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            encoding_sample_bytes: DEFAULT_ENCODING_SAMPLE_BYTES,
            delimiter_sample_bytes: DEFAULT_DELIMITER_SAMPLE_BYTES,
            null_tokens: Vec::new(),
        }
    }
}

impl ProfileConfig {
    pub fn load(path: &Path) -> ProfileResult<Self> {
        let file = File::open(path).map_err(|err| ProfileError::io(path, err))?;
        let config: ProfileConfig = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|err| ProfileError::InvalidConfig(format!("{path:?}: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> ProfileResult<Self> {
        let config: ProfileConfig = serde_yaml::from_str(contents)
            .map_err(|err| ProfileError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_threshold(mut self, threshold: f64) -> ProfileResult<Self> {
        self.threshold = threshold;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> ProfileResult<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ProfileError::InvalidConfig(format!(
                "threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        if self.inference_sample_size == 0 {
            return Err(ProfileError::InvalidConfig(
                "inference_sample_size must be positive".to_string(),
            ));
        }
        if self.encoding_sample_bytes == 0 || self.delimiter_sample_bytes == 0 {
            return Err(ProfileError::InvalidConfig(
                "sniffing sample sizes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_null_token(&self, trimmed: &str) -> bool {
        self.null_tokens
            .iter()
            .any(|token| token.trim().eq_ignore_ascii_case(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ProfileConfig::from_yaml_str("threshold: 0.9\nnull_tokens: [NA, 'n/a']\n")
            .expect("parse config");
        assert_eq!(config.threshold, 0.9);
        assert_eq!(config.inference_sample_size, DEFAULT_INFERENCE_SAMPLE_SIZE);
        assert!(config.is_null_token("na"));
        assert!(config.is_null_token("N/A"));
        assert!(!config.is_null_token("none"));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = ProfileConfig::from_yaml_str("threshold: 1.5").unwrap_err();
        assert!(matches!(err, ProfileError::InvalidConfig(_)));
        assert!(ProfileConfig::default().with_threshold(0.0).is_err());
    }
}
