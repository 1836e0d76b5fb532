//! Runtime configuration
//!
//! Values come from the process environment; `main` loads `.env` first.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    /// Speech-to-text endpoint accepting a multipart `file` upload
    pub transcribe_url: String,
    /// Length of one captured utterance
    pub record_duration: Duration,
    pub language: String,
    pub wake_word_template: PathBuf,
    pub wake_word_threshold: f32,
    /// `None` retries failed recognition forever
    pub max_recognition_retries: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcribe_url: "http://localhost:8085/transcribe".into(),
            record_duration: Duration::from_secs(4),
            language: "ko-KR".into(),
            wake_word_template: PathBuf::from("wake_word_template.json"),
            wake_word_threshold: 0.7,
            max_recognition_retries: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let threshold: f32 = parse(&lookup, "WAKE_WORD_THRESHOLD")?.unwrap_or(defaults.wake_word_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                key: "WAKE_WORD_THRESHOLD",
                value: threshold.to_string(),
            });
        }

        Ok(Self {
            transcribe_url: lookup("TRANSCRIBE_URL").unwrap_or(defaults.transcribe_url),
            record_duration: parse(&lookup, "RECORD_DURATION")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.record_duration),
            language: lookup("RECOGNITION_LANGUAGE").unwrap_or(defaults.language),
            wake_word_template: lookup("WAKE_WORD_TEMPLATE")
                .map(PathBuf::from)
                .unwrap_or(defaults.wake_word_template),
            wake_word_threshold: threshold,
            max_recognition_retries: parse(&lookup, "MAX_RECOGNITION_RETRIES")?,
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.language, "ko-KR");
        assert_eq!(config.record_duration, Duration::from_secs(4));
        assert_eq!(config.max_recognition_retries, None);
        assert!((config.wake_word_threshold - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("TRANSCRIBE_URL", "http://tc3.local:8085/transcribe"),
            ("RECORD_DURATION", "6"),
            ("MAX_RECOGNITION_RETRIES", "3"),
            ("WAKE_WORD_TEMPLATE", "/tmp/hey-rux.json"),
            ("WAKE_WORD_THRESHOLD", "0.55"),
        ])
        .unwrap();
        assert_eq!(config.transcribe_url, "http://tc3.local:8085/transcribe");
        assert_eq!(config.record_duration, Duration::from_secs(6));
        assert_eq!(config.max_recognition_retries, Some(3));
        assert_eq!(config.wake_word_template, PathBuf::from("/tmp/hey-rux.json"));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = config(&[("MAX_RECOGNITION_RETRIES", "  ")]).unwrap();
        assert_eq!(config.max_recognition_retries, None);
    }

    #[test]
    fn test_malformed_values_are_errors() {
        assert!(matches!(
            config(&[("RECORD_DURATION", "five")]),
            Err(ConfigError::Invalid { key: "RECORD_DURATION", .. })
        ));
        assert!(config(&[("WAKE_WORD_THRESHOLD", "1.5")]).is_err());
        assert!(config(&[("MAX_RECOGNITION_RETRIES", "-1")]).is_err());
    }
}
