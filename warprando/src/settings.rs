use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ShuffleSettings {
    // Stop once this many rotations have been committed.
    pub target_swaps: usize,
    // Upper bound on loop iterations plus candidate draws, across the whole shuffle.
    pub panic_limit: usize,
    pub min_rotation_pairs: usize,
    pub max_rotation_pairs: usize,
    // Warps that must keep their vanilla destination (e.g. story-critical one-directional
    // transitions that the data still lists as two-way).
    pub excluded_warps: Vec<String>,
}

impl Default for ShuffleSettings {
    fn default() -> Self {
        ShuffleSettings {
            target_swaps: 1000,
            panic_limit: 10000,
            min_rotation_pairs: 2,
            max_rotation_pairs: 5,
            excluded_warps: vec![],
        }
    }
}

impl ShuffleSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.min_rotation_pairs >= 2,
            "min_rotation_pairs must be at least 2 (got {})",
            self.min_rotation_pairs
        );
        ensure!(
            self.max_rotation_pairs >= self.min_rotation_pairs,
            "max_rotation_pairs ({}) is less than min_rotation_pairs ({})",
            self.max_rotation_pairs,
            self.min_rotation_pairs
        );
        Ok(())
    }
}

pub fn parse_shuffle_settings(settings_json: &str) -> Result<ShuffleSettings> {
    let mut des = serde_json::Deserializer::from_str(settings_json);
    let settings: ShuffleSettings = serde_path_to_error::deserialize(&mut des)?;
    settings.validate()?;
    Ok(settings)
}

pub fn load_shuffle_settings(path: &Path) -> Result<ShuffleSettings> {
    let settings_str = std::fs::read_to_string(path)
        .with_context(|| format!("Unable to load shuffle settings at {}", path.display()))?;
    parse_shuffle_settings(&settings_str)
        .with_context(|| format!("Unable to parse shuffle settings at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_settings() {
        let settings = parse_shuffle_settings(r#"{"target_swaps": 50}"#).unwrap();
        assert_eq!(settings.target_swaps, 50);
        assert_eq!(settings.panic_limit, 10000);
        assert_eq!(settings.min_rotation_pairs, 2);
        assert_eq!(settings.max_rotation_pairs, 5);
        assert!(settings.excluded_warps.is_empty());
    }

    #[test]
    fn test_parse_invalid_settings() {
        let err = parse_shuffle_settings(r#"{"panic_limit": "lots"}"#).unwrap_err();
        assert!(err.to_string().contains("panic_limit"));

        assert!(parse_shuffle_settings(r#"{"min_rotation_pairs": 1}"#).is_err());
        assert!(
            parse_shuffle_settings(r#"{"min_rotation_pairs": 4, "max_rotation_pairs": 3}"#)
                .is_err()
        );
    }
}
