use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

pub const DEFAULT_GAP_THRESHOLD: f64 = 60.0;
pub const DEFAULT_LEVEL_HIGH: f64 = 80.0;
pub const DEFAULT_LEVEL_MEDIUM: f64 = 50.0;

/// Lower bounds (inclusive) for the `high` and `medium` levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            high: DEFAULT_LEVEL_HIGH,
            medium: DEFAULT_LEVEL_MEDIUM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Skills averaging strictly below this are reported as gaps.
    pub gap_threshold: f64,
    pub levels: LevelThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            gap_threshold: DEFAULT_GAP_THRESHOLD,
            levels: LevelThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn new(gap_threshold: f64, high: f64, medium: f64) -> Self {
        Self {
            gap_threshold,
            levels: LevelThresholds { high, medium },
        }
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        let mut errors = Vec::new();

        if !self.gap_threshold.is_finite() {
            errors.push("gap_threshold must be a finite number".to_string());
        }
        if !self.levels.high.is_finite() || !self.levels.medium.is_finite() {
            errors.push("level thresholds must be finite numbers".to_string());
        } else if self.levels.medium >= self.levels.high {
            errors.push(format!(
                "medium threshold ({}) must be less than high threshold ({})",
                self.levels.medium, self.levels.high
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AnalysisError::InvalidConfiguration(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert_eq!(config.gap_threshold, 60.0);
        assert_eq!(config.levels.high, 80.0);
        assert_eq!(config.levels.medium, 50.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_levels() {
        let config = AnalysisConfig::new(60.0, 50.0, 60.0);
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_equal_levels() {
        let config = AnalysisConfig::new(60.0, 70.0, 70.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn serializes_thresholds_for_storage() {
        let config = AnalysisConfig::new(65.0, 85.0, 55.0);
        let value = serde_json::to_value(config).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "gap_threshold": 65.0,
                "levels": { "high": 85.0, "medium": 55.0 }
            })
        );
        let restored: AnalysisConfig = serde_json::from_value(value).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn rejects_non_finite_gap_threshold() {
        let config = AnalysisConfig::new(f64::NAN, 80.0, 50.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gap_threshold"));
    }
}
