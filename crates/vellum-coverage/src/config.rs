//! Coverage mapper configuration

use serde::{Deserialize, Serialize};

/// Configuration for coverage mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Confidence multiplier for records whose result state is not effective
    pub non_effective_discount: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            non_effective_discount: 0.7,
        }
    }
}

impl CoverageConfig {
    /// Check that the discount lies in [0, 1]
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.non_effective_discount) {
            return Err(format!(
                "non_effective_discount must be within [0, 1], got {}",
                self.non_effective_discount
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoverageConfig::default();
        assert_eq!(config.non_effective_discount, 0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_discount_rejected() {
        let config = CoverageConfig {
            non_effective_discount: 1.5,
        };
        assert!(config.validate().is_err());
    }
}
