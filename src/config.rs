use serde::{Deserialize, Serialize};

use crate::error::{MeaError, Result};
use crate::types::UNIT_SCALE_LEGACY;

/// Parameters of threshold estimation and spike detection.
///
/// Every field has a default, so a JSON document only needs the values it
/// changes:
///
/// ```
/// use mea_importer::DetectionConfig;
///
/// let config = DetectionConfig::from_json(r#"{ "std_multiplier": 6.0 }"#).unwrap();
/// assert_eq!(config.std_multiplier, 6.0);
/// assert_eq!(config.peak_duration_ms, 2.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Threshold as a multiple of the noise floor standard deviation
    pub std_multiplier: f64,
    /// Maximum distance between the two lobes of a spike (ms)
    pub peak_duration_ms: f64,
    /// Dead time after an accepted spike (ms)
    pub refractory_ms: f64,
    /// Number of windows the signal is divided into for noise estimation
    pub windows: usize,
    /// Length of the sampled part of each window (ms)
    pub window_ms: f64,
    /// Exponent offset applied when calibrating the channels to analyse
    pub unit_scale: i32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            std_multiplier: 8.0,
            peak_duration_ms: 2.0,
            refractory_ms: 1.0,
            windows: 30,
            window_ms: 200.0,
            unit_scale: UNIT_SCALE_LEGACY,
        }
    }
}

impl DetectionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DetectionConfig = serde_json::from_str(json)
            .map_err(|e| MeaError::InvalidParameter(format!("detection config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("std_multiplier", self.std_multiplier),
            ("peak_duration_ms", self.peak_duration_ms),
            ("window_ms", self.window_ms),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(MeaError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(self.refractory_ms >= 0.0 && self.refractory_ms.is_finite()) {
            return Err(MeaError::InvalidParameter(format!(
                "refractory_ms must not be negative, got {}",
                self.refractory_ms
            )));
        }
        if self.windows == 0 {
            return Err(MeaError::InvalidParameter(
                "windows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
