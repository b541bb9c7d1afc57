// ─────────────────────────────────────────────────────────────────────
// MatVerse — PoSE-PQC Kernel Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{PoseError, PoseResult};

/// Length in bytes of a generator signing key.
pub const SIGNING_KEY_LEN: usize = 32;

/// Runtime configuration for evidence generation and forwarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Generator acceptance threshold: psi must be >= this.
    /// Default: 0.85.
    pub psi_threshold: f64,

    /// Integration gate forwarding floor, independent of the threshold.
    /// Default: 0.85.
    pub psi_floor: f64,

    /// Per-index psi offset used by batch generation.
    /// Default: 0.001.
    pub psi_jitter: f64,

    /// Optional fixed signing key (64 hex chars). A fresh random key is
    /// generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key_hex: Option<String>,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            psi_threshold: 0.85,
            psi_floor: 0.85,
            psi_jitter: 0.001,
            signing_key_hex: None,
        }
    }
}

impl PoseConfig {
    /// Validate configuration parameters.
    ///
    /// Infinite thresholds are allowed (`-inf` accepts every finite psi,
    /// `+inf` accepts none); NaN is not, since it compares false with
    /// everything.
    pub fn validate(&self) -> PoseResult<()> {
        if self.psi_threshold.is_nan() {
            return Err(PoseError::Config("psi_threshold must not be NaN".to_string()));
        }
        if self.psi_floor.is_nan() {
            return Err(PoseError::Config("psi_floor must not be NaN".to_string()));
        }
        if !self.psi_jitter.is_finite() {
            return Err(PoseError::Config(format!(
                "psi_jitter must be finite, got {}",
                self.psi_jitter
            )));
        }
        if let Some(key_hex) = &self.signing_key_hex {
            let bytes = hex::decode(key_hex)
                .map_err(|e| PoseError::Key(format!("signing_key_hex is not hex: {e}")))?;
            if bytes.len() != SIGNING_KEY_LEN {
                return Err(PoseError::Key(format!(
                    "signing key must be {SIGNING_KEY_LEN} bytes, got {}",
                    bytes.len()
                )));
            }
        }
        Ok(())
    }

    /// Load from JSON string.
    pub fn from_json(json: &str) -> PoseResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PoseError::Config(format!("JSON parse error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        let config = PoseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.psi_threshold, 0.85);
        assert_eq!(config.psi_floor, 0.85);
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let config = PoseConfig {
            psi_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PoseError::Config(_))));
    }

    #[test]
    fn test_infinite_threshold_allowed() {
        let config = PoseConfig {
            psi_threshold: f64::NEG_INFINITY,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nan_jitter_rejected() {
        let config = PoseConfig {
            psi_jitter: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_key_rejected() {
        let config = PoseConfig {
            signing_key_hex: Some("abcd".into()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PoseError::Key(_))));
    }

    #[test]
    fn test_non_hex_key_rejected() {
        let config = PoseConfig {
            signing_key_hex: Some("zz".repeat(32)),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PoseError::Key(_))));
    }

    #[test]
    fn test_from_json_partial() {
        let config = PoseConfig::from_json(r#"{"psi_threshold": 0.7}"#).unwrap();
        assert_eq!(config.psi_threshold, 0.7);
        assert_eq!(config.psi_floor, 0.85);
        assert!(config.signing_key_hex.is_none());
    }

    #[test]
    fn test_from_json_garbage() {
        assert!(matches!(
            PoseConfig::from_json("not json"),
            Err(PoseError::Config(_))
        ));
    }
}
