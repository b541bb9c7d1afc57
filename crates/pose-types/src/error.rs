// ─────────────────────────────────────────────────────────────────────
// MatVerse — PoSE-PQC Kernel Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for PoSE-PQC kernel failures.
///
/// Rejection of a claim is never an error: a below-threshold or
/// non-finite psi is reported as `None` / `false` by the generator and
/// the gate. These variants cover setup and forwarding only.
#[derive(Error, Debug)]
pub enum PoseError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Signing key has the wrong length or is not valid hex.
    #[error("signing key error: {0}")]
    Key(String),

    /// The downstream coherence engine failed to record evidence.
    #[error("coherence engine error: {0}")]
    Engine(String),

    /// Evidence could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type PoseResult<T> = Result<T, PoseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            PoseError::Config("bad".into()).to_string(),
            "config error: bad"
        );
        assert_eq!(
            PoseError::Engine("down".into()).to_string(),
            "coherence engine error: down"
        );
    }
}
