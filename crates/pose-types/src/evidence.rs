// ─────────────────────────────────────────────────────────────────────
// MatVerse — PoSE-PQC Evidence Record
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PoseError, PoseResult};

/// Decimal places kept for `psi` and `omega_validated`.
pub const SCORE_PLACES: usize = 6;

/// Decimal places used when rendering the timestamp into a pre-image.
pub const TIMESTAMP_PLACES: usize = 9;

/// Prefix of every evidence id.
pub const EVIDENCE_ID_PREFIX: &str = "EV-";

/// Constant blended with psi to form `omega_validated`.
pub const OMEGA_ANCHOR: f64 = 1.0 - 0.007;

/// Round to `places` decimals using the exact decimal expansion of the
/// float, so the result agrees with the fixed-format rendering.
///
/// Non-finite values are returned unchanged.
#[inline]
pub fn round_places(value: f64, places: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{value:.places$}").parse().unwrap_or(value)
}

/// `omega_validated = round((psi + 0.993) / 2, 6)`.
#[inline]
pub fn omega_blend(psi: f64) -> f64 {
    round_places((psi + OMEGA_ANCHOR) / 2.0, SCORE_PLACES)
}

/// `EV-` followed by the counter, zero-padded to 8 digits.
pub fn format_sequence_id(counter: u64) -> String {
    format!("{EVIDENCE_ID_PREFIX}{counter:08}")
}

/// Inverse of [`format_sequence_id`]. Only canonical ids parse.
pub fn parse_sequence_id(id: &str) -> Option<u64> {
    let digits = id.strip_prefix(EVIDENCE_ID_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let counter: u64 = digits.parse().ok()?;
    (format_sequence_id(counter) == id).then_some(counter)
}

/// Immutable evidence note attesting that `claim` reached `psi` at
/// `timestamp`.
///
/// Fields are private and there are no setters: a record is assembled
/// once by the generator (or decoded from interchange JSON) and then
/// only read. Field order is the interchange order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    id: String,
    claim: String,
    psi: f64,
    iti: String,
    timestamp: f64,
    hash_hex: String,
    signature_hex: String,
    public_key_hex: String,
    omega_validated: f64,
}

impl Evidence {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        claim: String,
        psi: f64,
        iti: String,
        timestamp: f64,
        hash_hex: String,
        signature_hex: String,
        public_key_hex: String,
        omega_validated: f64,
    ) -> Self {
        Self {
            id,
            claim,
            psi,
            iti,
            timestamp,
            hash_hex,
            signature_hex,
            public_key_hex,
            omega_validated,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn claim(&self) -> &str {
        &self.claim
    }

    /// Accepted score, rounded to 6 decimals.
    pub fn psi(&self) -> f64 {
        self.psi
    }

    pub fn iti(&self) -> &str {
        &self.iti
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Hex SHA-512 of the canonical pre-image.
    pub fn hash_hex(&self) -> &str {
        &self.hash_hex
    }

    /// Hex HMAC-SHA-512 of the raw digest.
    pub fn signature_hex(&self) -> &str {
        &self.signature_hex
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    pub fn omega_validated(&self) -> f64 {
        self.omega_validated
    }

    /// Counter value encoded in `id`, if the id is canonical.
    pub fn sequence(&self) -> Option<u64> {
        parse_sequence_id(&self.id)
    }

    /// Ordered field mapping for interchange.
    pub fn to_map(&self) -> PoseResult<Map<String, Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(PoseError::Serialization(format!(
                "evidence encoded as non-object: {other}"
            ))),
            Err(e) => Err(PoseError::Serialization(e.to_string())),
        }
    }

    pub fn to_json(&self) -> PoseResult<String> {
        serde_json::to_string(self).map_err(|e| PoseError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> PoseResult<Self> {
        serde_json::from_str(json).map_err(|e| PoseError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Evidence {
        Evidence::new(
            format_sequence_id(7),
            "claim".into(),
            0.9,
            "iti".into(),
            123.0,
            "aa".into(),
            "bb".into(),
            "cc".into(),
            omega_blend(0.9),
        )
    }

    #[test]
    fn test_round_places() {
        assert_eq!(round_places(0.123_456_789, 6), 0.123_457);
        assert_eq!(round_places(0.9, 6), 0.9);
        assert_eq!(round_places(-1.000_000_4, 6), -1.0);
    }

    #[test]
    fn test_round_places_non_finite() {
        assert!(round_places(f64::NAN, 6).is_nan());
        assert_eq!(round_places(f64::INFINITY, 6), f64::INFINITY);
    }

    #[test]
    fn test_omega_blend() {
        assert_eq!(omega_blend(0.9), 0.9465);
        assert_eq!(omega_blend(1.0), 0.9965);
    }

    #[test]
    fn test_sequence_id_format() {
        assert_eq!(format_sequence_id(1), "EV-00000001");
        assert_eq!(format_sequence_id(123_456_789), "EV-123456789");
    }

    #[test]
    fn test_parse_sequence_id() {
        assert_eq!(parse_sequence_id("EV-00000042"), Some(42));
        assert_eq!(parse_sequence_id("EV-123456789"), Some(123_456_789));
        assert_eq!(parse_sequence_id("EV-42"), None);
        assert_eq!(parse_sequence_id("EV-0000004x"), None);
        assert_eq!(parse_sequence_id("XX-00000042"), None);
        assert_eq!(parse_sequence_id("EV-"), None);
    }

    #[test]
    fn test_to_map_field_order() {
        let keys: Vec<String> = sample().to_map().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            [
                "id",
                "claim",
                "psi",
                "iti",
                "timestamp",
                "hash_hex",
                "signature_hex",
                "public_key_hex",
                "omega_validated",
            ]
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let ev = sample();
        let json = ev.to_json().unwrap();
        assert!(json.starts_with(r#"{"id":"EV-00000007","claim":"claim""#));
        assert_eq!(Evidence::from_json(&json).unwrap(), ev);
    }

    #[test]
    fn test_from_json_missing_field() {
        assert!(matches!(
            Evidence::from_json(r#"{"id":"EV-00000001"}"#),
            Err(PoseError::Serialization(_))
        ));
    }

    #[test]
    fn test_sequence() {
        assert_eq!(sample().sequence(), Some(7));
    }
}
