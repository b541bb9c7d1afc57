// ─────────────────────────────────────────────────────────────────────
// MatVerse — Signing Key Material
// ─────────────────────────────────────────────────────────────────────
//! Symmetric signing key and the public identifier derived from it.
//!
//! The "public key" is `SHA-256(private_key)`: an identifier that lets
//! consumers group evidence by signer. It is not a verification key;
//! only a holder of the private key can check a signature.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use pose_types::{PoseError, PoseResult, SIGNING_KEY_LEN};

/// 32-byte HMAC key. Zeroized on drop; `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    bytes: [u8; SIGNING_KEY_LEN],
}

impl SigningKey {
    pub fn from_bytes(bytes: [u8; SIGNING_KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> PoseResult<Self> {
        let bytes: [u8; SIGNING_KEY_LEN] = bytes.try_into().map_err(|_| {
            PoseError::Key(format!(
                "signing key must be {SIGNING_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn from_hex(key_hex: &str) -> PoseResult<Self> {
        let mut decoded = hex::decode(key_hex)
            .map_err(|e| PoseError::Key(format!("signing key is not hex: {e}")))?;
        let key = Self::from_slice(&decoded);
        decoded.zeroize();
        key
    }

    /// Fresh key from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SIGNING_KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; SIGNING_KEY_LEN] {
        &self.bytes
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(Sha256::digest(self.bytes).into())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey([REDACTED])")
    }
}

/// SHA-256 digest of a signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_is_sha256_of_key() {
        let key = SigningKey::from_bytes([b'k'; SIGNING_KEY_LEN]);
        assert_eq!(
            key.public_key().to_hex(),
            "5e318f8cf9cbe249a30812b8ca132d691ded7a91991413558db5758575f5e01f"
        );
    }

    #[test]
    fn test_from_slice_length_checked() {
        assert!(SigningKey::from_slice(&[0u8; 32]).is_ok());
        assert!(matches!(
            SigningKey::from_slice(&[0u8; 16]),
            Err(PoseError::Key(_))
        ));
    }

    #[test]
    fn test_from_hex() {
        let key = SigningKey::from_hex(&"6b".repeat(32)).unwrap();
        assert_eq!(key.as_bytes(), &[b'k'; SIGNING_KEY_LEN]);
        assert!(SigningKey::from_hex("not hex").is_err());
        assert!(SigningKey::from_hex("6b6b").is_err());
    }

    #[test]
    fn test_generate_distinct() {
        let a = SigningKey::generate();
        let b = SigningKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_debug_redacted() {
        let key = SigningKey::from_bytes([b'k'; SIGNING_KEY_LEN]);
        let shown = format!("{key:?}");
        assert!(!shown.contains("107"));
        assert!(shown.contains("REDACTED"));
    }
}
