// ─────────────────────────────────────────────────────────────────────
// MatVerse — PoSE-PQC Evidence Generator
// ─────────────────────────────────────────────────────────────────────
//! Threshold-gated evidence generation.
//!
//! An accepted claim yields an `Evidence` whose digest is
//! `SHA-512(claim|psi:.6|iti|timestamp:.9|counter)` and whose signature
//! is `HMAC-SHA-512(private_key, digest)`. The HMAC is a placeholder for
//! a post-quantum signer: it gives integrity to key holders, nothing to
//! third parties.
//!
//! A rejected claim (non-finite psi, or psi below the threshold) returns
//! `None` before any lock is taken or any allocation is made.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use sha2::{Digest, Sha512};

use pose_types::evidence::{SCORE_PLACES, TIMESTAMP_PLACES};
use pose_types::{
    format_sequence_id, omega_blend, round_places, Evidence, PoseConfig, PoseError, PoseResult,
};

use crate::batch::BatchProducer;
use crate::clock::{SystemClock, TimeSource};
use crate::keys::{PublicKey, SigningKey};

type HmacSha512 = Hmac<Sha512>;

/// Canonical pre-image hashed into every evidence record.
pub fn canonical_preimage(claim: &str, psi: f64, iti: &str, timestamp: f64, counter: u64) -> String {
    format!(
        "{claim}|{psi:.p$}|{iti}|{timestamp:.t$}|{counter}",
        p = SCORE_PLACES,
        t = TIMESTAMP_PLACES
    )
}

/// Produces signed evidence for claims whose psi meets the threshold.
///
/// Thread-safe: the counter lives behind a `parking_lot::Mutex` that is
/// held across increment, timestamp capture, and pre-image assembly, so
/// concurrent callers sharing one instance through `Arc` never observe a
/// duplicate or out-of-order id.
pub struct EvidenceGenerator {
    psi_threshold: f64,
    public_key: PublicKey,
    public_key_hex: String,
    mac: HmacSha512,
    time_source: Arc<dyn TimeSource>,
    counter: Mutex<u64>,
}

impl EvidenceGenerator {
    /// Generator with a fresh random key reading the wall clock.
    pub fn new(psi_threshold: f64) -> PoseResult<Self> {
        Self::builder().psi_threshold(psi_threshold).build()
    }

    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder::default()
    }

    /// Build from a validated config, using the wall clock.
    pub fn from_config(config: &PoseConfig) -> PoseResult<Self> {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(
        config: &PoseConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> PoseResult<Self> {
        config.validate()?;
        let signing_key = match &config.signing_key_hex {
            Some(key_hex) => SigningKey::from_hex(key_hex)?,
            None => SigningKey::generate(),
        };
        Ok(Self::from_parts(config.psi_threshold, signing_key, time_source))
    }

    fn from_parts(
        psi_threshold: f64,
        signing_key: SigningKey,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        // Only the keyed MAC state and the public identifier outlive the key.
        let public_key = signing_key.public_key();
        let mac = HmacSha512::new_from_slice(signing_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        Self {
            psi_threshold,
            public_key,
            public_key_hex: public_key.to_hex(),
            mac,
            time_source,
            counter: Mutex::new(0),
        }
    }

    /// Generate a single evidence note if `psi` meets the threshold.
    ///
    /// Returns `None` for non-finite psi or `psi < threshold`; the
    /// counter is untouched in that case. `psi == threshold` is accepted.
    /// Once the counter reaches `u64::MAX` every claim is rejected.
    ///
    /// The time source is called with the counter lock held. A time
    /// source that takes another lock (the FFI layer's Python clock takes
    /// the GIL) requires every caller to release that lock before
    /// calling in.
    pub fn generate(&self, claim: &str, psi: f64, iti: &str) -> Option<Evidence> {
        if !psi.is_finite() {
            log::debug!("evidence rejected: non-finite psi {psi}");
            return None;
        }
        if psi < self.psi_threshold {
            log::debug!(
                "evidence rejected: psi {psi:.6} < threshold {}",
                self.psi_threshold
            );
            return None;
        }

        let (counter, timestamp, preimage) = {
            let mut counter = self.counter.lock();
            let Some(next) = counter.checked_add(1) else {
                log::error!("evidence rejected: counter exhausted at {}", *counter);
                return None;
            };
            *counter = next;
            let timestamp = self.time_source.now();
            let preimage = canonical_preimage(claim, psi, iti, timestamp, next);
            (next, timestamp, preimage)
        };

        let digest = Sha512::digest(preimage.as_bytes());
        let mut mac = self.mac.clone();
        mac.update(&digest);
        let signature = mac.finalize().into_bytes();

        let id = format_sequence_id(counter);
        log::debug!("evidence {id} issued at psi {psi:.6}");

        Some(Evidence::new(
            id,
            claim.to_string(),
            round_places(psi, SCORE_PLACES),
            iti.to_string(),
            timestamp,
            hex::encode(digest),
            hex::encode(signature),
            self.public_key_hex.clone(),
            omega_blend(psi),
        ))
    }

    /// Generate up to `count` evidences; see [`BatchProducer`].
    pub fn generate_batch(
        &self,
        count: usize,
        claim: &str,
        base_psi: f64,
        iti_seed: &str,
        psi_jitter: f64,
    ) -> Vec<Evidence> {
        BatchProducer::new(self).generate_batch(count, claim, base_psi, iti_seed, psi_jitter)
    }

    /// Check that `evidence` was issued by this generator and is intact.
    ///
    /// Recomputes the pre-image from the record, compares the digest,
    /// and checks the MAC in constant time. Only meaningful to a holder
    /// of the private key.
    pub fn verify(&self, evidence: &Evidence) -> bool {
        if evidence.public_key_hex() != self.public_key_hex {
            return false;
        }
        let Some(counter) = evidence.sequence() else {
            return false;
        };
        let preimage = canonical_preimage(
            evidence.claim(),
            evidence.psi(),
            evidence.iti(),
            evidence.timestamp(),
            counter,
        );
        let digest = Sha512::digest(preimage.as_bytes());
        if hex::encode(digest) != evidence.hash_hex() {
            return false;
        }
        let Ok(signature) = hex::decode(evidence.signature_hex()) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(&digest);
        mac.verify_slice(&signature).is_ok()
    }

    pub fn threshold(&self) -> f64 {
        self.psi_threshold
    }

    /// Number of evidences issued so far.
    pub fn counter(&self) -> u64 {
        *self.counter.lock()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }
}

/// Builder for [`EvidenceGenerator`].
pub struct GeneratorBuilder {
    psi_threshold: f64,
    signing_key: Option<SigningKey>,
    time_source: Option<Arc<dyn TimeSource>>,
}

impl Default for GeneratorBuilder {
    fn default() -> Self {
        Self {
            psi_threshold: PoseConfig::default().psi_threshold,
            signing_key: None,
            time_source: None,
        }
    }
}

impl GeneratorBuilder {
    pub fn psi_threshold(mut self, psi_threshold: f64) -> Self {
        self.psi_threshold = psi_threshold;
        self
    }

    pub fn signing_key(mut self, signing_key: SigningKey) -> Self {
        self.signing_key = Some(signing_key);
        self
    }

    pub fn time_source(mut self, time_source: impl TimeSource + 'static) -> Self {
        self.time_source = Some(Arc::new(time_source));
        self
    }

    pub fn shared_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    /// Fails with `PoseError::Config` for a NaN threshold, which would
    /// otherwise compare false against every psi and accept everything.
    pub fn build(self) -> PoseResult<EvidenceGenerator> {
        if self.psi_threshold.is_nan() {
            return Err(PoseError::Config("psi_threshold must not be NaN".to_string()));
        }
        Ok(EvidenceGenerator::from_parts(
            self.psi_threshold,
            self.signing_key.unwrap_or_else(SigningKey::generate),
            self.time_source.unwrap_or_else(|| Arc::new(SystemClock)),
        ))
    }
}
