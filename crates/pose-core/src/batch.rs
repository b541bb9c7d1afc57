// ─────────────────────────────────────────────────────────────────────
// MatVerse — Batch Evidence Producer
// ─────────────────────────────────────────────────────────────────────
//! Drives one generator across synthetic inputs.
//!
//! Index `i` gets `psi_i = base_psi + (i mod 100) * psi_jitter` and
//! `iti_i = hex(SHA-256("{iti_seed}:{i}"))`. Rejected indices are
//! skipped, so the output keeps index order but may be shorter than
//! `count`.

use sha2::{Digest, Sha256};

use pose_types::Evidence;

use crate::generator::EvidenceGenerator;

/// Jitter applied when a caller does not pick one.
pub const DEFAULT_PSI_JITTER: f64 = 0.001;

/// Number of distinct jitter offsets before the cycle repeats.
pub const JITTER_CYCLE: usize = 100;

/// Trace identifier for batch index `index`.
pub fn batch_iti(iti_seed: &str, index: usize) -> String {
    hex::encode(Sha256::digest(format!("{iti_seed}:{index}").as_bytes()))
}

/// Batch front-end over a borrowed generator.
///
/// Borrowing keeps one counter for single and batch calls alike.
pub struct BatchProducer<'g> {
    generator: &'g EvidenceGenerator,
}

impl<'g> BatchProducer<'g> {
    pub fn new(generator: &'g EvidenceGenerator) -> Self {
        Self { generator }
    }

    /// Generate a batch of evidence notes.
    ///
    /// Never fails as a whole and never stops at a rejection.
    pub fn generate_batch(
        &self,
        count: usize,
        claim: &str,
        base_psi: f64,
        iti_seed: &str,
        psi_jitter: f64,
    ) -> Vec<Evidence> {
        // Sized by acceptances, not by `count`.
        let mut evidences = Vec::new();
        for i in 0..count {
            let psi = base_psi + (i % JITTER_CYCLE) as f64 * psi_jitter;
            let iti = batch_iti(iti_seed, i);
            if let Some(evidence) = self.generator.generate(claim, psi, &iti) {
                evidences.push(evidence);
            }
        }
        if evidences.len() < count {
            log::debug!(
                "batch accepted {} of {count} (threshold {})",
                evidences.len(),
                self.generator.threshold()
            );
        }
        evidences
    }
}
