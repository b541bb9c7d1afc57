// ─────────────────────────────────────────────────────────────────────
// MatVerse — PoSE-PQC Kernel Core
// (C) 2026 MatVerse contributors. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Evidence generation, batch production, and integration gating for
//! Proof of Semantic Existence (PoSE).
//!
//! # Invariants
//!
//! 1. **Counter moves only on acceptance**: `generate` returns `None`
//!    for a non-finite psi or `psi < threshold` without touching the
//!    counter, the clock, or the allocator. `psi == threshold` passes.
//!
//! 2. **Ids are strictly increasing and unique per instance**: counter
//!    increment, timestamp capture, and pre-image assembly happen under
//!    one lock, so `EV-00000001`, `EV-00000002`, … come out in
//!    acceptance order even when the generator is shared across threads.
//!
//! 3. **Digesting is deterministic**: the same key, clock reading, and
//!    inputs at the same counter value give byte-identical digests and
//!    signatures.
//!
//! 4. **Threshold and floor are independent**: the generator's threshold
//!    decides whether evidence exists; the gate's floor decides whether
//!    it is forwarded. Engine failures propagate to the caller.
//!
//! The signature is HMAC-SHA-512. Only a holder of the private key can
//! verify it; there is no third-party verifiability.

pub mod batch;
pub mod clock;
pub mod gate;
pub mod generator;
pub mod keys;

pub use batch::{batch_iti, BatchProducer, DEFAULT_PSI_JITTER};
pub use clock::{ExternalClock, FixedClock, SteppingClock, SystemClock, TimeSource};
pub use gate::{CoherenceEngine, ExternalEngine, IntegrationGate, RecordingEngine};
pub use generator::{canonical_preimage, EvidenceGenerator, GeneratorBuilder};
pub use keys::{PublicKey, SigningKey};
