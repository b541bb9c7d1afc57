// ─────────────────────────────────────────────────────────────────────
// MatVerse — PoSE-PQC Kernel Types
// (C) 2026 MatVerse contributors. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Evidence record, configuration, and error hierarchy for the
//! PoSE-PQC (Proof of Semantic Existence) kernel.

pub mod config;
pub mod error;
pub mod evidence;

pub use config::{PoseConfig, SIGNING_KEY_LEN};
pub use error::{PoseError, PoseResult};
pub use evidence::{
    format_sequence_id, omega_blend, parse_sequence_id, round_places, Evidence,
};
