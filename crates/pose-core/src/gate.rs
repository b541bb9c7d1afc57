// ─────────────────────────────────────────────────────────────────────
// MatVerse — Omega Integration Gate
// ─────────────────────────────────────────────────────────────────────
//! Two-stage forwarding of evidence to a coherence engine.
//!
//! Stage one is the generator's threshold. Stage two is the gate's own
//! `psi_floor`, configured independently: a floor above the threshold
//! narrows what gets forwarded, a floor at or below it changes nothing.

use std::sync::Arc;

use parking_lot::Mutex;

use pose_types::{Evidence, PoseConfig, PoseResult};

use crate::generator::EvidenceGenerator;

/// Trait for engines that ingest forwarded evidence.
///
/// The returned error is not inspected or retried by the gate; it is
/// handed straight back to the caller of `process_claim`.
pub trait CoherenceEngine: Send + Sync {
    fn record(&self, evidence: Evidence) -> PoseResult<()>;
}

/// In-memory engine that keeps everything it is given.
#[derive(Default)]
pub struct RecordingEngine {
    seen: Mutex<Vec<Evidence>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    /// Copy of the recorded evidence, in arrival order.
    pub fn snapshot(&self) -> Vec<Evidence> {
        self.seen.lock().clone()
    }

    pub fn drain(&self) -> Vec<Evidence> {
        std::mem::take(&mut *self.seen.lock())
    }
}

impl CoherenceEngine for RecordingEngine {
    fn record(&self, evidence: Evidence) -> PoseResult<()> {
        self.seen.lock().push(evidence);
        Ok(())
    }
}

/// External engine that calls a function pointer.
///
/// Used by the PyO3 FFI layer to forward evidence to a Python object's
/// `record` method.
type RecordFn = Box<dyn Fn(Evidence) -> PoseResult<()> + Send + Sync>;

pub struct ExternalEngine {
    record_fn: RecordFn,
}

impl ExternalEngine {
    pub fn new(record_fn: impl Fn(Evidence) -> PoseResult<()> + Send + Sync + 'static) -> Self {
        Self {
            record_fn: Box::new(record_fn),
        }
    }
}

impl CoherenceEngine for ExternalEngine {
    fn record(&self, evidence: Evidence) -> PoseResult<()> {
        (self.record_fn)(evidence)
    }
}

/// Bridge between an evidence generator and a coherence engine.
pub struct IntegrationGate {
    engine: Arc<dyn CoherenceEngine>,
    psi_floor: f64,
}

impl IntegrationGate {
    pub fn new(engine: Arc<dyn CoherenceEngine>, psi_floor: f64) -> Self {
        Self { engine, psi_floor }
    }

    pub fn from_config(engine: Arc<dyn CoherenceEngine>, config: &PoseConfig) -> PoseResult<Self> {
        config.validate()?;
        Ok(Self::new(engine, config.psi_floor))
    }

    /// Generate evidence and forward it if it meets the floor.
    ///
    /// Returns `Ok(true)` when evidence was produced and recorded,
    /// `Ok(false)` when the generator or the floor rejected the claim.
    /// An engine failure is returned as-is.
    pub fn process_claim(
        &self,
        generator: &EvidenceGenerator,
        claim: &str,
        psi: f64,
        iti: &str,
    ) -> PoseResult<bool> {
        let Some(evidence) = generator.generate(claim, psi, iti) else {
            return Ok(false);
        };

        if evidence.psi() < self.psi_floor {
            log::debug!(
                "evidence {} held back: psi {:.6} < floor {}",
                evidence.id(),
                evidence.psi(),
                self.psi_floor
            );
            return Ok(false);
        }

        let id = evidence.id().to_string();
        if let Err(e) = self.engine.record(evidence) {
            log::error!("coherence engine rejected evidence {id}: {e}");
            return Err(e);
        }
        Ok(true)
    }

    pub fn psi_floor(&self) -> f64 {
        self.psi_floor
    }

    pub fn engine(&self) -> &Arc<dyn CoherenceEngine> {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use pose_types::PoseError;

    fn make_generator(threshold: f64) -> EvidenceGenerator {
        EvidenceGenerator::builder()
            .psi_threshold(threshold)
            .time_source(FixedClock(1.0))
            .build()
            .unwrap()
    }

    #[test]
    fn test_process_claim_accepts_and_records() {
        let recorder = Arc::new(RecordingEngine::new());
        let gate = IntegrationGate::new(recorder.clone(), 0.85);
        let generator = make_generator(0.85);

        assert!(gate.process_claim(&generator, "ok", 0.95, "iti").unwrap());
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.snapshot()[0].claim(), "ok");
    }

    #[test]
    fn test_process_claim_rejects_below_floor() {
        let recorder = Arc::new(RecordingEngine::new());
        let gate = IntegrationGate::new(recorder.clone(), 0.9);
        let generator = make_generator(0.8);

        assert!(!gate.process_claim(&generator, "low", 0.85, "iti").unwrap());
        assert!(recorder.is_empty());
        // Generator accepted it, so the counter still moved.
        assert_eq!(generator.counter(), 1);
    }

    #[test]
    fn test_process_claim_rejected_by_generator() {
        let recorder = Arc::new(RecordingEngine::new());
        let gate = IntegrationGate::new(recorder.clone(), 0.5);
        let generator = make_generator(0.9);

        assert!(!gate.process_claim(&generator, "low", 0.7, "iti").unwrap());
        assert!(!gate.process_claim(&generator, "nan", f64::NAN, "iti").unwrap());
        assert!(recorder.is_empty());
        assert_eq!(generator.counter(), 0);
    }

    #[test]
    fn test_floor_below_threshold_is_noop() {
        let recorder = Arc::new(RecordingEngine::new());
        let gate = IntegrationGate::new(recorder.clone(), 0.1);
        let generator = make_generator(0.8);

        assert!(gate.process_claim(&generator, "a", 0.8, "iti").unwrap());
        assert!(!gate.process_claim(&generator, "b", 0.79, "iti").unwrap());
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_floor_inclusive() {
        let recorder = Arc::new(RecordingEngine::new());
        let gate = IntegrationGate::new(recorder.clone(), 0.9);
        let generator = make_generator(0.5);

        assert!(gate.process_claim(&generator, "edge", 0.9, "iti").unwrap());
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_engine_error_propagates() {
        let engine = Arc::new(ExternalEngine::new(|_| {
            Err(PoseError::Engine("engine offline".into()))
        }));
        let gate = IntegrationGate::new(engine, 0.5);
        let generator = make_generator(0.5);

        let err = gate.process_claim(&generator, "c", 0.9, "iti").unwrap_err();
        assert!(matches!(err, PoseError::Engine(msg) if msg == "engine offline"));
    }

    #[test]
    fn test_external_engine_receives_evidence() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let engine = Arc::new(ExternalEngine::new(move |ev: Evidence| {
            sink.lock().push(ev.id().to_string());
            Ok(())
        }));
        let gate = IntegrationGate::new(engine, 0.5);
        let generator = make_generator(0.5);

        gate.process_claim(&generator, "a", 0.9, "iti").unwrap();
        gate.process_claim(&generator, "b", 0.9, "iti").unwrap();
        assert_eq!(*seen.lock(), ["EV-00000001", "EV-00000002"]);
    }

    #[test]
    fn test_from_config() {
        let config = PoseConfig {
            psi_floor: 0.92,
            ..Default::default()
        };
        let gate = IntegrationGate::from_config(Arc::new(RecordingEngine::new()), &config).unwrap();
        assert_eq!(gate.psi_floor(), 0.92);

        let bad = PoseConfig {
            psi_floor: f64::NAN,
            ..Default::default()
        };
        assert!(IntegrationGate::from_config(Arc::new(RecordingEngine::new()), &bad).is_err());
    }

    #[test]
    fn test_drain_empties() {
        let recorder = Arc::new(RecordingEngine::new());
        let gate = IntegrationGate::new(recorder.clone(), 0.5);
        let generator = make_generator(0.5);
        gate.process_claim(&generator, "a", 0.9, "iti").unwrap();
        assert_eq!(recorder.drain().len(), 1);
        assert!(recorder.is_empty());
    }
}
