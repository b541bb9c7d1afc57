// ─────────────────────────────────────────────────────────────────────
// MatVerse — PoSE-PQC PyO3 FFI Bindings
// (C) 2026 MatVerse contributors. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied — PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the PoSE-PQC kernel.
//!
//! Exposes `PoSEPQC`, `OmegaIntegration`, `Evidence`, and `PoseConfig`
//! to Python via PyO3.
//!
//! # FFI Safety
//!
//! - The GIL is released (`allow_threads`) for every kernel call, so a
//!   thread waiting on the generator's counter lock never holds it.
//! - GIL re-acquired via `Python::with_gil` before every Python callback.
//! - A Python exception from `time_source` or `engine.record` is
//!   re-raised unchanged; the record being built is discarded.
//! - All config validated before use (`PoseConfig::validate()`).
//!
//! Usage from Python:
//! ```python
//! from pose_pqc import PoSEPQC, OmegaIntegration
//!
//! pose = PoSEPQC(psi_threshold=0.85, time_source=lambda: 123.0, signing_key=b"k" * 32)
//! evidence = pose.generate_evidence("claim", 0.9, "iti")
//! omega = OmegaIntegration(engine=recorder, psi_floor=0.9)
//! omega.process_claim(pose, "claim", 0.95, "iti")
//! ```

use std::cell::RefCell;
use std::sync::Arc;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use pose_core::{
    EvidenceGenerator, ExternalClock, ExternalEngine, IntegrationGate, SigningKey, SystemClock,
    TimeSource, DEFAULT_PSI_JITTER,
};
use pose_types::{Evidence, PoseConfig, PoseError};

fn value_error(e: PoseError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

// ─── Callback error propagation ─────────────────────────────────────

thread_local! {
    // Kernel calls run their callbacks on the calling thread, so this
    // slot belongs to exactly one in-flight call.
    static CALLBACK_ERROR: RefCell<Option<PyErr>> = const { RefCell::new(None) };
}

/// Keep the first exception raised by a callback during this call.
fn stash_callback_error(err: PyErr) {
    CALLBACK_ERROR.with(|slot| {
        slot.borrow_mut().get_or_insert(err);
    });
}

fn callback_failed() -> bool {
    CALLBACK_ERROR.with(|slot| slot.borrow().is_some())
}

/// Run a kernel call with the GIL released, then re-raise whatever a
/// Python callback raised while it ran.
fn call_kernel<T: Send>(py: Python<'_>, call: impl FnOnce() -> T + Send) -> PyResult<T> {
    CALLBACK_ERROR.with(|slot| slot.borrow_mut().take());
    let value = py.allow_threads(call);
    match CALLBACK_ERROR.with(|slot| slot.borrow_mut().take()) {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

// ─── PyPoseConfig ───────────────────────────────────────────────────

/// Python-visible configuration for evidence generation and forwarding.
#[pyclass(name = "PoseConfig")]
#[derive(Clone)]
struct PyPoseConfig {
    inner: PoseConfig,
}

#[pymethods]
impl PyPoseConfig {
    #[new]
    #[pyo3(signature = (
        psi_threshold = 0.85,
        psi_floor = 0.85,
        psi_jitter = DEFAULT_PSI_JITTER,
        signing_key_hex = None,
    ))]
    fn new(
        psi_threshold: f64,
        psi_floor: f64,
        psi_jitter: f64,
        signing_key_hex: Option<String>,
    ) -> PyResult<Self> {
        let config = PoseConfig {
            psi_threshold,
            psi_floor,
            psi_jitter,
            signing_key_hex,
        };
        config.validate().map_err(value_error)?;
        Ok(Self { inner: config })
    }

    /// Construct from JSON string.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = PoseConfig::from_json(json).map_err(value_error)?;
        config.validate().map_err(value_error)?;
        Ok(Self { inner: config })
    }

    #[getter]
    fn psi_threshold(&self) -> f64 {
        self.inner.psi_threshold
    }

    #[getter]
    fn psi_floor(&self) -> f64 {
        self.inner.psi_floor
    }

    #[getter]
    fn psi_jitter(&self) -> f64 {
        self.inner.psi_jitter
    }

    fn __repr__(&self) -> String {
        format!(
            "PoseConfig(psi_threshold={}, psi_floor={}, psi_jitter={}, fixed_key={})",
            self.inner.psi_threshold,
            self.inner.psi_floor,
            self.inner.psi_jitter,
            self.inner.signing_key_hex.is_some()
        )
    }
}

// ─── PyEvidence ─────────────────────────────────────────────────────

/// Python-visible immutable evidence note.
#[pyclass(name = "Evidence", frozen)]
#[derive(Clone)]
struct PyEvidence {
    inner: Evidence,
}

#[pymethods]
impl PyEvidence {
    #[getter]
    fn id(&self) -> &str {
        self.inner.id()
    }

    #[getter]
    fn claim(&self) -> &str {
        self.inner.claim()
    }

    #[getter]
    fn psi(&self) -> f64 {
        self.inner.psi()
    }

    #[getter]
    fn iti(&self) -> &str {
        self.inner.iti()
    }

    #[getter]
    fn timestamp(&self) -> f64 {
        self.inner.timestamp()
    }

    #[getter]
    fn hash_hex(&self) -> &str {
        self.inner.hash_hex()
    }

    #[getter]
    fn signature_hex(&self) -> &str {
        self.inner.signature_hex()
    }

    #[getter]
    fn public_key_hex(&self) -> &str {
        self.inner.public_key_hex()
    }

    #[getter]
    fn omega_validated(&self) -> f64 {
        self.inner.omega_validated()
    }

    /// Ordered field mapping, interchange order.
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new(py);
        dict.set_item("id", self.inner.id())?;
        dict.set_item("claim", self.inner.claim())?;
        dict.set_item("psi", self.inner.psi())?;
        dict.set_item("iti", self.inner.iti())?;
        dict.set_item("timestamp", self.inner.timestamp())?;
        dict.set_item("hash_hex", self.inner.hash_hex())?;
        dict.set_item("signature_hex", self.inner.signature_hex())?;
        dict.set_item("public_key_hex", self.inner.public_key_hex())?;
        dict.set_item("omega_validated", self.inner.omega_validated())?;
        Ok(dict)
    }

    fn to_json(&self) -> PyResult<String> {
        self.inner.to_json().map_err(value_error)
    }

    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let inner = Evidence::from_json(json).map_err(value_error)?;
        Ok(Self { inner })
    }

    fn __eq__(&self, other: &Self) -> bool {
        self.inner == other.inner
    }

    fn __repr__(&self) -> String {
        format!(
            "Evidence(id={}, claim={:?}, psi={:.6}, omega_validated={:.6})",
            self.inner.id(),
            self.inner.claim(),
            self.inner.psi(),
            self.inner.omega_validated()
        )
    }
}

// ─── PoSEPQC ────────────────────────────────────────────────────────

/// Wrap a Python zero-argument callable as a time source.
///
/// On failure the exception is stashed for `call_kernel` to re-raise and
/// NaN stands in for the timestamp of the record that will be dropped.
fn python_clock(callback: PyObject) -> ExternalClock {
    ExternalClock::new(move || {
        Python::with_gil(|py| {
            match callback.call0(py).and_then(|value| value.extract::<f64>(py)) {
                Ok(now) => now,
                Err(e) => {
                    log::warn!("time_source raised: {e}");
                    stash_callback_error(e);
                    f64::NAN
                }
            }
        })
    })
}

/// Evidence generator exposed to Python.
///
/// Drop-in replacement for the pure-Python `PoSEPQC`.
#[pyclass(name = "PoSEPQC", frozen)]
struct PyPoseGenerator {
    inner: EvidenceGenerator,
}

#[pymethods]
impl PyPoseGenerator {
    /// Create a new generator.
    ///
    /// Args:
    ///     psi_threshold: Acceptance threshold (inclusive).
    ///     time_source: Optional Callable[[], float]; wall clock if None.
    ///     signing_key: Optional 32-byte key; random if None.
    #[new]
    #[pyo3(signature = (psi_threshold = 0.85, time_source = None, signing_key = None))]
    fn new(
        psi_threshold: f64,
        time_source: Option<PyObject>,
        signing_key: Option<Vec<u8>>,
    ) -> PyResult<Self> {
        let mut builder = EvidenceGenerator::builder().psi_threshold(psi_threshold);
        if let Some(key) = signing_key {
            builder = builder.signing_key(SigningKey::from_slice(&key).map_err(value_error)?);
        }
        if let Some(callback) = time_source {
            builder = builder.time_source(python_clock(callback));
        }
        Ok(Self {
            inner: builder.build().map_err(value_error)?,
        })
    }

    /// Create from a `PoseConfig`, optionally with a time source.
    #[staticmethod]
    #[pyo3(signature = (config, time_source = None))]
    fn from_config(config: PyPoseConfig, time_source: Option<PyObject>) -> PyResult<Self> {
        let clock: Arc<dyn TimeSource> = match time_source {
            Some(callback) => Arc::new(python_clock(callback)),
            None => Arc::new(SystemClock),
        };
        let inner = EvidenceGenerator::from_config_with_clock(&config.inner, clock)
            .map_err(value_error)?;
        Ok(Self { inner })
    }

    /// Generate a single evidence note if `psi` passes the threshold.
    ///
    /// Returns:
    ///     Evidence, or None for a non-finite or below-threshold psi.
    ///
    /// Raises:
    ///     Whatever `time_source` raised. The counter has already moved.
    fn generate_evidence(
        &self,
        py: Python<'_>,
        claim: &str,
        psi: f64,
        iti: &str,
    ) -> PyResult<Option<PyEvidence>> {
        let generator = &self.inner;
        let evidence = call_kernel(py, || generator.generate(claim, psi, iti))?;
        Ok(evidence.map(|inner| PyEvidence { inner }))
    }

    /// Generate up to `count` evidence notes with cycling psi jitter.
    ///
    /// A `time_source` exception is raised after the batch finishes and
    /// the whole batch is discarded.
    #[pyo3(signature = (count, claim, base_psi, iti_seed, psi_jitter = DEFAULT_PSI_JITTER))]
    fn generate_batch(
        &self,
        py: Python<'_>,
        count: usize,
        claim: &str,
        base_psi: f64,
        iti_seed: &str,
        psi_jitter: f64,
    ) -> PyResult<Vec<PyEvidence>> {
        let generator = &self.inner;
        let evidences = call_kernel(py, || {
            generator.generate_batch(count, claim, base_psi, iti_seed, psi_jitter)
        })?;
        Ok(evidences
            .into_iter()
            .map(|inner| PyEvidence { inner })
            .collect())
    }

    /// True if `evidence` was issued by this generator and is intact.
    fn verify(&self, evidence: PyRef<'_, PyEvidence>) -> bool {
        self.inner.verify(&evidence.inner)
    }

    #[getter]
    fn psi_threshold(&self) -> f64 {
        self.inner.threshold()
    }

    #[getter]
    fn counter(&self) -> u64 {
        self.inner.counter()
    }

    #[getter]
    fn public_key_hex(&self) -> &str {
        self.inner.public_key_hex()
    }

    fn __repr__(&self) -> String {
        format!(
            "PoSEPQC(psi_threshold={}, counter={}, public_key={})",
            self.inner.threshold(),
            self.inner.counter(),
            &self.inner.public_key_hex()[..16]
        )
    }
}

// ─── OmegaIntegration ───────────────────────────────────────────────

/// Bridge between `PoSEPQC` and a Python coherence engine.
///
/// The engine is any object with a `record(evidence)` method. Its
/// exceptions pass through `process_claim` unchanged.
#[pyclass(name = "OmegaIntegration", frozen)]
struct PyOmegaIntegration {
    engine: PyObject,
    gate: IntegrationGate,
}

#[pymethods]
impl PyOmegaIntegration {
    #[new]
    #[pyo3(signature = (engine, psi_floor = 0.85))]
    fn new(py: Python<'_>, engine: PyObject, psi_floor: f64) -> PyResult<Self> {
        if psi_floor.is_nan() {
            return Err(PyValueError::new_err("psi_floor must not be NaN"));
        }
        let target = engine.clone_ref(py);
        let bridge = ExternalEngine::new(move |evidence: Evidence| {
            // A failed time source already poisoned this record.
            if callback_failed() {
                return Err(PoseError::Engine(
                    "time_source raised; evidence not forwarded".to_string(),
                ));
            }
            Python::with_gil(|py| {
                Py::new(py, PyEvidence { inner: evidence })
                    .and_then(|ev| target.call_method1(py, "record", (ev,)))
                    .map(|_| ())
                    .map_err(|err| {
                        let message = err.to_string();
                        stash_callback_error(err);
                        PoseError::Engine(message)
                    })
            })
        });
        Ok(Self {
            engine,
            gate: IntegrationGate::new(Arc::new(bridge), psi_floor),
        })
    }

    /// Generate and forward evidence if it meets the floor.
    ///
    /// Returns True when evidence was produced and forwarded.
    fn process_claim(
        &self,
        py: Python<'_>,
        pose: PyRef<'_, PyPoseGenerator>,
        claim: &str,
        psi: f64,
        iti: &str,
    ) -> PyResult<bool> {
        let gate = &self.gate;
        let generator = &pose.inner;
        call_kernel(py, || gate.process_claim(generator, claim, psi, iti))?
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    #[getter]
    fn psi_floor(&self) -> f64 {
        self.gate.psi_floor()
    }

    #[getter]
    fn engine(&self, py: Python<'_>) -> PyObject {
        self.engine.clone_ref(py)
    }
}

// ─── Module Registration ────────────────────────────────────────────

/// PoSE-PQC — Rust-accelerated evidence generation for MatVerse pipelines.
///
/// - `PoseConfig` — configuration
/// - `PoSEPQC` — threshold-gated evidence generator
/// - `OmegaIntegration` — floor-gated forwarding to a coherence engine
/// - `Evidence` — immutable signed evidence note
#[pymodule]
fn pose_pqc(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPoseConfig>()?;
    m.add_class::<PyEvidence>()?;
    m.add_class::<PyPoseGenerator>()?;
    m.add_class::<PyOmegaIntegration>()?;
    Ok(())
}
