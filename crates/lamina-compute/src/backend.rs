//! Solver backend trait and job description.
//!
//! The [`SolverBackend`] trait isolates the dispatcher from how a solver is
//! actually run (external process, in-process library, remote queue).

use thiserror::Error;

/// Errors originating from solver dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Worker pool needs at least one slot, got {0}")]
    InvalidPoolSize(usize),

    #[error("Failed to launch solver for wavelength #{index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Solver failed for wavelength #{index}: {status}")]
    SolverFailed { index: usize, status: String },

    #[error("Worker pool error: {0}")]
    Pool(String),
}

/// One solver run: a single wavelength of the sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavelengthJob {
    /// 1-based position in the sweep, used in the solver's file names.
    pub index: usize,
    pub wavelength_nm: f64,
}

impl WavelengthJob {
    pub fn new(index: usize, wavelength_nm: f64) -> Self {
        Self { index, wavelength_nm }
    }
}

/// Abstraction over ways of running the eigenmode solver.
///
/// `solve` must leave the job's matrices in the data directory when it
/// returns `Ok`. It is called concurrently from the dispatcher's workers.
pub trait SolverBackend: Send + Sync {
    /// Human-readable description, for progress output.
    fn describe(&self) -> String;

    /// Run the solver for one wavelength, blocking until it finishes.
    fn solve(&self, job: &WavelengthJob) -> Result<(), DispatchError>;
}
