//! # Lamina Compute
//!
//! Drives the external eigenmode solver that produces the per-wavelength
//! scattering matrices consumed by `lamina-core`.
//!
//! Each wavelength is an independent solver run. A [`WavelengthDispatcher`]
//! runs them on a fixed-size worker pool through a [`SolverBackend`], and
//! reports which wavelengths completed so the combination step can skip the
//! rest.
//!
//! ## Available backends
//!
//! | Backend | Runs |
//! |---------|------|
//! | [`CommandSolver`] | One OS process per wavelength |

pub mod backend;
pub mod command;
pub mod dispatcher;

pub use backend::{DispatchError, SolverBackend, WavelengthJob};
pub use command::CommandSolver;
pub use dispatcher::{DispatchReport, JobOutcome, WavelengthDispatcher};
