//! # Lamina Core
//!
//! The numerical backbone of the Lamina framework. This crate combines the
//! per-layer scattering matrices produced by an external eigenmode solver into
//! the net reflection and transmission of a whole multilayer stack, and reduces
//! those into reflectance, transmittance and absorptance spectra.
//!
//! ## Architecture
//!
//! Solver output is read through the [`store::MatrixStore`] trait, so the
//! composition engine never sees files directly. Adjacent layers are merged
//! across an infinitesimal air gap ([`scattering::airgap`]), the merged
//! interfaces are folded from substrate to superstrate
//! ([`scattering::recursion`]), and [`spectrum::SpectralAggregator`] runs the
//! fold once per wavelength of a sweep.
//!
//! ## Modules
//!
//! - [`types`]: Layers, stacks, matrix names, spectra.
//! - [`store`]: Matrix sources: solver text files and in-memory tables.
//! - [`scattering`]: Dense solves, air-gap merge and the stack recursion.
//! - [`propagation`]: Propagation matrices built from per-order $k_z$.
//! - [`spectrum`]: Spectral extraction and fixed-width spectrum files.

pub mod propagation;
pub mod scattering;
pub mod spectrum;
pub mod store;
pub mod types;

pub use scattering::recursion::StackRecursion;
pub use scattering::ScatteringError;
pub use spectrum::SpectralAggregator;
pub use store::{FileMatrixStore, InMemoryMatrixStore, MatrixStore};
pub use types::{Layer, MatrixName, Polarisation, Spectrum, Stack, WavelengthSweep};
