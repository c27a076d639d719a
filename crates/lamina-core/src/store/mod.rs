//! Sources of per-layer, per-wavelength solver matrices.
//!
//! The recursion reads everything through [`MatrixStore`], so it does not
//! care whether the matrices come from the solver's text files
//! ([`FileMatrixStore`]) or are held in memory ([`InMemoryMatrixStore`]).
//!
//! Every implementation returns matrices in the `[outgoing, incoming]`
//! convention and checks them against the dimension the requesting
//! [`Layer`] declares.

pub mod file;
pub mod memory;
pub mod records;

use std::collections::BTreeSet;

use num_complex::Complex64;

use crate::scattering::ScatteringError;
use crate::types::{Layer, MatrixName, ScatteringMatrix};

pub use file::FileMatrixStore;
pub use memory::InMemoryMatrixStore;

/// Read access to the solver output of every layer at every wavelength.
///
/// Implementations must be pure reads: the same request always returns the
/// same matrix.
pub trait MatrixStore: Sync {
    /// Load one named `2N x 2N` matrix of `layer` at a 1-based wavelength
    /// index.
    fn load(
        &self,
        name: MatrixName,
        layer: &Layer,
        wavelength_index: usize,
    ) -> Result<ScatteringMatrix, ScatteringError>;

    /// Load the `N` per-order $k_z$ values of `layer`.
    fn load_k_perp(
        &self,
        layer: &Layer,
        wavelength_index: usize,
    ) -> Result<Vec<Complex64>, ScatteringError>;
}

/// Restricts a store to the wavelengths whose solver run completed.
///
/// Requests for any other wavelength fail with
/// [`ScatteringError::MissingData`] without touching the inner store, so stale
/// files from an earlier run are never mixed into a sweep.
pub struct AvailableWavelengths<'a, S: MatrixStore + ?Sized> {
    inner: &'a S,
    available: BTreeSet<usize>,
}

impl<'a, S: MatrixStore + ?Sized> AvailableWavelengths<'a, S> {
    pub fn new(inner: &'a S, available: impl IntoIterator<Item = usize>) -> Self {
        Self {
            inner,
            available: available.into_iter().collect(),
        }
    }

    fn check(&self, name: MatrixName, layer: &Layer, wavelength_index: usize) -> Result<(), ScatteringError> {
        if self.available.contains(&wavelength_index) {
            Ok(())
        } else {
            Err(ScatteringError::MissingData {
                matrix: name,
                layer: layer.name().to_string(),
                wavelength_index,
                location: "solver run did not complete".into(),
            })
        }
    }
}

impl<S: MatrixStore + ?Sized> MatrixStore for AvailableWavelengths<'_, S> {
    fn load(
        &self,
        name: MatrixName,
        layer: &Layer,
        wavelength_index: usize,
    ) -> Result<ScatteringMatrix, ScatteringError> {
        self.check(name, layer, wavelength_index)?;
        self.inner.load(name, layer, wavelength_index)
    }

    fn load_k_perp(
        &self,
        layer: &Layer,
        wavelength_index: usize,
    ) -> Result<Vec<Complex64>, ScatteringError> {
        self.check(MatrixName::KPerp, layer, wavelength_index)?;
        self.inner.load_k_perp(layer, wavelength_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scattering::linalg::identity;

    #[test]
    fn test_unavailable_wavelength_is_missing() {
        let layer = Layer::new("film", 2, 1, 1, 0);
        let mut inner = InMemoryMatrixStore::new();
        inner.insert(MatrixName::R12, 2, 1, identity(2));
        inner.insert(MatrixName::R12, 2, 2, identity(2));

        let gated = AvailableWavelengths::new(&inner, [2]);
        assert!(gated.load(MatrixName::R12, &layer, 2).is_ok());
        match gated.load(MatrixName::R12, &layer, 1) {
            Err(ScatteringError::MissingData { wavelength_index, .. }) => assert_eq!(wavelength_index, 1),
            other => panic!("Expected MissingData, got {other:?}"),
        }
    }
}
