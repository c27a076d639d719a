//! In-memory matrix store.
//!
//! Holds matrices keyed by name, layer label and wavelength index. Useful for
//! tests and for solvers that run in-process instead of writing files.

use std::collections::HashMap;

use num_complex::Complex64;

use super::MatrixStore;
use crate::scattering::ScatteringError;
use crate::types::{Layer, MatrixName, ScatteringMatrix};

#[derive(Debug, Clone, Default)]
pub struct InMemoryMatrixStore {
    matrices: HashMap<(MatrixName, usize, usize), ScatteringMatrix>,
    k_perp: HashMap<(usize, usize), Vec<Complex64>>,
}

impl InMemoryMatrixStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a matrix for layer `label` at a 1-based wavelength index.
    /// Dimensions are checked on load, against the requesting layer.
    pub fn insert(&mut self, name: MatrixName, label: usize, wavelength_index: usize, matrix: ScatteringMatrix) {
        self.matrices.insert((name, label, wavelength_index), matrix);
    }

    pub fn insert_k_perp(&mut self, label: usize, wavelength_index: usize, k_perp: Vec<Complex64>) {
        self.k_perp.insert((label, wavelength_index), k_perp);
    }

    fn missing(name: MatrixName, layer: &Layer, wavelength_index: usize) -> ScatteringError {
        ScatteringError::MissingData {
            matrix: name,
            layer: layer.name().to_string(),
            wavelength_index,
            location: "in-memory store".into(),
        }
    }
}

impl MatrixStore for InMemoryMatrixStore {
    fn load(
        &self,
        name: MatrixName,
        layer: &Layer,
        wavelength_index: usize,
    ) -> Result<ScatteringMatrix, ScatteringError> {
        let matrix = self
            .matrices
            .get(&(name, layer.label(), wavelength_index))
            .ok_or_else(|| Self::missing(name, layer, wavelength_index))?;

        let dim = layer.dim();
        if matrix.dim() != (dim, dim) {
            return Err(ScatteringError::MalformedData {
                matrix: name,
                layer: layer.name().to_string(),
                wavelength_index,
                reason: format!(
                    "matrix is {}x{}, layer declares {}x{}",
                    matrix.nrows(),
                    matrix.ncols(),
                    dim,
                    dim
                ),
            });
        }
        Ok(matrix.clone())
    }

    fn load_k_perp(
        &self,
        layer: &Layer,
        wavelength_index: usize,
    ) -> Result<Vec<Complex64>, ScatteringError> {
        let k = self
            .k_perp
            .get(&(layer.label(), wavelength_index))
            .ok_or_else(|| Self::missing(MatrixName::KPerp, layer, wavelength_index))?;
        if k.len() != layer.nu_tot_ords() {
            return Err(ScatteringError::MalformedData {
                matrix: MatrixName::KPerp,
                layer: layer.name().to_string(),
                wavelength_index,
                reason: format!("{} values, layer declares {} orders", k.len(), layer.nu_tot_ords()),
            });
        }
        Ok(k.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scattering::linalg::identity;

    #[test]
    fn test_dimension_checked_against_layer() {
        let mut store = InMemoryMatrixStore::new();
        store.insert(MatrixName::R21, 7, 1, identity(4));

        let matching = Layer::new("film", 7, 2, 1, 0);
        assert!(store.load(MatrixName::R21, &matching, 1).is_ok());

        let other = Layer::new("film", 7, 3, 1, 0);
        assert!(matches!(
            store.load(MatrixName::R21, &other, 1),
            Err(ScatteringError::MalformedData { .. })
        ));
        assert!(matches!(
            store.load(MatrixName::R21, &matching, 2),
            Err(ScatteringError::MissingData { .. })
        ));
    }
}
