//! Matrix store backed by the eigenmode solver's text output.
//!
//! The solver writes one file per layer, wavelength and matrix:
//! ```text
//! st<label:04>_wl<index:04>_<NAME>.txt      e.g. st0002_wl0017_R12.txt
//! ```
//! The 4-digit zero padding is part of the format.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use num_complex::Complex64;

use super::records::{assemble, parse_k_perp, parse_records, RecordError};
use super::MatrixStore;
use crate::scattering::ScatteringError;
use crate::types::{Layer, MatrixName, ScatteringMatrix};

/// Reads solver matrices from a directory of record files.
#[derive(Debug, Clone)]
pub struct FileMatrixStore {
    root: PathBuf,
}

impl FileMatrixStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name of one solver output.
    pub fn file_name(name: MatrixName, label: usize, wavelength_index: usize) -> String {
        format!("st{:04}_wl{:04}_{}.txt", label, wavelength_index, name.as_str())
    }

    pub fn path_for(&self, name: MatrixName, label: usize, wavelength_index: usize) -> PathBuf {
        self.root.join(Self::file_name(name, label, wavelength_index))
    }

    fn read(&self, name: MatrixName, layer: &Layer, wavelength_index: usize) -> Result<String, ScatteringError> {
        let path = self.path_for(name, layer.label(), wavelength_index);
        std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ScatteringError::MissingData {
                    matrix: name,
                    layer: layer.name().to_string(),
                    wavelength_index,
                    location: path.display().to_string(),
                }
            } else {
                ScatteringError::Io { path, source: e }
            }
        })
    }
}

fn malformed(name: MatrixName, layer: &Layer, wavelength_index: usize, e: RecordError) -> ScatteringError {
    ScatteringError::MalformedData {
        matrix: name,
        layer: layer.name().to_string(),
        wavelength_index,
        reason: e.to_string(),
    }
}

impl MatrixStore for FileMatrixStore {
    fn load(
        &self,
        name: MatrixName,
        layer: &Layer,
        wavelength_index: usize,
    ) -> Result<ScatteringMatrix, ScatteringError> {
        let content = self.read(name, layer, wavelength_index)?;
        parse_records(&content)
            .and_then(|records| assemble(&records, layer.dim()))
            .map_err(|e| malformed(name, layer, wavelength_index, e))
    }

    fn load_k_perp(
        &self,
        layer: &Layer,
        wavelength_index: usize,
    ) -> Result<Vec<Complex64>, ScatteringError> {
        let content = self.read(MatrixName::KPerp, layer, wavelength_index)?;
        parse_k_perp(&content, layer.nu_tot_ords())
            .map_err(|e| malformed(MatrixName::KPerp, layer, wavelength_index, e))
    }
}
