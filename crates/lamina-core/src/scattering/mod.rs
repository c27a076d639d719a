//! Scattering-matrix composition.
//!
//! Adjacent layers are first merged across an infinitesimal air gap
//! ([`airgap`]); the merged interfaces are then folded from the substrate
//! upwards, interleaved with each layer's propagation matrix
//! ([`recursion`]). All inversions go through the LU solves in [`linalg`].
//!
//! # Conventions
//!
//! Every matrix is indexed `[outgoing, incoming]`. For $N$ diffraction orders
//! the first $N$ rows and columns belong to one polarisation and the next $N$
//! to the other. The convention is applied once, when records are read by a
//! [`crate::store::MatrixStore`], and never transposed afterwards.

pub mod airgap;
pub mod linalg;
pub mod recursion;

use std::path::PathBuf;

use thiserror::Error;

use crate::types::MatrixName;
use linalg::LinAlgError;

/// Errors that can occur while building a stack or folding it at one
/// wavelength.
#[derive(Debug, Error)]
pub enum ScatteringError {
    #[error("Missing {matrix} data for layer '{layer}' at wavelength #{wavelength_index} ({location})")]
    MissingData {
        matrix: MatrixName,
        layer: String,
        wavelength_index: usize,
        location: String,
    },

    #[error("Malformed {matrix} data for layer '{layer}' at wavelength #{wavelength_index}: {reason}")]
    MalformedData {
        matrix: MatrixName,
        layer: String,
        wavelength_index: usize,
        reason: String,
    },

    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("Singular matrix in {operation} at wavelength #{wavelength_index}, interface '{lower}' / '{upper}' ({detail})")]
    SingularMatrix {
        wavelength_index: usize,
        lower: String,
        upper: String,
        operation: &'static str,
        detail: String,
    },

    #[error("{operation} at interface '{lower}' / '{upper}': {source}")]
    AtInterface {
        lower: String,
        upper: String,
        operation: &'static str,
        #[source]
        source: Box<ScatteringError>,
    },

    #[error("Invalid stack: {0}")]
    InvalidStack(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where in the stack a linear-algebra step was taken, for error reports.
#[derive(Debug, Clone, Copy)]
pub struct Site<'a> {
    pub wavelength_index: usize,
    pub lower: &'a str,
    pub upper: &'a str,
    pub operation: &'static str,
}

impl Site<'_> {
    /// Attach the interface and operation to a failure raised while loading
    /// their inputs.
    pub fn wrap(self, source: ScatteringError) -> ScatteringError {
        ScatteringError::AtInterface {
            lower: self.lower.to_string(),
            upper: self.upper.to_string(),
            operation: self.operation,
            source: Box::new(source),
        }
    }
}

impl ScatteringError {
    /// The innermost error, below any interface context.
    pub fn root_cause(&self) -> &ScatteringError {
        match self {
            ScatteringError::AtInterface { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl LinAlgError {
    /// Attach the wavelength, interface and operation to a linear-algebra
    /// failure.
    pub fn at(self, site: Site<'_>) -> ScatteringError {
        match self {
            LinAlgError::Singular { .. } => ScatteringError::SingularMatrix {
                wavelength_index: site.wavelength_index,
                lower: site.lower.to_string(),
                upper: site.upper.to_string(),
                operation: site.operation,
                detail: self.to_string(),
            },
            LinAlgError::DimensionMismatch { step, left, right } => {
                // Products disagree on left columns vs right rows; shape
                // checks put the required square in `left`.
                let found = if right.0 != left.1 { right.0 } else { right.1 };
                ScatteringError::DimensionMismatch {
                    context: format!(
                        "{} ({}: {}x{} against {}x{}) at wavelength #{}, interface '{}' / '{}'",
                        site.operation,
                        step,
                        left.0,
                        left.1,
                        right.0,
                        right.1,
                        site.wavelength_index,
                        site.lower,
                        site.upper
                    ),
                    expected: left.1,
                    found,
                }
            }
        }
    }
}
