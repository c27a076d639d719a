//! Propagation matrices across a layer's thickness.
//!
//! Each diffraction order picks up the factor $\exp(i k_{z} h)$ crossing a
//! layer of (period-normalised) height $h$, where $k_z$ is the order's
//! out-of-plane wavevector component. Evanescent orders have complex $k_z$
//! and are attenuated rather than phase shifted.
//!
//! The solver can write the full diagonal matrix `P` itself, or only the
//! per-order $k_z$ values (`beta`); the latter lets one set of interface
//! matrices serve many layer thicknesses.

use ndarray::Array2;
use num_complex::Complex64;

use crate::scattering::ScatteringError;
use crate::store::MatrixStore;
use crate::types::{Layer, MatrixName, ScatteringMatrix};

/// Diagonal propagation matrix from per-order $k_z$ values.
///
/// The factors are repeated for the second polarisation block, so the result
/// is $2N \times 2N$ for $N$ orders.
pub fn from_k_perp(k_perp: &[Complex64], height: f64) -> ScatteringMatrix {
    let n = k_perp.len();
    let mut p = Array2::<Complex64>::zeros((2 * n, 2 * n));
    for (i, &kz) in k_perp.iter().enumerate() {
        let factor = (Complex64::i() * kz * height).exp();
        p[[i, i]] = factor;
        p[[n + i, n + i]] = factor;
    }
    p
}

/// The propagation matrix of `layer` at one wavelength.
///
/// Layers with a declared height are built from their `beta` data, all
/// others use the solver's `P` matrix directly.
pub fn load_propagation<S: MatrixStore + ?Sized>(
    store: &S,
    layer: &Layer,
    wavelength_index: usize,
) -> Result<ScatteringMatrix, ScatteringError> {
    let p = match layer.height() {
        Some(height) => from_k_perp(&store.load_k_perp(layer, wavelength_index)?, height),
        None => store.load(MatrixName::P, layer, wavelength_index)?,
    };

    if p.dim() != (layer.dim(), layer.dim()) {
        return Err(ScatteringError::MalformedData {
            matrix: MatrixName::P,
            layer: layer.name().to_string(),
            wavelength_index,
            reason: format!(
                "propagation matrix is {}x{}, layer declares {}",
                p.nrows(),
                p.ncols(),
                layer.dim()
            ),
        });
    }
    Ok(p)
}
