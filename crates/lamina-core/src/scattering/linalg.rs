//! Dense complex linear algebra for the scattering recursion.
//!
//! Uses LU decomposition with partial pivoting via `faer` to solve
//! $\mathbf{A}\mathbf{X} = \mathbf{B}$ for a full matrix right-hand side.
//! Explicit inverses are never formed. Matrices live in `ndarray` and are
//! copied into `faer` only for the factorisation.

use faer::linalg::solvers::SpSolver;
use ndarray::Array2;
use num_complex::Complex64;
use thiserror::Error;

/// Smallest accepted ratio between the smallest and largest LU pivot.
///
/// Below this the system is treated as singular; near a resonance the
/// physics genuinely produces such matrices and the caller must hear about it.
pub const SINGULAR_PIVOT_RATIO: f64 = 1e-13;

/// Errors from the dense linear-algebra helpers.
#[derive(Debug, Error, PartialEq)]
pub enum LinAlgError {
    #[error("{dim}x{dim} system is numerically singular (pivot ratio {pivot_ratio:.2e})")]
    Singular { dim: usize, pivot_ratio: f64 },

    #[error("incompatible shapes in {step}: {left:?} and {right:?}")]
    DimensionMismatch {
        step: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },
}

/// The `dim x dim` complex identity.
pub fn identity(dim: usize) -> Array2<Complex64> {
    Array2::from_diag_elem(dim, Complex64::new(1.0, 0.0))
}

/// Matrix product with an explicit shape check instead of a panic.
pub fn matmul(
    a: &Array2<Complex64>,
    b: &Array2<Complex64>,
    step: &'static str,
) -> Result<Array2<Complex64>, LinAlgError> {
    if a.ncols() != b.nrows() {
        return Err(LinAlgError::DimensionMismatch {
            step,
            left: a.dim(),
            right: b.dim(),
        });
    }
    Ok(a.dot(b))
}

/// Check that `m` is square with side `dim`.
pub fn expect_square(
    m: &Array2<Complex64>,
    dim: usize,
    step: &'static str,
) -> Result<(), LinAlgError> {
    if m.nrows() != dim || m.ncols() != dim {
        return Err(LinAlgError::DimensionMismatch {
            step,
            left: (dim, dim),
            right: m.dim(),
        });
    }
    Ok(())
}

/// Solve $\mathbf{A}\mathbf{X} = \mathbf{B}$ by LU decomposition.
///
/// # Arguments
/// * `a` - Square system matrix.
/// * `b` - Right-hand side with as many rows as `a`.
///
/// # Returns
/// The solution $\mathbf{X}$ with the shape of `b`, or
/// [`LinAlgError::Singular`] if the pivots collapse or the solution is not
/// finite.
pub fn solve(
    a: &Array2<Complex64>,
    b: &Array2<Complex64>,
) -> Result<Array2<Complex64>, LinAlgError> {
    let dim = a.nrows();
    if a.ncols() != dim || b.nrows() != dim {
        return Err(LinAlgError::DimensionMismatch {
            step: "linear solve",
            left: a.dim(),
            right: b.dim(),
        });
    }
    let nrhs = b.ncols();

    let faer_mat = faer::Mat::<faer::complex_native::c64>::from_fn(dim, dim, |i, j| {
        let c = a[[i, j]];
        faer::complex_native::c64::new(c.re, c.im)
    });
    let faer_rhs = faer::Mat::<faer::complex_native::c64>::from_fn(dim, nrhs, |i, j| {
        let c = b[[i, j]];
        faer::complex_native::c64::new(c.re, c.im)
    });

    // LU decomposition with partial pivoting
    let lu = faer_mat.partial_piv_lu();

    let u = lu.compute_u();
    let (min_pivot, max_pivot) = (0..dim)
        .map(|i| {
            let p = u.read(i, i);
            Complex64::new(p.re, p.im).norm()
        })
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), p| (lo.min(p), hi.max(p)));
    let pivot_ratio = if max_pivot > 0.0 { min_pivot / max_pivot } else { 0.0 };
    if dim > 0 && !(pivot_ratio >= SINGULAR_PIVOT_RATIO) {
        return Err(LinAlgError::Singular { dim, pivot_ratio });
    }

    let faer_sol = lu.solve(&faer_rhs);

    let mut solution = Array2::<Complex64>::zeros((dim, nrhs));
    for ((i, j), x) in solution.indexed_iter_mut() {
        let c = faer_sol.read(i, j);
        *x = Complex64::new(c.re, c.im);
    }

    if solution.iter().any(|x| !x.re.is_finite() || !x.im.is_finite()) {
        return Err(LinAlgError::Singular { dim, pivot_ratio });
    }

    Ok(solution)
}
