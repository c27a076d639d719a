//! Merging two layers across an infinitesimal air gap.
//!
//! The solver describes each layer by its interface with a thin air gap.
//! Two neighbouring layers $A$ and $B$ face each other across such a gap; in
//! the limit of zero gap thickness its propagation phase is the identity and
//! the star product of the two interfaces reduces to
//!
//! $$
//! \mathbf{R} = \mathbf{R}_{10} + \mathbf{T}_{01}\mathbf{R}_{02}
//!   (\mathbf{I} - \mathbf{R}_{01}\mathbf{R}_{02})^{-1}\mathbf{T}_{10},
//! \qquad
//! \mathbf{T} = \mathbf{T}_{02}(\mathbf{I} - \mathbf{R}_{01}\mathbf{R}_{02})^{-1}\mathbf{T}_{10}
//! $$
//!
//! where medium 0 is $A$, medium 1 the gap and medium 2 is $B$.

use super::linalg::{expect_square, identity, matmul, solve, LinAlgError};
use crate::types::{InterfaceMatrices, ScatteringMatrix};

/// Reflection back into the near layer and transmission into the far layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedInterface {
    pub reflection: ScatteringMatrix,
    pub transmission: ScatteringMatrix,
}

/// Merge `near` and `far` across a zero-thickness air gap, for light arriving
/// from inside `near`.
///
/// # Arguments
/// * `near` - Solver matrices of the layer the light starts in ($A$).
/// * `far` - Solver matrices of the layer on the other side of the gap ($B$).
///
/// # Returns
/// The merged reflection (back into $A$) and transmission (into $B$), with
/// the same dimension as the inputs.
pub fn combine_through_air(
    near: &InterfaceMatrices,
    far: &InterfaceMatrices,
) -> Result<MergedInterface, LinAlgError> {
    let r10 = &near.r21;
    let t01 = &near.t12;
    let r01 = &near.r12;
    let t10 = &near.t21;
    let r02 = &far.r12;
    let t02 = &far.t12;

    let dim = r01.nrows();
    expect_square(r01, dim, "R01")?;
    expect_square(r10, dim, "R10")?;
    expect_square(t01, dim, "T01")?;
    expect_square(t10, dim, "T10")?;
    expect_square(r02, dim, "R02")?;
    expect_square(t02, dim, "T02")?;

    let to_invert = identity(dim) - matmul(r01, r02, "R01·R02")?;
    let inverted = solve(&to_invert, t10)?;

    let reflection = r10 + &matmul(&matmul(t01, r02, "T01·R02")?, &inverted, "T01·R02·X")?;
    let transmission = matmul(t02, &inverted, "T02·X")?;

    Ok(MergedInterface {
        reflection,
        transmission,
    })
}

/// Build the four matrices of the interface between `lower` and `upper`.
///
/// `r12`/`t12` describe light travelling up from inside `lower`, `r21`/`t21`
/// light travelling down from inside `upper`. Both directions are merged
/// explicitly; `t21` is not taken as the transpose of `t12`.
pub fn interface_between(
    lower: &InterfaceMatrices,
    upper: &InterfaceMatrices,
) -> Result<InterfaceMatrices, LinAlgError> {
    let upward = combine_through_air(lower, upper)?;
    let downward = combine_through_air(upper, lower)?;
    Ok(InterfaceMatrices {
        r12: upward.reflection,
        t12: upward.transmission,
        r21: downward.reflection,
        t21: downward.transmission,
    })
}
