//! Folding a whole stack into its net scattering matrices.
//!
//! Interfaces are numbered from the substrate: interface $j$ separates layer
//! $j$ from layer $j+1$. The fold starts from the lowest interface,
//! $(\mathbf{R}_{net}, \mathbf{T}_{net}) = (\mathbf{R}_{21}^{(0)}, \mathbf{T}_{21}^{(0)})$,
//! and then absorbs each intermediate layer $i$ with propagation matrix
//! $\mathbf{P}$:
//!
//! $$
//! \mathbf{X} = (\mathbf{I} - \mathbf{R}_{12}^{(i)}\mathbf{P}\mathbf{R}_{net}\mathbf{P})^{-1}\mathbf{T}_{21}^{(i)}
//! $$
//! $$
//! \mathbf{T}_{net}' = \mathbf{T}_{net}\mathbf{P}\mathbf{X}, \qquad
//! \mathbf{R}_{net}' = \mathbf{R}_{21}^{(i)} + \mathbf{T}_{12}^{(i)}\mathbf{P}\mathbf{R}_{net}\mathbf{P}\mathbf{X}
//! $$
//!
//! Each step consumes the previous state and returns a new one; nothing is
//! kept from earlier layers.

use log::debug;

use super::airgap::interface_between;
use super::linalg::{identity, matmul, solve, LinAlgError};
use super::{ScatteringError, Site};
use crate::propagation::load_propagation;
use crate::store::MatrixStore;
use crate::types::{InterfaceMatrices, Layer, MatrixName, NetScattering, ScatteringMatrix, Stack};

/// Folds a [`Stack`] into its [`NetScattering`] one wavelength at a time.
///
/// Holds only borrowed, read-only inputs, so one instance can serve many
/// wavelengths concurrently.
pub struct StackRecursion<'a, S: MatrixStore + ?Sized> {
    stack: &'a Stack,
    store: &'a S,
}

impl<'a, S: MatrixStore + ?Sized> StackRecursion<'a, S> {
    pub fn new(stack: &'a Stack, store: &'a S) -> Self {
        Self { stack, store }
    }

    pub fn stack(&self) -> &Stack {
        self.stack
    }

    /// Net reflection and transmission of the full stack, seen from the
    /// superstrate, at the given 1-based wavelength index.
    pub fn net_scattering(&self, wavelength_index: usize) -> Result<NetScattering, ScatteringError> {
        let layers = self.stack.layers();

        let site = merge_site(wavelength_index, &layers[0], &layers[1]);
        let substrate = self.load_layer(&layers[0], wavelength_index).map_err(|e| site.wrap(e))?;
        let above = self.load_layer(&layers[1], wavelength_index).map_err(|e| site.wrap(e))?;
        let lowest = interface_between(&substrate, &above).map_err(|e| e.at(site))?;

        let seed = NetScattering {
            r_net: lowest.r21,
            t_net: lowest.t21,
        };

        let (state, _) = (1..layers.len() - 1).try_fold(
            (seed, above),
            |(state, current), i| -> Result<_, ScatteringError> {
                let (layer, next_layer) = (&layers[i], &layers[i + 1]);
                let merge = merge_site(wavelength_index, layer, next_layer);
                let fold = Site {
                    operation: "layer fold",
                    ..merge
                };
                let next = self.load_layer(next_layer, wavelength_index).map_err(|e| merge.wrap(e))?;
                let iface = interface_between(&current, &next).map_err(|e| e.at(merge))?;
                let p = load_propagation(self.store, layer, wavelength_index).map_err(|e| fold.wrap(e))?;

                debug!(
                    "wavelength #{}: folding layer '{}' (interface '{}' / '{}')",
                    wavelength_index,
                    layer.name(),
                    layer.name(),
                    next_layer.name()
                );

                let state = fold_layer(state, &iface, &p).map_err(|e| e.at(fold))?;
                Ok((state, next))
            },
        )?;

        Ok(state)
    }

    /// The solver's four interface matrices for one layer.
    fn load_layer(&self, layer: &Layer, wavelength_index: usize) -> Result<InterfaceMatrices, ScatteringError> {
        Ok(InterfaceMatrices {
            r12: self.store.load(MatrixName::R12, layer, wavelength_index)?,
            t12: self.store.load(MatrixName::T12, layer, wavelength_index)?,
            r21: self.store.load(MatrixName::R21, layer, wavelength_index)?,
            t21: self.store.load(MatrixName::T21, layer, wavelength_index)?,
        })
    }
}

fn merge_site<'l>(wavelength_index: usize, lower: &'l Layer, upper: &'l Layer) -> Site<'l> {
    Site {
        wavelength_index,
        lower: lower.name(),
        upper: upper.name(),
        operation: "air-gap merge",
    }
}

/// Absorb one layer (its propagation matrix `p` and the interface above it)
/// into the running net matrices.
pub fn fold_layer(
    state: NetScattering,
    iface: &InterfaceMatrices,
    p: &ScatteringMatrix,
) -> Result<NetScattering, LinAlgError> {
    let NetScattering { r_net, t_net } = state;
    let dim = r_net.nrows();

    let round_trip = matmul(&matmul(p, &r_net, "P·Rnet")?, p, "P·Rnet·P")?;
    let to_invert = identity(dim) - matmul(&iface.r12, &round_trip, "R12·P·Rnet·P")?;
    let inverted = solve(&to_invert, &iface.t21)?;
    let repeated_term = matmul(p, &inverted, "P·X")?;

    let t_net = matmul(&t_net, &repeated_term, "Tnet·P·X")?;
    let bounced = matmul(&matmul(&iface.t12, p, "T12·P")?, &r_net, "T12·P·Rnet")?;
    let r_net = &iface.r21 + &matmul(&bounced, &repeated_term, "T12·P·Rnet·P·X")?;

    Ok(NetScattering { r_net, t_net })
}
