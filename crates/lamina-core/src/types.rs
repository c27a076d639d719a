//! Core types shared across the Lamina framework.
//!
//! This module defines the data model of a stack calculation: layers and the
//! stack that orders them, the names of the solver matrices, the running net
//! scattering state, and the spectrum containers filled by the sweep.

use std::fmt;

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::scattering::ScatteringError;

/// A dense complex scattering matrix, element `[outgoing, incoming]`.
///
/// For a layer with $N$ diffraction orders the matrix is $2N \times 2N$:
/// indices `0..N` belong to the first polarisation block and `N..2N` to the
/// second.
pub type ScatteringMatrix = Array2<Complex64>;

/// Names of the matrices the eigenmode solver writes for each layer.
///
/// Port "1" is the infinitesimal air gap next to the layer, port "2" the layer
/// medium itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixName {
    /// Reflection in the air gap off the layer.
    R12,
    /// Reflection inside the layer off the air gap.
    R21,
    /// Transmission from the air gap into the layer.
    T12,
    /// Transmission from the layer into the air gap.
    T21,
    /// Diagonal propagation matrix across the layer thickness.
    P,
    /// Per-order out-of-plane wavevector $k_z$ (a vector, written as `beta`).
    KPerp,
}

impl MatrixName {
    /// Tag used in solver output file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixName::R12 => "R12",
            MatrixName::R21 => "R21",
            MatrixName::T12 => "T12",
            MatrixName::T21 => "T21",
            MatrixName::P => "P",
            MatrixName::KPerp => "beta",
        }
    }
}

impl fmt::Display for MatrixName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One layer of the stack, as described to the eigenmode solver.
///
/// Layers are built once and never mutated; the builder methods consume
/// `self`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    label: usize,
    nu_tot_ords: usize,
    nu_prop_ords: usize,
    zero_ord: usize,
    ord_in: Vec<bool>,
    ord_out: Vec<bool>,
    height: Option<f64>,
}

impl Layer {
    /// Create a layer whose propagating orders are the first `nu_prop_ords`.
    ///
    /// # Arguments
    /// * `name` - Human-readable name used in diagnostics.
    /// * `label` - Numeric label of the layer's solver files.
    /// * `nu_tot_ords` - Total number of diffraction orders per polarisation.
    /// * `nu_prop_ords` - Number of propagating orders.
    /// * `zero_ord` - Index of the normally incident (zero) order.
    pub fn new(
        name: impl Into<String>,
        label: usize,
        nu_tot_ords: usize,
        nu_prop_ords: usize,
        zero_ord: usize,
    ) -> Self {
        let propagating: Vec<bool> = (0..nu_tot_ords).map(|i| i < nu_prop_ords).collect();
        Self {
            name: name.into(),
            label,
            nu_tot_ords,
            nu_prop_ords,
            zero_ord,
            ord_in: propagating.clone(),
            ord_out: propagating,
            height: None,
        }
    }

    /// Replace the default in/out order masks.
    pub fn with_order_masks(mut self, ord_in: Vec<bool>, ord_out: Vec<bool>) -> Self {
        self.ord_in = ord_in;
        self.ord_out = ord_out;
        self
    }

    /// Build this layer's propagation matrix from its $k_z$ values and the
    /// given height (normalised by the period) instead of loading `P`.
    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> usize {
        self.label
    }

    pub fn nu_tot_ords(&self) -> usize {
        self.nu_tot_ords
    }

    pub fn nu_prop_ords(&self) -> usize {
        self.nu_prop_ords
    }

    pub fn zero_ord(&self) -> usize {
        self.zero_ord
    }

    pub fn ord_in(&self) -> &[bool] {
        &self.ord_in
    }

    pub fn ord_out(&self) -> &[bool] {
        &self.ord_out
    }

    pub fn height(&self) -> Option<f64> {
        self.height
    }

    /// Dimension of this layer's scattering matrices (both polarisations).
    pub fn dim(&self) -> usize {
        2 * self.nu_tot_ords
    }

    /// Indices of the orders that carry far-field power out through this layer.
    pub fn outgoing_orders(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nu_prop_ords).filter(move |&i| self.ord_out[i])
    }

    fn validate(&self) -> Result<(), ScatteringError> {
        if self.nu_tot_ords == 0 {
            return Err(ScatteringError::InvalidStack(format!(
                "layer '{}' declares no diffraction orders",
                self.name
            )));
        }
        if self.nu_prop_ords > self.nu_tot_ords {
            return Err(ScatteringError::InvalidStack(format!(
                "layer '{}' has {} propagating orders but only {} in total",
                self.name, self.nu_prop_ords, self.nu_tot_ords
            )));
        }
        if self.zero_ord >= self.nu_tot_ords {
            return Err(ScatteringError::InvalidStack(format!(
                "layer '{}': zero order {} is outside 0..{}",
                self.name, self.zero_ord, self.nu_tot_ords
            )));
        }
        if self.ord_in.len() != self.nu_tot_ords || self.ord_out.len() != self.nu_tot_ords {
            return Err(ScatteringError::InvalidStack(format!(
                "layer '{}': order masks must have {} entries (got in={}, out={})",
                self.name,
                self.nu_tot_ords,
                self.ord_in.len(),
                self.ord_out.len()
            )));
        }
        if let Some(h) = self.height {
            if !h.is_finite() || h < 0.0 {
                return Err(ScatteringError::InvalidStack(format!(
                    "layer '{}': height must be finite and non-negative, got {}",
                    self.name, h
                )));
            }
        }
        Ok(())
    }
}

/// An ordered sequence of layers, substrate first and superstrate last.
#[derive(Debug, Clone)]
pub struct Stack {
    layers: Vec<Layer>,
}

impl Stack {
    /// Build a stack, checking that it has at least one interface and that
    /// adjacent layers agree on their diffraction orders.
    pub fn new(layers: Vec<Layer>) -> Result<Self, ScatteringError> {
        if layers.len() < 2 {
            return Err(ScatteringError::InvalidStack(format!(
                "a stack needs at least two layers, got {}",
                layers.len()
            )));
        }
        for layer in &layers {
            layer.validate()?;
        }
        for pair in layers.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if lower.nu_tot_ords != upper.nu_tot_ords {
                return Err(ScatteringError::DimensionMismatch {
                    context: format!(
                        "diffraction orders at interface '{}' / '{}'",
                        lower.name, upper.name
                    ),
                    expected: lower.dim(),
                    found: upper.dim(),
                });
            }
            if lower.zero_ord != upper.zero_ord {
                return Err(ScatteringError::InvalidStack(format!(
                    "zero order differs at interface '{}' / '{}' ({} vs {})",
                    lower.name, upper.name, lower.zero_ord, upper.zero_ord
                )));
            }
        }

        let top = &layers[layers.len() - 1];
        if !top.ord_in[top.zero_ord] {
            return Err(ScatteringError::InvalidStack(format!(
                "superstrate '{}' does not accept light in its zero order {}",
                top.name, top.zero_ord
            )));
        }

        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Always false: a valid stack has at least two layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn substrate(&self) -> &Layer {
        &self.layers[0]
    }

    pub fn superstrate(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    /// Matrix dimension shared by every layer.
    pub fn dim(&self) -> usize {
        self.substrate().dim()
    }

    /// Adjacent `(lower, upper)` layer pairs, substrate upwards.
    pub fn interfaces(&self) -> impl Iterator<Item = (&Layer, &Layer)> + '_ {
        self.layers.windows(2).map(|pair| (&pair[0], &pair[1]))
    }
}

/// The four scattering matrices describing one interface.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceMatrices {
    pub r12: ScatteringMatrix,
    pub t12: ScatteringMatrix,
    pub r21: ScatteringMatrix,
    pub t21: ScatteringMatrix,
}

impl InterfaceMatrices {
    /// Common dimension, if all four matrices are square and agree.
    pub fn dim(&self) -> Option<usize> {
        let n = self.r12.nrows();
        [&self.r12, &self.t12, &self.r21, &self.t21]
            .iter()
            .all(|m| m.nrows() == n && m.ncols() == n)
            .then_some(n)
    }
}

/// Net reflection and transmission of the stack folded so far, as seen from
/// above.
#[derive(Debug, Clone, PartialEq)]
pub struct NetScattering {
    pub r_net: ScatteringMatrix,
    pub t_net: ScatteringMatrix,
}

/// Polarisation of the incident plane wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Polarisation {
    /// Incident in the first polarisation block.
    #[default]
    TE,
    /// Incident in the second polarisation block.
    TM,
}

impl Polarisation {
    /// Column of the net matrices holding the incident zero order.
    pub fn incident_column(&self, nu_tot_ords: usize, zero_ord: usize) -> usize {
        match self {
            Polarisation::TE => zero_ord,
            Polarisation::TM => nu_tot_ords + zero_ord,
        }
    }
}

/// The wavelengths of a sweep, in the order they were generated.
///
/// The solver files of the `p`-th wavelength carry the 1-based index `p`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavelengthSweep {
    wavelengths_nm: Vec<f64>,
}

impl WavelengthSweep {
    /// Use an explicit list of wavelengths, kept in the given order.
    pub fn from_values(wavelengths_nm: Vec<f64>) -> Self {
        Self { wavelengths_nm }
    }

    /// `points` evenly spaced wavelengths from `start` to `end` inclusive.
    pub fn from_range(start: f64, end: f64, points: usize) -> Self {
        let wavelengths_nm = (0..points)
            .map(|i| start + (end - start) * i as f64 / (points.max(2) - 1) as f64)
            .collect();
        Self { wavelengths_nm }
    }

    pub fn len(&self) -> usize {
        self.wavelengths_nm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths_nm.is_empty()
    }

    pub fn wavelengths_nm(&self) -> &[f64] {
        &self.wavelengths_nm
    }

    /// `(wavelength_index, wavelength_nm)` pairs with 1-based indices.
    pub fn indexed(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.wavelengths_nm
            .iter()
            .enumerate()
            .map(|(i, &wl)| (i + 1, wl))
    }
}

/// Reflectance, transmittance and absorptance at one wavelength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumPoint {
    /// 1-based index of the wavelength in the sweep.
    pub wavelength_index: usize,
    /// Wavelength (nm).
    pub wavelength_nm: f64,
    pub reflectance: f64,
    pub transmittance: f64,
    /// Always `1 - reflectance - transmittance`.
    pub absorptance: f64,
}

impl SpectrumPoint {
    pub fn new(wavelength_index: usize, wavelength_nm: f64, reflectance: f64, transmittance: f64) -> Self {
        Self {
            wavelength_index,
            wavelength_nm,
            reflectance,
            transmittance,
            absorptance: 1.0 - reflectance - transmittance,
        }
    }
}

/// A wavelength that produced no spectrum point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedWavelength {
    pub wavelength_index: usize,
    pub wavelength_nm: f64,
    pub reason: String,
}

/// Spectra of one stack over a sweep, in sweep order, with gaps recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    points: Vec<SpectrumPoint>,
    skipped: Vec<SkippedWavelength>,
}

impl Spectrum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_point(&mut self, point: SpectrumPoint) {
        self.points.push(point);
    }

    pub fn push_skipped(&mut self, skipped: SkippedWavelength) {
        self.skipped.push(skipped);
    }

    pub fn points(&self) -> &[SpectrumPoint] {
        &self.points
    }

    pub fn skipped(&self) -> &[SkippedWavelength] {
        &self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn film(name: &str, label: usize, orders: usize) -> Layer {
        Layer::new(name, label, orders, 1, 0)
    }

    #[test]
    fn test_stack_needs_two_layers() {
        let err = Stack::new(vec![film("substrate", 1, 3)]).unwrap_err();
        assert!(matches!(err, ScatteringError::InvalidStack(_)));
    }

    #[test]
    fn test_stack_rejects_order_mismatch() {
        let err = Stack::new(vec![film("substrate", 1, 3), film("grating", 2, 5)]).unwrap_err();
        match err {
            ScatteringError::DimensionMismatch { expected, found, .. } => {
                assert_eq!(expected, 6);
                assert_eq!(found, 10);
            }
            other => panic!("Expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_stack_rejects_zero_order_mismatch() {
        let lower = Layer::new("substrate", 1, 3, 1, 0);
        let upper = Layer::new("superstrate", 2, 3, 1, 1);
        assert!(matches!(
            Stack::new(vec![lower, upper]),
            Err(ScatteringError::InvalidStack(_))
        ));
    }

    #[test]
    fn test_layer_validation() {
        let bad = Layer::new("film", 1, 2, 3, 0);
        assert!(Stack::new(vec![film("substrate", 0, 2), bad]).is_err());

        let masks = Layer::new("film", 1, 2, 1, 0).with_order_masks(vec![true], vec![true, false]);
        assert!(Stack::new(vec![film("substrate", 0, 2), masks]).is_err());

        let closed = Layer::new("superstrate", 1, 2, 1, 0)
            .with_order_masks(vec![false, false], vec![true, false]);
        assert!(Stack::new(vec![film("substrate", 0, 2), closed]).is_err());
    }

    #[test]
    fn test_outgoing_orders_respect_mask() {
        let layer = Layer::new("film", 1, 4, 3, 0)
            .with_order_masks(vec![true; 4], vec![true, false, true, true]);
        let orders: Vec<usize> = layer.outgoing_orders().collect();
        assert_eq!(orders, vec![0, 2]);
    }

    #[test]
    fn test_sweep_range_is_inclusive() {
        let sweep = WavelengthSweep::from_range(400.0, 800.0, 5);
        assert_eq!(sweep.wavelengths_nm(), &[400.0, 500.0, 600.0, 700.0, 800.0]);
        let single = WavelengthSweep::from_range(550.0, 800.0, 1);
        assert_eq!(single.wavelengths_nm(), &[550.0]);
        let indices: Vec<usize> = sweep.indexed().map(|(p, _)| p).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_incident_column() {
        assert_eq!(Polarisation::TE.incident_column(5, 2), 2);
        assert_eq!(Polarisation::TM.incident_column(5, 2), 7);
    }

    #[test]
    fn test_absorptance_is_derived() {
        let p = SpectrumPoint::new(1, 500.0, 0.25, 0.5);
        assert_eq!(p.absorptance, 1.0 - 0.25 - 0.5);
    }
}
