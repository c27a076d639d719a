//! Reflectance, transmittance and absorptance spectra.
//!
//! Only propagating diffraction orders carry power to the far field, so the
//! scalars are sums over the propagating rows of the incident column of the
//! net matrices, both polarisation blocks included:
//!
//! $$
//! T = \sum_{i \in \text{prop(substrate)}} |T_{net}[i, inc]|^2 + |T_{net}[N + i, inc]|^2
//! $$
//!
//! and likewise for $R$ over the superstrate's propagating orders. The
//! absorptance is never computed independently: $A = 1 - R - T$.

use std::io::Write;
use std::path::Path;

use log::{info, warn};
use rayon::prelude::*;

use crate::scattering::recursion::StackRecursion;
use crate::scattering::ScatteringError;
use crate::store::MatrixStore;
use crate::types::{
    NetScattering, Polarisation, ScatteringMatrix, SkippedWavelength, Spectrum, SpectrumPoint, Stack,
    WavelengthSweep,
};

/// Runs the stack recursion over a sweep and reduces each result to
/// `(R, T, A)`.
pub struct SpectralAggregator<'a, S: MatrixStore + ?Sized> {
    recursion: StackRecursion<'a, S>,
    polarisation: Polarisation,
}

impl<'a, S: MatrixStore + ?Sized> SpectralAggregator<'a, S> {
    pub fn new(stack: &'a Stack, store: &'a S, polarisation: Polarisation) -> Self {
        Self {
            recursion: StackRecursion::new(stack, store),
            polarisation,
        }
    }

    pub fn polarisation(&self) -> Polarisation {
        self.polarisation
    }

    /// Reflectance and transmittance carried by the propagating orders.
    pub fn extract(&self, net: &NetScattering) -> (f64, f64) {
        let stack = self.recursion.stack();
        let substrate = stack.substrate();
        let superstrate = stack.superstrate();
        let n = superstrate.nu_tot_ords();
        let inc = self.polarisation.incident_column(n, superstrate.zero_ord());

        let transmittance = column_power(&net.t_net, substrate.outgoing_orders(), n, inc);
        let reflectance = column_power(&net.r_net, superstrate.outgoing_orders(), n, inc);
        (reflectance, transmittance)
    }

    /// Net matrices and spectrum point at one wavelength.
    pub fn evaluate(
        &self,
        wavelength_index: usize,
        wavelength_nm: f64,
    ) -> Result<(SpectrumPoint, NetScattering), ScatteringError> {
        let net = self.recursion.net_scattering(wavelength_index)?;
        let (reflectance, transmittance) = self.extract(&net);
        let point = SpectrumPoint::new(wavelength_index, wavelength_nm, reflectance, transmittance);
        Ok((point, net))
    }

    /// Spectrum point at one wavelength.
    pub fn point(&self, wavelength_index: usize, wavelength_nm: f64) -> Result<SpectrumPoint, ScatteringError> {
        self.evaluate(wavelength_index, wavelength_nm).map(|(point, _)| point)
    }

    /// Spectrum over a whole sweep.
    pub fn sweep(&self, sweep: &WavelengthSweep) -> Spectrum {
        self.sweep_with(sweep, |_, _| {})
    }

    /// Spectrum over a whole sweep, handing every successful set of net
    /// matrices to `inspect` before it is dropped.
    ///
    /// Wavelengths are evaluated in parallel and collected in sweep order. A
    /// wavelength that fails is logged and recorded as skipped; the rest of
    /// the sweep is unaffected.
    pub fn sweep_with<F>(&self, sweep: &WavelengthSweep, inspect: F) -> Spectrum
    where
        F: Fn(usize, &NetScattering) + Sync,
    {
        let jobs: Vec<(usize, f64)> = sweep.indexed().collect();
        let results: Vec<_> = jobs
            .into_par_iter()
            .map(|(p, wl)| {
                let result = self.evaluate(p, wl).map(|(point, net)| {
                    inspect(p, &net);
                    point
                });
                (p, wl, result)
            })
            .collect();

        let mut spectrum = Spectrum::new();
        for (p, wl, result) in results {
            match result {
                Ok(point) => spectrum.push_point(point),
                Err(e) => {
                    warn!("Skipping λ={:.2} nm (#{}): {}", wl, p, e);
                    spectrum.push_skipped(SkippedWavelength {
                        wavelength_index: p,
                        wavelength_nm: wl,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Sweep finished: {} of {} wavelengths, {} skipped",
            spectrum.points().len(),
            sweep.len(),
            spectrum.skipped().len()
        );
        spectrum
    }
}

/// Power in column `inc` over the given orders of both polarisation blocks.
fn column_power(m: &ScatteringMatrix, orders: impl Iterator<Item = usize>, n: usize, inc: usize) -> f64 {
    orders
        .map(|i| m[[i, inc]].norm_sqr() + m[[n + i, inc]].norm_sqr())
        .sum()
}

fn create(path: &Path) -> Result<std::io::BufWriter<std::fs::File>, ScatteringError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ScatteringError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::File::create(path)
        .map(std::io::BufWriter::new)
        .map_err(|source| ScatteringError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn write_pairs(
    path: &Path,
    spectrum: &Spectrum,
    value: impl Fn(&SpectrumPoint) -> f64,
) -> Result<(), ScatteringError> {
    let mut file = create(path)?;
    let io = |source| ScatteringError::Io {
        path: path.to_path_buf(),
        source,
    };
    for point in spectrum.points() {
        writeln!(file, "{:18.10}{:25.17E}", point.wavelength_nm, value(point)).map_err(io)?;
    }
    file.flush().map_err(io)
}

/// Write `Transmittance.txt`, `Reflectance.txt` and `Absorptance.txt` into
/// `dir`, one fixed-width `(wavelength, value)` line per point in sweep order.
pub fn write_spectrum_files(dir: &Path, spectrum: &Spectrum) -> Result<(), ScatteringError> {
    write_pairs(&dir.join("Transmittance.txt"), spectrum, |p| p.transmittance)?;
    write_pairs(&dir.join("Reflectance.txt"), spectrum, |p| p.reflectance)?;
    write_pairs(&dir.join("Absorptance.txt"), spectrum, |p| p.absorptance)?;
    Ok(())
}

/// Dump a net matrix as `wl<index:04>_<name>.txt` records
/// `row col re im |x|^2`, columns outermost.
pub fn write_net_matrix(
    dir: &Path,
    name: &str,
    wavelength_index: usize,
    matrix: &ScatteringMatrix,
) -> Result<(), ScatteringError> {
    let path = dir.join(format!("wl{:04}_{}.txt", wavelength_index, name));
    let mut file = create(&path)?;
    let io = |source| ScatteringError::Io {
        path: path.clone(),
        source,
    };
    for k in 0..matrix.ncols() {
        for i in 0..matrix.nrows() {
            let x = matrix[[i, k]];
            writeln!(
                file,
                "{:4} {:4} {:25.17E} {:25.17E} {:25.17E}",
                i + 1,
                k + 1,
                x.re,
                x.im,
                x.norm_sqr()
            )
            .map_err(io)?;
        }
    }
    file.flush().map_err(io)
}
