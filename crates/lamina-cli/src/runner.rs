//! Job runner: ties together the solver dispatch, the matrix store and the
//! spectral aggregation.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;

use lamina_compute::{CommandSolver, SolverBackend, WavelengthDispatcher, WavelengthJob};
use lamina_core::spectrum::write_net_matrix;
use lamina_core::store::AvailableWavelengths;
use lamina_core::{FileMatrixStore, MatrixStore, SpectralAggregator, Spectrum, Stack, WavelengthSweep};

use crate::config::{JobConfig, SolverConfig};

/// Run the configured solver for every wavelength of the sweep.
///
/// Returns the indices whose solver run completed.
pub fn dispatch_solver(solver: &SolverConfig, sweep: &WavelengthSweep) -> Result<BTreeSet<usize>> {
    let mut backend = CommandSolver::new(&solver.program, solver.args.clone());
    if let Some(dir) = &solver.working_dir {
        backend = backend.with_working_dir(dir);
    }
    let dispatcher = WavelengthDispatcher::new(solver.max_concurrent)
        .context("Cannot start solver worker pool")?;

    println!(
        "Solver: {} ({} runs, {} at a time)",
        backend.describe(),
        sweep.len(),
        dispatcher.max_concurrent()
    );

    let jobs: Vec<WavelengthJob> = sweep
        .indexed()
        .map(|(index, wl)| WavelengthJob::new(index, wl))
        .collect();
    let report = dispatcher.dispatch(&backend, &jobs);

    for (job, reason) in report.failed() {
        println!("  λ={:.1} nm (#{}) solver failed: {}", job.wavelength_nm, job.index, reason);
    }
    Ok(report.completed())
}

/// Combine the solver output of a job into its spectrum.
///
/// With `dispatch` set and a `[solver]` section present, the solver is run
/// first and wavelengths whose run failed are left out of the spectrum.
pub fn run_job(job: &JobConfig, out_dir: &Path, dispatch: bool) -> Result<Spectrum> {
    let stack = job.build_stack().context("Invalid layer stack")?;
    let sweep = job.build_sweep()?;
    print_stack(&stack);

    let completed = match (&job.solver, dispatch) {
        (Some(solver), true) => Some(dispatch_solver(solver, &sweep)?),
        _ => None,
    };

    let files = FileMatrixStore::new(&job.data.directory);
    println!("Solver output: {}", files.root().display());

    let gated;
    let store: &dyn MatrixStore = match completed {
        Some(indices) => {
            gated = AvailableWavelengths::new(&files, indices);
            &gated
        }
        None => &files,
    };

    let aggregator = SpectralAggregator::new(&stack, store, job.sweep.polarisation);
    println!(
        "Combining {} wavelengths ({:?} incidence)",
        sweep.len(),
        aggregator.polarisation()
    );

    let spectrum = if job.output.save_net_matrices {
        let net_dir = out_dir.join("net");
        aggregator.sweep_with(&sweep, |index, net| {
            let written = write_net_matrix(&net_dir, "Rnet", index, &net.r_net)
                .and_then(|_| write_net_matrix(&net_dir, "Tnet", index, &net.t_net));
            if let Err(e) = written {
                warn!("Could not save net matrices for λ #{}: {}", index, e);
            }
        })
    } else {
        aggregator.sweep(&sweep)
    };

    report_progress(&spectrum);
    Ok(spectrum)
}

fn print_stack(stack: &Stack) {
    println!("Stack: {} layers, {} orders per polarisation", stack.len(), stack.dim() / 2);
    for layer in stack.layers().iter().rev() {
        let extra = match layer.height() {
            Some(h) => format!(", height={}", h),
            None => String::new(),
        };
        println!(
            "  Layer '{}' (st{:04}): {} propagating{}",
            layer.name(),
            layer.label(),
            layer.nu_prop_ords(),
            extra
        );
    }
}

fn report_progress(spectrum: &Spectrum) {
    let points = spectrum.points();
    for (i, p) in points.iter().enumerate() {
        if (i + 1) % 10 == 0 || i == 0 || i == points.len() - 1 {
            println!(
                "  [{}/{}] λ={:.1} nm: R={:.4}, T={:.4}, A={:.4}",
                i + 1,
                points.len(),
                p.wavelength_nm,
                p.reflectance,
                p.transmittance,
                p.absorptance
            );
        }
    }
    for s in spectrum.skipped() {
        println!("  λ={:.1} nm (#{}) skipped: {}", s.wavelength_nm, s.wavelength_index, s.reason);
    }
}

/// Write the spectrum to a CSV file with a metadata header.
pub fn write_spectra_csv(spectrum: &Spectrum, path: &Path, job: &JobConfig) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::io::BufWriter::new(
        std::fs::File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
    );

    // Metadata header
    writeln!(file, "# Lamina stack spectra")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# polarisation: {:?}", job.sweep.polarisation)?;
    for layer in &job.stack.layer {
        writeln!(
            file,
            "# layer '{}': label={}, orders={}, propagating={}, zero_order={}",
            layer.name, layer.label, layer.orders_total, layer.orders_propagating, layer.zero_order
        )?;
    }
    for s in spectrum.skipped() {
        writeln!(file, "# skipped {:.2} nm: {}", s.wavelength_nm, s.reason)?;
    }
    writeln!(file, "#")?;
    writeln!(file, "wavelength_nm,reflectance,transmittance,absorptance")?;

    for p in spectrum.points() {
        writeln!(
            file,
            "{:.4},{:.10e},{:.10e},{:.10e}",
            p.wavelength_nm, p.reflectance, p.transmittance, p.absorptance
        )?;
    }
    file.flush()?;

    println!("Spectra written to: {}", path.display());
    Ok(())
}

/// Write the spectrum, skipped wavelengths included, to a JSON file.
pub fn write_spectra_json(spectrum: &Spectrum, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(spectrum).context("JSON serialisation error")?;
    std::fs::write(path, json)?;

    println!("Spectra (JSON) written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    /// Scalar-times-identity records for every layer and wavelength of a
    /// three-layer stack with two orders per polarisation.
    fn write_fixture(dir: &Path, wavelengths: &[usize]) {
        let layers: [(usize, [f64; 4]); 3] = [
            (1, [0.2, 0.9, -0.2, 0.9]),
            (2, [0.3, 0.8, -0.1, 0.7]),
            (3, [0.1, 0.95, -0.1, 0.95]),
        ];
        let diag = |re: f64, im: f64| -> String {
            let mut out = String::new();
            for k in 1..=4 {
                for i in 1..=4 {
                    let (r, m) = if i == k { (re, im) } else { (0.0, 0.0) };
                    out.push_str(&format!("{:4}{:4}{:25.17E}{:25.17E}\n", i, k, r, m));
                }
            }
            out
        };
        for &wl in wavelengths {
            for (label, values) in layers {
                for (name, v) in ["R12", "T12", "R21", "T21"].iter().zip(values) {
                    let file = format!("st{:04}_wl{:04}_{}.txt", label, wl, name);
                    std::fs::write(dir.join(file), diag(v, 0.0)).unwrap();
                }
            }
            let phase = 0.5_f64 * wl as f64;
            let file = format!("st0002_wl{:04}_P.txt", wl);
            std::fs::write(dir.join(file), diag(phase.cos(), phase.sin())).unwrap();
        }
    }

    fn job_toml(data: &Path, extra: &str) -> String {
        let mut content = format!(
            r#"
[sweep]
wavelengths = {{ values = [800.0, 1600.0] }}

[data]
directory = '{}'
"#,
            data.display()
        );
        for (label, name) in [(1, "substrate"), (2, "grating"), (3, "superstrate")] {
            content.push_str(&format!(
                "\n[[stack.layer]]\nname = \"{}\"\nlabel = {}\norders_total = 2\norders_propagating = 1\nzero_order = 0\n",
                name, label
            ));
        }
        content.push_str(extra);
        content
    }

    #[test]
    fn test_combine_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), &[1, 2]);
        let job = parse_config(&job_toml(dir.path(), "")).unwrap();

        let spectrum = run_job(&job, &dir.path().join("out"), false).unwrap();
        assert_eq!(spectrum.points().len(), 2);
        assert!(spectrum.skipped().is_empty());

        // Same stack as the hand-computed case at wavelength #1, P = exp(0.5i).
        let first = &spectrum.points()[0];
        assert!((first.reflectance - 0.03418317856782141).abs() < 1e-6);
        assert!((first.transmittance - 0.2755047831334835).abs() < 1e-6);
    }

    #[test]
    fn test_missing_files_become_gaps() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), &[2]);
        let job = parse_config(&job_toml(dir.path(), "")).unwrap();

        let spectrum = run_job(&job, &dir.path().join("out"), false).unwrap();
        assert_eq!(spectrum.points().len(), 1);
        assert_eq!(spectrum.points()[0].wavelength_nm, 1600.0);
        assert_eq!(spectrum.skipped()[0].wavelength_index, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_solver_runs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), &[1, 2]);
        let solver = r#"
[solver]
program = "sh"
args = ["-c", "test {wl_index_raw} -eq 2"]
max_concurrent = 2
"#;
        let job = parse_config(&job_toml(dir.path(), solver)).unwrap();

        // Files for #1 exist, but its solver run failed.
        let spectrum = run_job(&job, &dir.path().join("out"), true).unwrap();
        assert_eq!(spectrum.points().len(), 1);
        assert_eq!(spectrum.points()[0].wavelength_index, 2);
        assert!(spectrum.skipped()[0].reason.contains("did not complete"));

        // Without dispatching, everything on disk is used.
        let spectrum = run_job(&job, &dir.path().join("out"), false).unwrap();
        assert_eq!(spectrum.points().len(), 2);
    }

    #[test]
    fn test_outputs_written() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), &[1, 2]);
        let out = dir.path().join("out");
        let job = parse_config(&job_toml(
            dir.path(),
            "\n[output]\nsave_json = true\nsave_net_matrices = true\n",
        ))
        .unwrap();

        let spectrum = run_job(&job, &out, false).unwrap();
        write_spectra_csv(&spectrum, &out.join("spectra.csv"), &job).unwrap();
        write_spectra_json(&spectrum, &out.join("spectra.json")).unwrap();

        let csv = std::fs::read_to_string(out.join("spectra.csv")).unwrap();
        let rows: Vec<&str> = csv.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows[0], "wavelength_nm,reflectance,transmittance,absorptance");
        assert_eq!(rows.len(), 3);
        assert!(rows[1].starts_with("800.0000,"));
        assert!(csv.contains("# layer 'grating': label=2"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("spectra.json")).unwrap()).unwrap();
        assert_eq!(json["points"].as_array().unwrap().len(), 2);

        assert!(out.join("net").join("wl0001_Rnet.txt").exists());
        assert!(out.join("net").join("wl0002_Tnet.txt").exists());
    }

    #[test]
    fn test_invalid_stack_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let content = job_toml(dir.path(), "").replacen("orders_total = 2", "orders_total = 3", 1);
        let job = parse_config(&content).unwrap();
        let err = run_job(&job, dir.path(), false).unwrap_err();
        assert!(format!("{:#}", err).contains("Dimension mismatch"));
    }
}
