//! TOML configuration deserialisation for stack jobs.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use lamina_core::{Layer, Polarisation, ScatteringError, Stack, WavelengthSweep};

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub sweep: SweepConfig,
    pub stack: StackConfig,
    /// External solver; without it only existing solver output is combined.
    #[serde(default)]
    pub solver: Option<SolverConfig>,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Wavelengths and incident polarisation.
#[derive(Debug, Deserialize)]
pub struct SweepConfig {
    pub wavelengths: WavelengthSpec,
    /// "TE" or "TM". Default: "TE".
    #[serde(default)]
    pub polarisation: Polarisation,
}

/// Wavelength specification: either a range or explicit list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WavelengthSpec {
    Range { range: [f64; 2], points: usize },
    List { values: Vec<f64> },
}

/// Layers from substrate (first) to superstrate (last).
#[derive(Debug, Deserialize)]
pub struct StackConfig {
    pub layer: Vec<LayerConfig>,
}

/// A single layer of the stack.
#[derive(Debug, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    /// Index used in the solver's `st####_...` file names.
    pub label: usize,
    pub orders_total: usize,
    pub orders_propagating: usize,
    pub zero_order: usize,
    /// Height normalised by the period; when set, `P` is built from the
    /// layer's `beta` files instead of being read.
    #[serde(default)]
    pub height: Option<f64>,
    /// Which orders light may arrive in. Default: the propagating ones.
    #[serde(default)]
    pub incoming_orders: Option<Vec<bool>>,
    /// Which orders count towards R and T. Default: the propagating ones.
    #[serde(default)]
    pub outgoing_orders: Option<Vec<bool>>,
}

impl LayerConfig {
    fn to_layer(&self) -> Layer {
        let mut layer = Layer::new(
            self.name.clone(),
            self.label,
            self.orders_total,
            self.orders_propagating,
            self.zero_order,
        );
        if self.incoming_orders.is_some() || self.outgoing_orders.is_some() {
            let ord_in = self
                .incoming_orders
                .clone()
                .unwrap_or_else(|| layer.ord_in().to_vec());
            let ord_out = self
                .outgoing_orders
                .clone()
                .unwrap_or_else(|| layer.ord_out().to_vec());
            layer = layer.with_order_masks(ord_in, ord_out);
        }
        match self.height {
            Some(h) => layer.with_height(h),
            None => layer,
        }
    }
}

/// External eigenmode solver invocation.
#[derive(Debug, Deserialize)]
pub struct SolverConfig {
    pub program: String,
    /// Arguments; `{wl_index}`, `{wl_index_raw}` and `{wavelength}` are
    /// substituted per run.
    #[serde(default)]
    pub args: Vec<String>,
    /// Solver runs in flight at once (default: available cores).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default)]
    pub working_dir: Option<String>,
}

fn default_max_concurrent() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Where the solver's matrices live.
#[derive(Debug, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub directory: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            directory: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    ".".into()
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Transmittance/Reflectance/Absorptance.txt and spectra.csv (default: true).
    #[serde(default = "default_true")]
    pub save_spectra: bool,
    /// Whether to also save spectra as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
    /// Dump R_net and T_net per wavelength (default: false).
    #[serde(default)]
    pub save_net_matrices: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_spectra: true,
            save_json: false,
            save_net_matrices: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

impl JobConfig {
    /// Build and validate the layer stack.
    pub fn build_stack(&self) -> Result<Stack, ScatteringError> {
        Stack::new(self.stack.layer.iter().map(LayerConfig::to_layer).collect())
    }

    pub fn build_sweep(&self) -> Result<WavelengthSweep> {
        let sweep = match &self.sweep.wavelengths {
            WavelengthSpec::Range { range, points } => {
                if *points == 0 {
                    anyhow::bail!("Wavelength range needs at least one point");
                }
                WavelengthSweep::from_range(range[0], range[1], *points)
            }
            WavelengthSpec::List { values } => {
                if values.is_empty() {
                    anyhow::bail!("Wavelength list is empty");
                }
                WavelengthSweep::from_values(values.clone())
            }
        };
        if let Some(bad) = sweep.wavelengths_nm().iter().find(|wl| !(**wl > 0.0)) {
            anyhow::bail!("Wavelengths must be positive, got {}", bad);
        }
        Ok(sweep)
    }
}

pub fn parse_config(content: &str) -> Result<JobConfig> {
    Ok(toml::from_str(content)?)
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read configuration {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid configuration {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[sweep]
wavelengths = { range = [310.0, 1110.0], points = 5 }

[[stack.layer]]
name = "substrate"
label = 1
orders_total = 5
orders_propagating = 1
zero_order = 0

[[stack.layer]]
name = "superstrate"
label = 2
orders_total = 5
orders_propagating = 1
zero_order = 0
"#;

    #[test]
    fn test_defaults() {
        let job = parse_config(MINIMAL).unwrap();
        assert_eq!(job.sweep.polarisation, Polarisation::TE);
        assert!(job.solver.is_none());
        assert_eq!(job.data.directory, ".");
        assert_eq!(job.output.directory, "./output");
        assert!(job.output.save_spectra);
        assert!(!job.output.save_json);
        assert!(!job.output.save_net_matrices);

        let sweep = job.build_sweep().unwrap();
        assert_eq!(sweep.wavelengths_nm(), &[310.0, 510.0, 710.0, 910.0, 1110.0]);

        let stack = job.build_stack().unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.dim(), 10);
    }

    #[test]
    fn test_full_job() {
        let content = r#"
[sweep]
wavelengths = { values = [500.0, 600.0] }
polarisation = "TM"

[[stack.layer]]
name = "substrate"
label = 1
orders_total = 3
orders_propagating = 1
zero_order = 1
outgoing_orders = [true, true, false]

[[stack.layer]]
name = "grating"
label = 2
orders_total = 3
orders_propagating = 2
zero_order = 1
height = 0.25

[[stack.layer]]
name = "superstrate"
label = 3
orders_total = 3
orders_propagating = 1
zero_order = 1
incoming_orders = [false, true, false]

[solver]
program = "./pcpv"
args = ["{wl_index}", "{wavelength}"]
max_concurrent = 4

[data]
directory = "matrices"

[output]
directory = "results"
save_json = true
save_net_matrices = true
"#;
        let job = parse_config(content).unwrap();
        assert_eq!(job.sweep.polarisation, Polarisation::TM);
        let solver = job.solver.as_ref().unwrap();
        assert_eq!(solver.max_concurrent, 4);
        assert_eq!(solver.args, vec!["{wl_index}", "{wavelength}"]);

        let stack = job.build_stack().unwrap();
        let layers = stack.layers();
        assert_eq!(layers[0].ord_out(), &[true, true, false]);
        assert_eq!(layers[0].ord_in(), &[true, false, false]);
        assert_eq!(layers[1].height(), Some(0.25));
        assert_eq!(layers[2].ord_in(), &[false, true, false]);
    }

    #[test]
    fn test_mismatched_orders_fail_stack_build() {
        let content = MINIMAL.replacen("orders_total = 5", "orders_total = 4", 1);
        let job = parse_config(&content).unwrap();
        assert!(matches!(
            job.build_stack(),
            Err(ScatteringError::DimensionMismatch { expected: 8, found: 10, .. })
        ));
    }

    #[test]
    fn test_zero_order_outside_incoming_mask_rejected() {
        // Without explicit masks only the first `orders_propagating` orders
        // accept light, so a zero order further along is unreachable.
        let content = MINIMAL.replace("zero_order = 0", "zero_order = 2");
        let job = parse_config(&content).unwrap();
        match job.build_stack() {
            Err(ScatteringError::InvalidStack(msg)) => {
                assert!(msg.contains("does not accept light in its zero order 2"), "{msg}")
            }
            other => panic!("Expected InvalidStack, got {other:?}"),
        }

        // An explicit mask that flags the zero order makes it valid.
        // The superstrate is the last table, so appended keys land in it.
        let content = format!("{}incoming_orders = [false, false, true, false, false]\n", content);
        assert!(parse_config(&content).unwrap().build_stack().is_ok());
    }

    #[test]
    fn test_empty_sweep_rejected() {
        let content = MINIMAL.replace("{ range = [310.0, 1110.0], points = 5 }", "{ values = [] }");
        assert!(parse_config(&content).unwrap().build_sweep().is_err());

        let content = MINIMAL.replace("points = 5", "points = 0");
        assert!(parse_config(&content).unwrap().build_sweep().is_err());
    }

    #[test]
    fn test_missing_stack_is_parse_error() {
        assert!(parse_config("[sweep]\nwavelengths = { values = [500.0] }\n").is_err());
    }
}
