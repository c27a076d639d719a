//! Lamina command-line interface.
//!
//! Combine per-layer solver output into stack spectra from TOML job files:
//! ```sh
//! lamina run job.toml
//! lamina combine job.toml -o results/
//! lamina validate job.toml
//! ```

mod config;
mod runner;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use lamina_core::spectrum::write_spectrum_files;
use lamina_core::Spectrum;

use crate::config::JobConfig;

#[derive(Parser)]
#[command(name = "lamina")]
#[command(about = "Lamina: multilayer scattering-matrix stack combination")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured solver for every wavelength, then combine the stack.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Combine solver output that is already on disk.
    Combine {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file and its layer stack.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => execute(&config, output, true),
        Commands::Combine { config, output } => execute(&config, output, false),
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let stack = job.build_stack()?;
            let sweep = job.build_sweep()?;
            println!(
                "Configuration is valid: {} ({} layers, {} wavelengths)",
                config.display(),
                stack.len(),
                sweep.len()
            );
            Ok(())
        }
    }
}

fn execute(config: &Path, output: Option<PathBuf>, dispatch: bool) -> Result<()> {
    println!("Lamina Stack Combiner");
    println!("=====================");
    let job = config::load_config(config)?;
    println!("Configuration: {}", config.display());

    let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
    let spectrum = runner::run_job(&job, &out_dir, dispatch)?;
    write_outputs(&job, &spectrum, &out_dir)?;

    println!(
        "Combination complete: {} wavelengths, {} skipped.",
        spectrum.points().len(),
        spectrum.skipped().len()
    );
    Ok(())
}

fn write_outputs(job: &JobConfig, spectrum: &Spectrum, out_dir: &Path) -> Result<()> {
    // Fixed-width text spectra + CSV (default on)
    if job.output.save_spectra {
        write_spectrum_files(out_dir, spectrum)?;
        println!("Transmittance/Reflectance/Absorptance written to: {}", out_dir.display());
        runner::write_spectra_csv(spectrum, &out_dir.join("spectra.csv"), job)?;
    }

    // JSON spectra (optional)
    if job.output.save_json {
        runner::write_spectra_json(spectrum, &out_dir.join("spectra.json"))?;
    }
    Ok(())
}
