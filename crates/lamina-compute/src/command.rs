//! Solver backend that runs an external program per wavelength.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use crate::backend::{DispatchError, SolverBackend, WavelengthJob};

/// Runs `program args...` once per wavelength.
///
/// Arguments may contain placeholders that are filled in per job:
///
/// | Placeholder | Replaced with |
/// |-------------|---------------|
/// | `{wl_index}` | 1-based sweep index, zero padded to 4 digits |
/// | `{wl_index_raw}` | 1-based sweep index, unpadded |
/// | `{wavelength}` | Wavelength in nm |
#[derive(Debug, Clone)]
pub struct CommandSolver {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandSolver {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    /// Run the solver from `dir` instead of the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The argument list for one job, placeholders substituted.
    pub fn render_args(&self, job: &WavelengthJob) -> Vec<String> {
        let padded = format!("{:04}", job.index);
        let raw = job.index.to_string();
        let wavelength = job.wavelength_nm.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{wl_index_raw}", &raw)
                    .replace("{wl_index}", &padded)
                    .replace("{wavelength}", &wavelength)
            })
            .collect()
    }
}

impl SolverBackend for CommandSolver {
    fn describe(&self) -> String {
        format!("{} {}", self.program.display(), self.args.join(" "))
    }

    fn solve(&self, job: &WavelengthJob) -> Result<(), DispatchError> {
        let args = self.render_args(job);
        debug!("λ #{}: {} {}", job.index, self.program.display(), args.join(" "));

        let mut command = Command::new(&self.program);
        command.args(&args).stdin(Stdio::null());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|source| DispatchError::Spawn {
            index: job.index,
            source,
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let status = match stderr.trim().lines().last() {
            Some(last) => format!("{} ({})", output.status, last),
            None => output.status.to_string(),
        };
        Err(DispatchError::SolverFailed {
            index: job.index,
            status,
        })
    }
}
