//! Bounded worker pool for solver runs.

use std::collections::BTreeSet;

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::backend::{DispatchError, SolverBackend, WavelengthJob};

/// Result of one solver run.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
}

/// Per-job outcomes of a dispatch, in job order.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    outcomes: Vec<(WavelengthJob, JobOutcome)>,
}

impl DispatchReport {
    pub fn outcomes(&self) -> &[(WavelengthJob, JobOutcome)] {
        &self.outcomes
    }

    /// Indices whose matrices the solver finished writing.
    pub fn completed(&self) -> BTreeSet<usize> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == JobOutcome::Completed)
            .map(|(job, _)| job.index)
            .collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&WavelengthJob, &str)> + '_ {
        self.outcomes.iter().filter_map(|(job, outcome)| match outcome {
            JobOutcome::Failed(reason) => Some((job, reason.as_str())),
            JobOutcome::Completed => None,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Runs solver jobs with at most `max_concurrent` in flight.
///
/// Each job blocks one worker thread for its whole run, so the pool size is
/// the bound on concurrent solver processes.
pub struct WavelengthDispatcher {
    pool: ThreadPool,
    max_concurrent: usize,
}

impl WavelengthDispatcher {
    pub fn new(max_concurrent: usize) -> Result<Self, DispatchError> {
        if max_concurrent == 0 {
            return Err(DispatchError::InvalidPoolSize(max_concurrent));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(max_concurrent)
            .thread_name(|i| format!("lamina-solver-{}", i))
            .build()
            .map_err(|e| DispatchError::Pool(e.to_string()))?;
        Ok(Self { pool, max_concurrent })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run `backend` for every job and wait for all of them.
    ///
    /// A failing job is logged and reported; it never stops the others.
    pub fn dispatch<B: SolverBackend + ?Sized>(&self, backend: &B, jobs: &[WavelengthJob]) -> DispatchReport {
        info!(
            "Dispatching {} solver runs ({} at a time): {}",
            jobs.len(),
            self.max_concurrent,
            backend.describe()
        );

        let outcomes: Vec<(WavelengthJob, JobOutcome)> = self.pool.install(|| {
            jobs.par_iter()
                .with_max_len(1)
                .map(|job| {
                    debug!("Solver start: λ #{} ({} nm)", job.index, job.wavelength_nm);
                    let outcome = match backend.solve(job) {
                        Ok(()) => JobOutcome::Completed,
                        Err(e) => {
                            warn!("Solver run failed: {}", e);
                            JobOutcome::Failed(e.to_string())
                        }
                    };
                    (*job, outcome)
                })
                .collect()
        });

        let report = DispatchReport { outcomes };
        info!(
            "Solver runs finished: {} completed, {} failed",
            report.completed().len(),
            report.failed().count()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records the peak number of concurrent `solve` calls and fails the
    /// listed indices.
    struct ProbeSolver {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        fail: Vec<usize>,
    }

    impl ProbeSolver {
        fn new(fail: Vec<usize>) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl SolverBackend for ProbeSolver {
        fn describe(&self) -> String {
            "probe".into()
        }

        fn solve(&self, job: &WavelengthJob) -> Result<(), DispatchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(10));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail.contains(&job.index) {
                Err(DispatchError::SolverFailed {
                    index: job.index,
                    status: "exit status: 1".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn jobs(n: usize) -> Vec<WavelengthJob> {
        (1..=n).map(|i| WavelengthJob::new(i, 300.0 + i as f64)).collect()
    }

    #[test]
    fn test_zero_pool_rejected() {
        assert!(matches!(
            WavelengthDispatcher::new(0),
            Err(DispatchError::InvalidPoolSize(0))
        ));
    }

    #[test]
    fn test_concurrency_bounded() {
        let dispatcher = WavelengthDispatcher::new(2).unwrap();
        let solver = ProbeSolver::new(vec![]);
        let report = dispatcher.dispatch(&solver, &jobs(12));

        assert_eq!(solver.calls.load(Ordering::SeqCst), 12);
        assert!(solver.peak.load(Ordering::SeqCst) <= 2);
        assert!(report.is_complete());
        assert_eq!(report.completed().len(), 12);
    }

    #[test]
    fn test_failures_isolated_and_ordered() {
        let dispatcher = WavelengthDispatcher::new(3).unwrap();
        let solver = ProbeSolver::new(vec![2, 5]);
        let report = dispatcher.dispatch(&solver, &jobs(6));

        let indices: Vec<usize> = report.outcomes().iter().map(|(job, _)| job.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(report.completed(), BTreeSet::from([1, 3, 4, 6]));

        let failed: Vec<usize> = report.failed().map(|(job, _)| job.index).collect();
        assert_eq!(failed, vec![2, 5]);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_empty_dispatch() {
        let dispatcher = WavelengthDispatcher::new(1).unwrap();
        let report = dispatcher.dispatch(&ProbeSolver::new(vec![]), &[]);
        assert!(report.outcomes().is_empty());
        assert!(report.is_complete());
    }
}
