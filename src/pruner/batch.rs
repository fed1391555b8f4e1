//! Sequential prune runs over several roots.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use crate::core::config::Config;
use crate::core::errors::PruneError;
use crate::logger::EventSink;
use crate::pruner::run::{PruneRun, RunOutcome};

/// Result of one root within a batch.
#[derive(Debug)]
pub struct RootResult {
    /// Root as resolved by the run.
    pub root: PathBuf,
    pub outcome: Result<RunOutcome, PruneError>,
}

/// Outcomes of every root the batch reached, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<RootResult>,
    /// Roots never attempted because an earlier root failed fatally.
    pub not_attempted: Vec<PathBuf>,
}

impl BatchReport {
    #[must_use]
    pub fn files_deleted(&self) -> usize {
        self.successes().map(RunOutcome::files_deleted).sum()
    }

    #[must_use]
    pub fn bytes_freed(&self) -> u64 {
        self.successes().map(RunOutcome::bytes_freed).sum()
    }

    /// Roots whose run returned an error.
    pub fn failed(&self) -> impl Iterator<Item = (&Path, &PruneError)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            Ok(_) => None,
            Err(err) => Some((r.root.as_path(), err)),
        })
    }

    /// The error that stopped the batch, if any.
    #[must_use]
    pub fn fatal(&self) -> Option<&PruneError> {
        self.failed().map(|(_, err)| err).find(|err| err.is_fatal())
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed().next().is_none()
    }

    fn successes(&self) -> impl Iterator<Item = &RunOutcome> {
        self.results.iter().filter_map(|r| r.outcome.as_ref().ok())
    }
}

/// Run every root in order, one at a time.
///
/// A root that fails traversal is recorded and the batch moves on. A fatal
/// error (access time unreadable under the abort policy) ends the batch.
pub fn run_batch(config: &Config, roots: &[PathBuf], sink: &mut dyn EventSink) -> BatchReport {
    let mut report = BatchReport::default();
    for (idx, root) in roots.iter().enumerate() {
        let mut run = PruneRun::new(root, config);
        let outcome = run.execute(sink);
        let fatal = matches!(&outcome, Err(err) if err.is_fatal());
        report.results.push(RootResult {
            root: run.root().to_path_buf(),
            outcome,
        });
        if fatal {
            report.not_attempted = roots[idx + 1..].to_vec();
            break;
        }
    }
    report
}
