//! Run orchestration: the quota gate for one root and the batch over many.

pub mod batch;
pub mod run;

pub use batch::{BatchReport, RootResult, run_batch};
pub use run::{PruneRun, RunOutcome, RunPhase};
