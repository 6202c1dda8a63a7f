//! Run orchestration and process-level concerns.

pub mod driver;
pub mod signals;

pub use driver::{HarnessDriver, RunOptions, RunOutcome, TeardownGuard};
pub use signals::SignalHandler;
