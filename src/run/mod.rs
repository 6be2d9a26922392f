//! Run state: starting, observing, and advising the external executor.

mod bridge;
mod executor;

pub use bridge::{RunEvent, RunStateBridge, META_MAP};
pub use executor::{CancelToken, ExecutorClient, ExecutorError, RunRequest};
