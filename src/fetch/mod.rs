//! Fetch Coordination
//!
//! Memory → disk → network resolution with request de-duplication. See
//! [`FetchCoordinator`] for the entry point.

mod coordinator;
mod options;
mod pending;
mod worker;

pub use coordinator::{CacheConfig, FetchCoordinator, ResultStream};
pub use options::{Dispatch, FetchOptions};
pub use pending::{Enqueued, FetchResult, PendingTable, ResultCallback, Waiter};
