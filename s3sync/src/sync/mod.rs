pub mod machine;
pub mod state;

pub use machine::{SyncError, SyncMachine, SyncTarget, SyncTimings};
pub use state::{ProgressDetail, SyncState};
