pub mod aggregate;
pub mod cache;
pub mod entry;
pub mod paths;
pub mod projector;
pub mod service;
pub mod view;

pub use cache::PathCache;
pub use entry::{Entry, EntryKind};
pub use paths::NormalizedPath;
pub use service::{ListingError, RemoteListingService};
pub use view::{FetchTicket, ListingSnapshot, ListingView, Lookup};

use s3sync_core::RawStorageKey;

/// Drops cached listings once the backing bucket is known to have changed.
pub trait ListingInvalidator: Send + Sync {
    fn invalidate_all(&self);
}

/// Projects a raw listing for `query` and fills in folder aggregates the
/// backend did not supply.
pub fn build_listing(raw: &[RawStorageKey], query: &NormalizedPath) -> Vec<Entry> {
    let projection = projector::project_detailed(raw, query);
    aggregate::aggregate_with(
        &projection.entries,
        projection
            .entries
            .iter()
            .chain(projection.nested_files.iter()),
    )
}
