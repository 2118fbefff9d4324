use std::sync::Mutex;
use std::time::Duration;

use s3sync_core::RawStorageKey;
use tokio::sync::watch;

use super::cache::PathCache;
use super::entry::Entry;
use super::paths::NormalizedPath;
use super::service::{ListingError, RemoteListingService};
use super::{ListingInvalidator, build_listing};

/// What the folder view currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingSnapshot {
    pub path: NormalizedPath,
    pub entries: Vec<Entry>,
    pub loading: bool,
    pub error: Option<String>,
    /// Cached listings were dropped after this snapshot was produced; the
    /// owner should call [`ListingView::refresh`].
    pub stale: bool,
}

/// An issued fetch. Hand it back to [`ListingView::complete`] with the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    path: NormalizedPath,
    bucket: String,
    epoch: u64,
    seq: u64,
}

impl FetchTicket {
    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Cached(Vec<Entry>),
    Fetch(FetchTicket),
}

struct ViewState {
    cache: PathCache,
    path: NormalizedPath,
    bucket: String,
    /// Bumped by every invalidation; results fetched under an older epoch are
    /// neither cached nor shown as fresh.
    epoch: u64,
    /// Sequence number of the most recently issued fetch.
    last_issued: u64,
}

pub struct ListingView {
    service: RemoteListingService,
    state: Mutex<ViewState>,
    snapshot_tx: watch::Sender<ListingSnapshot>,
}

impl ListingView {
    pub fn new(service: RemoteListingService, bucket: impl Into<String>, ttl: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(ListingSnapshot::default());
        Self {
            service,
            state: Mutex::new(ViewState {
                cache: PathCache::new(ttl),
                path: NormalizedPath::root(),
                bucket: bucket.into(),
                epoch: 0,
                last_issued: 0,
            }),
            snapshot_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ListingSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> ListingSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn current_path(&self) -> NormalizedPath {
        self.lock().path.clone()
    }

    pub fn bucket(&self) -> String {
        self.lock().bucket.clone()
    }

    /// Shows `path`, from cache when fresh, otherwise by fetching it.
    pub async fn navigate(&self, path: &str) -> ListingSnapshot {
        if let Lookup::Fetch(ticket) = self.begin(path) {
            self.run_fetch(ticket).await;
        }
        self.snapshot()
    }

    /// Refetches the current path, bypassing the cache.
    pub async fn refresh(&self) -> ListingSnapshot {
        let ticket = {
            let mut state = self.lock();
            let path = state.path.clone();
            self.issue(&mut state, path)
        };
        self.run_fetch(ticket).await;
        self.snapshot()
    }

    /// Makes `path` the current query path and either serves it from cache
    /// or returns the ticket for a fetch the caller must run.
    pub fn begin(&self, path: &str) -> Lookup {
        let path = NormalizedPath::new(path);
        let mut state = self.lock();
        state.path = path.clone();
        if let Some(entries) = state.cache.get(&path) {
            tracing::debug!(path = %path, "listing served from cache");
            self.snapshot_tx.send_replace(ListingSnapshot {
                path,
                entries: entries.clone(),
                ..ListingSnapshot::default()
            });
            return Lookup::Cached(entries);
        }
        Lookup::Fetch(self.issue(&mut state, path))
    }

    /// Applies a fetch result. Returns `false` when the result was discarded
    /// because the view moved to another path or bucket, or the cache was
    /// invalidated while the fetch was in flight. In the last two cases a
    /// view still on the same path stops loading and is marked stale.
    pub fn complete(
        &self,
        ticket: FetchTicket,
        result: Result<Vec<RawStorageKey>, ListingError>,
    ) -> bool {
        let listing = result.map(|raw| build_listing(&raw, &ticket.path));
        let mut state = self.lock();
        if ticket.epoch != state.epoch || ticket.bucket != state.bucket {
            tracing::debug!(path = %ticket.path, "discarding listing fetched before invalidation");
            if ticket.path == state.path && ticket.seq == state.last_issued {
                let entries = match listing {
                    Ok(entries) if ticket.bucket == state.bucket => entries,
                    _ => Vec::new(),
                };
                self.snapshot_tx.send_replace(ListingSnapshot {
                    path: ticket.path,
                    entries,
                    stale: true,
                    ..ListingSnapshot::default()
                });
            }
            return false;
        }
        if let Ok(entries) = &listing {
            state.cache.set(ticket.path.clone(), entries.clone());
        }
        if ticket.path != state.path {
            tracing::debug!(
                path = %ticket.path,
                current = %state.path,
                "discarding listing for superseded path"
            );
            return false;
        }

        let snapshot = match listing {
            Ok(entries) => ListingSnapshot {
                path: ticket.path,
                entries,
                ..ListingSnapshot::default()
            },
            Err(err) => {
                tracing::warn!(path = %ticket.path, error = %err, "listing failed");
                ListingSnapshot {
                    path: ticket.path,
                    error: Some(err.to_string()),
                    ..ListingSnapshot::default()
                }
            }
        };
        self.snapshot_tx.send_replace(snapshot);
        true
    }

    /// Switches bucket. Every cached listing belongs to the old bucket, so
    /// all of them are dropped.
    pub fn set_bucket(&self, bucket: impl Into<String>) {
        let bucket = bucket.into();
        let mut state = self.lock();
        if state.bucket == bucket {
            return;
        }
        tracing::info!(bucket = %bucket, "bucket changed");
        state.bucket = bucket;
        self.drop_listings(&mut state);
    }

    pub fn invalidate(&self, path: &str) {
        self.lock().cache.invalidate(&NormalizedPath::new(path));
    }

    async fn run_fetch(&self, ticket: FetchTicket) {
        let result = self.service.fetch(&ticket.path, &ticket.bucket).await;
        self.complete(ticket, result);
    }

    fn issue(&self, state: &mut ViewState, path: NormalizedPath) -> FetchTicket {
        let previous = self.snapshot_tx.borrow().clone();
        let entries = if previous.path == path {
            previous.entries
        } else {
            Vec::new()
        };
        self.snapshot_tx.send_replace(ListingSnapshot {
            path: path.clone(),
            entries,
            loading: true,
            ..ListingSnapshot::default()
        });
        state.last_issued += 1;
        FetchTicket {
            path,
            bucket: state.bucket.clone(),
            epoch: state.epoch,
            seq: state.last_issued,
        }
    }

    fn drop_listings(&self, state: &mut ViewState) {
        state.cache.invalidate_all();
        state.epoch += 1;
        self.snapshot_tx.send_modify(|snapshot| snapshot.stale = true);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ViewState> {
        self.state.lock().expect("listing view lock poisoned")
    }
}

impl ListingInvalidator for ListingView {
    fn invalidate_all(&self) {
        let mut state = self.lock();
        tracing::info!(epoch = state.epoch + 1, "cached listings invalidated");
        self.drop_listings(&mut state);
    }
}

#[cfg(test)]
#[path = "view_tests.rs"]
mod tests;
