mod client;
mod types;

pub use client::{BackendClient, BackendError};
pub use types::{
    ListFilesResponse, ObjectType, RawStorageKey, StreamLink, SyncAck, SyncDetails, SyncMessage,
    SyncStatus,
};
