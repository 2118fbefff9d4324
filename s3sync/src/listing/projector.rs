use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use s3sync_core::RawStorageKey;

use super::entry::{Entry, parse_timestamp};
use super::paths::NormalizedPath;

/// Configuration marker the backend writes into synced buckets.
pub const SYNC_MARKER_FILE: &str = "SynctoS3.bat";

/// Output of projecting one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// Direct children of the query path, folders first.
    pub entries: Vec<Entry>,
    /// Files found below the children (from deep, non-delimited listings).
    /// Not shown, but still counted by folder aggregation.
    pub nested_files: Vec<Entry>,
}

/// Direct children of `query` as [`Entry`] values in display order.
pub fn project(raw: &[RawStorageKey], query: &NormalizedPath) -> Vec<Entry> {
    project_detailed(raw, query).entries
}

pub fn project_detailed(raw: &[RawStorageKey], query: &NormalizedPath) -> Projection {
    let prefix = query.as_prefix();
    let mut folders: Vec<Entry> = Vec::new();
    let mut folder_slots: HashMap<String, usize> = HashMap::new();
    let mut files: Vec<Entry> = Vec::new();
    let mut seen_files: HashSet<&str> = HashSet::new();
    let mut nested_files = Vec::new();

    for key in raw {
        if key.key.is_empty() || is_sync_marker(&key.key) {
            continue;
        }
        let Some(relative) = key.key.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        let Some(first) = segments.first().copied() else {
            // The query folder's own prefix key.
            continue;
        };

        let is_folder = key.is_prefix || segments.len() > 1 || relative.ends_with('/');
        if !is_folder {
            if seen_files.insert(key.key.as_str()) {
                files.push(Entry::file(
                    first,
                    key.key.clone(),
                    key.size,
                    key.last_modified.as_deref().and_then(parse_timestamp),
                ));
            }
            continue;
        }

        if !key.is_prefix && segments.len() > 1 && !relative.ends_with('/') {
            let name = segments.last().copied().unwrap_or(first);
            nested_files.push(Entry::file(
                name,
                key.key.clone(),
                key.size,
                key.last_modified.as_deref().and_then(parse_timestamp),
            ));
        }

        // Aggregates and timestamps only mean something on the folder's own
        // prefix key, not on a deeper key that merely passes through it.
        let is_folder_key = segments.len() == 1;
        match folder_slots.get(first) {
            Some(&slot) => {
                if is_folder_key {
                    absorb_folder_key(&mut folders[slot], key);
                }
            }
            None => {
                let mut folder = Entry::folder(first, format!("{prefix}{first}/"));
                if is_folder_key {
                    absorb_folder_key(&mut folder, key);
                }
                folder_slots.insert(first.to_string(), folders.len());
                folders.push(folder);
            }
        }
    }

    let mut entries = folders;
    entries.extend(files);
    sort_entries(&mut entries);
    Projection {
        entries,
        nested_files,
    }
}

fn absorb_folder_key(folder: &mut Entry, key: &RawStorageKey) {
    if folder.total_size.is_none() {
        folder.total_size = key.total_size;
    }
    if folder.file_count.is_none() {
        folder.file_count = key.file_count;
    }
    if folder.last_modified.is_none() {
        folder.last_modified = key.last_modified.as_deref().and_then(parse_timestamp);
    }
}

pub fn is_sync_marker(key: &str) -> bool {
    key.rsplit('/').next() == Some(SYNC_MARKER_FILE)
}

/// Folders before files, then by name: case-folded first. Names equal up to
/// case put the lowercase spelling first, matching locale collation.
pub fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(compare_entries);
}

fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    b.is_folder()
        .cmp(&a.is_folder())
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        // Equal once folded means a case-only difference: lowercase first.
        .then_with(|| b.name.cmp(&a.name))
}
