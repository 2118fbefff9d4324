use std::collections::HashMap;

use super::entry::Entry;
use super::paths::{NormalizedPath, parent_prefix};

/// Fills `total_size`/`file_count` on folders from the files in `entries`.
pub fn aggregate(entries: &[Entry]) -> Vec<Entry> {
    aggregate_with(entries, entries)
}

/// Fills `total_size`/`file_count` on the folders in `entries` from the file
/// entries in `files`, grouped by immediate parent.
///
/// Values already present on a folder (supplied by the backend or by an
/// earlier pass) are kept, so the function is idempotent. Folders without
/// children get zero.
pub fn aggregate_with<'a>(
    entries: &[Entry],
    files: impl IntoIterator<Item = &'a Entry>,
) -> Vec<Entry> {
    let mut totals: HashMap<String, (u64, u32)> = HashMap::new();
    for file in files.into_iter().filter(|entry| entry.is_file()) {
        let slot = totals.entry(parent_prefix(&file.path)).or_default();
        slot.0 = slot.0.saturating_add(file.size.unwrap_or(0));
        slot.1 = slot.1.saturating_add(1);
    }

    entries
        .iter()
        .map(|entry| {
            if !entry.is_folder() {
                return entry.clone();
            }
            let key = NormalizedPath::new(&entry.path).as_prefix();
            let (total_size, file_count) = totals.get(&key).copied().unwrap_or_default();
            let mut folder = entry.clone();
            folder.total_size = Some(entry.total_size.unwrap_or(total_size));
            folder.file_count = Some(entry.file_count.unwrap_or(file_count));
            folder
        })
        .collect()
}
