use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const VIDEO_EXTENSIONS: [&str; 11] = [
    "mp4", "mov", "avi", "wmv", "flv", "webm", "mkv", "mpeg", "mpg", "m4v", "3gp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Folder,
    File,
}

/// A projected file or folder.
///
/// Folders never carry `extension`; `total_size`/`file_count` are only ever
/// set on folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
    /// Full object key (folders in prefix form, ending with `/`).
    pub path: String,
    pub size: Option<u64>,
    pub last_modified: Option<OffsetDateTime>,
    pub extension: Option<String>,
    pub is_video: bool,
    pub total_size: Option<u64>,
    pub file_count: Option<u32>,
}

impl Entry {
    pub fn file(
        name: impl Into<String>,
        path: impl Into<String>,
        size: Option<u64>,
        last_modified: Option<OffsetDateTime>,
    ) -> Self {
        let name = name.into();
        let extension = file_extension(&name);
        let is_video = extension.as_deref().is_some_and(is_video_extension);
        Self {
            name,
            kind: EntryKind::File,
            path: path.into(),
            size,
            last_modified,
            extension,
            is_video,
            total_size: None,
            file_count: None,
        }
    }

    pub fn folder(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Folder,
            path: path.into(),
            size: None,
            last_modified: None,
            extension: None,
            is_video: false,
            total_size: None,
            file_count: None,
        }
    }

    pub fn with_aggregates(mut self, total_size: u64, file_count: u32) -> Self {
        if self.is_folder() {
            self.total_size = Some(total_size);
            self.file_count = Some(file_count);
        }
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Lowercased suffix after the last `.`; `None` for names without one,
/// dotfiles like `.env`, and names ending in a dot.
pub fn file_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(ext))
}

pub fn is_video_name(name: &str) -> bool {
    file_extension(name).is_some_and(|ext| is_video_extension(&ext))
}

/// Accepts RFC 3339 (`2024-07-01T10:00:00Z`) and HTTP-date
/// (`Mon, 01 Jul 2024 10:00:00 GMT`) timestamps.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(parsed);
    }
    httpdate::parse_http_date(value)
        .ok()
        .map(OffsetDateTime::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_classification_is_case_insensitive() {
        assert!(is_video_name("movie.MP4"));
        assert!(is_video_name("clip.mkv"));
        assert!(!is_video_name("doc.pdf"));
        assert!(is_video_name("phone.3GP"));
    }

    #[test]
    fn extension_requires_stem_and_suffix() {
        assert_eq!(file_extension("report.PDF").as_deref(), Some("pdf"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".env"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn file_entries_derive_attributes_and_folders_do_not() {
        let file = Entry::file("movie.MOV", "Media/movie.MOV", Some(10), None);
        assert_eq!(file.extension.as_deref(), Some("mov"));
        assert!(file.is_video);

        let folder = Entry::folder("movie.mp4", "Media/movie.mp4/");
        assert_eq!(folder.extension, None);
        assert!(!folder.is_video);
    }

    #[test]
    fn aggregates_only_attach_to_folders() {
        let file = Entry::file("a.txt", "a.txt", Some(1), None).with_aggregates(5, 5);
        assert_eq!(file.total_size, None);
        let folder = Entry::folder("a", "a/").with_aggregates(5, 2);
        assert_eq!(folder.total_size, Some(5));
        assert_eq!(folder.file_count, Some(2));
    }

    #[test]
    fn parses_rfc3339_and_http_dates() {
        let rfc = parse_timestamp("2024-07-01T10:00:00Z").unwrap();
        let http = parse_timestamp("Mon, 01 Jul 2024 10:00:00 GMT").unwrap();
        assert_eq!(rfc, http);
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
