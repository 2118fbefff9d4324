use std::fmt;

/// A logical bucket path with separators collapsed and no leading or
/// trailing `/`. The bucket root is the empty path.
///
/// Every cache and projection lookup goes through this type, so two spellings
/// of the same folder (`"/a//b/"`, `"a/b"`) always meet at one key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    pub fn new(raw: &str) -> Self {
        let joined = raw
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key prefix every child key of this folder starts with: `""` at the
    /// root, `"a/b/"` otherwise.
    pub fn as_prefix(&self) -> String {
        if self.0.is_empty() {
            String::new()
        } else {
            format!("{}/", self.0)
        }
    }

    pub fn parent(&self) -> Option<NormalizedPath> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rsplit_once('/') {
            Some((parent, _)) => Self(parent.to_string()),
            None => Self::root(),
        })
    }

    pub fn join(&self, segment: &str) -> NormalizedPath {
        Self::new(&format!("{}/{}", self.0, segment))
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl From<&str> for NormalizedPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Parent folder of an object key in prefix form (`"a/b/c.txt"` -> `"a/b/"`).
/// Trailing separators on the key are ignored.
pub fn parent_prefix(key: &str) -> String {
    let trimmed = key.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, _)) => NormalizedPath::new(parent).as_prefix(),
        None => String::new(),
    }
}
