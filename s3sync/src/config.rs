use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::sync::{SyncTarget, SyncTimings};

const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api/";
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_POLL_MS: u64 = 500;
const DEFAULT_REVERT_MS: u64 = 2000;
const DEFAULT_MAX_POLL_FAILURES: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_url: String,
    pub bucket: String,
    pub sync_folder: PathBuf,
    pub cache_ttl: Duration,
    pub timings: SyncTimings,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_url = std::env::var("S3SYNC_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let bucket = std::env::var("S3SYNC_BUCKET")
            .map(|value| value.trim().to_string())
            .unwrap_or_default();
        let sync_folder = match std::env::var("S3SYNC_SYNC_FOLDER") {
            Ok(value) => resolve_sync_folder(value.trim(), dirs::home_dir)?,
            Err(_) => PathBuf::new(),
        };
        let cache_ttl = Duration::from_secs(read_u64_env(
            "S3SYNC_CACHE_TTL_SECS",
            DEFAULT_CACHE_TTL_SECS,
        ));
        let timings = SyncTimings {
            poll_interval: Duration::from_millis(read_u64_env("S3SYNC_POLL_MS", DEFAULT_POLL_MS)),
            revert_delay: Duration::from_millis(read_u64_env(
                "S3SYNC_REVERT_MS",
                DEFAULT_REVERT_MS,
            )),
            max_poll_failures: u32::try_from(read_u64_env(
                "S3SYNC_MAX_POLL_FAILURES",
                DEFAULT_MAX_POLL_FAILURES,
            ))
            .unwrap_or(u32::MAX),
        };

        Ok(Self {
            api_url,
            bucket,
            sync_folder,
            cache_ttl,
            timings,
        })
    }

    pub fn sync_target(&self) -> SyncTarget {
        SyncTarget::new(self.sync_folder.to_string_lossy(), self.bucket.clone())
    }
}

/// Looks up the home directory only when `value` starts with `~`.
fn resolve_sync_folder(
    value: &str,
    home_dir: impl FnOnce() -> Option<PathBuf>,
) -> anyhow::Result<PathBuf> {
    if value != "~" && !value.starts_with("~/") {
        return Ok(PathBuf::from(value));
    }
    let home = home_dir().context("home directory is unavailable")?;
    Ok(expand_with_home(value, &home))
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_with_home_handles_tilde() {
        let home = Path::new("/home/me");
        assert_eq!(expand_with_home("~", home), PathBuf::from("/home/me"));
        assert_eq!(
            expand_with_home("~/Videos", home),
            PathBuf::from("/home/me/Videos")
        );
        assert_eq!(
            expand_with_home("/srv/media", home),
            PathBuf::from("/srv/media")
        );
    }

    #[test]
    fn sync_folder_without_tilde_needs_no_home() {
        let folder = resolve_sync_folder("/srv/media", || None).unwrap();
        assert_eq!(folder, PathBuf::from("/srv/media"));
    }

    #[test]
    fn sync_folder_with_tilde_requires_home() {
        assert!(resolve_sync_folder("~/Videos", || None).is_err());
        let folder =
            resolve_sync_folder("~/Videos", || Some(PathBuf::from("/home/me"))).unwrap();
        assert_eq!(folder, PathBuf::from("/home/me/Videos"));
    }

    #[test]
    fn read_u64_env_falls_back_on_bad_values() {
        // Names are unique to this test so parallel tests do not race.
        unsafe {
            std::env::set_var("S3SYNC_TEST_ZERO", "0");
            std::env::set_var("S3SYNC_TEST_JUNK", "fast");
            std::env::set_var("S3SYNC_TEST_GOOD", " 750 ");
        }
        assert_eq!(read_u64_env("S3SYNC_TEST_ZERO", 5), 5);
        assert_eq!(read_u64_env("S3SYNC_TEST_JUNK", 5), 5);
        assert_eq!(read_u64_env("S3SYNC_TEST_GOOD", 5), 750);
        assert_eq!(read_u64_env("S3SYNC_TEST_MISSING", 5), 5);
    }

    #[test]
    fn sync_target_uses_folder_and_bucket() {
        let config = AppConfig {
            api_url: DEFAULT_API_URL.to_string(),
            bucket: "family-archive".to_string(),
            sync_folder: PathBuf::from("/home/me/Videos"),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            timings: SyncTimings::default(),
        };
        assert_eq!(
            config.sync_target(),
            SyncTarget::new("/home/me/Videos", "family-archive")
        );
    }
}
