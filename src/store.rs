//! Process-scoped asset storage with wall-clock TTL.
//!
//! Every pipeline invocation persists its artifacts (extracted images, page
//! previews, JSON snapshots) under `<output_root>/<process_id>/` and hands
//! out URLs of the form
//! `<base>/assets?process_id=<id>&asset_path=<filename>`. A process's
//! directory carries a `_process_meta.json` with `created_at`/`expires_at`
//! timestamps (UTC, ISO-8601, `Z` suffix); [`AssetStore::cleanup_expired`]
//! sweeps expired directories lazily.
//!
//! Concurrency: requests touch only their own process directory, so no
//! locking is needed. A request racing the expiry sweep of its *own*
//! directory observes "not found" — an accepted edge case, no distributed
//! lock is provided.

use crate::error::FacsimileError;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Filename of the per-process TTL metadata file.
pub const PROCESS_META_FILENAME: &str = "_process_meta.json";

/// TTL metadata stored alongside a process's artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessMeta {
    pub process_id: String,
    /// UTC, ISO-8601 with `Z` suffix.
    pub created_at: String,
    pub expires_at: String,
    /// URL template with `{asset_path}` placeholder, for API consumers.
    pub asset_url_template: String,
}

/// Content-addressed, TTL-scoped file storage keyed by process identifier.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    base_url: String,
    ttl_secs: u64,
}

impl AssetStore {
    /// Store rooted at `config.output_root`, serving under
    /// `config.public_base_url`.
    pub fn new(config: &crate::config::PipelineConfig) -> Self {
        Self::from_parts(
            config.output_root.clone(),
            config.public_base_url.clone(),
            config.asset_ttl_secs,
        )
    }

    pub fn from_parts(root: PathBuf, base_url: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl_secs,
        }
    }

    /// Generate a fresh process identifier (random, collision probability
    /// negligible). One per pipeline invocation.
    pub fn new_process_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Directory holding one process's artifacts.
    pub fn process_dir(&self, process_id: &str) -> PathBuf {
        self.root.join(process_id)
    }

    /// Public URL for an asset of the given process.
    pub fn asset_url(&self, process_id: &str, filename: &str) -> String {
        format!(
            "{}/assets?process_id={}&asset_path={}",
            self.base_url,
            urlencoding::encode(process_id),
            urlencoding::encode(filename)
        )
    }

    /// Persist `bytes` under the process directory and return the asset URL.
    ///
    /// The first persist for a process creates its directory and writes the
    /// TTL metadata, anchoring expiry at creation time.
    pub fn persist(
        &self,
        process_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String, FacsimileError> {
        let dir = self.process_dir(process_id);
        std::fs::create_dir_all(&dir).map_err(|e| FacsimileError::PersistFailed {
            filename: filename.to_string(),
            source: e,
        })?;

        if !dir.join(PROCESS_META_FILENAME).exists() {
            self.write_meta(process_id)?;
        }

        let path = dir.join(filename);
        std::fs::write(&path, bytes).map_err(|e| FacsimileError::PersistFailed {
            filename: filename.to_string(),
            source: e,
        })?;
        debug!("Persisted {} bytes → {}", bytes.len(), path.display());

        Ok(self.asset_url(process_id, filename))
    }

    /// Resolve an asset URL to a local file path.
    ///
    /// Returns `Some(path)` iff the URL matches this store's own scheme and
    /// the referenced process exists and has not expired; `None` otherwise
    /// (the caller must fall back to a network fetch).
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        if !is_asset_url(url, &self.base_url) {
            return None;
        }
        let (process_id, asset_name) = parse_asset_url(url)?;
        if self.is_expired(&process_id) {
            debug!("Asset URL references expired process {}", process_id);
            return None;
        }
        let path = self.process_dir(&process_id).join(asset_name);
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }

    /// True when the process's TTL has elapsed. A process with no metadata
    /// is treated as not expired (it is not ours to reap).
    pub fn is_expired(&self, process_id: &str) -> bool {
        let Some(meta) = self.read_meta(process_id) else {
            return false;
        };
        let Some(expires_at) = iso_to_dt(&meta.expires_at) else {
            return false;
        };
        Utc::now() >= expires_at
    }

    /// Delete every expired process directory under the store root.
    ///
    /// Safe to run concurrently with requests operating on *other*
    /// directories; a request racing the expiry of its own directory sees
    /// "not found".
    pub fn cleanup_expired(&self) {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let process_id = entry.file_name().to_string_lossy().to_string();
            if self.is_expired(&process_id) {
                info!("Removing expired process directory {}", path.display());
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }

    fn write_meta(&self, process_id: &str) -> Result<ProcessMeta, FacsimileError> {
        let dir = self.process_dir(process_id);
        let created_at = Utc::now();
        let expires_at = created_at + ChronoDuration::seconds(self.ttl_secs as i64);
        let meta = ProcessMeta {
            process_id: process_id.to_string(),
            created_at: dt_to_iso(created_at),
            expires_at: dt_to_iso(expires_at),
            asset_url_template: self.asset_url(process_id, "{asset_path}"),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| FacsimileError::MetadataFailed {
                dir: dir.clone(),
                detail: e.to_string(),
            })?;
        std::fs::write(dir.join(PROCESS_META_FILENAME), json).map_err(|e| {
            FacsimileError::MetadataFailed {
                dir,
                detail: e.to_string(),
            }
        })?;
        Ok(meta)
    }

    fn read_meta(&self, process_id: &str) -> Option<ProcessMeta> {
        let path = self.process_dir(process_id).join(PROCESS_META_FILENAME);
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// True when `url` points at the asset endpoint of the service rooted at
/// `base_url`.
///
/// An explicit predicate (rather than a method on a global) so callers and
/// tests can exercise it against any base URL. The bare `/assets?` clause
/// catches same-service URLs built against an aliased host.
pub fn is_asset_url(url: &str, base_url: &str) -> bool {
    let base = base_url.trim_end_matches('/');
    (!base.is_empty() && url.starts_with(&format!("{base}/assets"))) || url.contains("/assets?")
}

/// Extract `(process_id, asset_basename)` from an asset URL.
///
/// The asset path is reduced to its basename, so a crafted
/// `asset_path=../../etc/passwd` cannot escape the process directory.
pub fn parse_asset_url(url: &str) -> Option<(String, String)> {
    let parsed = url::Url::parse(url).ok()?;
    let mut process_id = None;
    let mut asset_path = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "process_id" => process_id = Some(value.to_string()),
            "asset_path" => asset_path = Some(value.to_string()),
            _ => {}
        }
    }
    let process_id = process_id.filter(|p| !p.is_empty())?;
    let asset_path = asset_path.filter(|p| !p.is_empty())?;
    let basename = Path::new(&asset_path)
        .file_name()?
        .to_string_lossy()
        .to_string();
    Some((process_id, basename))
}

fn dt_to_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn iso_to_dt(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(ttl_secs: u64) -> (AssetStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::from_parts(dir.path().to_path_buf(), "http://svc:8080", ttl_secs);
        (store, dir)
    }

    #[test]
    fn persist_writes_file_and_meta() {
        let (store, _dir) = store(3600);
        let url = store.persist("proc-1", "a.png", b"bytes").unwrap();
        assert_eq!(
            url,
            "http://svc:8080/assets?process_id=proc-1&asset_path=a.png"
        );
        assert!(store.process_dir("proc-1").join("a.png").is_file());

        let meta_path = store.process_dir("proc-1").join(PROCESS_META_FILENAME);
        let meta: ProcessMeta =
            serde_json::from_slice(&std::fs::read(meta_path).unwrap()).unwrap();
        assert_eq!(meta.process_id, "proc-1");
        assert!(meta.created_at.ends_with('Z'), "got {}", meta.created_at);
        assert!(meta.expires_at.ends_with('Z'));
        assert!(meta.asset_url_template.contains("{asset_path}"));
    }

    #[test]
    fn resolve_round_trips_own_urls() {
        let (store, _dir) = store(3600);
        let url = store.persist("proc-2", "img.png", b"x").unwrap();
        let path = store.resolve(&url).expect("own URL should resolve");
        assert_eq!(path, store.process_dir("proc-2").join("img.png"));
    }

    #[test]
    fn resolve_rejects_foreign_and_missing() {
        let (store, _dir) = store(3600);
        assert!(store.resolve("https://example.com/logo.png").is_none());
        // Matching scheme but no such file.
        let url = store.asset_url("proc-3", "missing.png");
        assert!(store.resolve(&url).is_none());
    }

    #[test]
    fn resolve_strips_path_traversal() {
        let (store, _dir) = store(3600);
        store.persist("proc-4", "safe.png", b"x").unwrap();
        let url = format!(
            "{}/assets?process_id=proc-4&asset_path=..%2Fsafe.png",
            store.base_url()
        );
        // Basename reduction maps ../safe.png to safe.png inside the dir.
        assert_eq!(
            store.resolve(&url).unwrap(),
            store.process_dir("proc-4").join("safe.png")
        );
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let (store, _dir) = store(0);
        let url = store.persist("proc-5", "a.png", b"x").unwrap();
        assert!(store.is_expired("proc-5"));
        assert!(store.resolve(&url).is_none());

        store.cleanup_expired();
        assert!(!store.process_dir("proc-5").exists());
    }

    #[test]
    fn cleanup_keeps_live_processes() {
        let (store, _dir) = store(3600);
        store.persist("proc-6", "a.png", b"x").unwrap();
        store.cleanup_expired();
        assert!(store.process_dir("proc-6").exists());
    }

    #[test]
    fn unknown_process_is_not_expired() {
        let (store, _dir) = store(3600);
        assert!(!store.is_expired("never-created"));
    }

    #[test]
    fn asset_url_predicate_is_base_parameterised() {
        assert!(is_asset_url(
            "http://a:1/assets?process_id=p&asset_path=f",
            "http://a:1"
        ));
        // Trailing slash on the configured base is tolerated.
        assert!(is_asset_url(
            "http://a:1/assets?process_id=p&asset_path=f",
            "http://a:1/"
        ));
        // Aliased host still recognised via the bare /assets? clause.
        assert!(is_asset_url(
            "http://alias:9/assets?process_id=p&asset_path=f",
            "http://a:1"
        ));
        assert!(!is_asset_url("http://a:1/other?x=1", "http://a:1"));
    }

    #[test]
    fn parse_asset_url_extracts_pair() {
        let (pid, name) =
            parse_asset_url("http://a/assets?process_id=p1&asset_path=dir%2Fimg.png").unwrap();
        assert_eq!(pid, "p1");
        assert_eq!(name, "img.png");
        assert!(parse_asset_url("http://a/assets?process_id=&asset_path=f").is_none());
        assert!(parse_asset_url("http://a/assets?asset_path=f").is_none());
    }
}
