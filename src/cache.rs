//! Output cache for batch runs.
//!
//! Re-running a batch over an unchanged tree should not re-encode anything.
//! The cache remembers, per output file, which source content and which
//! pipeline settings produced it.
//!
//! ## Cache keys
//!
//! Entries are **content-addressed**. A lookup matches on:
//!
//! - **source hash**: SHA-256 of the source bytes. Renaming or moving a
//!   source file does not invalidate its outputs.
//! - **params hash**: SHA-256 of everything else that shapes the output: the
//!   resolved request parameters, the backend kind and the manipulator
//!   chain. Changing any of them re-encodes.
//!
//! A hit also requires the recorded output file to still exist. When the
//! same content is wanted at a different path (source moved), the cached
//! file is copied instead of re-encoded.
//!
//! ## Storage
//!
//! The manifest is JSON at `<output_dir>/.imgpipe-cache.json`. A missing,
//! corrupt or outdated manifest loads as empty. `--no-cache` starts from an
//! empty manifest, so every image is re-encoded and overwritten.

use crate::imaging::BackendKind;
use crate::params::ParameterSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::Path;

const MANIFEST_FILENAME: &str = ".imgpipe-cache.json";

/// Bump to invalidate every existing manifest when keys change meaning.
const MANIFEST_VERSION: u32 = 1;

/// Hashes that produced one output file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    /// Output path (relative to the output dir, `/`-separated) → entry.
    pub entries: BTreeMap<String, CacheEntry>,
    /// Reverse index, rebuilt on load.
    #[serde(skip)]
    by_content: HashMap<CacheEntry, String>,
}

impl CacheManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
            by_content: HashMap::new(),
        }
    }

    /// Load from `output_dir`, or start empty.
    pub fn load(output_dir: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(output_dir.join(MANIFEST_FILENAME)) else {
            return Self::empty();
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(mut manifest) if manifest.version == MANIFEST_VERSION => {
                manifest.by_content = manifest
                    .entries
                    .iter()
                    .map(|(path, entry)| (entry.clone(), path.clone()))
                    .collect();
                manifest
            }
            Ok(_) => {
                tracing::debug!("Cache manifest version changed, starting empty");
                Self::empty()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable cache manifest");
                Self::empty()
            }
        }
    }

    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(output_dir.join(MANIFEST_FILENAME), json)
    }

    /// Output path previously produced from this content, if still on disk.
    pub fn find(&self, entry: &CacheEntry, output_dir: &Path) -> Option<&str> {
        self.by_content
            .get(entry)
            .filter(|path| output_dir.join(path).exists())
            .map(String::as_str)
    }

    /// Record `entry` as the producer of `output_path`.
    ///
    /// An older path for the same content is forgotten, and so is whatever
    /// content `output_path` held before.
    pub fn insert(&mut self, output_path: String, entry: CacheEntry) {
        if let Some(replaced) = self.entries.get(&output_path)
            && *replaced != entry
            && self.by_content.get(replaced) == Some(&output_path)
        {
            self.by_content.remove(replaced);
        }
        if let Some(previous) = self.by_content.get(&entry)
            && *previous != output_path
        {
            self.entries.remove(previous);
        }
        self.by_content.insert(entry.clone(), output_path.clone());
        self.entries.insert(output_path, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn hex(digest: impl AsRef<[u8]>) -> String {
    digest
        .as_ref()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// SHA-256 of source bytes, hex encoded.
pub fn hash_source_bytes(bytes: &[u8]) -> String {
    hex(Sha256::digest(bytes))
}

/// SHA-256 of the settings that shape an output.
///
/// Fields are NUL-separated so adjacent values cannot run together.
pub fn hash_params(params: &ParameterSet, backend: BackendKind, chain: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"backend\0");
    hasher.update(backend.to_string().as_bytes());
    hasher.update(b"\0chain\0");
    for name in chain {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(b"params\0");
    for (key, value) in params.iter() {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\0");
    }
    hex(hasher.finalize())
}

/// How one output was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Already present at the expected path.
    Cached,
    /// Present under another path and copied over.
    Copied,
    /// Run through the pipeline.
    Encoded,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CacheStatus::Cached => "cached",
            CacheStatus::Copied => "copied",
            CacheStatus::Encoded => "encoded",
        })
    }
}

/// Per-run tally of cache outcomes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn record(&mut self, status: CacheStatus) {
        match status {
            CacheStatus::Cached => self.hits += 1,
            CacheStatus::Copied => self.copies += 1,
            CacheStatus::Encoded => self.misses += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.hits, self.copies) {
            (0, 0) => write!(f, "{} encoded", self.misses),
            (_, 0) => write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            ),
            _ => write!(
                f,
                "{} cached, {} copied, {} encoded ({} total)",
                self.hits,
                self.copies,
                self.misses,
                self.total()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entry(source: &str, params: &str) -> CacheEntry {
        CacheEntry {
            source_hash: source.into(),
            params_hash: params.into(),
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    #[test]
    fn find_requires_file_on_disk() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("photos/a.webp".into(), entry("s", "p"));
        assert_eq!(m.find(&entry("s", "p"), tmp.path()), None);

        fs::create_dir_all(tmp.path().join("photos")).unwrap();
        fs::write(tmp.path().join("photos/a.webp"), "data").unwrap();
        assert_eq!(m.find(&entry("s", "p"), tmp.path()), Some("photos/a.webp"));
    }

    #[test]
    fn find_misses_on_either_hash() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("a.png".into(), entry("s", "p"));
        fs::write(tmp.path().join("a.png"), "data").unwrap();

        assert_eq!(m.find(&entry("other", "p"), tmp.path()), None);
        assert_eq!(m.find(&entry("s", "other"), tmp.path()), None);
    }

    #[test]
    fn overwritten_path_no_longer_serves_old_content() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.webp"), "data").unwrap();
        let mut m = CacheManifest::empty();
        m.insert("a.webp".into(), entry("old", "p"));
        m.insert("a.webp".into(), entry("new", "p"));

        assert_eq!(m.find(&entry("old", "p"), tmp.path()), None);
        assert_eq!(m.find(&entry("new", "p"), tmp.path()), Some("a.webp"));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn insert_forgets_previous_path_for_same_content() {
        let mut m = CacheManifest::empty();
        m.insert("old/a.jpg".into(), entry("s", "p"));
        m.insert("new/a.jpg".into(), entry("s", "p"));

        assert_eq!(m.len(), 1);
        assert!(m.entries.contains_key("new/a.jpg"));
    }

    #[test]
    fn distinct_content_at_distinct_paths_coexists() {
        let mut m = CacheManifest::empty();
        m.insert("a.jpg".into(), entry("s1", "p"));
        m.insert("b.jpg".into(), entry("s2", "p"));
        assert_eq!(m.len(), 2);
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[test]
    fn save_and_load_rebuilds_index() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("x.webp".into(), entry("s1", "p1"));
        m.save(tmp.path()).unwrap();
        fs::write(tmp.path().join("x.webp"), "data").unwrap();

        let loaded = CacheManifest::load(tmp.path());
        assert_eq!(loaded.entries["x.webp"], entry("s1", "p1"));
        assert_eq!(loaded.find(&entry("s1", "p1"), tmp.path()), Some("x.webp"));
    }

    #[test]
    fn load_missing_or_corrupt_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheManifest::load(tmp.path()).is_empty());

        fs::write(tmp.path().join(MANIFEST_FILENAME), "{ nope").unwrap();
        assert!(CacheManifest::load(tmp.path()).is_empty());
    }

    #[test]
    fn load_wrong_version_is_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "entries": {{"a.png": {{"source_hash":"s","params_hash":"p"}}}}}}"#,
            MANIFEST_VERSION + 1
        );
        fs::write(tmp.path().join(MANIFEST_FILENAME), json).unwrap();
        assert!(CacheManifest::load(tmp.path()).is_empty());
    }

    // =========================================================================
    // Hashing
    // =========================================================================

    #[test]
    fn source_hash_is_sha256_hex() {
        assert_eq!(
            hash_source_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn params_hash_is_deterministic() {
        let params = ParameterSet::from_query("fm=webp&q=80");
        assert_eq!(
            hash_params(&params, BackendKind::Rust, &["size", "encode"]),
            hash_params(&params, BackendKind::Rust, &["size", "encode"])
        );
    }

    #[test]
    fn params_hash_varies_with_every_input() {
        let params = ParameterSet::from_query("fm=webp&q=80");
        let base = hash_params(&params, BackendKind::Rust, &["size", "encode"]);

        let other_params = ParameterSet::from_query("fm=webp&q=81");
        assert_ne!(base, hash_params(&other_params, BackendKind::Rust, &["size", "encode"]));
        assert_ne!(base, hash_params(&params, BackendKind::Magick, &["size", "encode"]));
        assert_ne!(base, hash_params(&params, BackendKind::Rust, &["encode", "size"]));
    }

    #[test]
    fn params_hash_separates_fields() {
        let a = ParameterSet::from_query("q=12");
        let b = ParameterSet::from_query("q1=2");
        assert_ne!(
            hash_params(&a, BackendKind::Rust, &["encode"]),
            hash_params(&b, BackendKind::Rust, &["encode"])
        );
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn stats_display() {
        let mut s = CacheStats::default();
        s.record(CacheStatus::Encoded);
        s.record(CacheStatus::Encoded);
        assert_eq!(s.to_string(), "2 encoded");

        s.record(CacheStatus::Cached);
        assert_eq!(s.to_string(), "1 cached, 2 encoded (3 total)");

        s.record(CacheStatus::Copied);
        assert_eq!(s.to_string(), "1 cached, 1 copied, 2 encoded (4 total)");
    }
}
