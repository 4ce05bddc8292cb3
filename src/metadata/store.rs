//! Durable metadata persistence with atomic replacement.
//!
//! The whole document is small (a handful of ranges, one connection entry
//! per shard), so persistence is a single pretty-printed JSON file. Every
//! write goes to a scratch file first, is synced, and is then renamed over
//! the live path; on the filesystems this targets, rename is atomic, so a
//! concurrent reader sees either the old document or the new one and never
//! a torn write.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constants::METADATA_TMP_SUFFIX;
use crate::error::Result;
use crate::metadata::{Metadata, MetadataDocument};

/// Loads and atomically replaces the persisted metadata document.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    /// A store over the document at `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current snapshot.
    ///
    /// A missing file is the pre-initiation state and loads as
    /// [`Metadata::empty`]; anything unreadable or invariant-violating is
    /// an error, never a silent empty.
    pub fn load(&self) -> Result<Metadata> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no metadata document; loading empty");
                return Ok(Metadata::empty());
            }
            Err(e) => return Err(e.into()),
        };
        let doc: MetadataDocument = serde_json::from_slice(&raw)?;
        Metadata::from_document(doc)
    }

    /// Atomically replace the persisted document with `metadata`.
    pub fn replace(&self, metadata: &Metadata) -> Result<()> {
        let body = serde_json::to_vec_pretty(&metadata.to_document())?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let scratch = self.scratch_path();
        {
            let mut file = fs::File::create(&scratch)?;
            file.write_all(&body)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&scratch, &self.path)?;
        debug!(
            path = %self.path.display(),
            shards = metadata.registry().len(),
            ranges = metadata.table().len(),
            "metadata document replaced"
        );
        Ok(())
    }

    fn scratch_path(&self) -> PathBuf {
        let mut os: OsString = self.path.as_os_str().to_os_string();
        os.push(".");
        os.push(METADATA_TMP_SUFFIX);
        PathBuf::from(os)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::metadata::{ConnectionDescriptor, PartitionTable, ShardRegistry};
    use crate::types::{HourStamp, Modulus};

    fn store_in(dir: &tempfile::TempDir) -> MetadataStore {
        MetadataStore::new(dir.path().join("metadata.json"))
    }

    fn populated() -> Metadata {
        let table = PartitionTable::initial(HourStamp::new(100), Modulus::new(2).unwrap());
        let mut registry = ShardRegistry::empty();
        for shard in table.shard_ids() {
            registry.insert(shard, ConnectionDescriptor::provisioned(shard, "10.0.0.1"));
        }
        Metadata::new(table, registry).unwrap()
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_replace_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let meta = populated();
        store.replace(&meta).unwrap();
        assert_eq!(store.load().unwrap(), meta);
    }

    #[test]
    fn test_replace_leaves_no_scratch_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.replace(&populated()).unwrap();
        assert!(!dir.path().join("metadata.json.tmp").exists());
        assert!(dir.path().join("metadata.json").exists());
    }

    #[test]
    fn test_replace_overwrites_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.replace(&populated()).unwrap();
        store.replace(&Metadata::empty()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_load_rejects_unparseable_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), b"{ not json").unwrap();
        assert!(matches!(
            store.load().unwrap_err(),
            Error::CorruptMetadata(_)
        ));
    }

    #[test]
    fn test_load_rejects_invariant_violations() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        // Parses fine but the table has a gap between 199 and 300.
        let body = serde_json::json!({
            "Ranges": {"Start": [100, 300], "End": [199, null], "Moduli": [1, 1]},
            "Connections": {
                "r100h0": {"host": "h", "username": "u", "password": "p", "database": "d"},
                "r300h0": {"host": "h", "username": "u", "password": "p", "database": "d"}
            }
        });
        fs::write(store.path(), serde_json::to_vec(&body).unwrap()).unwrap();
        assert!(matches!(
            store.load().unwrap_err(),
            Error::CorruptMetadata(_)
        ));
    }

    #[test]
    fn test_document_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.replace(&populated()).unwrap();
        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\n  \"Ranges\""));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("nested/state/metadata.json"));
        store.replace(&populated()).unwrap();
        assert_eq!(store.load().unwrap(), populated());
    }
}
