//! Full-snapshot persistence of the embedding index.
//!
//! The snapshot is one JSON object mapping each record id to
//! `{ "vector": [...], "metadata": {...} }`. Keys are written in index
//! insertion order and read back in document order, so a reloaded index
//! breaks similarity ties exactly like the one that wrote it.
//!
//! There is no incremental format: every write replaces the whole file
//! (written to a sibling temp file, then renamed over the target).

use std::fmt;
use std::path::{Path, PathBuf};

use kmindex_core::KmResult;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::index::{EmbeddingMetadata, EmbeddingRecord};

#[derive(Serialize)]
struct EntryRef<'a> {
    vector: &'a [f32],
    metadata: &'a EmbeddingMetadata,
}

#[derive(Deserialize)]
struct Entry {
    vector: Vec<f32>,
    metadata: EmbeddingMetadata,
}

struct SnapshotRef<'a>(&'a [EmbeddingRecord]);

impl Serialize for SnapshotRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for record in self.0 {
            map.serialize_entry(
                &record.id,
                &EntryRef {
                    vector: &record.vector,
                    metadata: &record.metadata,
                },
            )?;
        }
        map.end()
    }
}

struct Snapshot(Vec<EmbeddingRecord>);

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> Visitor<'de> for SnapshotVisitor {
            type Value = Snapshot;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of record id to {vector, metadata}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut records = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, entry)) = access.next_entry::<String, Entry>()? {
                    records.push(EmbeddingRecord::new(id, entry.vector, entry.metadata));
                }
                Ok(Snapshot(records))
            }
        }

        deserializer.deserialize_map(SnapshotVisitor)
    }
}

/// Serialize records to snapshot JSON.
pub fn to_json(records: &[EmbeddingRecord]) -> KmResult<Vec<u8>> {
    Ok(serde_json::to_vec(&SnapshotRef(records))?)
}

/// Parse snapshot JSON into records, in document order.
pub fn from_json(bytes: &[u8]) -> KmResult<Vec<EmbeddingRecord>> {
    let snapshot: Snapshot = serde_json::from_slice(bytes)?;
    Ok(snapshot.0)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace the snapshot at `path` with `records`.
pub async fn write_snapshot(path: &Path, records: &[EmbeddingRecord]) -> KmResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let bytes = to_json(records)?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read the snapshot at `path`; `None` if there is none yet.
pub async fn read_snapshot(path: &Path) -> KmResult<Option<Vec<EmbeddingRecord>>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    from_json(&bytes).map(Some)
}
