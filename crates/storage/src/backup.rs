//! Backup/restore snapshot format: a single `snapshot.json` file wrapped in
//! a gzip-compressed tar archive, mirroring the shape operators expect from
//! a Consul snapshot.

use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::{ExportedData, Result, StorageError};

const SNAPSHOT_ENTRY: &str = "snapshot.json";

pub fn export_tar_gz(dest: &Path, data: &ExportedData) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let json = serde_json::to_vec_pretty(data)?;
    let mut header = tar::Header::new_gnu();
    header.set_size(json.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, SNAPSHOT_ENTRY, json.as_slice())
        .map_err(|e| StorageError::Backup {
            reason: e.to_string(),
        })?;

    builder.finish().map_err(|e| StorageError::Backup {
        reason: e.to_string(),
    })
}

pub fn import_tar_gz(src: &Path) -> Result<ExportedData> {
    let file = std::fs::File::open(src)?;
    let decoder = GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries().map_err(|e| StorageError::Restore {
        reason: e.to_string(),
    })? {
        let mut entry = entry.map_err(|e| StorageError::Restore {
            reason: e.to_string(),
        })?;
        let path = entry.path().map_err(|e| StorageError::Restore {
            reason: e.to_string(),
        })?;
        if path.to_string_lossy() == SNAPSHOT_ENTRY {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            return Ok(serde_json::from_slice(&buf)?);
        }
    }

    Err(StorageError::Restore {
        reason: format!("archive at '{}' has no {SNAPSHOT_ENTRY} entry", src.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use konsul_domain::model::KvEntry;

    #[test]
    fn roundtrips_through_a_real_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.tar.gz");
        let data = ExportedData {
            kv: vec![KvEntry {
                key: "a".into(),
                value: b"b".to_vec(),
                version: 1,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            }],
            services: Vec::new(),
        };
        export_tar_gz(&path, &data).unwrap();
        let restored = import_tar_gz(&path).unwrap();
        assert_eq!(restored.kv.len(), 1);
        assert_eq!(restored.kv[0].key, "a");
    }

    #[test]
    fn missing_snapshot_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.tar.gz");
        let file = std::fs::File::create(&path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        tar::Builder::new(encoder).finish().unwrap();

        let err = import_tar_gz(&path).unwrap_err();
        assert!(matches!(err, StorageError::Restore { .. }));
    }
}
