//! Versioned on-disk format for statistics stores.
//!
//! Layout: the 8-byte magic [`STATS_MAGIC`], a little-endian `u32` format
//! version, then the bincode encoding of the [`StatsStore`]. Files are written
//! to a sibling temporary file and renamed into place.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::errors::{BadcodeError, Result};
use crate::core::stats::StatsStore;

/// Magic prefix of a persisted stats file.
pub const STATS_MAGIC: &[u8; 8] = b"BADCODE\0";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Serialize a store into the versioned format
pub fn encode_stats(store: &StatsStore) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(64);
    write_stats(&mut bytes, store)?;
    Ok(bytes)
}

/// Deserialize a store from the versioned format
pub fn decode_stats(bytes: &[u8]) -> Result<StatsStore> {
    read_stats(bytes)
}

fn write_stats<W: Write>(mut writer: W, store: &StatsStore) -> Result<()> {
    writer.write_all(STATS_MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    bincode::serialize_into(&mut writer, store)?;
    writer.flush()?;
    Ok(())
}

fn read_stats<R: Read>(mut reader: R) -> Result<StatsStore> {
    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .map_err(|e| BadcodeError::io("Stats file is truncated", e))?;
    if &magic != STATS_MAGIC {
        return Err(BadcodeError::serialization(
            "Not a stats file (bad magic)",
            "stats",
        ));
    }

    let mut version = [0u8; 4];
    reader
        .read_exact(&mut version)
        .map_err(|e| BadcodeError::io("Stats file is truncated", e))?;
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(BadcodeError::serialization(
            format!(
                "Unsupported stats format version {} (expected {})",
                version, FORMAT_VERSION
            ),
            "stats",
        ));
    }

    Ok(bincode::deserialize_from(reader)?)
}

/// Save a store atomically
pub fn save_stats(store: &StatsStore, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            BadcodeError::io(
                format!("Failed to create stats directory: {}", parent.display()),
                e,
            )
        })?;
    }

    let temp_path = temp_path_for(path);
    let file = File::create(&temp_path).map_err(|e| {
        BadcodeError::io(
            format!("Failed to write stats file: {}", temp_path.display()),
            e,
        )
    })?;
    write_stats(BufWriter::new(file), store)?;

    fs::rename(&temp_path, path).map_err(|e| {
        BadcodeError::io(
            format!("Failed to rename stats file: {}", path.display()),
            e,
        )
    })?;

    debug!("Saved {} fragments to {}", store.len(), path.display());
    Ok(())
}

/// Load a store
pub fn load_stats(path: &Path) -> Result<StatsStore> {
    let file = File::open(path).map_err(|e| {
        BadcodeError::io(format!("Failed to read stats file: {}", path.display()), e)
    })?;
    let store = read_stats(BufReader::new(file))?;
    debug!("Loaded {} fragments from {}", store.len(), path.display());
    Ok(store)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stats::Direction;
    use crate::core::tree::Tree;

    fn sample_store() -> StatsStore {
        let mut store = StatsStore::new();
        store.record(
            "org/repo",
            Tree::node("call", "", vec![Tree::leaf("ident", "panic")]),
            "panic(err)",
            Direction::Deleted,
        );
        store
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stats.db");
        save_stats(&sample_store(), &path).unwrap();
        assert!(!temp_path_for(&path).exists());

        let loaded = load_stats(&path).unwrap();
        let tree = Tree::node("call", "", vec![Tree::leaf("ident", "panic")]);
        assert_eq!(loaded.get(&tree).unwrap().deleted, 1);
        assert_eq!(loaded.text(&tree), Some("panic(err)"));
        assert_eq!(loaded.per_repo()["org/repo"].len(), 1);
    }

    #[test]
    fn test_header_is_checked() {
        let bytes = encode_stats(&sample_store()).unwrap();
        assert_eq!(&bytes[..8], STATS_MAGIC);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), FORMAT_VERSION);

        let mut wrong_version = bytes.clone();
        wrong_version[8] = 99;
        assert!(matches!(
            decode_stats(&wrong_version),
            Err(BadcodeError::Serialization { .. })
        ));
        assert!(decode_stats(b"garbage!garbage!").is_err());
        assert!(decode_stats(b"BAD").is_err());
    }

    #[test]
    fn test_stage_temp_paths_do_not_collide() {
        let merged = temp_path_for(Path::new("data/stats.db_merged"));
        let ranked = temp_path_for(Path::new("data/stats.db_merged_ranked"));
        assert_ne!(merged, ranked);
        assert_eq!(merged, PathBuf::from("data/stats.db_merged.tmp"));
    }
}
