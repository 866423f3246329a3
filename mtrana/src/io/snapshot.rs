use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use bincode::{Decode, Encode};
use tracing::info;

use mtrcore::efficiency::table::EfficiencyTable;

use crate::error::{Error, Result};

/// current layout of the snapshot file
pub const SNAPSHOT_VERSION: u32 = 1;
/// frame magic of zstd streams, little endian 0xFD2FB528
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct SnapshotFile {
    pub version: u32,
    pub table: EfficiencyTable,
}

impl SnapshotFile {
    pub fn new(table: EfficiencyTable) -> Self {
        Self { version: SNAPSHOT_VERSION, table }
    }
}

/// binary image of an efficiency table
pub fn encode_table(table: &EfficiencyTable) -> Result<Vec<u8>> {
    bincode::encode_to_vec(SnapshotFile::new(table.clone()), bincode::config::standard())
        .map_err(|e| Error::Snapshot(e.to_string()))
}

/// decode a table from `encode_table` output, zstd compressed or not
pub fn decode_table(bytes: &[u8]) -> Result<EfficiencyTable> {
    let raw = if bytes.starts_with(&ZSTD_MAGIC) {
        zstd::decode_all(bytes)?
    } else {
        bytes.to_vec()
    };

    let (file, _): (SnapshotFile, usize) = bincode::decode_from_slice(&raw, bincode::config::standard())
        .map_err(|e| Error::Snapshot(e.to_string()))?;

    if file.version != SNAPSHOT_VERSION {
        return Err(Error::Snapshot(format!("unsupported snapshot version {}", file.version)));
    }
    Ok(file.table)
}

// --- Bincode + optional zstd compression ---
pub fn save_snapshot<P: AsRef<Path>>(path: P, table: &EfficiencyTable, compress: bool) -> Result<()> {
    let bytes = encode_table(table)?;
    let f = File::create(path.as_ref())?;
    if compress {
        let mut zw = zstd::Encoder::new(f, 3)?;
        zw.write_all(&bytes)?;
        zw.finish()?;
    } else {
        let mut bw = BufWriter::new(f);
        bw.write_all(&bytes)?;
        bw.flush()?;
    }
    info!(path = %path.as_ref().display(), compress, "efficiency snapshot written");
    Ok(())
}

pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<EfficiencyTable> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    decode_table(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtrcore::efficiency::table::Plane;

    fn sample_table() -> EfficiencyTable {
        let mut table = EfficiencyTable::uniform(0.93, 0.91);
        table.set_cell(1300, 77, Plane::BothPlanes, 0.88).unwrap();
        table
    }

    #[test]
    fn test_plain_and_compressed_snapshots() {
        let table = sample_table();
        let bytes = encode_table(&table).unwrap();
        assert_eq!(decode_table(&bytes).unwrap(), table);

        let compressed = zstd::encode_all(&bytes[..], 3).unwrap();
        assert!(compressed.starts_with(&ZSTD_MAGIC));
        assert_eq!(decode_table(&compressed).unwrap(), table);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(decode_table(&[1, 2, 3]), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("mtrana-snapshot-{}.bin.zst", std::process::id()));
        let table = sample_table();
        save_snapshot(&path, &table, true).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, table);
    }
}
