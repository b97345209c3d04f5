use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, warn};

use super::state::StoreState;
use crate::backing::BackingFile;
use crate::error::{Error, Result};
use crate::index::IndexEntry;
use crate::record;

/// Rebuilds the in-memory state by scanning the backing file end to end,
/// creating the file if it is missing. Records are decoded in append
/// order, so a later live record for a path naturally replaces an
/// earlier one. A torn tail (undecodable header, or a payload that runs
/// past EOF) stops the scan without failing the open; the stray bytes
/// are reclaimed by the next compaction.
pub fn recover_state(path: &Path) -> Result<StoreState> {
    let backing = BackingFile::open(path)?;
    let file_len = backing.len()?;
    let mut reader = BufReader::new(backing.try_clone()?);

    let mut state = StoreState::new();
    let mut offset = 0u64;

    while offset < file_len {
        reader.seek(SeekFrom::Start(offset))?;
        let header = match record::decode_header(&mut reader) {
            Ok(header) => header,
            Err(Error::Malformed(msg)) => {
                warn!(offset, %msg, "stopping recovery at undecodable record");
                break;
            }
            Err(err) => return Err(err),
        };

        let payload_offset = offset + record::header_len(&header.path);
        let end = payload_offset + header.size as u64;
        if end > file_len {
            warn!(offset, path = %header.path, "stopping recovery at torn record");
            break;
        }

        if header.deleted {
            state.note_deleted(header.size);
        } else {
            state.index.insert(
                header.path,
                IndexEntry {
                    size: header.size,
                    offset: payload_offset,
                },
            );
        }
        offset = end;
    }

    debug!(
        live = state.index.len(),
        deleted = state.deleted_count,
        "recovered store state"
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn push_record(buf: &mut Vec<u8>, path: &str, payload: &[u8], deleted: bool) {
        record::encode_header(buf, path, payload.len() as u32).expect("Failed to encode header");
        if deleted {
            let flag = buf.len() - 1;
            buf[flag] = record::TOMBSTONE_DELETED;
        }
        buf.extend_from_slice(payload);
    }

    #[test]
    fn test_recover_missing_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.bin");

        let state = recover_state(&path).expect("Failed to recover");
        assert!(state.index.is_empty());
        assert_eq!(state.deleted_count, 0);
        assert_eq!(state.deleted_size, 0);
        // The scan creates the backing file.
        assert!(path.exists());
    }

    #[test]
    fn test_recover_live_and_tombstoned() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.bin");

        let mut buf = Vec::new();
        push_record(&mut buf, "a", b"hello", false);
        push_record(&mut buf, "b", b"dead", true);
        push_record(&mut buf, "c", b"!", false);
        fs::write(&path, &buf).expect("Failed to write backing file");

        let state = recover_state(&path).expect("Failed to recover");
        assert_eq!(state.index.len(), 2);
        assert_eq!(state.deleted_count, 1);
        assert_eq!(state.deleted_size, 4);

        // "a" is the first record: payload right after its header.
        let a = state.index.get("a").expect("a should be live");
        assert_eq!(a.size, 5);
        assert_eq!(a.offset, record::header_len("a"));

        // "c" sits after the spans of "a" and the tombstoned "b".
        let c = state.index.get("c").expect("c should be live");
        let span_a = record::header_len("a") + 5;
        let span_b = record::header_len("b") + 4;
        assert_eq!(c.offset, span_a + span_b + record::header_len("c"));
        assert!(state.index.get("b").is_none());
    }

    #[test]
    fn test_recover_later_duplicate_wins() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.bin");

        // Two live records for the same path: a crash can leave the old
        // one untombstoned. The scan keeps the later occurrence.
        let mut buf = Vec::new();
        push_record(&mut buf, "f", b"old", false);
        let second = buf.len() as u64;
        push_record(&mut buf, "f", b"newer", false);
        fs::write(&path, &buf).expect("Failed to write backing file");

        let state = recover_state(&path).expect("Failed to recover");
        assert_eq!(state.index.len(), 1);
        let f = state.index.get("f").expect("f should be live");
        assert_eq!(f.size, 5);
        assert_eq!(f.offset, second + record::header_len("f"));
        // The orphaned first record is garbage, not a tombstone.
        assert_eq!(state.deleted_count, 0);
    }

    #[test]
    fn test_recover_stops_at_truncated_header() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.bin");

        let mut buf = Vec::new();
        push_record(&mut buf, "a", b"hello", false);
        // A torn header: length prefix promising more bytes than exist.
        buf.extend_from_slice(&40u16.to_be_bytes());
        buf.extend_from_slice(b"par");
        fs::write(&path, &buf).expect("Failed to write backing file");

        let state = recover_state(&path).expect("Failed to recover");
        assert_eq!(state.index.len(), 1);
        assert!(state.index.contains("a"));
    }

    #[test]
    fn test_recover_stops_at_torn_payload() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.bin");

        let mut buf = Vec::new();
        push_record(&mut buf, "a", b"hello", false);
        // A complete header whose declared payload runs past EOF.
        record::encode_header(&mut buf, "b", 100).expect("Failed to encode header");
        buf.extend_from_slice(b"only-a-little");
        fs::write(&path, &buf).expect("Failed to write backing file");

        let state = recover_state(&path).expect("Failed to recover");
        assert_eq!(state.index.len(), 1);
        assert!(!state.index.contains("b"));
    }
}
