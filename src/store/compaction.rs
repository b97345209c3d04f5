use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::state::StoreState;
use crate::backing::BackingFile;
use crate::config::{CleanupStrategy, StoreConfig};
use crate::error::Result;
use crate::index::IndexEntry;
use crate::record;

/// Decides whether the backing file should be rewritten, per the
/// configured strategy and fill rate.
pub fn should_compact(config: &StoreConfig, state: &StoreState) -> bool {
    let fill_rate = config.fill_rate as f64;
    match config.cleanup {
        CleanupStrategy::Never => false,
        CleanupStrategy::Always => true,
        CleanupStrategy::CheckCount => {
            let total = state.index.len() as u32 + state.deleted_count;
            f64::from(state.deleted_count) >= (f64::from(total) * fill_rate).ceil()
        }
        CleanupStrategy::CheckSize => {
            // The threshold base mixes live bytes with the tombstone count.
            let total = state.index.live_size() + state.deleted_count as u64;
            state.deleted_size as f64 >= (total as f64 * fill_rate).ceil()
        }
    }
}

/// Compacts when the strategy says so.
pub fn maybe_compact(config: &StoreConfig, state: &mut StoreState) -> Result<()> {
    if should_compact(config, state) {
        compact(config, state)?;
    }
    Ok(())
}

/// Rewrites every live record into a fresh sibling file, swaps it over
/// the backing file, and zeroes the tombstone counters. Records are
/// rewritten in path order, so compacting an already-compacted file
/// reproduces it byte for byte. Runs under the exclusive lock held by
/// the triggering mutation.
pub fn compact(config: &StoreConfig, state: &mut StoreState) -> Result<()> {
    let sibling = sibling_path(&config.path);
    let mut source = BackingFile::open_readonly(&config.path)?;
    let mut target = BackingFile::create_new(&sibling)?;

    for (path, entry) in state.index.sorted_entries() {
        let payload = source.read_at(entry.offset, entry.size as usize)?;

        let mut buf = Vec::with_capacity(record::header_len(&path) as usize + payload.len());
        record::encode_header(&mut buf, &path, entry.size)?;
        buf.extend_from_slice(&payload);

        let start = target.append(&buf)?;
        let payload_offset = start + record::header_len(&path);
        state.index.insert(
            path,
            IndexEntry {
                size: entry.size,
                offset: payload_offset,
            },
        );
    }

    drop(source);
    drop(target);
    fs::remove_file(&config.path)?;
    fs::rename(&sibling, &config.path)?;

    info!(
        live = state.index.len(),
        reclaimed = state.deleted_size,
        "compacted backing file"
    );
    state.reset_deleted();
    Ok(())
}

fn sibling_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{:08x}", rand::random::<u32>()));
    PathBuf::from(name)
}
