//! Heuristics for checking externally supplied table counts.
//!
//! The container has no count header. For every container observed so far the
//! first image entry points at the first payload byte, which is also the byte
//! right after the index, so its offset gives the total index length.

use super::table::{TableCounts, ENTRY_SIZE};

/// Index length implied by the first entry, if it looks plausible.
pub fn index_len(bytes: &[u8]) -> Option<usize> {
    let first = bytes.get(..4)?;
    let offset = u32::from_le_bytes([first[0], first[1], first[2], first[3]]) as usize;
    if offset == 0 || offset % ENTRY_SIZE != 0 || offset > bytes.len() {
        return None;
    }
    Some(offset)
}

/// Compare `counts` with the probed index length; returns whether they agree.
///
/// Disagreement is only logged: an empty image table or a container whose
/// first payload is not the first image breaks the heuristic.
pub fn check_counts(bytes: &[u8], counts: &TableCounts) -> bool {
    match index_len(bytes) {
        Some(len) if len == counts.index_len() => true,
        Some(len) => {
            log::warn!(
                "supplied counts ({}) give a {} byte index, first entry suggests {} bytes ({} entries)",
                counts,
                counts.index_len(),
                len,
                len / ENTRY_SIZE
            );
            false
        }
        None => {
            log::warn!("could not probe the index length from the first entry");
            false
        }
    }
}
