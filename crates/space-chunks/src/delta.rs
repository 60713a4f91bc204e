//! Delta engine: replay offset/delete/insert edits over a byte buffer.
//!
//! Replay order is append order on the delta channel. Callers must hand
//! deltas in that order; the engine does not sort.
//!
//! Overrun policy: an `offset` past the end of the buffer is rejected with
//! `MalformedDelta`, while a `delete` running past the end is clamped.

use space_core::{Delta, SpaceError, SpaceResult};

/// Apply one delta, returning the new buffer.
pub fn apply_delta(buffer: &[u8], delta: &Delta) -> SpaceResult<Vec<u8>> {
    let mut out = buffer.to_vec();
    apply_in_place(&mut out, delta)?;
    Ok(out)
}

fn apply_in_place(buffer: &mut Vec<u8>, delta: &Delta) -> SpaceResult<()> {
    let len = buffer.len() as u64;
    if delta.offset > len {
        return Err(SpaceError::MalformedDelta {
            offset: delta.offset,
            delete: delta.delete,
            len,
        });
    }

    let end = delta.offset.saturating_add(delta.delete).min(len);
    if end - delta.offset < delta.delete {
        tracing::debug!(
            offset = delta.offset,
            delete = delta.delete,
            len,
            "delete clamped to end of buffer"
        );
    }

    buffer.splice(
        delta.offset as usize..end as usize,
        delta.insert.iter().copied(),
    );
    Ok(())
}

/// Replay `deltas` over an empty buffer.
pub fn reconstruct<'a, I>(deltas: I) -> SpaceResult<Vec<u8>>
where
    I: IntoIterator<Item = &'a Delta>,
{
    reconstruct_from(Vec::new(), deltas)
}

/// Replay `deltas` over `base` (chunk-derived content for hybrid files).
pub fn reconstruct_from<'a, I>(base: Vec<u8>, deltas: I) -> SpaceResult<Vec<u8>>
where
    I: IntoIterator<Item = &'a Delta>,
{
    let mut buffer = base;
    for delta in deltas {
        apply_in_place(&mut buffer, delta)?;
    }
    Ok(buffer)
}

/// The single delta turning `old` into `new`, found by trimming the common
/// prefix and suffix. `None` when the buffers are identical.
pub fn diff(old: &[u8], new: &[u8]) -> Option<Delta> {
    if old == new {
        return None;
    }

    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    Some(Delta::new(
        prefix as u64,
        (old.len() - prefix - suffix) as u64,
        new[prefix..new.len() - suffix].to_vec(),
    ))
}
