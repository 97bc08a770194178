//! The fused chain-projection evaluator. Walks a sequence of
//! identifier-to-identifier columns ending in a projection column in one
//! pass, with no pairwise intermediates.
//!
//! Grounded in the original's `ALGjoinChain`. Columns are borrowed, not
//! consumed — the dispatcher owns the acquire/release lifecycle for its
//! inputs regardless of which evaluator ends up walking them.

use crate::error::JoinPathError;
use crate::store::{ColumnId, OwnedColumn, StorageCollaborator};
use crate::types::{MAX_CHAIN_DEPTH, Oid, Value};

/// `chain(C_0, …, C_{k-1}) -> C_out`. Callers are expected to have already
/// checked the type-compatibility invariant and `len() <= MAX_CHAIN_DEPTH`;
/// this function re-checks the depth bound defensively since it is cheap.
pub fn evaluate<S: StorageCollaborator>(
    store: &S,
    columns: &[OwnedColumn<'_, S>],
) -> Result<ColumnId, JoinPathError> {
    let k = columns.len();
    assert!(k >= 2, "a chain needs at least a head and a projection column");
    assert!(k <= MAX_CHAIN_DEPTH, "chain depth exceeds MAX_CHAIN_DEPTH; caller should have routed to the planner");

    let last = &columns[k - 1];
    let out_base = columns[0].head_seq_base();

    if columns.iter().any(|c| c.count() == 0) {
        log::debug!("chain walk: an input column is empty, returning empty output without walking");
        let builder = store
            .allocate_output(last.tail_type(), 0)
            .ok_or(JoinPathError::AllocationFailure)?;
        let result = builder.finish(store, out_base);
        store.mark_readonly(result);
        return Ok(result);
    }

    // Precompute each intermediate's head base once, outside the per-row walk.
    let intermediate_bases: Vec<Oid> = columns[1..k - 1].iter().map(|c| c.head_seq_base()).collect();
    let last_base = last.head_seq_base();
    let row_count = columns[0].count();

    log::debug!("chain walk: k={k} rows_in={row_count}");

    let mut builder = store
        .allocate_output(last.tail_type(), row_count)
        .ok_or(JoinPathError::AllocationFailure)?;

    for lo in 0..row_count {
        let Some(mut oc) = resolve_oid(columns[0].tail_at(lo)) else {
            continue;
        };

        let mut dropped = false;
        for (col, base) in columns[1..k - 1].iter().zip(intermediate_bases.iter()) {
            let Some(offset) = step_offset(oc, *base, col.count()) else {
                dropped = true;
                break;
            };
            match resolve_oid(col.tail_at(offset)) {
                Some(next) => oc = next,
                None => {
                    dropped = true;
                    break;
                }
            }
        }

        if dropped {
            continue;
        }

        match step_offset(oc, last_base, last.count()) {
            Some(offset) => builder.push(last.tail_at(offset)),
            None => continue,
        }
    }

    log::debug!("chain walk complete: rows_out={}", builder.len());

    let result = builder
        .with_conservative_properties(
            last.tail_sorted(),
            last.tail_reverse_sorted(),
            last.tail_key(),
            last.tail_nonnull(),
        )
        .finish(store, out_base);
    store.mark_readonly(result);
    Ok(result)
}

/// Extract the identifier a chain hop should follow next, or `None` if the
/// tail held the null identifier (P6: drop exactly this row).
fn resolve_oid(v: Value) -> Option<Oid> {
    match v {
        Value::Oid(Some(id)) => Some(id),
        _ => None,
    }
}

/// `identifier - head_seq_base`, bounds-checked. An out-of-range offset is
/// treated the same as a null lookup: the row is dropped rather than the
/// walk panicking.
fn step_offset(identifier: Oid, head_seq_base: Oid, count: usize) -> Option<usize> {
    let offset = identifier.checked_sub(head_seq_base)?;
    if offset < count as u64 {
        Some(offset as usize)
    } else {
        None
    }
}
