//! The cost model. Pure, side-effect-free estimate of the output
//! cardinality of a single binary join between two columns.
//!
//! Grounded directly in the original's `ALGjoinCost`: phase A derives a
//! logical upper bound from uniqueness; phase B scales it by a first-match
//! physical-access rule. The rule cascade is expressed as a data-driven
//! table rather than the original's `if`/`else if` chain, which makes each
//! rule independently testable.

use crate::store::{ColumnId, StorageCollaborator};
use crate::types::{Mode, COUNT_MAX, SMALL_OPERAND};

struct RuleCtx {
    tail_dense_l: bool,
    tail_sorted_l: bool,
    head_dense_r: bool,
    head_sorted_r: bool,
    lc: u64,
    rc: u64,
}

struct Rule {
    divisor: u64,
    /// Only valid when the operator may treat the left operand
    /// asymmetrically, i.e. `mode != LEFT_JOIN`.
    lj_suppress: bool,
    predicate: fn(&RuleCtx) -> bool,
}

/// The 14-rule physical-access cascade, evaluated top to bottom; earliest
/// match wins.
const RULES: &[Rule] = &[
    Rule { divisor: 7, lj_suppress: false, predicate: |c| c.tail_dense_l && c.head_dense_r },
    Rule { divisor: 6, lj_suppress: false, predicate: |c| c.tail_sorted_l && c.head_dense_r },
    Rule { divisor: 6, lj_suppress: true, predicate: |c| c.tail_dense_l && c.head_sorted_r },
    Rule { divisor: 5, lj_suppress: false, predicate: |c| c.head_dense_r && c.rc <= SMALL_OPERAND },
    Rule { divisor: 5, lj_suppress: true, predicate: |c| c.tail_dense_l && c.lc <= SMALL_OPERAND },
    Rule { divisor: 4, lj_suppress: false, predicate: |c| c.tail_sorted_l && c.head_sorted_r },
    Rule { divisor: 3, lj_suppress: false, predicate: |c| c.head_sorted_r && c.rc <= SMALL_OPERAND },
    Rule { divisor: 3, lj_suppress: true, predicate: |c| c.tail_sorted_l && c.lc <= SMALL_OPERAND },
    Rule {
        divisor: 3,
        lj_suppress: false,
        predicate: |c| {
            (c.head_sorted_r && c.lc <= SMALL_OPERAND) || (c.tail_sorted_l && c.rc <= SMALL_OPERAND)
        },
    },
    Rule { divisor: 3, lj_suppress: false, predicate: |c| c.rc <= SMALL_OPERAND },
    Rule { divisor: 3, lj_suppress: true, predicate: |c| c.lc <= SMALL_OPERAND },
    Rule { divisor: 2, lj_suppress: false, predicate: |c| c.head_dense_r },
    Rule { divisor: 2, lj_suppress: true, predicate: |c| c.tail_dense_l },
    Rule { divisor: 1, lj_suppress: false, predicate: |_| true },
];

/// `estimate(L, R, mode) -> estimated_row_count`, non-negative, `<= COUNT_MAX`.
pub fn estimate<S: StorageCollaborator + ?Sized>(store: &S, l: ColumnId, r: ColumnId, mode: Mode) -> u64 {
    let lc = store.count(l) as u64;
    let rc = store.count(r) as u64;

    // Phase A: logical upper bound from uniqueness.
    let mut cost = if store.tail_key(l) && store.head_key(r) {
        lc.min(rc)
    } else if store.tail_key(l) {
        rc
    } else if store.head_key(r) {
        lc
    } else {
        lc.saturating_mul(rc)
    };
    cost = cost.min(COUNT_MAX);

    // Phase B: scale by the first matching physical-access rule.
    let ctx = RuleCtx {
        tail_dense_l: store.tail_dense(l),
        tail_sorted_l: store.tail_sorted(l),
        head_dense_r: store.head_dense(r),
        head_sorted_r: store.head_sorted(r),
        lc,
        rc,
    };

    for rule in RULES {
        if rule.lj_suppress && mode == Mode::LeftJoin {
            continue;
        }
        if (rule.predicate)(&ctx) {
            cost /= rule.divisor;
            break;
        }
    }

    cost
}
