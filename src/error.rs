//! Error kinds surfaced to the caller of a join-path request.
//!
//! The original threads these as plain string codes through MAL's `throw()`
//! (`SEMANTIC_TYPE_MISMATCH`, `INTERNAL_BAT_ACCESS`, `INTERNAL_OBJ_CREATE`).
//! We use `thiserror`, the pattern the retrieval pack uses for planner-level
//! errors (`druarnfield-mantis_core`'s `PlanError`, `harborgrid-justin-rusty-db`),
//! the teacher itself has no structured error enum of its own.

use crate::types::{HeadType, TailType};

#[derive(Debug, thiserror::Error)]
pub enum JoinPathError {
    /// Adjacent columns' head/tail types are incompatible.
    #[error("type mismatch at chain step {step}: tail type {tail_type:?} is not compatible with head type {head_type:?}")]
    SemanticTypeMismatch {
        step: usize,
        tail_type: TailType,
        head_type: HeadType,
    },

    /// An input identifier could not be acquired from the storage collaborator.
    #[error("could not acquire input column at argument index {step}")]
    InternalBatAccess { step: usize },

    /// The planner's own bookkeeping arrays could not be allocated.
    #[error("planner bookkeeping allocation failed")]
    AllocationFailure,

    /// All retry strategies exhausted; no result column produced.
    #[error("no result column produced after {step} reduction steps; retries exhausted")]
    InternalObjCreate { step: usize },

    /// The chain handed to the fused evaluator is longer than `MAX_CHAIN_DEPTH`.
    #[error("chain length {len} exceeds the maximum supported depth of {max}")]
    ChainTooLong { len: usize, max: usize },
}
