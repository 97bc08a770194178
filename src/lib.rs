//! A cost-driven join-path evaluator core for a column-at-a-time analytical
//! database: given a sequence of binary column relations terminated by a
//! projection column, materialize the composed relation either by fused
//! single-pass chain evaluation or by iterative cost-ranked pairwise
//! reduction.
//!
//! The tabular storage engine, the SQL front-end, and the operator
//! primitives themselves are external collaborators; this crate consumes
//! them through [`store::StorageCollaborator`] and ships an in-memory
//! reference implementation in [`mock`] for its own tests.

pub mod chain;
pub mod cost;
pub mod dispatcher;
pub mod error;
pub mod mock;
pub mod planner;
pub mod store;
pub mod types;

pub use dispatcher::Dispatcher;
pub use error::JoinPathError;
pub use store::{ColumnId, MaterializedColumn, OutputBuilder, OwnedColumn, StorageCollaborator};
pub use types::{HeadType, Mode, Oid, OpName, TailType, Value, ValueKind};
