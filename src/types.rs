//! Shared types for the join-path core: identifiers, values, and the
//! handful of type tags a join-path request is validated against.

/// An identifier in some head or tail domain. MonetDB calls this an `oid`;
/// we keep the name to anchor the grounding in `joinpath.c`.
pub type Oid = u64;

/// A single tail element. Identifier-typed tails carry `Oid(None)` for the
/// null identifier rather than a magic sentinel value, preferring an
/// option/nullable wrapper at the access layer over a magic integer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An identifier, or `None` for the null identifier (no match).
    Oid(Option<Oid>),
    Int64(i64),
    Str(String),
    Bool(bool),
    /// Absence of a projected value, produced by a left join when a row of
    /// the left operand has no match and the tail being filled is a
    /// terminal (non-identifier) value type rather than an identifier.
    Null,
}

impl Value {
    /// True if this value is the null identifier. Non-identifier values are
    /// never null at this layer (nullability of terminal projection values
    /// is a storage-engine concern out of scope here).
    pub fn is_null_id(&self) -> bool {
        matches!(self, Value::Oid(None))
    }
}

/// The head domain's element type. A head is always either the implicit
/// void/unit domain or an explicit identifier domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadType {
    Void,
    Oid,
}

/// The tail (value) domain's element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailType {
    Void,
    Oid,
    Value(ValueKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int64,
    Str,
    Bool,
}

/// Chain invariant: `tail_type(C_i)` compatible with `head_type(C_{i+1})`
/// iff both sides are identifier types, or one side is the unit/void head
/// matched against an identifier type on the other. A terminal `Value` tail
/// is never compatible with anything (it can only appear as the last column
/// in a chain). Mirrors the three-way check in the original's `ALGjoinPath`:
/// `ttype == htype`, or `ttype == void && htype == oid`, or
/// `ttype == oid && htype == void`.
pub fn types_compatible(tail: TailType, head: HeadType) -> bool {
    matches!(
        (tail, head),
        (TailType::Oid, HeadType::Oid) | (TailType::Void, HeadType::Void) |
        (TailType::Void, HeadType::Oid) | (TailType::Oid, HeadType::Void)
    )
}

/// Join-path evaluation mode, bound to an operator name by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    FullJoin,
    LeftJoin,
    Project,
}

/// The operation name a join-path request arrives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpName {
    JoinPath,
    LeftjoinPath,
    ProjectionPath,
}

/// Threshold sized to fit an operand in the L1 data cache (tunable).
pub const SMALL_OPERAND: u64 = 1024;

/// Maximum supported chain length; requests beyond this route to the
/// pairwise planner.
pub const MAX_CHAIN_DEPTH: usize = 256;

/// Saturation ceiling for cost estimates. The original's `BUN_MAX`.
pub const COUNT_MAX: u64 = u64::MAX;
