//! The storage collaborator capability set consumed by the join-path core.
//! The tabular storage engine itself — column container, iteration,
//! reference-counting, allocation — is an external collaborator out of
//! scope for this crate; this module only defines the narrow interface the
//! planner needs from it, plus the affine ownership wrapper that makes
//! reference-count conservation a compile-time property.

use crate::types::{HeadType, Oid, TailType, Value};

/// A stable identifier for a column published by the storage collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId(pub u64);

/// A column materialized outside an operator primitive — currently only the
/// chain evaluator's own output takes this path; operator primitives
/// publish their own results internally and hand back an already-registered
/// [`ColumnId`].
#[derive(Debug, Clone)]
pub struct MaterializedColumn {
    pub head_seq_base: Oid,
    pub tail_type: TailType,
    pub values: Vec<Value>,
    /// Conservative properties carried over from the upstream column the
    /// chain evaluator walked off of: inherit only what's provably still
    /// true rather than double-assigning. Unproven properties are left
    /// `false` rather than guessed `true`.
    pub tail_sorted: bool,
    pub tail_reverse_sorted: bool,
    pub tail_key: bool,
    pub tail_nonnull: bool,
}

/// A column under construction by the chain evaluator. `allocate_output`
/// hands one of these back; pushing values and calling [`finish`] is the
/// in-process equivalent of the original's `bunfastapp` loop followed by
/// `BATsetcount`.
///
/// [`finish`]: OutputBuilder::finish
pub struct OutputBuilder {
    tail_type: TailType,
    values: Vec<Value>,
    tail_sorted: bool,
    tail_reverse_sorted: bool,
    tail_key: bool,
    tail_nonnull: bool,
}

impl OutputBuilder {
    pub fn new(tail_type: TailType, capacity: usize) -> Self {
        Self {
            tail_type,
            values: Vec::with_capacity(capacity),
            tail_sorted: false,
            tail_reverse_sorted: false,
            tail_key: false,
            tail_nonnull: false,
        }
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Carry forward properties proven to survive the walk: conservative
    /// inheritance from the last column in the chain, never a guess.
    pub fn with_conservative_properties(
        mut self,
        tail_sorted: bool,
        tail_reverse_sorted: bool,
        tail_key: bool,
        tail_nonnull: bool,
    ) -> Self {
        self.tail_sorted = tail_sorted;
        self.tail_reverse_sorted = tail_reverse_sorted;
        self.tail_key = tail_key;
        self.tail_nonnull = tail_nonnull;
        self
    }

    /// Publish the built column under a fresh identifier owned by the caller.
    pub fn finish<S: StorageCollaborator + ?Sized>(self, store: &S, head_seq_base: Oid) -> ColumnId {
        store.register(MaterializedColumn {
            head_seq_base,
            tail_type: self.tail_type,
            values: self.values,
            tail_sorted: self.tail_sorted,
            tail_reverse_sorted: self.tail_reverse_sorted,
            tail_key: self.tail_key,
            tail_nonnull: self.tail_nonnull,
        })
    }
}

/// The capability set the join-path core consumes from the column store.
/// Implementors are free to back this however they like; the crate ships
/// [`crate::mock`] as an in-memory reference implementation used by its own
/// tests.
pub trait StorageCollaborator {
    fn count(&self, id: ColumnId) -> usize;
    fn head_seq_base(&self, id: ColumnId) -> Oid;
    fn head_type(&self, id: ColumnId) -> HeadType;
    fn tail_type(&self, id: ColumnId) -> TailType;

    fn head_dense(&self, id: ColumnId) -> bool;
    /// Head values are monotonic. Not one of the essential column
    /// attributes but required by several of the cost model's rules;
    /// grounded directly in the original's `BAThordered(r)`.
    fn head_sorted(&self, id: ColumnId) -> bool;
    fn head_key(&self, id: ColumnId) -> bool;

    fn tail_dense(&self, id: ColumnId) -> bool;
    fn tail_sorted(&self, id: ColumnId) -> bool;
    fn tail_reverse_sorted(&self, id: ColumnId) -> bool;
    fn tail_key(&self, id: ColumnId) -> bool;
    fn tail_nonnull(&self, id: ColumnId) -> bool;

    /// Read the tail value at a (pre-normalized) row offset.
    fn tail_at(&self, id: ColumnId, offset: usize) -> Value;

    /// Resolve an identifier into a live column, bumping its reference
    /// count. Returns `false` if `id` does not resolve.
    fn try_acquire(&self, id: ColumnId) -> bool;
    /// Drop one reference; free when it reaches zero.
    fn release(&self, id: ColumnId);
    /// Publish a freshly materialized column and return a stable identifier
    /// carrying one reference, owned by the caller of `register`.
    fn register(&self, column: MaterializedColumn) -> ColumnId;
    /// Hint that a column is immutable going forward.
    fn mark_readonly(&self, id: ColumnId);

    /// `hint_cap` is advisory: `min(count(L), count(R))`.
    fn full_join(&self, l: ColumnId, r: ColumnId, hint_cap: usize) -> Option<ColumnId>;
    /// `hint_cap` is advisory: `count(L)`.
    fn left_join(&self, l: ColumnId, r: ColumnId, hint_cap: usize) -> Option<ColumnId>;
    fn project(&self, l: ColumnId, r: ColumnId) -> Option<ColumnId>;

    fn allocate_output(&self, tail_type: TailType, capacity: usize) -> Option<OutputBuilder>;

    /// Reset any latched per-thread error buffer. Invoked by the planner
    /// after a recoverable failure, before retrying — operator primitives
    /// here return an explicit result-or-error, so this is kept only as the
    /// cheap reset gesture the original performs, not as a channel the
    /// planner inspects.
    fn clear_error(&self);

    /// Acquire `id`, wrapping it in an affine [`OwnedColumn`] that releases
    /// exactly once on drop.
    fn acquire(&self, id: ColumnId) -> Option<OwnedColumn<'_, Self>>
    where
        Self: Sized,
    {
        if self.try_acquire(id) {
            Some(OwnedColumn { id, store: self })
        } else {
            None
        }
    }
}

/// An owned, reference-counted column handle. Moving one into a working
/// array transfers ownership; dropping it releases the reference exactly
/// once. This is the load-bearing type for P1 (ref-count conservation): as
/// long as every column that enters the planner ends up inside exactly one
/// `OwnedColumn` until it is either dropped or consumed by
/// [`OwnedColumn::into_id`], no reference can leak or double-free.
pub struct OwnedColumn<'s, S: StorageCollaborator + ?Sized> {
    pub(crate) id: ColumnId,
    pub(crate) store: &'s S,
}

impl<'s, S: StorageCollaborator + ?Sized> OwnedColumn<'s, S> {
    /// Wrap a column id that already carries one reference (as returned by
    /// an operator primitive or [`OutputBuilder::finish`]) without acquiring
    /// a second one.
    pub fn from_fresh(store: &'s S, id: ColumnId) -> Self {
        Self { id, store }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn count(&self) -> usize {
        self.store.count(self.id)
    }

    pub fn head_seq_base(&self) -> Oid {
        self.store.head_seq_base(self.id)
    }

    pub fn head_type(&self) -> HeadType {
        self.store.head_type(self.id)
    }

    pub fn tail_type(&self) -> TailType {
        self.store.tail_type(self.id)
    }

    pub fn head_dense(&self) -> bool {
        self.store.head_dense(self.id)
    }

    pub fn head_sorted(&self) -> bool {
        self.store.head_sorted(self.id)
    }

    pub fn head_key(&self) -> bool {
        self.store.head_key(self.id)
    }

    pub fn tail_dense(&self) -> bool {
        self.store.tail_dense(self.id)
    }

    pub fn tail_sorted(&self) -> bool {
        self.store.tail_sorted(self.id)
    }

    pub fn tail_reverse_sorted(&self) -> bool {
        self.store.tail_reverse_sorted(self.id)
    }

    pub fn tail_key(&self) -> bool {
        self.store.tail_key(self.id)
    }

    pub fn tail_nonnull(&self) -> bool {
        self.store.tail_nonnull(self.id)
    }

    pub fn tail_at(&self, offset: usize) -> Value {
        self.store.tail_at(self.id, offset)
    }

    /// Consume this handle, handing its single reference to the caller
    /// without releasing it. Used to publish the planner's final result.
    pub fn into_id(self) -> ColumnId {
        let id = self.id;
        std::mem::forget(self);
        id
    }
}

impl<'s, S: StorageCollaborator + ?Sized> Drop for OwnedColumn<'s, S> {
    fn drop(&mut self) {
        self.store.release(self.id);
    }
}

impl<'s, S: StorageCollaborator + ?Sized> std::fmt::Debug for OwnedColumn<'s, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedColumn").field("id", &self.id).finish()
    }
}
