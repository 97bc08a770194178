//! An in-memory [`StorageCollaborator`] reference implementation, used by
//! this crate's own test suite and by downstream integration tests. Plain
//! and unguarded in the same spirit as the teacher's `cascades/test_utils.rs`
//! fixture module: no trait object indirection, just a `RefCell`-backed map
//! any test can reach into.
//!
//! The storage engine this trait abstracts over is out of scope here, so
//! this mock is free to pick its own internal representation as long as it
//! honors the public interface. It models every column's head domain as the
//! literal contiguous range implied by the column's definition
//! (`[head_seq_base, head_seq_base + count)`), which keeps identifier
//! lookups in `full_join`/`left_join` simple arithmetic. The
//! `head_dense`/`head_sorted`/... properties are then purely test-controlled
//! cost hints, independent of this internal representation — exactly as a
//! real optimizer's statistics can be approximate without invalidating
//! execution.

use std::cell::RefCell;

use ahash::AHashMap;

use crate::store::{ColumnId, MaterializedColumn, OutputBuilder, StorageCollaborator};
use crate::types::{HeadType, Oid, TailType, Value};

#[derive(Debug, Clone)]
struct Entry {
    head_seq_base: Oid,
    head_type: HeadType,
    tail_type: TailType,
    tail: Vec<Value>,
    head_dense: bool,
    head_sorted: bool,
    head_key: bool,
    tail_dense: bool,
    tail_sorted: bool,
    tail_reverse_sorted: bool,
    tail_key: bool,
    tail_nonnull: bool,
    refcount: u64,
}

/// The operation a failure injection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    FullJoin,
    LeftJoin,
    Project,
}

/// Declarative description of a column to seed into a [`MockStore`]. Flags
/// default to `false`; set only the ones a test cares about.
pub struct ColumnSpec {
    head_seq_base: Oid,
    head_type: HeadType,
    tail_type: TailType,
    tail: Vec<Value>,
    head_dense: bool,
    head_sorted: bool,
    head_key: bool,
    tail_dense: bool,
    tail_sorted: bool,
    tail_reverse_sorted: bool,
    tail_key: bool,
    tail_nonnull: bool,
}

impl ColumnSpec {
    pub fn new(head_seq_base: Oid, head_type: HeadType, tail_type: TailType, tail: Vec<Value>) -> Self {
        Self {
            head_seq_base,
            head_type,
            tail_type,
            tail,
            head_dense: false,
            head_sorted: false,
            head_key: false,
            tail_dense: false,
            tail_sorted: false,
            tail_reverse_sorted: false,
            tail_key: false,
            tail_nonnull: false,
        }
    }

    pub fn head_dense(mut self, v: bool) -> Self {
        self.head_dense = v;
        self
    }

    pub fn head_sorted(mut self, v: bool) -> Self {
        self.head_sorted = v;
        self
    }

    pub fn head_key(mut self, v: bool) -> Self {
        self.head_key = v;
        self
    }

    pub fn tail_dense(mut self, v: bool) -> Self {
        self.tail_dense = v;
        self
    }

    pub fn tail_sorted(mut self, v: bool) -> Self {
        self.tail_sorted = v;
        self
    }

    pub fn tail_reverse_sorted(mut self, v: bool) -> Self {
        self.tail_reverse_sorted = v;
        self
    }

    pub fn tail_key(mut self, v: bool) -> Self {
        self.tail_key = v;
        self
    }

    pub fn tail_nonnull(mut self, v: bool) -> Self {
        self.tail_nonnull = v;
        self
    }
}

#[derive(Default)]
struct Inner {
    columns: AHashMap<ColumnId, Entry>,
    next_id: u64,
    fail_counts: AHashMap<(OpKind, ColumnId, ColumnId), u64>,
    fail_forever: AHashMap<OpKind, bool>,
    clear_error_calls: u64,
    call_counts: AHashMap<OpKind, u64>,
    call_log: Vec<(OpKind, ColumnId, ColumnId)>,
}

pub struct MockStore {
    inner: RefCell<Inner>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(Inner::default()),
        }
    }

    fn fresh_id(&self) -> ColumnId {
        let mut inner = self.inner.borrow_mut();
        let id = ColumnId(inner.next_id);
        inner.next_id += 1;
        id
    }

    /// Seed a column from a spec, carrying one reference owned by the
    /// caller.
    pub fn seed(&self, spec: ColumnSpec) -> ColumnId {
        let id = self.fresh_id();
        let entry = Entry {
            head_seq_base: spec.head_seq_base,
            head_type: spec.head_type,
            tail_type: spec.tail_type,
            tail: spec.tail,
            head_dense: spec.head_dense,
            head_sorted: spec.head_sorted,
            head_key: spec.head_key,
            tail_dense: spec.tail_dense,
            tail_sorted: spec.tail_sorted,
            tail_reverse_sorted: spec.tail_reverse_sorted,
            tail_key: spec.tail_key,
            tail_nonnull: spec.tail_nonnull,
            refcount: 1,
        };
        self.inner.borrow_mut().columns.insert(id, entry);
        id
    }

    /// Convenience for seeding an identifier (`Oid`-tailed) column with only
    /// the tail-side uniqueness/order flags tests most often vary.
    pub fn seed_identifiers(
        &self,
        head_seq_base: Oid,
        tail: &[Option<Oid>],
        tail_value_type: TailType,
        tail_dense: bool,
        tail_sorted: bool,
        tail_key: bool,
    ) -> ColumnId {
        let values = tail.iter().map(|v| Value::Oid(*v)).collect::<Vec<_>>();
        let tail_type = if matches!(tail_value_type, TailType::Oid | TailType::Void) {
            tail_value_type
        } else {
            TailType::Oid
        };
        self.seed(
            ColumnSpec::new(head_seq_base, HeadType::Oid, tail_type, values)
                .tail_dense(tail_dense)
                .tail_sorted(tail_sorted)
                .tail_key(tail_key),
        )
    }

    pub fn set_head_dense(&self, id: ColumnId, v: bool) {
        if let Some(e) = self.inner.borrow_mut().columns.get_mut(&id) {
            e.head_dense = v;
        }
    }

    pub fn set_head_sorted(&self, id: ColumnId, v: bool) {
        if let Some(e) = self.inner.borrow_mut().columns.get_mut(&id) {
            e.head_sorted = v;
        }
    }

    pub fn set_head_key(&self, id: ColumnId, v: bool) {
        if let Some(e) = self.inner.borrow_mut().columns.get_mut(&id) {
            e.head_key = v;
        }
    }

    pub fn set_tail_nonnull(&self, id: ColumnId, v: bool) {
        if let Some(e) = self.inner.borrow_mut().columns.get_mut(&id) {
            e.tail_nonnull = v;
        }
    }

    /// Remaining reference count. Zero means released, not necessarily
    /// removed from the map (kept around so tests can still inspect it).
    pub fn refcount(&self, id: ColumnId) -> u64 {
        self.inner.borrow().columns.get(&id).map(|e| e.refcount).unwrap_or(0)
    }

    /// Make the next `times` calls to `op(l, r)` fail (return `None`)
    /// regardless of which direction the planner tries them in.
    pub fn inject_failure(&self, op: OpKind, l: ColumnId, r: ColumnId, times: u64) {
        self.inner.borrow_mut().fail_counts.insert((op, l, r), times);
    }

    /// Make every call to `op` fail until cleared. Drives the irrecoverable-
    /// failure scenario without having to enumerate every pairing.
    pub fn fail_all(&self, op: OpKind, fail: bool) {
        self.inner.borrow_mut().fail_forever.insert(op, fail);
    }

    pub fn clear_error_call_count(&self) -> u64 {
        self.inner.borrow().clear_error_calls
    }

    /// Total invocations of `op`, successful or not. Used to check P7's
    /// bounded-retries property from the outside.
    pub fn call_count(&self, op: OpKind) -> u64 {
        *self.inner.borrow().call_counts.get(&op).unwrap_or(&0)
    }

    /// The `(l, r)` pairs `op` was attempted against, in call order,
    /// successful or not. Lets a test distinguish which pairing the planner
    /// actually reduced first, something the row count alone can't show
    /// when the join happens to be associative.
    pub fn call_log(&self, op: OpKind) -> Vec<(ColumnId, ColumnId)> {
        self.inner
            .borrow()
            .call_log
            .iter()
            .filter(|(logged_op, _, _)| *logged_op == op)
            .map(|(_, l, r)| (*l, *r))
            .collect()
    }

    fn consume_failure(&self, op: OpKind, l: ColumnId, r: ColumnId) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            *inner.call_counts.entry(op).or_insert(0) += 1;
            inner.call_log.push((op, l, r));
        }
        let mut inner = self.inner.borrow_mut();
        if *inner.fail_forever.get(&op).unwrap_or(&false) {
            return true;
        }
        if let Some(remaining) = inner.fail_counts.get_mut(&(op, l, r)) {
            if *remaining > 0 {
                *remaining -= 1;
                return true;
            }
        }
        false
    }

    fn lookup_position(&self, r: &Entry, v: Oid) -> Option<usize> {
        let len = r.tail.len() as u64;
        if v < r.head_seq_base {
            return None;
        }
        let offset = v - r.head_seq_base;
        if offset < len {
            Some(offset as usize)
        } else {
            None
        }
    }

    fn insert_result(
        &self,
        head_type: HeadType,
        tail_type: TailType,
        tail: Vec<Value>,
        head_seq_base: Oid,
    ) -> ColumnId {
        self.seed(ColumnSpec::new(head_seq_base, head_type, tail_type, tail))
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageCollaborator for MockStore {
    fn count(&self, id: ColumnId) -> usize {
        self.inner.borrow().columns.get(&id).map(|e| e.tail.len()).unwrap_or(0)
    }

    fn head_seq_base(&self, id: ColumnId) -> Oid {
        self.inner.borrow().columns.get(&id).map(|e| e.head_seq_base).unwrap_or(0)
    }

    fn head_type(&self, id: ColumnId) -> HeadType {
        self.inner.borrow().columns.get(&id).map(|e| e.head_type).unwrap_or(HeadType::Void)
    }

    fn tail_type(&self, id: ColumnId) -> TailType {
        self.inner.borrow().columns.get(&id).map(|e| e.tail_type).unwrap_or(TailType::Void)
    }

    fn head_dense(&self, id: ColumnId) -> bool {
        self.inner.borrow().columns.get(&id).map(|e| e.head_dense).unwrap_or(false)
    }

    fn head_sorted(&self, id: ColumnId) -> bool {
        self.inner.borrow().columns.get(&id).map(|e| e.head_sorted).unwrap_or(false)
    }

    fn head_key(&self, id: ColumnId) -> bool {
        self.inner.borrow().columns.get(&id).map(|e| e.head_key).unwrap_or(false)
    }

    fn tail_dense(&self, id: ColumnId) -> bool {
        self.inner.borrow().columns.get(&id).map(|e| e.tail_dense).unwrap_or(false)
    }

    fn tail_sorted(&self, id: ColumnId) -> bool {
        self.inner.borrow().columns.get(&id).map(|e| e.tail_sorted).unwrap_or(false)
    }

    fn tail_reverse_sorted(&self, id: ColumnId) -> bool {
        self.inner.borrow().columns.get(&id).map(|e| e.tail_reverse_sorted).unwrap_or(false)
    }

    fn tail_key(&self, id: ColumnId) -> bool {
        self.inner.borrow().columns.get(&id).map(|e| e.tail_key).unwrap_or(false)
    }

    fn tail_nonnull(&self, id: ColumnId) -> bool {
        self.inner.borrow().columns.get(&id).map(|e| e.tail_nonnull).unwrap_or(false)
    }

    fn tail_at(&self, id: ColumnId, offset: usize) -> Value {
        self.inner
            .borrow()
            .columns
            .get(&id)
            .and_then(|e| e.tail.get(offset).cloned())
            .unwrap_or(Value::Null)
    }

    fn try_acquire(&self, id: ColumnId) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.columns.get_mut(&id) {
            Some(e) if e.refcount > 0 => {
                e.refcount += 1;
                true
            }
            _ => false,
        }
    }

    fn release(&self, id: ColumnId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(e) = inner.columns.get_mut(&id) {
            e.refcount = e.refcount.saturating_sub(1);
        }
    }

    fn register(&self, column: MaterializedColumn) -> ColumnId {
        let id = self.fresh_id();
        let entry = Entry {
            head_seq_base: column.head_seq_base,
            head_type: HeadType::Void,
            tail_type: column.tail_type,
            tail: column.values,
            head_dense: true,
            head_sorted: true,
            head_key: true,
            tail_dense: false,
            tail_sorted: column.tail_sorted,
            tail_reverse_sorted: column.tail_reverse_sorted,
            tail_key: column.tail_key,
            tail_nonnull: column.tail_nonnull,
            refcount: 1,
        };
        self.inner.borrow_mut().columns.insert(id, entry);
        id
    }

    fn mark_readonly(&self, _id: ColumnId) {}

    fn full_join(&self, l: ColumnId, r: ColumnId, hint_cap: usize) -> Option<ColumnId> {
        if self.consume_failure(OpKind::FullJoin, l, r) {
            return None;
        }
        let inner = self.inner.borrow();
        let le = inner.columns.get(&l)?;
        let re = inner.columns.get(&r)?;
        let (le, re) = (le.clone(), re.clone());
        drop(inner);

        let mut out_tail = Vec::with_capacity(hint_cap);
        for v in &le.tail {
            if let Value::Oid(Some(ident)) = v {
                if let Some(pos) = self.lookup_position(&re, *ident) {
                    out_tail.push(re.tail[pos].clone());
                }
            }
        }
        Some(self.insert_result(HeadType::Void, re.tail_type, out_tail, 0))
    }

    fn left_join(&self, l: ColumnId, r: ColumnId, hint_cap: usize) -> Option<ColumnId> {
        if self.consume_failure(OpKind::LeftJoin, l, r) {
            return None;
        }
        let inner = self.inner.borrow();
        let le = inner.columns.get(&l)?;
        let re = inner.columns.get(&r)?;
        let (le, re) = (le.clone(), re.clone());
        drop(inner);

        let no_match = match re.tail_type {
            TailType::Oid | TailType::Void => Value::Oid(None),
            TailType::Value(_) => Value::Null,
        };

        let mut out_tail = Vec::with_capacity(hint_cap.max(le.tail.len()));
        for v in &le.tail {
            match v {
                Value::Oid(Some(ident)) => match self.lookup_position(&re, *ident) {
                    Some(pos) => out_tail.push(re.tail[pos].clone()),
                    None => out_tail.push(no_match.clone()),
                },
                _ => out_tail.push(no_match.clone()),
            }
        }
        Some(self.insert_result(HeadType::Void, re.tail_type, out_tail, le.head_seq_base))
    }

    fn project(&self, l: ColumnId, r: ColumnId) -> Option<ColumnId> {
        if self.consume_failure(OpKind::Project, l, r) {
            return None;
        }
        self.full_join(l, r, self.count(l).min(self.count(r)))
    }

    fn allocate_output(&self, tail_type: TailType, capacity: usize) -> Option<OutputBuilder> {
        Some(OutputBuilder::new(tail_type, capacity))
    }

    fn clear_error(&self) {
        self.inner.borrow_mut().clear_error_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueKind;

    #[test]
    fn acquire_and_release_round_trips_refcount() {
        let store = MockStore::new();
        let id = store.seed_identifiers(0, &[Some(1)], TailType::Oid, false, false, false);
        assert_eq!(store.refcount(id), 1);
        assert!(store.try_acquire(id));
        assert_eq!(store.refcount(id), 2);
        store.release(id);
        store.release(id);
        assert_eq!(store.refcount(id), 0);
        assert!(!store.try_acquire(id));
    }

    #[test]
    fn full_join_follows_identifier_chain() {
        let store = MockStore::new();
        let l = store.seed_identifiers(0, &[Some(10), Some(11), None], TailType::Oid, false, false, false);
        let r = store.seed(ColumnSpec::new(
            10,
            HeadType::Void,
            TailType::Value(ValueKind::Int64),
            vec![Value::Int64(100), Value::Int64(200)],
        ));
        let out = store.full_join(l, r, 3).expect("join succeeds");
        assert_eq!(store.count(out), 2);
        assert_eq!(store.tail_at(out, 0), Value::Int64(100));
        assert_eq!(store.tail_at(out, 1), Value::Int64(200));
    }

    #[test]
    fn left_join_fills_no_match_rows() {
        let store = MockStore::new();
        let l = store.seed_identifiers(0, &[Some(10), Some(999)], TailType::Oid, false, false, false);
        let r = store.seed(ColumnSpec::new(
            10,
            HeadType::Void,
            TailType::Value(ValueKind::Int64),
            vec![Value::Int64(100)],
        ));
        let out = store.left_join(l, r, 2).expect("left join always succeeds");
        assert_eq!(store.count(out), 2);
        assert_eq!(store.tail_at(out, 0), Value::Int64(100));
        assert_eq!(store.tail_at(out, 1), Value::Null);
    }

    #[test]
    fn injected_failure_consumes_exactly_once() {
        let store = MockStore::new();
        let l = store.seed_identifiers(0, &[Some(10)], TailType::Oid, false, false, false);
        let r = store.seed(ColumnSpec::new(10, HeadType::Void, TailType::Value(ValueKind::Int64), vec![Value::Int64(1)]));
        store.inject_failure(OpKind::FullJoin, l, r, 1);
        assert!(store.full_join(l, r, 1).is_none());
        assert!(store.full_join(l, r, 1).is_some());
    }

    #[test]
    fn fail_all_blocks_every_pairing() {
        let store = MockStore::new();
        store.fail_all(OpKind::FullJoin, true);
        let l = store.seed_identifiers(0, &[Some(1)], TailType::Oid, false, false, false);
        let r = store.seed_identifiers(0, &[Some(1)], TailType::Oid, false, false, false);
        assert!(store.full_join(l, r, 1).is_none());
        assert!(store.full_join(l, r, 1).is_none());
    }
}
