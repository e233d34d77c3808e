//! Records over pluggable backing stores
//!
//! A `Record` pairs an opaque, type-erased source with a `RecordHooks`
//! implementation chosen at construction. The record never looks inside the
//! source: reads, writes and teardown all go through the hooks, and hook
//! failures come back to the caller unchanged.
//!
//! Handles are shared, never copied. `free` runs the free hook once; a record
//! whose last handle is dropped without an explicit `free` runs it then.

pub mod memory;


use crate::error::{RecordError, RecordResult};
use crate::value::Value;
use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/* ===================== Hooks ===================== */

/// Backing-store interface of a record
pub trait RecordHooks {
    /// Read a bin. Returns a value owned by the caller, or `None` when the
    /// bin does not exist.
    fn get(&self, record: &Record, name: &str) -> Option<Value>;

    /// Write a bin. The caller keeps its own reference to `value`; retain a
    /// copy to keep it.
    fn set(&self, record: &Record, name: &str, value: &Value) -> RecordResult<()>;

    /// Release the source and anything else the hooks hold for this record.
    fn free(&self, record: &Record) -> RecordResult<()>;
}

/* ===================== Record ===================== */

struct RecordState {
    source: Option<Box<dyn Any>>,
    hooks: Rc<dyn RecordHooks>,
}

struct RecordCell {
    state: RefCell<RecordState>,
    freed: Cell<bool>,
}

/// Handle onto a record
#[derive(Clone)]
pub struct Record {
    cell: Rc<RecordCell>,
}

impl Record {
    /// Create a record backed by `source` and served by `hooks`
    pub fn new<S: Any>(source: S, hooks: Rc<dyn RecordHooks>) -> Self {
        Record {
            cell: Rc::new(RecordCell {
                state: RefCell::new(RecordState {
                    source: Some(Box::new(source)),
                    hooks,
                }),
                freed: Cell::new(false),
            }),
        }
    }

    /// Replace the source and hooks in place, keeping this handle's identity.
    ///
    /// The old free hook is not called; release the previous source first if
    /// it needs more than dropping.
    pub fn update<S: Any>(&self, source: S, hooks: Rc<dyn RecordHooks>) {
        let previous = {
            let mut state = self.cell.state.borrow_mut();
            let previous = state.source.replace(Box::new(source));
            state.hooks = hooks;
            previous
        };
        tracing::debug!(had_source = previous.is_some(), "record updated");
        drop(previous);
    }

    /// Read a bin through the get hook
    pub fn get(&self, name: &str) -> Option<Value> {
        if self.is_freed() {
            return None;
        }
        self.hooks().get(self, name)
    }

    /// Write a bin through the set hook
    pub fn set(&self, name: &str, value: &Value) -> RecordResult<()> {
        if self.is_freed() {
            return Err(RecordError::Freed);
        }
        self.hooks().set(self, name, value)
    }

    /// Run the free hook and give up this handle
    pub fn free(self) -> RecordResult<()> {
        self.free_in_place()
    }

    /// Whether the free hook has run
    pub fn is_freed(&self) -> bool {
        self.cell.freed.get()
    }

    /// Typed view of the source, if it is a `T`
    pub fn source<T: Any>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.cell.state.borrow(), |state| {
            state.source.as_deref().and_then(|s| s.downcast_ref::<T>())
        })
        .ok()
    }

    /// Mutable typed view of the source, if it is a `T`
    pub fn source_mut<T: Any>(&self) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.cell.state.borrow_mut(), |state| {
            state.source.as_deref_mut().and_then(|s| s.downcast_mut::<T>())
        })
        .ok()
    }

    /// Take ownership of the source back, if it is a `T`
    pub fn take_source<T: Any>(&self) -> Option<Box<T>> {
        let mut state = self.cell.state.borrow_mut();
        let source = state.source.take()?;
        match source.downcast::<T>() {
            Ok(source) => Some(source),
            Err(source) => {
                state.source = Some(source);
                None
            }
        }
    }

    /// Whether a source is still attached
    pub fn has_source(&self) -> bool {
        self.cell.state.borrow().source.is_some()
    }

    /// Whether both handles refer to the same record
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// Wrap this record as a value node
    pub fn to_value(&self) -> Value {
        Value::record(self.clone())
    }

    /// Recover the record held by a value
    pub fn from_value(value: &Value) -> Option<Record> {
        value.as_record().cloned()
    }

    fn hooks(&self) -> Rc<dyn RecordHooks> {
        Rc::clone(&self.cell.state.borrow().hooks)
    }

    fn free_in_place(&self) -> RecordResult<()> {
        if self.cell.freed.replace(true) {
            return Ok(());
        }
        tracing::debug!("record freed");
        self.hooks().free(self)
    }
}

impl Drop for Record {
    fn drop(&mut self) {
        if Rc::strong_count(&self.cell) == 1 && !self.is_freed() {
            if let Err(err) = self.free_in_place() {
                tracing::warn!(error = %err, "implicit record free failed");
            }
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("freed", &self.is_freed())
            .field("has_source", &self.has_source())
            .finish()
    }
}
