//! Runtime value types
//!
//! A `Value` is a handle onto a shared, reference-counted cell holding one of
//! a closed set of kinds. Every holder (host code, a list/map/pair slot, a
//! script-scoped box) owns exactly one handle, so the count always equals the
//! number of live holders. The cell is torn down once, when the last handle
//! goes away: the owned string buffer is freed, children are released and an
//! embedded record runs its `free` hook if nobody freed it explicitly.
//!
//! Counts are plain `Rc` counters. Values are single-threaded by
//! construction (`!Send`, `!Sync`); sharing them across threads needs a
//! different representation, not a wrapper.

mod display;


use crate::record::Record;
use std::fmt;
use std::rc::{Rc, Weak};

/* ===================== Kinds ===================== */

/// Value kind tag
///
/// The tag of a value never changes after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Integer,
    String,
    List,
    Map,
    Pair,
    Record,
}

impl ValueKind {
    /// Human-readable kind name
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Map => "map",
            ValueKind::Pair => "pair",
            ValueKind::Record => "record",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value payload
#[derive(Debug)]
pub enum Val {
    Boolean(bool),
    Integer(i64),
    String(String),
    List(Vec<Value>),
    /// Entries in insertion order, keys unique by value equality
    Map(Vec<(Value, Value)>),
    Pair(Value, Value),
    Record(Record),
}

impl Val {
    /// Kind tag of this payload
    pub fn kind(&self) -> ValueKind {
        match self {
            Val::Boolean(_) => ValueKind::Boolean,
            Val::Integer(_) => ValueKind::Integer,
            Val::String(_) => ValueKind::String,
            Val::List(_) => ValueKind::List,
            Val::Map(_) => ValueKind::Map,
            Val::Pair(_, _) => ValueKind::Pair,
            Val::Record(_) => ValueKind::Record,
        }
    }
}

/* ===================== Handles ===================== */

struct ValueCell {
    val: Val,
}

impl Drop for ValueCell {
    fn drop(&mut self) {
        // Children and owned buffers are released when `val` drops right after.
        tracing::trace!(kind = %self.val.kind(), "value destroyed");
    }
}

/// Counted handle onto a shared value
///
/// `clone` is `retain`: it adds a holder. Dropping a handle is `release`.
#[derive(Clone)]
pub struct Value {
    cell: Rc<ValueCell>,
}

/// Non-owning view of a value
///
/// Does not contribute to the count; `upgrade` yields a handle only while
/// some owner still holds the value.
#[derive(Clone)]
pub struct WeakValue {
    cell: Weak<ValueCell>,
}

impl Value {
    /// Create a value from a payload
    pub fn create(val: Val) -> Self {
        Value {
            cell: Rc::new(ValueCell { val }),
        }
    }

    pub fn boolean(b: bool) -> Self {
        Self::create(Val::Boolean(b))
    }

    pub fn integer(i: i64) -> Self {
        Self::create(Val::Integer(i))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::create(Val::String(s.into()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::create(Val::List(items))
    }

    /// Create a map; a later entry replaces an earlier one with an equal key
    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        let mut unique: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match unique.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => unique.push((key, value)),
            }
        }
        Self::create(Val::Map(unique))
    }

    pub fn pair(first: Value, second: Value) -> Self {
        Self::create(Val::Pair(first, second))
    }

    pub fn record(record: Record) -> Self {
        Self::create(Val::Record(record))
    }

    /// Kind tag
    pub fn kind(&self) -> ValueKind {
        self.cell.val.kind()
    }

    /// Borrow the payload
    pub fn val(&self) -> &Val {
        &self.cell.val
    }

    /// Add a holder and return a handle onto the same cell
    pub fn retain(&self) -> Value {
        self.clone()
    }

    /// Give up this holder; tears the value down if it was the last one
    pub fn release(self) {
        drop(self)
    }

    /// Number of live holders
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.cell)
    }

    /// Non-owning view of this value
    pub fn downgrade(&self) -> WeakValue {
        WeakValue {
            cell: Rc::downgrade(&self.cell),
        }
    }

    /// Whether both handles point at the same cell
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.val() {
            Val::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.val() {
            Val::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.val() {
            Val::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self.val() {
            Val::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self.val() {
            Val::Map(entries) => Some(entries.as_slice()),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<(&Value, &Value)> {
        match self.val() {
            Val::Pair(first, second) => Some((first, second)),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self.val() {
            Val::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Look up a map entry by key equality
    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Element count of a list or map
    pub fn len(&self) -> Option<usize> {
        match self.val() {
            Val::List(items) => Some(items.len()),
            Val::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }
}

impl WeakValue {
    /// Handle onto the value if any owner still holds it
    pub fn upgrade(&self) -> Option<Value> {
        self.cell.upgrade().map(|cell| Value { cell })
    }

    /// Whether the value is still alive
    pub fn is_live(&self) -> bool {
        self.cell.strong_count() > 0
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.cell.val, f)
    }
}

impl fmt::Debug for WeakValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(value) => write!(f, "WeakValue({:?})", value),
            None => f.write_str("WeakValue(<released>)"),
        }
    }
}

/// Equality by kind and payload; records compare by identity
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.val(), other.val()) {
            (Val::Boolean(a), Val::Boolean(b)) => a == b,
            (Val::Integer(a), Val::Integer(b)) => a == b,
            (Val::String(a), Val::String(b)) => a == b,
            (Val::List(a), Val::List(b)) => a == b,
            (Val::Map(a), Val::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter().any(|(k, v)| k == key && v == value)
                    })
            }
            (Val::Pair(a1, a2), Val::Pair(b1, b2)) => a1 == b1 && a2 == b2,
            (Val::Record(a), Val::Record(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::record(record)
    }
}

/* ===================== Null-tolerant lifecycle ===================== */

/// Kind of a possibly absent value
pub fn type_of(value: Option<&Value>) -> Option<ValueKind> {
    value.map(Value::kind)
}

/// Retain a possibly absent value; absent stays absent
pub fn retain(value: Option<&Value>) -> Option<Value> {
    value.map(Value::retain)
}

/// Release a possibly absent value; absent is a no-op
pub fn release(value: Option<Value>) {
    if let Some(value) = value {
        value.release();
    }
}

/// Narrow a script number to an integer.
///
/// Lossy: the fractional part is truncated toward zero, values beyond the
/// `i64` range saturate and NaN becomes 0.
pub fn narrow_number(n: f64) -> i64 {
    n as i64
}
