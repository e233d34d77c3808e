//! Script engine surface
//!
//! The slice of an embedded, garbage-collected scripting engine that host
//! code talks to: a value stack with Lua-style indexing, a heap of userdata
//! cells, per-type behavior metadata and host-function call dispatch.
//!
//! There is no language here. Script code is represented by the host
//! functions it would call and the stack traffic those calls produce.

mod heap;
mod state;

#[cfg(test)]
mod tests;

pub use state::{PinKey, ScriptState};

use crate::error::ScriptResult;
use std::fmt;
use std::rc::Rc;

/// Function callable from script code.
///
/// Arguments sit at positions `1..=top()` of a fresh frame. The function
/// pushes its results and returns how many it pushed.
pub type HostFn = fn(&mut ScriptState) -> ScriptResult<usize>;

/// Reference to a userdata cell on the engine heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserdataRef {
    index: u32,
    generation: u32,
}

/// Opaque engine-owned composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableRef(u32);

/// A value as the engine sees it
#[derive(Debug, Clone)]
pub enum ScriptValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    Str(Rc<str>),
    Table(TableRef),
    Function(HostFn),
    LightUserdata(usize),
    Userdata(UserdataRef),
}

impl ScriptValue {
    pub fn script_type(&self) -> ScriptType {
        match self {
            ScriptValue::Nil => ScriptType::Nil,
            ScriptValue::Boolean(_) => ScriptType::Boolean,
            ScriptValue::Integer(_) | ScriptValue::Number(_) => ScriptType::Number,
            ScriptValue::Str(_) => ScriptType::String,
            ScriptValue::Table(_) => ScriptType::Table,
            ScriptValue::Function(_) => ScriptType::Function,
            ScriptValue::LightUserdata(_) => ScriptType::LightUserdata,
            ScriptValue::Userdata(_) => ScriptType::Userdata,
        }
    }

    /// Truthiness: everything but nil and false
    pub fn is_truthy(&self) -> bool {
        !matches!(self, ScriptValue::Nil | ScriptValue::Boolean(false))
    }

    /// Primitive equality, without consulting type metadata
    pub fn raw_equal(&self, other: &ScriptValue) -> bool {
        match (self, other) {
            (ScriptValue::Nil, ScriptValue::Nil) => true,
            (ScriptValue::Boolean(a), ScriptValue::Boolean(b)) => a == b,
            (ScriptValue::Integer(a), ScriptValue::Integer(b)) => a == b,
            (ScriptValue::Number(a), ScriptValue::Number(b)) => a == b,
            (ScriptValue::Integer(a), ScriptValue::Number(b))
            | (ScriptValue::Number(b), ScriptValue::Integer(a)) => (*a as f64) == *b,
            (ScriptValue::Str(a), ScriptValue::Str(b)) => a == b,
            (ScriptValue::Table(a), ScriptValue::Table(b)) => a == b,
            (ScriptValue::Function(a), ScriptValue::Function(b)) => *a as usize == *b as usize,
            (ScriptValue::LightUserdata(a), ScriptValue::LightUserdata(b)) => a == b,
            (ScriptValue::Userdata(a), ScriptValue::Userdata(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::Str(Rc::from(s))
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        ScriptValue::Integer(i)
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Boolean(b)
    }
}

/// Runtime type of a stack slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    /// Position outside the current frame
    None,
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function,
    LightUserdata,
    Userdata,
}

impl ScriptType {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptType::None => "no value",
            ScriptType::Nil => "nil",
            ScriptType::Boolean => "boolean",
            ScriptType::Number => "number",
            ScriptType::String => "string",
            ScriptType::Table => "table",
            ScriptType::Function => "function",
            ScriptType::LightUserdata | ScriptType::Userdata => "userdata",
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Behavior the engine dispatches for userdata of one named type
#[derive(Debug, Clone)]
pub struct TypeMeta {
    pub name: &'static str,
    /// Finalizer, called with the cell at position 1 before it is freed
    pub gc: Option<HostFn>,
    pub eq: Option<HostFn>,
    pub tostring: Option<HostFn>,
    pub index: Option<HostFn>,
    pub newindex: Option<HostFn>,
    pub len: Option<HostFn>,
}

impl TypeMeta {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            gc: None,
            eq: None,
            tostring: None,
            index: None,
            newindex: None,
            len: None,
        }
    }

    pub fn with_gc(mut self, f: HostFn) -> Self {
        self.gc = Some(f);
        self
    }

    pub fn with_eq(mut self, f: HostFn) -> Self {
        self.eq = Some(f);
        self
    }

    pub fn with_tostring(mut self, f: HostFn) -> Self {
        self.tostring = Some(f);
        self
    }

    pub fn with_index(mut self, f: HostFn) -> Self {
        self.index = Some(f);
        self
    }

    pub fn with_newindex(mut self, f: HostFn) -> Self {
        self.newindex = Some(f);
        self
    }

    pub fn with_len(mut self, f: HostFn) -> Self {
        self.len = Some(f);
        self
    }
}
