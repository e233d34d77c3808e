//! Engine state
//!
//! Holds everything a running script touches on the host's side:
//! - stack: slots of every active frame, bottom frame first
//! - frames: base offset of each host-function call in progress
//! - heap: userdata cells, reclaimed by `collect_garbage`
//! - types/functions: registered behavior and callable host functions

use super::heap::{Heap, Userdata};
use super::{HostFn, ScriptType, ScriptValue, TableRef, TypeMeta, UserdataRef};
use crate::config::EngineConfig;
use crate::error::{ScriptError, ScriptResult};
use crate::value::narrow_number;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Key of a pinned root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinKey(u32);

/* ===================== State ===================== */

/// Host-side view of one script engine instance
pub struct ScriptState {
    stack: Vec<ScriptValue>,
    frames: Vec<usize>,
    heap: Heap,
    types: HashMap<&'static str, TypeMeta>,
    functions: HashMap<String, HostFn>,
    pinned: HashMap<PinKey, ScriptValue>,
    next_pin: u32,
    next_table: u32,
    max_stack_size: usize,
    gc_pause: usize,
    allocs_since_gc: usize,
}

impl ScriptState {
    pub fn new(config: &EngineConfig) -> Self {
        ScriptState {
            stack: Vec::new(),
            frames: Vec::new(),
            heap: Heap::default(),
            types: HashMap::new(),
            functions: HashMap::new(),
            pinned: HashMap::new(),
            next_pin: 0,
            next_table: 0,
            max_stack_size: config.max_stack_size,
            gc_pause: config.gc_pause,
            allocs_since_gc: 0,
        }
    }

    /* ===================== Stack ===================== */

    fn base(&self) -> usize {
        self.frames.last().copied().unwrap_or(0)
    }

    /// Stack offset of a frame-relative position
    fn abs_index(&self, index: i32) -> Option<usize> {
        let base = self.base();
        let len = self.stack.len();
        if index > 0 {
            let pos = base + (index as usize - 1);
            (pos < len).then_some(pos)
        } else if index < 0 {
            let back = index.unsigned_abs() as usize;
            (back <= len - base).then(|| len - back)
        } else {
            None
        }
    }

    /// Number of slots in the current frame
    pub fn top(&self) -> i32 {
        (self.stack.len() - self.base()) as i32
    }

    /// Grow the frame with nils or shrink it to `top` slots
    pub fn set_top(&mut self, top: usize) -> ScriptResult<()> {
        let target = self.base() + top;
        if target > self.max_stack_size {
            return Err(ScriptError::StackOverflow {
                limit: self.max_stack_size,
            });
        }
        self.stack.resize(target, ScriptValue::Nil);
        Ok(())
    }

    /// Pop up to `n` slots of the current frame
    pub fn pop(&mut self, n: usize) {
        let keep = self.stack.len().saturating_sub(n).max(self.base());
        self.stack.truncate(keep);
    }

    pub fn push(&mut self, value: ScriptValue) -> ScriptResult<()> {
        if self.stack.len() >= self.max_stack_size {
            return Err(ScriptError::StackOverflow {
                limit: self.max_stack_size,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn push_nil(&mut self) -> ScriptResult<()> {
        self.push(ScriptValue::Nil)
    }

    pub fn push_boolean(&mut self, b: bool) -> ScriptResult<()> {
        self.push(ScriptValue::Boolean(b))
    }

    pub fn push_integer(&mut self, i: i64) -> ScriptResult<()> {
        self.push(ScriptValue::Integer(i))
    }

    pub fn push_number(&mut self, n: f64) -> ScriptResult<()> {
        self.push(ScriptValue::Number(n))
    }

    /// Push a script string holding a copy of `s`
    pub fn push_string(&mut self, s: &str) -> ScriptResult<()> {
        self.push(ScriptValue::Str(Rc::from(s)))
    }

    /// Create an empty table and push it
    pub fn new_table(&mut self) -> ScriptResult<TableRef> {
        let table = TableRef(self.next_table);
        self.push(ScriptValue::Table(table))?;
        self.next_table += 1;
        Ok(table)
    }

    pub fn value_at(&self, index: i32) -> Option<&ScriptValue> {
        self.abs_index(index).map(|pos| &self.stack[pos])
    }

    pub fn type_of(&self, index: i32) -> ScriptType {
        self.value_at(index)
            .map(ScriptValue::script_type)
            .unwrap_or(ScriptType::None)
    }

    pub fn to_boolean(&self, index: i32) -> bool {
        self.value_at(index).is_some_and(ScriptValue::is_truthy)
    }

    pub fn to_number(&self, index: i32) -> Option<f64> {
        match self.value_at(index)? {
            ScriptValue::Integer(i) => Some(*i as f64),
            ScriptValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer at `index`; floats are truncated
    pub fn to_integer(&self, index: i32) -> Option<i64> {
        match self.value_at(index)? {
            ScriptValue::Integer(i) => Some(*i),
            ScriptValue::Number(n) => Some(narrow_number(*n)),
            _ => None,
        }
    }

    pub fn to_str(&self, index: i32) -> Option<Rc<str>> {
        match self.value_at(index)? {
            ScriptValue::Str(s) => Some(Rc::clone(s)),
            _ => None,
        }
    }

    /* ===================== Userdata ===================== */

    /// Allocate a userdata cell around `payload` and push it
    pub fn new_userdata(&mut self, payload: Box<dyn Any>) -> ScriptResult<UserdataRef> {
        if self.stack.len() >= self.max_stack_size {
            return Err(ScriptError::StackOverflow {
                limit: self.max_stack_size,
            });
        }
        let r = self.heap.alloc(Userdata {
            payload,
            type_name: None,
            marked: false,
        });
        self.allocs_since_gc += 1;
        self.stack.push(ScriptValue::Userdata(r));
        Ok(r)
    }

    /// Live userdata at `index`
    pub fn userdata_at(&self, index: i32) -> Option<UserdataRef> {
        match self.value_at(index)? {
            ScriptValue::Userdata(r) if self.heap.get(*r).is_some() => Some(*r),
            _ => None,
        }
    }

    pub fn userdata<T: Any>(&self, r: UserdataRef) -> Option<&T> {
        self.heap.get(r)?.payload.downcast_ref::<T>()
    }

    pub fn userdata_mut<T: Any>(&mut self, r: UserdataRef) -> Option<&mut T> {
        self.heap.get_mut(r)?.payload.downcast_mut::<T>()
    }

    /// Attach the registered metadata of `type_name` to a cell.
    ///
    /// An unregistered name leaves the cell untyped. Returns whether the type
    /// was found.
    pub fn set_userdata_type(&mut self, r: UserdataRef, type_name: &str) -> bool {
        let registered = self.types.get_key_value(type_name).map(|(name, _)| *name);
        if let Some(cell) = self.heap.get_mut(r) {
            cell.type_name = registered;
        }
        registered.is_some()
    }

    pub fn userdata_type(&self, r: UserdataRef) -> Option<&'static str> {
        self.heap.get(r)?.type_name
    }

    /// Number of live userdata cells
    pub fn heap_size(&self) -> usize {
        self.heap.len()
    }

    /* ===================== Registry ===================== */

    pub fn register_type(&mut self, meta: TypeMeta) {
        self.types.insert(meta.name, meta);
    }

    pub fn type_meta(&self, type_name: &str) -> Option<&TypeMeta> {
        self.types.get(type_name)
    }

    pub fn register_function(&mut self, name: impl Into<String>, f: HostFn) {
        self.functions.insert(name.into(), f);
    }

    /// Keep a value alive across collections until `unpin`
    pub fn pin(&mut self, value: ScriptValue) -> PinKey {
        let key = PinKey(self.next_pin);
        self.next_pin += 1;
        self.pinned.insert(key, value);
        key
    }

    pub fn unpin(&mut self, key: PinKey) -> Option<ScriptValue> {
        self.pinned.remove(&key)
    }

    pub fn pinned(&self, key: PinKey) -> Option<&ScriptValue> {
        self.pinned.get(&key)
    }

    /* ===================== Calls ===================== */

    /// Call a registered function by name
    pub fn call(&mut self, name: &str, args: Vec<ScriptValue>) -> ScriptResult<Vec<ScriptValue>> {
        let f = *self
            .functions
            .get(name)
            .ok_or_else(|| ScriptError::UnknownFunction(name.to_string()))?;
        self.call_function(f, args)
    }

    /// Run `f` in a fresh frame holding `args` and return what it pushed.
    ///
    /// An error aborts the call: the frame is discarded either way.
    pub fn call_function(
        &mut self,
        f: HostFn,
        args: Vec<ScriptValue>,
    ) -> ScriptResult<Vec<ScriptValue>> {
        let base = self.stack.len();
        self.frames.push(base);
        let outcome = self.run_frame(f, args);
        self.stack.truncate(base);
        self.frames.pop();
        outcome
    }

    fn run_frame(&mut self, f: HostFn, args: Vec<ScriptValue>) -> ScriptResult<Vec<ScriptValue>> {
        for arg in args {
            self.push(arg)?;
        }
        if self.gc_pause > 0 && self.allocs_since_gc >= self.gc_pause {
            self.collect_garbage();
        }
        let pushed = f(self)?;
        let available = self.top() as usize;
        let results = self.stack.split_off(self.stack.len() - pushed.min(available));
        Ok(results)
    }

    /// Build the checked type-mismatch error for position `index`
    pub fn type_error(&self, index: i32, expected: &str) -> ScriptError {
        let found = match self.value_at(index) {
            Some(ScriptValue::Userdata(r)) => self
                .userdata_type(*r)
                .unwrap_or(ScriptType::Userdata.name())
                .to_string(),
            _ => self.type_of(index).name().to_string(),
        };
        ScriptError::type_mismatch(index, expected, found)
    }

    /* ===================== Metadata dispatch ===================== */

    fn meta_fn(&self, value: &ScriptValue, pick: fn(&TypeMeta) -> Option<HostFn>) -> Option<HostFn> {
        match value {
            ScriptValue::Userdata(r) => {
                let name = self.userdata_type(*r)?;
                pick(self.types.get(name)?)
            }
            _ => None,
        }
    }

    fn operand(&self, index: i32) -> ScriptResult<ScriptValue> {
        self.value_at(index)
            .cloned()
            .ok_or(ScriptError::InvalidIndex(index))
    }

    /// Equality of two slots, using the type's `eq` for userdata of one type
    pub fn equals(&mut self, a: i32, b: i32) -> ScriptResult<bool> {
        let (va, vb) = (self.operand(a)?, self.operand(b)?);
        if va.raw_equal(&vb) {
            return Ok(true);
        }
        let same_type = match (&va, &vb) {
            (ScriptValue::Userdata(ra), ScriptValue::Userdata(rb)) => {
                self.userdata_type(*ra).is_some()
                    && self.userdata_type(*ra) == self.userdata_type(*rb)
            }
            _ => false,
        };
        if !same_type {
            return Ok(false);
        }
        match self.meta_fn(&va, |m| m.eq) {
            Some(eq) => {
                let results = self.call_function(eq, vec![va, vb])?;
                Ok(results.first().is_some_and(ScriptValue::is_truthy))
            }
            None => Ok(false),
        }
    }

    /// String form of a slot, using the type's `tostring` when present
    pub fn tostring(&mut self, index: i32) -> ScriptResult<String> {
        let value = self.operand(index)?;
        if let Some(tostring) = self.meta_fn(&value, |m| m.tostring) {
            let results = self.call_function(tostring, vec![value])?;
            return match results.first() {
                Some(ScriptValue::Str(s)) => Ok(s.to_string()),
                _ => Err(ScriptError::runtime("'tostring' must return a string")),
            };
        }
        Ok(match &value {
            ScriptValue::Nil => "nil".to_string(),
            ScriptValue::Boolean(b) => b.to_string(),
            ScriptValue::Integer(i) => i.to_string(),
            ScriptValue::Number(n) => n.to_string(),
            ScriptValue::Str(s) => s.to_string(),
            ScriptValue::Table(t) => format!("table: {}", t.0),
            ScriptValue::Function(f) => format!("function: {:#x}", *f as usize),
            ScriptValue::LightUserdata(p) => format!("userdata: {:#x}", p),
            ScriptValue::Userdata(r) => match self.userdata_type(*r) {
                Some(name) => format!("{}: {}", name, r.index),
                None => format!("userdata: {}", r.index),
            },
        })
    }

    /// `object[key]` through the type's `index`
    pub fn index(&mut self, object: i32, key: ScriptValue) -> ScriptResult<ScriptValue> {
        let value = self.operand(object)?;
        match self.meta_fn(&value, |m| m.index) {
            Some(index) => {
                let mut results = self.call_function(index, vec![value, key])?;
                Ok(if results.is_empty() {
                    ScriptValue::Nil
                } else {
                    results.swap_remove(0)
                })
            }
            None => Err(ScriptError::runtime(format!(
                "attempt to index a {} value",
                value.script_type()
            ))),
        }
    }

    /// `object[key] = value` through the type's `newindex`
    pub fn set_index(
        &mut self,
        object: i32,
        key: ScriptValue,
        value: ScriptValue,
    ) -> ScriptResult<()> {
        let target = self.operand(object)?;
        match self.meta_fn(&target, |m| m.newindex) {
            Some(newindex) => {
                self.call_function(newindex, vec![target, key, value])?;
                Ok(())
            }
            None => Err(ScriptError::runtime(format!(
                "attempt to index a {} value",
                target.script_type()
            ))),
        }
    }

    /// Length of a string, or of userdata through the type's `len`
    pub fn len(&mut self, index: i32) -> ScriptResult<ScriptValue> {
        let value = self.operand(index)?;
        if let ScriptValue::Str(s) = &value {
            return Ok(ScriptValue::Integer(s.len() as i64));
        }
        match self.meta_fn(&value, |m| m.len) {
            Some(len) => {
                let mut results = self.call_function(len, vec![value])?;
                Ok(if results.is_empty() {
                    ScriptValue::Nil
                } else {
                    results.swap_remove(0)
                })
            }
            None => Err(ScriptError::runtime(format!(
                "attempt to get length of a {} value",
                value.script_type()
            ))),
        }
    }

    /* ===================== Collection ===================== */

    /// Reclaim every userdata cell unreachable from the stack and pinned
    /// roots, running each typed cell's finalizer first. Returns the number
    /// of cells reclaimed.
    pub fn collect_garbage(&mut self) -> usize {
        self.allocs_since_gc = 0;
        for r in self.heap.refs() {
            if let Some(cell) = self.heap.get_mut(r) {
                cell.marked = false;
            }
        }
        let roots: Vec<UserdataRef> = self
            .stack
            .iter()
            .chain(self.pinned.values())
            .filter_map(|v| match v {
                ScriptValue::Userdata(r) => Some(*r),
                _ => None,
            })
            .collect();
        for r in roots {
            if let Some(cell) = self.heap.get_mut(r) {
                cell.marked = true;
            }
        }

        let garbage: Vec<UserdataRef> = self
            .heap
            .refs()
            .into_iter()
            .filter(|r| self.heap.get(*r).is_some_and(|cell| !cell.marked))
            .collect();

        for r in &garbage {
            let finalizer = self
                .userdata_type(*r)
                .and_then(|name| self.types.get(name))
                .and_then(|meta| meta.gc);
            if let Some(gc) = finalizer {
                if let Err(err) = self.call_function(gc, vec![ScriptValue::Userdata(*r)]) {
                    tracing::warn!(error = %err, "userdata finalizer failed");
                }
            }
            // Whatever the payload still owns is dropped with it
            self.heap.free(*r);
        }

        tracing::debug!(
            collected = garbage.len(),
            live = self.heap.len(),
            "garbage collected"
        );
        garbage.len()
    }
}

impl Drop for ScriptState {
    fn drop(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.pinned.clear();
        self.collect_garbage();
    }
}

impl fmt::Debug for ScriptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptState")
            .field("stack", &self.stack)
            .field("frames", &self.frames)
            .field("heap_size", &self.heap.len())
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}
