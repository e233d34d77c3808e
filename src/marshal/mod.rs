//! Boundary marshalling
//!
//! Converts values crossing the host/script call interface and decides, per
//! value, which side owns its lifetime:
//!
//! | host kind        | on the script stack                         |
//! |------------------|---------------------------------------------|
//! | boolean/integer  | primitive copy, count untouched             |
//! | string           | independent script string copy              |
//! | list/map/pair    | `Script`-scoped box holding a new reference |
//! | record           | nil (publish with `push_record` instead)    |
//!
//! In the other direction numbers become integers (lossy, see
//! `to_native`), strings are duplicated, boxes are unboxed per scope and
//! everything else is absent.

mod bindings;
mod boxes;

#[cfg(test)]
mod tests;

pub use bindings::register_bindings;
pub use boxes::{
    box_value, finalize_box, new_box, peek_box, publish_box, unwrap_typed, Scope, ValueBox,
};

use crate::engine::{ScriptState, ScriptValue, UserdataRef};
use crate::error::{ScriptError, ScriptResult};
use crate::value::{narrow_number, Val, Value, ValueKind};

/// Type name of boxed lists
pub const LIST_TYPE: &str = "List";
/// Type name of boxed maps
pub const MAP_TYPE: &str = "Map";
/// Type name of boxed pairs
pub const PAIR_TYPE: &str = "Pair";
/// Type name of boxed records
pub const RECORD_TYPE: &str = "Record";

/* ===================== Script to host ===================== */

/// Read the slot at `position` as a host value.
///
/// - numbers become integers. This is a lossy narrowing: fractions are
///   truncated toward zero, out-of-range floats saturate, NaN becomes 0.
/// - booleans are copied.
/// - strings are duplicated; the value owns its own buffer.
/// - boxes yield their value: a `Script` box hands out a retained handle,
///   a `Host` box lends the host's value without adding a lasting holder.
/// - nil, tables, functions, light userdata and empty positions are absent.
pub fn to_native(state: &ScriptState, position: i32) -> Option<Value> {
    match state.value_at(position)? {
        ScriptValue::Integer(i) => Some(Value::integer(*i)),
        ScriptValue::Number(n) => Some(Value::integer(narrow_number(*n))),
        ScriptValue::Boolean(b) => Some(Value::boolean(*b)),
        ScriptValue::Str(s) => Some(Value::string(s.to_string())),
        ScriptValue::Userdata(r) => {
            let boxed = state.userdata::<ValueBox>(*r)?;
            let value = boxed.value();
            tracing::trace!(
                scope = ?boxed.scope(),
                found = value.is_some(),
                "unboxed script value"
            );
            value
        }
        ScriptValue::Nil
        | ScriptValue::Table(_)
        | ScriptValue::Function(_)
        | ScriptValue::LightUserdata(_) => None,
    }
}

/// Argument `position` of the running host function
pub fn take_arg(state: &ScriptState, position: i32) -> Option<Value> {
    to_native(state, position)
}

/// Value on top of the stack, as left by a script return
pub fn return_value(state: &ScriptState) -> Option<Value> {
    to_native(state, -1)
}

/* ===================== Host to script ===================== */

/// Push `value` onto the script stack as exactly one slot
pub fn from_native(state: &mut ScriptState, value: &Value) -> ScriptResult<()> {
    match value.val() {
        Val::Boolean(b) => state.push_boolean(*b),
        Val::Integer(i) => state.push_integer(*i),
        Val::String(s) => state.push_string(s),
        Val::List(_) => publish_box(state, Scope::Script, value, LIST_TYPE).map(drop),
        Val::Map(_) => publish_box(state, Scope::Script, value, MAP_TYPE).map(drop),
        Val::Pair(_, _) => publish_box(state, Scope::Script, value, PAIR_TYPE).map(drop),
        Val::Record(_) => state.push_nil(),
    }
}

/// Push `value`, or nil when absent
pub fn push_option(state: &mut ScriptState, value: Option<&Value>) -> ScriptResult<()> {
    match value {
        Some(value) => from_native(state, value),
        None => state.push_nil(),
    }
}

/// Publish a host-held record value to scripts as a `Host`-scoped box.
///
/// The box is only a view: the caller keeps `record` alive for as long as
/// scripts may use it, and collecting the box never frees the record.
pub fn push_record(state: &mut ScriptState, record: &Value) -> ScriptResult<UserdataRef> {
    if record.kind() != ValueKind::Record {
        return Err(ScriptError::runtime(format!(
            "expected a record value, got {}",
            record.kind()
        )));
    }
    publish_box(state, Scope::Host, record, RECORD_TYPE)
}
