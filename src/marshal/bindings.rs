//! Script-side behavior of published boxes
//!
//! Registers type metadata for each box type so scripts can index, measure,
//! compare and print host values, and so the collector finalizes boxes.

use super::boxes::{box_value, finalize_box, peek_box, unwrap_typed};
use super::{push_option, to_native, LIST_TYPE, MAP_TYPE, PAIR_TYPE, RECORD_TYPE};
use crate::engine::{ScriptState, TypeMeta};
use crate::error::{ScriptError, ScriptResult};
use crate::record::Record;
use crate::value::Value;

/* ===================== Registration ===================== */

/// Register the `List`, `Map`, `Pair` and `Record` box types
pub fn register_bindings(state: &mut ScriptState) {
    state.register_type(
        TypeMeta::new(LIST_TYPE)
            .with_index(list_index)
            .with_len(list_len)
            .with_eq(box_eq)
            .with_tostring(box_tostring)
            .with_gc(list_gc),
    );
    state.register_type(
        TypeMeta::new(MAP_TYPE)
            .with_index(map_index)
            .with_len(map_len)
            .with_eq(box_eq)
            .with_tostring(box_tostring)
            .with_gc(map_gc),
    );
    state.register_type(
        TypeMeta::new(PAIR_TYPE)
            .with_index(pair_index)
            .with_eq(box_eq)
            .with_tostring(box_tostring)
            .with_gc(pair_gc),
    );
    state.register_type(
        TypeMeta::new(RECORD_TYPE)
            .with_index(record_index)
            .with_newindex(record_newindex)
            .with_tostring(box_tostring)
            .with_gc(record_gc),
    );
}

/// Value of the `type_name` box at `position`
fn boxed(state: &ScriptState, position: i32, type_name: &str) -> ScriptResult<Value> {
    let r = unwrap_typed(state, position, type_name)?;
    box_value(state, r)
        .ok_or_else(|| ScriptError::runtime(format!("{} has been released", type_name)))
}

fn integer_arg(state: &ScriptState, position: i32) -> ScriptResult<i64> {
    state
        .to_integer(position)
        .ok_or_else(|| state.type_error(position, "number"))
}

/* ===================== Shared ===================== */

fn box_eq(state: &mut ScriptState) -> ScriptResult<usize> {
    let a = peek_box(state, 1).and_then(|b| b.value());
    let b = peek_box(state, 2).and_then(|b| b.value());
    let equal = matches!((a, b), (Some(a), Some(b)) if a == b);
    state.push_boolean(equal)?;
    Ok(1)
}

fn box_tostring(state: &mut ScriptState) -> ScriptResult<usize> {
    let text = match peek_box(state, 1).and_then(|b| b.value()) {
        Some(value) => value.to_string(),
        None => "<released>".to_string(),
    };
    state.push_string(&text)?;
    Ok(1)
}

/* ===================== List ===================== */

/// `list[i]`, 1-based; nil outside the list
fn list_index(state: &mut ScriptState) -> ScriptResult<usize> {
    let list = boxed(state, 1, LIST_TYPE)?;
    let index = integer_arg(state, 2)?;
    let item = list
        .as_list()
        .and_then(|items| usize::try_from(index).ok()?.checked_sub(1).and_then(|i| items.get(i)))
        .cloned();
    push_option(state, item.as_ref())?;
    Ok(1)
}

fn list_len(state: &mut ScriptState) -> ScriptResult<usize> {
    let list = boxed(state, 1, LIST_TYPE)?;
    state.push_integer(list.len().unwrap_or(0) as i64)?;
    Ok(1)
}

fn list_gc(state: &mut ScriptState) -> ScriptResult<usize> {
    finalize_box(state, 1, LIST_TYPE)?;
    Ok(0)
}

/* ===================== Map ===================== */

/// `map[key]`; nil when the key is absent or has no host form
fn map_index(state: &mut ScriptState) -> ScriptResult<usize> {
    let map = boxed(state, 1, MAP_TYPE)?;
    let found = to_native(state, 2).and_then(|key| map.map_get(&key).cloned());
    push_option(state, found.as_ref())?;
    Ok(1)
}

fn map_len(state: &mut ScriptState) -> ScriptResult<usize> {
    let map = boxed(state, 1, MAP_TYPE)?;
    state.push_integer(map.len().unwrap_or(0) as i64)?;
    Ok(1)
}

fn map_gc(state: &mut ScriptState) -> ScriptResult<usize> {
    finalize_box(state, 1, MAP_TYPE)?;
    Ok(0)
}

/* ===================== Pair ===================== */

/// `pair[1]` is the first element, `pair[2]` the second
fn pair_index(state: &mut ScriptState) -> ScriptResult<usize> {
    let pair = boxed(state, 1, PAIR_TYPE)?;
    let index = integer_arg(state, 2)?;
    let item = pair.as_pair().and_then(|(first, second)| match index {
        1 => Some(first.clone()),
        2 => Some(second.clone()),
        _ => None,
    });
    push_option(state, item.as_ref())?;
    Ok(1)
}

fn pair_gc(state: &mut ScriptState) -> ScriptResult<usize> {
    finalize_box(state, 1, PAIR_TYPE)?;
    Ok(0)
}

/* ===================== Record ===================== */

fn record_arg(state: &ScriptState) -> ScriptResult<Record> {
    let value = boxed(state, 1, RECORD_TYPE)?;
    Record::from_value(&value).ok_or_else(|| state.type_error(1, RECORD_TYPE))
}

fn bin_name_arg(state: &ScriptState) -> ScriptResult<String> {
    state
        .to_str(2)
        .map(|name| name.to_string())
        .ok_or_else(|| state.type_error(2, "string"))
}

/// `record[name]` reads a bin
fn record_index(state: &mut ScriptState) -> ScriptResult<usize> {
    let record = record_arg(state)?;
    let name = bin_name_arg(state)?;
    let value = record.get(&name);
    push_option(state, value.as_ref())?;
    Ok(1)
}

/// `record[name] = value` writes a bin; a hook failure aborts the script call
fn record_newindex(state: &mut ScriptState) -> ScriptResult<usize> {
    let record = record_arg(state)?;
    let name = bin_name_arg(state)?;
    let value = to_native(state, 3).ok_or_else(|| {
        ScriptError::runtime(format!("bin '{}' cannot be set to {}", name, state.type_of(3)))
    })?;
    record.set(&name, &value)?;
    Ok(0)
}

fn record_gc(state: &mut ScriptState) -> ScriptResult<usize> {
    finalize_box(state, 1, RECORD_TYPE)?;
    Ok(0)
}
