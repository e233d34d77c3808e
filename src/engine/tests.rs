//! Engine surface tests: stack discipline, calls, metadata and collection

use super::*;
use crate::config::EngineConfig;
use crate::error::ScriptError;
use std::cell::Cell;

fn new_state() -> ScriptState {
    ScriptState::new(&EngineConfig::default())
}

fn state_with(max_stack_size: usize, gc_pause: usize) -> ScriptState {
    ScriptState::new(&EngineConfig {
        max_stack_size,
        gc_pause,
    })
}

/// Payload that counts how often its finalizer ran
struct Tracker {
    id: i64,
    finalized: Rc<Cell<usize>>,
}

const TRACKER: &str = "Tracker";

fn tracker_gc(state: &mut ScriptState) -> ScriptResult<usize> {
    let r = state
        .userdata_at(1)
        .ok_or_else(|| state.type_error(1, TRACKER))?;
    if let Some(tracker) = state.userdata::<Tracker>(r) {
        tracker.finalized.set(tracker.finalized.get() + 1);
    }
    Ok(0)
}

fn tracker_id(state: &ScriptState, position: i32) -> ScriptResult<i64> {
    state
        .userdata_at(position)
        .and_then(|r| state.userdata::<Tracker>(r))
        .map(|t| t.id)
        .ok_or_else(|| state.type_error(position, TRACKER))
}

fn tracker_eq(state: &mut ScriptState) -> ScriptResult<usize> {
    let equal = tracker_id(state, 1)? == tracker_id(state, 2)?;
    state.push_boolean(equal)?;
    Ok(1)
}

fn tracker_tostring(state: &mut ScriptState) -> ScriptResult<usize> {
    let id = tracker_id(state, 1)?;
    state.push_string(&format!("tracker #{}", id))?;
    Ok(1)
}

fn tracker_index(state: &mut ScriptState) -> ScriptResult<usize> {
    let id = tracker_id(state, 1)?;
    let offset = state.to_integer(2).ok_or_else(|| state.type_error(2, "number"))?;
    state.push_integer(id + offset)?;
    Ok(1)
}

fn tracker_len(state: &mut ScriptState) -> ScriptResult<usize> {
    state.push_integer(3)?;
    Ok(1)
}

fn register_tracker(state: &mut ScriptState) {
    state.register_type(
        TypeMeta::new(TRACKER)
            .with_gc(tracker_gc)
            .with_eq(tracker_eq)
            .with_tostring(tracker_tostring)
            .with_index(tracker_index)
            .with_len(tracker_len),
    );
}

fn push_tracker(state: &mut ScriptState, id: i64, finalized: &Rc<Cell<usize>>) -> UserdataRef {
    let r = state
        .new_userdata(Box::new(Tracker {
            id,
            finalized: Rc::clone(finalized),
        }))
        .expect("push tracker");
    assert!(state.set_userdata_type(r, TRACKER));
    r
}

/* ===================== Stack ===================== */

#[test]
fn test_positive_and_negative_indices() {
    let mut state = new_state();
    state.push_integer(1).unwrap();
    state.push_string("two").unwrap();
    state.push_boolean(true).unwrap();

    assert_eq!(state.top(), 3);
    assert_eq!(state.to_integer(1), Some(1));
    assert_eq!(state.to_str(2).as_deref(), Some("two"));
    assert!(state.to_boolean(-1));
    assert_eq!(state.to_str(-2).as_deref(), Some("two"));
    assert_eq!(state.to_integer(-3), Some(1));
}

#[test]
fn test_out_of_frame_positions_have_no_value() {
    let mut state = new_state();
    state.push_nil().unwrap();

    assert_eq!(state.type_of(1), ScriptType::Nil);
    assert_eq!(state.type_of(2), ScriptType::None);
    assert_eq!(state.type_of(-2), ScriptType::None);
    assert_eq!(state.type_of(0), ScriptType::None);
    assert!(state.value_at(5).is_none());
    assert!(!state.to_boolean(5));
}

#[test]
fn test_set_top_and_pop() {
    let mut state = new_state();
    state.set_top(3).unwrap();
    assert_eq!(state.top(), 3);
    assert_eq!(state.type_of(3), ScriptType::Nil);

    state.pop(2);
    assert_eq!(state.top(), 1);
    state.pop(10);
    assert_eq!(state.top(), 0);
}

#[test]
fn test_stack_overflow() {
    let mut state = state_with(2, 0);
    state.push_integer(1).unwrap();
    state.push_integer(2).unwrap();

    assert_eq!(
        state.push_integer(3),
        Err(ScriptError::StackOverflow { limit: 2 })
    );
    assert!(state.new_userdata(Box::new(0_u8)).is_err());
    assert_eq!(state.heap_size(), 0);
    assert!(state.set_top(5).is_err());
}

#[test]
fn test_number_readers() {
    let mut state = new_state();
    state.push_number(2.75).unwrap();
    state.push_number(-2.75).unwrap();
    state.push_string("7").unwrap();

    assert_eq!(state.to_number(1), Some(2.75));
    assert_eq!(state.to_integer(1), Some(2));
    assert_eq!(state.to_integer(2), Some(-2));
    assert_eq!(state.to_integer(3), None);
    assert_eq!(state.type_of(1), ScriptType::Number);
}

#[test]
fn test_tables_are_opaque() {
    let mut state = new_state();
    let a = state.new_table().unwrap();
    let b = state.new_table().unwrap();
    assert_ne!(a, b);
    assert_eq!(state.type_of(-1), ScriptType::Table);
}

/* ===================== Calls ===================== */

fn sum_args(state: &mut ScriptState) -> ScriptResult<usize> {
    let mut total = 0;
    for position in 1..=state.top() {
        total += state
            .to_integer(position)
            .ok_or_else(|| state.type_error(position, "number"))?;
    }
    state.push_integer(total)?;
    Ok(1)
}

#[test]
fn test_call_runs_in_fresh_frame() {
    let mut state = new_state();
    state.push_string("caller slot").unwrap();
    state.register_function("sum", sum_args);

    let results = state
        .call("sum", vec![
            ScriptValue::Integer(1),
            ScriptValue::Integer(2),
            ScriptValue::Number(3.5),
        ])
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].raw_equal(&ScriptValue::Integer(6)));
    assert_eq!(state.top(), 1);
    assert_eq!(state.to_str(1).as_deref(), Some("caller slot"));
}

#[test]
fn test_error_aborts_call_and_unwinds_frame() {
    let mut state = new_state();
    state.register_function("sum", sum_args);

    let err = state.call("sum", vec![ScriptValue::Integer(1), "x".into()]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "bad argument #2 (number expected, got string)"
    );
    assert_eq!(state.top(), 0);
}

#[test]
fn test_unknown_function() {
    let mut state = new_state();
    assert!(matches!(
        state.call("missing", Vec::new()),
        Err(ScriptError::UnknownFunction(name)) if name == "missing"
    ));
}

/* ===================== Userdata and metadata ===================== */

#[test]
fn test_userdata_payload_access() {
    let mut state = new_state();
    let r = state.new_userdata(Box::new(10_i64)).unwrap();

    assert_eq!(state.userdata_at(-1), Some(r));
    assert_eq!(state.userdata::<i64>(r), Some(&10));
    assert!(state.userdata::<String>(r).is_none());
    *state.userdata_mut::<i64>(r).unwrap() += 1;
    assert_eq!(state.userdata::<i64>(r), Some(&11));

    assert!(!state.set_userdata_type(r, "Unregistered"));
    assert_eq!(state.userdata_type(r), None);
    assert_eq!(state.type_of(-1), ScriptType::Userdata);
}

#[test]
fn test_type_error_names_registered_type() {
    let mut state = new_state();
    register_tracker(&mut state);
    let finalized = Rc::new(Cell::new(0));
    push_tracker(&mut state, 1, &finalized);

    let err = state.type_error(1, "List");
    assert_eq!(err, ScriptError::type_mismatch(1, "List", TRACKER));
}

#[test]
fn test_metadata_dispatch() {
    let mut state = new_state();
    register_tracker(&mut state);
    let finalized = Rc::new(Cell::new(0));
    push_tracker(&mut state, 5, &finalized);
    push_tracker(&mut state, 5, &finalized);
    push_tracker(&mut state, 6, &finalized);

    assert!(state.equals(1, 2).unwrap());
    assert!(!state.equals(1, 3).unwrap());
    assert_eq!(state.tostring(3).unwrap(), "tracker #6");
    assert!(state
        .index(1, ScriptValue::Integer(10))
        .unwrap()
        .raw_equal(&ScriptValue::Integer(15)));
    assert!(state.len(1).unwrap().raw_equal(&ScriptValue::Integer(3)));
    assert_eq!(state.top(), 3);
}

#[test]
fn test_missing_metadata_is_a_runtime_error() {
    let mut state = new_state();
    state.push_integer(1).unwrap();
    assert!(matches!(
        state.index(1, ScriptValue::Integer(1)),
        Err(ScriptError::Runtime(_))
    ));
    assert!(matches!(
        state.set_index(1, "k".into(), ScriptValue::Nil),
        Err(ScriptError::Runtime(_))
    ));
    assert_eq!(state.tostring(1).unwrap(), "1");
    assert!(state.len(1).is_err());
    assert_eq!(state.equals(1, 5), Err(ScriptError::InvalidIndex(5)));
}

/* ===================== Collection ===================== */

#[test]
fn test_collect_finalizes_unreachable_once() {
    let mut state = new_state();
    register_tracker(&mut state);
    let finalized = Rc::new(Cell::new(0));
    let kept = push_tracker(&mut state, 1, &finalized);
    let dropped = push_tracker(&mut state, 2, &finalized);

    state.pop(1);
    assert_eq!(state.collect_garbage(), 1);
    assert_eq!(finalized.get(), 1);
    assert_eq!(state.collect_garbage(), 0);
    assert_eq!(finalized.get(), 1);

    assert!(state.userdata::<Tracker>(kept).is_some());
    assert!(state.userdata::<Tracker>(dropped).is_none());
}

#[test]
fn test_stale_reference_after_slot_reuse() {
    let mut state = new_state();
    let old = state.new_userdata(Box::new(1_u8)).unwrap();
    state.pop(1);
    state.collect_garbage();

    let new = state.new_userdata(Box::new(2_u8)).unwrap();
    assert_ne!(old, new);
    assert!(state.userdata::<u8>(old).is_none());
    assert_eq!(state.userdata::<u8>(new), Some(&2));
}

#[test]
fn test_pinned_values_survive_collection() {
    let mut state = new_state();
    register_tracker(&mut state);
    let finalized = Rc::new(Cell::new(0));
    let r = push_tracker(&mut state, 1, &finalized);
    let key = state.pin(ScriptValue::Userdata(r));
    state.pop(1);

    state.collect_garbage();
    assert_eq!(finalized.get(), 0);
    assert!(state.pinned(key).is_some());

    assert!(state.unpin(key).is_some());
    state.collect_garbage();
    assert_eq!(finalized.get(), 1);
}

#[test]
fn test_automatic_collection_after_gc_pause() {
    let mut state = state_with(64, 2);
    register_tracker(&mut state);
    state.register_function("sum", sum_args);
    let finalized = Rc::new(Cell::new(0));

    push_tracker(&mut state, 1, &finalized);
    push_tracker(&mut state, 2, &finalized);
    state.pop(2);
    assert_eq!(finalized.get(), 0);

    state.call("sum", vec![ScriptValue::Integer(1)]).unwrap();
    assert_eq!(finalized.get(), 2);
    assert_eq!(state.heap_size(), 0);
}

#[test]
fn test_drop_finalizes_everything() {
    let finalized = Rc::new(Cell::new(0));
    {
        let mut state = new_state();
        register_tracker(&mut state);
        push_tracker(&mut state, 1, &finalized);
        let r = push_tracker(&mut state, 2, &finalized);
        state.pin(ScriptValue::Userdata(r));
    }
    assert_eq!(finalized.get(), 2);
}
