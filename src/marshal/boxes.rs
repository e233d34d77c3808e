//! Boxes: engine-heap cells anchoring host values
//!
//! The scope of a box decides who releases its value when the engine
//! collects the box:
//! - `Script`: the box holds a counted reference and finalizing it releases
//!   that reference.
//! - `Host`: the box is a non-owning view of a value some host holder keeps
//!   alive; finalizing it releases nothing.

use crate::engine::{ScriptState, UserdataRef};
use crate::error::ScriptResult;
use crate::value::{Value, WeakValue};

/// Who is responsible for releasing a boxed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Host,
    Script,
}

enum Anchor {
    Owned(Value),
    View(WeakValue),
}

/// Payload of a box cell
pub struct ValueBox {
    scope: Scope,
    anchor: Option<Anchor>,
}

impl ValueBox {
    /// Anchor `value` under `scope`; a `Script` box retains it
    pub fn new(scope: Scope, value: &Value) -> Self {
        let anchor = match scope {
            Scope::Script => Anchor::Owned(value.retain()),
            Scope::Host => Anchor::View(value.downgrade()),
        };
        ValueBox {
            scope,
            anchor: Some(anchor),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Handle onto the boxed value.
    ///
    /// `Script` boxes hand out a retained handle; the caller becomes one more
    /// holder. `Host` boxes lend the host's value: the handle only lives as
    /// long as the caller keeps it, and nothing if the host already let go.
    pub fn value(&self) -> Option<Value> {
        match self.anchor.as_ref()? {
            Anchor::Owned(value) => Some(value.retain()),
            Anchor::View(view) => view.upgrade(),
        }
    }

    /// Whether the box no longer reaches a value
    pub fn is_empty(&self) -> bool {
        match &self.anchor {
            Some(Anchor::Owned(_)) => false,
            Some(Anchor::View(view)) => !view.is_live(),
            None => true,
        }
    }

    /// Drop the anchored reference if this box owns one
    fn release(&mut self) -> bool {
        match self.scope {
            Scope::Script => self.anchor.take().is_some(),
            Scope::Host => false,
        }
    }
}

impl std::fmt::Debug for ValueBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueBox")
            .field("scope", &self.scope)
            .field("value", &self.value())
            .finish()
    }
}

/// Allocate an untyped box and push it
pub fn new_box(state: &mut ScriptState, scope: Scope, value: &Value) -> ScriptResult<UserdataRef> {
    let r = state.new_userdata(Box::new(ValueBox::new(scope, value)))?;
    tracing::trace!(?scope, kind = %value.kind(), "box created");
    Ok(r)
}

/// Allocate a box carrying the metadata registered for `type_name` and push it
pub fn publish_box(
    state: &mut ScriptState,
    scope: Scope,
    value: &Value,
    type_name: &str,
) -> ScriptResult<UserdataRef> {
    let r = new_box(state, scope, value)?;
    if !state.set_userdata_type(r, type_name) {
        tracing::debug!(type_name, "box published without registered metadata");
    }
    Ok(r)
}

/// Box at `position`, if that slot holds one
pub fn peek_box(state: &ScriptState, position: i32) -> Option<&ValueBox> {
    let r = state.userdata_at(position)?;
    state.userdata::<ValueBox>(r)
}

/// Box of type `type_name` at `position`, or a type error that aborts the
/// calling script function
pub fn unwrap_typed(
    state: &ScriptState,
    position: i32,
    type_name: &str,
) -> ScriptResult<UserdataRef> {
    match state.userdata_at(position) {
        Some(r)
            if state.userdata_type(r) == Some(type_name)
                && state.userdata::<ValueBox>(r).is_some() =>
        {
            Ok(r)
        }
        _ => Err(state.type_error(position, type_name)),
    }
}

/// Value reachable through the box `r`
pub fn box_value(state: &ScriptState, r: UserdataRef) -> Option<Value> {
    state.userdata::<ValueBox>(r)?.value()
}

/// Finalizer body for box types: releases the value of a `Script` box and
/// leaves a `Host` box's value alone
pub fn finalize_box(state: &mut ScriptState, position: i32, type_name: &str) -> ScriptResult<()> {
    let r = unwrap_typed(state, position, type_name)?;
    if let Some(boxed) = state.userdata_mut::<ValueBox>(r) {
        if boxed.release() {
            tracing::trace!(type_name, "box value released");
        }
    }
    Ok(())
}
