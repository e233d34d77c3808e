//! Test helpers for marshaller tests
//!
//! Engine setup and fake record stores

use crate::config::{EngineConfig, RecordConfig};
use crate::engine::ScriptState;
use crate::error::{RecordError, RecordResult};
use crate::marshal::register_bindings;
use crate::record::memory::{new_record, Bins};
use crate::record::{Record, RecordHooks};
use crate::value::Value;
use std::cell::Cell;
use std::rc::Rc;

/// Route `tracing` output to the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine with every box type registered
pub fn new_state() -> ScriptState {
    init_tracing();
    let mut state = ScriptState::new(&EngineConfig::default());
    register_bindings(&mut state);
    state
}

/// In-memory record value over `bins`
pub fn memory_record(bins: Bins) -> Value {
    new_record(bins, &RecordConfig::default()).to_value()
}

/// Status every `FailingHooks` call reports
pub const FAILING_STATUS: i32 = -7;

/// Store whose writes and teardown always fail
pub struct FailingHooks;

impl RecordHooks for FailingHooks {
    fn get(&self, _record: &Record, _name: &str) -> Option<Value> {
        None
    }

    fn set(&self, _record: &Record, _name: &str, _value: &Value) -> RecordResult<()> {
        Err(RecordError::Hook(FAILING_STATUS))
    }

    fn free(&self, _record: &Record) -> RecordResult<()> {
        Err(RecordError::Hook(FAILING_STATUS))
    }
}

/// Counters shared between a test and its `CountingHooks`
#[derive(Default)]
pub struct HookCounts {
    pub gets: Cell<usize>,
    pub sets: Cell<usize>,
    pub frees: Cell<usize>,
}

/// Store that answers every read with the bin name and counts calls
pub struct CountingHooks {
    pub counts: Rc<HookCounts>,
}

impl RecordHooks for CountingHooks {
    fn get(&self, _record: &Record, name: &str) -> Option<Value> {
        self.counts.gets.set(self.counts.gets.get() + 1);
        Some(Value::string(name))
    }

    fn set(&self, _record: &Record, _name: &str, _value: &Value) -> RecordResult<()> {
        self.counts.sets.set(self.counts.sets.get() + 1);
        Ok(())
    }

    fn free(&self, _record: &Record) -> RecordResult<()> {
        self.counts.frees.set(self.counts.frees.get() + 1);
        Ok(())
    }
}

/// Record value served by `CountingHooks`, with its counters
pub fn counting_record() -> (Value, Rc<HookCounts>) {
    let counts = Rc::new(HookCounts::default());
    let hooks = Rc::new(CountingHooks {
        counts: Rc::clone(&counts),
    });
    (Record::new((), hooks).to_value(), counts)
}
