//! Valbridge core
//!
//! Value and record plumbing between a host program and an embedded
//! scripting engine:
//!
//! - `value`: reference-counted, tagged host values
//! - `record`: records over pluggable backing stores (`record::memory` for an
//!   in-process one)
//! - `engine`: the stack-and-heap surface of the script engine
//! - `marshal`: conversion at the call boundary and the boxes that carry
//!   composite values into scripts
//!
//! # Example
//!
//! ```
//! use valbridge_core::config::Config;
//! use valbridge_core::engine::ScriptState;
//! use valbridge_core::marshal::{from_native, register_bindings, to_native};
//! use valbridge_core::value::Value;
//!
//! let config = Config::default();
//! let mut state = ScriptState::new(&config.engine);
//! register_bindings(&mut state);
//!
//! from_native(&mut state, &Value::integer(42))?;
//! assert_eq!(to_native(&state, -1), Some(Value::integer(42)));
//! # Ok::<(), valbridge_core::error::ScriptError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod marshal;
pub mod record;
pub mod value;

pub use config::Config;
pub use engine::{ScriptState, ScriptValue};
pub use error::{RecordError, RecordResult, ScriptError, ScriptResult};
pub use marshal::{from_native, to_native, Scope};
pub use record::{Record, RecordHooks};
pub use value::{Val, Value, ValueKind};
