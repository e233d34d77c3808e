//! In-memory record store
//!
//! Bins live in a `HashMap` source owned by the record. Useful for embedding
//! without a real store and as the reference hook table in tests.

use super::{Record, RecordHooks};
use crate::config::RecordConfig;
use crate::error::{RecordError, RecordResult};
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Source type of an in-memory record
pub type Bins = HashMap<String, Value>;

/// Hooks serving records whose source is `Bins`
#[derive(Debug, Clone)]
pub struct MemoryHooks {
    max_bin_name_len: usize,
}

impl MemoryHooks {
    pub fn new(config: &RecordConfig) -> Self {
        Self {
            max_bin_name_len: config.max_bin_name_len,
        }
    }

    fn check_bin_name(&self, name: &str) -> RecordResult<()> {
        if name.is_empty() {
            return Err(RecordError::bin_name(name, "bin name is empty"));
        }
        if name.len() > self.max_bin_name_len {
            return Err(RecordError::bin_name(
                name,
                format!("longer than {} bytes", self.max_bin_name_len),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryHooks {
    fn default() -> Self {
        Self::new(&RecordConfig::default())
    }
}

impl RecordHooks for MemoryHooks {
    fn get(&self, record: &Record, name: &str) -> Option<Value> {
        record.source::<Bins>()?.get(name).map(Value::retain)
    }

    fn set(&self, record: &Record, name: &str, value: &Value) -> RecordResult<()> {
        self.check_bin_name(name)?;
        let mut bins = record
            .source_mut::<Bins>()
            .ok_or(RecordError::MissingSource)?;
        bins.insert(name.to_string(), value.retain());
        Ok(())
    }

    fn free(&self, record: &Record) -> RecordResult<()> {
        let bins = record
            .take_source::<Bins>()
            .ok_or(RecordError::MissingSource)?;
        tracing::debug!(bins = bins.len(), "memory record released");
        Ok(())
    }
}

/// Create a record over `bins` served by `MemoryHooks`
pub fn new_record(bins: Bins, config: &RecordConfig) -> Record {
    Record::new(bins, Rc::new(MemoryHooks::new(config)))
}
