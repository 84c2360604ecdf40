//! Per-connection sequence counters and random field values.
//!
//! Each wrap task owns one [`SequenceState`], keyed by
//! `"{connection_id}:{field_name}"`. Keeping the state task-local
//! (instead of a process-wide map) removes any need for locking: the
//! keying is already per connection, so nothing is shared.

use std::collections::HashMap;

use rand::Rng;

use crate::catalogue::{FieldKind, SeqAlgorithm, SequenceSpec, Value};

/// Monotonic counters for one connection.
#[derive(Debug, Default)]
pub struct SequenceState {
    counters: HashMap<String, Value>,
}

impl SequenceState {
    /// Create empty state for a fresh connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the counter for `key`, then advance it.
    ///
    /// The first access initialises the counter to `spec.start`; every
    /// emission returns the value *before* the increment is applied.
    /// Counters only advance when the catalogue supplies an increment.
    pub fn next(&mut self, key: String, spec: &SequenceSpec) -> Value {
        let current = self
            .counters
            .entry(key)
            .or_insert_with(|| spec.start.clone().unwrap_or(Value::Null));
        let emitted = current.clone();

        if let Some(increment) = &spec.increment {
            match spec.algorithm {
                SeqAlgorithm::Linear => {
                    let step = increment.to_i64();
                    if step != 0 {
                        *current = Value::Int(emitted.to_i64() + step);
                    }
                }
                SeqAlgorithm::IncrementOne => {
                    *current = Value::Int(emitted.to_i64() + 1);
                }
            }
        }

        emitted
    }
}

/// Fresh uniform random value of the field's width. Types without a
/// numeric width yield zero.
pub fn random_value(kind: FieldKind) -> Value {
    let mut rng = rand::thread_rng();
    match kind {
        FieldKind::U8 => Value::Int(rng.gen::<u8>() as i64),
        FieldKind::U16Be | FieldKind::U16Le => Value::Int(rng.gen::<u16>() as i64),
        FieldKind::U32Be | FieldKind::U32Le => Value::Int(rng.gen::<u32>() as i64),
        _ => Value::Int(0),
    }
}
