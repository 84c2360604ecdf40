//! `${VAR}` template substitution.
//!
//! Substitution is textual, single-pass and non-recursive. The
//! connection id and timestamp are available everywhere; the payload
//! length tokens are applied by the frame path only, where the payload
//! size is known per emission.

use chrono::Utc;

use crate::catalogue::Value;

/// Resolve `${CONN_ID}` and `${TIMESTAMP}` in a string.
pub fn resolve_str(input: &str, conn_id: &str) -> String {
    let resolved = input.replace("${CONN_ID}", conn_id);
    if resolved.contains("${TIMESTAMP}") {
        resolved.replace("${TIMESTAMP}", &Utc::now().timestamp().to_string())
    } else {
        resolved
    }
}

/// Resolve templates inside a dynamic value. Only strings carry
/// templates; every other variant passes through untouched so numeric
/// literals stay numeric for the field writer.
pub fn resolve_value(value: &Value, conn_id: &str) -> Value {
    match value {
        Value::Str(s) => Value::Str(resolve_str(s, conn_id)),
        other => other.clone(),
    }
}

/// Substitute `${DATA_SIZE}` and `${DATA_LENGTH}` with the payload
/// length in decimal.
pub fn substitute_data_len(input: &str, len: usize) -> String {
    let text = len.to_string();
    input
        .replace("${DATA_SIZE}", &text)
        .replace("${DATA_LENGTH}", &text)
}
