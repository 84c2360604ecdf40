//! Dynamic values carried by catalogue fields.
//!
//! Catalogue files put any JSON scalar (or a map of scalars, for
//! bitfields) in a field's `value` slot. The loader converts them into
//! this tagged union once, so the per-packet path never re-inspects
//! JSON.

use std::collections::BTreeMap;

/// A dynamic catalogue value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent / JSON null
    Null,
    /// Integer (JSON numbers without a fractional part)
    Int(i64),
    /// Floating point
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Text, possibly containing `${VAR}` templates
    Str(String),
    /// Raw bytes (produced by the engine, never by JSON)
    Bytes(Vec<u8>),
    /// Map of sub-values (bitfield overrides)
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Convert a decoded JSON value.
    pub fn from_json(v: &serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(_) => Value::Null,
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Coerce to u8. Only numeric variants coerce; floats truncate
    /// toward zero.
    pub fn to_u8(&self) -> Option<u8> {
        self.to_u64().map(|v| v as u8)
    }

    /// Coerce to u16.
    pub fn to_u16(&self) -> Option<u16> {
        self.to_u64().map(|v| v as u16)
    }

    /// Coerce to u32.
    pub fn to_u32(&self) -> Option<u32> {
        self.to_u64().map(|v| v as u32)
    }

    fn to_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) => Some(*i as u64),
            Value::Float(f) => Some(*f as i64 as u64),
            _ => None,
        }
    }

    /// Integer view used by sequence arithmetic: non-numeric values
    /// count as zero.
    pub fn to_i64(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            _ => 0,
        }
    }

    /// Borrow the string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value as display text (decimal integers, `{}` floats,
    /// `true`/`false` booleans). Returns `None` for values with no
    /// sensible text form.
    pub fn display_string(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Value::Null | Value::Map(_) => None,
        }
    }
}

/// Parse an unsigned integer from a dynamic value, accepting JSON
/// numbers and strings in any base with standard prefix recognition
/// (`0x`, `0o`, `0b`). Used for computation parameters.
pub fn parse_u64_any(value: &Value) -> Option<u64> {
    match value {
        Value::Int(i) if *i >= 0 => Some(*i as u64),
        Value::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
        Value::Str(s) => parse_u64_prefixed(s),
        _ => None,
    }
}

fn parse_u64_prefixed(s: &str) -> Option<u64> {
    let s = s.trim();
    let (digits, radix) = if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        (rest, 16)
    } else if let Some(rest) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        (rest, 8)
    } else if let Some(rest) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (rest, 2)
    } else {
        (s, 10)
    };
    u64::from_str_radix(digits, radix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(Value::from_json(&serde_json::json!(42)), Value::Int(42));
        assert_eq!(Value::from_json(&serde_json::json!(1.5)), Value::Float(1.5));
        assert_eq!(
            Value::from_json(&serde_json::json!("hi")),
            Value::Str("hi".into())
        );
        assert_eq!(Value::from_json(&serde_json::json!(null)), Value::Null);
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Int(300).to_u8(), Some(44)); // truncating
        assert_eq!(Value::Int(0xDEAD).to_u16(), Some(0xDEAD));
        assert_eq!(Value::Float(3.9).to_u32(), Some(3)); // toward zero
        assert_eq!(Value::Str("7".into()).to_u16(), None); // strings never coerce
        assert_eq!(Value::Bool(true).to_u8(), None);
        assert_eq!(Value::Null.to_u32(), None);
    }

    #[test]
    fn test_to_i64_defaults_to_zero() {
        assert_eq!(Value::Int(-3).to_i64(), -3);
        assert_eq!(Value::Str("5".into()).to_i64(), 0);
        assert_eq!(Value::Null.to_i64(), 0);
    }

    #[test]
    fn test_display_string() {
        assert_eq!(Value::Int(7).display_string().as_deref(), Some("7"));
        assert_eq!(Value::Bool(true).display_string().as_deref(), Some("true"));
        assert_eq!(Value::Float(1.5).display_string().as_deref(), Some("1.5"));
        assert!(Value::Null.display_string().is_none());
    }

    #[test]
    fn test_parse_u64_any_bases() {
        assert_eq!(parse_u64_any(&Value::Str("0x8005".into())), Some(0x8005));
        assert_eq!(parse_u64_any(&Value::Str("0b1010".into())), Some(10));
        assert_eq!(parse_u64_any(&Value::Str("0o17".into())), Some(15));
        assert_eq!(parse_u64_any(&Value::Str("123".into())), Some(123));
        assert_eq!(parse_u64_any(&Value::Int(0xFF)), Some(0xFF));
        assert_eq!(parse_u64_any(&Value::Float(16.0)), Some(16));
        assert_eq!(parse_u64_any(&Value::Str("nope".into())), None);
        assert_eq!(parse_u64_any(&Value::Int(-1)), None);
    }
}
