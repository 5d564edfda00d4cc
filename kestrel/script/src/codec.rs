//! Conversion between script values and JSON documents.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::value::{ObjectRef, ScriptValue, number_to_string};

/// Deepest object nesting [`to_json`] encodes.
pub const MAX_ENCODE_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("converting circular structure to JSON")]
    Circular,
    #[error("object nesting exceeds {MAX_ENCODE_DEPTH} levels")]
    TooDeep,
}

/// Converts a JSON document into a script value.
pub fn from_json(value: &Value) -> ScriptValue {
    match value {
        Value::Null => ScriptValue::Null,
        Value::Bool(b) => ScriptValue::Bool(*b),
        Value::Number(n) => ScriptValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => ScriptValue::string(s.as_str()),
        Value::Array(elements) => ScriptValue::array(elements.iter().map(from_json).collect()),
        Value::Object(map) => {
            let object = ObjectRef::ordinary();
            for (key, value) in map {
                object.set(key, from_json(value));
            }
            object.into()
        }
    }
}

/// Converts a script value into a JSON document.
///
/// Returns `None` for values that have no JSON form, such as `undefined` and functions. Such
/// values are left out of objects and become `null` inside arrays.
pub fn to_json(value: &ScriptValue) -> Result<Option<Value>, CodecError> {
    Encoder::default().encode(value)
}

#[derive(Default)]
struct Encoder {
    /// Identities of the objects being encoded, outermost first.
    path: Vec<usize>,
}

impl Encoder {
    fn encode(&mut self, value: &ScriptValue) -> Result<Option<Value>, CodecError> {
        Ok(Some(match value {
            ScriptValue::Undefined => return Ok(None),
            ScriptValue::Null => Value::Null,
            ScriptValue::Bool(b) => Value::Bool(*b),
            ScriptValue::Number(n) => encode_number(*n),
            ScriptValue::String(s) => Value::String(s.to_string()),
            ScriptValue::Object(object) if object.is_callable() => return Ok(None),
            ScriptValue::Object(object) => {
                let id = object.id();
                if self.path.contains(&id) {
                    return Err(CodecError::Circular);
                }
                if self.path.len() >= MAX_ENCODE_DEPTH {
                    return Err(CodecError::TooDeep);
                }
                self.path.push(id);
                let encoded = self.encode_object(object);
                self.path.pop();
                encoded?
            }
        }))
    }

    fn encode_object(&mut self, object: &ObjectRef) -> Result<Value, CodecError> {
        if let Some(elements) = object.array_elements() {
            let elements = elements
                .iter()
                .map(|element| Ok(self.encode(element)?.unwrap_or(Value::Null)))
                .collect::<Result<_, CodecError>>()?;
            return Ok(Value::Array(elements));
        }
        let mut map = Map::new();
        for (key, value) in object.entries() {
            if let Some(value) = self.encode(&value)? {
                map.insert(key.to_string(), value);
            }
        }
        Ok(Value::Object(map))
    }
}

fn encode_number(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or_else(|| Value::String(number_to_string(n)), Value::Number)
}
