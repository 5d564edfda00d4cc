//! Built-in globals and prototype methods.

mod array;
mod error;
mod global;
mod json;
mod string;

use crate::error::CallError;
use crate::isolate::Isolate;
use crate::value::{ObjectRef, ScriptValue};

type NativeResult = Result<ScriptValue, CallError>;

pub(crate) fn install(isolate: &mut Isolate) {
    global::install(isolate);
    error::install(isolate);
    json::install(isolate);
    array::install(isolate);
    string::install(isolate);
}

/// Returns the argument at `index`, or `undefined` if there are fewer arguments.
#[inline]
fn arg(args: &[ScriptValue], index: usize) -> ScriptValue {
    args.get(index).cloned().unwrap_or_default()
}

/// Stores a native function on `target` under `name`.
fn define<F>(target: &ObjectRef, name: &str, function: F)
where
    F: Fn(&mut Isolate, &ScriptValue, &[ScriptValue]) -> NativeResult + Send + Sync + 'static,
{
    target.set(name, ScriptValue::native(name, function));
}

/// Resolves a possibly negative relative index against `len`, like `slice` does.
fn relative_index(value: &ScriptValue, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let index = value.to_number();
    if index.is_nan() {
        return 0;
    }
    let index = index.trunc();
    if index < 0.0 {
        (len as f64 + index).max(0.0) as usize
    } else {
        (index as usize).min(len)
    }
}
