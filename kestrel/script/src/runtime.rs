//! The interface the transaction layer uses to run script code.

use crate::error::{CallError, CompileError};
use crate::isolate::Isolate;
use crate::value::ScriptValue;

/// Compiles and calls script functions.
///
/// [`Isolate`] is the production implementation.
pub trait ScriptRuntime {
    /// Compiles `body` into a function taking `params`. `name` is used as both the function
    /// name and the source name in stack traces.
    fn compile_function(
        &mut self,
        params: &[&str],
        body: &str,
        name: &str,
    ) -> Result<ScriptValue, CompileError>;

    /// Calls `function` with the given `this` value and arguments.
    fn call_function(
        &mut self,
        function: &ScriptValue,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> Result<ScriptValue, CallError>;
}

impl ScriptRuntime for Isolate {
    fn compile_function(
        &mut self,
        params: &[&str],
        body: &str,
        name: &str,
    ) -> Result<ScriptValue, CompileError> {
        Isolate::compile_function(self, params, body, name)
    }

    fn call_function(
        &mut self,
        function: &ScriptValue,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> Result<ScriptValue, CallError> {
        Isolate::call_function(self, function, this, args)
    }
}
