//! Turns an [`Action`] into something that can be invoked.

use kestrel_common::constants::{
    ACTION_PARAMETER, USER_TRANSACTION_FUNCTION, USER_TRANSACTION_SOURCE,
};
use kestrel_script::{CallError, ScriptRuntime, ScriptValue};
use tracing::debug;

use crate::decoder::ACTION_ERROR;
use crate::error::{Error, Result};
use crate::request::Action;

/// A resolved action: a function taking the request parameters as its only argument.
#[derive(Debug, Clone)]
pub struct Invocable {
    function: ScriptValue,
}

impl Invocable {
    #[inline]
    pub fn function(&self) -> &ScriptValue {
        &self.function
    }

    /// Calls the action with `params` as its only argument.
    pub fn invoke<R>(
        &self,
        runtime: &mut R,
        params: &ScriptValue,
    ) -> std::result::Result<ScriptValue, CallError>
    where
        R: ScriptRuntime + ?Sized,
    {
        runtime.call_function(
            &self.function,
            &ScriptValue::Undefined,
            std::slice::from_ref(params),
        )
    }
}

/// Resolves `action`, compiling source text in `runtime`.
///
/// Runs before the transaction is constructed, so a compile error never touches one.
pub fn resolve<R>(action: &Action, runtime: &mut R) -> Result<Invocable>
where
    R: ScriptRuntime + ?Sized,
{
    match action {
        Action::CallableRef(function) => {
            let anonymous = function
                .as_object()
                .filter(|object| object.function_name().is_some_and(|name| name.is_empty()));
            if let Some(object) = anonymous {
                object.set_function_name(USER_TRANSACTION_FUNCTION);
            }
            Ok(Invocable {
                function: function.clone(),
            })
        }
        Action::SourceBody(source) => {
            let body = format!("return ({source})({ACTION_PARAMETER});");
            let function = runtime
                .compile_function(&[ACTION_PARAMETER], &body, USER_TRANSACTION_SOURCE)
                .map_err(|err| {
                    debug!(error = err.message(), "action source does not compile");
                    Error::Compilation(format!(
                        "{ACTION_ERROR} - {} - {}",
                        err.message(),
                        err.stack()
                    ))
                })?;
            Ok(Invocable { function })
        }
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use kestrel_common::ErrorCode;
    use kestrel_script::Isolate;

    use super::*;

    #[test]
    fn test_source_is_wrapped() {
        let mut isolate = Isolate::default();
        let action = Action::SourceBody("function (p) { return p * 2; }".into());
        let invocable = resolve(&action, &mut isolate).unwrap();
        let name = invocable.function().as_object().unwrap().function_name();
        assert_eq!(name.as_deref(), Some(USER_TRANSACTION_SOURCE));
        let result = invocable.invoke(&mut isolate, &21.0.into()).unwrap();
        assert_eq!(result.as_number(), Some(42.0));
    }

    #[test]
    fn test_compile_error() {
        let mut isolate = Isolate::default();
        let action = Action::SourceBody("function ( {".into());
        let err = resolve(&action, &mut isolate).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BAD_PARAMETER);
        assert!(err
            .to_string()
            .starts_with("missing/invalid action definition for transaction - "));
        assert!(err.to_string().contains("at userTransactionSource:1:"));
    }

    #[test]
    fn test_anonymous_callable_is_named() {
        let mut isolate = Isolate::default();
        let function = isolate.evaluate("(function () { return 1; })", "test").unwrap();
        let invocable = resolve(&Action::CallableRef(function), &mut isolate).unwrap();
        let name = invocable.function().as_object().unwrap().function_name();
        assert_eq!(name.as_deref(), Some(USER_TRANSACTION_FUNCTION));
    }

    #[test]
    fn test_named_callable_keeps_its_name() {
        let mut isolate = Isolate::default();
        let function = isolate
            .evaluate("(function transfer() { return 1; })", "test")
            .unwrap();
        let invocable = resolve(&Action::CallableRef(function), &mut isolate).unwrap();
        let name = invocable.function().as_object().unwrap().function_name();
        assert_eq!(name.as_deref(), Some("transfer"));
        assert_snapshot!(
            invocable.invoke(&mut isolate, &ScriptValue::Undefined).unwrap().to_display_string(),
            @"1"
        );
    }
}
