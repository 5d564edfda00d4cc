use kestrel_script::ScriptValue;
use kestrel_transaction::{CollectionSet, TransactionOptions};

/// What a transaction runs.
#[derive(Debug, Clone)]
pub enum Action {
    /// A function value supplied by the caller.
    CallableRef(ScriptValue),
    /// Source text of a function expression, compiled before the transaction begins.
    SourceBody(String),
}

impl Action {
    /// Returns `None` if `value` is neither callable nor a string.
    pub fn from_value(value: &ScriptValue) -> Option<Self> {
        match value {
            value if value.is_callable() => Some(Self::CallableRef(value.clone())),
            ScriptValue::String(source) => Some(Self::SourceBody(source.to_string())),
            _ => None,
        }
    }
}

/// A decoded transaction request.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub collections: CollectionSet,
    pub options: TransactionOptions,
    pub action: Action,
    /// Passed to the action as its only argument.
    pub params: ScriptValue,
    /// Whether the transaction may run inside a transaction already running in the context.
    pub embed: bool,
}
