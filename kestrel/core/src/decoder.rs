//! Validates a raw request and turns it into a [`TransactionRequest`].
//!
//! Decoding is pure: it neither enters an execution context nor constructs a transaction, so
//! a malformed request never costs a context.

use kestrel_script::{ObjectRef, ScriptValue};
use kestrel_transaction::TransactionOptions;

use crate::classifier::classify;
use crate::error::ValidationError;
use crate::request::{Action, TransactionRequest};

pub(crate) const ACTION_ERROR: &str = "missing/invalid action definition for transaction";
const COLLECTIONS_ERROR: &str = "missing/invalid collections definition for transaction";
const EMPTY_COLLECTIONS_ERROR: &str = "empty collections definition for transaction";

/// Decodes the request object `raw`.
///
/// Properties are looked up on the object and the prototypes it was created with. A property
/// that is present with an `undefined` value counts as present.
pub fn decode(raw: &ScriptValue) -> Result<TransactionRequest, ValidationError> {
    let body = plain_object(raw).ok_or(ValidationError::NotAnObject)?;

    let mut options = TransactionOptions {
        lock_timeout: lock_timeout(body)?,
        wait_for_sync: wait_for_sync(body)?,
        ..Default::default()
    };

    let collections = body
        .get("collections")
        .as_ref()
        .and_then(plain_object)
        .cloned()
        .ok_or_else(|| ValidationError::BadParameter(COLLECTIONS_ERROR.into()))?;
    if collections.keys().is_empty() {
        return Err(ValidationError::BadParameter(EMPTY_COLLECTIONS_ERROR.into()));
    }
    options.allow_implicit_collections = collections
        .get("allowImplicit")
        .map(|value| value.truthy());
    options.max_transaction_size = size_limit(body, "maxTransactionSize")?;
    options.intermediate_commit_size = size_limit(body, "intermediateCommitSize")?;
    options.intermediate_commit_count = size_limit(body, "intermediateCommitCount")?;

    let collections = classify(&collections)?;

    let action = body
        .get("action")
        .as_ref()
        .and_then(Action::from_value)
        .ok_or_else(|| ValidationError::BadParameter(ACTION_ERROR.into()))?;

    Ok(TransactionRequest {
        collections,
        options,
        action,
        params: body.get("params").unwrap_or_default(),
        embed: body.get("embed").is_some_and(|embed| embed.truthy()),
    })
}

/// Keyed objects only: arrays and functions are objects to scripts but not request bodies.
fn plain_object(value: &ScriptValue) -> Option<&ObjectRef> {
    value
        .as_object()
        .filter(|object| !object.is_array() && !object.is_callable())
}

fn lock_timeout(body: &ObjectRef) -> Result<Option<f64>, ValidationError> {
    match body.get("lockTimeout") {
        None => Ok(None),
        Some(ScriptValue::Number(seconds)) if seconds >= 0.0 => Ok(Some(seconds)),
        Some(_) => Err(ValidationError::BadParameter(
            "<lockTimeout> must be a valid numeric value".into(),
        )),
    }
}

fn wait_for_sync(body: &ObjectRef) -> Result<Option<bool>, ValidationError> {
    match body.get("waitForSync") {
        None => Ok(None),
        Some(ScriptValue::Bool(wait)) => Ok(Some(wait)),
        Some(_) => Err(ValidationError::BadParameter(
            "<waitForSync> must be a boolean value".into(),
        )),
    }
}

/// Size limits are coerced like script numbers, so numeric strings are accepted.
fn size_limit(body: &ObjectRef, key: &str) -> Result<Option<u64>, ValidationError> {
    let Some(value) = body.get(key) else {
        return Ok(None);
    };
    let limit = value.to_number();
    if limit.is_nan() || limit < 0.0 {
        return Err(ValidationError::BadParameter(format!(
            "<{key}> must be a non-negative number"
        )));
    }
    Ok(Some(limit as u64))
}
