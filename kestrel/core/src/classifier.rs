//! Splits the `collections` part of a request into access-mode buckets.

use kestrel_script::{ObjectRef, ScriptValue};
use kestrel_transaction::CollectionSet;

use crate::error::ValidationError;

const INVALID_COLLECTIONS: &str = "invalid collection definition for transaction: ";

/// Reads the `read`, `write` and `exclusive` buckets of `collections`.
///
/// A bucket is either absent, a single name or an array of names. Every malformed bucket is
/// reported, not only the first one.
pub fn classify(collections: &ObjectRef) -> Result<CollectionSet, ValidationError> {
    let [read, write, exclusive] =
        ["read", "write", "exclusive"].map(|bucket| names(collections.get(bucket), bucket));
    let problems: String = [&read, &write, &exclusive]
        .into_iter()
        .filter_map(|bucket| bucket.as_ref().err())
        .map(String::as_str)
        .collect();
    if !problems.is_empty() {
        return Err(ValidationError::BadParameter(format!(
            "{INVALID_COLLECTIONS}{problems}"
        )));
    }
    Ok(CollectionSet::new(
        read.unwrap_or_default(),
        write.unwrap_or_default(),
        exclusive.unwrap_or_default(),
    ))
}

fn names(value: Option<ScriptValue>, bucket: &str) -> Result<Vec<String>, String> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    if let Some(elements) = value.as_object().and_then(ObjectRef::array_elements) {
        return elements
            .iter()
            .enumerate()
            .map(|(i, element)| {
                element.as_str().map(String::from).ok_or_else(|| {
                    format!(" Collection name #{i} in array '{bucket}' is not a string")
                })
            })
            .collect();
    }
    match value.as_str() {
        Some(name) => Ok(vec![name.to_string()]),
        None => Err(format!(" There is no array in '{bucket}'")),
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use kestrel_script::from_json;
    use serde_json::json;

    use super::*;

    fn classify_json(value: serde_json::Value) -> Result<CollectionSet, ValidationError> {
        let value = from_json(&value);
        classify(value.as_object().unwrap())
    }

    #[test]
    fn test_buckets() {
        let set = classify_json(json!({
            "read": ["users", "orders", "users"],
            "write": "audit",
        }))
        .unwrap();
        assert_eq!(set.read(), ["users", "orders", "users"]);
        assert_eq!(set.write(), ["audit"]);
        assert!(set.exclusive().is_empty());
        assert_eq!(set.resolved().len(), 3);
    }

    #[test]
    fn test_non_string_name() {
        let err = classify_json(json!({"read": ["users", 7]})).unwrap_err();
        assert_snapshot!(
            err.to_string(),
            @"invalid collection definition for transaction:  Collection name #1 in array 'read' is not a string"
        );
    }

    #[test]
    fn test_problems_accumulate() {
        let err = classify_json(json!({"read": 1, "exclusive": [true]})).unwrap_err();
        assert_snapshot!(
            err.to_string(),
            @"invalid collection definition for transaction:  There is no array in 'read' Collection name #0 in array 'exclusive' is not a string"
        );
    }

    #[test]
    fn test_unrelated_keys_are_ignored() {
        let set = classify_json(json!({"allowImplicit": false})).unwrap();
        assert!(set.is_empty());
    }
}
