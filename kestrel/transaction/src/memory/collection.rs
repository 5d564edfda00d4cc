use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::{Map, Value, json};

use crate::error::{TransactionError, TransactionResult};

pub(crate) const KEY: &str = "_key";
pub(crate) const ID: &str = "_id";
pub(crate) const REV: &str = "_rev";

const MAX_KEY_LENGTH: usize = 254;

/// Committed state of a collection. Transactions buffer their writes elsewhere and publish them
/// here on commit.
#[derive(Debug)]
pub(crate) struct Collection {
    name: String,
    documents: RwLock<BTreeMap<String, Value>>,
}

impl Collection {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    #[inline]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn get(&self, key: &str) -> Option<Value> {
        self.documents.read().get(key).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<String, Value> {
        self.documents.read().clone()
    }

    /// Applies buffered writes; `None` removes the document.
    pub(crate) fn apply(&self, writes: BTreeMap<String, Option<Value>>) {
        let mut documents = self.documents.write();
        for (key, document) in writes {
            match document {
                Some(document) => {
                    documents.insert(key, document);
                }
                None => {
                    documents.remove(&key);
                }
            }
        }
    }
}

/// Checks a user supplied `_key`.
pub(crate) fn validate_key(key: &Value) -> TransactionResult<String> {
    let Some(key) = key.as_str() else {
        return Err(TransactionError::DocumentKeyBad(key.to_string()));
    };
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && key.chars().all(|c| {
            c.is_ascii_alphanumeric() || "_-:.@()+,=;$!*'%".contains(c)
        });
    if valid {
        Ok(key.to_string())
    } else {
        Err(TransactionError::DocumentKeyBad(key.to_string()))
    }
}

pub(crate) fn into_object(document: Value) -> TransactionResult<Map<String, Value>> {
    match document {
        Value::Object(object) => Ok(object),
        _ => Err(TransactionError::DocumentTypeInvalid),
    }
}

/// The `_id`/`_key`/`_rev` triple returned by write operations.
pub(crate) fn metadata(collection: &str, key: &str, rev: &str) -> Value {
    json!({
        ID: format!("{collection}/{key}"),
        KEY: key,
        REV: rev,
    })
}

pub(crate) fn metadata_of(collection: &str, document: &Value) -> Value {
    let key = document.get(KEY).and_then(Value::as_str).unwrap_or_default();
    let rev = document.get(REV).and_then(Value::as_str).unwrap_or_default();
    metadata(collection, key, rev)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert_eq!(validate_key(&json!("abc-1:2")).unwrap(), "abc-1:2");
        assert!(validate_key(&json!("")).is_err());
        assert!(validate_key(&json!("a/b")).is_err());
        assert!(validate_key(&json!(12)).is_err());
        assert!(validate_key(&json!("x".repeat(255))).is_err());
    }

    #[test]
    fn test_apply() {
        let collection = Collection::new("c".into());
        collection.apply(BTreeMap::from([
            ("a".to_string(), Some(json!({"_key": "a"}))),
            ("b".to_string(), Some(json!({"_key": "b"}))),
        ]));
        collection.apply(BTreeMap::from([("a".to_string(), None)]));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get("b"), Some(json!({"_key": "b"})));
        assert!(collection.get("a").is_none());
    }

    #[test]
    fn test_metadata() {
        let document = json!({"_key": "k", "_rev": "7", "x": 1});
        assert_eq!(
            metadata_of("users", &document),
            json!({"_id": "users/k", "_key": "k", "_rev": "7"})
        );
    }
}
