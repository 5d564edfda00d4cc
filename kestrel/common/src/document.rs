use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The encoded return value of a committed transaction.
///
/// An action that returns nothing produces [`ResultDocument::None`], which is distinct from an
/// action returning `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultDocument {
    #[default]
    None,
    Value(Value),
}

impl ResultDocument {
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    #[inline]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::None => None,
            Self::Value(value) => Some(value),
        }
    }

    #[inline]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Value(value) => Some(value),
        }
    }
}

impl From<Option<Value>> for ResultDocument {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::None, Self::Value)
    }
}

impl fmt::Display for ResultDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Value(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_none_is_distinct_from_null() {
        let none = ResultDocument::from(None);
        let null = ResultDocument::from(Some(Value::Null));
        assert!(none.is_none());
        assert!(!null.is_none());
        assert_ne!(none, null);
        assert_eq!(none.to_string(), "none");
        assert_eq!(null.to_string(), "null");
    }

    #[test]
    fn test_into_value() {
        let doc = ResultDocument::Value(json!({"a": 1}));
        assert_eq!(doc.value(), Some(&json!({"a": 1})));
        assert_eq!(doc.into_value(), Some(json!({"a": 1})));
    }
}
