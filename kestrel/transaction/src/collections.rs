use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a transaction accesses a collection. Variants are ordered by strength, so a mode
/// satisfies every weaker one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
    Exclusive,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
            Self::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// The collections a transaction declares up front, split by access mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSet {
    read: Vec<String>,
    write: Vec<String>,
    exclusive: Vec<String>,
}

impl CollectionSet {
    pub fn new(read: Vec<String>, write: Vec<String>, exclusive: Vec<String>) -> Self {
        Self {
            read,
            write,
            exclusive,
        }
    }

    #[inline]
    pub fn read(&self) -> &[String] {
        &self.read
    }

    #[inline]
    pub fn write(&self) -> &[String] {
        &self.write
    }

    #[inline]
    pub fn exclusive(&self) -> &[String] {
        &self.exclusive
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty() && self.exclusive.is_empty()
    }

    /// Returns every declared collection once, with the strongest mode it was declared with.
    ///
    /// The map is ordered by name, which is also the order locks are acquired in.
    pub fn resolved(&self) -> BTreeMap<&str, AccessMode> {
        let mut resolved = BTreeMap::new();
        let declared = [
            (AccessMode::Read, &self.read),
            (AccessMode::Write, &self.write),
            (AccessMode::Exclusive, &self.exclusive),
        ];
        for (mode, names) in declared {
            for name in names {
                let entry = resolved.entry(name.as_str()).or_insert(mode);
                *entry = (*entry).max(mode);
            }
        }
        resolved
    }

    /// The strongest mode `name` was declared with, if any.
    pub fn mode_of(&self, name: &str) -> Option<AccessMode> {
        if self.exclusive.iter().any(|n| n == name) {
            Some(AccessMode::Exclusive)
        } else if self.write.iter().any(|n| n == name) {
            Some(AccessMode::Write)
        } else if self.read.iter().any(|n| n == name) {
            Some(AccessMode::Read)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_resolved_keeps_strongest_mode() {
        let set = CollectionSet::new(names(&["b", "a"]), names(&["a"]), names(&["c", "b"]));
        let resolved: Vec<_> = set.resolved().into_iter().collect();
        assert_eq!(resolved, vec![
            ("a", AccessMode::Write),
            ("b", AccessMode::Exclusive),
            ("c", AccessMode::Exclusive),
        ]);
    }

    #[test]
    fn test_mode_of() {
        let set = CollectionSet::new(names(&["a"]), names(&["b"]), vec![]);
        assert_eq!(set.mode_of("a"), Some(AccessMode::Read));
        assert_eq!(set.mode_of("b"), Some(AccessMode::Write));
        assert_eq!(set.mode_of("c"), None);
        assert!(!set.is_empty());
        assert!(CollectionSet::default().is_empty());
    }

    #[test]
    fn test_mode_ordering() {
        assert!(AccessMode::Exclusive > AccessMode::Write);
        assert!(AccessMode::Write > AccessMode::Read);
    }
}
