//! JSON case runner for kestrel.
//!
//! A case file sets up an in-memory database, runs a sequence of transaction requests against it
//! and checks the outcome of each one. Cases live under `cases/` and look like this:
//!
//! ```json
//! {
//!   "collections": ["users"],
//!   "steps": [
//!     {
//!       "request": {"collections": {"write": "users"}, "action": "function () { ... }"},
//!       "expect": {"result": {"value": 1}}
//!     },
//!     {
//!       "request": {"collections": {"write": "missing"}, "action": "function () {}"},
//!       "expect": {"error": {"code": 1203}}
//!     }
//!   ],
//!   "committed": {"users": 1}
//! }
//! ```
//!
//! An expected error may also carry a `message`, which must match exactly.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use kestrel::{Database, DatabaseConfig, ResultDocument};
use serde::Deserialize;
use serde_json::Value;

pub type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Case {
    #[serde(default)]
    pub collections: Vec<String>,
    pub steps: Vec<Step>,
    /// Number of committed documents per collection once every step has run.
    #[serde(default)]
    pub committed: BTreeMap<String, u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub request: Value,
    pub expect: Expect,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expect {
    Result(ResultDocument),
    Error {
        code: i64,
        #[serde(default)]
        message: Option<String>,
    },
}

/// A step whose outcome differs from what the case expects.
#[derive(Debug)]
pub struct Mismatch {
    step: usize,
    expected: String,
    actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {}: expected {}, got {}",
            self.step, self.expected, self.actual
        )
    }
}

impl std::error::Error for Mismatch {}

impl Case {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Runs the case against a fresh in-memory database.
    pub fn run(&self) -> Result<()> {
        let database = Database::open_in_memory(&DatabaseConfig::default())?;
        for name in &self.collections {
            database.create_collection(name)?;
        }
        for (index, step) in self.steps.iter().enumerate() {
            step.check(index, &database)?;
        }
        let Some(engine) = database.memory_engine() else {
            return Err("case database is not in memory".into());
        };
        for (name, expected) in &self.committed {
            let actual = engine.committed_count(name)?;
            if actual != *expected {
                return Err(format!(
                    "collection {name}: expected {expected} committed documents, got {actual}"
                )
                .into());
            }
        }
        Ok(())
    }
}

impl Step {
    fn check(&self, index: usize, database: &Database) -> Result<()> {
        let outcome = database.execute_transaction(&self.request);
        let matches = match (&self.expect, &outcome) {
            (Expect::Result(expected), Ok(actual)) => expected == actual,
            (Expect::Error { code, message }, Err(err)) => {
                err.code().raw() == *code
                    && message.as_ref().is_none_or(|m| *m == err.to_string())
            }
            _ => false,
        };
        if matches {
            return Ok(());
        }
        let actual = match outcome {
            Ok(document) => format!("result {document}"),
            Err(err) => format!("error {} ({err})", err.code()),
        };
        Err(Box::new(Mismatch {
            step: index,
            expected: self.expect.to_string(),
            actual,
        }))
    }
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Result(document) => write!(f, "result {document}"),
            Self::Error {
                code,
                message: Some(message),
            } => write!(f, "error {code} ({message})"),
            Self::Error { code, message: None } => write!(f, "error {code}"),
        }
    }
}
