use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use kestrel_common::DomainError;
use miette::Diagnostic;
use thiserror::Error;

use crate::span::line_column;
use crate::value::ScriptValue;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    #[default]
    InvalidToken,
    IncompleteComment,
}

/// A source text the parser rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("SyntaxError: {message}")]
pub struct SyntaxError {
    message: String,
    #[source_code]
    input: Arc<str>,
    #[label("here")]
    span: Range<usize>,
    position: (usize, usize),
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, input: &str, span: Range<usize>) -> Self {
        let position = line_column(input, span.start);
        Self {
            message: message.into(),
            input: input.into(),
            span,
            position,
        }
    }

    pub fn from_tokenize_error(kind: TokenErrorKind, input: &str, span: Range<usize>) -> Self {
        let message = match kind {
            TokenErrorKind::InvalidToken => "Invalid or unexpected token",
            TokenErrorKind::IncompleteComment => "Unterminated comment",
        };
        Self::new(message, input, span)
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn span(&self) -> &Range<usize> {
        &self.span
    }

    /// 1-based `(line, column)` of the offending token.
    #[inline]
    pub fn position(&self) -> (usize, usize) {
        self.position
    }
}

/// Failure to turn source text into a callable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{message}")]
pub struct CompileError {
    message: String,
    stack: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.into(),
        }
    }

    pub fn from_syntax(err: &SyntaxError, source_name: &str) -> Self {
        let message = err.to_string();
        let (line, column) = err.position();
        let stack = format!("{message}\n    at {source_name}:{line}:{column}");
        Self { message, stack }
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn stack(&self) -> &str {
        &self.stack
    }
}

/// A value thrown by script code that no `catch` handled.
#[derive(Debug, Clone)]
pub struct Exception {
    value: ScriptValue,
    message: String,
    stack: Option<String>,
    can_continue: bool,
}

impl Exception {
    pub(crate) fn new(
        value: ScriptValue,
        message: String,
        stack: Option<String>,
        can_continue: bool,
    ) -> Self {
        Self {
            value,
            message,
            stack,
            can_continue,
        }
    }

    /// The thrown value.
    #[inline]
    pub fn value(&self) -> &ScriptValue {
        &self.value
    }

    /// Diagnostic text in the form `Uncaught <description>`.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// Whether the runtime can keep executing script after this exception.
    ///
    /// This is `false` for stack overflows and terminated executions; such exceptions cannot be
    /// caught by script code either.
    #[inline]
    pub fn can_continue(&self) -> bool {
        self.can_continue
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Ways a call into script code can fail.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("{0}")]
    Exception(Box<Exception>),

    /// A typed failure raised by a host binding. It unwinds through script code without being
    /// catchable.
    #[error(transparent)]
    Host(DomainError),

    #[error("out of memory")]
    OutOfMemory,
}

impl CallError {
    #[inline]
    pub fn exception(&self) -> Option<&Exception> {
        match self {
            Self::Exception(exception) => Some(exception),
            _ => None,
        }
    }

    /// Returns `true` if a script `catch` clause may observe this error.
    pub(crate) fn is_catchable(&self) -> bool {
        matches!(self, Self::Exception(exception) if exception.can_continue())
    }
}

impl From<Exception> for CallError {
    fn from(exception: Exception) -> Self {
        Self::Exception(Box::new(exception))
    }
}

/// Error of [`Isolate::evaluate`](crate::Isolate::evaluate).
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Call(#[from] CallError),
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn test_compile_error_from_syntax() {
        let err = SyntaxError::new("Unexpected token '}'", "a +\n}", 4..5);
        assert_eq!(err.position(), (2, 1));
        let err = CompileError::from_syntax(&err, "userTransactionSource");
        assert_snapshot!(err.stack(), @r"
        SyntaxError: Unexpected token '}'
            at userTransactionSource:2:1
        ");
    }
}
