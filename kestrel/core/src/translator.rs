//! Maps exceptions thrown by actions to domain errors.

use kestrel_common::{DomainError, ErrorCode};
use kestrel_script::{Exception, ScriptValue};

/// Result of translating an exception.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Whether the runtime that raised the exception may run script again.
    pub can_continue: bool,
    /// `None` if the thrown value carries no recognizable error shape.
    pub error: Option<DomainError>,
}

impl Translation {
    /// The error to report, falling back to an internal error with the runtime's diagnostic
    /// text of `exception`.
    pub fn into_error(self, exception: &Exception) -> DomainError {
        self.error
            .unwrap_or_else(|| DomainError::internal(exception.message()))
    }
}

/// Translates `exception`.
///
/// A thrown value with `errorNum` and `errorMessage` keeps that code and message. Otherwise a
/// `name` and `message` pair is recognized: `TypeError` maps to a type error and any other name
/// to an internal error reading `<name>: <message>`.
pub fn translate(exception: &Exception) -> Translation {
    Translation {
        can_continue: exception.can_continue(),
        error: extract(exception.value()),
    }
}

fn extract(value: &ScriptValue) -> Option<DomainError> {
    let object = value.as_object()?;
    if let (Some(code), Some(message)) = (object.get("errorNum"), object.get("errorMessage")) {
        let code = code.to_number();
        let code = if code.is_finite() { code as i64 } else { 0 };
        return Some(DomainError::new(
            ErrorCode::new(code),
            message.to_display_string(),
        ));
    }
    let (name, message) = (object.get("name")?, object.get("message")?);
    let name = name.to_display_string();
    let message = message.to_display_string();
    Some(if name == "TypeError" {
        DomainError::new(ErrorCode::TYPE_ERROR, message)
    } else {
        DomainError::internal(format!("{name}: {message}"))
    })
}
