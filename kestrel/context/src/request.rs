use kestrel_common::constants::DEFAULT_PORT_TYPE;
use kestrel_script::{ObjectRef, ScriptValue};

use crate::execution::SharedState;

/// Metadata of the call that is running in an execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub port_type: String,
    pub database: String,
}

impl RequestInfo {
    pub fn new(port_type: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            port_type: port_type.into(),
            database: database.into(),
        }
    }

    /// The object `internal.currentRequest()` returns to scripts.
    pub fn to_script_value(&self) -> ScriptValue {
        let object = ObjectRef::ordinary();
        object.set("portType", self.port_type.as_str().into());
        object.set("database", self.database.as_str().into());
        object.into()
    }
}

impl Default for RequestInfo {
    fn default() -> Self {
        Self::new(DEFAULT_PORT_TYPE, kestrel_common::constants::DEFAULT_DATABASE_NAME)
    }
}

/// Keeps a request in the ambient request slot of a context until dropped.
///
/// Dropping the scope restores whatever the slot held before, so scopes may nest.
#[must_use = "the request slot is reset as soon as the scope is dropped"]
pub struct RequestScope {
    state: SharedState,
    previous: Option<RequestInfo>,
}

impl RequestScope {
    pub fn enter(state: &SharedState, request: RequestInfo) -> Self {
        let previous = state.lock().request.replace(request);
        Self {
            state: state.clone(),
            previous,
        }
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.state.lock().request = self.previous.take();
    }
}
