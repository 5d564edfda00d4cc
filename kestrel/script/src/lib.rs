//! An embedded scripting runtime for transaction actions.
//!
//! Source text is tokenized by [`lexer`], parsed by [`parser`] into an [`ast`], and executed by
//! the tree-walking [`Isolate`]. Values cross the boundary to JSON documents through [`codec`].

pub mod ast;
mod builtins;
pub mod codec;
pub mod error;
pub mod isolate;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod span;
mod unescape;
pub mod value;

pub use codec::{CodecError, from_json, to_json};
pub use error::{CallError, CompileError, Exception, ScriptError, SyntaxError};
pub use isolate::{ErrorKind, Isolate, IsolateConfig};
pub use runtime::ScriptRuntime;
pub use value::{HostObject, NativeFn, ObjectRef, ScriptValue};
