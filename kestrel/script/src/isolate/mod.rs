//! The tree-walking runtime scripts execute in.

mod interpreter;
mod scope;

use std::sync::Arc;

use smol_str::SmolStr;
use tracing::debug;

pub(crate) use self::scope::Scope;
use crate::ast::FunctionDef;
use crate::builtins;
use crate::error::{CallError, CompileError, Exception, ScriptError};
use crate::parser::{parse_function, parse_program};
use crate::span::line_column;
use crate::value::{
    Closure, Function, FunctionKind, ObjectKind, ObjectRef, ScriptValue, array_index,
    error_summary,
};

/// Resource limits of an [`Isolate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolateConfig {
    /// Deepest nesting of script function calls before a stack overflow is raised.
    pub max_call_depth: usize,
    /// Statements and calls a single outermost call may execute before it is terminated.
    pub max_steps: Option<u64>,
    /// Longest string, in bytes, a script may build.
    pub max_string_length: usize,
    /// Longest array a script may build.
    pub max_array_length: usize,
}

impl Default for IsolateConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            max_steps: None,
            max_string_length: 1 << 26,
            max_array_length: 1 << 24,
        }
    }
}

/// The kinds of built-in error objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    SyntaxError,
    ReferenceError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        Self::Error,
        Self::TypeError,
        Self::RangeError,
        Self::SyntaxError,
        Self::ReferenceError,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::TypeError => "TypeError",
            Self::RangeError => "RangeError",
            Self::SyntaxError => "SyntaxError",
            Self::ReferenceError => "ReferenceError",
        }
    }
}

/// Source text a function was compiled from.
pub(crate) struct Source {
    pub(crate) name: SmolStr,
    pub(crate) text: Arc<str>,
}

/// A script function invocation that is currently running.
struct Frame {
    function: SmolStr,
    source: Arc<Source>,
    position: usize,
}

/// Prototypes shared by every value of a kind.
pub(crate) struct Intrinsics {
    pub(crate) object_prototype: ObjectRef,
    pub(crate) function_prototype: ObjectRef,
    pub(crate) array_prototype: ObjectRef,
    pub(crate) string_prototype: ObjectRef,
    pub(crate) number_prototype: ObjectRef,
    error_prototypes: Vec<(ErrorKind, ObjectRef)>,
}

impl Intrinsics {
    fn new() -> Self {
        let object_prototype = ObjectRef::new(ObjectKind::Ordinary, None);
        let derived = || ObjectRef::new(ObjectKind::Ordinary, Some(object_prototype.clone()));
        let error_prototype = derived();
        error_prototype.set("name", "Error".into());
        error_prototype.set("message", "".into());
        let error_prototypes = ErrorKind::ALL
            .into_iter()
            .map(|kind| {
                let prototype = match kind {
                    ErrorKind::Error => error_prototype.clone(),
                    _ => {
                        let prototype =
                            ObjectRef::new(ObjectKind::Ordinary, Some(error_prototype.clone()));
                        prototype.set("name", kind.name().into());
                        prototype
                    }
                };
                (kind, prototype)
            })
            .collect();
        Self {
            function_prototype: derived(),
            array_prototype: derived(),
            string_prototype: derived(),
            number_prototype: derived(),
            error_prototypes,
            object_prototype,
        }
    }

    pub(crate) fn error_prototype(&self, kind: ErrorKind) -> ObjectRef {
        self.error_prototypes
            .iter()
            .find_map(|(k, prototype)| (*k == kind).then(|| prototype.clone()))
            .unwrap_or_else(|| self.object_prototype.clone())
    }
}

/// An isolated script heap with its own global object.
///
/// An isolate is single threaded: it is used by one caller at a time, which the execution
/// context pool guarantees.
pub struct Isolate {
    config: IsolateConfig,
    global: ObjectRef,
    intrinsics: Intrinsics,
    frames: Vec<Frame>,
    steps: u64,
}

impl Isolate {
    pub fn new(config: IsolateConfig) -> Self {
        let intrinsics = Intrinsics::new();
        let global = ObjectRef::new(ObjectKind::Ordinary, None);
        let mut isolate = Self {
            config,
            global,
            intrinsics,
            frames: Vec::new(),
            steps: 0,
        };
        builtins::install(&mut isolate);
        isolate
    }

    #[inline]
    pub fn config(&self) -> &IsolateConfig {
        &self.config
    }

    #[inline]
    pub fn global(&self) -> &ObjectRef {
        &self.global
    }

    #[inline]
    pub(crate) fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn set_global(&mut self, name: &str, value: ScriptValue) {
        self.global.set(name, value);
    }

    pub fn get_global(&self, name: &str) -> Option<ScriptValue> {
        self.global.get_own(name)
    }

    pub fn remove_global(&mut self, name: &str) -> bool {
        self.global.delete(name)
    }

    /// Number of script function calls currently running.
    #[inline]
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Compiles `body` into a function taking `params`, like the `Function` constructor.
    ///
    /// The function and the source it was compiled from are both called `name` in stack traces.
    pub fn compile_function(
        &mut self,
        params: &[&str],
        body: &str,
        name: &str,
    ) -> Result<ScriptValue, CompileError> {
        let (params, program) = parse_function(&params.join(","), body)
            .map_err(|err| CompileError::from_syntax(&err, name))?;
        let def = Arc::new(FunctionDef {
            name: Some(name.into()),
            params,
            body: program.body,
            arrow: false,
            span: 0..body.len(),
        });
        let source = Arc::new(Source {
            name: name.into(),
            text: body.into(),
        });
        Ok(self.create_function(&def, &Scope::root(), source))
    }

    /// Runs a program and returns the value of its last expression statement.
    pub fn evaluate(&mut self, source: &str, name: &str) -> Result<ScriptValue, ScriptError> {
        let program =
            parse_program(source).map_err(|err| CompileError::from_syntax(&err, name))?;
        if self.frames.is_empty() {
            self.steps = 0;
        }
        self.frames.push(Frame {
            function: SmolStr::default(),
            source: Arc::new(Source {
                name: name.into(),
                text: source.into(),
            }),
            position: 0,
        });
        let result = self.run_program(&Scope::root(), &program.body);
        self.frames.pop();
        Ok(result?)
    }

    /// Calls `function` with the given `this` value and arguments.
    pub fn call_function(
        &mut self,
        function: &ScriptValue,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> Result<ScriptValue, CallError> {
        let Some(object) = function.as_object() else {
            return Err(self.not_a_function(function));
        };
        let Some(kind) = object.function_kind() else {
            return Err(self.not_a_function(function));
        };
        if self.frames.is_empty() {
            self.steps = 0;
        }
        self.tick()?;
        match kind {
            FunctionKind::Native(native) => native(self, this, args),
            FunctionKind::Script(closure) => {
                let name = object.function_name().unwrap_or_default();
                self.call_closure(&closure, name, this, args)
            }
        }
    }

    /// Calls `function` as a constructor, like the `new` operator.
    pub fn construct(
        &mut self,
        function: &ScriptValue,
        args: &[ScriptValue],
    ) -> Result<ScriptValue, CallError> {
        let kind = function.as_object().and_then(ObjectRef::function_kind);
        let this = match kind {
            Some(FunctionKind::Script(closure)) if !closure.def.arrow => {
                let prototype = function.get("prototype").and_then(|p| p.as_object().cloned());
                ScriptValue::Object(ObjectRef::new(ObjectKind::Ordinary, prototype))
            }
            Some(FunctionKind::Native(_)) => ScriptValue::Undefined,
            _ => {
                let message = format!("{} is not a constructor", function.to_display_string());
                return Err(self.throw_error(ErrorKind::TypeError, message));
            }
        };
        let result = self.call_function(function, &this, args)?;
        Ok(match (result, this) {
            (result @ ScriptValue::Object(_), _) => result,
            (_, this @ ScriptValue::Object(_)) => this,
            _ => ScriptValue::object(),
        })
    }

    /// Reads a property, consulting the built-in prototypes of the value's kind.
    pub fn get_property(
        &mut self,
        target: &ScriptValue,
        key: &str,
    ) -> Result<ScriptValue, CallError> {
        let start = match target {
            ScriptValue::Undefined | ScriptValue::Null => {
                let message = format!(
                    "Cannot read properties of {} (reading '{key}')",
                    target.to_display_string()
                );
                return Err(self.throw_error(ErrorKind::TypeError, message));
            }
            ScriptValue::String(s) => {
                if key == "length" {
                    return Ok(ScriptValue::Number(s.chars().count() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map_or(ScriptValue::Undefined, |c| c.to_string().into()));
                }
                self.intrinsics.string_prototype.clone()
            }
            ScriptValue::Number(_) => self.intrinsics.number_prototype.clone(),
            ScriptValue::Bool(_) => self.intrinsics.object_prototype.clone(),
            ScriptValue::Object(object) => object.clone(),
        };
        let mut current = Some(start);
        while let Some(object) = current {
            if let Some(value) = object.get_own(key) {
                return Ok(value);
            }
            if let Some(handler) = object.host_handler() {
                if let Some(value) = handler.get(self, key)? {
                    return Ok(value);
                }
            }
            current = self.prototype_of(&object);
        }
        Ok(ScriptValue::Undefined)
    }

    /// Writes a property. Writes to primitive values are ignored.
    pub fn set_property(
        &mut self,
        target: &ScriptValue,
        key: &str,
        value: ScriptValue,
    ) -> Result<(), CallError> {
        match target {
            ScriptValue::Undefined | ScriptValue::Null => {
                let message = format!(
                    "Cannot set properties of {} (setting '{key}')",
                    target.to_display_string()
                );
                Err(self.throw_error(ErrorKind::TypeError, message))
            }
            ScriptValue::Object(object) => {
                if object.is_array() {
                    let len = match key {
                        "length" => Some(value.to_number()),
                        _ => array_index(key).map(|index| index as f64 + 1.0),
                    };
                    if let Some(len) = len {
                        self.check_array_length(len as usize)?;
                    }
                }
                object.set(key, value);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The prototype of `object`, falling back to the built-in prototype of its kind.
    pub(crate) fn prototype_of(&self, object: &ObjectRef) -> Option<ObjectRef> {
        if let Some(prototype) = object.explicit_prototype() {
            return Some(prototype);
        }
        let intrinsic = match &object.read().kind {
            ObjectKind::Array(_) => &self.intrinsics.array_prototype,
            ObjectKind::Function(_) => &self.intrinsics.function_prototype,
            ObjectKind::Ordinary | ObjectKind::Error | ObjectKind::Host(_) => {
                &self.intrinsics.object_prototype
            }
        };
        (!intrinsic.ptr_eq(object)).then(|| intrinsic.clone())
    }

    /// Creates an error object whose stack trace points at the running script code.
    pub fn create_error(&self, kind: ErrorKind, message: impl Into<String>) -> ScriptValue {
        let message = message.into();
        let object = ObjectRef::new(
            ObjectKind::Error,
            Some(self.intrinsics.error_prototype(kind)),
        );
        let header = if message.is_empty() {
            kind.name().to_string()
        } else {
            format!("{}: {message}", kind.name())
        };
        object.set("message", message.into());
        object.set("stack", self.stack_trace(header).into());
        object.into()
    }

    /// Creates an error object and the exception throwing it.
    pub fn throw_error(&self, kind: ErrorKind, message: impl Into<String>) -> CallError {
        self.throw_value(self.create_error(kind, message))
    }

    /// Creates the exception of a `throw` statement.
    pub fn throw_value(&self, value: ScriptValue) -> CallError {
        CallError::from(self.exception(value, true))
    }

    fn exception(&self, value: ScriptValue, can_continue: bool) -> Exception {
        let description = match &value {
            ScriptValue::Object(object) if object.is_error() => error_summary(object),
            ScriptValue::Object(object) if object.is_array() => value.to_display_string(),
            ScriptValue::Object(_) => "#<Object>".to_string(),
            other => other.to_display_string(),
        };
        let stack = value
            .get("stack")
            .and_then(|stack| stack.as_str().map(String::from));
        Exception::new(value, format!("Uncaught {description}"), stack, can_continue)
    }

    /// Appends the running frames, innermost first, to `header`.
    fn stack_trace(&self, header: String) -> String {
        let mut trace = header;
        for frame in self.frames.iter().rev() {
            let (line, column) = line_column(&frame.source.text, frame.position);
            let location = format!("{}:{line}:{column}", frame.source.name);
            if frame.function.is_empty() {
                trace.push_str(&format!("\n    at {location}"));
            } else {
                trace.push_str(&format!("\n    at {} ({location})", frame.function));
            }
        }
        trace
    }

    fn not_a_function(&self, value: &ScriptValue) -> CallError {
        let message = format!("{} is not a function", value.to_display_string());
        self.throw_error(ErrorKind::TypeError, message)
    }

    fn stack_overflow(&self) -> CallError {
        debug!(depth = self.frames.len(), "script call stack exhausted");
        let value = self.create_error(ErrorKind::RangeError, "Maximum call stack size exceeded");
        CallError::from(self.exception(value, false))
    }

    /// Counts one unit of work, terminating execution once the step budget is spent.
    pub(crate) fn tick(&mut self) -> Result<(), CallError> {
        self.steps += 1;
        match self.config.max_steps {
            Some(max_steps) if self.steps > max_steps => {
                debug!(steps = self.steps, "script execution terminated");
                Err(CallError::from(Exception::new(
                    ScriptValue::Undefined,
                    "execution terminated".into(),
                    None,
                    false,
                )))
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn check_string_length(&self, len: usize) -> Result<(), CallError> {
        if len > self.config.max_string_length {
            return Err(CallError::OutOfMemory);
        }
        Ok(())
    }

    pub(crate) fn check_array_length(&self, len: usize) -> Result<(), CallError> {
        if len > self.config.max_array_length {
            return Err(CallError::OutOfMemory);
        }
        Ok(())
    }

    pub(crate) fn create_function(
        &self,
        def: &Arc<FunctionDef>,
        scope: &Scope,
        source: Arc<Source>,
    ) -> ScriptValue {
        let closure = Closure {
            def: def.clone(),
            scope: scope.clone(),
            source,
        };
        let function = Function {
            name: def.name.clone().unwrap_or_default(),
            kind: FunctionKind::Script(Arc::new(closure)),
        };
        let object = ObjectRef::new(ObjectKind::Function(function), None);
        if !def.arrow {
            object.set("prototype", ScriptValue::object());
        }
        object.into()
    }

    fn call_closure(
        &mut self,
        closure: &Closure,
        name: SmolStr,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> Result<ScriptValue, CallError> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(self.stack_overflow());
        }
        let this = (!closure.def.arrow).then(|| this.clone());
        let scope = Scope::function(&closure.scope, this);
        for (index, param) in closure.def.params.iter().enumerate() {
            let value = args.get(index).cloned().unwrap_or_default();
            scope.declare(param.clone(), value, true);
        }
        self.frames.push(Frame {
            function: name,
            source: closure.source.clone(),
            position: closure.def.span.start,
        });
        let result = self.run_function_body(&scope, &closure.def.body);
        self.frames.pop();
        result
    }

    fn current_source(&self) -> Arc<Source> {
        self.frames.last().map_or_else(
            || {
                Arc::new(Source {
                    name: SmolStr::default(),
                    text: "".into(),
                })
            },
            |frame| frame.source.clone(),
        )
    }

    fn set_position(&mut self, position: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.position = position;
        }
    }

    /// Source text of the running frame at `span`, used in diagnostics.
    fn source_slice(&self, span: std::ops::Range<usize>) -> String {
        self.frames
            .last()
            .and_then(|frame| frame.source.text.get(span))
            .map_or_else(|| "expression".to_string(), str::to_string)
    }
}

impl Default for Isolate {
    fn default() -> Self {
        Self::new(IsolateConfig::default())
    }
}
