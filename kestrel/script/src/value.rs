//! Values manipulated by scripts.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use smol_str::SmolStr;

use crate::ast::FunctionDef;
use crate::error::CallError;
use crate::isolate::{Isolate, Scope, Source};

/// Signature of functions implemented by the host.
///
/// The second argument is the `this` value of the call.
pub type NativeFn = Arc<
    dyn Fn(&mut Isolate, &ScriptValue, &[ScriptValue]) -> Result<ScriptValue, CallError>
        + Send
        + Sync,
>;

/// Resolves properties of host objects that are not stored on the object itself.
pub trait HostObject: Send + Sync {
    fn get(&self, isolate: &mut Isolate, key: &str) -> Result<Option<ScriptValue>, CallError>;
}

#[derive(Clone, Default)]
pub enum ScriptValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Object(ObjectRef),
}

impl ScriptValue {
    #[inline]
    pub fn string(value: impl Into<Arc<str>>) -> Self {
        Self::String(value.into())
    }

    /// Creates a function implemented by the host.
    pub fn native<F>(name: &str, function: F) -> Self
    where
        F: Fn(&mut Isolate, &ScriptValue, &[ScriptValue]) -> Result<ScriptValue, CallError>
            + Send
            + Sync
            + 'static,
    {
        let function = Function {
            name: name.into(),
            kind: FunctionKind::Native(Arc::new(function)),
        };
        Self::Object(ObjectRef::new(ObjectKind::Function(function), None))
    }

    /// Creates an empty ordinary object.
    #[inline]
    pub fn object() -> Self {
        Self::Object(ObjectRef::new(ObjectKind::Ordinary, None))
    }

    #[inline]
    pub fn array(elements: Vec<ScriptValue>) -> Self {
        Self::Object(ObjectRef::new(ObjectKind::Array(elements), None))
    }

    /// Creates an object whose missing properties are resolved by `handler`.
    pub fn host(handler: Arc<dyn HostObject>) -> Self {
        Self::Object(ObjectRef::new(ObjectKind::Host(handler), None))
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[inline]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(ObjectRef::is_callable)
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(object) if object.is_callable() => "function",
            Self::Object(_) => "object",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Object(object) => match object.array_elements().as_deref() {
                Some([]) => 0.0,
                Some([single]) => single.to_number(),
                _ => f64::NAN,
            },
        }
    }

    /// Converts the value to a string without running script code.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".into(),
            Self::Null => "null".into(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::String(s) => s.to_string(),
            Self::Object(object) => object.to_display_string(),
        }
    }

    pub fn strict_equals(&self, other: &ScriptValue) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &ScriptValue) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Object(_), b) => {
                ScriptValue::string(self.to_display_string()).loose_equals(b)
            }
            (a, Self::Object(_)) => {
                a.loose_equals(&ScriptValue::string(other.to_display_string()))
            }
            (Self::String(a), Self::String(b)) => a == b,
            (a, b) => a.to_number() == b.to_number(),
        }
    }

    /// Looks up a property on the object itself and its explicit prototypes.
    ///
    /// Primitive values have no properties here; use [`Isolate::get_property`] for the full
    /// lookup including built-in prototypes.
    pub fn get(&self, key: &str) -> Option<ScriptValue> {
        self.as_object().and_then(|object| object.get(key))
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&number_to_string(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Object(object) => write!(f, "{object:?}"),
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        Self::String(value.into())
    }
}

impl From<ObjectRef> for ScriptValue {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}

/// A shared reference to a heap object.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<Object>>);

pub(crate) struct Object {
    pub(crate) kind: ObjectKind,
    pub(crate) prototype: Option<ObjectRef>,
    pub(crate) properties: Vec<(SmolStr, ScriptValue)>,
}

impl Object {
    fn property(&self, key: &str) -> Option<&ScriptValue> {
        self.properties
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }
}

pub(crate) enum ObjectKind {
    Ordinary,
    Array(Vec<ScriptValue>),
    Function(Function),
    Error,
    Host(Arc<dyn HostObject>),
}

pub(crate) struct Function {
    pub(crate) name: SmolStr,
    pub(crate) kind: FunctionKind,
}

#[derive(Clone)]
pub(crate) enum FunctionKind {
    Script(Arc<Closure>),
    Native(NativeFn),
}

pub(crate) struct Closure {
    pub(crate) def: Arc<FunctionDef>,
    pub(crate) scope: Scope,
    pub(crate) source: Arc<Source>,
}

impl ObjectRef {
    pub(crate) fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self(Arc::new(RwLock::new(Object {
            kind,
            prototype,
            properties: Vec::new(),
        })))
    }

    /// Creates an empty ordinary object.
    pub fn ordinary() -> Self {
        Self::new(ObjectKind::Ordinary, None)
    }

    #[inline]
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Object> {
        self.0.read()
    }

    #[inline]
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Object> {
        self.0.write()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the object, stable while it is alive.
    #[inline]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.read().kind, ObjectKind::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.read().kind, ObjectKind::Array(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.read().kind, ObjectKind::Error)
    }

    /// A copy of the elements if the object is an array.
    pub fn array_elements(&self) -> Option<Vec<ScriptValue>> {
        match &self.read().kind {
            ObjectKind::Array(elements) => Some(elements.clone()),
            _ => None,
        }
    }

    /// The name of a function object, if the object is one.
    pub fn function_name(&self) -> Option<SmolStr> {
        match &self.read().kind {
            ObjectKind::Function(function) => Some(function.name.clone()),
            _ => None,
        }
    }

    /// Renames a function object. Does nothing for other objects.
    pub fn set_function_name(&self, name: &str) {
        if let ObjectKind::Function(function) = &mut self.write().kind {
            function.name = name.into();
        }
    }

    pub(crate) fn function_kind(&self) -> Option<FunctionKind> {
        match &self.read().kind {
            ObjectKind::Function(function) => Some(function.kind.clone()),
            _ => None,
        }
    }

    pub(crate) fn host_handler(&self) -> Option<Arc<dyn HostObject>> {
        match &self.read().kind {
            ObjectKind::Host(handler) => Some(handler.clone()),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn explicit_prototype(&self) -> Option<ObjectRef> {
        self.read().prototype.clone()
    }

    /// Looks up a property stored on the object itself.
    pub fn get_own(&self, key: &str) -> Option<ScriptValue> {
        let object = self.read();
        if let Some(value) = object.property(key) {
            return Some(value.clone());
        }
        match &object.kind {
            ObjectKind::Array(elements) => match key {
                "length" => Some(ScriptValue::Number(elements.len() as f64)),
                _ => array_index(key).and_then(|index| elements.get(index).cloned()),
            },
            ObjectKind::Function(function) if key == "name" => {
                Some(ScriptValue::string(function.name.as_str()))
            }
            _ => None,
        }
    }

    /// Looks up a property on the object and the prototypes it was created with.
    pub fn get(&self, key: &str) -> Option<ScriptValue> {
        let mut current = self.clone();
        loop {
            if let Some(value) = current.get_own(key) {
                return Some(value);
            }
            current = current.explicit_prototype()?;
        }
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.get_own(key).is_some()
    }

    /// Stores a property on the object itself.
    ///
    /// Array indices and `length` write through to the elements of arrays.
    pub fn set(&self, key: &str, value: ScriptValue) {
        let mut object = self.write();
        if let ObjectKind::Array(elements) = &mut object.kind {
            if key == "length" {
                let len = value.to_number();
                if len >= 0.0 && len.fract() == 0.0 {
                    elements.resize(len as usize, ScriptValue::Undefined);
                }
                return;
            }
            if let Some(index) = array_index(key) {
                if index >= elements.len() {
                    elements.resize(index + 1, ScriptValue::Undefined);
                }
                elements[index] = value;
                return;
            }
        }
        match object.properties.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => object.properties.push((key.into(), value)),
        }
    }

    /// Removes an own property, returning whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut object = self.write();
        let len = object.properties.len();
        object.properties.retain(|(k, _)| k != key);
        object.properties.len() != len
    }

    /// Own enumerable keys, array indices first.
    pub fn keys(&self) -> Vec<SmolStr> {
        let object = self.read();
        let indices = match &object.kind {
            ObjectKind::Array(elements) => elements.len(),
            _ => 0,
        };
        (0..indices)
            .map(|index| SmolStr::new(index.to_string()))
            .chain(object.properties.iter().map(|(k, _)| k.clone()))
            .collect()
    }

    /// Own enumerable properties in key order.
    pub fn entries(&self) -> Vec<(SmolStr, ScriptValue)> {
        self.read().properties.clone()
    }

    /// Appends to an array, returning its new length. Does nothing for other objects.
    pub(crate) fn push(&self, value: ScriptValue) -> usize {
        match &mut self.write().kind {
            ObjectKind::Array(elements) => {
                elements.push(value);
                elements.len()
            }
            _ => 0,
        }
    }

    fn to_display_string(&self) -> String {
        if let Some(elements) = self.array_elements() {
            return elements
                .iter()
                .map(|element| match element {
                    ScriptValue::Undefined | ScriptValue::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(",");
        }
        if let Some(name) = self.function_name() {
            return format!("function {name}() {{ [native code] }}");
        }
        if self.is_error() {
            return error_summary(self);
        }
        "[object Object]".into()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let object = self.read();
        match &object.kind {
            ObjectKind::Ordinary => write!(f, "[object#{:x}]", self.id()),
            ObjectKind::Array(elements) => write!(f, "[array({})#{:x}]", elements.len(), self.id()),
            ObjectKind::Function(function) => write!(f, "[function {}]", function.name),
            ObjectKind::Error => write!(f, "[error#{:x}]", self.id()),
            ObjectKind::Host(_) => write!(f, "[host#{:x}]", self.id()),
        }
    }
}

/// `"<name>: <message>"` of an error object, like `Error.prototype.toString`.
pub(crate) fn error_summary(object: &ObjectRef) -> String {
    let name = object
        .get("name")
        .map_or_else(|| "Error".to_string(), |v| v.to_display_string());
    let message = object
        .get("message")
        .map(|v| v.to_display_string())
        .unwrap_or_default();
    match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{name}: {message}"),
    }
}

/// Parses a canonical array index (`"0"`, `"17"`, but not `"01"` or `"-1"`).
pub(crate) fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Formats a number the way scripts print it: integral values have no fraction.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.into()
    } else if n == 0.0 {
        "0".into()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

/// Converts a string to a number: surrounding whitespace is ignored and an empty string is `0`.
pub(crate) fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    match s {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if s.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => s.parse().unwrap_or(f64::NAN),
    }
}
