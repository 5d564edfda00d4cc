use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use smol_str::SmolStr;

use crate::value::ScriptValue;

/// A lexical environment. Closures keep the scope they were created in alive.
#[derive(Clone)]
pub(crate) struct Scope(Arc<Mutex<ScopeData>>);

struct ScopeData {
    bindings: HashMap<SmolStr, Binding>,
    parent: Option<Scope>,
    /// `var` declarations land in the nearest function scope.
    function: bool,
    /// `None` for block scopes and arrow functions, which see the `this` of their parent.
    this: Option<ScriptValue>,
}

struct Binding {
    value: ScriptValue,
    mutable: bool,
}

pub(crate) enum Assignment {
    Assigned,
    Constant,
    Unresolved,
}

impl Scope {
    fn with(parent: Option<Scope>, function: bool, this: Option<ScriptValue>) -> Self {
        Self(Arc::new(Mutex::new(ScopeData {
            bindings: HashMap::new(),
            parent,
            function,
            this,
        })))
    }

    /// A top-level scope. Names it cannot resolve are looked up on the global object.
    pub(crate) fn root() -> Self {
        Self::with(None, true, Some(ScriptValue::Undefined))
    }

    pub(crate) fn function(parent: &Scope, this: Option<ScriptValue>) -> Self {
        Self::with(Some(parent.clone()), true, this)
    }

    pub(crate) fn block(&self) -> Self {
        Self::with(Some(self.clone()), false, None)
    }

    pub(crate) fn declare(&self, name: SmolStr, value: ScriptValue, mutable: bool) {
        self.0
            .lock()
            .bindings
            .insert(name, Binding { value, mutable });
    }

    pub(crate) fn has_own(&self, name: &str) -> bool {
        self.0.lock().bindings.contains_key(name)
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<ScriptValue> {
        let mut current = self.clone();
        loop {
            let parent = {
                let data = current.0.lock();
                if let Some(binding) = data.bindings.get(name) {
                    return Some(binding.value.clone());
                }
                data.parent.clone()
            };
            current = parent?;
        }
    }

    pub(crate) fn assign(&self, name: &str, value: ScriptValue) -> Assignment {
        let mut current = self.clone();
        loop {
            let parent = {
                let mut data = current.0.lock();
                if let Some(binding) = data.bindings.get_mut(name) {
                    if !binding.mutable {
                        return Assignment::Constant;
                    }
                    binding.value = value;
                    return Assignment::Assigned;
                }
                data.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => return Assignment::Unresolved,
            }
        }
    }

    pub(crate) fn this(&self) -> ScriptValue {
        let mut current = self.clone();
        loop {
            let parent = {
                let data = current.0.lock();
                if let Some(this) = &data.this {
                    return this.clone();
                }
                data.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => return ScriptValue::Undefined,
            }
        }
    }

    /// The nearest enclosing function scope, which holds `var` declarations.
    pub(crate) fn function_scope(&self) -> Scope {
        let mut current = self.clone();
        loop {
            let parent = {
                let data = current.0.lock();
                if data.function {
                    return current.clone();
                }
                data.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_and_assignment() {
        let root = Scope::root();
        root.declare("x".into(), 1.0.into(), true);
        let block = root.block();
        block.declare("x".into(), 2.0.into(), false);

        assert_eq!(block.lookup("x").and_then(|v| v.as_number()), Some(2.0));
        assert!(matches!(block.assign("x", 3.0.into()), Assignment::Constant));
        assert!(matches!(root.assign("x", 4.0.into()), Assignment::Assigned));
        assert_eq!(root.lookup("x").and_then(|v| v.as_number()), Some(4.0));
        assert!(matches!(block.assign("y", 1.0.into()), Assignment::Unresolved));
    }

    #[test]
    fn test_function_scope_and_this() {
        let root = Scope::root();
        let function = Scope::function(&root, Some("self".into()));
        let block = function.block();
        let arrow = Scope::function(&block, None);

        assert!(Arc::ptr_eq(&arrow.block().function_scope().0, &arrow.0));
        assert!(Arc::ptr_eq(&block.function_scope().0, &function.0));
        assert_eq!(arrow.this().as_str(), Some("self"));
        assert!(root.this().is_undefined());
    }
}
