use std::cmp::Ordering;
use std::sync::Arc;

use smol_str::SmolStr;

use super::scope::{Assignment, Scope};
use super::{ErrorKind, Isolate};
use crate::ast::*;
use crate::error::CallError;
use crate::span::Spanned;
use crate::value::{ObjectRef, ScriptValue, number_to_string};

/// How a statement completed.
pub(super) enum Flow {
    Normal,
    Return(ScriptValue),
    Break,
    Continue,
}

/// Something a value can be assigned to.
enum Reference {
    Binding(Ident),
    Property(ScriptValue, SmolStr),
}

type EvalResult<T = ScriptValue> = Result<T, CallError>;

impl Isolate {
    pub(super) fn run_program(&mut self, scope: &Scope, body: &[Stmt]) -> EvalResult {
        self.hoist(scope, body);
        let mut completion = ScriptValue::Undefined;
        for stmt in body {
            if let Stmt::Expr(expr) = stmt {
                self.tick()?;
                completion = self.eval(scope, expr)?;
                continue;
            }
            if let Flow::Return(value) = self.exec(scope, stmt)? {
                return Ok(value);
            }
        }
        Ok(completion)
    }

    pub(super) fn run_function_body(&mut self, scope: &Scope, body: &[Stmt]) -> EvalResult {
        self.hoist(scope, body);
        match self.exec_statements(scope, body)? {
            Flow::Return(value) => Ok(value),
            _ => Ok(ScriptValue::Undefined),
        }
    }

    /// Declares the `var`s and function declarations of a function body up front.
    fn hoist(&mut self, scope: &Scope, body: &[Stmt]) {
        let mut names = Vec::new();
        collect_var_names(body, &mut names);
        for name in names {
            if !scope.has_own(&name) {
                scope.declare(name, ScriptValue::Undefined, true);
            }
        }
        self.hoist_functions(scope, body);
    }

    fn hoist_functions(&mut self, scope: &Scope, body: &[Stmt]) {
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                let function = self.create_function(def, scope, self.current_source());
                let name = def.name.clone().unwrap_or_default();
                scope.declare(name, function, true);
            }
        }
    }

    fn exec_statements(&mut self, scope: &Scope, body: &[Stmt]) -> EvalResult<Flow> {
        for stmt in body {
            match self.exec(scope, stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, scope: &Scope, body: &[Stmt]) -> EvalResult<Flow> {
        let scope = scope.block();
        self.hoist_functions(&scope, body);
        self.exec_statements(&scope, body)
    }

    fn exec(&mut self, scope: &Scope, stmt: &Stmt) -> EvalResult<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Var { kind, declarations } => {
                for declarator in declarations {
                    let value = match &declarator.init {
                        Some(init) => Some(self.eval_named(scope, init, &declarator.name)?),
                        None => None,
                    };
                    match kind {
                        VarKind::Var => {
                            if let Some(value) = value {
                                scope
                                    .function_scope()
                                    .declare(declarator.name.clone(), value, true);
                            }
                        }
                        VarKind::Let | VarKind::Const => scope.declare(
                            declarator.name.clone(),
                            value.unwrap_or_default(),
                            *kind == VarKind::Let,
                        ),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(scope, expr)?,
                    None => ScriptValue::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Throw(expr) => {
                let value = self.eval(scope, expr)?;
                self.set_position(expr.1.start);
                Err(self.throw_value(value))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(scope, test)?.truthy() {
                    self.exec(scope, consequent)
                } else if let Some(alternate) = alternate {
                    self.exec(scope, alternate)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { test, body } => {
                while self.eval(scope, test)?.truthy() {
                    match self.exec(scope, body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let scope = scope.block();
                if let Some(init) = init {
                    self.exec(&scope, init)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(&scope, test)?.truthy() {
                            break;
                        }
                    }
                    match self.exec(&scope, body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(&scope, update)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForEach {
                kind,
                name,
                of,
                iterable,
                body,
            } => {
                let iterable = self.eval(scope, iterable)?;
                for value in self.iteration_values(*of, &iterable)? {
                    let scope = scope.block();
                    match kind {
                        Some(VarKind::Let) => scope.declare(name.clone(), value, true),
                        Some(VarKind::Const) => scope.declare(name.clone(), value, false),
                        Some(VarKind::Var) => {
                            scope.function_scope().declare(name.clone(), value, true)
                        }
                        None => {
                            self.put_reference(&scope, &Reference::Binding(name.clone()), value)?
                        }
                    }
                    match self.exec(&scope, body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_block(scope, block);
                if let (Err(err), Some(handler)) = (&result, handler) {
                    if err.is_catchable() {
                        let thrown = err
                            .exception()
                            .map(|exception| exception.value().clone())
                            .unwrap_or_default();
                        let scope = scope.block();
                        if let Some(param) = &handler.param {
                            scope.declare(param.clone(), thrown, true);
                        }
                        result = self.exec_block(&scope, &handler.body);
                    }
                }
                if let Some(finalizer) = finalizer {
                    let runs = match &result {
                        Ok(_) => true,
                        Err(err) => err.is_catchable(),
                    };
                    if runs {
                        match self.exec_block(scope, finalizer)? {
                            Flow::Normal => {}
                            flow => return Ok(flow),
                        }
                    }
                }
                result
            }
            Stmt::Block(body) => self.exec_block(scope, body),
            Stmt::Expr(expr) => {
                self.eval(scope, expr)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn iteration_values(&mut self, of: bool, iterable: &ScriptValue) -> EvalResult<Vec<ScriptValue>> {
        if of {
            if let ScriptValue::String(s) = iterable {
                return Ok(s.chars().map(|c| c.to_string().into()).collect());
            }
            if let Some(elements) = iterable.as_object().and_then(ObjectRef::array_elements) {
                return Ok(elements);
            }
            let message = format!("{} is not iterable", iterable.to_display_string());
            return Err(self.throw_error(ErrorKind::TypeError, message));
        }
        let keys = match iterable {
            ScriptValue::Object(object) => object
                .keys()
                .into_iter()
                .map(|key| ScriptValue::string(key.as_str()))
                .collect(),
            ScriptValue::String(s) => (0..s.chars().count())
                .map(|index| index.to_string().into())
                .collect(),
            _ => Vec::new(),
        };
        Ok(keys)
    }

    /// Evaluates `expr`, naming anonymous functions after the binding they are assigned to.
    fn eval_named(&mut self, scope: &Scope, expr: &SpannedExpr, name: &str) -> EvalResult {
        let value = self.eval(scope, expr)?;
        if let (Expr::Function(def), Some(object)) = (&expr.0, value.as_object()) {
            if def.name.is_none() {
                object.set_function_name(name);
            }
        }
        Ok(value)
    }

    pub(super) fn eval(&mut self, scope: &Scope, expr: &SpannedExpr) -> EvalResult {
        let Spanned(expr, span) = expr;
        match expr {
            Expr::Null => Ok(ScriptValue::Null),
            Expr::Bool(b) => Ok(ScriptValue::Bool(*b)),
            Expr::Number(n) => Ok(ScriptValue::Number(*n)),
            Expr::String(s) => Ok(ScriptValue::string(s.as_str())),
            Expr::Ident(name) => self.lookup(scope, name),
            Expr::This => Ok(scope.this()),
            Expr::Array(elements) => {
                self.check_array_length(elements.len())?;
                let elements = elements
                    .iter()
                    .map(|element| self.eval(scope, element))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(ScriptValue::array(elements))
            }
            Expr::Object(properties) => {
                let object = ScriptValue::object();
                for property in properties {
                    let value = self.eval_named(scope, &property.value, &property.key)?;
                    self.set_property(&object, &property.key, value)?;
                }
                Ok(object)
            }
            Expr::Function(def) => Ok(self.eval_function(scope, def)),
            Expr::Unary { op, operand } => {
                if let (UnaryOp::Typeof, Expr::Ident(name)) = (op, &operand.0) {
                    let value = scope.lookup(name).or_else(|| self.get_global(name));
                    return Ok(value.unwrap_or_default().type_of().into());
                }
                let value = self.eval(scope, operand)?;
                Ok(match op {
                    UnaryOp::Not => ScriptValue::Bool(!value.truthy()),
                    UnaryOp::Minus => ScriptValue::Number(-value.to_number()),
                    UnaryOp::Plus => ScriptValue::Number(value.to_number()),
                    UnaryOp::Typeof => value.type_of().into(),
                    UnaryOp::Void => ScriptValue::Undefined,
                })
            }
            Expr::Update { op, prefix, target } => {
                let reference = self.reference(scope, target)?;
                let old = self.get_reference(scope, &reference)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.put_reference(scope, &reference, ScriptValue::Number(new))?;
                Ok(ScriptValue::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(scope, left)?;
                let right = self.eval(scope, right)?;
                self.binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(scope, left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(scope, right)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(scope, test)?.truthy() {
                    self.eval(scope, consequent)
                } else {
                    self.eval(scope, alternate)
                }
            }
            Expr::Assign { op, target, value } => {
                let reference = self.reference(scope, target)?;
                let value = match op.binary() {
                    None => match &reference {
                        Reference::Binding(name) => self.eval_named(scope, value, name)?,
                        Reference::Property(..) => self.eval(scope, value)?,
                    },
                    Some(binary) => {
                        let current = self.get_reference(scope, &reference)?;
                        let value = self.eval(scope, value)?;
                        self.binary(binary, &current, &value)?
                    }
                };
                self.put_reference(scope, &reference, value.clone())?;
                Ok(value)
            }
            Expr::Member { object, property } => {
                let object = self.eval(scope, object)?;
                self.set_position(span.start);
                self.get_property(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(scope, object)?;
                let key = property_key(&self.eval(scope, index)?);
                self.set_position(span.start);
                self.get_property(&object, &key)
            }
            Expr::Call { callee, args } => {
                let (this, function) = match &callee.0 {
                    Expr::Member { object, property } => {
                        let object = self.eval(scope, object)?;
                        self.set_position(callee.1.start);
                        let function = self.get_property(&object, property)?;
                        (object, function)
                    }
                    Expr::Index { object, index } => {
                        let object = self.eval(scope, object)?;
                        let key = property_key(&self.eval(scope, index)?);
                        self.set_position(callee.1.start);
                        let function = self.get_property(&object, &key)?;
                        (object, function)
                    }
                    _ => (ScriptValue::Undefined, self.eval(scope, callee)?),
                };
                let args = self.eval_args(scope, args)?;
                self.set_position(span.start);
                if !function.is_callable() {
                    let message = format!("{} is not a function", self.source_slice(callee.span()));
                    return Err(self.throw_error(ErrorKind::TypeError, message));
                }
                self.call_function(&function, &this, &args)
            }
            Expr::New { callee, args } => {
                let function = self.eval(scope, callee)?;
                let args = self.eval_args(scope, args)?;
                self.set_position(span.start);
                if !function.is_callable() {
                    let message =
                        format!("{} is not a constructor", self.source_slice(callee.span()));
                    return Err(self.throw_error(ErrorKind::TypeError, message));
                }
                self.construct(&function, &args)
            }
        }
    }

    fn eval_args(&mut self, scope: &Scope, args: &[SpannedExpr]) -> EvalResult<Vec<ScriptValue>> {
        args.iter().map(|arg| self.eval(scope, arg)).collect()
    }

    fn eval_function(&mut self, scope: &Scope, def: &Arc<FunctionDef>) -> ScriptValue {
        let source = self.current_source();
        match (&def.name, def.arrow) {
            // A named function expression can refer to itself.
            (Some(name), false) => {
                let scope = scope.block();
                let function = self.create_function(def, &scope, source);
                scope.declare(name.clone(), function.clone(), false);
                function
            }
            _ => self.create_function(def, scope, source),
        }
    }

    fn lookup(&mut self, scope: &Scope, name: &str) -> EvalResult {
        if let Some(value) = scope.lookup(name) {
            return Ok(value);
        }
        match self.get_global(name) {
            Some(value) => Ok(value),
            None => Err(self.throw_error(
                ErrorKind::ReferenceError,
                format!("{name} is not defined"),
            )),
        }
    }

    fn reference(&mut self, scope: &Scope, target: &SpannedExpr) -> EvalResult<Reference> {
        match &target.0 {
            Expr::Ident(name) => Ok(Reference::Binding(name.clone())),
            Expr::Member { object, property } => {
                let object = self.eval(scope, object)?;
                Ok(Reference::Property(object, property.clone()))
            }
            Expr::Index { object, index } => {
                let object = self.eval(scope, object)?;
                let key = property_key(&self.eval(scope, index)?);
                Ok(Reference::Property(object, key))
            }
            _ => Err(self.throw_error(
                ErrorKind::SyntaxError,
                "Invalid left-hand side in assignment",
            )),
        }
    }

    fn get_reference(&mut self, scope: &Scope, reference: &Reference) -> EvalResult {
        match reference {
            Reference::Binding(name) => self.lookup(scope, name),
            Reference::Property(object, key) => self.get_property(object, key),
        }
    }

    fn put_reference(
        &mut self,
        scope: &Scope,
        reference: &Reference,
        value: ScriptValue,
    ) -> EvalResult<()> {
        match reference {
            Reference::Binding(name) => match scope.assign(name, value.clone()) {
                Assignment::Assigned => Ok(()),
                Assignment::Constant => Err(self.throw_error(
                    ErrorKind::TypeError,
                    "Assignment to constant variable.",
                )),
                Assignment::Unresolved => {
                    self.set_global(name, value);
                    Ok(())
                }
            },
            Reference::Property(object, key) => self.set_property(object, key, value),
        }
    }

    pub(crate) fn binary(
        &mut self,
        op: BinaryOp,
        left: &ScriptValue,
        right: &ScriptValue,
    ) -> EvalResult {
        let value = match op {
            BinaryOp::Add => {
                let (left, right) = (to_primitive(left), to_primitive(right));
                if matches!(left, ScriptValue::String(_)) || matches!(right, ScriptValue::String(_))
                {
                    let mut s = left.to_display_string();
                    let right = right.to_display_string();
                    self.check_string_length(s.len() + right.len())?;
                    s.push_str(&right);
                    ScriptValue::from(s)
                } else {
                    ScriptValue::Number(left.to_number() + right.to_number())
                }
            }
            BinaryOp::Sub => ScriptValue::Number(left.to_number() - right.to_number()),
            BinaryOp::Mul => ScriptValue::Number(left.to_number() * right.to_number()),
            BinaryOp::Div => ScriptValue::Number(left.to_number() / right.to_number()),
            BinaryOp::Mod => ScriptValue::Number(left.to_number() % right.to_number()),
            BinaryOp::Eq => ScriptValue::Bool(left.loose_equals(right)),
            BinaryOp::Ne => ScriptValue::Bool(!left.loose_equals(right)),
            BinaryOp::StrictEq => ScriptValue::Bool(left.strict_equals(right)),
            BinaryOp::StrictNe => ScriptValue::Bool(!left.strict_equals(right)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = compare(left, right);
                ScriptValue::Bool(match op {
                    BinaryOp::Lt => ordering == Some(Ordering::Less),
                    BinaryOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    BinaryOp::Gt => ordering == Some(Ordering::Greater),
                    _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                })
            }
            BinaryOp::Instanceof => ScriptValue::Bool(self.instance_of(left, right)?),
            BinaryOp::In => {
                let key = property_key(left);
                let Some(object) = right.as_object() else {
                    let message = format!(
                        "Cannot use 'in' operator to search for '{key}' in {}",
                        right.to_display_string()
                    );
                    return Err(self.throw_error(ErrorKind::TypeError, message));
                };
                let mut current = Some(object.clone());
                let mut found = false;
                while let Some(object) = current {
                    if object.has_own(&key) {
                        found = true;
                        break;
                    }
                    current = self.prototype_of(&object);
                }
                ScriptValue::Bool(found)
            }
        };
        Ok(value)
    }

    fn instance_of(&mut self, value: &ScriptValue, constructor: &ScriptValue) -> EvalResult<bool> {
        if !constructor.is_callable() {
            return Err(self.throw_error(
                ErrorKind::TypeError,
                "Right-hand side of 'instanceof' is not callable",
            ));
        }
        let prototype = self.get_property(constructor, "prototype")?;
        let (Some(prototype), Some(object)) = (prototype.as_object(), value.as_object()) else {
            return Ok(false);
        };
        let mut current = self.prototype_of(object);
        while let Some(candidate) = current {
            if candidate.ptr_eq(prototype) {
                return Ok(true);
            }
            current = self.prototype_of(&candidate);
        }
        Ok(false)
    }
}

/// Converts a value used as a property key to a string.
pub(crate) fn property_key(value: &ScriptValue) -> SmolStr {
    match value {
        ScriptValue::String(s) => SmolStr::new(s),
        ScriptValue::Number(n) => SmolStr::new(number_to_string(*n)),
        other => SmolStr::new(other.to_display_string()),
    }
}

fn to_primitive(value: &ScriptValue) -> ScriptValue {
    match value {
        ScriptValue::Object(_) => value.to_display_string().into(),
        other => other.clone(),
    }
}

fn compare(left: &ScriptValue, right: &ScriptValue) -> Option<Ordering> {
    match (to_primitive(left), to_primitive(right)) {
        (ScriptValue::String(a), ScriptValue::String(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

fn collect_var_names(body: &[Stmt], names: &mut Vec<Ident>) {
    for stmt in body {
        match stmt {
            Stmt::Var {
                kind: VarKind::Var,
                declarations,
            } => names.extend(declarations.iter().map(|d| d.name.clone())),
            Stmt::If {
                consequent,
                alternate,
                ..
            } => {
                collect_var_names(std::slice::from_ref(&**consequent), names);
                if let Some(alternate) = alternate {
                    collect_var_names(std::slice::from_ref(&**alternate), names);
                }
            }
            Stmt::While { body, .. } => collect_var_names(std::slice::from_ref(&**body), names),
            Stmt::For { init, body, .. } => {
                if let Some(init) = init {
                    collect_var_names(std::slice::from_ref(&**init), names);
                }
                collect_var_names(std::slice::from_ref(&**body), names);
            }
            Stmt::ForEach {
                kind, name, body, ..
            } => {
                if *kind == Some(VarKind::Var) {
                    names.push(name.clone());
                }
                collect_var_names(std::slice::from_ref(&**body), names);
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                collect_var_names(block, names);
                if let Some(handler) = handler {
                    collect_var_names(&handler.body, names);
                }
                if let Some(finalizer) = finalizer {
                    collect_var_names(finalizer, names);
                }
            }
            Stmt::Block(body) => collect_var_names(body, names),
            _ => {}
        }
    }
}
