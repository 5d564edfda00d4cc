use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use insta::assert_snapshot;
use kestrel_common::{DomainError, ErrorCode};
use kestrel_script::{
    CallError, HostObject, Isolate, IsolateConfig, ScriptError, ScriptRuntime, ScriptValue,
};

fn evaluate(source: &str) -> Result<ScriptValue, ScriptError> {
    Isolate::default().evaluate(source, "test")
}

fn exception(source: &str) -> kestrel_script::Exception {
    match evaluate(source) {
        Err(ScriptError::Call(CallError::Exception(exception))) => *exception,
        other => panic!("expected an exception, got {other:?}"),
    }
}

#[test]
fn test_compiled_function_receives_params() {
    let mut isolate = Isolate::default();
    let function = isolate
        .compile_function(
            &["params"],
            "return (function (p) { return p.a + p.b; })(params);",
            "userTransactionSource",
        )
        .unwrap();
    let params = kestrel_script::from_json(&serde_json::json!({"a": 40, "b": 2}));
    let result = isolate
        .call_function(&function, &ScriptValue::Undefined, &[params])
        .unwrap();
    assert_eq!(result.as_number(), Some(42.0));
}

#[test]
fn test_compile_error_stack() {
    let mut isolate = Isolate::default();
    let err = ScriptRuntime::compile_function(
        &mut isolate,
        &["params"],
        "return (function () {\n  return 1 +;\n})(params);",
        "userTransactionSource",
    )
    .unwrap_err();
    assert_snapshot!(err.stack(), @r"
    SyntaxError: Unexpected token ';'
        at userTransactionSource:2:13
    ");
}

#[test]
fn test_closures_and_scopes() {
    let source = r"
        function counter() {
            let n = 0;
            return { next: () => ++n };
        }
        const c = counter();
        c.next();
        c.next();
        let total = 0;
        for (let i = 0; i < 3; i++) { total += i * c.next(); }
        total + ':' + c.next()
    ";
    assert_eq!(evaluate(source).unwrap().to_display_string(), "14:6");
}

#[test]
fn test_control_flow() {
    let source = r"
        var out = [];
        for (const x of [1, 2, 3, 4, 5, 6]) {
            if (x == 2) continue;
            if (x == 5) break;
            out.push(x);
        }
        var keys = [];
        for (var k in {a: 1, b: 2}) keys.push(k);
        var w = 0;
        while (w < 10) w += 3;
        out.join() + '|' + keys.join() + '|' + w + '|' + (w > 10 ? 'big' : 'small')
    ";
    assert_eq!(evaluate(source).unwrap().to_display_string(), "1,3,4|a,b|12|big");
}

#[test]
fn test_try_catch_finally() {
    let source = r"
        var log = [];
        function f() {
            try {
                throw new Error('inner');
            } catch (e) {
                log.push(e.message);
                return 'from catch';
            } finally {
                log.push('finally');
            }
        }
        log.push(f());
        log.join()
    ";
    assert_eq!(
        evaluate(source).unwrap().to_display_string(),
        "inner,finally,from catch"
    );
}

#[test]
fn test_uncaught_error_message() {
    let exception = exception("function fail() { throw new TypeError('broken') }\nfail()");
    assert!(exception.can_continue());
    assert_eq!(exception.message(), "Uncaught TypeError: broken");
    assert_snapshot!(exception.stack().unwrap(), @r"
    TypeError: broken
        at fail (test:1:25)
        at test:2:1
    ");
}

#[test]
fn test_uncaught_primitive_and_object() {
    assert_eq!(exception("throw 'text'").message(), "Uncaught text");
    assert_eq!(exception("throw {code: 1}").message(), "Uncaught #<Object>");
    let thrown = exception("throw {errorNum: 1203, errorMessage: 'gone'}");
    assert_eq!(
        thrown.value().get("errorNum").and_then(|v| v.as_number()),
        Some(1203.0)
    );
    assert!(thrown.stack().is_none());
}

#[test]
fn test_reference_and_type_errors() {
    assert_eq!(
        exception("missing + 1").message(),
        "Uncaught ReferenceError: missing is not defined"
    );
    assert_eq!(
        exception("var o = {}; o.run()").message(),
        "Uncaught TypeError: o.run is not a function"
    );
    assert_eq!(
        exception("const c = 1; c = 2").message(),
        "Uncaught TypeError: Assignment to constant variable."
    );
}

#[test]
fn test_stack_overflow_is_not_catchable() {
    let source = "function f() { return f() }\ntry { f() } catch (e) { 'caught' }";
    let exception = exception(source);
    assert!(!exception.can_continue());
    assert_eq!(
        exception.message(),
        "Uncaught RangeError: Maximum call stack size exceeded"
    );
}

#[test]
fn test_step_limit_terminates_loops() {
    let mut isolate = Isolate::new(IsolateConfig {
        max_steps: Some(10_000),
        ..IsolateConfig::default()
    });
    let err = isolate
        .evaluate("try { while (true) {} } catch (e) {}", "test")
        .unwrap_err();
    let exception = match err {
        ScriptError::Call(CallError::Exception(exception)) => exception,
        other => panic!("expected termination, got {other:?}"),
    };
    assert!(!exception.can_continue());
    assert_eq!(exception.message(), "execution terminated");

    // The budget is per outermost call.
    assert!(isolate.evaluate("1 + 1", "test").is_ok());
}

#[test]
fn test_array_limit_reports_out_of_memory() {
    let mut isolate = Isolate::new(IsolateConfig {
        max_array_length: 100,
        ..IsolateConfig::default()
    });
    let err = isolate
        .evaluate("var a = []; for (var i = 0; i < 1000; i++) a.push(i);", "test")
        .unwrap_err();
    assert!(matches!(err, ScriptError::Call(CallError::OutOfMemory)));
}

struct Registry {
    lookups: AtomicUsize,
}

impl HostObject for Registry {
    fn get(&self, _: &mut Isolate, key: &str) -> Result<Option<ScriptValue>, CallError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match key {
            "forbidden" => Err(CallError::Host(DomainError::new(
                ErrorCode::BAD_PARAMETER,
                "forbidden lookup",
            ))),
            name if name.starts_with('_') => Ok(None),
            name => Ok(Some(format!("entry:{name}").into())),
        }
    }
}

#[test]
fn test_host_object_properties() {
    let registry = Arc::new(Registry {
        lookups: AtomicUsize::new(0),
    });
    let mut isolate = Isolate::default();
    isolate.set_global("registry", ScriptValue::host(registry.clone()));
    let value = isolate
        .evaluate("registry.users + ',' + registry['orders'] + ',' + registry._hidden", "test")
        .unwrap();
    assert_eq!(value.to_display_string(), "entry:users,entry:orders,undefined");
    assert_eq!(registry.lookups.load(Ordering::SeqCst), 3);
}

#[test]
fn test_host_errors_are_not_catchable() {
    let registry = Arc::new(Registry {
        lookups: AtomicUsize::new(0),
    });
    let mut isolate = Isolate::default();
    isolate.set_global("registry", ScriptValue::host(registry));
    let err = isolate
        .evaluate("try { registry.forbidden } catch (e) { 'swallowed' }", "test")
        .unwrap_err();
    let err = match err {
        ScriptError::Call(CallError::Host(err)) => err,
        other => panic!("expected a host error, got {other:?}"),
    };
    assert_eq!(err.code(), ErrorCode::BAD_PARAMETER);
    assert_eq!(err.message(), "forbidden lookup");
}

#[test]
fn test_native_functions_and_globals() {
    let mut isolate = Isolate::default();
    isolate.set_global(
        "twice",
        ScriptValue::native("twice", |isolate, _, args| {
            let f = args.first().cloned().unwrap_or_default();
            isolate.call_function(&f, &ScriptValue::Undefined, &[])?;
            isolate.call_function(&f, &ScriptValue::Undefined, &[])
        }),
    );
    let value = isolate
        .evaluate("n = 0; twice(() => n++); n", "test")
        .unwrap();
    assert_eq!(value.as_number(), Some(2.0));
    assert!(isolate.remove_global("twice"));
    assert!(isolate.get_global("twice").is_none());
    // Assignments to undeclared names create globals.
    assert_eq!(isolate.get_global("n").and_then(|v| v.as_number()), Some(2.0));
}
