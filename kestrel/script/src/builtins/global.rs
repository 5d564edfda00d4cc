use tracing::{error, info, warn};

use super::{NativeResult, arg, define};
use crate::isolate::{ErrorKind, Isolate};
use crate::value::{ObjectRef, ScriptValue, number_to_string, string_to_number};

pub(super) fn install(isolate: &mut Isolate) {
    isolate.set_global("undefined", ScriptValue::Undefined);
    isolate.set_global("NaN", ScriptValue::Number(f64::NAN));
    isolate.set_global("Infinity", ScriptValue::Number(f64::INFINITY));

    install_object(isolate);
    install_function(isolate);
    install_primitives(isolate);
    install_math(isolate);
    install_console(isolate);

    let global = isolate.global().clone();
    define(&global, "isNaN", |_, _, args| {
        Ok(arg(args, 0).to_number().is_nan().into())
    });
    define(&global, "parseInt", |_, _, args| {
        let radix = arg(args, 1).to_number();
        let radix = (radix.is_finite() && radix != 0.0).then_some(radix as u32);
        Ok(parse_int(&arg(args, 0).to_display_string(), radix).into())
    });
    define(&global, "parseFloat", |_, _, args| {
        Ok(parse_float(&arg(args, 0).to_display_string()).into())
    });
}

fn install_object(isolate: &mut Isolate) {
    let prototype = isolate.intrinsics().object_prototype.clone();
    define(&prototype, "hasOwnProperty", |_, this, args| {
        let key = arg(args, 0).to_display_string();
        Ok(this.as_object().is_some_and(|o| o.has_own(&key)).into())
    });
    define(&prototype, "toString", |_, this, _| {
        Ok(match this {
            ScriptValue::Object(object) if object.is_error() || object.is_array() => {
                this.to_display_string().into()
            }
            ScriptValue::Object(_) => "[object Object]".into(),
            other => other.to_display_string().into(),
        })
    });

    let constructor = ScriptValue::native("Object", |_, _, args| {
        Ok(match arg(args, 0) {
            value @ ScriptValue::Object(_) => value,
            _ => ScriptValue::object(),
        })
    });
    let object = constructor.as_object().cloned();
    if let Some(object) = &object {
        object.set("prototype", prototype.into());
        define(object, "keys", |_, _, args| {
            let keys = match arg(args, 0) {
                ScriptValue::Object(object) => object
                    .keys()
                    .into_iter()
                    .map(|key| ScriptValue::string(key.as_str()))
                    .collect(),
                _ => Vec::new(),
            };
            Ok(ScriptValue::array(keys))
        });
        define(object, "values", |isolate, _, args| {
            let target = arg(args, 0);
            let keys = target.as_object().map(ObjectRef::keys).unwrap_or_default();
            let values = keys
                .iter()
                .map(|key| isolate.get_property(&target, key))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ScriptValue::array(values))
        });
        define(object, "assign", |isolate, _, args| {
            let target = arg(args, 0);
            for source in args.iter().skip(1) {
                let Some(object) = source.as_object() else {
                    continue;
                };
                for key in object.keys() {
                    let value = object.get_own(&key).unwrap_or_default();
                    isolate.set_property(&target, &key, value)?;
                }
            }
            Ok(target)
        });
    }
    isolate.set_global("Object", constructor);
}

fn install_function(isolate: &mut Isolate) {
    let prototype = isolate.intrinsics().function_prototype.clone();
    define(&prototype, "call", |isolate, this, args| {
        let rest = args.get(1..).unwrap_or_default();
        isolate.call_function(this, &arg(args, 0), rest)
    });
    define(&prototype, "apply", |isolate, this, args| {
        let rest = match arg(args, 1) {
            ScriptValue::Object(object) => object.array_elements().unwrap_or_default(),
            _ => Vec::new(),
        };
        isolate.call_function(this, &arg(args, 0), &rest)
    });
    define(&prototype, "toString", |_, this, _| {
        Ok(this.to_display_string().into())
    });

    let constructor = ScriptValue::native("Function", |isolate, _, args| {
        let (body, params) = match args.split_last() {
            Some((body, params)) => (body.to_display_string(), params),
            None => (String::new(), args),
        };
        let params: Vec<String> = params.iter().map(|p| p.to_display_string()).collect();
        let params: Vec<&str> = params.iter().map(String::as_str).collect();
        isolate
            .compile_function(&params, &body, "anonymous")
            .map_err(|err| {
                let message = err.message().trim_start_matches("SyntaxError: ").to_string();
                isolate.throw_error(ErrorKind::SyntaxError, message)
            })
    });
    if let Some(object) = constructor.as_object() {
        object.set("prototype", prototype.into());
    }
    isolate.set_global("Function", constructor);
}

fn install_primitives(isolate: &mut Isolate) {
    let array_prototype = isolate.intrinsics().array_prototype.clone();
    let array = ScriptValue::native("Array", |isolate, _, args| match args {
        [ScriptValue::Number(len)] => {
            if len.fract() != 0.0 || *len < 0.0 {
                return Err(isolate.throw_error(ErrorKind::RangeError, "Invalid array length"));
            }
            isolate.check_array_length(*len as usize)?;
            Ok(ScriptValue::array(vec![ScriptValue::Undefined; *len as usize]))
        }
        _ => Ok(ScriptValue::array(args.to_vec())),
    });
    if let Some(object) = array.as_object() {
        object.set("prototype", array_prototype.into());
        define(object, "isArray", |_, _, args| {
            Ok(arg(args, 0).as_object().is_some_and(ObjectRef::is_array).into())
        });
    }
    isolate.set_global("Array", array);

    let string_prototype = isolate.intrinsics().string_prototype.clone();
    let string = ScriptValue::native("String", |_, _, args| {
        Ok(match args.first() {
            Some(value) => value.to_display_string().into(),
            None => "".into(),
        })
    });
    if let Some(object) = string.as_object() {
        object.set("prototype", string_prototype.into());
    }
    isolate.set_global("String", string);

    let number_prototype = isolate.intrinsics().number_prototype.clone();
    define(&number_prototype, "toString", |_, this, _| {
        Ok(number_to_string(this.to_number()).into())
    });
    define(&number_prototype, "toFixed", |isolate, this, args| {
        let digits = arg(args, 0).to_number();
        let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
        if !(0.0..=100.0).contains(&digits) {
            return Err(isolate.throw_error(
                ErrorKind::RangeError,
                "toFixed() digits argument must be between 0 and 100",
            ));
        }
        let n = this.to_number();
        if !n.is_finite() {
            return Ok(number_to_string(n).into());
        }
        Ok(format!("{n:.*}", digits as usize).into())
    });
    let number = ScriptValue::native("Number", |_, _, args| {
        Ok(args.first().map_or(0.0, ScriptValue::to_number).into())
    });
    if let Some(object) = number.as_object() {
        object.set("prototype", number_prototype.into());
        define(object, "isInteger", |_, _, args| {
            Ok(matches!(arg(args, 0), ScriptValue::Number(n) if n.is_finite() && n.fract() == 0.0)
                .into())
        });
    }
    isolate.set_global("Number", number);

    isolate.set_global(
        "Boolean",
        ScriptValue::native("Boolean", |_, _, args| Ok(arg(args, 0).truthy().into())),
    );
}

fn install_math(isolate: &mut Isolate) {
    let math = ObjectRef::ordinary();
    math.set("PI", std::f64::consts::PI.into());
    let unary: [(&str, fn(f64) -> f64); 6] = [
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("abs", f64::abs),
        ("sqrt", f64::sqrt),
        ("trunc", f64::trunc),
        // Halves round towards positive infinity.
        ("round", |n| (n + 0.5).floor()),
    ];
    for (name, function) in unary {
        define(&math, name, move |_, _, args| {
            Ok(function(arg(args, 0).to_number()).into())
        });
    }
    define(&math, "pow", |_, _, args| {
        Ok(arg(args, 0).to_number().powf(arg(args, 1).to_number()).into())
    });
    define(&math, "min", |_, _, args| {
        Ok(args
            .iter()
            .map(ScriptValue::to_number)
            .try_fold(f64::INFINITY, |min, n| (!n.is_nan()).then(|| min.min(n)))
            .unwrap_or(f64::NAN)
            .into())
    });
    define(&math, "max", |_, _, args| {
        Ok(args
            .iter()
            .map(ScriptValue::to_number)
            .try_fold(f64::NEG_INFINITY, |max, n| (!n.is_nan()).then(|| max.max(n)))
            .unwrap_or(f64::NAN)
            .into())
    });
    isolate.set_global("Math", math.into());
}

fn install_console(isolate: &mut Isolate) {
    fn join_args(args: &[ScriptValue]) -> String {
        args.iter()
            .map(ScriptValue::to_display_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    let console = ObjectRef::ordinary();
    define(&console, "log", |_, _, args| -> NativeResult {
        info!(target: "kestrel::console", "{}", join_args(args));
        Ok(ScriptValue::Undefined)
    });
    define(&console, "warn", |_, _, args| -> NativeResult {
        warn!(target: "kestrel::console", "{}", join_args(args));
        Ok(ScriptValue::Undefined)
    });
    define(&console, "error", |_, _, args| -> NativeResult {
        error!(target: "kestrel::console", "{}", join_args(args));
        Ok(ScriptValue::Undefined)
    });
    isolate.set_global("console", console.into());
}

/// Parses the longest integer prefix of `input`, like the global `parseInt`.
fn parse_int(input: &str, radix: Option<u32>) -> f64 {
    let input = input.trim_start();
    let (negative, input) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };
    let (radix, input) = match radix {
        Some(16) | None if input.starts_with("0x") || input.starts_with("0X") => (16, &input[2..]),
        Some(radix) => (radix, input),
        None => (10, input),
    };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: Vec<u32> = input.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits
        .iter()
        .fold(0.0, |acc, digit| acc * f64::from(radix) + f64::from(*digit));
    if negative { -value } else { value }
}

/// Parses the longest decimal prefix of `input`, like the global `parseFloat`.
fn parse_float(input: &str) -> f64 {
    let input = input.trim_start();
    let unsigned = input.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") {
        return if input.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let end = input
        .char_indices()
        .map(|(index, c)| index + c.len_utf8())
        .take_while(|end| {
            let prefix = &input[..*end];
            prefix
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        })
        .filter(|end| input[..*end].parse::<f64>().is_ok())
        .last();
    end.map_or(f64::NAN, |end| string_to_number(&input[..end]))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{eval, eval_string};
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", None), 42.0);
        assert_eq!(parse_int("  -17", None), -17.0);
        assert_eq!(parse_int("0x1F", None), 31.0);
        assert_eq!(parse_int("ff", Some(16)), 255.0);
        assert!(parse_int("px", None).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.25abc"), 3.25);
        assert_eq!(parse_float("-1e3"), -1000.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn test_object_functions() {
        assert_eq!(eval_string("Object.keys({a: 1, b: 2}).join()"), "a,b");
        assert_eq!(eval_string("Object.values({a: 1, b: 2}).join()"), "1,2");
        assert_eq!(
            eval_string("var o = Object.assign({a: 1}, {b: 2}); o.a + o.b"),
            "3"
        );
        assert_eq!(eval_string("({a: 1}).hasOwnProperty('a')"), "true");
        assert_eq!(eval_string("String({})"), "[object Object]");
    }

    #[test]
    fn test_function_constructor() {
        assert_eq!(eval_string("Function('a', 'b', 'return a * b')(6, 7)"), "42");
        assert_eq!(eval_string("var f = Function('return 1'); f.name"), "anonymous");
        assert_eq!(
            eval_string("var n; try { Function('return +') } catch (e) { n = e.name } n"),
            "SyntaxError"
        );
        assert_eq!(
            eval_string("function f() { return this.x } f.call({x: 5})"),
            "5"
        );
        assert_eq!(
            eval_string("function f(a, b) { return a + b } f.apply(null, [1, 2])"),
            "3"
        );
    }

    #[test]
    fn test_primitives_and_math() {
        assert_eq!(eval_string("Number('12') + 1"), "13");
        assert_eq!(eval_string("String(12) + 1"), "121");
        assert_eq!(eval_string("Array.isArray([]) && !Array.isArray({})"), "true");
        assert_eq!(eval_string("Array(3).length"), "3");
        assert_eq!(eval_string("Math.max(1, 5, 3) - Math.min(4, 2)"), "3");
        assert_eq!(eval_string("Math.floor(2.7) + Math.ceil(0.2)"), "3");
        assert_eq!(eval_string("(1.005).toFixed(1)"), "1.0");
        assert!(eval("Math.max(1, NaN)").to_number().is_nan());
        assert_eq!(eval_string("isNaN('x')"), "true");
    }
}
