use super::{arg, define};
use crate::codec::{CodecError, from_json, to_json};
use crate::isolate::{ErrorKind, Isolate};
use crate::value::{ObjectRef, ScriptValue};

pub(super) fn install(isolate: &mut Isolate) {
    let json = ObjectRef::ordinary();
    define(&json, "stringify", |isolate, _, args| {
        let value = match to_json(&arg(args, 0)) {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(ScriptValue::Undefined),
            Err(CodecError::Circular) => {
                return Err(isolate.throw_error(
                    ErrorKind::TypeError,
                    "Converting circular structure to JSON",
                ));
            }
            Err(err @ CodecError::TooDeep) => {
                return Err(isolate.throw_error(ErrorKind::RangeError, err.to_string()));
            }
        };
        let pretty = !arg(args, 2).is_nullish();
        let text = if pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
        .map_err(|err| isolate.throw_error(ErrorKind::Error, err.to_string()))?;
        isolate.check_string_length(text.len())?;
        Ok(text.into())
    });
    define(&json, "parse", |isolate, _, args| {
        let text = arg(args, 0).to_display_string();
        match serde_json::from_str(&text) {
            Ok(value) => Ok(from_json(&value)),
            Err(err) => Err(isolate.throw_error(ErrorKind::SyntaxError, err.to_string())),
        }
    });
    isolate.set_global("JSON", json.into());
}

#[cfg(test)]
mod tests {
    use super::super::tests::{eval, eval_string};

    #[test]
    fn test_stringify() {
        assert_eq!(
            eval_string("JSON.stringify({b: [1, 'two', null], a: {c: true}, u: undefined})"),
            r#"{"b":[1,"two",null],"a":{"c":true}}"#
        );
        assert!(eval("JSON.stringify(undefined)").is_undefined());
        assert_eq!(eval_string("JSON.stringify(0.5)"), "0.5");
    }

    #[test]
    fn test_stringify_pretty() {
        insta::assert_snapshot!(eval_string("JSON.stringify({a: [1]}, null, 2)"), @r#"
        {
          "a": [
            1
          ]
        }
        "#);
    }

    #[test]
    fn test_stringify_circular() {
        let source = "var o = {}; o.o = o; var m; try { JSON.stringify(o) } catch (e) { m = String(e) } m";
        assert_eq!(eval_string(source), "TypeError: Converting circular structure to JSON");
    }

    #[test]
    fn test_parse() {
        assert_eq!(eval_string("JSON.parse('{\"x\": [1, 2]}').x[1]"), "2");
        let source = "var n; try { JSON.parse('{') } catch (e) { n = e.name } n";
        assert_eq!(eval_string(source), "SyntaxError");
    }
}
