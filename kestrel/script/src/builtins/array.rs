use std::cmp::Ordering;

use super::{NativeResult, arg, define, relative_index};
use crate::error::CallError;
use crate::isolate::{ErrorKind, Isolate};
use crate::value::{ObjectKind, ObjectRef, ScriptValue};

pub(super) fn install(isolate: &mut Isolate) {
    let prototype = isolate.intrinsics().array_prototype.clone();

    define(&prototype, "push", |isolate, this, args| {
        let array = this_array(isolate, this, "push")?;
        let len = array.array_elements().map_or(0, |e| e.len());
        isolate.check_array_length(len + args.len())?;
        let mut len = len;
        for value in args {
            len = array.push(value.clone());
        }
        Ok((len as f64).into())
    });
    define(&prototype, "pop", |isolate, this, _| {
        let array = this_array(isolate, this, "pop")?;
        Ok(update(&array, Vec::pop).flatten().unwrap_or_default())
    });
    define(&prototype, "shift", |isolate, this, _| {
        let array = this_array(isolate, this, "shift")?;
        Ok(update(&array, |elements| {
            (!elements.is_empty()).then(|| elements.remove(0))
        })
        .flatten()
        .unwrap_or_default())
    });
    define(&prototype, "join", |isolate, this, args| {
        let elements = this_elements(isolate, this, "join")?;
        let separator = match arg(args, 0) {
            ScriptValue::Undefined => ",".to_string(),
            value => value.to_display_string(),
        };
        let text = elements
            .iter()
            .map(|element| match element {
                ScriptValue::Undefined | ScriptValue::Null => String::new(),
                other => other.to_display_string(),
            })
            .collect::<Vec<_>>()
            .join(&separator);
        isolate.check_string_length(text.len())?;
        Ok(text.into())
    });
    define(&prototype, "indexOf", |isolate, this, args| {
        let elements = this_elements(isolate, this, "indexOf")?;
        let needle = arg(args, 0);
        let index = elements.iter().position(|e| e.strict_equals(&needle));
        Ok(index.map_or(-1.0, |i| i as f64).into())
    });
    define(&prototype, "includes", |isolate, this, args| {
        let elements = this_elements(isolate, this, "includes")?;
        let needle = arg(args, 0);
        let found = elements.iter().any(|e| match (e, &needle) {
            (ScriptValue::Number(a), ScriptValue::Number(b)) if a.is_nan() && b.is_nan() => true,
            (e, needle) => e.strict_equals(needle),
        });
        Ok(found.into())
    });
    define(&prototype, "slice", |isolate, this, args| {
        let elements = this_elements(isolate, this, "slice")?;
        let len = elements.len();
        let start = relative_index(&arg(args, 0), len, 0);
        let end = relative_index(&arg(args, 1), len, len);
        Ok(ScriptValue::array(elements.get(start..end).unwrap_or_default().to_vec()))
    });
    define(&prototype, "concat", |isolate, this, args| {
        let mut elements = this_elements(isolate, this, "concat")?;
        for value in args {
            match value.as_object().and_then(ObjectRef::array_elements) {
                Some(more) => elements.extend(more),
                None => elements.push(value.clone()),
            }
        }
        isolate.check_array_length(elements.len())?;
        Ok(ScriptValue::array(elements))
    });
    define(&prototype, "reverse", |isolate, this, _| {
        let array = this_array(isolate, this, "reverse")?;
        update(&array, |elements| elements.reverse());
        Ok(this.clone())
    });
    define(&prototype, "sort", |isolate, this, args| {
        let array = this_array(isolate, this, "sort")?;
        let comparator = arg(args, 0);
        let mut elements = array.array_elements().unwrap_or_default();
        sort(isolate, &mut elements, &comparator)?;
        update(&array, |slot| *slot = elements);
        Ok(this.clone())
    });

    define(&prototype, "forEach", |isolate, this, args| {
        each(isolate, this, args, "forEach", |_, _, _| Ok(None))?;
        Ok(ScriptValue::Undefined)
    });
    define(&prototype, "map", |isolate, this, args| {
        let mut mapped = Vec::new();
        each(isolate, this, args, "map", |_, _, result| {
            mapped.push(result);
            Ok(None)
        })?;
        Ok(ScriptValue::array(mapped))
    });
    define(&prototype, "filter", |isolate, this, args| {
        let mut kept = Vec::new();
        each(isolate, this, args, "filter", |_, element, result| {
            if result.truthy() {
                kept.push(element.clone());
            }
            Ok(None)
        })?;
        Ok(ScriptValue::array(kept))
    });
    define(&prototype, "find", |isolate, this, args| {
        let found = each(isolate, this, args, "find", |_, element, result| {
            Ok(result.truthy().then(|| element.clone()))
        })?;
        Ok(found.unwrap_or_default())
    });
    define(&prototype, "findIndex", |isolate, this, args| {
        let found = each(isolate, this, args, "findIndex", |index, _, result| {
            Ok(result.truthy().then(|| (index as f64).into()))
        })?;
        Ok(found.unwrap_or(ScriptValue::Number(-1.0)))
    });
    define(&prototype, "some", |isolate, this, args| {
        let found = each(isolate, this, args, "some", |_, _, result| {
            Ok(result.truthy().then_some(ScriptValue::Bool(true)))
        })?;
        Ok(found.unwrap_or(ScriptValue::Bool(false)))
    });
    define(&prototype, "every", |isolate, this, args| {
        let failed = each(isolate, this, args, "every", |_, _, result| {
            Ok((!result.truthy()).then_some(ScriptValue::Bool(false)))
        })?;
        Ok(failed.unwrap_or(ScriptValue::Bool(true)))
    });
    define(&prototype, "reduce", |isolate, this, args| {
        let elements = this_elements(isolate, this, "reduce")?;
        let callback = callback(isolate, args, "reduce")?;
        let mut iter = elements.into_iter().enumerate();
        let mut accumulator = match args.get(1) {
            Some(initial) => initial.clone(),
            None => match iter.next() {
                Some((_, first)) => first,
                None => {
                    return Err(isolate.throw_error(
                        ErrorKind::TypeError,
                        "Reduce of empty array with no initial value",
                    ));
                }
            },
        };
        for (index, element) in iter {
            let call_args = [accumulator, element, (index as f64).into(), this.clone()];
            accumulator = isolate.call_function(&callback, &ScriptValue::Undefined, &call_args)?;
        }
        Ok(accumulator)
    });
}

fn this_array(isolate: &Isolate, this: &ScriptValue, method: &str) -> Result<ObjectRef, CallError> {
    match this.as_object() {
        Some(object) if object.is_array() => Ok(object.clone()),
        _ => {
            let message = format!("Array.prototype.{method} called on non-array");
            Err(isolate.throw_error(ErrorKind::TypeError, message))
        }
    }
}

fn this_elements(
    isolate: &Isolate,
    this: &ScriptValue,
    method: &str,
) -> Result<Vec<ScriptValue>, CallError> {
    let array = this_array(isolate, this, method)?;
    Ok(array.array_elements().unwrap_or_default())
}

fn callback(isolate: &Isolate, args: &[ScriptValue], method: &str) -> NativeResult {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        let message = format!(
            "Array.prototype.{method}: {} is not a function",
            callback.to_display_string()
        );
        return Err(isolate.throw_error(ErrorKind::TypeError, message));
    }
    Ok(callback)
}

/// Mutates the elements of an array in place.
fn update<T>(array: &ObjectRef, f: impl FnOnce(&mut Vec<ScriptValue>) -> T) -> Option<T> {
    match &mut array.write().kind {
        ObjectKind::Array(elements) => Some(f(elements)),
        _ => None,
    }
}

/// Calls the callback of an iteration method for each element of a snapshot of the array.
///
/// `visit` receives the index, the element and the callback's result. Iteration stops at the
/// first `Some` it returns.
fn each<F>(
    isolate: &mut Isolate,
    this: &ScriptValue,
    args: &[ScriptValue],
    method: &str,
    mut visit: F,
) -> Result<Option<ScriptValue>, CallError>
where
    F: FnMut(usize, &ScriptValue, ScriptValue) -> Result<Option<ScriptValue>, CallError>,
{
    let elements = this_elements(isolate, this, method)?;
    let callback = callback(isolate, args, method)?;
    let receiver = arg(args, 1);
    for (index, element) in elements.iter().enumerate() {
        let call_args = [element.clone(), (index as f64).into(), this.clone()];
        let result = isolate.call_function(&callback, &receiver, &call_args)?;
        if let Some(value) = visit(index, element, result)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Stable insertion sort; the comparator may call back into scripts and fail.
fn sort(
    isolate: &mut Isolate,
    elements: &mut [ScriptValue],
    comparator: &ScriptValue,
) -> Result<(), CallError> {
    if !comparator.is_undefined() && !comparator.is_callable() {
        return Err(isolate.throw_error(
            ErrorKind::TypeError,
            "The comparison function must be either a function or undefined",
        ));
    }
    for i in 1..elements.len() {
        let mut j = i;
        while j > 0 {
            let ordering = compare(isolate, &elements[j - 1], &elements[j], comparator)?;
            if ordering != Ordering::Greater {
                break;
            }
            elements.swap(j - 1, j);
            j -= 1;
        }
    }
    Ok(())
}

fn compare(
    isolate: &mut Isolate,
    a: &ScriptValue,
    b: &ScriptValue,
    comparator: &ScriptValue,
) -> Result<Ordering, CallError> {
    // Undefined sorts last and is never passed to the comparator.
    match (a.is_undefined(), b.is_undefined()) {
        (true, true) => return Ok(Ordering::Equal),
        (true, false) => return Ok(Ordering::Greater),
        (false, true) => return Ok(Ordering::Less),
        (false, false) => {}
    }
    if comparator.is_undefined() {
        return Ok(a.to_display_string().cmp(&b.to_display_string()));
    }
    let args = [a.clone(), b.clone()];
    let result = isolate
        .call_function(comparator, &ScriptValue::Undefined, &args)?
        .to_number();
    Ok(result.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{eval, eval_string};

    #[test]
    fn test_mutators() {
        assert_eq!(eval_string("var a = [1]; a.push(2, 3) + ':' + a"), "3:1,2,3");
        assert_eq!(eval_string("var a = [1, 2]; a.pop() + ':' + a"), "2:1");
        assert_eq!(eval_string("var a = [1, 2]; a.shift() + ':' + a"), "1:2");
        assert!(eval("[].pop()").is_undefined());
        assert_eq!(eval_string("[1, 2, 3].reverse()"), "3,2,1");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(eval_string("[1, null, 'x'].join('-')"), "1--x");
        assert_eq!(eval_string("[1, 2, 3, 4].slice(1, -1)"), "2,3");
        assert_eq!(eval_string("[1].concat([2, 3], 4)"), "1,2,3,4");
        assert_eq!(eval_string("[1, 2, 3].indexOf(3)"), "2");
        assert_eq!(eval_string("[1, 2, 3].indexOf('3')"), "-1");
        assert!(eval("[NaN].includes(NaN)").truthy());
    }

    #[test]
    fn test_iteration() {
        assert_eq!(eval_string("[1, 2, 3].map(x => x * 2)"), "2,4,6");
        assert_eq!(eval_string("[1, 2, 3, 4].filter(x => x % 2 == 0)"), "2,4");
        assert_eq!(eval_string("[5, 8, 9].find(x => x > 6)"), "8");
        assert_eq!(eval_string("[5, 8, 9].findIndex(x => x > 100)"), "-1");
        assert!(eval("[1, 2].some(x => x > 1) && [1, 2].every(x => x > 0)").truthy());
        assert_eq!(eval_string("[1, 2, 3].reduce((sum, x) => sum + x)"), "6");
        assert_eq!(eval_string("var n = 0; [1, 2].forEach(function (x, i) { n += x * i }); n"), "2");
    }

    #[test]
    fn test_sort() {
        assert_eq!(eval_string("[10, 9, 1].sort()"), "1,10,9");
        assert_eq!(eval_string("[10, 9, 1].sort((a, b) => a - b)"), "1,9,10");
        assert_eq!(eval_string("[undefined, 2, 1].sort()"), "1,2,");
    }

    #[test]
    fn test_errors() {
        let source = "var m; try { [].reduce((a, b) => a) } catch (e) { m = e.message } m";
        assert_eq!(eval_string(source), "Reduce of empty array with no initial value");
        let source = "var m; try { [1].map(3) } catch (e) { m = e.message } m";
        assert_eq!(eval_string(source), "Array.prototype.map: 3 is not a function");
    }
}
