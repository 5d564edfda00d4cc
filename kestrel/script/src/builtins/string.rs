use super::{arg, define, relative_index};
use crate::isolate::{ErrorKind, Isolate};
use crate::value::ScriptValue;

/// Positions are counted in characters.
pub(super) fn install(isolate: &mut Isolate) {
    let prototype = isolate.intrinsics().string_prototype.clone();

    define(&prototype, "toString", |_, this, _| Ok(this_string(this).into()));
    define(&prototype, "toUpperCase", |_, this, _| {
        Ok(this_string(this).to_uppercase().into())
    });
    define(&prototype, "toLowerCase", |_, this, _| {
        Ok(this_string(this).to_lowercase().into())
    });
    define(&prototype, "trim", |_, this, _| Ok(this_string(this).trim().into()));
    define(&prototype, "startsWith", |_, this, args| {
        let needle = arg(args, 0).to_display_string();
        Ok(this_string(this).starts_with(&needle).into())
    });
    define(&prototype, "endsWith", |_, this, args| {
        let needle = arg(args, 0).to_display_string();
        Ok(this_string(this).ends_with(&needle).into())
    });
    define(&prototype, "includes", |_, this, args| {
        let needle = arg(args, 0).to_display_string();
        Ok(this_string(this).contains(&needle).into())
    });
    define(&prototype, "indexOf", |_, this, args| {
        let text = this_string(this);
        let needle = arg(args, 0).to_display_string();
        let index = text
            .find(&needle)
            .map_or(-1.0, |byte| text[..byte].chars().count() as f64);
        Ok(index.into())
    });
    define(&prototype, "charAt", |_, this, args| {
        let index = arg(args, 0).to_number();
        let index = if index.is_nan() { 0.0 } else { index.trunc() };
        let c = (index >= 0.0)
            .then(|| this_string(this).chars().nth(index as usize))
            .flatten();
        Ok(c.map(String::from).unwrap_or_default().into())
    });
    define(&prototype, "slice", |_, this, args| {
        let chars: Vec<char> = this_string(this).chars().collect();
        let len = chars.len();
        let start = relative_index(&arg(args, 0), len, 0);
        let end = relative_index(&arg(args, 1), len, len);
        let slice = chars.get(start..end).unwrap_or_default();
        Ok(slice.iter().collect::<String>().into())
    });
    define(&prototype, "substring", |_, this, args| {
        let chars: Vec<char> = this_string(this).chars().collect();
        let len = chars.len();
        let clamp = |value: &ScriptValue, default: usize| {
            if value.is_undefined() {
                return default;
            }
            let n = value.to_number();
            if n.is_nan() { 0 } else { n.clamp(0.0, len as f64) as usize }
        };
        let start = clamp(&arg(args, 0), 0);
        let end = clamp(&arg(args, 1), len);
        let (start, end) = (start.min(end), start.max(end));
        Ok(chars[start..end].iter().collect::<String>().into())
    });
    define(&prototype, "split", |isolate, this, args| {
        let text = this_string(this);
        let parts: Vec<ScriptValue> = match arg(args, 0) {
            ScriptValue::Undefined => vec![text.into()],
            separator => {
                let separator = separator.to_display_string();
                if separator.is_empty() {
                    text.chars().map(|c| String::from(c).into()).collect()
                } else {
                    text.split(separator.as_str()).map(ScriptValue::from).collect()
                }
            }
        };
        isolate.check_array_length(parts.len())?;
        Ok(ScriptValue::array(parts))
    });
    define(&prototype, "replace", |isolate, this, args| {
        let text = this_string(this);
        let pattern = arg(args, 0).to_display_string();
        let Some(byte) = text.find(&pattern) else {
            return Ok(text.into());
        };
        let replacement = match arg(args, 1) {
            replacer if replacer.is_callable() => isolate
                .call_function(
                    &replacer,
                    &ScriptValue::Undefined,
                    &[pattern.as_str().into()],
                )?
                .to_display_string(),
            value => value.to_display_string(),
        };
        let replaced = format!(
            "{}{replacement}{}",
            &text[..byte],
            &text[byte + pattern.len()..]
        );
        isolate.check_string_length(replaced.len())?;
        Ok(replaced.into())
    });
    define(&prototype, "repeat", |isolate, this, args| {
        let text = this_string(this);
        let count = arg(args, 0).to_number();
        let count = if count.is_nan() { 0.0 } else { count.trunc() };
        if count < 0.0 || count.is_infinite() {
            let message = format!("Invalid count value: {}", arg(args, 0).to_display_string());
            return Err(isolate.throw_error(ErrorKind::RangeError, message));
        }
        let count = count as usize;
        isolate.check_string_length(text.len().saturating_mul(count))?;
        Ok(text.repeat(count).into())
    });
}

fn this_string(this: &ScriptValue) -> String {
    this.to_display_string()
}
