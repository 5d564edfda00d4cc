use super::{arg, define};
use crate::isolate::{ErrorKind, Isolate};
use crate::value::{ScriptValue, error_summary};

pub(super) fn install(isolate: &mut Isolate) {
    let base = isolate.intrinsics().error_prototype(ErrorKind::Error);
    define(&base, "toString", |_, this, _| {
        Ok(match this.as_object() {
            Some(object) => error_summary(object).into(),
            None => this.to_display_string().into(),
        })
    });

    for kind in ErrorKind::ALL {
        let constructor = ScriptValue::native(kind.name(), move |isolate, _, args| {
            let message = match arg(args, 0) {
                ScriptValue::Undefined => String::new(),
                value => value.to_display_string(),
            };
            Ok(isolate.create_error(kind, message))
        });
        let prototype = isolate.intrinsics().error_prototype(kind);
        if let Some(object) = constructor.as_object() {
            object.set("prototype", prototype.clone().into());
        }
        prototype.set("constructor", constructor.clone());
        isolate.set_global(kind.name(), constructor);
    }
}
