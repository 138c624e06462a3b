//! Generic template instantiation
//!
//! `List` and `Optional` are compiled from C source templates, instantiated
//! once per unique element type. The placeholders are plain `$NAME` markers;
//! `$ITEMTYPE_CNAME` and `$ITEMTYPE_STRING` must be substituted before
//! `$ITEMTYPE` because they share its prefix.

use super::FileEmitter;
use crate::types::{Generic, TypeId};

const LIST_TEMPLATE: &str = include_str!("templates/list.c");
const OPTIONAL_TEMPLATE: &str = include_str!("templates/optional.c");
/// Extra methods that only make sense for `List[Str]`: `Str.split` has to
/// return a list of strings, and `join` needs the string payloads.
const LIST_STR_TEMPLATE: &str = include_str!("templates/list_str.c");

pub(super) fn instantiate_generic(emitter: &mut FileEmitter, typ: TypeId) -> String {
    let (generic, item) = emitter
        .registry
        .get(typ)
        .generic_origin
        .expect("only instantiated generics get template expansion");

    let item_cname = emitter.get_type_c_name(item);
    let type_cname = format!("{}_{}", generic.name(), item_cname);
    emitter.generic_names.insert(typ, type_cname.clone());

    // The template lands before the user's declarations, so an element type
    // defined by the user needs its symbols forward-declared.
    let item_data = emitter.registry.get(item);
    let item_is_user_class = item_data.generic_origin.is_none()
        && item_data.type_members.is_none()
        && item_data.refcounted
        && item != emitter.registry.string;
    if item_is_user_class {
        emitter.beginning.push_str(&format!(
            "struct class_{0};\n\
             void dtor_{0}(void *ptr);\n\
             struct class_Str *meth_{0}_to_string(struct class_{0} *self);\n\n",
            item_cname
        ));
    }

    let template = match generic {
        Generic::List => LIST_TEMPLATE,
        Generic::Optional => OPTIONAL_TEMPLATE,
    };
    let code = template
        .replace("$TYPE_CNAME", &type_cname)
        .replace("$ITEMTYPE_CNAME", &item_cname)
        .replace("$ITEMTYPE_STRING", emitter.registry.name(typ))
        .replace("$INCREF_VAL", &emitter.emit_incref("val", item, false))
        .replace("$DECREF_VAL", &emitter.emit_decref("val", item, false))
        .replace("$ITEMTYPE", &emitter.emit_type(Some(item)));
    emitter.beginning.push_str(&code);
    emitter.beginning.push('\n');

    if generic == Generic::List && item == emitter.registry.string {
        emitter.beginning.push_str(LIST_STR_TEMPLATE);
        emitter.beginning.push('\n');
    }

    type_cname
}
