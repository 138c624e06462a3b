//! Built-in methods and global functions
//!
//! The method tables of `int`, `float`, `bool` and `Str`, plus the global
//! functions every program can call. Keeping the whole table in one place
//! makes it easy to see what the runtime has to provide: each method here
//! corresponds to a `meth_<type>_<name>` symbol in `lib/oomph.c`, and each
//! global to a `var_<name>` symbol.

use crate::types::{FunctionType, Generic, TypeId, TypeRegistry};
use std::collections::HashMap;

/// A name visible in the variable environment: either a callable global or a
/// plain value (local variable or argument).
#[derive(Debug, Clone)]
pub enum Binding {
    Value(TypeId),
    Function(FunctionType),
}

/// Install the method tables of the built-in types. Called once from
/// [`TypeRegistry::new`].
pub fn install_builtin_methods(registry: &mut TypeRegistry) {
    let int = registry.int;
    let float = registry.float;
    let boolean = registry.boolean;
    let string = registry.string;
    let list_str = registry.instantiate(Generic::List, string);

    let mut meth = |typ: TypeId, name: &str, args: Vec<TypeId>, ret: Option<TypeId>| {
        registry
            .get_mut(typ)
            .methods
            .insert(name.to_string(), FunctionType::new(args, ret));
    };

    meth(boolean, "to_string", vec![boolean], Some(string));

    meth(int, "to_string", vec![int], Some(string));

    meth(float, "ceil", vec![float], Some(int));
    meth(float, "floor", vec![float], Some(int));
    meth(float, "round", vec![float], Some(int));
    meth(float, "to_string", vec![float], Some(string));
    meth(float, "truncate", vec![float], Some(int));

    meth(string, "center_pad", vec![string, int, string], Some(string));
    meth(string, "count", vec![string, string], Some(int));
    meth(string, "ends_with", vec![string, string], Some(boolean));
    meth(string, "find_first", vec![string, string], Some(int));
    meth(string, "left_pad", vec![string, int, string], Some(string));
    meth(string, "left_trim", vec![string], Some(string));
    meth(string, "length", vec![string], Some(int));
    meth(string, "repeat", vec![string, int], Some(string));
    meth(string, "replace", vec![string, string, string], Some(string));
    meth(string, "right_pad", vec![string, int, string], Some(string));
    meth(string, "right_trim", vec![string], Some(string));
    meth(string, "slice", vec![string, int, int], Some(string));
    meth(string, "split", vec![string, string], Some(list_str));
    meth(string, "starts_with", vec![string, string], Some(boolean));
    meth(string, "to_float", vec![string], Some(float));
    meth(string, "to_int", vec![string], Some(int));
    meth(string, "to_string", vec![string], Some(string));
    meth(string, "trim", vec![string], Some(string));
    meth(string, "unicode_length", vec![string], Some(int));
}

/// The globals every compilation unit starts with.
pub fn builtin_variables(registry: &TypeRegistry) -> HashMap<String, Binding> {
    let int = registry.int;
    let float = registry.float;
    let boolean = registry.boolean;
    let string = registry.string;

    let mut variables = HashMap::new();
    let mut func = |name: &str, args: Vec<TypeId>, ret: Option<TypeId>| {
        variables.insert(
            name.to_string(),
            Binding::Function(FunctionType::new(args, ret)),
        );
    };

    func("print", vec![string], None);
    func("print_int", vec![int], None);
    func("print_bool", vec![boolean], None);
    func("print_float", vec![float], None);
    func("assert", vec![boolean], None);
    variables
}

/// The names every compilation unit's type environment starts with.
pub fn builtin_types(registry: &TypeRegistry) -> HashMap<String, TypeId> {
    let mut types = HashMap::new();
    types.insert("int".to_string(), registry.int);
    types.insert("float".to_string(), registry.float);
    types.insert("bool".to_string(), registry.boolean);
    types.insert("Str".to_string(), registry.string);
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_split_returns_list_of_str() {
        let mut registry = TypeRegistry::new();
        let split = registry.get(registry.string).methods["split"].clone();
        let list_str = registry.instantiate(Generic::List, registry.string);
        assert_eq!(split.returntype, Some(list_str));
    }

    #[test]
    fn test_builtin_globals() {
        let registry = TypeRegistry::new();
        let variables = builtin_variables(&registry);
        assert!(matches!(variables["print"], Binding::Function(_)));
        assert!(matches!(variables["assert"], Binding::Function(_)));
        let Binding::Function(print_int) = &variables["print_int"] else {
            panic!("print_int should be a function");
        };
        assert_eq!(print_int.argtypes, vec![registry.int]);
        assert_eq!(print_int.returntype, None);
    }
}
