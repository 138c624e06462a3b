//! C code generation
//!
//! Turns the typed IR into one C translation unit. The unit starts with
//! `#include "lib/oomph.h"`, then struct definitions, prototypes, string
//! literal blobs and generic template instantiations (all collected in
//! `beginning`), then the user's definitions in source order, then union
//! helpers that need every type to be defined first (collected in `ending`).
//!
//! A [`FileEmitter`] owns everything per-unit (interned strings, instantiated
//! generics, the local variable name counter); a `FunctionEmitter` in
//! `functions.rs` handles one function body at a time.
//!
//! # Module Structure
//!
//! - `functions.rs`: function bodies, statements and expressions
//! - `generics.rs`: List/Optional C template instantiation
//! - `templates/`: the C source templates themselves

mod functions;
mod generics;

use crate::ir;
use crate::types::{TypeId, TypeRegistry};
use functions::FunctionEmitter;
use std::collections::HashMap;

/// Emit a complete C translation unit.
///
/// Three passes: struct definitions, then prototypes, then the function
/// bodies in source order. C wants a name declared before use, and the
/// typer deliberately allows forward references.
pub fn run(registry: &TypeRegistry, declarations: &[ir::ToplevelDeclaration]) -> String {
    let mut emitter = FileEmitter::new(registry);
    for declaration in declarations {
        emitter.emit_struct_definition(declaration);
    }
    for declaration in declarations {
        emitter.emit_prototypes(declaration);
    }
    let mut code = String::new();
    for declaration in declarations {
        let text = emitter.emit_toplevel_declaration(declaration);
        code.push_str(&text);
    }
    format!(
        "{}{}{}\nint main(void) {{ var_main(); return 0; }}\n",
        emitter.beginning, code, emitter.ending
    )
}

pub struct FileEmitter<'r> {
    pub(crate) registry: &'r TypeRegistry,
    /// Interned string literals: value -> C symbol.
    strings: HashMap<String, String>,
    /// Code that must precede the user's declarations.
    pub(crate) beginning: String,
    /// Code that must follow them (union helpers).
    ending: String,
    /// C names of instantiated generics.
    pub(crate) generic_names: HashMap<TypeId, String>,
    /// Counter behind every generated local variable name.
    var_counter: usize,
}

impl<'r> FileEmitter<'r> {
    fn new(registry: &'r TypeRegistry) -> Self {
        FileEmitter {
            registry,
            strings: HashMap::new(),
            beginning: "#include \"lib/oomph.h\"\n\n".to_string(),
            ending: String::new(),
            generic_names: HashMap::new(),
            var_counter: 0,
        }
    }

    pub(crate) fn fresh_var(&mut self) -> String {
        let name = format!("var{}", self.var_counter);
        self.var_counter += 1;
        name
    }

    /// The C identifier fragment of a type: `Str`, `Foo`, `List_int`, ...
    /// First use of a generic instantiation emits its C template.
    pub(crate) fn get_type_c_name(&mut self, typ: TypeId) -> String {
        if self.registry.get(typ).generic_origin.is_none() {
            return self.registry.name(typ).to_string();
        }
        if let Some(name) = self.generic_names.get(&typ) {
            return name.clone();
        }
        generics::instantiate_generic(self, typ)
    }

    /// The C type of a value of `typ`; `None` is `void`.
    pub(crate) fn emit_type(&mut self, typ: Option<TypeId>) -> String {
        let Some(typ) = typ else {
            return "void".to_string();
        };
        if typ == self.registry.int {
            return "int64_t".to_string();
        }
        if typ == self.registry.float {
            return "double".to_string();
        }
        if typ == self.registry.boolean {
            return "bool".to_string();
        }
        let data = self.registry.get(typ);
        // Unions are refcounted but passed by value; everything else
        // refcounted is a pointer to a refcount-headed struct.
        if data.refcounted && data.type_members.is_none() {
            format!("struct class_{} *", self.get_type_c_name(typ))
        } else {
            format!("struct class_{}", self.get_type_c_name(typ))
        }
    }

    pub(crate) fn emit_incref(&self, c_expression: &str, typ: TypeId, semicolon: bool) -> String {
        let result = if self.registry.get(typ).refcounted {
            // Every member of a union is a pointer to a struct starting with
            // the refcount header, so any member works for the incref.
            let access = if self.registry.get(typ).type_members.is_some() {
                ".val.item0"
            } else {
                ""
            };
            format!("incref(({}){})", c_expression, access)
        } else {
            "(void)0".to_string()
        };
        if semicolon {
            format!("{};\n\t", result)
        } else {
            result
        }
    }

    pub(crate) fn emit_decref(&mut self, c_expression: &str, typ: TypeId, semicolon: bool) -> String {
        let data = self.registry.get(typ);
        let result = if data.type_members.is_some() {
            // Which member to release depends on the runtime tag.
            format!("decref_{}(({}))", self.get_type_c_name(typ), c_expression)
        } else if data.refcounted {
            format!(
                "decref(({}), dtor_{})",
                c_expression,
                self.get_type_c_name(typ)
            )
        } else {
            "(void)0".to_string()
        };
        if semicolon {
            format!("{};\n\t", result)
        } else {
            result
        }
    }

    /// Intern a string literal, emitting its static blob on first use.
    ///
    /// The blob is eight `0xff` bytes (a refcount the runtime recognizes as
    /// "immortal"), the UTF-8 text, and a NUL terminator.
    pub(crate) fn emit_string(&mut self, value: &str) -> String {
        if let Some(symbol) = self.strings.get(value) {
            return symbol.clone();
        }
        let prefix: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(30)
            .collect();
        let symbol = format!("string{}_{}", self.strings.len(), prefix);
        self.strings.insert(value.to_string(), symbol.clone());

        let mut bytes = vec![0xffu8; 8];
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        let array_content: Vec<String> = bytes.iter().map(|b| format!("'\\x{:02x}'", b)).collect();

        let string_type = self.emit_type(Some(self.registry.string));
        self.beginning.push_str(&format!(
            "{} {} = (void*)(unsigned char[]){{ {} }};\n",
            string_type,
            symbol,
            array_content.join(", ")
        ));
        symbol
    }

    /// Argument list for a prototype: types only.
    fn prototype_args(&mut self, argtypes: &[TypeId]) -> String {
        if argtypes.is_empty() {
            return "void".to_string();
        }
        let args: Vec<String> = argtypes
            .iter()
            .map(|argtype| self.emit_type(Some(*argtype)))
            .collect();
        args.join(",")
    }

    /// First pass: class and union struct definitions go up front, so that
    /// declarations may refer to types defined further down the file.
    fn emit_struct_definition(&mut self, declaration: &ir::ToplevelDeclaration) {
        match declaration {
            ir::ToplevelDeclaration::FuncDef(_) => {}
            ir::ToplevelDeclaration::ClassDef { class, .. } => {
                let name = self.get_type_c_name(*class);
                let members = self.registry.get(*class).members.clone();
                let mut struct_members = String::new();
                for (membertype, membername) in &members {
                    let c_type = self.emit_type(Some(*membertype));
                    struct_members.push_str(&format!("{} memb_{};\n\t", c_type, membername));
                }
                self.beginning.push_str(&format!(
                    "\nstruct class_{name} {{\n\
                     \tREFCOUNT_HEADER\n\
                     \t{struct_members}\n\
                     }};\n"
                ));
            }
            ir::ToplevelDeclaration::UnionDef { union } => {
                let name = self.get_type_c_name(*union);
                let members = self
                    .registry
                    .get(*union)
                    .type_members
                    .clone()
                    .expect("union has members");
                let mut union_members = String::new();
                for (membernum, membertype) in members.iter().enumerate() {
                    let member_c_type = self.emit_type(Some(*membertype));
                    union_members.push_str(&format!("\t\t{} item{};\n", member_c_type, membernum));
                }
                self.beginning.push_str(&format!(
                    "\nstruct class_{name} {{\n\
                     \tunion {{\n\
                     {union_members}\
                     \t}} val;\n\
                     \tshort membernum;\n\
                     }};\n"
                ));
            }
        }
    }

    /// Second pass: prototypes for everything callable.
    fn emit_prototypes(&mut self, declaration: &ir::ToplevelDeclaration) {
        match declaration {
            ir::ToplevelDeclaration::FuncDef(funcdef) => {
                let return_c_type = self.emit_type(funcdef.ftype.returntype);
                let args = self.prototype_args(&funcdef.ftype.argtypes);
                self.beginning
                    .push_str(&format!("{} var_{}({});\n", return_c_type, funcdef.name, args));
            }
            ir::ToplevelDeclaration::ClassDef { class, methods } => {
                let name = self.get_type_c_name(*class);
                let class_type = self.emit_type(Some(*class));
                let member_types: Vec<TypeId> = self
                    .registry
                    .get(*class)
                    .members
                    .iter()
                    .map(|(membertype, _)| *membertype)
                    .collect();
                let ctor_args = self.prototype_args(&member_types);
                self.beginning
                    .push_str(&format!("{} ctor_{}({});\n", class_type, name, ctor_args));
                self.beginning
                    .push_str(&format!("void dtor_{}(void *ptr);\n", name));
                for method in methods {
                    let return_c_type = self.emit_type(method.ftype.returntype);
                    let args = self.prototype_args(&method.ftype.argtypes);
                    self.beginning.push_str(&format!(
                        "{} meth_{}_{}({});\n",
                        return_c_type, name, method.name, args
                    ));
                }
            }
            ir::ToplevelDeclaration::UnionDef { union } => {
                let name = self.get_type_c_name(*union);
                self.beginning.push_str(&format!(
                    "struct class_Str *meth_{name}_to_string(struct class_{name} obj);\n\
                     void decref_{name}(struct class_{name} obj);\n"
                ));
            }
        }
    }

    /// Third pass: the definitions themselves, in source order.
    fn emit_toplevel_declaration(&mut self, declaration: &ir::ToplevelDeclaration) -> String {
        match declaration {
            ir::ToplevelDeclaration::FuncDef(funcdef) => {
                let c_name = format!("var_{}", funcdef.name);
                FunctionEmitter::new(self).emit_funcdef(funcdef, &c_name)
            }
            ir::ToplevelDeclaration::ClassDef { class, methods } => {
                self.emit_classdef(*class, methods)
            }
            ir::ToplevelDeclaration::UnionDef { union } => {
                self.emit_union_helpers(*union);
                String::new()
            }
        }
    }

    fn emit_classdef(&mut self, class: TypeId, methods: &[ir::FuncDef]) -> String {
        let name = self.get_type_c_name(class);
        let class_type = self.emit_type(Some(class));
        let members = self.registry.get(class).members.clone();

        let mut constructor_args = Vec::new();
        let mut member_assignments = String::new();
        let mut member_increfs = String::new();
        let mut member_decrefs = String::new();
        for (membertype, membername) in &members {
            let c_type = self.emit_type(Some(*membertype));
            constructor_args.push(format!("{} var_{}", c_type, membername));
            member_assignments.push_str(&format!("obj->memb_{} = var_{};\n\t", membername, membername));
            member_increfs.push_str(&self.emit_incref(&format!("var_{}", membername), *membertype, true));
            member_decrefs.push_str(&self.emit_decref(
                &format!("obj->memb_{}", membername),
                *membertype,
                true,
            ));
        }
        let constructor_args = if constructor_args.is_empty() {
            "void".to_string()
        } else {
            constructor_args.join(",")
        };

        let mut method_code = String::new();
        for method in methods {
            let c_name = format!("meth_{}_{}", name, method.name);
            let text = FunctionEmitter::new(self).emit_funcdef(method, &c_name);
            method_code.push_str(&text);
        }

        format!(
            "\n{class_type} ctor_{name}({constructor_args})\n\
             {{\n\
             \t{class_type} obj = malloc(sizeof(*obj));\n\
             \tassert(obj);\n\
             \tobj->refcount = 1;\n\
             \t{member_assignments}{member_increfs}return obj;\n\
             }}\n\
             \n\
             void dtor_{name}(void *ptr)\n\
             {{\n\
             \tstruct class_{name} *obj = ptr;\n\
             \t{member_decrefs}free(obj);\n\
             }}\n\
             {method_code}"
        )
    }

    fn emit_union_helpers(&mut self, union: TypeId) {
        let name = self.get_type_c_name(union);
        let union_name = self.registry.name(union).to_string();
        let members = self
            .registry
            .get(union)
            .type_members
            .clone()
            .expect("union has members");

        let mut to_string_cases = String::new();
        let mut decref_cases = String::new();
        for (membernum, membertype) in members.iter().enumerate() {
            let member_cname = self.get_type_c_name(*membertype);
            to_string_cases.push_str(&format!(
                "\tcase {membernum}:\n\
                 \t\tvalstr = meth_{member_cname}_to_string(obj.val.item{membernum});\n\
                 \t\tbreak;\n"
            ));
            let decref = self.emit_decref(&format!("obj.val.item{}", membernum), *membertype, false);
            decref_cases.push_str(&format!(
                "\tcase {membernum}:\n\t\t{decref};\n\t\tbreak;\n"
            ));
        }

        self.ending.push_str(&format!(
            "\nstruct class_Str *meth_{name}_to_string(struct class_{name} obj)\n\
             {{\n\
             \tstruct class_Str *valstr;\n\
             \tswitch(obj.membernum) {{\n\
             {to_string_cases}\
             \tdefault:\n\
             \t\tassert(0);\n\
             \t}}\n\
             \n\
             \tstruct class_Str *res = cstr_to_string(\"union {union_name}\");\n\
             \tstring_concat_inplace(&res, \"(\");\n\
             \tstring_concat_inplace(&res, valstr->str);\n\
             \tstring_concat_inplace(&res, \")\");\n\
             \tdecref(valstr, dtor_Str);\n\
             \treturn res;\n\
             }}\n"
        ));

        self.ending.push_str(&format!(
            "\nvoid decref_{name}(struct class_{name} obj)\n\
             {{\n\
             \tswitch(obj.membernum) {{\n\
             {decref_cases}\
             \tdefault:\n\
             \t\tassert(0);\n\
             \t}}\n\
             }}\n"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;
    use crate::typer::convert_program;

    fn compile(source: &str) -> String {
        let program = parse_file(source).unwrap();
        let mut registry = TypeRegistry::new();
        let declarations = convert_program(&mut registry, &program).unwrap();
        run(&registry, &declarations)
    }

    #[test]
    fn test_hello_world() {
        let c_code = compile("func main() -> void:\n    print(\"hello\")\n");
        assert!(c_code.starts_with("#include \"lib/oomph.h\"\n"));
        assert!(c_code.contains("void var_main(void)"));
        assert!(c_code.contains("var_print"));
        assert!(c_code.contains("string0_hello"));
        assert!(c_code.contains("int main(void) { var_main(); return 0; }"));
    }

    #[test]
    fn test_string_blob_has_immortal_header() {
        let c_code = compile("func main() -> void:\n    print(\"hi\")\n");
        // eight 0xff bytes, then "hi", then NUL
        assert!(c_code.contains(
            "'\\xff', '\\xff', '\\xff', '\\xff', '\\xff', '\\xff', '\\xff', '\\xff', \
             '\\x68', '\\x69', '\\x00'"
        ));
    }

    #[test]
    fn test_strings_are_interned() {
        let c_code = compile(
            "func main() -> void:\n    print(\"dup\")\n    print(\"dup\")\n",
        );
        assert_eq!(c_code.matches("= (void*)(unsigned char[])").count(), 1);
    }

    #[test]
    fn test_calls_go_through_temporaries() {
        let c_code = compile(
            "func main() -> void:\n    print_int(add(1, 2))\nfunc add(int x, int y) -> int:\n    return x + y\n",
        );
        // Arguments are comma-assigned to locals before the call.
        assert!(c_code.contains("var_add ("));
        assert!(c_code.contains("= (((int64_t)1LL)),"));
        assert!(c_code.contains("int64_t var_add("));
    }

    #[test]
    fn test_function_epilogue_shape() {
        let c_code = compile(
            "func main() -> void:\n    let s = \"x\".repeat(3)\n    print(s)\n",
        );
        assert!(c_code.contains("out: (void)0;"));
        assert!(c_code.contains("= NULL;"));
        assert!(c_code.contains("decref((ref0), dtor_Str)"));
        assert!(c_code.contains("meth_Str_repeat"));
    }

    #[test]
    fn test_epilogue_decrefs_in_reverse_order() {
        let c_code = compile(
            "func main() -> void:\n    let a = \"x\".repeat(2)\n    let b = \"y\".repeat(2)\n    print(a)\n    print(b)\n",
        );
        let out_pos = c_code.find("out: (void)0;").unwrap();
        let epilogue = &c_code[out_pos..];
        let ref1_pos = epilogue.find("decref((ref1), dtor_Str)").unwrap();
        let ref0_pos = epilogue.find("decref((ref0), dtor_Str)").unwrap();
        assert!(ref1_pos < ref0_pos, "holders must be released in reverse");
    }

    #[test]
    fn test_refcounted_return_increfs() {
        let c_code = compile(
            "func f() -> Str:\n    return \"x\"\nfunc main() -> void:\n    print(f())\n",
        );
        assert!(c_code.contains("incref((retval));"));
        assert!(c_code.contains("goto out;"));
        assert!(c_code.contains("return retval;"));
    }

    #[test]
    fn test_void_return_has_no_retval() {
        let c_code = compile("func main() -> void:\n    pass\n");
        assert!(!c_code.contains("retval"));
    }

    #[test]
    fn test_class_emission() {
        let c_code = compile(
            "class Point(int x, int y)\nfunc main() -> void:\n    let p = new Point(1, 2)\n    print_int(p.x)\n",
        );
        assert!(c_code.contains("struct class_Point {"));
        assert!(c_code.contains("REFCOUNT_HEADER"));
        assert!(c_code.contains("int64_t memb_x;"));
        assert!(c_code.contains("struct class_Point * ctor_Point(int64_t var_x,int64_t var_y)"));
        assert!(c_code.contains("void dtor_Point(void *ptr)"));
        assert!(c_code.contains("obj->refcount = 1;"));
        assert!(c_code.contains("->memb_x)"));
    }

    #[test]
    fn test_method_emission() {
        let c_code = compile(
            "class Counter(int n):\n    meth double() -> int:\n        return self.n * 2\nfunc main() -> void:\n    print_int(new Counter(21).double())\n",
        );
        assert!(c_code.contains("int64_t meth_Counter_double(struct class_Counter *"));
    }

    #[test]
    fn test_union_emission() {
        let source = "class BoxInt(int n)\nclass BoxStr(Str s)\ntypedef IntOrStr = BoxInt | BoxStr\nfunc f(IntOrStr v) -> void:\n    switch v:\n        case BoxInt:\n            print_int(v.n)\n        case BoxStr:\n            print(v.s)\nfunc main() -> void:\n    f(new BoxStr(\"hi\"))\n";
        let c_code = compile(source);
        assert!(c_code.contains("struct class_IntOrStr {"));
        assert!(c_code.contains("short membernum;"));
        assert!(c_code.contains("void decref_IntOrStr(struct class_IntOrStr obj)"));
        assert!(c_code.contains("meth_IntOrStr_to_string"));
        assert!(c_code.contains("switch ("));
        assert!(c_code.contains(".membernum) {"));
        assert!(c_code.contains(".val.item0"));
        assert!(c_code.contains(".membernum = 1 })"));
    }

    #[test]
    fn test_generic_template_instantiated_once() {
        let source = "func main() -> void:\n    let xs = new List[int]()\n    let ys = new List[int]()\n    xs.push(1)\n    ys.push(2)\n";
        let c_code = compile(source);
        assert_eq!(c_code.matches("struct class_List_int {").count(), 1);
        assert!(c_code.contains("ctor_List_int"));
        assert!(c_code.contains("meth_List_int_push"));
    }

    #[test]
    fn test_list_of_str_gets_split_and_join() {
        let source = "func main() -> void:\n    let parts = \"a,b\".split(\",\")\n    print(parts.join(\"-\"))\n";
        let c_code = compile(source);
        assert!(c_code.contains("struct class_List_Str {"));
        assert!(c_code.contains("meth_Str_split"));
        assert!(c_code.contains("meth_List_Str_join"));
    }

    #[test]
    fn test_optional_emission() {
        let source = "func main() -> void:\n    let x = new Optional[Str](\"hi\")\n    print(x.get())\n";
        let c_code = compile(source);
        assert!(c_code.contains("struct class_Optional_Str {"));
        assert!(c_code.contains("bool isnull;"));
        assert!(c_code.contains("meth_Optional_Str_get"));
    }

    #[test]
    fn test_null_emission() {
        let source = "func f(Optional[Str] x) -> void:\n    pass\nfunc main() -> void:\n    f(null)\n";
        let c_code = compile(source);
        assert!(c_code.contains("{.isnull=true}"));
    }

    #[test]
    fn test_loop_shape() {
        let source = "func main() -> void:\n    for let i = 0; i < 3; i = i + 1:\n        print_int(i)\n";
        let c_code = compile(source);
        assert!(c_code.contains("while ("));
        assert!(c_code.contains("loop0: (void)0;"));
    }

    #[test]
    fn test_continue_jumps_before_increment() {
        let source = "func main() -> void:\n    for let i = 0; i < 3; i = i + 1:\n        continue\n";
        let c_code = compile(source);
        let body_start = c_code.find("while (").unwrap();
        let goto_pos = c_code[body_start..].find("goto loop0;").unwrap();
        let label_pos = c_code[body_start..].find("loop0: (void)0;").unwrap();
        assert!(goto_pos < label_pos, "continue jumps forward to the label");
    }

    #[test]
    fn test_assert_gets_line_number() {
        let source = "func main() -> void:\n    assert(true)\n";
        let c_code = compile(source);
        assert!(c_code.contains("var_assert"));
        // line 2, appended as a synthetic last argument
        assert!(c_code.contains("((int64_t)2LL)"));
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let source = "func main() -> void:\n    let xs = [1, 2]\n    print_int(xs.get(0))\n    print(\"done\")\n";
        assert_eq!(compile(source), compile(source));
    }
}
