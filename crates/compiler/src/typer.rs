//! Typer: untyped AST to typed IR
//!
//! Runs over the toplevel twice: first every class, union and function is
//! declared (so forward references resolve), then bodies are typed. Name
//! resolution, method dispatch, operator lowering and generic instantiation
//! all happen here.
//!
//! This is also where the reference-count discipline is decided. Every
//! refcounted value produced by a call (or list display) is wrapped in a
//! `SetRef` against a fresh holder, recorded in the function's `refs` list;
//! the emitter initializes the holders to the null pattern and releases them
//! in reverse order at the function exit. A refcounted call used as a bare
//! statement is immediately balanced with a `DecRef`.

use crate::ast;
use crate::builtins::{Binding, builtin_types, builtin_variables};
use crate::ir;
use crate::types::{FunctionType, Generic, TypeId, TypeRegistry};
use std::collections::HashMap;

/// Type a whole compilation unit.
pub fn convert_program(
    registry: &mut TypeRegistry,
    program: &[ast::ToplevelDeclaration],
) -> Result<Vec<ir::ToplevelDeclaration>, String> {
    let mut typer = Typer {
        types: builtin_types(registry),
        variables: builtin_variables(registry),
        registry,
        ref_counter: 0,
    };
    typer.declare_names(program)?;
    typer.declare_signatures(program)?;
    let declarations = typer.define_bodies(program)?;
    typer.check_main()?;
    Ok(declarations)
}

fn resolve_type(
    registry: &mut TypeRegistry,
    types: &HashMap<String, TypeId>,
    typename: &ast::TypeName,
) -> Result<TypeId, String> {
    match typename {
        ast::TypeName::Plain(name) => types
            .get(name)
            .copied()
            .ok_or_else(|| format!("unknown type '{}'", name)),
        ast::TypeName::Generic(name, arg) => {
            let arg = resolve_type(registry, types, arg)?;
            match name.as_str() {
                "List" => Ok(registry.instantiate(Generic::List, arg)),
                "Optional" => Ok(registry.instantiate(Generic::Optional, arg)),
                other => Err(format!("unknown generic '{}'", other)),
            }
        }
    }
}

struct Typer<'r> {
    registry: &'r mut TypeRegistry,
    types: HashMap<String, TypeId>,
    variables: HashMap<String, Binding>,
    ref_counter: usize,
}

impl Typer<'_> {
    /// First declaration pass: register every class and union name, so that
    /// member types can refer to declarations further down the file.
    fn declare_names(&mut self, program: &[ast::ToplevelDeclaration]) -> Result<(), String> {
        for declaration in program {
            let name = match declaration {
                ast::ToplevelDeclaration::Class(classdef) => Some((&classdef.name, false)),
                ast::ToplevelDeclaration::Union(uniondef) => Some((&uniondef.name, true)),
                _ => None,
            };
            if let Some((name, is_union)) = name {
                if self.types.contains_key(name) {
                    return Err(format!("a type named '{}' already exists", name));
                }
                let id = if is_union {
                    self.registry.add_union(name)
                } else {
                    self.registry.add_class(name)
                };
                self.types.insert(name.clone(), id);
            }
        }
        Ok(())
    }

    /// Second declaration pass: fill in class members, union members,
    /// method signatures and function signatures.
    fn declare_signatures(&mut self, program: &[ast::ToplevelDeclaration]) -> Result<(), String> {
        for declaration in program {
            match declaration {
                ast::ToplevelDeclaration::Class(classdef) => self.declare_class(classdef)?,
                ast::ToplevelDeclaration::Union(uniondef) => {
                    let union = self.types[&uniondef.name];
                    let mut members = Vec::new();
                    for typename in &uniondef.type_members {
                        members.push(resolve_type(self.registry, &self.types, typename)?);
                    }
                    self.registry.set_union_members(union, members)?;
                }
                ast::ToplevelDeclaration::Func(funcdef) => {
                    if self.variables.contains_key(&funcdef.name) {
                        return Err(format!("a function named '{}' already exists", funcdef.name));
                    }
                    let ftype = self.signature_of(funcdef, None)?;
                    self.variables
                        .insert(funcdef.name.clone(), Binding::Function(ftype));
                }
                ast::ToplevelDeclaration::Import(_) => {
                    return Err("imports must be resolved before type checking".to_string());
                }
            }
        }
        Ok(())
    }

    fn declare_class(&mut self, classdef: &ast::ClassDef) -> Result<(), String> {
        let class = self.types[&classdef.name];
        let mut members = Vec::new();
        for (typename, membername) in &classdef.members {
            if members.iter().any(|(_, n): &(TypeId, String)| n == membername) {
                return Err(format!(
                    "class '{}' has two members named '{}'",
                    classdef.name, membername
                ));
            }
            let membertype = resolve_type(self.registry, &self.types, typename)?;
            members.push((membertype, membername.clone()));
        }
        let constructor_argtypes = members.iter().map(|(t, _)| *t).collect();
        {
            let data = self.registry.get_mut(class);
            data.members = members;
            data.constructor_argtypes = Some(constructor_argtypes);
        }

        for method in &classdef.methods {
            if self.registry.get(class).methods.contains_key(&method.name) {
                return Err(format!(
                    "class '{}' already has a method named '{}'",
                    classdef.name, method.name
                ));
            }
            let ftype = self.signature_of(method, Some(class))?;
            self.registry
                .get_mut(class)
                .methods
                .insert(method.name.clone(), ftype);
        }
        Ok(())
    }

    fn signature_of(
        &mut self,
        funcdef: &ast::FuncDef,
        self_type: Option<TypeId>,
    ) -> Result<FunctionType, String> {
        let mut argtypes = Vec::new();
        if let Some(class) = self_type {
            argtypes.push(class);
        }
        for (typename, _) in &funcdef.args {
            argtypes.push(resolve_type(self.registry, &self.types, typename)?);
        }
        let returntype = match &funcdef.returntype {
            Some(typename) => Some(resolve_type(self.registry, &self.types, typename)?),
            None => None,
        };
        Ok(FunctionType::new(argtypes, returntype))
    }

    fn define_bodies(
        &mut self,
        program: &[ast::ToplevelDeclaration],
    ) -> Result<Vec<ir::ToplevelDeclaration>, String> {
        let mut result = Vec::new();
        for declaration in program {
            match declaration {
                ast::ToplevelDeclaration::Func(funcdef) => {
                    result.push(ir::ToplevelDeclaration::FuncDef(
                        self.do_funcdef(funcdef, None)?,
                    ));
                }
                ast::ToplevelDeclaration::Class(classdef) => {
                    let class = self.types[&classdef.name];
                    let mut methods = Vec::new();
                    for method in &classdef.methods {
                        methods.push(self.do_funcdef(method, Some(class))?);
                    }
                    result.push(ir::ToplevelDeclaration::ClassDef { class, methods });
                }
                ast::ToplevelDeclaration::Union(uniondef) => {
                    result.push(ir::ToplevelDeclaration::UnionDef {
                        union: self.types[&uniondef.name],
                    });
                }
                ast::ToplevelDeclaration::Import(_) => unreachable!("rejected while declaring"),
            }
        }
        Ok(result)
    }

    fn do_funcdef(
        &mut self,
        funcdef: &ast::FuncDef,
        self_type: Option<TypeId>,
    ) -> Result<ir::FuncDef, String> {
        let ftype = self.signature_of(funcdef, self_type)?;

        let mut argnames: Vec<String> = Vec::new();
        if self_type.is_some() {
            argnames.push("self".to_string());
        }
        argnames.extend(funcdef.args.iter().map(|(_, name)| name.clone()));

        let mut local_vars = self.variables.clone();
        for (argname, argtype) in argnames.iter().zip(&ftype.argtypes) {
            if local_vars.contains_key(argname) {
                return Err(format!(
                    "argument '{}' of '{}' shadows an existing name",
                    argname, funcdef.name
                ));
            }
            local_vars.insert(argname.clone(), Binding::Value(*argtype));
        }

        let mut function_typer = FunctionTyper {
            registry: &mut *self.registry,
            types: &self.types,
            variables: local_vars,
            returntype: ftype.returntype,
            reflist: Vec::new(),
            loop_stack: Vec::new(),
            loop_counter: 0,
            ref_counter: &mut self.ref_counter,
        };
        let body = function_typer.do_block(&funcdef.body)?;
        let refs = function_typer.reflist;

        Ok(ir::FuncDef {
            name: funcdef.name.clone(),
            ftype,
            argnames,
            body,
            refs,
        })
    }

    fn check_main(&self) -> Result<(), String> {
        match self.variables.get("main") {
            Some(Binding::Function(ftype))
                if ftype.argtypes.is_empty() && ftype.returntype.is_none() => Ok(()),
            Some(Binding::Function(_)) => {
                Err("'main' must take no arguments and return nothing".to_string())
            }
            _ => Err("no 'main' function defined".to_string()),
        }
    }
}

/// The result of typing a call: either a statement-only void call, or an
/// expression (a `ReturningCall`, wrapped in `SetRef` when refcounted).
enum TypedCall {
    Void {
        func: ir::Callee,
        args: Vec<ir::Expression>,
    },
    Returning(ir::Expression),
}

struct FunctionTyper<'r> {
    registry: &'r mut TypeRegistry,
    types: &'r HashMap<String, TypeId>,
    variables: HashMap<String, Binding>,
    returntype: Option<TypeId>,
    reflist: Vec<(String, TypeId)>,
    loop_stack: Vec<String>,
    loop_counter: usize,
    ref_counter: &'r mut usize,
}

impl FunctionTyper<'_> {
    fn resolve(&mut self, typename: &ast::TypeName) -> Result<TypeId, String> {
        resolve_type(self.registry, self.types, typename)
    }

    fn type_name(&self, typ: TypeId) -> String {
        self.registry.name(typ).to_string()
    }

    /// Wrap a refcounted owned value in a fresh ref holder, so its lifetime
    /// reaches the function exit. Value types pass through untouched.
    fn hold_if_refcounted(&mut self, expr: ir::Expression) -> ir::Expression {
        let typ = expr.typ(self.registry);
        if !self.registry.get(typ).refcounted {
            return expr;
        }
        let refname = format!("ref{}", *self.ref_counter);
        *self.ref_counter += 1;
        self.reflist.push((refname.clone(), typ));
        ir::Expression::SetRef {
            refname,
            value: Box::new(expr),
        }
    }

    /// Exact type match, or an allowed implicit conversion (wrapping a union
    /// member value into the union).
    fn try_convert(&self, expr: ir::Expression, target: TypeId) -> Option<ir::Expression> {
        let actual = expr.typ(self.registry);
        if actual == target {
            return Some(expr);
        }
        if let Some(members) = &self.registry.get(target).type_members {
            if members.contains(&actual) {
                return Some(ir::Expression::InstantiateUnion {
                    uniontype: target,
                    value: Box::new(expr),
                });
            }
        }
        None
    }

    fn describe_callee(&self, func: &ir::Callee) -> String {
        match func {
            ir::Callee::Function { name, .. } => format!("function '{}'", name),
            ir::Callee::Method { obj, name, .. } => {
                format!("method '{}.{}'", self.type_name(obj.typ(self.registry)), name)
            }
            ir::Callee::Constructor { class, .. } => {
                format!("constructor 'new {}'", self.type_name(*class))
            }
        }
    }

    fn do_call(
        &mut self,
        func: &ast::Expression,
        args: &[ast::Expression],
    ) -> Result<TypedCall, String> {
        let callee = match func {
            ast::Expression::GetAttribute { obj, attribute } => {
                let obj = self.do_expression(obj, None)?;
                let objtype = obj.typ(self.registry);
                match self.registry.get(objtype).methods.get(attribute) {
                    Some(ftype) => ir::Callee::Method {
                        obj: Box::new(obj),
                        name: attribute.clone(),
                        ftype: ftype.clone(),
                    },
                    None => {
                        return Err(format!(
                            "type '{}' has no method '{}'",
                            self.type_name(objtype),
                            attribute
                        ));
                    }
                }
            }
            ast::Expression::GetVar { name, lineno } => match self.variables.get(name) {
                Some(Binding::Function(ftype)) => ir::Callee::Function {
                    name: name.clone(),
                    ftype: ftype.clone(),
                    is_special: false,
                    lineno: *lineno,
                },
                Some(Binding::Value(_)) => return Err(format!("'{}' is not a function", name)),
                None => return Err(format!("unknown variable '{}'", name)),
            },
            ast::Expression::Constructor(typename) => {
                let class = self.resolve(typename)?;
                let argtypes = self
                    .registry
                    .get(class)
                    .constructor_argtypes
                    .clone()
                    .ok_or_else(|| format!("cannot construct '{}'", self.type_name(class)))?;
                ir::Callee::Constructor {
                    class,
                    ftype: FunctionType::new(argtypes, Some(class)),
                }
            }
            _ => return Err("this expression is not callable".to_string()),
        };

        // A method's first argument type is the object itself.
        let expected: &[TypeId] = match &callee {
            ir::Callee::Method { ftype, .. } => &ftype.argtypes[1..],
            other => &other.ftype().argtypes,
        };
        if args.len() != expected.len() {
            return Err(format!(
                "{} expects {} arguments, got {}",
                self.describe_callee(&callee),
                expected.len(),
                args.len()
            ));
        }
        let expected = expected.to_vec();

        let mut typed_args = Vec::new();
        for (index, (arg, argtype)) in args.iter().zip(&expected).enumerate() {
            let typed = self.do_expression(arg, Some(*argtype))?;
            let actual = typed.typ(self.registry);
            match self.try_convert(typed, *argtype) {
                Some(converted) => typed_args.push(converted),
                None => {
                    return Err(format!(
                        "wrong type for argument {} of {}: expected {}, got {}",
                        index + 1,
                        self.describe_callee(&callee),
                        self.type_name(*argtype),
                        self.type_name(actual)
                    ));
                }
            }
        }

        match callee.ftype().returntype {
            None => Ok(TypedCall::Void {
                func: callee,
                args: typed_args,
            }),
            Some(restype) => {
                let call = ir::Expression::ReturningCall {
                    restype,
                    func: callee,
                    args: typed_args,
                };
                Ok(TypedCall::Returning(self.hold_if_refcounted(call)))
            }
        }
    }

    /// Call `to_string` on anything that is not already a string.
    fn to_string_expr(&mut self, expr: ir::Expression) -> Result<ir::Expression, String> {
        let typ = expr.typ(self.registry);
        if typ == self.registry.string {
            return Ok(expr);
        }
        let ftype = self
            .registry
            .get(typ)
            .methods
            .get("to_string")
            .cloned()
            .ok_or_else(|| {
                format!(
                    "cannot splice a value of type '{}' into a string: it has no to_string method",
                    self.type_name(typ)
                )
            })?;
        let call = ir::Expression::ReturningCall {
            restype: self.registry.string,
            func: ir::Callee::Method {
                obj: Box::new(expr),
                name: "to_string".to_string(),
                ftype,
            },
            args: Vec::new(),
        };
        Ok(self.hold_if_refcounted(call))
    }

    /// Concatenate two strings via the runtime helper.
    fn string_concat(&mut self, lhs: ir::Expression, rhs: ir::Expression) -> ir::Expression {
        let string = self.registry.string;
        let call = ir::Expression::ReturningCall {
            restype: string,
            func: ir::Callee::Function {
                name: "string_concat".to_string(),
                ftype: FunctionType::new(vec![string, string], Some(string)),
                is_special: true,
                lineno: None,
            },
            args: vec![lhs, rhs],
        };
        self.hold_if_refcounted(call)
    }

    fn do_string_join(&mut self, parts: &[ast::Expression]) -> Result<ir::Expression, String> {
        let mut result: Option<ir::Expression> = None;
        for part in parts {
            let typed = self.do_expression(part, None)?;
            let typed = self.to_string_expr(typed)?;
            result = Some(match result {
                None => typed,
                Some(acc) => self.string_concat(acc, typed),
            });
        }
        Ok(result.unwrap_or_else(|| ir::Expression::StringConstant(String::new())))
    }

    fn do_binary_op(
        &mut self,
        lhs: &ast::Expression,
        op: ast::BinaryOp,
        rhs: &ast::Expression,
    ) -> Result<ir::Expression, String> {
        use ast::BinaryOp;

        // a != b is not (a == b), whatever the operand types
        if op == BinaryOp::Ne {
            let eq = self.do_binary_op(lhs, BinaryOp::Eq, rhs)?;
            return Ok(ir::Expression::BoolNot(Box::new(eq)));
        }
        if op == BinaryOp::In || op == BinaryOp::NotIn {
            return Err(format!("operator '{}' is not supported", op));
        }

        let mut lhs = self.do_expression(lhs, None)?;
        let mut rhs = self.do_expression(rhs, None)?;

        let int = self.registry.int;
        let float = self.registry.float;
        let boolean = self.registry.boolean;
        let string = self.registry.string;

        if lhs.typ(self.registry) == string && rhs.typ(self.registry) == string {
            if op == BinaryOp::Add {
                return Ok(self.string_concat(lhs, rhs));
            }
        }

        // Integer arithmetic stays integer, except division.
        if lhs.typ(self.registry) == int && rhs.typ(self.registry) == int {
            let make = |lhs: ir::Expression, rhs: ir::Expression| (Box::new(lhs), Box::new(rhs));
            match op {
                BinaryOp::Add => {
                    let (lhs, rhs) = make(lhs, rhs);
                    return Ok(ir::Expression::NumberAdd { numtype: int, lhs, rhs });
                }
                BinaryOp::Sub => {
                    let (lhs, rhs) = make(lhs, rhs);
                    return Ok(ir::Expression::NumberSub { numtype: int, lhs, rhs });
                }
                BinaryOp::Mul => {
                    let (lhs, rhs) = make(lhs, rhs);
                    return Ok(ir::Expression::NumberMul { numtype: int, lhs, rhs });
                }
                BinaryOp::Mod => {
                    let (lhs, rhs) = make(lhs, rhs);
                    return Ok(ir::Expression::NumberMod { lhs, rhs });
                }
                _ => {}
            }
        }

        // Division and mixed operands lift the integer side to float.
        if lhs.typ(self.registry) == int && rhs.typ(self.registry) == int && op == BinaryOp::Div {
            lhs = ir::Expression::IntToFloat(Box::new(lhs));
            rhs = ir::Expression::IntToFloat(Box::new(rhs));
        }
        if lhs.typ(self.registry) == int && rhs.typ(self.registry) == float {
            lhs = ir::Expression::IntToFloat(Box::new(lhs));
        }
        if lhs.typ(self.registry) == float && rhs.typ(self.registry) == int {
            rhs = ir::Expression::IntToFloat(Box::new(rhs));
        }

        let lhs_type = lhs.typ(self.registry);
        let rhs_type = rhs.typ(self.registry);

        if lhs_type == float && rhs_type == float {
            let lhs = Box::new(lhs);
            let rhs = Box::new(rhs);
            match op {
                BinaryOp::Add => {
                    return Ok(ir::Expression::NumberAdd { numtype: float, lhs, rhs });
                }
                BinaryOp::Sub => {
                    return Ok(ir::Expression::NumberSub { numtype: float, lhs, rhs });
                }
                BinaryOp::Mul => {
                    return Ok(ir::Expression::NumberMul { numtype: float, lhs, rhs });
                }
                BinaryOp::Div => return Ok(ir::Expression::FloatDiv { lhs, rhs }),
                BinaryOp::Eq => {
                    // Float equality sucks, but maybe it can be useful for something
                    return Ok(ir::Expression::NumberEqual { lhs, rhs });
                }
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                    return Ok(ir::Expression::NumberComparison {
                        op: comparison_op(op),
                        lhs,
                        rhs,
                    });
                }
                _ => return lhs_rhs_unsupported(op, float, float, self.registry),
            }
        }

        if lhs_type == int && rhs_type == int {
            let lhs = Box::new(lhs);
            let rhs = Box::new(rhs);
            match op {
                BinaryOp::Eq => return Ok(ir::Expression::NumberEqual { lhs, rhs }),
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                    return Ok(ir::Expression::NumberComparison {
                        op: comparison_op(op),
                        lhs,
                        rhs,
                    });
                }
                _ => return lhs_rhs_unsupported(op, int, int, self.registry),
            }
        }

        if lhs_type == boolean && rhs_type == boolean {
            match op {
                BinaryOp::And => {
                    return Ok(ir::Expression::BoolAnd {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    });
                }
                BinaryOp::Or => {
                    return Ok(ir::Expression::BoolOr {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    });
                }
                BinaryOp::Eq => {
                    // (a and b) or (not a and not b)
                    let both = ir::Expression::BoolAnd {
                        lhs: Box::new(lhs.clone()),
                        rhs: Box::new(rhs.clone()),
                    };
                    let neither = ir::Expression::BoolAnd {
                        lhs: Box::new(ir::Expression::BoolNot(Box::new(lhs))),
                        rhs: Box::new(ir::Expression::BoolNot(Box::new(rhs))),
                    };
                    return Ok(ir::Expression::BoolOr {
                        lhs: Box::new(both),
                        rhs: Box::new(neither),
                    });
                }
                _ => {}
            }
        }

        lhs_rhs_unsupported(op, lhs_type, rhs_type, self.registry)
    }

    fn do_expression(
        &mut self,
        ast: &ast::Expression,
        expected: Option<TypeId>,
    ) -> Result<ir::Expression, String> {
        match ast {
            ast::Expression::IntConstant(value) => Ok(ir::Expression::IntConstant(*value)),
            ast::Expression::FloatConstant(text) => {
                Ok(ir::Expression::FloatConstant(text.clone()))
            }
            ast::Expression::StringConstant(value) => {
                Ok(ir::Expression::StringConstant(value.clone()))
            }
            ast::Expression::StringJoin(parts) => self.do_string_join(parts),
            ast::Expression::GetVar { name, .. } => {
                if name == "true" {
                    return Ok(ir::Expression::BoolConstant(true));
                }
                if name == "false" {
                    return Ok(ir::Expression::BoolConstant(false));
                }
                match self.variables.get(name) {
                    Some(Binding::Value(vartype)) => Ok(ir::Expression::GetVar {
                        vartype: *vartype,
                        name: name.clone(),
                    }),
                    Some(Binding::Function(_)) => {
                        Err(format!("function '{}' must be called", name))
                    }
                    None => Err(format!("unknown variable '{}'", name)),
                }
            }
            ast::Expression::Call { func, args } => match self.do_call(func, args)? {
                TypedCall::Returning(expr) => Ok(expr),
                TypedCall::Void { func, .. } => Err(format!(
                    "{} does not return a value",
                    self.describe_callee(&func)
                )),
            },
            ast::Expression::Constructor(_) => Err("constructors must be called".to_string()),
            ast::Expression::GetAttribute { obj, attribute } => {
                let obj = self.do_expression(obj, None)?;
                let objtype = obj.typ(self.registry);
                if self.registry.get(objtype).methods.contains_key(attribute) {
                    return Err(format!("method '{}' must be called", attribute));
                }
                let member = self
                    .registry
                    .get(objtype)
                    .members
                    .iter()
                    .find(|(_, name)| name == attribute)
                    .map(|(typ, _)| *typ);
                match member {
                    Some(restype) => Ok(ir::Expression::GetAttribute {
                        obj: Box::new(obj),
                        attribute: attribute.clone(),
                        restype,
                    }),
                    None => Err(format!(
                        "type '{}' has no attribute '{}'",
                        self.type_name(objtype),
                        attribute
                    )),
                }
            }
            ast::Expression::UnaryOperator { op, obj } => {
                let obj = self.do_expression(obj, None)?;
                let objtype = obj.typ(self.registry);
                match op {
                    ast::UnaryOp::Not if objtype == self.registry.boolean => {
                        Ok(ir::Expression::BoolNot(Box::new(obj)))
                    }
                    ast::UnaryOp::Neg
                        if objtype == self.registry.int || objtype == self.registry.float =>
                    {
                        Ok(ir::Expression::NumberNegation {
                            numtype: objtype,
                            obj: Box::new(obj),
                        })
                    }
                    ast::UnaryOp::Not => Err(format!(
                        "bad operand type for 'not': {}",
                        self.type_name(objtype)
                    )),
                    ast::UnaryOp::Neg => Err(format!(
                        "bad operand type for unary '-': {}",
                        self.type_name(objtype)
                    )),
                }
            }
            ast::Expression::BinaryOperator { lhs, op, rhs } => self.do_binary_op(lhs, *op, rhs),
            ast::Expression::ListDisplay(items) => self.do_list_display(items, expected),
            ast::Expression::Null => match expected {
                Some(typ)
                    if matches!(
                        self.registry.get(typ).generic_origin,
                        Some((Generic::Optional, _))
                    ) =>
                {
                    Ok(ir::Expression::Null(typ))
                }
                Some(typ) => Err(format!(
                    "null needs an Optional type, but {} was expected",
                    self.type_name(typ)
                )),
                None => Err("cannot infer the type of null here".to_string()),
            },
        }
    }

    fn do_list_display(
        &mut self,
        items: &[ast::Expression],
        expected: Option<TypeId>,
    ) -> Result<ir::Expression, String> {
        let expected_item = expected.and_then(|typ| match self.registry.get(typ).generic_origin {
            Some((Generic::List, item)) => Some(item),
            _ => None,
        });

        let mut typed_items = Vec::new();
        let item_type = match expected_item {
            Some(item) => item,
            None => match items.first() {
                Some(first) => {
                    let typed = self.do_expression(first, None)?;
                    let item = typed.typ(self.registry);
                    typed_items.push(typed);
                    item
                }
                None => {
                    return Err("cannot infer the element type of an empty list".to_string());
                }
            },
        };

        for item in items.iter().skip(typed_items.len()) {
            let typed = self.do_expression(item, Some(item_type))?;
            let actual = typed.typ(self.registry);
            match self.try_convert(typed, item_type) {
                Some(converted) => typed_items.push(converted),
                None => {
                    return Err(format!(
                        "list elements must all have the same type: expected {}, got {}",
                        self.type_name(item_type),
                        self.type_name(actual)
                    ));
                }
            }
        }

        let listtype = self.registry.instantiate(Generic::List, item_type);
        let display = ir::Expression::ListDisplay {
            listtype,
            items: typed_items,
        };
        Ok(self.hold_if_refcounted(display))
    }

    fn do_block(&mut self, block: &[ast::Statement]) -> Result<Vec<ir::Statement>, String> {
        let mut result = Vec::new();
        for statement in block {
            result.extend(self.do_statement(statement)?);
        }
        Ok(result)
    }

    fn do_statement(&mut self, ast: &ast::Statement) -> Result<Vec<ir::Statement>, String> {
        match ast {
            ast::Statement::Expr(expr) => {
                let ast::Expression::Call { func, args } = expr else {
                    return Err("this expression is not a statement".to_string());
                };
                match self.do_call(func, args)? {
                    TypedCall::Void { func, args } => Ok(vec![ir::Statement::VoidCall {
                        func,
                        args,
                    }]),
                    // A discarded refcounted result: balance the reference
                    // the call handed us right away.
                    TypedCall::Returning(ir::Expression::SetRef { value, .. }) => {
                        Ok(vec![ir::Statement::DecRef(*value)])
                    }
                    TypedCall::Returning(expr) => Ok(vec![ir::Statement::Discard(expr)]),
                }
            }
            ast::Statement::Let { varname, value } => {
                if self.variables.contains_key(varname) {
                    return Err(format!("a variable named '{}' already exists", varname));
                }
                let value = self.do_expression(value, None)?;
                self.variables
                    .insert(varname.clone(), Binding::Value(value.typ(self.registry)));
                Ok(vec![ir::Statement::CreateLocalVar {
                    varname: varname.clone(),
                    value,
                }])
            }
            ast::Statement::Assign { varname, value } => {
                let vartype = match self.variables.get(varname) {
                    Some(Binding::Value(vartype)) => *vartype,
                    Some(Binding::Function(_)) => {
                        return Err(format!("cannot assign to function '{}'", varname));
                    }
                    None => {
                        return Err(format!(
                            "cannot assign to undefined variable '{}'",
                            varname
                        ));
                    }
                };
                let value = self.do_expression(value, Some(vartype))?;
                let actual = value.typ(self.registry);
                match self.try_convert(value, vartype) {
                    Some(value) => Ok(vec![ir::Statement::SetLocalVar {
                        varname: varname.clone(),
                        value,
                    }]),
                    None => Err(format!(
                        "variable '{}' has type {}, cannot assign {} to it",
                        varname,
                        self.type_name(vartype),
                        self.type_name(actual)
                    )),
                }
            }
            ast::Statement::Pass => Ok(vec![]),
            ast::Statement::Continue => match self.loop_stack.last() {
                Some(loop_id) => Ok(vec![ir::Statement::Continue {
                    loop_id: loop_id.clone(),
                }]),
                None => Err("'continue' outside a loop".to_string()),
            },
            ast::Statement::Break => match self.loop_stack.last() {
                Some(loop_id) => Ok(vec![ir::Statement::Break {
                    loop_id: loop_id.clone(),
                }]),
                None => Err("'break' outside a loop".to_string()),
            },
            ast::Statement::Return(value) => match (self.returntype, value) {
                (None, None) => Ok(vec![ir::Statement::Return(None)]),
                (None, Some(_)) => Err("this function does not return a value".to_string()),
                (Some(_), None) => Err("this function must return a value".to_string()),
                (Some(returntype), Some(value)) => {
                    let value = self.do_expression(value, Some(returntype))?;
                    let actual = value.typ(self.registry);
                    match self.try_convert(value, returntype) {
                        Some(value) => Ok(vec![ir::Statement::Return(Some(value))]),
                        None => Err(format!(
                            "expected a return value of type {}, got {}",
                            self.type_name(returntype),
                            self.type_name(actual)
                        )),
                    }
                }
            },
            ast::Statement::If {
                ifs_and_elifs,
                else_block,
            } => self.do_if(ifs_and_elifs, else_block),
            ast::Statement::Loop {
                init,
                cond,
                incr,
                body,
            } => self.do_loop(init.as_deref(), cond.as_ref(), incr.as_deref(), body),
            ast::Statement::Switch { varname, cases } => self.do_switch(varname, cases),
        }
    }

    fn do_if(
        &mut self,
        chain: &[(ast::Expression, Vec<ast::Statement>)],
        else_block: &[ast::Statement],
    ) -> Result<Vec<ir::Statement>, String> {
        let (cond, body) = &chain[0];
        let condition = self.do_expression(cond, None)?;
        if condition.typ(self.registry) != self.registry.boolean {
            return Err(format!(
                "'if' condition must be a bool, got {}",
                self.type_name(condition.typ(self.registry))
            ));
        }
        let then = self.do_block(body)?;
        let otherwise = if chain.len() >= 2 {
            self.do_if(&chain[1..], else_block)?
        } else {
            self.do_block(else_block)?
        };
        Ok(vec![ir::Statement::If {
            condition,
            then,
            otherwise,
        }])
    }

    fn do_loop(
        &mut self,
        init: Option<&ast::Statement>,
        cond: Option<&ast::Expression>,
        incr: Option<&ast::Statement>,
        body: &[ast::Statement],
    ) -> Result<Vec<ir::Statement>, String> {
        let init_ir = match init {
            Some(statement) => self.do_statement(statement)?,
            None => Vec::new(),
        };
        let cond_ir = match cond {
            Some(expr) => {
                let condition = self.do_expression(expr, None)?;
                if condition.typ(self.registry) != self.registry.boolean {
                    return Err(format!(
                        "loop condition must be a bool, got {}",
                        self.type_name(condition.typ(self.registry))
                    ));
                }
                condition
            }
            None => ir::Expression::BoolConstant(true),
        };
        let incr_ir = match incr {
            Some(statement) => self.do_statement(statement)?,
            None => Vec::new(),
        };

        let loop_id = format!("loop{}", self.loop_counter);
        self.loop_counter += 1;

        self.loop_stack.push(loop_id.clone());
        let body_ir = self.do_block(body);
        let popped = self.loop_stack.pop();
        debug_assert_eq!(popped.as_deref(), Some(loop_id.as_str()));
        let body_ir = body_ir?;

        let mut result = vec![ir::Statement::Loop {
            loop_id,
            init: init_ir,
            cond: cond_ir,
            incr: incr_ir,
            body: body_ir,
        }];

        // A loop-local counter goes out of scope with the loop.
        if let Some(ast::Statement::Let { varname, .. }) = init {
            self.variables.remove(varname);
            result.push(ir::Statement::DeleteLocalVar {
                varname: varname.clone(),
            });
        }
        Ok(result)
    }

    fn do_switch(
        &mut self,
        varname: &str,
        cases: &[(ast::TypeName, Vec<ast::Statement>)],
    ) -> Result<Vec<ir::Statement>, String> {
        let uniontype = match self.variables.get(varname) {
            Some(Binding::Value(vartype)) => *vartype,
            _ => return Err(format!("unknown variable '{}'", varname)),
        };
        let members = self
            .registry
            .get(uniontype)
            .type_members
            .clone()
            .ok_or_else(|| {
                format!(
                    "switch requires a union, but '{}' has type {}",
                    varname,
                    self.type_name(uniontype)
                )
            })?;

        let mut case_bodies: Vec<Option<Vec<ir::Statement>>> = vec![None; members.len()];
        for (typename, body) in cases {
            let case_type = self.resolve(typename)?;
            let index = members.iter().position(|&m| m == case_type).ok_or_else(|| {
                format!(
                    "'{}' is not a member of union '{}'",
                    self.type_name(case_type),
                    self.type_name(uniontype)
                )
            })?;
            if case_bodies[index].is_some() {
                return Err(format!("duplicate case '{}'", self.type_name(case_type)));
            }

            // Inside the case body the variable has the member's type.
            let saved = self
                .variables
                .insert(varname.to_string(), Binding::Value(case_type));
            let body_ir = self.do_block(body);
            self.variables
                .insert(varname.to_string(), saved.expect("switch variable exists"));
            case_bodies[index] = Some(body_ir?);
        }

        let mut typed_cases = Vec::new();
        for (member, body) in members.iter().zip(case_bodies) {
            match body {
                Some(body) => typed_cases.push((*member, body)),
                None => {
                    return Err(format!(
                        "switch does not cover '{}'",
                        self.type_name(*member)
                    ));
                }
            }
        }

        Ok(vec![ir::Statement::Switch {
            varname: varname.to_string(),
            uniontype,
            cases: typed_cases,
        }])
    }
}

fn comparison_op(op: ast::BinaryOp) -> ir::ComparisonOp {
    match op {
        ast::BinaryOp::Lt => ir::ComparisonOp::Lt,
        ast::BinaryOp::Le => ir::ComparisonOp::Le,
        ast::BinaryOp::Gt => ir::ComparisonOp::Gt,
        ast::BinaryOp::Ge => ir::ComparisonOp::Ge,
        _ => unreachable!("not a comparison operator"),
    }
}

fn lhs_rhs_unsupported(
    op: ast::BinaryOp,
    lhs: TypeId,
    rhs: TypeId,
    registry: &TypeRegistry,
) -> Result<ir::Expression, String> {
    Err(format!(
        "unsupported operand types for '{}': {} and {}",
        op,
        registry.name(lhs),
        registry.name(rhs)
    ))
}
