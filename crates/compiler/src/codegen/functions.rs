//! Function body emission
//!
//! One `FunctionEmitter` per function. It accumulates local variable
//! declarations in `before_body` while walking the body, so every C local
//! ends up declared at the top of the function, and maps source variable
//! names to generated C names.
//!
//! Calls never pass argument expressions directly: C does not order argument
//! evaluation, so every argument is comma-assigned to a fresh temporary
//! first, then the call uses only temporaries.

use super::FileEmitter;
use crate::ir;
use std::collections::HashMap;

pub(super) struct FunctionEmitter<'f, 'r> {
    file: &'f mut FileEmitter<'r>,
    before_body: String,
    after_body: String,
    /// Source variable name -> C variable name.
    name_mapping: HashMap<String, String>,
}

impl<'f, 'r> FunctionEmitter<'f, 'r> {
    pub(super) fn new(file: &'f mut FileEmitter<'r>) -> Self {
        FunctionEmitter {
            file,
            before_body: String::new(),
            after_body: String::new(),
            name_mapping: HashMap::new(),
        }
    }

    fn declare_local_var(&mut self, typ: crate::types::TypeId) -> String {
        let name = self.file.fresh_var();
        let c_type = self.file.emit_type(Some(typ));
        self.before_body.push_str(&format!("{} {};\n\t", c_type, name));
        name
    }

    fn emit_label(&self, name: &str) -> String {
        // A label cannot end a block in C, (void)0 fixes that.
        format!("{}: (void)0;\n\t", name)
    }

    fn emit_call(&mut self, func: &ir::Callee, args: &[ir::Expression]) -> String {
        // assert() gets the source line the lexer captured as an extra
        // argument, so the runtime can report it.
        let assert_line = match func {
            ir::Callee::Function {
                name,
                lineno: Some(lineno),
                ..
            } if name == "assert" => Some(ir::Expression::IntConstant(*lineno as i64)),
            _ => None,
        };

        let mut all_args: Vec<&ir::Expression> = Vec::new();
        if let ir::Callee::Method { obj, .. } = func {
            all_args.push(obj.as_ref());
        }
        all_args.extend(args.iter());
        if let Some(line) = &assert_line {
            all_args.push(line);
        }

        let func_c = match func {
            ir::Callee::Method { obj, name, .. } => {
                let cname = self.file.get_type_c_name(obj.typ(self.file.registry));
                format!("meth_{}_{}", cname, name)
            }
            ir::Callee::Function {
                name, is_special, ..
            } => {
                if *is_special {
                    name.clone()
                } else {
                    format!("var_{}", name)
                }
            }
            ir::Callee::Constructor { class, .. } => {
                format!("ctor_{}", self.file.get_type_c_name(*class))
            }
        };

        let mut comma_exprs = String::new();
        let mut varnames = Vec::new();
        for arg in &all_args {
            let var = self.declare_local_var(arg.typ(self.file.registry));
            let value = self.emit_expression(arg);
            comma_exprs.push_str(&format!("{} = ({}), ", var, value));
            varnames.push(var);
        }
        format!("( {}{} ({}) )", comma_exprs, func_c, varnames.join(","))
    }

    fn emit_expression(&mut self, ast: &ir::Expression) -> String {
        match ast {
            ir::Expression::StringConstant(value) => self.file.emit_string(value),
            ir::Expression::IntConstant(value) => format!("((int64_t){}LL)", value),
            ir::Expression::FloatConstant(text) => format!("({})", text),
            ir::Expression::BoolConstant(value) => {
                if *value { "true" } else { "false" }.to_string()
            }
            ir::Expression::Null(typ) => {
                format!("(({}){{.isnull=true}})", self.file.emit_type(Some(*typ)))
            }
            ir::Expression::GetVar { name, .. } => self
                .name_mapping
                .get(name)
                .cloned()
                .unwrap_or_else(|| format!("var_{}", name)),
            ir::Expression::GetAttribute { obj, attribute, .. } => {
                format!("(({})->memb_{})", self.emit_expression(obj), attribute)
            }
            ir::Expression::ReturningCall { func, args, .. } => self.emit_call(func, args),
            ir::Expression::SetRef { refname, value } => {
                // The expression may use the holder's old value, so evaluate
                // it into a temporary before the decref.
                let typ = value.typ(self.file.registry);
                let var = self.declare_local_var(typ);
                let value_c = self.emit_expression(value);
                let decref = self.file.emit_decref(refname, typ, false);
                format!("({} = {}, {}, {} = {})", var, value_c, decref, refname, var)
            }
            ir::Expression::IntToFloat(obj) => {
                format!("((double)({}))", self.emit_expression(obj))
            }
            ir::Expression::NumberAdd { lhs, rhs, .. } => {
                format!("({} + {})", self.emit_expression(lhs), self.emit_expression(rhs))
            }
            ir::Expression::NumberSub { lhs, rhs, .. } => {
                format!("({} - {})", self.emit_expression(lhs), self.emit_expression(rhs))
            }
            ir::Expression::NumberMul { lhs, rhs, .. } => {
                format!("({} * {})", self.emit_expression(lhs), self.emit_expression(rhs))
            }
            ir::Expression::NumberMod { lhs, rhs } => {
                format!("({} % {})", self.emit_expression(lhs), self.emit_expression(rhs))
            }
            ir::Expression::FloatDiv { lhs, rhs } => {
                format!("({} / {})", self.emit_expression(lhs), self.emit_expression(rhs))
            }
            ir::Expression::NumberNegation { obj, .. } => {
                format!("(-({}))", self.emit_expression(obj))
            }
            ir::Expression::NumberEqual { lhs, rhs } => {
                format!("({} == {})", self.emit_expression(lhs), self.emit_expression(rhs))
            }
            ir::Expression::NumberComparison { op, lhs, rhs } => format!(
                "({} {} {})",
                self.emit_expression(lhs),
                op.c_operator(),
                self.emit_expression(rhs)
            ),
            ir::Expression::BoolAnd { lhs, rhs } => {
                format!("({} && {})", self.emit_expression(lhs), self.emit_expression(rhs))
            }
            ir::Expression::BoolOr { lhs, rhs } => {
                format!("({} || {})", self.emit_expression(lhs), self.emit_expression(rhs))
            }
            ir::Expression::BoolNot(obj) => format!("(!({}))", self.emit_expression(obj)),
            ir::Expression::InstantiateUnion { uniontype, value } => {
                let membernum = self
                    .file
                    .registry
                    .get(*uniontype)
                    .type_members
                    .as_ref()
                    .expect("union has members")
                    .iter()
                    .position(|&m| m == value.typ(self.file.registry))
                    .expect("value type is a union member");
                let union_c_type = self.file.emit_type(Some(*uniontype));
                format!(
                    "(({}){{ .val = {{ .item{} = {} }}, .membernum = {} }})",
                    union_c_type,
                    membernum,
                    self.emit_expression(value),
                    membernum
                )
            }
            ir::Expression::ListDisplay { listtype, items } => {
                let cname = self.file.get_type_c_name(*listtype);
                let var = self.declare_local_var(*listtype);
                let mut parts = vec![format!("{} = ctor_{}()", var, cname)];
                for item in items {
                    let item_c = self.emit_expression(item);
                    parts.push(format!("meth_{}_push({}, {})", cname, var, item_c));
                }
                parts.push(var);
                format!("({})", parts.join(", "))
            }
        }
    }

    fn emit_statement(&mut self, ast: &ir::Statement) -> String {
        match ast {
            ir::Statement::CreateLocalVar { varname, value } => {
                let var = self.declare_local_var(value.typ(self.file.registry));
                debug_assert!(!self.name_mapping.contains_key(varname));
                self.name_mapping.insert(varname.clone(), var.clone());
                format!("{} = {};\n\t", var, self.emit_expression(value))
            }
            ir::Statement::SetLocalVar { varname, value } => {
                let var = self.name_mapping[varname].clone();
                format!("{} = {};\n\t", var, self.emit_expression(value))
            }
            ir::Statement::DeleteLocalVar { varname } => {
                self.name_mapping.remove(varname);
                String::new()
            }
            ir::Statement::VoidCall { func, args } => {
                format!("{};\n\t", self.emit_call(func, args))
            }
            ir::Statement::Discard(expr) => format!("{};\n\t", self.emit_expression(expr)),
            ir::Statement::DecRef(value) => {
                let typ = value.typ(self.file.registry);
                let value_c = self.emit_expression(value);
                self.file.emit_decref(&value_c, typ, true)
            }
            ir::Statement::Return(Some(value)) => {
                let typ = value.typ(self.file.registry);
                format!(
                    "retval = {};\n\t{}goto out;\n\t",
                    self.emit_expression(value),
                    self.file.emit_incref("retval", typ, true)
                )
            }
            ir::Statement::Return(None) => "goto out;\n\t".to_string(),
            ir::Statement::If {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.emit_expression(condition);
                let then: String = then.iter().map(|s| self.emit_statement(s)).collect();
                let otherwise: String = otherwise.iter().map(|s| self.emit_statement(s)).collect();
                format!(
                    "if ({}) {{\n\t{}}} else {{\n\t{}}}\n\t",
                    condition, then, otherwise
                )
            }
            ir::Statement::Loop {
                loop_id,
                init,
                cond,
                incr,
                body,
            } => {
                // A while loop with a label before the increment, so that
                // continue still runs the increment.
                let init: String = init.iter().map(|s| self.emit_statement(s)).collect();
                let cond = self.emit_expression(cond);
                let body: String = body.iter().map(|s| self.emit_statement(s)).collect();
                let incr: String = incr.iter().map(|s| self.emit_statement(s)).collect();
                format!(
                    "{}while ({}) {{\n\t{}{}{}}}\n\t",
                    init,
                    cond,
                    body,
                    self.emit_label(loop_id),
                    incr
                )
            }
            ir::Statement::Continue { loop_id } => format!("goto {};\n\t", loop_id),
            ir::Statement::Break { .. } => "break;\n\t".to_string(),
            ir::Statement::Switch {
                varname,
                cases,
                ..
            } => {
                let union_var = self.name_mapping[varname].clone();
                let mut body_code = String::new();
                for (membernum, (membertype, statements)) in cases.iter().enumerate() {
                    let specific_var = self.declare_local_var(*membertype);
                    self.name_mapping
                        .insert(varname.clone(), specific_var.clone());
                    let content: String =
                        statements.iter().map(|s| self.emit_statement(s)).collect();
                    body_code.push_str(&format!(
                        "case {}:\n\t{} = {}.val.item{};\n\t{}break;\n\t",
                        membernum, specific_var, union_var, membernum, content
                    ));
                }
                self.name_mapping.insert(varname.clone(), union_var.clone());

                format!(
                    "switch ({}.membernum) {{\n\t{}default:\n\tassert(0);\n\t}}\n\t",
                    union_var, body_code
                )
            }
        }
    }

    pub(super) fn emit_funcdef(mut self, funcdef: &ir::FuncDef, c_name: &str) -> String {
        let mut c_argnames = Vec::new();
        for argname in &funcdef.argnames {
            let c_arg = self.file.fresh_var();
            self.name_mapping.insert(argname.clone(), c_arg.clone());
            c_argnames.push(c_arg);
        }
        let mut arg_declarations = Vec::new();
        for (argtype, c_arg) in funcdef.ftype.argtypes.iter().zip(&c_argnames) {
            arg_declarations.push(format!("{} {}", self.file.emit_type(Some(*argtype)), c_arg));
        }
        let arg_declarations = if arg_declarations.is_empty() {
            "void".to_string()
        } else {
            arg_declarations.join(",")
        };

        let mut ref_declarations = String::new();
        for (refname, reftype) in &funcdef.refs {
            let init = if self.file.registry.get(*reftype).type_members.is_some() {
                "{0}"
            } else {
                "NULL"
            };
            let c_type = self.file.emit_type(Some(*reftype));
            ref_declarations.push_str(&format!("{} {} = {};\n\t", c_type, refname, init));
        }
        let mut decrefs = String::new();
        for (refname, reftype) in funcdef.refs.iter().rev() {
            decrefs.push_str(&self.file.emit_decref(refname, *reftype, true));
        }

        let body_statements: String = funcdef
            .body
            .iter()
            .map(|statement| self.emit_statement(statement))
            .collect();

        if let Some(returntype) = funcdef.ftype.returntype {
            let c_type = self.file.emit_type(Some(returntype));
            self.before_body.push_str(&format!("{} retval;\n\t", c_type));
            self.after_body.push_str("return retval;\n");
        }

        let return_c_type = self.file.emit_type(funcdef.ftype.returntype);
        // the unconditional goto keeps the label used on every path
        format!(
            "\n{return_c_type} {c_name}({arg_declarations})\n\
             {{\n\
             \t{before_body}{ref_declarations}{body_statements}goto out;\n\
             {out_label}\t{decrefs}{after_body}}}\n",
            before_body = self.before_body,
            out_label = self.emit_label("out"),
            after_body = self.after_body,
        )
    }
}
