//! Typed intermediate representation
//!
//! Mirrors the untyped AST, but every expression knows its resolved type and
//! operators are split by operand type. This is the contract between the
//! typer and the C emitter; in particular, the `refs` list of a [`FuncDef`]
//! and the [`SetRef`] expressions inside it carry the reference-count
//! discipline the emitter lowers into incref/decref calls.
//!
//! [`SetRef`]: Expression::SetRef

use crate::types::{FunctionType, TypeId, TypeRegistry};

/// What a call invokes. Method handles only exist in callee position, which
/// keeps "a method object without an immediate call" unrepresentable.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Function {
        name: String,
        ftype: FunctionType,
        /// Special functions are runtime helpers emitted under their own C
        /// name; ordinary functions get the `var_` prefix.
        is_special: bool,
        /// Source line, present only for `assert`.
        lineno: Option<usize>,
    },
    Method {
        obj: Box<Expression>,
        name: String,
        ftype: FunctionType,
    },
    Constructor {
        class: TypeId,
        ftype: FunctionType,
    },
}

impl Callee {
    pub fn ftype(&self) -> &FunctionType {
        match self {
            Callee::Function { ftype, .. } => ftype,
            Callee::Method { ftype, .. } => ftype,
            Callee::Constructor { ftype, .. } => ftype,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    pub fn c_operator(self) -> &'static str {
        match self {
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    StringConstant(String),
    IntConstant(i64),
    /// Source text of the literal, reproduced verbatim in C.
    FloatConstant(String),
    BoolConstant(bool),
    /// The null value of the given Optional type.
    Null(TypeId),
    GetVar {
        vartype: TypeId,
        name: String,
    },
    GetAttribute {
        obj: Box<Expression>,
        attribute: String,
        restype: TypeId,
    },
    ReturningCall {
        restype: TypeId,
        func: Callee,
        args: Vec<Expression>,
    },
    /// Store the value into the named ref holder, releasing the holder's
    /// previous value first. The expression evaluates to the stored value.
    SetRef {
        refname: String,
        value: Box<Expression>,
    },
    IntToFloat(Box<Expression>),
    NumberAdd {
        numtype: TypeId,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    NumberSub {
        numtype: TypeId,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    NumberMul {
        numtype: TypeId,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// Integer remainder; division always produces float via [`FloatDiv`].
    ///
    /// [`FloatDiv`]: Expression::FloatDiv
    NumberMod {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    FloatDiv {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    NumberNegation {
        numtype: TypeId,
        obj: Box<Expression>,
    },
    NumberEqual {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    NumberComparison {
        op: ComparisonOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    BoolAnd {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    BoolOr {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    BoolNot(Box<Expression>),
    /// Wrap a member value into a union, tagged with the member's index.
    InstantiateUnion {
        uniontype: TypeId,
        value: Box<Expression>,
    },
    /// Build a list from element expressions.
    ListDisplay {
        listtype: TypeId,
        items: Vec<Expression>,
    },
}

impl Expression {
    /// The resolved type of this expression.
    pub fn typ(&self, registry: &TypeRegistry) -> TypeId {
        match self {
            Expression::StringConstant(_) => registry.string,
            Expression::IntConstant(_) => registry.int,
            Expression::FloatConstant(_) => registry.float,
            Expression::BoolConstant(_) => registry.boolean,
            Expression::Null(typ) => *typ,
            Expression::GetVar { vartype, .. } => *vartype,
            Expression::GetAttribute { restype, .. } => *restype,
            Expression::ReturningCall { restype, .. } => *restype,
            Expression::SetRef { value, .. } => value.typ(registry),
            Expression::IntToFloat(_) => registry.float,
            Expression::NumberAdd { numtype, .. }
            | Expression::NumberSub { numtype, .. }
            | Expression::NumberMul { numtype, .. }
            | Expression::NumberNegation { numtype, .. } => *numtype,
            Expression::NumberMod { .. } => registry.int,
            Expression::FloatDiv { .. } => registry.float,
            Expression::NumberEqual { .. }
            | Expression::NumberComparison { .. }
            | Expression::BoolAnd { .. }
            | Expression::BoolOr { .. }
            | Expression::BoolNot(_) => registry.boolean,
            Expression::InstantiateUnion { uniontype, .. } => *uniontype,
            Expression::ListDisplay { listtype, .. } => *listtype,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateLocalVar {
        varname: String,
        value: Expression,
    },
    SetLocalVar {
        varname: String,
        value: Expression,
    },
    /// Forget a local binding so the name can be reused (loop counters).
    DeleteLocalVar {
        varname: String,
    },
    VoidCall {
        func: Callee,
        args: Vec<Expression>,
    },
    /// Evaluate for effect and drop a non-refcounted result.
    Discard(Expression),
    /// Evaluate and release a refcounted value whose ownership would
    /// otherwise leak (a call result used as a statement).
    DecRef(Expression),
    Return(Option<Expression>),
    If {
        condition: Expression,
        then: Vec<Statement>,
        otherwise: Vec<Statement>,
    },
    Loop {
        loop_id: String,
        init: Vec<Statement>,
        cond: Expression,
        incr: Vec<Statement>,
        body: Vec<Statement>,
    },
    Continue {
        loop_id: String,
    },
    Break {
        loop_id: String,
    },
    Switch {
        varname: String,
        uniontype: TypeId,
        /// One entry per union member, in member (tag) order.
        cases: Vec<(TypeId, Vec<Statement>)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub name: String,
    pub ftype: FunctionType,
    pub argnames: Vec<String>,
    pub body: Vec<Statement>,
    /// Synthetic refcounted holders, in allocation order. The emitter
    /// initializes them to the null pattern and releases them in reverse
    /// order at the function's single exit.
    pub refs: Vec<(String, TypeId)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToplevelDeclaration {
    FuncDef(FuncDef),
    ClassDef {
        class: TypeId,
        methods: Vec<FuncDef>,
    },
    UnionDef {
        union: TypeId,
    },
}
