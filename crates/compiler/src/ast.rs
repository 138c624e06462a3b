//! Untyped abstract syntax tree
//!
//! What the parser produces. Types are still just names here; the typer turns
//! this into the typed IR in `ir.rs`.

/// A type as written in source: `int`, `Foo`, `List[Str]`, ...
#[derive(Debug, Clone, PartialEq)]
pub enum TypeName {
    Plain(String),
    Generic(String, Box<TypeName>),
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeName::Plain(name) => write!(f, "{}", name),
            TypeName::Generic(name, arg) => write!(f, "{}[{}]", name, arg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    In,
    NotIn,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "mod",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    IntConstant(i64),
    /// Kept as source text so the emitter reproduces the literal exactly.
    FloatConstant(String),
    /// A string literal without interpolations, escapes already processed.
    StringConstant(String),
    /// An interpolated string: literal and spliced parts in order.
    StringJoin(Vec<Expression>),
    GetVar {
        name: String,
        /// Source line, captured by the lexer for `assert` only.
        lineno: Option<usize>,
    },
    Call {
        func: Box<Expression>,
        args: Vec<Expression>,
    },
    /// `new T` as the callee of a constructor call.
    Constructor(TypeName),
    GetAttribute {
        obj: Box<Expression>,
        attribute: String,
    },
    UnaryOperator {
        op: UnaryOp,
        obj: Box<Expression>,
    },
    BinaryOperator {
        lhs: Box<Expression>,
        op: BinaryOp,
        rhs: Box<Expression>,
    },
    /// `[a, b, c]`
    ListDisplay(Vec<Expression>),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// An expression evaluated for its effect. Must be a call.
    Expr(Expression),
    Let {
        varname: String,
        value: Expression,
    },
    Assign {
        varname: String,
        value: Expression,
    },
    Pass,
    Continue,
    Break,
    Return(Option<Expression>),
    If {
        /// `if` and every `elif`, in order.
        ifs_and_elifs: Vec<(Expression, Vec<Statement>)>,
        else_block: Vec<Statement>,
    },
    /// `while` and `for` both lower to this.
    Loop {
        init: Option<Box<Statement>>,
        cond: Option<Expression>,
        incr: Option<Box<Statement>>,
        body: Vec<Statement>,
    },
    Switch {
        varname: String,
        cases: Vec<(TypeName, Vec<Statement>)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub name: String,
    /// Ordered `(type, binding name)` pairs.
    pub args: Vec<(TypeName, String)>,
    /// `None` means the function returns nothing (`-> void` or no arrow).
    pub returntype: Option<TypeName>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub members: Vec<(TypeName, String)>,
    pub methods: Vec<FuncDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionDef {
    pub name: String,
    pub type_members: Vec<TypeName>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToplevelDeclaration {
    Func(FuncDef),
    Class(ClassDef),
    Union(UnionDef),
    Import(Import),
}
