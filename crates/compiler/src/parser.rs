//! Recursive-descent parser for oomph
//!
//! Consumes the token stream with one token of lookahead and produces the
//! untyped AST. String literals are taken apart here: `"hi {name}"` desugars
//! into a [`StringJoin`] of literal and spliced parts, so later stages never
//! see interpolation syntax.
//!
//! [`StringJoin`]: crate::ast::Expression::StringJoin

use crate::ast::{
    BinaryOp, ClassDef, Expression, FuncDef, Import, Statement, ToplevelDeclaration, TypeName,
    UnaryOp, UnionDef,
};
use crate::lexer::{Token, TokenKind, tokenize};

/// Parse a whole source file into toplevel declarations.
pub fn parse_file(source: &str) -> Result<Vec<ToplevelDeclaration>, String> {
    let mut parser = Parser::new(source)?;
    let mut declarations = Vec::new();
    while !parser.at_end() {
        declarations.push(parser.parse_toplevel()?);
    }
    Ok(declarations)
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, String> {
        Ok(Parser {
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn describe_next(&self) -> String {
        match self.peek() {
            Some(token) => format!("{:?}", token.value),
            None => "end of input".to_string(),
        }
    }

    fn advance(&mut self) -> Result<Token, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or("unexpected end of input")?;
        self.pos += 1;
        Ok(token)
    }

    fn check(&self, kind: TokenKind, value: &str) -> bool {
        self.peek().is_some_and(|t| t.is(kind, value))
    }

    fn check_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn consume(&mut self, kind: TokenKind, value: &str) -> bool {
        if self.check(kind, value) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, value: &str) -> Result<(), String> {
        if self.consume(kind, value) {
            Ok(())
        } else {
            Err(format!("expected {:?}, got {}", value, self.describe_next()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, String> {
        if self.check_kind(TokenKind::Identifier) {
            Ok(self.advance()?.value)
        } else {
            Err(format!("expected a name, got {}", self.describe_next()))
        }
    }

    fn expect_statement_end(&mut self) -> Result<(), String> {
        if self.consume(TokenKind::Op, "\n") {
            Ok(())
        } else {
            Err(format!(
                "expected end of line, got {}",
                self.describe_next()
            ))
        }
    }

    // ------------------------------------------------------------------
    // Toplevel declarations
    // ------------------------------------------------------------------

    fn parse_toplevel(&mut self) -> Result<ToplevelDeclaration, String> {
        if self.check(TokenKind::Keyword, "func") {
            Ok(ToplevelDeclaration::Func(self.parse_funcdef("func")?))
        } else if self.check(TokenKind::Keyword, "class") {
            Ok(ToplevelDeclaration::Class(self.parse_classdef()?))
        } else if self.check(TokenKind::Keyword, "typedef") {
            Ok(ToplevelDeclaration::Union(self.parse_typedef()?))
        } else if self.check(TokenKind::Keyword, "import") {
            Ok(ToplevelDeclaration::Import(self.parse_import()?))
        } else {
            Err(format!(
                "expected 'func', 'class', 'typedef' or 'import', got {}",
                self.describe_next()
            ))
        }
    }

    fn parse_funcdef(&mut self, keyword: &str) -> Result<FuncDef, String> {
        self.expect(TokenKind::Keyword, keyword)?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Op, "(")?;
        let mut args = Vec::new();
        if !self.check(TokenKind::Op, ")") {
            loop {
                let argtype = self.parse_type()?;
                let argname = self.expect_identifier()?;
                args.push((argtype, argname));
                if !self.consume(TokenKind::Op, ",") {
                    break;
                }
            }
        }
        self.expect(TokenKind::Op, ")")?;

        let returntype = if self.consume(TokenKind::Op, "->") {
            let typename = self.parse_type()?;
            match typename {
                TypeName::Plain(ref name) if name == "void" => None,
                other => Some(other),
            }
        } else {
            None
        };

        let body = self.parse_block()?;
        Ok(FuncDef {
            name,
            args,
            returntype,
            body,
        })
    }

    fn parse_classdef(&mut self) -> Result<ClassDef, String> {
        self.expect(TokenKind::Keyword, "class")?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Op, "(")?;
        let mut members = Vec::new();
        if !self.check(TokenKind::Op, ")") {
            loop {
                let membertype = self.parse_type()?;
                let membername = self.expect_identifier()?;
                members.push((membertype, membername));
                if !self.consume(TokenKind::Op, ",") {
                    break;
                }
            }
        }
        self.expect(TokenKind::Op, ")")?;

        let mut methods = Vec::new();
        if self.check_kind(TokenKind::BeginBlock) {
            self.advance()?;
            while !self.check_kind(TokenKind::EndBlock) {
                methods.push(self.parse_funcdef("meth")?);
            }
            self.advance()?;
        } else {
            self.expect_statement_end()?;
        }

        Ok(ClassDef {
            name,
            members,
            methods,
        })
    }

    fn parse_typedef(&mut self) -> Result<UnionDef, String> {
        self.expect(TokenKind::Keyword, "typedef")?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Op, "=")?;
        let mut type_members = vec![self.parse_type()?];
        while self.consume(TokenKind::Op, "|") {
            type_members.push(self.parse_type()?);
        }
        self.expect_statement_end()?;
        Ok(UnionDef { name, type_members })
    }

    fn parse_import(&mut self) -> Result<Import, String> {
        self.expect(TokenKind::Keyword, "import")?;
        if !self.check_kind(TokenKind::OnelineString) {
            return Err(format!(
                "expected a quoted path after 'import', got {}",
                self.describe_next()
            ));
        }
        let token = self.advance()?;
        let path = match parse_string_literal(&token.value, false)? {
            Expression::StringConstant(path) => path,
            _ => return Err("import paths cannot contain interpolations".to_string()),
        };
        self.expect(TokenKind::Keyword, "as")?;
        let name = self.expect_identifier()?;
        self.expect_statement_end()?;
        Ok(Import { path, name })
    }

    fn parse_type(&mut self) -> Result<TypeName, String> {
        let name = self.expect_identifier()?;
        if self.consume(TokenKind::Op, "[") {
            let arg = self.parse_type()?;
            self.expect(TokenKind::Op, "]")?;
            Ok(TypeName::Generic(name, Box::new(arg)))
        } else {
            Ok(TypeName::Plain(name))
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> Result<Vec<Statement>, String> {
        if !self.check_kind(TokenKind::BeginBlock) {
            return Err(format!(
                "expected an indented block, got {}",
                self.describe_next()
            ));
        }
        self.advance()?;
        let mut statements = Vec::new();
        while !self.check_kind(TokenKind::EndBlock) {
            if self.at_end() {
                return Err("unexpected end of input inside a block".to_string());
            }
            statements.push(self.parse_statement()?);
        }
        self.advance()?;
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, String> {
        if self.check(TokenKind::Keyword, "let") {
            let statement = self.parse_let()?;
            self.expect_statement_end()?;
            return Ok(statement);
        }
        if self.consume(TokenKind::Keyword, "pass") {
            self.expect_statement_end()?;
            return Ok(Statement::Pass);
        }
        if self.consume(TokenKind::Keyword, "continue") {
            self.expect_statement_end()?;
            return Ok(Statement::Continue);
        }
        if self.consume(TokenKind::Keyword, "break") {
            self.expect_statement_end()?;
            return Ok(Statement::Break);
        }
        if self.consume(TokenKind::Keyword, "return") {
            if self.consume(TokenKind::Op, "\n") {
                return Ok(Statement::Return(None));
            }
            let value = self.parse_expression()?;
            self.expect_statement_end()?;
            return Ok(Statement::Return(Some(value)));
        }
        if self.check(TokenKind::Keyword, "if") {
            return self.parse_if_statement();
        }
        if self.consume(TokenKind::Keyword, "while") {
            let cond = self.parse_expression()?;
            let body = self.parse_block()?;
            return Ok(Statement::Loop {
                init: None,
                cond: Some(cond),
                incr: None,
                body,
            });
        }
        if self.consume(TokenKind::Keyword, "for") {
            let init = self.parse_simple_statement()?;
            self.expect(TokenKind::Op, ";")?;
            let cond = self.parse_expression()?;
            self.expect(TokenKind::Op, ";")?;
            let incr = self.parse_simple_statement()?;
            let body = self.parse_block()?;
            return Ok(Statement::Loop {
                init: Some(Box::new(init)),
                cond: Some(cond),
                incr: Some(Box::new(incr)),
                body,
            });
        }
        if self.consume(TokenKind::Keyword, "switch") {
            let varname = self.expect_identifier()?;
            if !self.check_kind(TokenKind::BeginBlock) {
                return Err(format!(
                    "expected an indented block, got {}",
                    self.describe_next()
                ));
            }
            self.advance()?;
            let mut cases = Vec::new();
            while !self.check_kind(TokenKind::EndBlock) {
                self.expect(TokenKind::Keyword, "case")?;
                let typename = self.parse_type()?;
                let body = self.parse_block()?;
                cases.push((typename, body));
            }
            self.advance()?;
            return Ok(Statement::Switch { varname, cases });
        }

        let statement = self.parse_assignment_or_call()?;
        self.expect_statement_end()?;
        Ok(statement)
    }

    /// A statement without its line terminator, as used in `for` headers.
    fn parse_simple_statement(&mut self) -> Result<Statement, String> {
        if self.check(TokenKind::Keyword, "let") {
            self.parse_let()
        } else {
            self.parse_assignment_or_call()
        }
    }

    fn parse_let(&mut self) -> Result<Statement, String> {
        self.expect(TokenKind::Keyword, "let")?;
        let varname = self.expect_identifier()?;
        self.expect(TokenKind::Op, "=")?;
        let value = self.parse_expression()?;
        Ok(Statement::Let { varname, value })
    }

    fn parse_assignment_or_call(&mut self) -> Result<Statement, String> {
        let expr = self.parse_expression()?;
        if self.consume(TokenKind::Op, "=") {
            let varname = match expr {
                Expression::GetVar { name, .. } => name,
                _ => return Err("can only assign to a variable".to_string()),
            };
            let value = self.parse_expression()?;
            return Ok(Statement::Assign { varname, value });
        }
        match expr {
            Expression::Call { .. } => Ok(Statement::Expr(expr)),
            _ => Err("this expression is not a statement".to_string()),
        }
    }

    fn parse_if_statement(&mut self) -> Result<Statement, String> {
        self.expect(TokenKind::Keyword, "if")?;
        let cond = self.parse_expression()?;
        let body = self.parse_block()?;
        let mut ifs_and_elifs = vec![(cond, body)];
        while self.consume(TokenKind::Keyword, "elif") {
            let cond = self.parse_expression()?;
            let body = self.parse_block()?;
            ifs_and_elifs.push((cond, body));
        }
        let else_block = if self.consume(TokenKind::Keyword, "else") {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Statement::If {
            ifs_and_elifs,
            else_block,
        })
    }

    // ------------------------------------------------------------------
    // Expressions, by precedence
    // ------------------------------------------------------------------

    pub fn parse_expression(&mut self) -> Result<Expression, String> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, String> {
        let mut lhs = self.parse_and()?;
        while self.consume(TokenKind::Keyword, "or") {
            let rhs = self.parse_and()?;
            lhs = binary(lhs, BinaryOp::Or, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expression, String> {
        let mut lhs = self.parse_not()?;
        while self.consume(TokenKind::Keyword, "and") {
            let rhs = self.parse_not()?;
            lhs = binary(lhs, BinaryOp::And, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expression, String> {
        if self.consume(TokenKind::Keyword, "not") {
            let obj = self.parse_not()?;
            return Ok(Expression::UnaryOperator {
                op: UnaryOp::Not,
                obj: Box::new(obj),
            });
        }
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        let token = self.peek()?;
        match (token.kind, token.value.as_str()) {
            (TokenKind::Op, "==") => Some(BinaryOp::Eq),
            (TokenKind::Op, "!=") => Some(BinaryOp::Ne),
            (TokenKind::Op, "<") => Some(BinaryOp::Lt),
            (TokenKind::Op, "<=") => Some(BinaryOp::Le),
            (TokenKind::Op, ">") => Some(BinaryOp::Gt),
            (TokenKind::Op, ">=") => Some(BinaryOp::Ge),
            (TokenKind::Keyword, "in") => Some(BinaryOp::In),
            (TokenKind::Keyword, "not in") => Some(BinaryOp::NotIn),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> Result<Expression, String> {
        let mut lhs = self.parse_additive()?;
        while let Some(op) = self.comparison_op() {
            self.advance()?;
            let rhs = self.parse_additive()?;
            lhs = binary(lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expression, String> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = if self.consume(TokenKind::Op, "+") {
                BinaryOp::Add
            } else if self.consume(TokenKind::Op, "-") {
                BinaryOp::Sub
            } else {
                break;
            };
            let rhs = self.parse_multiplicative()?;
            lhs = binary(lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.consume(TokenKind::Op, "*") {
                BinaryOp::Mul
            } else if self.consume(TokenKind::Op, "/") {
                BinaryOp::Div
            } else if self.consume(TokenKind::Keyword, "mod") {
                BinaryOp::Mod
            } else {
                break;
            };
            let rhs = self.parse_unary()?;
            lhs = binary(lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expression, String> {
        if self.consume(TokenKind::Op, "-") {
            let obj = self.parse_unary()?;
            return Ok(Expression::UnaryOperator {
                op: UnaryOp::Neg,
                obj: Box::new(obj),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression, String> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.consume(TokenKind::Op, "(") {
                let mut args = Vec::new();
                if !self.check(TokenKind::Op, ")") {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.consume(TokenKind::Op, ",") {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::Op, ")")?;
                expr = Expression::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.consume(TokenKind::Op, ".") {
                let attribute = self.expect_identifier()?;
                expr = Expression::GetAttribute {
                    obj: Box::new(expr),
                    attribute,
                };
            } else if self.consume(TokenKind::Op, "[") {
                // Indexing sugar: xs[i] is xs.get(i)
                let index = self.parse_expression()?;
                self.expect(TokenKind::Op, "]")?;
                expr = Expression::Call {
                    func: Box::new(Expression::GetAttribute {
                        obj: Box::new(expr),
                        attribute: "get".to_string(),
                    }),
                    args: vec![index],
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expression, String> {
        if self.check_kind(TokenKind::Int) {
            let token = self.advance()?;
            let value: i64 = token
                .value
                .parse()
                .map_err(|_| format!("integer literal out of range: {}", token.value))?;
            return Ok(Expression::IntConstant(value));
        }
        if self.check_kind(TokenKind::Float) {
            let token = self.advance()?;
            return Ok(Expression::FloatConstant(token.value));
        }
        if self.check_kind(TokenKind::OnelineString) {
            let token = self.advance()?;
            return parse_string_literal(&token.value, false);
        }
        if self.check_kind(TokenKind::MultilineString) {
            let token = self.advance()?;
            return parse_string_literal(&token.value, true);
        }
        if self.consume(TokenKind::Keyword, "new") {
            let typename = self.parse_type()?;
            if !self.check(TokenKind::Op, "(") {
                return Err(format!("expected '(' after 'new {}'", typename));
            }
            return Ok(Expression::Constructor(typename));
        }
        if self.check_kind(TokenKind::Identifier) {
            let token = self.advance()?;
            if token.value == "null" {
                return Ok(Expression::Null);
            }
            return Ok(Expression::GetVar {
                name: token.value,
                lineno: token.lineno,
            });
        }
        if self.consume(TokenKind::Op, "(") {
            let expr = self.parse_expression()?;
            self.expect(TokenKind::Op, ")")?;
            return Ok(expr);
        }
        if self.consume(TokenKind::Op, "[") {
            let mut items = Vec::new();
            if !self.check(TokenKind::Op, "]") {
                loop {
                    items.push(self.parse_expression()?);
                    if !self.consume(TokenKind::Op, ",") {
                        break;
                    }
                }
            }
            self.expect(TokenKind::Op, "]")?;
            return Ok(Expression::ListDisplay(items));
        }
        Err(format!("unexpected {}", self.describe_next()))
    }
}

fn binary(lhs: Expression, op: BinaryOp, rhs: Expression) -> Expression {
    Expression::BinaryOperator {
        lhs: Box::new(lhs),
        op,
        rhs: Box::new(rhs),
    }
}

/// Take apart a string literal lexeme, processing escapes and brace splices.
fn parse_string_literal(lexeme: &str, multiline: bool) -> Result<Expression, String> {
    let quote_len = if multiline { 3 } else { 1 };
    let content = &lexeme[quote_len..lexeme.len() - quote_len];

    let mut parts: Vec<Expression> = Vec::new();
    let mut literal = String::new();
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or("incomplete escape in string")?;
                literal.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other, // " { } and backslash escape to themselves
                });
            }
            '{' => {
                let source: String = chars.by_ref().take_while(|&c| c != '}').collect();
                if !literal.is_empty() {
                    parts.push(Expression::StringConstant(std::mem::take(&mut literal)));
                }
                let mut sub = Parser::new(&source)
                    .map_err(|e| format!("invalid string interpolation {{{}}}: {}", source, e))?;
                let expr = sub
                    .parse_expression()
                    .map_err(|e| format!("invalid string interpolation {{{}}}: {}", source, e))?;
                if !sub.consume(TokenKind::Op, "\n") || !sub.at_end() {
                    return Err(format!("invalid string interpolation {{{}}}", source));
                }
                parts.push(expr);
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() || parts.is_empty() {
        parts.push(Expression::StringConstant(literal));
    }

    if parts.len() == 1 && matches!(parts[0], Expression::StringConstant(_)) {
        Ok(parts.pop().unwrap())
    } else {
        Ok(Expression::StringJoin(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(source: &str) -> Expression {
        let mut parser = Parser::new(source).unwrap();
        parser.parse_expression().unwrap()
    }

    #[test]
    fn test_precedence_mul_before_add() {
        let expr = parse_expr("1 + 2 * 3");
        let Expression::BinaryOperator { op, rhs, .. } = expr else {
            panic!("expected binary operator");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(
            *rhs,
            Expression::BinaryOperator {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_precedence_comparison_before_and() {
        let expr = parse_expr("a == b and c == d");
        assert!(matches!(
            expr,
            Expression::BinaryOperator {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_unary_minus_binds_tighter_than_mul() {
        let expr = parse_expr("-a * b");
        assert!(matches!(
            expr,
            Expression::BinaryOperator {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_postfix_chain() {
        let expr = parse_expr("a.b.c(1)");
        let Expression::Call { func, args } = expr else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 1);
        assert!(matches!(*func, Expression::GetAttribute { .. }));
    }

    #[test]
    fn test_indexing_desugars_to_get() {
        let expr = parse_expr("xs[0]");
        let Expression::Call { func, .. } = expr else {
            panic!("expected a call");
        };
        let Expression::GetAttribute { attribute, .. } = *func else {
            panic!("expected attribute access");
        };
        assert_eq!(attribute, "get");
    }

    #[test]
    fn test_int_literal_boundary() {
        assert_eq!(
            parse_expr("9223372036854775807"),
            Expression::IntConstant(i64::MAX)
        );
        let mut parser = Parser::new("9223372036854775808").unwrap();
        assert!(parser.parse_expression().is_err());
    }

    #[test]
    fn test_string_interpolation_desugar() {
        let expr = parse_expr("\"hello {name}!\"");
        let Expression::StringJoin(parts) = expr else {
            panic!("expected a string join");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0],
            Expression::StringConstant("hello ".to_string())
        );
        assert!(matches!(parts[1], Expression::GetVar { .. }));
        assert_eq!(parts[2], Expression::StringConstant("!".to_string()));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            parse_expr(r#""a\nb\t\"c\" \{x\}""#),
            Expression::StringConstant("a\nb\t\"c\" {x}".to_string())
        );
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(
            parse_expr("\"hello\""),
            Expression::StringConstant("hello".to_string())
        );
    }

    #[test]
    fn test_null_literal() {
        assert_eq!(parse_expr("null"), Expression::Null);
    }

    #[test]
    fn test_list_display() {
        let expr = parse_expr("[1, 2, 3]");
        let Expression::ListDisplay(items) = expr else {
            panic!("expected a list display");
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_funcdef() {
        let program = parse_file("func add(int x, int y) -> int:\n    return x + y\n").unwrap();
        assert_eq!(program.len(), 1);
        let ToplevelDeclaration::Func(funcdef) = &program[0] else {
            panic!("expected a function");
        };
        assert_eq!(funcdef.name, "add");
        assert_eq!(funcdef.args.len(), 2);
        assert_eq!(funcdef.returntype, Some(TypeName::Plain("int".to_string())));
        assert_eq!(funcdef.body.len(), 1);
    }

    #[test]
    fn test_void_return_type() {
        let program = parse_file("func main() -> void:\n    pass\n").unwrap();
        let ToplevelDeclaration::Func(funcdef) = &program[0] else {
            panic!("expected a function");
        };
        assert_eq!(funcdef.returntype, None);
    }

    #[test]
    fn test_classdef_with_method() {
        let source = "class Counter(int n):\n    meth get() -> int:\n        return self.n\n";
        let program = parse_file(source).unwrap();
        let ToplevelDeclaration::Class(classdef) = &program[0] else {
            panic!("expected a class");
        };
        assert_eq!(classdef.name, "Counter");
        assert_eq!(classdef.members.len(), 1);
        assert_eq!(classdef.methods.len(), 1);
        assert_eq!(classdef.methods[0].name, "get");
    }

    #[test]
    fn test_typedef() {
        let program = parse_file("typedef IntOrStr = BoxInt | BoxStr\n").unwrap();
        let ToplevelDeclaration::Union(uniondef) = &program[0] else {
            panic!("expected a union");
        };
        assert_eq!(uniondef.name, "IntOrStr");
        assert_eq!(uniondef.type_members.len(), 2);
    }

    #[test]
    fn test_import() {
        let program = parse_file("import \"utils.oomph\" as utils\n").unwrap();
        let ToplevelDeclaration::Import(import) = &program[0] else {
            panic!("expected an import");
        };
        assert_eq!(import.path, "utils.oomph");
        assert_eq!(import.name, "utils");
    }

    #[test]
    fn test_for_loop() {
        let source = "func main() -> void:\n    for let i = 0; i < 3; i = i + 1:\n        print_int(i)\n";
        let program = parse_file(source).unwrap();
        let ToplevelDeclaration::Func(funcdef) = &program[0] else {
            panic!("expected a function");
        };
        let Statement::Loop {
            init, cond, incr, ..
        } = &funcdef.body[0]
        else {
            panic!("expected a loop");
        };
        assert!(init.is_some());
        assert!(cond.is_some());
        assert!(incr.is_some());
    }

    #[test]
    fn test_switch_statement() {
        let source = "func main() -> void:\n    switch v:\n        case BoxInt:\n            pass\n        case BoxStr:\n            pass\n";
        let program = parse_file(source).unwrap();
        let ToplevelDeclaration::Func(funcdef) = &program[0] else {
            panic!("expected a function");
        };
        let Statement::Switch { varname, cases } = &funcdef.body[0] else {
            panic!("expected a switch");
        };
        assert_eq!(varname, "v");
        assert_eq!(cases.len(), 2);
    }

    #[test]
    fn test_elif_chain() {
        let source = "func main() -> void:\n    if a:\n        pass\n    elif b:\n        pass\n    else:\n        pass\n";
        let program = parse_file(source).unwrap();
        let ToplevelDeclaration::Func(funcdef) = &program[0] else {
            panic!("expected a function");
        };
        let Statement::If {
            ifs_and_elifs,
            else_block,
        } = &funcdef.body[0]
        else {
            panic!("expected an if");
        };
        assert_eq!(ifs_and_elifs.len(), 2);
        assert_eq!(else_block.len(), 1);
    }

    #[test]
    fn test_new_requires_call() {
        let source = "func main() -> void:\n    let x = new Foo\n";
        assert!(parse_file(source).is_err());
    }

    #[test]
    fn test_parse_error_reports_token() {
        let err = parse_file("func main() -> void:\n    let = 3\n").unwrap_err();
        assert!(err.contains("expected a name"), "{}", err);
    }
}
