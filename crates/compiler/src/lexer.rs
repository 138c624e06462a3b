//! Lexer for oomph source
//!
//! A longest-match scanner over a fixed token vocabulary, followed by a small
//! pipeline of token-stream passes:
//!
//! 1. raw scan (regex alternation, one named group per token kind)
//! 2. drop newlines and indentation inside `(...)` and `[...]`
//! 3. fuse `not in` into a single keyword
//! 4. newline cleanup
//! 5. block synthesis: `":" newline indent` becomes `begin_block`, dedents
//!    become `end_block`
//! 6. newline cleanup again
//!
//! Indentation is exactly four spaces per level; tabs never match a token and
//! are reported as lex errors.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Int,
    Float,
    OnelineString,
    MultilineString,
    Op,
    Indent,
    BeginBlock,
    EndBlock,
}

/// A token. `lineno` is `Some` only for the identifier `assert`, which is the
/// one token that carries source position into later stages (the emitter
/// needs the line for runtime assertion messages).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub lineno: Option<usize>,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Token {
            kind,
            value: value.into(),
            lineno: None,
        }
    }

    pub fn is(&self, kind: TokenKind, value: &str) -> bool {
        self.kind == kind && self.value == value
    }

    fn is_newline(&self) -> bool {
        self.is(TokenKind::Op, "\n")
    }
}

const KEYWORDS: &str = "and|as|auto|break|case|class|continue|elif|else|export|foreach|for|func|\
                        generic|if|import|in|let|meth|mod|new|not|of|or|pass|return|switch|\
                        typedef|while";

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        "(?P<keyword>\\b(?:{KEYWORDS})\\b)\
        |(?P<identifier>[A-Za-z_][A-Za-z0-9_]*)\
        |(?P<float>(?:[1-9][0-9]*|0)\\.[0-9]+)\
        |(?P<int>[1-9][0-9]*|0)\
        |(?P<multiline_string>\"\"\"(?:[^{{}}\\\\]|\\\\[{{}}t\\\\]|\\{{[^{{}}\\n\\\\]*\\}})*?\"\"\")\
        |(?P<oneline_string>\"(?:[^{{}}\"\\n\\\\]|\\\\[{{}}\"nt\\\\]|\\{{[^{{}}\"\\n\\\\]*\\}})*\")\
        |(?P<op>==|!=|<=|>=|->|[<>=|+*/()\\[\\]\\n.,:;-])\
        |(?P<sp> +)\
        |(?P<comment>#[^\\n]*)\
        |(?P<error>(?s:.{{1,15}}))"
    );
    Regex::new(&pattern).expect("token regex is valid")
});

/// Scan the source into raw tokens. Comments and interior spaces are dropped
/// here; a run of spaces at the start of a line becomes an `Indent` token.
fn raw_tokenize(code: &str) -> Result<Vec<Token>, String> {
    let mut code = code.to_string();
    if !code.ends_with('\n') {
        code.push('\n');
    }

    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < code.len() {
        let captures = TOKEN_REGEX
            .captures_at(&code, pos)
            .expect("every byte matches some token branch");
        let matched = captures.get(0).unwrap();
        debug_assert_eq!(matched.start(), pos);
        let value = matched.as_str();

        if captures.name("keyword").is_some() {
            tokens.push(Token::new(TokenKind::Keyword, value));
        } else if captures.name("identifier").is_some() {
            let mut token = Token::new(TokenKind::Identifier, value);
            if value == "assert" {
                token.lineno = Some(code[..pos].matches('\n').count() + 1);
            }
            tokens.push(token);
        } else if captures.name("float").is_some() {
            tokens.push(Token::new(TokenKind::Float, value));
        } else if captures.name("int").is_some() {
            tokens.push(Token::new(TokenKind::Int, value));
        } else if captures.name("multiline_string").is_some() {
            tokens.push(Token::new(TokenKind::MultilineString, value));
        } else if captures.name("oneline_string").is_some() {
            tokens.push(Token::new(TokenKind::OnelineString, value));
        } else if captures.name("op").is_some() {
            tokens.push(Token::new(TokenKind::Op, value));
        } else if captures.name("sp").is_some() {
            let after_newline = pos > 0 && code.as_bytes()[pos - 1] == b'\n';
            let next = code.as_bytes().get(matched.end()).copied();
            if pos == 0 {
                return Err("unexpected indentation at the start of the file".to_string());
            }
            if after_newline && !matches!(next, Some(b' ') | Some(b'#') | Some(b'\n') | None) {
                tokens.push(Token::new(TokenKind::Indent, value));
            }
            // Interior spaces, and indentation of blank or comment-only
            // lines, are discarded.
        } else if captures.name("comment").is_some() {
            // discarded
        } else {
            return Err(format!("invalid syntax: {:?}", value));
        }
        pos = matched.end();
    }
    Ok(tokens)
}

/// Drop newlines and indentation inside brackets, and check bracket balance.
fn ignore_whitespace_in_parens(tokens: Vec<Token>) -> Result<Vec<Token>, String> {
    let mut result = Vec::new();
    let mut paren_stack: Vec<&str> = Vec::new();
    for token in tokens {
        if token.is(TokenKind::Op, "(") {
            paren_stack.push(")");
        } else if token.is(TokenKind::Op, "[") {
            paren_stack.push("]");
        } else if token.is(TokenKind::Op, ")") || token.is(TokenKind::Op, "]") {
            match paren_stack.pop() {
                Some(expected) if token.value == expected => {}
                _ => return Err(format!("unbalanced '{}'", token.value)),
            }
        }

        let is_whitespace = token.is_newline() || token.kind == TokenKind::Indent;
        if !(is_whitespace && !paren_stack.is_empty()) {
            result.push(token);
        }
    }
    if !paren_stack.is_empty() {
        return Err("unbalanced brackets at end of file".to_string());
    }
    Ok(result)
}

/// Fuse the keyword sequence `not in` into a single `not in` keyword token.
fn combine_not_in(tokens: Vec<Token>) -> Vec<Token> {
    let mut result: Vec<Token> = Vec::new();
    for token in tokens {
        if token.is(TokenKind::Keyword, "in")
            && result.last().is_some_and(|t| t.is(TokenKind::Keyword, "not"))
        {
            result.pop();
            result.push(Token::new(TokenKind::Keyword, "not in"));
        } else {
            result.push(token);
        }
    }
    result
}

/// Drop leading newlines and collapse newline runs, including a newline right
/// after `begin_block` or `end_block`.
fn clean_newlines(tokens: Vec<Token>) -> Vec<Token> {
    let mut result: Vec<Token> = Vec::new();
    for token in tokens {
        if token.is_newline() {
            match result.last() {
                None => continue,
                Some(previous)
                    if previous.is_newline()
                        || previous.kind == TokenKind::BeginBlock
                        || previous.kind == TokenKind::EndBlock =>
                {
                    continue;
                }
                _ => {}
            }
        }
        result.push(token);
    }
    result
}

/// Replace `":" newline indent` with `begin_block` and emit `end_block`
/// tokens whenever the indentation level decreases.
fn find_blocks(tokens: Vec<Token>) -> Result<Vec<Token>, String> {
    let mut result = Vec::new();
    let mut indent_level: usize = 0;
    let mut i = 0;
    while i < tokens.len() {
        if i + 2 < tokens.len()
            && tokens[i].is(TokenKind::Op, ":")
            && tokens[i + 1].is_newline()
            && tokens[i + 2].kind == TokenKind::Indent
        {
            let expected = 4 * (indent_level + 1);
            if tokens[i + 2].value.len() != expected {
                return Err(format!(
                    "expected {} spaces of indentation, got {}",
                    expected,
                    tokens[i + 2].value.len()
                ));
            }
            indent_level += 1;
            result.push(Token::new(TokenKind::BeginBlock, ":"));
            i += 3;
            continue;
        }

        result.push(tokens[i].clone());

        if tokens[i].is_newline() {
            let new_level = if let Some(indent) = tokens.get(i + 1).filter(|t| t.kind == TokenKind::Indent)
            {
                if indent.value.len() % 4 != 0 {
                    return Err(format!(
                        "indentation must be a multiple of 4 spaces, got {}",
                        indent.value.len()
                    ));
                }
                i += 1; // the indent token is consumed here
                indent.value.len() / 4
            } else {
                0
            };
            if new_level > indent_level {
                return Err("unexpected indentation".to_string());
            }
            while indent_level != new_level {
                result.push(Token::new(TokenKind::EndBlock, ""));
                indent_level -= 1;
            }
        }
        i += 1;
    }
    Ok(result)
}

/// Tokenize a whole source file.
pub fn tokenize(code: &str) -> Result<Vec<Token>, String> {
    let tokens = raw_tokenize(code)?;
    let tokens = ignore_whitespace_in_parens(tokens)?;
    let tokens = combine_not_in(tokens);
    let tokens = clean_newlines(tokens);
    let tokens = find_blocks(tokens)?;
    Ok(clean_newlines(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_values(code: &str) -> Vec<(TokenKind, String)> {
        tokenize(code)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.value))
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        let tokens = kinds_and_values("let x = 1 + 2.5\n");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Keyword, "let".to_string()),
                (TokenKind::Identifier, "x".to_string()),
                (TokenKind::Op, "=".to_string()),
                (TokenKind::Int, "1".to_string()),
                (TokenKind::Op, "+".to_string()),
                (TokenKind::Float, "2.5".to_string()),
                (TokenKind::Op, "\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_trailing_newline_is_added() {
        assert_eq!(kinds_and_values("pass"), kinds_and_values("pass\n"));
    }

    #[test]
    fn test_comments_are_dropped() {
        assert_eq!(
            kinds_and_values("pass  # a comment\n"),
            kinds_and_values("pass\n")
        );
    }

    #[test]
    fn test_block_synthesis() {
        let tokens = kinds_and_values("func f():\n    pass\n");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Keyword, "func".to_string()),
                (TokenKind::Identifier, "f".to_string()),
                (TokenKind::Op, "(".to_string()),
                (TokenKind::Op, ")".to_string()),
                (TokenKind::BeginBlock, ":".to_string()),
                (TokenKind::Keyword, "pass".to_string()),
                (TokenKind::Op, "\n".to_string()),
                (TokenKind::EndBlock, "".to_string()),
            ]
        );
    }

    #[test]
    fn test_nested_blocks() {
        let code = "func f():\n    if x:\n        pass\n    pass\n";
        let kinds: Vec<TokenKind> = tokenize(code).unwrap().iter().map(|t| t.kind).collect();
        let begins = kinds.iter().filter(|k| **k == TokenKind::BeginBlock).count();
        let ends = kinds.iter().filter(|k| **k == TokenKind::EndBlock).count();
        assert_eq!(begins, 2);
        assert_eq!(ends, 2);
    }

    #[test]
    fn test_bad_indent_width() {
        let err = tokenize("func f():\n   pass\n").unwrap_err();
        assert!(err.contains("expected 4 spaces"), "{}", err);
        let err = tokenize("func f():\n      pass\n").unwrap_err();
        assert!(err.contains("expected 4 spaces"), "{}", err);
    }

    #[test]
    fn test_tab_is_a_lex_error() {
        let err = tokenize("func f():\n\tpass\n").unwrap_err();
        assert!(err.contains("invalid syntax"), "{}", err);
    }

    #[test]
    fn test_newlines_ignored_inside_parens() {
        let with_newlines = kinds_and_values("f(\n    1,\n    2,\n)\n");
        let without = kinds_and_values("f(1, 2,)\n");
        assert_eq!(with_newlines, without);
    }

    #[test]
    fn test_bracket_mismatch_is_fatal() {
        assert!(tokenize("f(1]\n").is_err());
        assert!(tokenize("f(1\n").is_err());
        assert!(tokenize("f 1)\n").is_err());
    }

    #[test]
    fn test_not_in_is_fused() {
        let tokens = tokenize("a not in b\n").unwrap();
        assert!(tokens.iter().any(|t| t.is(TokenKind::Keyword, "not in")));
        assert!(!tokens.iter().any(|t| t.is(TokenKind::Keyword, "not")));
    }

    #[test]
    fn test_assert_carries_line_number() {
        let tokens = tokenize("pass\npass\nassert(x)\n").unwrap();
        let assert_token = tokens
            .iter()
            .find(|t| t.value == "assert")
            .expect("assert token");
        assert_eq!(assert_token.lineno, Some(3));
    }

    #[test]
    fn test_blank_lines_collapse() {
        assert_eq!(
            kinds_and_values("\n\npass\n\n\npass\n"),
            kinds_and_values("pass\npass\n")
        );
    }

    #[test]
    fn test_string_with_braces() {
        let tokens = tokenize("\"hello {name}\"\n").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::OnelineString);
        assert_eq!(tokens[0].value, "\"hello {name}\"");
    }

    #[test]
    fn test_multiline_string() {
        let tokens = tokenize("\"\"\"two\nlines\"\"\"\n").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::MultilineString);
        assert!(tokens[0].value.contains('\n'));
    }

    #[test]
    fn test_operators() {
        let tokens = kinds_and_values("a == b != c <= d >= e -> f\n");
        let ops: Vec<&str> = tokens
            .iter()
            .filter(|(k, _)| *k == TokenKind::Op)
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(ops, vec!["==", "!=", "<=", ">=", "->", "\n"]);
    }
}
