//! Parser for configuration scripts.
//!
//! A script is a flat list of calls:
//!
//! ```text
//! script    := (call ';'?)*
//! call      := IDENT '(' (argument (',' argument)* ','?)? ')'
//! argument  := STRING | IDENT | 'null' | 'true' | 'false' | list | object
//! list      := '[' (argument (',' argument)* ','?)? ']'
//! object    := '{' (key ':' argument (',' key ':' argument)* ','?)? '}'
//! key       := IDENT | STRING
//! ```

use super::lexer::{Scanner, Token, TokenKind};
use kontroller_core::ConfigError;

type ParseResult<T> = Result<T, ConfigError>;

/// One statement of a configuration script.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// The called name.
    pub callee: String,
    /// Arguments in order.
    pub args: Vec<Expr>,
    /// 1-based line of the callee.
    pub line: usize,
}

/// An argument expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A string literal.
    Str(String),
    /// A name to resolve against the namespaces.
    Identifier {
        /// The name.
        name: String,
        /// 1-based line.
        line: usize,
    },
    /// `[a, b]`
    List(Vec<Expr>),
    /// `{key: value}`, keys in source order.
    Object(Vec<(String, Expr)>),
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
}

impl Expr {
    /// A short description for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Expr::Str(_) => "a string",
            Expr::Identifier { .. } => "an identifier",
            Expr::List(_) => "a list",
            Expr::Object(_) => "an object",
            Expr::Null => "null",
            Expr::Bool(_) => "a boolean",
        }
    }
}

/// Parse script source into calls.
pub fn parse(source: &str) -> Result<Vec<Call>, ConfigError> {
    let tokens = Scanner::new(source).scan_tokens()?;
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse(&mut self) -> ParseResult<Vec<Call>> {
        let mut calls = Vec::new();
        while !self.is_at_end() {
            if self.match_token(&TokenKind::Semicolon) {
                continue;
            }
            calls.push(self.call()?);
        }
        Ok(calls)
    }

    // ===== Token manipulation =====

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.current.min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, context: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {} {context}", kind.describe())))
        }
    }

    fn error(&self, message: String) -> ConfigError {
        let token = self.peek();
        ConfigError::Syntax {
            line: token.line,
            column: token.column,
            message: format!("{message}, found {}", token.kind.describe()),
        }
    }

    // ===== Grammar =====

    fn call(&mut self) -> ParseResult<Call> {
        let token = self.peek().clone();
        let TokenKind::Identifier(callee) = token.kind else {
            return Err(self.error("expected a call".into()));
        };
        self.advance();
        self.expect(&TokenKind::LeftParen, &format!("after {callee}"))?;
        let args = self.sequence(&TokenKind::RightParen, Self::argument)?;
        Ok(Call {
            callee,
            args,
            line: token.line,
        })
    }

    /// Comma-separated items up to `close`, trailing comma allowed.
    fn sequence<T>(
        &mut self,
        close: &TokenKind,
        mut item: impl FnMut(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<Vec<T>> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(item(self)?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close, "to close the list")?;
        Ok(items)
    }

    fn argument(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        if !matches!(
            token.kind,
            TokenKind::Str(_)
                | TokenKind::Identifier(_)
                | TokenKind::Null
                | TokenKind::True
                | TokenKind::False
                | TokenKind::LeftBracket
                | TokenKind::LeftBrace
        ) {
            return Err(self.error("expected an argument".into()));
        }
        self.advance();

        let expr = match token.kind {
            TokenKind::Str(value) => Expr::Str(value),
            TokenKind::Identifier(name) => Expr::Identifier {
                name,
                line: token.line,
            },
            TokenKind::Null => Expr::Null,
            TokenKind::True => Expr::Bool(true),
            TokenKind::False => Expr::Bool(false),
            TokenKind::LeftBracket => {
                Expr::List(self.sequence(&TokenKind::RightBracket, Self::argument)?)
            }
            _ => Expr::Object(self.sequence(&TokenKind::RightBrace, Self::entry)?),
        };
        Ok(expr)
    }

    fn entry(&mut self) -> ParseResult<(String, Expr)> {
        let key = match &self.peek().kind {
            TokenKind::Identifier(key) | TokenKind::Str(key) => key.clone(),
            _ => return Err(self.error("expected an object key".into())),
        };
        self.advance();
        self.expect(&TokenKind::Colon, &format!("after key {key}"))?;
        Ok((key, self.argument()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, line: usize) -> Expr {
        Expr::Identifier {
            name: name.into(),
            line,
        }
    }

    #[test]
    fn test_parse_script() {
        let calls = parse(
            "load('application')\n\
             before('load post', load_post, {only: ['show', 'edit'], except: null,});\n\
             layout(false)",
        )
        .unwrap();

        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].callee, "load");
        assert_eq!(calls[0].args, vec![Expr::Str("application".into())]);
        assert_eq!(calls[1].line, 2);
        assert_eq!(
            calls[1].args,
            vec![
                Expr::Str("load post".into()),
                ident("load_post", 2),
                Expr::Object(vec![
                    (
                        "only".into(),
                        Expr::List(vec![Expr::Str("show".into()), Expr::Str("edit".into())])
                    ),
                    ("except".into(), Expr::Null),
                ]),
            ]
        );
        assert_eq!(calls[2].args, vec![Expr::Bool(false)]);
    }

    #[test]
    fn test_empty_call_and_stray_semicolons() {
        let calls = parse(";; seed_defaults();;").unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].args.is_empty());
    }

    #[test]
    fn test_missing_paren() {
        let err = parse("action(index").unwrap_err();
        assert_eq!(
            err.to_string(),
            "syntax error at line 1, column 13: expected ')' to close the list, found end of input"
        );
    }

    #[test]
    fn test_statement_must_be_call() {
        let err = parse("'index'").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { line: 1, column: 1, .. }));
    }

    #[test]
    fn test_object_needs_colon() {
        let err = parse("before(auth, {only 'x'})").unwrap_err();
        assert!(err.to_string().contains("expected ':' after key only"));
    }
}
