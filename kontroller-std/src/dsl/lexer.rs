//! Scanner for configuration scripts.

use kontroller_core::ConfigError;
use std::{iter::Peekable, str::Chars};

/// Token types of the configuration language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Semicolon,

    // Literals
    Str(String),
    Identifier(String),
    Null,
    True,
    False,

    Eof,
}

impl TokenKind {
    /// How the token reads in an error message.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::LeftParen => "'('".into(),
            TokenKind::RightParen => "')'".into(),
            TokenKind::LeftBracket => "'['".into(),
            TokenKind::RightBracket => "']'".into(),
            TokenKind::LeftBrace => "'{'".into(),
            TokenKind::RightBrace => "'}'".into(),
            TokenKind::Comma => "','".into(),
            TokenKind::Colon => "':'".into(),
            TokenKind::Semicolon => "';'".into(),
            TokenKind::Str(s) => format!("string {s:?}"),
            TokenKind::Identifier(name) => format!("identifier {name}"),
            TokenKind::Null => "null".into(),
            TokenKind::True => "true".into(),
            TokenKind::False => "false".into(),
            TokenKind::Eof => "end of input".into(),
        }
    }
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Turns script source into tokens.
pub struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scan the whole source. The last token is always [`TokenKind::Eof`].
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, ConfigError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.scan_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    fn scan_token(&mut self) -> Result<Token, ConfigError> {
        self.skip_whitespace_and_comments();
        self.start_line = self.line;
        self.start_column = self.column;

        let Some(c) = self.advance() else {
            return Ok(self.make_token(TokenKind::Eof));
        };

        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '\'' | '"' => TokenKind::Str(self.string(c)?),
            c if c.is_alphabetic() || c == '_' || c == '$' => self.identifier(c),
            other => return Err(self.error(format!("unexpected character {other:?}"))),
        };
        Ok(self.make_token(kind))
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.advance();
                }
                '#' => self.skip_line(),
                '/' => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.next() != Some('/') {
                        return;
                    }
                    self.skip_line();
                }
                _ => return,
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                return;
            }
            self.advance();
        }
    }

    fn string(&mut self, quote: char) -> Result<String, ConfigError> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return Err(self.error("unterminated string".into())),
                Some(c) if c == quote => return Ok(value),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c @ ('\\' | '\'' | '"')) => value.push(c),
                    Some(other) => {
                        return Err(self.error(format!("unknown escape \\{other}")));
                    }
                    None => return Err(self.error("unterminated string".into())),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::from(first);
        while let Some(c) = self.peek() {
            if !(c.is_alphanumeric() || c == '_' || c == '$') {
                break;
            }
            name.push(c);
            self.advance();
        }
        match name.as_str() {
            "null" => TokenKind::Null,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Identifier(name),
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            line: self.start_line,
            column: self.start_column,
        }
    }

    fn error(&self, message: String) -> ConfigError {
        ConfigError::Syntax {
            line: self.start_line,
            column: self.start_column,
            message,
        }
    }
}
