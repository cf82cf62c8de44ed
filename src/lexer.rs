//! Lexical analysis: source text to a flat token sequence.
//!
//! The scanner is byte oriented (source is treated as ASCII), keeps 1-based
//! line/column positions, and matches operators longest-first so `**`, `//`,
//! `->` and the compound assignments win over their single-char prefixes.

use thiserror::Error;

use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("Invalid integer literal '{literal}' at line {line}, column {column}")]
    InvalidIntegerLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Invalid float literal '{literal}' at line {line}, column {column}")]
    InvalidFloatLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
}

pub type LexResult<T> = Result<T, LexError>;

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    last_was_newline: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
            last_was_newline: false,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        loop {
            self.skip_blanks();

            let span = Span::new(self.line, self.column);
            let start = self.pos;

            let Some(ch) = self.peek_char() else {
                return Ok(Token::new(TokenKind::Eof, "", span));
            };

            if ch == '\n' {
                self.consume_char();
                if self.last_was_newline {
                    // Consecutive newlines collapse into a single token.
                    continue;
                }
                self.last_was_newline = true;
                return Ok(Token::new(TokenKind::Newline, "\n", span));
            }

            self.last_was_newline = false;

            if ch == '"' {
                return self.read_string(start, span);
            }
            if ch.is_ascii_digit() {
                return self.read_number(start, span);
            }
            if ch.is_ascii_alphabetic() || ch == '_' {
                return Ok(self.read_identifier(start, span));
            }
            if let Some(token) = self.read_operator(start, span) {
                return Ok(token);
            }

            return Err(LexError::UnexpectedCharacter {
                character: ch,
                line: span.line,
                column: span.column,
            });
        }
    }

    /// Skip spaces, tabs, carriage returns, and `#` comments.
    fn skip_blanks(&mut self) {
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.consume_char();
                }
                Some('#') => {
                    self.consume_while(|c| c != '\n');
                }
                _ => break,
            }
        }
    }

    fn read_identifier(&mut self, start: usize, span: Span) -> Token<'a> {
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let lexeme = &self.input[start..self.pos];
        let kind = match lexeme {
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "pass" => TokenKind::Pass,
            "global" => TokenKind::Global,
            "local" => TokenKind::Local,
            "struct" => TokenKind::Struct,
            "enum" => TokenKind::Enum,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "int" => TokenKind::IntType,
            "int64" => TokenKind::Int64Type,
            "float32" => TokenKind::Float32Type,
            "float64" => TokenKind::Float64Type,
            "string" => TokenKind::StringType,
            "bool" => TokenKind::BoolType,
            "void" => TokenKind::VoidType,
            _ => TokenKind::Identifier(lexeme),
        };
        Token::new(kind, lexeme, span)
    }

    fn read_number(&mut self, start: usize, span: Span) -> LexResult<Token<'a>> {
        self.consume_while(|c| c.is_ascii_digit());

        // A dot only makes a float when digits follow it; `x.` stays an int.
        let is_float = self.peek_char() == Some('.')
            && self
                .char_at(self.pos + 1)
                .is_some_and(|c| c.is_ascii_digit());
        if is_float {
            self.consume_char();
            self.consume_while(|c| c.is_ascii_digit());
            let lexeme = &self.input[start..self.pos];
            let value = lexeme
                .parse::<f64>()
                .map_err(|_| LexError::InvalidFloatLiteral {
                    literal: lexeme.to_string(),
                    line: span.line,
                    column: span.column,
                })?;
            return Ok(Token::new(TokenKind::Float(value), lexeme, span));
        }

        let lexeme = &self.input[start..self.pos];
        let value = lexeme
            .parse::<i64>()
            .map_err(|_| LexError::InvalidIntegerLiteral {
                literal: lexeme.to_string(),
                line: span.line,
                column: span.column,
            })?;
        Ok(Token::new(TokenKind::Integer(value), lexeme, span))
    }

    fn read_string(&mut self, start: usize, span: Span) -> LexResult<Token<'a>> {
        self.consume_char(); // opening quote
        let mut value = String::new();

        loop {
            match self.peek_char() {
                Some('"') => {
                    self.consume_char();
                    let lexeme = &self.input[start..self.pos];
                    return Ok(Token::new(TokenKind::Str(value), lexeme, span));
                }
                Some('\\') => {
                    self.consume_char();
                    match self.consume_char() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('\\') => value.push('\\'),
                        Some('"') => value.push('"'),
                        Some('0') => value.push('\0'),
                        Some(other) => value.push(other),
                        None => {
                            return Err(LexError::UnterminatedString {
                                line: span.line,
                                column: span.column,
                            });
                        }
                    }
                }
                Some('\n') | None => {
                    return Err(LexError::UnterminatedString {
                        line: span.line,
                        column: span.column,
                    });
                }
                Some(other) => {
                    value.push(other);
                    self.consume_char();
                }
            }
        }
    }

    fn read_operator(&mut self, start: usize, span: Span) -> Option<Token<'a>> {
        let two = self.input.get(self.pos..self.pos + 2).unwrap_or("");
        let kind = match two {
            "**" => Some(TokenKind::Power),
            "//" => Some(TokenKind::FloorDiv),
            "==" => Some(TokenKind::Eq),
            "!=" => Some(TokenKind::Ne),
            "<=" => Some(TokenKind::Le),
            ">=" => Some(TokenKind::Ge),
            "+=" => Some(TokenKind::PlusAssign),
            "-=" => Some(TokenKind::MinusAssign),
            "*=" => Some(TokenKind::StarAssign),
            "/=" => Some(TokenKind::SlashAssign),
            "%=" => Some(TokenKind::PercentAssign),
            "->" => Some(TokenKind::Arrow),
            "=>" => Some(TokenKind::FatArrow),
            _ => None,
        };
        if let Some(kind) = kind {
            self.consume_char();
            self.consume_char();
            return Some(Token::new(kind, &self.input[start..self.pos], span));
        }

        let kind = match self.peek_char()? {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => TokenKind::Assign,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            _ => return None,
        };
        self.consume_char();
        Some(Token::new(kind, &self.input[start..self.pos], span))
    }

    fn consume_while<P>(&mut self, keep_predicate: P) -> usize
    where
        P: Fn(char) -> bool,
    {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !keep_predicate(c) {
                break;
            }
            self.consume_char();
        }
        self.pos - start
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.input[index..].chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        if self.pos >= self.input.len() {
            None
        } else {
            self.char_at(self.pos)
        }
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(token) => Some(Ok(token)),
            Err(e) => Some(Err(e)),
        }
    }
}

pub fn tokenize<'a>(input: &'a str) -> LexResult<Vec<Token<'a>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::Eof);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}
