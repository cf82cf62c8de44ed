//! Syntactic analysis: token sequence to AST.
//!
//! A hand-written recursive-descent parser with single-token lookahead. The
//! ambiguous declaration forms (`a = 5`, `int a = 5`, `a int = 5`,
//! `a = int 5`) are resolved by attempting a declaration parse and rewinding
//! the cursor on failure; a leading `(` commits to tuple assignment only
//! after the closing parenthesis is followed by `=`.

use thiserror::Error;

use crate::ast::{
    BinaryOp, Expression, FnBody, Param, Program, Statement, Type, TypeKind, UnaryOp,
};
use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Expected {expected}, got {found} at line {line}, column {column}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("Invalid variable declaration at line {line}, column {column}")]
    InvalidDeclaration { line: usize, column: usize },
    #[error("Assignment target must be an identifier at line {line}, column {column}")]
    InvalidAssignTarget { line: usize, column: usize },
    #[error(
        "Tuple assignment arity mismatch: {targets} targets but {values} values at line {line}, column {column}"
    )]
    TupleArityMismatch {
        targets: usize,
        values: usize,
        line: usize,
        column: usize,
    },
    #[error("Compound assignment is only supported for simple variables at line {line}, column {column}")]
    CompoundAssignTarget { line: usize, column: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    current: Token<'a>,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::new(TokenKind::Eof, "", Span::default()));
        }
        let current = tokens[0].clone();
        Self {
            tokens,
            pos: 0,
            current,
            errors: Vec::new(),
        }
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !matches!(self.current.kind, TokenKind::Eof) {
            if self.consume_separators() {
                continue;
            }
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(error) => {
                    // Record, resynchronize to a statement boundary, keep
                    // going so later errors are still detected; the first
                    // one fails the parse below.
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }
        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0));
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        if matches!(self.current.kind, TokenKind::Identifier("fn"))
            && matches!(self.peek_kind(), TokenKind::Identifier(_))
        {
            self.advance();
            return self.parse_function_declaration();
        }

        match self.current.kind {
            TokenKind::LParen => self.parse_tuple_assignment_or_expression(),
            TokenKind::Global => self.parse_name_list(Statement::Global),
            TokenKind::Local => self.parse_name_list(Statement::Local),
            TokenKind::Struct => self.parse_struct_declaration(),
            TokenKind::Enum => self.parse_enum_declaration(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for_in(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                self.advance();
                self.consume_terminator();
                Ok(Statement::Break)
            }
            TokenKind::Continue => {
                self.advance();
                self.consume_terminator();
                Ok(Statement::Continue)
            }
            TokenKind::Pass => {
                self.advance();
                self.consume_terminator();
                Ok(Statement::Pass)
            }
            TokenKind::LBrace => self.parse_block(),
            _ => self.parse_declaration_or_expression(),
        }
    }

    fn parse_function_declaration(&mut self) -> ParseResult<Statement> {
        let name = self.expect_identifier("function name")?;
        self.expect(TokenKind::LParen, "'(' after function name")?;

        let mut params = Vec::new();
        if !matches!(self.current.kind, TokenKind::RParen) {
            loop {
                let param_name = self.expect_identifier("parameter name")?;
                let (ty, explicit_type) = if matches!(self.current.kind, TokenKind::Colon) {
                    self.advance();
                    (self.parse_type()?, true)
                } else if self.current.kind.is_type_keyword()
                    || matches!(self.current.kind, TokenKind::Identifier(_))
                {
                    (self.parse_type()?, true)
                } else {
                    (Type::default(), false)
                };
                params.push(Param {
                    name: param_name,
                    ty,
                    explicit_type,
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' after parameters")?;

        let return_type = if self.eat(TokenKind::Arrow) {
            self.parse_type()?
        } else {
            Type::new(TypeKind::Void)
        };

        let body = if self.eat(TokenKind::FatArrow) {
            if matches!(self.current.kind, TokenKind::If) {
                // `=> if c { a } else { b }` bodies lower through the
                // statement path; each branch leaves its value in place.
                let conditional = self.parse_if()?;
                FnBody::Block(vec![conditional])
            } else {
                let expression = self.parse_expression()?;
                self.consume_terminator();
                FnBody::Expression(Box::new(expression))
            }
        } else if matches!(self.current.kind, TokenKind::LBrace) {
            match self.parse_block()? {
                Statement::Block(statements) => FnBody::Block(statements),
                _ => unreachable!("parse_block always yields Statement::Block"),
            }
        } else {
            return Err(self.error("'{' or '=>' for function body"));
        };

        Ok(Statement::FnDecl {
            name,
            params,
            return_type,
            body,
        })
    }

    fn parse_declaration_or_expression(&mut self) -> ParseResult<Statement> {
        let saved = self.pos;
        match self.parse_variable_declaration() {
            Ok(statement) => Ok(statement),
            Err(_) => {
                self.rewind(saved);
                let expression = self.parse_expression()?;
                self.consume_terminator();
                Ok(Statement::Expr(expression))
            }
        }
    }

    /// The four declaration forms plus compound-assignment desugaring.
    fn parse_variable_declaration(&mut self) -> ParseResult<Statement> {
        let first = self.advance();

        if let TokenKind::Identifier(name) = &first.kind {
            let name = name.to_string();

            if self.current.kind == TokenKind::Assign {
                self.advance();
                if self.current.kind.is_type_keyword() {
                    // a = int 5
                    let ty = self.parse_type()?;
                    let init = self.parse_expression()?;
                    self.consume_terminator();
                    return Ok(Statement::VarDecl {
                        name,
                        ty,
                        init: Some(init),
                        explicit_type: true,
                    });
                }
                // a = 5
                let init = self.parse_expression()?;
                self.consume_terminator();
                return Ok(Statement::VarDecl {
                    name,
                    ty: Type::default(),
                    init: Some(init),
                    explicit_type: false,
                });
            }

            if self.current.kind.is_compound_assign() {
                // a += 5 desugars to a = a + 5
                let op = match self.current.kind {
                    TokenKind::PlusAssign => BinaryOp::Add,
                    TokenKind::MinusAssign => BinaryOp::Sub,
                    TokenKind::StarAssign => BinaryOp::Mul,
                    TokenKind::SlashAssign => BinaryOp::Div,
                    _ => BinaryOp::Mod,
                };
                self.advance();
                let right = self.parse_expression()?;
                self.consume_terminator();
                let desugared = Expression::Binary {
                    op,
                    left: Box::new(Expression::Identifier(name.clone())),
                    right: Box::new(right),
                };
                return Ok(Statement::VarDecl {
                    name,
                    ty: Type::default(),
                    init: Some(desugared),
                    explicit_type: false,
                });
            }

            if self.current.kind.is_type_keyword() {
                // a int = 5
                let ty = self.parse_type()?;
                self.expect(TokenKind::Assign, "'=' after type in variable declaration")?;
                let init = self.parse_expression()?;
                self.consume_terminator();
                return Ok(Statement::VarDecl {
                    name,
                    ty,
                    init: Some(init),
                    explicit_type: true,
                });
            }
        } else if first.kind.is_type_keyword() {
            // int a = 5
            let ty = type_for_keyword(&first.kind);
            let name = self.expect_identifier("variable name after type")?;
            self.expect(TokenKind::Assign, "'=' in variable declaration")?;
            let init = self.parse_expression()?;
            self.consume_terminator();
            return Ok(Statement::VarDecl {
                name,
                ty,
                init: Some(init),
                explicit_type: true,
            });
        }

        Err(ParseError::InvalidDeclaration {
            line: first.span.line,
            column: first.span.column,
        })
    }

    fn parse_tuple_assignment_or_expression(&mut self) -> ParseResult<Statement> {
        let span = self.current.span;
        let left = self.parse_expression()?;

        if self.current.kind == TokenKind::Assign {
            self.advance();
            let targets = assignment_targets(left, span)?;
            let values = match self.parse_expression()? {
                Expression::Tuple(elements) => elements,
                single => vec![single],
            };
            if targets.len() != values.len() {
                return Err(ParseError::TupleArityMismatch {
                    targets: targets.len(),
                    values: values.len(),
                    line: span.line,
                    column: span.column,
                });
            }
            self.consume_terminator();
            return Ok(Statement::TupleAssign { targets, values });
        }

        if self.current.kind.is_compound_assign() {
            return Err(ParseError::CompoundAssignTarget {
                line: span.line,
                column: span.column,
            });
        }

        self.consume_terminator();
        Ok(Statement::Expr(left))
    }

    fn parse_struct_declaration(&mut self) -> ParseResult<Statement> {
        self.advance(); // struct
        let name = self.expect_identifier("struct name")?;
        self.expect(TokenKind::LBrace, "'{' after struct name")?;

        let mut fields = Vec::new();
        while !matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof) {
            if self.consume_separators() {
                continue;
            }
            let field_name = self.expect_identifier("field name")?;
            let field_type = self.parse_type()?;
            fields.push((field_name, field_type));
        }
        self.expect(TokenKind::RBrace, "'}' after struct fields")?;
        Ok(Statement::StructDecl { name, fields })
    }

    fn parse_enum_declaration(&mut self) -> ParseResult<Statement> {
        self.advance(); // enum
        let name = self.expect_identifier("enum name")?;
        self.expect(TokenKind::LBrace, "'{' after enum name")?;

        let mut values = Vec::new();
        let mut next_value = 0i64;
        while !matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof) {
            if self.consume_separators() || self.eat(TokenKind::Comma) {
                continue;
            }
            let value_name = self.expect_identifier("enum value name")?;
            if self.eat(TokenKind::Assign) {
                match self.current.kind {
                    TokenKind::Integer(value) => {
                        next_value = value;
                        self.advance();
                    }
                    _ => return Err(self.error("integer value")),
                }
            }
            values.push((value_name, next_value));
            next_value += 1;
        }
        self.expect(TokenKind::RBrace, "'}' after enum values")?;
        Ok(Statement::EnumDecl { name, values })
    }

    fn parse_name_list(
        &mut self,
        build: impl FnOnce(Vec<String>) -> Statement,
    ) -> ParseResult<Statement> {
        self.advance(); // global / local
        let mut names = vec![self.expect_identifier("variable name")?];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect_identifier("variable name")?);
        }
        self.consume_terminator();
        Ok(build(names))
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        self.advance(); // if
        let condition = self.parse_expression()?;
        let then_branch = Box::new(self.parse_statement()?);

        // Collect elif arms iteratively, then fold back-to-front into
        // nested If nodes so parser depth stays flat on long chains.
        let mut arms = Vec::new();
        while self.at_branch_keyword(TokenKind::Elif) {
            self.advance();
            let arm_condition = self.parse_expression()?;
            let arm_branch = self.parse_statement()?;
            arms.push((arm_condition, arm_branch));
        }

        let mut else_branch = if self.at_branch_keyword(TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        for (arm_condition, arm_branch) in arms.into_iter().rev() {
            else_branch = Some(Box::new(Statement::If {
                condition: arm_condition,
                then_branch: Box::new(arm_branch),
                else_branch,
            }));
        }

        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    /// True when `kind` is next, looking through a single collapsed newline
    /// (`}` newline `elif` is as common as `} elif`).
    fn at_branch_keyword(&mut self, kind: TokenKind<'static>) -> bool {
        if self.current.kind == kind {
            return true;
        }
        if matches!(self.current.kind, TokenKind::Newline) && self.peek_kind() == kind {
            self.advance();
            return true;
        }
        false
    }

    fn parse_while(&mut self) -> ParseResult<Statement> {
        self.advance(); // while
        let condition = self.parse_expression()?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::While { condition, body })
    }

    fn parse_for_in(&mut self) -> ParseResult<Statement> {
        self.advance(); // for
        let variable = self.expect_identifier("variable name after 'for'")?;
        self.expect(TokenKind::In, "'in' after loop variable")?;
        let iterable = self.parse_expression()?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::ForIn {
            variable,
            iterable,
            body,
        })
    }

    fn parse_return(&mut self) -> ParseResult<Statement> {
        self.advance(); // return
        if matches!(
            self.current.kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
        ) {
            self.consume_terminator();
            return Ok(Statement::Return(None));
        }
        let value = self.parse_expression()?;
        self.consume_terminator();
        Ok(Statement::Return(Some(value)))
    }

    fn parse_block(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut statements = Vec::new();
        while !matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof) {
            if self.consume_separators() {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace, "'}' after block")?;
        Ok(Statement::Block(statements))
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_and()?;
        while self.eat(TokenKind::Or) {
            let right = self.parse_and()?;
            expr = binary(BinaryOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_equality()?;
        while self.eat(TokenKind::And) {
            let right = self.parse_equality()?;
            expr = binary(BinaryOp::And, expr, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_power()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                TokenKind::FloorDiv => BinaryOp::FloorDiv,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_power(&mut self) -> ParseResult<Expression> {
        let expr = self.parse_unary()?;
        if self.eat(TokenKind::Power) {
            // Right-associative: a ** b ** c parses as a ** (b ** c).
            let right = self.parse_power()?;
            return Ok(binary(BinaryOp::Power, expr, right));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let op = match self.current.kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expression::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(TokenKind::LParen) {
                let Expression::Identifier(name) = expr else {
                    return Err(self.error("identifier before call arguments"));
                };
                let mut args = Vec::new();
                if !matches!(self.current.kind, TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "')' after arguments")?;
                expr = Expression::Call { name, args };
            } else if self.eat(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.expect(TokenKind::RBracket, "']' after index")?;
                expr = Expression::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.current.kind.clone() {
            TokenKind::Integer(value) => {
                self.advance();
                Ok(Expression::Int(value))
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(Expression::Float(value))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expression::Str(value))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expression::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expression::Bool(false))
            }
            TokenKind::Identifier(name) => {
                let name = name.to_string();
                self.advance();
                Ok(Expression::Identifier(name))
            }
            TokenKind::LParen => {
                self.advance();
                let first = self.parse_expression()?;
                if self.eat(TokenKind::Comma) {
                    let mut elements = vec![first];
                    loop {
                        elements.push(self.parse_expression()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen, "')' after tuple")?;
                    Ok(Expression::Tuple(elements))
                } else {
                    self.expect(TokenKind::RParen, "')' after expression")?;
                    Ok(first)
                }
            }
            TokenKind::LBracket => {
                self.advance();
                if self.eat(TokenKind::RBracket) {
                    return Ok(Expression::List(Vec::new()));
                }
                let mut elements = Vec::new();
                loop {
                    elements.push(self.parse_expression()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "']' after list elements")?;
                Ok(Expression::List(elements))
            }
            TokenKind::LBrace => {
                self.advance();
                if self.eat(TokenKind::RBrace) {
                    return Ok(Expression::Dict(Vec::new()));
                }
                let mut pairs = Vec::new();
                loop {
                    let key = self.parse_expression()?;
                    self.expect(TokenKind::Colon, "':' after dictionary key")?;
                    let value = self.parse_expression()?;
                    pairs.push((key, value));
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "'}' after dictionary entries")?;
                Ok(Expression::Dict(pairs))
            }
            _ => Err(self.error("expression")),
        }
    }

    fn parse_type(&mut self) -> ParseResult<Type> {
        if self.current.kind.is_type_keyword() {
            let ty = type_for_keyword(&self.current.kind);
            self.advance();
            return Ok(ty);
        }
        if let TokenKind::Identifier(name) = &self.current.kind {
            let ty = Type::named(TypeKind::Struct, *name);
            self.advance();
            return Ok(ty);
        }
        Err(self.error("type"))
    }

    /// Discard tokens until a statement boundary so one error does not
    /// cascade through the rest of the program.
    fn synchronize(&mut self) {
        self.advance();
        while !matches!(self.current.kind, TokenKind::Eof) {
            if matches!(
                self.tokens[self.pos.saturating_sub(1)].kind,
                TokenKind::Newline | TokenKind::Semicolon
            ) {
                return;
            }
            match self.current.kind {
                TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Global
                | TokenKind::Local
                | TokenKind::RBrace => return,
                _ => {}
            }
            self.advance();
        }
    }

    /// Consumes newlines and semicolons between statements.
    fn consume_separators(&mut self) -> bool {
        let mut consumed = false;
        while matches!(
            self.current.kind,
            TokenKind::Newline | TokenKind::Semicolon
        ) {
            consumed = true;
            self.advance();
        }
        consumed
    }

    /// Consumes a single optional statement terminator.
    fn consume_terminator(&mut self) {
        if matches!(
            self.current.kind,
            TokenKind::Newline | TokenKind::Semicolon
        ) {
            self.advance();
        }
    }

    fn eat(&mut self, kind: TokenKind<'a>) -> bool {
        if self.current.kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind<'a>, expected: &str) -> ParseResult<()> {
        if self.current.kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.to_string();
            self.advance();
            Ok(name)
        } else {
            Err(self.error(expected))
        }
    }

    fn advance(&mut self) -> Token<'a> {
        let next = self
            .tokens
            .get(self.pos + 1)
            .cloned()
            .unwrap_or(Token::new(TokenKind::Eof, "", Span::default()));
        self.pos = self.pos.saturating_add(1);
        std::mem::replace(&mut self.current, next)
    }

    fn rewind(&mut self, pos: usize) {
        self.pos = pos;
        self.current = self.tokens[pos].clone();
    }

    fn peek_kind(&self) -> TokenKind<'a> {
        self.tokens
            .get(self.pos + 1)
            .map(|token| token.kind.clone())
            .unwrap_or(TokenKind::Eof)
    }

    fn error(&self, expected: &str) -> ParseError {
        let span = self.current.span();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: format!("{:?}", self.current.kind),
            line: span.line,
            column: span.column,
        }
    }
}

fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn type_for_keyword(kind: &TokenKind<'_>) -> Type {
    match kind {
        TokenKind::IntType => Type::new(TypeKind::Int32),
        TokenKind::Int64Type => Type::new(TypeKind::Int64),
        TokenKind::Float32Type => Type::new(TypeKind::Float32),
        TokenKind::Float64Type => Type::new(TypeKind::Float64),
        TokenKind::StringType => Type::new(TypeKind::String),
        TokenKind::BoolType => Type::new(TypeKind::Bool),
        TokenKind::VoidType => Type::new(TypeKind::Void),
        _ => Type::default(),
    }
}

fn assignment_targets(expr: Expression, span: Span) -> ParseResult<Vec<String>> {
    let elements = match expr {
        Expression::Tuple(elements) => elements,
        single => vec![single],
    };
    elements
        .into_iter()
        .map(|element| match element {
            Expression::Identifier(name) => Ok(name),
            _ => Err(ParseError::InvalidAssignTarget {
                line: span.line,
                column: span.column,
            }),
        })
        .collect()
}

pub fn parse_tokens<'a>(tokens: Vec<Token<'a>>) -> ParseResult<Program> {
    Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use indoc::indoc;

    fn parse(input: &str) -> Program {
        let tokens = tokenize(input).expect("tokenize should succeed");
        parse_tokens(tokens).expect("parse should succeed")
    }

    fn parse_err(input: &str) -> ParseError {
        let tokens = tokenize(input).expect("tokenize should succeed");
        parse_tokens(tokens).expect_err("parse should fail")
    }

    #[test]
    fn resolves_all_declaration_forms() {
        let program = parse(indoc! {"
            a = 5
            int b = 6
            c int = 7
            d = int 8
        "});
        let decl = |name: &str, kind: TypeKind, value: i64, explicit: bool| Statement::VarDecl {
            name: name.to_string(),
            ty: Type::new(kind),
            init: Some(Expression::Int(value)),
            explicit_type: explicit,
        };
        assert_eq!(
            program.statements,
            vec![
                decl("a", TypeKind::Unknown, 5, false),
                decl("b", TypeKind::Int32, 6, true),
                decl("c", TypeKind::Int32, 7, true),
                decl("d", TypeKind::Int32, 8, true),
            ]
        );
    }

    #[test]
    fn desugars_compound_assignment() {
        let program = parse("a += 2");
        assert_eq!(
            program.statements,
            vec![Statement::VarDecl {
                name: "a".to_string(),
                ty: Type::default(),
                init: Some(Expression::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(Expression::Identifier("a".to_string())),
                    right: Box::new(Expression::Int(2)),
                }),
                explicit_type: false,
            }]
        );
    }

    #[test]
    fn parses_tuple_assignment() {
        let program = parse("(a, b) = (b, a)");
        assert_eq!(
            program.statements,
            vec![Statement::TupleAssign {
                targets: vec!["a".to_string(), "b".to_string()],
                values: vec![
                    Expression::Identifier("b".to_string()),
                    Expression::Identifier("a".to_string()),
                ],
            }]
        );
    }

    #[test]
    fn parenthesized_expression_is_not_tuple_assignment() {
        let program = parse("(1 + 2) * 3");
        assert_eq!(
            program.statements,
            vec![Statement::Expr(Expression::Binary {
                op: BinaryOp::Mul,
                left: Box::new(Expression::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(Expression::Int(1)),
                    right: Box::new(Expression::Int(2)),
                }),
                right: Box::new(Expression::Int(3)),
            })]
        );
    }

    #[test]
    fn rejects_tuple_arity_mismatch() {
        let err = parse_err("(a, b) = (1, 2, 3)");
        assert!(matches!(
            err,
            ParseError::TupleArityMismatch {
                targets: 2,
                values: 3,
                ..
            }
        ));
    }

    #[test]
    fn rejects_compound_assignment_on_tuples() {
        let err = parse_err("(a, b) += (1, 2)");
        assert!(matches!(err, ParseError::CompoundAssignTarget { .. }));
    }

    #[test]
    fn parses_single_expression_function() {
        let program = parse("fn double(x) => x * 2");
        assert_eq!(
            program.statements,
            vec![Statement::FnDecl {
                name: "double".to_string(),
                params: vec![Param {
                    name: "x".to_string(),
                    ty: Type::default(),
                    explicit_type: false,
                }],
                return_type: Type::new(TypeKind::Void),
                body: FnBody::Expression(Box::new(Expression::Binary {
                    op: BinaryOp::Mul,
                    left: Box::new(Expression::Identifier("x".to_string())),
                    right: Box::new(Expression::Int(2)),
                })),
            }]
        );
    }

    #[test]
    fn parses_parameter_annotation_forms() {
        let program = parse("fn f(a, b: int, c int64) -> int { return a }");
        let Statement::FnDecl {
            params,
            return_type,
            ..
        } = &program.statements[0]
        else {
            panic!("expected function declaration");
        };
        assert_eq!(params.len(), 3);
        assert!(!params[0].explicit_type);
        assert_eq!(params[0].ty, Type::default());
        assert!(params[1].explicit_type);
        assert_eq!(params[1].ty, Type::new(TypeKind::Int32));
        assert!(params[2].explicit_type);
        assert_eq!(params[2].ty, Type::new(TypeKind::Int64));
        assert_eq!(*return_type, Type::new(TypeKind::Int32));
    }

    #[test]
    fn power_is_right_associative() {
        let program = parse("x = 2 ** 3 ** 2");
        let Statement::VarDecl {
            init: Some(Expression::Binary { op, left, right }),
            ..
        } = &program.statements[0]
        else {
            panic!("expected declaration with binary init");
        };
        assert_eq!(*op, BinaryOp::Power);
        assert_eq!(**left, Expression::Int(2));
        assert_eq!(
            **right,
            Expression::Binary {
                op: BinaryOp::Power,
                left: Box::new(Expression::Int(3)),
                right: Box::new(Expression::Int(2)),
            }
        );
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let program = parse("x = 2 + 3 * 4");
        let Statement::VarDecl {
            init: Some(Expression::Binary { op, right, .. }),
            ..
        } = &program.statements[0]
        else {
            panic!("expected declaration with binary init");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert_eq!(
            **right,
            Expression::Binary {
                op: BinaryOp::Mul,
                left: Box::new(Expression::Int(3)),
                right: Box::new(Expression::Int(4)),
            }
        );
    }

    #[test]
    fn folds_elif_chains_into_nested_ifs() {
        let program = parse(indoc! {"
            if a { pass }
            elif b { pass }
            elif c { pass }
            else { pass }
        "});
        let Statement::If { else_branch, .. } = &program.statements[0] else {
            panic!("expected if");
        };
        let Some(first_elif) = else_branch else {
            panic!("expected elif branch");
        };
        let Statement::If {
            condition,
            else_branch: second,
            ..
        } = first_elif.as_ref()
        else {
            panic!("expected nested if for elif");
        };
        assert_eq!(*condition, Expression::Identifier("b".to_string()));
        let Some(second_elif) = second else {
            panic!("expected second elif branch");
        };
        let Statement::If {
            condition,
            else_branch: last,
            ..
        } = second_elif.as_ref()
        else {
            panic!("expected nested if for second elif");
        };
        assert_eq!(*condition, Expression::Identifier("c".to_string()));
        assert!(matches!(
            last.as_deref(),
            Some(Statement::Block(statements)) if statements == &[Statement::Pass]
        ));
    }

    #[test]
    fn parses_for_in_with_list_and_dict_literals() {
        let program = parse(indoc! {"
            for x in [1, 2, 3] {
                d = {1: 100, 2: 200}
                v = d[x]
            }
        "});
        let Statement::ForIn { iterable, body, .. } = &program.statements[0] else {
            panic!("expected for-in");
        };
        assert_eq!(
            *iterable,
            Expression::List(vec![
                Expression::Int(1),
                Expression::Int(2),
                Expression::Int(3)
            ])
        );
        let Statement::Block(statements) = body.as_ref() else {
            panic!("expected block body");
        };
        assert!(matches!(
            &statements[1],
            Statement::VarDecl {
                init: Some(Expression::Index { .. }),
                ..
            }
        ));
    }

    #[test]
    fn parses_struct_and_enum_declarations() {
        let program = parse(indoc! {"
            struct Point {
                x int
                y int
            }
            enum Color { Red, Green = 5, Blue }
        "});
        assert_eq!(
            program.statements[0],
            Statement::StructDecl {
                name: "Point".to_string(),
                fields: vec![
                    ("x".to_string(), Type::new(TypeKind::Int32)),
                    ("y".to_string(), Type::new(TypeKind::Int32)),
                ],
            }
        );
        assert_eq!(
            program.statements[1],
            Statement::EnumDecl {
                name: "Color".to_string(),
                values: vec![
                    ("Red".to_string(), 0),
                    ("Green".to_string(), 5),
                    ("Blue".to_string(), 6),
                ],
            }
        );
    }

    #[test]
    fn parses_global_and_local_lists() {
        let program = parse("global a, b\nlocal c");
        assert_eq!(
            program.statements,
            vec![
                Statement::Global(vec!["a".to_string(), "b".to_string()]),
                Statement::Local(vec!["c".to_string()]),
            ]
        );
    }

    #[test]
    fn reports_first_error_after_synchronizing() {
        let err = parse_err(indoc! {"
            x =
            y = 2
        "});
        assert!(matches!(err, ParseError::UnexpectedToken { line: 1, .. }));
    }

    #[test]
    fn parsing_is_deterministic() {
        let source = indoc! {"
            fn fib(n) => n
            fn main() {
                s = 0
                for x in range(10) { s += fib(x) }
                print(s)
            }
        "};
        let first = parse(source);
        let second = parse(source);
        assert_eq!(first, second);
    }
}
