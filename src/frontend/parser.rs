//! Parser for Vire
//!
//! Recursive descent with precedence climbing for binary expressions. Tokens
//! are pulled from the lexer one at a time. A failed statement or item is
//! reported and the parser skips to the next statement boundary.

use crate::config::Config;
use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::types::Type;
use crate::utils::{DiagnosticBuilder, Error, Result, Span};

/// Largest length accepted for one array dimension
pub const MAX_ARRAY_LENGTH: usize = i32::MAX as usize;

/// The parser
pub struct Parser<'a> {
    lexer: Lexer,
    config: &'a Config,
    diags: &'a mut DiagnosticBuilder,
    current: Token,
    prev_span: Span,
    eof_reported: bool,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer, config: &'a Config, diags: &'a mut DiagnosticBuilder) -> Self {
        let current = lexer.next_token(diags);
        Self {
            lexer,
            config,
            diags,
            current,
            prev_span: Span::dummy(),
            eof_reported: false,
        }
    }

    // ==================== Helper Methods ====================

    fn current_kind(&self) -> &TokenKind {
        &self.current.kind
    }

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token(self.diags);
        log::trace!("token {:?} at {}", next.kind, next.span);
        self.prev_span = self.current.span;
        std::mem::replace(&mut self.current, next)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn unexpected(&self, expected: &str) -> Error {
        if self.is_at_end() {
            Error::UnexpectedEof {
                context: format!("expected {}", expected),
                span: self.current.span,
            }
        } else {
            Error::UnexpectedToken {
                expected: expected.to_string(),
                got: self.current.describe(),
                span: self.current.span,
            }
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<Ident> {
        match self.current_kind() {
            TokenKind::Ident(name) => {
                let ident = Ident::new(name.clone(), self.current.span);
                self.advance();
                Ok(ident)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn expect_length(&mut self) -> Result<usize> {
        match self.current_kind() {
            TokenKind::IntLit(n) if *n > MAX_ARRAY_LENGTH as i64 => {
                let err = Error::ArrayTooLong {
                    length: *n,
                    max: MAX_ARRAY_LENGTH,
                    span: self.current.span,
                };
                self.advance();
                Err(err)
            }
            TokenKind::IntLit(n) if *n >= 0 => {
                let n = *n as usize;
                self.advance();
                Ok(n)
            }
            _ => Err(self.unexpected("array length")),
        }
    }

    /// Span from `start` to the end of the last consumed token
    fn span_from(&self, start: Span) -> Span {
        start.merge(&self.prev_span)
    }

    fn report(&mut self, error: Error) {
        if matches!(error, Error::UnexpectedEof { .. }) {
            if self.eof_reported {
                return;
            }
            self.eof_reported = true;
        }
        self.diags.error(error);
    }

    /// Skip to just after the next `;`, or up to the `}` closing the enclosing block
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current_kind() {
                TokenKind::Eof => return,
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Report, resynchronize, and guarantee progress
    fn recover(&mut self, error: Error, start: usize) {
        self.report(error);
        self.synchronize();
        if self.current.span.start == start && !self.is_at_end() {
            self.advance();
        }
    }

    // ==================== Module ====================

    /// Parse a whole compilation unit
    pub fn parse_module(&mut self) -> Module {
        let mut module = Module::default();

        while !self.is_at_end() {
            let start = self.current.span.start;
            if let Err(err) = self.parse_top_level(&mut module) {
                self.recover(err, start);
            }
        }

        log::debug!(
            "parsed module: {} statement(s), {} function(s), {} class(es), {} type(s)",
            module.pre_execution.len(),
            module.functions.len(),
            module.classes.len(),
            module.types.len()
        );
        module
    }

    fn parse_top_level(&mut self, module: &mut Module) -> Result<()> {
        match self.current_kind() {
            TokenKind::Class => module.classes.push(self.parse_class()?),
            TokenKind::Func => module
                .functions
                .push(FunctionItem::Function(self.parse_function()?)),
            TokenKind::Proto => {
                self.advance();
                let proto = self.parse_prototype()?;
                self.consume(&TokenKind::Semicolon);
                module.functions.push(FunctionItem::Prototype(proto));
            }
            TokenKind::Extern => {
                self.advance();
                let proto = self.parse_prototype()?;
                self.consume(&TokenKind::Semicolon);
                module.functions.push(FunctionItem::Extern(proto));
            }
            TokenKind::Struct | TokenKind::Union => module.types.push(self.parse_type_def()?),
            TokenKind::Semicolon => {
                self.advance();
            }
            TokenKind::RBrace => {
                return Err(self.unexpected("item or statement"));
            }
            _ => {
                let stmt = self.parse_terminated_statement()?;
                module.pre_execution.push(stmt);
            }
        }
        Ok(())
    }

    // ==================== Declarations ====================

    /// `name(arg: [const] type, ...) [-> | returns type]`
    fn parse_prototype(&mut self) -> Result<Prototype> {
        let name = self.expect_ident("function name")?;
        let start = name.span;
        self.expect(TokenKind::LParen, "'(' after function name")?;

        let mut params = Vec::new();
        while let TokenKind::Ident(_) = self.current_kind() {
            let param = self.expect_ident("parameter name")?;
            self.expect(TokenKind::Colon, "':' after parameter name")?;
            let binding = if self.consume(&TokenKind::Const) {
                Binding::Const
            } else {
                Binding::Var
            };
            let ty = self.parse_type()?;
            params.push(VariableDef::new(param, binding, ty, None));

            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')' after parameters")?;

        let ret = if self.consume(&TokenKind::Arrow) || self.consume(&TokenKind::Returns) {
            self.parse_type()?
        } else {
            Type::Void
        };

        Ok(Prototype {
            name,
            params,
            ret,
            span: self.span_from(start),
        })
    }

    fn parse_function(&mut self) -> Result<Function> {
        let start = self.expect(TokenKind::Func, "'func'")?.span;
        let proto = self.parse_prototype()?;
        let body = self.parse_block()?;
        Ok(Function {
            proto,
            body,
            locals: Vec::new(),
            span: self.span_from(start),
        })
    }

    /// `name([N])*`
    fn parse_type(&mut self) -> Result<Type> {
        let name = self.expect_ident("type name")?;
        let mut dims = Vec::new();
        while self.consume(&TokenKind::LBracket) {
            dims.push(self.expect_length()?);
            self.expect(TokenKind::RBracket, "']'")?;
        }
        Ok(wrap_dims(Type::construct(&name.name), &dims))
    }

    fn parse_class(&mut self) -> Result<ClassDef> {
        let start = self.expect(TokenKind::Class, "'class'")?.span;
        let name = self.expect_ident("class name")?;

        let parent = if self.consume(&TokenKind::LParen) {
            let parent = self.expect_ident("parent class name")?;
            self.expect(TokenKind::RParen, "')'")?;
            Some(parent)
        } else if self.consume(&TokenKind::Colon) || self.consume(&TokenKind::Extends) {
            Some(self.expect_ident("parent class name")?)
        } else {
            None
        };

        let open = self.expect(TokenKind::LBrace, "'{' to open class body")?;
        let mut members = Vec::new();
        let mut methods = Vec::new();

        loop {
            let member_start = self.current.span.start;
            let result = match self.current_kind() {
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    return Err(Error::UnexpectedEof {
                        context: format!("class `{}` is missing '}}'", name.name),
                        span: open.span,
                    });
                }
                TokenKind::Semicolon => {
                    self.advance();
                    continue;
                }
                TokenKind::Func => self
                    .parse_function()
                    .map(|f| methods.push(FunctionItem::Function(f))),
                TokenKind::Proto => {
                    self.advance();
                    self.parse_prototype().map(|p| {
                        methods.push(FunctionItem::Prototype(p));
                    })
                }
                TokenKind::Extern => {
                    self.advance();
                    self.parse_prototype().map(|p| {
                        methods.push(FunctionItem::Extern(p));
                    })
                }
                TokenKind::Var | TokenKind::Let | TokenKind::Const => self
                    .parse_variable_def_inner()
                    .and_then(|(def, _)| {
                        self.expect(TokenKind::Semicolon, "';' after member")?;
                        members.push(def);
                        Ok(())
                    }),
                _ => Err(self.unexpected("class member")),
            };
            if let Err(err) = result {
                self.recover(err, member_start);
            }
        }

        Ok(ClassDef {
            name,
            parent,
            members,
            methods,
            span: self.span_from(start),
        })
    }

    /// `struct|union Name { type name; | struct ... | union ... }`
    fn parse_type_def(&mut self) -> Result<TypeDef> {
        let keyword = self.advance();
        let kind = match keyword.kind {
            TokenKind::Union => TypeDefKind::Union,
            _ => TypeDefKind::Struct,
        };
        let name = self.expect_ident("struct or union name")?;
        let open = self.expect(TokenKind::LBrace, "'{'")?;

        let mut members = Vec::new();
        loop {
            match self.current_kind() {
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    return Err(Error::UnexpectedEof {
                        context: format!("`{}` is missing '}}'", name.name),
                        span: open.span,
                    });
                }
                TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::Struct | TokenKind::Union => {
                    members.push(Member::Nested(self.parse_type_def()?));
                }
                _ => {
                    let ty = self.parse_type()?;
                    let field = self.expect_ident("member name")?;
                    self.expect(TokenKind::Semicolon, "';' after member")?;
                    members.push(Member::Field { name: field, ty });
                }
            }
        }

        Ok(TypeDef::new(kind, name, members, self.span_from(keyword.span)))
    }

    // ==================== Statements ====================

    /// `{ stmt; ... }`
    fn parse_block(&mut self) -> Result<Vec<Expr>> {
        let open = self.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();

        loop {
            match self.current_kind() {
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    return Err(Error::UnexpectedEof {
                        context: "expected '}' to close block".to_string(),
                        span: open.span,
                    });
                }
                TokenKind::Semicolon => {
                    self.advance();
                    continue;
                }
                _ => {}
            }

            let start = self.current.span.start;
            match self.parse_terminated_statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => self.recover(err, start),
            }
        }

        Ok(stmts)
    }

    /// A statement plus its `;`, unless it ends with a block
    fn parse_terminated_statement(&mut self) -> Result<Expr> {
        let needs_semicolon = !self.current_kind().is_block_statement();
        let stmt = self.parse_statement()?;
        if needs_semicolon && !self.consume(&TokenKind::Semicolon) {
            let err = self.unexpected("';' after statement");
            self.report(err);
        }
        Ok(stmt)
    }

    pub fn parse_statement(&mut self) -> Result<Expr> {
        match self.current_kind() {
            TokenKind::Var | TokenKind::Let | TokenKind::Const => self.parse_variable_def(),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break | TokenKind::Continue => self.parse_break_continue(),
            TokenKind::Struct | TokenKind::Union => {
                let def = self.parse_type_def()?;
                let span = def.span;
                Ok(Expr::new(ExprKind::TypeDef(Box::new(def)), span))
            }
            TokenKind::Unsafe => self.parse_unsafe(),
            _ => self.parse_expression(),
        }
    }

    /// `var|let|const name([dim])* [: type] [= expr]`
    fn parse_variable_def(&mut self) -> Result<Expr> {
        let (def, span) = self.parse_variable_def_inner()?;
        Ok(Expr::new(ExprKind::VariableDef(Box::new(def)), span))
    }

    fn parse_variable_def_inner(&mut self) -> Result<(VariableDef, Span)> {
        let keyword = self.advance();
        let binding = match keyword.kind {
            TokenKind::Let => Binding::Let,
            TokenKind::Const => Binding::Const,
            _ => Binding::Var,
        };
        let name = self.expect_ident("variable name")?;

        let mut dims = Vec::new();
        while self.consume(&TokenKind::LBracket) {
            if self.check(&TokenKind::RBracket) {
                dims.push(0);
            } else {
                dims.push(self.expect_length()?);
            }
            self.expect(TokenKind::RBracket, "']'")?;
        }

        let base = if self.consume(&TokenKind::Colon) {
            self.parse_type()?
        } else {
            Type::Void
        };
        let declared = wrap_dims(base, &dims);

        let value = if self.consume(&TokenKind::Eq) {
            let mut value = self.parse_expression()?;
            widen_array_literal(&mut value, &declared);
            Some(value)
        } else {
            None
        };

        let span = self.span_from(keyword.span);
        Ok((VariableDef::new(name, binding, declared, value), span))
    }

    /// `if (c) {} [else if (c) {}]* [else {}]`
    fn parse_if(&mut self) -> Result<Expr> {
        let start = self.expect(TokenKind::If, "'if'")?.span;
        let head = self.parse_if_then(start)?;

        let mut ladder = Vec::new();
        while self.check(&TokenKind::Else) {
            let else_span = self.advance().span;
            if self.consume(&TokenKind::If) {
                ladder.push(self.parse_if_then(else_span)?);
            } else {
                let body = self.parse_block()?;
                ladder.push(IfThen {
                    condition: None,
                    body,
                    span: self.span_from(else_span),
                });
                break;
            }
        }

        Ok(Expr::new(ExprKind::If { head, ladder }, self.span_from(start)))
    }

    fn parse_if_then(&mut self, start: Span) -> Result<IfThen> {
        self.expect(TokenKind::LParen, "'(' before condition")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')' after condition")?;
        let body = self.parse_block()?;
        Ok(IfThen {
            condition: Some(Box::new(condition)),
            body,
            span: self.span_from(start),
        })
    }

    /// `for (init; cond; step) { }`
    fn parse_for(&mut self) -> Result<Expr> {
        let start = self.expect(TokenKind::For, "'for'")?.span;
        self.expect(TokenKind::LParen, "'(' after 'for'")?;
        let init = self.parse_statement()?;
        self.expect(TokenKind::Semicolon, "';' after for-loop initializer")?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::Semicolon, "';' after for-loop condition")?;
        let step = self.parse_statement()?;
        self.expect(TokenKind::RParen, "')' after for-loop step")?;
        let body = self.parse_block()?;

        Ok(Expr::new(
            ExprKind::For {
                init: Box::new(init),
                cond: Box::new(cond),
                step: Box::new(step),
                body,
            },
            self.span_from(start),
        ))
    }

    fn parse_while(&mut self) -> Result<Expr> {
        let start = self.expect(TokenKind::While, "'while'")?.span;
        self.expect(TokenKind::LParen, "'(' after 'while'")?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')' after condition")?;
        let body = self.parse_block()?;

        Ok(Expr::new(
            ExprKind::While {
                cond: Box::new(cond),
                body,
            },
            self.span_from(start),
        ))
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        )
    }

    fn parse_return(&mut self) -> Result<Expr> {
        let start = self.expect(TokenKind::Return, "'return'")?.span;
        let value = if self.at_statement_end() {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        Ok(Expr::new(ExprKind::Return(value), self.span_from(start)))
    }

    /// `break [expr]` / `continue [expr]`
    fn parse_break_continue(&mut self) -> Result<Expr> {
        let keyword = self.advance();
        let value = if self.at_statement_end() {
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };
        let kind = match keyword.kind {
            TokenKind::Continue => ExprKind::Continue(value),
            _ => ExprKind::Break(value),
        };
        Ok(Expr::new(kind, self.span_from(keyword.span)))
    }

    fn parse_unsafe(&mut self) -> Result<Expr> {
        let start = self.expect(TokenKind::Unsafe, "'unsafe'")?.span;
        let body = self.parse_block()?;
        Ok(Expr::new(ExprKind::Unsafe(body), self.span_from(start)))
    }

    // ==================== Expressions ====================

    pub fn parse_expression(&mut self) -> Result<Expr> {
        let lhs = self.parse_unary()?;
        self.parse_binop(0, lhs)
    }

    fn current_precedence(&self) -> i32 {
        match self.current_kind().operator_text() {
            Some(op) => self.config.binop_precedence(op),
            None => -1,
        }
    }

    /// Precedence climbing; left associative
    fn parse_binop(&mut self, min_prec: i32, mut lhs: Expr) -> Result<Expr> {
        loop {
            let prec = self.current_precedence();
            if prec < min_prec {
                return Ok(lhs);
            }

            let op_token = self.advance();
            let op = BinaryOp::from_token(&op_token.kind).ok_or(Error::UnexpectedToken {
                expected: "binary operator".to_string(),
                got: op_token.text.clone(),
                span: op_token.span,
            })?;

            let mut rhs = self.parse_unary()?;
            if prec < self.current_precedence() {
                rhs = self.parse_binop(prec + 1, rhs)?;
            }

            let span = lhs.span.merge(&rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let start = self.current.span;
        match self.current_kind() {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = self.span_from(start);
                Ok(match operand.kind {
                    ExprKind::Int(v) => Expr::with_type(ExprKind::Int(-v), Type::Int, span),
                    ExprKind::Float(v) => Expr::with_type(ExprKind::Float(-v), Type::Float, span),
                    ExprKind::Double(v) => {
                        Expr::with_type(ExprKind::Double(-v), Type::Double, span)
                    }
                    _ => Expr::new(
                        ExprKind::Unary {
                            op: UnaryOp::Neg,
                            operand: Box::new(operand),
                        },
                        span,
                    ),
                })
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    self.span_from(start),
                ))
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let increment = matches!(self.advance().kind, TokenKind::PlusPlus);
                let target = self.parse_unary()?;
                if !target.is_assignable() {
                    return Err(Error::InvalidAssignTarget { span: target.span });
                }
                Ok(Expr::new(
                    ExprKind::IncrDecr {
                        target: Box::new(target),
                        increment,
                        prefix: true,
                    },
                    self.span_from(start),
                ))
            }
            TokenKind::Amp => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::Reference(Box::new(operand)),
                    self.span_from(start),
                ))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let span = self.current.span;
        let literal = match self.current_kind() {
            TokenKind::IntLit(v) => Some((ExprKind::Int(*v), Type::Int)),
            TokenKind::FloatLit(v) => Some((ExprKind::Float(*v), Type::Float)),
            TokenKind::DoubleLit(v) => Some((ExprKind::Double(*v), Type::Double)),
            TokenKind::CharLit(c) => Some((ExprKind::Char(*c), Type::Char)),
            TokenKind::True => Some((ExprKind::Bool(true), Type::Bool)),
            TokenKind::False => Some((ExprKind::Bool(false), Type::Bool)),
            TokenKind::StringLit(s) => {
                let ty = Type::array(Type::Char, s.chars().count() + 1);
                Some((ExprKind::Str(s.clone()), ty))
            }
            _ => None,
        };
        if let Some((kind, ty)) = literal {
            self.advance();
            return Ok(Expr::with_type(kind, ty, span));
        }

        match self.current_kind() {
            TokenKind::Ident(_) => self.parse_id_expr(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::Var
            | TokenKind::Let
            | TokenKind::Const
            | TokenKind::If
            | TokenKind::For
            | TokenKind::While
            | TokenKind::Return
            | TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Struct
            | TokenKind::Union
            | TokenKind::Unsafe => self.parse_statement(),
            TokenKind::New => self.parse_new(),
            TokenKind::Delete => {
                self.advance();
                let name = self.expect_ident("variable name after 'delete'")?;
                Ok(Expr::new(ExprKind::Delete(name), self.span_from(span)))
            }
            TokenKind::Minus
            | TokenKind::Bang
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus
            | TokenKind::Amp => self.parse_unary(),
            TokenKind::Eof => Err(self.unexpected("expression")),
            kind if kind.is_reserved() => Err(Error::ReservedKeyword {
                word: self.current.text.clone(),
                span,
            }),
            _ => Err(Error::ExpectedExpr {
                got: self.current.describe(),
                span,
            }),
        }
    }

    /// Variable, call, indexing, member access, assignment or postfix `++`/`--`
    fn parse_id_expr(&mut self) -> Result<Expr> {
        let ident = self.expect_ident("identifier")?;
        let start = ident.span;

        let mut expr = if self.check(&TokenKind::LParen) {
            let args = self.parse_args()?;
            Expr::new(ExprKind::Call { callee: ident, args }, self.span_from(start))
        } else {
            Expr::new(ExprKind::Variable(ident.name), start)
        };

        if self.check(&TokenKind::LBracket) {
            let mut indices = Vec::new();
            while self.consume(&TokenKind::LBracket) {
                indices.push(self.parse_expression()?);
                self.expect(TokenKind::RBracket, "']' after index")?;
            }
            expr = Expr::new(
                ExprKind::ArrayAccess {
                    base: Box::new(expr),
                    indices,
                },
                self.span_from(start),
            );
        }

        if self.check(&TokenKind::Dot) {
            expr = self.parse_access(expr)?;
        }

        match self.current_kind() {
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let increment = matches!(self.advance().kind, TokenKind::PlusPlus);
                self.require_assignable(&expr)?;
                Ok(Expr::new(
                    ExprKind::IncrDecr {
                        target: Box::new(expr),
                        increment,
                        prefix: false,
                    },
                    self.span_from(start),
                ))
            }
            TokenKind::Eq => {
                self.advance();
                self.require_assignable(&expr)?;
                let value = self.parse_expression()?;
                Ok(Expr::new(
                    ExprKind::Assign {
                        target: Box::new(expr),
                        value: Box::new(value),
                    },
                    self.span_from(start),
                ))
            }
            kind => match BinaryOp::from_compound_assign(kind) {
                Some(op) => {
                    self.advance();
                    self.require_assignable(&expr)?;
                    let rhs = self.parse_expression()?;
                    let span = self.span_from(start);
                    let value = Expr::new(
                        ExprKind::Binary {
                            op,
                            lhs: Box::new(expr.clone()),
                            rhs: Box::new(rhs),
                        },
                        span,
                    );
                    Ok(Expr::new(
                        ExprKind::Assign {
                            target: Box::new(expr),
                            value: Box::new(value),
                        },
                        span,
                    ))
                }
                None => Ok(expr),
            },
        }
    }

    fn require_assignable(&self, expr: &Expr) -> Result<()> {
        if expr.is_assignable() {
            Ok(())
        } else {
            Err(Error::InvalidAssignTarget { span: expr.span })
        }
    }

    /// `.child` where the chain nests to the right
    fn parse_access(&mut self, parent: Expr) -> Result<Expr> {
        self.expect(TokenKind::Dot, "'.'")?;
        let member = self.expect_ident("member name")?;
        let start = member.span;

        let mut child = if self.check(&TokenKind::LParen) {
            let args = self.parse_args()?;
            Expr::new(ExprKind::Call { callee: member, args }, self.span_from(start))
        } else {
            Expr::new(ExprKind::Variable(member.name), start)
        };
        if self.check(&TokenKind::Dot) {
            child = self.parse_access(child)?;
        }

        if !matches!(
            child.kind,
            ExprKind::Variable(_) | ExprKind::Call { .. } | ExprKind::Access { .. }
        ) {
            return Err(Error::InvalidAccess { span: child.span });
        }

        let span = parent.span.merge(&child.span);
        Ok(Expr::new(
            ExprKind::Access {
                parent: Box::new(parent),
                child: Box::new(child),
            },
            span,
        ))
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' or ',' in argument list")?;
        Ok(args)
    }

    fn parse_array_literal(&mut self) -> Result<Expr> {
        let start = self.expect(TokenKind::LBracket, "'['")?.span;
        let mut elements = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                elements.push(self.parse_expression()?);
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket, "']' or ',' in array literal")?;

        let ty = Type::array(Type::Void, elements.len());
        Ok(Expr::with_type(ExprKind::Array(elements), ty, self.span_from(start)))
    }

    /// `new Name` / `new Name(args)`
    fn parse_new(&mut self) -> Result<Expr> {
        let start = self.expect(TokenKind::New, "'new'")?.span;
        let class = self.expect_ident("class name after 'new'")?;
        let args = if self.check(&TokenKind::LParen) {
            self.parse_args()?
        } else {
            Vec::new()
        };
        Ok(Expr::new(ExprKind::New { class, args }, self.span_from(start)))
    }
}

/// Wrap `base` in array levels, outermost dimension first
fn wrap_dims(base: Type, dims: &[usize]) -> Type {
    dims.iter()
        .rev()
        .fold(base, |ty, &len| Type::array(ty, len))
}

/// Widen an array literal (and nested literals) up to the declared bounds
fn widen_array_literal(value: &mut Expr, declared: &Type) {
    let (ExprKind::Array(elements), Type::Array { element, length }) = (&mut value.kind, declared)
    else {
        return;
    };
    if *length > elements.len() {
        value.ty = Type::array(Type::Void, *length);
    }
    for elem in elements.iter_mut() {
        widen_array_literal(elem, element);
    }
}
