//! Handwritten recursive-descent parser for mscript.
//!
//! The parser consumes a flat `&[Spanned<Token>]` produced by the lexer and
//! builds an `AstProgram`. Calls may appear anywhere an operand is legal,
//! including inside other call arguments and loop/branch predicates.
//!
//! Grammar (informal):
//! ```text
//! program   := (fn_def | stmt)*
//! fn_def    := "def" IDENT "(" params ")" "->" ret_ty ("=" expr ";" | fn_block)
//! ret_ty    := type | "(" type ("," type)+ ")"
//! type      := "scalar" | "matrix" | "bool"
//! fn_block  := "{" stmt* "return" ret_val ";" "}"
//! stmt      := IDENT "=" expr ";"
//!            | "(" IDENT ("," IDENT)+ ")" "=" IDENT "(" args ")" ";"
//!            | "if" "(" expr ")" block ("else" (block | if_stmt))?
//!            | "while" "(" expr ")" block
//!            | "for" "(" IDENT "in" expr ":" expr ")" block
//!            | "input" IDENT ":" type ";"
//!            | "output" IDENT ("," IDENT)* ";"
//!            | expr ";"
//! expr      := or_expr
//! or_expr   := and_expr ("||" and_expr)*
//! and_expr  := cmp_expr ("&&" cmp_expr)*
//! cmp_expr  := add_expr (("==" | "!=" | "<" | "<=" | ">" | ">=") add_expr)*
//! add_expr  := mul_expr (("+" | "-") mul_expr)*
//! mul_expr  := mm_expr (("*" | "/" | "%%") mm_expr)*
//! mm_expr   := unary ("%*%" unary)*
//! unary     := ("-" | "!") unary | pow_expr
//! pow_expr  := postfix ("^" unary)?
//! postfix   := primary ("[" expr "," expr "]")*
//! primary   := NUMBER | BOOL | IDENT ["(" args ")"] | "(" expr ")"
//!            | "[" row (";" row)* "]" | "if" "(" expr ")" expr "else" expr
//! ```

use crate::error::ParseError;
use crate::parser::ast::{
    AstBinOp, AstBlock, AstExpr, AstFnBody, AstFunction, AstParam, AstProgram, AstStmt, AstType,
    AstTypeKind, AstUnaryOp, Ident,
};
use crate::parser::lexer::{Span, Spanned, Token};

pub struct Parser<'t> {
    tokens: &'t [Spanned<Token>],
    pos: usize,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Spanned<Token>]) -> Self {
        Self { tokens, pos: 0 }
    }

    // -----------------------------------------------------------------------
    // Token stream helpers
    // -----------------------------------------------------------------------

    fn peek_tok(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        match self.tokens.get(self.pos + offset) {
            Some(t) => &t.node,
            None => &Token::Eof,
        }
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(Span::at(0), |t| t.span)
    }

    fn advance(&mut self) -> Span {
        let span = self.current_span();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        span
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: format!("{}", self.peek_tok()),
            span: self.current_span(),
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Span, ParseError> {
        if self.peek_tok() == expected {
            Ok(self.advance())
        } else {
            Err(self.unexpected(format!("'{}'", expected)))
        }
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        match self.peek_tok().clone() {
            Token::Ident(name) => {
                let span = self.advance();
                Ok(Ident { name, span })
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_tok(), Token::Eof)
    }

    // -----------------------------------------------------------------------
    // Top-level
    // -----------------------------------------------------------------------

    pub fn parse_program(&mut self) -> Result<AstProgram, ParseError> {
        let mut program = AstProgram::default();
        while !self.at_eof() {
            if matches!(self.peek_tok(), Token::Def) {
                program.functions.push(self.parse_fn()?);
            } else {
                program.stmts.push(self.parse_stmt()?);
            }
        }
        Ok(program)
    }

    fn parse_fn(&mut self) -> Result<AstFunction, ParseError> {
        let start = self.expect(&Token::Def)?;
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let params = self.parse_params()?;
        self.expect(&Token::RParen)?;
        self.expect(&Token::Arrow)?;
        let returns = self.parse_return_types()?;

        let (body, end) = if matches!(self.peek_tok(), Token::Eq) {
            self.advance();
            let expr = self.parse_expr()?;
            let end = self.expect(&Token::Semi)?;
            (AstFnBody::Expr(Box::new(expr)), end)
        } else {
            self.parse_fn_block()?
        };
        Ok(AstFunction {
            name,
            params,
            returns,
            body,
            span: start.merge(end),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<AstParam>, ParseError> {
        let mut params = Vec::new();
        if matches!(self.peek_tok(), Token::RParen) {
            return Ok(params);
        }
        loop {
            let name = self.expect_ident()?;
            self.expect(&Token::Colon)?;
            let ty = self.parse_type()?;
            params.push(AstParam { name, ty });
            if matches!(self.peek_tok(), Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(params)
    }

    fn parse_return_types(&mut self) -> Result<Vec<AstType>, ParseError> {
        if !matches!(self.peek_tok(), Token::LParen) {
            return Ok(vec![self.parse_type()?]);
        }
        self.advance(); // consume '('
        let mut tys = vec![self.parse_type()?];
        while matches!(self.peek_tok(), Token::Comma) {
            self.advance();
            tys.push(self.parse_type()?);
        }
        self.expect(&Token::RParen)?;
        Ok(tys)
    }

    fn parse_type(&mut self) -> Result<AstType, ParseError> {
        let kind = match self.peek_tok() {
            Token::Ident(name) => match name.as_str() {
                "scalar" => AstTypeKind::Scalar,
                "matrix" => AstTypeKind::Matrix,
                "bool" => AstTypeKind::Bool,
                _ => return Err(self.unexpected("'scalar', 'matrix', or 'bool'")),
            },
            _ => return Err(self.unexpected("'scalar', 'matrix', or 'bool'")),
        };
        let span = self.advance();
        Ok(AstType { kind, span })
    }

    /// Parses `{ stmt* return ret_val; }`.
    fn parse_fn_block(&mut self) -> Result<(AstFnBody, Span), ParseError> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while !matches!(self.peek_tok(), Token::Return) {
            if matches!(self.peek_tok(), Token::RBrace | Token::Eof) {
                return Err(self.unexpected("'return' before the end of the function body"));
            }
            stmts.push(self.parse_stmt()?);
        }
        let return_start = self.advance(); // consume 'return'
        let returns = self.parse_return_values()?;
        let return_end = self.expect(&Token::Semi)?;
        if matches!(self.peek_tok(), Token::Return) {
            return Err(ParseError::MisplacedReturn {
                span: self.current_span(),
            });
        }
        if !matches!(self.peek_tok(), Token::RBrace) {
            return Err(ParseError::MisplacedReturn {
                span: return_start.merge(return_end),
            });
        }
        let end = self.advance();
        Ok((
            AstFnBody::Block {
                stmts,
                returns,
                return_span: return_start.merge(return_end),
            },
            end,
        ))
    }

    /// Parses either a single return expression or a parenthesized tuple.
    /// `return (a + b) * 2;` is a single value; `return (a, b);` is a tuple.
    fn parse_return_values(&mut self) -> Result<Vec<AstExpr>, ParseError> {
        if matches!(self.peek_tok(), Token::LParen) && self.paren_group_has_comma() {
            self.advance(); // consume '('
            let mut values = vec![self.parse_expr()?];
            while matches!(self.peek_tok(), Token::Comma) {
                self.advance();
                values.push(self.parse_expr()?);
            }
            self.expect(&Token::RParen)?;
            return Ok(values);
        }
        Ok(vec![self.parse_expr()?])
    }

    /// Looks ahead from a `(` for a comma at nesting depth one.
    fn paren_group_has_comma(&self) -> bool {
        let mut depth = 0usize;
        for tok in &self.tokens[self.pos..] {
            match tok.node {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return false;
                    }
                }
                Token::Comma if depth == 1 => return true,
                Token::Eof => return false,
                _ => {}
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn parse_block(&mut self) -> Result<AstBlock, ParseError> {
        let start = self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while !matches!(self.peek_tok(), Token::RBrace | Token::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        let end = self.expect(&Token::RBrace)?;
        Ok(AstBlock {
            stmts,
            span: start.merge(end),
        })
    }

    fn parse_stmt(&mut self) -> Result<AstStmt, ParseError> {
        match self.peek_tok() {
            Token::If => self.parse_if_stmt(),
            Token::While => self.parse_while_stmt(),
            Token::For => self.parse_for_stmt(),
            Token::Output => self.parse_output_stmt(),
            Token::Input => self.parse_input_stmt(),
            Token::Return => Err(ParseError::MisplacedReturn {
                span: self.current_span(),
            }),
            Token::Def => Err(self.unexpected("a statement (functions must be defined at the top level)")),
            Token::Ident(_) if matches!(self.peek_at(1), Token::Eq) => {
                let target = self.expect_ident()?;
                self.advance(); // consume '='
                let value = self.parse_expr()?;
                let end = self.expect(&Token::Semi)?;
                Ok(AstStmt::Assign {
                    span: target.span.merge(end),
                    target,
                    value: Box::new(value),
                })
            }
            Token::LParen
                if matches!(self.peek_at(1), Token::Ident(_))
                    && matches!(self.peek_at(2), Token::Comma) =>
            {
                self.parse_multi_assign()
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                Ok(AstStmt::Expr(Box::new(expr)))
            }
        }
    }

    fn parse_multi_assign(&mut self) -> Result<AstStmt, ParseError> {
        let start = self.expect(&Token::LParen)?;
        let mut targets = vec![self.expect_ident()?];
        while matches!(self.peek_tok(), Token::Comma) {
            self.advance();
            targets.push(self.expect_ident()?);
        }
        self.expect(&Token::RParen)?;
        self.expect(&Token::Eq)?;
        let callee = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let args = self.parse_call_args()?;
        self.expect(&Token::RParen)?;
        let end = self.expect(&Token::Semi)?;
        Ok(AstStmt::MultiAssign {
            targets,
            callee,
            args,
            span: start.merge(end),
        })
    }

    fn parse_paren_cond(&mut self) -> Result<AstExpr, ParseError> {
        self.expect(&Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        Ok(cond)
    }

    fn parse_if_stmt(&mut self) -> Result<AstStmt, ParseError> {
        let start = self.expect(&Token::If)?;
        let cond = self.parse_paren_cond()?;
        let then_body = self.parse_block()?;
        let mut end = then_body.span;
        let else_body = if matches!(self.peek_tok(), Token::Else) {
            self.advance();
            if matches!(self.peek_tok(), Token::If) {
                // `else if` chains nest as a single-statement else block.
                let nested = self.parse_if_stmt()?;
                let span = match &nested {
                    AstStmt::If { span, .. } => *span,
                    _ => end,
                };
                end = span;
                Some(AstBlock {
                    stmts: vec![nested],
                    span,
                })
            } else {
                let block = self.parse_block()?;
                end = block.span;
                Some(block)
            }
        } else {
            None
        };
        Ok(AstStmt::If {
            cond: Box::new(cond),
            then_body,
            else_body,
            span: start.merge(end),
        })
    }

    fn parse_while_stmt(&mut self) -> Result<AstStmt, ParseError> {
        let start = self.expect(&Token::While)?;
        let cond = self.parse_paren_cond()?;
        let body = self.parse_block()?;
        Ok(AstStmt::While {
            cond: Box::new(cond),
            span: start.merge(body.span),
            body,
        })
    }

    fn parse_for_stmt(&mut self) -> Result<AstStmt, ParseError> {
        let start = self.expect(&Token::For)?;
        self.expect(&Token::LParen)?;
        let var = self.expect_ident()?;
        self.expect(&Token::In)?;
        let from = self.parse_expr()?;
        self.expect(&Token::Colon)?;
        let to = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let body = self.parse_block()?;
        Ok(AstStmt::For {
            var,
            start: Box::new(from),
            end: Box::new(to),
            span: start.merge(body.span),
            body,
        })
    }

    fn parse_output_stmt(&mut self) -> Result<AstStmt, ParseError> {
        let start = self.expect(&Token::Output)?;
        let mut names = vec![self.expect_ident()?];
        while matches!(self.peek_tok(), Token::Comma) {
            self.advance();
            names.push(self.expect_ident()?);
        }
        let end = self.expect(&Token::Semi)?;
        Ok(AstStmt::Output {
            names,
            span: start.merge(end),
        })
    }

    fn parse_input_stmt(&mut self) -> Result<AstStmt, ParseError> {
        let start = self.expect(&Token::Input)?;
        let name = self.expect_ident()?;
        self.expect(&Token::Colon)?;
        let ty = self.parse_type()?;
        let end = self.expect(&Token::Semi)?;
        Ok(AstStmt::Input {
            name,
            ty,
            span: start.merge(end),
        })
    }

    // -----------------------------------------------------------------------
    // Expressions (precedence climbing)
    // -----------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<AstExpr, ParseError> {
        self.parse_or_expr()
    }

    fn binary(op: AstBinOp, lhs: AstExpr, rhs: AstExpr) -> AstExpr {
        let span = lhs.span().merge(rhs.span());
        AstExpr::BinOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span,
        }
    }

    fn parse_or_expr(&mut self) -> Result<AstExpr, ParseError> {
        let mut lhs = self.parse_and_expr()?;
        while matches!(self.peek_tok(), Token::PipePipe) {
            self.advance();
            let rhs = self.parse_and_expr()?;
            lhs = Self::binary(AstBinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and_expr(&mut self) -> Result<AstExpr, ParseError> {
        let mut lhs = self.parse_cmp_expr()?;
        while matches!(self.peek_tok(), Token::AmpAmp) {
            self.advance();
            let rhs = self.parse_cmp_expr()?;
            lhs = Self::binary(AstBinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_cmp_expr(&mut self) -> Result<AstExpr, ParseError> {
        let mut lhs = self.parse_add_expr()?;
        loop {
            let op = match self.peek_tok() {
                Token::EqEq => AstBinOp::CmpEq,
                Token::NotEq => AstBinOp::CmpNe,
                Token::Lt => AstBinOp::CmpLt,
                Token::LtEq => AstBinOp::CmpLe,
                Token::Gt => AstBinOp::CmpGt,
                Token::GtEq => AstBinOp::CmpGe,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_add_expr()?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_add_expr(&mut self) -> Result<AstExpr, ParseError> {
        let mut lhs = self.parse_mul_expr()?;
        loop {
            let op = match self.peek_tok() {
                Token::Plus => AstBinOp::Add,
                Token::Minus => AstBinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul_expr()?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_mul_expr(&mut self) -> Result<AstExpr, ParseError> {
        let mut lhs = self.parse_matmul_expr()?;
        loop {
            let op = match self.peek_tok() {
                Token::Star => AstBinOp::Mul,
                Token::Slash => AstBinOp::Div,
                Token::PercentPercent => AstBinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_matmul_expr()?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_matmul_expr(&mut self) -> Result<AstExpr, ParseError> {
        let mut lhs = self.parse_unary()?;
        while matches!(self.peek_tok(), Token::MatMul) {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Self::binary(AstBinOp::MatMul, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<AstExpr, ParseError> {
        let op = match self.peek_tok() {
            Token::Minus => Some(AstUnaryOp::Neg),
            Token::Bang => Some(AstUnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.advance();
            let expr = self.parse_unary()?;
            let span = start.merge(expr.span());
            return Ok(AstExpr::UnaryOp {
                op,
                expr: Box::new(expr),
                span,
            });
        }
        self.parse_pow_expr()
    }

    /// `^` is right-associative and binds tighter than unary minus: `-2^2 == -4`.
    fn parse_pow_expr(&mut self) -> Result<AstExpr, ParseError> {
        let base = self.parse_postfix()?;
        if matches!(self.peek_tok(), Token::Caret) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Self::binary(AstBinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<AstExpr, ParseError> {
        let mut expr = self.parse_primary()?;
        while matches!(self.peek_tok(), Token::LBracket) {
            self.advance();
            let row = self.parse_expr()?;
            self.expect(&Token::Comma)?;
            let col = self.parse_expr()?;
            let end = self.expect(&Token::RBracket)?;
            let span = expr.span().merge(end);
            expr = AstExpr::Index {
                base: Box::new(expr),
                row: Box::new(row),
                col: Box::new(col),
                span,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<AstExpr, ParseError> {
        let span = self.current_span();
        match self.peek_tok().clone() {
            Token::Ident(name) => {
                self.advance();
                let ident = Ident { name, span };
                if matches!(self.peek_tok(), Token::LParen) {
                    self.advance(); // consume '('
                    let args = self.parse_call_args()?;
                    let end = self.expect(&Token::RParen)?;
                    Ok(AstExpr::Call {
                        callee: ident,
                        args,
                        span: span.merge(end),
                    })
                } else {
                    Ok(AstExpr::Ident(ident))
                }
            }
            Token::Number(value) => {
                self.advance();
                Ok(AstExpr::Number { value, span })
            }
            Token::BoolLit(value) => {
                self.advance();
                Ok(AstExpr::Bool { value, span })
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => self.parse_matrix_lit(),
            Token::If => {
                self.advance();
                let cond = self.parse_paren_cond()?;
                let then_expr = self.parse_expr()?;
                self.expect(&Token::Else)?;
                let else_expr = self.parse_expr()?;
                let end = else_expr.span();
                Ok(AstExpr::If {
                    cond: Box::new(cond),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                    span: span.merge(end),
                })
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_matrix_lit(&mut self) -> Result<AstExpr, ParseError> {
        let start = self.expect(&Token::LBracket)?;
        let mut elems = Vec::new();
        let mut rows = 0usize;
        let mut cols = 0usize;
        loop {
            let mut row_len = 0usize;
            loop {
                elems.push(self.parse_expr()?);
                row_len += 1;
                if matches!(self.peek_tok(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            rows += 1;
            if rows == 1 {
                cols = row_len;
            } else if row_len != cols {
                return Err(ParseError::RaggedMatrix {
                    row: rows,
                    expected: cols,
                    found: row_len,
                    span: start.merge(self.current_span()),
                });
            }
            if matches!(self.peek_tok(), Token::Semi) {
                self.advance();
            } else {
                break;
            }
        }
        let end = self.expect(&Token::RBracket)?;
        Ok(AstExpr::MatrixLit {
            rows,
            cols,
            elems,
            span: start.merge(end),
        })
    }

    fn parse_call_args(&mut self) -> Result<Vec<AstExpr>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.peek_tok(), Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if matches!(self.peek_tok(), Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(args)
    }
}
