//! Recursive-descent parser producing a flat statement list.
//!
//! Grammar (lowest to highest precedence):
//!
//!   expr   := term (('+' | '-') term)*
//!   term   := factor (('*' | '/') factor)*
//!   factor := INT | STRING | '[' list ']' | '(' expr ')'
//!           | IDENT '[' expr ']' | 'input' '(' ')' | IDENT '(' list ')' | IDENT

use crate::ast::{AssignTarget, BinaryOp, Expr, FunctionDef, Stmt};
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

/// Parse a token sequence into top-level statements.
///
/// Blocks are spliced into the enclosing sequence, so the result
/// contains no block nodes.
pub fn parse(tokens: &[Token]) -> Result<Vec<Stmt>, ParseError> {
    let mut parser = Parser { tokens, position: 0 };
    let mut statements = Vec::new();
    while !parser.at_end() {
        parser.parse_statement(&mut statements)?;
    }
    Ok(statements)
}

struct Parser<'t> {
    tokens: &'t [Token],
    position: usize,
}

impl<'t> Parser<'t> {
    fn at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.position)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    fn peek_kind_at(&self, lookahead: usize) -> Option<TokenKind> {
        self.tokens.get(self.position + lookahead).map(|token| token.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn advance(&mut self) -> Result<&'t Token, ParseError> {
        let token = self.peek().ok_or(ParseError::UnexpectedEof)?;
        self.position += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<&'t Token, ParseError> {
        let token = self.peek().ok_or(ParseError::UnexpectedEof)?;
        if token.kind != expected {
            return Err(ParseError::Expected {
                expected,
                found: token.kind,
                position: token.offset,
            });
        }
        self.position += 1;
        Ok(token)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn parse_statement(&mut self, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        let Some(kind) = self.peek_kind() else {
            return Err(ParseError::UnexpectedEof);
        };

        match kind {
            TokenKind::Semi => {
                self.position += 1;
                return Ok(());
            }
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                out.extend(block);
            }
            TokenKind::Func => out.push(Stmt::Function(self.parse_function()?)),
            TokenKind::Return => {
                self.position += 1;
                out.push(Stmt::Return(self.parse_expr()?));
            }
            TokenKind::Print => {
                self.position += 1;
                if self.check(TokenKind::StringLiteral) {
                    let text = self.advance()?.text.clone();
                    out.push(Stmt::PrintStr(text));
                } else {
                    out.push(Stmt::PrintExpr(self.parse_expr()?));
                }
            }
            TokenKind::Ident => out.push(self.parse_ident_statement()?),
            _ => out.push(Stmt::Expr(self.parse_expr()?)),
        }

        self.eat(TokenKind::Semi);
        Ok(())
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.at_end() {
                return Err(ParseError::UnexpectedEof);
            }
            self.parse_statement(&mut statements)?;
        }
        self.expect(TokenKind::RBrace)?;
        Ok(statements)
    }

    fn parse_function(&mut self) -> Result<FunctionDef, ParseError> {
        self.expect(TokenKind::Func)?;
        let name = self.expect(TokenKind::Ident)?.text.clone();
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            params.push(self.expect(TokenKind::Ident)?.text.clone());
            while self.eat(TokenKind::Comma) {
                params.push(self.expect(TokenKind::Ident)?.text.clone());
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = if self.check(TokenKind::LBrace) {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(FunctionDef { name, params, body })
    }

    /// Statements starting with an identifier: `x = e`, `a[i] = e`,
    /// or an expression statement.
    fn parse_ident_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind_at(1) {
            Some(TokenKind::Assign) => {
                let name = self.advance()?.text.clone();
                self.expect(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                Ok(Stmt::Assign {
                    target: AssignTarget::Name(name),
                    value,
                })
            }
            Some(TokenKind::LBracket) => {
                // `a[i]` is either the target of an element assignment or
                // an access expression; only the token after `]` tells.
                let checkpoint = self.position;
                let name = self.advance()?.text.clone();
                self.expect(TokenKind::LBracket)?;
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                if self.eat(TokenKind::Assign) {
                    let value = self.parse_expr()?;
                    return Ok(Stmt::Assign {
                        target: AssignTarget::Element { name, index },
                        value,
                    });
                }
                self.position = checkpoint;
                Ok(Stmt::Expr(self.parse_expr()?))
            }
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.position += 1;
            let rhs = self.parse_term()?;
            node = Expr::binary(op, node, rhs);
        }
        Ok(node)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.position += 1;
            let rhs = self.parse_factor()?;
            node = Expr::binary(op, node, rhs);
        }
        Ok(node)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::IntLiteral => token
                .text
                .parse::<i32>()
                .map(Expr::Int)
                .map_err(|_| ParseError::IntegerOutOfRange(token.text.clone())),
            TokenKind::StringLiteral => Ok(Expr::Str(token.text.clone())),
            TokenKind::LBracket => {
                let elements = self.parse_list(TokenKind::RBracket)?;
                Ok(Expr::Array(elements))
            }
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Ident => {
                let name = token.text.clone();
                if self.eat(TokenKind::LBracket) {
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    return Ok(Expr::Index {
                        name,
                        index: Box::new(index),
                    });
                }
                if self.eat(TokenKind::LParen) {
                    if name == "input" {
                        self.expect(TokenKind::RParen)?;
                        return Ok(Expr::Input);
                    }
                    let args = self.parse_list(TokenKind::RParen)?;
                    return Ok(Expr::Call { name, args });
                }
                Ok(Expr::Var(name))
            }
            found => Err(ParseError::UnexpectedToken {
                found,
                position: token.offset,
            }),
        }
    }

    /// Comma-separated expressions up to and including `close`; the
    /// opening delimiter has already been consumed.
    fn parse_list(&mut self, close: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        if !self.check(close) {
            items.push(self.parse_expr()?);
            while self.eat(TokenKind::Comma) {
                items.push(self.parse_expr()?);
            }
        }
        self.expect(close)?;
        Ok(items)
    }
}
