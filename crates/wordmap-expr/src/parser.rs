//! Expression parser using precedence climbing over the `logos` token stream.
//!
//! ```text
//! expression  := assignment
//! assignment  := conditional ( "=" assignment )?
//! conditional := binary ( "?" conditional ":" conditional )?
//! binary      := unary ( infix-op binary )*        (by precedence level)
//! unary       := ( "-" | "+" | "!" | "~" ) unary | primary
//! primary     := number | string | bool | identifier | "(" expression ")"
//! ```

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{ExprError, Result};
use crate::lexer::{tokenize, Spanned, Token};
use crate::value::Value;

/// Parse expression text into a tree.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        end: source.len(),
    };
    let expr = parser.parse_expression()?;
    if let Some((token, position)) = parser.peek_spanned() {
        return Err(ExprError::parse(
            *position,
            format!("unexpected trailing token {:?}", token),
        ));
    }
    Ok(expr)
}

struct Parser<'t, 'src> {
    tokens: &'t [Spanned<'src>],
    pos: usize,
    /// Byte length of the source, reported for end-of-input errors.
    end: usize,
}

impl<'t, 'src> Parser<'t, 'src> {
    fn peek(&self) -> Option<&'t Token<'src>> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_spanned(&self) -> Option<&'t Spanned<'src>> {
        self.tokens.get(self.pos)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, p)| *p)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<&'t Spanned<'src>> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token<'src>, what: &str) -> Result<()> {
        match self.peek() {
            Some(token) if *token == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(token) => Err(ExprError::parse(
                self.position(),
                format!("expected {}, found {:?}", what, token),
            )),
            None => Err(ExprError::parse(
                self.position(),
                format!("expected {}, found end of input", what),
            )),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let target = self.parse_conditional()?;
        if matches!(self.peek(), Some(Token::Assign)) {
            self.pos += 1;
            let value = self.parse_assignment()?;
            return Ok(Expr::binary(BinaryOp::Assign, target, value));
        }
        Ok(target)
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let test = self.parse_binary(1)?;
        if !matches!(self.peek(), Some(Token::Question)) {
            return Ok(test);
        }
        self.pos += 1;
        let consequent = self.parse_conditional()?;
        self.expect(Token::Colon, "':'")?;
        let alternate = self.parse_conditional()?;
        Ok(Expr::conditional(test, consequent, alternate))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek().and_then(infix_op) {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let right = self.parse_binary(precedence + 1)?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Tilde) => UnaryOp::BitNot,
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(Expr::unary(op, operand))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let position = self.position();
        let Some((token, _)) = self.advance() else {
            return Err(ExprError::parse(position, "unexpected end of input"));
        };
        match token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(*n))),
            Token::Bool(b) => Ok(Expr::Literal(Value::Bool(*b))),
            Token::Str(s) => Ok(Expr::Literal(Value::Text(s.clone()))),
            Token::Ident(name) => Ok(Expr::Identifier(name.to_string())),
            Token::LParen => {
                let inner = self.parse_expression()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(ExprError::parse(
                position,
                format!("unexpected token {:?}", other),
            )),
        }
    }
}

fn infix_op(token: &Token<'_>) -> Option<BinaryOp> {
    let op = match token {
        Token::OrOr => BinaryOp::LogicalOr,
        Token::AndAnd => BinaryOp::LogicalAnd,
        Token::Pipe => BinaryOp::BitOr,
        Token::Caret => BinaryOp::BitXor,
        Token::Amp => BinaryOp::BitAnd,
        Token::EqEq => BinaryOp::Eq,
        Token::EqEqEq => BinaryOp::StrictEq,
        Token::NotEq => BinaryOp::Ne,
        Token::NotEqEq => BinaryOp::StrictNe,
        Token::Lt => BinaryOp::Lt,
        Token::Le => BinaryOp::Le,
        Token::Gt => BinaryOp::Gt,
        Token::Ge => BinaryOp::Ge,
        Token::Shl => BinaryOp::Shl,
        Token::Shr => BinaryOp::Shr,
        Token::UShr => BinaryOp::UShr,
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        Token::Percent => BinaryOp::Rem,
        Token::Hash => BinaryOp::BitTest,
        _ => return None,
    };
    Some(op)
}
