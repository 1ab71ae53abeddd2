//! Recursive-descent parser for change expressions.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expression := term (('+' | '-') term)*
//! term       := unary (('*' | '/' | '%') unary)*
//! unary      := ('+' | '-') unary | power
//! power      := primary ('**' unary)?
//! primary    := NUMBER | 'trigger_value' | 'current_value' | '(' expression ')'
//! ```
//!
//! `**` is right-associative and binds tighter than a unary operator on its
//! left, so `-2 ** 2` is `-(2 ** 2)`.

use super::lexer::{Token, TokenKind, tokenize};
use super::{Ast, BinaryOp, EvalError, UnaryOp, Variable};

/// Deepest accepted nesting of parentheses, unary operators, and powers.
pub const MAX_NESTING: usize = 64;

/// Largest accepted number of tokens.
pub const MAX_TOKENS: usize = 512;

pub(super) fn parse(input: &str) -> Result<Ast, EvalError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(EvalError::Syntax {
            position: 0,
            message: "expression is empty".to_owned(),
        });
    }
    if tokens.len() > MAX_TOKENS {
        return Err(EvalError::TooLong { limit: MAX_TOKENS });
    }

    let mut parser = Parser {
        tokens: &tokens,
        cursor: 0,
        depth: 0,
        end: input.len(),
    };
    let root = parser.expression()?;
    parser
        .advance()
        .map_or(Ok(root), |token| Err(unexpected(token)))
}

struct Parser<'a> {
    tokens: &'a [Token],
    cursor: usize,
    depth: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn expression(&mut self) -> Result<Ast, EvalError> {
        let mut lhs = self.term()?;
        while let Some(op) = self.next_operator(|kind| match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Subtract),
            _ => None,
        }) {
            let rhs = self.term()?;
            lhs = Ast::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Ast, EvalError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.next_operator(|kind| match kind {
            TokenKind::Star => Some(BinaryOp::Multiply),
            TokenKind::Slash => Some(BinaryOp::Divide),
            TokenKind::Percent => Some(BinaryOp::Remainder),
            _ => None,
        }) {
            let rhs = self.unary()?;
            lhs = Ast::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Ast, EvalError> {
        let Some(op) = self.next_operator(|kind| match kind {
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Negate),
            _ => None,
        }) else {
            return self.power();
        };
        let operand = self.nested(Self::unary)?;
        Ok(Ast::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> Result<Ast, EvalError> {
        let base = self.primary()?;
        let raises = self
            .next_operator(|kind| matches!(kind, TokenKind::Power).then_some(BinaryOp::Power))
            .is_some();
        if !raises {
            return Ok(base);
        }
        let exponent = self.nested(Self::unary)?;
        Ok(Ast::binary(BinaryOp::Power, base, exponent))
    }

    fn primary(&mut self) -> Result<Ast, EvalError> {
        let Some(token) = self.advance() else {
            return Err(EvalError::Syntax {
                position: self.end,
                message: "unexpected end of expression".to_owned(),
            });
        };
        match &token.kind {
            TokenKind::Number(value) => Ok(Ast::Number(*value)),
            TokenKind::Name(name) => {
                if self.peek_is(&TokenKind::OpenParen) {
                    return Err(EvalError::UnsupportedConstruct {
                        position: token.position,
                        construct: format!("{name}(...)"),
                    });
                }
                Variable::from_name(name)
                    .map(Ast::Variable)
                    .ok_or_else(|| EvalError::UnsupportedConstruct {
                        position: token.position,
                        construct: name.clone(),
                    })
            }
            TokenKind::OpenParen => {
                let inner = self.nested(Self::expression)?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::CloseParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(unexpected(other)),
                    None => Err(EvalError::Syntax {
                        position: self.end,
                        message: "missing closing ')'".to_owned(),
                    }),
                }
            }
            _ => Err(unexpected(token)),
        }
    }

    fn nested(
        &mut self,
        rule: fn(&mut Self) -> Result<Ast, EvalError>,
    ) -> Result<Ast, EvalError> {
        if self.depth >= MAX_NESTING {
            return Err(EvalError::NestingTooDeep { limit: MAX_NESTING });
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    fn next_operator<T>(&mut self, select: impl Fn(&TokenKind) -> Option<T>) -> Option<T> {
        let selected = select(&self.tokens.get(self.cursor)?.kind)?;
        self.cursor += 1;
        Some(selected)
    }

    fn peek_is(&self, kind: &TokenKind) -> bool {
        self.tokens
            .get(self.cursor)
            .is_some_and(|token| token.kind == *kind)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.cursor)?;
        self.cursor += 1;
        Some(token)
    }
}

fn unexpected(token: &Token) -> EvalError {
    let description = match &token.kind {
        TokenKind::Name(name) => {
            return EvalError::UnsupportedConstruct {
                position: token.position,
                construct: name.clone(),
            };
        }
        TokenKind::Number(value) => value.to_string(),
        TokenKind::Plus => "+".to_owned(),
        TokenKind::Minus => "-".to_owned(),
        TokenKind::Star => "*".to_owned(),
        TokenKind::Power => "**".to_owned(),
        TokenKind::Slash => "/".to_owned(),
        TokenKind::Percent => "%".to_owned(),
        TokenKind::OpenParen => "(".to_owned(),
        TokenKind::CloseParen => ")".to_owned(),
    };
    EvalError::Syntax {
        position: token.position,
        message: format!("unexpected '{description}'"),
    }
}
