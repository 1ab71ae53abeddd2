//! Tokenizer for change expressions.

use super::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum TokenKind {
    Number(f64),
    Name(String),
    Plus,
    Minus,
    Star,
    Power,
    Slash,
    Percent,
    OpenParen,
    CloseParen,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Token {
    pub(super) kind: TokenKind,
    pub(super) position: usize,
}

pub(super) fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut characters = input.char_indices().peekable();

    while let Some((position, character)) = characters.next() {
        let digit_follows = characters
            .peek()
            .is_some_and(|&(_, next)| next.is_ascii_digit());
        let kind = match character {
            _ if character.is_whitespace() => continue,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '%' => TokenKind::Percent,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '*' => {
                if characters.next_if(|&(_, next)| next == '*').is_some() {
                    TokenKind::Power
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if characters.next_if(|&(_, next)| next == '/').is_some() {
                    return Err(unsupported(position, "//"));
                }
                TokenKind::Slash
            }
            '.' if !digit_follows => return Err(unsupported(position, ".")),
            '0'..='9' | '.' => {
                let mut literal = String::from(character);
                while let Some((_, next)) = characters.next_if(|&(_, next)| {
                    next.is_ascii_digit() || next == '.' || next == '_'
                }) {
                    literal.push(next);
                }
                if let Some((_, marker)) = characters.next_if(|&(_, next)| matches!(next, 'e' | 'E'))
                {
                    literal.push(marker);
                    if let Some((_, sign)) =
                        characters.next_if(|&(_, next)| matches!(next, '+' | '-'))
                    {
                        literal.push(sign);
                    }
                    while let Some((_, digit)) =
                        characters.next_if(|&(_, next)| next.is_ascii_digit())
                    {
                        literal.push(digit);
                    }
                }
                TokenKind::Number(parse_number(position, &literal)?)
            }
            _ if character.is_alphabetic() || character == '_' => {
                let mut name = String::from(character);
                while let Some((_, next)) =
                    characters.next_if(|&(_, next)| next.is_alphanumeric() || next == '_')
                {
                    name.push(next);
                }
                TokenKind::Name(name)
            }
            other => return Err(unsupported(position, &other.to_string())),
        };
        tokens.push(Token { kind, position });
    }

    Ok(tokens)
}

fn parse_number(position: usize, literal: &str) -> Result<f64, EvalError> {
    let invalid = || EvalError::Syntax {
        position,
        message: format!("invalid numeric literal '{literal}'"),
    };
    if literal.starts_with('_') || literal.ends_with('_') || literal.contains("__") {
        return Err(invalid());
    }
    literal
        .replace('_', "")
        .parse::<f64>()
        .map_err(|_| invalid())
}

fn unsupported(position: usize, construct: &str) -> EvalError {
    EvalError::UnsupportedConstruct {
        position,
        construct: construct.to_owned(),
    }
}
