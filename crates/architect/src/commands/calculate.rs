//! Arithmetic without code evaluation: a small recursive-descent evaluator.

use crate::commands::prelude::*;

command! {
    name: "calculate",
    description: "Calculate a simple expression, e.g. 3+4, 5-5, 7*7 or (2+3)*4",
    pattern: r"^!calculate\b\s*(.*)$",
    handler: calculate_handler,
}

const USAGE: &str = "Usage: !calculate <expression>\nExample: !calculate 3+4";

pub async fn calculate_handler(body: &str) -> CoreResult<Option<String>> {
    let expression = body
        .trim()
        .strip_prefix("!calculate")
        .unwrap_or_default()
        .trim();
    if expression.is_empty() {
        return Ok(Some(USAGE.to_string()));
    }

    let compact: String = expression.split_whitespace().collect();
    let reply = match evaluate(&compact) {
        Ok(value) => format!("{compact} = {}", format_number(value)),
        Err(CoreError::InvalidInput(message)) => format!("Error: {message}"),
        Err(error) => return Err(error),
    };
    Ok(Some(reply))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
}

fn lex(input: &str) -> CoreResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| invalid(format!("invalid number: {literal}")))?;
                tokens.push(Token::Number(number));
            }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '%' => { tokens.push(Token::Percent); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            other => return Err(invalid(format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

/// Evaluate an arithmetic expression string.
pub fn evaluate(input: &str) -> CoreResult<f64> {
    let tokens = lex(input)?;
    if tokens.is_empty() {
        return Err(invalid("empty expression"));
    }
    let mut pos = 0;
    let result = parse_expr(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(invalid("unexpected tokens after expression"));
    }
    Ok(result)
}

/// Addition/subtraction level.
fn parse_expr(tokens: &[Token], pos: &mut usize) -> CoreResult<f64> {
    let mut left = parse_term(tokens, pos)?;
    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Plus => {
                *pos += 1;
                left += parse_term(tokens, pos)?;
            }
            Token::Minus => {
                *pos += 1;
                left -= parse_term(tokens, pos)?;
            }
            _ => break,
        }
    }
    Ok(left)
}

/// Multiplication/division/modulo level.
fn parse_term(tokens: &[Token], pos: &mut usize) -> CoreResult<f64> {
    let mut left = parse_unary(tokens, pos)?;
    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Star => {
                *pos += 1;
                left *= parse_unary(tokens, pos)?;
            }
            Token::Slash => {
                *pos += 1;
                let right = parse_unary(tokens, pos)?;
                if right == 0.0 {
                    return Err(invalid("division by zero"));
                }
                left /= right;
            }
            Token::Percent => {
                *pos += 1;
                let right = parse_unary(tokens, pos)?;
                if right == 0.0 {
                    return Err(invalid("modulo by zero"));
                }
                left %= right;
            }
            _ => break,
        }
    }
    Ok(left)
}

fn parse_unary(tokens: &[Token], pos: &mut usize) -> CoreResult<f64> {
    if tokens.get(*pos) == Some(&Token::Minus) {
        *pos += 1;
        return Ok(-parse_unary(tokens, pos)?);
    }
    parse_primary(tokens, pos)
}

/// Number or parenthesized expression.
fn parse_primary(tokens: &[Token], pos: &mut usize) -> CoreResult<f64> {
    match tokens.get(*pos) {
        Some(Token::Number(n)) => {
            let value = *n;
            *pos += 1;
            Ok(value)
        }
        Some(Token::LParen) => {
            *pos += 1;
            let value = parse_expr(tokens, pos)?;
            if tokens.get(*pos) != Some(&Token::RParen) {
                return Err(invalid("missing closing parenthesis"));
            }
            *pos += 1;
            Ok(value)
        }
        Some(_) => Err(invalid("unexpected operator")),
        None => Err(invalid("unexpected end of expression")),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::InvalidInput(message.into())
}
