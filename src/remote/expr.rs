//! Minimal pointer-expression evaluator.
//!
//! Accepts terms joined by `+` and `-`, where a term is a `0x` hex literal
//! or a decimal literal: `0x7f001000 + 0x40 - 16`. Backends with symbol
//! knowledge override `RemoteMemory::evaluate_pointer_expression` instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("expected a number after '{0}'")]
    DanglingOperator(char),
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("address arithmetic overflows")]
    Overflow,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Sub,
}

/// Evaluate `text` to an address.
pub fn evaluate(text: &str) -> Result<u64, ExprError> {
    let mut chars = text.char_indices().peekable();
    let mut acc: Option<u64> = None;
    let mut pending = Op::Add;
    let mut last_op: Option<char> = None;

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '+' | '-' => {
                if acc.is_none() || last_op.is_some() {
                    return Err(ExprError::UnexpectedChar(c));
                }
                pending = if c == '+' { Op::Add } else { Op::Sub };
                last_op = Some(c);
                chars.next();
            }
            c if c.is_ascii_alphanumeric() => {
                if acc.is_some() && last_op.is_none() {
                    return Err(ExprError::UnexpectedChar(c));
                }
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = parse_number(&text[start..end])?;
                acc = Some(match (acc, pending) {
                    (None, _) => value,
                    (Some(a), Op::Add) => a.checked_add(value).ok_or(ExprError::Overflow)?,
                    (Some(a), Op::Sub) => a.checked_sub(value).ok_or(ExprError::Overflow)?,
                });
                last_op = None;
            }
            other => return Err(ExprError::UnexpectedChar(other)),
        }
    }

    if let Some(op) = last_op {
        return Err(ExprError::DanglingOperator(op));
    }
    acc.ok_or(ExprError::Empty)
}

fn parse_number(token: &str) -> Result<u64, ExprError> {
    let cleaned = token.replace('_', "");
    let parsed = if let Some(hex) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else {
        cleaned.parse::<u64>()
    };
    parsed.map_err(|_| ExprError::InvalidNumber(token.to_string()))
}
