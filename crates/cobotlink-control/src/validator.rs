//! Motion payload validation.
//!
//! Payloads arrive either as the literal text of a numeric sequence, e.g.
//! `"[-0.12, -0.43, 0.14, 0, 3.11, 0.14]"`, or as an already decoded JSON
//! array. Both forms must hold exactly six finite numbers.

use serde_json::Value;
use tracing::{debug, warn};

use crate::command::{MotionCommand, MotionKind, TARGET_LEN};

/// Payload rejection reasons.
///
/// Both variants surface as [`crate::ControlError::InvalidPayload`]; they are
/// kept apart so logs can tell syntax errors from arity errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayloadError {
    #[error("malformed literal: {0}")]
    Malformed(String),

    #[error("expected {TARGET_LEN} values, got {0}")]
    WrongArity(usize),
}

/// Parses raw payloads into [`MotionCommand`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandValidator;

impl CommandValidator {
    /// Parse a payload value of either textual or array form.
    pub fn parse(kind: MotionKind, payload: &Value) -> Result<MotionCommand, PayloadError> {
        let values = match payload {
            Value::String(text) => parse_literal(text),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_f64()
                        .ok_or_else(|| PayloadError::Malformed(format!("not a number: {}", item)))
                })
                .collect(),
            other => Err(PayloadError::Malformed(format!(
                "expected a sequence, got {}",
                other
            ))),
        };
        Self::build(kind, values)
    }

    /// Parse the literal text of a numeric sequence.
    pub fn parse_str(kind: MotionKind, payload: &str) -> Result<MotionCommand, PayloadError> {
        Self::build(kind, parse_literal(payload))
    }

    fn build(
        kind: MotionKind,
        values: Result<Vec<f64>, PayloadError>,
    ) -> Result<MotionCommand, PayloadError> {
        let values = values.inspect_err(|e| {
            warn!(kind = %kind, error = %e, "Rejected malformed motion payload");
        })?;

        if values.iter().any(|v| !v.is_finite()) {
            let err = PayloadError::Malformed("non-finite component".to_string());
            warn!(kind = %kind, error = %err, "Rejected malformed motion payload");
            return Err(err);
        }

        let target: [f64; TARGET_LEN] = values.try_into().map_err(|values: Vec<f64>| {
            warn!(kind = %kind, length = values.len(), "Rejected motion payload with wrong arity");
            PayloadError::WrongArity(values.len())
        })?;

        debug!(kind = %kind, ?target, "Validated motion payload");
        Ok(MotionCommand::new(kind, target))
    }
}

/// Parse a numeric sequence literal: a list (`[...]`), a tuple (`(...)`) or
/// a bare comma separated tuple such as `1, 2, 3, 4, 5, 6`. A single trailing
/// comma is allowed. A tuple needs at least one comma, so `(1)` and `1` are
/// plain numbers, not sequences.
fn parse_literal(text: &str) -> Result<Vec<f64>, PayloadError> {
    let trimmed = text.trim();
    let not_a_sequence = || PayloadError::Malformed(format!("not a sequence literal: {:?}", text));
    if trimmed.is_empty() {
        return Err(not_a_sequence());
    }

    let (inner, is_tuple) = if let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        (inner.trim(), false)
    } else if let Some(inner) = trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        (inner.trim(), true)
    } else {
        (trimmed, true)
    };

    if inner.is_empty() {
        return Ok(Vec::new());
    }
    if is_tuple && !inner.contains(',') {
        return Err(not_a_sequence());
    }
    let inner = inner.strip_suffix(',').unwrap_or(inner);

    inner.split(',').map(parse_number).collect()
}

/// Parse one element: an optional sign, which may be followed by whitespace,
/// and a decimal integer or float literal.
fn parse_number(token: &str) -> Result<f64, PayloadError> {
    let token = token.trim();
    let invalid = || PayloadError::Malformed(format!("invalid element {:?}", token));

    let (negative, unsigned) = match token.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, token.strip_prefix('+').map_or(token, str::trim_start)),
    };
    let numeral = decimal_numeral(unsigned).ok_or_else(invalid)?;
    let value: f64 = numeral.parse().map_err(|_| invalid())?;
    Ok(if negative { -value } else { value })
}

/// Validate a decimal literal and return it with `_` separators removed.
///
/// Separators are only allowed between two digits. Integers other than zero
/// may not have leading zeros (`012`), floats may (`012.5`). Returns `None`
/// for anything else, including `inf` and `nan`.
fn decimal_numeral(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    let mut out = String::with_capacity(text.len());
    let mut is_integer = true;

    let int_digits = digit_part(bytes, &mut pos, &mut out);
    let mut frac_digits = 0;
    if bytes.get(pos) == Some(&b'.') {
        is_integer = false;
        out.push('.');
        pos += 1;
        frac_digits = digit_part(bytes, &mut pos, &mut out);
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        is_integer = false;
        out.push('e');
        pos += 1;
        if let Some(&sign @ (b'+' | b'-')) = bytes.get(pos) {
            out.push(sign as char);
            pos += 1;
        }
        if digit_part(bytes, &mut pos, &mut out) == 0 {
            return None;
        }
    }

    if pos != bytes.len() {
        return None;
    }
    if is_integer && out.len() > 1 && out.starts_with('0') && out.bytes().any(|b| b != b'0') {
        return None;
    }
    Some(out)
}

/// Consume digits with single `_` separators between them. Returns the
/// number of digits read.
fn digit_part(bytes: &[u8], pos: &mut usize, out: &mut String) -> usize {
    let mut count = 0;
    while let Some(&b) = bytes.get(*pos) {
        if b.is_ascii_digit() {
            out.push(b as char);
            count += 1;
            *pos += 1;
        } else if b == b'_' && count > 0 && bytes.get(*pos + 1).is_some_and(u8::is_ascii_digit) {
            *pos += 1;
        } else {
            break;
        }
    }
    count
}
