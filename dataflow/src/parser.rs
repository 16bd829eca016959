// Parser for tensor expressions.
//
// Splits one level of an expression into what it applies and the text of
// each argument. The scan is text-level: an explicit stack keyed by bracket
// kind finds the top-level bracket groups, and commas/colons are split only
// at depth zero of the relevant group. Quoted strings are skipped whole.
//
// Preconditions: none.
// Postconditions: argument text is trimmed and in source order; keyword
//   arguments are keyed by name and never mixed into the positional list.
// Failure modes: unbalanced or mismatched delimiters, unsupported subscript
//   or tuple forms, and repeated keywords produce `ParseError`.
// Side effects: none.

use std::collections::BTreeMap;

use crate::ast::{CallTarget, ParsedCall, Primitive, Signature};
use crate::error::ParseError;

/// A top-level bracket group: byte offsets of its opener and closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Group {
    kind: u8,
    open: usize,
    close: usize,
}

fn closer(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}

/// Parse the top level of `text`.
pub fn parse(text: &str) -> Result<ParsedCall, ParseError> {
    let expr = text.trim();
    if expr.is_empty() {
        return Err(ParseError::Empty);
    }
    let groups = top_level_groups(expr)?;
    let Some(last) = groups.last().copied() else {
        return Ok(ParsedCall::leaf(expr));
    };
    if last.close != expr.len() - 1 {
        return Err(ParseError::Unsupported(expr.to_string()));
    }

    let prefix = expr[..last.open].trim();
    let inner = &expr[last.open + 1..last.close];
    match (last.kind, prefix.is_empty()) {
        (b'(', true) => parse_tuple(expr, inner),
        (b'(', false) if is_dotted_name(prefix) => parse_function(expr, prefix, inner),
        (b'[', false) => parse_subscript(expr, prefix, inner),
        // A list display is a literal.
        (b'[', true) => Ok(ParsedCall::leaf(expr)),
        _ => Err(ParseError::Unsupported(expr.to_string())),
    }
}

/// Read a list display such as `[in1, in2]` as the tuple primitive of its
/// items. Returns `None` when `text` is not a single bracketed list.
///
/// Only used once the display failed to evaluate as a literal, so lists of
/// constants stay constants.
pub fn parse_list_display(text: &str) -> Result<Option<ParsedCall>, ParseError> {
    let expr = text.trim();
    let groups = top_level_groups(expr)?;
    let list = match groups.as_slice() {
        [only] if only.kind == b'[' && only.open == 0 && only.close + 1 == expr.len() => *only,
        _ => return Ok(None),
    };
    let (items, _) = split_items(&expr[list.open + 1..list.close])
        .ok_or_else(|| ParseError::Unsupported(expr.to_string()))?;
    let primitive =
        Primitive::tuple(items.len()).ok_or_else(|| ParseError::TupleArity(expr.to_string()))?;
    Ok(Some(ParsedCall {
        target: CallTarget::Primitive(primitive),
        args: items,
        kwargs: BTreeMap::new(),
    }))
}

/// Split a catalog signature. Unlike calls, formals may follow fixed
/// keywords.
pub fn parse_signature(text: &str) -> Result<Signature, ParseError> {
    let expr = text.trim();
    let unsupported = || ParseError::Unsupported(expr.to_string());
    let groups = top_level_groups(expr)?;
    let call = match groups.as_slice() {
        [only] if only.kind == b'(' && only.close + 1 == expr.len() => *only,
        _ => return Err(unsupported()),
    };
    let function = expr[..call.open].trim();
    if !is_dotted_name(function) {
        return Err(unsupported());
    }
    let (items, _) = split_items(&expr[call.open + 1..call.close]).ok_or_else(unsupported)?;

    let mut formals = Vec::new();
    let mut constants = Vec::new();
    let mut leading = None;
    for item in &items {
        match keyword_split(item) {
            Some((name, value)) => {
                leading.get_or_insert(formals.len());
                constants.push((name.to_string(), value.to_string()));
            }
            None if is_identifier(item) => formals.push(item.clone()),
            None => return Err(unsupported()),
        }
    }
    let leading = leading.unwrap_or(formals.len());
    Ok(Signature {
        function: function.to_string(),
        formals,
        constants,
        leading,
    })
}

// ── Scanning ──

fn top_level_groups(expr: &str) -> Result<Vec<Group>, ParseError> {
    let bytes = expr.as_bytes();
    let mut stack: Vec<(u8, usize)> = Vec::new();
    let mut groups = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' | b'[' | b'{' => stack.push((b, i)),
            b')' | b']' | b'}' => {
                let mismatched = || ParseError::Mismatched {
                    expression: expr.to_string(),
                    found: b as char,
                };
                let (open, at) = stack.pop().ok_or_else(mismatched)?;
                if closer(open) != b {
                    return Err(mismatched());
                }
                if stack.is_empty() {
                    groups.push(Group {
                        kind: open,
                        open: at,
                        close: i,
                    });
                }
            }
            _ => {}
        }
        i += 1;
    }

    if quote.is_some() {
        return Err(ParseError::UnterminatedString(expr.to_string()));
    }
    if !stack.is_empty() {
        return Err(ParseError::Unbalanced(expr.to_string()));
    }
    Ok(groups)
}

/// Split `s` on `sep` outside brackets and strings. `s` must be balanced.
fn split_top_level(s: &str, sep: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b if b == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    parts.push(&s[start..]);
    parts
}

/// Comma-separated items, tolerating one trailing comma. `None` when an item
/// is empty.
fn split_items(inner: &str) -> Option<(Vec<String>, bool)> {
    if inner.trim().is_empty() {
        return Some((Vec::new(), false));
    }
    let mut parts: Vec<&str> = split_top_level(inner, b',');
    let trailing = parts.len() > 1 && parts.last().is_some_and(|p| p.trim().is_empty());
    if trailing {
        parts.pop();
    }
    if parts.iter().any(|p| p.trim().is_empty()) {
        return None;
    }
    Some((parts.into_iter().map(|p| p.trim().to_string()).collect(), trailing))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_dotted_name(s: &str) -> bool {
    s.split('.').all(is_identifier)
}

/// `name=value` when an assignment appears before any nested delimiter.
fn keyword_split(arg: &str) -> Option<(&str, &str)> {
    let bytes = arg.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' | b'\'' | b'"' => return None,
            b'=' => {
                let next_is_eq = bytes.get(i + 1) == Some(&b'=');
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                if next_is_eq || matches!(prev, b'<' | b'>' | b'!' | b'=') {
                    return None;
                }
                let name = arg[..i].trim();
                return is_identifier(name).then(|| (name, arg[i + 1..].trim()));
            }
            _ => {}
        }
    }
    None
}

// ── Forms ──

fn parse_tuple(expr: &str, inner: &str) -> Result<ParsedCall, ParseError> {
    let (items, trailing) =
        split_items(inner).ok_or_else(|| ParseError::Unsupported(expr.to_string()))?;
    if items.len() == 1 && !trailing {
        // Parenthesized expression, not a tuple.
        return parse(&items[0]);
    }
    let primitive =
        Primitive::tuple(items.len()).ok_or_else(|| ParseError::TupleArity(expr.to_string()))?;
    Ok(ParsedCall {
        target: CallTarget::Primitive(primitive),
        args: items,
        kwargs: BTreeMap::new(),
    })
}

fn parse_function(expr: &str, name: &str, inner: &str) -> Result<ParsedCall, ParseError> {
    let (items, _) =
        split_items(inner).ok_or_else(|| ParseError::Unsupported(expr.to_string()))?;
    let mut args = Vec::new();
    let mut kwargs = BTreeMap::new();
    for item in &items {
        match keyword_split(item) {
            Some((key, value)) => {
                if kwargs.insert(key.to_string(), value.to_string()).is_some() {
                    return Err(ParseError::DuplicateKeyword {
                        expression: expr.to_string(),
                        name: key.to_string(),
                    });
                }
            }
            None if !kwargs.is_empty() => {
                return Err(ParseError::PositionalAfterKeyword(expr.to_string()));
            }
            None => args.push(item.clone()),
        }
    }
    Ok(ParsedCall {
        target: CallTarget::Function(name.to_string()),
        args,
        kwargs,
    })
}

fn parse_subscript(expr: &str, target: &str, inner: &str) -> Result<ParsedCall, ParseError> {
    let unsupported = || ParseError::Subscript(expr.to_string());
    let parts = split_top_level(inner, b',');
    let (body, axis1) = match parts.as_slice() {
        [body] => (*body, false),
        [skip, body] if skip.trim() == ":" => (*body, true),
        _ => return Err(unsupported()),
    };

    let pieces: Vec<&str> = split_top_level(body, b':').into_iter().map(str::trim).collect();
    let (primitive, bounds): (Primitive, Vec<&str>) = match pieces.as_slice() {
        [index] if !index.is_empty() => {
            let p = if axis1 { Primitive::IndexAxis1 } else { Primitive::Index };
            (p, vec![*index])
        }
        [start, ""] if !start.is_empty() => {
            let p = if axis1 { Primitive::SliceFromAxis1 } else { Primitive::SliceFrom };
            (p, vec![*start])
        }
        ["", stop] if !stop.is_empty() => {
            let p = if axis1 { Primitive::SliceToAxis1 } else { Primitive::SliceTo };
            (p, vec![*stop])
        }
        [start, stop] if !start.is_empty() && !stop.is_empty() => {
            let p = if axis1 {
                Primitive::SliceBetweenAxis1
            } else {
                Primitive::SliceBetween
            };
            (p, vec![*start, *stop])
        }
        _ => return Err(unsupported()),
    };

    let mut args = vec![target.to_string()];
    args.extend(bounds.into_iter().map(str::to_string));
    Ok(ParsedCall {
        target: CallTarget::Primitive(primitive),
        args,
        kwargs: BTreeMap::new(),
    })
}

// ── Tests ──
