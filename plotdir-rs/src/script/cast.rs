//! Parameter casting: raw script tokens → typed [`Value`] argument lists.
//!
//! Each command or option name maps to a fixed, ordered list of
//! [`Converter`]s.  The list length is the command's arity:
//!
//! * A name with no entry yields an empty argument list no matter how many
//!   tokens were supplied.
//! * Fewer tokens than converters is a [`CastError::MissingArgument`].
//! * Tokens beyond the arity are ignored.
//!
//! | Name(s) | Converters |
//! |---------|------------|
//! | `speed_pendown` … `units` (integer options), `delay` | `[Int]` |
//! | `const_speed` | `[Bool]` |
//! | `load_config`, `usb_command`, `usb_query` | `[Identity]` |
//! | `goto`, `moveto`, `lineto`, `go`, `move`, `line` | `[Float, Float]` |
//! | `draw_path` | `[PathLiteral]` |

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use super::value::Value;

// ── Converter ─────────────────────────────────────────────────────────────────

/// A pure token → value conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    Int,
    Float,
    Bool,
    /// Pass the token through unchanged as a string.
    Identity,
    /// A list of coordinate pairs, e.g. `[(0,0),(10,5.5)]`.
    PathLiteral,
}

/// A failure converting one token, or a short token list.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CastError {
    #[error("argument index {index} out of range ({command} takes {arity})")]
    MissingArgument { command: String, index: usize, arity: usize },
    #[error("invalid integer literal: '{0}'")]
    InvalidInt(String),
    #[error("could not convert string to float: '{0}'")]
    InvalidFloat(String),
    #[error("invalid boolean literal: '{0}'")]
    InvalidBool(String),
    #[error("malformed path literal '{literal}': {reason}")]
    MalformedLiteral { literal: String, reason: String },
}

impl Converter {
    /// Apply this converter to one raw token.
    pub fn convert(self, token: &str) -> Result<Value, CastError> {
        match self {
            Converter::Int => token
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| CastError::InvalidInt(token.to_owned())),
            Converter::Float => token
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| CastError::InvalidFloat(token.to_owned())),
            Converter::Bool => parse_bool(token)
                .map(Value::Bool)
                .ok_or_else(|| CastError::InvalidBool(token.to_owned())),
            Converter::Identity => Ok(Value::Str(token.to_owned())),
            Converter::PathLiteral => parse_path_literal(token).map(Value::Path),
        }
    }
}

// ── Cast table ────────────────────────────────────────────────────────────────

const INT: &[Converter] = &[Converter::Int];
const BOOL: &[Converter] = &[Converter::Bool];
const IDENTITY: &[Converter] = &[Converter::Identity];
const XY: &[Converter] = &[Converter::Float, Converter::Float];
const PATH: &[Converter] = &[Converter::PathLiteral];

/// The converters registered for `name`, or `None` if it takes no typed
/// arguments.
pub fn converters_for(name: &str) -> Option<&'static [Converter]> {
    let convs = match name {
        "speed_pendown" | "speed_penup" | "accel" | "pen_pos_down" | "pen_pos_up"
        | "pen_rate_lower" | "pen_rate_raise" | "pen_delay_down" | "pen_delay_up"
        | "model" | "penlift" | "port" | "port_config" | "units" => INT,
        "const_speed" => BOOL,
        "load_config" | "usb_command" | "usb_query" => IDENTITY,
        "goto" | "moveto" | "lineto" | "go" | "move" | "line" => XY,
        "draw_path" => PATH,
        "delay" => INT,
        _ => return None,
    };
    Some(convs)
}

/// Convert `tokens` positionally using the converters registered for `name`.
pub fn cast_params<S: AsRef<str>>(name: &str, tokens: &[S]) -> Result<Vec<Value>, CastError> {
    let Some(convs) = converters_for(name) else {
        return Ok(Vec::new());
    };
    convs
        .iter()
        .enumerate()
        .map(|(index, conv)| {
            let token = tokens.get(index).ok_or_else(|| CastError::MissingArgument {
                command: name.to_owned(),
                index,
                arity: convs.len(),
            })?;
            conv.convert(token.as_ref())
        })
        .collect()
}

// ── Token parsers ─────────────────────────────────────────────────────────────

fn parse_bool(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tok {
    Open(char),
    Close(char),
    Comma,
    Num(f64),
}

fn path_lexer() -> &'static Regex {
    static LEXER: OnceLock<Regex> = OnceLock::new();
    LEXER.get_or_init(|| {
        Regex::new(r"\s*(?:([\[\]()])|(,)|([^\[\](),\s]+))").expect("path lexer regex is valid")
    })
}

fn lex_path(src: &str) -> Result<Vec<Tok>, String> {
    let mut toks = Vec::new();
    for caps in path_lexer().captures_iter(src) {
        if let Some(m) = caps.get(1) {
            let ch = m.as_str().chars().next().unwrap_or('[');
            toks.push(if matches!(ch, '[' | '(') { Tok::Open(ch) } else { Tok::Close(ch) });
        } else if caps.get(2).is_some() {
            toks.push(Tok::Comma);
        } else if let Some(m) = caps.get(3) {
            let n = m
                .as_str()
                .parse::<f64>()
                .map_err(|_| format!("unexpected token '{}'", m.as_str()))?;
            toks.push(Tok::Num(n));
        }
    }
    Ok(toks)
}

fn closer(open: char) -> char {
    if open == '[' { ']' } else { ')' }
}

/// Parse a list-of-pairs literal: `[(x, y), …]`, `((x, y), …)`, or the same
/// with square-bracket pairs.  A trailing comma is allowed at either level.
pub fn parse_path_literal(src: &str) -> Result<Vec<(f64, f64)>, CastError> {
    let malformed = |reason: String| CastError::MalformedLiteral {
        literal: src.to_owned(),
        reason,
    };
    let toks = lex_path(src).map_err(malformed)?;
    let mut pos = 0;

    let outer = match toks.first() {
        Some(Tok::Open(c)) => *c,
        _ => return Err(malformed("expected '[' or '('".into())),
    };
    pos += 1;

    let mut points = Vec::new();
    loop {
        match toks.get(pos) {
            Some(Tok::Close(c)) if *c == closer(outer) => {
                pos += 1;
                break;
            }
            Some(Tok::Open(inner)) => {
                let inner = *inner;
                let (x, y) = match (toks.get(pos + 1), toks.get(pos + 2), toks.get(pos + 3)) {
                    (Some(Tok::Num(x)), Some(Tok::Comma), Some(Tok::Num(y))) => (*x, *y),
                    _ => return Err(malformed(format!("point {} is not an (x, y) pair", points.len()))),
                };
                pos += 4;
                if toks.get(pos) == Some(&Tok::Comma) {
                    pos += 1;
                }
                if toks.get(pos) != Some(&Tok::Close(closer(inner))) {
                    return Err(malformed(format!("point {} is not an (x, y) pair", points.len())));
                }
                pos += 1;
                points.push((x, y));

                match toks.get(pos) {
                    Some(Tok::Comma) => pos += 1,
                    Some(Tok::Close(_)) => {}
                    _ => return Err(malformed("expected ',' between points".into())),
                }
            }
            Some(_) => return Err(malformed(format!("point {} is not an (x, y) pair", points.len()))),
            None => return Err(malformed("unexpected end of literal".into())),
        }
    }

    if pos != toks.len() {
        return Err(malformed("trailing characters after literal".into()));
    }
    Ok(points)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
