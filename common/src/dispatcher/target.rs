// Invocation target parsing
//
// A target names a registered handler and optionally carries literal
// arguments: `system.clearJobLogs`, `report.build('daily', 30L, true)`.

use crate::errors::DispatchError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static TARGET_PATTERN: OnceLock<Regex> = OnceLock::new();

fn target_pattern() -> &'static Regex {
    TARGET_PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*(?:\((.*)\))?$")
            .expect("invocation target pattern is a valid regex")
    })
}

/// A literal argument in an invocation target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum InvocationArg {
    /// `'text'` or `"text"`
    Str(String),
    /// `true` / `false`
    Bool(bool),
    /// `42L`
    Long(i64),
    /// `1.5D`
    Double(f64),
    /// `42`
    Integer(i32),
}

impl InvocationArg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            InvocationArg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            InvocationArg::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            InvocationArg::Long(v) => Some(*v),
            InvocationArg::Integer(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InvocationArg::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for InvocationArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationArg::Str(s) => write!(f, "'{}'", s),
            InvocationArg::Bool(b) => write!(f, "{}", b),
            InvocationArg::Long(v) => write!(f, "{}L", v),
            InvocationArg::Double(v) => write!(f, "{}D", v),
            InvocationArg::Integer(v) => write!(f, "{}", v),
        }
    }
}

/// Parsed form of a job's invocation target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationTarget {
    /// Registry key, e.g. `system.clearJobLogs`
    pub name: String,
    pub args: Vec<InvocationArg>,
}

impl InvocationTarget {
    pub fn parse(raw: &str) -> Result<Self, DispatchError> {
        let trimmed = raw.trim();
        let invalid = |reason: &str| DispatchError::InvalidTarget {
            target: raw.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("target is empty"));
        }

        let captures = target_pattern()
            .captures(trimmed)
            .ok_or_else(|| invalid("expected `name` or `name(args)`"))?;

        let name = captures[1].to_string();
        let args = match captures.get(2) {
            Some(params) => parse_args(params.as_str()).map_err(|reason| invalid(&reason))?,
            None => Vec::new(),
        };

        Ok(Self { name, args })
    }
}

impl fmt::Display for InvocationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            return write!(f, "{}", self.name);
        }
        let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
        write!(f, "{}({})", self.name, args.join(", "))
    }
}

fn parse_args(params: &str) -> Result<Vec<InvocationArg>, String> {
    if params.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_args(params)?
        .iter()
        .map(|token| parse_arg(token))
        .collect()
}

/// Split on commas that are not inside a quoted string
fn split_args(params: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in params.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                current.push(c);
            }
            (None, ',') => {
                tokens.push(std::mem::take(&mut current));
            }
            (None, c) => current.push(c),
        }
    }

    if quote.is_some() {
        return Err("unterminated string literal".to_string());
    }
    tokens.push(current);
    Ok(tokens)
}

fn parse_arg(token: &str) -> Result<InvocationArg, String> {
    let token = token.trim();
    if token.is_empty() {
        return Err("empty argument".to_string());
    }

    for quote in ['\'', '"'] {
        if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
            return Ok(InvocationArg::Str(token[1..token.len() - 1].to_string()));
        }
    }

    match token {
        "true" => return Ok(InvocationArg::Bool(true)),
        "false" => return Ok(InvocationArg::Bool(false)),
        _ => {}
    }

    if let Some(number) = token.strip_suffix(['L', 'l']) {
        return number
            .parse::<i64>()
            .map(InvocationArg::Long)
            .map_err(|_| format!("invalid long literal `{}`", token));
    }

    if let Some(number) = token.strip_suffix(['D', 'd']) {
        return number
            .parse::<f64>()
            .map(InvocationArg::Double)
            .map_err(|_| format!("invalid double literal `{}`", token));
    }

    token
        .parse::<i32>()
        .map(InvocationArg::Integer)
        .map_err(|_| format!("unsupported argument `{}`", token))
}
