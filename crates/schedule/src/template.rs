// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template variable interpolation.
//!
//! Renders `{{ … }}` placeholders against a context variable map. Supported
//! inside a placeholder:
//!
//! - variable paths with attribute/index access: `{{ _event.user }}`,
//!   `{{ items.0 }}`, `{{ items[2] }}`
//! - a `default` filter: `{{ c|default(0) }}`
//! - literals: integers, floats, single/double-quoted strings
//! - binary arithmetic `+ - * /` with the usual precedence:
//!   `{{ c|default(0) + 1 }}`
//!
//! Rendering is deterministic and side-effect-free. A placeholder that cannot
//! be resolved is left as-is, so rendering is idempotent on strings without
//! placeholders and unresolved templates stay visible in output.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Placeholder pattern. Non-greedy so adjacent placeholders split correctly.
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("constant regex pattern is valid"));

/// Interpolate `{{ … }}` placeholders with values from the vars map.
///
/// Unresolvable placeholders are left as-is.
pub fn render(template: &str, vars: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            match eval_expr(&caps[1], vars) {
                Some(value) => value_to_string(&value),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

/// Render every string in a JSON tree, including map keys' values but not
/// the keys themselves. Instruction records pass through here before
/// execution so earlier instructions in a block can affect later arguments.
pub fn render_value(value: &Value, vars: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, vars)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| render_value(v, vars)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter().map(|(k, v)| (k.clone(), render_value(v, vars))).collect(),
        ),
        other => other.clone(),
    }
}

/// True if the string contains at least one placeholder.
pub fn has_placeholders(template: &str) -> bool {
    PLACEHOLDER.is_match(template)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Arrays and maps render as JSON
        other => other.to_string(),
    }
}

// --- expression evaluation ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(Value),
    Str(String),
    Op(char),
    Pipe,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j >= chars.len() {
                    return None;
                }
                tokens.push(Token::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            '0'..='9' => {
                let start = i;
                let mut j = i;
                let mut saw_dot = false;
                while j < chars.len()
                    && (chars[j].is_ascii_digit() || (chars[j] == '.' && !saw_dot))
                {
                    if chars[j] == '.' {
                        // A dot followed by a non-digit belongs to a path, not
                        // a float; numbers never start paths though, so only
                        // accept digit.dot.digit shapes.
                        if j + 1 >= chars.len() || !chars[j + 1].is_ascii_digit() {
                            break;
                        }
                        saw_dot = true;
                    }
                    j += 1;
                }
                let text: String = chars[start..j].iter().collect();
                let number = if saw_dot {
                    text.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number)
                } else {
                    text.parse::<i64>().ok().map(|n| Value::Number(n.into()))
                };
                tokens.push(Token::Number(number?));
                i = j;
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                let mut j = i;
                while j < chars.len()
                    && (chars[j].is_alphanumeric()
                        || chars[j] == '_'
                        || chars[j] == '.'
                        || chars[j] == '['
                        || chars[j] == ']'
                        || chars[j] == '\''
                        || chars[j] == '"')
                {
                    j += 1;
                }
                tokens.push(Token::Ident(chars[start..j].iter().collect()));
                i = j;
            }
            _ => return None,
        }
    }
    Some(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    vars: &'a Map<String, Value>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// additive := multiplicative (('+' | '-') multiplicative)*
    fn additive(&mut self) -> Option<Value> {
        let mut acc = self.multiplicative()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.multiplicative()?;
            acc = apply_op(&acc, op, &rhs)?;
        }
        Some(acc)
    }

    /// multiplicative := operand (('*' | '/') operand)*
    fn multiplicative(&mut self) -> Option<Value> {
        let mut acc = self.operand()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.operand()?;
            acc = apply_op(&acc, op, &rhs)?;
        }
        Some(acc)
    }

    /// operand := primary ('|' 'default' '(' literal ')')*
    fn operand(&mut self) -> Option<Value> {
        let mut value = self.primary();
        while matches!(self.peek(), Some(Token::Pipe)) {
            self.pos += 1;
            let filter = match self.next() {
                Some(Token::Ident(name)) => name.clone(),
                _ => return None,
            };
            match filter.as_str() {
                "default" => {
                    if !matches!(self.next(), Some(Token::LParen)) {
                        return None;
                    }
                    let fallback = self.primary();
                    if !matches!(self.next(), Some(Token::RParen)) {
                        return None;
                    }
                    if value.is_none() || value == Some(Value::Null) {
                        value = fallback;
                    }
                }
                _ => return None,
            }
        }
        value
    }

    /// primary := literal | path — a missing path yields None so `default`
    /// can rescue it.
    fn primary(&mut self) -> Option<Value> {
        match self.next()? {
            Token::Number(n) => Some(n.clone()),
            Token::Str(s) => Some(Value::String(s.clone())),
            Token::Ident(path) => lookup_path(path, self.vars),
            _ => None,
        }
    }
}

fn eval_expr(expr: &str, vars: &Map<String, Value>) -> Option<Value> {
    let tokens = tokenize(expr.trim())?;
    if tokens.is_empty() {
        return None;
    }
    let mut parser = Parser { tokens: &tokens, pos: 0, vars };
    let value = parser.additive()?;
    if parser.pos != tokens.len() {
        return None;
    }
    Some(value)
}

fn apply_op(lhs: &Value, op: char, rhs: &Value) -> Option<Value> {
    // String concatenation for '+'
    if op == '+' {
        if let (Value::String(a), b) = (lhs, rhs) {
            return Some(Value::String(format!("{}{}", a, value_to_string(b))));
        }
        if let (a, Value::String(b)) = (lhs, rhs) {
            return Some(Value::String(format!("{}{}", value_to_string(a), b)));
        }
    }

    // Integer arithmetic stays integral except division
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        if op != '/' {
            let result = match op {
                '+' => a.checked_add(b)?,
                '-' => a.checked_sub(b)?,
                '*' => a.checked_mul(b)?,
                _ => return None,
            };
            return Some(Value::Number(result.into()));
        }
    }

    let a = lhs.as_f64()?;
    let b = rhs.as_f64()?;
    let result = match op {
        '+' => a + b,
        '-' => a - b,
        '*' => a * b,
        '/' => {
            if b == 0.0 {
                return None;
            }
            a / b
        }
        _ => return None,
    };
    serde_json::Number::from_f64(result).map(Value::Number)
}

/// Look up a dotted/indexed path (`a.b.0`, `a[0]`, `a['key']`) in the vars.
fn lookup_path(path: &str, vars: &Map<String, Value>) -> Option<Value> {
    let mut segments = Vec::new();
    for dotted in path.split('.') {
        let mut rest = dotted;
        // Peel `name[idx]` / `name['key']` suffixes
        while let Some(open) = rest.find('[') {
            if open > 0 {
                segments.push(&rest[..open]);
            }
            let close = rest.find(']')?;
            segments.push(rest[open + 1..close].trim_matches(|c| c == '\'' || c == '"'));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(rest);
        }
    }

    let mut iter = segments.into_iter();
    let mut current = vars.get(iter.next()?)?.clone();
    for segment in iter {
        current = match &current {
            Value::Object(map) => map.get(segment)?.clone(),
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?.clone()
            }
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
