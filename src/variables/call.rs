//! Parsing of `name(key=literal, ...)` function invocations.
//!
//! Argument values are literals only: strings (single or double quoted), integers,
//! floats, booleans (`true`/`True`), null (`null`/`None`), and lists `[..]`, tuples
//! `(..)` and maps `{k: v}` of literals. Identifiers, operators and nested calls are
//! rejected, as are positional arguments.

use serde_json::{Map, Number, Value};

use crate::core::StackyardError;
use crate::functions::FunctionArgs;

/// A parsed function invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: FunctionArgs,
}

impl FunctionCall {
    /// Parse `name(key=value, ...)`. A bare `name` is a call without arguments.
    pub fn parse(text: &str) -> Result<Self, StackyardError> {
        let text = text.trim();
        let name = Self::parse_name(text)?;

        let Some(open) = text.find('(') else {
            return Ok(Self {
                name,
                arguments: FunctionArgs::new(),
            });
        };

        let close = text.rfind(')').ok_or_else(|| malformed(text, "missing closing ')'"))?;
        if close != text.len() - 1 {
            return Err(malformed(text, "unexpected text after closing ')'"));
        }
        if close < open {
            return Err(malformed(text, "unbalanced parentheses"));
        }

        let arguments = ArgumentParser::new(&text[open + 1..close])
            .parse_keywords()
            .map_err(|reason| malformed(text, &reason))?;

        Ok(Self {
            name,
            arguments,
        })
    }

    /// Extract only the function name (the text before the first `(`).
    pub fn parse_name(text: &str) -> Result<String, StackyardError> {
        let text = text.trim();
        let name = text.split('(').next().unwrap_or_default().trim();

        let mut chars = name.chars();
        let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if !valid_start || !valid_rest {
            return Err(malformed(text, "expected a function name"));
        }

        Ok(name.to_string())
    }
}

fn malformed(call: &str, reason: &str) -> StackyardError {
    StackyardError::MalformedFunctionCall {
        call: call.to_string(),
        reason: reason.to_string(),
    }
}

struct ArgumentParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ArgumentParser<'a> {
    const fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        self.skip_whitespace();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(format!("expected '{expected}' but found '{c}'")),
            None => Err(format!("expected '{expected}' but reached the end")),
        }
    }

    fn parse_keywords(mut self) -> Result<FunctionArgs, String> {
        let mut arguments = FunctionArgs::new();

        loop {
            self.skip_whitespace();
            if self.peek().is_none() {
                return Ok(arguments);
            }

            let key = match self.peek() {
                Some(c) if c.is_alphabetic() || c == '_' => self.parse_word(),
                _ => return Err("positional arguments are not supported".to_string()),
            };

            self.skip_whitespace();
            match self.peek() {
                Some('=') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        return Err(format!("unexpected '==' after '{key}'"));
                    }
                }
                _ => return Err("positional arguments are not supported".to_string()),
            }

            let value = self.parse_value()?;
            if arguments.insert(key.clone(), value).is_some() {
                return Err(format!("keyword argument '{key}' repeated"));
            }

            self.skip_whitespace();
            match self.bump() {
                None => return Ok(arguments),
                Some(',') => {}
                Some(c) => return Err(format!("unexpected '{c}' after argument '{key}'")),
            }
        }
    }

    fn parse_word(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn parse_value(&mut self) -> Result<Value, String> {
        self.skip_whitespace();
        match self.peek() {
            None => Err("missing value".to_string()),
            Some('\'' | '"') => self.parse_string().map(Value::String),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.parse_number(),
            Some('[') => {
                self.bump();
                self.parse_sequence(']')
            }
            Some('(') => {
                self.bump();
                self.parse_sequence(')')
            }
            Some('{') => {
                self.bump();
                self.parse_map()
            }
            Some(c) if c.is_alphabetic() || c == '_' => {
                let word = self.parse_word();
                match word.as_str() {
                    "true" | "True" => Ok(Value::Bool(true)),
                    "false" | "False" => Ok(Value::Bool(false)),
                    "null" | "None" => Ok(Value::Null),
                    _ => Err(format!("'{word}' is not a literal")),
                }
            }
            Some(c) => Err(format!("unexpected '{c}'")),
        }
    }

    fn parse_string(&mut self) -> Result<String, String> {
        let Some(quote) = self.bump() else {
            return Err("missing string".to_string());
        };
        let mut out = String::new();

        loop {
            match self.bump() {
                None => return Err("unterminated string".to_string()),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => return Err("unterminated string".to_string()),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, String> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some('-' | '+')) {
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }

        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        if is_float {
            text.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("invalid number '{text}'"))
        } else {
            text.parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| format!("invalid number '{text}'"))
        }
    }

    fn parse_sequence(&mut self, close: char) -> Result<Value, String> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => {}
                Some(c) if c == close => return Ok(Value::Array(items)),
                Some(c) => return Err(format!("unexpected '{c}' in sequence")),
                None => return Err(format!("missing closing '{close}'")),
            }
        }
    }

    /// Parse `{k: v, ...}`; a brace list without colons is a set and becomes a list.
    fn parse_map(&mut self) -> Result<Value, String> {
        let mut map = Map::new();
        let mut set = Vec::new();

        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.bump();
                break;
            }

            let key = self.parse_value()?;
            self.skip_whitespace();
            if self.peek() == Some(':') && set.is_empty() {
                self.bump();
                let value = self.parse_value()?;
                let key = match key {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return Err("map keys must be strings, numbers or booleans".to_string()),
                };
                map.insert(key, value);
            } else if map.is_empty() {
                set.push(key);
            } else {
                return Err("expected ':' in map".to_string());
            }

            self.skip_whitespace();
            match self.bump() {
                Some(',') => {}
                Some('}') => break,
                Some(c) => return Err(format!("unexpected '{c}' in map")),
                None => return Err("missing closing '}'".to_string()),
            }
        }

        if set.is_empty() {
            Ok(Value::Object(map))
        } else {
            Ok(Value::Array(set))
        }
    }
}
