//! Decoder for the Python-style literals stored in the source CSV columns,
//! e.g. `[{'id': 16, 'name': 'Animation'}, {'id': 35, 'name': "Bob's"}]`.
//!
//! Supports strings (either quote, backslash escapes), ints, floats, `None`,
//! `True`, `False`, lists, tuples and dicts. Tuples decode to arrays and
//! non-string dict keys are stringified.

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Parse a complete literal; trailing non-whitespace is an error.
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        chars: text.char_indices().collect(),
        pos: 0,
        len: text.len(),
    };
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map(|(i, _)| *i).unwrap_or(self.len)
    }

    fn error(&self, message: &str) -> LiteralError {
        LiteralError {
            offset: self.offset(),
            message: message.to_string(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_whitespace();
        match self.peek() {
            Some('[') => self.parse_sequence('[', ']'),
            Some('(') => self.parse_sequence('(', ')'),
            Some('{') => self.parse_dict(),
            Some('\'') | Some('"') => self.parse_string().map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_alphabetic() => self.parse_keyword(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_sequence(&mut self, open: char, close: char) -> Result<Value, LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                _ => return Err(self.error(&format!("expected ',' or '{}'", close))),
            }
        }
    }

    fn parse_dict(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }
            let key = match self.parse_value()? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            self.expect(':')?;
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, LiteralError> {
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.parse_escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        match self.bump() {
            None => Err(self.error("unterminated escape")),
            Some('\\') => {
                out.push('\\');
                Ok(())
            }
            Some('\'') => {
                out.push('\'');
                Ok(())
            }
            Some('"') => {
                out.push('"');
                Ok(())
            }
            Some('n') => {
                out.push('\n');
                Ok(())
            }
            Some('r') => {
                out.push('\r');
                Ok(())
            }
            Some('t') => {
                out.push('\t');
                Ok(())
            }
            Some('0') => {
                out.push('\0');
                Ok(())
            }
            Some('x') => self.push_code_point(2, out),
            Some('u') => self.push_code_point(4, out),
            Some('U') => self.push_code_point(8, out),
            // unknown escapes keep their backslash
            Some(c) => {
                out.push('\\');
                out.push(c);
                Ok(())
            }
        }
    }

    fn push_code_point(&mut self, digits: usize, out: &mut String) -> Result<(), LiteralError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid hex escape"))?;
            code = code * 16 + digit;
        }
        let c = char::from_u32(code).ok_or_else(|| self.error("invalid code point"))?;
        out.push(c);
        Ok(())
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E' | '_')
        ) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .map(|(_, c)| *c)
            .filter(|c| *c != '_')
            .collect();

        if let Ok(int) = text.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError {
                offset: self.chars[start].0,
                message: format!("invalid number '{}'", text),
            })
    }

    fn parse_keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().map(|(_, c)| *c).collect();
        match word.as_str() {
            "None" => Ok(Value::Null),
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            _ => Err(LiteralError {
                offset: self.chars[start].0,
                message: format!("unknown name '{}'", word),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_genre_list() {
        let value = parse_literal("[{'id': 16, 'name': 'Animation'}, {'id': 35, 'name': 'Comedy'}]").unwrap();
        assert_eq!(
            value,
            json!([{"id": 16, "name": "Animation"}, {"id": 35, "name": "Comedy"}])
        );
    }

    #[test]
    fn test_parse_cast_entry_with_none_and_double_quotes() {
        let value = parse_literal(
            r#"[{'cast_id': 14, 'character': "Woody (voice)", 'gender': 2, 'profile_path': None, 'name': "Tom O'Hanks"}]"#,
        )
        .unwrap();
        assert_eq!(value[0]["name"], json!("Tom O'Hanks"));
        assert_eq!(value[0]["profile_path"], Value::Null);
    }

    #[test]
    fn test_parse_escapes_and_unicode() {
        let value = parse_literal(r"'It\'s \xe9té \\ done'").unwrap();
        assert_eq!(value, json!("It's été \\ done"));

        let value = parse_literal("'Amélie'").unwrap();
        assert_eq!(value, json!("Amélie"));
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse_literal("True").unwrap(), json!(true));
        assert_eq!(parse_literal("False").unwrap(), json!(false));
        assert_eq!(parse_literal("None").unwrap(), Value::Null);
        assert_eq!(parse_literal("-12").unwrap(), json!(-12));
        assert_eq!(parse_literal("7.5").unwrap(), json!(7.5));
        assert_eq!(parse_literal("(1, 2,)").unwrap(), json!([1, 2]));
        assert_eq!(parse_literal("{1: 'a'}").unwrap(), json!({"1": "a"}));
    }

    #[test]
    fn test_parse_empty_containers() {
        assert_eq!(parse_literal("[]").unwrap(), json!([]));
        assert_eq!(parse_literal(" { } ").unwrap(), json!({}));
    }

    #[test]
    fn test_malformed_inputs_report_errors() {
        assert!(parse_literal("[{'name': 'Action'}").is_err());
        assert!(parse_literal("[{'name' 'Action'}]").is_err());
        assert!(parse_literal("'unterminated").is_err());
        assert!(parse_literal("[1, 2] extra").is_err());
        assert!(parse_literal("nan").is_err());
        assert!(parse_literal("").is_err());
    }
}
