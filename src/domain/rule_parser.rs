//! Condition expression parser.
//!
//! Grammar: `<operand> <op> <operand>` where an operand is a field name
//! (letters, digits, `_` and `.`, not starting with a digit) or a number with
//! an optional sign, decimal point and `e`/`E` exponent, and `<op>` is one of
//! `<`, `>`, `==`, `<=`, `>=`. Errors carry the byte offset of the offending
//! token.

use crate::domain::error::{ImatradeError, ParseError};
use crate::domain::position::Direction;
use crate::domain::rule::{Comparison, Condition, Operand, Phase, Rule};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

fn is_field_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn peek_token(&self) -> String {
        let token: String = self
            .remaining()
            .chars()
            .take_while(|c| !c.is_whitespace())
            .collect();
        if token.is_empty() {
            "end of input".to_string()
        } else {
            token
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            message,
            position: self.pos,
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if matches!(self.peek(), Some('-') | Some('+')) {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let exponent = &self.remaining()[1..];
            let unsigned = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
            if unsigned.starts_with(|c: char| c.is_ascii_digit()) {
                self.pos += self.remaining().len() - unsigned.len();
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }
        if self.peek().is_some_and(is_field_char) {
            while self.peek().is_some_and(is_field_char) {
                self.advance();
            }
            return Err(ParseError {
                message: format!("invalid number: {}", &self.input[start..self.pos]),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {num_str}"),
            position: start,
        })
    }

    fn parse_field(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(is_field_char) {
            self.advance();
        }
        if self.pos == start {
            return Err(self.error(format!("expected operand, found '{}'", self.peek_token())));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.') => {
                Ok(Operand::Literal(self.parse_number()?))
            }
            _ => Ok(Operand::Field(self.parse_field()?)),
        }
    }

    fn parse_comparison(&mut self) -> Result<Comparison, ParseError> {
        self.skip_whitespace();
        // Two-character operators first so `<=` is not read as `<`.
        let op = if self.consume_exact("<=") {
            Comparison::Le
        } else if self.consume_exact(">=") {
            Comparison::Ge
        } else if self.consume_exact("==") {
            Comparison::Eq
        } else if self.consume_exact("<") {
            Comparison::Lt
        } else if self.consume_exact(">") {
            Comparison::Gt
        } else {
            return Err(self.error(format!(
                "expected comparison operator (<, >, ==, <=, >=), found '{}'",
                self.peek_token()
            )));
        };
        Ok(op)
    }

    fn parse(&mut self) -> Result<(Operand, Comparison, Operand), ParseError> {
        let left = self.parse_operand()?;
        let op = self.parse_comparison()?;
        let right = self.parse_operand()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after condition: '{}'",
                self.remaining()
            )));
        }
        Ok((left, op, right))
    }
}

/// Parse a bare expression into its operands and operator.
pub fn parse_expression(input: &str) -> Result<(Operand, Comparison, Operand), ParseError> {
    Parser::new(input).parse()
}

/// Parse a named condition.
pub fn parse_condition(name: &str, expression: &str) -> Result<Condition, ImatradeError> {
    let (left, op, right) =
        parse_expression(expression).map_err(|source| ImatradeError::RuleParse {
            condition: name.to_string(),
            source,
        })?;
    Ok(Condition {
        name: name.to_string(),
        left,
        op,
        right,
    })
}

/// Parse an ordered list of `(name, expression)` pairs into a rule.
pub fn parse_rule<S: AsRef<str>>(
    direction: Direction,
    phase: Phase,
    definitions: &[(S, S)],
) -> Result<Rule, ImatradeError> {
    let conditions = definitions
        .iter()
        .map(|(name, expr)| parse_condition(name.as_ref(), expr.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Rule::new(direction, phase, conditions)
}
