//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `%`, `^` (right-associative), parentheses,
//! unary signs, and decimal numbers. Evaluation is a precedence-climbing
//! parser over the raw input; identifiers are rejected, so the model cannot
//! smuggle in variables or function calls.

use async_trait::async_trait;
use parley_core::tool::parse_arguments;
use parley_core::{RunContext, Tool, ToolError};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Message returned to the model for any expression it cannot evaluate.
pub const INVALID_EXPRESSION: &str =
    "Invalid expression. Only provide numbers and operators without variables. You may try again";

pub struct CalculatorTool;

#[derive(Deserialize)]
struct CalculatorArgs {
    expr: String,
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "CalculatorTool"
    }

    fn description(&self) -> &str {
        "Call this tool to perform any basic math. The input to this tool should be a valid \
         mathematical expression that could be executed by a simple calculator. Only provide \
         constants and operators"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expr": {
                    "type": "string",
                    "description": "A valid mathematical expression. Do not use variables."
                }
            },
            "required": ["expr"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _context: &RunContext,
    ) -> Result<String, ToolError> {
        let args: CalculatorArgs = parse_arguments(self.name(), arguments)?;
        match evaluate(&args.expr) {
            Ok(value) => Ok(format_number(value)),
            Err(e) => {
                debug!(expr = %args.expr, error = %e, "Calculator rejected expression");
                Err(ToolError::failed(self.name(), INVALID_EXPRESSION))
            }
        }
    }
}

/// Why an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unclosed parenthesis opened at offset {0}")]
    UnclosedParen(usize),

    #[error("result is not a finite number")]
    NotFinite,

    #[error("expression nests too deeply")]
    TooDeep,
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, CalcError> {
    let mut parser = ExprParser {
        input: expr.as_bytes(),
        offset: 0,
        depth: 0,
    };
    let value = parser.expression(0)?;
    parser.skip_whitespace();
    if let Some(found) = parser.peek() {
        return Err(CalcError::UnexpectedChar {
            found: found as char,
            offset: parser.offset,
        });
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

/// Integers print without a fractional part.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinaryOp {
    fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            b'+' => Self::Add,
            b'-' => Self::Sub,
            b'*' => Self::Mul,
            b'/' => Self::Div,
            b'%' => Self::Rem,
            b'^' => Self::Pow,
            _ => return None,
        })
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div | Self::Rem => 2,
            Self::Pow => 3,
        }
    }

    fn right_associative(self) -> bool {
        matches!(self, Self::Pow)
    }

    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
            Self::Rem => lhs % rhs,
            Self::Pow => lhs.powf(rhs),
        }
    }
}

const POW_PRECEDENCE: u8 = 3;

/// Limit on nested parentheses, signs and `^` chains. Every level recurses.
const MAX_DEPTH: usize = 256;

struct ExprParser<'a> {
    input: &'a [u8],
    offset: usize,
    depth: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.offset += 1;
        }
    }

    fn expression(&mut self, min_precedence: u8) -> Result<f64, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        self.depth += 1;
        let value = self.binary(min_precedence);
        self.depth -= 1;
        value
    }

    /// Parse operands joined by operators binding at least as tight as `min_precedence`.
    fn binary(&mut self, min_precedence: u8) -> Result<f64, CalcError> {
        let mut lhs = self.unary()?;
        loop {
            self.skip_whitespace();
            let Some(op) = self.peek().and_then(BinaryOp::from_byte) else {
                break;
            };
            if op.precedence() < min_precedence {
                break;
            }
            self.offset += 1;
            let next = if op.right_associative() {
                op.precedence()
            } else {
                op.precedence() + 1
            };
            let rhs = self.expression(next)?;
            lhs = op.apply(lhs, rhs);
        }
        Ok(lhs)
    }

    // Signs bind looser than `^`: -2^2 is -4.
    fn unary(&mut self) -> Result<f64, CalcError> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'-') => {
                self.offset += 1;
                Ok(-self.expression(POW_PRECEDENCE)?)
            }
            Some(b'+') => {
                self.offset += 1;
                self.expression(POW_PRECEDENCE)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, CalcError> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'(') => {
                let open = self.offset;
                self.offset += 1;
                let value = self.expression(0)?;
                self.skip_whitespace();
                if self.peek() != Some(b')') {
                    return Err(CalcError::UnclosedParen(open));
                }
                self.offset += 1;
                Ok(value)
            }
            Some(b) if b.is_ascii_digit() || b == b'.' => self.number(),
            Some(_) => {
                let rest = String::from_utf8_lossy(&self.input[self.offset..]);
                let found = rest.chars().next().unwrap_or('?');
                Err(CalcError::UnexpectedChar {
                    found,
                    offset: self.offset,
                })
            }
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn number(&mut self) -> Result<f64, CalcError> {
        let start = self.offset;
        while self.peek().is_some_and(|b| b.is_ascii_digit() || b == b'.') {
            self.offset += 1;
        }
        let text = String::from_utf8_lossy(&self.input[start..self.offset]);
        text.parse()
            .map_err(|_| CalcError::InvalidNumber(text.into_owned()))
    }
}
