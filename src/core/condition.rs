//! Predicates over a job's axis values
//!
//! Used for step guards (`if:`) and for the soft-fail policy
//! (`continue_on_error:`). The grammar is deliberately small:
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | "(" expr ")" | "true" | "false" | compare
//! compare := axis ( "==" | "!=" | "=~" ) value
//! ```
//!
//! Axis names may carry an optional `matrix.` prefix. Values are quoted with
//! `'` or `"`, or written as bare words.

use crate::core::error::ConfigError;
use crate::core::matrix::JobSpec;
use regex::Regex;
use std::fmt;

/// A parsed condition together with its source text
#[derive(Debug, Clone)]
pub struct Condition {
    source: String,
    expr: Expr,
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(bool),
    Equals { axis: String, value: String },
    NotEquals { axis: String, value: String },
    Matches { axis: String, pattern: Regex },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Condition {
    /// Parse a condition expression
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let tokens = tokenize(source).map_err(|reason| ConfigError::InvalidCondition {
            expression: source.to_string(),
            reason,
        })?;
        if tokens.is_empty() {
            return Err(ConfigError::InvalidCondition {
                expression: source.to_string(),
                reason: "empty expression".to_string(),
            });
        }

        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser
            .parse_or()
            .and_then(|expr| match parser.peek() {
                None => Ok(expr),
                Some(token) => Err(format!("unexpected token {}", token)),
            })
            .map_err(|reason| ConfigError::InvalidCondition {
                expression: source.to_string(),
                reason,
            })?;

        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// A condition that always holds
    pub fn always() -> Self {
        Self {
            source: "true".to_string(),
            expr: Expr::Literal(true),
        }
    }

    /// A condition that never holds
    pub fn never() -> Self {
        Self {
            source: "false".to_string(),
            expr: Expr::Literal(false),
        }
    }

    /// The expression as written in the workflow file
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a job's axis assignment
    pub fn evaluate(&self, spec: &JobSpec) -> bool {
        self.expr.evaluate(spec)
    }

    /// Every axis name the condition refers to
    pub fn axes(&self) -> Vec<&str> {
        let mut axes = Vec::new();
        self.expr.collect_axes(&mut axes);
        axes
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Expr {
    fn evaluate(&self, spec: &JobSpec) -> bool {
        match self {
            Expr::Literal(value) => *value,
            Expr::Equals { axis, value } => spec.value(axis) == Some(value.as_str()),
            Expr::NotEquals { axis, value } => spec.value(axis) != Some(value.as_str()),
            Expr::Matches { axis, pattern } => {
                spec.value(axis).is_some_and(|v| pattern.is_match(v))
            }
            Expr::Not(inner) => !inner.evaluate(spec),
            Expr::And(lhs, rhs) => lhs.evaluate(spec) && rhs.evaluate(spec),
            Expr::Or(lhs, rhs) => lhs.evaluate(spec) || rhs.evaluate(spec),
        }
    }

    fn collect_axes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Equals { axis, .. }
            | Expr::NotEquals { axis, .. }
            | Expr::Matches { axis, .. } => {
                if !out.contains(&axis.as_str()) {
                    out.push(axis);
                }
            }
            Expr::Not(inner) => inner.collect_axes(out),
            Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
                lhs.collect_axes(out);
                rhs.collect_axes(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Eq,
    Ne,
    Match,
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "'{}'", w),
            Token::Quoted(q) => write!(f, "\"{}\"", q),
            Token::Eq => f.write_str("'=='"),
            Token::Ne => f.write_str("'!='"),
            Token::Match => f.write_str("'=~'"),
            Token::And => f.write_str("'&&'"),
            Token::Or => f.write_str("'||'"),
            Token::Not => f.write_str("'!'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '+' | '/' | ':')
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                match chars.next() {
                    Some('=') => tokens.push(Token::Eq),
                    Some('~') => tokens.push(Token::Match),
                    _ => return Err("expected '==' or '=~'".to_string()),
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ne);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return Err("expected '&&'".to_string());
                }
                tokens.push(Token::And);
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err("expected '||'".to_string());
                }
                tokens.push(Token::Or);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => literal.push(ch),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Quoted(literal));
            }
            c if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if !is_word_char(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Not) => Ok(Expr::Not(Box::new(self.parse_unary()?))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("expected ')'".to_string()),
                }
            }
            Some(Token::Word(word)) if word == "true" => Ok(Expr::Literal(true)),
            Some(Token::Word(word)) if word == "false" => Ok(Expr::Literal(false)),
            Some(Token::Word(word)) => self.parse_comparison(word),
            Some(token) => Err(format!("unexpected token {}", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_comparison(&mut self, word: String) -> Result<Expr, String> {
        let axis = word
            .strip_prefix("matrix.")
            .map(str::to_string)
            .unwrap_or(word);
        if axis.is_empty() {
            return Err("missing axis name".to_string());
        }

        let op = self
            .next()
            .ok_or_else(|| format!("expected operator after '{}'", axis))?;
        let value = match self.next() {
            Some(Token::Word(v)) | Some(Token::Quoted(v)) => v,
            _ => return Err(format!("expected value after operator for '{}'", axis)),
        };

        match op {
            Token::Eq => Ok(Expr::Equals { axis, value }),
            Token::Ne => Ok(Expr::NotEquals { axis, value }),
            Token::Match => {
                let pattern = Regex::new(&value).map_err(|e| e.to_string())?;
                Ok(Expr::Matches { axis, pattern })
            }
            other => Err(format!("expected comparison operator, found {}", other)),
        }
    }
}
