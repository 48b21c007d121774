//! Boolean filter expressions evaluated against decoded message data.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or      := and ("or" and)*
//! and     := not ("and" not)*
//! not     := "not" not | compare
//! compare := sum (("==" | "!=" | "<" | "<=" | ">" | ">=") sum)?
//!          | sum "not"? "in" "(" sum ("," sum)* ")"
//! sum     := product (("+" | "-") product)*
//! product := atom (("*" | "/" | "%") atom)*
//! atom    := number | string | "true" | "false" | path | "(" or ")"
//! path    := ident ("." ident)*
//! ```
use std::cmp::Ordering;

use alloy::primitives::U256;

use super::Value;
use crate::models::ExpressionError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(U256),
    Str(String),
    Ident(String),
    Dot,
    Comma,
    LParen,
    RParen,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

fn syntax_error(position: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        position,
        message: message.into(),
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let token = match c {
            '0'..='9' => {
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    return Err(syntax_error(i, format!("unexpected character '{}'", chars[i])));
                }
                let digits: String = chars[start..i].iter().collect();
                let number = U256::from_str_radix(&digits, 10)
                    .map_err(|e| syntax_error(start, format!("invalid number: {}", e)))?;
                tokens.push((start, Token::Number(number)));
                continue;
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax_error(start, "unterminated string")),
                        Some('\\') => {
                            let escaped = chars
                                .get(i + 1)
                                .ok_or_else(|| syntax_error(i, "unterminated escape"))?;
                            text.push(*escaped);
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push((start, Token::Str(text)));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push((start, Token::Ident(chars[start..i].iter().collect())));
                continue;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                i += 1;
                Token::Eq
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                i += 1;
                Token::Ne
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                i += 1;
                Token::Le
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                i += 1;
                Token::Ge
            }
            '<' => Token::Lt,
            '>' => Token::Gt,
            '.' => Token::Dot,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            other => return Err(syntax_error(i, format!("unexpected character '{}'", other))),
        };
        tokens.push((start, token));
        i += 1;
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Literal(Value),
    Variable(Vec<String>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    In {
        needle: Box<Expr>,
        haystack: Vec<Expr>,
        negated: bool,
    },
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(position, _)| *position)
            .unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        self.pos += 1;
        token
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(ident)) if ident == keyword)
    }

    fn is_keyword_at(&self, offset: usize, keyword: &str) -> bool {
        matches!(self.tokens.get(self.pos + offset), Some((_, Token::Ident(ident))) if ident == keyword)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        let position = self.position();
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(syntax_error(
                position,
                format!("expected {:?}, found {:?}", expected, token),
            )),
            None => Err(syntax_error(position, format!("expected {:?}", expected))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_and()?;
        while self.is_keyword("or") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_not()?;
        while self.is_keyword("and") {
            self.pos += 1;
            let rhs = self.parse_not()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if self.is_keyword("not") {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, ExpressionError> {
        let lhs = self.parse_sum()?;

        let negated = self.is_keyword("not") && self.is_keyword_at(1, "in");
        if negated || self.is_keyword("in") {
            self.pos += if negated { 2 } else { 1 };
            self.expect(Token::LParen)?;
            let mut haystack = vec![self.parse_sum()?];
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                haystack.push(self.parse_sum()?);
            }
            self.expect(Token::RParen)?;
            return Ok(Expr::In {
                needle: Box::new(lhs),
                haystack,
                negated,
            });
        }

        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_sum()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_sum(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_product()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_product(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_atom()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_atom()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ExpressionError> {
        let position = self.position();
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(ident)) => match ident.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "and" | "or" | "not" | "in" => Err(syntax_error(
                    position,
                    format!("unexpected keyword '{}'", ident),
                )),
                _ => {
                    let mut path = vec![ident];
                    while self.peek() == Some(&Token::Dot) {
                        self.pos += 1;
                        let position = self.position();
                        match self.next() {
                            Some(Token::Ident(segment)) => path.push(segment),
                            _ => return Err(syntax_error(position, "expected identifier after '.'")),
                        }
                    }
                    Ok(Expr::Variable(path))
                }
            },
            Some(token) => Err(syntax_error(position, format!("unexpected token {:?}", token))),
            None => Err(syntax_error(position, "unexpected end of expression")),
        }
    }
}

fn arithmetic(op: BinaryOp, lhs: U256, rhs: U256) -> Result<U256, ExpressionError> {
    let result = match op {
        BinaryOp::Add => lhs.checked_add(rhs),
        BinaryOp::Sub => lhs.checked_sub(rhs),
        BinaryOp::Mul => lhs.checked_mul(rhs),
        BinaryOp::Div => lhs.checked_div(rhs),
        BinaryOp::Mod => lhs.checked_rem(rhs),
        _ => None,
    };
    result.ok_or_else(|| {
        ExpressionError::Arithmetic(format!("{:?} overflows or divides by zero: {} and {}", op, lhs, rhs))
    })
}

impl Expr {
    fn eval(&self, context: &Value) -> Result<Value, ExpressionError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(path) => context.lookup(path).cloned(),
            Expr::Not(inner) => Ok(Value::Bool(!inner.eval(context)?.as_bool()?)),
            Expr::In {
                needle,
                haystack,
                negated,
            } => {
                let needle = needle.eval(context)?;
                let mut found = false;
                for candidate in haystack {
                    if needle.loosely_equals(&candidate.eval(context)?) {
                        found = true;
                        break;
                    }
                }
                Ok(Value::Bool(found != *negated))
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let result = lhs.eval(context)?.as_bool()? && rhs.eval(context)?.as_bool()?;
                Ok(Value::Bool(result))
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let result = lhs.eval(context)?.as_bool()? || rhs.eval(context)?.as_bool()?;
                Ok(Value::Bool(result))
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.eval(context)?;
                let rhs = rhs.eval(context)?;
                let ordering = |expected: &[Ordering]| -> Result<Value, ExpressionError> {
                    Ok(Value::Bool(expected.contains(&lhs.compare(&rhs)?)))
                };
                match op {
                    BinaryOp::Eq => Ok(Value::Bool(lhs.loosely_equals(&rhs))),
                    BinaryOp::Ne => Ok(Value::Bool(!lhs.loosely_equals(&rhs))),
                    BinaryOp::Lt => ordering(&[Ordering::Less]),
                    BinaryOp::Le => ordering(&[Ordering::Less, Ordering::Equal]),
                    BinaryOp::Gt => ordering(&[Ordering::Greater]),
                    BinaryOp::Ge => ordering(&[Ordering::Greater, Ordering::Equal]),
                    _ => Ok(Value::Number(arithmetic(*op, lhs.as_number()?, rhs.as_number()?)?)),
                }
            }
        }
    }
}

/// A parsed filter expression, compiled once and evaluated many times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    pub fn compile(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: source.len(),
        };
        let root = parser.parse_or()?;
        if parser.pos < parser.tokens.len() {
            return Err(syntax_error(parser.position(), "unexpected trailing input"));
        }

        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, context: &Value) -> Result<Value, ExpressionError> {
        self.root.eval(context)
    }

    /// Evaluates the expression and requires a boolean result.
    pub fn test(&self, context: &Value) -> Result<bool, ExpressionError> {
        self.evaluate(context)?.as_bool()
    }
}
