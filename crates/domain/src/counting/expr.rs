//! Exact arithmetic for counting posts.
//!
//! Supports `+ - * /`, `//` (floor division), `^` / `**` (exponent), unary
//! signs, parentheses and decimal literals. Evaluation uses exact rationals so
//! `0.5 * 14` and `(1/3) * 21` count as `7`; the final value must be an
//! integer.

use std::cmp::Ordering;

/// Longest accepted expression, in characters.
pub const MAX_EXPRESSION_LEN: usize = 50;

const MAGNITUDE_LIMIT: i128 = 1_000_000_000;
const MAX_FRACTION_DIGITS: u32 = 9;
const MAX_POW_BASE: i128 = 10_000;
const MAX_POW_EXPONENT: i128 = 8;

/// Why a post could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("expression longer than {MAX_EXPRESSION_LEN} characters")]
    TooLong,
    #[error("unsupported character {0:?}")]
    UnexpectedChar(char),
    #[error("malformed expression")]
    Malformed,
    #[error("division by zero")]
    DivisionByZero,
    #[error("value out of range")]
    OutOfRange,
    #[error("result is not an integer")]
    NotAnInteger,
}

/// Evaluate `input` to an integer.
///
/// # Errors
///
/// Returns an [`ExprError`] describing the first problem encountered.
pub fn evaluate(input: &str) -> Result<i64, ExprError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ExprError::Empty);
    }
    if input.chars().count() > MAX_EXPRESSION_LEN {
        return Err(ExprError::TooLong);
    }
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::Malformed);
    }
    if value.den != 1 {
        return Err(ExprError::NotAnInteger);
    }
    i64::try_from(value.num).map_err(|_| ExprError::OutOfRange)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Num(Ratio),
    Plus,
    Minus,
    Star,
    Slash,
    FloorDiv,
    Pow,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_literal(&literal)?));
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::FloorDiv);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Pow);
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            other => return Err(ExprError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

fn parse_literal(literal: &str) -> Result<Ratio, ExprError> {
    let (whole, fraction) = match literal.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (literal, ""),
    };
    if fraction.contains('.') || (whole.is_empty() && fraction.is_empty()) {
        return Err(ExprError::Malformed);
    }
    let frac_len = u32::try_from(fraction.len()).map_err(|_| ExprError::OutOfRange)?;
    if frac_len > MAX_FRACTION_DIGITS {
        return Err(ExprError::OutOfRange);
    }
    let digits = format!("{whole}{fraction}");
    let num: i128 = digits.parse().map_err(|_| ExprError::OutOfRange)?;
    Ratio::new(num, 10_i128.pow(frac_len)).bounded()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Ratio, ExprError> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus {
                value.add(rhs)?
            } else {
                value.sub(rhs)?
            };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<Ratio, ExprError> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash | Token::FloorDiv)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                Token::Star => value.mul(rhs)?,
                Token::Slash => value.div(rhs)?,
                _ => value.div(rhs)?.floor(),
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<Ratio, ExprError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            Some(Token::Minus) => {
                self.pos += 1;
                self.unary()?.neg()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Ratio, ExprError> {
        let base = self.atom()?;
        if self.peek() == Some(Token::Pow) {
            self.pos += 1;
            let exponent = self.unary()?;
            return base.pow(exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Ratio, ExprError> {
        match self.next() {
            Some(Token::Num(value)) => Ok(value),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err(ExprError::Malformed),
                }
            }
            _ => Err(ExprError::Malformed),
        }
    }
}

/// Normalised fraction with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ratio {
    num: i128,
    den: i128,
}

impl Ratio {
    fn new(num: i128, den: i128) -> Self {
        let g = gcd(num.abs(), den.abs()).max(1);
        let sign = if den < 0 { -1 } else { 1 };
        Self {
            num: sign * num / g,
            den: sign * den / g,
        }
    }

    fn integer(value: i128) -> Self {
        Self { num: value, den: 1 }
    }

    fn bounded(self) -> Result<Self, ExprError> {
        let limit = MAGNITUDE_LIMIT
            .checked_mul(self.den)
            .ok_or(ExprError::OutOfRange)?;
        if self.num.abs() > limit {
            return Err(ExprError::OutOfRange);
        }
        Ok(self)
    }

    fn add(self, rhs: Self) -> Result<Self, ExprError> {
        let num = self
            .num
            .checked_mul(rhs.den)
            .and_then(|a| rhs.num.checked_mul(self.den).and_then(|b| a.checked_add(b)))
            .ok_or(ExprError::OutOfRange)?;
        let den = self.den.checked_mul(rhs.den).ok_or(ExprError::OutOfRange)?;
        Self::new(num, den).bounded()
    }

    fn sub(self, rhs: Self) -> Result<Self, ExprError> {
        self.add(rhs.neg()?)
    }

    fn mul(self, rhs: Self) -> Result<Self, ExprError> {
        let num = self.num.checked_mul(rhs.num).ok_or(ExprError::OutOfRange)?;
        let den = self.den.checked_mul(rhs.den).ok_or(ExprError::OutOfRange)?;
        Self::new(num, den).bounded()
    }

    fn div(self, rhs: Self) -> Result<Self, ExprError> {
        if rhs.num == 0 {
            return Err(ExprError::DivisionByZero);
        }
        self.mul(Self::new(rhs.den, rhs.num))
    }

    fn neg(self) -> Result<Self, ExprError> {
        Ok(Self {
            num: self.num.checked_neg().ok_or(ExprError::OutOfRange)?,
            den: self.den,
        })
    }

    fn floor(self) -> Self {
        Self::integer(self.num.div_euclid(self.den))
    }

    fn pow(self, exponent: Self) -> Result<Self, ExprError> {
        if exponent.den != 1 {
            return Err(ExprError::NotAnInteger);
        }
        if exponent.num.abs() > MAX_POW_EXPONENT
            || self.num.abs() > MAX_POW_BASE.saturating_mul(self.den)
        {
            return Err(ExprError::OutOfRange);
        }
        let magnitude = u32::try_from(exponent.num.abs()).map_err(|_| ExprError::OutOfRange)?;
        let raised = Self::new(
            self.num.checked_pow(magnitude).ok_or(ExprError::OutOfRange)?,
            self.den.checked_pow(magnitude).ok_or(ExprError::OutOfRange)?,
        );
        match exponent.num.cmp(&0) {
            Ordering::Less if raised.num == 0 => Err(ExprError::DivisionByZero),
            Ordering::Less => Self::new(raised.den, raised.num).bounded(),
            _ => raised.bounded(),
        }
    }
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
