//! Embedded expressions
//!
//! String values wrapped in the configured delimiters (`<<< ... >>>`) are
//! compiled to reverse-Polish form with the shunting-yard algorithm and
//! stored as a space-separated token string. The gameplay layer evaluates
//! that form against an [`Environment`].
//!
//! Supported: integer and float literals, identifiers (dotted paths),
//! `+ - * / %`, comparisons, `&& || !`, unary minus, parentheses and
//! right-associative assignment `=`.

use core::fmt;

use thiserror::Error;

/// Expression errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Unexpected character '{ch}' at {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Mismatched parenthesis")]
    MismatchedParen,

    #[error("Operator {0} is missing an operand")]
    MissingOperand(String),

    #[error("Unknown token in compiled expression: {0}")]
    InvalidToken(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Left side of assignment is not a variable")]
    InvalidAssignment,

    #[error("Cannot store to {0}")]
    StoreFailed(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Expression is empty")]
    Empty,
}

type Result<T> = core::result::Result<T, ExpressionError>;

/// Operators in precedence order (lowest first)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Assign,
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
    Not,
    Neg,
}

impl Operator {
    /// Binding strength (higher = binds tighter)
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Assign => 1,
            Self::Or => 2,
            Self::And => 3,
            Self::Eq | Self::Ne => 4,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 5,
            Self::Add | Self::Sub => 6,
            Self::Mul | Self::Div | Self::Mod => 7,
            Self::Not | Self::Neg => 8,
        }
    }

    fn is_right_associative(&self) -> bool {
        matches!(self, Self::Assign | Self::Not | Self::Neg)
    }

    fn is_unary(&self) -> bool {
        matches!(self, Self::Not | Self::Neg)
    }

    /// Symbol used in the compiled form
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Not => "!",
            Self::Neg => "neg",
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "=" => Self::Assign,
            "||" => Self::Or,
            "&&" => Self::And,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Mod,
            "!" => Self::Not,
            "neg" => Self::Neg,
            _ => return None,
        })
    }
}

/// Numeric value produced by evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Int(i32),
    Float(f32),
}

impl Operand {
    pub fn as_float(&self) -> f32 {
        match self {
            Self::Int(v) => *v as f32,
            Self::Float(v) => *v,
        }
    }

    pub fn as_int(&self) -> i32 {
        match self {
            Self::Int(v) => *v,
            Self::Float(v) => *v as i32,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Variable storage an expression runs against
pub trait Environment {
    /// Current value of a variable
    fn load(&self, name: &str) -> Option<Operand>;

    /// Assign a variable; false if it cannot be written
    fn store(&mut self, name: &str, value: Operand) -> bool;
}

/// Token of the compiled form
#[derive(Debug, Clone, PartialEq)]
pub enum RpnToken {
    Int(i32),
    Float(f32),
    Ident(String),
    Op(Operator),
}

impl fmt::Display for RpnToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{:.1}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Ident(name) => f.write_str(name),
            Self::Op(op) => f.write_str(op.symbol()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i32),
    Float(f32),
    Ident(String),
    Op(Operator),
    LParen,
    RParen,
}

/// Expression lexer
struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    /// Whether the previous token ends an operand (decides unary minus)
    after_operand: bool,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            after_operand: false,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            self.after_operand = matches!(
                token,
                Token::Int(_) | Token::Float(_) | Token::Ident(_) | Token::RParen
            );
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.chars.next();
        }
        let Some((position, c)) = self.chars.next() else {
            return Ok(None);
        };

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '+' => Token::Op(Operator::Add),
            '*' => Token::Op(Operator::Mul),
            '/' => Token::Op(Operator::Div),
            '%' => Token::Op(Operator::Mod),
            '-' if self.after_operand => Token::Op(Operator::Sub),
            '-' => Token::Op(Operator::Neg),
            '=' if self.match_char('=') => Token::Op(Operator::Eq),
            '=' => Token::Op(Operator::Assign),
            '!' if self.match_char('=') => Token::Op(Operator::Ne),
            '!' => Token::Op(Operator::Not),
            '<' if self.match_char('=') => Token::Op(Operator::Le),
            '<' => Token::Op(Operator::Lt),
            '>' if self.match_char('=') => Token::Op(Operator::Ge),
            '>' => Token::Op(Operator::Gt),
            '&' if self.match_char('&') => Token::Op(Operator::And),
            '|' if self.match_char('|') => Token::Op(Operator::Or),
            c if c.is_ascii_digit() => self.number(position)?,
            c if c.is_alphabetic() || c == '_' => self.identifier(position),
            ch => return Err(ExpressionError::UnexpectedChar { ch, position }),
        };
        Ok(Some(token))
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn end(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(pos, _)| *pos)
            .unwrap_or(self.source.len())
    }

    fn number(&mut self, start: usize) -> Result<Token> {
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.chars.next();
            } else if c == '.' && !is_float {
                is_float = true;
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.end();
        let text = &self.source[start..end];
        if is_float {
            text.parse()
                .map(Token::Float)
                .map_err(|_| ExpressionError::InvalidNumber(text.to_string()))
        } else {
            text.parse()
                .map(Token::Int)
                .map_err(|_| ExpressionError::InvalidNumber(text.to_string()))
        }
    }

    fn identifier(&mut self, start: usize) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            self.chars.next();
        }
        let end = self.end();
        Token::Ident(self.source[start..end].to_string())
    }
}

/// A compiled expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    rpn: Vec<RpnToken>,
}

impl Expression {
    /// Compile infix source into reverse-Polish form
    pub fn compile(source: &str) -> Result<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }

        let mut output = Vec::with_capacity(tokens.len());
        let mut operators: Vec<Token> = Vec::new();
        for token in tokens {
            match token {
                Token::Int(v) => output.push(RpnToken::Int(v)),
                Token::Float(v) => output.push(RpnToken::Float(v)),
                Token::Ident(name) => output.push(RpnToken::Ident(name)),
                Token::Op(op) => {
                    while let Some(Token::Op(top)) = operators.last() {
                        let pops = if op.is_unary() {
                            false
                        } else if op.is_right_associative() {
                            top.precedence() > op.precedence()
                        } else {
                            top.precedence() >= op.precedence()
                        };
                        if !pops {
                            break;
                        }
                        output.push(RpnToken::Op(*top));
                        operators.pop();
                    }
                    operators.push(Token::Op(op));
                }
                Token::LParen => operators.push(Token::LParen),
                Token::RParen => loop {
                    match operators.pop() {
                        Some(Token::LParen) => break,
                        Some(Token::Op(op)) => output.push(RpnToken::Op(op)),
                        _ => return Err(ExpressionError::MismatchedParen),
                    }
                },
            }
        }
        while let Some(token) = operators.pop() {
            match token {
                Token::Op(op) => output.push(RpnToken::Op(op)),
                _ => return Err(ExpressionError::MismatchedParen),
            }
        }

        let expression = Self { rpn: output };
        expression.check_arity()?;
        Ok(expression)
    }

    /// Rebuild from the stored reverse-Polish text
    pub fn from_rpn(text: &str) -> Result<Self> {
        let rpn = text
            .split_whitespace()
            .map(|word| {
                if let Some(op) = Operator::from_symbol(word) {
                    Ok(RpnToken::Op(op))
                } else if let Ok(v) = word.parse::<i32>() {
                    Ok(RpnToken::Int(v))
                } else if let Ok(v) = word.parse::<f32>() {
                    Ok(RpnToken::Float(v))
                } else if word.starts_with(|c: char| c.is_alphabetic() || c == '_') {
                    Ok(RpnToken::Ident(word.to_string()))
                } else {
                    Err(ExpressionError::InvalidToken(word.to_string()))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        if rpn.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let expression = Self { rpn };
        expression.check_arity()?;
        Ok(expression)
    }

    /// Stored reverse-Polish text
    pub fn to_rpn(&self) -> String {
        self.rpn
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Compiled tokens
    pub fn tokens(&self) -> &[RpnToken] {
        &self.rpn
    }

    /// Names of every variable the expression touches
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.rpn.iter().filter_map(|token| match token {
            RpnToken::Ident(name) => Some(name.as_str()),
            _ => None,
        })
    }

    fn check_arity(&self) -> Result<()> {
        let mut depth = 0usize;
        for token in &self.rpn {
            match token {
                RpnToken::Op(op) => {
                    let needed = if op.is_unary() { 1 } else { 2 };
                    if depth < needed {
                        return Err(ExpressionError::MissingOperand(op.symbol().to_string()));
                    }
                    depth -= needed - 1;
                }
                _ => depth += 1,
            }
        }
        if depth == 1 {
            Ok(())
        } else {
            Err(ExpressionError::MissingOperand("expression".to_string()))
        }
    }

    /// Run the expression
    pub fn evaluate(&self, env: &mut dyn Environment) -> Result<Operand> {
        enum Slot {
            Value(Operand),
            Name(String),
        }

        fn resolve(slot: Slot, env: &dyn Environment) -> Result<Operand> {
            match slot {
                Slot::Value(v) => Ok(v),
                Slot::Name(name) => env
                    .load(&name)
                    .ok_or(ExpressionError::UnknownVariable(name)),
            }
        }

        let mut stack: Vec<Slot> = Vec::new();
        for token in &self.rpn {
            match token {
                RpnToken::Int(v) => stack.push(Slot::Value(Operand::Int(*v))),
                RpnToken::Float(v) => stack.push(Slot::Value(Operand::Float(*v))),
                RpnToken::Ident(name) => stack.push(Slot::Name(name.clone())),
                RpnToken::Op(op) => {
                    let missing = || ExpressionError::MissingOperand(op.symbol().to_string());
                    let right = stack.pop().ok_or_else(missing)?;
                    let result = if op.is_unary() {
                        unary(*op, resolve(right, env)?)
                    } else {
                        let left = stack.pop().ok_or_else(missing)?;
                        if *op == Operator::Assign {
                            let Slot::Name(name) = left else {
                                return Err(ExpressionError::InvalidAssignment);
                            };
                            let value = resolve(right, env)?;
                            if !env.store(&name, value) {
                                return Err(ExpressionError::StoreFailed(name));
                            }
                            value
                        } else {
                            binary(*op, resolve(left, env)?, resolve(right, env)?)?
                        }
                    };
                    stack.push(Slot::Value(result));
                }
            }
        }
        match stack.pop() {
            Some(slot) if stack.is_empty() => resolve(slot, env),
            _ => Err(ExpressionError::MissingOperand("expression".to_string())),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rpn())
    }
}

fn unary(op: Operator, value: Operand) -> Operand {
    match (op, value) {
        (Operator::Neg, Operand::Int(v)) => Operand::Int(v.wrapping_neg()),
        (Operator::Neg, Operand::Float(v)) => Operand::Float(-v),
        _ => Operand::Int(!value.is_truthy() as i32),
    }
}

fn binary(op: Operator, left: Operand, right: Operand) -> Result<Operand> {
    let flag = |b: bool| Operand::Int(b as i32);
    Ok(match op {
        Operator::And => flag(left.is_truthy() && right.is_truthy()),
        Operator::Or => flag(left.is_truthy() || right.is_truthy()),
        _ => match (left, right) {
            (Operand::Int(a), Operand::Int(b)) => match op {
                Operator::Add => Operand::Int(a.wrapping_add(b)),
                Operator::Sub => Operand::Int(a.wrapping_sub(b)),
                Operator::Mul => Operand::Int(a.wrapping_mul(b)),
                Operator::Div if b == 0 => return Err(ExpressionError::DivisionByZero),
                Operator::Div => Operand::Int(a.wrapping_div(b)),
                Operator::Mod if b == 0 => return Err(ExpressionError::DivisionByZero),
                Operator::Mod => Operand::Int(a.wrapping_rem(b)),
                Operator::Eq => flag(a == b),
                Operator::Ne => flag(a != b),
                Operator::Lt => flag(a < b),
                Operator::Le => flag(a <= b),
                Operator::Gt => flag(a > b),
                Operator::Ge => flag(a >= b),
                _ => return Err(ExpressionError::InvalidToken(op.symbol().to_string())),
            },
            _ => {
                let (a, b) = (left.as_float(), right.as_float());
                match op {
                    Operator::Add => Operand::Float(a + b),
                    Operator::Sub => Operand::Float(a - b),
                    Operator::Mul => Operand::Float(a * b),
                    Operator::Div => Operand::Float(a / b),
                    Operator::Mod => Operand::Float(a % b),
                    Operator::Eq => flag(a == b),
                    Operator::Ne => flag(a != b),
                    Operator::Lt => flag(a < b),
                    Operator::Le => flag(a <= b),
                    Operator::Gt => flag(a > b),
                    Operator::Ge => flag(a >= b),
                    _ => return Err(ExpressionError::InvalidToken(op.symbol().to_string())),
                }
            }
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Vars(HashMap<String, Operand>);

    impl Environment for Vars {
        fn load(&self, name: &str) -> Option<Operand> {
            self.0.get(name).copied()
        }

        fn store(&mut self, name: &str, value: Operand) -> bool {
            self.0.insert(name.to_string(), value);
            true
        }
    }

    fn rpn(source: &str) -> String {
        Expression::compile(source).unwrap().to_rpn()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(rpn("1 + 2 * 3"), "1 2 3 * +");
        assert_eq!(rpn("(1 + 2) * 3"), "1 2 + 3 *");
        assert_eq!(rpn("a - b - c"), "a b - c -");
        assert_eq!(rpn("a < b && b < c || d"), "a b < b c < && d ||");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(rpn("a = b = 3"), "a b 3 = =");
        assert_eq!(rpn("Player.Score = Player.Score + 10"), "Player.Score Player.Score 10 + =");
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(rpn("-x * 2"), "x neg 2 *");
        assert_eq!(rpn("3 - -1"), "3 1 neg -");
        assert_eq!(rpn("!done"), "done !");
    }

    #[test]
    fn test_rpn_round_trip() {
        let expression = Expression::compile("x = (y + 1.5) % 4").unwrap();
        let restored = Expression::from_rpn(&expression.to_rpn()).unwrap();
        assert_eq!(restored, expression);
    }

    #[test]
    fn test_compile_errors() {
        assert_eq!(Expression::compile("(1 + 2"), Err(ExpressionError::MismatchedParen));
        assert_eq!(Expression::compile("1 + 2)"), Err(ExpressionError::MismatchedParen));
        assert!(matches!(
            Expression::compile("1 +"),
            Err(ExpressionError::MissingOperand(_))
        ));
        assert!(matches!(
            Expression::compile("a $ b"),
            Err(ExpressionError::UnexpectedChar { ch: '$', .. })
        ));
        assert_eq!(Expression::compile("  "), Err(ExpressionError::Empty));
    }

    #[test]
    fn test_evaluate() {
        let mut vars = Vars::default();
        vars.store("health", Operand::Int(10));

        let result = Expression::compile("health = health - 3 * 2")
            .unwrap()
            .evaluate(&mut vars)
            .unwrap();
        assert_eq!(result, Operand::Int(4));
        assert_eq!(vars.load("health"), Some(Operand::Int(4)));

        let mixed = Expression::compile("health / 8.0").unwrap().evaluate(&mut vars).unwrap();
        assert_eq!(mixed, Operand::Float(0.5));

        let check = Expression::compile("health >= 4 && !(health > 4)")
            .unwrap()
            .evaluate(&mut vars)
            .unwrap();
        assert_eq!(check, Operand::Int(1));
    }

    #[test]
    fn test_evaluate_errors() {
        let mut vars = Vars::default();
        assert_eq!(
            Expression::compile("missing + 1").unwrap().evaluate(&mut vars),
            Err(ExpressionError::UnknownVariable("missing".into()))
        );
        assert_eq!(
            Expression::compile("1 = 2").unwrap().evaluate(&mut vars),
            Err(ExpressionError::InvalidAssignment)
        );
        assert_eq!(
            Expression::compile("4 / 0").unwrap().evaluate(&mut vars),
            Err(ExpressionError::DivisionByZero)
        );
    }
}
