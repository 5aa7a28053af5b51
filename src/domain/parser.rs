//! Expression parser for notepad lines.
//!
//! This module implements a recursive descent parser for the expression
//! language evaluated on every line of a document. Each line is one
//! statement: an expression, a variable assignment, or a single-expression
//! function definition.
//!
//! # Grammar
//!
//! ```bnf
//! Statement      ::= ( Assignment | FunctionDef | Expression )? ";"?
//! Assignment     ::= Identifier "=" Expression
//! FunctionDef    ::= Identifier "(" Params? ")" "=" Expression
//! Expression     ::= Comparison ( ( "to" | "in" ) UnitTarget )*
//! Comparison     ::= Addition ( ( "<" | "<=" | ">" | ">=" | "==" | "!=" ) Addition )*
//! Addition       ::= Multiplication ( ( "+" | "-" ) Multiplication )*
//! Multiplication ::= Implicit ( ( "*" | "/" | "%" ) Implicit )*
//! Implicit       ::= Unary Power*
//! Unary          ::= ( "+" | "-" ) Unary | Power
//! Power          ::= Postfix ( ( "**" | "^" ) Unary )?
//! Postfix        ::= Primary ( "(" ArgumentList? ")" )*
//! Primary        ::= Number | Identifier | "(" Expression ")"
//! UnitTarget     ::= UnitFactor ( ( "*" | "/" ) UnitFactor )*
//! UnitFactor     ::= Identifier ( "^" "-"? Number )?
//! ```
//!
//! Implicit multiplication (`10 USD`, `3 days`, `2(1 + 2)`) binds tighter
//! than explicit `*` and `/`, so `2 km / 1 h` reads as `(2 km) / (1 h)`.
//! Everything after `#` is a comment.

use std::fmt;

use super::errors::ParseError;

/// Represents a token in the expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Power,
    PowerAlt, // ^ alternative to **

    // Comparison operators
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,

    Assign,
    To,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,
    Semicolon,

    // End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Multiply => write!(f, "*"),
            Token::Divide => write!(f, "/"),
            Token::Modulo => write!(f, "%"),
            Token::Power => write!(f, "**"),
            Token::PowerAlt => write!(f, "^"),
            Token::Less => write!(f, "<"),
            Token::LessEqual => write!(f, "<="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEqual => write!(f, ">="),
            Token::Equal => write!(f, "=="),
            Token::NotEqual => write!(f, "!="),
            Token::Assign => write!(f, "="),
            Token::To => write!(f, "to"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// Represents an Abstract Syntax Tree node for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Symbol(String),

    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },

    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },

    /// `value to unit`
    Convert {
        value: Box<Expr>,
        target: Vec<UnitTerm>,
    },
}

/// Binary operators. Also the operator half of a dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Equal,
    NotEqual,

    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    Power,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Equal => "equal",
            BinaryOp::NotEqual => "unequal",
            BinaryOp::Less => "smaller",
            BinaryOp::LessEqual => "smallerEq",
            BinaryOp::Greater => "larger",
            BinaryOp::GreaterEqual => "largerEq",
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "subtract",
            BinaryOp::Multiply => "multiply",
            BinaryOp::Divide => "divide",
            BinaryOp::Modulo => "mod",
            BinaryOp::Power => "pow",
        }
    }

}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

/// One factor of a conversion target, e.g. `s^2` in `to m / s^2`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitTerm {
    pub name: String,
    pub power: i32,
}

/// A parsed line.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    /// A trailing `;` hides the result.
    pub silent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// Nothing but a comment.
    Empty,
    Expression(Expr),
    Assign {
        name: String,
        value: Expr,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Expr,
    },
}

/// Lexical analyzer for tokenizing expressions.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Reads a number token: digits, an optional fraction and an optional exponent.
    fn read_number(&mut self) -> Result<f64, ParseError> {
        let mut number_str = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if self.current_char == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            number_str.push('.');
            self.advance();

            while let Some(ch) = self.current_char {
                if ch.is_ascii_digit() {
                    number_str.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        // Only treat `e` as an exponent when digits follow, so `2e` stays `2 * e`.
        if matches!(self.current_char, Some('e') | Some('E')) {
            let digits_at = match self.peek(1) {
                Some('+') | Some('-') => 2,
                _ => 1,
            };
            if self.peek(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digits_at {
                    if let Some(ch) = self.current_char {
                        number_str.push(ch);
                    }
                    self.advance();
                }
                while let Some(ch) = self.current_char {
                    if ch.is_ascii_digit() {
                        number_str.push(ch);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        number_str
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidNumber(number_str))
    }

    fn read_identifier(&mut self) -> String {
        let mut identifier = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        identifier
    }

    fn single(&mut self, token: Token) -> Result<Token, ParseError> {
        self.advance();
        Ok(token)
    }

    /// Gets the next token from the input.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();

        let Some(ch) = self.current_char else {
            return Ok(Token::Eof);
        };

        match ch {
            '#' => {
                self.position = self.input.len();
                self.current_char = None;
                Ok(Token::Eof)
            }

            '0'..='9' => Ok(Token::Number(self.read_number()?)),
            '.' if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => {
                Ok(Token::Number(self.read_number()?))
            }

            c if c.is_alphabetic() || c == '_' => {
                let identifier = self.read_identifier();
                match identifier.as_str() {
                    "to" | "in" => Ok(Token::To),
                    _ => Ok(Token::Identifier(identifier)),
                }
            }

            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' => {
                self.advance();
                if self.current_char == Some('*') {
                    self.single(Token::Power)
                } else {
                    Ok(Token::Multiply)
                }
            }
            '/' => self.single(Token::Divide),
            '%' => self.single(Token::Modulo),
            '^' => self.single(Token::PowerAlt),

            '<' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.single(Token::LessEqual)
                } else {
                    Ok(Token::Less)
                }
            }
            '>' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.single(Token::GreaterEqual)
                } else {
                    Ok(Token::Greater)
                }
            }
            '=' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.single(Token::Equal)
                } else {
                    Ok(Token::Assign)
                }
            }
            '!' if self.peek(1) == Some('=') => {
                self.advance();
                self.single(Token::NotEqual)
            }

            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            ',' => self.single(Token::Comma),
            ';' => self.single(Token::Semicolon),

            _ => Err(ParseError::UnexpectedCharacter {
                ch,
                column: self.position,
            }),
        }
    }
}

/// Deepest expression tree a line may produce unless configured otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Largest magnitude accepted for an exponent in a conversion target.
pub const MAX_UNIT_EXPONENT: f64 = i8::MAX as f64;

/// Recursive descent parser for notepad lines.
///
/// Every parenthesis, sign, power and chained operator counts toward a
/// nesting depth; past `max_depth` parsing fails instead of recursing.
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    /// Creates a new parser for the given line.
    pub fn new(input: &str) -> Result<Self, ParseError> {
        Self::with_max_depth(input, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(input: &str, max_depth: usize) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;

        Ok(Self {
            lexer,
            current_token,
            depth: 0,
            max_depth,
        })
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= self.max_depth {
            return Err(ParseError::TooDeep(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if std::mem::discriminant(&self.current_token) == std::mem::discriminant(&expected) {
            self.advance()
        } else {
            Err(ParseError::Expected {
                expected: expected.to_string(),
                found: self.current_token.to_string(),
            })
        }
    }

    /// Parses a whole line into a statement.
    pub fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let kind = match self.current_token {
            Token::Eof | Token::Semicolon => StatementKind::Empty,
            _ => {
                let expr = self.parse_expression()?;
                if self.current_token == Token::Assign {
                    self.advance()?;
                    let value = self.parse_expression()?;
                    Self::assignment(expr, value)?
                } else {
                    StatementKind::Expression(expr)
                }
            }
        };

        let silent = self.current_token == Token::Semicolon;
        if silent {
            self.advance()?;
        }

        if self.current_token != Token::Eof {
            return Err(ParseError::UnexpectedToken(self.current_token.to_string()));
        }

        Ok(Statement { kind, silent })
    }

    /// Parses a single expression, rejecting anything after it.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;

        if self.current_token != Token::Eof {
            return Err(ParseError::UnexpectedToken(self.current_token.to_string()));
        }

        Ok(expr)
    }

    fn assignment(target: Expr, value: Expr) -> Result<StatementKind, ParseError> {
        match target {
            Expr::Symbol(name) => Ok(StatementKind::Assign { name, value }),
            Expr::Call { callee, args } => {
                let Expr::Symbol(name) = *callee else {
                    return Err(ParseError::InvalidAssignment);
                };
                let params = args
                    .into_iter()
                    .map(|arg| match arg {
                        Expr::Symbol(param) => Ok(param),
                        _ => Err(ParseError::InvalidAssignment),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(StatementKind::FunctionDef {
                    name,
                    params,
                    body: value,
                })
            }
            _ => Err(ParseError::InvalidAssignment),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        self.descend()?;
        let mut expr = self.parse_comparison()?;

        while self.current_token == Token::To {
            self.descend()?;
            self.advance()?;
            let target = self.parse_unit_target()?;
            expr = Expr::Convert {
                value: Box::new(expr),
                target,
            };
        }

        self.depth = depth;
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_addition()?;

        loop {
            let op = match self.current_token {
                Token::Less => BinaryOp::Less,
                Token::LessEqual => BinaryOp::LessEqual,
                Token::Greater => BinaryOp::Greater,
                Token::GreaterEqual => BinaryOp::GreaterEqual,
                Token::Equal => BinaryOp::Equal,
                Token::NotEqual => BinaryOp::NotEqual,
                _ => break,
            };
            self.descend()?;
            self.advance()?;
            let right = self.parse_addition()?;
            left = Expr::Binary {
                left: Box::new(left),
                operator: op,
                right: Box::new(right),
            };
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_addition(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_multiplication()?;

        loop {
            let op = match self.current_token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.descend()?;
            self.advance()?;
            let right = self.parse_multiplication()?;
            left = Expr::Binary {
                left: Box::new(left),
                operator: op,
                right: Box::new(right),
            };
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_multiplication(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_implicit()?;

        loop {
            let op = match self.current_token {
                Token::Multiply => BinaryOp::Multiply,
                Token::Divide => BinaryOp::Divide,
                Token::Modulo => BinaryOp::Modulo,
                _ => break,
            };
            self.descend()?;
            self.advance()?;
            let right = self.parse_implicit()?;
            left = Expr::Binary {
                left: Box::new(left),
                operator: op,
                right: Box::new(right),
            };
        }

        self.depth = depth;
        Ok(left)
    }

    /// Parses juxtaposed operands such as `10 USD` or `2(3 + 4)`.
    fn parse_implicit(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;

        while matches!(
            self.current_token,
            Token::Number(_) | Token::Identifier(_) | Token::LeftParen
        ) {
            self.descend()?;
            let right = self.parse_power()?;
            left = Expr::Binary {
                left: Box::new(left),
                operator: BinaryOp::Multiply,
                right: Box::new(right),
            };
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let operator = match self.current_token {
            Token::Plus => UnaryOp::Plus,
            Token::Minus => UnaryOp::Minus,
            _ => return self.parse_power(),
        };
        let depth = self.depth;
        self.descend()?;
        self.advance()?;
        let operand = self.parse_unary()?;
        self.depth = depth;
        Ok(Expr::Unary {
            operator,
            operand: Box::new(operand),
        })
    }

    /// Parses power expressions (right-associative).
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_postfix()?;

        if matches!(self.current_token, Token::Power | Token::PowerAlt) {
            let depth = self.depth;
            self.descend()?;
            self.advance()?;
            let right = self.parse_unary()?;
            self.depth = depth;
            Ok(Expr::Binary {
                left: Box::new(left),
                operator: BinaryOp::Power,
                right: Box::new(right),
            })
        } else {
            Ok(left)
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;

        // Only names can be called; `(2)(3)` is an implicit multiplication.
        while matches!(expr, Expr::Symbol(_) | Expr::Call { .. })
            && self.current_token == Token::LeftParen
        {
            self.descend()?;
            self.advance()?;
            let args = self.parse_argument_list()?;
            self.expect(Token::RightParen)?;
            expr = Expr::Call {
                callee: Box::new(expr),
                args,
            };
        }

        self.depth = depth;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match &self.current_token {
            Token::Number(value) => {
                let value = *value;
                self.advance()?;
                Ok(Expr::Number(value))
            }

            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(Expr::Symbol(name))
            }

            Token::LeftParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }

            _ => Err(ParseError::UnexpectedToken(self.current_token.to_string())),
        }
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();

        if self.current_token == Token::RightParen {
            return Ok(args);
        }

        args.push(self.parse_expression()?);

        while self.current_token == Token::Comma {
            self.advance()?;
            args.push(self.parse_expression()?);
        }

        Ok(args)
    }

    fn parse_unit_target(&mut self) -> Result<Vec<UnitTerm>, ParseError> {
        let mut terms = vec![self.parse_unit_factor(1)?];

        loop {
            let sign = match self.current_token {
                Token::Multiply => 1,
                Token::Divide => -1,
                _ => break,
            };
            self.advance()?;
            terms.push(self.parse_unit_factor(sign)?);
        }

        Ok(terms)
    }

    fn parse_unit_factor(&mut self, sign: i32) -> Result<UnitTerm, ParseError> {
        let Token::Identifier(name) = &self.current_token else {
            return Err(ParseError::Expected {
                expected: "unit".to_string(),
                found: self.current_token.to_string(),
            });
        };
        let name = name.clone();
        self.advance()?;

        let mut power = 1;
        if matches!(self.current_token, Token::Power | Token::PowerAlt) {
            self.advance()?;
            let negative = self.current_token == Token::Minus;
            if negative {
                self.advance()?;
            }
            let Token::Number(exponent) = self.current_token else {
                return Err(ParseError::Expected {
                    expected: "exponent".to_string(),
                    found: self.current_token.to_string(),
                });
            };
            if exponent.fract() != 0.0 || exponent > MAX_UNIT_EXPONENT {
                return Err(ParseError::InvalidNumber(exponent.to_string()));
            }
            self.advance()?;
            power = if negative { -(exponent as i32) } else { exponent as i32 };
        }

        Ok(UnitTerm {
            name,
            power: power * sign,
        })
    }
}

/// Parses one line of text into a statement.
pub fn parse_statement(input: &str) -> Result<Statement, ParseError> {
    Parser::new(input)?.parse_statement()
}

/// Parses one line, rejecting expressions nested deeper than `max_depth`.
pub fn parse_statement_with_depth(input: &str, max_depth: usize) -> Result<Statement, ParseError> {
    Parser::with_max_depth(input, max_depth)?.parse_statement()
}
