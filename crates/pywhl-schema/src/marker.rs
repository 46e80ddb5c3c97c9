//! Environment markers: the `; python_version >= "3.8"` tail of a
//! requirement string.
//!
//! Markers are parsed into a small expression tree and evaluated against a
//! [`MarkerEnvironment`] describing the download target, not the machine
//! running the tool.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

use crate::target::{PlatformFamily, PythonVersion, TargetPlatform};
use crate::types::PackageName;

/// Errors raised while parsing a marker expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkerError {
    /// Input ended where more was expected.
    #[error("unexpected end of marker '{0}'")]
    UnexpectedEnd(String),

    /// A token appeared where it is not allowed.
    #[error("unexpected '{token}' in marker '{input}'")]
    UnexpectedToken {
        /// The offending token.
        token: String,
        /// Full marker text.
        input: String,
    },

    /// A bare word that is not a known marker variable.
    #[error("unknown marker variable '{0}'")]
    UnknownVariable(String),

    /// A quoted string with no closing quote.
    #[error("unterminated string in marker '{0}'")]
    Unterminated(String),
}

/// Marker variables understood by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    /// `python_version` (`3.11`)
    PythonVersion,
    /// `python_full_version` (`3.11.0`)
    PythonFullVersion,
    /// `sys_platform` (`linux`, `darwin`, `win32`)
    SysPlatform,
    /// `platform_system` (`Linux`, `Darwin`, `Windows`)
    PlatformSystem,
    /// `os_name` (`posix`, `nt`)
    OsName,
    /// `platform_machine` (`x86_64`, `arm64`, `AMD64`)
    PlatformMachine,
    /// `implementation_name` (`cpython`)
    ImplementationName,
    /// `platform_python_implementation` (`CPython`)
    PlatformPythonImplementation,
    /// `extra`
    Extra,
}

impl Variable {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "python_version" => Self::PythonVersion,
            "python_full_version" => Self::PythonFullVersion,
            "sys_platform" | "sys.platform" => Self::SysPlatform,
            "platform_system" => Self::PlatformSystem,
            "os_name" | "os.name" => Self::OsName,
            "platform_machine" | "platform.machine" => Self::PlatformMachine,
            "implementation_name" => Self::ImplementationName,
            "platform_python_implementation" | "platform.python_implementation" => {
                Self::PlatformPythonImplementation
            }
            "extra" => Self::Extra,
            _ => return None,
        })
    }

    fn is_version(self) -> bool {
        matches!(self, Self::PythonVersion | Self::PythonFullVersion)
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// An environment variable.
    Variable(Variable),
    /// A quoted literal.
    Literal(String),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `~=`
    Compatible,
    /// `===`
    Identical,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

/// Parsed marker expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// Both sides must hold.
    And(Box<Marker>, Box<Marker>),
    /// Either side may hold.
    Or(Box<Marker>, Box<Marker>),
    /// A single comparison.
    Compare {
        /// Left operand.
        lhs: Value,
        /// Operator.
        op: Op,
        /// Right operand.
        rhs: Value,
    },
}

impl Marker {
    /// Parse marker text.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerError`] on unknown variables, unbalanced parentheses,
    /// unterminated strings or any other syntax error.
    pub fn parse(text: &str) -> Result<Self, MarkerError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            input: text,
        };
        let marker = parser.or_expr()?;
        match parser.peek() {
            None => Ok(marker),
            Some(token) => Err(parser.unexpected(token)),
        }
    }

    /// Evaluate against a target environment and the extras requested for
    /// the package that declared this marker.
    pub fn evaluate(&self, env: &MarkerEnvironment, extras: &[String]) -> bool {
        match self {
            Self::And(a, b) => a.evaluate(env, extras) && b.evaluate(env, extras),
            Self::Or(a, b) => a.evaluate(env, extras) || b.evaluate(env, extras),
            Self::Compare { lhs, op, rhs } => compare(env, extras, lhs, *op, rhs),
        }
    }

    /// Whether any comparison mentions `extra`.
    pub fn mentions_extra(&self) -> bool {
        match self {
            Self::And(a, b) | Self::Or(a, b) => a.mentions_extra() || b.mentions_extra(),
            Self::Compare { lhs, rhs, .. } => [lhs, rhs]
                .iter()
                .any(|v| matches!(v, Value::Variable(Variable::Extra))),
        }
    }
}

/// Values of the marker variables for one download target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerEnvironment {
    /// `python_version`
    pub python_version: String,
    /// `python_full_version`
    pub python_full_version: String,
    /// `sys_platform`
    pub sys_platform: String,
    /// `platform_system`
    pub platform_system: String,
    /// `os_name`
    pub os_name: String,
    /// `platform_machine`
    pub platform_machine: String,
    /// `implementation_name`
    pub implementation_name: String,
    /// `platform_python_implementation`
    pub platform_python_implementation: String,
}

impl MarkerEnvironment {
    /// Describe a `CPython` interpreter of `python` on `platform`.
    pub fn for_target(python: PythonVersion, platform: &TargetPlatform) -> Self {
        let (sys_platform, platform_system, os_name) = match platform.family() {
            PlatformFamily::MacOs { .. } => ("darwin", "Darwin", "posix"),
            PlatformFamily::Windows => ("win32", "Windows", "nt"),
            _ => ("linux", "Linux", "posix"),
        };
        let machine = match (platform.family(), platform.arch()) {
            (PlatformFamily::Windows, Some("amd64")) => "AMD64",
            (PlatformFamily::Windows, Some("x86")) => "x86",
            (PlatformFamily::Windows, Some("arm64")) => "ARM64",
            (PlatformFamily::MacOs { .. }, Some("universal2" | "arm64")) => "arm64",
            (_, Some(arch)) => arch,
            (_, None) => "x86_64",
        };
        Self {
            python_version: python.short(),
            python_full_version: python.full(),
            sys_platform: sys_platform.to_string(),
            platform_system: platform_system.to_string(),
            os_name: os_name.to_string(),
            platform_machine: machine.to_string(),
            implementation_name: "cpython".to_string(),
            platform_python_implementation: "CPython".to_string(),
        }
    }

    fn get(&self, var: Variable) -> &str {
        match var {
            Variable::PythonVersion => &self.python_version,
            Variable::PythonFullVersion => &self.python_full_version,
            Variable::SysPlatform => &self.sys_platform,
            Variable::PlatformSystem => &self.platform_system,
            Variable::OsName => &self.os_name,
            Variable::PlatformMachine => &self.platform_machine,
            Variable::ImplementationName => &self.implementation_name,
            Variable::PlatformPythonImplementation => &self.platform_python_implementation,
            Variable::Extra => "",
        }
    }
}

fn compare(env: &MarkerEnvironment, extras: &[String], lhs: &Value, op: Op, rhs: &Value) -> bool {
    // `extra` only ever answers membership in the requested set.
    if let Some(wanted) = extra_operand(lhs, rhs) {
        let wanted = PackageName::new(wanted);
        let requested = extras.iter().any(|e| PackageName::new(e) == wanted);
        return match op {
            Op::Eq | Op::Identical => requested,
            Op::Ne => !requested,
            _ => false,
        };
    }

    let resolve = |v: &Value| -> String {
        match v {
            Value::Variable(var) => env.get(*var).to_string(),
            Value::Literal(s) => s.clone(),
        }
    };
    let (l, r) = (resolve(lhs), resolve(rhs));
    let versioned = [lhs, rhs]
        .iter()
        .any(|v| matches!(v, Value::Variable(var) if var.is_version()));

    match op {
        Op::In => r.contains(l.as_str()),
        Op::NotIn => !r.contains(l.as_str()),
        Op::Identical => l == r,
        Op::Compatible if versioned => {
            let (lv, rv) = (release(&l), release(&r));
            let prefix = rv.len().saturating_sub(1).max(1);
            let component = |v: &[u64], i: usize| v.get(i).copied().unwrap_or(0);
            cmp_release(&lv, &rv) != Ordering::Less
                && (0..prefix).all(|i| component(&lv, i) == component(&rv, i))
        }
        Op::Compatible => false,
        _ => {
            let ord = if versioned {
                cmp_release(&release(&l), &release(&r))
            } else {
                l.cmp(&r)
            };
            match op {
                Op::Eq => ord == Ordering::Equal,
                Op::Ne => ord != Ordering::Equal,
                Op::Lt => ord == Ordering::Less,
                Op::Le => ord != Ordering::Greater,
                Op::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }
        }
    }
}

fn extra_operand<'a>(lhs: &'a Value, rhs: &'a Value) -> Option<&'a str> {
    match (lhs, rhs) {
        (Value::Variable(Variable::Extra), Value::Literal(s))
        | (Value::Literal(s), Value::Variable(Variable::Extra)) => Some(s.as_str()),
        _ => None,
    }
}

/// Leading numeric release components of a dotted version (`3.10` ->
/// `[3, 10]`). Non-numeric trailing text in a component is ignored.
fn release(text: &str) -> Vec<u64> {
    text.split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

fn cmp_release(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            a.get(i)
                .copied()
                .unwrap_or(0)
                .cmp(&b.get(i).copied().unwrap_or(0))
        })
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Str(String),
    Word(String),
    Op(&'static str),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Word(w) => write!(f, "{w}"),
            Self::Op(o) => write!(f, "{o}"),
        }
    }
}

const SYMBOL_OPS: [&str; 8] = ["===", "==", "!=", "<=", ">=", "~=", "<", ">"];

fn tokenize(input: &str) -> Result<Vec<Token>, MarkerError> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = &rest[c.len_utf8()..];
        } else if c == '(' {
            tokens.push(Token::LParen);
            rest = &rest[1..];
        } else if c == ')' {
            tokens.push(Token::RParen);
            rest = &rest[1..];
        } else if c == '"' || c == '\'' {
            let body = &rest[1..];
            let end = body
                .find(c)
                .ok_or_else(|| MarkerError::Unterminated(input.to_string()))?;
            tokens.push(Token::Str(body[..end].to_string()));
            rest = &body[end + 1..];
        } else if let Some(op) = SYMBOL_OPS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Token::Op(*op));
            rest = &rest[op.len()..];
        } else if c.is_ascii_alphanumeric() || c == '_' {
            let end = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'))
                .unwrap_or(rest.len());
            tokens.push(Token::Word(rest[..end].to_string()));
            rest = &rest[end..];
        } else {
            return Err(MarkerError::UnexpectedToken {
                token: c.to_string(),
                input: input.to_string(),
            });
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Result<&'a Token, MarkerError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| MarkerError::UnexpectedEnd(self.input.to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(&self, token: &Token) -> MarkerError {
        MarkerError::UnexpectedToken {
            token: token.to_string(),
            input: self.input.to_string(),
        }
    }

    fn at_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == word)
    }

    fn or_expr(&mut self) -> Result<Marker, MarkerError> {
        let mut lhs = self.and_expr()?;
        while self.at_word("or") {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Marker::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Marker, MarkerError> {
        let mut lhs = self.atom()?;
        while self.at_word("and") {
            self.pos += 1;
            let rhs = self.atom()?;
            lhs = Marker::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn atom(&mut self) -> Result<Marker, MarkerError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let inner = self.or_expr()?;
            return match self.advance()? {
                Token::RParen => Ok(inner),
                other => Err(self.unexpected(other)),
            };
        }
        let lhs = self.value()?;
        let op = self.op()?;
        let rhs = self.value()?;
        Ok(Marker::Compare { lhs, op, rhs })
    }

    fn value(&mut self) -> Result<Value, MarkerError> {
        match self.advance()? {
            Token::Str(s) => Ok(Value::Literal(s.clone())),
            Token::Word(w) => Variable::from_name(w)
                .map(Value::Variable)
                .ok_or_else(|| MarkerError::UnknownVariable(w.clone())),
            other => Err(self.unexpected(other)),
        }
    }

    fn op(&mut self) -> Result<Op, MarkerError> {
        match self.advance()? {
            Token::Op(op) => Ok(match *op {
                "===" => Op::Identical,
                "==" => Op::Eq,
                "!=" => Op::Ne,
                "<=" => Op::Le,
                ">=" => Op::Ge,
                "~=" => Op::Compatible,
                "<" => Op::Lt,
                _ => Op::Gt,
            }),
            Token::Word(w) if w == "in" => Ok(Op::In),
            Token::Word(w) if w == "not" => match self.advance()? {
                Token::Word(w) if w == "in" => Ok(Op::NotIn),
                other => Err(self.unexpected(other)),
            },
            other => Err(self.unexpected(other)),
        }
    }
}
