//! Lock expressions: named boolean predicates gating an access kind.
//!
//! An entity carries a [`Locks`] map from access kind (`read`, `post`,
//! `bbadmin`, ...) to an expression such as `faction(K) & !rank(K, 5)`.
//! Expressions are parsed with [`LockExpr::parse`] and evaluated by a
//! [`LockEvaluator`]; the stock evaluator is [`ExpressionEvaluator`].

mod eval;
mod parser;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use eval::{ExpressionEvaluator, LockEvaluator, LockFacts};

/// Longest lock expression accepted, in bytes
pub const MAX_LOCK_LEN: usize = 1024;

/// Deepest `!` / parenthesis nesting accepted
pub const MAX_LOCK_DEPTH: usize = 32;

/// Lock map keyed by lower-cased access kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Locks(BTreeMap<String, String>);

impl Locks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and seeding
    pub fn with(mut self, kind: &str, expr: &str) -> Self {
        self.insert(kind, expr);
        self
    }

    pub fn insert(&mut self, kind: &str, expr: &str) {
        self.0.insert(kind.to_lowercase(), expr.trim().to_owned());
    }

    pub fn get(&self, kind: &str) -> Option<&str> {
        self.0.get(&kind.to_lowercase()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for Locks {
    fn from(map: BTreeMap<String, String>) -> Self {
        let mut locks = Self::new();
        for (kind, expr) in &map {
            locks.insert(kind, expr);
        }
        locks
    }
}

impl From<Locks> for BTreeMap<String, String> {
    fn from(locks: Locks) -> Self {
        locks.0
    }
}

/// `kind:expr;kind:expr`, used in change notifications
impl fmt::Display for Locks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (kind, expr) in &self.0 {
            if !first {
                f.write_str(";")?;
            }
            write!(f, "{kind}:{expr}")?;
            first = false;
        }
        Ok(())
    }
}

/// Lock expression parse/compile failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("syntax error in lock '{expr}' at offset {offset}")]
    Syntax { expr: String, offset: usize },

    #[error("unknown lock function '{0}'")]
    UnknownFunction(String),

    #[error("lock function '{name}' expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid argument '{value}' to lock function '{name}'")]
    BadArgument { name: String, value: String },

    #[error("lock is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("lock nesting exceeds depth {max}")]
    TooDeep { max: usize },
}

/// Built-in lock predicates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockFn {
    All,
    None,
    /// User admin level at least N
    Admin(i32),
    /// Username equals (case-insensitive)
    User(String),
    /// Character name equals (case-insensitive)
    Name(String),
    /// Character id equals
    Id(Uuid),
    /// Member of the faction with this abbreviation
    Faction(String),
    /// Member of the faction with rank at or below N
    Rank(String, i32),
    /// Holds the named faction permission
    FactionPerm(String, String),
}

impl LockFn {
    /// Faction abbreviation this predicate needs resolved, if any
    pub fn faction(&self) -> Option<&str> {
        match self {
            Self::Faction(abbr) | Self::Rank(abbr, _) | Self::FactionPerm(abbr, _) => Some(abbr),
            _ => None,
        }
    }
}

/// Compiled lock expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockExpr {
    Call(LockFn),
    Not(Box<LockExpr>),
    And(Box<LockExpr>, Box<LockExpr>),
    Or(Box<LockExpr>, Box<LockExpr>),
}

impl LockExpr {
    /// Parse and compile an expression.
    ///
    /// # Example
    /// ```
    /// use mushbbs_core::lock::LockExpr;
    ///
    /// assert!(LockExpr::parse("faction(K) & !rank(K, 5) | admin(3)").is_ok());
    /// assert!(LockExpr::parse("faction(K) &").is_err());
    /// assert!(LockExpr::parse("wizard()").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, LockError> {
        parser::parse(input)
    }

    /// Distinct faction abbreviations referenced anywhere in the expression
    pub fn factions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        self.collect_factions(&mut out);
        out
    }

    fn collect_factions(&self, out: &mut Vec<String>) {
        match self {
            Self::Call(func) => {
                if let Some(abbr) = func.faction() {
                    let abbr = abbr.to_lowercase();
                    if !out.contains(&abbr) {
                        out.push(abbr);
                    }
                }
            }
            Self::Not(inner) => inner.collect_factions(out),
            Self::And(a, b) | Self::Or(a, b) => {
                a.collect_factions(out);
                b.collect_factions(out);
            }
        }
    }
}
