//! Boolean query language over the inverted index.
//!
//! ```text
//! expr := term | '(' expr ')' | expr ('AND' | 'OR') expr
//! term := ['NOT'] WORD
//! ```
//!
//! `AND` and `OR` share one precedence level and associate to the left, so
//! `a OR b AND c` reads as `(a OR b) AND c`. `NOT` applies to the single word
//! that follows it and cannot negate a parenthesized group. Operators are
//! matched case-insensitively; words are lower-cased.
//!
//! Parsing is strict. Input that a lenient parser would silently repair is
//! rejected with [`LogError::Query`] instead:
//!
//! - `NOT` before a group, e.g. `NOT (a OR b)`
//! - repeated negation, e.g. `NOT NOT a`
//! - an operator with no left operand, e.g. `AND a` or `a AND OR b`
//! - a trailing operator or `NOT`, e.g. `a AND`
//!
//! [`SearchIndex::boolean_search`](super::SearchIndex::boolean_search) turns
//! any such error into an empty result.

use std::collections::HashSet;
use std::fmt;

use super::DocId;
use super::inverted::InvertedIndex;
use crate::error::{LogError, Result};

/// Binary boolean operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// Set intersection
    And,
    /// Set union
    Or,
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Parsed boolean expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoolExpr {
    /// A single word, optionally negated.
    Term {
        /// Lower-cased word to match
        text: String,
        /// Complement the matching set
        negated: bool,
    },
    /// Two sub-expressions joined by an operator.
    Expression {
        /// Left operand
        left: Box<BoolExpr>,
        /// Joining operator
        op: BoolOp,
        /// Right operand
        right: Box<BoolExpr>,
    },
}

impl BoolExpr {
    fn term(text: &str, negated: bool) -> Self {
        Self::Term {
            text: text.to_lowercase(),
            negated,
        }
    }

    fn join(left: Self, op: BoolOp, right: Self) -> Self {
        Self::Expression {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

impl fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term { text, negated: true } => write!(f, "NOT {text}"),
            Self::Term { text, negated: false } => write!(f, "{text}"),
            Self::Expression { left, op, right } => write!(f, "({left} {op} {right})"),
        }
    }
}

/// Lexical token of a boolean query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `(`
    Open,
    /// `)`
    Close,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `NOT`
    Not,
    /// Any other whitespace-delimited word
    Word(String),
}

/// Parser for the boolean query language.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanParser;

impl BooleanParser {
    /// Splits a query into tokens.
    ///
    /// Parentheses are separated from adjacent words; operator keywords are
    /// recognized in any case.
    #[must_use]
    pub fn tokenize(query: &str) -> Vec<Token> {
        query
            .replace('(', " ( ")
            .replace(')', " ) ")
            .split_whitespace()
            .map(|word| match word.to_ascii_uppercase().as_str() {
                "(" => Token::Open,
                ")" => Token::Close,
                "AND" => Token::And,
                "OR" => Token::Or,
                "NOT" => Token::Not,
                _ => Token::Word(word.to_string()),
            })
            .collect()
    }

    /// Parses a query into an expression tree.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Query`] for an empty query, unbalanced or empty
    /// parentheses, missing operands or operators, and a misplaced `NOT`.
    pub fn parse(query: &str) -> Result<BoolExpr> {
        let tokens = Self::tokenize(query);
        if tokens.is_empty() {
            return Err(LogError::query("empty boolean query"));
        }
        parse_span(&tokens)
    }
}

fn parse_span(tokens: &[Token]) -> Result<BoolExpr> {
    let mut current: Option<BoolExpr> = None;
    let mut pending_op: Option<BoolOp> = None;
    let mut negate = false;
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            Token::Open => {
                if negate {
                    return Err(LogError::query("NOT cannot be applied to a group"));
                }
                let close = matching_close(tokens, i)?;
                let inner = &tokens[i + 1..close];
                if inner.is_empty() {
                    return Err(LogError::query("empty parentheses"));
                }
                let group = parse_span(inner)?;
                current = Some(combine(current, pending_op.take(), group)?);
                i = close + 1;
            }
            Token::Close => return Err(LogError::query("unbalanced parentheses: unexpected ')'")),
            Token::And | Token::Or => {
                let op = if tokens[i] == Token::And { BoolOp::And } else { BoolOp::Or };
                if current.is_none() || pending_op.is_some() || negate {
                    return Err(LogError::query(format!("operator {op} has no left operand")));
                }
                pending_op = Some(op);
                i += 1;
            }
            Token::Not => {
                if negate {
                    return Err(LogError::query("NOT must be followed by a word"));
                }
                negate = true;
                i += 1;
            }
            Token::Word(word) => {
                let term = BoolExpr::term(word, negate);
                negate = false;
                current = Some(combine(current, pending_op.take(), term)?);
                i += 1;
            }
        }
    }

    if negate {
        return Err(LogError::query("dangling NOT at end of query"));
    }
    if let Some(op) = pending_op {
        return Err(LogError::query(format!("operator {op} has no right operand")));
    }
    current.ok_or_else(|| LogError::query("empty boolean query"))
}

fn combine(current: Option<BoolExpr>, op: Option<BoolOp>, next: BoolExpr) -> Result<BoolExpr> {
    match (current, op) {
        (None, _) => Ok(next),
        (Some(left), Some(op)) => Ok(BoolExpr::join(left, op, next)),
        (Some(left), None) => Err(LogError::query(format!(
            "missing operator between '{left}' and '{next}'"
        ))),
    }
}

fn matching_close(tokens: &[Token], open: usize) -> Result<usize> {
    let mut depth = 0usize;
    for (offset, token) in tokens[open..].iter().enumerate() {
        match token {
            Token::Open => depth += 1,
            Token::Close => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + offset);
                }
            }
            _ => {}
        }
    }
    Err(LogError::query("unbalanced parentheses: missing ')'"))
}

/// Evaluates an expression as set algebra over the index's documents.
///
/// A term matches every document holding an index term that contains the
/// term's text. A negated term yields the complement within all registered
/// documents.
#[must_use]
pub fn evaluate(expr: &BoolExpr, index: &InvertedIndex, field: Option<&str>) -> HashSet<DocId> {
    match expr {
        BoolExpr::Term { text, negated } => {
            let matched = term_documents(text, index, field);
            if *negated {
                index.document_ids().filter(|id| !matched.contains(id)).collect()
            } else {
                matched
            }
        }
        BoolExpr::Expression { left, op, right } => {
            let left = evaluate(left, index, field);
            let right = evaluate(right, index, field);
            match op {
                BoolOp::And => left.intersection(&right).copied().collect(),
                BoolOp::Or => left.union(&right).copied().collect(),
            }
        }
    }
}

fn term_documents(text: &str, index: &InvertedIndex, field: Option<&str>) -> HashSet<DocId> {
    let mut docs = HashSet::new();
    for (term, postings) in index.terms() {
        if !term.contains(text) {
            continue;
        }
        for (doc_id, fields) in postings {
            if field.is_none_or(|f| fields.contains_key(f)) {
                docs.insert(*doc_id);
            }
        }
    }
    docs
}
