//! Static analysis of a user expression.
//!
//! Finds the expression's shape (explicit `|a, b| body` lambda or a bare
//! expression whose input is inferred), its inputs, free variables, body
//! kind and whether it escalates to cell metadata. The body itself is
//! assumed to be valid Rhai; only names and brackets are inspected.

mod lexer;
mod scope;

use thiserror::Error;

pub use lexer::{Token, TokenKind, tokenize};
pub use scope::is_reserved;

use crate::config::DEFAULT_MAX_EXPRESSION_BYTES;
use scope::Scopes;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("expression is empty")]
    Empty,

    #[error("expression is too large ({len} bytes, max {max})")]
    TooLarge { len: usize, max: usize },

    #[error("unterminated {what} starting at offset {offset}")]
    Unterminated { what: &'static str, offset: usize },

    #[error("unbalanced '{found}' at offset {offset}")]
    Unbalanced { found: String, offset: usize },

    #[error("unclosed '{open}' opened at offset {offset}")]
    Unclosed { open: String, offset: usize },

    #[error("malformed parameter list at offset {offset}: {message}")]
    MalformedParameters { offset: usize, message: String },

    #[error("duplicate parameter '{0}'")]
    DuplicateParameter(String),

    #[error("lambda has no body")]
    EmptyBody,

    #[error("no input identifier found in expression")]
    NoInput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// `|a, b| body`
    Lambda,
    /// A bare expression; the input is its leftmost variable.
    Sugar,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Expression,
    /// A `{ ... }` block; `body` holds the text between the braces.
    Statement,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Analysis {
    /// The expression exactly as supplied.
    pub source: String,
    pub shape: Shape,
    pub inputs: Vec<String>,
    pub free_variables: Vec<String>,
    pub needs_escalation: bool,
    pub body_kind: BodyKind,
    /// Text to splice into the unit.
    pub body: String,
}

impl Analysis {
    /// Inputs followed by free variables, in binding order.
    pub fn parameters(&self) -> Vec<String> {
        self.inputs
            .iter()
            .chain(self.free_variables.iter())
            .cloned()
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct Analyzer {
    max_bytes: usize,
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer::new(DEFAULT_MAX_EXPRESSION_BYTES)
    }
}

impl Analyzer {
    pub fn new(max_bytes: usize) -> Analyzer {
        Analyzer { max_bytes }
    }

    pub fn analyze(&self, text: &str) -> Result<Analysis, AnalysisError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AnalysisError::Empty);
        }
        if trimmed.len() > self.max_bytes {
            return Err(AnalysisError::TooLarge {
                len: trimmed.len(),
                max: self.max_bytes,
            });
        }

        let tokens = tokenize(trimmed)?;
        check_balance(&tokens)?;

        let (shape, params, body_start) = match tokens.first() {
            Some(t) if t.is_punct("|") => {
                let (params, close) = parse_params(&tokens)?;
                (Shape::Lambda, params, close + 1)
            }
            Some(t) if t.is_punct("||") => (Shape::Lambda, Vec::new(), 1),
            _ => (Shape::Sugar, Vec::new(), 0),
        };
        let body_tokens = &tokens[body_start..];
        let Some(first) = body_tokens.first() else {
            return Err(AnalysisError::EmptyBody);
        };

        let (body_kind, body) = match body_tokens.last() {
            Some(last) if first.is_punct("{") && last.is_punct("}") && closes(body_tokens) => (
                BodyKind::Statement,
                trimmed[first.offset + 1..last.offset].trim().to_string(),
            ),
            _ => (BodyKind::Expression, trimmed[first.offset..].trim().to_string()),
        };

        let walk = walk_body(body_tokens, &params);
        let (inputs, free_variables) = match shape {
            Shape::Lambda => (params, walk.references),
            Shape::Sugar => {
                let mut refs = walk.references.into_iter();
                let input = refs.next().ok_or(AnalysisError::NoInput)?;
                (vec![input], refs.collect())
            }
        };

        let analysis = Analysis {
            source: text.to_string(),
            shape,
            inputs,
            free_variables,
            needs_escalation: walk.needs_escalation,
            body_kind,
            body,
        };
        tracing::debug!(
            shape = ?analysis.shape,
            inputs = ?analysis.inputs,
            free = ?analysis.free_variables,
            escalation = analysis.needs_escalation,
            "analyzed expression"
        );
        Ok(analysis)
    }

    /// Like [`Analyzer::analyze`], keeping only free variables the host
    /// reports as bound.
    pub fn analyze_in_scope<F>(&self, text: &str, is_bound: F) -> Result<Analysis, AnalysisError>
    where
        F: Fn(&str) -> bool,
    {
        let mut analysis = self.analyze(text)?;
        analysis.free_variables.retain(|name| is_bound(name));
        Ok(analysis)
    }
}

pub fn analyze(text: &str) -> Result<Analysis, AnalysisError> {
    Analyzer::default().analyze(text)
}

pub fn analyze_in_scope<F>(text: &str, is_bound: F) -> Result<Analysis, AnalysisError>
where
    F: Fn(&str) -> bool,
{
    Analyzer::default().analyze_in_scope(text, is_bound)
}

fn opener_for(close: &str) -> &'static [&'static str] {
    match close {
        ")" => &["("],
        "]" => &["[", "?["],
        "}" => &["{"],
        _ => &[],
    }
}

fn check_balance(tokens: &[Token]) -> Result<(), AnalysisError> {
    let mut stack: Vec<&Token> = Vec::new();
    for token in tokens.iter().filter(|t| t.kind == TokenKind::Punct) {
        match token.text.as_str() {
            "(" | "[" | "?[" | "{" => stack.push(token),
            ")" | "]" | "}" => match stack.pop() {
                Some(open) if opener_for(&token.text).contains(&open.text.as_str()) => {}
                _ => {
                    return Err(AnalysisError::Unbalanced {
                        found: token.text.clone(),
                        offset: token.offset,
                    });
                }
            },
            _ => {}
        }
    }
    match stack.pop() {
        Some(open) => Err(AnalysisError::Unclosed {
            open: open.text.clone(),
            offset: open.offset,
        }),
        None => Ok(()),
    }
}

/// True when the `{` opening `tokens` is closed by its last token.
fn closes(tokens: &[Token]) -> bool {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_punct("{") {
            depth += 1;
        } else if token.is_punct("}") {
            depth -= 1;
            if depth == 0 {
                return i == tokens.len() - 1;
            }
        }
    }
    false
}

/// Parse `|a, b|` at the start of `tokens`; returns the names and the index
/// of the closing `|`.
fn parse_params(tokens: &[Token]) -> Result<(Vec<String>, usize), AnalysisError> {
    let mut params: Vec<String> = Vec::new();
    let mut i = 1;
    let malformed = |token: Option<&Token>, message: &str| AnalysisError::MalformedParameters {
        offset: token.map(|t| t.offset).unwrap_or(0),
        message: message.to_string(),
    };
    if tokens.get(i).is_some_and(|t| t.is_punct("|")) {
        return Ok((params, i));
    }
    loop {
        match tokens.get(i) {
            Some(t) if t.is_ident() && !scope::is_keyword(&t.text) => {
                if params.contains(&t.text) {
                    return Err(AnalysisError::DuplicateParameter(t.text.clone()));
                }
                params.push(t.text.clone());
            }
            other => return Err(malformed(other, "expected a parameter name")),
        }
        i += 1;
        match tokens.get(i) {
            Some(t) if t.is_punct("|") => return Ok((params, i)),
            Some(t) if t.is_punct(",") => i += 1,
            other => return Err(malformed(other, "expected ',' or '|'")),
        }
    }
}

/// Closure parameter names starting at `start` (just after an opening `|`),
/// with the index of the closing `|`. `None` when this is not a parameter list.
fn closure_params(tokens: &[Token], start: usize) -> Option<(Vec<String>, usize)> {
    let mut names = Vec::new();
    let mut i = start;
    loop {
        let token = tokens.get(i)?;
        if token.is_punct("|") {
            return Some((names, i));
        }
        if token.is_ident() {
            names.push(token.text.clone());
        } else if !token.is_punct(",") {
            return None;
        }
        i += 1;
    }
}

#[derive(Default)]
struct Walk {
    references: Vec<String>,
    needs_escalation: bool,
}

fn walk_body(tokens: &[Token], params: &[String]) -> Walk {
    let mut walk = Walk::default();
    let mut scopes = Scopes::new(params);
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        let prev = i.checked_sub(1).map(|p| &tokens[p]);
        let next = tokens.get(i + 1);
        let after_member = prev.is_some_and(|p| p.is_punct(".") || p.is_punct("?."));
        let in_value_position = !prev.is_some_and(Token::ends_value);

        match token.kind {
            TokenKind::Punct => match token.text.as_str() {
                "{" => scopes.open_brace(),
                "(" | "[" | "?[" => scopes.open_bracket(),
                ")" | "]" | "}" => scopes.close(),
                "," => scopes.separator(),
                ";" => scopes.end_statement(),
                "|" if in_value_position => {
                    if let Some((names, close)) = closure_params(tokens, i + 1) {
                        scopes.open_closure(names);
                        i = close;
                    }
                }
                "||" if in_value_position => scopes.open_closure(Vec::new()),
                _ => {}
            },
            TokenKind::Ident => match token.text.as_str() {
                "let" | "const" => {
                    if let Some(name) = next.filter(|t| t.is_ident()) {
                        scopes.bind_after_statement(&name.text);
                        i += 1;
                    }
                }
                "for" => {
                    let mut j = i + 1;
                    while let Some(t) = tokens.get(j) {
                        if t.is_ident() && t.text == "in" {
                            break;
                        }
                        if t.is_ident() {
                            scopes.bind_pending(&t.text);
                        }
                        j += 1;
                    }
                    i = j - 1;
                }
                "catch" => {
                    if next.is_some_and(|t| t.is_punct("(")) {
                        if let Some(name) = tokens.get(i + 2).filter(|t| t.is_ident()) {
                            scopes.bind_pending(&name.text);
                        }
                        if tokens.get(i + 3).is_some_and(|t| t.is_punct(")")) {
                            i += 3;
                        }
                    }
                }
                "fn" => {
                    let mut j = i + 2;
                    if tokens.get(j).is_some_and(|t| t.is_punct("(")) {
                        j += 1;
                        while let Some(t) = tokens.get(j) {
                            if t.is_punct(")") {
                                break;
                            }
                            if t.is_ident() {
                                scopes.bind_pending(&t.text);
                            }
                            j += 1;
                        }
                        i = j;
                    }
                }
                name => {
                    if after_member {
                        if name == "cell" || name == "cells" {
                            walk.needs_escalation = true;
                        }
                    } else if is_variable(prev, next)
                        && !is_reserved(name)
                        && !scopes.is_bound(name)
                        && !walk.references.iter().any(|r| r == name)
                    {
                        walk.references.push(name.to_string());
                    }
                }
            },
            TokenKind::Number | TokenKind::Str => {}
        }
        i += 1;
    }
    walk
}

/// Position test: not a path segment, call target or map key.
fn is_variable(prev: Option<&Token>, next: Option<&Token>) -> bool {
    if prev.is_some_and(|p| p.is_punct("::")) {
        return false;
    }
    !next.is_some_and(|n| n.is_punct("(") || n.is_punct("::") || n.is_punct(":"))
}
