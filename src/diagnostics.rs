//! Located diagnostics collected during evaluation.
//!
//! Errors are accumulated per `evaluate` call and never thrown across the
//! public API. The structured list is the contract; [`render_readable`]
//! builds the annotated report substituted into templates when an
//! expression fails.

use serde::Serialize;

use crate::expr::lexer::Token;

/// One evaluation error, optionally anchored to the offending token.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Human-readable message.
    pub message: String,
    /// Offending token; absent for position-less errors.
    pub token: Option<Token>,
}

/// Ordered collection of diagnostics for one `evaluate` call.
#[derive(Debug, Default)]
pub struct DiagnosticList {
    items: Vec<Diagnostic>,
}

impl DiagnosticList {
    /// Removes all entries; called at the start of each `evaluate`.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Appends a located diagnostic.
    pub fn push_at(&mut self, message: impl Into<String>, token: &Token) {
        self.items.push(Diagnostic {
            message: message.into(),
            token: Some(token.clone()),
        });
    }

    /// Appends a position-less diagnostic.
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(Diagnostic {
            message: message.into(),
            token: None,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// The collected diagnostics in insertion order.
    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }
}

/// Renders diagnostics against their original source.
///
/// The source is printed once, followed by one caret line per located
/// diagnostic (sorted by offset) and a trailing bucket of position-less
/// messages.
pub fn render_readable(source: &str, diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return String::new();
    }

    let mut located: Vec<&Diagnostic> = diagnostics.iter().filter(|d| d.token.is_some()).collect();
    located.sort_by_key(|d| d.token.as_ref().map(|t| t.offset).unwrap_or(0));

    let mut out = String::new();
    if !located.is_empty() {
        out.push_str(source);
        out.push('\n');
        for diagnostic in located {
            let token = diagnostic.token.as_ref().expect("located diagnostic");
            let column = source
                .get(..token.offset)
                .map(|prefix| prefix.chars().count())
                .unwrap_or(0);
            let width = token.lexeme.chars().count().max(1);
            out.push_str(&" ".repeat(column));
            out.push_str(&"^".repeat(width));
            out.push(' ');
            out.push_str(&diagnostic.message);
            out.push('\n');
        }
    }

    for diagnostic in diagnostics.iter().filter(|d| d.token.is_none()) {
        out.push_str("error: ");
        out.push_str(&diagnostic.message);
        out.push('\n');
    }

    out
}
