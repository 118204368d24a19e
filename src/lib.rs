//! `survey_expr` evaluates sandboxed expressions embedded in survey
//! templates: plain text interleaved with `{…}` expressions is split,
//! each expression is tokenized and evaluated against pre-registered
//! functions, variables, and reserved words, and the computed values are
//! substituted back into the text.
//!
//! Only registered names can be referenced; there is no escape hatch into
//! the host. A call goes through these stages:
//! 1. Template splitting (quoted substrings and `\{`/`\}` escapes honored).
//! 2. Regex-driven tokenization with byte-exact source offsets.
//! 3. A pre-parse syntax check (unsupported tokens, parenthesis balance,
//!    name resolution).
//! 4. Recursive-descent evaluation over a value stack.
//! 5. Diagnostic collection and annotated rendering for failures.
//!
//! Use [`ExpressionEngine::evaluate`] for a bare expression,
//! [`ExpressionEngine::process_template`] for mixed text, and the
//! `register_*` calls to populate the sandbox.

/// Located diagnostics and their annotated rendering.
pub mod diagnostics;
/// Typed errors raised by builtin function handlers.
pub mod error;
/// Expression tokenizer and recursive-descent evaluator.
pub mod expr;
/// Default builtin function catalog.
pub mod functions;
/// Function, variable, and reserved-word registries.
pub mod registry;
/// Template splitter separating literal text from expressions.
pub mod splitter;
/// Runtime scalar payloads and stack values.
pub mod value;

use std::collections::HashSet;

use tracing::debug;

use diagnostics::{render_readable, DiagnosticList};
use expr::eval::{preparse_check, EvalCore};
use expr::lexer::{tokenize, MAX_EXPRESSION_TOKENS};
use splitter::{split_template, SegmentKind};
use value::Value;

pub use diagnostics::Diagnostic;
pub use error::CallError;
pub use functions::default_catalog;
pub use registry::{entries_from_json, Arity, FunctionSpec, Registry};
pub use splitter::{Segment, SegmentKind as TemplateSegmentKind};
pub use value::Scalar;

/// Default ceiling on template substitution passes.
pub const DEFAULT_TEMPLATE_DEPTH: usize = 5;

/// A sandboxed expression evaluator with its registries and per-call state.
///
/// The engine owns its registries for its lifetime; per-call state (tokens,
/// stack, diagnostics, used-name lists) is reset at the start of each
/// [`evaluate`] call. Registries may be mutated between calls, never during
/// one.
///
/// [`evaluate`]: ExpressionEngine::evaluate
#[derive(Debug, Default)]
pub struct ExpressionEngine {
    registry: Registry,
    diagnostics: DiagnosticList,
    source: String,
    result: Option<Value>,
    vars_used: Vec<String>,
    reserved_used: Vec<String>,
    all_vars_used: Vec<String>,
    all_reserved_used: Vec<String>,
}

impl ExpressionEngine {
    /// Creates an engine with the default function catalog registered.
    pub fn new() -> Self {
        let mut engine = Self::bare();
        engine.registry.register_functions(default_catalog());
        engine
    }

    /// Creates an engine with an empty function registry.
    pub fn bare() -> Self {
        Self::default()
    }

    /// Evaluates one expression.
    ///
    /// With `parse_only` the full grammar and name resolution still run,
    /// but every pushed payload is replaced by the number `1`, assignments
    /// do not store, and function handlers are not invoked.
    ///
    /// Returns `true` on success; on failure the diagnostics are available
    /// through [`errors`](Self::errors) and the result is cleared.
    pub fn evaluate(&mut self, source: &str, parse_only: bool) -> bool {
        self.reset_call_state(source);

        let tokens = tokenize(source);
        if tokens.len() > MAX_EXPRESSION_TOKENS {
            self.diagnostics.push(format!(
                "expression exceeds max token count ({MAX_EXPRESSION_TOKENS})"
            ));
            return false;
        }

        preparse_check(&tokens, &self.registry, &mut self.diagnostics);
        if !self.diagnostics.is_empty() {
            return false;
        }

        let core = EvalCore::new(
            &tokens,
            parse_only,
            &mut self.registry,
            &mut self.diagnostics,
            &mut self.vars_used,
            &mut self.reserved_used,
        );
        self.result = core.run();
        debug!(
            source = %source,
            parse_only,
            success = self.result.is_some(),
            "evaluated expression"
        );
        self.result.is_some()
    }

    /// The final value's payload, or `None` after a failed evaluation.
    pub fn result(&self) -> Option<&Scalar> {
        self.result.as_ref().map(|value| &value.payload)
    }

    /// The final value rendered as substitution text.
    pub fn result_text(&self) -> Option<String> {
        self.result().map(Scalar::display)
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Structured diagnostics from the last `evaluate` call.
    pub fn errors(&self) -> &[Diagnostic] {
        self.diagnostics.items()
    }

    /// Annotated report of the last call's diagnostics against its source.
    pub fn readable_errors(&self) -> String {
        render_readable(&self.source, self.diagnostics.items())
    }

    /// Variables resolved by the last `evaluate` call, deduplicated,
    /// insertion order preserved.
    pub fn vars_used(&self) -> Vec<String> {
        deduped(&self.vars_used)
    }

    /// Reserved words resolved by the last `evaluate` call.
    pub fn reserved_used(&self) -> Vec<String> {
        deduped(&self.reserved_used)
    }

    /// Variables resolved across all expressions of the last template.
    pub fn all_vars_used(&self) -> Vec<String> {
        deduped(&self.all_vars_used)
    }

    /// Reserved words resolved across all expressions of the last template.
    pub fn all_reserved_used(&self) -> Vec<String> {
        deduped(&self.all_reserved_used)
    }

    /// Processes a template with the default recursion ceiling.
    pub fn process_template(&mut self, text: &str) -> String {
        self.process_template_with_depth(text, DEFAULT_TEMPLATE_DEPTH)
    }

    /// Processes a template: every `{…}` expression is evaluated and
    /// replaced by its value, or by its rendered diagnostics when it fails,
    /// so the output is always a complete string.
    ///
    /// Substituted values may themselves contain expressions; up to
    /// `max_depth` substitution passes run before the remaining text is
    /// returned as-is.
    pub fn process_template_with_depth(&mut self, text: &str, max_depth: usize) -> String {
        self.all_vars_used.clear();
        self.all_reserved_used.clear();
        self.substitute(text, 0, max_depth)
    }

    fn substitute(&mut self, text: &str, depth: usize, max_depth: usize) -> String {
        if depth >= max_depth {
            return text.to_string();
        }

        let segments = split_template(text);
        if !segments
            .iter()
            .any(|segment| segment.kind == SegmentKind::Expression)
        {
            return text.to_string();
        }

        debug!(depth, segments = segments.len(), "substituting template");
        let mut out = String::new();
        for segment in &segments {
            match segment.kind {
                SegmentKind::Literal => out.push_str(&segment.text),
                SegmentKind::Expression => {
                    let ok = self.evaluate(segment.inner(), false);
                    self.all_vars_used.extend(self.vars_used.iter().cloned());
                    self.all_reserved_used
                        .extend(self.reserved_used.iter().cloned());
                    if ok {
                        if let Some(value) = self.result_text() {
                            out.push_str(&value);
                        }
                    } else {
                        let rendered = self.readable_errors();
                        out.push_str(rendered.trim_end());
                    }
                }
            }
        }

        if out.contains('{') {
            self.substitute(&out, depth + 1, max_depth)
        } else {
            out
        }
    }

    /// Additive merge into the function map.
    pub fn register_functions(
        &mut self,
        entries: impl IntoIterator<Item = (String, FunctionSpec)>,
    ) {
        self.registry.register_functions(entries);
    }

    /// Additive merge into the variable map.
    pub fn register_variables(&mut self, entries: impl IntoIterator<Item = (String, Scalar)>) {
        self.registry.register_variables(entries);
    }

    /// Replaces the entire variable map.
    pub fn replace_variables(&mut self, entries: impl IntoIterator<Item = (String, Scalar)>) {
        self.registry.replace_variables(entries);
    }

    /// Additive merge into the reserved-word map.
    pub fn register_reserved(&mut self, entries: impl IntoIterator<Item = (String, Scalar)>) {
        self.registry.register_reserved(entries);
    }

    /// Replaces the entire reserved-word map.
    pub fn replace_reserved(&mut self, entries: impl IntoIterator<Item = (String, Scalar)>) {
        self.registry.replace_reserved(entries);
    }

    /// Bulk variable registration from a JSON object of scalars, the form
    /// the host survey engine stores answer values in.
    pub fn register_variables_from_json(
        &mut self,
        object: &serde_json::Value,
    ) -> Result<(), CallError> {
        let entries = entries_from_json(object)?;
        self.registry.register_variables(entries);
        Ok(())
    }

    /// Bulk reserved-word registration from a JSON object of scalars.
    pub fn register_reserved_from_json(
        &mut self,
        object: &serde_json::Value,
    ) -> Result<(), CallError> {
        let entries = entries_from_json(object)?;
        self.registry.register_reserved(entries);
        Ok(())
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.registry.is_function(name)
    }

    pub fn is_variable(&self, name: &str) -> bool {
        self.registry.is_variable(name)
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.registry.is_reserved(name)
    }

    /// Current value of a registered variable.
    pub fn variable(&self, name: &str) -> Option<&Scalar> {
        self.registry.variable(name)
    }

    fn reset_call_state(&mut self, source: &str) {
        self.diagnostics.clear();
        self.result = None;
        self.vars_used.clear();
        self.reserved_used.clear();
        self.source = source.to_string();
    }
}

fn deduped(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}
