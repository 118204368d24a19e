//! Name registries: functions, variables, and reserved words.
//!
//! The three maps are independent. Lookups are case-sensitive; the
//! evaluator decides which map to consult from one-token lookahead (a word
//! followed by `(` is a function reference, otherwise a variable, otherwise
//! a reserved word).

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::error::CallError;
use crate::value::{scalar_from_json, Scalar};

/// Accepted argument counts for a registered function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arity {
    /// Call must supply one of these exact argument counts.
    Fixed(Vec<usize>),
    /// Any count; the handler receives the whole argument list.
    Variadic,
}

impl Arity {
    /// Whether `count` arguments satisfy this arity.
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Fixed(counts) => counts.contains(&count),
            Arity::Variadic => true,
        }
    }
}

/// Handler signature for builtin functions.
pub type FunctionHandler = fn(&[Scalar]) -> Result<Scalar, CallError>;

/// A registered function: description, accepted arities, and handler.
#[derive(Clone)]
pub struct FunctionSpec {
    /// Short human-readable description for introspection.
    pub description: String,
    /// Accepted argument counts.
    pub arity: Arity,
    /// Host binding invoked by the dispatch layer.
    pub handler: FunctionHandler,
}

impl FunctionSpec {
    pub fn new(description: impl Into<String>, arity: Arity, handler: FunctionHandler) -> Self {
        Self {
            description: description.into(),
            arity,
            handler,
        }
    }
}

impl std::fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("description", &self.description)
            .field("arity", &self.arity)
            .finish()
    }
}

/// The engine's three name→entry maps.
#[derive(Debug, Default)]
pub struct Registry {
    functions: HashMap<String, FunctionSpec>,
    variables: HashMap<String, Scalar>,
    reserved: HashMap<String, Scalar>,
}

impl Registry {
    /// Additive merge into the function map.
    pub fn register_functions(&mut self, entries: impl IntoIterator<Item = (String, FunctionSpec)>) {
        self.functions.extend(entries);
    }

    /// Additive merge into the variable map.
    pub fn register_variables(&mut self, entries: impl IntoIterator<Item = (String, Scalar)>) {
        self.variables.extend(entries);
    }

    /// Replaces the entire variable map.
    pub fn replace_variables(&mut self, entries: impl IntoIterator<Item = (String, Scalar)>) {
        self.variables = entries.into_iter().collect();
    }

    /// Additive merge into the reserved-word map.
    pub fn register_reserved(&mut self, entries: impl IntoIterator<Item = (String, Scalar)>) {
        self.reserved.extend(entries);
    }

    /// Replaces the entire reserved-word map.
    pub fn replace_reserved(&mut self, entries: impl IntoIterator<Item = (String, Scalar)>) {
        self.reserved = entries.into_iter().collect();
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn is_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains_key(name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Scalar> {
        self.variables.get(name)
    }

    pub fn reserved(&self, name: &str) -> Option<&Scalar> {
        self.reserved.get(name)
    }

    /// Writes a variable; the evaluator has already checked the name exists.
    pub fn set_variable(&mut self, name: &str, value: Scalar) {
        self.variables.insert(name.to_string(), value);
    }
}

/// Converts a JSON object of scalars into registry entries.
///
/// The host survey engine stores answer values as JSON; this is the bulk
/// registration path for them. Arrays and nested objects are rejected.
pub fn entries_from_json(object: &JsonValue) -> Result<Vec<(String, Scalar)>, CallError> {
    let map = object.as_object().ok_or_else(|| {
        CallError::InvalidArgument("registration data must be a JSON object".to_string())
    })?;

    let mut out = Vec::with_capacity(map.len());
    for (name, value) in map {
        let scalar = scalar_from_json(value).ok_or_else(|| {
            CallError::InvalidArgument(format!(
                "registration value for '{name}' must be a scalar"
            ))
        })?;
        out.push((name.clone(), scalar));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::value::Scalar;

    use super::{entries_from_json, Arity, Registry};

    #[test]
    fn merge_and_replace_variables() {
        let mut registry = Registry::default();
        registry.register_variables([("one".to_string(), Scalar::Number(1.0))]);
        registry.register_variables([("two".to_string(), Scalar::Number(2.0))]);
        assert!(registry.is_variable("one"));
        assert!(registry.is_variable("two"));

        registry.replace_variables([("three".to_string(), Scalar::Number(3.0))]);
        assert!(!registry.is_variable("one"));
        assert!(registry.is_variable("three"));
    }

    #[test]
    fn registries_are_independent() {
        let mut registry = Registry::default();
        registry.register_reserved([("TOKEN:EMAIL".to_string(), Scalar::from("a@b.c"))]);
        assert!(registry.is_reserved("TOKEN:EMAIL"));
        assert!(!registry.is_variable("TOKEN:EMAIL"));
        assert!(!registry.is_function("TOKEN:EMAIL"));
    }

    #[test]
    fn variable_names_are_case_sensitive() {
        let mut registry = Registry::default();
        registry.register_variables([("Name".to_string(), Scalar::from("Sergei"))]);
        assert!(registry.is_variable("Name"));
        assert!(!registry.is_variable("name"));
    }

    #[test]
    fn arity_checks() {
        assert!(Arity::Fixed(vec![1, 2]).accepts(2));
        assert!(!Arity::Fixed(vec![1, 2]).accepts(3));
        assert!(Arity::Variadic.accepts(0));
        assert!(Arity::Variadic.accepts(17));
    }

    #[test]
    fn json_entries_accept_scalars_only() {
        let entries = entries_from_json(&json!({"age": 45, "name": "Sergei"})).unwrap();
        assert_eq!(entries.len(), 2);

        let err = entries_from_json(&json!({"bad": [1, 2]})).unwrap_err();
        assert!(err.to_string().contains("must be a scalar"));
    }
}
