//! Recursive-descent evaluation over the token stream.
//!
//! A classical precedence climb: each rule leaves exactly one value on the
//! stack on success. Rules return a success flag and accumulate located
//! diagnostics instead of raising errors, so a failure unwinds cleanly to
//! the driver. Logical operators do not short-circuit; both sides are
//! always evaluated.

use tracing::trace;

use crate::diagnostics::DiagnosticList;
use crate::registry::Registry;
use crate::value::{Scalar, Value, ValueKind};

use super::lexer::{Token, TokenKind};

/// Verifies the token stream before evaluation.
///
/// Checks for unsupported syntax (`Other` tokens), parenthesis balance with
/// no negative intermediate depth, and resolvability of every word: a word
/// immediately preceding `(` must name a registered function, anything else
/// must be a known variable or reserved word. Any finding skips evaluation.
pub(crate) fn preparse_check(
    tokens: &[Token],
    registry: &Registry,
    diagnostics: &mut DiagnosticList,
) {
    let mut depth: i64 = 0;

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Other => {
                let message = if token.lexeme.starts_with('"') || token.lexeme.starts_with('\'') {
                    "unterminated string literal"
                } else {
                    "unsupported syntax"
                };
                diagnostics.push_at(message, token);
            }
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth < 0 {
                    diagnostics.push_at("unbalanced parentheses", token);
                    depth = 0;
                }
            }
            TokenKind::Word | TokenKind::Sgqa => {
                let call_position = tokens
                    .get(i + 1)
                    .map_or(false, |next| next.kind == TokenKind::LParen);
                if call_position {
                    if !registry.is_function(&token.lexeme) {
                        diagnostics
                            .push_at(format!("undefined function '{}'", token.lexeme), token);
                    }
                } else if !registry.is_variable(&token.lexeme)
                    && !registry.is_reserved(&token.lexeme)
                {
                    diagnostics.push_at(format!("undefined variable '{}'", token.lexeme), token);
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        diagnostics.push("unbalanced parentheses");
    }
}

/// Per-call evaluation state over a prepared token stream.
pub(crate) struct EvalCore<'a> {
    tokens: &'a [Token],
    pos: usize,
    stack: Vec<Value>,
    parse_only: bool,
    registry: &'a mut Registry,
    diagnostics: &'a mut DiagnosticList,
    vars_used: &'a mut Vec<String>,
    reserved_used: &'a mut Vec<String>,
}

impl<'a> EvalCore<'a> {
    pub(crate) fn new(
        tokens: &'a [Token],
        parse_only: bool,
        registry: &'a mut Registry,
        diagnostics: &'a mut DiagnosticList,
        vars_used: &'a mut Vec<String>,
        reserved_used: &'a mut Vec<String>,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            stack: Vec::new(),
            parse_only,
            registry,
            diagnostics,
            vars_used,
            reserved_used,
        }
    }

    /// Runs the full grammar and returns the single result value.
    ///
    /// On success the cursor has consumed every token and the stack holds
    /// exactly one value.
    pub(crate) fn run(mut self) -> Option<Value> {
        if self.tokens.is_empty() {
            self.diagnostics.push("poorly terminated expression");
            return None;
        }

        if !self.expressions() {
            return None;
        }

        if self.pos < self.tokens.len() {
            let token = &self.tokens[self.pos];
            self.diagnostics.push_at(
                format!("extra tokens after the end of the expression: '{}'", token.lexeme),
                token,
            );
            return None;
        }

        if self.stack.len() != 1 {
            self.diagnostics.push("unbalanced equation");
            return None;
        }

        self.stack.pop()
    }

    // Expressions := Expression (',' Expression)*
    //
    // Each comma discards the previous result; the last one wins.
    fn expressions(&mut self) -> bool {
        if !self.expression() {
            return false;
        }
        while self.consume_kind(TokenKind::Comma).is_some() {
            self.stack.pop();
            if !self.expression() {
                return false;
            }
        }
        true
    }

    // Expression := (Variable ASSIGN)? LogicalOr
    fn expression(&mut self) -> bool {
        let is_assignment = matches!(
            self.tokens.get(self.pos).map(|t| t.kind),
            Some(TokenKind::Word) | Some(TokenKind::Sgqa)
        ) && self
            .tokens
            .get(self.pos + 1)
            .map_or(false, |t| t.kind == TokenKind::Assign);

        if is_assignment {
            let target = self.tokens[self.pos].clone();
            let op = self.tokens[self.pos + 1].clone();
            self.pos += 2;
            if !self.logical_or() {
                return false;
            }
            return self.apply_assignment(&target, &op);
        }

        self.logical_or()
    }

    fn logical_or(&mut self) -> bool {
        self.binary_level(TokenKind::AndOr, &["||", "or"], Self::logical_and)
    }

    fn logical_and(&mut self) -> bool {
        self.binary_level(TokenKind::AndOr, &["&&", "and"], Self::equality)
    }

    fn equality(&mut self) -> bool {
        self.binary_level(TokenKind::Compare, &["==", "!=", "eq", "ne"], Self::relation)
    }

    fn relation(&mut self) -> bool {
        self.binary_level(
            TokenKind::Compare,
            &["<", "<=", ">", ">=", "lt", "le", "gt", "ge"],
            Self::additive,
        )
    }

    fn additive(&mut self) -> bool {
        self.binary_level(TokenKind::BinaryOp, &["+", "-"], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> bool {
        self.binary_level(TokenKind::BinaryOp, &["*", "/"], Self::unary)
    }

    fn binary_level(
        &mut self,
        kind: TokenKind,
        lexemes: &[&str],
        next: fn(&mut Self) -> bool,
    ) -> bool {
        if !next(self) {
            return false;
        }
        while let Some(op) = self.consume_op(kind, lexemes) {
            if !next(self) {
                return false;
            }
            if !self.apply_binary(&op) {
                return false;
            }
        }
        true
    }

    // Unary := ('+'|'-'|'!')? Primary
    fn unary(&mut self) -> bool {
        let is_prefix = self.tokens.get(self.pos).map_or(false, |token| {
            token.kind == TokenKind::Not
                || (token.kind == TokenKind::BinaryOp
                    && (token.lexeme == "+" || token.lexeme == "-"))
        });
        let op = if is_prefix { Some(self.advance()) } else { None };

        if !self.primary() {
            return false;
        }

        if let Some(op) = op {
            let operand = match self.stack.pop() {
                Some(v) => v,
                None => {
                    self.diagnostics.push_at("empty stack on operator", &op);
                    return false;
                }
            };
            let result = match op.lexeme.as_str() {
                "!" => Value::boolean(!operand.payload.is_truthy(), op.offset),
                "-" => Value::number(-operand.payload.coerce_number(), op.offset),
                _ => Value::number(operand.payload.coerce_number(), op.offset),
            };
            self.push(result);
        }

        true
    }

    // Primary := '(' Expressions ')' | ConstantVarOrFunction
    fn primary(&mut self) -> bool {
        if let Some(open) = self.consume_kind(TokenKind::LParen) {
            if !self.expressions() {
                return false;
            }
            if self.consume_kind(TokenKind::RParen).is_none() {
                self.diagnostics.push_at("unbalanced parentheses", &open);
                return false;
            }
            return true;
        }
        self.constant_var_or_function()
    }

    fn constant_var_or_function(&mut self) -> bool {
        let token = match self.tokens.get(self.pos) {
            Some(t) => t.clone(),
            None => {
                self.diagnostics.push("poorly terminated expression");
                return false;
            }
        };

        match token.kind {
            TokenKind::Number => {
                self.pos += 1;
                match token.lexeme.parse::<f64>() {
                    Ok(n) => {
                        self.push(Value::number(n, token.offset));
                        true
                    }
                    Err(_) => {
                        self.diagnostics
                            .push_at(format!("invalid number '{}'", token.lexeme), &token);
                        false
                    }
                }
            }
            TokenKind::String => {
                self.pos += 1;
                self.push(Value::text(token.lexeme.clone(), token.offset));
                true
            }
            TokenKind::Word | TokenKind::Sgqa => {
                let call_position = self
                    .tokens
                    .get(self.pos + 1)
                    .map_or(false, |next| next.kind == TokenKind::LParen);
                if call_position {
                    self.function_call()
                } else {
                    self.pos += 1;
                    self.resolve_name(&token)
                }
            }
            _ => {
                self.diagnostics
                    .push_at(format!("unexpected token '{}'", token.lexeme), &token);
                false
            }
        }
    }

    /// Resolves a value-context word: variables first, then reserved words.
    fn resolve_name(&mut self, token: &Token) -> bool {
        if let Some(value) = self.registry.variable(&token.lexeme) {
            let payload = value.clone();
            self.vars_used.push(token.lexeme.clone());
            self.push_scalar(payload, token.offset);
            return true;
        }
        if let Some(value) = self.registry.reserved(&token.lexeme) {
            let payload = value.clone();
            self.reserved_used.push(token.lexeme.clone());
            self.push_scalar(payload, token.offset);
            return true;
        }
        self.diagnostics
            .push_at(format!("undefined variable '{}'", token.lexeme), token);
        false
    }

    // FunctionCall := WORD '(' (Expression (',' Expression)*)? ')'
    fn function_call(&mut self) -> bool {
        let name = self.advance();
        self.advance(); // consume '('

        let mut args: Vec<Value> = Vec::new();
        if self.consume_kind(TokenKind::RParen).is_none() {
            loop {
                if !self.expression() {
                    return false;
                }
                match self.stack.pop() {
                    Some(value) => args.push(value),
                    None => {
                        self.diagnostics
                            .push_at("empty stack collecting function arguments", &name);
                        return false;
                    }
                }
                if self.consume_kind(TokenKind::Comma).is_some() {
                    continue;
                }
                if self.consume_kind(TokenKind::RParen).is_some() {
                    break;
                }
                self.diagnostics
                    .push_at("poorly terminated function call", &name);
                return false;
            }
        }

        self.dispatch_call(&name, args)
    }

    fn dispatch_call(&mut self, name: &Token, args: Vec<Value>) -> bool {
        let spec = match self.registry.function(&name.lexeme) {
            Some(spec) => spec,
            None => {
                self.diagnostics
                    .push_at(format!("undefined function '{}'", name.lexeme), name);
                return false;
            }
        };

        if !spec.arity.accepts(args.len()) {
            self.diagnostics.push_at(
                format!(
                    "wrong number of arguments for '{}' (got {})",
                    name.lexeme,
                    args.len()
                ),
                name,
            );
            return false;
        }

        if self.parse_only {
            self.push(Value::number(1.0, name.offset));
            return true;
        }

        let handler = spec.handler;
        let scalars: Vec<Scalar> = args.into_iter().map(|v| v.payload).collect();
        trace!(function = %name.lexeme, argc = scalars.len(), "dispatching call");
        match handler(&scalars) {
            Ok(result) => {
                // Call results are Number-categorized regardless of payload.
                self.push(Value {
                    payload: result,
                    offset: name.offset,
                    kind: ValueKind::Number,
                });
                true
            }
            Err(err) => {
                self.diagnostics
                    .push_at(format!("function '{}': {}", name.lexeme, err), name);
                false
            }
        }
    }

    fn apply_assignment(&mut self, target: &Token, op: &Token) -> bool {
        let name = &target.lexeme;
        if !self.registry.is_variable(name) {
            let message = if self.registry.is_reserved(name) {
                format!("reserved word '{name}' cannot be assigned")
            } else {
                format!("assignment target '{name}' is not a known variable")
            };
            self.diagnostics.push_at(message, target);
            return false;
        }
        self.vars_used.push(name.clone());

        let rhs = match self.stack.pop() {
            Some(v) => v,
            None => {
                self.diagnostics.push_at("empty stack on operator", op);
                return false;
            }
        };

        if self.parse_only {
            self.push(Value::number(1.0, op.offset));
            return true;
        }

        let current = self
            .registry
            .variable(name)
            .cloned()
            .unwrap_or(Scalar::Text(String::new()));
        let stored = match op.lexeme.as_str() {
            "=" => rhs.payload,
            "+=" => add_scalars(&current, &rhs.payload),
            "-=" => Scalar::Number(current.coerce_number() - rhs.payload.coerce_number()),
            "*=" => Scalar::Number(current.coerce_number() * rhs.payload.coerce_number()),
            _ => {
                let divisor = rhs.payload.coerce_number();
                if divisor == 0.0 {
                    self.diagnostics.push_at("division by zero", op);
                    return false;
                }
                Scalar::Number(current.coerce_number() / divisor)
            }
        };

        self.registry.set_variable(name, stored.clone());
        self.push_scalar(stored, op.offset);
        true
    }

    fn apply_binary(&mut self, op: &Token) -> bool {
        let (lhs, rhs) = match self.pop_operands(op) {
            Some(pair) => pair,
            None => return false,
        };

        let result = match op.lexeme.to_ascii_lowercase().as_str() {
            "+" => {
                let sum = add_scalars(&lhs.payload, &rhs.payload);
                let kind = match sum {
                    Scalar::Number(_) => ValueKind::Number,
                    Scalar::Text(_) => ValueKind::String,
                };
                Value {
                    payload: sum,
                    offset: op.offset,
                    kind,
                }
            }
            "-" => Value::number(
                lhs.payload.coerce_number() - rhs.payload.coerce_number(),
                op.offset,
            ),
            "*" => Value::number(
                lhs.payload.coerce_number() * rhs.payload.coerce_number(),
                op.offset,
            ),
            "/" => {
                let divisor = rhs.payload.coerce_number();
                if divisor == 0.0 {
                    self.diagnostics.push_at("division by zero", op);
                    return false;
                }
                Value::number(lhs.payload.coerce_number() / divisor, op.offset)
            }
            "==" | "eq" => Value::boolean(lhs.payload.loose_eq(&rhs.payload), op.offset),
            "!=" | "ne" => Value::boolean(!lhs.payload.loose_eq(&rhs.payload), op.offset),
            "<" | "lt" => Value::boolean(
                lhs.payload.loose_cmp(&rhs.payload) == std::cmp::Ordering::Less,
                op.offset,
            ),
            "<=" | "le" => Value::boolean(
                lhs.payload.loose_cmp(&rhs.payload) != std::cmp::Ordering::Greater,
                op.offset,
            ),
            ">" | "gt" => Value::boolean(
                lhs.payload.loose_cmp(&rhs.payload) == std::cmp::Ordering::Greater,
                op.offset,
            ),
            ">=" | "ge" => Value::boolean(
                lhs.payload.loose_cmp(&rhs.payload) != std::cmp::Ordering::Less,
                op.offset,
            ),
            "&&" | "and" => Value::boolean(
                lhs.payload.is_truthy() && rhs.payload.is_truthy(),
                op.offset,
            ),
            "||" | "or" => Value::boolean(
                lhs.payload.is_truthy() || rhs.payload.is_truthy(),
                op.offset,
            ),
            other => {
                self.diagnostics
                    .push_at(format!("unsupported operator '{other}'"), op);
                return false;
            }
        };

        self.push(result);
        true
    }

    fn pop_operands(&mut self, op: &Token) -> Option<(Value, Value)> {
        let rhs = self.stack.pop();
        let lhs = self.stack.pop();
        match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => Some((lhs, rhs)),
            _ => {
                self.diagnostics.push_at("empty stack on operator", op);
                None
            }
        }
    }

    /// Central push; parse-only mode replaces every payload with `1`.
    fn push(&mut self, mut value: Value) {
        if self.parse_only {
            value.payload = Scalar::Number(1.0);
        }
        self.stack.push(value);
    }

    fn push_scalar(&mut self, payload: Scalar, offset: usize) {
        let kind = match payload {
            Scalar::Number(_) => ValueKind::Number,
            Scalar::Text(_) => ValueKind::String,
        };
        self.push(Value {
            payload,
            offset,
            kind,
        });
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        token
    }

    fn consume_kind(&mut self, kind: TokenKind) -> Option<Token> {
        if self.tokens.get(self.pos).map(|t| t.kind) == Some(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn consume_op(&mut self, kind: TokenKind, lexemes: &[&str]) -> Option<Token> {
        let matched = self.tokens.get(self.pos).map_or(false, |token| {
            token.kind == kind && lexemes.contains(&token.lexeme.to_ascii_lowercase().as_str())
        });
        if matched {
            Some(self.advance())
        } else {
            None
        }
    }
}

/// `+` semantics shared by the binary operator and `+=`: numeric addition
/// when both operands are numeric, otherwise concatenation.
fn add_scalars(lhs: &Scalar, rhs: &Scalar) -> Scalar {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => Scalar::Number(a + b),
        _ => Scalar::Text(format!("{}{}", lhs.display(), rhs.display())),
    }
}
