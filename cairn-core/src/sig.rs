use std::collections::HashMap;

use cairn_ast::{Span, TypedVar};
use cairn_term::{Name, TermVar};

use crate::env::{Binding, Env, EnvPair};
use crate::error::CoreError;
use crate::typing::resolve_type;

/// Next-state marker: `x` pairs with `x'` inside transition propositions.
pub fn primed(name: &str) -> Name {
    format!("{name}'").into()
}

/// Binds a signature's parameters over a base environment, producing the
/// current / current+next environment pair. One binder spans all parameter
/// groups of a statement: names must be unique across the whole signature,
/// primed derivatives included.
pub struct SigBinder {
    pair: EnvPair,
    seen: HashMap<Name, Span>,
}

impl SigBinder {
    pub fn new(base: Env) -> SigBinder {
        SigBinder {
            pair: EnvPair::new(base),
            seen: HashMap::new(),
        }
    }

    /// Checks `base` and `next` against the seen-table, recording them when
    /// free.
    fn already_declared(&mut self, base: &Name, next: &Name, at: Span) -> bool {
        for name in [base, next] {
            if let Some(&first) = self.seen.get(name) {
                self.pair
                    .current
                    .report(CoreError::duplicate(name.to_string(), first, at));
                return true;
            }
        }
        self.seen.insert(base.clone(), at);
        self.seen.insert(next.clone(), at);
        false
    }

    /// Declares one parameter: a binding in `current`, and both it and its
    /// primed counterpart in `two_state`. On a name collision the first
    /// declaration stays bound and the duplicate is only reported.
    pub fn declare(&mut self, node: &TypedVar) -> Binding {
        let base: Name = node.name.node.as_str().into();
        let next = primed(&base);
        let ty = resolve_type(&self.pair.current, &node.ty);
        let binding = Binding::new(node.name.clone(), TermVar::new(base.clone(), ty), node.span);

        if self.already_declared(&base, &next, node.name.span) {
            return binding;
        }

        self.pair.current = self.pair.current.bind(binding.clone());
        self.pair.two_state = self.pair.two_state.bind(binding.clone());
        let primed_var = TermVar::new(next, ty);
        self.pair.two_state = self
            .pair
            .two_state
            .bind(Binding::new(node.name.clone(), primed_var, node.span));
        binding
    }

    pub fn declare_group(&mut self, nodes: &[TypedVar]) -> Vec<Binding> {
        nodes.iter().map(|node| self.declare(node)).collect()
    }

    /// Re-binds an already-elaborated parameter list verbatim, primed
    /// duplicates re-derived.
    pub fn adopt(&mut self, expected: &[Binding]) -> Vec<Binding> {
        let mut out = Vec::with_capacity(expected.len());
        for exp in expected {
            let base = exp.var.name.clone();
            let next = primed(&base);
            if !self.already_declared(&base, &next, exp.name.span) {
                self.pair.current = self.pair.current.bind(exp.clone());
                self.pair.two_state = self.pair.two_state.bind(exp.clone());
                let primed_var = TermVar::new(next, exp.var.ty);
                self.pair.two_state = self
                    .pair
                    .two_state
                    .bind(Binding::new(exp.name.clone(), primed_var, exp.declared_at));
            }
            out.push(exp.clone());
        }
        out
    }

    /// Matches a declared parameter group against an expected one. An empty
    /// declared list inherits the expected group verbatim. Otherwise lengths
    /// must match exactly, and each declared parameter's type must agree
    /// with the expected one at the same position; names are free to differ.
    pub fn check_group(
        &mut self,
        expected: &[Binding],
        declared: &[TypedVar],
        group_span: Span,
    ) -> Vec<Binding> {
        if declared.is_empty() {
            return self.adopt(expected);
        }
        if declared.len() != expected.len() {
            let span = match declared.get(expected.len()) {
                Some(extra) => extra.span,
                None => group_span,
            };
            self.pair.current.report(CoreError::BadArity {
                expected: expected.len(),
                actual: declared.len(),
                span,
            });
            return Vec::new();
        }
        // Positional matching assumes the arity check above has passed.
        debug_assert_eq!(expected.len(), declared.len());
        let mut out = Vec::with_capacity(declared.len());
        for (exp, node) in expected.iter().zip(declared) {
            let binding = self.declare(node);
            if !binding.var.ty.agrees_with(exp.var.ty) {
                self.pair.current.report(CoreError::TypeMismatch {
                    expected: exp.var.ty,
                    actual: binding.var.ty,
                    span: node.ty.span,
                });
            }
            out.push(binding);
        }
        out
    }

    pub fn finish(self) -> EnvPair {
        self.pair
    }
}
