use cairn_ast::{Expr, ExprKind, Span, TypeExpr, TypeKind};
use cairn_term::{ArgRule, Cst, Term, Type, builtin_cst, op_spec};

use crate::env::{Binding, Env};
use crate::error::CoreError;
use crate::sig::primed;

pub fn resolve_type(env: &Env, ty: &TypeExpr) -> Type {
    match &ty.kind {
        TypeKind::Name(name) => match name.as_str() {
            "Int" => Type::Int,
            "Bool" => Type::Bool,
            _ => {
                env.report(CoreError::CannotFind {
                    name: name.clone(),
                    span: ty.span,
                });
                Type::Wildcard
            }
        },
        TypeKind::Wildcard => Type::Wildcard,
    }
}

/// Elaborates an untyped expression against `env`. Failures are reported
/// into the sink and recovered with a wildcard-typed placeholder;
/// elaboration continues where possible.
pub fn parse_term(env: &Env, expr: &Expr) -> Term {
    match &expr.kind {
        ExprKind::Sym(name) => {
            if let Some(binding) = env.lookup(name) {
                return Term::var(binding.var.clone());
            }
            if let Some(cst) = builtin_cst(name) {
                return Term::cst(cst);
            }
            env.report(CoreError::CannotFind {
                name: name.clone(),
                span: expr.span,
            });
            Term::placeholder()
        }
        ExprKind::IntLit(value) => Term::cst(Cst::numeral(*value)),
        ExprKind::App { op, args } => {
            let Some(spec) = op_spec(&op.node) else {
                env.report(CoreError::CannotFind {
                    name: op.node.clone(),
                    span: op.span,
                });
                for arg in args {
                    parse_term(env, arg);
                }
                return Term::placeholder();
            };
            if !spec.arity.admits(args.len()) {
                env.report(CoreError::BadOpArity {
                    op: op.node.clone(),
                    expected: spec.arity,
                    actual: args.len(),
                    span: expr.span,
                });
                for arg in args {
                    parse_term(env, arg);
                }
                return Term::placeholder();
            }
            let terms: Vec<Term> = args.iter().map(|arg| parse_term(env, arg)).collect();
            match spec.args {
                ArgRule::All(ty) => {
                    for (node, term) in args.iter().zip(&terms) {
                        ensure(env, node.span, term, ty);
                    }
                }
                ArgRule::Same => {
                    if let Some(first) = terms.first() {
                        let shared = first.ty();
                        for (node, term) in args.iter().zip(&terms).skip(1) {
                            ensure(env, node.span, term, shared);
                        }
                    }
                }
            }
            Term::app(spec.as_cst(op.node.as_str()), terms)
        }
    }
}

/// Elaborates an expression expected to be a proposition.
pub fn parse_prop(env: &Env, expr: &Expr) -> Term {
    let term = parse_term(env, expr);
    ensure(env, expr.span, &term, Type::Bool);
    term
}

/// Checks a term's type against an expectation. The wildcard placeholder
/// agrees with everything; recovery terms never cascade.
pub fn ensure(env: &Env, span: Span, term: &Term, expected: Type) {
    let actual = term.ty();
    if !actual.agrees_with(expected) {
        env.report(CoreError::TypeMismatch {
            expected,
            actual,
            span,
        });
    }
}

pub fn check_no_free_wildcards(env: &Env, span: Span, term: &Term) {
    if term.has_wildcard() {
        env.report(CoreError::FreeWildcard { span });
    }
}

/// A parameter counts as used when its variable or its primed counterpart
/// occurs in at least one of the given conditions.
pub fn check_used(env: &Env, kind: &'static str, binding: &Binding, conditions: &[&Term]) {
    let base = &binding.var.name;
    let next = primed(base);
    let used = conditions
        .iter()
        .any(|term| term.mentions(base) || term.mentions(&next));
    if !used {
        env.report(CoreError::UnusedParameter {
            kind,
            name: base.to_string(),
            span: binding.name.span,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_ast::{ident, span};
    use cairn_term::TermVar;
    use miette::Diagnostic;

    fn env_with(names: &[(&str, Type)]) -> Env {
        let mut env = Env::new();
        for (at, (name, ty)) in names.iter().enumerate() {
            let sp = span(at * 8, name.len());
            env = env.bind(Binding::new(ident(sp, *name), TermVar::new(*name, *ty), sp));
        }
        env
    }

    fn codes(env: &Env) -> Vec<String> {
        env.sink()
            .drain()
            .iter()
            .map(|d| d.code().unwrap().to_string())
            .collect()
    }

    #[test]
    fn symbols_resolve_through_bindings_then_builtins() {
        let env = env_with(&[("x", Type::Int)]);
        assert_eq!(parse_term(&env, &Expr::sym(span(0, 1), "x")).ty(), Type::Int);
        assert_eq!(
            parse_term(&env, &Expr::sym(span(0, 4), "true")).ty(),
            Type::Bool
        );
        let missing = parse_term(&env, &Expr::sym(span(0, 1), "z"));
        assert_eq!(missing, Term::placeholder());
        assert_eq!(codes(&env), vec!["cairn::cannot_find"]);
    }

    #[test]
    fn operator_arity_is_checked_before_argument_types() {
        let env = env_with(&[("p", Type::Bool)]);
        let bad = Expr::app(
            span(0, 8),
            ident(span(1, 3), "and"),
            vec![Expr::sym(span(5, 1), "p")],
        );
        let term = parse_term(&env, &bad);
        assert_eq!(term, Term::placeholder());
        let diags = env.sink().drain();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].to_string(), "operator `and` expects at least 2 arguments, got 1");
    }

    #[test]
    fn argument_mismatches_are_located_at_the_argument() {
        let env = env_with(&[("x", Type::Int)]);
        let expr = Expr::app(
            span(0, 12),
            ident(span(1, 3), "and"),
            vec![Expr::sym(span(5, 4), "true"), Expr::sym(span(10, 1), "x")],
        );
        parse_term(&env, &expr);
        let diags = env.sink().drain();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code().unwrap().to_string(), "cairn::type_mismatch");
        assert_eq!(diags[0].labels().unwrap().next().unwrap().offset(), 10);
    }

    #[test]
    fn equality_takes_its_type_from_the_first_argument() {
        let env = env_with(&[("x", Type::Int), ("p", Type::Bool)]);
        let ok = Expr::app(
            span(0, 7),
            ident(span(1, 1), "="),
            vec![Expr::sym(span(3, 1), "x"), Expr::int(span(5, 1), 1)],
        );
        assert_eq!(parse_term(&env, &ok).ty(), Type::Bool);
        assert!(env.sink().is_empty());

        let bad = Expr::app(
            span(0, 7),
            ident(span(1, 1), "="),
            vec![Expr::sym(span(3, 1), "x"), Expr::sym(span(5, 1), "p")],
        );
        parse_term(&env, &bad);
        assert_eq!(codes(&env), vec!["cairn::type_mismatch"]);
    }

    #[test]
    fn placeholders_do_not_cascade() {
        let env = Env::new();
        let expr = Expr::app(
            span(0, 9),
            ident(span(1, 1), "="),
            vec![Expr::sym(span(3, 4), "mist"), Expr::int(span(8, 1), 1)],
        );
        let term = parse_prop(&env, &expr);
        // one cannot-find, no follow-on mismatches from the placeholder
        assert_eq!(codes(&env), vec!["cairn::cannot_find"]);
        assert!(term.has_wildcard());
    }

    #[test]
    fn parse_prop_insists_on_bool() {
        let env = Env::new();
        parse_prop(&env, &Expr::int(span(0, 1), 3));
        assert_eq!(codes(&env), vec!["cairn::type_mismatch"]);
    }

    #[test]
    fn unused_parameters_count_primed_occurrences() {
        let env = env_with(&[("x", Type::Int)]);
        let binding = env.lookup("x").unwrap().clone();
        let primed_use = Term::var(TermVar::new(primed("x"), Type::Int));
        check_used(&env, "input", &binding, &[&primed_use]);
        assert!(env.sink().is_empty());

        check_used(&env, "input", &binding, &[&Term::tt()]);
        let diags = env.sink().drain();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].to_string(), "input `x` is never used");
    }
}
