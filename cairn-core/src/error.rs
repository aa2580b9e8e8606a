use cairn_ast::Span;
use cairn_term::{Arity, Type};
use miette::Diagnostic;
use thiserror::Error;

/// Errors the engine itself can raise. Extensions define their own enums
/// with the same derives and report them through the same sink; the core
/// never matches on an extension's cases, only on its own.
#[derive(Debug, Error, Diagnostic)]
pub enum CoreError {
    #[error("cannot find `{name}` in this scope")]
    #[diagnostic(code(cairn::cannot_find))]
    CannotFind {
        name: String,
        #[label("not found")]
        span: Span,
    },

    #[error("expected {expected} parameters, got {actual}")]
    #[diagnostic(code(cairn::bad_arity))]
    BadArity {
        expected: usize,
        actual: usize,
        #[label("declared here")]
        span: Span,
    },

    #[error("operator `{op}` expects {expected} arguments, got {actual}")]
    #[diagnostic(code(cairn::bad_op_arity))]
    BadOpArity {
        op: String,
        expected: Arity,
        actual: usize,
        #[label("applied here")]
        span: Span,
    },

    #[error("`{name}` is defined twice")]
    #[diagnostic(code(cairn::duplicate))]
    DuplicateDefinition {
        name: String,
        #[label("first defined here")]
        first: Span,
        #[label("redefined here")]
        second: Span,
    },

    #[error("{kind} `{name}` is never used")]
    #[diagnostic(code(cairn::unused))]
    UnusedParameter {
        kind: &'static str,
        name: String,
        #[label("declared here")]
        span: Span,
    },

    #[error("a `_` type annotation was never resolved")]
    #[diagnostic(code(cairn::free_wildcard))]
    FreeWildcard {
        #[label("type never resolved")]
        span: Span,
    },

    #[error("expected `{expected}`, got `{actual}`")]
    #[diagnostic(code(cairn::type_mismatch))]
    TypeMismatch {
        expected: Type,
        actual: Type,
        #[label("unexpected type")]
        span: Span,
    },
}

impl CoreError {
    /// Duplicate-definition with its two locations put in source order,
    /// whichever order the caller discovered them in. Keeps the rendered
    /// message deterministic under any traversal.
    pub fn duplicate(name: impl Into<String>, a: Span, b: Span) -> CoreError {
        let (first, second) = if a.offset() <= b.offset() {
            (a, b)
        } else {
            (b, a)
        };
        CoreError::DuplicateDefinition {
            name: name.into(),
            first,
            second,
        }
    }
}
