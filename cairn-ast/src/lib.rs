#![forbid(unsafe_code)]

use miette::SourceSpan;

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

pub type Ident = Spanned<String>;

pub fn ident(span: Span, name: impl Into<String>) -> Ident {
    Spanned::new(span, name.into())
}

/// A surface type annotation; `_` is the wildcard placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeExpr {
    pub span: Span,
    pub kind: TypeKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Name(String),
    Wildcard,
}

impl TypeExpr {
    pub fn name(span: Span, name: impl Into<String>) -> TypeExpr {
        TypeExpr {
            span,
            kind: TypeKind::Name(name.into()),
        }
    }

    pub fn wildcard(span: Span) -> TypeExpr {
        TypeExpr {
            span,
            kind: TypeKind::Wildcard,
        }
    }
}

/// A typed variable in binding position, the `(x Int)` of a parameter
/// list. The parser guarantees this shape wherever one is expected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedVar {
    pub span: Span,
    pub name: Ident,
    pub ty: TypeExpr,
}

impl TypedVar {
    pub fn new(span: Span, name: Ident, ty: TypeExpr) -> TypedVar {
        TypedVar { span, name, ty }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprKind {
    Sym(String),
    IntLit(u64),
    /// A prefix application `(op e1 .. en)`.
    App { op: Ident, args: Vec<Expr> },
}

impl Expr {
    pub fn sym(span: Span, name: impl Into<String>) -> Expr {
        Expr {
            span,
            kind: ExprKind::Sym(name.into()),
        }
    }

    pub fn int(span: Span, value: u64) -> Expr {
        Expr {
            span,
            kind: ExprKind::IntLit(value),
        }
    }

    pub fn app(span: Span, op: Ident, args: Vec<Expr>) -> Expr {
        Expr {
            span,
            kind: ExprKind::App { op, args },
        }
    }
}
