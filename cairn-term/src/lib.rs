#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub type Name = Arc<str>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Bool,
    Int,
    /// An unresolved `_` annotation. Agrees with every type during checking;
    /// any wildcard still present at finalize time is an error.
    Wildcard,
}

impl Type {
    pub fn agrees_with(self, other: Type) -> bool {
        self == other || self == Type::Wildcard || other == Type::Wildcard
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "Bool"),
            Type::Int => write!(f, "Int"),
            Type::Wildcard => write!(f, "_"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermVar {
    pub name: Name,
    pub ty: Type,
}

impl TermVar {
    pub fn new(name: impl Into<Name>, ty: Type) -> TermVar {
        TermVar {
            name: name.into(),
            ty,
        }
    }
}

impl fmt::Display for TermVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Builtin {
    True,
    False,
    Not,
    And,
    Or,
    Implies,
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Numeral,
}

/// A constant symbol; `ty` is the result type when it heads an application.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cst {
    pub name: Name,
    pub ty: Type,
    pub builtin: Option<Builtin>,
}

impl Cst {
    pub fn new(name: impl Into<Name>, ty: Type) -> Cst {
        Cst {
            name: name.into(),
            ty,
            builtin: None,
        }
    }

    pub fn builtin(name: impl Into<Name>, ty: Type, builtin: Builtin) -> Cst {
        Cst {
            name: name.into(),
            ty,
            builtin: Some(builtin),
        }
    }

    pub fn truth(value: bool) -> Cst {
        if value {
            Cst::builtin("true", Type::Bool, Builtin::True)
        } else {
            Cst::builtin("false", Type::Bool, Builtin::False)
        }
    }

    pub fn numeral(value: u64) -> Cst {
        Cst::builtin(value.to_string(), Type::Int, Builtin::Numeral)
    }
}

impl fmt::Display for Cst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Var(TermVar),
    Cst(Cst),
    App { op: Cst, args: Vec<Term> },
}

impl Term {
    pub fn var(var: TermVar) -> Term {
        Term::Var(var)
    }

    pub fn cst(cst: Cst) -> Term {
        Term::Cst(cst)
    }

    pub fn app(op: Cst, args: Vec<Term>) -> Term {
        Term::App { op, args }
    }

    /// The `true` proposition.
    pub fn tt() -> Term {
        Term::Cst(Cst::truth(true))
    }

    /// Stand-in for a node whose elaboration failed. Wildcard-typed: it
    /// agrees with any expectation and triggers no follow-on mismatch.
    pub fn placeholder() -> Term {
        Term::Cst(Cst::new("<error>", Type::Wildcard))
    }

    pub fn ty(&self) -> Type {
        match self {
            Term::Var(var) => var.ty,
            Term::Cst(cst) => cst.ty,
            Term::App { op, .. } => op.ty,
        }
    }

    pub fn free_vars(&self) -> BTreeSet<TermVar> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<TermVar>) {
        match self {
            Term::Var(var) => {
                out.insert(var.clone());
            }
            Term::Cst(_) => {}
            Term::App { args, .. } => {
                for arg in args {
                    arg.collect_vars(out);
                }
            }
        }
    }

    pub fn mentions(&self, name: &str) -> bool {
        match self {
            Term::Var(var) => &*var.name == name,
            Term::Cst(_) => false,
            Term::App { args, .. } => args.iter().any(|arg| arg.mentions(name)),
        }
    }

    pub fn has_wildcard(&self) -> bool {
        match self {
            Term::Var(var) => var.ty == Type::Wildcard,
            Term::Cst(cst) => cst.ty == Type::Wildcard,
            Term::App { op, args } => {
                op.ty == Type::Wildcard || args.iter().any(Term::has_wildcard)
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(var) => write!(f, "{var}"),
            Term::Cst(cst) => write!(f, "{cst}"),
            Term::App { op, args } => {
                write!(f, "({op}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn admits(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgRule {
    /// Every argument must have the given type.
    All(Type),
    /// Arguments must all share one type; the first argument fixes it.
    Same,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpSpec {
    pub builtin: Builtin,
    pub arity: Arity,
    pub args: ArgRule,
    pub result: Type,
}

impl OpSpec {
    pub fn as_cst(&self, name: impl Into<Name>) -> Cst {
        Cst::builtin(name, self.result, self.builtin)
    }
}

/// Operator catalog keyed by surface name.
pub fn op_spec(name: &str) -> Option<OpSpec> {
    use ArgRule::{All, Same};
    use Arity::{AtLeast, Exact};
    use Builtin::*;
    use Type::{Bool, Int};

    let spec = match name {
        "not" => OpSpec { builtin: Not, arity: Exact(1), args: All(Bool), result: Bool },
        "and" => OpSpec { builtin: And, arity: AtLeast(2), args: All(Bool), result: Bool },
        "or" => OpSpec { builtin: Or, arity: AtLeast(2), args: All(Bool), result: Bool },
        "=>" => OpSpec { builtin: Implies, arity: Exact(2), args: All(Bool), result: Bool },
        "=" => OpSpec { builtin: Eq, arity: Exact(2), args: Same, result: Bool },
        "<" => OpSpec { builtin: Lt, arity: Exact(2), args: All(Int), result: Bool },
        "<=" => OpSpec { builtin: Le, arity: Exact(2), args: All(Int), result: Bool },
        ">" => OpSpec { builtin: Gt, arity: Exact(2), args: All(Int), result: Bool },
        ">=" => OpSpec { builtin: Ge, arity: Exact(2), args: All(Int), result: Bool },
        "+" => OpSpec { builtin: Add, arity: Exact(2), args: All(Int), result: Int },
        "-" => OpSpec { builtin: Sub, arity: Exact(2), args: All(Int), result: Int },
        "*" => OpSpec { builtin: Mul, arity: Exact(2), args: All(Int), result: Int },
        _ => return None,
    };
    Some(spec)
}

pub fn builtin_cst(name: &str) -> Option<Cst> {
    match name {
        "true" => Some(Cst::truth(true)),
        "false" => Some(Cst::truth(false)),
        _ => None,
    }
}
