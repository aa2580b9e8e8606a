#![forbid(unsafe_code)]

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use cairn_ast::{Expr, Ident, Span, TypedVar};
use cairn_core::{
    Aborted, Binding, CoreError, CustomKey, Declaration, Elaborated, Env, Extension, SigBinder,
    StatementForm, check_no_free_wildcards, check_used, ensure, parse_prop, parse_term,
};
use cairn_term::{Name, Term};
use miette::Diagnostic;
use thiserror::Error;

/// A parameter group together with the span of the whole group; the group
/// span anchors arity errors when the group is shorter than expected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamList {
    pub span: Span,
    pub params: Vec<TypedVar>,
}

impl ParamList {
    pub fn new(span: Span, params: Vec<TypedVar>) -> ParamList {
        ParamList { span, params }
    }

    pub fn empty(span: Span) -> ParamList {
        ParamList {
            span,
            params: Vec::new(),
        }
    }
}

/// An embedded use of a previously defined system, binding its input and
/// output parameters positionally to argument expressions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instantiation {
    pub span: Span,
    pub local_name: Ident,
    pub system: Ident,
    pub args: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefineSystem {
    pub span: Span,
    pub name: Ident,
    pub inputs: ParamList,
    pub outputs: ParamList,
    pub locals: ParamList,
    /// Missing conditions default to the true proposition.
    pub init: Option<Expr>,
    pub trans: Option<Expr>,
    pub inv: Option<Expr>,
    pub subsystems: Vec<Instantiation>,
}

impl StatementForm for DefineSystem {
    fn form(&self) -> &'static str {
        "define-system"
    }

    fn span(&self) -> Span {
        self.span
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A named proposition inside a check statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedCondition {
    pub span: Span,
    pub name: Ident,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub span: Span,
    pub name: Ident,
    pub conditions: Vec<Ident>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckSystem {
    pub span: Span,
    pub name: Ident,
    /// The system being checked; must already be defined.
    pub system: Ident,
    pub inputs: ParamList,
    pub outputs: ParamList,
    pub locals: ParamList,
    pub assumptions: Vec<NamedCondition>,
    pub reachables: Vec<NamedCondition>,
    pub queries: Vec<Query>,
}

impl StatementForm for CheckSystem {
    fn form(&self) -> &'static str {
        "check-system"
    }

    fn span(&self) -> Span {
        self.span
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum MtsError {
    #[error("cannot find system `{name}`")]
    #[diagnostic(code(cairn::mts::cannot_find_system))]
    CannotFindSystem {
        name: String,
        #[label("no such system at this point")]
        span: Span,
    },

    #[error("`{system}` takes {expected} arguments, got {actual}")]
    #[diagnostic(code(cairn::mts::bad_instantiation_arity))]
    BadInstantiationArity {
        system: String,
        expected: usize,
        actual: usize,
        #[label("instantiated here")]
        span: Span,
    },
}

/// Ordered parameters of a system, partitioned by role.
#[derive(Clone, Debug)]
pub struct SystemSignature {
    pub inputs: Vec<Binding>,
    pub outputs: Vec<Binding>,
    pub locals: Vec<Binding>,
}

impl SystemSignature {
    /// The positional list an instantiation binds: inputs, then outputs.
    pub fn io_params(&self) -> impl Iterator<Item = &Binding> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    pub fn io_len(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    fn groups(&self) -> [(&'static str, &[Binding]); 3] {
        [
            ("input", &self.inputs),
            ("output", &self.outputs),
            ("local", &self.locals),
        ]
    }
}

#[derive(Clone, Debug)]
pub struct SubsystemUse {
    pub local_name: Ident,
    pub system: String,
    pub args: Vec<Term>,
}

/// A fully elaborated system definition; lives in the registry for the
/// rest of the session once its statement succeeds.
#[derive(Clone, Debug)]
pub struct SystemDef {
    pub name: Ident,
    pub signature: SystemSignature,
    pub init: Term,
    pub trans: Term,
    pub inv: Term,
    pub subsystems: Vec<SubsystemUse>,
}

impl Declaration for SystemDef {
    fn name(&self) -> &str {
        &self.name.node
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone, Debug)]
pub struct CheckQuery {
    pub name: Ident,
    pub conditions: Vec<Ident>,
}

/// A fully elaborated check statement. Never registered: checks reference
/// systems, nothing references checks.
#[derive(Clone, Debug)]
pub struct SystemCheck {
    pub name: Ident,
    pub system: String,
    pub signature: SystemSignature,
    pub assumptions: Vec<(Ident, Term)>,
    pub reachables: Vec<(Ident, Term)>,
    pub queries: Vec<CheckQuery>,
}

impl Declaration for SystemCheck {
    fn name(&self) -> &str {
        &self.name.node
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Registry slot: systems defined so far in this session, by name.
pub type SystemsTable = im::HashMap<Name, Arc<SystemDef>>;

pub struct MtsPlugin {
    systems: CustomKey<SystemsTable>,
}

impl MtsPlugin {
    pub fn new() -> MtsPlugin {
        MtsPlugin {
            systems: CustomKey::new(),
        }
    }

    /// For hosts that inspect the table directly, e.g. an exporter walking
    /// every defined system.
    pub fn systems_key(&self) -> &CustomKey<SystemsTable> {
        &self.systems
    }

    fn table(&self, env: &Env) -> SystemsTable {
        env.get_custom(&self.systems)
            .map(|rc| (*rc).clone())
            .unwrap_or_default()
    }
}

impl Extension for MtsPlugin {
    fn name(&self) -> &'static str {
        "mts"
    }

    fn elaborate(
        &self,
        env: &Env,
        statement: &dyn StatementForm,
    ) -> Option<Result<Elaborated, Aborted>> {
        let any = statement.as_any();
        if let Some(st) = any.downcast_ref::<DefineSystem>() {
            return Some(self.define(env, st));
        }
        if let Some(st) = any.downcast_ref::<CheckSystem>() {
            return Some(self.check(env, st));
        }
        None
    }
}

impl MtsPlugin {
    /// Definition pipeline: signature, body, registration, finalization,
    /// with a stage boundary after each. The registry write rides on the
    /// returned environment; an aborted statement drops it unseen.
    fn define(&self, env: &Env, st: &DefineSystem) -> Result<Elaborated, Aborted> {
        let mark = env.mark();

        let mut binder = SigBinder::new(env.clone());
        let signature = SystemSignature {
            inputs: binder.declare_group(&st.inputs.params),
            outputs: binder.declare_group(&st.outputs.params),
            locals: binder.declare_group(&st.locals.params),
        };
        let pair = binder.finish();
        env.ensure_clean(mark)?;

        let init = parse_opt_prop(&pair.current, st.init.as_ref());
        let trans = parse_opt_prop(&pair.two_state, st.trans.as_ref());
        let inv = parse_opt_prop(&pair.current, st.inv.as_ref());
        let subsystems = self.parse_subsystems(env, &pair.current, &st.subsystems);
        env.ensure_clean(mark)?;

        let mut table = self.table(env);
        if let Some(existing) = table.get(st.name.node.as_str()) {
            return Err(env.report(CoreError::duplicate(
                st.name.node.clone(),
                existing.name.span,
                st.name.span,
            )));
        }
        let def = Arc::new(SystemDef {
            name: st.name.clone(),
            signature,
            init,
            trans,
            inv,
            subsystems,
        });
        table.insert(st.name.node.as_str().into(), Arc::clone(&def));
        let next = env.set_custom(&self.systems, table);

        self.finalize_def(env, st, &def);
        env.ensure_clean(mark)?;

        Ok(Elaborated {
            env: next,
            decl: def,
        })
    }

    /// Elaborates every instantiation in a definition body against the
    /// current-state environment. A failing instantiation is skipped and
    /// the remaining ones still elaborate; the statement aborts at the
    /// body boundary either way.
    fn parse_subsystems(
        &self,
        env: &Env,
        current: &Env,
        nodes: &[Instantiation],
    ) -> Vec<SubsystemUse> {
        let table = self.table(env);
        let mut seen: HashMap<&str, Span> = HashMap::new();
        let mut out = Vec::new();

        for node in nodes {
            if let Some(&first) = seen.get(node.local_name.node.as_str()) {
                current.report(CoreError::duplicate(
                    node.local_name.node.clone(),
                    first,
                    node.local_name.span,
                ));
                continue;
            }
            seen.insert(&node.local_name.node, node.local_name.span);

            let Some(callee) = table.get(node.system.node.as_str()) else {
                current.report(MtsError::CannotFindSystem {
                    name: node.system.node.clone(),
                    span: node.system.span,
                });
                continue;
            };
            let expected = callee.signature.io_len();
            if node.args.len() != expected {
                current.report(MtsError::BadInstantiationArity {
                    system: node.system.node.clone(),
                    expected,
                    actual: node.args.len(),
                    span: node.span,
                });
                continue;
            }

            // Positional matching assumes the arity check above has passed.
            debug_assert_eq!(node.args.len(), callee.signature.io_len());
            let mut args = Vec::with_capacity(node.args.len());
            for (param, arg) in callee.signature.io_params().zip(&node.args) {
                let term = parse_term(current, arg);
                ensure(current, arg.span, &term, param.var.ty);
                args.push(term);
            }
            out.push(SubsystemUse {
                local_name: node.local_name.clone(),
                system: node.system.node.clone(),
                args,
            });
        }
        out
    }

    /// Post-conditions of a definition: no wildcard type survives in any
    /// condition, and every declared parameter occurs in a condition or an
    /// instantiation argument, plain or primed.
    fn finalize_def(&self, env: &Env, st: &DefineSystem, def: &SystemDef) {
        let anchored = [
            (&def.init, st.init.as_ref().map_or(st.span, |e| e.span)),
            (&def.trans, st.trans.as_ref().map_or(st.span, |e| e.span)),
            (&def.inv, st.inv.as_ref().map_or(st.span, |e| e.span)),
        ];
        for (term, at) in anchored {
            check_no_free_wildcards(env, at, term);
        }

        let conditions: Vec<&Term> = [&def.init, &def.trans, &def.inv]
            .into_iter()
            .chain(def.subsystems.iter().flat_map(|sub| sub.args.iter()))
            .collect();
        for (kind, group) in def.signature.groups() {
            for binding in group {
                check_used(env, kind, binding, &conditions);
            }
        }
    }

    /// Check pipeline: signature against the referenced system, named
    /// conditions, queries, then the wildcard post-condition. Leaves the
    /// registry alone.
    fn check(&self, env: &Env, st: &CheckSystem) -> Result<Elaborated, Aborted> {
        let mark = env.mark();

        let table = self.table(env);
        let Some(system) = table.get(st.system.node.as_str()) else {
            return Err(env.report(MtsError::CannotFindSystem {
                name: st.system.node.clone(),
                span: st.system.span,
            }));
        };
        let mut binder = SigBinder::new(env.clone());
        let signature = SystemSignature {
            inputs: binder.check_group(&system.signature.inputs, &st.inputs.params, st.inputs.span),
            outputs: binder.check_group(
                &system.signature.outputs,
                &st.outputs.params,
                st.outputs.span,
            ),
            locals: binder.check_group(&system.signature.locals, &st.locals.params, st.locals.span),
        };
        let pair = binder.finish();
        env.ensure_clean(mark)?;

        // Assumption and reachability names share one namespace.
        let mut seen: HashMap<&str, Span> = HashMap::new();
        let assumptions = parse_conditions(&pair.two_state, &st.assumptions, &mut seen);
        let reachables = parse_conditions(&pair.two_state, &st.reachables, &mut seen);
        env.ensure_clean(mark)?;

        let mut query_seen: HashMap<&str, Span> = HashMap::new();
        let mut queries = Vec::with_capacity(st.queries.len());
        for node in &st.queries {
            if let Some(&first) = query_seen.get(node.name.node.as_str()) {
                env.report(CoreError::duplicate(
                    node.name.node.clone(),
                    first,
                    node.name.span,
                ));
            } else {
                query_seen.insert(&node.name.node, node.name.span);
            }
            for cond in &node.conditions {
                if !seen.contains_key(cond.node.as_str()) {
                    env.report(CoreError::CannotFind {
                        name: cond.node.clone(),
                        span: cond.span,
                    });
                }
            }
            queries.push(CheckQuery {
                name: node.name.clone(),
                conditions: node.conditions.clone(),
            });
        }
        env.ensure_clean(mark)?;

        for (node, (_, term)) in st.assumptions.iter().zip(&assumptions) {
            check_no_free_wildcards(env, node.body.span, term);
        }
        for (node, (_, term)) in st.reachables.iter().zip(&reachables) {
            check_no_free_wildcards(env, node.body.span, term);
        }
        env.ensure_clean(mark)?;

        Ok(Elaborated {
            env: env.clone(),
            decl: Arc::new(SystemCheck {
                name: st.name.clone(),
                system: st.system.node.clone(),
                signature,
                assumptions,
                reachables,
                queries,
            }),
        })
    }
}

/// Missing conditions stand for `true`.
fn parse_opt_prop(env: &Env, expr: Option<&Expr>) -> Term {
    match expr {
        Some(expr) => parse_prop(env, expr),
        None => Term::tt(),
    }
}

/// Elaborates named conditions, reporting duplicate names against the
/// shared `seen` table. Duplicates still elaborate for their own
/// diagnostics; the caller's stage boundary aborts afterwards.
fn parse_conditions<'a>(
    env: &Env,
    nodes: &'a [NamedCondition],
    seen: &mut HashMap<&'a str, Span>,
) -> Vec<(Ident, Term)> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let Some(&first) = seen.get(node.name.node.as_str()) {
            env.report(CoreError::duplicate(
                node.name.node.clone(),
                first,
                node.name.span,
            ));
        } else {
            seen.insert(&node.name.node, node.name.span);
        }
        out.push((node.name.clone(), parse_prop(env, &node.body)));
    }
    out
}
