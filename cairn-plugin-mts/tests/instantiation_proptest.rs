use cairn_ast::{Expr, Ident, TypeExpr, TypeKind, TypedVar, ident, span};
use cairn_core::{CustomKey, Session};
use cairn_plugin_mts::{
    DefineSystem, Instantiation, MtsPlugin, ParamList, SystemDef, SystemsTable,
};
use miette::Result;
use proptest::prelude::{any, prop};
use proptest::test_runner::{Config, TestCaseError, TestRunner};

fn id(at: usize, name: &str) -> Ident {
    ident(span(at, name.len()), name)
}

fn tv(at: usize, name: &str, is_bool: bool) -> TypedVar {
    let ty = if is_bool { "Bool" } else { "Int" };
    TypedVar::new(
        span(at, name.len() + ty.len() + 3),
        id(at + 1, name),
        TypeExpr::name(span(at + name.len() + 2, ty.len()), ty),
    )
}

// One parameter per entry, `a0 a1 ..` or `b0 b1 ..`, Bool or Int
// according to its flag. Names are unique across the two prefixes.
fn params_from(shape: &[bool], prefix: &str, base: usize) -> Vec<TypedVar> {
    shape
        .iter()
        .enumerate()
        .map(|(i, &is_bool)| tv(base + i * 16, &format!("{prefix}{i}"), is_bool))
        .collect()
}

// An init mentioning every parameter once, keeping generated definitions
// past the usage check: a Bool parameter stands alone, an Int one is
// compared to zero.
fn covering_init(params: &[TypedVar], base: usize) -> Option<Expr> {
    let atoms: Vec<Expr> = params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let at = base + i * 12;
            match &p.ty.kind {
                TypeKind::Name(name) if name == "Bool" => {
                    Expr::sym(span(at, 2), p.name.node.as_str())
                }
                _ => Expr::app(
                    span(at, 8),
                    id(at + 1, "="),
                    vec![
                        Expr::sym(span(at + 3, 2), p.name.node.as_str()),
                        Expr::int(span(at + 6, 1), 0),
                    ],
                ),
            }
        })
        .collect();
    match atoms.len() {
        0 => None,
        1 => atoms.into_iter().next(),
        _ => Some(Expr::app(span(base, 90), id(base + 1, "and"), atoms)),
    }
}

fn define(
    at: usize,
    name: &str,
    inputs: Vec<TypedVar>,
    outputs: Vec<TypedVar>,
    init: Option<Expr>,
    subsystems: Vec<Instantiation>,
) -> DefineSystem {
    DefineSystem {
        span: span(at, 90),
        name: id(at + 15, name),
        inputs: ParamList::new(span(at + 20, 20), inputs),
        outputs: ParamList::new(span(at + 40, 20), outputs),
        locals: ParamList::empty(span(at + 60, 2)),
        init,
        trans: None,
        inv: None,
        subsystems,
    }
}

// `T`: one Int input `z`, init `z = 0`, and a single instantiation of
// the callee under the given argument list.
fn caller_with_args(at: usize, callee: &str, args: Vec<Expr>) -> DefineSystem {
    let z = tv(at + 20, "z", false);
    let init = Expr::app(
        span(at + 40, 8),
        id(at + 41, "="),
        vec![
            Expr::sym(span(at + 43, 1), "z"),
            Expr::int(span(at + 46, 1), 0),
        ],
    );
    let inst = Instantiation {
        span: span(at + 60, 20),
        local_name: id(at + 61, "part"),
        system: id(at + 66, callee),
        args,
    };
    define(at, "T", vec![z], Vec::new(), Some(init), vec![inst])
}

fn setup() -> (Session, CustomKey<SystemsTable>) {
    let mut session = Session::new();
    let plugin = MtsPlugin::new();
    let key = *plugin.systems_key();
    session.install(plugin);
    (session, key)
}

#[test]
fn mismatched_argument_counts_always_cite_inputs_plus_outputs() -> Result<()> {
    let mut runner = TestRunner::new(Config {
        cases: 256,
        ..Config::default()
    });

    let strat = (
        prop::collection::vec(any::<bool>(), 0..4),
        prop::collection::vec(any::<bool>(), 0..4),
        0usize..10,
    );

    runner
        .run(&strat, |(in_shape, out_shape, arg_count)| {
            let io_len = in_shape.len() + out_shape.len();
            if arg_count == io_len {
                return Ok(());
            }
            let (mut session, key) = setup();
            let inputs = params_from(&in_shape, "a", 20);
            let outputs = params_from(&out_shape, "b", 120);
            let all: Vec<TypedVar> = inputs.iter().chain(&outputs).cloned().collect();
            let callee = define(0, "S1", inputs, outputs, covering_init(&all, 240), Vec::new());
            if session.elaborate(&callee).is_none() {
                return Err(TestCaseError::fail("callee definition failed"));
            }
            if !session.drain_diagnostics().is_empty() {
                return Err(TestCaseError::fail("callee definition reported errors"));
            }

            let args: Vec<Expr> = (0..arg_count)
                .map(|i| Expr::int(span(500 + i * 4, 1), i as u64))
                .collect();
            if session
                .elaborate(&caller_with_args(400, "S1", args))
                .is_some()
            {
                return Err(TestCaseError::fail("mismatched instantiation succeeded"));
            }

            let diags = session.drain_diagnostics();
            if diags.len() != 1 {
                return Err(TestCaseError::fail(format!(
                    "expected exactly one diagnostic, got {}",
                    diags.len()
                )));
            }
            let want = format!("`S1` takes {io_len} arguments, got {arg_count}");
            if diags[0].to_string() != want {
                return Err(TestCaseError::fail(format!(
                    "message `{}` does not carry both counts",
                    diags[0]
                )));
            }

            let Some(table) = session.env().get_custom(&key) else {
                return Err(TestCaseError::fail("callee vanished from the registry"));
            };
            if table.len() != 1 || table.contains_key("T") {
                return Err(TestCaseError::fail("failed caller reached the registry"));
            }
            Ok(())
        })
        .map_err(|e| miette::miette!("instantiation arity property failed: {e}"))?;

    Ok(())
}

#[test]
fn exact_length_argument_lists_always_bind_in_declaration_order() -> Result<()> {
    let mut runner = TestRunner::new(Config {
        cases: 256,
        ..Config::default()
    });

    let strat = (
        prop::collection::vec(any::<bool>(), 0..4),
        prop::collection::vec(any::<bool>(), 0..4),
    );

    runner
        .run(&strat, |(in_shape, out_shape)| {
            let (mut session, key) = setup();
            let inputs = params_from(&in_shape, "a", 20);
            let outputs = params_from(&out_shape, "b", 120);
            let all: Vec<TypedVar> = inputs.iter().chain(&outputs).cloned().collect();
            let callee = define(0, "S1", inputs, outputs, covering_init(&all, 240), Vec::new());
            if session.elaborate(&callee).is_none() {
                return Err(TestCaseError::fail("callee definition failed"));
            }
            if !session.drain_diagnostics().is_empty() {
                return Err(TestCaseError::fail("callee definition reported errors"));
            }

            // one argument per positional slot, inputs before outputs,
            // each matching its slot's type; Int slots carry their index
            let io_shape: Vec<bool> = in_shape.iter().chain(&out_shape).copied().collect();
            let args: Vec<Expr> = io_shape
                .iter()
                .enumerate()
                .map(|(i, &is_bool)| {
                    let at = 500 + i * 6;
                    if is_bool {
                        Expr::sym(span(at, 4), "true")
                    } else {
                        Expr::int(span(at, 1), i as u64)
                    }
                })
                .collect();
            let Some(decl) = session.elaborate(&caller_with_args(400, "S1", args)) else {
                return Err(TestCaseError::fail("well-typed instantiation failed"));
            };
            if !session.drain_diagnostics().is_empty() {
                return Err(TestCaseError::fail("well-typed instantiation reported errors"));
            }

            let Some(def) = decl.as_any().downcast_ref::<SystemDef>() else {
                return Err(TestCaseError::fail("caller is not a system definition"));
            };
            if def.subsystems.len() != 1 {
                return Err(TestCaseError::fail("instantiation count drifted"));
            }
            let got: Vec<String> = def.subsystems[0]
                .args
                .iter()
                .map(|t| t.to_string())
                .collect();
            let want: Vec<String> = io_shape
                .iter()
                .enumerate()
                .map(|(i, &is_bool)| {
                    if is_bool {
                        "true".to_string()
                    } else {
                        i.to_string()
                    }
                })
                .collect();
            if got != want {
                return Err(TestCaseError::fail(format!(
                    "arguments bound out of order: {got:?} vs {want:?}"
                )));
            }
            if session.env().get_custom(&key).map(|t| t.len()) != Some(2) {
                return Err(TestCaseError::fail("caller missing from the registry"));
            }
            Ok(())
        })
        .map_err(|e| miette::miette!("positional binding property failed: {e}"))?;

    Ok(())
}
