use std::any::Any;
use std::sync::Arc;

use cairn_ast::Span;

use crate::env::{Aborted, BoxedDiag, Env};
use crate::error::CoreError;

/// A located top-level statement. Extensions own their statement AST
/// types; the session only sees this surface and lets the owner downcast.
pub trait StatementForm: Any {
    /// Keyword of the form, used in diagnostics for unowned statements.
    fn form(&self) -> &'static str;
    fn span(&self) -> Span;
    fn as_any(&self) -> &dyn Any;
}

/// An elaborated, reusable artifact produced by a successful statement.
pub trait Declaration: Any {
    fn name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

/// Outcome of a successful statement: the environment to thread into the
/// next statement, and the declaration produced.
pub struct Elaborated {
    pub env: Env,
    pub decl: Arc<dyn Declaration>,
}

/// One statement-form provider. `elaborate` answers `None` for forms it
/// does not own; the session asks the next extension, first taker wins.
pub trait Extension {
    fn name(&self) -> &'static str;

    fn elaborate(
        &self,
        env: &Env,
        statement: &dyn StatementForm,
    ) -> Option<Result<Elaborated, Aborted>>;
}

/// Host loop. Statements must be handed over in source order: the registry
/// travels with the threaded environment, and a lookup only sees
/// definitions from statements that already succeeded. A failing statement
/// leaves the environment untouched; whatever it derived, registration
/// included, is dropped with it.
pub struct Session {
    extensions: Vec<Box<dyn Extension>>,
    env: Env,
    decls: Vec<Arc<dyn Declaration>>,
}

impl Session {
    pub fn new() -> Session {
        Session {
            extensions: Vec::new(),
            env: Env::new(),
            decls: Vec::new(),
        }
    }

    pub fn install(&mut self, extension: impl Extension + 'static) {
        self.extensions.push(Box::new(extension));
    }

    /// Runs one statement to completion. `None` means the statement was
    /// aborted (or no extension owns its form); diagnostics are in the
    /// sink either way.
    pub fn elaborate(&mut self, statement: &dyn StatementForm) -> Option<Arc<dyn Declaration>> {
        for extension in &self.extensions {
            if let Some(outcome) = extension.elaborate(&self.env, statement) {
                return match outcome {
                    Ok(Elaborated { env, decl }) => {
                        self.env = env;
                        self.decls.push(Arc::clone(&decl));
                        Some(decl)
                    }
                    Err(Aborted) => None,
                };
            }
        }
        self.env.report(CoreError::CannotFind {
            name: statement.form().to_string(),
            span: statement.span(),
        });
        None
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn declarations(&self) -> &[Arc<dyn Declaration>] {
        &self.decls
    }

    /// Takes every diagnostic collected so far, oldest first.
    pub fn drain_diagnostics(&self) -> Vec<BoxedDiag> {
        self.env.sink().drain()
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
