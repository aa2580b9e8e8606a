#![forbid(unsafe_code)]

mod env;
mod error;
mod session;
mod sig;
mod typing;

pub use env::{Aborted, Binding, BoxedDiag, CustomKey, DiagSink, Env, EnvPair, SinkMark};
pub use error::CoreError;
pub use session::{Declaration, Elaborated, Extension, Session, StatementForm};
pub use sig::{SigBinder, primed};
pub use typing::{
    check_no_free_wildcards, check_used, ensure, parse_prop, parse_term, resolve_type,
};
