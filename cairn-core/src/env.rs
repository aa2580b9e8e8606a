use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use cairn_ast::{Ident, Span};
use cairn_term::{Name, TermVar};
use miette::Diagnostic;

pub type BoxedDiag = Box<dyn Diagnostic + Send + Sync + 'static>;

/// Marker handed back by [`Env::report`]: the statement being elaborated
/// cannot produce a declaration. Bubble it with `?` to stop a stage, or
/// drop it to keep collecting diagnostics until the next boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Aborted;

/// Sink position, taken before a stage and checked after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkMark(usize);

/// Collecting end for diagnostics, shared by every environment derived
/// within a session. Reporting never unwinds across statements.
#[derive(Clone, Default)]
pub struct DiagSink {
    diags: Rc<RefCell<Vec<BoxedDiag>>>,
}

impl DiagSink {
    pub fn new() -> DiagSink {
        DiagSink::default()
    }

    pub fn push(&self, diag: BoxedDiag) {
        self.diags.borrow_mut().push(diag);
    }

    pub fn mark(&self) -> SinkMark {
        SinkMark(self.diags.borrow().len())
    }

    pub fn is_clean(&self, mark: SinkMark) -> bool {
        self.diags.borrow().len() == mark.0
    }

    pub fn len(&self) -> usize {
        self.diags.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.diags.borrow().is_empty()
    }

    pub fn drain(&self) -> Vec<BoxedDiag> {
        std::mem::take(&mut *self.diags.borrow_mut())
    }
}

impl fmt::Debug for DiagSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagSink")
            .field("len", &self.len())
            .finish()
    }
}

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(0);

/// Capability token addressing one extension-private slot in the
/// environment registry. Each call to [`CustomKey::new`] yields a distinct
/// token; only the holder can reach the slot, and the core never learns
/// what any slot holds.
pub struct CustomKey<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> CustomKey<T> {
    pub fn new() -> CustomKey<T> {
        CustomKey {
            id: NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for CustomKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CustomKey<T> {}

impl<T> Default for CustomKey<T> {
    fn default() -> Self {
        CustomKey::new()
    }
}

impl<T> fmt::Debug for CustomKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomKey({})", self.id)
    }
}

/// One resolved identifier: surface name, the typed term variable it is
/// bound to, and the span of the node that introduced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub name: Ident,
    pub var: TermVar,
    pub declared_at: Span,
}

impl Binding {
    pub fn new(name: Ident, var: TermVar, declared_at: Span) -> Binding {
        Binding {
            name,
            var,
            declared_at,
        }
    }
}

/// The elaboration environment: an immutable value holding the binding
/// table, the shared diagnostic sink, and the registry of extension-owned
/// state. Every "add" operation returns a derived environment and leaves
/// the receiver untouched; only the sink is shared.
#[derive(Clone)]
pub struct Env {
    bindings: im::HashMap<Name, Binding>,
    custom: im::HashMap<u64, Rc<dyn Any>>,
    sink: DiagSink,
}

impl Env {
    pub fn new() -> Env {
        Env {
            bindings: im::HashMap::new(),
            custom: im::HashMap::new(),
            sink: DiagSink::new(),
        }
    }

    pub fn bind(&self, binding: Binding) -> Env {
        let mut next = self.clone();
        next.bindings = self.bindings.update(binding.var.name.clone(), binding);
        next
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get_custom<T: 'static>(&self, key: &CustomKey<T>) -> Option<Rc<T>> {
        let slot = self.custom.get(&key.id)?;
        Rc::clone(slot).downcast::<T>().ok()
    }

    pub fn set_custom<T: 'static>(&self, key: &CustomKey<T>, value: T) -> Env {
        let mut next = self.clone();
        next.custom = self.custom.update(key.id, Rc::new(value));
        next
    }

    /// Records a diagnostic and signals that the current statement is lost.
    pub fn report(&self, diag: impl Diagnostic + Send + Sync + 'static) -> Aborted {
        self.sink.push(Box::new(diag));
        Aborted
    }

    pub fn sink(&self) -> &DiagSink {
        &self.sink
    }

    pub fn mark(&self) -> SinkMark {
        self.sink.mark()
    }

    /// Stage boundary: fail if anything was reported since `mark`.
    pub fn ensure_clean(&self, mark: SinkMark) -> Result<(), Aborted> {
        if self.sink.is_clean(mark) {
            Ok(())
        } else {
            Err(Aborted)
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}

/// The two environments a two-state statement threads in parallel:
/// `current` sees the declared parameters, `two_state` additionally their
/// primed next-state counterparts.
#[derive(Clone)]
pub struct EnvPair {
    pub current: Env,
    pub two_state: Env,
}

impl EnvPair {
    pub fn new(base: Env) -> EnvPair {
        EnvPair {
            current: base.clone(),
            two_state: base,
        }
    }
}
