//! The plugin ABI for external atoms.
//!
//! A plugin exposes one or more named predicates. For each predicate it
//! declares the kind of every input position and the output arity, and
//! implements [`PluginPredicate::retrieve`]: given the projected input
//! interpretation and the ground input tuple, produce the set of ground
//! output tuples. Monotonicity is declared per predicate; the core records
//! the flag but does not interpret it.

mod builtin;

pub use builtin::register_builtin_plugins;

use fnv::FnvHashMap;

use crate::basic_types::Interpretation;
use crate::registry::SymbolId;
use crate::registry::SymbolTable;

/// The kind of one input position of an external predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// The argument names a predicate; the plugin sees that predicate's
    /// extension in the projected input interpretation.
    Predicate,
    /// An uninterpreted constant.
    Constant,
    /// A tuple constant, passed through unexamined.
    Tuple,
}

/// One query to a plugin predicate: the projected input interpretation
/// together with the ground input tuple and the output pattern. The atom
/// table is shared read-only so the plugin can inspect extensions; the symbol
/// table is mutable so answers may introduce fresh constants.
#[derive(Debug)]
pub struct PluginQuery<'a> {
    /// The input interpretation, already projected to the predicate-input
    /// mask of the external atom.
    pub interpretation: &'a Interpretation,
    /// The ground input tuple of this call.
    pub input: &'a [SymbolId],
    /// For each output position, `Some` when the pattern fixes a constant.
    pub output_pattern: &'a [Option<SymbolId>],
    pub atoms: &'a crate::registry::AtomTable,
    pub symbols: &'a mut SymbolTable,
}

/// Raised when a plugin fails or answers outside its declared signature.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PluginFailure {
    pub message: String,
}

impl PluginFailure {
    pub fn new(message: impl Into<String>) -> PluginFailure {
        PluginFailure {
            message: message.into(),
        }
    }
}

pub trait PluginPredicate {
    fn name(&self) -> &str;

    fn input_kinds(&self) -> &[InputKind];

    fn output_arity(&self) -> usize;

    /// Declared monotonicity. The dependency graph consults this; the core
    /// only records it.
    fn monotonic(&self) -> bool {
        true
    }

    /// Produces the set of ground output tuples for one query. Every tuple
    /// must match the declared output arity.
    fn retrieve(&self, query: PluginQuery<'_>) -> Result<Vec<Vec<SymbolId>>, PluginFailure>;
}

/// The named predicates known to this solve, populated at startup from the
/// built-in plugins (and, in a full deployment, from discovered plugin
/// libraries).
#[derive(Default)]
pub struct PluginRegistry {
    predicates: FnvHashMap<String, Box<dyn PluginPredicate>>,
}

impl PluginRegistry {
    pub fn new() -> PluginRegistry {
        PluginRegistry::default()
    }

    pub fn register(&mut self, predicate: Box<dyn PluginPredicate>) {
        let _ = self
            .predicates
            .insert(predicate.name().to_owned(), predicate);
    }

    pub fn get(&self, name: &str) -> Option<&dyn PluginPredicate> {
        self.predicates.get(name).map(|boxed| boxed.as_ref())
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}
