//! Error and result types surfaced at the crate boundary.

use crate::basic_types::Interpretation;
use crate::registry::Registry;

/// Everything that can go wrong between reading a program and finishing the
/// solve. The binary maps each variant onto its process exit code.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("usage error: {0}")]
    Usage(String),

    #[error("unsafe rule: {0}")]
    Safety(String),

    #[error("program is not i-stratified: {0}")]
    Stratification(String),

    #[error("plugin error in &{predicate}: {message}")]
    Plugin { predicate: String, message: String },

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl SolveError {
    /// The process exit code for this error: usage, parse, safety and
    /// stratification problems exit 1, plugin failures exit 2, and a violated
    /// internal invariant exits 99.
    pub fn exit_code(&self) -> i32 {
        match self {
            SolveError::Parse(_)
            | SolveError::Usage(_)
            | SolveError::Safety(_)
            | SolveError::Stratification(_) => 1,
            SolveError::Plugin { .. } => 2,
            SolveError::Invariant(_) => 99,
        }
    }
}

/// One answer set: the projected interpretation over the visible signature.
#[derive(Clone, Debug)]
pub struct AnswerSet {
    pub interpretation: Interpretation,
}

impl AnswerSet {
    /// Renders the answer set as `{atom, atom, ...}`, keeping only atoms
    /// whose unprefixed predicate appears in `filter` when one is given.
    pub fn render(&self, registry: &Registry, filter: Option<&[String]>) -> String {
        let mut parts = Vec::new();
        for atom in self.interpretation.iter() {
            if let Some(wanted) = filter {
                let predicate = registry.symbols.resolve(registry.atoms.predicate(atom));
                // Instance prefixes (`m0·...·p`) are transparent to filtering.
                let plain = predicate.rsplit('\u{b7}').next().unwrap_or(predicate);
                if !wanted.iter().any(|name| name == plain) {
                    continue;
                }
            }
            parts.push(registry.atom_text(atom));
        }
        format!("{{{}}}", parts.join(", "))
    }
}
