//! The contract by which the engine consults plugin predicates during search.
//!
//! At every total-assignment candidate the engine hands the propagator the
//! current truth interpretation together with the bitmaps of assigned atoms
//! and of atoms whose value changed since the previous call. The propagator
//! answers with zero or more nogoods to install before search resumes, and
//! with an is-model verdict that holds exactly when the assignment is free of
//! violations and no further nogoods are needed.
//!
//! Propagators are called synchronously from the engine's thread of control;
//! they may suspend (perform I/O to plugins) but must not reenter the engine.

use crate::basic_types::Interpretation;
use crate::basic_types::Nogood;
use crate::results::SolveError;

/// The engine's view of the current assignment, passed to the propagator.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PropagatorContext<'a> {
    /// The atoms currently assigned true.
    pub(crate) interpretation: &'a Interpretation,
    /// The atoms which currently hold any value.
    pub(crate) assigned: &'a Interpretation,
    /// The atoms whose value differs from the previous invocation.
    pub(crate) changed: &'a Interpretation,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct PropagationOutcome {
    pub(crate) nogoods: Vec<Nogood>,
    pub(crate) is_model: bool,
}

pub(crate) trait ExternalPropagator {
    fn propagate(
        &mut self,
        context: PropagatorContext<'_>,
    ) -> Result<PropagationOutcome, SolveError>;
}

/// Propagator for programs without external atoms: every candidate passes.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct NullPropagator;

impl ExternalPropagator for NullPropagator {
    fn propagate(
        &mut self,
        _context: PropagatorContext<'_>,
    ) -> Result<PropagationOutcome, SolveError> {
        Ok(PropagationOutcome {
            nogoods: Vec::new(),
            is_model: true,
        })
    }
}
