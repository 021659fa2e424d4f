//! A guess-and-check reference engine: enumerates every assignment over the
//! relevant atoms and keeps those that satisfy the nogood store, the
//! propagator and the unfounded-set checker. Exponential by construction; it
//! exists for differential testing and the `--solver=naive` escape hatch.

use super::completion;
use super::propagation::ExternalPropagator;
use super::propagation::PropagatorContext;
use super::propagation::UnfoundedSetChecker;
use crate::basic_types::AtomId;
use crate::basic_types::Interpretation;
use crate::basic_types::Nogood;
use crate::options::SolverOptions;
use crate::program::GroundProgram;
use crate::registry::Registry;
use crate::results::SolveError;

const MAX_FREE_ATOMS: usize = 24;

#[derive(Debug)]
pub(crate) struct NaiveSolver {
    nogoods: Vec<Nogood>,
    free: Vec<AtomId>,
    edb: Interpretation,
    mask: Interpretation,
}

impl NaiveSolver {
    pub(crate) fn new(
        registry: &mut Registry,
        program: &GroundProgram,
        _options: &SolverOptions,
    ) -> Result<NaiveSolver, SolveError> {
        let translation = completion::translate(registry, program);
        let free: Vec<AtomId> = translation
            .relevant
            .iter()
            .copied()
            .filter(|atom| !program.edb.contains(*atom))
            .collect();
        if free.len() > MAX_FREE_ATOMS {
            return Err(SolveError::Usage(format!(
                "the naive solver handles at most {MAX_FREE_ATOMS} free atoms, got {}",
                free.len()
            )));
        }
        Ok(NaiveSolver {
            nogoods: translation.nogoods,
            free,
            edb: program.edb.clone(),
            mask: translation.mask,
        })
    }

    /// All models, projected, in counting order over the free atoms.
    pub(crate) fn enumerate(
        &self,
        propagator: &mut dyn ExternalPropagator,
        unfounded: &mut dyn UnfoundedSetChecker,
        max_models: Option<u64>,
    ) -> Result<Vec<Interpretation>, SolveError> {
        let mut models = Vec::new();
        let mut assigned = self.edb.clone();
        for &atom in &self.free {
            let _ = assigned.insert(atom);
        }

        'candidates: for bits in 0u64..(1u64 << self.free.len()) {
            let mut interpretation = self.edb.clone();
            for (position, &atom) in self.free.iter().enumerate() {
                if bits & (1 << position) != 0 {
                    let _ = interpretation.insert(atom);
                }
            }

            for nogood in &self.nogoods {
                let violated = nogood
                    .iter()
                    .all(|literal| interpretation.contains(literal.atom()) != literal.is_naf());
                if violated {
                    continue 'candidates;
                }
            }

            let outcome = propagator.propagate(PropagatorContext {
                interpretation: &interpretation,
                assigned: &assigned,
                changed: &assigned,
            })?;
            if !outcome.is_model {
                continue;
            }
            if !unfounded.find_unfounded_set(&interpretation).is_empty() {
                continue;
            }

            let mut model = interpretation;
            model.difference_with(&self.mask);
            models.push(model);
            if max_models.is_some_and(|limit| models.len() as u64 >= limit) {
                break;
            }
        }
        Ok(models)
    }
}
