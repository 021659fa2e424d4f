//! Decision making: a VSIDS-like variable selector combined with phase
//! saving for the sign. Activities are bumped for every literal of a nogood
//! touched during conflict analysis and decay multiplicatively after a
//! configurable number of conflicts.

mod phase_saving;
mod vsids;

pub(crate) use phase_saving::PhaseSaving;
pub(crate) use vsids::Vsids;

use rand::rngs::SmallRng;
use rand::Rng;

use crate::basic_types::AtomId;
use crate::basic_types::Literal;
use crate::basic_types::Nogood;
use crate::engine::Assignments;

#[derive(Debug)]
pub(crate) struct Brancher {
    variable_selector: Vsids,
    value_selector: PhaseSaving,
}

impl Brancher {
    pub(crate) fn new(num_atoms: usize, decay_interval: u64, decay_factor: f64) -> Brancher {
        Brancher {
            variable_selector: Vsids::new(num_atoms, decay_interval, decay_factor),
            value_selector: PhaseSaving::new(num_atoms),
        }
    }

    pub(crate) fn grow(&mut self, num_atoms: usize) {
        self.variable_selector.grow(num_atoms);
        self.value_selector.grow(num_atoms);
    }

    /// Picks the unassigned atom with the highest activity; ties go to the
    /// smaller atom id (insertion order) unless random tie-breaking is
    /// enabled. The sign repeats the atom's last-seen phase.
    pub(crate) fn next_decision(
        &self,
        candidates: &[AtomId],
        assignments: &Assignments,
        random: Option<&mut SmallRng>,
    ) -> Option<Literal> {
        let mut best: Option<AtomId> = None;
        let mut best_activity = f64::NEG_INFINITY;
        let mut ties = 0u32;
        let mut random = random;

        for &atom in candidates {
            if assignments.is_assigned(atom) {
                continue;
            }
            let activity = self.variable_selector.activity(atom);
            if activity > best_activity {
                best = Some(atom);
                best_activity = activity;
                ties = 1;
            } else if activity == best_activity {
                ties += 1;
                if let Some(rng) = random.as_deref_mut() {
                    if rng.gen_range(0..ties) == 0 {
                        best = Some(atom);
                    }
                }
            }
        }

        best.map(|atom| Literal::new(atom, self.value_selector.saved_phase(atom)))
    }

    pub(crate) fn bump_nogood(&mut self, nogood: &Nogood) {
        self.variable_selector.bump_nogood(nogood);
    }

    pub(crate) fn on_conflict(&mut self) {
        self.variable_selector.on_conflict();
    }

    pub(crate) fn on_unassign(&mut self, atom: AtomId, value: bool) {
        self.value_selector.on_unassign(atom, value);
    }
}
