use crate::basic_types::AtomId;

/// Remembers the last value every atom was assigned and proposes it again as
/// the decision sign. The stored phase is the literal's NAF bit, so the
/// default `false` makes a fresh atom's first decision positive.
#[derive(Debug)]
pub(crate) struct PhaseSaving {
    saved_naf: Vec<bool>,
}

impl PhaseSaving {
    pub(crate) fn new(num_atoms: usize) -> PhaseSaving {
        PhaseSaving {
            saved_naf: vec![false; num_atoms],
        }
    }

    pub(crate) fn grow(&mut self, num_atoms: usize) {
        if num_atoms > self.saved_naf.len() {
            self.saved_naf.resize(num_atoms, false);
        }
    }

    pub(crate) fn saved_phase(&self, atom: AtomId) -> bool {
        self.saved_naf.get(atom.index()).copied().unwrap_or(false)
    }

    pub(crate) fn on_unassign(&mut self, atom: AtomId, value: bool) {
        if atom.index() >= self.saved_naf.len() {
            self.saved_naf.resize(atom.index() + 1, false);
        }
        self.saved_naf[atom.index()] = !value;
    }
}

#[cfg(test)]
mod tests {
    use super::PhaseSaving;
    use crate::basic_types::AtomId;

    #[test]
    fn default_phase_is_positive() {
        let phase = PhaseSaving::new(2);
        assert!(!phase.saved_phase(AtomId(0)));
    }

    #[test]
    fn unassignment_saves_the_lost_value() {
        let mut phase = PhaseSaving::new(2);
        phase.on_unassign(AtomId(0), false);
        assert!(phase.saved_phase(AtomId(0)));

        phase.on_unassign(AtomId(0), true);
        assert!(!phase.saved_phase(AtomId(0)));
    }
}
