use crate::basic_types::AtomId;
use crate::basic_types::Nogood;

const RESCALE_THRESHOLD: f64 = 1e100;

/// Per-literal activity counters. Every literal occurring in a nogood touched
/// during conflict analysis is bumped; instead of periodically scaling all
/// counters down, the bump amount grows and everything is rescaled when it
/// threatens to overflow.
#[derive(Debug)]
pub(crate) struct Vsids {
    activities: Vec<f64>,
    bump: f64,
    decay_interval: u64,
    decay_factor: f64,
    conflicts_until_decay: u64,
}

impl Vsids {
    pub(crate) fn new(num_atoms: usize, decay_interval: u64, decay_factor: f64) -> Vsids {
        Vsids {
            activities: vec![0.0; num_atoms * 2],
            bump: 1.0,
            decay_interval: decay_interval.max(1),
            decay_factor,
            conflicts_until_decay: decay_interval.max(1),
        }
    }

    pub(crate) fn grow(&mut self, num_atoms: usize) {
        if num_atoms * 2 > self.activities.len() {
            self.activities.resize(num_atoms * 2, 0.0);
        }
    }

    /// An atom's selection score is the combined activity of its literals.
    pub(crate) fn activity(&self, atom: AtomId) -> f64 {
        let positive = atom.index() * 2;
        self.activities[positive] + self.activities[positive + 1]
    }

    pub(crate) fn bump_nogood(&mut self, nogood: &Nogood) {
        for literal in nogood.iter() {
            if literal.index() >= self.activities.len() {
                self.activities.resize(literal.index() + 1, 0.0);
            }
            self.activities[literal.index()] += self.bump;
        }
        if self.activities.iter().any(|&a| a > RESCALE_THRESHOLD) {
            for activity in &mut self.activities {
                *activity /= RESCALE_THRESHOLD;
            }
            self.bump /= RESCALE_THRESHOLD;
        }
    }

    /// Called once per conflict; after every `decay_interval` conflicts all
    /// activities decay multiplicatively (realised by growing the bump).
    pub(crate) fn on_conflict(&mut self) {
        self.conflicts_until_decay -= 1;
        if self.conflicts_until_decay == 0 {
            self.conflicts_until_decay = self.decay_interval;
            self.bump /= self.decay_factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Vsids;
    use crate::basic_types::AtomId;
    use crate::basic_types::Literal;
    use crate::basic_types::Nogood;

    #[test]
    fn bumping_raises_the_atom_score() {
        let mut vsids = Vsids::new(4, 256, 0.95);
        let nogood = Nogood::new(vec![
            Literal::positive(AtomId(1)),
            Literal::negative(AtomId(2)),
        ]);
        vsids.bump_nogood(&nogood);

        assert_eq!(vsids.activity(AtomId(0)), 0.0);
        assert!(vsids.activity(AtomId(1)) > 0.0);
        assert!(vsids.activity(AtomId(2)) > 0.0);
    }

    #[test]
    fn later_bumps_outweigh_earlier_ones_after_decay() {
        let mut vsids = Vsids::new(4, 1, 0.5);
        let early = Nogood::new(vec![Literal::positive(AtomId(0))]);
        let late = Nogood::new(vec![Literal::positive(AtomId(1))]);

        vsids.bump_nogood(&early);
        vsids.on_conflict();
        vsids.on_conflict();
        vsids.bump_nogood(&late);

        assert!(vsids.activity(AtomId(1)) > vsids.activity(AtomId(0)));
    }
}
