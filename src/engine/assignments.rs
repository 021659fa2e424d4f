//! Tracks the truth value, decision level, reason and insertion order of every
//! assigned atom, together with the trail used for backtracking.

use super::NogoodHandle;
use crate::basic_types::AtomId;
use crate::basic_types::Literal;
use crate::hexkin_assert_moderate;
use crate::hexkin_assert_simple;

/// Why an atom holds its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Reason {
    /// Chosen by the branching heuristic.
    Decision,
    /// Installed at level 0: an EDB fact or an assumption.
    Root,
    /// Forced by a unit nogood.
    Propagated(NogoodHandle),
}

const UNASSIGNED: i8 = -1;

#[derive(Debug)]
pub(crate) struct Assignments {
    values: Vec<i8>,
    levels: Vec<u32>,
    reasons: Vec<Reason>,
    orders: Vec<u64>,
    /// The satisfied literal of every assignment, in assignment order.
    trail: Vec<Literal>,
    /// `level_offsets[l]` is the trail index at which level `l` starts.
    level_offsets: Vec<usize>,
    next_order: u64,
}

impl Assignments {
    pub(crate) fn new(num_atoms: usize) -> Assignments {
        Assignments {
            values: vec![UNASSIGNED; num_atoms],
            levels: vec![0; num_atoms],
            reasons: vec![Reason::Root; num_atoms],
            orders: vec![0; num_atoms],
            trail: Vec::new(),
            level_offsets: vec![0],
            next_order: 0,
        }
    }

    pub(crate) fn grow(&mut self, num_atoms: usize) {
        if num_atoms > self.values.len() {
            self.values.resize(num_atoms, UNASSIGNED);
            self.levels.resize(num_atoms, 0);
            self.reasons.resize(num_atoms, Reason::Root);
            self.orders.resize(num_atoms, 0);
        }
    }

    pub(crate) fn num_atoms(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn value(&self, atom: AtomId) -> Option<bool> {
        match self.values[atom.index()] {
            UNASSIGNED => None,
            value => Some(value == 1),
        }
    }

    pub(crate) fn is_assigned(&self, atom: AtomId) -> bool {
        self.values[atom.index()] != UNASSIGNED
    }

    /// Whether the literal is satisfied: assigned and true under NAF reading.
    pub(crate) fn is_satisfied(&self, literal: Literal) -> bool {
        self.value(literal.atom()) == Some(!literal.is_naf())
    }

    /// Whether the literal is falsified: assigned with the opposite value.
    pub(crate) fn is_falsified(&self, literal: Literal) -> bool {
        self.value(literal.atom()) == Some(literal.is_naf())
    }

    pub(crate) fn decision_level(&self) -> u32 {
        (self.level_offsets.len() - 1) as u32
    }

    pub(crate) fn increase_decision_level(&mut self) {
        self.level_offsets.push(self.trail.len());
    }

    /// Makes `literal` satisfied at the current decision level.
    pub(crate) fn assign(&mut self, literal: Literal, reason: Reason) {
        let atom = literal.atom();
        hexkin_assert_moderate!(!self.is_assigned(atom), "atom {atom} assigned twice");
        hexkin_assert_simple!(
            !matches!(reason, Reason::Root) || self.decision_level() == 0,
            "root assignments only exist at level 0"
        );

        self.values[atom.index()] = (!literal.is_naf()) as i8;
        self.levels[atom.index()] = self.decision_level();
        self.reasons[atom.index()] = reason;
        self.orders[atom.index()] = self.next_order;
        self.next_order += 1;
        self.trail.push(literal);
    }

    pub(crate) fn level_of(&self, atom: AtomId) -> u32 {
        hexkin_assert_moderate!(self.is_assigned(atom));
        self.levels[atom.index()]
    }

    pub(crate) fn reason_of(&self, atom: AtomId) -> Reason {
        hexkin_assert_moderate!(self.is_assigned(atom));
        self.reasons[atom.index()]
    }

    /// The monotonically increasing insertion index, used as the strict
    /// recency tie-break during conflict analysis.
    pub(crate) fn order_of(&self, atom: AtomId) -> u64 {
        hexkin_assert_moderate!(self.is_assigned(atom));
        self.orders[atom.index()]
    }

    pub(crate) fn trail(&self) -> &[Literal] {
        &self.trail
    }

    /// Unwinds the trail level by level until `level` is the current decision
    /// level. Calls `on_unassign(atom, old_value)` for every atom that loses
    /// its value, in reverse assignment order.
    pub(crate) fn backtrack_to(
        &mut self,
        level: u32,
        mut on_unassign: impl FnMut(AtomId, bool),
    ) {
        hexkin_assert_simple!(level <= self.decision_level());
        if level == self.decision_level() {
            return;
        }

        let keep = self.level_offsets[(level + 1) as usize];
        while self.trail.len() > keep {
            let literal = self.trail.pop().expect("trail longer than keep point");
            let atom = literal.atom();
            let old_value = self.values[atom.index()] == 1;
            self.values[atom.index()] = UNASSIGNED;
            on_unassign(atom, old_value);
        }
        self.level_offsets.truncate((level + 1) as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::Assignments;
    use super::Reason;
    use crate::basic_types::AtomId;
    use crate::basic_types::Literal;

    #[test]
    fn assignment_records_level_and_order() {
        let mut assignments = Assignments::new(4);
        assignments.assign(Literal::positive(AtomId(0)), Reason::Root);

        assignments.increase_decision_level();
        assignments.assign(Literal::negative(AtomId(1)), Reason::Decision);

        assert_eq!(assignments.value(AtomId(0)), Some(true));
        assert_eq!(assignments.value(AtomId(1)), Some(false));
        assert_eq!(assignments.level_of(AtomId(0)), 0);
        assert_eq!(assignments.level_of(AtomId(1)), 1);
        assert!(assignments.order_of(AtomId(0)) < assignments.order_of(AtomId(1)));
    }

    #[test]
    fn backtracking_unwinds_by_level() {
        let mut assignments = Assignments::new(4);
        assignments.assign(Literal::positive(AtomId(0)), Reason::Root);

        assignments.increase_decision_level();
        assignments.assign(Literal::positive(AtomId(1)), Reason::Decision);
        assignments.increase_decision_level();
        assignments.assign(Literal::positive(AtomId(2)), Reason::Decision);

        let mut unassigned = Vec::new();
        assignments.backtrack_to(1, |atom, value| unassigned.push((atom, value)));

        assert_eq!(unassigned, vec![(AtomId(2), true)]);
        assert_eq!(assignments.decision_level(), 1);
        assert!(assignments.is_assigned(AtomId(1)));
        assert!(!assignments.is_assigned(AtomId(2)));
    }

    #[test]
    fn satisfied_and_falsified_follow_the_naf_bit() {
        let mut assignments = Assignments::new(2);
        assignments.assign(Literal::negative(AtomId(0)), Reason::Root);

        assert!(assignments.is_satisfied(Literal::negative(AtomId(0))));
        assert!(assignments.is_falsified(Literal::positive(AtomId(0))));
        assert!(!assignments.is_satisfied(Literal::positive(AtomId(1))));
    }
}
