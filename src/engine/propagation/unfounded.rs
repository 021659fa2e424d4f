//! The unfounded-set boundary.
//!
//! After the propagator accepts a candidate, the engine asks the checker for
//! an unfounded set with respect to the candidate: a non-empty set of true
//! atoms none of which has external support. A non-empty witness yields a
//! loop nogood forbidding the candidate; an empty witness confirms it.
//!
//! The default implementation removes externally supported atoms from the
//! candidate to a fixpoint. It is exact for non-disjunctive and
//! head-cycle-free programs; the fully general disjunctive case remains an
//! external collaborator behind this trait.

use crate::basic_types::AtomId;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::basic_types::Nogood;
use crate::program::GroundProgram;
use crate::program::GroundRule;

pub(crate) trait UnfoundedSetChecker {
    /// Returns a witness unfounded set, or the empty set to confirm the
    /// candidate.
    fn find_unfounded_set(&mut self, candidate: &Interpretation) -> Interpretation;

    /// Builds the loop nogood for a non-empty witness found on `candidate`.
    fn loop_nogood(&self, candidate: &Interpretation, witness: &Interpretation) -> Nogood;
}

/// Accepts every candidate. Used when the caller has established that the
/// program is tight.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct TrivialUnfoundedSetChecker;

impl UnfoundedSetChecker for TrivialUnfoundedSetChecker {
    fn find_unfounded_set(&mut self, _candidate: &Interpretation) -> Interpretation {
        Interpretation::new()
    }

    fn loop_nogood(&self, _candidate: &Interpretation, _witness: &Interpretation) -> Nogood {
        unreachable!("the trivial checker never reports a witness")
    }
}

/// Fixpoint-based checker over the ground rules of the program.
#[derive(Debug)]
pub(crate) struct FixpointUnfoundedSetChecker {
    rules: Vec<GroundRule>,
    facts: Interpretation,
    /// Atoms whose truth is justified outside the rules: auxiliaries such as
    /// external replacement atoms and their complements.
    external_justified: Interpretation,
    head_atoms: Interpretation,
}

impl FixpointUnfoundedSetChecker {
    pub(crate) fn new(
        program: &GroundProgram,
        external_justified: Interpretation,
    ) -> FixpointUnfoundedSetChecker {
        let mut head_atoms = Interpretation::new();
        for rule in &program.idb {
            for &atom in &rule.head {
                let _ = head_atoms.insert(atom);
            }
        }
        FixpointUnfoundedSetChecker {
            rules: program.idb.clone(),
            facts: program.edb.clone(),
            external_justified,
            head_atoms,
        }
    }

    fn body_satisfied(&self, rule: &GroundRule, candidate: &Interpretation) -> bool {
        rule.body.iter().all(|literal| {
            candidate.contains(literal.atom()) != literal.is_naf()
        })
    }

    /// Whether `rule` externally supports `atom` given the current witness
    /// candidate `x`: its body holds, no positive body atom is in `x`, and no
    /// other true head atom lies outside `x`.
    fn supports(
        &self,
        rule: &GroundRule,
        atom: AtomId,
        x: &Interpretation,
        candidate: &Interpretation,
    ) -> bool {
        if !rule.head.contains(&atom) || !self.body_satisfied(rule, candidate) {
            return false;
        }
        let positive_in_x = rule
            .body
            .iter()
            .any(|literal| !literal.is_naf() && x.contains(literal.atom()));
        if positive_in_x {
            return false;
        }
        rule.head
            .iter()
            .all(|&other| other == atom || !candidate.contains(other) || x.contains(other))
    }
}

impl UnfoundedSetChecker for FixpointUnfoundedSetChecker {
    fn find_unfounded_set(&mut self, candidate: &Interpretation) -> Interpretation {
        let mut x = candidate.clone();
        x.intersect_with(&self.head_atoms);
        x.difference_with(&self.facts);
        x.difference_with(&self.external_justified);

        loop {
            let supported: Vec<AtomId> = x
                .iter()
                .filter(|&atom| {
                    self.rules
                        .iter()
                        .any(|rule| self.supports(rule, atom, &x, candidate))
                })
                .collect();
            if supported.is_empty() {
                return x;
            }
            for atom in supported {
                let _ = x.remove(atom);
            }
        }
    }

    fn loop_nogood(&self, candidate: &Interpretation, witness: &Interpretation) -> Nogood {
        let mut literals: Vec<Literal> = witness.iter().map(Literal::positive).collect();

        for rule in &self.rules {
            if rule.head.iter().all(|atom| !witness.contains(*atom)) {
                continue;
            }
            let internal = rule
                .body
                .iter()
                .any(|literal| !literal.is_naf() && witness.contains(literal.atom()));
            if internal {
                continue;
            }
            if let Some(falsified) = rule
                .body
                .iter()
                .find(|literal| candidate.contains(literal.atom()) == literal.is_naf())
            {
                literals.push(falsified.complement());
                continue;
            }
            let blocker = rule
                .head
                .iter()
                .find(|&&atom| candidate.contains(atom) && !witness.contains(atom))
                .expect("an unsupporting rule with a satisfied body has a true head outside the witness");
            literals.push(Literal::positive(*blocker));
        }

        Nogood::new(literals)
    }
}
