//! Translates a ground program into the initial nogood set: for every rule a
//! body equivalence and a head nogood, and for every derivable atom a support
//! nogood over its defining rule bodies. Candidate models additionally pass
//! the unfounded-set check, which covers what the completion cannot express.

use fnv::FnvHashMap;
use fnv::FnvHashSet;
use log::warn;

use crate::basic_types::AtomId;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::basic_types::Nogood;
use crate::program::GroundProgram;
use crate::program::RuleFlag;
use crate::registry::AtomFlag;
use crate::registry::Registry;

#[derive(Debug)]
pub(crate) struct Translation {
    pub(crate) nogoods: Vec<Nogood>,
    /// Every atom the solver must assign for the assignment to be total, in
    /// ascending id order.
    pub(crate) relevant: Vec<AtomId>,
    /// Auxiliary atoms hidden from emitted models: the program's own mask
    /// plus body atoms and the true-atom.
    pub(crate) mask: Interpretation,
}

pub(crate) fn translate(registry: &mut Registry, program: &GroundProgram) -> Translation {
    let mut nogoods = Vec::new();
    let mut universe = program.edb.clone();
    let mut defining: FnvHashMap<AtomId, Vec<Literal>> = FnvHashMap::default();
    let mut mask = program.mask.clone();

    // A root-level true atom backs the body literal of empty bodies.
    let true_symbol = registry.symbols.intern("aux_true");
    let true_atom = registry
        .atoms
        .intern_with_flags(vec![true_symbol], enumset::EnumSet::only(AtomFlag::Auxiliary));
    nogoods.push(Nogood::new(vec![Literal::negative(true_atom)]));
    let _ = mask.insert(true_atom);
    let _ = universe.insert(true_atom);

    let mut body_atoms_emitted: FnvHashSet<AtomId> = FnvHashSet::default();
    let mut skipped_weight_rules = 0usize;

    for rule in &program.idb {
        if rule.flags.contains(RuleFlag::WeightRule) {
            // Weak/weighted constructs are accepted as a no-op boundary.
            skipped_weight_rules += 1;
            continue;
        }

        for &atom in &rule.head {
            let _ = universe.insert(atom);
        }
        for literal in &rule.body {
            let _ = universe.insert(literal.atom());
        }

        let body_literal = match rule.body.len() {
            0 => Literal::positive(true_atom),
            1 => rule.body[0],
            _ => {
                // Body atoms are content-addressed so identical bodies share
                // one atom, within and across sub-programs.
                let mut sorted = rule.body.clone();
                sorted.sort();
                let name = sorted
                    .iter()
                    .map(|literal| literal.index().to_string())
                    .collect::<Vec<_>>()
                    .join("_");
                let symbol = registry.symbols.intern(&format!("aux_body\u{b7}{name}"));
                let atom = registry
                    .atoms
                    .intern_with_flags(vec![symbol], enumset::EnumSet::only(AtomFlag::Auxiliary));
                let literal = Literal::positive(atom);

                if body_atoms_emitted.insert(atom) {
                    // Forbidden: body true with the body-atom false.
                    let mut all_true = sorted.clone();
                    all_true.push(literal.complement());
                    nogoods.push(Nogood::new(all_true));
                    // Forbidden: body-atom true with a body literal false.
                    for &body_member in &sorted {
                        nogoods.push(Nogood::new(vec![literal, body_member.complement()]));
                    }
                }
                let _ = mask.insert(atom);
                literal
            }
        };

        // Body true and every head atom false is forbidden; for constraints
        // the body alone is forbidden.
        let mut head_nogood = vec![body_literal];
        for &atom in &rule.head {
            head_nogood.push(Literal::negative(atom));
        }
        nogoods.push(Nogood::new(head_nogood));

        for &atom in &rule.head {
            defining.entry(atom).or_default().push(body_literal);
        }
    }

    if skipped_weight_rules > 0 {
        warn!("{skipped_weight_rules} weight rule(s) accepted but not evaluated");
    }

    // Support: a non-fact atom can only be true when some defining body is
    // true. Atoms without any defining rule are forced false.
    for atom in universe.iter() {
        if program.edb.contains(atom) || atom == true_atom {
            continue;
        }
        if body_atoms_emitted.contains(&atom) {
            continue;
        }
        let mut support = vec![Literal::positive(atom)];
        for body_literal in defining.get(&atom).into_iter().flatten() {
            support.push(body_literal.complement());
        }
        nogoods.push(Nogood::new(support));
    }

    let relevant: Vec<AtomId> = universe
        .iter()
        .chain(mask.iter().filter(|atom| !universe.contains(*atom)))
        .collect::<Interpretation>()
        .iter()
        .collect();

    Translation {
        nogoods,
        relevant,
        mask,
    }
}

#[cfg(test)]
mod tests {
    use enumset::EnumSet;

    use super::translate;
    use crate::basic_types::AtomId;
    use crate::basic_types::Interpretation;
    use crate::basic_types::Literal;
    use crate::basic_types::Nogood;
    use crate::program::GroundProgram;
    use crate::program::GroundRule;
    use crate::registry::Registry;

    fn two_atom_registry() -> (Registry, AtomId, AtomId) {
        let mut registry = Registry::new();
        let a = registry.symbols.intern("a");
        let b = registry.symbols.intern("b");
        let atom_a = registry.atoms.intern(vec![a]);
        let atom_b = registry.atoms.intern(vec![b]);
        (registry, atom_a, atom_b)
    }

    #[test]
    fn choice_program_produces_head_and_support_nogoods() {
        // a :- not b.  b :- not a.
        let (mut registry, a, b) = two_atom_registry();
        let program = GroundProgram {
            edb: Interpretation::new(),
            idb: vec![
                GroundRule {
                    head: vec![a],
                    body: vec![Literal::negative(b)],
                    flags: EnumSet::empty(),
                    weight: None,
                },
                GroundRule {
                    head: vec![b],
                    body: vec![Literal::negative(a)],
                    flags: EnumSet::empty(),
                    weight: None,
                },
            ],
            mask: Interpretation::new(),
        };

        let translation = translate(&mut registry, &program);

        // Head nogoods collapse to {not a, not b}; support to {a, b}.
        assert!(translation
            .nogoods
            .contains(&Nogood::new(vec![Literal::negative(a), Literal::negative(b)])));
        assert!(translation
            .nogoods
            .contains(&Nogood::new(vec![Literal::positive(a), Literal::positive(b)])));
        assert!(translation.relevant.contains(&a));
        assert!(translation.relevant.contains(&b));
    }

    #[test]
    fn underivable_atom_is_forced_false() {
        // Constraint :- c over an atom with no rules.
        let mut registry = Registry::new();
        let c = registry.symbols.intern("c");
        let atom_c = registry.atoms.intern(vec![c]);
        let program = GroundProgram {
            edb: Interpretation::new(),
            idb: vec![GroundRule {
                head: vec![],
                body: vec![Literal::positive(atom_c)],
                flags: EnumSet::only(crate::program::RuleFlag::Constraint),
                weight: None,
            }],
            mask: Interpretation::new(),
        };

        let translation = translate(&mut registry, &program);
        assert!(translation
            .nogoods
            .contains(&Nogood::new(vec![Literal::positive(atom_c)])));
    }
}
