use fnv::FnvHashSet;

use crate::basic_types::Literal;
use crate::basic_types::Nogood;
use crate::branching::Brancher;
use crate::engine::Assignments;
use crate::engine::NogoodStore;
use crate::engine::Reason;
use crate::hexkin_assert_moderate;
use crate::hexkin_assert_simple;

/// The outcome of conflict analysis: the learned nogood, the level to jump
/// back to, and the literal that is flipped there.
#[derive(Clone, Debug)]
pub(crate) struct ConflictAnalysisResult {
    pub(crate) learned: Nogood,
    pub(crate) backjump_level: u32,
    /// The single literal of the learned nogood at the conflict level. After
    /// backjumping, the learned nogood is unit on it and propagation falsifies
    /// it.
    pub(crate) uip: Literal,
}

/// 1-UIP resolution over nogood reasons.
///
/// Starting from the violated nogood, the working set is repeatedly resolved
/// against the reason of its most recently assigned literal at the conflict
/// level (recency taken strictly by insertion index) until exactly one
/// literal of the conflict level remains, the unique implication point.
#[derive(Debug, Default)]
pub(crate) struct ResolutionConflictAnalyser;

impl ResolutionConflictAnalyser {
    pub(crate) fn compute_1uip(
        &self,
        conflict: &Nogood,
        assignments: &Assignments,
        store: &NogoodStore,
        brancher: &mut Brancher,
    ) -> ConflictAnalysisResult {
        let conflict_level = conflict
            .iter()
            .map(|literal| assignments.level_of(literal.atom()))
            .max()
            .expect("a conflict nogood is never empty");
        hexkin_assert_simple!(conflict_level > 0, "level-0 conflicts end the search");
        hexkin_assert_moderate!(
            conflict.iter().all(|literal| assignments.is_satisfied(literal)),
            "the conflicting nogood must be fully satisfied"
        );

        brancher.bump_nogood(conflict);

        let mut working: FnvHashSet<Literal> = conflict.iter().collect();
        loop {
            let at_conflict_level: Vec<Literal> = working
                .iter()
                .copied()
                .filter(|literal| assignments.level_of(literal.atom()) == conflict_level)
                .collect();
            hexkin_assert_simple!(!at_conflict_level.is_empty());

            if at_conflict_level.len() == 1 {
                let uip = at_conflict_level[0];
                let backjump_level = working
                    .iter()
                    .filter(|literal| **literal != uip)
                    .map(|literal| assignments.level_of(literal.atom()))
                    .max()
                    .unwrap_or(0);

                return ConflictAnalysisResult {
                    learned: working.into_iter().collect(),
                    backjump_level,
                    uip,
                };
            }

            // Resolve on the most recent literal; its reason must be a
            // propagation, since the decision of this level was assigned
            // before everything else on the level.
            let pivot = at_conflict_level
                .into_iter()
                .max_by_key(|literal| assignments.order_of(literal.atom()))
                .expect("at least two literals at the conflict level");
            let Reason::Propagated(reason_handle) = assignments.reason_of(pivot.atom()) else {
                unreachable!("the most recent conflict-level literal has a reason nogood")
            };
            let reason = store.get(reason_handle);
            hexkin_assert_moderate!(
                reason.contains(pivot.complement()),
                "the reason of a literal contains its complement"
            );
            brancher.bump_nogood(reason);

            let _ = working.remove(&pivot);
            for literal in reason.iter() {
                if literal != pivot.complement() {
                    hexkin_assert_moderate!(
                        assignments.order_of(literal.atom()) < assignments.order_of(pivot.atom())
                    );
                    let _ = working.insert(literal);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ResolutionConflictAnalyser;
    use crate::basic_types::AtomId;
    use crate::basic_types::Literal;
    use crate::basic_types::Nogood;
    use crate::branching::Brancher;
    use crate::engine::nogood_store::AddResult;
    use crate::engine::Assignments;
    use crate::engine::NogoodStore;
    use crate::engine::Reason;

    fn lit(atom: u32) -> Literal {
        Literal::positive(AtomId(atom))
    }

    #[test]
    fn single_decision_conflict_learns_the_decision() {
        // Decision a at level 1 propagates b via {a, not b}; nogood {a, b}
        // then conflicts. The 1-UIP is b, and resolving it re-expresses the
        // conflict in terms of the decision.
        let mut assignments = Assignments::new(4);
        let mut store = NogoodStore::new(4);
        let mut brancher = Brancher::new(4, 256, 0.95);

        let AddResult::Added(reason) =
            store.add(Nogood::new(vec![lit(0), !lit(1)]), &assignments)
        else {
            panic!("fresh nogood");
        };

        assignments.increase_decision_level();
        assignments.assign(lit(0), Reason::Decision);
        assignments.assign(lit(1), Reason::Propagated(reason));

        let conflict = Nogood::new(vec![lit(0), lit(1)]);
        let result = ResolutionConflictAnalyser.compute_1uip(
            &conflict,
            &assignments,
            &store,
            &mut brancher,
        );

        assert_eq!(result.learned, Nogood::new(vec![lit(0)]));
        assert_eq!(result.backjump_level, 0);
        assert_eq!(result.uip, lit(0));
    }

    #[test]
    fn resolution_stops_at_the_unique_implication_point() {
        // Level 1 decides a; level 2 decides c which propagates d through
        // {c, not d}. The conflict {a, c, d} has two literals at level 2;
        // resolving d against its reason leaves c as the UIP.
        let mut assignments = Assignments::new(8);
        let mut store = NogoodStore::new(8);
        let mut brancher = Brancher::new(8, 256, 0.95);

        let AddResult::Added(reason) =
            store.add(Nogood::new(vec![lit(2), !lit(3)]), &assignments)
        else {
            panic!("fresh nogood");
        };

        assignments.increase_decision_level();
        assignments.assign(lit(0), Reason::Decision);
        assignments.increase_decision_level();
        assignments.assign(lit(2), Reason::Decision);
        assignments.assign(lit(3), Reason::Propagated(reason));

        let conflict = Nogood::new(vec![lit(0), lit(2), lit(3)]);
        let result = ResolutionConflictAnalyser.compute_1uip(
            &conflict,
            &assignments,
            &store,
            &mut brancher,
        );

        assert_eq!(result.learned, Nogood::new(vec![lit(0), lit(2)]));
        assert_eq!(result.backjump_level, 1);
        assert_eq!(result.uip, lit(2));
    }
}
