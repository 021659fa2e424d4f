//! The dynamic nogood store with its two-watched-literal index.
//!
//! A nogood forbids the conjunction of its literals. It becomes *unit* when
//! all but one literal are satisfied and the last one is unassigned (the
//! remaining literal must then be falsified), and it is a *conflict* when
//! every literal is satisfied. The store watches two non-satisfied literals
//! per nogood so only assignments touching a watch cost any work; watches
//! survive backtracking untouched.

use std::collections::VecDeque;

use fnv::FnvHashMap;

use super::Assignments;
use crate::basic_types::Literal;
use crate::basic_types::Nogood;
use crate::hexkin_assert_moderate;

/// Stable handle of a nogood in the store. Handles stay valid until the
/// owning nogood is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NogoodHandle(pub(crate) u32);

impl NogoodHandle {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Outcome of [`NogoodStore::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AddResult {
    Added(NogoodHandle),
    /// The same canonical literal set is already present; the store is
    /// unchanged and the existing handle is returned.
    Duplicate(NogoodHandle),
    /// The nogood contains complementary literals and can never fire.
    Tautology,
}

#[derive(Debug)]
struct StoredNogood {
    nogood: Nogood,
    /// The two watched literals; for nogoods of length one both entries
    /// alias the single literal.
    watched: [Literal; 2],
    deleted: bool,
}

#[derive(Debug, Default)]
pub(crate) struct NogoodStore {
    nogoods: Vec<StoredNogood>,
    index: FnvHashMap<Nogood, NogoodHandle>,
    /// For each literal (by dense index), the handles currently watching it.
    watchers: Vec<Vec<NogoodHandle>>,
    /// FIFO of unit consequences: the literal that must be falsified next,
    /// with the nogood forcing it.
    unit_queue: VecDeque<(Literal, NogoodHandle)>,
    conflict: Option<NogoodHandle>,
}

impl NogoodStore {
    pub(crate) fn new(num_atoms: usize) -> NogoodStore {
        NogoodStore {
            watchers: vec![Vec::new(); num_atoms * 2],
            ..NogoodStore::default()
        }
    }

    pub(crate) fn grow(&mut self, num_atoms: usize) {
        if num_atoms * 2 > self.watchers.len() {
            self.watchers.resize(num_atoms * 2, Vec::new());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nogoods.iter().filter(|stored| !stored.deleted).count()
    }

    pub(crate) fn get(&self, handle: NogoodHandle) -> &Nogood {
        &self.nogoods[handle.index()].nogood
    }

    pub(crate) fn conflict(&self) -> Option<NogoodHandle> {
        self.conflict
    }

    pub(crate) fn clear_conflict(&mut self) {
        self.conflict = None;
    }

    /// Reports a nogood the caller found violated outside the watch
    /// machinery (e.g. a stale unit consequence).
    pub(crate) fn declare_conflict(&mut self, handle: NogoodHandle) {
        self.conflict = Some(handle);
    }

    pub(crate) fn pop_unit(&mut self) -> Option<(Literal, NogoodHandle)> {
        self.unit_queue.pop_front()
    }

    pub(crate) fn has_pending_units(&self) -> bool {
        !self.unit_queue.is_empty()
    }

    /// Re-evaluates every live nogood against a freshly reset assignment,
    /// rebuilding the unit queue. Used when the engine is restarted under
    /// assumptions.
    pub(crate) fn reinitialise(&mut self, assignments: &Assignments) {
        self.unit_queue.clear();
        self.conflict = None;
        for index in 0..self.nogoods.len() {
            self.evaluate_status(NogoodHandle(index as u32), assignments);
        }
    }

    pub(crate) fn clear_queue(&mut self) {
        self.unit_queue.clear();
    }

    /// Adds a nogood, deduplicating by the canonical sorted literal set.
    /// The nogood's status under the current assignment takes effect
    /// immediately: a unit consequence is queued, a violated nogood raises
    /// the conflict flag.
    pub(crate) fn add(&mut self, nogood: Nogood, assignments: &Assignments) -> AddResult {
        if nogood.is_tautological() {
            return AddResult::Tautology;
        }

        if let Some(&handle) = self.index.get(&nogood) {
            // Duplicates leave the store unchanged, but their status still
            // counts: a violated duplicate is a conflict like any other.
            self.evaluate_status(handle, assignments);
            return AddResult::Duplicate(handle);
        }

        let handle = NogoodHandle(self.nogoods.len() as u32);
        let watched = self.choose_watches(&nogood, assignments);
        let _ = self.index.insert(nogood.clone(), handle);
        self.nogoods.push(StoredNogood {
            nogood,
            watched,
            deleted: false,
        });

        if !self.nogoods[handle.index()].nogood.is_empty() {
            self.watch(handle, watched[0]);
            if watched[1] != watched[0] {
                self.watch(handle, watched[1]);
            }
        }

        self.evaluate_status(handle, assignments);
        AddResult::Added(handle)
    }

    /// Removes a nogood. The caller must guarantee it is not the reason of a
    /// currently assigned literal; watcher entries are dropped lazily.
    pub(crate) fn remove(&mut self, handle: NogoodHandle) {
        let stored = &mut self.nogoods[handle.index()];
        hexkin_assert_moderate!(!stored.deleted);
        stored.deleted = true;
        let _ = self.index.remove(&stored.nogood);
        self.unit_queue.retain(|&(_, queued)| queued != handle);
    }

    /// Notifies the store that `literal` just became satisfied. Every nogood
    /// watching it either moves its watch to another non-satisfied literal,
    /// becomes unit (queued FIFO), or is reported as a conflict.
    pub(crate) fn on_assign(&mut self, literal: Literal, assignments: &Assignments) {
        let mut pending = std::mem::take(&mut self.watchers[literal.index()]);
        let mut retained = Vec::with_capacity(pending.len());

        while let Some(handle) = pending.pop() {
            let stored = &self.nogoods[handle.index()];
            if stored.deleted {
                continue;
            }
            let watch_slot = if stored.watched[0] == literal {
                0
            } else if stored.watched[1] == literal {
                1
            } else {
                // Stale entry left behind by an earlier watch move.
                continue;
            };

            let other = stored.watched[1 - watch_slot];
            let replacement = stored.nogood.iter().find(|&candidate| {
                candidate != literal && candidate != other && !assignments.is_satisfied(candidate)
            });

            if let Some(replacement) = replacement {
                self.nogoods[handle.index()].watched[watch_slot] = replacement;
                self.watch(handle, replacement);
                continue;
            }

            retained.push(handle);
            if other == literal || assignments.is_satisfied(other) {
                // Every literal of the nogood is satisfied.
                self.conflict = Some(handle);
                retained.extend(pending);
                break;
            }
            if !assignments.is_assigned(other.atom()) {
                self.unit_queue.push_back((other, handle));
            }
            // Otherwise `other` is falsified: the nogood cannot fire on this
            // branch and rests until backtracking frees a watch.
        }

        self.watchers[literal.index()].extend(retained);
    }

    fn watch(&mut self, handle: NogoodHandle, literal: Literal) {
        if literal.index() >= self.watchers.len() {
            self.watchers.resize(literal.index() + 1, Vec::new());
        }
        self.watchers[literal.index()].push(handle);
    }

    fn choose_watches(&self, nogood: &Nogood, assignments: &Assignments) -> [Literal; 2] {
        let literals = nogood.literals();
        if literals.is_empty() {
            // Placeholder; an empty nogood is an immediate conflict and is
            // never watched.
            return [Literal::positive(crate::basic_types::AtomId(0)); 2];
        }
        if literals.len() == 1 {
            return [literals[0]; 2];
        }

        let mut chosen = [literals[0], literals[1]];
        let mut found = 0;
        for &literal in literals {
            if !assignments.is_satisfied(literal) {
                chosen[found] = literal;
                found += 1;
                if found == 2 {
                    break;
                }
            }
        }
        // With fewer than two non-satisfied literals the remaining slots keep
        // arbitrary distinct literals; the status evaluation below reports
        // the unit or conflict.
        if found == 1 && chosen[1] == chosen[0] {
            chosen[1] = if literals[0] == chosen[0] {
                literals[1]
            } else {
                literals[0]
            };
        }
        chosen
    }

    fn evaluate_status(&mut self, handle: NogoodHandle, assignments: &Assignments) {
        let stored = &self.nogoods[handle.index()];
        if stored.deleted {
            return;
        }
        let mut unassigned = None;
        let mut open = 0;
        for literal in stored.nogood.iter() {
            if assignments.is_satisfied(literal) {
                continue;
            }
            open += 1;
            if !assignments.is_assigned(literal.atom()) {
                unassigned = Some(literal);
            } else {
                // A falsified literal keeps the nogood from ever firing.
                return;
            }
        }
        match (open, unassigned) {
            (0, _) => self.conflict = Some(handle),
            (1, Some(literal)) => self.unit_queue.push_back((literal, handle)),
            _ => {}
        }
    }

    /// Debug check of the watch invariant: after propagation has settled,
    /// every live nogood either has ≤ 1 literal, contains a falsified
    /// literal, watches two non-satisfied literals, or a conflict has been
    /// reported.
    pub(crate) fn debug_check_watches(&self, assignments: &Assignments) -> bool {
        if self.conflict.is_some() {
            return true;
        }
        self.nogoods.iter().all(|stored| {
            if stored.deleted || stored.nogood.len() <= 1 {
                return true;
            }
            let inactive = stored
                .nogood
                .iter()
                .any(|literal| assignments.is_falsified(literal));
            inactive
                || (!assignments.is_satisfied(stored.watched[0])
                    && !assignments.is_satisfied(stored.watched[1]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::AddResult;
    use super::NogoodStore;
    use crate::basic_types::AtomId;
    use crate::basic_types::Literal;
    use crate::basic_types::Nogood;
    use crate::engine::Assignments;
    use crate::engine::Reason;

    fn lit(atom: u32) -> Literal {
        Literal::positive(AtomId(atom))
    }

    #[test]
    fn adding_the_same_nogood_twice_returns_the_same_handle() {
        let assignments = Assignments::new(4);
        let mut store = NogoodStore::new(4);

        let first = store.add(Nogood::new(vec![lit(0), lit(1)]), &assignments);
        let second = store.add(Nogood::new(vec![lit(1), lit(0)]), &assignments);

        let AddResult::Added(handle) = first else {
            panic!("expected Added, got {first:?}");
        };
        assert_eq!(second, AddResult::Duplicate(handle));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unit_nogoods_queue_their_consequence() {
        let mut assignments = Assignments::new(4);
        let mut store = NogoodStore::new(4);

        let _ = store.add(Nogood::new(vec![lit(0), lit(1)]), &assignments);
        assignments.assign(lit(0), Reason::Root);
        store.on_assign(lit(0), &assignments);

        let (to_falsify, _) = store.pop_unit().expect("nogood must be unit");
        assert_eq!(to_falsify, lit(1));
        assert!(store.conflict().is_none());
    }

    #[test]
    fn fully_satisfied_nogood_is_a_conflict() {
        let mut assignments = Assignments::new(4);
        let mut store = NogoodStore::new(4);

        let _ = store.add(Nogood::new(vec![lit(0), lit(1)]), &assignments);
        assignments.assign(lit(0), Reason::Root);
        store.on_assign(lit(0), &assignments);
        store.clear_queue();
        assignments.assign(lit(1), Reason::Root);
        store.on_assign(lit(1), &assignments);

        assert!(store.conflict().is_some());
    }

    #[test]
    fn watches_move_to_open_literals() {
        let mut assignments = Assignments::new(4);
        let mut store = NogoodStore::new(4);

        let _ = store.add(Nogood::new(vec![lit(0), lit(1), lit(2)]), &assignments);
        assignments.assign(lit(0), Reason::Root);
        store.on_assign(lit(0), &assignments);

        // Two literals remain open: no unit, no conflict.
        assert!(store.pop_unit().is_none());
        assert!(store.conflict().is_none());
        assert!(store.debug_check_watches(&assignments));
    }

    #[test]
    fn falsified_literal_deactivates_the_nogood() {
        let mut assignments = Assignments::new(4);
        let mut store = NogoodStore::new(4);

        let _ = store.add(Nogood::new(vec![lit(0), lit(1)]), &assignments);
        assignments.assign(!lit(1), Reason::Root);
        store.on_assign(!lit(1), &assignments);
        assignments.assign(lit(0), Reason::Root);
        store.on_assign(lit(0), &assignments);

        assert!(store.pop_unit().is_none());
        assert!(store.conflict().is_none());
    }

    #[test]
    fn tautologies_are_dropped() {
        let assignments = Assignments::new(4);
        let mut store = NogoodStore::new(4);
        let result = store.add(Nogood::new(vec![lit(0), !lit(0)]), &assignments);
        assert_eq!(result, AddResult::Tautology);
        assert_eq!(store.len(), 0);
    }
}
