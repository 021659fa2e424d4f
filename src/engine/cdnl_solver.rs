//! The conflict-driven nogood-learning engine: decide → propagate → (on
//! conflict) learn & back-jump, streaming the models of a ground program
//! augmented with the dynamic nogood store.
//!
//! A *model* is a total assignment that satisfies every nogood in the store
//! and is accepted by the external-atom propagator and the unfounded-set
//! checker. Either may inject new nogoods, in which case search resumes
//! instead of emitting. Enumeration blocks each emitted model with a nogood
//! over its decision literals, so models arrive in a fixed, deterministic
//! order for a fixed configuration and input.

use log::debug;
use rand::rngs::SmallRng;

use super::completion;
use super::conflict_analysis::ResolutionConflictAnalyser;
use super::nogood_store::AddResult;
use super::propagation::ExternalPropagator;
use super::propagation::PropagatorContext;
use super::propagation::UnfoundedSetChecker;
use super::restart::RestartStrategy;
use super::termination::TerminationCondition;
use super::Assignments;
use super::NogoodHandle;
use super::NogoodStore;
use super::Reason;
use crate::basic_types::AtomId;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::basic_types::Nogood;
use crate::branching::Brancher;
use crate::hexkin_assert_extreme;
use crate::hexkin_assert_moderate;
use crate::options::SolverOptions;
use crate::program::GroundProgram;
use crate::registry::Registry;
use crate::results::SolveError;
use crate::statistics::Statistics;

/// The search states of the engine; see the transition table in the module
/// documentation of [`crate::engine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineState {
    Initial,
    Propagate,
    Decide,
    Analyse,
    Model,
    End,
}

#[derive(Debug)]
pub(crate) struct CdnlSolver {
    state: EngineState,
    assignments: Assignments,
    store: NogoodStore,
    brancher: Brancher,
    analyser: ResolutionConflictAnalyser,
    restarts: RestartStrategy,
    statistics: Statistics,
    /// Atoms the solver must assign, ascending. Everything else is out of
    /// this instance's signature.
    relevant: Vec<AtomId>,
    relevant_mask: Interpretation,
    edb: Interpretation,
    mask: Interpretation,
    /// Handles of model-blocking nogoods, removable when the engine is
    /// restarted under assumptions.
    blocking: Vec<NogoodHandle>,
    /// Last values reported to the propagator: -1 unassigned, 0 false, 1
    /// true. Used to compute the changed bitmap.
    last_reported: Vec<i8>,
    random: SmallRng,
    random_tiebreak: bool,
    exhausted: bool,
    model_count: u64,
}

impl CdnlSolver {
    /// Builds the engine for one ground program: translates the program into
    /// the initial nogood store and prepares the level-0 state.
    pub(crate) fn new(
        registry: &mut Registry,
        program: &GroundProgram,
        options: &SolverOptions,
    ) -> CdnlSolver {
        let translation = completion::translate(registry, program);
        let num_atoms = registry.atoms.len();

        let assignments = Assignments::new(num_atoms);
        let mut store = NogoodStore::new(num_atoms);
        for nogood in translation.nogoods {
            let _ = store.add(nogood, &assignments);
        }

        let relevant_mask: Interpretation = translation.relevant.iter().copied().collect();

        CdnlSolver {
            state: EngineState::Initial,
            assignments,
            store,
            brancher: Brancher::new(
                num_atoms,
                options.activity_decay_interval,
                options.activity_decay_factor,
            ),
            analyser: ResolutionConflictAnalyser,
            restarts: RestartStrategy::new(options.luby_unit),
            statistics: Statistics::default(),
            relevant: translation.relevant,
            relevant_mask,
            edb: program.edb.clone(),
            mask: translation.mask,
            blocking: Vec::new(),
            last_reported: vec![-1; num_atoms],
            random: options.random_generator.clone(),
            random_tiebreak: options.random_tiebreak,
            exhausted: false,
            model_count: 0,
        }
    }

    pub(crate) fn statistics(&self) -> Statistics {
        self.statistics
    }

    pub(crate) fn model_count(&self) -> u64 {
        self.model_count
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Resets to level 0, installs the given literals as level-0 facts, and
    /// marks the search not exhausted. Literals over atoms unknown to this
    /// instance are silently ignored; model-blocking nogoods from earlier
    /// enumeration are dropped.
    pub(crate) fn restart_with_assumptions(&mut self, literals: &[Literal]) {
        self.assignments = Assignments::new(self.assignments.num_atoms());
        for handle in self.blocking.drain(..) {
            self.store.remove(handle);
        }
        self.store.reinitialise(&self.assignments);
        self.last_reported.fill(-1);
        self.exhausted = false;
        self.state = EngineState::Initial;

        for &literal in literals {
            if literal.atom().index() >= self.assignments.num_atoms()
                || !self.relevant_mask.contains(literal.atom())
            {
                continue;
            }
            if self.assignments.is_satisfied(literal) {
                continue;
            }
            if self.assignments.is_falsified(literal) {
                self.exhausted = true;
                self.state = EngineState::End;
                return;
            }
            self.assignments.assign(literal, Reason::Root);
            self.store.on_assign(literal, &self.assignments);
        }
    }

    /// Streams the next model, or `None` when the search space is exhausted,
    /// the termination condition fired, or the program is unsatisfiable.
    pub(crate) fn next_model(
        &mut self,
        termination: &mut dyn TerminationCondition,
        propagator: &mut dyn ExternalPropagator,
        unfounded: &mut dyn UnfoundedSetChecker,
    ) -> Result<Option<Interpretation>, SolveError> {
        loop {
            match self.state {
                EngineState::Initial => {
                    self.install_facts();
                    self.state = EngineState::Propagate;
                }

                EngineState::Propagate => {
                    self.propagate_fixpoint();

                    if termination.should_stop() {
                        debug!("termination requested, finalising");
                        self.state = EngineState::End;
                        return Ok(None);
                    }

                    if self.store.conflict().is_some() {
                        if self.assignments.decision_level() == 0 {
                            self.exhausted = true;
                            self.state = EngineState::End;
                        } else {
                            self.state = EngineState::Analyse;
                        }
                    } else if self.is_total() {
                        if self.check_candidate(propagator, unfounded)? {
                            self.state = EngineState::Model;
                        }
                        // Otherwise new nogoods were installed and the state
                        // machine goes back to propagation.
                    } else {
                        self.state = EngineState::Decide;
                    }
                }

                EngineState::Decide => {
                    self.assignments.increase_decision_level();
                    let random = self.random_tiebreak.then_some(&mut self.random);
                    let decision = self
                        .brancher
                        .next_decision(&self.relevant, &self.assignments, random)
                        .expect("Decide is only entered on partial assignments");
                    debug!(
                        "decision {} at level {}",
                        decision,
                        self.assignments.decision_level()
                    );
                    self.statistics.num_decisions += 1;
                    self.assignments.assign(decision, Reason::Decision);
                    self.store.on_assign(decision, &self.assignments);
                    self.state = EngineState::Propagate;
                }

                EngineState::Analyse => {
                    self.analyse_conflict();
                    if self.state == EngineState::Analyse {
                        self.state = EngineState::Propagate;
                    }
                }

                EngineState::Model => {
                    let model = self.extract_model();
                    self.model_count += 1;
                    self.statistics.num_models += 1;

                    let decisions: Vec<Literal> = self
                        .assignments
                        .trail()
                        .iter()
                        .copied()
                        .filter(|literal| {
                            matches!(
                                self.assignments.reason_of(literal.atom()),
                                Reason::Decision
                            )
                        })
                        .collect();

                    if decisions.is_empty() {
                        // The model is forced at level 0: nothing to flip.
                        self.exhausted = true;
                        self.state = EngineState::End;
                    } else {
                        if let AddResult::Added(handle) =
                            self.store.add(Nogood::new(decisions), &self.assignments)
                        {
                            self.blocking.push(handle);
                        }
                        self.state = EngineState::Propagate;
                    }
                    return Ok(Some(model));
                }

                EngineState::End => return Ok(None),
            }
        }
    }

    fn install_facts(&mut self) {
        for atom in self.edb.iter().collect::<Vec<_>>() {
            if !self.assignments.is_assigned(atom) {
                let literal = Literal::positive(atom);
                self.assignments.assign(literal, Reason::Root);
                self.store.on_assign(literal, &self.assignments);
            }
        }
    }

    /// Processes the FIFO of unit consequences until it drains or a conflict
    /// is reported.
    fn propagate_fixpoint(&mut self) {
        while self.store.conflict().is_none() {
            let Some((to_falsify, handle)) = self.store.pop_unit() else {
                break;
            };
            let to_assign = to_falsify.complement();
            if self.assignments.is_satisfied(to_assign) {
                continue;
            }
            if self.assignments.is_falsified(to_assign) {
                // The queued consequence went stale: the nogood is violated.
                self.store.declare_conflict(handle);
                break;
            }
            self.assignments.assign(to_assign, Reason::Propagated(handle));
            self.statistics.num_propagations += 1;
            self.store.on_assign(to_assign, &self.assignments);
        }

        if self.store.conflict().is_some() {
            self.store.clear_queue();
        }
        hexkin_assert_extreme!(self.store.debug_check_watches(&self.assignments));
    }

    fn is_total(&self) -> bool {
        self.relevant
            .iter()
            .all(|&atom| self.assignments.is_assigned(atom))
    }

    /// Consults the external-atom propagator and the unfounded-set checker on
    /// a total assignment. Returns true when the candidate survived both;
    /// otherwise the injected nogoods take effect before the next decision.
    fn check_candidate(
        &mut self,
        propagator: &mut dyn ExternalPropagator,
        unfounded: &mut dyn UnfoundedSetChecker,
    ) -> Result<bool, SolveError> {
        let interpretation = self.current_interpretation();
        let assigned: Interpretation = self.relevant.iter().copied().collect();
        let changed = self.changed_since_last_report();

        let outcome = propagator.propagate(PropagatorContext {
            interpretation: &interpretation,
            assigned: &assigned,
            changed: &changed,
        })?;

        if !outcome.nogoods.is_empty() || !outcome.is_model {
            for nogood in outcome.nogoods {
                self.add_dynamic_nogood(nogood);
            }
            if self.store.conflict().is_none() && !self.store.has_pending_units() {
                // The injected nogoods (or a rejection without explanation)
                // did not constrain this candidate; block it wholesale to
                // guarantee progress.
                self.block_current_candidate();
            }
            return Ok(false);
        }

        let witness = unfounded.find_unfounded_set(&interpretation);
        if !witness.is_empty() {
            debug!("unfounded set of {} atom(s), adding loop nogood", witness.count());
            let nogood = unfounded.loop_nogood(&interpretation, &witness);
            self.add_dynamic_nogood(nogood);
            if self.store.conflict().is_none() && !self.store.has_pending_units() {
                self.block_current_candidate();
            }
            return Ok(false);
        }

        Ok(true)
    }

    fn add_dynamic_nogood(&mut self, nogood: Nogood) {
        if let Some(max_atom) = nogood.iter().map(|literal| literal.atom().index()).max() {
            if max_atom >= self.assignments.num_atoms() {
                self.grow(max_atom + 1);
            }
        }
        self.statistics.num_learned_nogoods += 1;
        let _ = self.store.add(nogood, &self.assignments);
    }

    fn block_current_candidate(&mut self) {
        let decisions: Vec<Literal> = self
            .assignments
            .trail()
            .iter()
            .copied()
            .filter(|literal| {
                matches!(self.assignments.reason_of(literal.atom()), Reason::Decision)
            })
            .collect();
        if decisions.is_empty() {
            self.exhausted = true;
            self.state = EngineState::End;
        } else {
            let _ = self.store.add(Nogood::new(decisions), &self.assignments);
        }
    }

    /// 1-UIP learning followed by back-jumping and, when the Luby counter
    /// fires, a restart to level 0 that keeps learned nogoods and activities.
    fn analyse_conflict(&mut self) {
        let handle = self.store.conflict().expect("Analyse requires a conflict");
        let conflict = self.store.get(handle).clone();
        self.statistics.num_conflicts += 1;

        let conflict_level = conflict
            .iter()
            .map(|literal| self.assignments.level_of(literal.atom()))
            .max()
            .unwrap_or(0);
        if conflict_level == 0 {
            self.exhausted = true;
            self.state = EngineState::End;
            return;
        }
        if conflict_level < self.assignments.decision_level() {
            self.backtrack(conflict_level);
        }

        let result =
            self.analyser
                .compute_1uip(&conflict, &self.assignments, &self.store, &mut self.brancher);
        hexkin_assert_moderate!(result.backjump_level < conflict_level);
        debug!(
            "learned {} with UIP {}, back-jumping to level {}",
            result.learned, result.uip, result.backjump_level
        );

        self.store.clear_conflict();
        self.store.clear_queue();
        self.brancher.on_conflict();

        let restart = self.restarts.on_conflict();
        let target = if restart {
            self.statistics.num_restarts += 1;
            0
        } else {
            result.backjump_level
        };
        self.backtrack(target);

        self.statistics.num_learned_nogoods += 1;
        let _ = self.store.add(result.learned, &self.assignments);
    }

    fn backtrack(&mut self, level: u32) {
        if level >= self.assignments.decision_level() {
            return;
        }
        let brancher = &mut self.brancher;
        self.assignments
            .backtrack_to(level, |atom, value| brancher.on_unassign(atom, value));
    }

    fn current_interpretation(&self) -> Interpretation {
        self.relevant
            .iter()
            .copied()
            .filter(|&atom| self.assignments.value(atom) == Some(true))
            .collect()
    }

    fn changed_since_last_report(&mut self) -> Interpretation {
        let mut changed = Interpretation::new();
        for &atom in &self.relevant {
            let current = match self.assignments.value(atom) {
                None => -1,
                Some(false) => 0,
                Some(true) => 1,
            };
            if self.last_reported[atom.index()] != current {
                let _ = changed.insert(atom);
                self.last_reported[atom.index()] = current;
            }
        }
        changed
    }

    /// Emitted models are always projected: `model \ mask`.
    fn extract_model(&self) -> Interpretation {
        let mut model = self.current_interpretation();
        model.difference_with(&self.mask);
        model
    }

    fn grow(&mut self, num_atoms: usize) {
        self.assignments.grow(num_atoms);
        self.store.grow(num_atoms);
        self.brancher.grow(num_atoms);
        if num_atoms > self.last_reported.len() {
            self.last_reported.resize(num_atoms, -1);
        }
    }
}
