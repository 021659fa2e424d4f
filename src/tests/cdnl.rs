//! Engine-level tests driving [`CdnlSolver`] directly on hand-built ground
//! programs.

use enumset::EnumSet;

use crate::basic_types::AtomId;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::engine::cdnl_solver::CdnlSolver;
use crate::engine::propagation::FixpointUnfoundedSetChecker;
use crate::engine::propagation::NullPropagator;
use crate::engine::termination::Cancellation;
use crate::engine::termination::Indefinite;
use crate::options::SolverOptions;
use crate::program::GroundProgram;
use crate::program::GroundRule;
use crate::program::RuleFlag;
use crate::registry::Registry;

struct Fixture {
    registry: Registry,
    program: GroundProgram,
}

impl Fixture {
    fn new(names: &[&str]) -> (Fixture, Vec<AtomId>) {
        let mut registry = Registry::new();
        let atoms = names
            .iter()
            .map(|name| {
                let symbol = registry.symbols.intern(name);
                registry.atoms.intern(vec![symbol])
            })
            .collect();
        (
            Fixture {
                registry,
                program: GroundProgram::default(),
            },
            atoms,
        )
    }

    fn fact(&mut self, atom: AtomId) {
        let _ = self.program.edb.insert(atom);
    }

    fn rule(&mut self, head: Vec<AtomId>, body: Vec<Literal>) {
        let mut flags = EnumSet::empty();
        if head.is_empty() {
            flags |= RuleFlag::Constraint;
        }
        self.program.idb.push(GroundRule {
            head,
            body,
            flags,
            weight: None,
        });
    }

    fn enumerate(&mut self) -> Vec<Interpretation> {
        let options = SolverOptions::default();
        let mut solver = CdnlSolver::new(&mut self.registry, &self.program, &options);
        let mut unfounded =
            FixpointUnfoundedSetChecker::new(&self.program, Interpretation::new());
        let mut models = Vec::new();
        while let Some(model) = solver
            .next_model(&mut Indefinite, &mut NullPropagator, &mut unfounded)
            .expect("no plugin involved")
        {
            models.push(model);
        }
        models
    }
}

#[test]
fn facts_alone_give_one_model() {
    let (mut fixture, atoms) = Fixture::new(&["a", "b"]);
    fixture.fact(atoms[0]);

    let models = fixture.enumerate();
    assert_eq!(models.len(), 1);
    assert!(models[0].contains(atoms[0]));
    assert!(!models[0].contains(atoms[1]));
}

#[test]
fn choice_enumerates_exactly_two_models() {
    let (mut fixture, atoms) = Fixture::new(&["a", "b"]);
    let (a, b) = (atoms[0], atoms[1]);
    fixture.rule(vec![a], vec![Literal::negative(b)]);
    fixture.rule(vec![b], vec![Literal::negative(a)]);

    let models = fixture.enumerate();
    assert_eq!(models.len(), 2);
    // Default phase decides positively, so the model containing a comes
    // first.
    assert!(models[0].contains(a));
    assert!(models[1].contains(b));
}

#[test]
fn constraint_removes_a_model() {
    let (mut fixture, atoms) = Fixture::new(&["a", "b"]);
    let (a, b) = (atoms[0], atoms[1]);
    fixture.rule(vec![a], vec![Literal::negative(b)]);
    fixture.rule(vec![b], vec![Literal::negative(a)]);
    fixture.rule(vec![], vec![Literal::positive(a)]);

    let models = fixture.enumerate();
    assert_eq!(models.len(), 1);
    assert!(models[0].contains(b));
}

#[test]
fn model_count_and_statistics_are_tracked() {
    let (mut fixture, atoms) = Fixture::new(&["a", "b"]);
    let (a, b) = (atoms[0], atoms[1]);
    fixture.rule(vec![a], vec![Literal::negative(b)]);
    fixture.rule(vec![b], vec![Literal::negative(a)]);

    let options = SolverOptions::default();
    let mut solver = CdnlSolver::new(&mut fixture.registry, &fixture.program, &options);
    let mut unfounded =
        FixpointUnfoundedSetChecker::new(&fixture.program, Interpretation::new());
    while solver
        .next_model(&mut Indefinite, &mut NullPropagator, &mut unfounded)
        .expect("solves")
        .is_some()
    {}

    assert_eq!(solver.model_count(), 2);
    assert!(solver.is_exhausted());
    let statistics = solver.statistics();
    assert_eq!(statistics.num_models, 2);
    assert!(statistics.num_decisions >= 1);
}

#[test]
fn assumptions_restrict_and_restart_resets() {
    let (mut fixture, atoms) = Fixture::new(&["a", "b"]);
    let (a, b) = (atoms[0], atoms[1]);
    fixture.rule(vec![a], vec![Literal::negative(b)]);
    fixture.rule(vec![b], vec![Literal::negative(a)]);

    let options = SolverOptions::default();
    let mut solver = CdnlSolver::new(&mut fixture.registry, &fixture.program, &options);
    let mut unfounded =
        FixpointUnfoundedSetChecker::new(&fixture.program, Interpretation::new());

    solver.restart_with_assumptions(&[Literal::negative(a)]);
    let model = solver
        .next_model(&mut Indefinite, &mut NullPropagator, &mut unfounded)
        .expect("solves")
        .expect("one model under the assumption");
    assert!(model.contains(b));
    assert!(solver
        .next_model(&mut Indefinite, &mut NullPropagator, &mut unfounded)
        .expect("solves")
        .is_none());

    // Dropping the assumption restores the full model count, including the
    // model excluded before.
    solver.restart_with_assumptions(&[]);
    let mut models = Vec::new();
    while let Some(model) = solver
        .next_model(&mut Indefinite, &mut NullPropagator, &mut unfounded)
        .expect("solves")
    {
        models.push(model);
    }
    assert_eq!(models.len(), 2);
}

#[test]
fn unmappable_assumptions_are_ignored() {
    let (mut fixture, atoms) = Fixture::new(&["a"]);
    let a = atoms[0];
    fixture.fact(a);

    let options = SolverOptions::default();
    let mut solver = CdnlSolver::new(&mut fixture.registry, &fixture.program, &options);
    let mut unfounded =
        FixpointUnfoundedSetChecker::new(&fixture.program, Interpretation::new());

    solver.restart_with_assumptions(&[Literal::positive(AtomId(4096))]);
    let model = solver
        .next_model(&mut Indefinite, &mut NullPropagator, &mut unfounded)
        .expect("solves");
    assert!(model.is_some());
}

#[test]
fn cancellation_finalises_cleanly() {
    let (mut fixture, atoms) = Fixture::new(&["a", "b"]);
    let (a, b) = (atoms[0], atoms[1]);
    fixture.rule(vec![a], vec![Literal::negative(b)]);
    fixture.rule(vec![b], vec![Literal::negative(a)]);

    let options = SolverOptions::default();
    let mut solver = CdnlSolver::new(&mut fixture.registry, &fixture.program, &options);
    let mut unfounded =
        FixpointUnfoundedSetChecker::new(&fixture.program, Interpretation::new());

    let cancellation = Cancellation::new();
    cancellation.cancel();
    let mut handle = cancellation.clone();
    let model = solver
        .next_model(&mut handle, &mut NullPropagator, &mut unfounded)
        .expect("no error on cancellation");
    assert!(model.is_none());
}

#[test]
fn conflicting_facts_make_the_program_infeasible() {
    let (mut fixture, atoms) = Fixture::new(&["a"]);
    let a = atoms[0];
    fixture.fact(a);
    fixture.rule(vec![], vec![Literal::positive(a)]);

    let models = fixture.enumerate();
    assert!(models.is_empty());
}
