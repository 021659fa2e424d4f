//! Tests of the MLP machinery: instance renaming, restriction/renaming of
//! input interpretations, value-call cycles, and the flag-bitmap invariant.

use super::helpers::plain;
use super::helpers::solve;
use super::helpers::solve_with;
use crate::basic_types::Interpretation;
use crate::engine::termination::Indefinite;
use crate::mlp::EngineChoice;
use crate::mlp::InstanceId;
use crate::mlp::MlpSolver;
use crate::mlp::rewriter;
use crate::options::SolverOptions;
use crate::parsing::ProgramReader;
use crate::plugins::register_builtin_plugins;
use crate::plugins::PluginRegistry;
use crate::registry::Registry;
use crate::results::SolveError;

#[test]
fn predicate_renaming_is_idempotent_per_instance() {
    let mut registry = Registry::new();
    let predicate = registry.symbols.intern("p1\u{b7}q");

    let first = rewriter::rename_predicate(&mut registry, InstanceId(3), predicate);
    let second = rewriter::rename_predicate(&mut registry, InstanceId(3), predicate);
    assert_eq!(first, second);
    assert_eq!(registry.symbols.resolve(first), "m3\u{b7}p1\u{b7}q");

    let other = rewriter::rename_predicate(&mut registry, InstanceId(4), predicate);
    assert_ne!(first, other);
}

#[test]
fn restriction_and_renaming_matches_positionally() {
    let mut registry = Registry::new();
    let s = registry.symbols.intern("main\u{b7}s");
    let t = registry.symbols.intern("main\u{b7}t");
    let q = registry.symbols.intern("p1\u{b7}q");
    let r = registry.symbols.intern("p1\u{b7}r");
    let one = registry.symbols.intern("1");

    let mut interpretation = Interpretation::new();
    let s1 = registry.atoms.intern(vec![s, one]);
    let t1 = registry.atoms.intern(vec![t, one]);
    let _ = interpretation.insert(s1);
    let _ = interpretation.insert(t1);

    let (restricted, renamed) =
        rewriter::restriction_and_renaming(&mut registry, &interpretation, &[s], &[q]);

    assert!(restricted.contains(s1));
    assert!(!restricted.contains(t1));
    let expected = registry.atoms.lookup(&[q, one]).expect("renamed atom");
    assert!(renamed.contains(expected));
    assert!(registry.atoms.lookup(&[r, one]).is_none());
}

#[test]
fn flag_bitmaps_of_different_instances_are_disjoint() {
    let mut plugins = PluginRegistry::new();
    register_builtin_plugins(&mut plugins);
    let mut registry = Registry::new();
    ProgramReader::new(&plugins)
        .load(
            &mut registry,
            "#module(p1, [q/1]). r(X) :- q(X). \
             #module(main, []). s(1). s(2). out(X) :- @p1[s]::r(X).",
        )
        .expect("parses");

    let mut solver = MlpSolver::new(&mut registry, &plugins, SolverOptions::default());
    let count = solver.solve(&mut Indefinite, |_, _| {}).expect("solves");
    assert_eq!(count, 1);

    let flags: Vec<&Interpretation> = solver.instance_tables().mflags().collect();
    for (index, left) in flags.iter().enumerate() {
        for &right in &flags[index + 1..] {
            assert!(
                left.is_disjoint(right),
                "instance flag bitmaps must not overlap"
            );
        }
    }
}

#[test]
fn empty_input_call_cycle_is_collapsed_and_solved() {
    let answers = solve(
        "#module(p1, []). a(1). q(X) :- @p2[]::r(X). \
         #module(p2, []). r(X) :- @p1[]::q(X).",
    )
    .expect("an empty-input cycle is collapsed into a joint call");

    // Both modules are main modules, so each is enumerated once; the mutual
    // recursion is unfounded and stays false.
    assert_eq!(answers.len(), 2);
    assert!(answers[0].iter().any(|atom| plain(atom) == "a(1)"));
    assert!(!answers[0].iter().any(|atom| plain(atom) == "q(1)"));
}

const NONEMPTY_CYCLE: &str = "#module(p1, [q/1]). s(1). a(X) :- @p2[s]::b(X). \
                              #module(p2, [t/1]). b(X) :- @p1[t]::a(X). \
                              #module(main, []). u(1). go(X) :- @p1[u]::a(X).";

#[test]
fn nonempty_cycle_is_rejected_by_default() {
    let result = solve(NONEMPTY_CYCLE);
    assert!(
        matches!(result, Err(SolveError::Stratification(_))),
        "expected the conservative cycle check to fire, got {result:?}"
    );
}

#[test]
fn nonempty_cycle_is_unioned_when_permissive() {
    let options = SolverOptions {
        reject_nonempty_cycles: false,
        ..SolverOptions::default()
    };
    let answers =
        solve_with(NONEMPTY_CYCLE, EngineChoice::Cdnl, options).expect("permissive mode unions");
    assert_eq!(answers.len(), 1);
    assert!(answers[0].iter().any(|atom| plain(atom) == "u(1)"));
    assert!(!answers[0].iter().any(|atom| plain(atom) == "go(1)"));
}

#[test]
fn call_graph_records_expansion_edges() {
    let mut plugins = PluginRegistry::new();
    register_builtin_plugins(&mut plugins);
    let mut registry = Registry::new();
    ProgramReader::new(&plugins)
        .load(
            &mut registry,
            "#module(p1, [q/1]). r(X) :- q(X). \
             #module(main, []). s(1). out(X) :- @p1[s]::r(X).",
        )
        .expect("parses");

    let mut solver = MlpSolver::new(&mut registry, &plugins, SolverOptions::default());
    let _ = solver.solve(&mut Indefinite, |_, _| {}).expect("solves");

    let dot = solver.call_graph_dot();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("->"), "expected at least one call edge: {dot}");
}

#[test]
fn statistics_count_module_instantiations() {
    let mut plugins = PluginRegistry::new();
    register_builtin_plugins(&mut plugins);
    let mut registry = Registry::new();
    ProgramReader::new(&plugins)
        .load(
            &mut registry,
            "#module(p1, [q/1]). r(X) :- q(X). \
             #module(main, []). s(1). out(X) :- @p1[s]::r(X).",
        )
        .expect("parses");

    let mut solver = MlpSolver::new(&mut registry, &plugins, SolverOptions::default());
    let _ = solver.solve(&mut Indefinite, |_, _| {}).expect("solves");

    // The main instance plus the called p1 instance.
    assert!(solver.statistics().num_module_instantiations >= 2);
}
