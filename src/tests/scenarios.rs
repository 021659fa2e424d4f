//! End-to-end scenarios over the full pipeline: reader, rewriter, grounder,
//! CDNL engine, external-atom verification, and the MLP orchestrator.

use super::helpers::plain;
use super::helpers::plain_models;
use super::helpers::solve;
use super::helpers::solve_with;
use super::helpers::strings;
use crate::mlp::EngineChoice;
use crate::options::SolverOptions;
use crate::results::SolveError;

#[test]
fn two_atom_choice_yields_both_models_in_order() {
    let answers = solve("a :- not b. b :- not a.").expect("solves");
    assert_eq!(
        plain_models(&answers),
        vec![strings(&["a"]), strings(&["b"])]
    );
}

#[test]
fn disjunctive_head_yields_two_minimal_models() {
    let answers = solve("a v b.").expect("solves");
    assert_eq!(
        plain_models(&answers),
        vec![strings(&["a"]), strings(&["b"])]
    );
}

#[test]
fn disjunctive_head_with_dependent_rule_keeps_the_same_models() {
    let answers = solve("a v b. c :- a, b.").expect("solves");
    assert_eq!(
        plain_models(&answers),
        vec![strings(&["a"]), strings(&["b"])]
    );
}

#[test]
fn constraint_prunes_one_disjunct() {
    let answers = solve("a v b. :- a.").expect("solves");
    assert_eq!(plain_models(&answers), vec![strings(&["b"])]);
}

#[test]
fn external_count_binds_the_output() {
    let answers = solve("item(1). item(2). n(N) :- &count[item](N).").expect("solves");
    assert_eq!(
        plain_models(&answers),
        vec![strings(&["item(1)", "item(2)", "n(2)"])]
    );
}

#[test]
fn external_count_agrees_between_engines() {
    let source = "item(1). item(2). n(N) :- &count[item](N).";
    let cdnl = solve(source).expect("cdnl solves");
    let naive = solve_with(source, EngineChoice::Naive, SolverOptions::default())
        .expect("naive solves");

    let mut cdnl = plain_models(&cdnl);
    let mut naive = plain_models(&naive);
    cdnl.sort();
    naive.sort();
    assert_eq!(cdnl, naive);
}

#[test]
fn module_call_propagates_the_output_atom() {
    let answers = solve(
        "#module(p1, []). q(1). \
         #module(main, []). r(X) :- @p1[]::q(X).",
    )
    .expect("solves");

    // Both modules have an empty input list, so both are main modules and
    // each is enumerated: first p1 on its own, then main with its call.
    assert_eq!(answers.len(), 2);

    let main_answer = &answers[1];
    assert!(
        main_answer.iter().any(|atom| plain(atom) == "r(1)"),
        "expected the prefixed r(1) in {main_answer:?}"
    );
    assert!(
        main_answer
            .iter()
            .any(|atom| atom.contains("p1") && plain(atom) == "q(1)"),
        "expected the sub-instance q(1) in {main_answer:?}"
    );
}

#[test]
fn module_call_with_input_restricts_and_renames() {
    let answers = solve(
        "#module(p1, [q/1]). r(X) :- q(X). \
         #module(main, []). s(1). s(2). out(X) :- @p1[s]::r(X).",
    )
    .expect("solves");

    assert_eq!(answers.len(), 1);
    let answer = plain_models(&answers);
    assert!(answer[0].contains(&"out(1)".to_owned()));
    assert!(answer[0].contains(&"out(2)".to_owned()));
}

#[test]
fn non_i_stratified_call_is_reported() {
    let result = solve(
        "#module(p1, [q/1]). r(X) :- q(X). \
         #module(main, []). p(X) :- @p1[p]::r(X).",
    );
    assert!(
        matches!(result, Err(SolveError::Stratification(_))),
        "expected a stratification error, got {result:?}"
    );
}

#[test]
fn choice_feeding_a_module_call_enumerates_both_instantiations() {
    let answers = solve(
        "#module(p1, [q/1]). r(X) :- q(X). \
         #module(main, []). a(1) :- not b(1). b(1) :- not a(1). out(X) :- @p1[a]::r(X).",
    )
    .expect("solves");

    let plains = plain_models(&answers);
    assert_eq!(plains.len(), 2);
    assert!(plains
        .iter()
        .any(|answer| answer.contains(&"a(1)".to_owned())
            && answer.contains(&"out(1)".to_owned())));
    assert!(plains
        .iter()
        .any(|answer| answer.contains(&"b(1)".to_owned())
            && !answer.contains(&"out(1)".to_owned())));
}

#[test]
fn unsatisfiable_program_has_no_answer_sets() {
    let answers = solve("a :- not a.").expect("solve finishes");
    assert!(answers.is_empty());
}

#[test]
fn positive_loop_without_support_stays_false() {
    let answers = solve("p :- q. q :- p. r.").expect("solves");
    assert_eq!(plain_models(&answers), vec![strings(&["r"])]);
}

#[test]
fn max_models_truncates_enumeration() {
    let options = SolverOptions {
        max_models: Some(1),
        ..SolverOptions::default()
    };
    let answers =
        solve_with("a :- not b. b :- not a.", EngineChoice::Cdnl, options).expect("solves");
    assert_eq!(answers.len(), 1);
}

#[test]
fn enumeration_order_is_reproducible() {
    let source = "a :- not b. b :- not a. c v d :- a. :- c, b.";
    let first = solve(source).expect("solves");
    let second = solve(source).expect("solves");
    assert_eq!(first, second);
}

#[test]
fn engines_agree_on_a_mixed_program() {
    let source = "a :- not b. b :- not a. c v d :- a. :- c, b. e :- d.";
    let cdnl = solve(source).expect("cdnl solves");
    let naive =
        solve_with(source, EngineChoice::Naive, SolverOptions::default()).expect("naive solves");

    let mut cdnl = plain_models(&cdnl);
    let mut naive = plain_models(&naive);
    cdnl.sort();
    naive.sort();
    assert_eq!(cdnl, naive);
}

#[test]
fn member_plugin_projects_the_extension() {
    let answers =
        solve("s(a). s(b). picked(X) :- &member[s](X).").expect("solves");
    let plains = plain_models(&answers);
    assert_eq!(plains.len(), 1);
    assert!(plains[0].contains(&"picked(a)".to_owned()));
    assert!(plains[0].contains(&"picked(b)".to_owned()));
}
