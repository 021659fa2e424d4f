use crate::engine::termination::Indefinite;
use crate::mlp::EngineChoice;
use crate::mlp::MlpSolver;
use crate::options::SolverOptions;
use crate::parsing::ProgramReader;
use crate::plugins::register_builtin_plugins;
use crate::plugins::PluginRegistry;
use crate::registry::Registry;
use crate::registry::INSTANCE_SEPARATOR;
use crate::results::SolveError;

/// Solves a program text and returns its answer sets, in emission order.
/// Every answer set is rendered as a sorted list of atom texts.
pub(crate) fn solve(source: &str) -> Result<Vec<Vec<String>>, SolveError> {
    solve_with(source, EngineChoice::Cdnl, SolverOptions::default())
}

pub(crate) fn solve_with(
    source: &str,
    engine: EngineChoice,
    options: SolverOptions,
) -> Result<Vec<Vec<String>>, SolveError> {
    let mut plugins = PluginRegistry::new();
    register_builtin_plugins(&mut plugins);

    let mut registry = Registry::new();
    ProgramReader::new(&plugins).load(&mut registry, source)?;

    let mut answers = Vec::new();
    let mut solver = MlpSolver::new(&mut registry, &plugins, options).with_engine(engine);
    let _ = solver.solve(&mut Indefinite, |registry, answer| {
        let mut atoms: Vec<String> = answer
            .interpretation
            .iter()
            .map(|atom| registry.atom_text(atom))
            .collect();
        atoms.sort();
        answers.push(atoms);
    })?;
    Ok(answers)
}

/// Strips the instance and module qualifiers from a rendered atom:
/// `m0·main·q(1)` becomes `q(1)`.
pub(crate) fn plain(atom: &str) -> String {
    atom.rsplit(INSTANCE_SEPARATOR)
        .next()
        .unwrap_or(atom)
        .to_owned()
}

/// Answer sets with qualifiers stripped, preserving emission order.
pub(crate) fn plain_models(answers: &[Vec<String>]) -> Vec<Vec<String>> {
    answers
        .iter()
        .map(|answer| {
            let mut atoms: Vec<String> = answer.iter().map(|atom| plain(atom)).collect();
            atoms.sort();
            atoms
        })
        .collect()
}

pub(crate) fn strings(atoms: &[&str]) -> Vec<String> {
    atoms.iter().map(|&atom| atom.to_owned()).collect()
}
