//! External-atom evaluation and candidate verification.
//!
//! Evaluating one external atom projects the assignment to the atom's
//! predicate-input mask, queries the plugin once per input tuple, and checks
//! every answer tuple against the declared output pattern. Results are cached
//! by (external atom, projected interpretation, input tuple) unless caching
//! is disabled.
//!
//! Verification compares, for every external occurrence, the guessed
//! replacement atoms bit-for-bit with what the plugin returns. A disagreement
//! yields a nogood of the literals that justified the guess plus the
//! mismatched replacement atom with flipped sign.

use fnv::FnvHashMap;
use fnv::FnvHashSet;
use log::warn;

use super::propagator::ExternalPropagator;
use super::propagator::PropagationOutcome;
use super::propagator::PropagatorContext;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::basic_types::Nogood;
use crate::plugins::InputKind;
use crate::plugins::PluginQuery;
use crate::plugins::PluginRegistry;
use crate::program::AnnotatedGroundProgram;
use crate::program::Term;
use crate::registry::ExternalAtomId;
use crate::registry::Registry;
use crate::registry::SymbolId;
use crate::results::SolveError;

type CacheKey = (ExternalAtomId, Interpretation, Vec<SymbolId>);

/// Evaluates external atoms against plugins, with a query cache shared
/// across all sub-solves of one MLP run.
#[derive(Debug, Default)]
pub(crate) struct ExternalAtomEvaluator {
    cache: FnvHashMap<CacheKey, Vec<Vec<SymbolId>>>,
    cache_enabled: bool,
    pub(crate) num_queries: u64,
    pub(crate) num_cache_hits: u64,
}

impl ExternalAtomEvaluator {
    pub(crate) fn new(cache_enabled: bool) -> ExternalAtomEvaluator {
        ExternalAtomEvaluator {
            cache_enabled,
            ..ExternalAtomEvaluator::default()
        }
    }

    /// The set of output tuples of `external` under `interpretation`.
    pub(crate) fn evaluate(
        &mut self,
        registry: &mut Registry,
        plugins: &PluginRegistry,
        external: ExternalAtomId,
        interpretation: &Interpretation,
    ) -> Result<Vec<Vec<SymbolId>>, SolveError> {
        let eatom = registry.external_atom(external).clone();
        let name = registry.symbols.resolve(eatom.name).to_owned();

        let plugin = plugins
            .get(&name)
            .ok_or_else(|| plugin_error(&name, "no plugin implements this predicate"))?;
        if plugin.input_kinds().len() != eatom.inputs.len() {
            return Err(plugin_error(
                &name,
                format!(
                    "expects {} input(s), got {}",
                    plugin.input_kinds().len(),
                    eatom.inputs.len()
                ),
            ));
        }
        if plugin.output_arity() != eatom.output.len() {
            return Err(plugin_error(
                &name,
                format!(
                    "expects {} output position(s), got {}",
                    plugin.output_arity(),
                    eatom.output.len()
                ),
            ));
        }

        let projected = project_to_input_mask(registry, &eatom.inputs, plugin.input_kinds(), interpretation);

        let key = (external, projected.clone(), eatom.inputs.clone());
        if self.cache_enabled {
            if let Some(cached) = self.cache.get(&key) {
                self.num_cache_hits += 1;
                return Ok(cached.clone());
            }
        }
        self.num_queries += 1;

        let pattern: Vec<Option<SymbolId>> = eatom
            .output
            .iter()
            .map(|term| match term {
                Term::Constant(symbol) => Some(*symbol),
                Term::Variable(_) => None,
            })
            .collect();

        let answers = plugin
            .retrieve(PluginQuery {
                interpretation: &projected,
                input: &eatom.inputs,
                output_pattern: &pattern,
                atoms: &registry.atoms,
                symbols: &mut registry.symbols,
            })
            .map_err(|failure| plugin_error(&name, failure.message))?;

        let mut tuples: Vec<Vec<SymbolId>> = Vec::with_capacity(answers.len());
        let mut seen = FnvHashSet::default();
        for tuple in answers {
            if tuple.len() != plugin.output_arity() {
                return Err(plugin_error(
                    &name,
                    format!(
                        "answer tuple has arity {}, declared output arity is {}",
                        tuple.len(),
                        plugin.output_arity()
                    ),
                ));
            }
            let unifies = pattern
                .iter()
                .zip(&tuple)
                .all(|(expected, &actual)| expected.map_or(true, |symbol| symbol == actual));
            if !unifies {
                warn!(
                    "&{name}: answer tuple does not unify with the output pattern, dropped"
                );
                continue;
            }
            if seen.insert(tuple.clone()) {
                tuples.push(tuple);
            }
        }
        tuples.sort();

        if self.cache_enabled {
            let _ = self.cache.insert(key, tuples.clone());
        }
        Ok(tuples)
    }
}

/// The atoms of `interpretation` whose predicate symbol is declared as a
/// `predicate`-kind input of the external atom.
fn project_to_input_mask(
    registry: &Registry,
    inputs: &[SymbolId],
    kinds: &[InputKind],
    interpretation: &Interpretation,
) -> Interpretation {
    let predicates: FnvHashSet<SymbolId> = inputs
        .iter()
        .zip(kinds)
        .filter(|(_, kind)| matches!(kind, InputKind::Predicate))
        .map(|(&symbol, _)| symbol)
        .collect();

    interpretation
        .iter()
        .filter(|&atom| predicates.contains(&registry.atoms.predicate(atom)))
        .collect()
}

fn plugin_error(predicate: &str, message: impl Into<String>) -> SolveError {
    SolveError::Plugin {
        predicate: predicate.to_owned(),
        message: message.into(),
    }
}

/// One external occurrence shared by all its replacement atoms: the external
/// atom with one ground input tuple, and the guessed output tuples.
#[derive(Debug)]
struct ExternalGroup {
    external: ExternalAtomId,
    /// Predicate symbols of the `predicate`-kind inputs; the atoms matching
    /// them justify the guess in mismatch nogoods.
    input_predicates: Vec<SymbolId>,
    /// (output tuple, replacement atom) pairs guessed by the program.
    members: Vec<(Vec<SymbolId>, crate::basic_types::AtomId)>,
}

/// The propagator for programs with external atoms: verifies every guess
/// against the plugins and turns disagreements into nogoods.
#[derive(Debug)]
pub(crate) struct VerificationPropagator<'a> {
    registry: &'a mut Registry,
    plugins: &'a PluginRegistry,
    evaluator: &'a mut ExternalAtomEvaluator,
    groups: Vec<ExternalGroup>,
}

impl<'a> VerificationPropagator<'a> {
    pub(crate) fn new(
        registry: &'a mut Registry,
        plugins: &'a PluginRegistry,
        evaluator: &'a mut ExternalAtomEvaluator,
        annotated: &AnnotatedGroundProgram,
    ) -> Result<VerificationPropagator<'a>, SolveError> {
        let mut grouped: FnvHashMap<(ExternalAtomId, Vec<SymbolId>), ExternalGroup> =
            FnvHashMap::default();

        for (&replacement, instance) in &annotated.replacements {
            let key = (instance.external, instance.input.clone());
            if !grouped.contains_key(&key) {
                let eatom = registry.external_atom(instance.external);
                let name = registry.symbols.resolve(eatom.name).to_owned();
                let plugin = plugins
                    .get(&name)
                    .ok_or_else(|| plugin_error(&name, "no plugin implements this predicate"))?;
                let input_predicates = eatom
                    .inputs
                    .iter()
                    .zip(plugin.input_kinds())
                    .filter(|(_, kind)| matches!(kind, InputKind::Predicate))
                    .map(|(&symbol, _)| symbol)
                    .collect();
                let _ = grouped.insert(
                    key.clone(),
                    ExternalGroup {
                        external: instance.external,
                        input_predicates,
                        members: Vec::new(),
                    },
                );
            }
            grouped
                .get_mut(&key)
                .expect("inserted above")
                .members
                .push((instance.output.clone(), replacement));
        }

        let mut groups: Vec<ExternalGroup> = grouped.into_values().collect();
        groups.sort_by_key(|group| group.external.0);
        for group in &mut groups {
            group.members.sort();
        }

        Ok(VerificationPropagator {
            registry,
            plugins,
            evaluator,
            groups,
        })
    }

    /// The literals justifying the guess of one group: every assigned atom of
    /// the group's predicate-input mask, with its current polarity.
    fn input_literals(&self, group: &ExternalGroup, context: &PropagatorContext<'_>) -> Vec<Literal> {
        context
            .assigned
            .iter()
            .filter(|&atom| {
                group
                    .input_predicates
                    .contains(&self.registry.atoms.predicate(atom))
            })
            .map(|atom| Literal::new(atom, !context.interpretation.contains(atom)))
            .collect()
    }
}

impl ExternalPropagator for VerificationPropagator<'_> {
    fn propagate(
        &mut self,
        context: PropagatorContext<'_>,
    ) -> Result<PropagationOutcome, SolveError> {
        let mut nogoods = Vec::new();

        for index in 0..self.groups.len() {
            let actual = self.evaluator.evaluate(
                self.registry,
                self.plugins,
                self.groups[index].external,
                context.interpretation,
            )?;
            let actual_set: FnvHashSet<&Vec<SymbolId>> = actual.iter().collect();

            let group = &self.groups[index];
            let justification = self.input_literals(group, &context);

            let mut known: FnvHashSet<&Vec<SymbolId>> = FnvHashSet::default();
            for (output, replacement) in &group.members {
                let _ = known.insert(output);
                let guessed = context.interpretation.contains(*replacement);
                let is_actual = actual_set.contains(output);
                if guessed != is_actual {
                    let mut literals = justification.clone();
                    literals.push(Literal::new(*replacement, is_actual));
                    nogoods.push(Nogood::new(literals));
                }
            }

            // An answer tuple the instantiation never saw cannot be
            // represented by this ground program; candidates with this input
            // extension are rejected outright.
            for output in &actual {
                if !known.contains(output) {
                    warn!(
                        "external atom produced an uninstantiated output tuple; \
                         rejecting candidates with this input extension"
                    );
                    nogoods.push(Nogood::new(justification.clone()));
                    break;
                }
            }
        }

        let is_model = nogoods.is_empty();
        Ok(PropagationOutcome { nogoods, is_model })
    }
}
