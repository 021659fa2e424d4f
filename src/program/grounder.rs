use enumset::EnumSet;
use fnv::FnvHashMap;
use fnv::FnvHashSet;
use log::debug;

use super::AnnotatedGroundProgram;
use super::AtomPattern;
use super::ExternalInstance;
use super::GroundProgram;
use super::GroundRule;
use super::Rule;
use super::RuleBodyLiteral;
use super::Term;
use crate::basic_types::AtomId;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::engine::propagation::ExternalAtomEvaluator;
use crate::registry::AtomFlag;
use crate::registry::Registry;
use crate::registry::SymbolId;
use crate::results::SolveError;

/// Instantiation is bounded to guard against plugins which keep inventing
/// fresh constants; a program that has not reached a fixpoint by then is
/// reported instead of looping forever.
const MAX_ROUNDS: usize = 4096;

/// Mutable state threaded through one grounding run.
#[derive(Debug)]
pub(crate) struct GroundingContext<'a> {
    pub(crate) registry: &'a mut Registry,
    pub(crate) plugins: &'a crate::plugins::PluginRegistry,
    pub(crate) evaluator: &'a mut ExternalAtomEvaluator,
}

type Binding = FnvHashMap<SymbolId, SymbolId>;

/// Instantiates `rules` over the constants reachable from `edb`, replacing
/// external atoms by guessed replacement atoms.
///
/// The rule set must be ordinary with respect to module atoms; module atoms
/// are replaced by the MLP rewriter before a program reaches the grounder.
/// External candidate tuples are discovered against the growing potential
/// universe, so the guesses cover every tuple derivable from atoms the
/// program can make true; the verification propagator rejects any candidate
/// whose actual plugin output escapes this set.
pub(crate) fn ground(
    context: &mut GroundingContext<'_>,
    edb: &Interpretation,
    rules: &[Rule],
) -> Result<AnnotatedGroundProgram, SolveError> {
    let mut state = GrounderState::new(context, edb);

    let mut rounds = 0;
    loop {
        let mut changed = false;
        for (rule_index, rule) in rules.iter().enumerate() {
            hexkin_assert_simple!(
                !rule.contains_module_atoms(),
                "module atoms must be rewritten away before grounding"
            );
            changed |= state.instantiate(rule_index, rule)?;
        }
        if !changed {
            break;
        }
        rounds += 1;
        if rounds > MAX_ROUNDS {
            return Err(SolveError::Safety(
                "instantiation did not reach a fixpoint; \
                 an external atom keeps producing fresh constants"
                    .to_owned(),
            ));
        }
    }

    debug!(
        "grounding finished: {} rules, {} replacement atoms",
        state.idb.len(),
        state.replacements.len()
    );

    Ok(AnnotatedGroundProgram {
        program: GroundProgram {
            edb: edb.clone(),
            idb: state.idb,
            mask: state.mask,
        },
        replacements: state.replacements,
    })
}

struct GrounderState<'a, 'b> {
    context: &'a mut GroundingContext<'b>,
    /// The potential universe: every atom some rule instance could derive.
    universe: Interpretation,
    by_predicate: FnvHashMap<SymbolId, Vec<AtomId>>,
    idb: Vec<GroundRule>,
    seen_rules: FnvHashSet<(Vec<AtomId>, Vec<Literal>)>,
    replacements: FnvHashMap<AtomId, ExternalInstance>,
    mask: Interpretation,
}

impl<'a, 'b> GrounderState<'a, 'b> {
    fn new(context: &'a mut GroundingContext<'b>, edb: &Interpretation) -> GrounderState<'a, 'b> {
        let mut state = GrounderState {
            context,
            universe: Interpretation::new(),
            by_predicate: FnvHashMap::default(),
            idb: Vec::new(),
            seen_rules: FnvHashSet::default(),
            replacements: FnvHashMap::default(),
            mask: Interpretation::new(),
        };
        for atom in edb.iter() {
            let _ = state.add_to_universe(atom);
        }
        state
    }

    fn add_to_universe(&mut self, atom: AtomId) -> bool {
        if !self.universe.insert(atom) {
            return false;
        }
        let predicate = self.context.registry.atoms.predicate(atom);
        self.by_predicate.entry(predicate).or_default().push(atom);
        true
    }

    /// Produces all new ground instances of one rule against the current
    /// universe. Returns whether anything new was derived.
    fn instantiate(&mut self, rule_index: usize, rule: &Rule) -> Result<bool, SolveError> {
        let mut bindings = vec![Binding::default()];

        // Positive ordinary body atoms generate candidate bindings; negative
        // literals and external atoms are resolved once the binding is known.
        for literal in &rule.body {
            if let RuleBodyLiteral::Ordinary { atom, naf: false } = literal {
                bindings = self.match_against_universe(atom, bindings);
                if bindings.is_empty() {
                    return Ok(false);
                }
            }
        }

        for literal in &rule.body {
            if let RuleBodyLiteral::External { atom, naf: false } = literal {
                bindings = self.bind_external_outputs(*atom, bindings)?;
                if bindings.is_empty() {
                    return Ok(false);
                }
            }
        }

        let mut changed = false;
        for binding in bindings {
            changed |= self.emit_instance(rule_index, rule, &binding)?;
        }
        Ok(changed)
    }

    fn match_against_universe(&self, pattern: &AtomPattern, bindings: Vec<Binding>) -> Vec<Binding> {
        let Some(candidates) = self.by_predicate.get(&pattern.predicate) else {
            return Vec::new();
        };
        let mut extended = Vec::new();
        for binding in &bindings {
            for &atom in candidates {
                let tuple = self.context.registry.atoms.tuple(atom);
                if tuple.len() != pattern.args.len() + 1 {
                    continue;
                }
                if let Some(next) = extend_binding(pattern, tuple, binding) {
                    extended.push(next);
                }
            }
        }
        extended
    }

    fn bind_external_outputs(
        &mut self,
        external: crate::registry::ExternalAtomId,
        bindings: Vec<Binding>,
    ) -> Result<Vec<Binding>, SolveError> {
        let answers = self.context.evaluator.evaluate(
            self.context.registry,
            self.context.plugins,
            external,
            &self.universe,
        )?;
        let pattern = self.context.registry.external_atom(external).output.clone();

        let mut extended = Vec::new();
        for binding in &bindings {
            for tuple in &answers {
                if let Some(next) = extend_output_binding(&pattern, tuple, binding) {
                    extended.push(next);
                }
            }
        }
        Ok(extended)
    }

    /// Interns one fully-bound rule instance. Unbound variables at this point
    /// are a safety violation: the variable occurs only in positions that
    /// cannot bind it.
    fn emit_instance(
        &mut self,
        rule_index: usize,
        rule: &Rule,
        binding: &Binding,
    ) -> Result<bool, SolveError> {
        let mut head = Vec::with_capacity(rule.head.len());
        for pattern in &rule.head {
            let tuple = pattern.ground_tuple(binding).ok_or_else(|| {
                unsafe_rule(self.context.registry, rule_index, pattern.predicate)
            })?;
            head.push(self.context.registry.atoms.intern(tuple));
        }

        let mut body = Vec::with_capacity(rule.body.len());
        for literal in &rule.body {
            match literal {
                RuleBodyLiteral::Ordinary { atom, naf } => {
                    let tuple = atom.ground_tuple(binding).ok_or_else(|| {
                        unsafe_rule(self.context.registry, rule_index, atom.predicate)
                    })?;
                    let id = self.context.registry.atoms.intern(tuple);
                    body.push(Literal::new(id, *naf));
                }
                RuleBodyLiteral::External { atom, naf } => {
                    let replacement = self.intern_replacement(*atom, binding, rule_index)?;
                    body.push(Literal::new(replacement, *naf));
                }
                RuleBodyLiteral::Module { .. } => unreachable!("checked in ground()"),
            }
        }

        let mut changed = false;
        for &atom in &head {
            changed |= self.add_to_universe(atom);
        }

        let key = (head.clone(), body.clone());
        if self.seen_rules.insert(key) {
            self.idb.push(GroundRule {
                head,
                body,
                flags: rule.flags,
                weight: None,
            });
            changed = true;
        }
        Ok(changed)
    }

    /// Interns the replacement atom for one ground external occurrence and,
    /// on first sight, its complement and the disjunctive guessing rule
    /// `replacement v complement.`, the single head position every
    /// replacement atom owes its support to.
    fn intern_replacement(
        &mut self,
        external: crate::registry::ExternalAtomId,
        binding: &Binding,
        rule_index: usize,
    ) -> Result<AtomId, SolveError> {
        let eatom = self.context.registry.external_atom(external).clone();
        let name = self.context.registry.symbols.resolve(eatom.name).to_owned();

        let mut output = Vec::with_capacity(eatom.output.len());
        for term in &eatom.output {
            match term {
                Term::Constant(symbol) => output.push(*symbol),
                Term::Variable(variable) => {
                    output.push(*binding.get(variable).ok_or_else(|| {
                        unsafe_rule(self.context.registry, rule_index, eatom.name)
                    })?);
                }
            }
        }

        let replacement_predicate = self
            .context
            .registry
            .symbols
            .intern(&format!("aux_r\u{b7}{name}"));
        let complement_predicate = self
            .context
            .registry
            .symbols
            .intern(&format!("aux_c\u{b7}{name}"));

        let mut tuple = vec![replacement_predicate];
        tuple.extend_from_slice(&eatom.inputs);
        tuple.extend_from_slice(&output);

        let replacement = self.context.registry.atoms.intern_with_flags(
            tuple.clone(),
            AtomFlag::Auxiliary | AtomFlag::ExternalReplacement,
        );

        if !self.replacements.contains_key(&replacement) {
            tuple[0] = complement_predicate;
            let complement = self
                .context
                .registry
                .atoms
                .intern_with_flags(tuple, EnumSet::only(AtomFlag::Auxiliary));

            let _ = self.replacements.insert(
                replacement,
                ExternalInstance {
                    external,
                    input: eatom.inputs.clone(),
                    output,
                },
            );
            let _ = self.mask.insert(replacement);
            let _ = self.mask.insert(complement);
            let _ = self.add_to_universe(replacement);

            self.idb.push(GroundRule {
                head: vec![replacement, complement],
                body: Vec::new(),
                flags: EnumSet::empty(),
                weight: None,
            });
            self.idb.push(GroundRule {
                head: Vec::new(),
                body: vec![Literal::positive(replacement), Literal::positive(complement)],
                flags: EnumSet::only(super::RuleFlag::Constraint),
                weight: None,
            });
        }

        Ok(replacement)
    }
}

fn extend_binding(pattern: &AtomPattern, tuple: &[SymbolId], binding: &Binding) -> Option<Binding> {
    let mut extended = binding.clone();
    for (term, &symbol) in pattern.args.iter().zip(&tuple[1..]) {
        match term {
            Term::Constant(expected) if *expected == symbol => {}
            Term::Constant(_) => return None,
            Term::Variable(name) => match extended.get(name) {
                Some(&bound) if bound == symbol => {}
                Some(_) => return None,
                None => {
                    let _ = extended.insert(*name, symbol);
                }
            },
        }
    }
    Some(extended)
}

fn extend_output_binding(
    pattern: &[Term],
    tuple: &[SymbolId],
    binding: &Binding,
) -> Option<Binding> {
    if pattern.len() != tuple.len() {
        return None;
    }
    let mut extended = binding.clone();
    for (term, &symbol) in pattern.iter().zip(tuple) {
        match term {
            Term::Constant(expected) if *expected == symbol => {}
            Term::Constant(_) => return None,
            Term::Variable(name) => match extended.get(name) {
                Some(&bound) if bound == symbol => {}
                Some(_) => return None,
                None => {
                    let _ = extended.insert(*name, symbol);
                }
            },
        }
    }
    Some(extended)
}

fn unsafe_rule(registry: &Registry, rule_index: usize, predicate: SymbolId) -> SolveError {
    SolveError::Safety(format!(
        "rule #{rule_index}: a variable of `{}` is not bound by any \
         positive body atom or external output",
        registry.symbols.resolve(predicate)
    ))
}

use crate::hexkin_assert_simple;
