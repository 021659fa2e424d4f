//! The MLP orchestrator: drives `comp` over value-call sets with an explicit
//! stack of work items, each snapshotting the mutable state (value calls,
//! path, global model, flag bitmaps, alpha table, instance tables, call
//! graph). The registry is shared and append-only for the whole solve.

use log::debug;
use log::info;

use super::call_graph::CallGraph;
use super::rewriter;
use super::tables::AlphaTable;
use super::tables::InstanceTables;
use super::tables::ValueCalls;
use crate::basic_types::Interpretation;
use crate::engine::cdnl_solver::CdnlSolver;
use crate::engine::naive::NaiveSolver;
use crate::engine::propagation::ExternalAtomEvaluator;
use crate::engine::propagation::FixpointUnfoundedSetChecker;
use crate::engine::propagation::NullPropagator;
use crate::engine::propagation::VerificationPropagator;
use crate::engine::termination::TerminationCondition;
use crate::options::SolverOptions;
use crate::plugins::PluginRegistry;
use crate::program::ground;
use crate::program::GroundingContext;
use crate::program::ModuleAtom;
use crate::program::Rule;
use crate::program::RuleBodyLiteral;
use crate::registry::ModuleAtomId;
use crate::registry::Registry;
use crate::registry::SymbolId;
use crate::results::AnswerSet;
use crate::results::SolveError;
use crate::statistics::Statistics;

/// Which model enumerator backs the sub-solves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EngineChoice {
    #[default]
    Cdnl,
    Naive,
}

/// One suspended invocation of `comp`.
#[derive(Debug)]
struct WorkItem {
    c: ValueCalls,
    path: Vec<ValueCalls>,
    m: Interpretation,
    alpha: AlphaTable,
    tables: InstanceTables,
    call_graph: CallGraph,
}

/// The solver for a modular program: enumerates the answer sets of every
/// main module, instantiating called modules on demand.
#[derive(Debug)]
pub struct MlpSolver<'a> {
    registry: &'a mut Registry,
    plugins: &'a PluginRegistry,
    options: SolverOptions,
    engine: EngineChoice,
    evaluator: ExternalAtomEvaluator,
    statistics: Statistics,
    tables: InstanceTables,
    alpha: AlphaTable,
    m: Interpretation,
    path: Vec<ValueCalls>,
    call_graph: CallGraph,
    answer_count: u64,
}

impl<'a> MlpSolver<'a> {
    pub fn new(
        registry: &'a mut Registry,
        plugins: &'a PluginRegistry,
        options: SolverOptions,
    ) -> MlpSolver<'a> {
        let evaluator = ExternalAtomEvaluator::new(options.external_cache);
        MlpSolver {
            registry,
            plugins,
            options,
            engine: EngineChoice::Cdnl,
            evaluator,
            statistics: Statistics::default(),
            tables: InstanceTables::new(),
            alpha: AlphaTable::default(),
            m: Interpretation::new(),
            path: Vec::new(),
            call_graph: CallGraph::new(),
            answer_count: 0,
        }
    }

    pub fn with_engine(mut self, engine: EngineChoice) -> MlpSolver<'a> {
        self.engine = engine;
        self
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    pub fn instance_tables(&self) -> &InstanceTables {
        &self.tables
    }

    pub fn call_graph_dot(&self) -> String {
        self.call_graph.to_dot(self.registry, &self.tables)
    }

    /// Enumerates the answer sets of every main module, streaming each to the
    /// callback. Returns the number of answer sets found.
    pub fn solve(
        &mut self,
        termination: &mut dyn TerminationCondition,
        mut on_answer: impl FnMut(&Registry, &AnswerSet),
    ) -> Result<u64, SolveError> {
        let main_modules = self.registry.main_modules();
        if main_modules.is_empty() {
            return Err(SolveError::Usage(
                "the program declares no main module (a module without formal inputs)".to_owned(),
            ));
        }

        for main in main_modules {
            debug!(
                "solving main module {}",
                self.registry.symbols.resolve(self.registry.module(main).name)
            );
            self.alpha.clear();
            self.m.clear();
            self.path.clear();

            let empty = Interpretation::new();
            let s_index = self.tables.intern_interpretation(&empty);
            let (instance, fresh) = self.tables.intern_instance(main, s_index);
            if fresh {
                self.statistics.num_module_instantiations += 1;
            }

            self.comp(ValueCalls::singleton(instance), termination, &mut on_answer)?;

            if self.limit_reached() {
                break;
            }
        }

        info!("total answer sets: {}", self.answer_count);
        Ok(self.answer_count)
    }

    fn limit_reached(&self) -> bool {
        self.options
            .max_models
            .is_some_and(|limit| self.answer_count >= limit)
    }

    /// The `comp` procedure, recursion transformed into an explicit stack.
    fn comp(
        &mut self,
        initial: ValueCalls,
        termination: &mut dyn TerminationCondition,
        on_answer: &mut impl FnMut(&Registry, &AnswerSet),
    ) -> Result<(), SolveError> {
        let mut stack = vec![WorkItem {
            c: initial,
            path: std::mem::take(&mut self.path),
            m: self.m.clone(),
            alpha: self.alpha.clone(),
            tables: self.tables.clone(),
            call_graph: self.call_graph.clone(),
        }];

        while let Some(item) = stack.pop() {
            if self.limit_reached() || termination.should_stop() {
                return Ok(());
            }

            let mut c = item.c;
            self.path = item.path;
            self.m = item.m;
            self.alpha = item.alpha;
            self.tables = item.tables;
            self.call_graph = item.call_graph;

            self.detect_value_call_loop(&mut c)?;

            let (edb, idb) = rewriter::rewrite(
                self.registry,
                self.plugins,
                &mut self.tables,
                &self.alpha,
                &self.m,
                &c,
            );

            if rewriter::is_ordinary(&idb) {
                self.comp_ordinary(c, &edb, &idb, termination, on_answer, &mut stack)?;
            } else {
                self.comp_expand(c, &edb, &idb, termination, &mut stack)?;
            }
        }
        Ok(())
    }

    /// Scans the value-call set against the path; a cycle is collapsed into a
    /// single joint call by popping path entries into `c` up to and including
    /// the earlier occurrence.
    fn detect_value_call_loop(&mut self, c: &mut ValueCalls) -> Result<(), SolveError> {
        let found = c.iter().find_map(|instance| {
            self.path
                .iter()
                .find(|prev| prev.contains(instance))
                .cloned()
        });
        let Some(c_prev) = found else {
            return Ok(());
        };

        debug!("value-call loop detected, collapsing the cycle");
        self.check_cycle_instantiations(c)?;
        loop {
            let c2 = self
                .path
                .pop()
                .expect("the cycle entry is on the path");
            self.check_cycle_instantiations(&c2)?;
            let done = c2 == c_prev;
            c.union_with(&c2);
            if done {
                return Ok(());
            }
        }
    }

    /// The conservative ic-stratification check: a cycle over a non-empty
    /// input instantiation is rejected unless permissive cycles are enabled.
    fn check_cycle_instantiations(&self, c: &ValueCalls) -> Result<(), SolveError> {
        if !self.options.reject_nonempty_cycles {
            return Ok(());
        }
        for instance in c.iter() {
            if !self.tables.input_of(instance).is_empty() {
                return Err(SolveError::Stratification(format!(
                    "value-call cycle through instance m{} with a non-empty input \
                     instantiation (pass --permissive-cycles to union such cycles instead)",
                    instance.0
                )));
            }
        }
        Ok(())
    }

    /// Ordinary case: the rewritten program has no module atoms left. At the
    /// top of the path its models are full answer sets; otherwise each model
    /// is folded into M and the next path entry is resumed.
    fn comp_ordinary(
        &mut self,
        c: ValueCalls,
        edb: &Interpretation,
        idb: &[Rule],
        termination: &mut dyn TerminationCondition,
        on_answer: &mut impl FnMut(&Registry, &AnswerSet),
        stack: &mut Vec<WorkItem>,
    ) -> Result<(), SolveError> {
        let models = self.solve_models(edb, idb, termination)?;

        if self.path.is_empty() {
            for model in models {
                let mut full = self.m.clone();
                full.union_with(&model);

                self.answer_count += 1;
                let answer = AnswerSet {
                    interpretation: self.visible_projection(&full),
                };
                debug!("answer set {}", self.answer_count);
                on_answer(self.registry, &answer);

                if self.limit_reached() {
                    return Ok(());
                }
            }
            return Ok(());
        }

        for instance in c.iter() {
            self.alpha.ensure_len(self.tables.num_instances());
            self.alpha.mark_fin(instance);
        }
        let mut path = self.path.clone();
        let c_next = path.pop().expect("checked non-empty above");

        // Reverse keeps sibling models in enumeration order on the stack.
        for model in models.into_iter().rev() {
            let mut m2 = self.m.clone();
            m2.union_with(&model);
            stack.push(WorkItem {
                c: c_next.clone(),
                path: path.clone(),
                m: m2,
                alpha: self.alpha.clone(),
                tables: self.tables.clone(),
                call_graph: self.call_graph.clone(),
            });
        }
        Ok(())
    }

    /// Non-ordinary case: pick the smallest independent lower layer, solve
    /// the bottom that defines its inputs, and expand the sub-instance for
    /// every bottom model.
    fn comp_expand(
        &mut self,
        c: ValueCalls,
        edb: &Interpretation,
        idb: &[Rule],
        termination: &mut dyn TerminationCondition,
        stack: &mut Vec<WorkItem>,
    ) -> Result<(), SolveError> {
        let Some(alpha_id) = smallest_ill(self.registry, idb) else {
            let offender = first_module_atom(idb)
                .map(|atom| module_atom_text(self.registry, atom))
                .unwrap_or_else(|| "<none>".to_owned());
            return Err(SolveError::Stratification(format!(
                "no module atom has fully defined inputs; offending atom: {offender}"
            )));
        };

        self.alpha.ensure_len(self.tables.num_instances());
        for instance in c.iter() {
            self.alpha.mark_expanded(instance, alpha_id);
        }

        let matom: ModuleAtom = self.registry.module_atom(alpha_id).clone();
        let Some(callee) = self.registry.module_by_name(matom.module) else {
            return Err(SolveError::Invariant(format!(
                "module atom references unknown module `{}`",
                self.registry.symbols.resolve(matom.module)
            )));
        };
        let formal_inputs = self.registry.module(callee).formal_inputs.clone();

        let bottom = collect_bottom(self.registry, &matom, idb);
        debug!(
            "expanding {} over a bottom of {} rule(s)",
            module_atom_text(self.registry, alpha_id),
            bottom.len()
        );
        let models = self.solve_models(edb, &bottom, termination)?;

        for model in models.into_iter().rev() {
            let (restricted, renamed) = rewriter::restriction_and_renaming(
                self.registry,
                &model,
                &matom.inputs,
                &formal_inputs,
            );
            let s_index = self.tables.intern_interpretation(&renamed);
            let (sub_instance, fresh) = self.tables.intern_instance(callee, s_index);
            if fresh {
                self.statistics.num_module_instantiations += 1;
            }
            self.alpha.ensure_len(self.tables.num_instances());

            let mut m2 = self.m.clone();
            m2.union_with(&model);

            let mut path2 = self.path.clone();
            let mut call_graph2 = self.call_graph.clone();
            let c2 = if !self.tables.mflag(sub_instance).is_empty()
                && self.alpha.is_fin(sub_instance)
            {
                // Already fully computed: resume the current call unchanged.
                c.clone()
            } else {
                path2.push(c.clone());
                let label = self.interpretation_text(&restricted);
                for caller in c.iter() {
                    call_graph2.add_edge(caller, sub_instance, label.clone());
                }
                ValueCalls::singleton(sub_instance)
            };

            stack.push(WorkItem {
                c: c2,
                path: path2,
                m: m2,
                alpha: self.alpha.clone(),
                tables: self.tables.clone(),
                call_graph: call_graph2,
            });
        }
        Ok(())
    }

    /// Grounds and enumerates all models of one rewritten program. New atoms
    /// are assigned to their instances' flag bitmaps afterwards.
    fn solve_models(
        &mut self,
        edb: &Interpretation,
        idb: &[Rule],
        termination: &mut dyn TerminationCondition,
    ) -> Result<Vec<Interpretation>, SolveError> {
        let watermark = self.registry.atoms.len();

        let annotated = ground(
            &mut GroundingContext {
                registry: &mut *self.registry,
                plugins: self.plugins,
                evaluator: &mut self.evaluator,
            },
            edb,
            idb,
        )?;

        let external_justified = self.collect_auxiliary_atoms();
        let mut unfounded =
            FixpointUnfoundedSetChecker::new(&annotated.program, external_justified);

        let models = match self.engine {
            EngineChoice::Cdnl => {
                let mut solver =
                    CdnlSolver::new(self.registry, &annotated.program, &self.options);
                let mut models = Vec::new();
                if annotated.has_externals() {
                    let mut propagator = VerificationPropagator::new(
                        self.registry,
                        self.plugins,
                        &mut self.evaluator,
                        &annotated,
                    )?;
                    while let Some(model) =
                        solver.next_model(termination, &mut propagator, &mut unfounded)?
                    {
                        models.push(model);
                    }
                } else {
                    let mut propagator = NullPropagator;
                    while let Some(model) =
                        solver.next_model(termination, &mut propagator, &mut unfounded)?
                    {
                        models.push(model);
                    }
                }
                self.statistics.absorb(&solver.statistics());
                models
            }
            EngineChoice::Naive => {
                let solver = NaiveSolver::new(self.registry, &annotated.program, &self.options)?;
                if annotated.has_externals() {
                    let mut propagator = VerificationPropagator::new(
                        self.registry,
                        self.plugins,
                        &mut self.evaluator,
                        &annotated,
                    )?;
                    solver.enumerate(&mut propagator, &mut unfounded, None)?
                } else {
                    solver.enumerate(&mut NullPropagator, &mut unfounded, None)?
                }
            }
        };

        self.statistics.num_external_queries = self.evaluator.num_queries;
        self.statistics.num_external_cache_hits = self.evaluator.num_cache_hits;
        self.tables.flag_new_atoms(self.registry, watermark);
        Ok(models)
    }

    /// Every atom currently flagged auxiliary; these are justified outside
    /// the rules (guessing machinery) and invisible to the unfounded-set
    /// fixpoint.
    fn collect_auxiliary_atoms(&self) -> Interpretation {
        (0..self.registry.atoms.len())
            .map(|index| crate::basic_types::AtomId(index as u32))
            .filter(|&atom| self.registry.atoms.is_auxiliary(atom))
            .collect()
    }

    /// The visible signature: everything except auxiliary atoms.
    fn visible_projection(&self, interpretation: &Interpretation) -> Interpretation {
        interpretation
            .iter()
            .filter(|&atom| !self.registry.atoms.is_auxiliary(atom))
            .collect()
    }

    fn interpretation_text(&self, interpretation: &Interpretation) -> String {
        let parts: Vec<String> = interpretation
            .iter()
            .map(|atom| self.registry.atom_text(atom))
            .collect();
        format!("{{{}}}", parts.join(","))
    }
}

/// All module atoms occurring in rule bodies, in rule order, deduplicated.
fn find_all_module_atoms(idb: &[Rule]) -> Vec<ModuleAtomId> {
    let mut result = Vec::new();
    for rule in idb {
        if !rule.contains_module_atoms() {
            continue;
        }
        for literal in &rule.body {
            if let RuleBodyLiteral::Module { atom, .. } = literal {
                if !result.contains(atom) {
                    result.push(*atom);
                }
            }
        }
    }
    result
}

fn first_module_atom(idb: &[Rule]) -> Option<ModuleAtomId> {
    find_all_module_atoms(idb).into_iter().next()
}

/// The *smallest independent lower layer*: the first module atom whose input
/// predicates are defined exclusively by module-free rules. `None` means the
/// program is not i-stratified.
fn smallest_ill(registry: &Registry, idb: &[Rule]) -> Option<ModuleAtomId> {
    find_all_module_atoms(idb)
        .into_iter()
        .find(|&atom| all_prepared(registry, atom, idb))
}

fn all_prepared(registry: &Registry, atom: ModuleAtomId, idb: &[Rule]) -> bool {
    let matom = registry.module_atom(atom);
    let mut searched = Vec::new();
    let mut rules = Vec::new();
    for &input in &matom.inputs {
        collect_rules_defining(input, idb, &mut searched, &mut rules);
    }
    rules.iter().all(|&index| !idb[index].contains_module_atoms())
}

/// Collects (transitively) the indices of all rules defining `predicate`:
/// the rules with it in a head position, plus the rules defining their
/// positive and negative body predicates.
fn collect_rules_defining(
    predicate: SymbolId,
    idb: &[Rule],
    searched: &mut Vec<SymbolId>,
    result: &mut Vec<usize>,
) {
    if searched.contains(&predicate) {
        return;
    }
    searched.push(predicate);

    for (index, rule) in idb.iter().enumerate() {
        if !rule.head.iter().any(|pattern| pattern.predicate == predicate) {
            continue;
        }
        if !result.contains(&index) {
            result.push(index);
        }
        for literal in &rule.body {
            if let RuleBodyLiteral::Ordinary { atom, .. } = literal {
                collect_rules_defining(atom.predicate, idb, searched, result);
            }
        }
    }
}

/// The *bottom* of a module atom: the rules defining its input predicates.
fn collect_bottom(registry: &Registry, matom: &ModuleAtom, idb: &[Rule]) -> Vec<Rule> {
    let mut searched = Vec::new();
    let mut indices = Vec::new();
    for &input in &matom.inputs {
        collect_rules_defining(input, idb, &mut searched, &mut indices);
    }
    indices.sort_unstable();
    indices.into_iter().map(|index| idb[index].clone()).collect()
}

fn module_atom_text(registry: &Registry, atom: ModuleAtomId) -> String {
    let matom = registry.module_atom(atom);
    let inputs: Vec<&str> = matom
        .inputs
        .iter()
        .map(|&input| registry.symbols.resolve(input))
        .collect();
    format!(
        "@{}[{}]::{}",
        registry.symbols.resolve(matom.module),
        inputs.join(","),
        registry.symbols.resolve(matom.output.predicate)
    )
}
