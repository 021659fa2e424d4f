//! Rewrites a value-call set into an ordinary ground(-able) program:
//! predicates are renamed with the instance prefix `m<i>·`, the instance's
//! input interpretation and the accumulated global-model facts are folded
//! into the EDB, and module atoms whose sub-instance has been computed are
//! replaced by their prefixed output atoms.
//!
//! The rewriter is deterministic: the same (instance, M, alpha) always yields
//! the same program, because interning assigns ids in a fixed order.

use log::debug;

use super::AlphaTable;
use super::InstanceId;
use super::InstanceTables;
use super::ValueCalls;
use crate::basic_types::AtomId;
use crate::basic_types::Interpretation;
use crate::plugins::InputKind;
use crate::plugins::PluginRegistry;
use crate::program::AtomPattern;
use crate::program::ModuleAtom;
use crate::program::Rule;
use crate::program::RuleBodyLiteral;
use crate::registry::Registry;
use crate::registry::SymbolId;
use crate::registry::INSTANCE_SEPARATOR;

/// Renames a predicate symbol with the instance prefix: `p` becomes
/// `m<i>·p`. Interning makes this idempotent per (instance, symbol) pair.
pub(crate) fn rename_predicate(
    registry: &mut Registry,
    instance: InstanceId,
    predicate: SymbolId,
) -> SymbolId {
    let renamed = format!(
        "m{}{INSTANCE_SEPARATOR}{}",
        instance.0,
        registry.symbols.resolve(predicate)
    );
    registry.symbols.intern(&renamed)
}

/// Renames one ground atom and marks it in the instance's flag bitmap.
fn rename_ground_atom(
    registry: &mut Registry,
    tables: &mut InstanceTables,
    instance: InstanceId,
    atom: AtomId,
) -> AtomId {
    let mut tuple = registry.atoms.tuple(atom).to_vec();
    tuple[0] = rename_predicate(registry, instance, tuple[0]);
    let renamed = registry.atoms.intern(tuple);
    tables.set_flag(instance, renamed);
    renamed
}

fn rename_pattern(
    registry: &mut Registry,
    instance: InstanceId,
    pattern: &AtomPattern,
) -> AtomPattern {
    AtomPattern {
        predicate: rename_predicate(registry, instance, pattern.predicate),
        args: pattern.args.clone(),
    }
}

/// Rewrites the value-call set `c` into one program: the union of the
/// renamed module programs of all its instances.
pub(crate) fn rewrite(
    registry: &mut Registry,
    plugins: &PluginRegistry,
    tables: &mut InstanceTables,
    alpha: &AlphaTable,
    m: &Interpretation,
    c: &ValueCalls,
) -> (Interpretation, Vec<Rule>) {
    let mut edb = Interpretation::new();
    let mut idb = Vec::new();

    for instance in c.iter() {
        let module = registry.module(tables.module_of(instance)).clone();
        debug!(
            "rewrite: instance m{} of module {}",
            instance.0,
            registry.symbols.resolve(module.name)
        );

        // EDB: the module's facts and the input interpretation, renamed.
        let mut base = module.edb.clone();
        base.union_with(tables.input_of(instance));
        for atom in base.iter().collect::<Vec<_>>() {
            let _ = edb.insert(rename_ground_atom(registry, tables, instance, atom));
        }

        // Accumulated global-model facts belonging to this instance.
        let mut mine = m.clone();
        mine.intersect_with(tables.mflag(instance));
        edb.union_with(&mine);

        // IDB: rename every rule, then substitute computed module atoms.
        for rule in &module.idb {
            let renamed = rename_rule(registry, plugins, instance, rule);
            let replaced =
                replace_module_atoms(registry, tables, alpha, m, instance, renamed, &mut edb);
            idb.push(replaced);
        }
    }

    (edb, idb)
}

fn rename_rule(
    registry: &mut Registry,
    plugins: &PluginRegistry,
    instance: InstanceId,
    rule: &Rule,
) -> Rule {
    let head = rule
        .head
        .iter()
        .map(|pattern| rename_pattern(registry, instance, pattern))
        .collect();

    let body = rule
        .body
        .iter()
        .map(|literal| match literal {
            RuleBodyLiteral::Ordinary { atom, naf } => RuleBodyLiteral::Ordinary {
                atom: rename_pattern(registry, instance, atom),
                naf: *naf,
            },
            RuleBodyLiteral::External { atom, naf } => {
                let mut eatom = registry.external_atom(*atom).clone();
                // Predicate-kind inputs refer to this instance's predicates.
                let kinds = plugins
                    .get(registry.symbols.resolve(eatom.name))
                    .map(|plugin| plugin.input_kinds().to_vec())
                    .unwrap_or_else(|| vec![InputKind::Predicate; eatom.inputs.len()]);
                for (input, kind) in eatom.inputs.iter_mut().zip(kinds) {
                    if matches!(kind, InputKind::Predicate) {
                        *input = rename_predicate(registry, instance, *input);
                    }
                }
                RuleBodyLiteral::External {
                    atom: registry.intern_external_atom(eatom),
                    naf: *naf,
                }
            }
            RuleBodyLiteral::Module { atom, naf } => {
                let mut matom = registry.module_atom(*atom).clone();
                for input in matom.inputs.iter_mut() {
                    *input = rename_predicate(registry, instance, *input);
                }
                RuleBodyLiteral::Module {
                    atom: registry.intern_module_atom(matom),
                    naf: *naf,
                }
            }
        })
        .collect();

    let mut renamed = Rule::new(head, body);
    renamed.flags |= rule.flags;
    renamed.refresh_module_flag();
    renamed
}

/// Substitutes every module atom recorded as expanded in `alpha[instance]` by
/// its replacement output atom `m<j>·q·out`, adds the matching facts of the
/// sub-instance's model slice, and clears the module flag when no module atom
/// remains.
fn replace_module_atoms(
    registry: &mut Registry,
    tables: &mut InstanceTables,
    alpha: &AlphaTable,
    m: &Interpretation,
    instance: InstanceId,
    mut rule: Rule,
    edb: &mut Interpretation,
) -> Rule {
    if !rule.contains_module_atoms() {
        return rule;
    }

    for index in 0..rule.body.len() {
        let (module_atom, naf) = match &rule.body[index] {
            RuleBodyLiteral::Module { atom, naf } => (*atom, *naf),
            _ => continue,
        };
        if !alpha.is_expanded(instance, module_atom) {
            continue;
        }
        let matom: ModuleAtom = registry.module_atom(module_atom).clone();
        let Some(callee) = registry.module_by_name(matom.module) else {
            continue;
        };
        let formal_inputs = registry.module(callee).formal_inputs.clone();

        // The sub-instance is determined by this instance's model slice,
        // restricted to the actual inputs and renamed to the formals.
        let mut mine = m.clone();
        mine.intersect_with(tables.mflag(instance));
        let (_, renamed_input) =
            restriction_and_renaming(registry, &mine, &matom.inputs, &formal_inputs);
        let s_index = tables.intern_interpretation(&renamed_input);
        let (sub_instance, _) = tables.intern_instance(callee, s_index);

        let replacement_predicate =
            rename_predicate(registry, sub_instance, matom.output.predicate);
        rule.body[index] = RuleBodyLiteral::Ordinary {
            atom: AtomPattern {
                predicate: replacement_predicate,
                args: matom.output.args.clone(),
            },
            naf,
        };

        // The sub-instance's computed output atoms become facts.
        for atom in tables.mflag(sub_instance).iter().collect::<Vec<_>>() {
            if m.contains(atom) && registry.atoms.predicate(atom) == replacement_predicate {
                let _ = edb.insert(atom);
            }
        }
    }

    rule.refresh_module_flag();
    rule
}

/// Restricts an interpretation to the actual input predicates and renames
/// each restricted atom to the positionally matching formal input predicate.
pub(crate) fn restriction_and_renaming(
    registry: &mut Registry,
    interpretation: &Interpretation,
    actual_inputs: &[SymbolId],
    formal_inputs: &[SymbolId],
) -> (Interpretation, Interpretation) {
    let mut restricted = Interpretation::new();
    let mut renamed = Interpretation::new();

    for atom in interpretation.iter().collect::<Vec<_>>() {
        let predicate = registry.atoms.predicate(atom);
        let Some(position) = actual_inputs.iter().position(|&input| input == predicate) else {
            continue;
        };
        let _ = restricted.insert(atom);

        let mut tuple = registry.atoms.tuple(atom).to_vec();
        tuple[0] = formal_inputs[position];
        let _ = renamed.insert(registry.atoms.intern(tuple));
    }

    (restricted, renamed)
}

/// A rule set is ordinary when no rule still carries a module atom.
pub(crate) fn is_ordinary(idb: &[Rule]) -> bool {
    idb.iter().all(|rule| !rule.contains_module_atoms())
}
