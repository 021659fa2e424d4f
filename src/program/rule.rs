use enumset::EnumSet;
use enumset::EnumSetType;
use fnv::FnvHashMap;

use crate::basic_types::AtomId;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::registry::ExternalAtomId;
use crate::registry::ModuleAtomId;
use crate::registry::SymbolId;

/// A term position in a (possibly non-ground) atom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    Constant(SymbolId),
    Variable(SymbolId),
}

impl Term {
    pub fn as_constant(self) -> Option<SymbolId> {
        match self {
            Term::Constant(symbol) => Some(symbol),
            Term::Variable(_) => None,
        }
    }
}

/// A possibly non-ground ordinary atom: a predicate applied to terms.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AtomPattern {
    pub predicate: SymbolId,
    pub args: Vec<Term>,
}

impl AtomPattern {
    pub fn is_ground(&self) -> bool {
        self.args
            .iter()
            .all(|term| matches!(term, Term::Constant(_)))
    }

    /// The `[predicate, arg, ...]` tuple under the given variable binding.
    /// Returns `None` when a variable is unbound.
    pub fn ground_tuple(&self, binding: &FnvHashMap<SymbolId, SymbolId>) -> Option<Vec<SymbolId>> {
        let mut tuple = Vec::with_capacity(self.args.len() + 1);
        tuple.push(self.predicate);
        for term in &self.args {
            match term {
                Term::Constant(symbol) => tuple.push(*symbol),
                Term::Variable(name) => tuple.push(*binding.get(name)?),
            }
        }
        Some(tuple)
    }

    pub fn variables(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.args.iter().filter_map(|term| match term {
            Term::Variable(name) => Some(*name),
            Term::Constant(_) => None,
        })
    }
}

/// A module atom `@q[p1, ..., pk]::out(args)`: a call to module `q` passing
/// the extensions of the actual input predicates, observed through the
/// callee's output predicate.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModuleAtom {
    /// The callee module's name.
    pub module: SymbolId,
    /// Actual input predicate symbols, positionally matched against the
    /// callee's formal input list.
    pub inputs: Vec<SymbolId>,
    /// The observed output atom, in the callee's predicate namespace.
    pub output: AtomPattern,
}

/// An external atom `&g[i1, ..., ik](pattern)`: the named plugin predicate
/// applied to input terms, producing output tuples matched against the
/// pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExternalAtom {
    /// Plugin predicate name (without the `&`).
    pub name: SymbolId,
    /// Ground input terms; predicate symbols for `predicate`-kind positions.
    pub inputs: Vec<SymbolId>,
    /// Output pattern; variables are bound by the plugin's answer tuples.
    pub output: Vec<Term>,
}

/// One body element of a possibly non-ground rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleBodyLiteral {
    Ordinary { atom: AtomPattern, naf: bool },
    External { atom: ExternalAtomId, naf: bool },
    Module { atom: ModuleAtomId, naf: bool },
}

impl RuleBodyLiteral {
    pub fn is_naf(&self) -> bool {
        match self {
            RuleBodyLiteral::Ordinary { naf, .. }
            | RuleBodyLiteral::External { naf, .. }
            | RuleBodyLiteral::Module { naf, .. } => *naf,
        }
    }
}

#[derive(EnumSetType, Debug)]
pub enum RuleFlag {
    /// Empty head.
    Constraint,
    /// At least one external atom in the body.
    HasExternal,
    /// At least one module atom in the body.
    HasModuleAtoms,
    /// Carries a weight body; accepted but not solved (no-op boundary).
    WeightRule,
}

/// A possibly non-ground rule. Multiple head atoms mean disjunction.
#[derive(Clone, Debug)]
pub struct Rule {
    pub head: Vec<AtomPattern>,
    pub body: Vec<RuleBodyLiteral>,
    pub flags: EnumSet<RuleFlag>,
}

impl Rule {
    pub fn new(head: Vec<AtomPattern>, body: Vec<RuleBodyLiteral>) -> Rule {
        let mut flags = EnumSet::empty();
        if head.is_empty() {
            flags |= RuleFlag::Constraint;
        }
        if body
            .iter()
            .any(|literal| matches!(literal, RuleBodyLiteral::External { .. }))
        {
            flags |= RuleFlag::HasExternal;
        }
        if body
            .iter()
            .any(|literal| matches!(literal, RuleBodyLiteral::Module { .. }))
        {
            flags |= RuleFlag::HasModuleAtoms;
        }
        Rule { head, body, flags }
    }

    pub fn contains_module_atoms(&self) -> bool {
        self.flags.contains(RuleFlag::HasModuleAtoms)
    }

    /// Recomputes the module-atom flag after rewriting replaced some module
    /// atoms by their output replacement atoms.
    pub fn refresh_module_flag(&mut self) {
        let still_present = self
            .body
            .iter()
            .any(|literal| matches!(literal, RuleBodyLiteral::Module { .. }));
        if still_present {
            self.flags |= RuleFlag::HasModuleAtoms;
        } else {
            self.flags -= RuleFlag::HasModuleAtoms;
        }
    }
}

/// A named program fragment: formal input predicates, facts, rules.
/// Identity is by name.
#[derive(Clone, Debug)]
pub struct Module {
    pub name: SymbolId,
    pub formal_inputs: Vec<SymbolId>,
    pub edb: Interpretation,
    pub idb: Vec<Rule>,
}

/// A weighted body with a lower bound, carried through the data model
/// unevaluated.
#[derive(Clone, Debug)]
pub struct WeightBody {
    pub weights: Vec<(Literal, u64)>,
    pub bound: u64,
}

/// A fully ground rule over atom ids.
#[derive(Clone, Debug)]
pub struct GroundRule {
    pub head: Vec<AtomId>,
    pub body: Vec<Literal>,
    pub flags: EnumSet<RuleFlag>,
    pub weight: Option<WeightBody>,
}

impl GroundRule {
    pub fn is_constraint(&self) -> bool {
        self.flags.contains(RuleFlag::Constraint)
    }
}

/// A ground program: unconditional facts, rules, and the mask of auxiliary
/// atoms hidden from output.
#[derive(Clone, Debug, Default)]
pub struct GroundProgram {
    pub edb: Interpretation,
    pub idb: Vec<GroundRule>,
    pub mask: Interpretation,
}

/// One verified occurrence of an external atom: the replacement atom guessed
/// by the engine together with the ground input and output tuples it stands
/// for.
#[derive(Clone, Debug)]
pub struct ExternalInstance {
    pub external: ExternalAtomId,
    pub input: Vec<SymbolId>,
    pub output: Vec<SymbolId>,
}

/// A ground program annotated with, for each external-replacement atom, the
/// external atom occurrence it stands for. Every replacement atom occurs in
/// exactly one guessing-rule head created by the grounder.
#[derive(Clone, Debug, Default)]
pub struct AnnotatedGroundProgram {
    pub program: GroundProgram,
    pub replacements: FnvHashMap<AtomId, ExternalInstance>,
}

impl AnnotatedGroundProgram {
    pub fn has_externals(&self) -> bool {
        !self.replacements.is_empty()
    }
}
