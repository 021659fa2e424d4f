//! The input-interpretation table, the module-instance table, value-call
//! sets, the alpha table of expanded module atoms, and the per-instance
//! `MFlag` bitmaps. The two interning tables follow the multi-index pattern:
//! a primary vector assigning stable indices plus a reverse hash map; entries
//! are never deleted.

use fnv::FnvHashMap;

use crate::basic_types::AtomId;
use crate::basic_types::Interpretation;
use crate::registry::ModuleAtomId;
use crate::registry::ModuleId;
use crate::registry::Registry;
use crate::registry::INSTANCE_SEPARATOR;

/// Index of a module instance: a (module, input interpretation) pair.
/// Instance ids, once assigned, persist for the whole solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u32);

impl InstanceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, Default)]
pub struct InstanceTables {
    interpretations: Vec<Interpretation>,
    interpretation_index: FnvHashMap<Interpretation, usize>,
    instances: Vec<(ModuleId, usize)>,
    instance_index: FnvHashMap<(ModuleId, usize), InstanceId>,
    /// `mflag[i]` marks the atoms of the global model belonging to instance
    /// `i`. Grown eagerly whenever an instance id is allocated, so the entry
    /// exists for every live instance.
    mflag: Vec<Interpretation>,
}

impl InstanceTables {
    pub fn new() -> InstanceTables {
        InstanceTables::default()
    }

    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn intern_interpretation(&mut self, interpretation: &Interpretation) -> usize {
        if let Some(&index) = self.interpretation_index.get(interpretation) {
            return index;
        }
        let index = self.interpretations.len();
        self.interpretations.push(interpretation.clone());
        let _ = self
            .interpretation_index
            .insert(interpretation.clone(), index);
        index
    }

    pub fn interpretation(&self, index: usize) -> &Interpretation {
        &self.interpretations[index]
    }

    /// Interns the (module, interpretation) pair; returns the instance id and
    /// whether it is new.
    pub fn intern_instance(&mut self, module: ModuleId, s_index: usize) -> (InstanceId, bool) {
        if let Some(&id) = self.instance_index.get(&(module, s_index)) {
            return (id, false);
        }
        let id = InstanceId(self.instances.len() as u32);
        self.instances.push((module, s_index));
        let _ = self.instance_index.insert((module, s_index), id);
        self.mflag.push(Interpretation::new());
        (id, true)
    }

    pub fn module_of(&self, instance: InstanceId) -> ModuleId {
        self.instances[instance.index()].0
    }

    pub fn input_of(&self, instance: InstanceId) -> &Interpretation {
        &self.interpretations[self.instances[instance.index()].1]
    }

    pub fn mflag(&self, instance: InstanceId) -> &Interpretation {
        &self.mflag[instance.index()]
    }

    pub fn set_flag(&mut self, instance: InstanceId, atom: AtomId) {
        let _ = self.mflag[instance.index()].insert(atom);
    }

    pub fn mflags(&self) -> impl Iterator<Item = &Interpretation> {
        self.mflag.iter()
    }

    /// Scans the atoms created since `watermark` and assigns each one with an
    /// instance prefix (`m<i>·...`) to its instance's flag bitmap.
    pub fn flag_new_atoms(&mut self, registry: &Registry, watermark: usize) {
        for atom in registry.atoms.atoms_since(watermark) {
            let predicate = registry.symbols.resolve(registry.atoms.predicate(atom));
            if let Some(instance) = parse_instance_prefix(predicate) {
                if instance < self.mflag.len() {
                    let _ = self.mflag[instance].insert(atom);
                }
            }
        }
    }
}

/// Extracts `i` from a predicate of the form `m<i>·...`.
fn parse_instance_prefix(predicate: &str) -> Option<usize> {
    let rest = predicate.strip_prefix('m')?;
    let digits = &rest[..rest.find(INSTANCE_SEPARATOR)?];
    digits.parse().ok()
}

/// An ordered, deduplicated set of instance ids solved jointly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ValueCalls {
    items: Vec<InstanceId>,
}

impl ValueCalls {
    pub fn singleton(instance: InstanceId) -> ValueCalls {
        ValueCalls {
            items: vec![instance],
        }
    }

    pub fn contains(&self, instance: InstanceId) -> bool {
        self.items.contains(&instance)
    }

    pub fn insert(&mut self, instance: InstanceId) {
        if !self.contains(instance) {
            self.items.push(instance);
        }
    }

    /// Unions another value-call set into this one, preserving order.
    pub fn union_with(&mut self, other: &ValueCalls) {
        for &instance in &other.items {
            self.insert(instance);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.items.iter().copied()
    }
}

/// Per instance, the module atoms already expanded on the current path, plus
/// the terminal sentinel marking a fully computed instance.
#[derive(Clone, Debug, Default)]
pub(crate) struct AlphaTable {
    expanded: Vec<Vec<ModuleAtomId>>,
    fin: Vec<bool>,
}

impl AlphaTable {
    pub fn ensure_len(&mut self, len: usize) {
        if len > self.expanded.len() {
            self.expanded.resize(len, Vec::new());
            self.fin.resize(len, false);
        }
    }

    pub fn mark_expanded(&mut self, instance: InstanceId, atom: ModuleAtomId) {
        self.ensure_len(instance.index() + 1);
        let entry = &mut self.expanded[instance.index()];
        if !entry.contains(&atom) {
            entry.push(atom);
        }
    }

    pub fn is_expanded(&self, instance: InstanceId, atom: ModuleAtomId) -> bool {
        self.expanded
            .get(instance.index())
            .is_some_and(|entry| entry.contains(&atom))
    }

    /// Marks the instance fully computed.
    pub fn mark_fin(&mut self, instance: InstanceId) {
        self.ensure_len(instance.index() + 1);
        self.fin[instance.index()] = true;
    }

    pub fn is_fin(&self, instance: InstanceId) -> bool {
        self.fin.get(instance.index()).copied().unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.expanded.clear();
        self.fin.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::parse_instance_prefix;
    use super::InstanceTables;
    use super::ValueCalls;
    use crate::basic_types::Interpretation;
    use crate::registry::ModuleId;

    #[test]
    fn instance_interning_is_stable() {
        let mut tables = InstanceTables::new();
        let empty = Interpretation::new();
        let s = tables.intern_interpretation(&empty);

        let (first, fresh) = tables.intern_instance(ModuleId(0), s);
        assert!(fresh);
        let (second, fresh) = tables.intern_instance(ModuleId(0), s);
        assert!(!fresh);
        assert_eq!(first, second);
        assert_eq!(tables.num_instances(), 1);
        assert!(tables.mflag(first).is_empty());
    }

    #[test]
    fn instance_prefix_parsing() {
        assert_eq!(parse_instance_prefix("m12\u{b7}p1\u{b7}q"), Some(12));
        assert_eq!(parse_instance_prefix("m\u{b7}q"), None);
        assert_eq!(parse_instance_prefix("item"), None);
        assert_eq!(parse_instance_prefix("main\u{b7}q"), None);
    }

    #[test]
    fn value_calls_deduplicate_preserving_order() {
        use super::InstanceId;

        let mut calls = ValueCalls::singleton(InstanceId(2));
        calls.insert(InstanceId(0));
        calls.insert(InstanceId(2));

        let collected: Vec<_> = calls.iter().collect();
        assert_eq!(collected, vec![InstanceId(2), InstanceId(0)]);
    }
}
