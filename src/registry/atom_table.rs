use enumset::EnumSet;
use enumset::EnumSetType;
use fnv::FnvHashMap;

use super::SymbolId;
use crate::basic_types::AtomId;

/// Per-atom marker flags.
///
/// `Auxiliary` atoms are introduced by rewriting and hidden from output via
/// the projection mask. `ExternalReplacement` atoms additionally stand for an
/// external atom's input/output tuple and are verified against the plugin on
/// every candidate model.
#[derive(EnumSetType, Debug)]
pub enum AtomFlag {
    Auxiliary,
    ExternalReplacement,
}

#[derive(Debug)]
struct AtomData {
    tuple: Vec<SymbolId>,
    flags: EnumSet<AtomFlag>,
}

/// The ground-atom table. An atom is identified by its tuple
/// `[predicate, arg, ...]`; interning the same tuple twice yields the same
/// id. Ids are dense and handed out in insertion order, which makes the table
/// usable as a watermark: everything at an index `>= n` was created after the
/// point where the table had `n` entries.
#[derive(Debug, Default)]
pub struct AtomTable {
    atoms: Vec<AtomData>,
    index: FnvHashMap<Vec<SymbolId>, AtomId>,
}

impl AtomTable {
    pub fn intern(&mut self, tuple: Vec<SymbolId>) -> AtomId {
        self.intern_with_flags(tuple, EnumSet::empty())
    }

    pub fn intern_with_flags(&mut self, tuple: Vec<SymbolId>, flags: EnumSet<AtomFlag>) -> AtomId {
        hexkin_assert_simple!(!tuple.is_empty(), "an atom needs at least a predicate");
        if let Some(&id) = self.index.get(&tuple) {
            self.atoms[id.index()].flags |= flags;
            return id;
        }
        let id = AtomId(self.atoms.len() as u32);
        let _ = self.index.insert(tuple.clone(), id);
        self.atoms.push(AtomData { tuple, flags });
        id
    }

    pub fn lookup(&self, tuple: &[SymbolId]) -> Option<AtomId> {
        self.index.get(tuple).copied()
    }

    pub fn tuple(&self, atom: AtomId) -> &[SymbolId] {
        &self.atoms[atom.index()].tuple
    }

    pub fn predicate(&self, atom: AtomId) -> SymbolId {
        self.atoms[atom.index()].tuple[0]
    }

    pub fn flags(&self, atom: AtomId) -> EnumSet<AtomFlag> {
        self.atoms[atom.index()].flags
    }

    pub fn is_auxiliary(&self, atom: AtomId) -> bool {
        self.flags(atom).contains(AtomFlag::Auxiliary)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// All atoms with an id at or after the given watermark.
    pub fn atoms_since(&self, watermark: usize) -> impl Iterator<Item = AtomId> + '_ {
        (watermark..self.atoms.len()).map(|index| AtomId(index as u32))
    }
}

use crate::hexkin_assert_simple;

#[cfg(test)]
mod tests {
    use enumset::EnumSet;

    use super::AtomFlag;
    use super::AtomTable;
    use crate::registry::SymbolId;

    #[test]
    fn interning_deduplicates() {
        let mut table = AtomTable::default();
        let first = table.intern(vec![SymbolId(0), SymbolId(1)]);
        let second = table.intern(vec![SymbolId(0), SymbolId(1)]);
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn reinterning_merges_flags() {
        let mut table = AtomTable::default();
        let atom = table.intern(vec![SymbolId(0)]);
        assert!(table.flags(atom).is_empty());

        let again = table.intern_with_flags(vec![SymbolId(0)], EnumSet::only(AtomFlag::Auxiliary));
        assert_eq!(atom, again);
        assert!(table.is_auxiliary(atom));
    }

    #[test]
    fn watermark_iteration() {
        let mut table = AtomTable::default();
        let _ = table.intern(vec![SymbolId(0)]);
        let watermark = table.len();
        let later = table.intern(vec![SymbolId(1)]);

        let fresh: Vec<_> = table.atoms_since(watermark).collect();
        assert_eq!(fresh, vec![later]);
    }
}
