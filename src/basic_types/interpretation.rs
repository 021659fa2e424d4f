use super::AtomId;

const BLOCK_BITS: usize = 64;

/// A set of ground atoms, stored as a growable bitset over atom ids.
///
/// Interpretations are used both as truth assignments (the set of true atoms)
/// and as plain atom sets (projection masks, `MFlag` bitmaps). Trailing zero
/// blocks are trimmed after every mutation so that equality and hashing are
/// independent of capacity; interpretations serve as hash keys in the
/// input-interpretation table.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Interpretation {
    blocks: Vec<u64>,
}

impl Interpretation {
    pub fn new() -> Interpretation {
        Interpretation::default()
    }

    pub fn insert(&mut self, atom: AtomId) -> bool {
        let (block, bit) = Self::locate(atom);
        if block >= self.blocks.len() {
            self.blocks.resize(block + 1, 0);
        }
        let fresh = self.blocks[block] & (1 << bit) == 0;
        self.blocks[block] |= 1 << bit;
        fresh
    }

    pub fn remove(&mut self, atom: AtomId) -> bool {
        let (block, bit) = Self::locate(atom);
        if block >= self.blocks.len() {
            return false;
        }
        let present = self.blocks[block] & (1 << bit) != 0;
        self.blocks[block] &= !(1 << bit);
        self.trim();
        present
    }

    pub fn contains(&self, atom: AtomId) -> bool {
        let (block, bit) = Self::locate(atom);
        self.blocks.get(block).is_some_and(|b| b & (1 << bit) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|&b| b == 0)
    }

    pub fn count(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    pub fn union_with(&mut self, other: &Interpretation) {
        if other.blocks.len() > self.blocks.len() {
            self.blocks.resize(other.blocks.len(), 0);
        }
        for (target, source) in self.blocks.iter_mut().zip(&other.blocks) {
            *target |= source;
        }
    }

    pub fn intersect_with(&mut self, other: &Interpretation) {
        for (index, target) in self.blocks.iter_mut().enumerate() {
            *target &= other.blocks.get(index).copied().unwrap_or(0);
        }
        self.trim();
    }

    pub fn difference_with(&mut self, other: &Interpretation) {
        for (index, target) in self.blocks.iter_mut().enumerate() {
            *target &= !other.blocks.get(index).copied().unwrap_or(0);
        }
        self.trim();
    }

    pub fn is_disjoint(&self, other: &Interpretation) -> bool {
        self.blocks
            .iter()
            .zip(&other.blocks)
            .all(|(a, b)| a & b == 0)
    }

    pub fn is_subset(&self, other: &Interpretation) -> bool {
        self.blocks
            .iter()
            .enumerate()
            .all(|(index, block)| block & !other.blocks.get(index).copied().unwrap_or(0) == 0)
    }

    /// Iterates the contained atoms in increasing id order.
    pub fn iter(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.blocks.iter().enumerate().flat_map(|(index, &block)| {
            (0..BLOCK_BITS)
                .filter(move |bit| block & (1 << bit) != 0)
                .map(move |bit| AtomId((index * BLOCK_BITS + bit) as u32))
        })
    }

    fn locate(atom: AtomId) -> (usize, usize) {
        (atom.index() / BLOCK_BITS, atom.index() % BLOCK_BITS)
    }

    fn trim(&mut self) {
        while self.blocks.last() == Some(&0) {
            let _ = self.blocks.pop();
        }
    }
}

impl FromIterator<AtomId> for Interpretation {
    fn from_iter<T: IntoIterator<Item = AtomId>>(iter: T) -> Interpretation {
        let mut result = Interpretation::new();
        for atom in iter {
            let _ = result.insert(atom);
        }
        result
    }
}

impl std::fmt::Debug for Interpretation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::AtomId;
    use super::Interpretation;

    #[test]
    fn equality_ignores_capacity() {
        let mut grown = Interpretation::new();
        let _ = grown.insert(AtomId(2));
        let _ = grown.insert(AtomId(500));
        let _ = grown.remove(AtomId(500));

        let small: Interpretation = [AtomId(2)].into_iter().collect();
        assert_eq!(grown, small);
    }

    #[test]
    fn set_operations() {
        let mut left: Interpretation = [AtomId(1), AtomId(64), AtomId(70)].into_iter().collect();
        let right: Interpretation = [AtomId(64), AtomId(3)].into_iter().collect();

        assert!(!left.is_disjoint(&right));

        left.intersect_with(&right);
        assert_eq!(left.iter().collect::<Vec<_>>(), vec![AtomId(64)]);

        left.union_with(&right);
        assert!(right.is_subset(&left));

        left.difference_with(&right);
        assert!(left.is_empty());
    }

    #[test]
    fn iteration_is_ordered() {
        let set: Interpretation = [AtomId(130), AtomId(0), AtomId(65)].into_iter().collect();
        let collected: Vec<_> = set.iter().collect();
        assert_eq!(collected, vec![AtomId(0), AtomId(65), AtomId(130)]);
    }
}
