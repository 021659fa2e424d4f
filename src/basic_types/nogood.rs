use super::Literal;

/// A set of signed literals that no model may satisfy simultaneously.
///
/// The literal list is canonical: sorted and duplicate-free. Two nogoods
/// built from the same literals in any order compare equal, which is what
/// the store's deduplication relies on.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Nogood {
    literals: Vec<Literal>,
}

impl Nogood {
    pub fn new(mut literals: Vec<Literal>) -> Nogood {
        literals.sort();
        literals.dedup();
        Nogood { literals }
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn contains(&self, literal: Literal) -> bool {
        self.literals.binary_search(&literal).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = Literal> + '_ {
        self.literals.iter().copied()
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    /// A nogood is tautological when it contains a literal and its
    /// complement; it can never be violated and is dropped on addition.
    pub fn is_tautological(&self) -> bool {
        self.literals
            .windows(2)
            .any(|pair| pair[0].atom() == pair[1].atom())
    }
}

impl From<Vec<Literal>> for Nogood {
    fn from(literals: Vec<Literal>) -> Nogood {
        Nogood::new(literals)
    }
}

impl FromIterator<Literal> for Nogood {
    fn from_iter<T: IntoIterator<Item = Literal>>(iter: T) -> Nogood {
        Nogood::new(iter.into_iter().collect())
    }
}

impl std::fmt::Display for Nogood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ ")?;
        for (position, literal) in self.literals.iter().enumerate() {
            if position > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{literal}")?;
        }
        write!(f, " }}")
    }
}

impl std::fmt::Debug for Nogood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::Nogood;
    use crate::basic_types::AtomId;
    use crate::basic_types::Literal;

    #[test]
    fn construction_is_canonical() {
        let a = Literal::positive(AtomId(1));
        let b = Literal::negative(AtomId(2));

        let first = Nogood::new(vec![b, a, a]);
        let second = Nogood::new(vec![a, b]);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn tautology_detection() {
        let a = Literal::positive(AtomId(1));
        let taut = Nogood::new(vec![a, !a]);
        assert!(taut.is_tautological());

        let plain = Nogood::new(vec![a, Literal::positive(AtomId(2))]);
        assert!(!plain.is_tautological());
    }
}
