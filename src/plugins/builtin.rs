//! Built-in demo plugins, registered unconditionally at startup.

use super::InputKind;
use super::PluginFailure;
use super::PluginPredicate;
use super::PluginQuery;
use super::PluginRegistry;
use crate::registry::SymbolId;

pub fn register_builtin_plugins(registry: &mut PluginRegistry) {
    registry.register(Box::new(CountPlugin));
    registry.register(Box::new(MemberPlugin));
}

/// `&count[p](N)`: `N` is the number of atoms of predicate `p` in the input
/// interpretation. Nonmonotonic: growing the extension changes the answer.
struct CountPlugin;

impl PluginPredicate for CountPlugin {
    fn name(&self) -> &str {
        "count"
    }

    fn input_kinds(&self) -> &[InputKind] {
        &[InputKind::Predicate]
    }

    fn output_arity(&self) -> usize {
        1
    }

    fn monotonic(&self) -> bool {
        false
    }

    fn retrieve(&self, query: PluginQuery<'_>) -> Result<Vec<Vec<SymbolId>>, PluginFailure> {
        let predicate = query.input[0];
        let count = query
            .interpretation
            .iter()
            .filter(|&atom| query.atoms.predicate(atom) == predicate)
            .count();
        let number = query.symbols.intern(&count.to_string());
        Ok(vec![vec![number]])
    }
}

/// `&member[p](X)`: `X` ranges over the first arguments of the unary
/// extension of `p`.
struct MemberPlugin;

impl PluginPredicate for MemberPlugin {
    fn name(&self) -> &str {
        "member"
    }

    fn input_kinds(&self) -> &[InputKind] {
        &[InputKind::Predicate]
    }

    fn output_arity(&self) -> usize {
        1
    }

    fn retrieve(&self, query: PluginQuery<'_>) -> Result<Vec<Vec<SymbolId>>, PluginFailure> {
        let predicate = query.input[0];
        let mut tuples = Vec::new();
        for atom in query.interpretation.iter() {
            let tuple = query.atoms.tuple(atom);
            if tuple[0] == predicate && tuple.len() == 2 {
                tuples.push(vec![tuple[1]]);
            }
        }
        Ok(tuples)
    }
}

#[cfg(test)]
mod tests {
    use super::register_builtin_plugins;
    use super::PluginRegistry;
    use crate::basic_types::Interpretation;
    use crate::plugins::PluginQuery;
    use crate::registry::Registry;

    #[test]
    fn count_reports_the_extension_size() {
        let mut plugins = PluginRegistry::new();
        register_builtin_plugins(&mut plugins);

        let mut registry = Registry::new();
        let item = registry.symbols.intern("item");
        let one = registry.symbols.intern("1");
        let two = registry.symbols.intern("2");
        let mut interpretation = Interpretation::new();
        let _ = interpretation.insert(registry.atoms.intern(vec![item, one]));
        let _ = interpretation.insert(registry.atoms.intern(vec![item, two]));

        let count = plugins.get("count").expect("builtin");
        let tuples = count
            .retrieve(PluginQuery {
                interpretation: &interpretation,
                input: &[item],
                output_pattern: &[None],
                atoms: &registry.atoms,
                symbols: &mut registry.symbols,
            })
            .expect("retrieval succeeds");

        assert_eq!(tuples.len(), 1);
        assert_eq!(registry.symbols.resolve(tuples[0][0]), "2");
    }
}
