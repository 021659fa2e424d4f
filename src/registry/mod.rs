//! The shared tables which assign stable integer ids to symbols, ground
//! atoms, module atoms and external atoms. All tables are append-only for the
//! duration of a solve: ids are never recycled, so they can be used as dense
//! indices everywhere else in the crate.

mod atom_table;
mod symbol_table;

pub use atom_table::AtomFlag;
pub use atom_table::AtomTable;
pub use symbol_table::SymbolId;
pub use symbol_table::SymbolTable;

use fnv::FnvHashMap;

use crate::basic_types::AtomId;
use crate::program::ExternalAtom;
use crate::program::Module;
use crate::program::ModuleAtom;

/// Separator between the instance prefix, the module qualifier and the plain
/// predicate name (`m0·p1·q`). Reserved: rejected in user-supplied symbols.
pub const INSTANCE_SEPARATOR: char = '\u{b7}';

/// Prefix of auxiliary predicates introduced by rewriting (`aux_r`,
/// `aux_body`, ...). Reserved: rejected in user-supplied symbols.
pub const AUX_PREFIX: &str = "aux_";

/// Index of a module in the registry's module list. Module identity is by
/// name; the id is its position in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u32);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into the module-atom table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModuleAtomId(pub u32);

/// Index into the external-atom table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExternalAtomId(pub u32);

/// The single owned registry per solve. Components borrow it for the duration
/// of the solve; no component stores it.
#[derive(Debug, Default)]
pub struct Registry {
    pub symbols: SymbolTable,
    pub atoms: AtomTable,
    modules: Vec<Module>,
    module_index: FnvHashMap<SymbolId, ModuleId>,
    module_atoms: Vec<ModuleAtom>,
    module_atom_index: FnvHashMap<ModuleAtom, ModuleAtomId>,
    externals: Vec<ExternalAtom>,
    external_index: FnvHashMap<ExternalAtom, ExternalAtomId>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Registers a module under its name. Redeclaring a name is a caller bug;
    /// the reader reports it as a parse error before we get here.
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        let previous = self.module_index.insert(module.name, id);
        hexkin_assert_simple!(previous.is_none(), "module declared twice");
        self.modules.push(module);
        id
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn module_by_name(&self, name: SymbolId) -> Option<ModuleId> {
        self.module_index.get(&name).copied()
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(index, module)| (ModuleId(index as u32), module))
    }

    /// The main modules are those with an empty formal input list, in
    /// declaration order.
    pub fn main_modules(&self) -> Vec<ModuleId> {
        self.modules()
            .filter(|(_, module)| module.formal_inputs.is_empty())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn intern_module_atom(&mut self, atom: ModuleAtom) -> ModuleAtomId {
        if let Some(&id) = self.module_atom_index.get(&atom) {
            return id;
        }
        let id = ModuleAtomId(self.module_atoms.len() as u32);
        self.module_atoms.push(atom.clone());
        let _ = self.module_atom_index.insert(atom, id);
        id
    }

    pub fn module_atom(&self, id: ModuleAtomId) -> &ModuleAtom {
        &self.module_atoms[id.0 as usize]
    }

    pub fn intern_external_atom(&mut self, atom: ExternalAtom) -> ExternalAtomId {
        if let Some(&id) = self.external_index.get(&atom) {
            return id;
        }
        let id = ExternalAtomId(self.externals.len() as u32);
        self.externals.push(atom.clone());
        let _ = self.external_index.insert(atom, id);
        id
    }

    pub fn external_atom(&self, id: ExternalAtomId) -> &ExternalAtom {
        &self.externals[id.0 as usize]
    }

    /// Renders a ground atom as `pred(arg, ...)` text.
    pub fn atom_text(&self, atom: AtomId) -> String {
        let tuple = self.atoms.tuple(atom);
        let predicate = self.symbols.resolve(tuple[0]);
        if tuple.len() == 1 {
            return predicate.to_owned();
        }
        let arguments: Vec<&str> = tuple[1..]
            .iter()
            .map(|&symbol| self.symbols.resolve(symbol))
            .collect();
        format!("{predicate}({})", arguments.join(","))
    }
}

use crate::hexkin_assert_simple;
