//! The reader boundary: parses the textual program format into the shared
//! registry tables. This is deliberately a thin frontend; the solver core
//! consumes the resulting modules and never looks at text again.

mod reader;

pub use reader::ProgramReader;
