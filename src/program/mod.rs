//! The program data model: possibly non-ground rules as produced by the
//! reader and the MLP rewriter, and the ground programs consumed by the CDNL
//! engine. The [`grounder`] instantiates the former into the latter.

mod grounder;
mod rule;

pub(crate) use grounder::ground;
pub(crate) use grounder::GroundingContext;
pub use rule::AnnotatedGroundProgram;
pub use rule::AtomPattern;
pub use rule::ExternalAtom;
pub use rule::ExternalInstance;
pub use rule::GroundProgram;
pub use rule::GroundRule;
pub use rule::Module;
pub use rule::ModuleAtom;
pub use rule::Rule;
pub use rule::RuleBodyLiteral;
pub use rule::RuleFlag;
pub use rule::Term;
pub use rule::WeightBody;
