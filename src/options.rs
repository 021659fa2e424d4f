//! Solver configuration.

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Options which determine how the solver behaves. Passing the random
/// generator as a field allows seeding the randomisation; model enumeration
/// order is identical across runs for a fixed seed and input.
#[derive(Debug)]
pub struct SolverOptions {
    /// Random generator used for optional decision tie-breaking.
    pub random_generator: SmallRng,
    /// Break activity ties randomly instead of by insertion order.
    pub random_tiebreak: bool,
    /// Decay literal activities multiplicatively after this many conflicts.
    pub activity_decay_interval: u64,
    /// The multiplicative activity decay factor.
    pub activity_decay_factor: f64,
    /// Unit of the Luby restart sequence, in conflicts.
    pub luby_unit: u64,
    /// Stop after this many answer sets; `None` enumerates all of them.
    pub max_models: Option<u64>,
    /// Cache external-atom query results by (atom, interpretation, input).
    pub external_cache: bool,
    /// Reject value-call cycles over non-empty input instantiations instead
    /// of silently unioning them.
    pub reject_nonempty_cycles: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            random_generator: SmallRng::seed_from_u64(42),
            random_tiebreak: false,
            activity_decay_interval: 256,
            activity_decay_factor: 0.95,
            luby_unit: 32,
            max_models: None,
            external_cache: true,
            reject_nonempty_cycles: true,
        }
    }
}
