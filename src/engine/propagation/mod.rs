pub(crate) mod external;
pub(crate) mod propagator;
pub(crate) mod unfounded;

pub(crate) use external::ExternalAtomEvaluator;
pub(crate) use external::VerificationPropagator;
pub(crate) use propagator::ExternalPropagator;
pub(crate) use propagator::NullPropagator;
pub(crate) use propagator::PropagationOutcome;
pub(crate) use propagator::PropagatorContext;
pub(crate) use unfounded::FixpointUnfoundedSetChecker;
pub(crate) use unfounded::TrivialUnfoundedSetChecker;
pub(crate) use unfounded::UnfoundedSetChecker;
