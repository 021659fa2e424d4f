//! Termination conditions polled by the engine after propagation. Stopping is
//! cooperative: the current state transition finishes cleanly and the solver
//! reports "no model"; no outstanding external call is interrupted mid-flight.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

pub trait TerminationCondition {
    fn should_stop(&mut self) -> bool;
}

/// Never stops.
#[derive(Clone, Copy, Debug, Default)]
pub struct Indefinite;

impl TerminationCondition for Indefinite {
    fn should_stop(&mut self) -> bool {
        false
    }
}

/// Stops once the wall-clock budget is spent.
#[derive(Clone, Copy, Debug)]
pub struct TimeBudget {
    deadline: Instant,
}

impl TimeBudget {
    pub fn starting_now(budget: Duration) -> TimeBudget {
        TimeBudget {
            deadline: Instant::now() + budget,
        }
    }
}

impl TerminationCondition for TimeBudget {
    fn should_stop(&mut self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// A cancellation flag that can be shared with other owners (e.g. a signal
/// handler). Setting it makes the next state transition finalise cleanly.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Cancellation {
        Cancellation::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl TerminationCondition for Cancellation {
    fn should_stop(&mut self) -> bool {
        self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::Cancellation;
    use super::TerminationCondition;
    use super::TimeBudget;
    use std::time::Duration;

    #[test]
    fn cancellation_is_shared() {
        let flag = Cancellation::new();
        let mut observer = flag.clone();
        assert!(!observer.should_stop());
        flag.cancel();
        assert!(observer.should_stop());
    }

    #[test]
    fn spent_budget_stops() {
        let mut budget = TimeBudget::starting_now(Duration::from_secs(0));
        assert!(budget.should_stop());
    }
}
