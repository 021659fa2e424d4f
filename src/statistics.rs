//! Counters updated during the search. The collector is injected into the
//! components that update it and logged as a block at the end of a solve.

use log::info;

pub fn log_statistic(name: &str, value: impl std::fmt::Display) {
    info!("%% {name}={value}");
}

/// A set of counters updated during the solving process.
#[derive(Clone, Copy, Debug, Default)]
pub struct Statistics {
    pub num_decisions: u64,
    pub num_conflicts: u64,
    pub num_propagations: u64,
    pub num_learned_nogoods: u64,
    pub num_restarts: u64,
    pub num_models: u64,
    pub num_module_instantiations: u64,
    pub num_external_queries: u64,
    pub num_external_cache_hits: u64,
}

impl Statistics {
    pub fn absorb(&mut self, other: &Statistics) {
        self.num_decisions += other.num_decisions;
        self.num_conflicts += other.num_conflicts;
        self.num_propagations += other.num_propagations;
        self.num_learned_nogoods += other.num_learned_nogoods;
        self.num_restarts += other.num_restarts;
        self.num_models += other.num_models;
        self.num_module_instantiations += other.num_module_instantiations;
        self.num_external_queries += other.num_external_queries;
        self.num_external_cache_hits += other.num_external_cache_hits;
    }

    pub fn log_statistics(&self) {
        log_statistic("numberOfDecisions", self.num_decisions);
        log_statistic("numberOfConflicts", self.num_conflicts);
        log_statistic("numberOfPropagations", self.num_propagations);
        log_statistic("numberOfLearnedNogoods", self.num_learned_nogoods);
        log_statistic("numberOfRestarts", self.num_restarts);
        log_statistic("numberOfModels", self.num_models);
        log_statistic("numberOfModuleInstantiations", self.num_module_instantiations);
        log_statistic("numberOfExternalQueries", self.num_external_queries);
        log_statistic("numberOfExternalCacheHits", self.num_external_cache_hits);
    }
}
