//! Solver configuration.

/// Configurable parameters used during solving.
///
/// The policy mix itself (VSIDS with cached polarities, Luby restarts,
/// reduction by size, failed literal probing) is fixed at build time; these
/// values only tune it.
#[derive(Clone)]
pub struct SolverConfig {
    /// Multiplicative decay for the VSIDS decision heuristic.
    pub vsids_decay: f64,

    /// Scaling factor for Luby sequence based restarts (number of conflicts).
    pub restart_interval_scale: u64,

    /// Learnt clauses of at most this size survive every reduction.
    pub reduce_keep_size: usize,

    /// Largest learnt clause size that is shared with other workers.
    pub share_size_limit: usize,

    /// Divisor selecting the fraction of variables probed per ordinary
    /// simplification round.
    pub probe_divisor: usize,

    /// Number of conflicts between progress log lines.
    pub stats_interval: u64,

    /// Keep enumerating models after the first one was found.
    pub keep_going: bool,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            vsids_decay: 0.95,
            restart_interval_scale: 400,
            reduce_keep_size: 2,
            share_size_limit: 4,
            probe_divisor: 100,
            stats_interval: 5000,
            keep_going: false,
        }
    }
}
