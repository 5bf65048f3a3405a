//! Per worker search statistics.

/// Counters describing one worker's search.
///
/// Reported through the log periodically and once when the worker stops.
#[derive(Default)]
pub struct Stats {
    pub decisions: u64,
    pub conflicts: u64,
    pub learnt_units: u64,
    pub learnt_binaries: u64,
    pub learnt_longs: u64,
    pub reduced: u64,
    pub probed: u64,
    pub failed_literals: u64,
    pub units_received: u64,
    pub binaries_received: u64,
    pub clauses_received: u64,
    pub clauses_rejected: u64,
}
