//! Unit propagation.
use partial_ref::{partial, PartialRef};

use crate::context::{
    AssignmentP, BinaryClausesP, Context, ImplGraphP, TrailP, WatchlistsP,
};

pub mod assignment;
pub mod attach;
pub mod binary;
pub mod graph;
pub mod long;
pub mod watch;

pub use assignment::{
    backtrack, decide, enqueue_assignment, enqueue_implication, restart, Assignment, Trail,
};
pub use attach::{attach_clause, AttachOutcome};
pub use graph::{Conflict, ImplGraph, ImplNode, Reason};
pub use watch::Watchlists;

/// Propagate all enqueued assignments to a fixpoint.
///
/// Drains the trail queue, propagating binary clauses before long clauses
/// for each literal. On conflict the queue cursor stays behind the
/// unprocessed suffix, which `backtrack` resets.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
        BinaryClausesP,
    ),
) -> Result<(), Conflict> {
    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        binary::propagate_binary(ctx.borrow(), lit)?;
        long::propagate_long(ctx.borrow(), lit)?;
    }

    Ok(())
}
