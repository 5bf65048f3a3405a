//! Learnt clause reduction.
//!
//! After every restart, the learnt clauses above the keep size are sorted by
//! size and the larger half is detached. Short clauses are never candidates
//! and survive indefinitely.
use std::mem::replace;

use partial_ref::{partial, PartialRef};

use crate::context::{ClauseAllocP, ClauseDbP, Context, MessagesP, StatsP, WatchlistsP};

use super::db::detach_clause;

/// Detach the larger half of the reducible learnt clauses.
pub fn reduce(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut MessagesP,
        mut StatsP,
        mut WatchlistsP,
    ),
) {
    let mut candidates = replace(&mut ctx.part_mut(ClauseDbP).reducible, vec![]);

    if candidates.len() >= 2 {
        candidates.sort_unstable_by_key(|clause| clause.len());

        let keep = candidates.len() - candidates.len() / 2;
        for clause in candidates.drain(keep..) {
            detach_clause(ctx.borrow(), clause);
            ctx.part_mut(StatsP).reduced += 1;
        }
    }

    ctx.part_mut(ClauseDbP).reducible = candidates;
}
