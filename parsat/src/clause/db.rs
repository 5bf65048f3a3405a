//! Bookkeeping for attached long clauses.
use partial_ref::{partial, PartialRef};

use crate::context::{ClauseAllocP, ClauseDbP, Context, MessagesP, WatchlistsP};

use super::Clause;

/// Attached long clauses of one worker.
///
/// Tracks the learnt clauses that are candidates for reduction; everything
/// else about an attached clause lives in the watchlists and the allocator.
#[derive(Default)]
pub struct ClauseDb {
    /// Learnt clauses above the keep size, in attachment order.
    pub(super) reducible: Vec<Clause>,
    long_count: usize,
    learnt_count: usize,
}

impl ClauseDb {
    /// Record a newly attached long clause.
    pub fn attached(&mut self, clause: Clause, keep_size: usize) {
        self.long_count += 1;
        if clause.is_learnt() {
            self.learnt_count += 1;
            if clause.len() > keep_size {
                self.reducible.push(clause);
            }
        }
    }

    /// Record a detached long clause.
    pub fn detached(&mut self, clause: Clause) {
        self.long_count -= 1;
        if clause.is_learnt() {
            self.learnt_count -= 1;
        }
    }

    /// Number of attached long clauses.
    pub fn long_count(&self) -> usize {
        self.long_count
    }

    /// Number of attached learnt long clauses.
    pub fn learnt_count(&self) -> usize {
        self.learnt_count
    }
}

/// Detach a long clause and route its reference back to the owner.
///
/// The owning worker drops the reference directly; for a foreign clause the
/// index is queued as a detach notification towards the owner. Must not be
/// called for a clause that is the antecedent of an assignment above level
/// 0.
pub fn detach_clause(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut MessagesP,
        mut WatchlistsP,
    ),
    clause: Clause,
) {
    ctx.part_mut(WatchlistsP).detach(clause);
    ctx.part_mut(ClauseDbP).detached(clause);

    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    if clause.owner() == alloc.owner() {
        alloc.free(clause.index());
    } else {
        ctx.part_mut(MessagesP)
            .notify_detach(clause.owner(), clause.index());
    }
}
