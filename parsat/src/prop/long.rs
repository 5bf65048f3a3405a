//! Propagation of long clauses.
use partial_ref::{partial, PartialRef};

use parsat_formula::Lit;

use crate::clause::Clause;
use crate::context::{AssignmentP, Context, ImplGraphP, TrailP, WatchlistsP};

use super::enqueue_assignment;
use super::{Conflict, Reason};

/// How many watchlist entries ahead of the cursor to prefetch.
///
/// Clause payloads are spread over the heap, so by the time a clause is
/// inspected its cache miss has to be already in flight for the walk to not
/// stall on memory.
const PREFETCH_DISTANCE: usize = 4;

#[inline(always)]
fn prefetch_clause(clause: Clause) {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
        _mm_prefetch(clause.raw() as *const i8, _MM_HINT_T0);
    }
    #[cfg(not(target_arch = "x86_64"))]
    let _ = clause;
}

/// What the watchlist scan decided about a single watching clause.
enum Scan {
    /// A true literal was found, the watches can stay.
    Satisfied,
    /// A non-false unwatched literal can take over the falsified watch.
    NewWatch { position: usize, lit: Lit },
    /// Every candidate is false, the other watched literal is forced.
    Forced,
}

/// Propagate all literals implied by long clauses watched by the given
/// literal.
///
/// On conflict returns the long clause propagating the conflicting
/// assignment.
pub fn propagate_long(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
    ),
    lit: Lit,
) -> Result<(), Conflict> {
    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);

    let mut watchers = watchlists.take_watchers(lit);

    for &clause in watchers.iter().take(PREFETCH_DISTANCE) {
        prefetch_clause(clause);
    }

    let false_lit = !lit;

    let mut result = Ok(());
    let mut read = 0;
    let mut write = 0;

    'watchers: while read < watchers.len() {
        let clause = watchers[read];
        read += 1;

        if let Some(&ahead) = watchers.get(read + PREFETCH_DISTANCE - 1) {
            prefetch_clause(ahead);
        }

        let indices = watchlists.watch_indices(clause);
        let lits = clause.lits();

        // Identify which of the two watches was falsified.
        let k = (lits[indices.get(1)] == false_lit) as usize;
        debug_assert!(lits[indices.get(k)] == false_lit);
        debug_assert!(lits[indices.get(k ^ 1)] != false_lit);

        let scan = {
            let assignment = ctx.part(AssignmentP);
            let mut found = Scan::Forced;
            for (position, &candidate) in lits.iter().enumerate() {
                if assignment.lit_is_true(candidate) {
                    found = Scan::Satisfied;
                    break;
                }
                if assignment.lit_is_false(candidate) {
                    continue;
                }
                if position == indices.get(k ^ 1) {
                    continue;
                }
                found = Scan::NewWatch {
                    position,
                    lit: candidate,
                };
                break;
            }
            found
        };

        match scan {
            Scan::Satisfied => {
                watchers[write] = clause;
                write += 1;
            }
            Scan::NewWatch { position, lit: new_lit } => {
                debug_assert!(new_lit != false_lit);
                watchlists.set_watch(clause, k, position);
                watchlists.add_watch(!new_lit, clause);
            }
            Scan::Forced => {
                let other = lits[indices.get(k ^ 1)];

                watchers[write] = clause;
                write += 1;

                // A true other watch was caught by the scan, so the clause
                // is either propagating or in conflict here.
                if ctx.part(AssignmentP).lit_is_false(other) {
                    while read < watchers.len() {
                        watchers[write] = watchers[read];
                        write += 1;
                        read += 1;
                    }
                    result = Err(Conflict::Long(clause));
                    break 'watchers;
                }

                enqueue_assignment(ctx.borrow(), other, Reason::Long(clause));
            }
        }
    }

    watchers.truncate(write);
    watchlists.restore_watchers(lit, watchers);

    result
}
