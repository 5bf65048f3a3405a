//! Attaching clauses whose literal states are arbitrary.
use partial_ref::{partial, PartialRef};

use crate::clause::Clause;
use crate::context::{AssignmentP, Context, ImplGraphP, TrailP, WatchlistsP};

use super::enqueue_assignment;
use super::{Conflict, Reason};

/// Result of [`attach_clause`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AttachOutcome {
    /// The clause is now watched on two suitable literals.
    Attached,
    /// The clause forces its single non-false literal; the implication was
    /// enqueued and the clause itself was not attached.
    Implied,
}

/// Attach a clause that may be in any state under the current assignment,
/// partially or completely satisfied or falsified.
///
/// One pass over the literals caches a true, an undefined and a false
/// position and decides, in priority order: watch two true literals, watch a
/// true and an undefined one, watch two undefined ones, watch the only true
/// literal with any false one, enqueue the only non-false literal, or report
/// the conflict.
///
/// Callers run at decision level 0, so an enqueued implication is recorded
/// as a level 0 fact without keeping the clause as its antecedent; such a
/// clause is satisfied at level 0 from then on and the caller is expected to
/// discard it.
pub fn attach_clause(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
    ),
    clause: Clause,
) -> Result<AttachOutcome, Conflict> {
    let lits = clause.lits();

    let mut found_true = None;
    let mut found_undefined = None;
    let mut found_false = None;

    for (position, &lit) in lits.iter().enumerate() {
        match ctx.part(AssignmentP).lit_value(lit) {
            Some(true) => {
                if let Some(first) = found_true {
                    ctx.part_mut(WatchlistsP)
                        .attach_with_watches(clause, first, position);
                    return Ok(AttachOutcome::Attached);
                }
                if let Some(undefined) = found_undefined {
                    ctx.part_mut(WatchlistsP)
                        .attach_with_watches(clause, position, undefined);
                    return Ok(AttachOutcome::Attached);
                }
                found_true = Some(position);
            }
            Some(false) => {
                if found_false.is_none() {
                    found_false = Some(position);
                }
            }
            None => {
                if let Some(first) = found_true {
                    ctx.part_mut(WatchlistsP)
                        .attach_with_watches(clause, first, position);
                    return Ok(AttachOutcome::Attached);
                }
                if let Some(undefined) = found_undefined {
                    ctx.part_mut(WatchlistsP)
                        .attach_with_watches(clause, undefined, position);
                    return Ok(AttachOutcome::Attached);
                }
                found_undefined = Some(position);
            }
        }
    }

    match (found_true, found_undefined) {
        (Some(true_pos), None) => {
            // Satisfied with every other literal false; any false literal
            // serves as the second watch.
            let false_pos = match found_false {
                Some(position) => position,
                None => unreachable!("attached a unit clause as a long clause"),
            };
            ctx.part_mut(WatchlistsP)
                .attach_with_watches(clause, true_pos, false_pos);
            Ok(AttachOutcome::Attached)
        }
        (None, Some(undefined)) => {
            debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
            enqueue_assignment(ctx.borrow(), lits[undefined], Reason::Decision);
            Ok(AttachOutcome::Implied)
        }
        (None, None) => Err(Conflict::Long(clause)),
        (Some(_), Some(_)) => unreachable!("pair was attached during the scan"),
    }
}
