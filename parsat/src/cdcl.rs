//! Conflict driven clause learning.
use partial_ref::{partial, PartialRef};

use crate::analyze_conflict::analyze_conflict;
use crate::context::{
    AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseAllocP, ClauseDbP, Context, ImplGraphP,
    MessagesP, SolverConfigP, SolverStateP, StatsP, TrailP, VsidsP, WatchlistsP,
};
use crate::prop::{backtrack, enqueue_assignment, Conflict, Reason};
use crate::state::SatState;

/// Learn from a conflict and backjump.
///
/// Analyzes the conflict, backtracks to the asserting level, records the
/// learned clause, shares it with the peers and enqueues the asserting
/// literal. Returns `false` when the conflict happened at level 0, which
/// refutes the instance.
pub fn handle_conflict(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut MessagesP,
        mut SolverStateP,
        mut StatsP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    conflict: Conflict,
) -> bool {
    #[cfg(feature = "conflict-graph")]
    {
        let _ = crate::graphviz::dump_conflict(ctx.borrow(), &conflict);
    }

    if ctx.part(TrailP).current_level() == 0 {
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        return false;
    }

    let backtrack_to = analyze_conflict(ctx.borrow(), conflict);

    backtrack(ctx.borrow(), backtrack_to);

    let (analyze, mut ctx) = ctx.split_part(AnalyzeConflictP);
    let clause = analyze.clause();

    match clause.len() {
        0 => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            false
        }
        1 => {
            ctx.part_mut(StatsP).learnt_units += 1;
            ctx.part_mut(MessagesP).share_unit(clause[0]);
            enqueue_assignment(ctx.borrow(), clause[0], Reason::Decision);
            true
        }
        2 => {
            ctx.part_mut(StatsP).learnt_binaries += 1;
            ctx.part_mut(BinaryClausesP)
                .add_binary_clause([clause[0], clause[1]]);
            ctx.part_mut(MessagesP).share_binary([clause[0], clause[1]]);
            enqueue_assignment(ctx.borrow(), clause[0], Reason::Binary([clause[1]]));
            true
        }
        _ => {
            ctx.part_mut(StatsP).learnt_longs += 1;

            let nr_workers = ctx.part(MessagesP).nr_workers();
            let share =
                nr_workers > 1 && clause.len() <= ctx.part(SolverConfigP).share_size_limit;
            let refs = if share { nr_workers as u32 } else { 1 };

            let keep_size = ctx.part(SolverConfigP).reduce_keep_size;
            let learnt = ctx.part_mut(ClauseAllocP).allocate(true, refs, clause);

            // The asserting literal is at position 0 and a literal of the
            // backjump level at position 1, which are exactly the two most
            // relevant watches.
            ctx.part_mut(WatchlistsP).attach_with_watches(learnt, 0, 1);
            ctx.part_mut(ClauseDbP).attached(learnt, keep_size);

            if share {
                ctx.part_mut(MessagesP).share_clause(learnt);
            }

            enqueue_assignment(ctx.borrow(), clause[0], Reason::Long(learnt));
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parsat_formula::{cnf_formula, lit, lits};

    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::prop::{decide, propagate};

    #[test]
    fn level_0_conflict_is_unsat() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            1, 2, 3;
            -1;
            1, -2;
            2, -3;
        ];

        set_var_count(ctx.borrow(), formula.var_count());

        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }

        let conflict = propagate(ctx.borrow()).unwrap_err();
        assert!(!handle_conflict(ctx.borrow(), conflict));
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    #[test]
    fn learns_and_asserts_after_backjump() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 6);

        load_clause(ctx.borrow(), &lits![-1, 2]);
        load_clause(ctx.borrow(), &lits![-1, -2, 3]);
        load_clause(ctx.borrow(), &lits![-1, -2, -3]);

        decide(ctx.borrow(), lit!(5));
        assert!(propagate(ctx.borrow()).is_ok());

        decide(ctx.borrow(), lit!(1));
        let conflict = propagate(ctx.borrow()).unwrap_err();

        assert!(handle_conflict(ctx.borrow(), conflict));

        // The learned unit -1 asserts at level 0.
        assert_eq!(ctx.part(TrailP).current_level(), 0);
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(-1)));
        assert_eq!(ctx.part(StatsP).learnt_units, 1);

        assert!(propagate(ctx.borrow()).is_ok());
    }
}
