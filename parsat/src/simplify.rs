//! Failed literal probing at decision level 0.
//!
//! Probing briefly decides a variable at level 1 and propagates. A conflict
//! proves the probed literal failed; the usual conflict analysis then turns
//! it into a level 0 unit (or refutes the instance). This is opportunistic
//! level 0 learning without entering the main search.

use partial_ref::{partial, PartialRef};

use parsat_formula::{Lit, Var};

use crate::cdcl::handle_conflict;
use crate::context::{
    AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseAllocP, ClauseDbP, Context, ImplGraphP,
    MessagesP, RngP, SimplifyP, SolverConfigP, SolverStateP, StatsP, TrailP, VsidsP, WatchlistsP,
};
use crate::prop::{backtrack, decide, propagate};

/// Probing round counter.
#[derive(Default)]
pub struct Simplify {
    rounds: u64,
}

/// Probe a random subset of the variables for failed literals.
///
/// Every 100th round probes a share of the variables proportional to the
/// worker count, other rounds a smaller fixed fraction. Returns `false` when
/// probing refuted the instance.
pub fn simplify(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut MessagesP,
        mut RngP,
        mut SimplifyP,
        mut SolverStateP,
        mut StatsP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let var_count = ctx.part(AssignmentP).assignment().len();
    if var_count == 0 {
        return true;
    }

    let rounds = ctx.part(SimplifyP).rounds;
    ctx.part_mut(SimplifyP).rounds += 1;

    let nr_probes = if rounds % 100 == 0 {
        var_count / ctx.part(MessagesP).nr_workers()
    } else {
        var_count / ctx.part(SolverConfigP).probe_divisor
    };

    let failed_before = ctx.part(StatsP).failed_literals;

    for _ in 0..nr_probes {
        let var = Var::from_index(ctx.part_mut(RngP).pick(var_count));

        if !probe(ctx.borrow(), var) {
            return false;
        }
    }

    ctx.part_mut(StatsP).probed += nr_probes as u64;

    let failed = ctx.part(StatsP).failed_literals - failed_before;
    if failed > 0 {
        log::info!("probing found {} failed literals", failed);
    }

    true
}

/// Probe both polarities of a single variable.
fn probe(
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
    var: Var,
) -> bool {
    for &polarity in [false, true].iter() {
        if ctx.part(AssignmentP).var_value(var).is_some() {
            return true;
        }

        decide(ctx.borrow(), Lit::from_var(var, polarity));

        while let Err(conflict) = propagate(ctx.borrow()) {
            ctx.part_mut(StatsP).failed_literals += 1;
            if !handle_conflict(ctx.borrow(), conflict) {
                return false;
            }
        }

        if ctx.part(TrailP).current_level() > 0 {
            backtrack(ctx.borrow(), 0);
        }
    }

    true
}
