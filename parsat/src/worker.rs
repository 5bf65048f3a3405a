//! The per worker search loop.
//!
//! Every worker runs the same loop on its own copy of the instance: exchange
//! messages, check for a complete assignment, restart when the schedule says
//! so, otherwise decide and propagate until the conflicts run out. Workers
//! only ever communicate through the mailboxes and the exit flag.
use std::sync::mpsc::Sender;

use log::info;

use partial_ref::{partial, IntoPartialRefMut, PartialRef};

use rand::{rngs::SmallRng, Rng, SeedableRng};

use parsat_formula::{CnfFormula, Lit};

use crate::cdcl::handle_conflict;
use crate::clause::reduce::reduce;
use crate::context::{
    set_var_count, AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseAllocP, ClauseDbP,
    Context, ImplGraphP, MessagesP, PolarityP, RngP, ScheduleP, SharedStateP, SimplifyP,
    SolverConfigP, SolverStateP, StatsP, TmpDataP, TrailP, VsidsP, WatchlistsP,
};
use crate::decision::{diversify, make_decision};
use crate::load::load_clause;
use crate::messages::{flush_outgoing, receive_messages};
use crate::prop::{attach_clause, backtrack, enqueue_assignment, propagate, restart};
use crate::prop::{AttachOutcome, Reason};
use crate::simplify::simplify;
use crate::state::SatState;

/// Per worker random number generator.
pub struct WorkerRng {
    rng: SmallRng,
}

impl Default for WorkerRng {
    fn default() -> WorkerRng {
        WorkerRng {
            rng: SmallRng::seed_from_u64(0),
        }
    }
}

impl WorkerRng {
    /// Reset the generator to a fixed seed.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// A uniformly random index below `bound`.
    pub fn pick(&mut self, bound: usize) -> usize {
        self.rng.gen_range(0, bound)
    }
}

/// What a worker reports back to the driver.
pub(crate) enum Event {
    /// A full satisfying assignment.
    Model(Vec<Lit>),
    /// The worker stopped searching in the given state.
    Finished(SatState),
}

/// Prepare a fresh context for the given worker slot.
pub fn setup(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut MessagesP,
        mut PolarityP,
        mut RngP,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    formula: &CnfFormula,
    id: usize,
    nr_workers: usize,
    seed: u64,
) {
    ctx.part_mut(ClauseAllocP).set_owner(id);
    ctx.part_mut(MessagesP).init(id, nr_workers);
    ctx.part_mut(WatchlistsP).set_worker_count(nr_workers);

    set_var_count(ctx.borrow(), formula.var_count());

    let decay = ctx.part(SolverConfigP).vsids_decay;
    ctx.part_mut(VsidsP).set_decay(decay);

    ctx.part_mut(RngP).reseed(seed);
    {
        let (rng, mut tie_break_ctx) = ctx.split_part_mut(RngP);
        diversify(tie_break_ctx.borrow(), rng, formula.var_count());
    }

    for clause in formula.iter() {
        load_clause(ctx.borrow(), clause);
    }

    let scale = ctx.part(SolverConfigP).restart_interval_scale;
    ctx.part_mut(ScheduleP).prime(scale);
}

/// Run the search until a verdict is reached or an exit is requested.
pub fn run(context: &mut Context, formula: &CnfFormula, events: &Sender<Event>) {
    let mut ctx = context.into_partial_ref_mut();

    let var_count = formula.var_count();
    let id = ctx.part(MessagesP).id();

    info!("worker {} started", id);

    // Settle the loaded units and probe once before searching.
    if ctx.part(SolverStateP).sat_state == SatState::Unknown {
        if let Err(conflict) = propagate(ctx.borrow()) {
            handle_conflict(ctx.borrow(), conflict);
        } else {
            simplify(ctx.borrow());
        }
    }

    while ctx.part(SolverStateP).sat_state == SatState::Unknown {
        if ctx.part(SharedStateP).exit_requested() {
            break;
        }

        flush_outgoing(ctx.borrow());
        receive_messages(ctx.borrow());

        if ctx.part(TrailP).is_complete(var_count) {
            if !found_model(ctx.borrow(), formula, events) {
                break;
            }
            continue;
        }

        if ctx.part(ScheduleP).restart_due() {
            do_restart(ctx.borrow());
            continue;
        }

        if !make_decision(ctx.borrow()) {
            // All variables assigned; the next iteration reports the model.
            continue;
        }
        ctx.part_mut(StatsP).decisions += 1;

        while let Err(conflict) = propagate(ctx.borrow()) {
            ctx.part_mut(ScheduleP).on_conflict();
            ctx.part_mut(StatsP).conflicts += 1;

            if !handle_conflict(ctx.borrow(), conflict) {
                break;
            }

            let interval = ctx.part(SolverConfigP).stats_interval;
            if interval > 0 && ctx.part(StatsP).conflicts % interval == 0 {
                log_progress(ctx.borrow());
            }

            if ctx.part(ScheduleP).restart_due() {
                break;
            }
        }
    }

    let verdict = ctx.part(SolverStateP).sat_state;
    if verdict != SatState::Unknown {
        ctx.part(SharedStateP).request_exit();
    }

    events.send(Event::Finished(verdict)).ok();

    log_summary(ctx.borrow());

    // Park until every worker stopped searching; afterwards dropping this
    // context cannot free clauses a peer still reads.
    ctx.part(SharedStateP).wait_shutdown();
}

/// Report a complete assignment and, when enumerating, block it and keep
/// searching.
///
/// Returns `false` when the search is finished.
fn found_model(
    mut ctx: partial!(
        Context,
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
    formula: &CnfFormula,
    events: &Sender<Event>,
) -> bool {
    debug_assert!(formula.iter().all(|clause| {
        clause
            .iter()
            .any(|&lit| ctx.part(AssignmentP).lit_is_true(lit))
    }));

    let model: Vec<Lit> = ctx
        .part(AssignmentP)
        .assignment()
        .iter()
        .enumerate()
        .map(|(index, &value)| Lit::from_index(index, value == Some(true)))
        .collect();

    events.send(Event::Model(model)).ok();
    ctx.part_mut(SolverStateP).models_found += 1;

    if !ctx.part(SolverConfigP).keep_going || ctx.part(TrailP).current_level() == 0 {
        ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
        return false;
    }

    // Negate the current decisions to block this model, then continue like
    // after any other learned clause.
    let blocking: Vec<Lit> = ctx.part(TrailP).decision_lits().map(|lit| !lit).collect();

    backtrack(ctx.borrow(), 0);

    match blocking[..] {
        [] => unreachable!("keep going at level 0 terminates the search"),
        [lit] => {
            ctx.part_mut(MessagesP).share_unit(lit);
            enqueue_assignment(ctx.borrow(), lit, Reason::Decision);
        }
        [lit_0, lit_1] => {
            ctx.part_mut(BinaryClausesP)
                .add_binary_clause([lit_0, lit_1]);
            ctx.part_mut(MessagesP).share_binary([lit_0, lit_1]);
        }
        ref lits => {
            let nr_workers = ctx.part(MessagesP).nr_workers();
            let share = nr_workers > 1 && lits.len() <= ctx.part(SolverConfigP).share_size_limit;
            let refs = if share { nr_workers as u32 } else { 1 };
            let keep_size = ctx.part(SolverConfigP).reduce_keep_size;

            let clause = ctx.part_mut(ClauseAllocP).allocate(true, refs, lits);
            ctx.part_mut(WatchlistsP).attach_with_watches(clause, 0, 1);
            ctx.part_mut(ClauseDbP).attached(clause, keep_size);
            if share {
                ctx.part_mut(MessagesP).share_clause(clause);
            }
        }
    }

    if let Err(conflict) = propagate(ctx.borrow()) {
        // The blocking clauses exhausted the model space.
        let _ = conflict;
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        return false;
    }

    true
}

/// Restart: back to level 0, merge peer knowledge, probe and reduce.
fn do_restart(
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
        mut ScheduleP,
        mut SimplifyP,
        mut SolverStateP,
        mut StatsP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    restart(ctx.borrow());

    if !integrate_pending(ctx.borrow()) {
        return;
    }

    if !simplify(ctx.borrow()) {
        return;
    }

    reduce(ctx.borrow());

    let scale = ctx.part(SolverConfigP).restart_interval_scale;
    ctx.part_mut(ScheduleP).restart_performed(scale);
}

/// Integrate the buffered peer messages at a restart boundary.
///
/// Shared units and binaries become level 0 knowledge, shared long clauses
/// are attached unless level 0 knowledge already satisfies them, in which
/// case the owner is told to drop our reference. Returns `false` when the
/// merged knowledge refutes the instance.
fn integrate_pending(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut MessagesP,
        mut SolverStateP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    loop {
        let lit = match ctx.part_mut(MessagesP).pending_units.pop() {
            Some(lit) => lit,
            None => break,
        };

        if ctx.part(AssignmentP).lit_is_false(lit) {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            return false;
        }
        if ctx.part(AssignmentP).lit_is_unk(lit) {
            enqueue_assignment(ctx.borrow(), lit, Reason::Decision);
        }
    }

    if propagate(ctx.borrow()).is_err() {
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        return false;
    }

    loop {
        let [lit_0, lit_1] = match ctx.part_mut(MessagesP).pending_binaries.pop() {
            Some(lits) => lits,
            None => break,
        };

        let assignment = ctx.part(AssignmentP);
        if assignment.lit_is_true(lit_0) || assignment.lit_is_true(lit_1) {
            continue;
        }

        match (assignment.lit_is_false(lit_0), assignment.lit_is_false(lit_1)) {
            (true, true) => {
                ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
                return false;
            }
            (true, false) => enqueue_assignment(ctx.borrow(), lit_1, Reason::Decision),
            (false, true) => enqueue_assignment(ctx.borrow(), lit_0, Reason::Decision),
            (false, false) => {
                ctx.part_mut(BinaryClausesP)
                    .add_binary_clause([lit_0, lit_1]);
            }
        }
    }

    if propagate(ctx.borrow()).is_err() {
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        return false;
    }

    loop {
        let clause = match ctx.part_mut(MessagesP).pending_clauses.pop() {
            Some(clause) => clause,
            None => break,
        };

        let redundant = {
            let assignment = ctx.part(AssignmentP);
            clause.lits().iter().any(|&lit| assignment.lit_is_true(lit))
        };

        if redundant {
            ctx.part_mut(StatsP).clauses_rejected += 1;
            ctx.part_mut(MessagesP)
                .notify_detach(clause.owner(), clause.index());
            continue;
        }

        match attach_clause(ctx.borrow(), clause) {
            Ok(AttachOutcome::Attached) => {
                let keep_size = ctx.part(SolverConfigP).reduce_keep_size;
                ctx.part_mut(ClauseDbP).attached(clause, keep_size);
            }
            Ok(AttachOutcome::Implied) => {
                // The clause collapsed to a unit, which is now level 0
                // knowledge; our reference to the clause itself is dropped.
                ctx.part_mut(StatsP).clauses_rejected += 1;
                ctx.part_mut(MessagesP)
                    .notify_detach(clause.owner(), clause.index());
            }
            Err(_) => {
                ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
                return false;
            }
        }
    }

    if propagate(ctx.borrow()).is_err() {
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        return false;
    }

    true
}

fn log_progress(
    mut ctx: partial!(
        Context,
        AssignmentP,
        BinaryClausesP,
        ClauseDbP,
        MessagesP,
        ScheduleP,
        StatsP,
        TrailP,
    ),
) {
    let stats = ctx.part(StatsP);
    info!(
        "worker {}: confl: {}k rest: {} vars: {} bin: {} long: {} learnt: {}",
        ctx.part(MessagesP).id(),
        stats.conflicts / 1000,
        ctx.part(ScheduleP).restarts(),
        ctx.part(AssignmentP).assignment().len()
            - ctx.part(TrailP).top_level_assignment_count(),
        ctx.part(BinaryClausesP).count(),
        ctx.part(ClauseDbP).long_count(),
        ctx.part(ClauseDbP).learnt_count(),
    );
}

fn log_summary(
    mut ctx: partial!(Context, MessagesP, ScheduleP, SolverStateP, StatsP),
) {
    let stats = ctx.part(StatsP);
    info!(
        "worker {} stopping: {} conflicts, {} decisions, {} restarts, \
         {} models, learnt {}/{}/{} (unit/binary/long), reduced {}, \
         received {}/{}/{} (units/binaries/clauses), rejected {}, \
         {} failed literals",
        ctx.part(MessagesP).id(),
        stats.conflicts,
        stats.decisions,
        ctx.part(ScheduleP).restarts(),
        ctx.part(SolverStateP).models_found,
        stats.learnt_units,
        stats.learnt_binaries,
        stats.learnt_longs,
        stats.reduced,
        stats.units_received,
        stats.binaries_received,
        stats.clauses_received,
        stats.clauses_rejected,
        stats.failed_literals,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc::channel;

    use parsat_formula::cnf_formula;

    use partial_ref::IntoPartialRefMut;

    fn run_single(formula: &CnfFormula) -> (SatState, Vec<Vec<Lit>>) {
        let mut context = Box::new(Context::default());
        {
            let mut ctx = context.into_partial_ref_mut();
            setup(ctx.borrow(), formula, 0, 1, 42);
        }

        let (events_in, events) = channel();
        run(&mut context, formula, &events_in);
        drop(events_in);

        let mut state = SatState::Unknown;
        let mut models = vec![];
        while let Ok(event) = events.try_recv() {
            match event {
                Event::Model(model) => models.push(model),
                Event::Finished(sat_state) => state = sat_state,
            }
        }
        (state, models)
    }

    #[test]
    fn single_worker_sat() {
        let formula = cnf_formula![
            1, 2;
            -1, 2;
            1, -2;
        ];

        let (state, models) = run_single(&formula);
        assert_eq!(state, SatState::Sat);
        assert_eq!(models.len(), 1);

        let model = &models[0];
        for clause in formula.iter() {
            assert!(clause.iter().any(|lit| model.contains(lit)));
        }
    }

    #[test]
    fn single_worker_unsat() {
        let formula = cnf_formula![
            1, 2;
            -1, 2;
            1, -2;
            -1, -2;
        ];

        let (state, models) = run_single(&formula);
        assert_eq!(state, SatState::Unsat);
        assert!(models.is_empty());
    }

    #[test]
    fn keep_going_enumerates_both_models() {
        let formula = cnf_formula![
            1, 2;
            -1, -2;
        ];

        let mut context = Box::new(Context::default());
        context.solver_config.keep_going = true;
        {
            let mut ctx = context.into_partial_ref_mut();
            setup(ctx.borrow(), &formula, 0, 1, 7);
        }

        let (events_in, events) = channel();
        run(&mut context, &formula, &events_in);
        drop(events_in);

        let mut models = vec![];
        while let Ok(event) = events.try_recv() {
            if let Event::Model(model) = event {
                models.push(model);
            }
        }

        models.sort();
        models.dedup();
        assert_eq!(models.len(), 2);
    }
}
