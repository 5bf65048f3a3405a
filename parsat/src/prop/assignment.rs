//! Partial assignment, trail and backtracking.
use partial_ref::{partial, PartialRef};

use parsat_formula::{Lit, LitIdx, Var};

use crate::context::{AssignmentP, Context, ImplGraphP, TrailP, VsidsP};
use crate::decision::make_available;

use super::{Conflict, Reason};

/// Current partial assignment.
#[derive(Default)]
pub struct Assignment {
    assignment: Vec<Option<bool>>,
}

/// This compares two `Option<bool>` values as bytes. Workaround for bad code
/// generation.
pub fn fast_option_eq(a: Option<bool>, b: Option<bool>) -> bool {
    unsafe { std::mem::transmute::<_, u8>(a) == std::mem::transmute::<_, u8>(b) }
}

impl Assignment {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.assignment.resize(count, None);
    }

    /// Current partial assignment as slice.
    pub fn assignment(&self) -> &[Option<bool>] {
        &self.assignment
    }

    /// Value assigned to a variable.
    pub fn var_value(&self, var: Var) -> Option<bool> {
        self.assignment[var.index()]
    }

    /// Value assigned to a literal.
    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.assignment[lit.index()].map(|b| b ^ lit.is_negative())
    }

    pub fn lit_is_true(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], Some(lit.is_positive()))
    }

    pub fn lit_is_false(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], Some(lit.is_negative()))
    }

    pub fn lit_is_unk(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], None)
    }

    pub fn assign_lit(&mut self, lit: Lit) {
        self.assignment[lit.index()] = lit.is_positive().into()
    }

    pub fn unassign_var(&mut self, var: Var) {
        self.assignment[var.index()] = None;
    }
}

/// Decision and propagation history.
#[derive(Default)]
pub struct Trail {
    /// Stack of all propagated and enqueued assignments.
    trail: Vec<Lit>,
    /// Next assignment in the trail to propagate.
    queue_head_pos: usize,
    /// Decision levels as trail indices.
    decisions: Vec<LitIdx>,
}

impl Trail {
    /// Return the next assigned literal to propagate and advance the cursor.
    pub fn pop_queue(&mut self) -> Option<Lit> {
        let head = self.trail.get(self.queue_head_pos).cloned();
        if head.is_some() {
            self.queue_head_pos += 1;
        }
        head
    }

    /// Assigned literals in assignment order.
    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    /// Start a new decision level.
    ///
    /// Does not enqueue the decision itself.
    pub fn new_decision_level(&mut self) {
        self.decisions.push(self.trail.len() as LitIdx)
    }

    /// Current decision level.
    pub fn current_level(&self) -> usize {
        self.decisions.len()
    }

    /// The literals decided at each level, in level order.
    pub fn decision_lits<'a>(&'a self) -> impl Iterator<Item = Lit> + 'a {
        let trail = &self.trail;
        self.decisions
            .iter()
            .map(move |&pos| trail[pos as usize])
    }

    /// Whether all assignments are processed.
    pub fn fully_propagated(&self) -> bool {
        self.queue_head_pos == self.trail.len()
    }

    /// The number of assignments at level 0.
    pub fn top_level_assignment_count(&self) -> usize {
        self.decisions
            .get(0)
            .map(|&len| len as usize)
            .unwrap_or_else(|| self.trail.len())
    }

    /// Whether every variable is assigned.
    pub fn is_complete(&self, var_count: usize) -> bool {
        self.trail.len() == var_count
    }
}

/// Enqueues the assignment of true to a literal.
///
/// This updates the assignment and trail, but does not perform any
/// propagation. The literal has to be unassigned when calling this.
pub fn enqueue_assignment(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    lit: Lit,
    reason: Reason,
) {
    let assignment = ctx.part_mut(AssignmentP);
    debug_assert!(assignment.lit_value(lit) == None);

    assignment.assign_lit(lit);

    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    trail.trail.push(lit);

    let node = &mut ctx.part_mut(ImplGraphP).nodes[lit.index()];
    node.reason = reason;
    node.level = trail.decisions.len() as LitIdx;
}

/// Start a new decision level and enqueue the given decision literal.
pub fn decide(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    lit: Lit,
) {
    debug_assert!(ctx.part(AssignmentP).lit_is_unk(lit));
    debug_assert!(ctx.part(TrailP).fully_propagated());

    ctx.part_mut(TrailP).new_decision_level();
    enqueue_assignment(ctx.borrow(), lit, Reason::Decision);
}

/// Enqueue a forced assignment, detecting conflicting forces.
///
/// Returns `Ok` without touching anything if the literal is already
/// satisfied, and the conflicting clause if it is already falsified. The
/// reason must have an antecedent clause, as decisions cannot conflict.
pub fn enqueue_implication(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    lit: Lit,
    reason: Reason,
) -> Result<(), Conflict> {
    let assignment = ctx.part(AssignmentP);

    if assignment.lit_is_true(lit) {
        return Ok(());
    }

    if assignment.lit_is_false(lit) {
        return Err(match reason {
            Reason::Decision => unreachable!("conflicting implication without antecedent"),
            Reason::Binary([other]) => Conflict::Binary([lit, other]),
            Reason::Long(clause) => Conflict::Long(clause),
        });
    }

    enqueue_assignment(ctx.borrow(), lit, reason);
    Ok(())
}

/// Undo all assignments in decision levels deeper than the given level.
pub fn backtrack(
    mut ctx: partial!(Context, mut AssignmentP, mut TrailP, mut VsidsP),
    level: usize,
) {
    let (assignment, mut ctx) = ctx.split_part_mut(AssignmentP);
    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    if level == trail.decisions.len() {
        return;
    }

    let new_trail_len = trail.decisions[level] as usize;

    trail.queue_head_pos = new_trail_len;
    trail.decisions.truncate(level);

    let trail_end = &trail.trail[new_trail_len..];
    for &lit in trail_end {
        make_available(ctx.borrow(), lit.var());
        assignment.unassign_var(lit.var());
    }
    trail.trail.truncate(new_trail_len);
}

/// Undo all decisions.
pub fn restart(mut ctx: partial!(Context, mut AssignmentP, mut TrailP, mut VsidsP)) {
    backtrack(ctx.borrow(), 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parsat_formula::{lit, lits};

    use crate::context::set_var_count;

    #[test]
    fn decide_then_backtrack_restores_state() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 4);

        enqueue_assignment(ctx.borrow(), lit!(1), Reason::Decision);
        while ctx.part_mut(TrailP).pop_queue().is_some() {}

        let trail_before = ctx.part(TrailP).trail().to_owned();
        let values_before = ctx.part(AssignmentP).assignment().to_owned();

        decide(ctx.borrow(), lit!(-2));
        while ctx.part_mut(TrailP).pop_queue().is_some() {}
        decide(ctx.borrow(), lit!(3));
        enqueue_assignment(ctx.borrow(), lit!(4), Reason::Binary(lits![-3]));

        assert_eq!(ctx.part(TrailP).current_level(), 2);
        assert_eq!(ctx.part(TrailP).trail().len(), 4);

        backtrack(ctx.borrow(), 0);

        assert_eq!(ctx.part(TrailP).current_level(), 0);
        assert_eq!(ctx.part(TrailP).trail(), &trail_before[..]);
        assert_eq!(ctx.part(AssignmentP).assignment(), &values_before[..]);
    }

    #[test]
    fn enqueue_implication_detects_conflicts() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 3);

        decide(ctx.borrow(), lit!(1));

        // Compatible force is a no-op.
        assert!(enqueue_implication(ctx.borrow(), lit!(1), Reason::Binary(lits![2])).is_ok());
        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        // New force is enqueued.
        assert!(enqueue_implication(ctx.borrow(), lit!(2), Reason::Binary(lits![-1])).is_ok());
        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        // Conflicting force reports the antecedent clause.
        let conflict = enqueue_implication(ctx.borrow(), lit!(-2), Reason::Binary(lits![-1]))
            .unwrap_err();
        assert_eq!(conflict, Conflict::Binary([lit!(-2), lit!(-1)]));
    }

    #[test]
    fn decision_lits_in_level_order() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 3);

        decide(ctx.borrow(), lit!(2));
        enqueue_assignment(ctx.borrow(), lit!(-3), Reason::Binary(lits![-2]));
        while ctx.part_mut(TrailP).pop_queue().is_some() {}
        decide(ctx.borrow(), lit!(-1));

        let decisions: Vec<_> = ctx.part(TrailP).decision_lits().collect();
        assert_eq!(decisions, vec![lit!(2), lit!(-1)]);
    }
}
