//! Decision heuristics.
//!
//! Branching variables come from VSIDS; the branching polarity is the cached
//! polarity of the variable, which is toggled on every use as a cheap
//! source of diversification between workers.

use partial_ref::{partial, PartialRef};

use parsat_formula::Var;

use crate::context::{AssignmentP, Context, ImplGraphP, PolarityP, TrailP, VsidsP};
use crate::prop::decide;
use crate::worker::WorkerRng;

pub mod vsids;

/// Cached branching polarity per variable.
#[derive(Default)]
pub struct Polarity {
    cache: Vec<bool>,
}

impl Polarity {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.cache.resize(count, false);
    }
}

/// Make a decision and enqueue it.
///
/// Returns `false` if no decision was made because all variables are
/// assigned.
pub fn make_decision(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut PolarityP,
        mut TrailP,
        mut VsidsP,
    ),
) -> bool {
    let decision_var = loop {
        match ctx.part_mut(VsidsP).pop() {
            None => return false,
            Some(var) => {
                if ctx.part(AssignmentP).var_value(var).is_none() {
                    break var;
                }
            }
        }
    };

    let (polarity, mut ctx) = ctx.split_part_mut(PolarityP);
    let cached = polarity.cache[decision_var.index()];
    polarity.cache[decision_var.index()] = !cached;

    decide(ctx.borrow(), decision_var.lit(cached));

    true
}

/// Insert a variable into the branching queue if not already present.
pub fn make_available(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
}

/// Bump a handful of random variables to break ties between workers.
pub fn diversify(
    mut ctx: partial!(Context, mut VsidsP),
    rng: &mut WorkerRng,
    var_count: usize,
) {
    if var_count == 0 {
        return;
    }
    for _ in 0..100 {
        ctx.part_mut(VsidsP).bump(Var::from_index(rng.pick(var_count)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parsat_formula::lit;

    use crate::context::set_var_count;
    use crate::prop::{backtrack, propagate};

    #[test]
    fn polarity_starts_false_and_toggles() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 1);

        assert!(make_decision(ctx.borrow()));
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(-1)));
        assert!(propagate(ctx.borrow()).is_ok());

        backtrack(ctx.borrow(), 0);

        assert!(make_decision(ctx.borrow()));
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(1)));
    }

    #[test]
    fn no_decision_when_complete() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 2);

        assert!(make_decision(ctx.borrow()));
        assert!(propagate(ctx.borrow()).is_ok());
        assert!(make_decision(ctx.borrow()));
        assert!(propagate(ctx.borrow()).is_ok());

        assert!(!make_decision(ctx.borrow()));
    }
}
