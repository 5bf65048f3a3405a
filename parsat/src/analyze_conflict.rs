//! Learns a new clause by analyzing a conflict.
use std::mem::swap;

use partial_ref::{partial, PartialRef};

use vec_mut_scan::VecMutScan;

use parsat_formula::{Lit, Var};

use crate::context::{AnalyzeConflictP, Context, ImplGraphP, TrailP, VsidsP};
use crate::prop::{Conflict, Reason};

/// Temporaries for conflict analysis.
#[derive(Default)]
pub struct AnalyzeConflict {
    /// This is the learned clause after analysis finishes.
    clause: Vec<Lit>,
    /// Number of literals in the current clause at the current level.
    current_level_count: usize,
    /// Variables in the current clause.
    var_flags: Vec<bool>,
    /// Entries to clean in `var_flags`.
    to_clean: Vec<Var>,
    /// Stack for recursive minimization.
    stack: Vec<Lit>,
}

impl AnalyzeConflict {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_flags.resize(count, false);
    }

    /// The learned clause.
    ///
    /// The asserting literal is in position 0 and the deepest remaining
    /// literal in position 1.
    pub fn clause(&self) -> &[Lit] {
        &self.clause
    }
}

/// Learns a new clause by analyzing a conflict.
///
/// Returns the lowest decision level that makes the learned clause
/// asserting. Requires a current decision level above 0; a conflict without
/// decisions is a level 0 refutation and is handled by the caller.
pub fn analyze_conflict(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut VsidsP,
        ImplGraphP,
        TrailP,
    ),
    conflict: Conflict,
) -> usize {
    {
        let analyze = ctx.part_mut(AnalyzeConflictP);

        analyze.clause.clear();
        analyze.current_level_count = 0;
    }

    debug_assert!(ctx.part(TrailP).current_level() > 0);

    // We start with all literals of the conflicting clause.
    for &lit in conflict.lits() {
        add_literal(ctx.borrow(), lit);
    }

    // To get rid of all but one literal of the current level, we resolve the
    // clause with the reasons of those literals in reverse chronological
    // order. Resolved variables keep their var_flags entry, which stops the
    // propagated literal of a reason clause from being counted again.
    let mut uip = None;

    'resolve: for trail_index in (0..ctx.part(TrailP).trail().len()).rev() {
        let lit = ctx.part(TrailP).trail()[trail_index];
        let analyze = ctx.part_mut(AnalyzeConflictP);
        if !analyze.var_flags[lit.index()] {
            continue;
        }

        analyze.current_level_count -= 1;
        if analyze.current_level_count == 0 {
            // lit is the last current level literal in the clause, so the
            // resulting clause asserts !lit; it goes into position 0.
            analyze.clause.push(!lit);
            let end = analyze.clause.len() - 1;
            analyze.clause.swap(0, end);
            uip = Some(lit);
            break 'resolve;
        }

        let reason = *ctx.part(ImplGraphP).reason(lit.var());
        for &reason_lit in reason.lits() {
            add_literal(ctx.borrow(), reason_lit);
        }
    }

    debug_assert!(uip.is_some(), "trail exhausted before the UIP was found");

    // This needs var_flags set and keeps some var_flags set.
    minimize_clause(ctx.borrow());

    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);

    for var in analyze.to_clean.drain(..) {
        analyze.var_flags[var.index()] = false;
    }

    // Find the highest level literal besides the asserted one and move it
    // into position 1. This keeps the watches intact across the backjump.
    let mut backtrack_to = 0;

    if analyze.clause.len() > 1 {
        let (prefix, rest) = analyze.clause.split_at_mut(2);
        let lit_1 = &mut prefix[1];
        backtrack_to = ctx.part(ImplGraphP).level(lit_1.var());
        for lit in rest.iter_mut() {
            let lit_level = ctx.part(ImplGraphP).level(lit.var());
            if lit_level > backtrack_to {
                backtrack_to = lit_level;
                swap(lit_1, lit);
            }
        }
    }

    ctx.part_mut(VsidsP).decay();

    backtrack_to
}

/// Add a literal to the current clause.
fn add_literal(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut VsidsP,
        ImplGraphP,
        TrailP
    ),
    lit: Lit,
) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let lit_level = ctx.part(ImplGraphP).level(lit.var());
    // Level 0 literals are always false here and thus dropped, duplicates
    // are only counted once.
    if lit_level > 0 && !analyze.var_flags[lit.index()] {
        ctx.part_mut(VsidsP).bump(lit.var());

        analyze.var_flags[lit.index()] = true;
        analyze.to_clean.push(lit.var());
        if lit_level == ctx.part(TrailP).current_level() {
            analyze.current_level_count += 1;
        } else {
            analyze.clause.push(lit);
        }
    }
}

/// A Bloom filter of levels.
#[derive(Default)]
struct LevelAbstraction {
    bits: u64,
}

impl LevelAbstraction {
    /// Add a level to the Bloom filter.
    pub fn add(&mut self, level: usize) {
        self.bits |= 1 << (level % 64)
    }

    /// Test whether a level could be in the Bloom filter.
    pub fn test(&self, level: usize) -> bool {
        self.bits & (1 << (level % 64)) != 0
    }
}

/// Performs recursive clause minimization.
///
/// **Note:** Requires AnalyzeConflict's var_flags to be set for exactly the
/// variables of the unminimized clause. This also sets some more var_flags,
/// but lists them in to_clean.
///
/// This routine removes literals of the learned clause that are already
/// implied by the remaining literals. Such a literal is detected by a DFS in
/// the implication graph (following edges in reverse) that only expands
/// literals implied by clause literals. Reaching a decision that is not in
/// the clause proves the candidate irredundant.
///
/// Two standard optimizations apply. The search aborts as soon as it sees a
/// literal of a decision level that has no literal in the clause, checked
/// approximately with a Bloom filter over levels: continuing from there
/// would eventually reach that level's decision, which cannot be in the
/// clause. And var_flags double as the visited set: when a DFS proves a
/// literal redundant, the var_flags set during it are kept, so later
/// searches stop at those literals immediately. When a DFS fails, its
/// var_flags are reverted using the to_clean entries recorded during it.
fn minimize_clause(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        ImplGraphP,
        TrailP,
    ),
) {
    let (analyze, ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let impl_graph = ctx.part(ImplGraphP);

    let mut involved_levels = LevelAbstraction::default();

    for &lit in analyze.clause.iter() {
        involved_levels.add(impl_graph.level(lit.var()));
    }

    let var_flags = &mut analyze.var_flags;
    let to_clean = &mut analyze.to_clean;
    let stack = &mut analyze.stack;

    let mut scan = VecMutScan::new(&mut analyze.clause);

    // The asserting literal is always kept.
    scan.next();

    'next_lit: while let Some(lit) = scan.next() {
        if impl_graph.reason(lit.var()).is_decision() {
            continue;
        }

        // Start the DFS from the candidate's reason.
        stack.clear();
        stack.push(!*lit);

        // Remembers which var_flags were set during this DFS.
        let top = to_clean.len();

        while let Some(lit) = stack.pop() {
            let reason = *impl_graph.reason(lit.var());

            for &reason_lit in reason.lits() {
                let reason_level = impl_graph.level(reason_lit.var());

                if !var_flags[reason_lit.index()] && reason_level > 0 {
                    // Not yet known to be implied by the clause, not yet
                    // visited and not a level 0 fact.

                    if impl_graph.reason(reason_lit.var()).is_decision()
                        || !involved_levels.test(reason_level)
                    {
                        // A decision outside the clause, or a level known
                        // not to contribute to the clause. Abort and revert
                        // the var_flags set during _this_ DFS.
                        for lit in to_clean.drain(top..) {
                            var_flags[lit.index()] = false;
                        }
                        continue 'next_lit;
                    } else {
                        var_flags[reason_lit.index()] = true;
                        to_clean.push(reason_lit.var());
                        stack.push(!reason_lit);
                    }
                }
            }
        }

        lit.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use parsat_formula::{lit, lits};

    use crate::context::{set_var_count, WatchlistsP};
    use crate::load::load_clause;
    use crate::prop::{backtrack, decide, propagate};

    #[test]
    fn asserting_clause_and_backjump_level() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 6);
        ctx.part_mut(WatchlistsP).set_worker_count(1);

        // Deciding 1 and then 2 forces 3 and 4, and the last clause
        // conflicts.
        load_clause(ctx.borrow(), &lits![-2, 3]);
        load_clause(ctx.borrow(), &lits![-2, -3, 4]);
        load_clause(ctx.borrow(), &lits![-1, -3, -4]);

        decide(ctx.borrow(), lit!(1));
        assert!(propagate(ctx.borrow()).is_ok());

        decide(ctx.borrow(), lit!(2));
        let conflict = propagate(ctx.borrow()).unwrap_err();

        let backtrack_to = analyze_conflict(ctx.borrow(), conflict);
        assert_eq!(backtrack_to, 1);

        let clause = ctx.part(AnalyzeConflictP).clause().to_owned();
        // The 1-UIP here is the decision itself: the forced literal 4
        // depends on 2 both directly and through 3.
        assert_eq!(clause[0], lit!(-2));
        assert!(clause[1..].contains(&lit!(-1)));
        assert_eq!(clause.len(), 2);

        backtrack(ctx.borrow(), backtrack_to);
        assert_eq!(ctx.part(TrailP).current_level(), 1);
    }

    #[test]
    fn minimization_drops_dominated_literals() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 8);
        ctx.part_mut(WatchlistsP).set_worker_count(1);

        // Level 1 decides 1 which forces 2. The level 2 decision forces two
        // more literals whose joint falsity conflicts with a clause that
        // additionally mentions both -1 and -2. Literal -2 is implied by -1
        // and must be minimized away.
        load_clause(ctx.borrow(), &lits![-1, 2]);
        load_clause(ctx.borrow(), &lits![-3, 4]);
        load_clause(ctx.borrow(), &lits![-1, -2, -3, -4]);

        decide(ctx.borrow(), lit!(1));
        assert!(propagate(ctx.borrow()).is_ok());

        decide(ctx.borrow(), lit!(3));
        let conflict = propagate(ctx.borrow()).unwrap_err();

        let backtrack_to = analyze_conflict(ctx.borrow(), conflict);
        let clause = ctx.part(AnalyzeConflictP).clause().to_owned();

        assert_eq!(backtrack_to, 1);
        // Without minimization this would be [-3, -2, -1].
        assert_eq!(clause.len(), 2);
        assert_eq!(clause[0], lit!(-3));
        assert_eq!(clause[1], lit!(-1));
    }
}
