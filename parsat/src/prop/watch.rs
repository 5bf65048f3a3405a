//! Watchlists to detect clauses that became unit.
//!
//! Each long clause is watched through two of its literal positions. The
//! clause handle is kept in the watchlists of the two negated watched
//! literals, so a clause is visited exactly when one of its watched literals
//! becomes false. The watched positions themselves are stored in a worker
//! local table indexed by the clause's `(owner, index)` tag, because the
//! clause payload is shared between workers and must not be permuted.
//!
//! As long as a clause is not unit under the current assignment, the watches
//! can always be moved to two non-false literals when one of them is
//! falsified. A clause where no replacement watch can be found is either
//! propagating or in conflict. Backtracking never invalidates watches, so
//! watchlists need no maintenance there.
use parsat_formula::{Lit, LitIdx};

use crate::clause::Clause;

/// Positions of the two watched literals of a clause.
#[derive(Copy, Clone, Default)]
pub struct WatchIndices {
    positions: [LitIdx; 2],
}

impl WatchIndices {
    pub fn new(first: usize, second: usize) -> WatchIndices {
        debug_assert!(first != second);
        WatchIndices {
            positions: [first as LitIdx, second as LitIdx],
        }
    }

    pub fn get(&self, k: usize) -> usize {
        self.positions[k] as usize
    }

    pub fn set(&mut self, k: usize, position: usize) {
        self.positions[k] = position as LitIdx;
    }
}

/// Watchlists to detect clauses that became unit.
pub struct Watchlists {
    /// Clauses watching the negation of the indexing literal.
    watched: Vec<Vec<Clause>>,
    /// Watched positions, indexed by owner and clause index.
    indices: Vec<Vec<WatchIndices>>,
}

impl Default for Watchlists {
    fn default() -> Watchlists {
        Watchlists {
            watched: vec![],
            indices: vec![vec![]],
        }
    }
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watched.resize(count * 2, vec![]);
    }

    /// Update structures for the number of workers.
    pub fn set_worker_count(&mut self, count: usize) {
        self.indices.resize(count, vec![]);
    }

    /// Start watching a clause on the literals at the given positions.
    pub fn attach_with_watches(&mut self, clause: Clause, first: usize, second: usize) {
        let lits = clause.lits();
        debug_assert!(first != second && first < lits.len() && second < lits.len());

        self.watched[(!lits[first]).code()].push(clause);
        self.watched[(!lits[second]).code()].push(clause);

        let row = &mut self.indices[clause.owner()];
        let index = clause.index() as usize;
        if row.len() <= index {
            row.resize(index + 1, WatchIndices::default());
        }
        row[index] = WatchIndices::new(first, second);
    }

    /// The watched positions of an attached clause.
    pub fn watch_indices(&self, clause: Clause) -> WatchIndices {
        self.indices[clause.owner()][clause.index() as usize]
    }

    /// Move one watch of an attached clause to a new position.
    ///
    /// Only updates the position table; the caller moves the clause between
    /// watchlists.
    pub fn set_watch(&mut self, clause: Clause, k: usize, position: usize) {
        self.indices[clause.owner()][clause.index() as usize].set(k, position);
    }

    /// Make a literal's falsification visit a clause.
    pub fn add_watch(&mut self, watching: Lit, clause: Clause) {
        self.watched[watching.code()].push(clause)
    }

    /// Stop watching a clause.
    pub fn detach(&mut self, clause: Clause) {
        let indices = self.watch_indices(clause);
        let lits = clause.lits();
        for k in 0..2 {
            let list = &mut self.watched[(!lits[indices.get(k)]).code()];
            let position = list.iter().position(|&entry| entry == clause);
            debug_assert!(position.is_some());
            if let Some(position) = position {
                list.swap_remove(position);
            }
        }
    }

    /// Take a literal's watchers out for processing.
    pub fn take_watchers(&mut self, lit: Lit) -> Vec<Clause> {
        std::mem::take(&mut self.watched[lit.code()])
    }

    /// Put a literal's watchers back after processing.
    pub fn restore_watchers(&mut self, lit: Lit, watchers: Vec<Clause>) {
        debug_assert!(self.watched[lit.code()].is_empty());
        self.watched[lit.code()] = watchers;
    }
}
