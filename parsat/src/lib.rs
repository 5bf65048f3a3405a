//! A parallel CDCL based SAT solver.
//!
//! Multiple independent solver workers run on the same instance,
//! diversified by random seeds and cooperating by exchanging learned units,
//! binary clauses and long clause handles through lock free single slot
//! mailboxes.
pub mod config;
pub mod solver;

mod analyze_conflict;
mod binary;
mod cdcl;
mod clause;
mod context;
mod decision;
mod load;
mod messages;
mod prop;
mod schedule;
mod shared;
mod simplify;
mod state;
mod stats;
mod tmp;
mod worker;

#[cfg(feature = "conflict-graph")]
mod graphviz;

pub use parsat_formula::{CnfFormula, Lit, Var};

pub use config::SolverConfig;
pub use solver::{Outcome, Solver, Verdict};
