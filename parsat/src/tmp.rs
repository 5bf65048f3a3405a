//! Temporary data.
use parsat_formula::Lit;

/// Temporary buffers used by various parts of the solver.
///
/// Make sure to check any documented invariants when using this. Also make
/// sure to check all existing users when adding invariants.
#[derive(Default)]
pub struct TmpData {
    pub lits: Vec<Lit>,
    pub lits_2: Vec<Lit>,
}
