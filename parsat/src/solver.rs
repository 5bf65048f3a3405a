//! Boolean satisfiability solver frontend.
//!
//! Owns the input formula and drives a group of worker threads, each running
//! the full CDCL search on its own copy of the instance, diversified by seed
//! and cooperating through learned clause exchange.
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Error};
use log::info;

use partial_ref::{IntoPartialRefMut, PartialRef};

use parsat_formula::{CnfFormula, Lit};

use crate::config::SolverConfig;
use crate::context::Context;
use crate::shared::Shared;
use crate::state::SatState;
use crate::worker::{self, Event};

/// Final answer of a solve.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Verdict {
    Sat,
    Unsat,
    /// The solve was interrupted before reaching a verdict.
    Unknown,
}

/// Verdict plus the models found along the way.
pub struct Outcome {
    pub verdict: Verdict,
    /// Some model of the instance, if any was found.
    pub model: Option<Vec<Lit>>,
    /// Number of distinct models reported, more than one only with
    /// `keep_going`.
    pub models_found: usize,
}

/// A parallel CDCL based SAT solver.
pub struct Solver {
    formula: CnfFormula,
    config: SolverConfig,
    interrupt: Arc<AtomicBool>,
}

impl Default for Solver {
    fn default() -> Solver {
        Solver::new()
    }
}

impl Solver {
    /// Create a new solver with the default configuration.
    pub fn new() -> Solver {
        Solver::with_config(SolverConfig::default())
    }

    /// Create a new solver with the given configuration.
    pub fn with_config(config: SolverConfig) -> Solver {
        Solver {
            formula: CnfFormula::new(),
            config,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The solver configuration.
    pub fn config_mut(&mut self) -> &mut SolverConfig {
        &mut self.config
    }

    /// Add a formula to the solver.
    pub fn add_formula(&mut self, formula: &CnfFormula) {
        for clause in formula.iter() {
            self.formula.add_clause(clause);
        }
        self.formula.set_var_count(formula.var_count());
    }

    /// Add a single clause to the solver.
    pub fn add_clause(&mut self, clause: &[Lit]) {
        self.formula.add_clause(clause);
    }

    /// Flag that makes every worker wind down when set.
    ///
    /// Safe to store in a signal handler; setting it requests a graceful
    /// stop.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Check the satisfiability of the current formula.
    pub fn solve(&mut self, nr_workers: usize, seed: u64) -> Result<Outcome, Error> {
        self.solve_with(nr_workers, seed, |_| ())
    }

    /// Check satisfiability, streaming every model found to the callback.
    ///
    /// With `keep_going` set in the configuration the callback fires once
    /// per distinct enumerated model, otherwise at most once.
    pub fn solve_with(
        &mut self,
        nr_workers: usize,
        seed: u64,
        mut on_model: impl FnMut(&[Lit]),
    ) -> Result<Outcome, Error> {
        let nr_workers = nr_workers.max(1);

        info!(
            "solving with {} workers, seed {}, {} vars, {} clauses",
            nr_workers,
            seed,
            self.formula.var_count(),
            self.formula.len()
        );

        let shared = Arc::new(Shared::new(nr_workers, self.interrupt.clone()));
        let formula = Arc::new(self.formula.clone());
        let (events_in, events) = channel();

        let mut handles = vec![];

        for id in 0..nr_workers {
            let shared = shared.clone();
            let formula = formula.clone();
            let events_in = events_in.clone();
            let config = self.config.clone();
            let worker_seed = seed.wrapping_add(id as u64);

            let builder = thread::Builder::new().name(format!("worker-{}", id));
            let handle = builder
                .spawn(move || {
                    let mut context = Box::new(Context::default());
                    context.solver_config = config;
                    context.shared = shared;

                    {
                        let mut ctx = context.into_partial_ref_mut();
                        worker::setup(ctx.borrow(), &formula, id, nr_workers, worker_seed);
                    }

                    worker::run(&mut context, &formula, &events_in);
                })
                .map_err(|err| anyhow!("failed to spawn a worker thread: {}", err))?;

            handles.push(handle);
        }

        drop(events_in);

        let mut verdict = Verdict::Unknown;
        let mut model = None;
        let mut seen_models = HashSet::new();

        while let Ok(event) = events.recv() {
            match event {
                Event::Model(new_model) => {
                    // Workers enumerate independently, so the same model can
                    // arrive more than once.
                    if seen_models.insert(new_model.clone()) {
                        on_model(&new_model);
                        model = Some(new_model);
                    }
                }
                Event::Finished(SatState::Sat) => verdict = Verdict::Sat,
                Event::Finished(SatState::Unsat) => {
                    if verdict == Verdict::Unknown {
                        verdict = Verdict::Unsat;
                    }
                }
                Event::Finished(SatState::Unknown) => (),
            }
        }

        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow!("a worker thread panicked"))?;
        }

        // Under model enumeration the search ends when the blocking clauses
        // became unsatisfiable, but the instance itself was satisfiable.
        if !seen_models.is_empty() {
            verdict = Verdict::Sat;
        }

        Ok(Outcome {
            verdict,
            model,
            models_found: seen_models.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use parsat_formula::{cnf_formula, lit, test::*};

    #[test]
    fn trivial_sat_instance() {
        let mut solver = Solver::new();
        solver.add_formula(&cnf_formula![1;]);

        let outcome = solver.solve(1, 0).unwrap();
        assert_eq!(outcome.verdict, Verdict::Sat);
        assert_eq!(outcome.model.unwrap(), vec![lit!(1)]);
    }

    #[test]
    fn trivial_unsat_instance() {
        let mut solver = Solver::new();
        solver.add_formula(&cnf_formula![1; -1;]);

        let outcome = solver.solve(2, 0).unwrap();
        assert_eq!(outcome.verdict, Verdict::Unsat);
        assert!(outcome.model.is_none());
    }

    #[test]
    fn keep_going_enumerates_distinct_models() {
        let mut solver = Solver::new();
        solver.config_mut().keep_going = true;
        solver.add_formula(&cnf_formula![
            1, 2;
            -1, -2;
        ]);

        let mut streamed = 0;
        let outcome = solver.solve_with(1, 3, |_| streamed += 1).unwrap();

        assert_eq!(outcome.verdict, Verdict::Sat);
        assert_eq!(outcome.models_found, 2);
        assert_eq!(streamed, 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn sat_formulas_have_valid_models(
            formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0),
            nr_workers in 1..3usize,
        ) {
            let mut solver = Solver::new();
            solver.add_formula(&formula);

            let outcome = solver.solve(nr_workers, 99).unwrap();
            prop_assert_eq!(outcome.verdict, Verdict::Sat);

            let model = outcome.model.unwrap();
            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn sgen_formulas_are_unsat(
            formula in sgen_unsat_formula(1..4usize),
            nr_workers in 1..3usize,
        ) {
            let mut solver = Solver::new();
            solver.add_formula(&formula);

            let outcome = solver.solve(nr_workers, 7).unwrap();
            prop_assert_eq!(outcome.verdict, Verdict::Unsat);
        }
    }
}
