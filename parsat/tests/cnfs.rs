use std::collections::HashSet;

use parsat::{Lit, Solver, Verdict};
use parsat_dimacs::DimacsParser;

macro_rules! test_cnf {
    ($name:ident, $verdict:expr, $workers:expr) => {
        #[test]
        fn $name() {
            let cnf = include_bytes!(concat!("cnfs/", stringify!($name), ".cnf"));
            let mut parser = DimacsParser::parse(&cnf[..]).expect("parsing failed");
            let formula = parser.take_formula();

            let mut solver = Solver::new();
            solver.add_formula(&formula);

            let outcome = solver.solve($workers, 12345).expect("solve failed");
            assert_eq!(outcome.verdict, $verdict);

            if outcome.verdict == Verdict::Sat {
                let model: HashSet<Lit> = outcome.model.unwrap().into_iter().collect();
                for clause in formula.iter() {
                    assert!(clause.iter().any(|lit| model.contains(lit)));
                }
            }
        }
    };
}

test_cnf!(unit_sat, Verdict::Sat, 1);
test_cnf!(contradiction, Verdict::Unsat, 2);
test_cnf!(php_3_2, Verdict::Unsat, 2);
test_cnf!(triangle_sat, Verdict::Sat, 2);
test_cnf!(chain_unsat, Verdict::Unsat, 4);

#[test]
fn chain_converges_with_many_workers() {
    let cnf = include_bytes!("cnfs/chain_unsat.cnf");
    let mut parser = DimacsParser::parse(&cnf[..]).expect("parsing failed");
    let formula = parser.take_formula();

    for workers in 1..=4 {
        let mut solver = Solver::new();
        solver.add_formula(&formula);
        let outcome = solver.solve(workers, workers as u64).expect("solve failed");
        assert_eq!(outcome.verdict, Verdict::Unsat);
    }
}

#[test]
fn keep_going_reports_both_models() {
    let mut parser = DimacsParser::parse(&b"1 2 0\n-1 -2 0\n"[..]).expect("parsing failed");
    let formula = parser.take_formula();

    let mut solver = Solver::new();
    solver.config_mut().keep_going = true;
    solver.add_formula(&formula);

    let mut models: Vec<Vec<Lit>> = vec![];
    let outcome = solver
        .solve_with(2, 6, |model| models.push(model.to_owned()))
        .expect("solve failed");

    assert_eq!(outcome.verdict, Verdict::Sat);
    assert_eq!(outcome.models_found, 2);
    assert_eq!(models.len(), 2);
    assert_ne!(models[0], models[1]);

    for model in models.iter() {
        for clause in formula.iter() {
            assert!(clause.iter().any(|lit| model.contains(lit)));
        }
    }
}
