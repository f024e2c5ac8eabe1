//! In-process oracle backed by the `varisat` CDCL solver.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};
use varisat::{ExtendFormula, Lit, Solver};

use crate::sat::formula::{Assignment, Clause, Formula, Literal};
use crate::sat::oracle::{CancelToken, OracleError, SatOracle, SatOutcome};

/// Runs `varisat` on a worker thread and polls the token while it works.
///
/// The worker cannot be interrupted. A cancelled call returns at once and the
/// worker's answer is dropped when it arrives.
#[derive(Clone, Debug)]
pub struct EmbeddedSolver {
    poll_interval: Duration,
}

impl Default for EmbeddedSolver {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5),
        }
    }
}

impl EmbeddedSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Decides `clauses`; `Ok(None)` when unsatisfiable.
fn decide(clauses: &[Clause]) -> Result<Option<Vec<Literal>>, String> {
    let mut solver = Solver::new();
    for clause in clauses {
        let lits: Vec<Lit> = clause
            .iter()
            .map(|&literal| Lit::from_dimacs(literal as isize))
            .collect();
        solver.add_clause(&lits);
    }
    match solver.solve() {
        Ok(true) => Ok(Some(
            solver
                .model()
                .unwrap_or_default()
                .iter()
                .map(|lit| lit.to_dimacs() as Literal)
                .collect(),
        )),
        Ok(false) => Ok(None),
        Err(err) => Err(err.to_string()),
    }
}

impl SatOracle for EmbeddedSolver {
    fn solve(&self, formula: &Formula, cancel: &CancelToken) -> Result<SatOutcome, OracleError> {
        if cancel.is_cancelled() {
            return Ok(SatOutcome::Cancelled);
        }
        if formula.clauses.iter().any(Vec::is_empty) {
            return Ok(SatOutcome::Unsat);
        }

        let (sender, receiver) = mpsc::channel();
        let clauses = formula.clauses.clone();
        thread::spawn(move || {
            // the receiver is gone once the call was cancelled
            let _ = sender.send(decide(&clauses));
        });
        trace!(
            vars = formula.num_vars,
            clauses = formula.num_clauses(),
            "started embedded SAT solver"
        );

        loop {
            match receiver.recv_timeout(self.poll_interval) {
                Ok(Ok(Some(literals))) => {
                    return Ok(SatOutcome::Sat(Assignment::from_literals(
                        &literals,
                        formula.num_vars,
                    )))
                }
                Ok(Ok(None)) => return Ok(SatOutcome::Unsat),
                Ok(Err(message)) => return Err(OracleError::Embedded(message)),
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        debug!("abandoning cancelled embedded SAT solver");
                        return Ok(SatOutcome::Cancelled);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(OracleError::WorkerPanicked),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn run(formula: &Formula) -> SatOutcome {
        EmbeddedSolver::default()
            .solve(formula, &CancelToken::new())
            .unwrap()
    }

    fn solve(num_vars: usize, clauses: Vec<Vec<Literal>>) -> SatOutcome {
        run(&Formula::new(num_vars, clauses))
    }

    /// `n + 1` pigeons into `n` holes; variable `p * n + h + 1` puts pigeon `p` in hole `h`.
    fn pigeonhole(holes: usize) -> Formula {
        let var = |p: usize, h: usize| (p * holes + h + 1) as Literal;
        let mut clauses = Vec::new();
        for p in 0..=holes {
            clauses.push((0..holes).map(|h| var(p, h)).collect());
        }
        for h in 0..holes {
            for p in 0..=holes {
                for q in p + 1..=holes {
                    clauses.push(vec![-var(p, h), -var(q, h)]);
                }
            }
        }
        Formula::new((holes + 1) * holes, clauses)
    }

    fn brute_force(formula: &Formula) -> bool {
        (0u32..1 << formula.num_vars).any(|bits| {
            let literals: Vec<Literal> = (0..formula.num_vars)
                .filter(|&v| bits >> v & 1 == 1)
                .map(|v| v as Literal + 1)
                .collect();
            Assignment::from_literals(&literals, formula.num_vars).satisfies(formula)
        })
    }

    #[test]
    fn test_trivial_formulas() {
        assert!(matches!(solve(0, vec![]), SatOutcome::Sat(_)));
        assert_eq!(solve(1, vec![vec![]]), SatOutcome::Unsat);
        assert_eq!(solve(1, vec![vec![1], vec![-1]]), SatOutcome::Unsat);
        assert!(matches!(solve(1, vec![vec![1, -1]]), SatOutcome::Sat(_)));
    }

    #[test]
    fn test_model_covers_unmentioned_variables() {
        let formula = Formula::new(
            6,
            vec![vec![1, 2], vec![-1, 3], vec![-3, -2], vec![2, 4], vec![-4, -1]],
        );
        let SatOutcome::Sat(model) = run(&formula) else {
            panic!("formula is satisfiable");
        };
        assert_eq!(model.num_vars(), 6);
        assert!(model.satisfies(&formula));
    }

    #[test]
    fn test_pigeonhole_is_unsat() {
        for holes in 1..=5 {
            assert_eq!(run(&pigeonhole(holes)), SatOutcome::Unsat, "{holes} holes");
        }
    }

    #[test]
    fn test_agrees_with_brute_force_on_random_3sat() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let num_vars = rng.gen_range(3..=10);
            let num_clauses = rng.gen_range(1..=45);
            let clauses = (0..num_clauses)
                .map(|_| {
                    (0..3)
                        .map(|_| {
                            let var = rng.gen_range(1..=num_vars) as Literal;
                            if rng.gen_bool(0.5) {
                                var
                            } else {
                                -var
                            }
                        })
                        .collect()
                })
                .collect();
            let formula = Formula::new(num_vars, clauses);
            match run(&formula) {
                SatOutcome::Sat(model) => assert!(model.satisfies(&formula)),
                SatOutcome::Unsat => assert!(!brute_force(&formula), "{formula}"),
                SatOutcome::Cancelled => panic!("not cancelled"),
            }
        }
    }

    #[test]
    fn test_cancelled_token_skips_solving() {
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            EmbeddedSolver::default()
                .solve(&pigeonhole(6), &token)
                .unwrap(),
            SatOutcome::Cancelled
        );
    }
}
