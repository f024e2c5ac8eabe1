//! SAT oracles: anything that can decide a [`Formula`].
//!
//! Oracles poll a [`CancelToken`] so a search can abandon candidates that
//! can no longer beat a solution already found.

use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use crate::sat::formula::{Assignment, Formula, Literal};

/// Result of one oracle call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SatOutcome {
    Sat(Assignment),
    Unsat,
    /// The call was abandoned through its [`CancelToken`].
    Cancelled,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("failed to start SAT solver {program:?}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("SAT solver I/O failed")]
    Io(#[from] io::Error),
    #[error("SAT solver output reader panicked")]
    ReaderPanicked,
    #[error("embedded SAT solver failed: {0}")]
    Embedded(String),
    #[error("embedded SAT solver thread panicked")]
    WorkerPanicked,
    #[error("SAT solver reported an unknown result")]
    Unknown,
    #[error("unrecognized SAT solver reply: {0:?}")]
    MalformedReply(String),
}

/// Decides satisfiability of CNF formulas.
pub trait SatOracle: Sync {
    fn solve(&self, formula: &Formula, cancel: &CancelToken) -> Result<SatOutcome, OracleError>;
}

/// Cooperative cancellation flag.
///
/// A child token is cancelled when it or any of its ancestors is.
#[derive(Clone, Debug)]
pub struct CancelToken {
    /// Own flag first, then ancestors.
    flags: Vec<Arc<AtomicBool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flags: vec![Arc::new(AtomicBool::new(false))],
        }
    }

    /// A token cancelled with this one, which can also be cancelled alone.
    pub fn child(&self) -> Self {
        let mut flags = Vec::with_capacity(self.flags.len() + 1);
        flags.push(Arc::new(AtomicBool::new(false)));
        flags.extend(self.flags.iter().cloned());
        Self { flags }
    }

    pub fn cancel(&self) {
        self.flags[0].store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Runs an external solver that reads DIMACS on stdin.
///
/// Both the plain `SAT`/`UNSAT` reply and the competition `s`/`v` format are
/// understood. The child is killed when the token is cancelled.
#[derive(Clone, Debug)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    poll_interval: Duration,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            poll_interval: Duration::from_millis(10),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SatOracle for CommandOracle {
    fn solve(&self, formula: &Formula, cancel: &CancelToken) -> Result<SatOutcome, OracleError> {
        if cancel.is_cancelled() {
            return Ok(SatOutcome::Cancelled);
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| OracleError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        trace!(program = %self.program, vars = formula.num_vars, "started SAT solver");

        let (Some(mut stdin), Some(mut stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(OracleError::Io(io::Error::other("solver pipes unavailable")));
        };

        let text = formula.to_dimacs();
        let writer = thread::spawn(move || stdin.write_all(text.as_bytes()));
        let reader = thread::spawn(move || {
            let mut output = String::new();
            stdout.read_to_string(&mut output).map(|_| output)
        });

        loop {
            if cancel.is_cancelled() {
                debug!(program = %self.program, "killing cancelled SAT solver");
                let _ = child.kill();
                let _ = child.wait();
                return Ok(SatOutcome::Cancelled);
            }
            if child.try_wait()?.is_some() {
                break;
            }
            thread::sleep(self.poll_interval);
        }

        // a solver may exit before consuming all input
        let _ = writer.join();
        let output = reader.join().map_err(|_| OracleError::ReaderPanicked)??;
        parse_reply(&output, formula.num_vars)
    }
}

/// Parses a solver reply into an outcome over `num_vars` variables.
pub fn parse_reply(text: &str, num_vars: usize) -> Result<SatOutcome, OracleError> {
    let mut status = None;
    let mut literals: Vec<Literal> = Vec::new();

    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let Some(head) = tokens.next() else {
            continue;
        };
        let values = match head {
            "c" => continue,
            "s" => {
                status = match tokens.next() {
                    Some("SATISFIABLE") => Some(true),
                    Some("UNSATISFIABLE") => Some(false),
                    Some("UNKNOWN") => return Err(OracleError::Unknown),
                    _ => return Err(OracleError::MalformedReply(line.to_string())),
                };
                continue;
            }
            "SAT" | "SATISFIABLE" => {
                status = Some(true);
                tokens
            }
            "UNSAT" | "UNSATISFIABLE" => {
                status = Some(false);
                continue;
            }
            "INDET" | "UNKNOWN" => return Err(OracleError::Unknown),
            "v" => tokens,
            _ if status == Some(true) => line.split_whitespace(),
            _ => return Err(OracleError::MalformedReply(line.to_string())),
        };
        for token in values {
            let literal: Literal = token
                .parse()
                .map_err(|_| OracleError::MalformedReply(line.to_string()))?;
            if literal != 0 {
                literals.push(literal);
            }
        }
    }

    match status {
        Some(true) => Ok(SatOutcome::Sat(Assignment::from_literals(
            &literals, num_vars,
        ))),
        Some(false) => Ok(SatOutcome::Unsat),
        None => Err(OracleError::MalformedReply(text.trim().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_token_follows_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        let grandchild = child.child();
        assert!(!grandchild.is_cancelled());

        child.cancel();
        assert!(grandchild.is_cancelled());
        assert!(!parent.is_cancelled());

        let sibling = parent.child();
        parent.cancel();
        assert!(sibling.is_cancelled());
    }

    #[test]
    fn test_parse_plain_reply() {
        let outcome = parse_reply("SAT\n1 -2 3 0\n", 3).unwrap();
        let SatOutcome::Sat(assignment) = outcome else {
            panic!("expected SAT");
        };
        assert_eq!(assignment.literals(), vec![1, -2, 3]);
        assert_eq!(parse_reply("UNSAT\n", 3).unwrap(), SatOutcome::Unsat);
    }

    #[test]
    fn test_parse_competition_reply() {
        let text = "c solver banner\ns SATISFIABLE\nv -1 2\nv 3 0\n";
        let SatOutcome::Sat(assignment) = parse_reply(text, 3).unwrap() else {
            panic!("expected SAT");
        };
        assert_eq!(assignment.literals(), vec![-1, 2, 3]);
        assert_eq!(
            parse_reply("s UNSATISFIABLE\n", 3).unwrap(),
            SatOutcome::Unsat
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_reply("segfault\n", 3),
            Err(OracleError::MalformedReply(_))
        ));
        assert!(matches!(parse_reply("", 3), Err(OracleError::MalformedReply(_))));
        assert!(matches!(
            parse_reply("s UNKNOWN\n", 3),
            Err(OracleError::Unknown)
        ));
    }

    #[test]
    fn test_missing_solver_binary() {
        let oracle = CommandOracle::new("definitely-not-a-sat-solver-binary");
        let formula = Formula::new(1, vec![vec![1]]);
        assert!(matches!(
            oracle.solve(&formula, &CancelToken::new()),
            Err(OracleError::Spawn { .. })
        ));
    }

    #[test]
    fn test_cancelled_before_start() {
        let oracle = CommandOracle::new("definitely-not-a-sat-solver-binary");
        let token = CancelToken::new();
        token.cancel();
        let formula = Formula::new(1, vec![vec![1]]);
        assert_eq!(oracle.solve(&formula, &token).unwrap(), SatOutcome::Cancelled);
    }
}
