//! CNF formulas, DIMACS text and satisfying assignments.

use std::fmt;

use thiserror::Error;

/// A signed variable id: positive for the variable, negative for its negation.
pub type Literal = i32;

/// A disjunction of literals.
pub type Clause = Vec<Literal>;

/// A formula in conjunctive normal form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Formula {
    /// Largest variable id in use.
    pub num_vars: usize,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DimacsError {
    #[error("missing or malformed 'p cnf' header")]
    MissingHeader,
    #[error("invalid literal {0:?}")]
    InvalidLiteral(String),
    #[error("literal {literal} exceeds declared variable count {num_vars}")]
    LiteralOutOfRange { literal: Literal, num_vars: usize },
    #[error("header declares {declared} clauses, found {found}")]
    ClauseCount { declared: usize, found: usize },
}

impl Formula {
    pub fn new(num_vars: usize, clauses: Vec<Clause>) -> Self {
        Self { num_vars, clauses }
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Parses DIMACS CNF text.
    pub fn from_dimacs(text: &str) -> Result<Self, DimacsError> {
        let mut header = None;
        let mut clauses = Vec::new();
        let mut current = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('c') || line.starts_with('%') {
                continue;
            }
            if line.starts_with('p') {
                let fields: Vec<&str> = line.split_whitespace().collect();
                header = match fields.as_slice() {
                    ["p", "cnf", vars, count] => match (vars.parse(), count.parse()) {
                        (Ok(vars), Ok(count)) => Some((vars, count)),
                        _ => return Err(DimacsError::MissingHeader),
                    },
                    _ => return Err(DimacsError::MissingHeader),
                };
                continue;
            }
            let Some((num_vars, _)) = header else {
                return Err(DimacsError::MissingHeader);
            };
            for token in line.split_whitespace() {
                let literal: Literal = token
                    .parse()
                    .map_err(|_| DimacsError::InvalidLiteral(token.to_string()))?;
                if literal == 0 {
                    clauses.push(std::mem::take(&mut current));
                } else if literal.unsigned_abs() as usize > num_vars {
                    return Err(DimacsError::LiteralOutOfRange { literal, num_vars });
                } else {
                    current.push(literal);
                }
            }
        }
        if !current.is_empty() {
            clauses.push(current);
        }

        let (num_vars, declared) = header.ok_or(DimacsError::MissingHeader)?;
        if declared != clauses.len() {
            return Err(DimacsError::ClauseCount {
                declared,
                found: clauses.len(),
            });
        }
        Ok(Self { num_vars, clauses })
    }

    /// Renders DIMACS CNF text.
    pub fn to_dimacs(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "p cnf {} {}", self.num_vars, self.clauses.len())?;
        for clause in &self.clauses {
            for literal in clause {
                write!(f, "{literal} ")?;
            }
            writeln!(f, "0")?;
        }
        Ok(())
    }
}

/// A total truth assignment, indexed by variable id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assignment {
    /// `values[id - 1]` is the value of variable `id`.
    values: Vec<bool>,
}

impl Assignment {
    /// Builds an assignment from the literals a solver reported true.
    ///
    /// Variables not mentioned are false.
    pub fn from_literals(literals: &[Literal], num_vars: usize) -> Self {
        let mut values = vec![false; num_vars];
        for &literal in literals {
            let index = literal.unsigned_abs() as usize;
            if literal > 0 && index <= num_vars {
                values[index - 1] = true;
            }
        }
        Self { values }
    }

    pub fn num_vars(&self) -> usize {
        self.values.len()
    }

    /// Value of variable `id`; unknown variables are false.
    #[inline]
    pub fn is_true(&self, id: Literal) -> bool {
        id > 0 && self.values.get(id as usize - 1).copied().unwrap_or(false)
    }

    /// Whether every clause of `formula` has a true literal.
    pub fn satisfies(&self, formula: &Formula) -> bool {
        formula.clauses.iter().all(|clause| {
            clause
                .iter()
                .any(|&literal| self.is_true(literal.abs()) == (literal > 0))
        })
    }

    /// The assignment as signed literals, one per variable.
    pub fn literals(&self) -> Vec<Literal> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let id = i as Literal + 1;
                if value {
                    id
                } else {
                    -id
                }
            })
            .collect()
    }
}
