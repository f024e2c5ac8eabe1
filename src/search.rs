//! Minimal-rule search: smallest (species, colors) rule that assembles a
//! target shape deterministically.
//!
//! Candidates are tried in order of `species + colors`, then `species`. Each
//! candidate's formula is solved, the decoded rule is grown repeatedly, and
//! rejected rules are blocked so the oracle offers a different one, up to
//! [`SearchOptions::alternative_solutions`] times.

use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::assembly::{AssemblyConfig, AssemblyError};
use crate::determinism::{classify_with_shape, Classification, ClassifyOptions, DEFAULT_TRIALS};
use crate::geometry::{Dims, Vec3};
use crate::rule::Rule;
use crate::sat::{CancelToken, Encoder, EncodingOptions, OracleError, SatOracle, SatOutcome};
use crate::shape::shapes_equal;
use crate::topology::{Topology, TopologyError};

/// Default number of extra solutions requested per candidate size.
pub const DEFAULT_ALTERNATIVE_SOLUTIONS: usize = 8;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid target topology")]
    Topology(#[from] TopologyError),
    #[error("SAT oracle failed")]
    Oracle(#[from] OracleError),
    #[error("decoded rule could not be assembled")]
    Assembly(#[from] AssemblyError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    /// Largest species count to try; defaults to the number of positions.
    pub max_species: Option<usize>,
    /// Largest color count to try; defaults to the number of bindings.
    pub max_colors: Option<usize>,
    /// Extra solutions requested when a candidate rule is rejected.
    pub alternative_solutions: usize,
    /// Assembly trials per classification.
    pub trials: usize,
    /// Particle cap for classification; defaults to `2 * positions + 10`.
    pub max_particles: Option<usize>,
    pub dims: Dims,
    pub torsional: bool,
    /// Base RNG seed for classification trials.
    pub seed: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_species: None,
            max_colors: None,
            alternative_solutions: DEFAULT_ALTERNATIVE_SOLUTIONS,
            trials: DEFAULT_TRIALS,
            max_particles: None,
            dims: Dims::Three,
            torsional: true,
            seed: 0,
        }
    }
}

impl SearchOptions {
    pub fn encoding(&self) -> EncodingOptions {
        EncodingOptions {
            dims: self.dims,
            torsional: self.torsional,
            ..EncodingOptions::default()
        }
    }

    /// Classification settings for a target of `positions` particles.
    pub fn classify_options(&self, positions: usize) -> ClassifyOptions {
        ClassifyOptions {
            trials: self.trials,
            assembly: AssemblyConfig {
                max_particles: self.max_particles.unwrap_or(2 * positions + 10),
                torsional: self.torsional,
                dims: self.dims,
                ..AssemblyConfig::default()
            },
            seed: self.seed,
        }
    }
}

/// A rule accepted for the target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    pub rule: Rule,
    /// Species count of the candidate that produced the rule.
    pub species: usize,
    /// Color count of the candidate that produced the rule.
    pub colors: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Solution),
    /// Every candidate size was tried without an accepted rule.
    Exhausted,
    Cancelled,
}

/// Outcome of a single candidate size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CandidateOutcome {
    Found(Rule),
    /// UNSAT, or every offered rule was rejected.
    NoRule,
    Cancelled,
}

/// Candidate `(species, colors)` pairs in search order.
pub fn candidate_sizes(max_species: usize, max_colors: usize) -> Vec<(usize, usize)> {
    let mut sizes = Vec::with_capacity(max_species * max_colors);
    for total in 2..=max_species + max_colors {
        for species in 1..=max_species.min(total - 1) {
            let colors = total - species;
            if colors <= max_colors {
                sizes.push((species, colors));
            }
        }
    }
    sizes
}

fn candidates_for(topology: &Topology, options: &SearchOptions) -> Vec<(usize, usize)> {
    let max_species = options.max_species.unwrap_or(topology.num_particles());
    let max_colors = options
        .max_colors
        .unwrap_or_else(|| topology.bindings().len().max(1));
    candidate_sizes(max_species, max_colors)
}

/// Whether `rule` assembles `target` deterministically.
pub fn accept_candidate(
    rule: &Rule,
    target: &[Vec3],
    options: &ClassifyOptions,
) -> Result<bool, AssemblyError> {
    let report = classify_with_shape(rule, options)?;
    let accepted = report.classification == Classification::Deterministic
        && report
            .shape
            .as_deref()
            .is_some_and(|shape| shapes_equal(shape, target));
    debug!(
        species = rule.len(),
        classification = ?report.classification,
        accepted,
        "checked candidate rule"
    );
    Ok(accepted)
}

/// Tries one `(species, colors)` size.
pub fn find_rule_for_size<O: SatOracle + ?Sized>(
    topology: &Topology,
    target: &[Vec3],
    species: usize,
    colors: usize,
    oracle: &O,
    options: &SearchOptions,
    cancel: &CancelToken,
) -> Result<CandidateOutcome, SearchError> {
    let mut encoder = Encoder::new(topology, species, colors, options.encoding());
    let classify = options.classify_options(target.len());

    for attempt in 0..=options.alternative_solutions {
        if cancel.is_cancelled() {
            return Ok(CandidateOutcome::Cancelled);
        }
        let formula = encoder.formula();
        match oracle.solve(&formula, cancel)? {
            SatOutcome::Unsat => {
                debug!(species, colors, attempt, "no further solutions");
                return Ok(CandidateOutcome::NoRule);
            }
            SatOutcome::Cancelled => return Ok(CandidateOutcome::Cancelled),
            SatOutcome::Sat(assignment) => {
                let rule = encoder.decode_rule(&assignment);
                if accept_candidate(&rule, target, &classify)? {
                    return Ok(CandidateOutcome::Found(rule));
                }
                encoder.block_solution(&assignment);
            }
        }
    }
    debug!(species, colors, "alternative solutions exhausted");
    Ok(CandidateOutcome::NoRule)
}

/// Searches candidate sizes in order for `topology`.
pub fn search_topology<O: SatOracle + ?Sized>(
    topology: &Topology,
    target: &[Vec3],
    oracle: &O,
    options: &SearchOptions,
    cancel: &CancelToken,
) -> Result<SearchOutcome, SearchError> {
    for (species, colors) in candidates_for(topology, options) {
        match find_rule_for_size(topology, target, species, colors, oracle, options, cancel)? {
            CandidateOutcome::Found(rule) => {
                info!(species, colors, "found minimal rule");
                return Ok(SearchOutcome::Found(Solution {
                    rule,
                    species,
                    colors,
                }));
            }
            CandidateOutcome::NoRule => {}
            CandidateOutcome::Cancelled => return Ok(SearchOutcome::Cancelled),
        }
    }
    info!(positions = target.len(), "search exhausted");
    Ok(SearchOutcome::Exhausted)
}

/// Finds the smallest rule that deterministically assembles `coords`.
pub fn find_minimal_rule<O: SatOracle + ?Sized>(
    coords: &[Vec3],
    oracle: &O,
    options: &SearchOptions,
) -> Result<SearchOutcome, SearchError> {
    let topology = Topology::from_coords(coords, options.dims)?;
    search_topology(&topology, coords, oracle, options, &CancelToken::new())
}

/// Like [`find_minimal_rule`], trying candidate sizes concurrently.
///
/// Once a candidate finds a rule or fails, candidates later in search order
/// are cancelled and their errors ignored; earlier ones run to completion so
/// the result matches the sequential search order.
pub fn par_find_minimal_rule<O: SatOracle + ?Sized>(
    coords: &[Vec3],
    oracle: &O,
    options: &SearchOptions,
) -> Result<SearchOutcome, SearchError> {
    let topology = Topology::from_coords(coords, options.dims)?;
    let candidates = candidates_for(&topology, options);
    let root = CancelToken::new();
    let tokens: Vec<CancelToken> = candidates.iter().map(|_| root.child()).collect();
    // lowest-ranked candidate that ends the search, with its rule or error
    let settled: Mutex<Option<(usize, Result<Solution, SearchError>)>> = Mutex::new(None);

    let settled_rank = || {
        settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(rank, _)| *rank)
    };

    candidates
        .par_iter()
        .enumerate()
        .for_each(|(rank, &(species, colors))| {
            if settled_rank().is_some_and(|earlier| earlier < rank) {
                return;
            }
            let token = &tokens[rank];
            let result =
                match find_rule_for_size(&topology, coords, species, colors, oracle, options, token) {
                    Ok(CandidateOutcome::Found(rule)) => Ok(Solution {
                        rule,
                        species,
                        colors,
                    }),
                    Ok(CandidateOutcome::NoRule | CandidateOutcome::Cancelled) => return,
                    Err(err) => Err(err),
                };

            let mut slot = settled.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().map_or(true, |(earlier, _)| rank < *earlier) {
                debug!(species, colors, rank, found = result.is_ok(), "candidate settled search");
                *slot = Some((rank, result));
                for later in &tokens[rank + 1..] {
                    later.cancel();
                }
            }
        });

    let settled = settled.into_inner().unwrap_or_else(PoisonError::into_inner);
    Ok(match settled {
        Some((_, Ok(solution))) => {
            info!(
                species = solution.species,
                colors = solution.colors,
                "found minimal rule"
            );
            SearchOutcome::Found(solution)
        }
        Some((_, Err(err))) => return Err(err),
        None => SearchOutcome::Exhausted,
    })
}
