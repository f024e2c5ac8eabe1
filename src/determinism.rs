//! Classifies rules by repeated stochastic assembly.
//!
//! A rule is deterministic when every trial grows a finite structure of the
//! same shape (up to rotation and translation). Trials run in parallel, each
//! with its own assembly and RNG seeded from `seed + trial`.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::debug;

use crate::assembly::{Assembly, AssemblyConfig, AssemblyError, AssemblyState};
use crate::geometry::Vec3;
use crate::rule::Rule;
use crate::shape::shapes_equal;

/// Default number of assembly trials per classification.
pub const DEFAULT_TRIALS: usize = 15;

/// Outcome of classifying a rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Every trial was bounded and produced the same shape.
    Deterministic,
    /// Trials were bounded but produced different shapes.
    NonDeterministic,
    /// At least one trial hit the particle cap.
    Unbounded,
}

#[derive(Clone, Debug)]
pub struct ClassifyOptions {
    pub trials: usize,
    pub assembly: AssemblyConfig,
    /// Base RNG seed; trial `t` uses `seed + t`.
    pub seed: u64,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            assembly: AssemblyConfig::default(),
            seed: 0,
        }
    }
}

/// A classification plus the reference shape, when one exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub classification: Classification,
    /// Positions grown by the first trial, for bounded rules.
    pub shape: Option<Vec<Vec3>>,
}

enum Trial {
    Bounded(Vec<Vec3>),
    Unbounded,
    Skipped,
}

/// Classifies `rule` as deterministic, non-deterministic or unbounded.
pub fn classify(rule: &Rule, options: &ClassifyOptions) -> Result<Classification, AssemblyError> {
    classify_with_shape(rule, options).map(|report| report.classification)
}

/// Like [`classify`], also returning the reference shape.
pub fn classify_with_shape(rule: &Rule, options: &ClassifyOptions) -> Result<Report, AssemblyError> {
    // reject invalid rules before fanning out
    Assembly::seeded(rule.clone(), options.assembly.clone(), options.seed)?;

    let unbounded = AtomicBool::new(false);
    let trials: Vec<Trial> = (0..options.trials.max(1))
        .into_par_iter()
        .map(|trial| {
            // skip once any trial is unbounded
            if unbounded.load(Ordering::Relaxed) {
                return Ok(Trial::Skipped);
            }
            let seed = options.seed.wrapping_add(trial as u64);
            let mut assembly = Assembly::seeded(rule.clone(), options.assembly.clone(), seed)?;
            match assembly.run() {
                AssemblyState::Unbounded => {
                    unbounded.store(true, Ordering::Relaxed);
                    Ok(Trial::Unbounded)
                }
                _ => Ok(Trial::Bounded(assembly.positions())),
            }
        })
        .collect::<Result<_, AssemblyError>>()?;

    if unbounded.load(Ordering::Relaxed) || trials.iter().any(|t| matches!(t, Trial::Unbounded)) {
        debug!(species = rule.len(), "rule is unbounded");
        return Ok(Report {
            classification: Classification::Unbounded,
            shape: None,
        });
    }

    let mut shapes = trials.into_iter().filter_map(|trial| match trial {
        Trial::Bounded(shape) => Some(shape),
        Trial::Unbounded | Trial::Skipped => None,
    });
    let Some(reference) = shapes.next() else {
        unreachable!("at least one bounded trial ran");
    };

    let classification = if shapes.all(|shape| shapes_equal(&reference, &shape)) {
        Classification::Deterministic
    } else {
        Classification::NonDeterministic
    };
    debug!(
        species = rule.len(),
        particles = reference.len(),
        ?classification,
        "classified rule"
    );

    Ok(Report {
        classification,
        shape: Some(reference),
    })
}
