//! Patch, species and rule definitions.
//!
//! A rule is an ordered catalogue of species. Each species carries exactly
//! one patch per face slot; blank patches have color 0. Nonzero colors `c`
//! and `-c` are complementary.

use crate::geometry::{RotationGroup, NUM_DIRECTIONS};

/// One binding site on a particle face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Patch {
    /// Signed color; 0 is inert.
    pub color: i32,
    /// Quarter-turn orientation index (0-3) around the face axis.
    pub orientation: u8,
}

impl Patch {
    /// A blank, non-binding patch.
    pub const EMPTY: Self = Self {
        color: 0,
        orientation: 0,
    };

    pub const fn new(color: i32, orientation: u8) -> Self {
        Self { color, orientation }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.color == 0
    }
}

/// A particle type: one patch per face slot, in direction order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Species {
    pub patches: [Patch; NUM_DIRECTIONS],
}

impl Species {
    pub const fn new(patches: [Patch; NUM_DIRECTIONS]) -> Self {
        Self { patches }
    }

    /// Builds a species from colors alone, every orientation 0.
    pub fn from_colors(colors: [i32; NUM_DIRECTIONS]) -> Self {
        Self {
            patches: colors.map(|color| Patch::new(color, 0)),
        }
    }

    /// Returns the species as seen after applying `rotation`.
    ///
    /// Each patch keeps its color and moves to the face its direction is
    /// carried to; its orientation is re-derived at the new face.
    pub fn rotated(&self, group: &RotationGroup, rotation: usize) -> Species {
        let mut patches = [Patch::EMPTY; NUM_DIRECTIONS];
        for (face, patch) in self.patches.iter().enumerate() {
            let (target, orientation) = group.rotate_orientation(face, rotation, patch.orientation);
            patches[target] = Patch::new(patch.color, orientation);
        }
        Species { patches }
    }

    /// Largest color magnitude on this species.
    pub fn max_color(&self) -> u32 {
        self.patches
            .iter()
            .map(|patch| patch.color.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

/// An ordered catalogue of species, referenced by index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rule {
    pub species: Vec<Species>,
}

impl Rule {
    pub fn new(species: Vec<Species>) -> Self {
        Self { species }
    }

    /// Builds a rule from per-species face colors (orientation 0 everywhere).
    pub fn from_colors(colors: &[[i32; NUM_DIRECTIONS]]) -> Self {
        Self {
            species: colors.iter().map(|&c| Species::from_colors(c)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Number of distinct color magnitudes the rule needs, at least 2.
    pub fn color_count(&self) -> u32 {
        self.species
            .iter()
            .map(Species::max_color)
            .max()
            .unwrap_or(0)
            .max(2)
    }
}

/// Whether two patch colors bind.
///
/// Colors bind to their negation. A nonzero color binds to itself only when
/// `self_binding` is allowed.
#[inline]
pub fn colors_match(a: i32, b: i32, self_binding: bool) -> bool {
    a != 0 && (a == -b || (self_binding && a == b))
}
