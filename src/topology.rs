//! Target topologies: which particle faces bind and which must stay blank.
//!
//! A topology is either given explicitly (bindings plus required-empty slots)
//! or derived from a set of lattice positions, where adjacent positions bind
//! through their touching faces and every other face is blank.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{add, opposite, Dims, Vec3, DIRECTIONS, NUM_DIRECTIONS};

/// A required binding between face `dir_a` of particle `a` and face `dir_b` of particle `b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub a: usize,
    pub dir_a: usize,
    pub b: usize,
    pub dir_b: usize,
}

impl Binding {
    pub const fn new(a: usize, dir_a: usize, b: usize, dir_b: usize) -> Self {
        Self { a, dir_a, b, dir_b }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("topology has no positions")]
    Empty,
    #[error("position {0:?} appears more than once")]
    DuplicatePosition(Vec3),
    #[error("position {0:?} is outside the z = 0 plane of a 2D shape")]
    OutOfPlane(Vec3),
    #[error("direction {direction} of particle {particle} is out of range")]
    DirectionOutOfRange { particle: usize, direction: usize },
    #[error("slot {direction} of particle {particle} is defined more than once")]
    SlotDefinedTwice { particle: usize, direction: usize },
    #[error("particle {particle} binds to itself")]
    SelfBinding { particle: usize },
    #[error("binding {0:?} does not join opposite faces")]
    MisalignedBinding(Binding),
    #[error("particle {particle} has {found} bound or empty slots, expected {NUM_DIRECTIONS}")]
    IncompleteParticle { particle: usize, found: usize },
}

/// Serialized form of an explicit topology.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySpec {
    /// `[particle_a, dir_a, particle_b, dir_b]` entries.
    pub bindings: Vec<[usize; 4]>,
    /// `[particle, dir]` entries.
    #[serde(default)]
    pub empty: Vec<[usize; 2]>,
}

/// A validated target topology.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    bindings: Vec<Binding>,
    empty: Vec<(usize, usize)>,
    num_particles: usize,
}

impl Topology {
    /// Validates an explicit topology.
    ///
    /// Every particle must have each of its face slots covered exactly once,
    /// either by a binding or by a required-empty entry.
    pub fn new(bindings: Vec<Binding>, empty: Vec<(usize, usize)>) -> Result<Self, TopologyError> {
        let num_particles = bindings
            .iter()
            .flat_map(|b| [b.a, b.b])
            .chain(empty.iter().map(|&(particle, _)| particle))
            .max()
            .map(|max| max + 1)
            .ok_or(TopologyError::Empty)?;

        let mut seen: FxHashSet<(usize, usize)> = FxHashSet::default();
        let mut claim = |particle: usize, direction: usize| {
            if direction >= NUM_DIRECTIONS {
                return Err(TopologyError::DirectionOutOfRange {
                    particle,
                    direction,
                });
            }
            if !seen.insert((particle, direction)) {
                return Err(TopologyError::SlotDefinedTwice {
                    particle,
                    direction,
                });
            }
            Ok(())
        };

        for binding in &bindings {
            claim(binding.a, binding.dir_a)?;
            claim(binding.b, binding.dir_b)?;
            if binding.a == binding.b {
                return Err(TopologyError::SelfBinding {
                    particle: binding.a,
                });
            }
            if binding.dir_b != opposite(binding.dir_a) {
                return Err(TopologyError::MisalignedBinding(*binding));
            }
        }
        for &(particle, direction) in &empty {
            claim(particle, direction)?;
        }

        let mut counts = vec![0usize; num_particles];
        for &(particle, _) in &seen {
            counts[particle] += 1;
        }
        if let Some(particle) = counts.iter().position(|&count| count != NUM_DIRECTIONS) {
            return Err(TopologyError::IncompleteParticle {
                particle,
                found: counts[particle],
            });
        }

        Ok(Self {
            bindings,
            empty,
            num_particles,
        })
    }

    /// Derives the topology of a set of lattice positions.
    ///
    /// Each adjacent pair becomes one binding (recorded from the lower index);
    /// every face without a neighbour becomes a required-empty slot. Planar
    /// shapes are derived the same way; their z faces are simply empty.
    pub fn from_coords(coords: &[Vec3], dims: Dims) -> Result<Self, TopologyError> {
        if coords.is_empty() {
            return Err(TopologyError::Empty);
        }
        let mut index: FxHashMap<Vec3, usize> = FxHashMap::default();
        for (i, &position) in coords.iter().enumerate() {
            if index.insert(position, i).is_some() {
                return Err(TopologyError::DuplicatePosition(position));
            }
        }
        if dims == Dims::Two {
            if let Some(&position) = coords.iter().find(|&&(_, _, z)| z != 0) {
                return Err(TopologyError::OutOfPlane(position));
            }
        }

        let mut bindings = Vec::new();
        let mut empty = Vec::new();
        for (i, &position) in coords.iter().enumerate() {
            for (direction, &offset) in DIRECTIONS.iter().enumerate() {
                match index.get(&add(position, offset)) {
                    Some(&j) if i < j => {
                        bindings.push(Binding::new(i, direction, j, opposite(direction)))
                    }
                    Some(_) => {}
                    None => empty.push((i, direction)),
                }
            }
        }

        Self::new(bindings, empty)
    }

    /// Parses the serialized form.
    pub fn from_spec(spec: &TopologySpec) -> Result<Self, TopologyError> {
        Self::new(
            spec.bindings
                .iter()
                .map(|&[a, dir_a, b, dir_b]| Binding::new(a, dir_a, b, dir_b))
                .collect(),
            spec.empty.iter().map(|&[p, d]| (p, d)).collect(),
        )
    }

    pub fn to_spec(&self) -> TopologySpec {
        TopologySpec {
            bindings: self
                .bindings
                .iter()
                .map(|b| [b.a, b.dir_a, b.b, b.dir_b])
                .collect(),
            empty: self.empty.iter().map(|&(p, d)| [p, d]).collect(),
        }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn empty(&self) -> &[(usize, usize)] {
        &self.empty
    }

    pub fn num_particles(&self) -> usize {
        self.num_particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimer_topology() {
        let topology = Topology::from_coords(&[(0, 0, 0), (1, 0, 0)], Dims::Three).unwrap();
        assert_eq!(topology.num_particles(), 2);
        assert_eq!(topology.bindings(), &[Binding::new(0, 1, 1, 0)]);
        assert_eq!(topology.empty().len(), 10);
    }

    #[test]
    fn test_each_adjacency_recorded_once() {
        let square = [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)];
        let topology = Topology::from_coords(&square, Dims::Two).unwrap();
        assert_eq!(topology.bindings().len(), 4);
        assert_eq!(topology.empty().len(), 4 * 6 - 8);
        for binding in topology.bindings() {
            assert!(binding.a < binding.b);
        }
    }

    #[test]
    fn test_duplicate_positions_rejected() {
        assert_eq!(
            Topology::from_coords(&[(0, 0, 0), (0, 0, 0)], Dims::Three),
            Err(TopologyError::DuplicatePosition((0, 0, 0)))
        );
    }

    #[test]
    fn test_slot_defined_twice_rejected() {
        let bindings = vec![Binding::new(0, 1, 1, 0), Binding::new(0, 1, 2, 0)];
        assert_eq!(
            Topology::new(bindings, vec![]),
            Err(TopologyError::SlotDefinedTwice {
                particle: 0,
                direction: 1
            })
        );
    }

    #[test]
    fn test_incomplete_particle_rejected() {
        let bindings = vec![Binding::new(0, 1, 1, 0)];
        let empty = vec![(0, 0), (0, 2), (0, 3), (0, 4), (0, 5)];
        assert_eq!(
            Topology::new(bindings, empty),
            Err(TopologyError::IncompleteParticle {
                particle: 1,
                found: 1
            })
        );
    }

    #[test]
    fn test_misaligned_binding_rejected() {
        let binding = Binding::new(0, 1, 1, 2);
        assert_eq!(
            Topology::new(vec![binding], vec![]),
            Err(TopologyError::MisalignedBinding(binding))
        );
    }

    #[test]
    fn test_spec_roundtrip() {
        let topology = Topology::from_coords(&[(0, 0, 0), (0, 1, 0)], Dims::Three).unwrap();
        let json = serde_json::to_string(&topology.to_spec()).unwrap();
        let spec: TopologySpec = serde_json::from_str(&json).unwrap();
        assert_eq!(Topology::from_spec(&spec).unwrap(), topology);
    }
}
