//! Polycube Assembly Library
//!
//! Patchy-particle self-assembly on the cubic lattice: rules of particle
//! species grow structures stochastically, rules are classified by whether
//! their growth is deterministic, and SAT-based search finds the smallest rule
//! that assembles a given shape.

pub mod assembly;
pub mod codec;
pub mod determinism;
pub mod geometry;
pub mod rule;
pub mod sat;
pub mod search;
pub mod shape;
pub mod topology;

pub use assembly::{Assembly, AssemblyConfig, AssemblyError, AssemblyEvent, AssemblyState};
pub use codec::CodecError;
pub use determinism::{classify, Classification, ClassifyOptions};
pub use geometry::{Dims, Vec3};
pub use rule::{Patch, Rule, Species};
pub use search::{find_minimal_rule, par_find_minimal_rule, SearchOptions, SearchOutcome};
pub use topology::{Topology, TopologyError};
