//! Stochastic growth of a polycube structure from a rule.
//!
//! The engine keeps the placed particles and a frontier of open moves. A move
//! is an empty lattice position next to at least one placed particle, carrying
//! one constraint per face slot from each placed neighbour. The slots are
//! rebuilt from all neighbours whenever a move is opened or processed. Each step picks a
//! random move, tries the species in random order, and places the first one
//! that fits. Growth ends when no moves remain (bounded) or when the particle
//! count reaches the configured cap (unbounded).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::geometry::{
    add, opposite, orientation_vector, rotation_group, Dims, RotationGroup, Vec3, DIRECTIONS,
    NUM_DIRECTIONS,
};
use crate::rule::{colors_match, Rule, Species};
use crate::shape::{center_of_mass, format_structure};

/// How the first particle is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SeedMode {
    /// Always seed with species 0.
    #[default]
    First,
    /// Seed with a uniformly random species.
    Random,
}

/// Configuration for one assembly run.
#[derive(Clone, Debug)]
pub struct AssemblyConfig {
    /// Particle count at which growth is declared unbounded.
    pub max_particles: usize,
    /// Largest coordinate magnitude a particle may be placed at.
    pub max_coord: i32,
    pub seed_mode: SeedMode,
    /// Whether patch orientations must line up for two patches to bind.
    pub torsional: bool,
    /// Whether a nonzero color binds to itself.
    pub self_binding: bool,
    pub dims: Dims,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_particles: 100,
            max_coord: 50,
            seed_mode: SeedMode::First,
            torsional: true,
            self_binding: false,
            dims: Dims::Three,
        }
    }
}

/// Errors for rules the engine cannot run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("rule has no species")]
    EmptyRule,
    #[error("species {species} has a colored patch on out-of-plane face {face} in a 2D assembly")]
    OutOfPlanePatch { species: usize, face: usize },
    #[error("particle cap must be at least 1")]
    ZeroParticleCap,
}

/// Lifecycle state of an assembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblyState {
    Empty,
    Seeded,
    Growing,
    /// No open moves remain; the structure is finite.
    Bounded,
    /// The particle cap was reached.
    Unbounded,
}

impl AssemblyState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AssemblyState::Bounded | AssemblyState::Unbounded)
    }
}

/// Events emitted to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblyEvent {
    /// One move was consumed.
    MovesProcessed { particles: usize, open_moves: usize },
    /// A placement was rejected for leaving the coordinate bound.
    OutOfBounds { position: Vec3 },
    /// The assembly reached a terminal state.
    Terminated { state: AssemblyState, particles: usize },
}

/// A particle bound to a lattice position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacedParticle {
    pub species: usize,
    pub position: Vec3,
    /// Index into the rotation group.
    pub rotation: usize,
}

/// What a placed neighbour requires of the patch facing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotConstraint {
    /// A patch complementary to `color`, aligned with `alignment` when torsional.
    Bind { color: i32, alignment: Vec3 },
    /// The neighbour's facing patch is blank, so this one must be too.
    Blank,
}

/// An open binding site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Move {
    pub position: Vec3,
    /// Indexed by the face of the new particle, pointing at the neighbour.
    pub slots: [Option<SlotConstraint>; NUM_DIRECTIONS],
}

impl Move {
    fn new(position: Vec3) -> Self {
        Self {
            position,
            slots: [None; NUM_DIRECTIONS],
        }
    }
}

/// A species placement that satisfies a move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fit {
    /// Species face that binds the anchoring neighbour.
    pub patch: usize,
    pub rotation: usize,
}

type Observer = Box<dyn FnMut(&AssemblyEvent)>;

/// A running assembly. Owns its rule copy, moves, particles and RNG.
pub struct Assembly<R: Rng = StdRng> {
    rule: Rule,
    config: AssemblyConfig,
    group: &'static RotationGroup,
    rng: R,
    particles: Vec<PlacedParticle>,
    /// Rotated patches of each placed particle, indexed like `particles`.
    oriented: Vec<Species>,
    occupied: FxHashMap<Vec3, usize>,
    moves: FxHashMap<Vec3, Move>,
    /// Open move positions, for uniform random selection.
    move_keys: Vec<Vec3>,
    state: AssemblyState,
    observers: Vec<Observer>,
}

impl Assembly<StdRng> {
    /// Creates an assembly with an RNG seeded from `seed`.
    pub fn seeded(rule: Rule, config: AssemblyConfig, seed: u64) -> Result<Self, AssemblyError> {
        Self::new(rule, config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Assembly<R> {
    pub fn new(rule: Rule, config: AssemblyConfig, rng: R) -> Result<Self, AssemblyError> {
        if rule.is_empty() {
            return Err(AssemblyError::EmptyRule);
        }
        if config.max_particles == 0 {
            return Err(AssemblyError::ZeroParticleCap);
        }
        if config.dims == Dims::Two {
            for (species, entry) in rule.species.iter().enumerate() {
                for face in Dims::Two.num_directions()..NUM_DIRECTIONS {
                    if !entry.patches[face].is_empty() {
                        return Err(AssemblyError::OutOfPlanePatch { species, face });
                    }
                }
            }
        }

        Ok(Self {
            group: rotation_group(config.dims),
            rule,
            config,
            rng,
            particles: Vec::new(),
            oriented: Vec::new(),
            occupied: FxHashMap::default(),
            moves: FxHashMap::default(),
            move_keys: Vec::new(),
            state: AssemblyState::Empty,
            observers: Vec::new(),
        })
    }

    /// Registers a callback for lifecycle events.
    pub fn subscribe(&mut self, observer: impl FnMut(&AssemblyEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, event: AssemblyEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    pub fn particles(&self) -> &[PlacedParticle] {
        &self.particles
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.particles.iter().map(|p| p.position).collect()
    }

    pub fn center_of_mass(&self) -> (f64, f64, f64) {
        center_of_mass(&self.positions())
    }

    /// Number of open moves.
    pub fn open_moves(&self) -> usize {
        self.move_keys.len()
    }

    pub fn move_at(&self, position: Vec3) -> Option<&Move> {
        self.moves.get(&position)
    }

    /// Clears the structure back to the empty state.
    pub fn reset(&mut self) {
        self.particles.clear();
        self.oriented.clear();
        self.occupied.clear();
        self.moves.clear();
        self.move_keys.clear();
        self.state = AssemblyState::Empty;
    }

    /// Places the first particle at the origin with the identity rotation.
    pub fn seed(&mut self) {
        self.reset();
        let species = match self.config.seed_mode {
            SeedMode::First => 0,
            SeedMode::Random => self.rng.gen_range(0..self.rule.len()),
        };
        self.place(species, (0, 0, 0), 0);
        self.state = AssemblyState::Seeded;
        trace!(species, "seeded assembly");
        self.check_terminal();
    }

    /// Processes a single move; seeds first if the assembly is empty.
    ///
    /// Returns the state after the step. Terminal states are sticky.
    pub fn step(&mut self) -> AssemblyState {
        match self.state {
            AssemblyState::Empty => {
                self.seed();
                return self.state;
            }
            AssemblyState::Bounded | AssemblyState::Unbounded => return self.state,
            AssemblyState::Seeded | AssemblyState::Growing => {}
        }

        let index = self.rng.gen_range(0..self.move_keys.len());
        let position = self.move_keys.swap_remove(index);
        // the move is consumed whether or not anything fits
        if let Some(mut open) = self.moves.remove(&position) {
            open.slots = self.slot_constraints(position);
            self.process_move(&open);
        }

        self.state = AssemblyState::Growing;
        self.emit(AssemblyEvent::MovesProcessed {
            particles: self.particles.len(),
            open_moves: self.move_keys.len(),
        });
        self.check_terminal();
        self.state
    }

    /// Runs steps until a terminal state is reached.
    pub fn run(&mut self) -> AssemblyState {
        while !self.state.is_terminal() {
            self.step();
        }
        self.state
    }

    fn check_terminal(&mut self) {
        let terminal = if self.particles.len() >= self.config.max_particles {
            AssemblyState::Unbounded
        } else if self.move_keys.is_empty() {
            AssemblyState::Bounded
        } else {
            return;
        };
        self.state = terminal;
        debug!(
            state = ?terminal,
            particles = self.particles.len(),
            "assembly terminated"
        );
        self.emit(AssemblyEvent::Terminated {
            state: terminal,
            particles: self.particles.len(),
        });
    }

    fn process_move(&mut self, open: &Move) {
        let mut species_order: Vec<usize> = (0..self.rule.len()).collect();
        species_order.shuffle(&mut self.rng);

        for species_index in species_order {
            let species = self.rule.species[species_index];
            let Some(fit) = self.rule_fits(open, &species) else {
                continue;
            };

            if self.collides(open.position) {
                continue;
            }
            if self.out_of_bounds(open.position) {
                trace!(position = ?open.position, "placement out of bounds");
                self.emit(AssemblyEvent::OutOfBounds {
                    position: open.position,
                });
                return;
            }

            self.place(species_index, open.position, fit.rotation);
            return;
        }
    }

    /// Any particle strictly within unit distance of `position`.
    ///
    /// On the integer lattice that is exactly an occupied cell.
    fn collides(&self, position: Vec3) -> bool {
        self.occupied.contains_key(&position)
    }

    fn out_of_bounds(&self, (x, y, z): Vec3) -> bool {
        let limit = self.config.max_coord;
        x.abs() > limit || y.abs() > limit || z.abs() > limit
    }

    /// Finds a rotation of `species` that satisfies every constraint of `open`.
    ///
    /// One bound slot is picked at random as the anchor; species patches are
    /// tried in random order and the first one complementary to the anchor,
    /// under a rotation that points it at the anchor's neighbour (and lines
    /// up the alignment vectors when torsional), wins if the rest of the move
    /// is satisfied too.
    pub fn rule_fits(&mut self, open: &Move, species: &Species) -> Option<Fit> {
        let mut anchors: Vec<usize> = open
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Some(SlotConstraint::Bind { .. })))
            .map(|(face, _)| face)
            .collect();
        anchors.shuffle(&mut self.rng);
        let anchor = *anchors.first()?;
        let Some(SlotConstraint::Bind { color, alignment }) = open.slots[anchor] else {
            return None;
        };

        let mut patch_order: Vec<usize> = (0..self.config.dims.num_directions()).collect();
        patch_order.shuffle(&mut self.rng);

        for patch in patch_order {
            let candidate = species.patches[patch];
            if !colors_match(color, candidate.color, self.config.self_binding) {
                continue;
            }

            let mut rotations: Vec<usize> = (0..self.group.len())
                .filter(|&r| {
                    let (face, orientation) =
                        self.group
                            .rotate_orientation(patch, r, candidate.orientation);
                    face == anchor
                        && (!self.config.torsional
                            || orientation_vector(face, orientation) == alignment)
                })
                .collect();
            rotations.shuffle(&mut self.rng);

            for rotation in rotations {
                if self.satisfies(open, species, rotation) {
                    return Some(Fit { patch, rotation });
                }
            }
        }
        None
    }

    fn satisfies(&self, open: &Move, species: &Species, rotation: usize) -> bool {
        let rotated = species.rotated(self.group, rotation);
        open.slots.iter().enumerate().all(|(face, slot)| {
            let patch = rotated.patches[face];
            match slot {
                None => true,
                Some(SlotConstraint::Blank) => patch.is_empty(),
                Some(SlotConstraint::Bind { color, alignment }) => {
                    colors_match(*color, patch.color, self.config.self_binding)
                        && (!self.config.torsional
                            || orientation_vector(face, patch.orientation) == *alignment)
                }
            }
        })
    }

    fn place(&mut self, species: usize, position: Vec3, rotation: usize) {
        let rotated = self.rule.species[species].rotated(self.group, rotation);
        self.occupied.insert(position, self.particles.len());
        self.particles.push(PlacedParticle {
            species,
            position,
            rotation,
        });
        self.oriented.push(rotated);

        for face in 0..self.config.dims.num_directions() {
            let neighbour = add(position, DIRECTIONS[face]);
            if self.occupied.contains_key(&neighbour) {
                continue;
            }
            let opens = !rotated.patches[face].is_empty();
            if !opens && !self.moves.contains_key(&neighbour) {
                continue;
            }
            let slots = self.slot_constraints(neighbour);
            let move_keys = &mut self.move_keys;
            let open = self.moves.entry(neighbour).or_insert_with(|| {
                move_keys.push(neighbour);
                Move::new(neighbour)
            });
            open.slots = slots;
        }
    }

    /// Constraints on an empty `position` from every placed neighbour.
    fn slot_constraints(&self, position: Vec3) -> [Option<SlotConstraint>; NUM_DIRECTIONS] {
        let mut slots = [None; NUM_DIRECTIONS];
        for (face, slot) in slots
            .iter_mut()
            .enumerate()
            .take(self.config.dims.num_directions())
        {
            let neighbour = add(position, DIRECTIONS[face]);
            let Some(&index) = self.occupied.get(&neighbour) else {
                continue;
            };
            let facing = opposite(face);
            let patch = self.oriented[index].patches[facing];
            *slot = Some(if patch.is_empty() {
                SlotConstraint::Blank
            } else {
                SlotConstraint::Bind {
                    color: patch.color,
                    alignment: orientation_vector(facing, patch.orientation),
                }
            });
        }
        slots
    }

    /// Formats the current structure by z-slices.
    pub fn format(&self) -> String {
        let cells: Vec<(Vec3, usize)> = self
            .particles
            .iter()
            .map(|p| (p.position, p.species))
            .collect();
        format_structure(&cells)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::geometry::flat_orientation;
    use crate::rule::Patch;
    use crate::shape::shapes_equal;

    fn grow(rule: Rule, config: AssemblyConfig, seed: u64) -> Assembly {
        let mut assembly = Assembly::seeded(rule, config, seed).unwrap();
        assembly.run();
        assembly
    }

    #[test]
    fn test_single_face_dimer_is_bounded() {
        let rule = Rule::from_colors(&[[1, 0, 0, 0, 0, 0], [-1, 0, 0, 0, 0, 0]]);
        for seed in 0..10 {
            let assembly = grow(rule.clone(), AssemblyConfig::default(), seed);
            assert_eq!(assembly.state(), AssemblyState::Bounded);
            assert_eq!(assembly.particles().len(), 2);
            assert_eq!(assembly.particles()[1].species, 1);
            assert_eq!(assembly.particles()[1].position, (-1, 0, 0));
        }
    }

    #[test]
    fn test_dimer_snapshot() {
        let rule = Rule::from_colors(&[[1, 0, 0, 0, 0, 0], [-1, 0, 0, 0, 0, 0]]);
        let assembly = grow(rule, AssemblyConfig::default(), 3);
        insta::assert_snapshot!(assembly.format(), @r"
        z=0
        10
        ");
    }

    #[test]
    fn test_star_rule_caps_every_face() {
        // species 0 exposes color 1 on every face; each face takes one species 1
        let rule = Rule::from_colors(&[[1, 1, 1, 1, 1, 1], [-1, 0, 0, 0, 0, 0]]);
        for seed in 0..10 {
            let assembly = grow(rule.clone(), AssemblyConfig::default(), seed);
            assert_eq!(assembly.state(), AssemblyState::Bounded);
            assert_eq!(assembly.particles().len(), 7);
            let ones = assembly.particles().iter().filter(|p| p.species == 1).count();
            assert_eq!(ones, 6);
            assert_eq!(assembly.center_of_mass(), (0.0, 0.0, 0.0));
        }
    }

    #[test]
    fn test_self_binding_cube_is_unbounded() {
        let rule = Rule::from_colors(&[[1, 1, 1, 1, 1, 1]]);
        let config = AssemblyConfig {
            self_binding: true,
            max_particles: 60,
            ..AssemblyConfig::default()
        };
        let assembly = grow(rule, config, 7);
        assert_eq!(assembly.state(), AssemblyState::Unbounded);
        assert_eq!(assembly.particles().len(), 60);
    }

    #[test]
    fn test_complementary_cubes_are_unbounded() {
        let rule = Rule::from_colors(&[[1, 1, 1, 1, 1, 1], [-1, -1, -1, -1, -1, -1]]);
        let config = AssemblyConfig {
            max_particles: 40,
            torsional: false,
            ..AssemblyConfig::default()
        };
        let assembly = grow(rule, config, 11);
        assert_eq!(assembly.state(), AssemblyState::Unbounded);
    }

    #[test]
    fn test_same_color_does_not_bind_without_self_binding() {
        let rule = Rule::from_colors(&[[1, 1, 1, 1, 1, 1]]);
        let assembly = grow(rule, AssemblyConfig::default(), 0);
        assert_eq!(assembly.state(), AssemblyState::Bounded);
        assert_eq!(assembly.particles().len(), 1);
    }

    fn engine(rule: Rule, torsional: bool) -> Assembly {
        let config = AssemblyConfig {
            torsional,
            ..AssemblyConfig::default()
        };
        Assembly::seeded(rule, config, 0).unwrap()
    }

    #[test]
    fn test_single_patch_fits_any_orientation() {
        // a quarter turn about the binding axis absorbs any orientation
        // difference when the rest of the species is blank
        for orientation in 0..4 {
            let rule = Rule::new(vec![
                Species::from_colors([1, 0, 0, 0, 0, 0]),
                Species::new([
                    Patch::new(-1, orientation),
                    Patch::EMPTY,
                    Patch::EMPTY,
                    Patch::EMPTY,
                    Patch::EMPTY,
                    Patch::EMPTY,
                ]),
            ]);
            let assembly = grow(rule, AssemblyConfig::default(), 1);
            assert_eq!(assembly.particles().len(), 2);
        }
    }

    #[test]
    fn test_torsion_blocks_misaligned_patches() {
        let mut open = Move::new((0, 0, 0));
        open.slots[1] = Some(SlotConstraint::Bind {
            color: 1,
            alignment: orientation_vector(1, 0),
        });
        open.slots[3] = Some(SlotConstraint::Bind {
            color: 2,
            alignment: orientation_vector(3, 0),
        });

        let patches = |twist: u8| {
            let mut patches = [Patch::EMPTY; NUM_DIRECTIONS];
            patches[1] = Patch::new(-1, 0);
            patches[3] = Patch::new(-2, twist);
            Species::new(patches)
        };

        let aligned = patches(0);
        let twisted = patches(1);
        let rule = Rule::new(vec![aligned, twisted]);

        let mut torsional = engine(rule.clone(), true);
        let fit = torsional.rule_fits(&open, &aligned).unwrap();
        assert_eq!(fit.rotation, 0, "only the identity keeps both faces in place");
        assert_eq!(torsional.rule_fits(&open, &twisted), None);

        let mut loose = engine(rule, false);
        assert!(loose.rule_fits(&open, &twisted).is_some());
    }

    #[test]
    fn test_blank_neighbour_rejects_colored_patch() {
        let mut open = Move::new((0, 0, 0));
        open.slots[0] = Some(SlotConstraint::Bind {
            color: 1,
            alignment: orientation_vector(1, 0),
        });
        open.slots[1] = Some(SlotConstraint::Blank);

        let capped = Species::from_colors([-1, 0, 0, 0, 0, 0]);
        let exposed = Species::from_colors([-1, 3, 0, 0, 0, 0]);
        let rule = Rule::new(vec![capped, exposed]);

        for torsional in [true, false] {
            let mut assembly = engine(rule.clone(), torsional);
            assert!(assembly.rule_fits(&open, &capped).is_some());
            assert_eq!(assembly.rule_fits(&open, &exposed), None);
        }
    }

    #[test]
    fn test_moves_record_neighbour_constraints() {
        let rule = Rule::from_colors(&[[0, 1, 0, 0, 0, 0], [-1, 0, 0, 0, 0, 0]]);
        let mut assembly = Assembly::seeded(rule, AssemblyConfig::default(), 5).unwrap();
        assembly.seed();
        assert_eq!(assembly.open_moves(), 1);
        let open = assembly.move_at((1, 0, 0)).cloned().unwrap();
        assert_eq!(
            open.slots[0],
            Some(SlotConstraint::Bind {
                color: 1,
                alignment: (0, 1, 0)
            })
        );
        assert_eq!(assembly.run(), AssemblyState::Bounded);
        assert_eq!(assembly.particles().len(), 2);
    }

    #[test]
    fn test_move_sees_neighbour_placed_before_it_opened() {
        // the inert particle sits above the site before the site opens
        let rule = Rule::from_colors(&[
            [0, 1, 0, 0, 0, 0],
            [-1, 0, 2, 2, 2, 2],
            [-1, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0],
        ]);
        let mut assembly = engine(rule.clone(), false);
        assembly.place(3, (1, 1, 0), 0);
        assembly.place(0, (0, 0, 0), 0);

        let open = assembly.move_at((1, 0, 0)).cloned().unwrap();
        assert_eq!(open.slots[3], Some(SlotConstraint::Blank));
        assert_eq!(assembly.rule_fits(&open, &rule.species[1]), None);
        assert!(assembly.rule_fits(&open, &rule.species[2]).is_some());
    }

    #[test]
    fn test_reopened_move_keeps_earlier_bindings() {
        let rule = Rule::from_colors(&[[0, 1, 0, 0, 0, 0], [0, 0, 5, 0, 0, 0]]);
        let mut assembly = engine(rule, true);
        assembly.place(0, (0, 0, 0), 0);
        // consume the site without placing anything
        assembly.moves.remove(&(1, 0, 0));
        assembly.move_keys.retain(|&key| key != (1, 0, 0));

        assembly.place(1, (1, 1, 0), 0);
        let open = assembly.move_at((1, 0, 0)).cloned().unwrap();
        assert_eq!(
            open.slots[0],
            Some(SlotConstraint::Bind {
                color: 1,
                alignment: orientation_vector(1, 0)
            })
        );
        assert_eq!(
            open.slots[3],
            Some(SlotConstraint::Bind {
                color: 5,
                alignment: orientation_vector(2, 0)
            })
        );
    }

    #[test]
    fn test_every_contact_is_blank_or_complementary() {
        let rule = Rule::from_colors(&[
            [0, 1, 0, 2, 0, 0],
            [-1, 0, 0, 0, 0, 0],
            [3, 0, -2, 0, 0, 0],
            [-3, 0, 4, 4, 4, 4],
        ]);
        let config = AssemblyConfig {
            torsional: false,
            ..AssemblyConfig::default()
        };
        for seed in 0..100 {
            let assembly = grow(rule.clone(), config.clone(), seed);
            for (index, particle) in assembly.particles().iter().enumerate() {
                for face in 0..NUM_DIRECTIONS {
                    let neighbour = add(particle.position, DIRECTIONS[face]);
                    let Some(&other) = assembly.occupied.get(&neighbour) else {
                        continue;
                    };
                    let mine = assembly.oriented[index].patches[face];
                    let theirs = assembly.oriented[other].patches[opposite(face)];
                    let consistent = if mine.is_empty() {
                        theirs.is_empty()
                    } else {
                        colors_match(mine.color, theirs.color, false)
                    };
                    assert!(consistent, "seed {seed}: bad contact at {:?}", particle.position);
                }
            }
        }
    }

    #[test]
    fn test_out_of_bounds_is_rejected_not_fatal() {
        // an infinite chain along x, clipped by the coordinate bound
        let rule = Rule::from_colors(&[[-1, 1, 0, 0, 0, 0]]);
        let config = AssemblyConfig {
            max_coord: 3,
            torsional: false,
            ..AssemblyConfig::default()
        };
        let mut assembly = Assembly::seeded(rule, config, 2).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        assembly.subscribe(move |event| sink.borrow_mut().push(*event));

        assert_eq!(assembly.run(), AssemblyState::Bounded);
        assert_eq!(assembly.particles().len(), 7);
        let events = events.borrow();
        let out_of_bounds = events
            .iter()
            .filter(|e| matches!(e, AssemblyEvent::OutOfBounds { .. }))
            .count();
        assert_eq!(out_of_bounds, 2);
        assert!(matches!(
            events.last(),
            Some(AssemblyEvent::Terminated {
                state: AssemblyState::Bounded,
                particles: 7
            })
        ));
    }

    #[test]
    fn test_growth_terminates_within_cap() {
        let rule = Rule::from_colors(&[[1, -1, 2, -2, 0, 0]]);
        let config = AssemblyConfig {
            max_particles: 25,
            torsional: false,
            ..AssemblyConfig::default()
        };
        let mut assembly = Assembly::seeded(rule, config, 9).unwrap();
        let mut steps = 0;
        while !assembly.step().is_terminal() {
            steps += 1;
            assert!(steps <= 25 * NUM_DIRECTIONS, "growth did not terminate");
        }
        assert!(assembly.particles().len() <= 25);
    }

    #[test]
    fn test_planar_assembly_stays_in_plane() {
        let flat = |colors: [i32; NUM_DIRECTIONS]| {
            let mut species = Species::from_colors(colors);
            for (face, patch) in species.patches.iter_mut().enumerate() {
                patch.orientation = flat_orientation(face);
            }
            species
        };
        let rule = Rule::new(vec![flat([1, 1, 1, 1, 0, 0]), flat([-1, 0, 0, 0, 0, 0])]);
        let config = AssemblyConfig {
            dims: Dims::Two,
            ..AssemblyConfig::default()
        };
        let assembly = grow(rule, config, 4);
        assert_eq!(assembly.state(), AssemblyState::Bounded);
        assert_eq!(assembly.particles().len(), 5);
        assert!(assembly.positions().iter().all(|&(_, _, z)| z == 0));
        let plus = [(0, 0, 0), (1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0)];
        assert!(shapes_equal(&assembly.positions(), &plus));
    }

    #[test]
    fn test_planar_rejects_out_of_plane_patches() {
        let rule = Rule::from_colors(&[[0, 0, 0, 0, 1, 0]]);
        let config = AssemblyConfig {
            dims: Dims::Two,
            ..AssemblyConfig::default()
        };
        assert_eq!(
            Assembly::seeded(rule, config, 0).err(),
            Some(AssemblyError::OutOfPlanePatch {
                species: 0,
                face: 4
            })
        );
    }

    #[test]
    fn test_reset_returns_to_empty() {
        let rule = Rule::from_colors(&[[1, 0, 0, 0, 0, 0], [-1, 0, 0, 0, 0, 0]]);
        let mut assembly = Assembly::seeded(rule, AssemblyConfig::default(), 0).unwrap();
        assembly.run();
        assembly.reset();
        assert_eq!(assembly.state(), AssemblyState::Empty);
        assert!(assembly.particles().is_empty());
        assert_eq!(assembly.step(), AssemblyState::Seeded);
    }
}
