//! Boolean encoding of "some rule with S species and C colors assembles this
//! topology".
//!
//! Color indices inside the formula run over `0..=2C`. Index 0 is the blank
//! color; every color has exactly one binding partner and the blank is pinned
//! to bind only itself, so it never forms a real bond. A decoded rule maps each
//! remaining partner pair to `+k`/`-k`.

use tracing::debug;

use crate::geometry::{
    flat_orientation, opposite, orientation_vector, rotation_group, Dims, RotationGroup,
    NUM_DIRECTIONS, NUM_ORIENTATIONS,
};
use crate::rule::{Patch, Rule, Species};
use crate::sat::formula::{Assignment, Clause, Formula, Literal};
use crate::sat::vars::{Bounds, Var, VariableTable};
use crate::topology::Topology;

/// Formula color index of the blank color.
pub const BLANK_COLOR: usize = 0;

/// Switches for the global constraints added on top of the base encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodingOptions {
    pub dims: Dims,
    /// Encode patch orientations and directional bindings.
    pub torsional: bool,
    /// Every species occurs at least once in the topology.
    pub require_all_species: bool,
    /// Every non-blank color occurs on some species patch.
    pub require_all_colors: bool,
    /// No non-blank color binds itself.
    pub forbid_self_complementary: bool,
    /// Blank patches carry the reference orientation.
    pub fix_blank_orientation: bool,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            dims: Dims::Three,
            torsional: true,
            require_all_species: true,
            require_all_colors: true,
            forbid_self_complementary: true,
            fix_blank_orientation: true,
        }
    }
}

/// Whether face `p1` with orientation `o1` may bind face `p2` with
/// orientation `o2` under torsion: the faces are opposite and their world
/// alignment vectors agree.
pub fn directional_binding(p1: usize, o1: usize, p2: usize, o2: usize) -> bool {
    p2 == opposite(p1)
        && orientation_vector(p1, o1 as u8) == orientation_vector(p2, o2 as u8)
}

/// Builds the formula for one `(species, colors)` candidate.
#[derive(Clone, Debug)]
pub struct Encoder<'t> {
    topology: &'t Topology,
    num_species: usize,
    num_colors: usize,
    options: EncodingOptions,
    group: &'static RotationGroup,
    vars: VariableTable,
    clauses: Vec<Clause>,
}

impl<'t> Encoder<'t> {
    /// Base encoding plus the global constraints selected in `options`.
    ///
    /// The blank color is always pinned to bind itself and every
    /// required-empty slot of the topology is fixed to blank.
    pub fn new(
        topology: &'t Topology,
        num_species: usize,
        num_colors: usize,
        options: EncodingOptions,
    ) -> Self {
        let mut encoder = Self::base(topology, num_species, num_colors, options);

        encoder.fix_color_interaction(BLANK_COLOR, BLANK_COLOR, true);
        for &(position, face) in topology.empty() {
            encoder.fix_slot_color(position, face, BLANK_COLOR);
        }
        if encoder.options.require_all_species {
            encoder.require_all_species();
        }
        if encoder.options.require_all_colors {
            encoder.require_all_colors_except(BLANK_COLOR);
        }
        if encoder.options.forbid_self_complementary {
            encoder.forbid_self_complementary(BLANK_COLOR);
        }
        if encoder.options.fix_blank_orientation {
            encoder.fix_blank_orientation();
        }

        debug!(
            species = num_species,
            colors = num_colors,
            vars = encoder.vars.len(),
            clauses = encoder.clauses.len(),
            "encoded topology"
        );
        encoder
    }

    /// The mandatory clause families with no global constraints.
    pub fn base(
        topology: &'t Topology,
        num_species: usize,
        num_colors: usize,
        options: EncodingOptions,
    ) -> Self {
        let group = rotation_group(options.dims);
        let bounds = Bounds {
            positions: topology.num_particles(),
            species: num_species,
            colors: 2 * num_colors + 1,
            rotations: group.len(),
        };
        let mut encoder = Self {
            topology,
            num_species,
            num_colors,
            options,
            group,
            vars: VariableTable::new(bounds),
            clauses: Vec::new(),
        };
        encoder.encode_color_pairs();
        encoder.encode_species_patches();
        encoder.encode_slots();
        encoder.encode_bindings();
        encoder.encode_placements();
        if encoder.options.dims == Dims::Two {
            encoder.encode_plane();
        }
        encoder
    }

    pub fn num_species(&self) -> usize {
        self.num_species
    }

    pub fn num_colors(&self) -> usize {
        self.num_colors
    }

    pub fn options(&self) -> &EncodingOptions {
        &self.options
    }

    pub fn variables(&self) -> &VariableTable {
        &self.vars
    }

    /// The current formula. The variable count is the largest id assigned.
    pub fn formula(&self) -> Formula {
        Formula::new(self.vars.len(), self.clauses.clone())
    }

    fn sat_colors(&self) -> usize {
        2 * self.num_colors + 1
    }

    fn num_positions(&self) -> usize {
        self.topology.num_particles()
    }

    fn lit(&mut self, var: Var) -> Literal {
        self.vars.id(var)
    }

    fn exactly_one(&mut self, literals: Vec<Literal>) {
        for (i, &a) in literals.iter().enumerate() {
            for &b in &literals[i + 1..] {
                self.clauses.push(vec![-a, -b]);
            }
        }
        self.clauses.push(literals);
    }

    fn encode_color_pairs(&mut self) {
        let colors = self.sat_colors();
        for c1 in 0..colors {
            let partners = (0..colors).map(|c2| self.lit(Var::B(c1, c2))).collect();
            self.exactly_one(partners);
        }
    }

    fn encode_species_patches(&mut self) {
        let colors = self.sat_colors();
        for s in 0..self.num_species {
            for p in 0..NUM_DIRECTIONS {
                let choice = (0..colors).map(|c| self.lit(Var::C(s, p, c))).collect();
                self.exactly_one(choice);
                if self.options.torsional {
                    let choice = (0..NUM_ORIENTATIONS)
                        .map(|o| self.lit(Var::O(s, p, o)))
                        .collect();
                    self.exactly_one(choice);
                }
            }
        }
    }

    fn encode_slots(&mut self) {
        let colors = self.sat_colors();
        for l in 0..self.num_positions() {
            for p in 0..NUM_DIRECTIONS {
                let choice = (0..colors).map(|c| self.lit(Var::F(l, p, c))).collect();
                self.exactly_one(choice);
                if self.options.torsional {
                    let choice = (0..NUM_ORIENTATIONS)
                        .map(|o| self.lit(Var::A(l, p, o)))
                        .collect();
                    self.exactly_one(choice);
                }
            }
        }
    }

    fn encode_bindings(&mut self) {
        let colors = self.sat_colors();
        for binding in self.topology.bindings() {
            let (l1, p1, l2, p2) = (binding.a, binding.dir_a, binding.b, binding.dir_b);

            // a bound slot carries a real color
            let blank1 = self.lit(Var::F(l1, p1, BLANK_COLOR));
            let blank2 = self.lit(Var::F(l2, p2, BLANK_COLOR));
            self.clauses.push(vec![-blank1]);
            self.clauses.push(vec![-blank2]);

            for c1 in 0..colors {
                for c2 in 0..colors {
                    let f1 = self.lit(Var::F(l1, p1, c1));
                    let f2 = self.lit(Var::F(l2, p2, c2));
                    let pair = self.lit(Var::B(c1, c2));
                    self.clauses.push(vec![-f1, -f2, pair]);
                }
            }

            if self.options.torsional {
                for o1 in 0..NUM_ORIENTATIONS {
                    for o2 in 0..NUM_ORIENTATIONS {
                        if !directional_binding(p1, o1, p2, o2) {
                            let a1 = self.lit(Var::A(l1, p1, o1));
                            let a2 = self.lit(Var::A(l2, p2, o2));
                            self.clauses.push(vec![-a1, -a2]);
                        }
                    }
                }
            }
        }
    }

    fn encode_placements(&mut self) {
        let colors = self.sat_colors();
        let rotations = self.group.len();
        for l in 0..self.num_positions() {
            let choice = (0..self.num_species)
                .flat_map(|s| (0..rotations).map(move |r| (s, r)))
                .map(|(s, r)| self.lit(Var::P(l, s, r)))
                .collect();
            self.exactly_one(choice);

            for s in 0..self.num_species {
                for r in 0..rotations {
                    let placed = self.lit(Var::P(l, s, r));
                    for p in 0..NUM_DIRECTIONS {
                        let q = self.group.source_face(r, p);
                        for c in 0..colors {
                            let slot = self.lit(Var::F(l, p, c));
                            let patch = self.lit(Var::C(s, q, c));
                            self.clauses.push(vec![-placed, -slot, patch]);
                            self.clauses.push(vec![-placed, slot, -patch]);
                        }
                        if self.options.torsional {
                            for o_species in 0..NUM_ORIENTATIONS {
                                let (face, o_world) =
                                    self.group.rotate_orientation(q, r, o_species as u8);
                                debug_assert_eq!(face, p);
                                let slot = self.lit(Var::A(l, p, o_world as usize));
                                let patch = self.lit(Var::O(s, q, o_species));
                                self.clauses.push(vec![-placed, -slot, patch]);
                                self.clauses.push(vec![-placed, slot, -patch]);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Out-of-plane faces are inert and in-plane orientations are flat.
    ///
    /// Out-of-plane orientations stay free: a quarter turn about `+z` moves
    /// their alignment vector.
    fn encode_plane(&mut self) {
        let in_plane = Dims::Two.num_directions();
        for l in 0..self.num_positions() {
            for p in in_plane..NUM_DIRECTIONS {
                self.fix_slot_color(l, p, BLANK_COLOR);
            }
            if self.options.torsional {
                for p in 0..in_plane {
                    let flat = self.lit(Var::A(l, p, flat_orientation(p) as usize));
                    self.clauses.push(vec![flat]);
                }
            }
        }
        for s in 0..self.num_species {
            for p in in_plane..NUM_DIRECTIONS {
                let blank = self.lit(Var::C(s, p, BLANK_COLOR));
                self.clauses.push(vec![blank]);
            }
            if self.options.torsional {
                for p in 0..in_plane {
                    let flat = self.lit(Var::O(s, p, flat_orientation(p) as usize));
                    self.clauses.push(vec![flat]);
                }
            }
        }
    }

    /// Every species is placed at least once.
    pub fn require_all_species(&mut self) {
        let rotations = self.group.len();
        for s in 0..self.num_species {
            let clause = (0..self.num_positions())
                .flat_map(|l| (0..rotations).map(move |r| (l, r)))
                .map(|(l, r)| self.lit(Var::P(l, s, r)))
                .collect();
            self.clauses.push(clause);
        }
    }

    /// Every color other than `except` appears on some species patch.
    pub fn require_all_colors_except(&mut self, except: usize) {
        for c in (0..self.sat_colors()).filter(|&c| c != except) {
            let clause = (0..self.num_species)
                .flat_map(|s| (0..NUM_DIRECTIONS).map(move |p| (s, p)))
                .map(|(s, p)| self.lit(Var::C(s, p, c)))
                .collect();
            self.clauses.push(clause);
        }
    }

    /// Colors with index above `above` may not bind themselves.
    pub fn forbid_self_complementary(&mut self, above: usize) {
        for c in above + 1..self.sat_colors() {
            let pair = self.lit(Var::B(c, c));
            self.clauses.push(vec![-pair]);
        }
    }

    /// Fixes whether colors `c1` and `c2` bind.
    pub fn fix_color_interaction(&mut self, c1: usize, c2: usize, binds: bool) {
        let pair = self.lit(Var::B(c1, c2));
        self.clauses.push(vec![if binds { pair } else { -pair }]);
    }

    /// Fixes face `face` of the particle at `position` to `color`.
    pub fn fix_slot_color(&mut self, position: usize, face: usize, color: usize) {
        let slot = self.lit(Var::F(position, face, color));
        self.clauses.push(vec![slot]);
    }

    /// Blank species patches take the reference orientation: flat in the
    /// plane, 0 otherwise. No effect without torsion.
    pub fn fix_blank_orientation(&mut self) {
        if !self.options.torsional {
            return;
        }
        for s in 0..self.num_species {
            for p in 0..NUM_DIRECTIONS {
                let reference = match self.options.dims {
                    Dims::Two => flat_orientation(p) as usize,
                    Dims::Three => 0,
                };
                let blank = self.lit(Var::C(s, p, BLANK_COLOR));
                let oriented = self.lit(Var::O(s, p, reference));
                self.clauses.push(vec![-blank, oriented]);
            }
        }
    }

    /// Excludes the species patch assignment of `assignment` from future
    /// solutions.
    pub fn block_solution(&mut self, assignment: &Assignment) {
        let clause: Clause = self
            .vars
            .iter()
            .filter(|(_, var)| matches!(var, Var::C(..) | Var::O(..)))
            .filter(|&(id, _)| assignment.is_true(id))
            .map(|(id, _)| -id)
            .collect();
        self.clauses.push(clause);
    }

    fn is_true(&self, assignment: &Assignment, var: Var) -> bool {
        self.vars
            .get(var)
            .is_some_and(|id| assignment.is_true(id))
    }

    /// Reads the rule out of a satisfying assignment.
    ///
    /// Partner pairs are numbered in order of their lower color index; the
    /// lower member becomes `+k` and the upper `-k`.
    pub fn decode_rule(&self, assignment: &Assignment) -> Rule {
        let colors = self.sat_colors();
        let mut mapping = vec![0i32; colors];
        let mut next = 1;
        for c1 in 1..colors {
            if mapping[c1] != 0 {
                continue;
            }
            if let Some(c2) = (c1..colors).find(|&c2| self.is_true(assignment, Var::B(c1, c2))) {
                mapping[c1] = next;
                if c2 != c1 {
                    mapping[c2] = -next;
                }
                next += 1;
            }
        }

        let species = (0..self.num_species)
            .map(|s| {
                let mut patches = [Patch::EMPTY; NUM_DIRECTIONS];
                for (p, patch) in patches.iter_mut().enumerate() {
                    let color = (0..colors)
                        .find(|&c| self.is_true(assignment, Var::C(s, p, c)))
                        .map_or(0, |c| mapping[c]);
                    let orientation = if self.options.torsional {
                        (0..NUM_ORIENTATIONS)
                            .find(|&o| self.is_true(assignment, Var::O(s, p, o)))
                            .unwrap_or(0) as u8
                    } else {
                        0
                    };
                    *patch = Patch::new(color, orientation);
                }
                Species::new(patches)
            })
            .collect();
        Rule::new(species)
    }
}
