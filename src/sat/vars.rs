//! Variable families of the rule-synthesis encoding and their ids.
//!
//! Ids are handed out lazily in first-use order and never change within one
//! table, so a formula and the table that built it always agree.

use rustc_hash::FxHashMap;

use crate::geometry::{NUM_DIRECTIONS, NUM_ORIENTATIONS};
use crate::sat::formula::Literal;

/// One propositional variable of the encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Var {
    /// Color `c1` binds color `c2`. Symmetric; stored with `c1 <= c2`.
    B(usize, usize),
    /// Patch `p` of species `s` has color `c`.
    C(usize, usize, usize),
    /// Patch `p` of species `s` has orientation `o`.
    O(usize, usize, usize),
    /// Face `p` of the particle at position `l` has color `c`.
    F(usize, usize, usize),
    /// Face `p` of the particle at position `l` has orientation `o`.
    A(usize, usize, usize),
    /// Position `l` holds species `s` under rotation `r`.
    P(usize, usize, usize),
}

impl Var {
    /// Canonical form: color pairs are sorted.
    pub fn canonical(self) -> Self {
        match self {
            Var::B(c1, c2) if c1 > c2 => Var::B(c2, c1),
            other => other,
        }
    }
}

/// Index ranges of every family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub positions: usize,
    pub species: usize,
    pub colors: usize,
    pub rotations: usize,
}

impl Bounds {
    fn check(&self, var: Var) {
        let (ok, family) = match var {
            Var::B(c1, c2) => (c1 < self.colors && c2 < self.colors, "B"),
            Var::C(s, p, c) => (
                s < self.species && p < NUM_DIRECTIONS && c < self.colors,
                "C",
            ),
            Var::O(s, p, o) => (
                s < self.species && p < NUM_DIRECTIONS && o < NUM_ORIENTATIONS,
                "O",
            ),
            Var::F(l, p, c) => (
                l < self.positions && p < NUM_DIRECTIONS && c < self.colors,
                "F",
            ),
            Var::A(l, p, o) => (
                l < self.positions && p < NUM_DIRECTIONS && o < NUM_ORIENTATIONS,
                "A",
            ),
            Var::P(l, s, r) => (
                l < self.positions && s < self.species && r < self.rotations,
                "P",
            ),
        };
        assert!(ok, "{family} variable {var:?} out of bounds {self:?}");
    }
}

/// Lazily assigned variable ids.
#[derive(Clone, Debug)]
pub struct VariableTable {
    bounds: Bounds,
    ids: FxHashMap<Var, Literal>,
    /// `vars[id - 1]` is the variable with that id.
    vars: Vec<Var>,
}

impl VariableTable {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            ids: FxHashMap::default(),
            vars: Vec::new(),
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Returns the id of `var`, assigning the next free id on first use.
    ///
    /// Panics if an index is outside the table's bounds.
    pub fn id(&mut self, var: Var) -> Literal {
        let var = var.canonical();
        if let Some(&id) = self.ids.get(&var) {
            return id;
        }
        self.bounds.check(var);
        self.vars.push(var);
        let id = self.vars.len() as Literal;
        self.ids.insert(var, id);
        id
    }

    /// Id of `var` if it has been assigned.
    pub fn get(&self, var: Var) -> Option<Literal> {
        self.ids.get(&var.canonical()).copied()
    }

    /// Variable with the given id.
    pub fn var(&self, id: Literal) -> Option<Var> {
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| self.vars.get(index).copied())
    }

    /// Assigned variables in id order.
    pub fn iter(&self) -> impl Iterator<Item = (Literal, Var)> + '_ {
        self.vars
            .iter()
            .enumerate()
            .map(|(index, &var)| (index as Literal + 1, var))
    }

    /// Number of assigned ids, which is also the largest id.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
