//! Lattice directions, patch alignment vectors and the cube rotation group.
//!
//! A cube has 24 proper rotations (6 ways to choose which face points up,
//! times 4 rotations around the vertical axis). Planar assemblies only use the
//! 4 rotations around +Z. Every rotation is tabulated once as a permutation of
//! the face directions plus, per face, the induced change of a patch's
//! orientation index.

use std::sync::OnceLock;

/// An integer lattice vector.
pub type Vec3 = (i32, i32, i32);

/// Number of patch slots on a particle (one per face).
pub const NUM_DIRECTIONS: usize = 6;

/// Number of quarter-turn orientations a patch can take around its face axis.
pub const NUM_ORIENTATIONS: usize = 4;

/// Face directions, ordered so that `d ^ 1` is the opposite of `d`.
pub const DIRECTIONS: [Vec3; NUM_DIRECTIONS] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
];

/// Reference "up" vector of each face, used for orientation 0.
///
/// Each vector is orthogonal to its face direction.
pub const FACE_ALIGNMENTS: [Vec3; NUM_DIRECTIONS] = [
    (0, 1, 0),
    (0, 1, 0),
    (0, 0, 1),
    (0, 0, 1),
    (1, 0, 0),
    (1, 0, 0),
];

/// All 24 rotations of the cube.
///
/// Organized as 6 face-up choices x 4 rotations around vertical:
/// - Rotations 0-3: +Z face up (the planar subgroup)
/// - Rotations 4-7: +Y face up
/// - Rotations 8-11: -Z face up
/// - Rotations 12-15: -Y face up
/// - Rotations 16-19: +X face up
/// - Rotations 20-23: -X face up
///
/// Rotation 0 is the identity.
pub const ROTATIONS: [fn(Vec3) -> Vec3; 24] = [
    // +Z face up (identity orientation), rotate around Z axis
    |(x, y, z)| (x, y, z),  // 0 degrees
    |(x, y, z)| (-y, x, z), // 90 degrees
    |(x, y, z)| (-x, -y, z), // 180 degrees
    |(x, y, z)| (y, -x, z), // 270 degrees
    // +Y face up
    |(x, y, z)| (x, -z, y),
    |(x, y, z)| (z, x, y),
    |(x, y, z)| (-x, z, y),
    |(x, y, z)| (-z, -x, y),
    // -Z face up
    |(x, y, z)| (x, -y, -z),
    |(x, y, z)| (y, x, -z),
    |(x, y, z)| (-x, y, -z),
    |(x, y, z)| (-y, -x, -z),
    // -Y face up
    |(x, y, z)| (x, z, -y),
    |(x, y, z)| (-z, x, -y),
    |(x, y, z)| (-x, -z, -y),
    |(x, y, z)| (z, -x, -y),
    // +X face up
    |(x, y, z)| (z, y, -x),
    |(x, y, z)| (-y, z, -x),
    |(x, y, z)| (-z, -y, -x),
    |(x, y, z)| (y, -z, -x),
    // -X face up
    |(x, y, z)| (-z, y, x),
    |(x, y, z)| (-y, -z, x),
    |(x, y, z)| (z, -y, x),
    |(x, y, z)| (y, z, x),
];

/// Dimensionality of an assembly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Dims {
    /// Planar growth in the z = 0 plane; only the four in-plane faces bind.
    Two,
    #[default]
    Three,
}

impl Dims {
    /// Number of face directions that can carry a binding patch.
    pub const fn num_directions(self) -> usize {
        match self {
            Dims::Two => 4,
            Dims::Three => NUM_DIRECTIONS,
        }
    }

    /// Number of rotations available to a particle.
    pub const fn num_rotations(self) -> usize {
        match self {
            Dims::Two => 4,
            Dims::Three => ROTATIONS.len(),
        }
    }
}

/// Returns the direction opposite to `direction`.
#[inline(always)]
pub const fn opposite(direction: usize) -> usize {
    direction ^ 1
}

#[inline]
pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    (a.0 + b.0, a.1 + b.1, a.2 + b.2)
}

#[inline]
pub fn neg(a: Vec3) -> Vec3 {
    (-a.0, -a.1, -a.2)
}

#[inline]
pub fn dot(a: Vec3, b: Vec3) -> i32 {
    a.0 * b.0 + a.1 * b.1 + a.2 * b.2
}

#[inline]
pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    (
        a.1 * b.2 - a.2 * b.1,
        a.2 * b.0 - a.0 * b.2,
        a.0 * b.1 - a.1 * b.0,
    )
}

/// Finds the direction index of a unit lattice vector.
pub fn direction_index(vector: Vec3) -> Option<usize> {
    DIRECTIONS.iter().position(|&d| d == vector)
}

/// Signed number of quarter turns around `axis` that carries `from` onto `to`.
///
/// Both vectors must be orthogonal to `axis`. Returns a value in `-1..=2`
/// (positive is counter-clockwise by the right-hand rule), or `None` when
/// `to` is not reachable by a quarter-turn rotation of `from`.
pub fn signed_quarter_turns(axis: Vec3, from: Vec3, to: Vec3) -> Option<i8> {
    if dot(axis, from) != 0 || dot(axis, to) != 0 {
        return None;
    }
    let turned = cross(axis, from);
    if to == from {
        Some(0)
    } else if to == turned {
        Some(1)
    } else if to == neg(from) {
        Some(2)
    } else if to == neg(turned) {
        Some(-1)
    } else {
        None
    }
}

/// World-frame alignment vector of a patch at `face` with the given orientation.
pub fn orientation_vector(face: usize, orientation: u8) -> Vec3 {
    let axis = DIRECTIONS[face];
    let mut vector = FACE_ALIGNMENTS[face];
    for _ in 0..orientation as usize % NUM_ORIENTATIONS {
        vector = cross(axis, vector);
    }
    vector
}

/// Orientation index at `face` whose alignment vector equals `vector`.
pub fn orientation_index(face: usize, vector: Vec3) -> Option<u8> {
    signed_quarter_turns(DIRECTIONS[face], FACE_ALIGNMENTS[face], vector)
        .map(|turns| turns.rem_euclid(NUM_ORIENTATIONS as i8) as u8)
}

/// Orientation forced on every patch of a planar assembly.
///
/// In-plane faces align with +Z, which every planar rotation preserves.
/// The out-of-plane faces are always blank and keep orientation 0.
pub fn flat_orientation(face: usize) -> u8 {
    if face < Dims::Two.num_directions() {
        match orientation_index(face, (0, 0, 1)) {
            Some(orientation) => orientation,
            None => unreachable!("in-plane face {face} cannot align with +Z"),
        }
    } else {
        0
    }
}

/// Tabulated action of a rotation group on faces and patch orientations.
#[derive(Debug)]
pub struct RotationGroup {
    dims: Dims,
    /// `face_maps[r][d]` is the face that face `d` lands on under rotation `r`.
    face_maps: Vec<[usize; NUM_DIRECTIONS]>,
    /// `source_faces[r][d]` is the face that lands on face `d` under rotation `r`.
    source_faces: Vec<[usize; NUM_DIRECTIONS]>,
    /// `orientation_maps[r][d][o]` is the orientation at `face_maps[r][d]`.
    orientation_maps: Vec<[[u8; NUM_ORIENTATIONS]; NUM_DIRECTIONS]>,
}

impl RotationGroup {
    fn build(dims: Dims) -> Self {
        let count = dims.num_rotations();
        let mut face_maps = Vec::with_capacity(count);
        let mut source_faces = Vec::with_capacity(count);
        let mut orientation_maps = Vec::with_capacity(count);

        for rotate in &ROTATIONS[..count] {
            let mut faces = [0usize; NUM_DIRECTIONS];
            let mut sources = [0usize; NUM_DIRECTIONS];
            let mut orientations = [[0u8; NUM_ORIENTATIONS]; NUM_DIRECTIONS];

            for face in 0..NUM_DIRECTIONS {
                let Some(target) = direction_index(rotate(DIRECTIONS[face])) else {
                    unreachable!("rotation maps a face direction off the lattice axes");
                };
                faces[face] = target;
                sources[target] = face;

                // rotate the alignment vector itself, then read off which
                // orientation index at the new face has that vector
                for (orientation, slot) in orientations[face].iter_mut().enumerate() {
                    let rotated = rotate(orientation_vector(face, orientation as u8));
                    *slot = match orientation_index(target, rotated) {
                        Some(index) => index,
                        None => unreachable!(
                            "rotated alignment of face {face} is not orthogonal to face {target}"
                        ),
                    };
                }
            }

            face_maps.push(faces);
            source_faces.push(sources);
            orientation_maps.push(orientations);
        }

        Self {
            dims,
            face_maps,
            source_faces,
            orientation_maps,
        }
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    /// Number of rotations in the group.
    pub fn len(&self) -> usize {
        self.face_maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.face_maps.is_empty()
    }

    /// Face-index permutation of rotation `rotation`.
    pub fn face_map(&self, rotation: usize) -> &[usize; NUM_DIRECTIONS] {
        &self.face_maps[rotation]
    }

    /// Face that `face` is carried to by `rotation`.
    #[inline]
    pub fn rotate_face(&self, rotation: usize, face: usize) -> usize {
        self.face_maps[rotation][face]
    }

    /// Face that is carried onto `face` by `rotation`.
    #[inline]
    pub fn source_face(&self, rotation: usize, face: usize) -> usize {
        self.source_faces[rotation][face]
    }

    /// Rotates a patch: returns its new face and orientation index.
    #[inline]
    pub fn rotate_orientation(&self, face: usize, rotation: usize, orientation: u8) -> (usize, u8) {
        (
            self.face_maps[rotation][face],
            self.orientation_maps[rotation][face][orientation as usize % NUM_ORIENTATIONS],
        )
    }

    /// Applies `rotation` to a lattice vector.
    #[inline]
    pub fn apply(&self, rotation: usize, vector: Vec3) -> Vec3 {
        ROTATIONS[rotation](vector)
    }
}

/// Returns the rotation group for the given dimensionality.
///
/// 24 elements in 3D, the 4 rotations around +Z in 2D.
pub fn rotation_group(dims: Dims) -> &'static RotationGroup {
    static PLANAR: OnceLock<RotationGroup> = OnceLock::new();
    static SPATIAL: OnceLock<RotationGroup> = OnceLock::new();
    match dims {
        Dims::Two => PLANAR.get_or_init(|| RotationGroup::build(Dims::Two)),
        Dims::Three => SPATIAL.get_or_init(|| RotationGroup::build(Dims::Three)),
    }
}
