//! Shape comparison and formatting for assembled structures.
//!
//! Two structures have the same shape when one can be rotated (any of the 24
//! cube rotations) and translated onto the other. Translation is removed by
//! centering on the center of mass; to stay in integer arithmetic, coordinates
//! are scaled by the particle count first (`n * p - sum`).

use rustc_hash::FxHashSet;

use crate::geometry::{Vec3, ROTATIONS};

/// Centers coordinates on their center of mass, scaled by the count.
pub fn scaled_centered(coords: &[Vec3]) -> Vec<Vec3> {
    let n = coords.len() as i32;
    let sum = coords
        .iter()
        .fold((0, 0, 0), |acc, &(x, y, z)| (acc.0 + x, acc.1 + y, acc.2 + z));
    coords
        .iter()
        .map(|&(x, y, z)| (n * x - sum.0, n * y - sum.1, n * z - sum.2))
        .collect()
}

/// Center of mass of a set of lattice positions.
pub fn center_of_mass(coords: &[Vec3]) -> (f64, f64, f64) {
    if coords.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let n = coords.len() as f64;
    let (sx, sy, sz) = coords.iter().fold((0i64, 0i64, 0i64), |acc, &(x, y, z)| {
        (acc.0 + x as i64, acc.1 + y as i64, acc.2 + z as i64)
    });
    (sx as f64 / n, sy as f64 / n, sz as f64 / n)
}

/// Whether two coordinate sets are equal up to rotation and translation.
pub fn shapes_equal(a: &[Vec3], b: &[Vec3]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    if a.is_empty() {
        return true;
    }

    let centered_a = scaled_centered(a);
    let target: FxHashSet<Vec3> = scaled_centered(b).into_iter().collect();
    if target.len() != centered_a.len() {
        // duplicate positions on one side only
        return false;
    }

    ROTATIONS
        .iter()
        .any(|rotate| centered_a.iter().all(|&p| target.contains(&rotate(p))))
}

/// Formats a structure as z-slices side by side.
///
/// Each cell shows the species index (0-9, then letters), empty cells show
/// as '.'. Rows run from the highest y down, columns from the lowest x.
pub fn format_structure(particles: &[(Vec3, usize)]) -> String {
    if particles.is_empty() {
        return String::from("(empty)\n");
    }

    let (mut min, mut max) = (particles[0].0, particles[0].0);
    for &((x, y, z), _) in particles {
        min = (min.0.min(x), min.1.min(y), min.2.min(z));
        max = (max.0.max(x), max.1.max(y), max.2.max(z));
    }

    let mut cells = rustc_hash::FxHashMap::default();
    for &(position, species) in particles {
        cells.insert(position, species);
    }

    let extent = (max.0 - min.0 + 1) as usize;
    let slices: Vec<i32> = (min.2..=max.2).collect();
    let labels: Vec<String> = slices.iter().map(|z| format!("z={z}")).collect();
    let width = labels.iter().map(String::len).max().unwrap_or(0).max(extent);

    let mut output = String::new();
    for (i, label) in labels.iter().enumerate() {
        if i > 0 {
            output.push_str("  ");
        }
        output.push_str(label);
        if i + 1 < labels.len() {
            output.push_str(&" ".repeat(width - label.len()));
        }
    }
    output.push('\n');

    for y in (min.1..=max.1).rev() {
        for (i, &z) in slices.iter().enumerate() {
            if i > 0 {
                output.push_str("  ");
            }
            for x in min.0..=max.0 {
                let display_char = match cells.get(&(x, y, z)) {
                    None => '.',
                    Some(&species) if species < 10 => char::from(b'0' + species as u8),
                    Some(&species) if species < 36 => char::from(b'A' + (species - 10) as u8),
                    Some(_) => '#',
                };
                output.push(display_char);
            }
            if i + 1 < slices.len() {
                output.push_str(&" ".repeat(width - extent));
            }
        }
        output.push('\n');
    }

    output
}
