//! Text encodings for rules.
//!
//! Hex format: every patch is one byte, written as two hex digits, so each
//! species takes 12 characters and species are concatenated.
//! - bit 7: color sign (set for negative colors)
//! - bits 2..=6: color magnitude (0..=31)
//! - bits 0..=1: orientation (0..=3)
//!
//! Decimal format: species separated by `_`, the 6 patches of a species
//! separated by `|`, each patch written `color` or `color:orientation`.
//! A blank patch with orientation 0 is written as nothing, e.g.
//! `1|1|1|1|1|1_-1|||||`.

use std::str::FromStr;

use thiserror::Error;

use crate::geometry::{NUM_DIRECTIONS, NUM_ORIENTATIONS};
use crate::rule::{Patch, Rule, Species};

/// Largest color magnitude representable in the hex format.
pub const MAX_HEX_COLOR: u32 = 31;

/// Hex characters per species.
pub const HEX_SPECIES_LEN: usize = 2 * NUM_DIRECTIONS;

const SPECIES_SEPARATOR: char = '_';
const PATCH_SEPARATOR: char = '|';
const ORIENTATION_SEPARATOR: char = ':';

/// Errors raised while encoding or decoding a rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("rule string is empty")]
    Empty,
    #[error("hex rule length {len} is not a multiple of {HEX_SPECIES_LEN}")]
    HexLength { len: usize },
    #[error("invalid hex byte {text:?} at offset {offset}")]
    InvalidHex { offset: usize, text: String },
    #[error("hex byte {byte:02x} at offset {offset} is a negative blank color")]
    NegativeZero { offset: usize, byte: u8 },
    #[error("species {species} has {found} patches, expected {NUM_DIRECTIONS}")]
    PatchCount { species: usize, found: usize },
    #[error("invalid color {text:?} in species {species}, patch {patch}")]
    InvalidColor {
        species: usize,
        patch: usize,
        text: String,
    },
    #[error("invalid orientation {text:?} in species {species}, patch {patch}")]
    InvalidOrientation {
        species: usize,
        patch: usize,
        text: String,
    },
    #[error("color {color} exceeds the hex format's maximum magnitude {MAX_HEX_COLOR}")]
    ColorOutOfRange { color: i32 },
    #[error("orientation {orientation} is out of range (must be below {NUM_ORIENTATIONS})")]
    OrientationOutOfRange { orientation: u8 },
}

fn check_orientation(orientation: u8) -> Result<(), CodecError> {
    if orientation as usize >= NUM_ORIENTATIONS {
        return Err(CodecError::OrientationOutOfRange { orientation });
    }
    Ok(())
}

/// Packs a patch into its hex-format byte.
fn patch_to_byte(patch: &Patch) -> Result<u8, CodecError> {
    let magnitude = patch.color.unsigned_abs();
    if magnitude > MAX_HEX_COLOR {
        return Err(CodecError::ColorOutOfRange { color: patch.color });
    }
    check_orientation(patch.orientation)?;
    let sign = u8::from(patch.color < 0);
    Ok((sign << 7) | ((magnitude as u8) << 2) | patch.orientation)
}

/// Unpacks a hex-format byte; a sign bit on magnitude 0 has no patch.
fn byte_to_patch(byte: u8, offset: usize) -> Result<Patch, CodecError> {
    let magnitude = i32::from((byte >> 2) & 0x1f);
    let negative = byte & 0x80 != 0;
    if negative && magnitude == 0 {
        return Err(CodecError::NegativeZero { offset, byte });
    }
    let color = if negative { -magnitude } else { magnitude };
    Ok(Patch::new(color, byte & 0x03))
}

/// Encodes a rule in the fixed-width hex format.
pub fn encode_hex(rule: &Rule) -> Result<String, CodecError> {
    let mut out = String::with_capacity(rule.len() * HEX_SPECIES_LEN);
    for species in &rule.species {
        for patch in &species.patches {
            let byte = patch_to_byte(patch)?;
            out.push_str(&format!("{byte:02x}"));
        }
    }
    Ok(out)
}

/// Decodes a rule from the fixed-width hex format.
pub fn decode_hex(text: &str) -> Result<Rule, CodecError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CodecError::Empty);
    }
    if !text.is_ascii() || text.len() % HEX_SPECIES_LEN != 0 {
        return Err(CodecError::HexLength { len: text.len() });
    }

    let species_count = text.len() / HEX_SPECIES_LEN;
    let mut species = Vec::with_capacity(species_count);
    for species_index in 0..species_count {
        let mut patches = [Patch::EMPTY; NUM_DIRECTIONS];
        for (patch_index, patch) in patches.iter_mut().enumerate() {
            let offset = species_index * HEX_SPECIES_LEN + patch_index * 2;
            let digits = &text[offset..offset + 2];
            // from_str_radix tolerates a leading '+', the format does not
            let byte = digits
                .bytes()
                .all(|b| b.is_ascii_hexdigit())
                .then(|| u8::from_str_radix(digits, 16).ok())
                .flatten()
                .ok_or_else(|| CodecError::InvalidHex {
                    offset,
                    text: digits.to_string(),
                })?;
            *patch = byte_to_patch(byte, offset)?;
        }
        species.push(Species::new(patches));
    }
    Ok(Rule::new(species))
}

/// Encodes a rule in the delimited decimal format.
pub fn encode_decimal(rule: &Rule) -> Result<String, CodecError> {
    let mut out = String::new();
    for (species_index, species) in rule.species.iter().enumerate() {
        if species_index > 0 {
            out.push(SPECIES_SEPARATOR);
        }
        for (patch_index, patch) in species.patches.iter().enumerate() {
            if patch_index > 0 {
                out.push(PATCH_SEPARATOR);
            }
            check_orientation(patch.orientation)?;
            match (patch.color, patch.orientation) {
                (0, 0) => {}
                (color, 0) => out.push_str(&color.to_string()),
                (color, orientation) => {
                    out.push_str(&format!("{color}{ORIENTATION_SEPARATOR}{orientation}"));
                }
            }
        }
    }
    Ok(out)
}

fn decode_decimal_patch(species: usize, patch: usize, field: &str) -> Result<Patch, CodecError> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(Patch::EMPTY);
    }
    let (color_text, orientation_text) = match field.split_once(ORIENTATION_SEPARATOR) {
        Some((color, orientation)) => (color, Some(orientation)),
        None => (field, None),
    };
    let color = color_text
        .parse::<i32>()
        .map_err(|_| CodecError::InvalidColor {
            species,
            patch,
            text: color_text.to_string(),
        })?;
    let orientation = match orientation_text {
        Some(text) => {
            let orientation = text.parse::<u8>().map_err(|_| CodecError::InvalidOrientation {
                species,
                patch,
                text: text.to_string(),
            })?;
            check_orientation(orientation)?;
            orientation
        }
        None => 0,
    };
    Ok(Patch::new(color, orientation))
}

/// Decodes a rule from the delimited decimal format.
pub fn decode_decimal(text: &str) -> Result<Rule, CodecError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CodecError::Empty);
    }

    let mut species = Vec::new();
    for (species_index, species_text) in text.split(SPECIES_SEPARATOR).enumerate() {
        let fields: Vec<&str> = species_text.split(PATCH_SEPARATOR).collect();
        if fields.len() != NUM_DIRECTIONS {
            return Err(CodecError::PatchCount {
                species: species_index,
                found: fields.len(),
            });
        }
        let mut patches = [Patch::EMPTY; NUM_DIRECTIONS];
        for (patch_index, field) in fields.iter().enumerate() {
            patches[patch_index] = decode_decimal_patch(species_index, patch_index, field)?;
        }
        species.push(Species::new(patches));
    }
    Ok(Rule::new(species))
}

/// Decodes either format: delimited text is decimal, anything else is hex.
pub fn decode(text: &str) -> Result<Rule, CodecError> {
    if text.contains(PATCH_SEPARATOR) || text.contains(SPECIES_SEPARATOR) {
        decode_decimal(text)
    } else {
        decode_hex(text)
    }
}

impl FromStr for Rule {
    type Err = CodecError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        decode(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rule() -> Rule {
        Rule::new(vec![
            Species::new([
                Patch::new(1, 0),
                Patch::new(-2, 3),
                Patch::EMPTY,
                Patch::new(31, 1),
                Patch::new(-31, 2),
                Patch::new(0, 2),
            ]),
            Species::from_colors([-1, 0, 0, 0, 0, 2]),
        ])
    }

    #[test]
    fn test_hex_roundtrip() {
        let rule = sample_rule();
        let encoded = encode_hex(&rule).unwrap();
        assert_eq!(encoded.len(), 2 * HEX_SPECIES_LEN);
        assert_eq!(decode_hex(&encoded).unwrap(), rule);
    }

    #[test]
    fn test_decimal_roundtrip() {
        let rule = sample_rule();
        let encoded = encode_decimal(&rule).unwrap();
        assert_eq!(decode_decimal(&encoded).unwrap(), rule);
    }

    #[test]
    fn test_hex_byte_layout() {
        let rule = Rule::from_colors(&[[1, 1, 1, 1, 1, 1], [-1, 0, 0, 0, 0, 0]]);
        insta::assert_snapshot!(encode_hex(&rule).unwrap(), @"040404040404840000000000");
        assert_eq!(
            encode_hex(&Rule::new(vec![Species::new([Patch::new(-3, 2); 6])])).unwrap(),
            "8e8e8e8e8e8e"
        );
    }

    #[test]
    fn test_decimal_layout() {
        let rule = Rule::new(vec![
            Species::from_colors([1, 1, 1, 1, 1, 1]),
            Species::new([
                Patch::new(-1, 2),
                Patch::EMPTY,
                Patch::new(0, 1),
                Patch::EMPTY,
                Patch::EMPTY,
                Patch::EMPTY,
            ]),
        ]);
        insta::assert_snapshot!(encode_decimal(&rule).unwrap(), @"1|1|1|1|1|1_-1:2||0:1|||");
    }

    #[test]
    fn test_decode_detects_format() {
        let hex: Rule = "040404040404840000000000".parse().unwrap();
        let decimal: Rule = "1|1|1|1|1|1_-1|||||".parse().unwrap();
        assert_eq!(hex, decimal);
    }

    #[test]
    fn test_hex_rejects_bad_length() {
        assert_eq!(
            decode_hex("0404040404"),
            Err(CodecError::HexLength { len: 10 })
        );
        assert_eq!(decode_hex("   "), Err(CodecError::Empty));
    }

    #[test]
    fn test_hex_rejects_bad_digits() {
        assert_eq!(
            decode_hex("0404040404zz"),
            Err(CodecError::InvalidHex {
                offset: 10,
                text: "zz".to_string()
            })
        );
    }

    #[test]
    fn test_hex_rejects_negative_blank() {
        assert_eq!(
            decode_hex("040000800000"),
            Err(CodecError::NegativeZero {
                offset: 6,
                byte: 0x80
            })
        );
        assert!(decode_hex("040000000000").is_ok());
    }

    #[test]
    fn test_hex_encode_refuses_large_colors() {
        let rule = Rule::from_colors(&[[32, 0, 0, 0, 0, 0]]);
        assert_eq!(
            encode_hex(&rule),
            Err(CodecError::ColorOutOfRange { color: 32 })
        );
        // the decimal format carries larger alphabets
        let decimal = encode_decimal(&rule).unwrap();
        assert_eq!(decode_decimal(&decimal).unwrap(), rule);
    }

    #[test]
    fn test_orientation_out_of_range() {
        let rule = Rule::new(vec![Species::new([Patch::new(1, 4); 6])]);
        assert_eq!(
            encode_hex(&rule),
            Err(CodecError::OrientationOutOfRange { orientation: 4 })
        );
        assert_eq!(
            decode_decimal("1:4|||||"),
            Err(CodecError::OrientationOutOfRange { orientation: 4 })
        );
    }

    #[test]
    fn test_decimal_rejects_wrong_patch_count() {
        assert_eq!(
            decode_decimal("1|1|1|1|1|1_-1||||"),
            Err(CodecError::PatchCount {
                species: 1,
                found: 5
            })
        );
        assert!(matches!(
            decode_decimal("x|||||"),
            Err(CodecError::InvalidColor { species: 0, patch: 0, .. })
        ));
    }
}
