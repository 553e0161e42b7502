//! Single-sequence input normalization.
//!
//! Accepts raw or FASTA-formatted text for exactly one DNA sequence and
//! canonicalizes it to an uppercase string over the extended IUPAC DNA
//! alphabet. Anything else is rejected with a user-facing message.

use crate::error::LookupError;
use std::collections::BTreeSet;

/// The 15-letter IUPAC DNA code, ambiguity letters included. `U` is RNA
/// and deliberately not accepted here.
#[inline(always)]
pub fn is_valid_iupac_dna(letter: u8) -> bool {
    matches!(
        letter.to_ascii_uppercase(),
        b'A' | b'C'
            | b'G'
            | b'T'
            | b'R'
            | b'Y'
            | b'K'
            | b'M'
            | b'S'
            | b'W'
            | b'B'
            | b'D'
            | b'H'
            | b'V'
            | b'N'
    )
}

/// Clean and validate a single DNA sequence in FASTA or raw format.
///
/// FASTA descriptor lines (`>`) are stripped; at most one is allowed. Data
/// lines are concatenated with all whitespace removed and uppercased.
pub fn clean_sequence(raw: &str) -> Result<String, LookupError> {
    let lines: Vec<&str> = raw.trim().lines().collect();
    if lines.is_empty() {
        return Err(LookupError::validation("Input is empty"));
    }

    let descriptor_count = lines.iter().filter(|line| line.starts_with('>')).count();
    if descriptor_count > 1 {
        return Err(LookupError::validation(
            "Multiple sequences detected. Please submit only one sequence at a time.",
        ));
    }

    let cleaned: String = lines
        .iter()
        .filter(|line| !line.starts_with('>'))
        .flat_map(|line| line.chars())
        .filter(|ch| !ch.is_whitespace())
        .map(|ch| ch.to_ascii_uppercase())
        .collect();

    if cleaned.is_empty() {
        return Err(LookupError::validation("No sequence data found"));
    }

    let invalid: BTreeSet<char> = cleaned
        .chars()
        .filter(|&ch| !ch.is_ascii() || !is_valid_iupac_dna(ch as u8))
        .collect();
    if !invalid.is_empty() {
        let listed = invalid
            .iter()
            .map(|ch| ch.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(LookupError::validation(format!(
            "Invalid characters in sequence: {listed}"
        )));
    }

    Ok(cleaned)
}
