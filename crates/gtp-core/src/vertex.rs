//! Board coordinates
//!
//! Columns are written with the letters `A`-`Z` minus `I`, so a column index
//! is a bijective base-25 number: `A`..`Z` are 0..24, `AA` is 25, `AZ` is 49
//! and `AAA` is 650. Rows are one-based in text and zero-based in memory, so
//! `"A1"` is column 0, row 0.

use crate::error::{GtpError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Column letters in order; `I` is never used
const COLUMN_LETTERS: &[u8; 25] = b"ABCDEFGHJKLMNOPQRSTUVWXYZ";

/// Token reserved for the pass move
pub const PASS_TOKEN: &str = "pass";

/// Ordinal (0..24) of a column letter, case-insensitive
pub fn letter_ordinal(c: char) -> Option<u32> {
    let upper = c.to_ascii_uppercase();
    COLUMN_LETTERS
        .iter()
        .position(|&l| l as char == upper)
        .map(|p| p as u32)
}

/// Column letter for an ordinal in 0..24
pub fn ordinal_letter(ordinal: u32) -> Option<char> {
    COLUMN_LETTERS.get(ordinal as usize).map(|&l| l as char)
}

/// Encode a zero-based column index as letters
pub fn column_to_letters(col: u32) -> String {
    let mut x = u64::from(col) + 1;
    let mut letters = Vec::new();
    while x > 0 {
        let mut r = x % 25;
        x /= 25;
        // Exact division: use the last letter and borrow from the quotient
        if r == 0 {
            r = 25;
            x -= 1;
        }
        letters.push(COLUMN_LETTERS[(r - 1) as usize] as char);
    }
    letters.iter().rev().collect()
}

/// Decode column letters into a zero-based column index
pub fn letters_to_column(letters: &str) -> Result<u32> {
    let invalid = || GtpError::InvalidVertex(letters.to_string());

    if letters.is_empty() {
        return Err(invalid());
    }

    let mut x: u64 = 0;
    for c in letters.chars() {
        let ordinal = letter_ordinal(c).ok_or_else(invalid)?;
        x = x
            .checked_mul(25)
            .and_then(|x| x.checked_add(u64::from(ordinal) + 1))
            .ok_or_else(invalid)?;
    }

    u32::try_from(x - 1).map_err(|_| invalid())
}

/// A board coordinate, or the absence of one (pass)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vertex {
    /// Zero-based column and row
    Point { col: u32, row: u32 },
    /// No coordinate
    Pass,
}

impl Vertex {
    /// Create a vertex from zero-based coordinates
    pub fn new(col: u32, row: u32) -> Self {
        Vertex::Point { col, row }
    }

    /// Zero-based `(col, row)`, or `None` for pass
    pub fn coords(&self) -> Option<(u32, u32)> {
        match *self {
            Vertex::Point { col, row } => Some((col, row)),
            Vertex::Pass => None,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Vertex::Pass)
    }
}

impl From<(u32, u32)> for Vertex {
    fn from((col, row): (u32, u32)) -> Self {
        Vertex::new(col, row)
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Vertex::Point { col, row } => {
                write!(f, "{}{}", column_to_letters(col), u64::from(row) + 1)
            }
            Vertex::Pass => f.write_str(PASS_TOKEN),
        }
    }
}

impl FromStr for Vertex {
    type Err = GtpError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case(PASS_TOKEN) {
            return Ok(Vertex::Pass);
        }

        let invalid = || GtpError::InvalidVertex(s.to_string());

        let split = s.find(|c: char| c.is_ascii_digit()).ok_or_else(invalid)?;
        let (letters, digits) = s.split_at(split);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let col = letters_to_column(letters).map_err(|_| invalid())?;
        let row: u32 = digits.parse().map_err(|_| invalid())?;
        if row == 0 {
            return Err(invalid());
        }

        Ok(Vertex::Point { col, row: row - 1 })
    }
}

impl Serialize for Vertex {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Vertex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
