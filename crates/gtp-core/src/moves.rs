//! Colors and moves

use crate::error::{GtpError, Result};
use crate::vertex::Vertex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stone color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    White,
}

impl Color {
    /// The other color
    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => f.write_str("B"),
            Color::White => f.write_str("W"),
        }
    }
}

impl FromStr for Color {
    type Err = GtpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "b" | "black" => Ok(Color::Black),
            "w" | "white" => Ok(Color::White),
            _ => Err(GtpError::InvalidColor(s.to_string())),
        }
    }
}

/// A color and a vertex, as taken by `play`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub color: Color,
    pub vertex: Vertex,
}

impl Move {
    pub fn new(color: Color, vertex: Vertex) -> Self {
        Self { color, vertex }
    }

    pub fn pass(color: Color) -> Self {
        Self::new(color, Vertex::Pass)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.color, self.vertex)
    }
}

impl FromStr for Move {
    type Err = GtpError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(color), Some(vertex), None) => Ok(Move::new(color.parse()?, vertex.parse()?)),
            _ => Err(GtpError::UnexpectedResponse(format!(
                "expected '<color> <vertex>', got '{}'",
                s
            ))),
        }
    }
}

/// Reply to `genmove`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedMove {
    /// Engine played a stone or passed
    Play(Vertex),
    /// Engine gave up
    Resign,
}

impl fmt::Display for GeneratedMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratedMove::Play(vertex) => vertex.fmt(f),
            GeneratedMove::Resign => f.write_str("resign"),
        }
    }
}

impl FromStr for GeneratedMove {
    type Err = GtpError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("resign") {
            Ok(GeneratedMove::Resign)
        } else {
            s.parse().map(GeneratedMove::Play)
        }
    }
}
