//! # gtp-core
//!
//! Core types for the Go Text Protocol.
//!
//! This crate provides the pieces of GTP that need no engine process:
//! - Error taxonomy shared by every GTP crate
//! - Board coordinate codec (bijective base-25 columns, `pass`)
//! - Colors, moves and `genmove` replies
//! - Decoder for `lz-analyze` streaming analysis lines

pub mod analysis;
pub mod error;
pub mod moves;
pub mod vertex;

pub use analysis::{MoveInfo, parse_analysis_line};
pub use error::{GtpError, Result};
pub use moves::{Color, GeneratedMove, Move};
pub use vertex::{Vertex, column_to_letters, letters_to_column};
