//! GTP client for driving a board-game engine child process
//!
//! This crate provides an async session over the engine's stdio:
//! - One background reader demultiplexing responses to commands in send order
//! - Collected and streaming views of every response
//! - Cancellation of never-ending analysis output
//! - Standard GTP commands and KataGo `lz-analyze` requests on top

pub mod commands;
pub mod katago;
mod ledger;
pub mod reader;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use katago::{AnalysisStream, AnalyzeOptions, KataGoConfig, SearchList};
pub use session::{Response, Session, strip_command};
pub use transport::{LineReader, LineWriter, PipeReader, PipeWriter};

pub use gtp_core::{Color, GeneratedMove, GtpError, Move, MoveInfo, Result, Vertex};
