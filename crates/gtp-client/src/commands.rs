//! Standard GTP commands
//!
//! Each method formats one command and parses its one reply shape.
//! Failure replies come back as [`GtpError::CommandFailed`].

use crate::session::Session;
use gtp_core::{Color, GeneratedMove, GtpError, Move, Result};

/// First body line, or an error naming the command
fn first_line(command: &str, lines: Vec<String>) -> Result<String> {
    lines
        .into_iter()
        .next()
        .ok_or_else(|| GtpError::UnexpectedResponse(format!("Empty reply to '{}'", command)))
}

impl Session {
    /// Send a command and collect its body, failing on a `?` reply
    pub async fn query(&self, command: &str) -> Result<Vec<String>> {
        self.send(command).await?.into_result().await
    }

    /// Version of the GTP protocol the engine speaks
    pub async fn protocol_version(&self) -> Result<u32> {
        let line = first_line("protocol_version", self.query("protocol_version").await?)?;
        line.parse().map_err(|_| {
            GtpError::UnexpectedResponse(format!("Invalid protocol version '{}'", line))
        })
    }

    /// Engine name, without version information
    pub async fn name(&self) -> Result<String> {
        first_line("name", self.query("name").await?)
    }

    /// Engine version; empty if the engine has no sense of one
    pub async fn version(&self) -> Result<String> {
        Ok(self
            .query("version")
            .await?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// Whether the engine knows `command`
    pub async fn known_command(&self, command: &str) -> Result<bool> {
        let line = first_line(
            "known_command",
            self.query(&format!("known_command {}", command)).await?,
        )?;
        Ok(line == "true")
    }

    /// Every command the engine knows, private extensions included
    pub async fn list_commands(&self) -> Result<Vec<String>> {
        self.query("list_commands").await
    }

    /// Change the board size; the position becomes arbitrary until `clear_board`
    pub async fn boardsize(&self, size: u32) -> Result<()> {
        self.query(&format!("boardsize {}", size)).await?;
        Ok(())
    }

    /// Clear the board, captures and move history
    pub async fn clear_board(&self) -> Result<()> {
        self.query("clear_board").await?;
        Ok(())
    }

    /// Set komi
    pub async fn komi(&self, komi: f32) -> Result<()> {
        self.query(&format!("komi {}", komi)).await?;
        Ok(())
    }

    /// Play a stone (or pass) for the given color
    pub async fn play(&self, mv: Move) -> Result<()> {
        self.query(&format!("play {}", mv)).await?;
        Ok(())
    }

    /// Let the engine generate and play a move for `color`
    pub async fn genmove(&self, color: Color) -> Result<GeneratedMove> {
        let line = first_line("genmove", self.query(&format!("genmove {}", color)).await?)?;
        line.parse().map_err(|_| {
            GtpError::UnexpectedResponse(format!("Invalid genmove reply '{}'", line))
        })
    }

    /// Alias for [`Session::shutdown`]; send no more commands afterwards
    pub async fn quit(&self) -> Result<()> {
        self.shutdown().await
    }
}
