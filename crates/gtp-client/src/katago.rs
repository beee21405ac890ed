//! KataGo launch configuration and live analysis
//!
//! See <https://github.com/lightvector/KataGo/blob/master/docs/GTP_Extensions.md>.

use crate::session::{Response, Session};
use gtp_core::{Color, GtpError, MoveInfo, Result, Vertex, parse_analysis_line};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

/// Paths needed to launch KataGo in GTP mode
#[derive(Debug, Clone)]
pub struct KataGoConfig {
    /// KataGo executable
    pub executable: PathBuf,
    /// Neural net model file
    pub model: PathBuf,
    /// GTP config file
    pub config: PathBuf,
}

impl KataGoConfig {
    pub fn new(
        executable: impl Into<PathBuf>,
        model: impl Into<PathBuf>,
        config: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable: executable.into(),
            model: model.into(),
            config: config.into(),
        }
    }

    /// Arguments for `gtp` mode
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "gtp".into(),
            "-model".into(),
            self.model.clone().into(),
            "-config".into(),
            self.config.clone().into(),
        ]
    }
}

impl Session {
    /// Spawn KataGo in GTP mode
    pub async fn spawn_katago(config: &KataGoConfig) -> Result<Self> {
        Self::spawn(&config.executable, config.args()).await
    }

    /// Start `lz-analyze`; stop it with [`Session::cancel_streaming`]
    pub async fn lz_analyze(&self, options: &AnalyzeOptions) -> Result<AnalysisStream> {
        let response = self.send(&options.to_command()?).await?;

        if !response.ok() {
            let command = response.command().to_string();
            let message = response.collect().await?.join("\n");
            return Err(GtpError::CommandFailed { command, message });
        }

        Ok(AnalysisStream { response })
    }
}

/// Moves for one player, restricted until a search depth
#[derive(Debug, Clone, PartialEq)]
pub struct SearchList {
    pub player: Color,
    pub vertices: Vec<Vertex>,
    pub until_depth: u32,
}

impl SearchList {
    pub fn new(player: Color, vertices: Vec<Vertex>, until_depth: u32) -> Self {
        Self {
            player,
            vertices,
            until_depth,
        }
    }
}

impl fmt::Display for SearchList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vertices: Vec<String> = self.vertices.iter().map(Vertex::to_string).collect();
        write!(f, "{} {} {}", self.player, vertices.join(","), self.until_depth)
    }
}

/// Arguments of an `lz-analyze` request
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Player to move next; the normal player if unset
    pub player: Option<Color>,
    /// Output a line every this many centiseconds
    pub interval: Option<u32>,
    /// Report at least this many moves
    pub minmoves: Option<u32>,
    /// Report at most this many moves (not supported by Leela Zero)
    pub maxmoves: Option<u32>,
    /// Moves the search may not explore
    pub avoid: Vec<SearchList>,
    /// The only moves the search may explore; excludes `avoid`
    pub allow: Option<SearchList>,
}

impl AnalyzeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(mut self, player: Color) -> Self {
        self.player = Some(player);
        self
    }

    pub fn interval(mut self, centiseconds: u32) -> Self {
        self.interval = Some(centiseconds);
        self
    }

    pub fn minmoves(mut self, n: u32) -> Self {
        self.minmoves = Some(n);
        self
    }

    pub fn maxmoves(mut self, n: u32) -> Self {
        self.maxmoves = Some(n);
        self
    }

    pub fn avoid(mut self, list: SearchList) -> Self {
        self.avoid.push(list);
        self
    }

    pub fn allow(mut self, list: SearchList) -> Self {
        self.allow = Some(list);
        self
    }

    /// Format the command line
    pub fn to_command(&self) -> Result<String> {
        if self.allow.is_some() && !self.avoid.is_empty() {
            return Err(GtpError::InvalidArgument(
                "allow cannot be combined with avoid".into(),
            ));
        }

        let mut parts = vec!["lz-analyze".to_string()];
        if let Some(player) = self.player {
            parts.push(player.to_string());
        }
        if let Some(interval) = self.interval {
            parts.push(interval.to_string());
        }
        if let Some(n) = self.minmoves {
            parts.push(format!("minmoves {}", n));
        }
        if let Some(n) = self.maxmoves {
            parts.push(format!("maxmoves {}", n));
        }
        for list in &self.avoid {
            parts.push(format!("avoid {}", list));
        }
        if let Some(list) = &self.allow {
            parts.push(format!("allow {}", list));
        }

        Ok(parts.join(" "))
    }
}

/// Live `lz-analyze` output, decoded line by line
#[derive(Debug)]
pub struct AnalysisStream {
    response: Response,
}

impl AnalysisStream {
    /// Records of the next analysis line; `None` once the analysis stopped
    pub async fn next(&mut self) -> Result<Option<Vec<MoveInfo>>> {
        match self.response.next_line().await? {
            Some(line) => parse_analysis_line(&line).map(Some),
            None => Ok(None),
        }
    }

    /// Whether the engine has ended the analysis
    pub fn is_finished(&self) -> bool {
        self.response.is_finished()
    }

    /// The underlying raw response
    pub fn into_response(self) -> Response {
        self.response
    }
}
