//! Decoder for `lz-analyze` style streaming output
//!
//! Each diagnostic line holds zero or more records:
//!
//! ```text
//! info move D4 visits 100 winrate 5500 prior 200 order 0 pv D4 C3 info move Q16 visits 50
//! ```
//!
//! Rates are sent as integers scaled by 10000. A key this decoder does not
//! know ends the current record; decoding resumes at the next `info`.

use crate::error::{GtpError, Result};
use crate::vertex::Vertex;
use serde::{Deserialize, Serialize};

/// Token that opens a record
pub const RECORD_MARKER: &str = "info";

/// Scale applied by the engine to winrate, prior and lcb
const RATE_SCALE: f64 = 10_000.0;

/// Statistics for one candidate move
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveInfo {
    /// The move being analyzed
    #[serde(rename = "move", skip_serializing_if = "Option::is_none")]
    pub mv: Option<Vertex>,
    /// Visits invested into the move so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visits: Option<u64>,
    /// Winrate of the move so far, 0.0 to 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winrate: Option<f64>,
    /// Policy prior of the move
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior: Option<f64>,
    /// Lower confidence bound; not strictly clamped to 0..1 by engines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcb: Option<f64>,
    /// Engine ranking, 0 is best
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Principal variation following the move; may be empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv: Option<Vec<Vertex>>,
}

/// Accumulates the fields of one record as they are encountered
#[derive(Debug, Default)]
struct MoveInfoBuilder {
    mv: Option<Vertex>,
    visits: Option<u64>,
    winrate: Option<f64>,
    prior: Option<f64>,
    lcb: Option<f64>,
    order: Option<u32>,
    pv: Option<Vec<Vertex>>,
}

impl MoveInfoBuilder {
    fn build(self) -> MoveInfo {
        MoveInfo {
            mv: self.mv,
            visits: self.visits,
            winrate: self.winrate,
            prior: self.prior,
            lcb: self.lcb,
            order: self.order,
            pv: self.pv,
        }
    }
}

/// Cursor over the whitespace-separated tokens of a line
struct Tokens<'a> {
    words: Vec<&'a str>,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            words: line.split_whitespace().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&'a str> {
        self.words.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    /// Take the value following `key`
    fn value(&mut self, key: &str) -> Result<&'a str> {
        let value = self
            .peek()
            .ok_or_else(|| GtpError::Analysis(format!("missing value for '{}'", key)))?;
        self.advance();
        Ok(value)
    }

    fn integer<T: std::str::FromStr>(&mut self, key: &str) -> Result<T> {
        let raw = self.value(key)?;
        raw.parse().map_err(|_| {
            GtpError::Analysis(format!("invalid integer '{}' for '{}'", raw, key))
        })
    }

    fn rate(&mut self, key: &str) -> Result<f64> {
        let scaled: i64 = self.integer(key)?;
        Ok(scaled as f64 / RATE_SCALE)
    }
}

/// Decode one record; the cursor must sit on the marker
fn parse_record(tokens: &mut Tokens<'_>) -> Result<MoveInfo> {
    match tokens.peek() {
        Some(RECORD_MARKER) => tokens.advance(),
        other => {
            return Err(GtpError::Analysis(format!(
                "expected '{}' at token {}, got '{}'",
                RECORD_MARKER,
                tokens.pos,
                other.unwrap_or("")
            )));
        }
    }

    let mut info = MoveInfoBuilder::default();
    while let Some(key) = tokens.peek() {
        match key {
            "move" => {
                tokens.advance();
                info.mv = Some(tokens.value(key)?.parse()?);
            }
            "visits" => {
                tokens.advance();
                info.visits = Some(tokens.integer(key)?);
            }
            "winrate" => {
                tokens.advance();
                info.winrate = Some(tokens.rate(key)?);
            }
            "prior" => {
                tokens.advance();
                info.prior = Some(tokens.rate(key)?);
            }
            "lcb" => {
                tokens.advance();
                info.lcb = Some(tokens.rate(key)?);
            }
            "order" => {
                tokens.advance();
                info.order = Some(tokens.integer(key)?);
            }
            "pv" => {
                tokens.advance();
                let mut pv = Vec::new();
                while let Some(vertex) = tokens.peek().and_then(|t| t.parse::<Vertex>().ok()) {
                    pv.push(vertex);
                    tokens.advance();
                }
                info.pv = Some(pv);
            }
            _ => break,
        }
    }

    Ok(info.build())
}

/// Decode every record on an analysis line, in order of appearance
pub fn parse_analysis_line(line: &str) -> Result<Vec<MoveInfo>> {
    let mut tokens = Tokens::new(line);
    let mut records = Vec::new();

    while let Some(token) = tokens.peek() {
        if token == RECORD_MARKER {
            records.push(parse_record(&mut tokens)?);
        } else {
            tokens.advance();
        }
    }

    Ok(records)
}
