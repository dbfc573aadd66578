//! Commentary - Announcer text around the race
//!
//! Commentary comes from an outside source that may be slow or fail. The
//! simulation never waits on it: a request hands out a ticket, the host runs
//! the source wherever it likes, and posts the result back. Only the newest
//! ticket may write the slot, so a late answer from an earlier race is dropped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// At most this many names are read out before the start
const HYPE_NAME_LIMIT: usize = 5;

/// Shown as runner-up when nobody else raced
pub const NO_RUNNER_UP: &str = "Nobody";

#[derive(Debug, Error)]
pub enum CommentaryError {
    #[error("commentary source unavailable")]
    Unavailable,
    #[error("commentary request failed: {0}")]
    Failed(String),
}

/// Produces announcer lines
pub trait CommentarySource: Send + Sync {
    fn pre_race_hype(&self, names: &[String]) -> Result<String, CommentaryError>;

    fn winner_commentary(&self, winner: &str, runner_up: &str) -> Result<String, CommentaryError>;
}

/// Template announcer that works offline
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedCommentary;

impl CommentarySource for CannedCommentary {
    fn pre_race_hype(&self, names: &[String]) -> Result<String, CommentaryError> {
        let headliners = names
            .iter()
            .take(HYPE_NAME_LIMIT)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "{} marbles on the launch pad! Keep your eyes on {headliners}. \
             Hold your breath, the big race is on!",
            names.len()
        ))
    }

    fn winner_commentary(&self, winner: &str, runner_up: &str) -> Result<String, CommentaryError> {
        Ok(format!("{winner} takes the crown! {runner_up} was right behind, what a fight!"))
    }
}

/// One call to a commentary source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommentaryRequest {
    PreRaceHype { names: Vec<String> },
    WinnerCall { winner: String, runner_up: String },
}

impl CommentaryRequest {
    pub fn winner_call(winner: &str, runner_up: Option<&str>) -> Self {
        CommentaryRequest::WinnerCall {
            winner: winner.to_string(),
            runner_up: runner_up.unwrap_or(NO_RUNNER_UP).to_string(),
        }
    }

    /// Shown while the request is in flight
    pub fn placeholder(&self) -> String {
        match self {
            CommentaryRequest::PreRaceHype { .. } => {
                "Racers are taking their places...".to_string()
            }
            CommentaryRequest::WinnerCall { .. } => "Analyzing the race results...".to_string(),
        }
    }

    /// Shown when the source fails or answers with nothing
    pub fn fallback(&self) -> String {
        match self {
            CommentaryRequest::PreRaceHype { .. } => {
                "Racers are ready! 3... 2... 1... GO!".to_string()
            }
            CommentaryRequest::WinnerCall { winner, .. } => {
                format!("{winner} crossed the line first! A tremendous performance!")
            }
        }
    }

    /// Run against a source. Blocking; hosts should call this off the tick thread.
    pub fn run(&self, source: &dyn CommentarySource) -> Result<String, CommentaryError> {
        match self {
            CommentaryRequest::PreRaceHype { names } => source.pre_race_hype(names),
            CommentaryRequest::WinnerCall { winner, runner_up } => {
                source.winner_commentary(winner, runner_up)
            }
        }
    }
}

/// Claim on the commentary slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentaryTicket {
    generation: u64,
}

/// A request paired with the ticket its answer must present
#[derive(Debug, Clone)]
pub struct CommentaryJob {
    pub ticket: CommentaryTicket,
    pub request: CommentaryRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentaryStatus {
    Idle,
    Pending,
    Resolved,
    Failed,
}

/// The single on-screen commentary slot
#[derive(Debug, Clone)]
pub struct CommentaryDesk {
    generation: u64,
    status: CommentaryStatus,
    text: String,
    fallback: String,
}

impl Default for CommentaryDesk {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentaryDesk {
    pub fn new() -> Self {
        Self {
            generation: 0,
            status: CommentaryStatus::Idle,
            text: String::new(),
            fallback: String::new(),
        }
    }

    /// Open a new request, superseding any in flight
    pub fn begin(&mut self, request: CommentaryRequest) -> CommentaryJob {
        self.generation += 1;
        self.status = CommentaryStatus::Pending;
        self.text = request.placeholder();
        self.fallback = request.fallback();
        CommentaryJob {
            ticket: CommentaryTicket {
                generation: self.generation,
            },
            request,
        }
    }

    /// Apply an answer. Returns false when the ticket has been superseded.
    pub fn resolve(
        &mut self,
        ticket: CommentaryTicket,
        result: Result<String, CommentaryError>,
    ) -> bool {
        if ticket.generation != self.generation || self.status != CommentaryStatus::Pending {
            log::debug!(
                "Dropping stale commentary #{} (current #{})",
                ticket.generation,
                self.generation
            );
            return false;
        }

        match result {
            Ok(text) if !text.trim().is_empty() => {
                self.text = text;
                self.status = CommentaryStatus::Resolved;
            }
            Ok(_) => {
                self.text = std::mem::take(&mut self.fallback);
                self.status = CommentaryStatus::Resolved;
            }
            Err(err) => {
                log::warn!("Commentary failed, using fallback: {err}");
                self.text = std::mem::take(&mut self.fallback);
                self.status = CommentaryStatus::Failed;
            }
        }
        true
    }

    /// Empty the slot and orphan any request in flight
    pub fn clear(&mut self) {
        self.generation += 1;
        self.status = CommentaryStatus::Idle;
        self.text.clear();
        self.fallback.clear();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn status(&self) -> CommentaryStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == CommentaryStatus::Pending
    }
}
