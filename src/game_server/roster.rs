//! Roster - Player names arriving from outside
//!
//! A roster source yields display names whenever it is polled. The server
//! only ever appends unseen names; sources are free to repeat themselves.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

/// Handles used by the simulated chat
pub const MOCK_NAMES: [&str; 16] = [
    "TurboTaylor",
    "PixelPilot",
    "LaneLegend",
    "StreamKing",
    "CodeWizard",
    "NeonKnight",
    "CloudRover",
    "RocketRiley",
    "MarbleMaven",
    "StormRider",
    "NightOwl",
    "CyberNomad",
    "SpeedFreak",
    "GameJunkie",
    "BitHunter",
    "DriftQueen",
];

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("roster source unavailable: {0}")]
    Unavailable(String),
    #[error("roster poll failed: {0}")]
    Poll(String),
}

/// Supplies new player names on each poll
pub trait RosterSource: Send {
    fn poll(&mut self) -> Result<Vec<String>, RosterError>;
}

/// Fake live chat: every poll a few viewers say hello
pub struct SimulatedRoster<R> {
    rng: R,
    per_poll: usize,
}

impl<R: Rng + Send> SimulatedRoster<R> {
    pub fn new(rng: R, per_poll: usize) -> Self {
        Self { rng, per_poll }
    }

    fn mock_name(&mut self) -> String {
        let base = MOCK_NAMES.choose(&mut self.rng).copied().unwrap_or("Viewer");
        format!("{base}_{}", self.rng.gen_range(0..100))
    }
}

impl<R: Rng + Send> RosterSource for SimulatedRoster<R> {
    fn poll(&mut self) -> Result<Vec<String>, RosterError> {
        Ok((0..self.per_poll).map(|_| self.mock_name()).collect())
    }
}

/// A fixed guest list, delivered on the first poll
#[derive(Debug, Clone, Default)]
pub struct ScriptedRoster {
    pending: Vec<String>,
}

impl ScriptedRoster {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            pending: names.into_iter().collect(),
        }
    }
}

impl RosterSource for ScriptedRoster {
    fn poll(&mut self) -> Result<Vec<String>, RosterError> {
        Ok(std::mem::take(&mut self.pending))
    }
}

/// Whether roster polling is connected and currently running.
///
/// Polling pauses for the race and picks up again in the lobby, but only if
/// a source was connected in the first place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterFeed {
    connected: bool,
    polling: bool,
}

impl RosterFeed {
    pub fn connect(&mut self) {
        self.connected = true;
        self.polling = true;
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
        self.polling = false;
    }

    pub fn pause(&mut self) {
        self.polling = false;
    }

    pub fn resume(&mut self) {
        self.polling = self.connected;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }
}
