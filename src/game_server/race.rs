//! Race - Roster, lifecycle and finish detection
//!
//! LOBBY -> RACING -> FINISHED -> (reset) -> LOBBY. The integrator only runs
//! while racing and before a winner is decided; the results screen follows
//! the win after a short display delay.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::LobbyConfig;
use crate::game_server::integrator::{first_finisher, RaceIntegrator};
use crate::game_server::racer::{Racer, RacerId};

/// Race status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceStatus {
    Lobby,
    Racing,
    Finished,
}

/// Start instant of the current race, on the host clock
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaceClock {
    started_at: f32,
}

impl RaceClock {
    pub fn start(now: f32) -> Self {
        Self { started_at: now }
    }

    pub fn elapsed(&self, now: f32) -> f32 {
        (now - self.started_at).max(0.0)
    }
}

/// Final placing of one racer, frozen at the moment of the win
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub racer_id: RacerId,
    pub racer_name: String,
    pub distance: f32,
    pub finish_time: Option<f32>,
    pub position: u32,
}

/// Winner and runner-up of a decided race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceOutcome {
    pub winner: RacerId,
    pub runner_up: Option<RacerId>,
    /// Host-clock time the winner crossed the line
    pub decided_at: f32,
    pub results: Vec<RaceResult>,
}

/// Transitions reported by `Race::update`
#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    WinnerDecided {
        winner: RacerId,
        runner_up: Option<RacerId>,
    },
    Finished,
}

/// Complete race state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Race {
    /// Current race status
    pub status: RaceStatus,
    /// All racers, in registration order
    pub racers: Vec<Racer>,
    clock: Option<RaceClock>,
    outcome: Option<RaceOutcome>,
    min_racers: usize,
    finish_delay: f32,
    next_id: RacerId,
}

impl Race {
    pub fn new(lobby: &LobbyConfig) -> Self {
        Self {
            status: RaceStatus::Lobby,
            racers: Vec::new(),
            clock: None,
            outcome: None,
            min_racers: lobby.min_racers,
            finish_delay: lobby.finish_display_delay_secs,
            next_id: 0,
        }
    }

    /// Append a racer unless the name is already registered
    pub fn register(&mut self, name: &str, color: &str, lane_offset: f32) -> Option<RacerId> {
        if self.racers.iter().any(|r| r.name == name) {
            log::debug!("Ignoring duplicate racer {name}");
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.racers.push(Racer::new(id, name, color, lane_offset));
        log::debug!("Racer {name} joined as #{id}");
        Some(id)
    }

    pub fn can_start(&self) -> bool {
        self.status == RaceStatus::Lobby && self.racers.len() >= self.min_racers
    }

    /// Enter RACING. Returns false (and does nothing) when the lobby is not ready.
    pub fn start(&mut self, now: f32) -> bool {
        if !self.can_start() {
            log::debug!(
                "Start rejected: {:?} with {} of {} racers",
                self.status,
                self.racers.len(),
                self.min_racers
            );
            return false;
        }

        self.outcome = None;
        self.clock = Some(RaceClock::start(now));
        self.status = RaceStatus::Racing;
        true
    }

    /// Advance the race by one tick at host time `now`
    pub fn update<R: Rng>(
        &mut self,
        now: f32,
        integrator: &RaceIntegrator<'_>,
        rng: &mut R,
    ) -> Vec<RaceEvent> {
        let mut events = Vec::new();
        if self.status != RaceStatus::Racing {
            return events;
        }

        if self.outcome.is_none() {
            let elapsed = self.elapsed(now);
            self.racers = integrator.advance(&self.racers, elapsed, rng);

            if let Some(winner) = first_finisher(&self.racers).map(|r| r.id) {
                let outcome = self.decide(winner, now);
                events.push(RaceEvent::WinnerDecided {
                    winner: outcome.winner,
                    runner_up: outcome.runner_up,
                });
                self.outcome = Some(outcome);
            }
        }

        if let Some(outcome) = &self.outcome {
            if now - outcome.decided_at >= self.finish_delay {
                self.status = RaceStatus::Finished;
                events.push(RaceEvent::Finished);
            }
        }

        events
    }

    fn decide(&self, winner: RacerId, now: f32) -> RaceOutcome {
        // The winner leads the results even if a same-tick finisher went farther
        let mut order: Vec<&Racer> = self
            .racers
            .iter()
            .filter(|r| r.id != winner)
            .collect();
        let runner_up = farthest(order.iter().copied()).map(|r| r.id);
        order.sort_by(|a, b| b.distance.total_cmp(&a.distance));
        let results = self
            .racer(winner)
            .into_iter()
            .chain(order)
            .enumerate()
            .map(|(i, r)| RaceResult {
                racer_id: r.id,
                racer_name: r.name.clone(),
                distance: r.distance,
                finish_time: r.finish_time,
                position: (i + 1) as u32,
            })
            .collect();

        RaceOutcome {
            winner,
            runner_up,
            decided_at: now,
            results,
        }
    }

    /// Back to the lobby: race data cleared, roster kept
    pub fn reset(&mut self) {
        for racer in &mut self.racers {
            racer.reset();
        }
        self.clock = None;
        self.outcome = None;
        self.status = RaceStatus::Lobby;
    }

    /// Race-clock seconds at host time `now`
    pub fn elapsed(&self, now: f32) -> f32 {
        self.clock.map(|clock| clock.elapsed(now)).unwrap_or(0.0)
    }

    pub fn clock(&self) -> Option<RaceClock> {
        self.clock
    }

    pub fn outcome(&self) -> Option<&RaceOutcome> {
        self.outcome.as_ref()
    }

    pub fn winner(&self) -> Option<&Racer> {
        self.outcome.as_ref().and_then(|o| self.racer(o.winner))
    }

    pub fn runner_up(&self) -> Option<&Racer> {
        self.outcome.as_ref().and_then(|o| o.runner_up).and_then(|id| self.racer(id))
    }

    /// Racers by distance, farthest first; ties keep registration order
    pub fn standings(&self) -> Vec<&Racer> {
        let mut order: Vec<&Racer> = self.racers.iter().collect();
        order.sort_by(|a, b| b.distance.total_cmp(&a.distance));
        order
    }

    /// Get current leader
    pub fn leader(&self) -> Option<&Racer> {
        farthest(self.racers.iter())
    }

    /// Get racer by ID
    pub fn racer(&self, id: RacerId) -> Option<&Racer> {
        self.racers.iter().find(|r| r.id == id)
    }

    /// Ids in registration order
    pub fn racer_ids(&self) -> Vec<RacerId> {
        self.racers.iter().map(|r| r.id).collect()
    }
}

/// Racer with the greatest distance; the earliest registered wins ties
pub fn farthest<'a>(racers: impl Iterator<Item = &'a Racer>) -> Option<&'a Racer> {
    racers.fold(None, |best: Option<&Racer>, racer| match best {
        Some(b) if b.distance >= racer.distance => Some(b),
        _ => Some(racer),
    })
}
