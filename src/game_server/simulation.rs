//! Simulation - Main game server
//!
//! Owns the track, the race, the camera and the commentary slot, and drives
//! them one frame at a time from an explicit `dt`. Everything the host needs
//! to render a frame comes back as a `RaceSnapshot`.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::game_server::camera::{CameraPlanner, CameraPose, CameraTarget};
use crate::game_server::commentary::{
    CommentaryDesk, CommentaryError, CommentaryJob, CommentaryRequest, CommentaryStatus,
    CommentaryTicket,
};
use crate::game_server::integrator::RaceIntegrator;
use crate::game_server::race::{Race, RaceEvent, RaceResult, RaceStatus};
use crate::game_server::racer::{RacerId, RacerSnapshot, PALETTE};
use crate::game_server::roster::RosterFeed;
use crate::game_server::track::{TrackCurve, TrackError};

/// Leaderboard length in snapshots
const LEADERBOARD_SIZE: usize = 5;

/// Frames kept for the rolling tick-time average
const TICK_WINDOW: usize = 60;

/// Server statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStats {
    pub tick_rate: f32,
    pub avg_tick_time_ms: f32,
    pub racer_count: u32,
    pub status: RaceStatus,
}

/// Commentary slot as the UI sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentarySnapshot {
    pub text: String,
    pub loading: bool,
    pub status: CommentaryStatus,
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub status: RaceStatus,
    pub elapsed_time: f32,
    pub racers: Vec<RacerSnapshot>,
    /// Top racers by distance
    pub leaderboard: Vec<RacerId>,
    pub camera: CameraPose,
    pub camera_target: CameraTarget,
    pub winner: Option<RacerId>,
    pub runner_up: Option<RacerId>,
    pub commentary: CommentarySnapshot,
}

/// Main game server
pub struct GameServer {
    config: SimConfig,
    curve: TrackCurve,
    race: Race,
    camera: CameraPlanner,
    camera_target: CameraTarget,
    commentary: CommentaryDesk,
    /// Commentary requests waiting for the host to pick up
    outbox: Vec<CommentaryJob>,
    roster_feed: RosterFeed,
    rng: StdRng,
    /// Host clock in seconds, advanced only by `tick`
    now: f32,
    /// Target tick rate (ticks per second)
    tick_rate: f32,
    tick_times: Vec<f32>,
}

impl GameServer {
    /// Create a server on the stock track
    pub fn new(config: SimConfig) -> Result<Self, TrackError> {
        let curve =
            TrackCurve::default_track(config.track.spline, config.track.arc_length_divisions)?;
        Ok(Self::with_track(config, curve))
    }

    /// Create a server on a custom track
    pub fn with_track(config: SimConfig, curve: TrackCurve) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        log::info!(
            "Track ready: {:?} spline, {:.0} units, {} control points",
            curve.kind(),
            curve.length(),
            curve.control_points().len()
        );

        Self {
            race: Race::new(&config.lobby),
            camera: CameraPlanner::new(config.camera.clone()),
            camera_target: CameraTarget::Leader,
            commentary: CommentaryDesk::new(),
            outbox: Vec::new(),
            roster_feed: RosterFeed::default(),
            rng,
            now: 0.0,
            tick_rate: 60.0,
            tick_times: Vec::with_capacity(TICK_WINDOW),
            curve,
            config,
        }
    }

    /// Add a player from the lobby. Duplicates and mid-race joins are ignored.
    pub fn join(&mut self, name: &str) -> Option<RacerId> {
        if self.race.status != RaceStatus::Lobby {
            log::debug!("Ignoring join from {name}: race in progress");
            return None;
        }

        let half_spread = self.config.lobby.lane_spread / 2.0;
        let lane_offset = if half_spread > 0.0 {
            self.rng.gen_range(-half_spread..half_spread)
        } else {
            0.0
        };
        let color = PALETTE[self.rng.gen_range(0..PALETTE.len())];
        self.race.register(name, color, lane_offset)
    }

    /// Append every unseen name from a roster poll; returns how many joined
    pub fn ingest_roster(&mut self, names: impl IntoIterator<Item = String>) -> usize {
        let joined = names
            .into_iter()
            .filter(|name| self.join(name).is_some())
            .count();
        if joined > 0 {
            log::info!(
                "{} racer(s) joined, {} in the lobby",
                joined,
                self.race.racers.len()
            );
        }
        joined
    }

    /// Begin polling a roster source
    pub fn connect_roster(&mut self) {
        self.roster_feed.connect();
    }

    pub fn roster_polling(&self) -> bool {
        self.roster_feed.is_polling()
    }

    /// Start the race. A lobby with too few racers is left untouched.
    pub fn start_race(&mut self) -> bool {
        if !self.race.start(self.now) {
            return false;
        }

        self.roster_feed.pause();
        self.camera_target = CameraTarget::Leader;
        let names = self.race.racers.iter().map(|r| r.name.clone()).collect();
        let job = self.commentary.begin(CommentaryRequest::PreRaceHype { names });
        self.outbox.push(job);

        log::info!("Race started with {} racers", self.race.racers.len());
        true
    }

    /// Perform a single frame: physics (while racing), then the camera
    pub fn tick(&mut self, dt: f32) -> RaceSnapshot {
        let tick_start = Instant::now();
        self.now += dt.max(0.0);

        let integrator = RaceIntegrator::new(&self.curve, &self.config.physics);
        let events = self.race.update(self.now, &integrator, &mut self.rng);
        for event in events {
            self.on_race_event(event);
        }

        self.camera.update(&self.curve, &self.race.racers, self.camera_target);

        // Record tick time
        let tick_time = tick_start.elapsed().as_secs_f32() * 1000.0;
        self.tick_times.push(tick_time);
        if self.tick_times.len() > TICK_WINDOW {
            self.tick_times.remove(0);
        }

        self.get_snapshot()
    }

    fn on_race_event(&mut self, event: RaceEvent) {
        match event {
            RaceEvent::WinnerDecided { winner, runner_up } => {
                self.camera_target = CameraTarget::Racer(winner);

                let winner_name = self
                    .race
                    .racer(winner)
                    .map(|r| r.name.clone())
                    .unwrap_or_default();
                let runner_up_name = runner_up
                    .and_then(|id| self.race.racer(id))
                    .map(|r| r.name.as_str());
                log::info!(
                    "{} wins after {:.1}s, runner-up {}",
                    winner_name,
                    self.race.elapsed(self.now),
                    runner_up_name.unwrap_or("none")
                );

                let request = CommentaryRequest::winner_call(&winner_name, runner_up_name);
                let job = self.commentary.begin(request);
                self.outbox.push(job);
            }
            RaceEvent::Finished => log::info!("Race finished"),
        }
    }

    /// Back to the lobby. Racers keep their identity; race data and commentary are cleared.
    pub fn reset(&mut self) {
        self.race.reset();
        self.commentary.clear();
        self.outbox.clear();
        self.camera_target = CameraTarget::Leader;
        self.roster_feed.resume();
        if self.roster_feed.is_connected() {
            log::debug!("Roster polling resumed");
        }
        log::info!(
            "Race reset, {} racers back in the lobby",
            self.race.racers.len()
        );
    }

    /// Commentary requests issued since the last call
    pub fn take_commentary_jobs(&mut self) -> Vec<CommentaryJob> {
        std::mem::take(&mut self.outbox)
    }

    /// Post a commentary answer; stale tickets are ignored
    pub fn resolve_commentary(
        &mut self,
        ticket: CommentaryTicket,
        result: Result<String, CommentaryError>,
    ) -> bool {
        self.commentary.resolve(ticket, result)
    }

    pub fn next_camera(&mut self) -> CameraTarget {
        self.camera_target = self.camera_target.next(&self.race.racer_ids());
        self.camera_target
    }

    pub fn previous_camera(&mut self) -> CameraTarget {
        self.camera_target = self.camera_target.previous(&self.race.racer_ids());
        self.camera_target
    }

    pub fn follow_leader(&mut self) {
        self.camera_target = CameraTarget::Leader;
    }

    pub fn camera_target(&self) -> CameraTarget {
        self.camera_target
    }

    /// Get current race snapshot
    pub fn get_snapshot(&self) -> RaceSnapshot {
        let outcome = self.race.outcome();
        RaceSnapshot {
            status: self.race.status,
            elapsed_time: self.race.elapsed(self.now),
            racers: self
                .race
                .racers
                .iter()
                .map(|r| RacerSnapshot::capture(r, &self.curve, &self.config.track))
                .collect(),
            leaderboard: self
                .race
                .standings()
                .iter()
                .take(LEADERBOARD_SIZE)
                .map(|r| r.id)
                .collect(),
            camera: self.camera.pose(),
            camera_target: self.camera_target,
            winner: outcome.map(|o| o.winner),
            runner_up: outcome.and_then(|o| o.runner_up),
            commentary: CommentarySnapshot {
                text: self.commentary.text().to_string(),
                loading: self.commentary.is_loading(),
                status: self.commentary.status(),
            },
        }
    }

    /// Get race results, once a winner is decided
    pub fn get_results(&self) -> Option<Vec<RaceResult>> {
        self.race.outcome().map(|o| o.results.clone())
    }

    /// Get server statistics
    pub fn get_stats(&self) -> ServerStats {
        let avg_tick_time = if self.tick_times.is_empty() {
            0.0
        } else {
            self.tick_times.iter().sum::<f32>() / self.tick_times.len() as f32
        };

        ServerStats {
            tick_rate: self.tick_rate,
            avg_tick_time_ms: avg_tick_time,
            racer_count: self.race.racers.len() as u32,
            status: self.race.status,
        }
    }

    pub fn status(&self) -> RaceStatus {
        self.race.status
    }

    pub fn race(&self) -> &Race {
        &self.race
    }

    pub fn curve(&self) -> &TrackCurve {
        &self.curve
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tick_rate(&self) -> f32 {
        self.tick_rate
    }
}
