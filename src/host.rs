//! Host - Headless race loop
//!
//! Stands in for the render shell: ticks the server at a fixed frame rate,
//! polls the roster on its own timer, and runs commentary requests on
//! blocking workers that post their answers back over a channel.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::SimConfig;
use crate::game_server::commentary::{
    CannedCommentary, CommentaryError, CommentaryJob, CommentarySource, CommentaryTicket,
};
use crate::game_server::race::{RaceResult, RaceStatus};
use crate::game_server::roster::{RosterSource, ScriptedRoster, SimulatedRoster};
use crate::game_server::simulation::GameServer;

/// Names the simulated chat produces per poll
const SIMULATED_BURST: usize = 5;

/// Shortest timer period handed to tokio
const MIN_PERIOD: Duration = Duration::from_micros(1);

/// Longest timer period handed to tokio
const MAX_PERIOD: Duration = Duration::from_secs(86_400);

type CommentaryReply = (CommentaryTicket, Result<String, CommentaryError>);

/// How the host runs its races
#[derive(Debug, Clone)]
pub struct HostOptions {
    pub rounds: u32,
    /// Lobby size to wait for before starting (simulated chat only)
    pub racers: usize,
    /// Fixed guest list; empty means simulated chat
    pub names: Vec<String>,
    /// Frame-rate multiplier, 1.0 is real time
    pub speed: f32,
}

/// Outcome of one finished race
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round: u32,
    pub winner: String,
    pub runner_up: Option<String>,
    pub race_time: f32,
    pub commentary: String,
    pub results: Vec<RaceResult>,
}

/// Run `options.rounds` races and report each one
pub async fn drive(config: SimConfig, options: HostOptions) -> anyhow::Result<Vec<RoundSummary>> {
    if !(options.speed > 0.0 && options.speed.is_finite()) {
        bail!("speed must be a positive number, got {}", options.speed);
    }

    let roster_seed = config.seed.map(|seed| seed.wrapping_add(1));
    let poll_every = config.lobby.roster_poll_interval_secs;
    let min_racers = config.lobby.min_racers;
    let mut server = GameServer::new(config).context("failed to build the track")?;

    let (mut roster, lobby_target): (Box<dyn RosterSource>, usize) = if options.names.is_empty() {
        let rng = match roster_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        (
            Box::new(SimulatedRoster::new(rng, SIMULATED_BURST)),
            options.racers.max(min_racers),
        )
    } else {
        let mut guests: Vec<String> = Vec::new();
        for name in &options.names {
            if !guests.contains(name) {
                guests.push(name.clone());
            }
        }
        if guests.len() < min_racers {
            bail!(
                "need at least {min_racers} distinct racer names, got {}",
                guests.len()
            );
        }
        let target = guests.len();
        (Box::new(ScriptedRoster::new(guests)), target)
    };

    let commentary: Arc<dyn CommentarySource> = Arc::new(CannedCommentary);
    let (reply_tx, mut replies) = mpsc::unbounded_channel::<CommentaryReply>();

    let frame_dt = 1.0 / server.tick_rate();
    let mut frames = interval(scaled_period(frame_dt, options.speed)?);
    frames.set_missed_tick_behavior(MissedTickBehavior::Burst);
    let mut polls = interval(scaled_period(poll_every, options.speed)?);
    polls.set_missed_tick_behavior(MissedTickBehavior::Delay);

    server.connect_roster();
    log::info!("Waiting for {lobby_target} racers");

    let mut summaries = Vec::new();
    loop {
        tokio::select! {
            _ = polls.tick(), if server.roster_polling() => match roster.poll() {
                Ok(names) => {
                    server.ingest_roster(names);
                }
                Err(err) => log::warn!("Roster poll failed: {err}"),
            },
            Some((ticket, result)) = replies.recv() => {
                server.resolve_commentary(ticket, result);
            }
            _ = frames.tick() => {
                let snapshot = server.tick(frame_dt);
                dispatch_commentary(&mut server, &commentary, &reply_tx);

                match snapshot.status {
                    RaceStatus::Lobby => {
                        if server.race().racers.len() >= lobby_target && server.start_race() {
                            dispatch_commentary(&mut server, &commentary, &reply_tx);
                        }
                    }
                    RaceStatus::Racing => {}
                    RaceStatus::Finished => {
                        // Results stay up until the winner call lands
                        if !snapshot.commentary.loading {
                            let round = summaries.len() as u32 + 1;
                            let summary = summarize(&server, round, snapshot.commentary.text);
                            summaries.push(summary);
                            if summaries.len() as u32 >= options.rounds {
                                break;
                            }
                            server.reset();
                        }
                    }
                }
            }
        }
    }

    Ok(summaries)
}

/// Wall-clock period for `secs` of simulated time; never zero
fn scaled_period(secs: f32, speed: f32) -> anyhow::Result<Duration> {
    let period = Duration::try_from_secs_f64(f64::from(secs) / f64::from(speed))
        .with_context(|| format!("speed {speed} gives an unusable timer period"))?;
    if period > MAX_PERIOD {
        bail!("speed {speed} is too slow: one step would take {period:?}");
    }
    Ok(period.max(MIN_PERIOD))
}

/// Hand queued commentary requests to blocking workers
fn dispatch_commentary(
    server: &mut GameServer,
    source: &Arc<dyn CommentarySource>,
    replies: &mpsc::UnboundedSender<CommentaryReply>,
) {
    for CommentaryJob { ticket, request } in server.take_commentary_jobs() {
        let source = Arc::clone(source);
        let replies = replies.clone();
        tokio::task::spawn_blocking(move || {
            let result = request.run(source.as_ref());
            // The loop may have exited already
            let _ = replies.send((ticket, result));
        });
    }
}

fn summarize(server: &GameServer, round: u32, commentary: String) -> RoundSummary {
    let race = server.race();
    let summary = RoundSummary {
        round,
        winner: race.winner().map(|r| r.name.clone()).unwrap_or_default(),
        runner_up: race.runner_up().map(|r| r.name.clone()),
        race_time: race.winner().and_then(|r| r.finish_time).unwrap_or_default(),
        commentary,
        results: server.get_results().unwrap_or_default(),
    };

    log::info!(
        "Round {}: {} wins in {:.1}s, runner-up {}",
        summary.round,
        summary.winner,
        summary.race_time,
        summary.runner_up.as_deref().unwrap_or("none")
    );
    log::info!("Announcer: {}", summary.commentary);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> SimConfig {
        let mut config = SimConfig {
            seed: Some(21),
            ..SimConfig::default()
        };
        config.lobby.finish_display_delay_secs = 0.0;
        config.track.arc_length_divisions = 500;
        config
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scripted_round_produces_a_podium() {
        let options = HostOptions {
            rounds: 2,
            racers: 0,
            names: vec!["x".into(), "y".into(), "x".into()],
            speed: 1000.0,
        };

        let summaries = drive(quick_config(), options).await.unwrap();

        assert_eq!(summaries.len(), 2);
        for (i, summary) in summaries.iter().enumerate() {
            assert_eq!(summary.round, i as u32 + 1);
            assert!(["x", "y"].contains(&summary.winner.as_str()));
            assert_ne!(summary.runner_up.as_deref(), Some(summary.winner.as_str()));
            assert_eq!(summary.results.len(), 2);
            assert!(!summary.commentary.is_empty());
        }
    }

    #[test]
    fn extreme_speed_keeps_timer_periods_positive() {
        assert_eq!(scaled_period(1.0 / 60.0, 1e10).unwrap(), MIN_PERIOD);
        assert_eq!(scaled_period(3.0, 1e30).unwrap(), MIN_PERIOD);
        assert_eq!(scaled_period(3.0, 1.0).unwrap(), Duration::from_secs(3));
        assert!(scaled_period(3.0, 1e-30).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn extreme_speed_still_runs_a_round() {
        let options = HostOptions {
            rounds: 1,
            racers: 0,
            names: vec!["x".into(), "y".into()],
            speed: 1e10,
        };
        let summaries = drive(quick_config(), options).await.unwrap();
        assert_eq!(summaries.len(), 1);
    }

    #[tokio::test]
    async fn rejects_a_lonely_guest_list() {
        let options = HostOptions {
            rounds: 1,
            racers: 0,
            names: vec!["solo".into()],
            speed: 1.0,
        };
        assert!(drive(quick_config(), options).await.is_err());
    }
}
