//! Racer - Per-player race record
//!
//! Identity, color and lane are fixed when a player joins the lobby and
//! survive resets. Distance, velocity and finish data belong to one race.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::TrackConfig;
use crate::game_server::track::{local_frame, TrackCurve};

pub type RacerId = u32;

/// Neon marble colors handed out on join
pub const PALETTE: [&str; 8] = [
    "#ff0055", "#00ffaa", "#00ccff", "#ffcc00", "#aa00ff", "#ff5500", "#ffffff", "#00ff44",
];

/// Complete state for a single racer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Racer {
    /// Registration-order id
    pub id: RacerId,
    pub name: String,
    pub color: String,
    /// Lateral offset from the spine, fixed for the racer's lifetime
    pub lane_offset: f32,
    /// Cumulative path length traveled this race
    pub distance: f32,
    /// Speed along the path, distance units per tick
    pub velocity: f32,
    /// Distance over track length, capped at 1
    pub progress: f32,
    pub finished: bool,
    /// Race-clock seconds at the tick the racer crossed the line
    pub finish_time: Option<f32>,
}

impl Racer {
    pub fn new(
        id: RacerId,
        name: impl Into<String>,
        color: impl Into<String>,
        lane_offset: f32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
            lane_offset,
            distance: 0.0,
            velocity: 0.0,
            progress: 0.0,
            finished: false,
            finish_time: None,
        }
    }

    /// Clear race data, keeping identity, color and lane
    pub fn reset(&mut self) {
        self.distance = 0.0;
        self.velocity = 0.0;
        self.progress = 0.0;
        self.finished = false;
        self.finish_time = None;
    }

    /// World placement of the marble: on the road surface, shifted into its lane
    pub fn placement(&self, curve: &TrackCurve, track: &TrackConfig) -> RacerPose {
        let state = curve.state_at_distance(self.distance);
        let frame = local_frame(state.tangent);

        let max_lane = track.max_lane();
        let lane = self.lane_offset.clamp(-max_lane, max_lane);

        let position = state.position + frame.right * lane + frame.normal * track.surface_height;
        RacerPose {
            position,
            tangent: state.tangent,
            look_at: position + state.tangent,
        }
    }
}

/// Where the render layer should draw a marble
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RacerPose {
    pub position: Vec3,
    pub tangent: Vec3,
    pub look_at: Vec3,
}

/// Racer state plus placement, for the render layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RacerSnapshot {
    pub id: RacerId,
    pub name: String,
    pub color: String,
    pub lane_offset: f32,
    pub distance: f32,
    pub progress: f32,
    pub speed: f32,
    pub finished: bool,
    pub finish_time: Option<f32>,
    pub pose: RacerPose,
}

impl RacerSnapshot {
    pub fn capture(racer: &Racer, curve: &TrackCurve, track: &TrackConfig) -> Self {
        Self {
            id: racer.id,
            name: racer.name.clone(),
            color: racer.color.clone(),
            lane_offset: racer.lane_offset,
            distance: racer.distance,
            progress: racer.progress,
            speed: racer.velocity,
            finished: racer.finished,
            finish_time: racer.finish_time,
            pose: racer.placement(curve, track),
        }
    }
}
