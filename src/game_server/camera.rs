//! Camera - Chase camera over the track
//!
//! The camera trails its target along the spine, raised along the local
//! normal, and looks at a point further down the track. Position eases
//! toward the ideal pose every tick; the look-at point does not.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::CameraConfig;
use crate::game_server::race::farthest;
use crate::game_server::racer::{Racer, RacerId};
use crate::game_server::track::{local_frame, TrackCurve};

/// Who the camera follows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraTarget {
    /// Whoever is farthest along
    #[default]
    Leader,
    Racer(RacerId),
}

impl CameraTarget {
    /// Next racer in registration order, wrapping; from leader-follow, the first racer
    pub fn next(self, order: &[RacerId]) -> Self {
        let Some(&first) = order.first() else {
            return self;
        };
        match self.position_in(order) {
            Some(index) => CameraTarget::Racer(order[(index + 1) % order.len()]),
            None => CameraTarget::Racer(first),
        }
    }

    /// Previous racer in registration order, wrapping; from leader-follow, the last racer
    pub fn previous(self, order: &[RacerId]) -> Self {
        let Some(&last) = order.last() else {
            return self;
        };
        match self.position_in(order) {
            Some(index) => CameraTarget::Racer(order[(index + order.len() - 1) % order.len()]),
            None => CameraTarget::Racer(last),
        }
    }

    fn position_in(self, order: &[RacerId]) -> Option<usize> {
        match self {
            CameraTarget::Leader => None,
            CameraTarget::Racer(id) => order.iter().position(|&other| other == id),
        }
    }
}

/// Camera placement for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub look_at: Vec3,
}

/// Smoothed chase camera
#[derive(Debug, Clone)]
pub struct CameraPlanner {
    config: CameraConfig,
    pose: CameraPose,
}

impl CameraPlanner {
    pub fn new(config: CameraConfig) -> Self {
        let pose = CameraPose {
            position: config.initial_position,
            look_at: Vec3::ZERO,
        };
        Self { config, pose }
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// Distance the camera should frame. An explicit target that has left
    /// the roster falls back to the leader.
    pub fn target_distance(target: CameraTarget, racers: &[Racer]) -> Option<f32> {
        let explicit = match target {
            CameraTarget::Racer(id) => racers.iter().find(|r| r.id == id),
            CameraTarget::Leader => None,
        };
        explicit.or_else(|| farthest(racers.iter())).map(|r| r.distance)
    }

    /// Unsmoothed pose for a target at `distance`
    pub fn ideal_pose(&self, curve: &TrackCurve, distance: f32) -> CameraPose {
        let anchor = curve.state_at_distance(distance);
        let ahead = curve.state_at_distance(distance + self.config.look_ahead);
        let frame = local_frame(anchor.tangent);

        CameraPose {
            position: anchor.position + frame.normal * self.config.height
                - anchor.tangent * self.config.trailing_distance,
            look_at: ahead.position,
        }
    }

    /// Ease toward the ideal pose for `target`. With no racers the camera holds still.
    pub fn update(
        &mut self,
        curve: &TrackCurve,
        racers: &[Racer],
        target: CameraTarget,
    ) -> CameraPose {
        if let Some(distance) = Self::target_distance(target, racers) {
            let ideal = self.ideal_pose(curve, distance);
            self.pose.position = self.pose.position.lerp(ideal.position, self.config.smoothing);
            self.pose.look_at = ideal.look_at;
        }
        self.pose
    }
}
