//! Game Server Module
//!
//! Marble race simulation: track spine, racer physics, race lifecycle and
//! chase camera. Commentary and roster sources plug in from outside.

pub mod camera;
pub mod commentary;
pub mod integrator;
pub mod race;
pub mod racer;
pub mod roster;
pub mod simulation;
pub mod track;

pub use camera::{CameraPlanner, CameraPose, CameraTarget};
pub use commentary::{CannedCommentary, CommentaryDesk, CommentaryRequest, CommentarySource};
pub use integrator::RaceIntegrator;
pub use race::{Race, RaceResult, RaceStatus};
pub use racer::{Racer, RacerId};
pub use roster::{RosterSource, ScriptedRoster, SimulatedRoster};
pub use simulation::{GameServer, RaceSnapshot, ServerStats};
pub use track::{SplineKind, TrackCurve, TrackState};
