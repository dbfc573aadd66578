//! Config - Simulation tuning loaded from TOML
//!
//! Every section has a `Default` matching the stock race, so a config file
//! only needs the keys it wants to override.

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game_server::track::SplineKind;

/// Errors raised while loading or validating a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level simulation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub physics: PhysicsConfig,
    pub camera: CameraConfig,
    pub track: TrackConfig,
    pub lobby: LobbyConfig,
    /// Fixed RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl SimConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.physics.validate()?;
        self.camera.validate()?;
        self.track.validate()?;
        self.lobby.validate()
    }
}

/// Per-tick physics constants. Velocities are distance units per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: f32,
    /// Velocity multiplier applied every tick, in (0, 1)
    pub friction: f32,
    /// Engine power, applied every tick
    pub base_acceleration: f32,
    pub max_speed: f32,
    /// Anti-stall floor once the launch phase is over
    pub min_speed: f32,
    /// Fraction of gravity applied on climbs
    pub uphill_damping: f32,
    pub launch_min_speed: f32,
    pub launch_max_speed: f32,
    /// Seconds after the start before gravity and randomness kick in
    pub chaos_start_secs: f32,
    /// Per-tick probability of a random perturbation
    pub perturbation_chance: f64,
    /// Perturbations are drawn from [-amplitude, amplitude)
    pub perturbation_amplitude: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 0.06,
            friction: 0.996,
            base_acceleration: 0.005,
            max_speed: 2.5,
            min_speed: 0.5,
            uphill_damping: 0.2,
            launch_min_speed: 0.4,
            launch_max_speed: 0.5,
            chaos_start_secs: 8.0,
            perturbation_chance: 0.015,
            perturbation_amplitude: 0.05,
        }
    }
}

impl PhysicsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_finite(&[
            ("physics.gravity", self.gravity),
            ("physics.friction", self.friction),
            ("physics.base_acceleration", self.base_acceleration),
            ("physics.max_speed", self.max_speed),
            ("physics.min_speed", self.min_speed),
            ("physics.uphill_damping", self.uphill_damping),
            ("physics.launch_min_speed", self.launch_min_speed),
            ("physics.launch_max_speed", self.launch_max_speed),
            ("physics.chaos_start_secs", self.chaos_start_secs),
            ("physics.perturbation_amplitude", self.perturbation_amplitude),
        ])?;

        if !(self.friction > 0.0 && self.friction < 1.0) {
            return Err(invalid(format!(
                "physics.friction must be in (0, 1), got {}",
                self.friction
            )));
        }
        if self.max_speed < 0.0 || self.min_speed < 0.0 || self.min_speed > self.max_speed {
            return Err(invalid(format!(
                "physics speed limits [{}, {}] must satisfy 0 <= min_speed <= max_speed",
                self.min_speed, self.max_speed
            )));
        }
        if self.launch_min_speed < 0.0 || self.launch_min_speed > self.launch_max_speed {
            return Err(invalid(format!(
                "physics launch band [{}, {}] is inverted",
                self.launch_min_speed, self.launch_max_speed
            )));
        }
        if !(0.0..=1.0).contains(&self.perturbation_chance) {
            return Err(invalid(format!(
                "physics.perturbation_chance must be in [0, 1], got {}",
                self.perturbation_chance
            )));
        }
        if self.perturbation_amplitude < 0.0 || !(0.0..=1.0).contains(&self.uphill_damping) {
            return Err(invalid(
                "physics perturbation_amplitude/uphill_damping out of range".into(),
            ));
        }
        if self.chaos_start_secs < 0.0 {
            return Err(invalid("physics.chaos_start_secs must not be negative".into()));
        }
        Ok(())
    }
}

/// Chase camera placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Distance behind the target along the negative tangent
    pub trailing_distance: f32,
    /// Distance above the target along the track normal
    pub height: f32,
    /// How far past the target the camera looks
    pub look_ahead: f32,
    /// Exponential smoothing factor per tick, in (0, 1]
    pub smoothing: f32,
    pub initial_position: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            trailing_distance: 30.0,
            height: 12.0,
            look_ahead: 60.0,
            smoothing: 0.08,
            initial_position: Vec3::new(0.0, 20.0, 50.0),
        }
    }
}

impl CameraConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_finite(&[
            ("camera.trailing_distance", self.trailing_distance),
            ("camera.height", self.height),
            ("camera.look_ahead", self.look_ahead),
            ("camera.smoothing", self.smoothing),
        ])?;
        if !self.initial_position.is_finite() {
            return Err(invalid("camera.initial_position must be finite".into()));
        }
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(invalid(format!(
                "camera.smoothing must be in (0, 1], got {}",
                self.smoothing
            )));
        }
        Ok(())
    }
}

/// Track geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub spline: SplineKind,
    /// Uniform parameter steps used for the arc-length table
    pub arc_length_divisions: usize,
    /// Half-width of the road bed
    pub width: f32,
    /// Keeps marbles this far inside the rails
    pub rail_margin: f32,
    /// Road thickness plus marble radius
    pub surface_height: f32,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            spline: SplineKind::CatmullRom { tension: 0.1 },
            arc_length_divisions: 2000,
            width: 6.0,
            rail_margin: 1.5,
            surface_height: 1.8,
        }
    }
}

impl TrackConfig {
    /// Largest lane offset that keeps a marble inside the rails
    pub fn max_lane(&self) -> f32 {
        (self.width - self.rail_margin).max(0.0)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_finite(&[
            ("track.width", self.width),
            ("track.rail_margin", self.rail_margin),
            ("track.surface_height", self.surface_height),
        ])?;
        if self.arc_length_divisions == 0 {
            return Err(invalid("track.arc_length_divisions must be positive".into()));
        }
        Ok(())
    }
}

/// Lobby and race lifecycle timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    pub min_racers: usize,
    /// Seconds between the winner crossing the line and the results screen
    pub finish_display_delay_secs: f32,
    pub roster_poll_interval_secs: f32,
    /// Lane offsets are drawn from [-spread / 2, spread / 2]
    pub lane_spread: f32,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            min_racers: 2,
            finish_display_delay_secs: 2.0,
            roster_poll_interval_secs: 3.0,
            lane_spread: 5.0,
        }
    }
}

impl LobbyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_finite(&[
            ("lobby.finish_display_delay_secs", self.finish_display_delay_secs),
            ("lobby.roster_poll_interval_secs", self.roster_poll_interval_secs),
            ("lobby.lane_spread", self.lane_spread),
        ])?;
        if self.min_racers < 2 {
            return Err(invalid("lobby.min_racers must be at least 2".into()));
        }
        if self.roster_poll_interval_secs <= 0.0 {
            return Err(invalid("lobby.roster_poll_interval_secs must be positive".into()));
        }
        if self.lane_spread < 0.0 || self.finish_display_delay_secs < 0.0 {
            return Err(invalid(
                "lobby.lane_spread and finish_display_delay_secs must not be negative".into(),
            ));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

fn require_finite(values: &[(&str, f32)]) -> Result<(), ConfigError> {
    match values.iter().find(|(_, value)| !value.is_finite()) {
        Some((key, value)) => Err(invalid(format!("{key} must be finite, got {value}"))),
        None => Ok(()),
    }
}
