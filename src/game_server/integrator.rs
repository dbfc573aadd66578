//! Integrator - Per-tick racer physics
//!
//! Each tick every unfinished racer picks up engine power and slope gravity,
//! loses a little to friction, and is clamped into a speed band. For the
//! first seconds of a race everyone gets the same launch speed so the field
//! leaves the pad bunched together.

use rand::Rng;

use crate::config::PhysicsConfig;
use crate::game_server::racer::Racer;
use crate::game_server::track::{state_at, TrackCurve};

/// Advances racers along a track with one physics setup
pub struct RaceIntegrator<'a> {
    curve: &'a TrackCurve,
    physics: &'a PhysicsConfig,
}

impl<'a> RaceIntegrator<'a> {
    pub fn new(curve: &'a TrackCurve, physics: &'a PhysicsConfig) -> Self {
        Self { curve, physics }
    }

    /// Advance every racer by one tick.
    ///
    /// All racers are computed from the same input slice, so nobody sees
    /// another racer's result for this tick.
    pub fn advance<R: Rng>(&self, racers: &[Racer], elapsed: f32, rng: &mut R) -> Vec<Racer> {
        racers.iter().map(|racer| self.step(racer, elapsed, rng)).collect()
    }

    /// Next state of one racer. Finished racers come back unchanged.
    pub fn step<R: Rng>(&self, racer: &Racer, elapsed: f32, rng: &mut R) -> Racer {
        if racer.finished {
            return racer.clone();
        }

        let physics = self.physics;
        let total_length = self.curve.length();
        let state = state_at(self.curve, racer.distance, total_length);
        let slope = -state.tangent.y;

        let launch = self.in_launch_phase(elapsed);
        let acceleration = if launch {
            physics.base_acceleration
        } else {
            self.slope_acceleration(slope) + self.perturbation(rng)
        };

        let mut velocity = (racer.velocity + acceleration) * physics.friction;
        velocity = if launch {
            velocity.clamp(physics.launch_min_speed, physics.launch_max_speed)
        } else {
            velocity.clamp(physics.min_speed, physics.max_speed)
        };

        let distance = racer.distance + velocity;
        let mut next = racer.clone();
        next.velocity = velocity;
        next.distance = distance;
        next.progress = (distance / total_length).min(1.0);
        if distance >= total_length {
            next.finished = true;
            next.finish_time = Some(elapsed);
        }
        next
    }

    /// Engine power plus gravity along the slope (positive slope is downhill)
    pub fn slope_acceleration(&self, slope: f32) -> f32 {
        let physics = self.physics;
        let gravity = if slope > 0.0 {
            slope * physics.gravity
        } else {
            // Climbs only cost a fraction of gravity so nobody stalls
            slope * physics.gravity * physics.uphill_damping
        };
        physics.base_acceleration + gravity
    }

    pub fn in_launch_phase(&self, elapsed: f32) -> bool {
        elapsed < self.physics.chaos_start_secs
    }

    /// Occasional symmetric kick, the only source of randomness in a race
    fn perturbation<R: Rng>(&self, rng: &mut R) -> f32 {
        let physics = self.physics;
        let amplitude = physics.perturbation_amplitude;
        if amplitude > 0.0 && rng.gen_bool(physics.perturbation_chance) {
            rng.gen_range(-amplitude..amplitude)
        } else {
            0.0
        }
    }
}

/// First finished racer in iteration order
pub fn first_finisher(racers: &[Racer]) -> Option<&Racer> {
    racers.iter().find(|racer| racer.finished)
}
