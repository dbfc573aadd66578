//! Track - The race spine and distance sampling
//!
//! The spine is a Catmull-Rom family spline through a fixed list of control
//! points. It is built once, cached with an arc-length table, and only read
//! afterwards: physics, placement and camera all sample it by distance.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cross products shorter than this (squared) are treated as degenerate
const DEGENERATE_LATERAL_SQ: f32 = 0.01;

/// Errors raised while building a track curve
#[derive(Debug, Error, PartialEq)]
pub enum TrackError {
    #[error("a track needs at least 2 control points, got {0}")]
    TooFewPoints(usize),
    #[error("control point {0} is not finite")]
    NonFinitePoint(usize),
    #[error("track length must be positive and finite, got {0}")]
    DegenerateLength(f32),
}

/// Interpolation used between control points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplineKind {
    /// Non-uniform, knots spaced by the square root of chord length
    Centripetal,
    /// Non-uniform, knots spaced by chord length
    Chordal,
    /// Uniform with a tangent scale; low tension hugs the control polygon
    CatmullRom { tension: f32 },
}

impl Default for SplineKind {
    fn default() -> Self {
        SplineKind::CatmullRom { tension: 0.1 }
    }
}

/// Cubic in Hermite form for one span
#[derive(Debug, Clone, Copy)]
struct CubicSpan {
    c0: Vec3,
    c1: Vec3,
    c2: Vec3,
    c3: Vec3,
}

impl CubicSpan {
    fn hermite(x0: Vec3, x1: Vec3, t0: Vec3, t1: Vec3) -> Self {
        Self {
            c0: x0,
            c1: t0,
            c2: -3.0 * x0 + 3.0 * x1 - 2.0 * t0 - t1,
            c3: 2.0 * x0 - 2.0 * x1 + t0 + t1,
        }
    }

    fn uniform(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, tension: f32) -> Self {
        Self::hermite(p1, p2, tension * (p2 - p0), tension * (p3 - p1))
    }

    /// `exponent` is applied to squared chord lengths: 0.25 centripetal, 0.5 chordal
    fn non_uniform(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, exponent: f32) -> Self {
        let mut dt0 = p0.distance_squared(p1).powf(exponent);
        let mut dt1 = p1.distance_squared(p2).powf(exponent);
        let mut dt2 = p2.distance_squared(p3).powf(exponent);

        // Repeated points would divide by zero
        if dt1 < 1e-4 {
            dt1 = 1.0;
        }
        if dt0 < 1e-4 {
            dt0 = dt1;
        }
        if dt2 < 1e-4 {
            dt2 = dt1;
        }

        let t1 = (p1 - p0) / dt0 - (p2 - p0) / (dt0 + dt1) + (p2 - p1) / dt1;
        let t2 = (p2 - p1) / dt1 - (p3 - p1) / (dt1 + dt2) + (p3 - p2) / dt2;

        Self::hermite(p1, p2, t1 * dt1, t2 * dt1)
    }

    fn point(&self, w: f32) -> Vec3 {
        let w2 = w * w;
        self.c0 + self.c1 * w + self.c2 * w2 + self.c3 * (w2 * w)
    }

    fn derivative(&self, w: f32) -> Vec3 {
        self.c1 + self.c2 * (2.0 * w) + self.c3 * (3.0 * w * w)
    }
}

/// Position and unit tangent at a point on the spine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackState {
    pub position: Vec3,
    pub tangent: Vec3,
    /// Normalized arc-length fraction in [0, 1]
    pub t: f32,
}

/// Orthonormal frame riding on the spine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    pub tangent: Vec3,
    pub right: Vec3,
    pub normal: Vec3,
}

/// Build the lateral/up frame for a tangent.
///
/// `right` is `tangent x Y`; when the tangent is close to vertical the cross
/// product vanishes and `right` falls back to +X.
pub fn local_frame(tangent: Vec3) -> LocalFrame {
    let lateral = tangent.cross(Vec3::Y);
    let right = if lateral.length_squared() < DEGENERATE_LATERAL_SQ {
        Vec3::X
    } else {
        lateral.normalize()
    };

    let up = right.cross(tangent);
    let normal = if up.length_squared() < DEGENERATE_LATERAL_SQ {
        Vec3::Y
    } else {
        up.normalize()
    };

    LocalFrame { tangent, right, normal }
}

/// Immutable race spine with a cached arc-length table
#[derive(Debug, Clone)]
pub struct TrackCurve {
    points: Vec<Vec3>,
    kind: SplineKind,
    /// Cumulative chord length at `i / divisions`
    arc_lengths: Vec<f32>,
    length: f32,
}

impl TrackCurve {
    /// Build a curve through `points` and measure it
    pub fn build(
        points: Vec<Vec3>,
        kind: SplineKind,
        divisions: usize,
    ) -> Result<Self, TrackError> {
        if points.len() < 2 {
            return Err(TrackError::TooFewPoints(points.len()));
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(TrackError::NonFinitePoint(index));
        }

        let mut curve = Self {
            points,
            kind,
            arc_lengths: Vec::new(),
            length: 0.0,
        };

        let divisions = divisions.max(1);
        let mut arc_lengths = Vec::with_capacity(divisions + 1);
        let mut previous = curve.point_at_parameter(0.0);
        let mut total = 0.0;
        arc_lengths.push(0.0);
        for step in 1..=divisions {
            let point = curve.point_at_parameter(step as f32 / divisions as f32);
            total += point.distance(previous);
            arc_lengths.push(total);
            previous = point;
        }

        if !(total.is_finite() && total > 0.0) {
            return Err(TrackError::DegenerateLength(total));
        }

        curve.arc_lengths = arc_lengths;
        curve.length = total;
        Ok(curve)
    }

    /// The stock race layout
    pub fn default_track(kind: SplineKind, divisions: usize) -> Result<Self, TrackError> {
        Self::build(default_layout(), kind, divisions)
    }

    /// Total arc length
    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn control_points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn kind(&self) -> SplineKind {
        self.kind
    }

    /// Locate the span for a raw spline parameter
    fn span(&self, t: f32) -> (CubicSpan, f32) {
        let count = self.points.len();
        let scaled = (count - 1) as f32 * t.clamp(0.0, 1.0);
        let mut index = scaled.floor() as usize;
        let mut weight = scaled - index as f32;
        if index >= count - 1 {
            index = count - 2;
            weight = 1.0;
        }

        let p1 = self.points[index];
        let p2 = self.points[index + 1];
        // Open curve: mirror the neighbours past either end
        let p0 = if index > 0 {
            self.points[index - 1]
        } else {
            2.0 * p1 - p2
        };
        let p3 = if index + 2 < count {
            self.points[index + 2]
        } else {
            2.0 * p2 - p1
        };

        let span = match self.kind {
            SplineKind::Centripetal => CubicSpan::non_uniform(p0, p1, p2, p3, 0.25),
            SplineKind::Chordal => CubicSpan::non_uniform(p0, p1, p2, p3, 0.5),
            SplineKind::CatmullRom { tension } => CubicSpan::uniform(p0, p1, p2, p3, tension),
        };
        (span, weight)
    }

    /// Point at a raw spline parameter (not arc-length uniform)
    pub fn point_at_parameter(&self, t: f32) -> Vec3 {
        let (span, weight) = self.span(t);
        span.point(weight)
    }

    /// Unit tangent at a raw spline parameter
    pub fn tangent_at_parameter(&self, t: f32) -> Vec3 {
        let (span, weight) = self.span(t);
        let derivative = span.derivative(weight);
        if derivative.length_squared() > f32::EPSILON {
            return derivative.normalize();
        }

        // Zero derivative: use the chord through the neighbourhood instead
        const DELTA: f32 = 1e-4;
        let ahead = self.point_at_parameter((t + DELTA).min(1.0));
        let behind = self.point_at_parameter((t - DELTA).max(0.0));
        let chord = ahead - behind;
        if chord.length_squared() > f32::EPSILON {
            chord.normalize()
        } else {
            (self.points[self.points.len() - 1] - self.points[0]).normalize_or_zero()
        }
    }

    /// Convert an arc-length fraction into a raw spline parameter
    pub fn parameter_at_fraction(&self, u: f32) -> f32 {
        let target = u.clamp(0.0, 1.0) * self.length;
        let divisions = self.arc_lengths.len() - 1;

        // First table entry strictly past the target
        let upper = self.arc_lengths.partition_point(|&len| len <= target);
        if upper == 0 {
            return 0.0;
        }
        if upper > divisions {
            return 1.0;
        }

        let lower = upper - 1;
        let before = self.arc_lengths[lower];
        let segment = self.arc_lengths[upper] - before;
        let fraction = if segment > 0.0 { (target - before) / segment } else { 0.0 };

        (lower as f32 + fraction) / divisions as f32
    }

    /// Position and unit tangent at an arc-length fraction, clamped to [0, 1]
    pub fn sample_at_fraction(&self, u: f32) -> (Vec3, Vec3) {
        let t = self.parameter_at_fraction(u);
        (self.point_at_parameter(t), self.tangent_at_parameter(t))
    }

    /// Sample by traveled distance along this curve
    pub fn state_at_distance(&self, distance: f32) -> TrackState {
        state_at(self, distance, self.length)
    }
}

/// Map a traveled distance onto the curve.
///
/// Distances past `total_length` saturate at the finish point; negative or NaN
/// distances sit on the start line.
pub fn state_at(curve: &TrackCurve, distance: f32, total_length: f32) -> TrackState {
    let t = if total_length > 0.0 && !distance.is_nan() {
        (distance / total_length).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (position, tangent) = curve.sample_at_fraction(t);
    TrackState { position, tangent, t }
}

/// Control points of the stock course, start to finish
pub fn default_layout() -> Vec<Vec3> {
    let mut points = Vec::with_capacity(46);
    launch_pad(&mut points);
    spiral_drop(&mut points);
    let z = canyon_run(&mut points, 600.0);
    let z = space_jump(&mut points, z);
    let z = hyper_turn(&mut points, z);
    final_straight(&mut points, z);
    points
}

fn launch_pad(points: &mut Vec<Vec3>) {
    points.push(Vec3::new(0.0, 50.0, 0.0));
    points.push(Vec3::new(0.0, 50.0, 100.0));
    points.push(Vec3::new(0.0, 80.0, 200.0));
}

fn spiral_drop(points: &mut Vec<Vec3>) {
    const RADIUS: f32 = 60.0;
    for i in 0..12 {
        let step = i as f32;
        let angle = step * 0.6;
        points.push(Vec3::new(
            angle.sin() * RADIUS,
            80.0 - step * 5.0,
            200.0 + step * 25.0 + angle.cos() * 30.0,
        ));
    }
}

/// Low winding section with a wavy floor
fn canyon_run(points: &mut Vec<Vec3>, start_z: f32) -> f32 {
    for i in 0..10 {
        let step = i as f32;
        points.push(Vec3::new(
            step.sin() * 80.0,
            20.0 + (step * 2.0).sin() * 10.0,
            start_z + step * 80.0,
        ));
    }
    start_z + 800.0
}

/// Huge climb to a peak and a drop back down
fn space_jump(points: &mut Vec<Vec3>, z: f32) -> f32 {
    points.push(Vec3::new(100.0, 100.0, z));
    points.push(Vec3::new(0.0, 250.0, z + 300.0));
    points.push(Vec3::new(-100.0, 100.0, z + 600.0));
    z + 600.0
}

/// Wide high-speed turn, gently descending
fn hyper_turn(points: &mut Vec<Vec3>, z: f32) -> f32 {
    const RADIUS: f32 = 150.0;
    for i in 0..15 {
        let step = i as f32;
        let angle = step * 0.4;
        points.push(Vec3::new(
            angle.cos() * RADIUS - 100.0,
            100.0 - step * 2.0,
            z + angle.sin() * RADIUS,
        ));
    }
    z + 500.0
}

/// Dash to the line at ground level, plus a runoff
fn final_straight(points: &mut Vec<Vec3>, z: f32) {
    points.push(Vec3::new(0.0, 20.0, z + 200.0));
    points.push(Vec3::new(0.0, 0.0, z + 800.0));
    points.push(Vec3::new(0.0, 0.0, z + 1000.0));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight(kind: SplineKind) -> TrackCurve {
        TrackCurve::build(vec![Vec3::ZERO, Vec3::new(0.0, 0.0, 100.0)], kind, 1000).unwrap()
    }

    fn stock() -> TrackCurve {
        TrackCurve::default_track(SplineKind::default(), 2000).unwrap()
    }

    #[test]
    fn build_rejects_single_point() {
        let err = TrackCurve::build(vec![Vec3::ONE], SplineKind::Centripetal, 10).unwrap_err();
        assert_eq!(err, TrackError::TooFewPoints(1));
    }

    #[test]
    fn build_rejects_coincident_points() {
        let err = TrackCurve::build(vec![Vec3::ONE, Vec3::ONE], SplineKind::Centripetal, 10)
            .unwrap_err();
        assert!(matches!(err, TrackError::DegenerateLength(_)));
    }

    #[test]
    fn build_rejects_non_finite_points() {
        let points = vec![Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 1.0)];
        let err = TrackCurve::build(points, SplineKind::Centripetal, 10).unwrap_err();
        assert_eq!(err, TrackError::NonFinitePoint(1));
    }

    #[test]
    fn straight_track_measures_its_chord() {
        for kind in [SplineKind::Centripetal, SplineKind::Chordal, SplineKind::default()] {
            let curve = straight(kind);
            assert!((curve.length() - 100.0).abs() < 0.01, "{kind:?}: {}", curve.length());
        }
    }

    #[test]
    fn fraction_sampling_is_arc_length_uniform() {
        let curve = straight(SplineKind::default());
        let (mid, tangent) = curve.sample_at_fraction(0.5);
        assert!(mid.abs_diff_eq(Vec3::new(0.0, 0.0, 50.0), 0.05), "{mid}");
        assert!(tangent.abs_diff_eq(Vec3::Z, 1e-4));

        let (quarter, _) = curve.sample_at_fraction(0.25);
        assert!((quarter.z - 25.0).abs() < 0.05, "{quarter}");
    }

    #[test]
    fn fraction_is_clamped() {
        let curve = straight(SplineKind::Centripetal);
        assert_eq!(curve.sample_at_fraction(-1.0), curve.sample_at_fraction(0.0));
        assert_eq!(curve.sample_at_fraction(3.0), curve.sample_at_fraction(1.0));
    }

    #[test]
    fn curve_passes_through_control_points() {
        let curve = TrackCurve::build(default_layout(), SplineKind::Centripetal, 500).unwrap();
        let points = curve.control_points();
        let last = (points.len() - 1) as f32;
        for (i, point) in points.iter().enumerate() {
            let at = curve.point_at_parameter(i as f32 / last);
            assert!(at.abs_diff_eq(*point, 1e-2), "point {i}: {at} vs {point}");
        }
    }

    #[test]
    fn stock_track_keeps_its_spline_kind() {
        assert_eq!(stock().kind(), SplineKind::CatmullRom { tension: 0.1 });
    }

    #[test]
    fn stock_layout_has_every_section() {
        let points = default_layout();
        assert_eq!(points.len(), 46);
        assert_eq!(points[0], Vec3::new(0.0, 50.0, 0.0));
        assert_eq!(points[points.len() - 1].y, 0.0);
    }

    #[test]
    fn stock_track_has_positive_length_and_unit_tangents() {
        let curve = stock();
        assert!(curve.length().is_finite());
        assert!(curve.length() > 3000.0);

        for i in 0..=200 {
            let state = curve.state_at_distance(curve.length() * i as f32 / 200.0);
            assert!((state.tangent.length() - 1.0).abs() < 1e-3, "sample {i}");
            assert!(state.position.is_finite());
        }
    }

    #[test]
    fn distance_saturates_at_the_finish() {
        let curve = stock();
        let length = curve.length();
        let finish = state_at(&curve, length, length);
        assert_eq!(finish.t, 1.0);
        for overshoot in [0.0, 0.5, 10.0, 1e6] {
            assert_eq!(state_at(&curve, length + overshoot, length), finish);
        }
    }

    #[test]
    fn negative_and_nan_distances_sit_on_the_start() {
        let curve = stock();
        let start = curve.state_at_distance(0.0);
        assert_eq!(curve.state_at_distance(-50.0), start);
        assert_eq!(curve.state_at_distance(f32::NAN), start);
        assert!(start.position.abs_diff_eq(Vec3::new(0.0, 50.0, 0.0), 1e-3));
    }

    #[test]
    fn descending_sections_report_negative_tangent_y() {
        let curve = TrackCurve::build(
            vec![Vec3::new(0.0, 100.0, 0.0), Vec3::new(0.0, 0.0, 100.0)],
            SplineKind::Centripetal,
            200,
        )
        .unwrap();
        let state = curve.state_at_distance(curve.length() / 2.0);
        assert!(state.tangent.y < -0.5);
    }

    #[test]
    fn local_frame_is_orthonormal() {
        let tangent = Vec3::new(0.3, -0.4, 0.866).normalize();
        let frame = local_frame(tangent);
        assert!(frame.right.dot(tangent).abs() < 1e-5);
        assert!(frame.normal.dot(tangent).abs() < 1e-5);
        assert!(frame.normal.dot(frame.right).abs() < 1e-5);
        assert!(frame.normal.y > 0.0);
    }

    #[test]
    fn vertical_tangent_falls_back_to_x_axis() {
        let frame = local_frame(Vec3::Y);
        assert_eq!(frame.right, Vec3::X);
        assert!(frame.normal.is_finite());
        assert!((frame.normal.length() - 1.0).abs() < 1e-5);

        let frame = local_frame(Vec3::new(1e-4, -1.0, 0.0).normalize());
        assert_eq!(frame.right, Vec3::X);
    }

    #[test]
    fn lateral_fallback_cutoff() {
        // Horizontal part 0.05: cross product length squared 0.0025
        let steep = local_frame(Vec3::new(0.0, -1.0, 0.05).normalize());
        assert_eq!(steep.right, Vec3::X);

        // Horizontal part 0.2: 0.04, keeps the real lateral axis
        let tangent = Vec3::new(0.0, -1.0, 0.2).normalize();
        let banked = local_frame(tangent);
        assert!(banked.right.abs_diff_eq(Vec3::NEG_X, 1e-5), "{}", banked.right);
        assert!(banked.right.dot(tangent).abs() < 1e-5);
    }
}
