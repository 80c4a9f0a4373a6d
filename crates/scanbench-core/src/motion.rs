//! Atomic motions and their velocity profiles.
//!
//! A scan trajectory is decomposed into relative displacements, each driven
//! with a trapezoidal velocity profile. The profile also lets the fly
//! executor predict where along a segment samples will land for a given
//! acquisition rate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result, ValidationError};
use crate::status::MotionState;
use crate::units::Position;

/// Trapezoidal velocity profile for a motion segment
///
/// Speeds are in mm/s, accelerations in mm/s².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionProfile {
    /// Speed at the start and end of the segment.
    pub min_speed: f64,
    /// Cruise speed during the constant phase.
    pub target_speed: f64,
    /// Ramp-up rate from min to target speed.
    pub acceleration: f64,
    /// Ramp-down rate from target to min speed.
    pub deceleration: f64,
}

impl MotionProfile {
    /// Create a profile, rejecting non-physical parameters
    pub fn new(
        min_speed: f64,
        target_speed: f64,
        acceleration: f64,
        deceleration: f64,
    ) -> std::result::Result<Self, ValidationError> {
        let mut errors = Vec::new();
        if !min_speed.is_finite() || min_speed < 0.0 {
            errors.push(format!("min_speed must be >= 0, got {min_speed}"));
        }
        if !target_speed.is_finite() || target_speed <= 0.0 {
            errors.push(format!("target_speed must be > 0, got {target_speed}"));
        }
        if target_speed < min_speed {
            errors.push(format!(
                "target_speed ({target_speed}) must be >= min_speed ({min_speed})"
            ));
        }
        if !acceleration.is_finite() || acceleration <= 0.0 {
            errors.push(format!("acceleration must be > 0, got {acceleration}"));
        }
        if !deceleration.is_finite() || deceleration <= 0.0 {
            errors.push(format!("deceleration must be > 0, got {deceleration}"));
        }
        if !errors.is_empty() {
            return Err(ValidationError::new(errors));
        }
        Ok(Self {
            min_speed,
            target_speed,
            acceleration,
            deceleration,
        })
    }
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self {
            min_speed: 0.5,
            target_speed: 10.0,
            acceleration: 50.0,
            deceleration: 50.0,
        }
    }
}

/// A single relative displacement within a scan trajectory
///
/// Carries its own execution sub-state so the executors can record progress
/// segment by segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicMotion {
    /// Stable identity of this motion.
    pub id: Uuid,
    /// Relative displacement in X (mm).
    pub dx: f64,
    /// Relative displacement in Y (mm).
    pub dy: f64,
    /// Velocity profile selected for this segment.
    pub profile: MotionProfile,
    state: MotionState,
}

impl AtomicMotion {
    /// Create a pending motion, rejecting NaN or infinite displacements
    pub fn new(dx: f64, dy: f64, profile: MotionProfile) -> std::result::Result<Self, ValidationError> {
        if !dx.is_finite() || !dy.is_finite() {
            return Err(ValidationError::single(format!(
                "motion displacement must be finite, got dx={dx} dy={dy}"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            dx,
            dy,
            profile,
            state: MotionState::Pending,
        })
    }

    /// Current execution sub-state
    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Total path length of this segment (mm)
    pub fn distance(&self) -> f64 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }

    /// The position reached when this motion finishes from `start`
    pub fn end_position(&self, start: Position) -> Position {
        start.translated(self.dx, self.dy)
    }

    /// Mark this motion as handed to the motion port
    pub fn begin(&mut self) -> Result<()> {
        if self.state != MotionState::Pending {
            return Err(Error::other(format!(
                "cannot begin motion {} in state {}",
                self.id, self.state
            )));
        }
        self.state = MotionState::Executing;
        Ok(())
    }

    /// Mark this motion as finished
    pub fn complete(&mut self) -> Result<()> {
        if self.state != MotionState::Executing {
            return Err(Error::other(format!(
                "cannot complete motion {} in state {}",
                self.id, self.state
            )));
        }
        self.state = MotionState::Completed;
        Ok(())
    }

    /// Phase durations of the trapezoidal profile: (t_acc, t_constant, t_dec)
    ///
    /// Returns `None` when the segment is too short for a full trapezoid; the
    /// degenerate case is approximated with a constant average speed.
    fn phase_times(&self) -> Option<(f64, f64, f64)> {
        let p = &self.profile;
        let distance = self.distance();
        let t_acc = (p.target_speed - p.min_speed) / p.acceleration;
        let d_acc = p.min_speed * t_acc + 0.5 * p.acceleration * t_acc * t_acc;
        let t_dec = (p.target_speed - p.min_speed) / p.deceleration;
        let d_dec = p.target_speed * t_dec - 0.5 * p.deceleration * t_dec * t_dec;
        if distance < d_acc + d_dec {
            return None;
        }
        let t_constant = (distance - d_acc - d_dec) / p.target_speed;
        Some((t_acc, t_constant, t_dec))
    }

    /// Estimated time to traverse this segment (seconds)
    pub fn estimated_duration(&self) -> f64 {
        match self.phase_times() {
            Some((t_acc, t_constant, t_dec)) => t_acc + t_constant + t_dec,
            None => {
                let avg = (self.profile.min_speed + self.profile.target_speed) / 2.0;
                if avg > 0.0 {
                    self.distance() / avg
                } else {
                    0.0
                }
            }
        }
    }

    /// Instantaneous velocity (mm/s) at `t` seconds after the segment starts
    pub fn velocity_at(&self, t: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        let p = &self.profile;
        match self.phase_times() {
            None => {
                // Short segment: constant average speed approximation.
                let avg = (p.min_speed + p.target_speed) / 2.0;
                if t < self.estimated_duration() {
                    avg
                } else {
                    0.0
                }
            }
            Some((t_acc, t_constant, t_dec)) => {
                if t < t_acc {
                    p.min_speed + p.acceleration * t
                } else if t < t_acc + t_constant {
                    p.target_speed
                } else if t < t_acc + t_constant + t_dec {
                    p.target_speed - p.deceleration * (t - t_acc - t_constant)
                } else {
                    0.0
                }
            }
        }
    }

    /// Predict where samples land along this segment at a fixed sampling rate
    ///
    /// Integrates the velocity profile at the sample period, so spacing is
    /// tight during the ramps and even during the cruise phase. The segment's
    /// final position is always included.
    pub fn acquisition_positions(&self, start: Position, rate_hz: f64) -> Vec<Position> {
        if rate_hz <= 0.0 {
            return Vec::new();
        }
        let distance = self.distance();
        if distance == 0.0 {
            return vec![start];
        }

        let dt = 1.0 / rate_hz;
        let total = self.estimated_duration();
        let ux = self.dx / distance;
        let uy = self.dy / distance;

        let mut positions = Vec::new();
        let mut t = 0.0;
        let mut travelled = 0.0;
        while t <= total {
            positions.push(start.translated(ux * travelled, uy * travelled));
            travelled += self.velocity_at(t) * dt;
            t += dt;
            if travelled >= distance {
                break;
            }
        }

        let end = self.end_position(start);
        match positions.last() {
            Some(last) if last.approx_eq(&end, 1e-6) => {}
            _ => positions.push(end),
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> MotionProfile {
        MotionProfile::new(1.0, 10.0, 100.0, 100.0).unwrap()
    }

    #[test]
    fn rejects_non_finite_displacement() {
        assert!(AtomicMotion::new(f64::NAN, 0.0, profile()).is_err());
        assert!(AtomicMotion::new(0.0, f64::INFINITY, profile()).is_err());
    }

    #[test]
    fn rejects_bad_profile() {
        assert!(MotionProfile::new(-1.0, 10.0, 100.0, 100.0).is_err());
        assert!(MotionProfile::new(1.0, 0.0, 100.0, 100.0).is_err());
        assert!(MotionProfile::new(5.0, 1.0, 100.0, 100.0).is_err());
    }

    #[test]
    fn trapezoidal_duration() {
        // 20mm at 1->10mm/s, a=d=100: t_ramp=0.09s each, ramps cover
        // 2*(1*0.09 + 0.5*100*0.09^2) = 0.99mm; cruise = 19.01/10 = 1.901s.
        let m = AtomicMotion::new(20.0, 0.0, profile()).unwrap();
        let expected = 0.09 + 0.09 + (20.0 - 0.99) / 10.0;
        assert!((m.estimated_duration() - expected).abs() < 1e-9);
    }

    #[test]
    fn short_segment_uses_average_speed() {
        // 0.5mm is below the ramp distance; avg speed is 5.5mm/s.
        let m = AtomicMotion::new(0.5, 0.0, profile()).unwrap();
        assert!((m.estimated_duration() - 0.5 / 5.5).abs() < 1e-9);
    }

    #[test]
    fn velocity_phases() {
        let m = AtomicMotion::new(20.0, 0.0, profile()).unwrap();
        assert!((m.velocity_at(0.0) - 1.0).abs() < 1e-9);
        assert!((m.velocity_at(1.0) - 10.0).abs() < 1e-9);
        assert_eq!(m.velocity_at(m.estimated_duration() + 1.0), 0.0);
    }

    #[test]
    fn state_transitions() {
        let mut m = AtomicMotion::new(1.0, 0.0, profile()).unwrap();
        assert_eq!(m.state(), MotionState::Pending);
        assert!(m.complete().is_err());
        m.begin().unwrap();
        assert!(m.begin().is_err());
        m.complete().unwrap();
        assert_eq!(m.state(), MotionState::Completed);
    }

    #[test]
    fn acquisition_positions_include_endpoint() {
        let m = AtomicMotion::new(20.0, 0.0, profile()).unwrap();
        let positions = m.acquisition_positions(Position::new(0.0, 0.0), 50.0);
        assert!(positions.len() > 2);
        let last = positions.last().unwrap();
        assert!(last.approx_eq(&Position::new(20.0, 0.0), 1e-9));
        // Spacing is bounded by the cruise speed over the sample period;
        // the appended endpoint may close up to one extra period.
        let max_gap = 2.0 * 10.0 / 50.0 + 1e-9;
        for pair in positions.windows(2) {
            assert!(pair[0].distance_to(&pair[1]) <= max_gap);
        }
    }

    #[test]
    fn zero_length_motion_yields_start() {
        let m = AtomicMotion::new(0.0, 0.0, profile()).unwrap();
        let positions = m.acquisition_positions(Position::new(2.0, 3.0), 10.0);
        assert_eq!(positions, vec![Position::new(2.0, 3.0)]);
    }
}
