//! Trajectory generation: grid positions and the motions linking them.

use serde::{Deserialize, Serialize};

use crate::config::{ScanPattern, ScanZone};
use crate::error::ValidationError;
use crate::motion::{AtomicMotion, MotionProfile};
use crate::units::Position;

/// Evenly spaced coordinates across an axis; a single point sits at the low bound
fn axis_coords(min: f64, max: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![min];
    }
    let step = (max - min) / (n - 1) as f64;
    (0..n).map(|i| min + step * i as f64).collect()
}

/// Generate the ordered grid positions for a scan
///
/// Serpentine reverses every odd row so consecutive rows connect at the near
/// end; raster always sweeps left to right; comb walks column by column.
pub fn generate_positions(
    zone: &ScanZone,
    x_nb_points: usize,
    y_nb_points: usize,
    pattern: ScanPattern,
) -> Vec<Position> {
    let xs = axis_coords(zone.x_min, zone.x_max, x_nb_points);
    let ys = axis_coords(zone.y_min, zone.y_max, y_nb_points);
    let mut positions = Vec::with_capacity(x_nb_points * y_nb_points);

    match pattern {
        ScanPattern::Serpentine => {
            for (row, &y) in ys.iter().enumerate() {
                if row % 2 == 0 {
                    positions.extend(xs.iter().map(|&x| Position::new(x, y)));
                } else {
                    positions.extend(xs.iter().rev().map(|&x| Position::new(x, y)));
                }
            }
        }
        ScanPattern::Raster => {
            for &y in &ys {
                positions.extend(xs.iter().map(|&x| Position::new(x, y)));
            }
        }
        ScanPattern::Comb => {
            for &x in &xs {
                positions.extend(ys.iter().map(|&y| Position::new(x, y)));
            }
        }
    }
    positions
}

/// Picks a velocity profile per segment by travel distance
///
/// Short hops (the step between adjacent grid points) use the fine profile;
/// longer repositioning moves (row returns in a raster, for instance) use
/// the coarse one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSelector {
    /// Profile for segments at or below the threshold.
    pub fine: MotionProfile,
    /// Profile for segments above the threshold.
    pub coarse: MotionProfile,
    /// Distance threshold in mm.
    pub threshold_mm: f64,
}

impl ProfileSelector {
    /// Use one profile for every segment
    pub fn uniform(profile: MotionProfile) -> Self {
        Self {
            fine: profile,
            coarse: profile,
            threshold_mm: 0.0,
        }
    }

    /// Select the profile for a segment of the given length
    pub fn select(&self, distance_mm: f64) -> MotionProfile {
        if distance_mm <= self.threshold_mm {
            self.fine
        } else {
            self.coarse
        }
    }
}

impl Default for ProfileSelector {
    fn default() -> Self {
        Self {
            fine: MotionProfile::default(),
            coarse: MotionProfile {
                target_speed: 25.0,
                ..MotionProfile::default()
            },
            threshold_mm: 20.0,
        }
    }
}

/// Build the motions connecting consecutive trajectory positions
///
/// Emits `positions.len() - 1` motions whose displacements telescope from
/// the first position to the last.
pub fn build_motions(
    positions: &[Position],
    selector: &ProfileSelector,
) -> Result<Vec<AtomicMotion>, ValidationError> {
    let mut motions = Vec::with_capacity(positions.len().saturating_sub(1));
    for pair in positions.windows(2) {
        let dx = pair[1].x - pair[0].x;
        let dy = pair[1].y - pair[0].y;
        let distance = (dx * dx + dy * dy).sqrt();
        motions.push(AtomicMotion::new(dx, dy, selector.select(distance))?);
    }
    Ok(motions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> ScanZone {
        ScanZone::new(0.0, 10.0, 0.0, 10.0).unwrap()
    }

    #[test]
    fn serpentine_reverses_odd_rows() {
        let positions = generate_positions(&zone(), 3, 2, ScanPattern::Serpentine);
        assert_eq!(positions.len(), 6);
        assert_eq!(positions[0], Position::new(0.0, 0.0));
        assert_eq!(positions[2], Position::new(10.0, 0.0));
        // Second row starts where the first ended.
        assert_eq!(positions[3], Position::new(10.0, 10.0));
        assert_eq!(positions[5], Position::new(0.0, 10.0));
    }

    #[test]
    fn raster_never_reverses() {
        let positions = generate_positions(&zone(), 3, 2, ScanPattern::Raster);
        assert_eq!(positions[3], Position::new(0.0, 10.0));
        assert_eq!(positions[5], Position::new(10.0, 10.0));
    }

    #[test]
    fn comb_is_column_major() {
        let positions = generate_positions(&zone(), 2, 3, ScanPattern::Comb);
        assert_eq!(positions[0], Position::new(0.0, 0.0));
        assert_eq!(positions[1], Position::new(0.0, 5.0));
        assert_eq!(positions[2], Position::new(0.0, 10.0));
        assert_eq!(positions[3], Position::new(10.0, 0.0));
    }

    #[test]
    fn single_row_grid() {
        let positions = generate_positions(&zone(), 5, 1, ScanPattern::Serpentine);
        assert_eq!(positions.len(), 5);
        assert!(positions.iter().all(|p| p.y == 0.0));
    }

    #[test]
    fn motions_telescope_to_last_position() {
        let positions = generate_positions(&zone(), 3, 3, ScanPattern::Serpentine);
        let motions = build_motions(&positions, &ProfileSelector::default()).unwrap();
        assert_eq!(motions.len(), positions.len() - 1);

        let mut current = positions[0];
        for motion in &motions {
            current = motion.end_position(current);
        }
        assert!(current.approx_eq(positions.last().unwrap(), 1e-9));
    }

    #[test]
    fn selector_picks_by_distance() {
        let selector = ProfileSelector::default();
        assert_eq!(selector.select(5.0), selector.fine);
        assert_eq!(selector.select(50.0), selector.coarse);
    }
}
