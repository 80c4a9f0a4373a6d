//! Basic measurement types: stage positions and multi-channel samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stage position in bench coordinates (mm)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate in mm.
    pub x: f64,
    /// Y coordinate in mm.
    pub y: f64,
}

impl Position {
    /// Create a position from bench coordinates
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The position reached after a relative displacement
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    /// Whether two positions coincide within a tolerance
    pub fn approx_eq(&self, other: &Position, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// One multi-channel analog sample
///
/// Channel meaning (in-phase/quadrature pairs, field components, ...) is a
/// front-end concern; the engine only carries the values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    /// Raw channel values in acquisition order.
    pub channels: Vec<f64>,
}

impl Measurement {
    /// Create a measurement from raw channel values
    pub fn new(channels: Vec<f64>) -> Self {
        Self { channels }
    }

    /// Number of channels in this sample
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Value of one channel, if present
    pub fn channel(&self, index: usize) -> Option<f64> {
        self.channels.get(index).copied()
    }

    /// Channel-wise mean of several samples
    ///
    /// Samples with mismatched channel counts are truncated to the shortest.
    /// Returns an empty measurement for an empty input.
    pub fn average(samples: &[Measurement]) -> Measurement {
        if samples.is_empty() {
            return Measurement::default();
        }
        let width = samples
            .iter()
            .map(|s| s.channels.len())
            .min()
            .unwrap_or(0);
        let mut sums = vec![0.0; width];
        for sample in samples {
            for (acc, value) in sums.iter_mut().zip(&sample.channels) {
                *acc += value;
            }
        }
        let n = samples.len() as f64;
        Measurement::new(sums.into_iter().map(|s| s / n).collect())
    }
}

/// One acquired data point of a scan
///
/// Immutable once constructed. The acquisition timestamp is captured at
/// construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPointResult {
    /// Zero-based index of this point within the scan.
    pub point_index: usize,
    /// Stage position at acquisition.
    pub position: Position,
    /// The multi-channel sample.
    pub measurement: Measurement,
    /// When the sample was acquired.
    pub acquired_at: DateTime<Utc>,
}

impl ScanPointResult {
    /// Create a point result, timestamping it now
    pub fn new(point_index: usize, position: Position, measurement: Measurement) -> Self {
        Self {
            point_index,
            position,
            measurement,
            acquired_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translated_position() {
        let p = Position::new(1.0, 2.0).translated(0.5, -1.0);
        assert!(p.approx_eq(&Position::new(1.5, 1.0), 1e-9));
    }

    #[test]
    fn distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn measurement_average() {
        let avg = Measurement::average(&[
            Measurement::new(vec![1.0, 3.0]),
            Measurement::new(vec![3.0, 5.0]),
        ]);
        assert_eq!(avg.channels, vec![2.0, 4.0]);
    }

    #[test]
    fn measurement_average_empty() {
        assert_eq!(Measurement::average(&[]).channel_count(), 0);
    }
}
