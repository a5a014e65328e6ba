//! Nearest-epoch telemetry lookup.

use reel_models::TelemetryPoint;

/// Read-only index over the telemetry timeline with O(log n)
/// nearest-epoch lookup. Safe to share across workers once built.
#[derive(Debug, Clone, Default)]
pub struct TelemetryIndex {
    points: Vec<TelemetryPoint>,
}

impl TelemetryIndex {
    /// Build an index; points are sorted by epoch on the way in.
    pub fn new(mut points: Vec<TelemetryPoint>) -> Self {
        points.sort_by(|a, b| a.epoch.total_cmp(&b.epoch));
        Self { points }
    }

    /// The telemetry sample closest in time to `target_epoch`.
    pub fn find_nearest(&self, target_epoch: f64) -> Option<&TelemetryPoint> {
        if self.points.is_empty() {
            return None;
        }

        let idx = self.points.partition_point(|p| p.epoch < target_epoch);
        if idx == 0 {
            return self.points.first();
        }
        if idx == self.points.len() {
            return self.points.last();
        }

        let before = &self.points[idx - 1];
        let after = &self.points[idx];
        if (target_epoch - before.epoch).abs() < (after.epoch - target_epoch).abs() {
            Some(before)
        } else {
            Some(after)
        }
    }

    /// Nearest sample within `tolerance_s`, or `None` if the closest one
    /// is too far away to trust.
    pub fn find_within_tolerance(
        &self,
        target_epoch: f64,
        tolerance_s: f64,
    ) -> Option<&TelemetryPoint> {
        let nearest = self.find_nearest(target_epoch)?;
        ((nearest.epoch - target_epoch).abs() <= tolerance_s).then_some(nearest)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First sample epoch (the grid anchor).
    pub fn start_epoch(&self) -> Option<f64> {
        self.points.first().map(|p| p.epoch)
    }

    /// Last sample epoch.
    pub fn end_epoch(&self) -> Option<f64> {
        self.points.last().map(|p| p.epoch)
    }

    pub fn points(&self) -> &[TelemetryPoint] {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(epochs: &[f64]) -> TelemetryIndex {
        TelemetryIndex::new(
            epochs
                .iter()
                .map(|&e| TelemetryPoint::positional(e, 0.0, 0.0, 0.0))
                .collect(),
        )
    }

    #[test]
    fn test_nearest_in_the_middle() {
        let idx = index(&[0.0, 10.0, 20.0]);
        assert_eq!(idx.find_nearest(12.0).unwrap().epoch, 10.0);
        assert_eq!(idx.find_nearest(16.0).unwrap().epoch, 20.0);
    }

    #[test]
    fn test_nearest_at_boundaries() {
        let idx = index(&[0.0, 10.0, 20.0]);
        assert_eq!(idx.find_nearest(-5.0).unwrap().epoch, 0.0);
        assert_eq!(idx.find_nearest(25.0).unwrap().epoch, 20.0);
    }

    #[test]
    fn test_tolerance_rejects_distant_match() {
        let idx = index(&[0.0, 10.0, 20.0]);
        assert!(idx.find_within_tolerance(12.0, 1.0).is_none());
        assert_eq!(idx.find_within_tolerance(10.8, 1.0).unwrap().epoch, 10.0);
    }

    #[test]
    fn test_empty_index() {
        let idx = index(&[]);
        assert!(idx.find_nearest(0.0).is_none());
        assert!(idx.start_epoch().is_none());
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let idx = index(&[20.0, 0.0, 10.0]);
        assert_eq!(idx.start_epoch(), Some(0.0));
        assert_eq!(idx.end_epoch(), Some(20.0));
    }
}
