use crate::observation::Observation;
use std::time::Duration;
use tokio::time::Instant;

/// Smoothed, frame-normalised view of the tracked target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetEstimate {
    pub center_x_frac: f64,
    pub center_y_frac: f64,
    pub height_frac: f64,
    pub last_update: Option<Instant>,
    pub valid: bool,
}

impl Default for TargetEstimate {
    fn default() -> Self {
        Self {
            center_x_frac: 0.5,
            center_y_frac: 0.5,
            height_frac: 0.0,
            last_update: None,
            valid: false,
        }
    }
}

impl TargetEstimate {
    /// Time since the last applied observation; `None` means never seen.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.last_update
            .map(|last| now.saturating_duration_since(last))
    }
}

#[derive(Clone, Debug)]
pub struct StateEstimator {
    alpha: f64,
    estimate: TargetEstimate,
}

impl StateEstimator {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::MIN_POSITIVE, 1.0),
            estimate: TargetEstimate::default(),
        }
    }

    pub fn estimate(&self) -> TargetEstimate {
        self.estimate
    }

    /// Applies the selected observation of a frame. `None` leaves the
    /// estimate untouched; staleness is derived from `last_update`.
    pub fn update(&mut self, selected: Option<&Observation>, now: Instant) {
        let Some((cx, cy, height)) = selected.and_then(Observation::normalized) else {
            return;
        };
        let estimate = &mut self.estimate;
        if estimate.valid {
            estimate.center_x_frac = blend(self.alpha, cx, estimate.center_x_frac);
            estimate.center_y_frac = blend(self.alpha, cy, estimate.center_y_frac);
            estimate.height_frac = blend(self.alpha, height, estimate.height_frac);
        } else {
            estimate.center_x_frac = cx;
            estimate.center_y_frac = cy;
            estimate.height_frac = height;
        }
        estimate.last_update = Some(now);
        estimate.valid = true;
    }

    pub fn reset(&mut self) {
        self.estimate = TargetEstimate::default();
    }
}

fn blend(alpha: f64, raw: f64, previous: f64) -> f64 {
    alpha * raw + (1.0 - alpha) * previous
}
