use crate::estimator::TargetEstimate;
use crate::pulse::{AxisCode, PulseCommand};
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PanTiltConfig {
    pub enabled: bool,
    pub dead_zone: f64,
    pub base_ms: u64,
    pub gain_ms: f64,
    pub max_pulse_ms: u64,
    pub speed: u8,
}

impl Default for PanTiltConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dead_zone: 0.05,
            base_ms: 100,
            gain_ms: 300.0,
            max_pulse_ms: 250,
            speed: 3,
        }
    }
}

/// Proportional recentering with a dead zone. Cooldown is the scheduler's
/// business; this only decides what the next pulse should be.
#[derive(Clone, Debug)]
pub struct PanTiltController {
    config: PanTiltConfig,
}

impl PanTiltController {
    pub fn new(config: PanTiltConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, estimate: &TargetEstimate) -> Option<PulseCommand> {
        if !self.config.enabled || !estimate.valid {
            return None;
        }
        let error_x = estimate.center_x_frac - 0.5;
        let error_y = estimate.center_y_frac - 0.5;
        let pan = self.active_sign(error_x);
        let tilt = self.active_sign(error_y);
        let code = AxisCode::from_signs(pan, tilt)?;

        let mut error: f64 = 0.0;
        if pan != 0 {
            error = error.max(error_x.abs());
        }
        if tilt != 0 {
            error = error.max(error_y.abs());
        }
        let duration = self.pulse_duration(error);
        log::debug!(
            "pan/tilt error=({error_x:+.3},{error_y:+.3}) -> {code} {}ms",
            duration.as_millis()
        );
        Some(PulseCommand::new(code, self.config.speed, duration))
    }

    fn active_sign(&self, error: f64) -> i8 {
        if error.abs() <= self.config.dead_zone {
            0
        } else if error > 0.0 {
            1
        } else {
            -1
        }
    }

    fn pulse_duration(&self, error: f64) -> Duration {
        let base = self.config.base_ms as f64;
        let ceiling = self.config.max_pulse_ms.max(self.config.base_ms) as f64;
        let ms = (base + self.config.gain_ms * error).clamp(base, ceiling);
        Duration::from_millis(ms.round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn estimate(cx: f64, cy: f64) -> TargetEstimate {
        TargetEstimate {
            center_x_frac: cx,
            center_y_frac: cy,
            height_frac: 0.2,
            last_update: Some(Instant::now()),
            valid: true,
        }
    }

    fn controller() -> PanTiltController {
        PanTiltController::new(PanTiltConfig::default())
    }

    #[test]
    fn centered_enough_issues_nothing() {
        let controller = controller();
        for (cx, cy) in [(0.52, 0.50), (0.46, 0.54), (0.5, 0.5), (0.549, 0.451)] {
            assert_eq!(controller.plan(&estimate(cx, cy)), None, "({cx},{cy})");
        }
    }

    #[test]
    fn right_pulse_scales_with_error() {
        let command = controller().plan(&estimate(0.70, 0.50)).unwrap();
        assert_eq!(command.code, AxisCode::Right);
        // 100 + 300 * 0.20
        assert_eq!(command.duration, Duration::from_millis(160));
        assert_eq!(command.speed, 3);
    }

    #[test]
    fn vertical_errors_map_to_up_and_down() {
        let controller = controller();
        assert_eq!(controller.plan(&estimate(0.5, 0.2)).unwrap().code, AxisCode::Up);
        assert_eq!(controller.plan(&estimate(0.5, 0.8)).unwrap().code, AxisCode::Down);
    }

    #[test]
    fn both_axes_outside_dead_zone_go_diagonal() {
        let command = controller().plan(&estimate(0.2, 0.65)).unwrap();
        assert_eq!(command.code, AxisCode::LeftDown);
        // larger error is 0.30 on x
        assert_eq!(command.duration, Duration::from_millis(190));
    }

    #[test]
    fn duration_is_capped() {
        let command = controller().plan(&estimate(1.0, 0.0)).unwrap();
        assert_eq!(command.code, AxisCode::RightUp);
        assert_eq!(command.duration, Duration::from_millis(250));
    }

    #[test]
    fn invalid_estimate_or_disabled_issues_nothing() {
        let mut invalid = estimate(0.9, 0.9);
        invalid.valid = false;
        assert_eq!(controller().plan(&invalid), None);

        let disabled = PanTiltController::new(PanTiltConfig {
            enabled: false,
            ..PanTiltConfig::default()
        });
        assert_eq!(disabled.plan(&estimate(0.9, 0.9)), None);
    }
}
