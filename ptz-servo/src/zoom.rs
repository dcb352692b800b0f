use crate::estimator::TargetEstimate;
use crate::mode::Mode;
use crate::pulse::{AxisCode, PulseCommand};
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SeekConfig {
    pub enabled: bool,
    pub pulses: u32,
    pub pulse_ms: u64,
    pub relax_ms: u64,
}

impl Default for SeekConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pulses: 12,
            pulse_ms: 250,
            relax_ms: 150,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub enabled: bool,
    pub target_frac: f64,
    pub low_band: f64,
    pub high_band: f64,
    pub gain_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub speed: u8,
    pub seek: SeekConfig,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_frac: 0.20,
            low_band: 0.18,
            high_band: 0.22,
            gain_ms: 600.0,
            min_ms: 100,
            max_ms: 400,
            speed: 3,
            seek: SeekConfig::default(),
        }
    }
}

/// Hysteresis-band zoom in TRACK, cyclic zoom-in burst with a relax pulse
/// in SEEK.
#[derive(Clone, Debug)]
pub struct ZoomController {
    config: ZoomConfig,
    seek_cycle_pulses: u32,
    last_mode: Mode,
}

impl ZoomController {
    pub fn new(config: ZoomConfig) -> Self {
        Self {
            config,
            seek_cycle_pulses: 0,
            last_mode: Mode::Idle,
        }
    }

    pub fn seek_cycle_pulses(&self) -> u32 {
        self.seek_cycle_pulses
    }

    pub fn plan(&mut self, mode: Mode, estimate: &TargetEstimate) -> Option<PulseCommand> {
        let entered_seek = mode == Mode::Seek && self.last_mode != Mode::Seek;
        self.last_mode = mode;
        if mode != Mode::Seek || entered_seek {
            self.seek_cycle_pulses = 0;
        }
        if !self.config.enabled {
            return None;
        }
        match mode {
            Mode::Idle => None,
            Mode::Seek => Some(self.plan_seek()),
            Mode::Track => self.plan_track(estimate),
        }
    }

    /// Advances the SEEK cycle once the scheduler accepted `command`.
    pub fn commit(&mut self, command: &PulseCommand) {
        if self.last_mode != Mode::Seek {
            return;
        }
        match command.code {
            AxisCode::ZoomTele => self.seek_cycle_pulses += 1,
            AxisCode::ZoomWide => self.seek_cycle_pulses = 0,
            _ => {}
        }
    }

    fn plan_seek(&self) -> PulseCommand {
        let seek = &self.config.seek;
        if self.seek_cycle_pulses < seek.pulses.max(1) {
            log::debug!(
                "seek zoom-in {}/{}",
                self.seek_cycle_pulses + 1,
                seek.pulses.max(1)
            );
            PulseCommand::new(
                AxisCode::ZoomTele,
                self.config.speed,
                Duration::from_millis(seek.pulse_ms),
            )
        } else {
            log::debug!("seek relax zoom-out");
            PulseCommand::new(
                AxisCode::ZoomWide,
                self.config.speed,
                Duration::from_millis(seek.relax_ms),
            )
        }
    }

    fn plan_track(&self, estimate: &TargetEstimate) -> Option<PulseCommand> {
        if !estimate.valid {
            return None;
        }
        let height = estimate.height_frac;
        let target = self.config.target_frac.max(1e-6);
        let (code, error) = if height < self.config.low_band {
            (AxisCode::ZoomTele, (target - height) / target)
        } else if height > self.config.high_band {
            (AxisCode::ZoomWide, (height - target) / target)
        } else {
            return None;
        };
        let duration = self.pulse_duration(error);
        log::debug!(
            "zoom height={height:.3} band=[{:.3},{:.3}] -> {code} {}ms",
            self.config.low_band,
            self.config.high_band,
            duration.as_millis()
        );
        Some(PulseCommand::new(code, self.config.speed, duration))
    }

    fn pulse_duration(&self, error: f64) -> Duration {
        let min = self.config.min_ms as f64;
        let max = self.config.max_ms.max(self.config.min_ms) as f64;
        let ms = (self.config.gain_ms * error).clamp(min, max);
        Duration::from_millis(ms.round() as u64)
    }
}
