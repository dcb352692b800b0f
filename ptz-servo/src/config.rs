use crate::cli::{Args, CameraAuth, GatewayKind, OnvifAuth, TuningArgs};
use crate::pan_tilt::PanTiltConfig;
use crate::pulse::MAX_SPEED;
use crate::scheduler::RefractoryConfig;
use crate::target_selector::{SelectionPolicy, TargetSelector};
use crate::zoom::ZoomConfig;
use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const MAX_TICK_RATE_HZ: f64 = 1000.0;

/// Camera connection details.
#[derive(Debug, Clone)]
pub struct Target {
    host: String,
    port: u16,
    https: bool,
    insecure: bool,
    username: Option<String>,
    password: Option<String>,
    channel: u32,
    auth: CameraAuth,
    gateway: GatewayKind,
    onvif_port: u16,
    onvif_path: String,
    onvif_auth: OnvifAuth,
    timeout: Duration,
}

impl Target {
    pub fn from_args(args: &Args) -> Result<Self> {
        let host = args.ip.trim().to_string();
        if host.is_empty() {
            bail!("ip is required");
        }
        if args.timeout_ms == 0 {
            bail!("timeout-ms must be positive");
        }
        let port = args.port.unwrap_or(if args.https { 443 } else { 80 });
        Ok(Self {
            host,
            port,
            https: args.https,
            insecure: args.insecure,
            username: args.username.clone(),
            password: args.password.clone(),
            channel: args.channel,
            auth: args.auth,
            gateway: args.gateway,
            onvif_port: args.onvif_port,
            onvif_path: normalize_path(&args.onvif_path),
            onvif_auth: args.onvif_auth,
            timeout: Duration::from_millis(args.timeout_ms),
        })
    }

    pub fn cgi_endpoint(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        format!("{}://{}:{}/cgi-bin/ptz.cgi", scheme, self.host, self.port)
    }

    /// Device service URL. Always plain HTTP; `https` only applies to the CGI.
    pub fn onvif_endpoint(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.host, self.onvif_port, self.onvif_path
        )
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn auth(&self) -> CameraAuth {
        self.auth
    }

    pub fn gateway(&self) -> GatewayKind {
        self.gateway
    }

    pub fn onvif_auth(&self) -> OnvifAuth {
        self.onvif_auth
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn insecure(&self) -> bool {
        self.insecure
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub policy: SelectionPolicy,
    pub min_confidence: f64,
    pub min_area_frac: f64,
    /// Empty means every class is eligible.
    pub allowed_class_ids: Vec<u32>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            policy: SelectionPolicy::LargestArea,
            min_confidence: 0.5,
            min_area_frac: 0.0005,
            allowed_class_ids: Vec::new(),
        }
    }
}

impl SelectionConfig {
    pub fn selector(&self) -> TargetSelector {
        TargetSelector::new(
            self.policy,
            self.min_confidence,
            self.min_area_frac,
            self.allowed_class_ids.clone(),
        )
    }
}

/// Controller tuning. Every field has a default so a partial JSON file
/// only needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    pub selection: SelectionConfig,
    pub smoothing_alpha: f64,
    pub no_detection_timeout_ms: u64,
    pub tick_rate_hz: f64,
    pub pan_tilt: PanTiltConfig,
    pub zoom: ZoomConfig,
    pub refractory: RefractoryConfig,
    pub stop_retries: u32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            selection: SelectionConfig::default(),
            smoothing_alpha: 0.3,
            no_detection_timeout_ms: 1000,
            tick_rate_hz: 3.0,
            pan_tilt: PanTiltConfig::default(),
            zoom: ZoomConfig::default(),
            refractory: RefractoryConfig::default(),
            stop_retries: 2,
        }
    }
}

impl ServoConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid servo config json")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults, then the optional file, then CLI overrides; validated.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(&args.tuning);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, tuning: &TuningArgs) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }

        set(&mut self.selection.policy, &tuning.policy);
        set(&mut self.selection.min_confidence, &tuning.min_confidence);
        set(&mut self.selection.min_area_frac, &tuning.min_area_frac);
        set(&mut self.selection.allowed_class_ids, &tuning.allowed_ids);
        set(&mut self.smoothing_alpha, &tuning.smoothing_alpha);
        set(&mut self.no_detection_timeout_ms, &tuning.no_det_timeout_ms);
        set(&mut self.tick_rate_hz, &tuning.tick_rate_hz);

        set(&mut self.pan_tilt.dead_zone, &tuning.dead_zone);
        set(&mut self.pan_tilt.base_ms, &tuning.pan_tilt_base_ms);
        set(&mut self.pan_tilt.gain_ms, &tuning.pan_tilt_gain_ms);
        set(&mut self.pan_tilt.max_pulse_ms, &tuning.max_pulse_ms);
        set(&mut self.pan_tilt.speed, &tuning.pan_tilt_speed);
        if tuning.no_pan_tilt {
            self.pan_tilt.enabled = false;
        }

        set(&mut self.zoom.target_frac, &tuning.target_frac);
        set(&mut self.zoom.low_band, &tuning.low_band);
        set(&mut self.zoom.high_band, &tuning.high_band);
        set(&mut self.zoom.gain_ms, &tuning.zoom_gain_ms);
        set(&mut self.zoom.min_ms, &tuning.zoom_min_ms);
        set(&mut self.zoom.max_ms, &tuning.zoom_max_ms);
        set(&mut self.zoom.speed, &tuning.zoom_speed);
        if tuning.no_zoom {
            self.zoom.enabled = false;
        }
        if tuning.enable_seek {
            self.zoom.seek.enabled = true;
        }
        set(&mut self.zoom.seek.pulses, &tuning.seek_pulses);
        set(&mut self.zoom.seek.pulse_ms, &tuning.seek_pulse_ms);
        set(&mut self.zoom.seek.relax_ms, &tuning.seek_relax_ms);

        set(&mut self.refractory.pan_ms, &tuning.refractory_pan_ms);
        set(&mut self.refractory.tilt_ms, &tuning.refractory_tilt_ms);
        set(&mut self.refractory.zoom_ms, &tuning.refractory_zoom_ms);
        set(&mut self.stop_retries, &tuning.stop_retries);
    }

    pub fn validate(&self) -> Result<()> {
        let zoom = &self.zoom;
        ensure!(
            0.0 < zoom.low_band && zoom.low_band < zoom.target_frac && zoom.target_frac < zoom.high_band && zoom.high_band <= 1.0,
            "zoom band must satisfy 0 < low_band < target_frac < high_band <= 1 (got {} < {} < {})",
            zoom.low_band,
            zoom.target_frac,
            zoom.high_band
        );
        ensure!(
            self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0,
            "smoothing_alpha must be in (0, 1] (got {})",
            self.smoothing_alpha
        );
        ensure!(
            self.tick_rate_hz > 0.0 && self.tick_rate_hz <= MAX_TICK_RATE_HZ,
            "tick_rate_hz must be in (0, {MAX_TICK_RATE_HZ}] (got {})",
            self.tick_rate_hz
        );
        ensure!(!self.tick_interval().is_zero(), "tick interval rounds to zero");
        ensure!(
            (0.0..=1.0).contains(&self.selection.min_confidence),
            "min_confidence must be in [0, 1]"
        );
        ensure!(
            (0.0..=1.0).contains(&self.selection.min_area_frac),
            "min_area_frac must be in [0, 1] (got {})",
            self.selection.min_area_frac
        );
        ensure!(
            (0.0..0.5).contains(&self.pan_tilt.dead_zone),
            "dead_zone must be in [0, 0.5)"
        );
        ensure!(
            zoom.min_ms <= zoom.max_ms,
            "zoom min_ms {} exceeds max_ms {}",
            zoom.min_ms,
            zoom.max_ms
        );
        ensure!(
            self.pan_tilt.base_ms <= self.pan_tilt.max_pulse_ms,
            "pan/tilt base_ms {} exceeds max_pulse_ms {}",
            self.pan_tilt.base_ms,
            self.pan_tilt.max_pulse_ms
        );
        ensure!(
            self.pan_tilt.speed <= MAX_SPEED && zoom.speed <= MAX_SPEED,
            "speeds must be within 0..={MAX_SPEED}"
        );
        ensure!(zoom.seek.pulses >= 1, "seek pulses must be at least 1");

        let longest_pan_tilt = self.pan_tilt.max_pulse_ms;
        if self.refractory.pan_ms < longest_pan_tilt || self.refractory.tilt_ms < longest_pan_tilt
        {
            log::warn!(
                "pan/tilt refractory ({}/{} ms) is shorter than max pulse {} ms",
                self.refractory.pan_ms,
                self.refractory.tilt_ms,
                longest_pan_tilt
            );
        }
        let longest_zoom = zoom.max_ms.max(zoom.seek.pulse_ms).max(zoom.seek.relax_ms);
        if self.refractory.zoom_ms < longest_zoom {
            log::warn!(
                "zoom refractory {} ms is shorter than longest zoom pulse {} ms",
                self.refractory.zoom_ms,
                longest_zoom
            );
        }
        Ok(())
    }

    pub fn no_detection_timeout(&self) -> Duration {
        Duration::from_millis(self.no_detection_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }
}
