use crate::target_selector::SelectionPolicy;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GatewayKind {
    /// Dahua-style ptz.cgi start/stop endpoint
    Dahua,
    /// ONVIF PTZ service (ContinuousMove/Stop)
    Onvif,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CameraAuth {
    Digest,
    Basic,
    /// Digest first, Basic when the camera offers no digest challenge
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnvifAuth {
    Basic,
    Wsse,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Keep a detected target centred and framed with PTZ pulses")]
pub struct Args {
    /// IP address or hostname of the camera
    #[arg(long)]
    pub ip: String,

    /// HTTP(S) port of the camera CGI (default 80, or 443 with --https)
    #[arg(long)]
    pub port: Option<u16>,

    /// Use HTTPS for the camera CGI (ONVIF requests stay on plain HTTP)
    #[arg(long)]
    pub https: bool,

    /// Allow invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Username for camera authentication
    #[arg(long)]
    pub username: Option<String>,

    /// Password for camera authentication
    #[arg(long)]
    pub password: Option<String>,

    /// Camera channel
    #[arg(long, default_value_t = 1)]
    pub channel: u32,

    /// CGI auth mode
    #[arg(long, value_enum, default_value_t = CameraAuth::Auto)]
    pub auth: CameraAuth,

    /// Actuator protocol
    #[arg(long, value_enum, default_value_t = GatewayKind::Dahua)]
    pub gateway: GatewayKind,

    /// ONVIF port
    #[arg(long, default_value_t = 80)]
    pub onvif_port: u16,

    /// ONVIF device service path
    #[arg(long, default_value = "/onvif/device_service")]
    pub onvif_path: String,

    /// ONVIF auth mode (basic or wsse)
    #[arg(long, value_enum, default_value_t = OnvifAuth::Basic)]
    pub onvif_auth: OnvifAuth,

    /// Gateway request timeout in milliseconds
    #[arg(long, default_value_t = 1500)]
    pub timeout_ms: u64,

    /// JSON file with controller tuning; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

#[derive(clap::Args, Debug, Default)]
pub struct TuningArgs {
    /// Target selection policy
    #[arg(long, value_enum)]
    pub policy: Option<SelectionPolicy>,

    /// Minimum detection confidence
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Minimum bbox area as a fraction of the frame
    #[arg(long)]
    pub min_area_frac: Option<f64>,

    /// Comma-separated class IDs that may be tracked (empty = all)
    #[arg(long, value_delimiter = ',')]
    pub allowed_ids: Option<Vec<u32>>,

    /// EMA weight of new observations
    #[arg(long)]
    pub smoothing_alpha: Option<f64>,

    /// Enter SEEK after this long without detections
    #[arg(long)]
    pub no_det_timeout_ms: Option<u64>,

    /// Control loop rate
    #[arg(long)]
    pub tick_rate_hz: Option<f64>,

    /// Centre dead zone for pan/tilt (fraction of frame)
    #[arg(long)]
    pub dead_zone: Option<f64>,

    /// Pan/tilt pulse floor in ms
    #[arg(long)]
    pub pan_tilt_base_ms: Option<u64>,

    /// Pan/tilt ms added per unit of centre error
    #[arg(long)]
    pub pan_tilt_gain_ms: Option<f64>,

    /// Pan/tilt pulse ceiling in ms
    #[arg(long)]
    pub max_pulse_ms: Option<u64>,

    /// Pan/tilt speed (0..8)
    #[arg(long)]
    pub pan_tilt_speed: Option<u8>,

    /// Disable pan/tilt; zoom only
    #[arg(long)]
    pub no_pan_tilt: bool,

    /// Desired bbox height as a fraction of frame height
    #[arg(long)]
    pub target_frac: Option<f64>,

    /// Zoom in below this height fraction
    #[arg(long)]
    pub low_band: Option<f64>,

    /// Zoom out above this height fraction
    #[arg(long)]
    pub high_band: Option<f64>,

    /// Zoom ms per unit of relative size error
    #[arg(long)]
    pub zoom_gain_ms: Option<f64>,

    /// Zoom pulse floor in ms
    #[arg(long)]
    pub zoom_min_ms: Option<u64>,

    /// Zoom pulse ceiling in ms
    #[arg(long)]
    pub zoom_max_ms: Option<u64>,

    /// Zoom speed (0..8)
    #[arg(long)]
    pub zoom_speed: Option<u8>,

    /// Disable zoom; pan/tilt only
    #[arg(long)]
    pub no_zoom: bool,

    /// Zoom in proactively while nothing is detected
    #[arg(long)]
    pub enable_seek: bool,

    /// Zoom-in pulses per SEEK cycle
    #[arg(long)]
    pub seek_pulses: Option<u32>,

    /// Zoom-in pulse length in SEEK
    #[arg(long)]
    pub seek_pulse_ms: Option<u64>,

    /// Zoom-out relax pulse length closing each SEEK cycle
    #[arg(long)]
    pub seek_relax_ms: Option<u64>,

    /// Minimum gap between pan pulses
    #[arg(long)]
    pub refractory_pan_ms: Option<u64>,

    /// Minimum gap between tilt pulses
    #[arg(long)]
    pub refractory_tilt_ms: Option<u64>,

    /// Minimum gap between zoom pulses
    #[arg(long)]
    pub refractory_zoom_ms: Option<u64>,

    /// Extra stop attempts when a stop call fails
    #[arg(long)]
    pub stop_retries: Option<u32>,
}
