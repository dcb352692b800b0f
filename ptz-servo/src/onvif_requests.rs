pub const DEVICE_NS: &str = "http://www.onvif.org/ver10/device/wsdl";
pub const MEDIA_NS: &str = "http://www.onvif.org/ver10/media/wsdl";
pub const PTZ_NS: &str = "http://www.onvif.org/ver20/ptz/wsdl";
pub const SCHEMA_NS: &str = "http://www.onvif.org/ver10/schema";

const PAN_TILT_VELOCITY_SPACE: &str =
    "http://www.onvif.org/ver10/tptz/PanTiltSpaces/VelocityGenericSpace";
const ZOOM_VELOCITY_SPACE: &str =
    "http://www.onvif.org/ver10/tptz/ZoomSpaces/VelocityGenericSpace";

pub struct OnvifRequest {
    pub operation: &'static str,
    pub body: String,
}

/// Normalised velocity in [-1, 1] per axis; positive tilt is up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Velocity {
    pub pan: f32,
    pub tilt: f32,
    pub zoom: f32,
}

impl Velocity {
    fn moves_pan_tilt(&self) -> bool {
        self.pan != 0.0 || self.tilt != 0.0
    }

    fn moves_zoom(&self) -> bool {
        self.zoom != 0.0
    }
}

pub fn get_services() -> OnvifRequest {
    OnvifRequest {
        operation: "GetServices",
        body: format!(
            r#"<GetServices xmlns="{DEVICE_NS}"><IncludeCapability>false</IncludeCapability></GetServices>"#
        ),
    }
}

pub fn get_profiles() -> OnvifRequest {
    OnvifRequest {
        operation: "GetProfiles",
        body: format!(r#"<GetProfiles xmlns="{MEDIA_NS}"/>"#),
    }
}

/// Only the axes that move are included, so a zoom pulse leaves pan/tilt
/// untouched and vice versa.
pub fn continuous_move(profile: &str, velocity: Velocity) -> OnvifRequest {
    let mut elements = String::new();
    if velocity.moves_pan_tilt() {
        elements.push_str(&format!(
            r#"<PanTilt xmlns="{SCHEMA_NS}" x="{}" y="{}" space="{PAN_TILT_VELOCITY_SPACE}"/>"#,
            format_float(velocity.pan),
            format_float(velocity.tilt),
        ));
    }
    if velocity.moves_zoom() {
        elements.push_str(&format!(
            r#"<Zoom xmlns="{SCHEMA_NS}" x="{}" space="{ZOOM_VELOCITY_SPACE}"/>"#,
            format_float(velocity.zoom),
        ));
    }
    OnvifRequest {
        operation: "ContinuousMove",
        body: format!(
            r#"<ContinuousMove xmlns="{PTZ_NS}"><ProfileToken>{profile}</ProfileToken><Velocity>{elements}</Velocity></ContinuousMove>"#
        ),
    }
}

pub fn stop(profile: &str, pan_tilt: bool, zoom: bool) -> OnvifRequest {
    OnvifRequest {
        operation: "Stop",
        body: format!(
            r#"<Stop xmlns="{PTZ_NS}"><ProfileToken>{profile}</ProfileToken><PanTilt>{pan_tilt}</PanTilt><Zoom>{zoom}</Zoom></Stop>"#
        ),
    }
}

fn format_float(value: f32) -> String {
    let value = if value.abs() < f32::EPSILON { 0.0 } else { value };
    format!("{value:.3}")
}
