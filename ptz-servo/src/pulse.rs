use std::time::Duration;
use strum::{Display, EnumIter, IntoStaticStr};

pub const MAX_SPEED: u8 = 8;

/// Independent actuation axes tracked by the cooldown ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Pan,
    Tilt,
    Zoom,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Pan, Axis::Tilt, Axis::Zoom];

    pub fn index(self) -> usize {
        match self {
            Axis::Pan => 0,
            Axis::Tilt => 1,
            Axis::Zoom => 2,
        }
    }
}

/// Motion codes understood by the actuator. The variant name is the wire
/// string and is only materialised at the gateway boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum AxisCode {
    Left,
    Right,
    Up,
    Down,
    LeftUp,
    RightUp,
    LeftDown,
    RightDown,
    ZoomTele,
    ZoomWide,
}

impl AxisCode {
    pub fn wire_name(self) -> &'static str {
        self.into()
    }

    /// Ledger axes a pulse with this code keeps busy.
    pub fn axes(self) -> &'static [Axis] {
        match self {
            AxisCode::Left | AxisCode::Right => &[Axis::Pan],
            AxisCode::Up | AxisCode::Down => &[Axis::Tilt],
            AxisCode::LeftUp | AxisCode::RightUp | AxisCode::LeftDown | AxisCode::RightDown => {
                &[Axis::Pan, Axis::Tilt]
            }
            AxisCode::ZoomTele | AxisCode::ZoomWide => &[Axis::Zoom],
        }
    }

    pub fn is_zoom(self) -> bool {
        matches!(self, AxisCode::ZoomTele | AxisCode::ZoomWide)
    }

    /// Combines per-axis signs into a code. `pan` > 0 moves right, `tilt` > 0
    /// moves down (image coordinates grow downwards).
    pub fn from_signs(pan: i8, tilt: i8) -> Option<AxisCode> {
        let code = match (pan.signum(), tilt.signum()) {
            (0, 0) => return None,
            (1, 0) => AxisCode::Right,
            (-1, 0) => AxisCode::Left,
            (0, 1) => AxisCode::Down,
            (0, -1) => AxisCode::Up,
            (1, 1) => AxisCode::RightDown,
            (1, -1) => AxisCode::RightUp,
            (-1, 1) => AxisCode::LeftDown,
            _ => AxisCode::LeftUp,
        };
        Some(code)
    }

    /// Unit direction as (pan, tilt, zoom) in the ONVIF convention where
    /// positive tilt points up and positive zoom is telephoto.
    pub fn direction(self) -> (f32, f32, f32) {
        match self {
            AxisCode::Left => (-1.0, 0.0, 0.0),
            AxisCode::Right => (1.0, 0.0, 0.0),
            AxisCode::Up => (0.0, 1.0, 0.0),
            AxisCode::Down => (0.0, -1.0, 0.0),
            AxisCode::LeftUp => (-1.0, 1.0, 0.0),
            AxisCode::RightUp => (1.0, 1.0, 0.0),
            AxisCode::LeftDown => (-1.0, -1.0, 0.0),
            AxisCode::RightDown => (1.0, -1.0, 0.0),
            AxisCode::ZoomTele => (0.0, 0.0, 1.0),
            AxisCode::ZoomWide => (0.0, 0.0, -1.0),
        }
    }
}

/// One start/sleep/stop actuation. Issued once, never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PulseCommand {
    pub code: AxisCode,
    pub speed: u8,
    pub duration: Duration,
}

impl PulseCommand {
    pub fn new(code: AxisCode, speed: u8, duration: Duration) -> Self {
        Self {
            code,
            speed: speed.min(MAX_SPEED),
            duration,
        }
    }
}
