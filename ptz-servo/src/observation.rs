use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        if self.width <= 0.0 || self.height <= 0.0 {
            return 0.0;
        }
        self.width * self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSize {
    pub width: f64,
    pub height: f64,
}

impl FrameSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        if self.width <= 0.0 || self.height <= 0.0 {
            return 0.0;
        }
        self.width * self.height
    }
}

/// One detection candidate for one frame, as delivered by the perception
/// source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub class_id: u32,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub frame_size: FrameSize,
    pub timestamp: Instant,
}

impl Observation {
    pub fn new(
        class_id: u32,
        confidence: f64,
        bbox: BoundingBox,
        frame_size: FrameSize,
        timestamp: Instant,
    ) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
            frame_size,
            timestamp,
        }
    }

    /// Zero-area boxes and degenerate frames count as "no detection".
    pub fn is_detection(&self) -> bool {
        self.bbox.area() > 0.0 && self.frame_size.area() > 0.0
    }

    pub fn area_frac(&self) -> f64 {
        let frame = self.frame_size.area();
        if frame <= 0.0 {
            return 0.0;
        }
        self.bbox.area() / frame
    }

    /// Frame-normalised (center_x, center_y, height) of the box.
    pub fn normalized(&self) -> Option<(f64, f64, f64)> {
        if !self.is_detection() {
            return None;
        }
        let (cx, cy) = self.bbox.center();
        let cx = (cx / self.frame_size.width).clamp(0.0, 1.0);
        let cy = (cy / self.frame_size.height).clamp(0.0, 1.0);
        let height = (self.bbox.height / self.frame_size.height).clamp(f64::MIN_POSITIVE, 1.0);
        Some((cx, cy, height))
    }
}
