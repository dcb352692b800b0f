use async_trait::async_trait;
use ptz_servo::gateway::{ActuatorGateway, GatewayError};
use ptz_servo::observation::{BoundingBox, FrameSize, Observation};
use ptz_servo::pulse::AxisCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    Begin(AxisCode, u8),
    End(AxisCode),
}

/// Gateway that accepts everything and remembers when it was called.
#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<(Instant, Call)>>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(_, call)| *call).collect()
    }

    pub fn begins(&self) -> Vec<AxisCode> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Begin(code, _) => Some(code),
                Call::End(_) => None,
            })
            .collect()
    }

    /// Time between the first `Begin(code)` and the `End(code)` after it.
    pub fn pulse_length(&self, code: AxisCode) -> Option<Duration> {
        let calls = self.calls.lock().unwrap();
        let (start_index, (started, _)) = calls
            .iter()
            .enumerate()
            .find(|(_, (_, call))| matches!(call, Call::Begin(c, _) if *c == code))?;
        let (ended, _) = calls[start_index..]
            .iter()
            .find(|(_, call)| *call == Call::End(code))?;
        Some(*ended - *started)
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

#[async_trait]
impl ActuatorGateway for RecordingGateway {
    async fn begin(&self, code: AxisCode, speed: u8) -> Result<(), GatewayError> {
        self.record(Call::Begin(code, speed));
        Ok(())
    }

    async fn end(&self, code: AxisCode) -> Result<(), GatewayError> {
        self.record(Call::End(code));
        Ok(())
    }
}

/// A 1000x1000 frame with one box centred on (`cx`, `cy`) whose height is
/// `height` of the frame.
pub fn detection(cx: f64, cy: f64, height: f64, at: Instant) -> Observation {
    let h = height * 1000.0;
    Observation::new(
        0,
        0.9,
        BoundingBox::new(cx * 1000.0 - 25.0, cy * 1000.0 - h / 2.0, 50.0, h),
        FrameSize::new(1000.0, 1000.0),
        at,
    )
}
