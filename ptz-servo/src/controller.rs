use crate::config::ServoConfig;
use crate::estimator::{StateEstimator, TargetEstimate};
use crate::gateway::ActuatorGateway;
use crate::ingest::ObservationSink;
use crate::mode::{Mode, ModeStateMachine};
use crate::pan_tilt::PanTiltController;
use crate::pulse::PulseCommand;
use crate::scheduler::ActuationScheduler;
use crate::zoom::ZoomController;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// A command planned this tick and whether the scheduler admitted it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dispatch {
    pub command: PulseCommand,
    pub accepted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    pub mode: Mode,
    pub pan_tilt: Option<Dispatch>,
    pub zoom: Option<Dispatch>,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {}", self.mode)?;
        for dispatch in [self.pan_tilt, self.zoom].into_iter().flatten() {
            write!(
                f,
                " {}:{}ms{}",
                dispatch.command.code,
                dispatch.command.duration.as_millis(),
                if dispatch.accepted { "" } else { "(rejected)" }
            )?;
        }
        Ok(())
    }
}

/// Owns the control side: mode, both axis controllers and the scheduler.
/// Perception writes through the `ObservationSink` handle only.
pub struct ServoController {
    sink: ObservationSink,
    mode: ModeStateMachine,
    pan_tilt: PanTiltController,
    zoom: ZoomController,
    scheduler: ActuationScheduler,
    no_detection_timeout: Duration,
    tick_interval: Duration,
}

impl ServoController {
    pub fn new(config: &ServoConfig, gateway: Arc<dyn ActuatorGateway>) -> Self {
        let sink = ObservationSink::new(
            config.selection.selector(),
            StateEstimator::new(config.smoothing_alpha),
        );
        Self {
            sink,
            mode: ModeStateMachine::new(config.zoom.seek.enabled, config.no_detection_timeout()),
            pan_tilt: PanTiltController::new(config.pan_tilt.clone()),
            zoom: ZoomController::new(config.zoom.clone()),
            scheduler: ActuationScheduler::new(
                gateway,
                config.refractory.clone(),
                config.stop_retries,
            ),
            no_detection_timeout: config.no_detection_timeout(),
            tick_interval: config.tick_interval(),
        }
    }

    /// Handle for the ingestion path.
    pub fn sink(&self) -> ObservationSink {
        self.sink.clone()
    }

    pub fn mode(&self) -> Mode {
        self.mode.mode()
    }

    pub fn scheduler(&self) -> &ActuationScheduler {
        &self.scheduler
    }

    pub fn enable(&mut self) {
        self.mode.enable();
    }

    /// One control step. Pan/tilt and zoom pulses are submitted together and
    /// the call returns once both have finished or been rejected.
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        let mut estimate = self.sink.estimate();
        let age = estimate.age(now);
        let mode = self.mode.evaluate(age);
        if age.map_or(true, |age| age > self.no_detection_timeout) {
            // held but not acted on
            estimate = TargetEstimate {
                valid: false,
                ..estimate
            };
        }

        let pan_tilt = match mode {
            Mode::Track => self.pan_tilt.plan(&estimate),
            Mode::Idle | Mode::Seek => None,
        };
        let zoom = self.zoom.plan(mode, &estimate);

        let scheduler = &self.scheduler;
        let (pan_tilt, zoom) = tokio::join!(dispatch(scheduler, pan_tilt), dispatch(scheduler, zoom));
        if let Some(Dispatch {
            command,
            accepted: true,
        }) = zoom
        {
            self.zoom.commit(&command);
        }

        TickReport {
            mode,
            pan_tilt,
            zoom,
        }
    }

    /// Returns to IDLE and stops every motion code.
    pub async fn shutdown(&mut self) {
        self.mode.stop();
        self.scheduler.stop_all().await;
    }

    /// Stops everything, enables tracking, ticks at the configured rate until
    /// `shutdown` resolves, then stops everything again.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.scheduler.stop_all().await;
        self.enable();
        log::info!(
            "control loop at {:.2} Hz, mode {}",
            1.0 / self.tick_interval.as_secs_f64(),
            self.mode()
        );

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                now = interval.tick() => {
                    let report = self.tick(now).await;
                    log::debug!("{report}");
                }
            }
        }

        log::info!("shutting down, stopping all motion");
        self.shutdown().await;
    }
}

async fn dispatch(
    scheduler: &ActuationScheduler,
    command: Option<PulseCommand>,
) -> Option<Dispatch> {
    let command = command?;
    let accepted = scheduler.submit(command).await;
    Some(Dispatch { command, accepted })
}
