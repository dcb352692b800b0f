use crate::gateway::ActuatorGateway;
use crate::pulse::{Axis, AxisCode, PulseCommand};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::time::Instant;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RefractoryConfig {
    pub pan_ms: u64,
    pub tilt_ms: u64,
    pub zoom_ms: u64,
}

impl Default for RefractoryConfig {
    fn default() -> Self {
        Self {
            pan_ms: 300,
            tilt_ms: 300,
            zoom_ms: 450,
        }
    }
}

impl RefractoryConfig {
    pub fn period(&self, axis: Axis) -> Duration {
        let ms = match axis {
            Axis::Pan => self.pan_ms,
            Axis::Tilt => self.tilt_ms,
            Axis::Zoom => self.zoom_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Last-issued instant and in-flight flag per axis.
#[derive(Debug)]
pub struct CooldownLedger {
    refractory: RefractoryConfig,
    last_issued: [Option<Instant>; 3],
    in_flight: [bool; 3],
}

impl CooldownLedger {
    pub fn new(refractory: RefractoryConfig) -> Self {
        Self {
            refractory,
            last_issued: [None; 3],
            in_flight: [false; 3],
        }
    }

    pub fn last_issued(&self, axis: Axis) -> Option<Instant> {
        self.last_issued[axis.index()]
    }

    /// Admits a pulse only if every axis it drives is idle and outside its
    /// refractory window. Admission stamps and reserves the axes.
    pub fn try_acquire(&mut self, axes: &[Axis], now: Instant) -> bool {
        let blocked = axes.iter().any(|axis| {
            let index = axis.index();
            if self.in_flight[index] {
                return true;
            }
            match self.last_issued[index] {
                Some(last) => now.saturating_duration_since(last) < self.refractory.period(*axis),
                None => false,
            }
        });
        if blocked {
            return false;
        }
        for axis in axes {
            self.in_flight[axis.index()] = true;
            self.last_issued[axis.index()] = Some(now);
        }
        true
    }

    pub fn release(&mut self, axes: &[Axis], now: Instant) {
        for axis in axes {
            self.in_flight[axis.index()] = false;
            self.last_issued[axis.index()] = Some(now);
        }
    }

    pub fn reset(&mut self) {
        self.last_issued = [None; 3];
        self.in_flight = [false; 3];
    }
}

/// Serialises pulses to the gateway behind a per-axis admission gate.
/// Rejected commands are dropped, never queued.
pub struct ActuationScheduler {
    gateway: Arc<dyn ActuatorGateway>,
    ledger: Mutex<CooldownLedger>,
    stop_retries: u32,
}

impl ActuationScheduler {
    pub fn new(
        gateway: Arc<dyn ActuatorGateway>,
        refractory: RefractoryConfig,
        stop_retries: u32,
    ) -> Self {
        Self {
            gateway,
            ledger: Mutex::new(CooldownLedger::new(refractory)),
            stop_retries,
        }
    }

    pub fn last_issued(&self, axis: Axis) -> Option<Instant> {
        self.ledger().last_issued(axis)
    }

    pub fn reset(&self) {
        self.ledger().reset();
    }

    /// Runs `command` as start, sleep, stop. Returns whether the command
    /// passed admission; gateway failures after admission are only logged.
    pub async fn submit(&self, command: PulseCommand) -> bool {
        let Some(_reservation) = AxisReservation::acquire(&self.ledger, command.code.axes())
        else {
            log::debug!("{} rejected: axis cooling down or busy", command.code);
            return false;
        };
        self.execute(command).await;
        true
    }

    /// Sends `stop` for every known code, ignoring individual failures.
    pub async fn stop_all(&self) {
        for code in AxisCode::iter() {
            if let Err(err) = self.gateway.end(code).await {
                log::debug!("stop_all {code}: {err}");
            }
        }
    }

    async fn execute(&self, command: PulseCommand) {
        let code = command.code;
        match self.gateway.begin(code, command.speed).await {
            Ok(()) => {
                log::debug!(
                    "pulse {code} speed={} {}ms",
                    command.speed,
                    command.duration.as_millis()
                );
                tokio::time::sleep(command.duration).await;
            }
            Err(err) => {
                // a timed out start may still have moved the motor
                log::warn!("start {code} failed: {err}");
            }
        }
        self.stop_with_retry(code).await;
    }

    async fn stop_with_retry(&self, code: AxisCode) {
        let attempts = self.stop_retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self.gateway.end(code).await {
                Ok(()) => return,
                Err(err) => {
                    log::warn!("stop {code} failed (attempt {attempt}/{attempts}): {err}");
                }
            }
        }
        log::error!("stop {code} failed after {attempts} attempts, motor may still be running");
    }

    fn ledger(&self) -> MutexGuard<'_, CooldownLedger> {
        lock(&self.ledger)
    }
}

fn lock(ledger: &Mutex<CooldownLedger>) -> MutexGuard<'_, CooldownLedger> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Admitted axes, released when the pulse completes or its future is dropped.
struct AxisReservation<'a> {
    ledger: &'a Mutex<CooldownLedger>,
    axes: &'static [Axis],
}

impl<'a> AxisReservation<'a> {
    fn acquire(ledger: &'a Mutex<CooldownLedger>, axes: &'static [Axis]) -> Option<Self> {
        lock(ledger)
            .try_acquire(axes, Instant::now())
            .then(|| Self { ledger, axes })
    }
}

impl Drop for AxisReservation<'_> {
    fn drop(&mut self) {
        lock(self.ledger).release(self.axes, Instant::now());
    }
}

#[cfg(test)]
mod success {
    use super::*;
    use crate::gateway::MockActuatorGateway;
    use mockall::predicate::eq;

    fn refractory(ms: u64) -> RefractoryConfig {
        RefractoryConfig {
            pan_ms: ms,
            tilt_ms: ms,
            zoom_ms: ms,
        }
    }

    fn command(code: AxisCode, ms: u64) -> PulseCommand {
        PulseCommand::new(code, 3, Duration::from_millis(ms))
    }

    #[tokio::test(start_paused = true)]
    async fn pulse_starts_sleeps_and_stops() {
        let mut gateway = MockActuatorGateway::new();
        gateway
            .expect_begin()
            .with(eq(AxisCode::Right), eq(3))
            .times(1)
            .returning(|_, _| Ok(()));
        gateway
            .expect_end()
            .with(eq(AxisCode::Right))
            .times(1)
            .returning(|_| Ok(()));
        let scheduler = ActuationScheduler::new(Arc::new(gateway), refractory(300), 2);

        let started = Instant::now();
        assert!(scheduler.submit(command(AxisCode::Right, 160)).await);
        assert!(started.elapsed() >= Duration::from_millis(160));
        assert!(scheduler.last_issued(Axis::Pan).is_some());
        assert!(scheduler.last_issued(Axis::Zoom).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn second_command_within_refractory_is_rejected() {
        let mut gateway = MockActuatorGateway::new();
        gateway.expect_begin().times(1).returning(|_, _| Ok(()));
        gateway.expect_end().times(1).returning(|_| Ok(()));
        let scheduler = ActuationScheduler::new(Arc::new(gateway), refractory(300), 2);

        assert!(scheduler.submit(command(AxisCode::ZoomTele, 100)).await);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!scheduler.submit(command(AxisCode::ZoomWide, 100)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn command_after_refractory_is_accepted() {
        let mut gateway = MockActuatorGateway::new();
        gateway.expect_begin().times(2).returning(|_, _| Ok(()));
        gateway.expect_end().times(2).returning(|_| Ok(()));
        let scheduler = ActuationScheduler::new(Arc::new(gateway), refractory(300), 2);

        assert!(scheduler.submit(command(AxisCode::Up, 100)).await);
        tokio::time::advance(Duration::from_millis(301)).await;
        assert!(scheduler.submit(command(AxisCode::Down, 100)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_pulse_frees_its_axis() {
        let mut gateway = MockActuatorGateway::new();
        gateway.expect_begin().times(2).returning(|_, _| Ok(()));
        gateway.expect_end().times(1).returning(|_| Ok(()));
        let scheduler = ActuationScheduler::new(Arc::new(gateway), refractory(300), 2);

        let cut_short = tokio::time::timeout(
            Duration::from_millis(50),
            scheduler.submit(command(AxisCode::Left, 200)),
        )
        .await;
        assert!(cut_short.is_err());
        assert!(scheduler.last_issued(Axis::Pan).is_some());

        tokio::time::advance(Duration::from_millis(301)).await;
        assert!(scheduler.submit(command(AxisCode::Right, 100)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn zoom_and_pan_run_concurrently() {
        let mut gateway = MockActuatorGateway::new();
        gateway.expect_begin().times(2).returning(|_, _| Ok(()));
        gateway.expect_end().times(2).returning(|_| Ok(()));
        let scheduler = ActuationScheduler::new(Arc::new(gateway), refractory(300), 2);

        let started = Instant::now();
        let (pan, zoom) = tokio::join!(
            scheduler.submit(command(AxisCode::Left, 200)),
            scheduler.submit(command(AxisCode::ZoomTele, 200)),
        );
        assert!(pan && zoom);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn same_axis_collision_is_rejected_mid_pulse() {
        let mut gateway = MockActuatorGateway::new();
        gateway.expect_begin().times(1).returning(|_, _| Ok(()));
        gateway.expect_end().times(1).returning(|_| Ok(()));
        // refractory shorter than the pulse: only the in-flight flag guards
        let scheduler = ActuationScheduler::new(Arc::new(gateway), refractory(0), 2);

        let (first, second) = tokio::join!(
            scheduler.submit(command(AxisCode::Right, 200)),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                scheduler.submit(command(AxisCode::RightUp, 100)).await
            }
        );
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn stop_all_sends_every_code_once() {
        let mut gateway = MockActuatorGateway::new();
        gateway.expect_begin().never();
        gateway.expect_end().times(10).returning(|_| Ok(()));
        let scheduler = ActuationScheduler::new(Arc::new(gateway), refractory(300), 2);
        scheduler.stop_all().await;
    }
}

#[cfg(test)]
mod failure {
    use super::*;
    use crate::gateway::{GatewayError, MockActuatorGateway};

    fn status_error(code: AxisCode) -> GatewayError {
        GatewayError::Status {
            action: "stop",
            code,
            status: 500,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_stop_is_retried_a_bounded_number_of_times() {
        let mut gateway = MockActuatorGateway::new();
        gateway.expect_begin().times(1).returning(|_, _| Ok(()));
        gateway
            .expect_end()
            .times(3)
            .returning(|code| Err(status_error(code)));
        let scheduler =
            ActuationScheduler::new(Arc::new(gateway), RefractoryConfig::default(), 2);

        let accepted = scheduler
            .submit(PulseCommand::new(AxisCode::Left, 3, Duration::from_millis(100)))
            .await;
        assert!(accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_retry_ends_on_first_success() {
        let mut gateway = MockActuatorGateway::new();
        gateway.expect_begin().times(1).returning(|_, _| Ok(()));
        let mut failures = 1;
        gateway.expect_end().times(2).returning(move |code| {
            if failures > 0 {
                failures -= 1;
                Err(status_error(code))
            } else {
                Ok(())
            }
        });
        let scheduler =
            ActuationScheduler::new(Arc::new(gateway), RefractoryConfig::default(), 5);

        assert!(
            scheduler
                .submit(PulseCommand::new(AxisCode::ZoomWide, 3, Duration::from_millis(100)))
                .await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_still_sends_stop_and_skips_sleep() {
        let mut gateway = MockActuatorGateway::new();
        gateway
            .expect_begin()
            .times(1)
            .returning(|_, _| Err(GatewayError::Timeout));
        gateway.expect_end().times(1).returning(|_| Ok(()));
        let scheduler =
            ActuationScheduler::new(Arc::new(gateway), RefractoryConfig::default(), 2);

        let started = Instant::now();
        assert!(
            scheduler
                .submit(PulseCommand::new(AxisCode::Up, 3, Duration::from_millis(250)))
                .await
        );
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn stop_all_ignores_failures() {
        let mut gateway = MockActuatorGateway::new();
        gateway
            .expect_end()
            .times(10)
            .returning(|_| Err(GatewayError::Timeout));
        let scheduler =
            ActuationScheduler::new(Arc::new(gateway), RefractoryConfig::default(), 2);
        scheduler.stop_all().await;
    }
}
