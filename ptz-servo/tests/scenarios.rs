mod common;

use common::{detection, Call, RecordingGateway};
use ptz_servo::config::ServoConfig;
use ptz_servo::controller::ServoController;
use ptz_servo::mode::Mode;
use ptz_servo::pulse::AxisCode;
use std::time::Duration;
use tokio::time::Instant;

fn unsmoothed() -> ServoConfig {
    ServoConfig {
        smoothing_alpha: 1.0,
        ..ServoConfig::default()
    }
}

async fn observe_and_tick(controller: &mut ServoController, cx: f64, cy: f64, height: f64) {
    let now = Instant::now();
    controller
        .sink()
        .deliver_frame(&[detection(cx, cy, height, now)], now);
    controller.tick(now).await;
}

async fn settle() {
    tokio::time::advance(Duration::from_millis(500)).await;
}

#[tokio::test(start_paused = true)]
async fn zoom_follows_the_hysteresis_band() {
    let gateway = RecordingGateway::new();
    let mut controller = ServoController::new(&unsmoothed(), gateway.clone());
    controller.enable();

    observe_and_tick(&mut controller, 0.5, 0.5, 0.10).await;
    assert_eq!(gateway.begins(), vec![AxisCode::ZoomTele]);
    assert!(gateway.pulse_length(AxisCode::ZoomTele).unwrap() > Duration::from_millis(100));

    gateway.clear();
    for _ in 0..5 {
        settle().await;
        observe_and_tick(&mut controller, 0.5, 0.5, 0.20).await;
    }
    assert!(gateway.calls().is_empty());

    settle().await;
    observe_and_tick(&mut controller, 0.5, 0.5, 0.30).await;
    assert_eq!(gateway.begins(), vec![AxisCode::ZoomWide]);
}

#[tokio::test(start_paused = true)]
async fn seek_bursts_then_relaxes() {
    let mut config = unsmoothed();
    config.zoom.seek.enabled = true;
    config.zoom.seek.pulses = 3;
    let gateway = RecordingGateway::new();
    let mut controller = ServoController::new(&config, gateway.clone());
    controller.enable();

    for _ in 0..8 {
        let report = controller.tick(Instant::now()).await;
        assert_eq!(report.mode, Mode::Seek);
        assert!(report.zoom.unwrap().accepted);
        assert_eq!(report.pan_tilt, None);
        settle().await;
    }
    use AxisCode::{ZoomTele as T, ZoomWide as W};
    assert_eq!(gateway.begins(), vec![T, T, T, W, T, T, T, W]);
    let relax = gateway.pulse_length(W).unwrap();
    assert!(relax >= Duration::from_millis(150) && relax < Duration::from_millis(155));
}

#[tokio::test(start_paused = true)]
async fn lost_target_enters_seek_after_timeout() {
    let mut config = unsmoothed();
    config.zoom.seek.enabled = true;
    let gateway = RecordingGateway::new();
    let mut controller = ServoController::new(&config, gateway.clone());
    controller.enable();

    observe_and_tick(&mut controller, 0.5, 0.5, 0.20).await;
    assert_eq!(controller.mode(), Mode::Track);
    assert!(gateway.calls().is_empty());

    tokio::time::advance(Duration::from_millis(900)).await;
    assert_eq!(controller.tick(Instant::now()).await.mode, Mode::Track);
    tokio::time::advance(Duration::from_millis(200)).await;
    let report = controller.tick(Instant::now()).await;
    assert_eq!(report.mode, Mode::Seek);
    assert_eq!(report.zoom.unwrap().command.code, AxisCode::ZoomTele);

    settle().await;
    observe_and_tick(&mut controller, 0.5, 0.5, 0.20).await;
    assert_eq!(controller.mode(), Mode::Track);
}

#[tokio::test(start_paused = true)]
async fn centred_target_is_left_alone() {
    let gateway = RecordingGateway::new();
    let mut controller = ServoController::new(&unsmoothed(), gateway.clone());
    controller.enable();

    observe_and_tick(&mut controller, 0.52, 0.50, 0.20).await;
    assert!(gateway.calls().is_empty());

    settle().await;
    observe_and_tick(&mut controller, 0.70, 0.50, 0.20).await;
    assert_eq!(
        gateway.calls(),
        vec![Call::Begin(AxisCode::Right, 3), Call::End(AxisCode::Right)]
    );
    let pulse = gateway.pulse_length(AxisCode::Right).unwrap();
    assert!(pulse >= Duration::from_millis(160) && pulse < Duration::from_millis(165));
}

#[tokio::test(start_paused = true)]
async fn run_brackets_motion_with_stop_all() {
    let gateway = RecordingGateway::new();
    let mut controller = ServoController::new(&unsmoothed(), gateway.clone());
    let sink = controller.sink();

    let feed = async {
        for _ in 0..20 {
            let now = Instant::now();
            sink.deliver_frame(&[detection(0.8, 0.2, 0.10, now)], now);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    };
    tokio::join!(
        controller.run(tokio::time::sleep(Duration::from_secs(3))),
        feed
    );

    let calls = gateway.calls();
    assert!(calls.len() > 20);
    assert!(calls[..10].iter().all(|call| matches!(call, Call::End(_))));
    assert!(calls[calls.len() - 10..]
        .iter()
        .all(|call| matches!(call, Call::End(_))));
    let begins = gateway.begins();
    assert!(begins.contains(&AxisCode::RightUp));
    assert!(begins.contains(&AxisCode::ZoomTele));
    assert_eq!(controller.mode(), Mode::Idle);
}
