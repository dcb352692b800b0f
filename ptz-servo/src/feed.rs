use crate::ingest::ObservationSink;
use crate::observation::{BoundingBox, FrameSize, Observation};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::BufRead;
use std::thread::{self, JoinHandle};
use tokio::time::Instant;

/// One line of the detection feed.
#[derive(Debug, Deserialize)]
struct FrameMessage {
    frame_width: f64,
    frame_height: f64,
    #[serde(default)]
    detections: Vec<DetectionMessage>,
}

#[derive(Debug, Deserialize)]
struct DetectionMessage {
    class_id: u32,
    confidence: f64,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

pub fn parse_frame(line: &str, timestamp: Instant) -> Result<Vec<Observation>> {
    let message: FrameMessage =
        serde_json::from_str(line).context("malformed detection frame")?;
    let frame = FrameSize::new(message.frame_width, message.frame_height);
    Ok(message
        .detections
        .into_iter()
        .map(|detection| {
            Observation::new(
                detection.class_id,
                detection.confidence,
                BoundingBox::new(detection.left, detection.top, detection.width, detection.height),
                frame,
                timestamp,
            )
        })
        .collect())
}

/// Delivers every line of `reader` as one frame stamped at receipt.
/// Returns the number of frames delivered once the input ends.
pub fn pump<R: BufRead>(reader: R, sink: &ObservationSink) -> Result<u64> {
    let mut frames = 0;
    for line in reader.lines() {
        let line = line.context("detection feed read failed")?;
        if line.trim().is_empty() {
            continue;
        }
        let received = Instant::now();
        match parse_frame(&line, received) {
            Ok(candidates) => {
                sink.deliver_frame(&candidates, received);
                frames += 1;
            }
            Err(err) => log::warn!("skipping feed line: {err:#}"),
        }
    }
    Ok(frames)
}

/// Reads stdin on a dedicated thread so a blocked read never holds up the
/// control loop or its shutdown.
pub fn spawn_stdin(sink: ObservationSink) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("detection-feed".into())
        .spawn(move || match pump(std::io::stdin().lock(), &sink) {
            Ok(frames) => log::info!("detection feed closed after {frames} frames"),
            Err(err) => log::error!("{err:#}"),
        })
        .context("failed to spawn detection feed thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::StateEstimator;
    use crate::target_selector::{SelectionPolicy, TargetSelector};

    #[test]
    fn line_becomes_candidates() {
        let at = Instant::now();
        let candidates = parse_frame(
            r#"{"frame_width":1920,"frame_height":1080,"detections":[
                {"class_id":0,"confidence":0.9,"left":100,"top":200,"width":50,"height":108},
                {"class_id":2,"confidence":0.4,"left":0,"top":0,"width":10,"height":10}]}"#,
            at,
        )
        .unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].bbox, BoundingBox::new(100.0, 200.0, 50.0, 108.0));
        assert_eq!(candidates[0].frame_size, FrameSize::new(1920.0, 1080.0));
        assert_eq!(candidates[1].class_id, 2);
        assert!(candidates.iter().all(|c| c.timestamp == at));
    }

    #[test]
    fn missing_detections_is_an_empty_frame() {
        let candidates =
            parse_frame(r#"{"frame_width":640,"frame_height":480}"#, Instant::now()).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let sink = ObservationSink::new(
            TargetSelector::new(SelectionPolicy::LargestArea, 0.5, 0.0, Vec::new()),
            StateEstimator::new(1.0),
        );
        let input = concat!(
            "not json\n",
            "\n",
            r#"{"frame_width":100,"frame_height":100,"detections":[{"class_id":0,"confidence":0.8,"left":60,"top":40,"width":20,"height":20}]}"#,
            "\n",
            r#"{"frame_width":"wide"}"#,
            "\n",
        );
        let frames = pump(input.as_bytes(), &sink).unwrap();
        assert_eq!(frames, 1);
        let estimate = sink.estimate();
        assert!(estimate.valid);
        assert!((estimate.center_x_frac - 0.7).abs() < 1e-9);
        assert!((estimate.height_frac - 0.2).abs() < 1e-9);
    }
}
