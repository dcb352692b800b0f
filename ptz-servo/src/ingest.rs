use crate::estimator::{StateEstimator, TargetEstimate};
use crate::observation::Observation;
use crate::target_selector::TargetSelector;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Ingestion handle shared between the perception side and the control
/// tick. Candidates that share a timestamp form one frame; a frame is
/// reduced to a single target and folded into the estimate when it closes.
#[derive(Clone)]
pub struct ObservationSink {
    inner: Arc<Mutex<FrameIngest>>,
}

struct FrameIngest {
    selector: TargetSelector,
    estimator: StateEstimator,
    pending: Vec<Observation>,
    pending_at: Option<Instant>,
    last_frame: Option<AppliedFrame>,
}

/// The most recently applied frame, kept so late candidates of the same
/// frame can be merged instead of producing a second update.
struct AppliedFrame {
    at: Instant,
    candidates: Vec<Observation>,
    before: StateEstimator,
}

impl ObservationSink {
    pub fn new(selector: TargetSelector, estimator: StateEstimator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FrameIngest {
                selector,
                estimator,
                pending: Vec::new(),
                pending_at: None,
                last_frame: None,
            })),
        }
    }

    /// One candidate of the frame stamped `observation.timestamp`.
    pub fn deliver_observation(&self, observation: Observation) {
        let mut ingest = self.lock();
        if ingest.is_stale(observation.timestamp) {
            log::trace!("dropping out-of-order observation");
            return;
        }
        if ingest
            .pending_at
            .is_some_and(|at| at != observation.timestamp)
        {
            ingest.close_pending();
        }
        if ingest.pending_at.is_none() {
            ingest.reopen(observation.timestamp);
        }
        ingest.pending_at = Some(observation.timestamp);
        ingest.pending.push(observation);
    }

    /// A complete frame; closes any partially delivered one first.
    pub fn deliver_frame(&self, candidates: &[Observation], timestamp: Instant) {
        let mut ingest = self.lock();
        ingest.close_pending();
        if candidates.is_empty() || ingest.is_stale(timestamp) {
            return;
        }
        if ingest.reopen(timestamp) {
            ingest.pending.extend_from_slice(candidates);
            ingest.close_pending();
        } else {
            ingest.apply(candidates.to_vec(), timestamp);
        }
    }

    /// Current estimate with every delivered frame applied.
    pub fn estimate(&self) -> TargetEstimate {
        let mut ingest = self.lock();
        ingest.close_pending();
        ingest.estimator.estimate()
    }

    pub fn reset(&self) {
        let mut ingest = self.lock();
        ingest.pending.clear();
        ingest.pending_at = None;
        ingest.last_frame = None;
        ingest.estimator.reset();
    }

    fn lock(&self) -> MutexGuard<'_, FrameIngest> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameIngest {
    fn is_stale(&self, timestamp: Instant) -> bool {
        self.last_frame
            .as_ref()
            .is_some_and(|frame| timestamp < frame.at)
            || self.pending_at.is_some_and(|at| timestamp < at)
    }

    /// Undoes the last applied frame if it carries `timestamp` and makes its
    /// candidates pending again.
    fn reopen(&mut self, timestamp: Instant) -> bool {
        if !self
            .last_frame
            .as_ref()
            .is_some_and(|frame| frame.at == timestamp)
        {
            return false;
        }
        let Some(frame) = self.last_frame.take() else {
            return false;
        };
        self.estimator = frame.before;
        self.pending = frame.candidates;
        self.pending_at = Some(frame.at);
        true
    }

    fn close_pending(&mut self) {
        let Some(at) = self.pending_at.take() else {
            return;
        };
        let candidates = std::mem::take(&mut self.pending);
        self.apply(candidates, at);
    }

    fn apply(&mut self, candidates: Vec<Observation>, timestamp: Instant) {
        let before = self.estimator.clone();
        let selected = self.selector.select(&candidates);
        self.estimator.update(selected, timestamp);
        self.last_frame = Some(AppliedFrame {
            at: timestamp,
            candidates,
            before,
        });
    }
}
