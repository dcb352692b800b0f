use crate::observation::Observation;
use clap::ValueEnum;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Biggest bounding box (nearest object framing)
    LargestArea,
    /// Most confident detection
    HighestConfidence,
}

/// Admission filter plus selection policy. Reduces one frame's candidates
/// to at most one target; ties keep the earliest candidate.
#[derive(Clone, Debug)]
pub struct TargetSelector {
    policy: SelectionPolicy,
    min_confidence: f64,
    min_area_frac: f64,
    allowed_class_ids: Vec<u32>,
}

impl TargetSelector {
    pub fn new(
        policy: SelectionPolicy,
        min_confidence: f64,
        min_area_frac: f64,
        allowed_class_ids: Vec<u32>,
    ) -> Self {
        Self {
            policy,
            min_confidence,
            min_area_frac,
            allowed_class_ids,
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn admits(&self, candidate: &Observation) -> bool {
        if !candidate.is_detection() {
            return false;
        }
        if candidate.confidence < self.min_confidence {
            return false;
        }
        if candidate.area_frac() < self.min_area_frac {
            return false;
        }
        self.allowed_class_ids.is_empty() || self.allowed_class_ids.contains(&candidate.class_id)
    }

    pub fn select<'a>(&self, candidates: &'a [Observation]) -> Option<&'a Observation> {
        let mut best: Option<&Observation> = None;
        for candidate in candidates.iter().filter(|c| self.admits(c)) {
            best = match best {
                Some(current) if self.score(candidate) <= self.score(current) => Some(current),
                _ => Some(candidate),
            };
        }
        if best.is_none() && !candidates.is_empty() {
            log::trace!("all {} candidates filtered out", candidates.len());
        }
        best
    }

    fn score(&self, candidate: &Observation) -> f64 {
        match self.policy {
            SelectionPolicy::LargestArea => candidate.bbox.area(),
            SelectionPolicy::HighestConfidence => candidate.confidence,
        }
    }
}
