use std::{collections::BTreeMap, time::Instant};

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A single landmark in source-video pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn has_position(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Dense, positionally indexed keypoints for one inference result.
///
/// `None` entries are landmarks the service has not detected this frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeypointSet {
    points: Vec<Option<Keypoint>>,
}

impl KeypointSet {
    pub fn new(points: Vec<Option<Keypoint>>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the keypoint at `index` only if it was detected with usable coordinates.
    pub fn get(&self, index: usize) -> Option<&Keypoint> {
        self.points
            .get(index)
            .and_then(Option::as_ref)
            .filter(|kp| kp.has_position())
    }

    pub fn detected(&self) -> impl Iterator<Item = &Keypoint> {
        self.points.iter().flatten().filter(|kp| kp.has_position())
    }
}

/// Score payload fields; every present field replaces the previous value wholesale.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoreUpdate {
    pub posture_score: Option<serde_json::Value>,
    pub raw_scores_percent: Option<BTreeMap<String, f64>>,
    pub measurements: Option<BTreeMap<String, f64>>,
}

impl ScoreUpdate {
    pub fn is_empty(&self) -> bool {
        self.posture_score.is_none()
            && self.raw_scores_percent.is_none()
            && self.measurements.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisMode {
    Live,
    Upload,
}

impl AnalysisMode {
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisMode::Live => "live",
            AnalysisMode::Upload => "upload",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kp(index: usize, x: f32, y: f32) -> Option<Keypoint> {
        Some(Keypoint {
            index,
            x,
            y,
            confidence: 0.9,
        })
    }

    #[test]
    fn get_skips_missing_and_non_finite_points() {
        let set = KeypointSet::new(vec![kp(0, 1.0, 2.0), None, kp(2, f32::NAN, 4.0)]);

        assert!(set.get(0).is_some());
        assert!(set.get(1).is_none());
        assert!(set.get(2).is_none());
        assert!(set.get(3).is_none());
        assert_eq!(set.detected().count(), 1);
        assert_eq!(set.len(), 3);
    }
}
