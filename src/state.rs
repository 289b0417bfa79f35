use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    overlay::PartVisibility,
    pipeline::camera::CameraDevice,
    types::{AnalysisMode, KeypointSet, ScoreUpdate},
};

#[derive(Clone, Debug)]
pub struct AnalysisState {
    pub analyzing: bool,
    pub mode: AnalysisMode,
    pub camera_on: bool,
    pub camera_error: bool,
    pub camera_index: usize,
    pub devices: Vec<CameraDevice>,
    pub keypoints: KeypointSet,
    pub scores: ScoreUpdate,
    pub visibility: PartVisibility,
    /// Number of keypoint payloads applied so far.
    pub keypoint_updates: u64,
}

impl Default for AnalysisState {
    fn default() -> Self {
        Self {
            analyzing: false,
            mode: AnalysisMode::Live,
            camera_on: false,
            camera_error: false,
            camera_index: 0,
            devices: Vec::new(),
            keypoints: KeypointSet::default(),
            scores: ScoreUpdate::default(),
            visibility: PartVisibility::default(),
            keypoint_updates: 0,
        }
    }
}

impl AnalysisState {
    /// The condition under which a live stream session should exist.
    pub fn wants_live_session(&self) -> bool {
        self.analyzing && self.mode == AnalysisMode::Live && self.camera_on
    }
}

/// Shared handle to the application state. Clones observe the same state.
#[derive(Clone, Debug, Default)]
pub struct AnalysisStore {
    inner: Arc<Mutex<AnalysisState>>,
}

impl AnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, AnalysisState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> AnalysisState {
        self.state().clone()
    }

    pub fn set_analyzing(&self, analyzing: bool) {
        self.state().analyzing = analyzing;
    }

    pub fn set_mode(&self, mode: AnalysisMode) {
        let mut state = self.state();
        if state.mode != mode {
            state.mode = mode;
            state.analyzing = false;
        }
    }

    pub fn set_camera_on(&self, on: bool) {
        let mut state = self.state();
        state.camera_on = on;
        if !on {
            state.analyzing = false;
        }
    }

    pub fn set_camera_error(&self, error: bool) {
        self.state().camera_error = error;
    }

    pub fn set_devices(&self, devices: Vec<CameraDevice>) {
        let mut state = self.state();
        if !devices.is_empty() && state.camera_index >= devices.len() {
            state.camera_index = 0;
        }
        state.devices = devices;
    }

    pub fn set_camera_index(&self, index: usize) {
        self.state().camera_index = index;
    }

    pub fn replace_keypoints(&self, keypoints: KeypointSet) {
        let mut state = self.state();
        state.keypoints = keypoints;
        state.keypoint_updates += 1;
    }

    /// Present fields replace their previous value; absent fields are left alone.
    pub fn apply_scores(&self, update: ScoreUpdate) {
        let mut state = self.state();
        if update.posture_score.is_some() {
            state.scores.posture_score = update.posture_score;
        }
        if update.raw_scores_percent.is_some() {
            state.scores.raw_scores_percent = update.raw_scores_percent;
        }
        if update.measurements.is_some() {
            state.scores.measurements = update.measurements;
        }
    }

    pub fn update_visibility<F>(&self, update: F) -> PartVisibility
    where
        F: FnOnce(&mut PartVisibility),
    {
        let mut state = self.state();
        update(&mut state.visibility);
        state.visibility
    }

    pub fn reset_visibility(&self) {
        self.state().visibility = PartVisibility::default();
    }

    pub fn wants_live_session(&self) -> bool {
        self.state().wants_live_session()
    }
}
