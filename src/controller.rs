use std::sync::Arc;

use crate::{
    pipeline::{
        CaptureSource, CaptureState, SessionContext, StreamSession, TokenSource,
        start_stream_session,
    },
    state::AnalysisStore,
    types::AnalysisMode,
};

/// Why a start request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartRefused {
    CameraOff,
    CameraError,
}

/// Drives the capture source and the live session from the store.
///
/// A session exists exactly while `analyzing && live && camera_on` holds, and
/// is created only on the rising edge of that condition. A session that ended
/// on its own (server close, network failure) is not restarted until the
/// condition falls and is entered again.
pub struct LiveAnalysis {
    capture: CaptureSource,
    store: AnalysisStore,
    tokens: Arc<dyn TokenSource>,
    context: SessionContext,
    session: Option<StreamSession>,
    wanted: bool,
    ended_reported: bool,
}

impl LiveAnalysis {
    pub fn new(
        capture: CaptureSource,
        store: AnalysisStore,
        tokens: Arc<dyn TokenSource>,
        context: SessionContext,
    ) -> Self {
        Self {
            capture,
            store,
            tokens,
            context,
            session: None,
            wanted: false,
            ended_reported: false,
        }
    }

    pub fn capture(&self) -> &CaptureSource {
        &self.capture
    }

    pub fn store(&self) -> &AnalysisStore {
        &self.store
    }

    pub fn refresh_devices(&mut self) {
        let devices = self.capture.refresh_devices();
        self.store.set_devices(devices);
    }

    pub fn camera_on(&mut self) -> CaptureState {
        let index = self.store.snapshot().camera_index;
        let state = self.capture.start(Some(index));
        self.store.set_devices(self.capture.devices());
        self.store.set_camera_error(state == CaptureState::Unavailable);
        self.store.set_camera_on(true);
        self.reconcile();
        state
    }

    pub fn camera_off(&mut self) {
        self.capture.stop();
        self.store.set_camera_on(false);
        self.reconcile();
    }

    /// Advances to the next known device and returns its index.
    ///
    /// `None` when fewer than two devices are known. A running camera is
    /// switched over; otherwise only the selection changes.
    pub fn next_camera(&mut self) -> Option<usize> {
        let snapshot = self.store.snapshot();
        if snapshot.devices.len() < 2 {
            return None;
        }
        let next = (snapshot.camera_index + 1) % snapshot.devices.len();
        self.store.set_camera_index(next);

        if snapshot.camera_on {
            let state = self.capture.switch(next);
            self.store.set_devices(self.capture.devices());
            self.store.set_camera_error(state == CaptureState::Unavailable);
        }
        Some(next)
    }

    pub fn start_analysis(&mut self) -> Result<(), StartRefused> {
        let snapshot = self.store.snapshot();
        if snapshot.mode == AnalysisMode::Live {
            if !snapshot.camera_on {
                return Err(StartRefused::CameraOff);
            }
            if snapshot.camera_error {
                return Err(StartRefused::CameraError);
            }
        }
        self.store.set_analyzing(true);
        self.reconcile();
        Ok(())
    }

    pub fn stop_analysis(&mut self) {
        self.store.set_analyzing(false);
        self.reconcile();
    }

    pub fn set_mode(&mut self, mode: AnalysisMode) {
        self.store.set_mode(mode);
        self.reconcile();
    }

    pub fn reconcile(&mut self) {
        let wanted = self.store.wants_live_session();

        if wanted && !self.wanted {
            // a stale session from an earlier entry must not keep sampling
            if let Some(old) = self.session.take() {
                old.stop();
            }
            log::info!("starting live session");
            self.session = Some(start_stream_session(
                self.context.clone(),
                self.tokens.clone(),
                self.capture.sink().clone(),
                self.store.clone(),
            ));
            self.ended_reported = false;
        } else if !wanted {
            if let Some(session) = self.session.take() {
                let stats = session.stats();
                session.stop();
                log::info!(
                    "live session stopped after {} frames ({} messages applied, {} discarded)",
                    stats.frames_sent,
                    stats.messages_applied,
                    stats.messages_discarded
                );
            }
        }

        if let Some(session) = &self.session {
            if session.is_finished() && !self.ended_reported {
                self.ended_reported = true;
                log::warn!("live session ended; stop and start analysis to reconnect");
            }
        }

        self.wanted = wanted;
    }

    pub fn session_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_finished())
    }

    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
        self.wanted = false;
        self.capture.stop();
    }
}

impl Drop for LiveAnalysis {
    fn drop(&mut self) {
        self.shutdown();
    }
}
