use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::Frame;

/// Latest-frame slot shared between a capture thread and its readers.
///
/// Plays the role of a mounted video element: readers always see the newest
/// frame, and an empty slot means no video is attached.
#[derive(Clone, Debug, Default)]
pub struct VideoSink {
    inner: Arc<Mutex<SinkSlot>>,
}

#[derive(Debug, Default)]
struct SinkSlot {
    frame: Option<Arc<Frame>>,
    published: u64,
}

impl VideoSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, SinkSlot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn publish(&self, frame: Frame) {
        let mut slot = self.slot();
        slot.frame = Some(Arc::new(frame));
        slot.published += 1;
    }

    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot().frame.clone()
    }

    /// Intrinsic resolution of the attached video, if any.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.slot().frame.as_ref().map(|f| f.dimensions())
    }

    pub fn detach(&self) {
        self.slot().frame = None;
    }

    pub fn is_attached(&self) -> bool {
        self.slot().frame.is_some()
    }

    pub fn published(&self) -> u64 {
        self.slot().published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_see_newest_frame_until_detached() {
        let sink = VideoSink::new();
        assert!(sink.latest().is_none());

        sink.publish(Frame::new(vec![0; 16], 2, 2));
        sink.publish(Frame::new(vec![0; 4 * 6], 3, 2));
        assert_eq!(sink.dimensions(), Some((3, 2)));
        assert_eq!(sink.published(), 2);

        let reader = sink.clone();
        reader.detach();
        assert!(!sink.is_attached());
        assert!(sink.dimensions().is_none());
    }
}
