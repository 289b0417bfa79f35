use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::Result;

use super::sink::VideoSink;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDevice {
    pub index: u32,
    pub label: String,
}

/// An acquired video input. Stopping releases every track and the device.
pub trait MediaStream: Send {
    fn stop(&mut self);
    fn is_live(&self) -> bool;
}

pub trait CameraBackend: Send + Sync + 'static {
    fn devices(&self) -> Result<Vec<CameraDevice>>;

    /// Opens `device` (or the default input) and starts publishing frames into `sink`.
    fn open(&self, device: Option<&CameraDevice>, sink: VideoSink) -> Result<Box<dyn MediaStream>>;
}

/// Capture worker shared by the backends: a stop flag plus the owning thread.
#[derive(Debug)]
pub struct CaptureThread {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CaptureThread {
    pub fn new(stop: Arc<AtomicBool>, handle: thread::JoinHandle<()>) -> Self {
        Self {
            stop,
            handle: Some(handle),
        }
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl MediaStream for CaptureThread {
    fn stop(&mut self) {
        self.shutdown();
    }

    fn is_live(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Live { device: Option<CameraDevice> },
    Unavailable,
}

struct Lifecycle {
    active: Option<Box<dyn MediaStream>>,
    devices: Vec<CameraDevice>,
    current: Option<usize>,
    error: bool,
}

/// Owns the attached media stream and serializes acquire/release.
///
/// Every lifecycle operation holds one lock for its whole duration, so
/// overlapping `start`/`switch`/`stop` calls queue instead of racing for the
/// hardware, and a previous stream is always fully stopped before the next
/// device is opened.
pub struct CaptureSource {
    backend: Arc<dyn CameraBackend>,
    sink: VideoSink,
    grace: Duration,
    lifecycle: Mutex<Lifecycle>,
}

impl CaptureSource {
    pub fn new(backend: Arc<dyn CameraBackend>, sink: VideoSink, grace: Duration) -> Self {
        Self {
            backend,
            sink,
            grace,
            lifecycle: Mutex::new(Lifecycle {
                active: None,
                devices: Vec::new(),
                current: None,
                error: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sink(&self) -> &VideoSink {
        &self.sink
    }

    pub fn start(&self, selector: Option<usize>) -> CaptureState {
        let mut life = self.lock();
        self.start_locked(&mut life, selector)
    }

    /// Replaces the running stream with device `index`.
    pub fn switch(&self, index: usize) -> CaptureState {
        let mut life = self.lock();
        log::info!("switching camera to device #{index}");
        self.start_locked(&mut life, Some(index))
    }

    pub fn stop(&self) {
        let mut life = self.lock();
        if self.release(&mut life) {
            log::info!("camera stopped");
        }
    }

    fn start_locked(&self, life: &mut Lifecycle, selector: Option<usize>) -> CaptureState {
        if self.release(life) {
            // give the driver a moment to let go of the previous device
            thread::sleep(self.grace);
        }

        let device = selector.and_then(|idx| life.devices.get(idx).cloned());
        if let (Some(idx), None) = (selector, &device) {
            if !life.devices.is_empty() {
                log::warn!("camera #{idx} is not in the device list, using the default input");
            }
        }

        match self.backend.open(device.as_ref(), self.sink.clone()) {
            Ok(stream) => {
                life.active = Some(stream);
                life.current = selector;
                life.error = false;
                log::info!(
                    "camera started: {}",
                    device
                        .as_ref()
                        .map(|d| d.label.as_str())
                        .unwrap_or("default input")
                );
                // labels and ids are only reliable once a device has been granted
                Self::refresh_locked(self.backend.as_ref(), life);
                CaptureState::Live { device }
            }
            Err(err) => {
                life.error = true;
                log::error!("failed to start camera: {err:#}");
                CaptureState::Unavailable
            }
        }
    }

    /// Detaches the sink and stops the attached stream. Returns whether one was attached.
    fn release(&self, life: &mut Lifecycle) -> bool {
        let Some(mut stream) = life.active.take() else {
            return false;
        };
        stream.stop();
        self.sink.detach();
        true
    }

    pub fn refresh_devices(&self) -> Vec<CameraDevice> {
        let mut life = self.lock();
        Self::refresh_locked(self.backend.as_ref(), &mut life);
        life.devices.clone()
    }

    fn refresh_locked(backend: &dyn CameraBackend, life: &mut Lifecycle) {
        match backend.devices() {
            Ok(devices) => life.devices = devices,
            Err(err) => log::warn!("failed to enumerate cameras: {err:#}"),
        }
    }

    pub fn devices(&self) -> Vec<CameraDevice> {
        self.lock().devices.clone()
    }

    pub fn has_error(&self) -> bool {
        self.lock().error
    }

    pub fn is_live(&self) -> bool {
        self.lock().active.as_ref().is_some_and(|s| s.is_live())
    }

    pub fn current_index(&self) -> Option<usize> {
        self.lock().current
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        let mut life = self.lock();
        if let Some(mut stream) = life.active.take() {
            stream.stop();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeBackend;
    use super::*;

    fn source(backend: &Arc<FakeBackend>) -> CaptureSource {
        CaptureSource::new(backend.clone(), VideoSink::new(), Duration::from_millis(1))
    }

    #[test]
    fn start_attaches_and_stop_releases() {
        let backend = Arc::new(FakeBackend::with_devices(2));
        let capture = source(&backend);

        let state = capture.start(None);
        assert_eq!(state, CaptureState::Live { device: None });
        assert!(capture.sink().is_attached());
        assert!(capture.is_live());
        assert_eq!(capture.devices().len(), 2);

        capture.stop();
        capture.stop();
        assert!(!capture.sink().is_attached());
        assert_eq!(backend.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn restarting_stops_previous_stream_first() {
        let backend = Arc::new(FakeBackend::with_devices(2));
        let capture = source(&backend);

        for i in 0..5 {
            capture.start(Some(i % 2));
        }

        assert_eq!(backend.opens.load(Ordering::SeqCst), 5);
        assert_eq!(backend.overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(backend.live.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_switches_never_overlap() {
        let backend = Arc::new(FakeBackend {
            open_delay: Duration::from_millis(5),
            ..FakeBackend::with_devices(3)
        });
        let capture = Arc::new(source(&backend));
        capture.refresh_devices();

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let capture = capture.clone();
                thread::spawn(move || {
                    capture.switch(i % 3);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(backend.max_live.load(Ordering::SeqCst), 1);
        assert_eq!(backend.overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(backend.live.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_sets_error_flag_without_attaching() {
        let backend = Arc::new(FakeBackend::with_devices(1));
        backend.fail.store(true, Ordering::SeqCst);
        let capture = source(&backend);

        assert_eq!(capture.start(Some(0)), CaptureState::Unavailable);
        assert!(capture.has_error());
        assert!(!capture.sink().is_attached());

        backend.fail.store(false, Ordering::SeqCst);
        assert!(matches!(capture.start(Some(0)), CaptureState::Live { .. }));
        assert!(!capture.has_error());
    }

    #[test]
    fn device_list_refreshes_after_grant() {
        let backend = Arc::new(FakeBackend::with_devices(1));
        let capture = source(&backend);
        assert!(capture.devices().is_empty());

        capture.start(None);
        assert_eq!(capture.devices().len(), 1);

        backend.devices.lock().unwrap().push(CameraDevice {
            index: 7,
            label: "usb".to_string(),
        });
        capture.switch(0);
        assert_eq!(capture.devices().len(), 2);
        assert_eq!(capture.current_index(), Some(0));
    }
}
