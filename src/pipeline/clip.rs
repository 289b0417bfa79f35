use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};

use super::{
    camera::{CameraBackend, CameraDevice, CaptureThread, MediaStream},
    sink::VideoSink,
};
use crate::types::Frame;

const CLIP_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Replays a directory of still images as a looping camera feed.
#[derive(Clone, Debug)]
pub struct ClipBackend {
    dir: PathBuf,
    frame_interval: Duration,
}

impl ClipBackend {
    pub fn new(dir: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            dir: dir.into(),
            frame_interval: Duration::from_secs(1) / fps.max(1),
        }
    }

    fn frame_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read clip directory {}", self.dir.display()))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_clip_frame(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            bail!("no jpeg or png frames in {}", self.dir.display());
        }
        Ok(paths)
    }
}

fn is_clip_frame(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CLIP_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(Frame::new(image.into_raw(), width, height))
}

impl CameraBackend for ClipBackend {
    fn devices(&self) -> Result<Vec<CameraDevice>> {
        let name = self
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dir.display().to_string());
        Ok(vec![CameraDevice {
            index: 0,
            label: format!("clip {name}"),
        }])
    }

    fn open(&self, _device: Option<&CameraDevice>, sink: VideoSink) -> Result<Box<dyn MediaStream>> {
        let paths = self.frame_paths()?;
        // decode the first frame up front so a broken clip fails the open
        sink.publish(load_frame(&paths[0])?);
        log::info!("replaying {} clip frames from {}", paths.len(), self.dir.display());

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let interval = self.frame_interval;

        let handle = thread::spawn(move || {
            let mut next = 1 % paths.len();
            let mut deadline = Instant::now() + interval;
            while !stop_flag.load(Ordering::Relaxed) {
                let now = Instant::now();
                if now < deadline {
                    thread::sleep((deadline - now).min(Duration::from_millis(20)));
                    continue;
                }
                deadline += interval;

                match load_frame(&paths[next]) {
                    Ok(frame) => sink.publish(frame),
                    Err(err) => log::warn!("skipping clip frame: {err:#}"),
                }
                next = (next + 1) % paths.len();
            }
        });

        Ok(Box::new(CaptureThread::new(stop, handle)))
    }
}
