use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::{Context, Result, anyhow};
use nokhwa::{
    Buffer, Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};

use super::{
    camera::{CameraBackend, CameraDevice, CaptureThread, MediaStream},
    rgba_converter::{self, PixelLayout},
    sink::VideoSink,
};
use crate::types::Frame;

// Built-in macOS cameras often reject YUYV even when it is advertised.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn format_attempts() -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

fn layout_of(format: FrameFormat) -> PixelLayout {
    match format {
        FrameFormat::NV12 => PixelLayout::Nv12,
        FrameFormat::YUYV => PixelLayout::Yuyv,
        FrameFormat::MJPEG => PixelLayout::Mjpeg,
        FrameFormat::RAWRGB => PixelLayout::Rgb,
        FrameFormat::RAWBGR => PixelLayout::Bgr,
        FrameFormat::GRAY => PixelLayout::Gray,
    }
}

fn decode_buffer(buffer: &Buffer) -> Result<Frame> {
    let resolution = buffer.resolution();
    rgba_converter::decode_to_frame(
        layout_of(buffer.source_frame_format()),
        buffer.buffer(),
        resolution.width_x,
        resolution.height_y,
    )
}

fn open_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;
    for requested in format_attempts() {
        let attempt = Camera::new(index.clone(), requested).and_then(|mut camera| {
            camera.open_stream()?;
            Ok(camera)
        });
        match attempt {
            Ok(camera) => return Ok(camera),
            Err(err) => last_err = Some(anyhow::Error::from(err)),
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("no supported capture format for {index}")))
}

/// Local capture hardware through nokhwa.
#[derive(Debug, Default)]
pub struct NokhwaBackend;

impl CameraBackend for NokhwaBackend {
    fn devices(&self) -> Result<Vec<CameraDevice>> {
        let cameras = query(ApiBackend::Auto).context("camera query failed")?;
        Ok(cameras
            .into_iter()
            .enumerate()
            .map(|(position, info)| CameraDevice {
                index: info.index().as_index().unwrap_or(position as u32),
                label: info.human_name(),
            })
            .collect())
    }

    fn open(&self, device: Option<&CameraDevice>, sink: VideoSink) -> Result<Box<dyn MediaStream>> {
        let index = CameraIndex::Index(device.map(|d| d.index).unwrap_or(0));
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        // the camera handle is not Send on every platform, so it lives on the capture thread
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        let handle = thread::spawn(move || {
            let mut camera = match open_camera(index) {
                Ok(camera) => {
                    let _ = ready_tx.send(Ok(()));
                    camera
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            log::debug!("capture format: {}", camera.camera_format());

            while !stop_flag.load(Ordering::Relaxed) {
                let started = Instant::now();
                let buffer = match camera.frame() {
                    Ok(buffer) => buffer,
                    Err(err) => {
                        log::warn!("frame read failed after {:?}: {err}", started.elapsed());
                        continue;
                    }
                };
                match decode_buffer(&buffer) {
                    Ok(frame) => sink.publish(frame),
                    Err(err) => log::warn!("dropping undecodable frame: {err:#}"),
                }
            }

            if let Err(err) = camera.stop_stream() {
                log::warn!("failed to stop camera stream: {err}");
            }
        });

        let stream = CaptureThread::new(stop, handle);
        ready_rx
            .recv()
            .map_err(|_| anyhow!("capture thread exited before opening the camera"))??;
        Ok(Box::new(stream))
    }
}
