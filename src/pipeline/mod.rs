pub mod auth;
pub mod camera;
pub mod clip;
pub mod compositor;
pub mod encoder;
#[cfg(feature = "camera-nokhwa")]
pub mod native;
pub mod protocol;
pub mod rgba_converter;
pub mod sink;
pub mod skeleton;
pub mod stream;

pub use auth::{HttpTokenSource, TokenSource};
pub use camera::{CameraBackend, CameraDevice, CaptureSource, CaptureState};
pub use clip::ClipBackend;
pub use compositor::{Composite, compose, save_preview};
#[cfg(feature = "camera-nokhwa")]
pub use native::NokhwaBackend;
pub use sink::VideoSink;
pub use skeleton::OverlayStyle;
pub use stream::{SessionContext, StreamSession, start_stream_session};
