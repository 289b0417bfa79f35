pub mod geometry;
pub mod renderer;
pub mod topology;
pub mod visibility;

pub use geometry::{DisplayPoint, VideoDisplayGeometry};
pub use renderer::{OverlayRenderer, OverlayScene};
pub use topology::SkeletonSchema;
pub use visibility::{BodyPart, PartVisibility};
