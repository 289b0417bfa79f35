use super::{
    geometry::{DisplayPoint, VideoDisplayGeometry},
    topology::SkeletonSchema,
    visibility::{EnabledIndices, PartVisibility},
};
use crate::types::KeypointSet;

/// Display-space primitives for one overlay redraw.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayScene {
    pub lines: Vec<(DisplayPoint, DisplayPoint)>,
    pub markers: Vec<DisplayPoint>,
}

impl OverlayScene {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.markers.is_empty()
    }
}

/// Builds the scene for `keypoints`: an edge is kept only when both endpoints
/// were detected with finite coordinates and both indices are enabled.
pub fn build_scene(
    keypoints: &KeypointSet,
    geometry: &VideoDisplayGeometry,
    edges: &[(usize, usize)],
    enabled: &EnabledIndices,
) -> OverlayScene {
    let visible = |idx: usize| {
        if !enabled.contains(idx) {
            return None;
        }
        keypoints.get(idx).map(|kp| geometry.map(kp.x, kp.y))
    };

    let lines = edges
        .iter()
        .filter_map(|&(a, b)| Some((visible(a)?, visible(b)?)))
        .collect();

    let markers = keypoints
        .detected()
        .filter(|kp| enabled.contains(kp.index))
        .map(|kp| geometry.map(kp.x, kp.y))
        .collect();

    OverlayScene { lines, markers }
}

/// Keeps the overlay aligned with the on-screen video box.
///
/// Geometry is derived state: it is recomputed whenever the video's intrinsic
/// size, the container size, or the analysis/keypoint-count signal changes.
#[derive(Debug)]
pub struct OverlayRenderer {
    schema: SkeletonSchema,
    container: (u32, u32),
    intrinsic: Option<(u32, u32)>,
    geometry: Option<VideoDisplayGeometry>,
    analysis_signal: (bool, usize),
    recomputes: u64,
}

impl OverlayRenderer {
    pub fn new(schema: SkeletonSchema, container: (u32, u32)) -> Self {
        Self {
            schema,
            container,
            intrinsic: None,
            geometry: None,
            analysis_signal: (false, 0),
            recomputes: 0,
        }
    }

    pub fn schema(&self) -> &SkeletonSchema {
        &self.schema
    }

    pub fn container(&self) -> (u32, u32) {
        self.container
    }

    pub fn geometry(&self) -> Option<&VideoDisplayGeometry> {
        self.geometry.as_ref()
    }

    /// Video metadata became known or changed; `None` means no video attached.
    pub fn on_metadata(&mut self, intrinsic: Option<(u32, u32)>) {
        if self.intrinsic != intrinsic {
            self.intrinsic = intrinsic;
            self.recompute();
        }
    }

    pub fn on_resize(&mut self, container: (u32, u32)) {
        if self.container != container {
            self.container = container;
            self.recompute();
        }
    }

    /// Covers stream swaps that never produce a metadata change.
    pub fn on_analysis_changed(&mut self, analyzing: bool, keypoint_count: usize) {
        let signal = (analyzing, keypoint_count);
        if self.analysis_signal != signal {
            self.analysis_signal = signal;
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        self.geometry = self
            .intrinsic
            .and_then(|intrinsic| VideoDisplayGeometry::fit(intrinsic, self.container));
        self.recomputes += 1;
        log::debug!(
            "overlay geometry #{} (container {:?}, video {:?}): {:?}",
            self.recomputes,
            self.container,
            self.intrinsic,
            self.geometry
        );
    }

    /// `None` when nothing should be drawn: analysis inactive or video size unknown.
    pub fn scene(
        &self,
        analyzing: bool,
        keypoints: &KeypointSet,
        visibility: &PartVisibility,
    ) -> Option<OverlayScene> {
        if !analyzing {
            return None;
        }
        let geometry = self.geometry.as_ref()?;
        let enabled = visibility.enabled_indices(&self.schema);
        Some(build_scene(keypoints, geometry, &self.schema.edges, &enabled))
    }

    #[cfg(test)]
    fn recompute_count(&self) -> u64 {
        self.recomputes
    }
}
