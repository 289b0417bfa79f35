//! Aspect-fit ("object-contain") placement of a video inside a display box.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayPoint {
    pub x: f32,
    pub y: f32,
}

/// Where the video's pixels actually land inside the container.
///
/// `rendered_width / rendered_height` equals the intrinsic aspect ratio and the
/// rendered box is centered, so at most one of the offsets is non-zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoDisplayGeometry {
    pub intrinsic_width: f32,
    pub intrinsic_height: f32,
    pub rendered_width: f32,
    pub rendered_height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl VideoDisplayGeometry {
    /// Returns `None` while either size is degenerate, e.g. before video metadata arrives.
    pub fn fit(intrinsic: (u32, u32), container: (u32, u32)) -> Option<Self> {
        let (iw, ih) = (intrinsic.0 as f32, intrinsic.1 as f32);
        let (cw, ch) = (container.0 as f32, container.1 as f32);
        if iw <= 0.0 || ih <= 0.0 || cw <= 0.0 || ch <= 0.0 {
            return None;
        }

        let video_aspect = iw / ih;
        let display_aspect = cw / ch;

        let (rendered_width, rendered_height, offset_x, offset_y) = if video_aspect > display_aspect
        {
            let rh = cw / video_aspect;
            (cw, rh, 0.0, (ch - rh) / 2.0)
        } else {
            let rw = ch * video_aspect;
            (rw, ch, (cw - rw) / 2.0, 0.0)
        };

        Some(Self {
            intrinsic_width: iw,
            intrinsic_height: ih,
            rendered_width,
            rendered_height,
            offset_x,
            offset_y,
        })
    }

    pub fn map(&self, px: f32, py: f32) -> DisplayPoint {
        DisplayPoint {
            x: (px / self.intrinsic_width) * self.rendered_width + self.offset_x,
            y: (py / self.intrinsic_height) * self.rendered_height + self.offset_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    #[test]
    fn wide_container_letterboxes_left_and_right() {
        let g = VideoDisplayGeometry::fit((1920, 1080), (800, 300)).unwrap();

        assert!((g.rendered_height - 300.0).abs() < EPS);
        assert!((g.rendered_width - 533.333).abs() < EPS);
        assert!((g.offset_x - 133.333).abs() < EPS);
        assert_eq!(g.offset_y, 0.0);

        let center = g.map(960.0, 540.0);
        assert!((center.x - 400.0).abs() < EPS);
        assert!((center.y - 150.0).abs() < EPS);
    }

    #[test]
    fn tall_container_letterboxes_top_and_bottom() {
        let g = VideoDisplayGeometry::fit((1280, 720), (400, 600)).unwrap();

        assert_eq!(g.rendered_width, 400.0);
        assert!((g.rendered_height - 225.0).abs() < EPS);
        assert_eq!(g.offset_x, 0.0);
        assert!((g.offset_y - 187.5).abs() < EPS);

        let origin = g.map(0.0, 0.0);
        assert_eq!(origin.x, 0.0);
        assert!((origin.y - 187.5).abs() < EPS);
    }

    #[test]
    fn aspect_is_preserved_and_one_offset_is_zero() {
        let videos = [(1920, 1080), (640, 480), (1080, 1920), (333, 333), (1, 7)];
        let containers = [(800, 300), (300, 800), (1024, 1024), (1, 1), (4096, 17)];

        for &video in &videos {
            for &container in &containers {
                let g = VideoDisplayGeometry::fit(video, container).unwrap();
                let intrinsic = video.0 as f32 / video.1 as f32;
                let rendered = g.rendered_width / g.rendered_height;
                assert!(
                    ((rendered - intrinsic) / intrinsic).abs() < 1e-4,
                    "{video:?} in {container:?}"
                );
                assert!(g.offset_x == 0.0 || g.offset_y == 0.0, "{video:?} in {container:?}");
                assert!(g.rendered_width <= container.0 as f32 + EPS);
                assert!(g.rendered_height <= container.1 as f32 + EPS);
                assert!(
                    (g.offset_x * 2.0 + g.rendered_width - container.0 as f32).abs() < EPS
                );
                assert!(
                    (g.offset_y * 2.0 + g.rendered_height - container.1 as f32).abs() < EPS
                );
            }
        }
    }

    #[test]
    fn unknown_dimensions_have_no_geometry() {
        assert!(VideoDisplayGeometry::fit((0, 0), (800, 600)).is_none());
        assert!(VideoDisplayGeometry::fit((640, 480), (0, 600)).is_none());
    }
}
