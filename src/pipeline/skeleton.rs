//! Rasterizes an overlay scene onto an RGBA canvas.

use crate::overlay::{DisplayPoint, OverlayScene};

#[derive(Clone, Copy, Debug)]
pub struct OverlayStyle {
    pub line_color: [u8; 4],
    pub marker_color: [u8; 4],
    pub line_thickness: i32,
    pub marker_radius: i32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            line_color: [0, 255, 0, 255],
            marker_color: [255, 0, 0, 255],
            line_thickness: 3,
            marker_radius: 4,
        }
    }
}

pub struct Canvas<'a> {
    pixels: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(pixels: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }

    fn put(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        if let Some(px) = self.pixels.get_mut(idx..idx + 4) {
            px.copy_from_slice(&color);
        }
    }

    /// Bresenham walk stamping a diamond brush of `thickness` at every step.
    /// The segment is clipped to the canvas (plus the brush margin) first, so
    /// the walk never leaves the pixel grid.
    pub fn line(&mut self, from: DisplayPoint, to: DisplayPoint, color: [u8; 4], thickness: i32) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let brush = (thickness.max(1) - 1) / 2;
        let margin = f64::from(brush);
        let lo = (-margin, -margin);
        let hi = (
            f64::from(self.width - 1) + margin,
            f64::from(self.height - 1) + margin,
        );
        let Some((from, to)) = clip_segment(from, to, lo, hi) else {
            return;
        };

        let (mut x, mut y) = (from.x.round() as i32, from.y.round() as i32);
        let (x1, y1) = (to.x.round() as i32, to.y.round() as i32);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            for ox in -brush..=brush {
                let span = brush - ox.abs();
                for oy in -span..=span {
                    self.put(x + ox, y + oy, color);
                }
            }
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn disc(&mut self, center: DisplayPoint, radius: i32, color: [u8; 4]) {
        let reach = radius.max(0) as f32;
        if center.x < -reach
            || center.y < -reach
            || center.x > self.width as f32 + reach
            || center.y > self.height as f32 + reach
        {
            return;
        }
        let (cx, cy) = (center.x.round() as i32, center.y.round() as i32);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }
}

/// Liang-Barsky clip of a segment to the box `lo..=hi`.
///
/// Coordinates that land on a box edge are snapped to it exactly, so very
/// distant endpoints do not lose precision at the visible part.
fn clip_segment(
    from: DisplayPoint,
    to: DisplayPoint,
    lo: (f64, f64),
    hi: (f64, f64),
) -> Option<(DisplayPoint, DisplayPoint)> {
    let (x0, y0) = (f64::from(from.x), f64::from(from.y));
    let (dx, dy) = (f64::from(to.x) - x0, f64::from(to.y) - y0);

    // (t, snapped edge) where the edge is (is_x_axis, value)
    let mut enter: (f64, Option<(bool, f64)>) = (0.0, None);
    let mut leave: (f64, Option<(bool, f64)>) = (1.0, None);
    let edges = [
        (-dx, x0 - lo.0, (true, lo.0)),
        (dx, hi.0 - x0, (true, hi.0)),
        (-dy, y0 - lo.1, (false, lo.1)),
        (dy, hi.1 - y0, (false, hi.1)),
    ];
    for (p, q, edge) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > leave.0 {
                return None;
            }
            if t > enter.0 {
                enter = (t, Some(edge));
            }
        } else {
            if t < enter.0 {
                return None;
            }
            if t < leave.0 {
                leave = (t, Some(edge));
            }
        }
    }

    let at = |(t, edge): (f64, Option<(bool, f64)>)| {
        let (mut x, mut y) = (x0 + t * dx, y0 + t * dy);
        match edge {
            Some((true, value)) => x = value,
            Some((false, value)) => y = value,
            None => {}
        }
        DisplayPoint {
            x: x.clamp(lo.0, hi.0) as f32,
            y: y.clamp(lo.1, hi.1) as f32,
        }
    };
    Some((at(enter), at(leave)))
}

/// Edges first, then markers on top.
pub fn draw_scene(canvas: &mut Canvas<'_>, scene: &OverlayScene, style: &OverlayStyle) {
    for &(a, b) in &scene.lines {
        canvas.line(a, b, style.line_color, style.line_thickness);
    }
    for &point in &scene.markers {
        canvas.disc(point, style.marker_radius, style.marker_color);
    }
}
