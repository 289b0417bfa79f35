use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use image::{ImageFormat, RgbaImage};

use super::skeleton::{self, Canvas, OverlayStyle};
use crate::{
    overlay::{OverlayScene, VideoDisplayGeometry},
    types::Frame,
};

/// Container-sized RGBA image: the letterboxed video with the overlay on top.
#[derive(Debug)]
pub struct Composite {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

const BACKDROP: [u8; 4] = [0, 0, 0, 255];

pub fn compose(
    frame: Option<&Frame>,
    geometry: Option<&VideoDisplayGeometry>,
    container: (u32, u32),
    scene: Option<&OverlayScene>,
    style: &OverlayStyle,
) -> Result<Composite> {
    let (width, height) = container;
    let mut rgba = BACKDROP.repeat(width as usize * height as usize);

    if let (Some(frame), Some(geometry)) = (frame, geometry) {
        blit_letterboxed(&mut rgba, container, frame, geometry)?;
    }
    if let Some(scene) = scene {
        skeleton::draw_scene(&mut Canvas::new(&mut rgba, width, height), scene, style);
    }

    Ok(Composite {
        rgba,
        width,
        height,
    })
}

fn blit_letterboxed(
    canvas: &mut [u8],
    container: (u32, u32),
    frame: &Frame,
    geometry: &VideoDisplayGeometry,
) -> Result<()> {
    let (cw, ch) = container;
    if cw == 0 || ch == 0 {
        return Ok(());
    }
    let dst_w = (geometry.rendered_width.round() as u32).clamp(1, cw);
    let dst_h = (geometry.rendered_height.round() as u32).clamp(1, ch);
    let offset_x = (geometry.offset_x.round() as u32).min(cw - dst_w);
    let offset_y = (geometry.offset_y.round() as u32).min(ch - dst_h);

    let src = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )
    .map_err(|err| anyhow!("frame does not match its dimensions: {err:?}"))?;
    let mut dst = fir::images::Image::new(dst_w, dst_h, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(
            &src,
            &mut dst,
            Some(
                &fir::ResizeOptions::new()
                    .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear)),
            ),
        )
        .map_err(|err| anyhow!("letterbox resize failed: {err:?}"))?;

    let resized = dst.into_vec();
    let row_bytes = dst_w as usize * 4;
    for (row, src_row) in resized.chunks_exact(row_bytes).enumerate() {
        let start = ((offset_y as usize + row) * cw as usize + offset_x as usize) * 4;
        canvas[start..start + row_bytes].copy_from_slice(src_row);
    }
    Ok(())
}

/// Writes through a temporary file so readers never observe a partial image.
pub fn save_preview(path: &Path, composite: &Composite) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("unsupported preview format for {}", path.display()))?;
    let image = RgbaImage::from_raw(composite.width, composite.height, composite.rgba.clone())
        .ok_or_else(|| anyhow!("composite buffer does not match its dimensions"))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "preview".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    image::DynamicImage::ImageRgba8(image)
        .to_rgb8()
        .save_with_format(&tmp, format)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to move preview to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::DisplayPoint;

    fn px(c: &Composite, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * c.width + x) * 4) as usize;
        c.rgba[idx..idx + 4].try_into().unwrap()
    }

    fn white(width: u32, height: u32) -> Frame {
        Frame::new(vec![255; (width * height * 4) as usize], width, height)
    }

    #[test]
    fn letterboxes_wide_video_into_tall_box() {
        let frame = white(160, 90);
        let geometry = VideoDisplayGeometry::fit((160, 90), (40, 60)).unwrap();
        let out = compose(
            Some(&frame),
            Some(&geometry),
            (40, 60),
            None,
            &OverlayStyle::default(),
        )
        .unwrap();

        // rendered box is 40x22.5, centered vertically
        assert_eq!(px(&out, 20, 5), BACKDROP);
        assert_eq!(px(&out, 20, 30), [255, 255, 255, 255]);
        assert_eq!(px(&out, 20, 55), BACKDROP);
    }

    #[test]
    fn overlay_is_drawn_without_video() {
        let scene = OverlayScene {
            lines: Vec::new(),
            markers: vec![DisplayPoint { x: 5.0, y: 5.0 }],
        };
        let style = OverlayStyle::default();
        let out = compose(None, None, (10, 10), Some(&scene), &style).unwrap();
        assert_eq!(px(&out, 5, 5), style.marker_color);
    }

    #[test]
    fn preview_is_written_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let out = compose(None, None, (8, 4), None, &OverlayStyle::default()).unwrap();

        save_preview(&path, &out).unwrap();

        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (8, 4));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
