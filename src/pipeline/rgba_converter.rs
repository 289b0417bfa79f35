//! Raw capture buffers to RGBA frames.

use anyhow::{Result, anyhow, bail};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::Frame;

/// Pixel layouts a capture device can hand us.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Nv12,
    Yuyv,
    Mjpeg,
    Rgb,
    Bgr,
    Gray,
}

impl PixelLayout {
    /// Minimum payload size for a `width x height` buffer; `None` for compressed layouts.
    fn required_len(self, width: u32, height: u32) -> Option<usize> {
        let pixels = width as usize * height as usize;
        match self {
            PixelLayout::Nv12 => Some(pixels + pixels / 2),
            PixelLayout::Yuyv => Some(pixels * 2),
            PixelLayout::Rgb | PixelLayout::Bgr => Some(pixels * 3),
            PixelLayout::Gray => Some(pixels),
            PixelLayout::Mjpeg => None,
        }
    }
}

pub fn decode_to_frame(layout: PixelLayout, data: &[u8], width: u32, height: u32) -> Result<Frame> {
    if let Some(required) = layout.required_len(width, height) {
        if data.len() < required {
            bail!(
                "{layout:?} buffer too small for {width}x{height}: got {}, expected {required}",
                data.len()
            );
        }
    }

    let frame = match layout {
        PixelLayout::Nv12 => Frame::new(nv12(data, width, height)?, width, height),
        PixelLayout::Yuyv => Frame::new(yuyv(data, width, height)?, width, height),
        PixelLayout::Rgb => Frame::new(expand_rgb(data, width, height, false), width, height),
        PixelLayout::Bgr => Frame::new(expand_rgb(data, width, height, true), width, height),
        PixelLayout::Gray => Frame::new(expand_gray(data, width, height), width, height),
        // the jpeg header is authoritative over the negotiated resolution
        PixelLayout::Mjpeg => mjpeg(data)?,
    };
    Ok(frame)
}

fn rgba_buffer(width: u32, height: u32) -> Vec<u8> {
    vec![0u8; width as usize * height as usize * 4]
}

fn nv12(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let luma = width as usize * height as usize;
    let image = YuvBiPlanarImage {
        y_plane: &data[..luma],
        y_stride: width,
        uv_plane: &data[luma..luma + luma / 2],
        uv_stride: width,
        width,
        height,
    };

    let mut rgba = rgba_buffer(width, height);
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("nv12 conversion failed: {err:?}"))?;
    Ok(rgba)
}

fn yuyv(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    let mut rgba = rgba_buffer(width, height);
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("yuyv conversion failed: {err:?}"))?;
    Ok(rgba)
}

fn mjpeg(data: &[u8]) -> Result<Frame> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("mjpeg decode failed: {err:?}"))?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("mjpeg decoder returned no header info"))?;

    let (width, height) = u32::try_from(info.width)
        .and_then(|w| u32::try_from(info.height).map(|h| (w, h)))
        .map_err(|_| anyhow!("mjpeg dimensions out of range"))?;
    let expected = width as usize * height as usize * 4;
    if rgba.len() < expected {
        bail!(
            "mjpeg decode produced {} bytes, expected {expected}",
            rgba.len()
        );
    }
    Ok(Frame::new(rgba, width, height))
}

fn expand_rgb(data: &[u8], width: u32, height: u32, bgr: bool) -> Vec<u8> {
    let mut rgba = rgba_buffer(width, height);
    let (r, b) = if bgr { (2, 0) } else { (0, 2) };
    rgba.par_chunks_mut(4)
        .zip(data.par_chunks_exact(3))
        .for_each(|(dst, src)| {
            dst[0] = src[r];
            dst[1] = src[1];
            dst[2] = src[b];
            dst[3] = 255;
        });
    rgba
}

fn expand_gray(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut rgba = rgba_buffer(width, height);
    rgba.par_chunks_mut(4)
        .zip(data.par_iter())
        .for_each(|(dst, &luma)| {
            dst[..3].fill(luma);
            dst[3] = 255;
        });
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_swaps_channels() {
        let frame = decode_to_frame(PixelLayout::Bgr, &[1, 2, 3, 4, 5, 6], 2, 1).unwrap();
        assert_eq!(frame.rgba, vec![3, 2, 1, 255, 6, 5, 4, 255]);

        let frame = decode_to_frame(PixelLayout::Rgb, &[1, 2, 3], 1, 1).unwrap();
        assert_eq!(frame.rgba, vec![1, 2, 3, 255]);
    }

    #[test]
    fn gray_replicates_luma() {
        let frame = decode_to_frame(PixelLayout::Gray, &[9, 200], 2, 1).unwrap();
        assert_eq!(frame.rgba, vec![9, 9, 9, 255, 200, 200, 200, 255]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(decode_to_frame(PixelLayout::Yuyv, &[0; 7], 2, 2).is_err());
        assert!(decode_to_frame(PixelLayout::Nv12, &[0; 5], 2, 2).is_err());
        assert!(decode_to_frame(PixelLayout::Mjpeg, &[0; 16], 2, 2).is_err());
    }

    #[test]
    fn yuyv_produces_full_frame() {
        // mid-grey: Y=128, U=V=128
        let frame = decode_to_frame(PixelLayout::Yuyv, &[128; 2 * 2 * 2], 2, 2).unwrap();
        assert_eq!(frame.dimensions(), (2, 2));
        assert_eq!(frame.rgba.len(), 16);
        assert!(frame.rgba.chunks(4).all(|px| px[3] == 255));
    }

    #[test]
    fn mjpeg_uses_header_dimensions() {
        let image = image::RgbImage::from_pixel(6, 4, image::Rgb([200, 10, 10]));
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90)
            .encode_image(&image)
            .unwrap();

        let frame = decode_to_frame(PixelLayout::Mjpeg, &jpeg, 1920, 1080).unwrap();
        assert_eq!(frame.dimensions(), (6, 4));
        assert!(frame.rgba[0] > 150);
    }
}
