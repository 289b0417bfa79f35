use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::{ExtendedColorType, ImageResult, codecs::jpeg::JpegEncoder};
use rayon::prelude::*;

use super::protocol::OutboundFrame;
use crate::types::Frame;

pub fn encode_jpeg(frame: &Frame, quality: u8) -> ImageResult<Vec<u8>> {
    let mut rgb = vec![0u8; frame.width as usize * frame.height as usize * 3];
    rgb.par_chunks_exact_mut(3)
        .zip(frame.rgba.par_chunks_exact(4))
        .for_each(|(dst, src)| dst.copy_from_slice(&src[..3]));

    let mut jpeg = Vec::with_capacity(rgb.len() / 8);
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode(
        &rgb,
        frame.width,
        frame.height,
        ExtendedColorType::Rgb8,
    )?;
    Ok(jpeg)
}

/// Serialized text message for one sampled frame.
pub fn frame_message(frame: &Frame, quality: u8) -> ImageResult<String> {
    let jpeg = encode_jpeg(frame, quality)?;
    let image = BASE64_STANDARD.encode(jpeg);
    // a struct holding one string always serializes
    Ok(serde_json::to_string(&OutboundFrame { image: &image }).unwrap_or_default())
}
