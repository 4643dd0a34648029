//! Normalisation of edited page images.
//!
//! The editor posts the page back as a data URL. Whatever size and colour
//! model it arrives in, the result is a 24-bit RGB PNG of exactly
//! [`TARGET_WIDTH`] x [`TARGET_HEIGHT`] pixels tagged with [`OUTPUT_DPI`].
//!
//! Resizing is nearest-neighbour and does not preserve aspect ratio: an
//! image of the wrong proportions is stretched to fit, and any alpha channel
//! or palette is discarded.

use crate::error::{AppError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use tracing::debug;

/// A4 at 400 DPI
pub const TARGET_WIDTH: u32 = 3306;
pub const TARGET_HEIGHT: u32 = 4678;

pub const OUTPUT_DPI: u32 = 400;

/// Split `data:image/<subtype>;base64,<payload>` at the first comma.
///
/// The header must use the `data:` scheme, declare base64 encoding and name
/// an `image/*` media type. Scheme and encoding are matched without regard
/// to case.
pub fn split_data_url(data_url: &str) -> Result<(&str, &str)> {
    let (header, payload) = data_url.split_once(',').ok_or_else(|| {
        AppError::InvalidPayload("expected a data URL of the form '<header>,<base64 data>'".into())
    })?;

    let media_type = strip_prefix_ignore_case(header, "data:")
        .and_then(|rest| strip_suffix_ignore_case(rest, ";base64"))
        .ok_or_else(|| {
            AppError::InvalidPayload("expected a 'data:<media type>;base64' header".into())
        })?;

    let is_image = media_type
        .parse::<mime::Mime>()
        .map(|m| m.type_() == mime::IMAGE)
        .unwrap_or(false);
    if !is_image {
        return Err(AppError::InvalidPayload(format!(
            "expected an image/* media type, got '{}'",
            media_type
        )));
    }

    Ok((header, payload))
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    let tail = s.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &s[..split])
}

/// Decode a standard base64 payload, ignoring embedded whitespace
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    STANDARD
        .decode(compact)
        .map_err(|e| AppError::InvalidPayload(format!("invalid base64: {}", e)))
}

/// Force RGB8 and the fixed target size
pub fn normalize(decoded: DynamicImage) -> RgbImage {
    let rgb = decoded.into_rgb8();
    if rgb.dimensions() == (TARGET_WIDTH, TARGET_HEIGHT) {
        return rgb;
    }

    debug!(
        "Resizing {}x{} to {}x{}",
        rgb.width(),
        rgb.height(),
        TARGET_WIDTH,
        TARGET_HEIGHT
    );
    imageops::resize(&rgb, TARGET_WIDTH, TARGET_HEIGHT, FilterType::Nearest)
}

fn dpi_to_pixels_per_meter(dpi: u32) -> u32 {
    (f64::from(dpi) / 0.0254).round() as u32
}

/// Encode as PNG with a pHYs chunk carrying `dpi` on both axes
pub fn encode_png_with_dpi(rgb: &RgbImage, dpi: u32) -> Result<Vec<u8>> {
    let encode_err =
        |e: png::EncodingError| AppError::Internal(format!("PNG encoding failed: {}", e));
    let ppm = dpi_to_pixels_per_meter(dpi);

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, rgb.width(), rgb.height());
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));

        let mut writer = encoder.write_header().map_err(encode_err)?;
        writer.write_image_data(rgb.as_raw()).map_err(encode_err)?;
        writer.finish().map_err(encode_err)?;
    }

    Ok(out)
}

/// Data URL in, print-ready PNG bytes out
pub fn normalize_data_url(data_url: &str) -> Result<Vec<u8>> {
    let (_header, payload) = split_data_url(data_url)?;
    let bytes = decode_payload(payload)?;

    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| AppError::InvalidPayload(format!("payload is not a readable image: {}", e)))?;
    debug!("Decoded edited image {}x{}", decoded.width(), decoded.height());

    let normalized = normalize(decoded);
    encode_png_with_dpi(&normalized, OUTPUT_DPI)
}
