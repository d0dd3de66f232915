//! Resolution and description tags embedded in image files.
//!
//! EXIF/TIFF tags are read from every container that carries them. When
//! they hold no resolution, PNG files fall back to their `pHYs` chunk and
//! JPEG files to the JFIF density in `APP0`.

use std::io::Cursor;

use exif::{In, Reader, Tag, Value};

use super::ImageFormat;
use crate::image::Resolution;

/// `ResolutionUnit` values. An absent tag means inches.
const UNIT_NONE: u32 = 1;
const UNIT_CENTIMETRE: u32 = 3;

/// JFIF density units.
const JFIF_PER_INCH: u8 = 1;
const JFIF_PER_CENTIMETRE: u8 = 2;

const CM_PER_INCH: f64 = 2.54;
pub(crate) const METRES_PER_INCH: f64 = 0.0254;

/// Metadata recovered from a file's embedded tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedMetadata {
    /// Pixels per inch; unknown when the tags are absent.
    pub resolution: Resolution,
    /// `ImageDescription` text, if any.
    pub description: Option<String>,
}

/// Extract resolution and description from a file's embedded tags.
///
/// Files without tags, or with unparseable tags, yield the default
/// (unknown resolution, no description). PNM carries no metadata.
///
/// # Arguments
///
/// * `bytes` - Raw file bytes
/// * `format` - Container format of `bytes`
pub fn read_metadata(bytes: &[u8], format: ImageFormat) -> EmbeddedMetadata {
    if format == ImageFormat::Pnm {
        return EmbeddedMetadata::default();
    }

    let mut metadata = read_exif(bytes);
    if !metadata.resolution.is_known() {
        metadata.resolution = match format {
            ImageFormat::Png => png_resolution(bytes),
            ImageFormat::Jpeg => jfif_resolution(bytes),
            ImageFormat::Tiff | ImageFormat::Pnm => Resolution::UNKNOWN,
        };
    }
    metadata
}

fn read_exif(bytes: &[u8]) -> EmbeddedMetadata {
    let mut cursor = Cursor::new(bytes);
    let Ok(exif) = Reader::new().read_from_container(&mut cursor) else {
        return EmbeddedMetadata::default();
    };

    let per_inch = match exif
        .get_field(Tag::ResolutionUnit, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
    {
        // Aspect ratio only, no physical size
        Some(UNIT_NONE) => 0.0,
        Some(UNIT_CENTIMETRE) => CM_PER_INCH,
        _ => 1.0,
    };

    let axis = |tag: Tag| -> f64 {
        exif.get_field(tag, In::PRIMARY)
            .and_then(|field| match &field.value {
                Value::Rational(values) => values.first().map(|r| r.to_f64()),
                Value::Short(values) => values.first().map(|&v| v as f64),
                Value::Long(values) => values.first().map(|&v| v as f64),
                _ => None,
            })
            .unwrap_or(0.0)
    };

    let resolution = to_resolution(axis(Tag::XResolution), axis(Tag::YResolution), per_inch);

    let description = exif
        .get_field(Tag::ImageDescription, In::PRIMARY)
        .and_then(|field| match &field.value {
            Value::Ascii(strings) => strings.first().map(|s| String::from_utf8_lossy(s).trim().to_string()),
            _ => None,
        })
        .filter(|text| !text.is_empty());

    EmbeddedMetadata {
        resolution,
        description,
    }
}

/// Resolution from the `pHYs` chunk, which stores pixels per metre.
fn png_resolution(bytes: &[u8]) -> Resolution {
    let Ok(reader) = png::Decoder::new(Cursor::new(bytes)).read_info() else {
        return Resolution::UNKNOWN;
    };
    match reader.info().pixel_dims {
        Some(png::PixelDimensions {
            xppu,
            yppu,
            unit: png::Unit::Meter,
        }) => to_resolution(xppu as f64, yppu as f64, METRES_PER_INCH),
        _ => Resolution::UNKNOWN,
    }
}

/// Resolution from a JFIF `APP0` segment directly after the SOI marker.
fn jfif_resolution(bytes: &[u8]) -> Resolution {
    // SOI, APP0 marker, length, "JFIF\0", version, units, Xdensity, Ydensity
    let Some(header) = bytes.get(..18) else {
        return Resolution::UNKNOWN;
    };
    if header[..4] != [0xFF, 0xD8, 0xFF, 0xE0] || &header[6..11] != b"JFIF\0" {
        return Resolution::UNKNOWN;
    }

    let per_inch = match header[13] {
        JFIF_PER_INCH => 1.0,
        JFIF_PER_CENTIMETRE => CM_PER_INCH,
        _ => return Resolution::UNKNOWN,
    };
    let x = u16::from_be_bytes([header[14], header[15]]);
    let y = u16::from_be_bytes([header[16], header[17]]);
    to_resolution(x as f64, y as f64, per_inch)
}

/// Convert densities in some unit to pixels per inch. Unknown unless both
/// axes are positive.
fn to_resolution(x: f64, y: f64, per_inch: f64) -> Resolution {
    let dpi = |value: f64| {
        let dpi = (value * per_inch).round();
        if (1.0..=u32::MAX as f64).contains(&dpi) {
            dpi as u32
        } else {
            0
        }
    };
    match (dpi(x), dpi(y)) {
        (0, _) | (_, 0) => Resolution::UNKNOWN,
        (x, y) => Resolution::new(x, y),
    }
}
