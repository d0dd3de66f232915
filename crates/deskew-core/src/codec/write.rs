//! Encoding image handles to files.
//!
//! The output format comes from the file extension. PNM output picks its
//! subtype from the image depth: 1 bpp is written as PBM, 8 bpp as PGM and
//! color as PPM. Other formats store 1 bpp images as 8-bit gray.
//!
//! TIFF, PNG and JPEG output records the image resolution when it is known.

use std::borrow::Cow;
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tiff::encoder::{colortype, Rational, TiffEncoder};
use tiff::tags::ResolutionUnit;
use tracing::{debug, info, instrument};

use super::metadata::METRES_PER_INCH;
use super::{EncodeError, ImageFormat};
use crate::image::{ImageHandle, PixelDepth, Resolution};

/// JPEG quality used when [`WriteOptions::jpeg_quality`] is 0.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Largest width or height a JPEG frame header can hold.
const JPEG_MAX_DIMENSION: u32 = u16::MAX as u32;

/// Encoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// JPEG quality 1-100; 0 selects [`DEFAULT_JPEG_QUALITY`], larger values
    /// clamp to 100.
    pub jpeg_quality: u8,
    /// Write progressive instead of baseline JPEG.
    pub jpeg_progressive: bool,
}

impl WriteOptions {
    /// Quality actually handed to the JPEG encoder.
    pub fn effective_jpeg_quality(&self) -> u8 {
        match self.jpeg_quality {
            0 => DEFAULT_JPEG_QUALITY,
            q => q.min(100),
        }
    }
}

/// Encode `image` to `path` in the format implied by its extension.
///
/// The file is written atomically: encoding goes to a temporary file in the
/// destination directory, which replaces `path` only after the encoder
/// finished. On failure `path` is left as it was.
///
/// # Arguments
///
/// * `path` - Output file; `tif`/`tiff`, `png`, `jpg`/`jpeg` or `pnm`/`pbm`/`pgm`/`ppm`
/// * `image` - The image to encode
/// * `options` - Encoder options
///
/// # Errors
///
/// - `EncodeError::UnsupportedFormat` for an unknown extension
/// - `EncodeError::Io` if the file cannot be created, written or renamed
/// - `EncodeError::Encoder` if the encoder rejects the image
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write(path: &Path, image: &ImageHandle, options: &WriteOptions) -> Result<(), EncodeError> {
    let format = ImageFormat::from_path(path).ok_or_else(|| EncodeError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = temp_file_in(dir).map_err(|source| io_error(path, source))?;
    debug!(temp = %temp.path().display(), "Encoding to temporary file");

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        encode(&mut writer, image, format, options).map_err(|failure| match failure {
            Failure::Io(source) => io_error(path, source),
            Failure::Encoder(message) => EncodeError::Encoder {
                path: path.to_path_buf(),
                message,
            },
        })?;
        writer.flush().map_err(|source| io_error(path, source))?;
    }

    temp.persist(path).map_err(|e| io_error(path, e.error))?;

    info!(
        format = %format,
        width = image.width(),
        height = image.height(),
        depth = image.depth().bits(),
        xres = image.resolution().x,
        yres = image.resolution().y,
        "Wrote image"
    );
    Ok(())
}

fn temp_file_in(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".deskew-").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    builder.tempfile_in(dir)
}

fn io_error(path: &Path, source: io::Error) -> EncodeError {
    EncodeError::Io {
        path: PathBuf::from(path),
        source,
    }
}

/// Encoder failure before the output path is attached.
#[derive(Debug)]
enum Failure {
    Io(io::Error),
    Encoder(String),
}

impl From<io::Error> for Failure {
    fn from(err: io::Error) -> Self {
        Failure::Io(err)
    }
}

impl From<image::ImageError> for Failure {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(source) => Failure::Io(source),
            other => Failure::Encoder(other.to_string()),
        }
    }
}

impl From<tiff::TiffError> for Failure {
    fn from(err: tiff::TiffError) -> Self {
        match err {
            tiff::TiffError::IoError(source) => Failure::Io(source),
            other => Failure::Encoder(other.to_string()),
        }
    }
}

impl From<png::EncodingError> for Failure {
    fn from(err: png::EncodingError) -> Self {
        match err {
            png::EncodingError::IoError(source) => Failure::Io(source),
            other => Failure::Encoder(other.to_string()),
        }
    }
}

impl From<jpeg_encoder::EncodingError> for Failure {
    fn from(err: jpeg_encoder::EncodingError) -> Self {
        Failure::Encoder(err.to_string())
    }
}

/// Packed pixels ready for an encoder.
struct Packed<'a> {
    width: u32,
    height: u32,
    depth: PixelDepth,
    pixels: &'a [u8],
    resolution: Resolution,
}

fn encode<W: Write + Seek>(
    writer: &mut W,
    image: &ImageHandle,
    format: ImageFormat,
    options: &WriteOptions,
) -> Result<(), Failure> {
    let image: Cow<'_, ImageHandle> = match image.colormap() {
        Some(_) => Cow::Owned(image.remove_colormap()),
        None => Cow::Borrowed(image),
    };

    if format == ImageFormat::Pnm && image.depth() == PixelDepth::Bit1 {
        return write_pbm(writer, &image).map_err(Failure::Io);
    }

    let (width, height) = image.dimensions();
    let (depth, pixels) = image.to_packed();
    let packed = Packed {
        width,
        height,
        depth,
        pixels: &pixels,
        resolution: image.resolution(),
    };

    match format {
        ImageFormat::Tiff => write_tiff(writer, &packed),
        ImageFormat::Png => write_png(writer, &packed),
        ImageFormat::Jpeg => write_jpeg(writer, &packed, options),
        ImageFormat::Pnm => {
            let (depth, pixels) = without_alpha(depth, packed.pixels);
            let (subtype, color) = match depth {
                PixelDepth::Bit8 => (PnmSubtype::Graymap(SampleEncoding::Binary), ExtendedColorType::L8),
                _ => (PnmSubtype::Pixmap(SampleEncoding::Binary), ExtendedColorType::Rgb8),
            };
            PnmEncoder::new(writer)
                .with_subtype(subtype)
                .write_image(&pixels, width, height, color)?;
            Ok(())
        }
    }
}

fn write_tiff<W: Write + Seek>(writer: &mut W, packed: &Packed<'_>) -> Result<(), Failure> {
    let mut encoder = TiffEncoder::new(writer)?;
    match packed.depth {
        PixelDepth::Bit24 => tiff_image::<colortype::RGB8, _>(&mut encoder, packed),
        PixelDepth::Bit32 => tiff_image::<colortype::RGBA8, _>(&mut encoder, packed),
        _ => tiff_image::<colortype::Gray8, _>(&mut encoder, packed),
    }
}

fn tiff_image<C, W>(encoder: &mut TiffEncoder<W>, packed: &Packed<'_>) -> Result<(), Failure>
where
    C: colortype::ColorType<Inner = u8>,
    W: Write + Seek,
{
    let mut image = encoder.new_image::<C>(packed.width, packed.height)?;
    if packed.resolution.is_known() {
        image.resolution_unit(ResolutionUnit::Inch);
        image.x_resolution(Rational {
            n: packed.resolution.x,
            d: 1,
        });
        image.y_resolution(Rational {
            n: packed.resolution.y,
            d: 1,
        });
    }
    image.write_data(packed.pixels)?;
    Ok(())
}

fn write_png<W: Write>(writer: &mut W, packed: &Packed<'_>) -> Result<(), Failure> {
    let mut encoder = png::Encoder::new(writer, packed.width, packed.height);
    encoder.set_color(match packed.depth {
        PixelDepth::Bit24 => png::ColorType::Rgb,
        PixelDepth::Bit32 => png::ColorType::Rgba,
        _ => png::ColorType::Grayscale,
    });
    encoder.set_depth(png::BitDepth::Eight);
    if packed.resolution.is_known() {
        let per_metre = |dpi: u32| (dpi as f64 / METRES_PER_INCH).round() as u32;
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: per_metre(packed.resolution.x),
            yppu: per_metre(packed.resolution.y),
            unit: png::Unit::Meter,
        }));
    }
    let mut png = encoder.write_header()?;
    png.write_image_data(packed.pixels)?;
    png.finish()?;
    Ok(())
}

fn write_jpeg<W: Write>(
    writer: &mut W,
    packed: &Packed<'_>,
    options: &WriteOptions,
) -> Result<(), Failure> {
    let (Ok(width), Ok(height)) = (u16::try_from(packed.width), u16::try_from(packed.height)) else {
        return Err(Failure::Encoder(format!(
            "{}x{} exceeds the JPEG limit of {JPEG_MAX_DIMENSION} pixels per side",
            packed.width, packed.height
        )));
    };

    let mut encoder = jpeg_encoder::Encoder::new(writer, options.effective_jpeg_quality());
    encoder.set_progressive(options.jpeg_progressive);
    let Resolution { x, y } = packed.resolution;
    if let (Ok(x), Ok(y)) = (u16::try_from(x), u16::try_from(y)) {
        if x > 0 && y > 0 {
            encoder.set_density(jpeg_encoder::Density::Inch { x, y });
        }
    }

    let (depth, pixels) = without_alpha(packed.depth, packed.pixels);
    let color = match depth {
        PixelDepth::Bit24 => jpeg_encoder::ColorType::Rgb,
        _ => jpeg_encoder::ColorType::Luma,
    };
    encoder.encode(&pixels, width, height, color)?;
    Ok(())
}

fn without_alpha(depth: PixelDepth, pixels: &[u8]) -> (PixelDepth, Cow<'_, [u8]>) {
    if depth != PixelDepth::Bit32 {
        return (depth, Cow::Borrowed(pixels));
    }
    let rgb = pixels
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    (PixelDepth::Bit24, Cow::Owned(rgb))
}

/// Raw PBM (P4): rows packed MSB-first, padded to whole bytes, 1 = black.
fn write_pbm<W: Write>(writer: &mut W, image: &ImageHandle) -> io::Result<()> {
    let (width, height) = image.dimensions();
    write!(writer, "P4\n{width} {height}\n")?;
    let row_bytes = (width as usize).div_ceil(8);
    for y in 0..height {
        writer.write_all(&image.row(y)[..row_bytes])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::read;
    use crate::image::{Colormap, Resolution};

    fn gradient(width: u32, height: u32) -> ImageHandle {
        let pixels: Vec<u8> = (0..width * height).map(|i| (i * 13 % 256) as u8).collect();
        ImageHandle::from_gray(width, height, &pixels, Resolution::UNKNOWN).unwrap()
    }

    fn colors(width: u32, height: u32, channels: u32) -> ImageHandle {
        let pixels: Vec<u8> = (0..width * height * channels)
            .map(|i| (i * 31 % 251) as u8)
            .collect();
        match channels {
            3 => ImageHandle::from_rgb(width, height, &pixels, Resolution::UNKNOWN).unwrap(),
            _ => ImageHandle::from_rgba(width, height, &pixels, Resolution::UNKNOWN).unwrap(),
        }
    }

    fn binary(width: u32, height: u32) -> ImageHandle {
        let mut img = ImageHandle::new(width, height, PixelDepth::Bit1, Resolution::UNKNOWN).unwrap();
        for y in 0..height {
            for x in 0..width {
                if (x * 3 + y * 5) % 7 == 0 {
                    img.set_pixel(x, y, 1);
                }
            }
        }
        img
    }

    fn assert_lossless(original: &ImageHandle, file_name: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(file_name);
        write(&path, original, &WriteOptions::default()).unwrap();
        let decoded = read(&path).unwrap();
        assert_eq!(decoded.dimensions(), original.dimensions(), "{file_name}");
        assert_eq!(decoded.depth(), original.depth(), "{file_name}");
        assert_eq!(decoded.data(), original.data(), "{file_name}");
    }

    #[test]
    fn test_effective_jpeg_quality() {
        let quality = |q| WriteOptions {
            jpeg_quality: q,
            jpeg_progressive: false,
        };
        assert_eq!(quality(0).effective_jpeg_quality(), DEFAULT_JPEG_QUALITY);
        assert_eq!(quality(1).effective_jpeg_quality(), 1);
        assert_eq!(quality(90).effective_jpeg_quality(), 90);
        assert_eq!(quality(200).effective_jpeg_quality(), 100);
    }

    #[test]
    fn test_lossless_roundtrips() {
        assert_lossless(&gradient(37, 21), "gray.png");
        assert_lossless(&gradient(37, 21), "gray.tif");
        assert_lossless(&gradient(37, 21), "gray.pgm");
        assert_lossless(&colors(19, 11, 3), "rgb.png");
        assert_lossless(&colors(19, 11, 3), "rgb.tiff");
        assert_lossless(&colors(19, 11, 3), "rgb.ppm");
        assert_lossless(&colors(19, 11, 4), "rgba.png");
        assert_lossless(&colors(19, 11, 4), "rgba.TIF");
    }

    #[test]
    fn test_binary_roundtrip_through_pbm() {
        assert_lossless(&binary(13, 9), "page.pbm");
        assert_lossless(&binary(64, 3), "page.pnm");
    }

    #[test]
    fn test_pbm_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.pbm");
        write(&path, &binary(10, 2), &WriteOptions::default()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P4\n10 2\n"));
        assert_eq!(bytes.len(), b"P4\n10 2\n".len() + 2 * 2);
    }

    #[test]
    fn test_binary_to_png_becomes_gray() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        let img = binary(8, 8);
        write(&path, &img, &WriteOptions::default()).unwrap();
        let decoded = read(&path).unwrap();
        assert_eq!(decoded.depth(), PixelDepth::Bit8);
        assert_eq!(decoded.get_pixel(0, 0), 0);
        assert_eq!(decoded.get_pixel(1, 0), 255);
    }

    #[test]
    fn test_colormap_is_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("palette.png");
        let palette = Colormap::new(vec![[255, 0, 0], [0, 0, 255]]);
        let mut img = ImageHandle::new(4, 4, PixelDepth::Bit8, Resolution::UNKNOWN)
            .unwrap()
            .with_colormap(palette)
            .unwrap();
        for x in 0..4 {
            img.set_pixel(x, 0, 0);
            img.set_pixel(x, 1, 1);
        }
        write(&path, &img, &WriteOptions::default()).unwrap();
        let decoded = read(&path).unwrap();
        assert_eq!(decoded.depth(), PixelDepth::Bit24);
        assert_eq!(decoded.get_pixel(0, 0), 0xFF0000);
        assert_eq!(decoded.get_pixel(0, 1), 0x0000FF);
    }

    #[test]
    fn test_jpeg_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.jpg");
        write(&path, &colors(32, 32, 4), &WriteOptions::default()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
        let decoded = read(&path).unwrap();
        assert_eq!(decoded.dimensions(), (32, 32));
        assert_eq!(decoded.depth(), PixelDepth::Bit24);
    }

    fn contains_marker(bytes: &[u8], marker: u8) -> bool {
        bytes.windows(2).any(|pair| pair == [0xFF, marker])
    }

    #[test]
    fn test_jpeg_default_quality_is_75() {
        let dir = tempfile::tempdir().unwrap();
        let img = gradient(48, 48);
        let default = dir.path().join("default.jpg");
        let explicit = dir.path().join("explicit.jpeg");
        write(&default, &img, &WriteOptions::default()).unwrap();
        write(
            &explicit,
            &img,
            &WriteOptions {
                jpeg_quality: 75,
                jpeg_progressive: false,
            },
        )
        .unwrap();
        assert_eq!(std::fs::read(&default).unwrap(), std::fs::read(&explicit).unwrap());
    }

    #[test]
    fn test_jpeg_progressive_output() {
        const SOF0: u8 = 0xC0;
        const SOF2: u8 = 0xC2;

        let dir = tempfile::tempdir().unwrap();
        let img = colors(40, 24, 3);
        let baseline = dir.path().join("baseline.jpg");
        let progressive = dir.path().join("progressive.jpg");
        write(&baseline, &img, &WriteOptions::default()).unwrap();
        write(
            &progressive,
            &img,
            &WriteOptions {
                jpeg_quality: 0,
                jpeg_progressive: true,
            },
        )
        .unwrap();

        let baseline_bytes = std::fs::read(&baseline).unwrap();
        assert!(contains_marker(&baseline_bytes, SOF0));
        assert!(!contains_marker(&baseline_bytes, SOF2));

        let progressive_bytes = std::fs::read(&progressive).unwrap();
        assert!(contains_marker(&progressive_bytes, SOF2));
        assert!(!contains_marker(&progressive_bytes, SOF0));

        let decoded = read(&progressive).unwrap();
        assert_eq!(decoded.dimensions(), (40, 24));
        assert_eq!(decoded.depth(), PixelDepth::Bit24);
    }

    #[test]
    fn test_resolution_survives_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let pixels: Vec<u8> = (0..64 * 64).map(|i| (i % 251) as u8).collect();
        let img = ImageHandle::from_gray(64, 64, &pixels, Resolution::uniform(300)).unwrap();
        for name in ["page.tif", "page.png", "page.jpg"] {
            let path = dir.path().join(name);
            write(&path, &img, &WriteOptions::default()).unwrap();
            assert_eq!(read(&path).unwrap().resolution(), Resolution::uniform(300), "{name}");
        }

        let anisotropic = ImageHandle::from_rgb(8, 8, &[90; 8 * 8 * 3], Resolution::new(300, 150)).unwrap();
        for name in ["wide.tiff", "wide.png", "wide.jpeg"] {
            let path = dir.path().join(name);
            write(&path, &anisotropic, &WriteOptions::default()).unwrap();
            assert_eq!(read(&path).unwrap().resolution(), Resolution::new(300, 150), "{name}");
        }
    }

    #[test]
    fn test_unknown_resolution_stays_unknown() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page.tif", "page.png", "page.jpg", "page.pgm"] {
            let path = dir.path().join(name);
            write(&path, &gradient(16, 16), &WriteOptions::default()).unwrap();
            assert_eq!(read(&path).unwrap().resolution(), Resolution::UNKNOWN, "{name}");
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.gif");
        let err = write(&path, &gradient(4, 4), &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("page.gif"));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no").join("such").join("out.png");
        let err = write(&path, &gradient(4, 4), &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, EncodeError::Io { .. }));
        assert_eq!(err.path(), path.as_path());
    }

    #[test]
    fn test_no_temporary_files_left() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tif");
        write(&path, &gradient(16, 16), &WriteOptions::default()).unwrap();
        write(&path, &gradient(8, 8), &WriteOptions::default()).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("out.tif")]);
        assert_eq!(read(&path).unwrap().dimensions(), (8, 8));
    }

    #[test]
    fn test_failed_encode_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        std::fs::write(&path, b"previous").unwrap();

        // Baseline JPEG cannot hold more than 65535 pixels per side
        let wide = ImageHandle::new(70_000, 1, PixelDepth::Bit8, Resolution::UNKNOWN).unwrap();
        let err = write(&path, &wide, &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, EncodeError::Encoder { .. } | EncodeError::Io { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"previous");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
