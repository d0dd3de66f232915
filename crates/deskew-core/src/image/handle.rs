//! The owned image handle and its metadata types.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::codec::ImageFormat;

/// Error types for constructing and transforming images.
#[derive(Debug, Error, PartialEq)]
pub enum ImageError {
    /// Width or height is zero.
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel buffer length doesn't match the padded layout.
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Colormaps only make sense for 1 and 8 bpp images.
    #[error("A colormap is not allowed on a {0} bpp image")]
    ColormapNotAllowed(u32),

    /// More palette entries than the depth can index.
    #[error("Colormap has {entries} entries but {depth} bpp can index at most {max}")]
    ColormapTooLarge {
        entries: usize,
        depth: u32,
        max: usize,
    },

    /// Scale factors must be finite and positive.
    #[error("Invalid scale factors: ({sx}, {sy})")]
    InvalidScale { sx: f32, sy: f32 },
}

/// Bits per pixel of an [`ImageHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelDepth {
    /// Binary, packed 8 pixels per byte.
    Bit1,
    /// 8-bit gray or palette index.
    Bit8,
    /// 8-bit RGB.
    Bit24,
    /// 8-bit RGBA.
    Bit32,
}

impl PixelDepth {
    /// Number of bits one pixel occupies.
    pub fn bits(self) -> u32 {
        match self {
            PixelDepth::Bit1 => 1,
            PixelDepth::Bit8 => 8,
            PixelDepth::Bit24 => 24,
            PixelDepth::Bit32 => 32,
        }
    }

    /// Parse a bit count, returning `None` for unsupported depths.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(PixelDepth::Bit1),
            8 => Some(PixelDepth::Bit8),
            24 => Some(PixelDepth::Bit24),
            32 => Some(PixelDepth::Bit32),
            _ => None,
        }
    }

    /// Number of 8-bit channels, or `None` for packed binary pixels.
    pub fn channels(self) -> Option<usize> {
        match self {
            PixelDepth::Bit1 => None,
            PixelDepth::Bit8 => Some(1),
            PixelDepth::Bit24 => Some(3),
            PixelDepth::Bit32 => Some(4),
        }
    }

    /// Pixel value of a white document background at this depth.
    pub fn background(self) -> u32 {
        match self {
            PixelDepth::Bit1 => 0,
            PixelDepth::Bit8 => 0xFF,
            PixelDepth::Bit24 => 0x00FF_FFFF,
            PixelDepth::Bit32 => 0xFFFF_FFFF,
        }
    }

    /// Whether a palette can be attached at this depth.
    pub fn allows_colormap(self) -> bool {
        matches!(self, PixelDepth::Bit1 | PixelDepth::Bit8)
    }
}

/// Bytes occupied by one scanline, padded to a 32-bit word boundary.
#[inline]
pub fn bytes_per_line(width: u32, depth: PixelDepth) -> usize {
    (width as usize * depth.bits() as usize).div_ceil(32) * 4
}

/// Scan resolution in pixels per inch. Zero means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// Horizontal pixels per inch.
    pub x: u32,
    /// Vertical pixels per inch.
    pub y: u32,
}

impl Resolution {
    /// Resolution not recorded in the source.
    pub const UNKNOWN: Resolution = Resolution { x: 0, y: 0 };

    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Same resolution on both axes.
    pub fn uniform(dpi: u32) -> Self {
        Self { x: dpi, y: dpi }
    }

    /// True when both axes carry a value.
    pub fn is_known(&self) -> bool {
        self.x > 0 && self.y > 0
    }

    /// The lower of the two axes, if both are known.
    ///
    /// Scanners with anisotropic resolution are searched at the coarser one.
    pub fn min_dpi(&self) -> Option<u32> {
        self.is_known().then(|| self.x.min(self.y))
    }
}

/// A palette of RGB entries indexed by 1 or 8 bpp pixel values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colormap {
    entries: Vec<[u8; 3]>,
}

impl Colormap {
    pub fn new(entries: Vec<[u8; 3]>) -> Self {
        Self { entries }
    }

    /// A gray ramp covering every index of the depth (2 or 256 entries).
    pub fn gray_ramp(depth: PixelDepth) -> Self {
        let count = 1usize << depth.bits().min(8);
        let step = 255 / (count - 1).max(1);
        let entries = (0..count)
            .map(|i| {
                let v = (i * step) as u8;
                [v, v, v]
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[[u8; 3]] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry; out-of-range indices resolve to `None`.
    pub fn get(&self, index: u32) -> Option<[u8; 3]> {
        self.entries.get(index as usize).copied()
    }

    /// True when every entry is a shade of gray.
    pub fn is_grayscale(&self) -> bool {
        self.entries.iter().all(|[r, g, b]| r == g && g == b)
    }

    /// Index of the brightest entry, used as the fill for exposed borders.
    pub fn lightest_index(&self) -> u32 {
        self.entries
            .iter()
            .enumerate()
            .max_by_key(|(_, [r, g, b])| super::luminance(*r, *g, *b))
            .map(|(i, _)| i as u32)
            .unwrap_or(0)
    }
}

/// One decoded raster image with exclusive ownership of its pixel buffer.
///
/// See the module documentation for the buffer layout and ownership rules.
/// Resolution is fixed at construction; there is no setter.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHandle {
    width: u32,
    height: u32,
    depth: PixelDepth,
    resolution: Resolution,
    data: Vec<u8>,
    colormap: Option<Colormap>,
    input_format: Option<ImageFormat>,
    text: Option<String>,
}

impl ImageHandle {
    // -- Construction ---------------------------------------------------------

    /// Create an image filled with the white background of its depth.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::InvalidDimensions` if either dimension is zero.
    pub fn new(
        width: u32,
        height: u32,
        depth: PixelDepth,
        resolution: Resolution,
    ) -> Result<Self, ImageError> {
        check_dimensions(width, height)?;
        Ok(Self::blank(width, height, depth, resolution))
    }

    /// Background-filled image for dimensions already known to be non-zero.
    pub(crate) fn blank(width: u32, height: u32, depth: PixelDepth, resolution: Resolution) -> Self {
        debug_assert!(width > 0 && height > 0);
        let bpl = bytes_per_line(width, depth);
        let mut data = vec![0u8; bpl * height as usize];

        // White is all-ones for every byte-aligned depth and zero for 1 bpp.
        if depth != PixelDepth::Bit1 {
            let active = width as usize * depth.bits() as usize / 8;
            for row in data.chunks_exact_mut(bpl) {
                row[..active].fill(0xFF);
            }
        }

        Self::assemble(width, height, depth, resolution, data)
    }

    /// Wrap an already padded buffer.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::InvalidDimensions` for a zero dimension and
    /// `ImageError::BufferSizeMismatch` if `data` does not hold exactly
    /// `height * bytes_per_line(width, depth)` bytes.
    pub fn from_raw(
        width: u32,
        height: u32,
        depth: PixelDepth,
        resolution: Resolution,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        check_dimensions(width, height)?;
        let expected = bytes_per_line(width, depth) * height as usize;
        if data.len() != expected {
            return Err(ImageError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self::assemble(width, height, depth, resolution, data))
    }

    /// Build an 8 bpp image from unpadded row-major gray values.
    pub fn from_gray(
        width: u32,
        height: u32,
        pixels: &[u8],
        resolution: Resolution,
    ) -> Result<Self, ImageError> {
        Self::from_packed(width, height, PixelDepth::Bit8, pixels, resolution)
    }

    /// Build a 24 bpp image from unpadded RGB data (3 bytes per pixel).
    pub fn from_rgb(
        width: u32,
        height: u32,
        pixels: &[u8],
        resolution: Resolution,
    ) -> Result<Self, ImageError> {
        Self::from_packed(width, height, PixelDepth::Bit24, pixels, resolution)
    }

    /// Build a 32 bpp image from unpadded RGBA data (4 bytes per pixel).
    pub fn from_rgba(
        width: u32,
        height: u32,
        pixels: &[u8],
        resolution: Resolution,
    ) -> Result<Self, ImageError> {
        Self::from_packed(width, height, PixelDepth::Bit32, pixels, resolution)
    }

    fn from_packed(
        width: u32,
        height: u32,
        depth: PixelDepth,
        pixels: &[u8],
        resolution: Resolution,
    ) -> Result<Self, ImageError> {
        check_dimensions(width, height)?;
        let row_bytes = width as usize * depth.bits() as usize / 8;
        let expected = row_bytes * height as usize;
        if pixels.len() != expected {
            return Err(ImageError::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self::pack_rows(width, height, depth, pixels, resolution))
    }

    /// Copy unpadded rows into the padded layout. The caller guarantees
    /// `pixels` holds exactly `width * height` pixels of a byte-aligned depth.
    pub(crate) fn pack_rows(
        width: u32,
        height: u32,
        depth: PixelDepth,
        pixels: &[u8],
        resolution: Resolution,
    ) -> Self {
        let row_bytes = width as usize * depth.bits() as usize / 8;
        debug_assert_eq!(pixels.len(), row_bytes * height as usize);
        let bpl = bytes_per_line(width, depth);
        let mut data = vec![0u8; bpl * height as usize];
        for (dst, src) in data.chunks_exact_mut(bpl).zip(pixels.chunks_exact(row_bytes)) {
            dst[..row_bytes].copy_from_slice(src);
        }
        Self::assemble(width, height, depth, resolution, data)
    }

    fn assemble(
        width: u32,
        height: u32,
        depth: PixelDepth,
        resolution: Resolution,
        data: Vec<u8>,
    ) -> Self {
        Self {
            width,
            height,
            depth,
            resolution,
            data,
            colormap: None,
            input_format: None,
            text: None,
        }
    }

    /// Attach a palette.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::ColormapNotAllowed` above 8 bpp and
    /// `ImageError::ColormapTooLarge` when the palette has more entries than
    /// the depth can index.
    pub fn with_colormap(mut self, colormap: Colormap) -> Result<Self, ImageError> {
        if !self.depth.allows_colormap() {
            return Err(ImageError::ColormapNotAllowed(self.depth.bits()));
        }
        let max = 1usize << self.depth.bits();
        if colormap.len() > max {
            return Err(ImageError::ColormapTooLarge {
                entries: colormap.len(),
                depth: self.depth.bits(),
                max,
            });
        }
        self.colormap = Some(colormap);
        Ok(self)
    }

    /// Tag the image with the format it was decoded from.
    pub fn with_input_format(mut self, format: ImageFormat) -> Self {
        self.input_format = Some(format);
        self
    }

    /// A blank image with this image's depth, palette, format tag and text,
    /// at a caller-chosen size and resolution.
    pub(crate) fn blank_like(&self, width: u32, height: u32, resolution: Resolution) -> Self {
        let mut out = Self::blank(width.max(1), height.max(1), self.depth, resolution);
        out.colormap = self.colormap.clone();
        out.copy_tags_from(self);
        out
    }

    /// Carry the format tag and text annotation over from `source`.
    pub(crate) fn copy_tags_from(&mut self, source: &ImageHandle) {
        self.input_format = source.input_format;
        self.text = source.text.clone();
    }

    /// Release the handle and its pixel buffer.
    ///
    /// Consuming `self` makes a second release, or any use afterwards, a
    /// compile error. Handles that leave scope on an error path are released
    /// by `Drop`.
    pub fn release(self) {
        trace!(
            width = self.width,
            height = self.height,
            depth = self.depth.bits(),
            "Releasing image"
        );
        drop(self);
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn depth(&self) -> PixelDepth {
        self.depth
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn colormap(&self) -> Option<&Colormap> {
        self.colormap.as_ref()
    }

    pub fn input_format(&self) -> Option<ImageFormat> {
        self.input_format
    }

    /// Embedded text annotation (e.g. a TIFF `ImageDescription`).
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: Option<String>) {
        self.text = text;
    }

    /// Padded scanline length in bytes.
    pub fn bytes_per_line(&self) -> usize {
        bytes_per_line(self.width, self.depth)
    }

    /// The whole padded pixel buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One padded scanline.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        let bpl = self.bytes_per_line();
        let start = y as usize * bpl;
        &self.data[start..start + bpl]
    }

    /// One padded scanline, mutably. Callers must keep padding bytes zero.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let bpl = self.bytes_per_line();
        let start = y as usize * bpl;
        &mut self.data[start..start + bpl]
    }

    /// Read one pixel.
    ///
    /// Values are the bit for 1 bpp, the gray value or palette index for
    /// 8 bpp, `0xRRGGBB` for 24 bpp and `0xRRGGBBAA` for 32 bpp.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the image.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> u32 {
        assert!(x < self.width, "x {} out of bounds ({})", x, self.width);
        let row = self.row(y);
        let x = x as usize;
        match self.depth {
            PixelDepth::Bit1 => ((row[x / 8] >> (7 - (x % 8))) & 1) as u32,
            PixelDepth::Bit8 => row[x] as u32,
            PixelDepth::Bit24 => {
                let i = x * 3;
                u32::from_be_bytes([0, row[i], row[i + 1], row[i + 2]])
            }
            PixelDepth::Bit32 => {
                let i = x * 4;
                u32::from_be_bytes([row[i], row[i + 1], row[i + 2], row[i + 3]])
            }
        }
    }

    /// Write one pixel; see [`get_pixel`](Self::get_pixel) for the encoding.
    /// Bits above the depth are ignored.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the image.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, value: u32) {
        assert!(x < self.width, "x {} out of bounds ({})", x, self.width);
        let depth = self.depth;
        let row = self.row_mut(y);
        let x = x as usize;
        match depth {
            PixelDepth::Bit1 => {
                let mask = 0x80u8 >> (x % 8);
                if value & 1 == 1 {
                    row[x / 8] |= mask;
                } else {
                    row[x / 8] &= !mask;
                }
            }
            PixelDepth::Bit8 => row[x] = value as u8,
            PixelDepth::Bit24 => {
                let [_, r, g, b] = value.to_be_bytes();
                row[x * 3..x * 3 + 3].copy_from_slice(&[r, g, b]);
            }
            PixelDepth::Bit32 => {
                row[x * 4..x * 4 + 4].copy_from_slice(&value.to_be_bytes());
            }
        }
    }

    /// Value used to fill pixels that have no source, e.g. the corners
    /// exposed by a rotation.
    pub fn background_value(&self) -> u32 {
        match &self.colormap {
            Some(colormap) => colormap.lightest_index(),
            None => self.depth.background(),
        }
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height });
    }
    Ok(())
}
