//! Depth conversions and the bridge to the `image` crate.
//!
//! Luminance uses the 0.3 / 0.5 / 0.2 weighting common in document imaging,
//! which keeps colored ink (blue pens, red stamps) darker than a perceptual
//! BT.709 weighting would.

use image::{DynamicImage, ImageBuffer, Luma, Rgb, Rgba};

use super::{ImageError, ImageHandle, PixelDepth, Resolution};

/// Red weight for luminance.
pub const LUMINANCE_R: f32 = 0.3;

/// Green weight for luminance.
pub const LUMINANCE_G: f32 = 0.5;

/// Blue weight for luminance.
pub const LUMINANCE_B: f32 = 0.2;

/// Gray level separating foreground from background when binarizing.
pub const BINARY_THRESHOLD: u8 = 130;

/// Luminance of an 8-bit RGB triple (0-255).
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let lum = LUMINANCE_R * r as f32 + LUMINANCE_G * g as f32 + LUMINANCE_B * b as f32;
    lum.clamp(0.0, 255.0).round() as u8
}

/// Split a packed pixel into up to four 8-bit channels.
#[inline]
pub(crate) fn unpack_channels(value: u32, depth: PixelDepth) -> [u8; 4] {
    match depth {
        PixelDepth::Bit1 | PixelDepth::Bit8 => [value as u8, 0, 0, 0],
        PixelDepth::Bit24 => {
            let [_, r, g, b] = value.to_be_bytes();
            [r, g, b, 0xFF]
        }
        PixelDepth::Bit32 => value.to_be_bytes(),
    }
}

/// Inverse of [`unpack_channels`].
#[inline]
pub(crate) fn pack_channels(channels: [u8; 4], depth: PixelDepth) -> u32 {
    match depth {
        PixelDepth::Bit1 | PixelDepth::Bit8 => channels[0] as u32,
        PixelDepth::Bit24 => u32::from_be_bytes([0, channels[0], channels[1], channels[2]]),
        PixelDepth::Bit32 => u32::from_be_bytes(channels),
    }
}

impl ImageHandle {
    /// Gray value (0-255) of one pixel, resolving the palette if present.
    ///
    /// Binary pixels map foreground to 0 and background to 255.
    #[inline]
    pub fn gray_at(&self, x: u32, y: u32) -> u8 {
        let value = self.get_pixel(x, y);
        if let Some(colormap) = self.colormap() {
            let [r, g, b] = colormap.get(value).unwrap_or([255, 255, 255]);
            return luminance(r, g, b);
        }
        match self.depth() {
            PixelDepth::Bit1 => {
                if value == 1 {
                    0
                } else {
                    255
                }
            }
            PixelDepth::Bit8 => value as u8,
            depth => {
                let [r, g, b, _] = unpack_channels(value, depth);
                luminance(r, g, b)
            }
        }
    }

    /// Convert to an 8 bpp gray image without a palette.
    ///
    /// Alpha is ignored. The result keeps resolution, format tag and text.
    pub fn to_gray(&self) -> ImageHandle {
        if self.depth() == PixelDepth::Bit8 && self.colormap().is_none() {
            return self.clone();
        }

        let (width, height) = self.dimensions();
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(self.gray_at(x, y));
            }
        }
        self.derived_from_packed(PixelDepth::Bit8, &pixels)
    }

    /// Convert to a 1 bpp image; pixels darker than `threshold` become
    /// foreground.
    pub fn binarize(&self, threshold: u8) -> ImageHandle {
        if self.depth() == PixelDepth::Bit1 && self.colormap().is_none() {
            return self.clone();
        }

        let (width, height) = self.dimensions();
        let mut out = ImageHandle::blank(width, height, PixelDepth::Bit1, self.resolution());
        out.copy_tags_from(self);
        for y in 0..height {
            for x in 0..width {
                if self.gray_at(x, y) < threshold {
                    out.set_pixel(x, y, 1);
                }
            }
        }
        out
    }

    /// Expand a palette into direct pixel values.
    ///
    /// An all-gray palette becomes 8 bpp gray, anything else 24 bpp RGB.
    /// Images without a palette are returned as a copy.
    pub fn remove_colormap(&self) -> ImageHandle {
        let Some(colormap) = self.colormap() else {
            return self.clone();
        };

        if colormap.is_grayscale() {
            return self.to_gray();
        }

        let (width, height) = self.dimensions();
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let [r, g, b] = colormap.get(self.get_pixel(x, y)).unwrap_or([255, 255, 255]);
                pixels.extend_from_slice(&[r, g, b]);
            }
        }
        self.derived_from_packed(PixelDepth::Bit24, &pixels)
    }

    /// Unpadded row-major channel bytes (1, 3 or 4 per pixel).
    ///
    /// Binary and colormapped images are expanded first, so the returned
    /// depth is always 8, 24 or 32.
    pub(crate) fn to_packed(&self) -> (PixelDepth, Vec<u8>) {
        if self.colormap().is_some() || self.depth() == PixelDepth::Bit1 {
            return self.remove_colormap().to_gray_if_binary().to_packed();
        }

        let depth = self.depth();
        let row_bytes = self.width() as usize * depth.bits() as usize / 8;
        let mut pixels = Vec::with_capacity(row_bytes * self.height() as usize);
        for y in 0..self.height() {
            pixels.extend_from_slice(&self.row(y)[..row_bytes]);
        }
        (depth, pixels)
    }

    fn to_gray_if_binary(self) -> ImageHandle {
        if self.depth() == PixelDepth::Bit1 {
            self.to_gray()
        } else {
            self
        }
    }

    /// Convert to the `image` crate's representation.
    pub fn to_dynamic(&self) -> DynamicImage {
        let (width, height) = self.dimensions();
        let (depth, pixels) = self.to_packed();
        let channels = depth.channels().unwrap_or(1);
        let at = |x: u32, y: u32| (y as usize * width as usize + x as usize) * channels;

        match depth {
            PixelDepth::Bit24 => DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
                let i = at(x, y);
                Rgb([pixels[i], pixels[i + 1], pixels[i + 2]])
            })),
            PixelDepth::Bit32 => DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
                let i = at(x, y);
                Rgba([pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]])
            })),
            _ => DynamicImage::ImageLuma8(ImageBuffer::from_fn(width, height, |x, y| {
                Luma([pixels[at(x, y)]])
            })),
        }
    }

    /// Build a handle from the `image` crate's representation.
    ///
    /// Gray sources become 8 bpp, sources with alpha 32 bpp and everything
    /// else 24 bpp. Samples wider than 8 bits are reduced to 8.
    pub fn from_dynamic(image: DynamicImage, resolution: Resolution) -> Result<Self, ImageError> {
        use image::ColorType;

        let (width, height) = (image.width(), image.height());
        match image.color() {
            ColorType::L8 | ColorType::L16 => {
                ImageHandle::from_gray(width, height, image.into_luma8().as_raw(), resolution)
            }
            ColorType::La8 | ColorType::La16 | ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => {
                ImageHandle::from_rgba(width, height, image.into_rgba8().as_raw(), resolution)
            }
            _ => ImageHandle::from_rgb(width, height, image.into_rgb8().as_raw(), resolution),
        }
    }

    /// New handle of the same size and resolution from unpadded data,
    /// keeping the format tag and text.
    fn derived_from_packed(&self, depth: PixelDepth, pixels: &[u8]) -> ImageHandle {
        let (width, height) = self.dimensions();
        let mut out = ImageHandle::pack_rows(width, height, depth, pixels, self.resolution());
        out.copy_tags_from(self);
        out
    }
}
