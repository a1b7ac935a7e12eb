//! Stride-aware RGB pixel buffer and the decode boundary.
//!
//! [`RgbRaster`] stores 8-bit RGB triples row by row. Rows may be padded:
//! the distance between the start of consecutive rows is the *stride*,
//! which can exceed `width * 3`. All addressing goes through the stride,
//! so rasters handed over by toolkits with aligned rows are read correctly.
//!
//! [`decode_rgb`] is the only place where encoded bytes enter the engine.
//! It checks the pixel format once; everything downstream assumes
//! 3 channels of 8 bits with no alpha.

use image::{ColorType, DynamicImage, Rgb, RgbImage};

use crate::types::{Dimensions, SegmentError};

/// Bytes per RGB pixel.
pub const BYTES_PER_PIXEL: usize = 3;

/// What to do with decoded images that are not 8-bit RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatPolicy {
    /// Reject anything but 3-channel 8-bit images without alpha.
    #[default]
    Strict,
    /// Convert any decodable image to 8-bit RGB, dropping alpha.
    Convert,
}

/// A width x height grid of RGB pixels with an explicit row stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbRaster {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl RgbRaster {
    /// Allocate a black raster with tightly packed rows.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::DimensionOverflow`] if the byte size does not
    /// fit in `usize`, or [`SegmentError::Allocation`] if the buffer cannot
    /// be reserved.
    pub fn new(width: u32, height: u32) -> Result<Self, SegmentError> {
        let stride = row_bytes(width, height)?;
        let total = usize::try_from(height)
            .ok()
            .and_then(|h| h.checked_mul(stride))
            .ok_or(SegmentError::DimensionOverflow { width, height })?;

        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|_| SegmentError::Allocation {
                what: "raster pixels",
                count: total,
            })?;
        data.resize(total, 0);

        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Wrap an existing byte buffer whose rows are `stride` bytes apart.
    ///
    /// Padding bytes at the end of each row are kept untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::StrideTooSmall`] if a row of `width` pixels
    /// does not fit in `stride` bytes, [`SegmentError::BufferTooSmall`] if
    /// `data` is shorter than the last pixel of the last row, and
    /// [`SegmentError::DimensionOverflow`] if the layout overflows `usize`.
    pub fn from_raw_parts(
        width: u32,
        height: u32,
        stride: usize,
        data: Vec<u8>,
    ) -> Result<Self, SegmentError> {
        let packed = row_bytes(width, height)?;
        if stride < packed {
            return Err(SegmentError::StrideTooSmall {
                stride,
                required: packed,
                width,
            });
        }

        let required = match usize::try_from(height) {
            Ok(0) => 0,
            Ok(h) => stride
                .checked_mul(h - 1)
                .and_then(|n| n.checked_add(packed))
                .ok_or(SegmentError::DimensionOverflow { width, height })?,
            Err(_) => return Err(SegmentError::DimensionOverflow { width, height }),
        };
        if data.len() < required {
            return Err(SegmentError::BufferTooSmall {
                required,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Take a decoded image, accepting only 8-bit RGB without alpha.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::UnsupportedFormat`] describing the actual
    /// layout when the image is anything else.
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self, SegmentError> {
        image
            .as_rgb8()
            .map(|rgb| Self::from(rgb.clone()))
            .ok_or_else(|| unsupported_format(image.color()))
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Bytes between the start of consecutive rows.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Width and height together.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Number of pixels (`width * height`).
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        // Validated at construction: the byte size fits, so the pixel count does.
        self.width as usize * self.height as usize
    }

    /// Raw bytes, including any row padding.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The pixel at `(x, y)`, or `None` outside the raster.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb<u8>> {
        let offset = self.offset(x, y)?;
        let bytes = self.data.get(offset..offset + BYTES_PER_PIXEL)?;
        Some(Rgb([bytes[0], bytes[1], bytes[2]]))
    }

    /// Overwrite the pixel at `(x, y)`. Returns `false` outside the raster.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb<u8>) -> bool {
        let Some(offset) = self.offset(x, y) else {
            return false;
        };
        match self.data.get_mut(offset..offset + BYTES_PER_PIXEL) {
            Some(bytes) => {
                bytes.copy_from_slice(&color.0);
                true
            }
            None => false,
        }
    }

    /// All pixels in row-major order, skipping row padding.
    pub fn pixels(&self) -> impl Iterator<Item = Rgb<u8>> + '_ {
        let packed = self.width as usize * BYTES_PER_PIXEL;
        self.data
            .chunks(self.stride.max(1))
            .take(self.height as usize)
            .flat_map(move |row| row[..packed].chunks_exact(BYTES_PER_PIXEL))
            .map(|p| Rgb([p[0], p[1], p[2]]))
    }

    /// Pixel at row-major `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= pixel_count()`, like slice indexing.
    pub(crate) fn get(&self, index: usize) -> Rgb<u8> {
        let offset = self.index_offset(index);
        let p = &self.data[offset..offset + BYTES_PER_PIXEL];
        Rgb([p[0], p[1], p[2]])
    }

    /// Overwrite the pixel at row-major `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= pixel_count()`, like slice indexing.
    pub(crate) fn put(&mut self, index: usize, color: Rgb<u8>) {
        let offset = self.index_offset(index);
        self.data[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&color.0);
    }

    /// Copy into a tightly packed [`RgbImage`] for encoding.
    #[must_use]
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            self.pixel(x, y).unwrap_or(Rgb([0, 0, 0]))
        })
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.stride + x as usize * BYTES_PER_PIXEL)
    }

    fn index_offset(&self, index: usize) -> usize {
        let width = self.width as usize;
        (index / width) * self.stride + (index % width) * BYTES_PER_PIXEL
    }
}

impl From<RgbImage> for RgbRaster {
    fn from(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            stride: width as usize * BYTES_PER_PIXEL,
            data: image.into_raw(),
        }
    }
}

/// Decode raw image bytes into an RGB raster.
///
/// Supports PNG, JPEG, BMP, and WebP (whatever the `image` crate can
/// decode with the enabled features).
///
/// # Errors
///
/// Returns [`SegmentError::EmptyInput`] if `bytes` is empty,
/// [`SegmentError::ImageDecode`] if the data is not a recognized image,
/// and [`SegmentError::UnsupportedFormat`] under [`FormatPolicy::Strict`]
/// when the image is not 8-bit RGB without alpha.
pub fn decode_rgb(bytes: &[u8], policy: FormatPolicy) -> Result<RgbRaster, SegmentError> {
    if bytes.is_empty() {
        return Err(SegmentError::EmptyInput);
    }

    let image = image::load_from_memory(bytes)?;
    match policy {
        FormatPolicy::Strict => RgbRaster::from_dynamic(&image),
        FormatPolicy::Convert => Ok(RgbRaster::from(image.to_rgb8())),
    }
}

/// Packed row size in bytes, checked against overflow.
fn row_bytes(width: u32, height: u32) -> Result<usize, SegmentError> {
    usize::try_from(width)
        .ok()
        .and_then(|w| w.checked_mul(BYTES_PER_PIXEL))
        .ok_or(SegmentError::DimensionOverflow { width, height })
}

fn unsupported_format(color: ColorType) -> SegmentError {
    let channels = color.channel_count();
    SegmentError::UnsupportedFormat {
        channels,
        bits_per_sample: color.bits_per_pixel() / u16::from(channels.max(1)),
        has_alpha: color.has_alpha(),
    }
}
