use image::{Rgb32FImage, RgbImage, codecs::jpeg::JpegEncoder, imageops::FilterType};
use ndarray::Array4;

use crate::error::CodecError;

/// Side length of the square style image expected by the style network.
pub const STYLE_SIZE: u32 = 256;

/// JPEG quality used for stylized responses.
pub const JPEG_QUALITY: u8 = 95;

/// A decoded RGB image with `f32` samples normalized to `[0, 1]`.
///
/// Width and height are always positive.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuffer(Rgb32FImage);

impl ImageBuffer {
    /// Wraps a float image, rejecting empty ones.
    pub fn from_rgb32f(image: Rgb32FImage) -> Result<Self, CodecError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(CodecError::EmptyImage);
        }
        Ok(Self(image))
    }

    /// Normalizes an 8-bit image to `[0, 1]`.
    pub fn from_rgb8(image: &RgbImage) -> Result<Self, CodecError> {
        Self::from_rgb32f(image::DynamicImage::ImageRgb8(image.clone()).to_rgb32f())
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Interleaved RGB samples, row-major.
    pub fn as_slice(&self) -> &[f32] {
        self.0.as_raw()
    }

    /// Returns a bicubic resized copy of exactly `width` x `height`.
    ///
    /// Bicubic overshoots near sharp edges; samples are clamped back to `[0, 1]`.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        let mut resized = image::imageops::resize(&self.0, width, height, FilterType::CatmullRom);
        for sample in resized.iter_mut() {
            *sample = sample.clamp(0.0, 1.0);
        }
        Self(resized)
    }

    /// Wraps the pixels with a leading batch axis: `[1, H, W, 3]`.
    pub fn to_batched_tensor(&self) -> Result<Array4<f32>, CodecError> {
        let shape = (1, self.height() as usize, self.width() as usize, 3);
        Array4::from_shape_vec(shape, self.0.as_raw().clone())
            .map_err(|e| CodecError::Tensor(e.to_string()))
    }
}

/// Decodes an uploaded image in any supported format into RGB.
pub fn decode(bytes: &[u8]) -> Result<ImageBuffer, CodecError> {
    let image = image::load_from_memory(bytes).map_err(CodecError::Decode)?;
    ImageBuffer::from_rgb32f(image.to_rgb32f())
}

/// Resizes a style image to the `STYLE_SIZE` square the style network expects.
pub fn resize_style(style: &ImageBuffer) -> ImageBuffer {
    if style.width() == STYLE_SIZE && style.height() == STYLE_SIZE {
        return style.clone();
    }
    style.resized(STYLE_SIZE, STYLE_SIZE)
}

/// Encodes an 8-bit RGB image as JPEG. `quality` is clamped to `1..=100`.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(CodecError::Encode)?;
    Ok(bytes)
}
