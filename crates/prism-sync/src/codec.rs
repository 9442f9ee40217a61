//! Preview re-encoding.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, RgbImage};

use crate::collaborators::{DecodedImage, PreviewCodec};
use crate::error::CollaboratorError;

/// [`PreviewCodec`] backed by the `image` crate. Encodes JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl PreviewCodec for ImageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CollaboratorError> {
        let rgb = image::load_from_memory(bytes)?.to_rgb8();
        Ok(DecodedImage {
            width: rgb.width(),
            height: rgb.height(),
            pixels: rgb.into_raw(),
        })
    }

    fn rescale(
        &self,
        image: &DecodedImage,
        width: u32,
        height: u32,
    ) -> Result<DecodedImage, CollaboratorError> {
        if width == 0 || height == 0 {
            return Err(CollaboratorError::InvalidData(format!(
                "cannot rescale to {width}x{height}"
            )));
        }
        let source = to_rgb_image(image)?;
        let resized = image::imageops::resize(&source, width, height, FilterType::Triangle);
        Ok(DecodedImage {
            width,
            height,
            pixels: resized.into_raw(),
        })
    }

    fn encode(&self, image: &DecodedImage, quality: u8) -> Result<Vec<u8>, CollaboratorError> {
        check_buffer(image)?;
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode(
            &image.pixels,
            image.width,
            image.height,
            ColorType::Rgb8.into(),
        )?;
        Ok(out)
    }
}

fn check_buffer(image: &DecodedImage) -> Result<(), CollaboratorError> {
    let expected = u64::from(image.width) * u64::from(image.height) * 3;
    if image.pixels.len() as u64 == expected {
        Ok(())
    } else {
        Err(CollaboratorError::InvalidData(format!(
            "RGB buffer of {} bytes does not match {}x{}",
            image.pixels.len(),
            image.width,
            image.height
        )))
    }
}

fn to_rgb_image(image: &DecodedImage) -> Result<RgbImage, CollaboratorError> {
    check_buffer(image)?;
    RgbImage::from_raw(image.width, image.height, image.pixels.clone()).ok_or_else(|| {
        CollaboratorError::InvalidData(format!("cannot build {}x{} image", image.width, image.height))
    })
}

/// Target size whose longest edge is `longest`, keeping the aspect ratio.
///
/// Images already within `longest` keep their size.
fn target_dimensions(width: u32, height: u32, longest: u32) -> (u32, u32) {
    if width.max(height) <= longest || longest == 0 {
        return (width, height);
    }
    let scale = |short: u32, long: u32| {
        let scaled = (u64::from(short) * u64::from(longest) + u64::from(long) / 2) / u64::from(long);
        u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
    };
    if width >= height {
        (longest, scale(height, width))
    } else {
        (scale(width, height), longest)
    }
}

/// Decode `bytes`, scale so the longest edge is at most `longest_dimension`,
/// and encode at `quality`.
pub fn reencode(
    codec: &dyn PreviewCodec,
    bytes: &[u8],
    longest_dimension: u32,
    quality: u8,
) -> Result<Vec<u8>, CollaboratorError> {
    let decoded = codec.decode(bytes)?;
    let (width, height) = target_dimensions(decoded.width, decoded.height, longest_dimension);
    let scaled = if (width, height) == (decoded.width, decoded.height) {
        decoded
    } else {
        codec.rescale(&decoded, width, height)?
    };
    codec.encode(&scaled, quality)
}
