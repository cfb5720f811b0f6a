//! Encoding primitives for the compression engine.
//!
//! JPEG encoding goes through mozjpeg (progressive, optimized coding); WebP
//! is used when the source carries a meaningful alpha channel, since lossy
//! JPEG would flatten it.

use image::{DynamicImage, GenericImageView};

/// Output format for compressed images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    WebP,
}

impl OutputFormat {
    pub fn to_mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }
}

/// Select the output format for an image: alpha-carrying sources keep their
/// transparency via WebP, everything else becomes JPEG.
pub fn select_format(img: &DynamicImage) -> OutputFormat {
    if has_meaningful_alpha(img) {
        OutputFormat::WebP
    } else {
        OutputFormat::Jpeg
    }
}

/// Check if image has meaningful alpha channel (not fully opaque)
pub fn has_meaningful_alpha(img: &DynamicImage) -> bool {
    // Only check if image format supports alpha
    match img {
        DynamicImage::ImageRgba8(_) | DynamicImage::ImageRgba16(_) | DynamicImage::ImageRgba32F(_) => {
            let rgba = img.to_rgba8();
            let (width, height) = img.dimensions();

            // Sample alpha channel (every 10th pixel for performance)
            for y in (0..height).step_by(10) {
                for x in (0..width).step_by(10) {
                    let pixel = rgba.get_pixel(x, y);
                    if pixel[3] < 255 {
                        return true;
                    }
                }
            }
            false
        }
        _ => false,
    }
}

/// Encode an image at the given quality (0-100).
pub fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<u8>, std::io::Error> {
    match format {
        OutputFormat::Jpeg => encode_jpeg(img, quality),
        OutputFormat::WebP => Ok(encode_webp(img, quality)),
    }
}

/// Encode to JPEG using mozjpeg
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, std::io::Error> {
    let rgb_img = img.to_rgb8();
    let (width, height) = rgb_img.dimensions();

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(quality as f32);
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);

    let mut comp = comp.start_compress(Vec::new())?;
    comp.write_scanlines(&rgb_img)?;
    comp.finish()
}

/// Encode to WebP (lossy, preserves alpha)
fn encode_webp(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let (width, height) = img.dimensions();
    let rgba_img = img.to_rgba8();

    let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
    let webp_data = encoder.encode(quality as f32);
    webp_data.to_vec()
}
