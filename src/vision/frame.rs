//! Camera frames and their wire encoding

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageOutputFormat, RgbImage};

/// JPEG quality used for model requests
const JPEG_QUALITY: u8 = 85;

/// A single RGB camera frame
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// All-black frame of the given size
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbImage::new(width, height))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// A frame with no pixels is treated like a failed capture
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Encode as JPEG
    pub fn to_jpeg(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(self.image.clone())
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
        Ok(bytes)
    }

    /// Encode as JPEG, then standard base64, ready for an `inline_data` part
    pub fn to_jpeg_base64(&self) -> Result<String, image::ImageError> {
        Ok(BASE64.encode(self.to_jpeg()?))
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}
