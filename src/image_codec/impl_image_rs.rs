use crate::error::CodecError;
use crate::image_codec::interface::ImageCodec;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// Decodes whatever the `image` crate recognizes from the content; encodes PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodecImageRs;

impl ImageCodecImageRs {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for ImageCodecImageRs {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
        image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn encode(&self, image: &RgbImage) -> Result<Vec<u8>, CodecError> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(bytes)
    }
}
