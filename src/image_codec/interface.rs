use crate::error::CodecError;
use image::{DynamicImage, RgbImage};

pub trait ImageCodec {
    /// Fails with [`CodecError::Decode`] on malformed or unsupported bytes.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError>;

    fn encode(&self, image: &RgbImage) -> Result<Vec<u8>, CodecError>;
}
