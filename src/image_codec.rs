pub mod impl_image_rs;
pub mod interface;
