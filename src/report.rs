pub mod impl_text;
pub mod interface;
