pub mod checkpoint;
pub mod impl_burn;
pub mod impl_fake;
pub mod interface;
pub mod layers;
pub mod network;
pub mod preprocess;
