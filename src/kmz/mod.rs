pub mod archive;
pub mod photos;
