pub mod description;
pub mod document;
pub mod geometry;
pub mod markup;
