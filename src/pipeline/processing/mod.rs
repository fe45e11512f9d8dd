pub mod catalog;
pub mod normalize;
