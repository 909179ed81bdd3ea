pub mod analysis;
pub mod face;
