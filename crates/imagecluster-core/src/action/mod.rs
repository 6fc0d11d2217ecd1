//! Materializing a clustering result: link trees on disk and mosaics in memory.

mod links;
mod mosaic;

pub use links::materialize;
pub use mosaic::render;
