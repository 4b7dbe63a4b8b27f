//! Hexagonal (H3) grids and areal-weighted interpolation onto them.

mod classify;
mod grid;
mod layer;
mod reallocate;

pub use classify::{ClassifyMode, classify_columns};
pub use grid::{HexOptions, hex_grid, parse_resolution};
pub use layer::{H3_COLUMN, HexLayer};
pub use reallocate::reallocate;
