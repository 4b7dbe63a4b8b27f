//! Census tract geometry: id normalization, projection and repair, urban masking, attribute joins.

mod footprint;
mod id;
mod layer;
mod mask;

pub use footprint::{fetch_footprint, footprint_url, read_footprint_archive, read_tract_archive};
pub use id::{TRACT_ID_LEN, TractId, normalize_tract_id};
pub use layer::{RawTracts, TractLayer, prepare_tracts};
pub use mask::{URBAN_MASK_BUFFER_M, clip, create_urban_mask};
