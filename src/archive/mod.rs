//! Resolution and parsing of the per-region census archive dumps.

mod fetch;
mod listing;
mod members;
mod plan;
mod region;

pub use fetch::fetch_census_archive;
pub(crate) use fetch::concat_aligned;
pub use listing::{parse_zip_listing, pick_archive};
pub use members::match_members;
pub use plan::{ArchivePlanEntry, resolve_plan};
pub use region::*;
