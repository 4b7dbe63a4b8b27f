#![doc = "Harmonized Brazilian census data on tracts and hexagonal grids"]
mod archive;
mod catalog;
mod census;
mod common;
mod error;
mod geom;
mod harmonize;
mod hexgrid;
mod settings;
mod tracts;
mod warehouse;

#[doc(inline)]
pub use catalog::{
    AGE_BRACKETS, AgeLayout, ArchiveNaming, ArchiveResource, Catalog, Encoding, ID_COLUMN, Layout, RACES,
    RaceLayout, Strategy, Theme, ThemeSpec, Under15, VarKind, race_column,
};

#[doc(inline)]
pub use archive::{
    ArchivePlanEntry, FuzzyName, REGION_SPLITS, RegionSplit, STATES, Selector, StemPart, fetch_census_archive,
    match_members, parse_zip_listing, pick_archive, required_states, resolve_plan, state_code, state_of,
    stems_for_region,
};

#[doc(inline)]
pub use harmonize::{Handler, Sources, apply_renames, fetch_and_harmonize, handler_for, harmonize};

#[doc(inline)]
pub use warehouse::{WarehouseClient, build_query, fetch_from_warehouse};

#[doc(inline)]
pub use geom::{Geometries, SIRGAS_2000, WGS84, is_geographic, utm_epsg_for};

#[doc(inline)]
pub use tracts::{
    RawTracts, TRACT_ID_LEN, TractId, TractLayer, URBAN_MASK_BUFFER_M, clip, create_urban_mask, fetch_footprint,
    footprint_url, normalize_tract_id, prepare_tracts, read_footprint_archive, read_tract_archive,
};

#[doc(inline)]
pub use hexgrid::{
    ClassifyMode, H3_COLUMN, HexLayer, HexOptions, classify_columns, hex_grid, parse_resolution, reallocate,
};

#[doc(inline)]
pub use census::{
    CensusLayer, CensusRequest, Collaborators, FootprintProvider, Output, Place, RemoteFootprint, TractProvider,
    YEAR_COLUMN, load_census, resolve_municipalities,
};

#[doc(inline)]
pub use common::{MemSource, RemoteSource, SessionCache};

#[cfg(feature = "download")]
#[doc(inline)]
pub use common::{HttpSource, url_to_filename};

#[doc(inline)]
pub use error::{ArchiveError, CatalogError, GeomError};

#[doc(inline)]
pub use settings::{ENV_BILLING_ID, ENV_CACHE_DIR, Settings, configure_logging};
