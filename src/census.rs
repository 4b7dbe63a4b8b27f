//! End-to-end census loading: tracts, optional urban clip, themes, optional hex grid.

use std::collections::HashSet;

use anyhow::{Context, Result, ensure};
use polars::frame::DataFrame;
use tracing::{info, warn};

use crate::{
    catalog::{Catalog, Strategy, Theme, VarKind},
    common::RemoteSource,
    geom::Geometries,
    harmonize::{Sources, fetch_and_harmonize},
    hexgrid::{ClassifyMode, HexLayer, HexOptions, classify_columns, hex_grid, reallocate},
    settings::Settings,
    tracts::{RawTracts, TractLayer, clip, create_urban_mask, fetch_footprint, prepare_tracts},
    warehouse::WarehouseClient,
};

/// Name of the column stamped with the census year on every output row.
pub const YEAR_COLUMN: &str = "year";

/// A municipality as given by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place {
    /// 7-digit IBGE code.
    Code(u32),
    /// Free text: a code written out, or a name.
    Text(String),
    /// Municipality name and state abbreviation.
    Named { name: String, uf: String },
}

impl From<u32> for Place {
    fn from(code: u32) -> Self { Place::Code(code) }
}

impl From<&str> for Place {
    fn from(text: &str) -> Self { Place::Text(text.to_string()) }
}

impl From<(&str, &str)> for Place {
    fn from((name, uf): (&str, &str)) -> Self { Place::Named { name: name.to_string(), uf: uf.to_string() } }
}

/// Turn caller inputs into unique 7-digit codes, in input order.
/// Names are not resolved here; they are reported and skipped, as are malformed codes.
pub fn resolve_municipalities(places: &[Place]) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut codes = Vec::new();

    for place in places {
        let code = match place {
            Place::Code(code) => *code,
            Place::Text(text) => {
                let text = text.trim();
                let digits = text.strip_suffix(".0").unwrap_or(text);
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    warn!("resolution by name '{text}' is not supported, pass the 7-digit IBGE code");
                    continue;
                }
                match digits.parse::<u32>() {
                    Ok(code) => code,
                    Err(_) => {
                        warn!("could not parse place input '{text}'");
                        continue;
                    }
                }
            }
            Place::Named { name, uf } => {
                warn!("resolution by name '{name}, {uf}' is not supported, pass the 7-digit IBGE code");
                continue;
            }
        };

        if !(1_000_000..=9_999_999).contains(&code) {
            warn!("ignoring invalid IBGE code: {code}");
            continue;
        }
        if seen.insert(code) {
            codes.push(code);
        }
    }
    codes
}

/// Supplies raw tract polygons for a set of municipalities.
pub trait TractProvider {
    fn tracts(&self, munis: &[u32], year: u16) -> Result<RawTracts>;
}

/// Supplies the national urbanized-area footprint.
pub trait FootprintProvider {
    fn footprint(&self, year: u16) -> Result<Geometries>;
}

/// Footprint read from the IBGE urbanized-area study closest to the census year.
pub struct RemoteFootprint<'a> {
    source: &'a dyn RemoteSource,
}

impl<'a> RemoteFootprint<'a> {
    pub fn new(source: &'a dyn RemoteSource) -> Self { Self { source } }
}

impl FootprintProvider for RemoteFootprint<'_> {
    fn footprint(&self, year: u16) -> Result<Geometries> {
        fetch_footprint(self.source, year)
    }
}

/// Output geometry of a census load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Tract,
    Hex { resolution: u8 },
}

/// What to load and how.
#[derive(Debug, Clone)]
pub struct CensusRequest {
    pub municipalities: Vec<Place>,
    pub year: u16,
    pub themes: Vec<Theme>,
    pub strategy: Strategy,
    pub clip_urban: bool,
    pub output: Output,
    pub preserve_totals: bool,
    pub classify: ClassifyMode,
    pub hex_options: HexOptions,
}

impl CensusRequest {
    /// Basic and income themes from the archives, clipped to the urban footprint, at tract level.
    pub fn new(municipalities: Vec<Place>, year: u16) -> Self {
        Self {
            municipalities,
            year,
            themes: vec![Theme::Basic, Theme::Income],
            strategy: Strategy::Archive,
            clip_urban: true,
            output: Output::Tract,
            preserve_totals: true,
            classify: ClassifyMode::Heuristic,
            hex_options: HexOptions::default(),
        }
    }

    pub fn with_themes(mut self, themes: impl IntoIterator<Item = Theme>) -> Self {
        self.themes = themes.into_iter().collect();
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_clip_urban(mut self, clip_urban: bool) -> Self {
        self.clip_urban = clip_urban;
        self
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn with_preserve_totals(mut self, preserve_totals: bool) -> Self {
        self.preserve_totals = preserve_totals;
        self
    }

    pub fn with_classify(mut self, classify: ClassifyMode) -> Self {
        self.classify = classify;
        self
    }

    /// Grid fitting for hex output; ignored for tract output.
    pub fn with_hex_options(mut self, hex_options: HexOptions) -> Self {
        self.hex_options = hex_options;
        self
    }
}

/// The external services a load talks to.
pub struct Collaborators<'a> {
    pub tracts: &'a dyn TractProvider,
    pub footprint: Option<&'a dyn FootprintProvider>,
    pub archive: &'a dyn RemoteSource,
    pub warehouse: Option<&'a dyn WarehouseClient>,
}

/// Result of a census load.
#[derive(Debug, Clone)]
pub enum CensusLayer {
    Tracts(TractLayer),
    Hexes(HexLayer),
}

impl CensusLayer {
    pub fn data(&self) -> &DataFrame {
        match self {
            CensusLayer::Tracts(layer) => layer.data(),
            CensusLayer::Hexes(layer) => layer.data(),
        }
    }

    pub fn geoms(&self) -> &Geometries {
        match self {
            CensusLayer::Tracts(layer) => layer.geoms(),
            CensusLayer::Hexes(layer) => layer.geoms(),
        }
    }

    pub fn len(&self) -> usize { self.data().height() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn to_geojson_bytes(&self) -> Result<Vec<u8>> {
        match self {
            CensusLayer::Tracts(layer) => layer.to_geojson_bytes(),
            CensusLayer::Hexes(layer) => layer.to_geojson_bytes(),
        }
    }
}

/// Numeric attribute columns of the tract table, the candidates for interpolation.
fn numeric_attributes(layer: &TractLayer) -> Vec<String> {
    layer.attribute_columns().into_iter()
        .filter(|name| layer.data().column(name).is_ok_and(|c| c.dtype().is_numeric()))
        .collect()
}

/// Load harmonized census attributes for `request`.
///
/// Tract loading is fatal. Each theme is looked up, fetched, harmonized and left-joined on
/// the tract id; a theme that fails at any step is reported and skipped.
pub fn load_census(request: &CensusRequest, collaborators: &Collaborators<'_>, settings: &Settings) -> Result<CensusLayer> {
    let catalog = Catalog::census()?;

    let munis = resolve_municipalities(&request.municipalities);
    info!("resolved {} inputs into {} unique municipalities", request.municipalities.len(), munis.len());
    ensure!(!munis.is_empty(), "no valid municipality codes to load");

    let raw = collaborators.tracts.tracts(&munis, request.year)
        .context("failed to load census tracts")?;
    let mut layer = prepare_tracts(raw)?;

    if request.clip_urban {
        match collaborators.footprint {
            Some(provider) => {
                let footprint = provider.footprint(request.year)
                    .context("failed to load the urbanized-area footprint")?;
                let mask = match layer.bounds() {
                    Some(bbox) => create_urban_mask(&footprint, bbox, layer.epsg())?,
                    None => Geometries::new(Vec::new(), layer.epsg()),
                };
                layer = clip(&layer, &mask)?;
            }
            None => warn!("urban clip requested without a footprint provider, keeping all tracts"),
        }
    }

    let mut sources = Sources::archive(collaborators.archive);
    if request.strategy == Strategy::Warehouse {
        let client = collaborators.warehouse
            .context("warehouse strategy requested without a warehouse client")?;
        sources = sources.with_warehouse(client, settings.billing_id()?);
    }

    let mut tags: Vec<(String, VarKind)> = Vec::new();
    for &theme in &request.themes {
        info!("loading theme '{theme}'");

        let spec = match catalog.lookup(theme, request.year, request.strategy) {
            Ok(spec) => spec,
            Err(err) => {
                warn!("{err:#}, skipping");
                continue;
            }
        };

        let merged = fetch_and_harmonize(spec, &munis, &mut sources)
            .and_then(|df| layer.merge_data(&df));
        match merged {
            Ok(()) => tags.extend(spec.classification()),
            Err(err) => warn!("theme '{theme}' failed: {err:#}, skipping"),
        }
    }

    let year = i32::from(request.year);
    let out = match request.output {
        Output::Tract => {
            layer.add_constant(YEAR_COLUMN, year)?;
            CensusLayer::Tracts(layer)
        }
        Output::Hex { resolution } => {
            info!("aggregating to the H3 grid (resolution {resolution})");
            let (extensive, intensive) = classify_columns(&numeric_attributes(&layer), &tags, request.classify)?;
            let grid = hex_grid(layer.geoms(), resolution, request.hex_options)?;
            let mut hexes = reallocate(&layer, &grid, &extensive, &intensive, request.preserve_totals)?;
            hexes.add_constant(YEAR_COLUMN, year)?;
            CensusLayer::Hexes(hexes)
        }
    };

    info!("loaded census {} for {} municipalities ({} rows)", request.year, munis.len(), out.len());
    Ok(out)
}
