use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    common::{RemoteSource, epsg_from_prj, extract_zip, field_text, find_first_file, read_polygon_shapefile},
    geom::{Geometries, SIRGAS_2000},
    tracts::RawTracts,
};

/// National urbanized-area studies, by reference year.
const URBAN_FOOTPRINTS: [(u16, &str); 3] = [
    (2005, "https://geoftp.ibge.gov.br/organizacao_do_territorio/tipologias_do_territorio/\
        areas_urbanizadas_do_brasil/2005/areas_urbanizadas_do_Brasil_2005_shapes.zip"),
    (2015, "https://geoftp.ibge.gov.br/organizacao_do_territorio/tipologias_do_territorio/\
        areas_urbanizadas_do_brasil/2015/Shape/AreasUrbanizadasDoBrasil_2015.zip"),
    (2019, "https://geoftp.ibge.gov.br/organizacao_do_territorio/tipologias_do_territorio/\
        areas_urbanizadas_do_brasil/2019/Shapefile/AreasUrbanizadas2019_Brasil.zip"),
];

/// Urbanized-area study closest to `year`, with its URL. Ties go to the older study.
pub fn footprint_url(year: u16) -> (u16, &'static str) {
    URBAN_FOOTPRINTS.iter()
        .copied()
        .min_by_key(|(epoch, _)| epoch.abs_diff(year))
        .unwrap_or(URBAN_FOOTPRINTS[URBAN_FOOTPRINTS.len() - 1])
}

/// Unpack a zipped shapefile into a scratch directory and read its polygons, records and CRS.
fn read_zipped_shapefile(bytes: &[u8]) -> Result<(Vec<(geo::MultiPolygon<f64>, shapefile::dbase::Record)>, u32)> {
    let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
    extract_zip(bytes, scratch.path())?;

    let shp = find_first_file(scratch.path(), "shp")
        .context("no .shp file found in archive")?;

    let epsg = match fs::read_to_string(shp.with_extension("prj")) {
        Ok(wkt) => epsg_from_prj(&wkt).unwrap_or_else(|| {
            warn!("unrecognized .prj for {}, assuming SIRGAS 2000", shp.display());
            SIRGAS_2000
        }),
        Err(_) => {
            warn!("no .prj next to {}, assuming SIRGAS 2000", shp.display());
            SIRGAS_2000
        }
    };

    Ok((read_polygon_shapefile(&shp)?, epsg))
}

/// Read an urbanized-area footprint from zipped shapefile bytes.
pub fn read_footprint_archive(bytes: &[u8]) -> Result<Geometries> {
    let (features, epsg) = read_zipped_shapefile(bytes)?;
    info!("loaded {} urban footprint polygons (EPSG:{epsg})", features.len());
    Ok(Geometries::new(features.into_iter().map(|(shape, _)| shape).collect(), epsg))
}

/// Read tract polygons from zipped shapefile bytes, taking each tract code from `code_field`.
pub fn read_tract_archive(bytes: &[u8], code_field: &str) -> Result<RawTracts> {
    let (features, epsg) = read_zipped_shapefile(bytes)?;

    let mut codes = Vec::with_capacity(features.len());
    let mut shapes = Vec::with_capacity(features.len());
    for (i, (shape, record)) in features.into_iter().enumerate() {
        let code = field_text(&record, code_field)
            .with_context(|| format!("tract #{i} has no '{code_field}' value"))?;
        codes.push(code);
        shapes.push(shape);
    }
    Ok(RawTracts { codes, shapes, epsg })
}

/// Fetch and read the urbanized-area study closest to `year`.
pub fn fetch_footprint(source: &dyn RemoteSource, year: u16) -> Result<Geometries> {
    let (epoch, url) = footprint_url(year);
    info!("loading urbanized areas (study {epoch}) for census {year}");
    let bytes = source.get(url)
        .with_context(|| format!("failed to download urbanized areas from {url}"))?;
    read_footprint_archive(&bytes)
}
