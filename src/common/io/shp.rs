use std::path::Path;

use anyhow::{Context, Result};
use geo::MultiPolygon;
use regex::Regex;
use shapefile::{Reader, dbase::{FieldValue, Record}};

use crate::common::shape_to_multipolygon;

/// Reads all polygons + attribute records from a given `.shp` file path.
pub(crate) fn read_polygon_shapefile(path: &Path) -> Result<Vec<(MultiPolygon<f64>, Record)>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

    reader.iter_shapes_and_records()
        .map(|result| {
            let (shape, record) = result.context("Error reading shape+record")?;
            Ok((shape_to_multipolygon(shape)?, record))
        })
        .collect()
}

/// Text form of a dBase field; numbers lose a trailing `.0`.
pub(crate) fn field_text(record: &Record, field: &str) -> Option<String> {
    let number = |n: f64| if n.fract() == 0.0 { format!("{}", n as i64) } else { n.to_string() };
    match record.get(field)? {
        FieldValue::Character(Some(s)) => Some(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) => Some(number(*n)),
        FieldValue::Float(Some(n)) => Some(number(f64::from(*n))),
        FieldValue::Double(n) => Some(number(*n)),
        FieldValue::Integer(n) => Some(n.to_string()),
        _ => None,
    }
}

/// EPSG code declared by a `.prj` (ESRI WKT) sidecar.
/// Recognizes UTM zones and SIRGAS 2000 / WGS 84 geographic systems; anything else is `None`.
pub(crate) fn epsg_from_prj(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    let sirgas = upper.contains("SIRGAS");

    if upper.starts_with("PROJCS") {
        let re = Regex::new(r"UTM[_ ]ZONE[_ ](\d{1,2})([NS])").ok()?;
        let caps = re.captures(&upper)?;
        let zone: u32 = caps[1].parse().ok()?;
        let south = &caps[2] == "S";
        return Some(match (sirgas, south) {
            (true, true) => 31960 + zone,
            (true, false) => 31954 + zone,
            (false, true) => 32700 + zone,
            (false, false) => 32600 + zone,
        });
    }

    match upper.starts_with("GEOGCS") {
        true if sirgas => Some(4674),
        true if upper.contains("WGS") => Some(4326),
        _ => None,
    }
}
