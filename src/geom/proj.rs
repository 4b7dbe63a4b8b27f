use anyhow::{Context, Result};
use geo::{Coord, MultiPolygon, MapCoords};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::{error::GeomError, geom::Geometries};

/// SIRGAS 2000 geographic (lon/lat), the national datum for Brazilian census geometry.
pub const SIRGAS_2000: u32 = 4674;

/// WGS 84 geographic (lon/lat), the datum H3 cells are defined on.
pub const WGS84: u32 = 4326;

/// True for lon/lat CRSs, whose coordinates are degrees.
#[inline]
pub fn is_geographic(epsg: u32) -> bool {
    matches!(epsg, SIRGAS_2000 | WGS84)
}

/// PROJ.4 definition for the CRSs the pipeline handles.
/// SIRGAS 2000 UTM: 31971-31976 (17N-22N), 31977-31985 (17S-25S). WGS 84 UTM: 326zz / 327zz.
pub(crate) fn proj4_for(epsg: u32) -> Result<String, GeomError> {
    let sirgas = "+ellps=GRS80 +towgs84=0,0,0";
    Ok(match epsg {
        SIRGAS_2000 => format!("+proj=longlat {sirgas} +no_defs +type=crs"),
        WGS84 => "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
        31971..=31976 => format!("+proj=utm +zone={} {sirgas} +units=m +no_defs +type=crs", epsg - 31954),
        31977..=31985 => format!("+proj=utm +zone={} +south {sirgas} +units=m +no_defs +type=crs", epsg - 31960),
        32601..=32660 => format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs +type=crs", epsg - 32600),
        32701..=32760 => format!("+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs +type=crs", epsg - 32700),
        other => return Err(GeomError::UnsupportedCrs(other)),
    })
}

/// Metric CRS for data centered at `center` (lon/lat degrees).
/// SIRGAS 2000 UTM where the datum defines the zone, WGS 84 UTM elsewhere.
pub fn utm_epsg_for(center: Coord<f64>) -> u32 {
    let zone = (((center.x + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u32;
    match (center.y < 0.0, zone) {
        (true, 17..=25) => 31960 + zone,
        (false, 17..=22) => 31954 + zone,
        (true, _) => 32700 + zone,
        (false, _) => 32600 + zone,
    }
}

/// Reproject shapes between two supported CRSs. Geographic coordinates are degrees on both ends.
pub(crate) fn reproject_shapes(shapes: &[MultiPolygon<f64>], from: u32, to: u32) -> Result<Vec<MultiPolygon<f64>>> {
    if from == to {
        return Ok(shapes.to_vec());
    }

    let src = {
        let proj_string = proj4_for(from)?;
        Proj4::from_proj_string(&proj_string)
            .with_context(|| format!("failed to build source PROJ.4: {proj_string}"))?
    };
    let dst = {
        let proj_string = proj4_for(to)?;
        Proj4::from_proj_string(&proj_string)
            .with_context(|| format!("failed to build target PROJ.4: {proj_string}"))?
    };

    // proj4rs works in radians for lon/lat.
    let (geog_in, geog_out) = (is_geographic(from), is_geographic(to));

    shapes.iter()
        .map(|shape| shape.try_map_coords(|coord: Coord<f64>| {
            let mut point = if geog_in {
                (coord.x.to_radians(), coord.y.to_radians(), 0.0)
            } else {
                (coord.x, coord.y, 0.0)
            };
            transform(&src, &dst, &mut point).map(|()| if geog_out {
                Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
            } else {
                Coord { x: point.0, y: point.1 }
            })
        }).with_context(|| format!("CRS transform failed (EPSG:{from} -> EPSG:{to})")))
        .collect()
}

impl Geometries {
    /// Same shapes expressed in EPSG:`to`.
    pub fn reproject(&self, to: u32) -> Result<Geometries> {
        if to == self.epsg() {
            return Ok(self.clone());
        }
        Ok(Geometries::new(reproject_shapes(self.shapes(), self.epsg(), to)?, to))
    }

    /// Metric version of this layer: geographic input goes to the UTM zone of its own extent center,
    /// projected input is returned as is.
    pub fn to_metric(&self) -> Result<Geometries> {
        if !is_geographic(self.epsg()) {
            return Ok(self.clone());
        }
        let center = self.bounds().map(|b| b.center()).unwrap_or(Coord { x: -45.0, y: -15.0 });
        self.reproject(utm_epsg_for(center))
    }
}
