use anyhow::{Result, bail};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::{self as shp, PolygonRing, Shape};

/// Planar access to the shapefile point flavours (Z and M are ignored).
pub trait PlanarPoint {
    fn xy(&self) -> (f64, f64);
}

impl PlanarPoint for shp::Point { fn xy(&self) -> (f64, f64) { (self.x, self.y) } }
impl PlanarPoint for shp::PointM { fn xy(&self) -> (f64, f64) { (self.x, self.y) } }
impl PlanarPoint for shp::PointZ { fn xy(&self) -> (f64, f64) { (self.x, self.y) } }

/// Convert shapefile polygon rings into a geo MultiPolygon.
/// Rings arrive as `Outer` followed by its `Inner` holes; a hole with no
/// preceding outer ring is dropped.
pub fn shp_to_geo<P: PlanarPoint>(rings: &[PolygonRing<P>]) -> MultiPolygon<f64> {
    fn ring_to_linestring<P: PlanarPoint>(points: &[P]) -> LineString<f64> {
        let mut coords: Vec<Coord<f64>> = points.iter()
            .map(|pt| { let (x, y) = pt.xy(); Coord { x, y } })
            .collect();
        if coords.first() != coords.last() {
            if let Some(&first) = coords.first() { coords.push(first) }
        }
        LineString(coords)
    }

    let mut polys = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => {
                if let Some(ext) = exterior.take() {
                    polys.push(Polygon::new(ext, std::mem::take(&mut holes)));
                }
                exterior = Some(ring_to_linestring(points));
            }
            PolygonRing::Inner(points) => {
                if exterior.is_some() {
                    holes.push(ring_to_linestring(points));
                }
            }
        }
    }
    if let Some(ext) = exterior {
        polys.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polys)
}

/// Coerce a generic shape into an owned multipolygon, failing on non-areal shapes.
pub fn shape_to_multipolygon(shape: Shape) -> Result<MultiPolygon<f64>> {
    match shape {
        Shape::Polygon(polygon) => Ok(shp_to_geo(polygon.rings())),
        Shape::PolygonM(polygon) => Ok(shp_to_geo(polygon.rings())),
        Shape::PolygonZ(polygon) => Ok(shp_to_geo(polygon.rings())),
        Shape::NullShape => Ok(MultiPolygon(vec![])),
        other => bail!("found non-polygon shape in layer: {:?}", other.shapetype()),
    }
}
