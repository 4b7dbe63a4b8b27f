use ahash::AHashSet;
use anyhow::Result;
use geo::{Area, BooleanOps, BoundingRect, Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use h3o::{CellIndex, LatLng, Resolution};
use tracing::{debug, info};

use crate::{
    error::GeomError,
    geom::{Geometries, WGS84, buffer},
    hexgrid::HexLayer,
};

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Parse an H3 resolution (0-15).
pub fn parse_resolution(resolution: u8) -> Result<Resolution> {
    Resolution::try_from(resolution).map_err(|_| GeomError::InvalidResolution(resolution).into())
}

/// Cells at `res` whose center lies inside `footprint` (lon/lat degrees), sorted.
///
/// Candidates come from sampling the footprint's padded extent at half the cell edge length,
/// which is finer than any cell's inner radius, so no cell inside the extent is missed.
fn polyfill(footprint: &MultiPolygon<f64>, res: Resolution) -> Result<Vec<CellIndex>> {
    let Some(rect) = footprint.bounding_rect() else { return Ok(Vec::new()) };

    let edge = res.edge_length_m();
    let pad = edge / METERS_PER_DEGREE;
    let (min_lat, max_lat) = ((rect.min().y - pad).max(-90.0), (rect.max().y + pad).min(90.0));
    let (min_lng, max_lng) = (rect.min().x - pad, rect.max().x + pad);

    let lng_scale = min_lat.abs().max(max_lat.abs()).to_radians().cos().max(0.01);
    let dlat = edge / 2.0 / METERS_PER_DEGREE;
    let dlng = dlat / lng_scale;
    let rows = ((max_lat - min_lat) / dlat).ceil() as usize;
    let cols = ((max_lng - min_lng) / dlng).ceil() as usize;
    debug!("sampling {} points for H3 resolution {res}", (rows + 1) * (cols + 1));

    let mut seen = AHashSet::new();
    let mut cells = Vec::new();
    for r in 0..=rows {
        let lat = (min_lat + r as f64 * dlat).min(max_lat);
        for c in 0..=cols {
            let lng = (min_lng + c as f64 * dlng).min(max_lng);
            let cell = LatLng::new(lat, lng)?.to_cell(res);
            if !seen.insert(cell) {
                continue;
            }
            let center = LatLng::from(cell);
            if footprint.contains(&Point::new(center.lng(), center.lat())) {
                cells.push(cell);
            }
        }
    }
    cells.sort_unstable();
    Ok(cells)
}

/// Hexagon outline in lon/lat degrees.
fn cell_polygon(cell: CellIndex) -> MultiPolygon<f64> {
    let ring = cell.boundary().iter()
        .map(|ll| Coord { x: ll.lng(), y: ll.lat() })
        .collect::<Vec<_>>();
    MultiPolygon::new(vec![Polygon::new(LineString::from(ring), Vec::new())])
}

/// How a hexagonal grid is fitted to its source shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexOptions {
    /// Grow the source by the resolution's average edge length before selecting cells,
    /// so that cells straddling the boundary are kept.
    pub buffer_edges: bool,
    /// Cut every cell outline to the source footprint and drop cells left with no area.
    pub clip: bool,
}

impl Default for HexOptions {
    fn default() -> Self {
        Self { buffer_edges: true, clip: false }
    }
}

/// Intersect cell outlines with `footprint`, keeping cells and outlines in step.
fn clip_cells(
    cells: Vec<CellIndex>,
    outlines: Vec<MultiPolygon<f64>>,
    footprint: &MultiPolygon<f64>,
) -> (Vec<CellIndex>, Vec<MultiPolygon<f64>>) {
    let before = cells.len();
    let (cells, outlines): (Vec<_>, Vec<_>) = cells.into_iter()
        .zip(outlines)
        .filter_map(|(cell, outline)| {
            let clipped = outline.intersection(footprint);
            (!clipped.0.is_empty() && clipped.unsigned_area() > 0.0).then_some((cell, clipped))
        })
        .unzip();
    debug!("clipping kept {} of {before} hexagons", cells.len());
    (cells, outlines)
}

/// Hexagonal grid covering `source` at `resolution`, returned in the source CRS.
///
/// Cells are selected by center against the (optionally buffered) footprint; with
/// `options.clip` their outlines are then cut to the unbuffered source.
pub fn hex_grid(source: &Geometries, resolution: u8, options: HexOptions) -> Result<HexLayer> {
    let res = parse_resolution(resolution)?;

    let metric = source.to_metric()?;
    let shapes = if options.buffer_edges {
        let distance = res.edge_length_m();
        metric.shapes().iter().map(|shape| buffer(shape, distance)).collect()
    } else {
        metric.shapes().to_vec()
    };
    let footprint = Geometries::new(shapes, metric.epsg()).reproject(WGS84)?.union();

    let cells = polyfill(&footprint, res)?;
    info!("generated {} hexagons at resolution {res}", cells.len());

    let outlines = Geometries::new(cells.iter().map(|&cell| cell_polygon(cell)).collect(), WGS84)
        .reproject(source.epsg())?
        .into_shapes();

    let (cells, outlines) = if options.clip {
        clip_cells(cells, outlines, &source.union())
    } else {
        (cells, outlines)
    };

    HexLayer::new(cells, Geometries::new(outlines, source.epsg()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use geo::{Rect, coord};

    fn rio_block() -> Geometries {
        // roughly 2 km x 2 km in SIRGAS 2000 / UTM 23S
        let rect = Rect::new(coord! { x: 683_000.0, y: 7_466_000.0 }, coord! { x: 685_000.0, y: 7_468_000.0 });
        Geometries::new(vec![MultiPolygon::new(vec![rect.to_polygon()])], 31983)
    }

    #[test]
    fn grid_covers_source_in_source_crs() {
        let source = rio_block();
        let grid = hex_grid(&source, 8, HexOptions::default()).unwrap();

        assert!(!grid.is_empty());
        assert_eq!(grid.geoms().epsg(), 31983);
        assert_eq!(grid.data().height(), grid.len());
        assert!(grid.cells().iter().all(|cell| cell.resolution() == Resolution::Eight));

        // res 8 hexagons are ~0.74 km2; the buffered block is ~10 km2
        let covered: f64 = grid.geoms().areas().iter().sum();
        assert!(covered > source.areas()[0]);
    }

    #[test]
    fn unbuffered_grid_keeps_centers_inside() {
        let source = rio_block();
        let grid = hex_grid(&source, 9, HexOptions { buffer_edges: false, clip: false }).unwrap();
        let footprint = source.reproject(WGS84).unwrap().union();

        assert!(!grid.is_empty());
        for &cell in grid.cells() {
            let center = LatLng::from(cell);
            assert!(footprint.contains(&Point::new(center.lng(), center.lat())));
        }
    }

    #[test]
    fn clipped_grid_stays_inside_the_source() {
        let source = rio_block();
        let whole = hex_grid(&source, 8, HexOptions::default()).unwrap();
        let clipped = hex_grid(&source, 8, HexOptions { buffer_edges: true, clip: true }).unwrap();

        assert!(!clipped.is_empty());
        assert!(clipped.len() <= whole.len());
        assert_eq!(clipped.data().height(), clipped.len());
        assert_eq!(clipped.geoms().epsg(), 31983);

        let area: f64 = clipped.geoms().areas().iter().sum();
        assert!(area <= source.areas()[0] + 1e-3);
        assert!(area > 0.95 * source.areas()[0]);

        let bounds = source.bounds().unwrap();
        let outer = clipped.geoms().bounds().unwrap();
        assert!(outer.min().x >= bounds.min().x - 1e-6 && outer.min().y >= bounds.min().y - 1e-6);
        assert!(outer.max().x <= bounds.max().x + 1e-6 && outer.max().y <= bounds.max().y + 1e-6);
    }

    #[test]
    fn empty_source_gives_empty_grid() {
        let grid = hex_grid(&Geometries::new(Vec::new(), 31983), 8, HexOptions::default()).unwrap();
        assert!(grid.is_empty());
    }

    #[test]
    fn resolution_out_of_range() {
        let err = hex_grid(&rio_block(), 16, HexOptions::default()).unwrap_err();
        assert_matches!(err.downcast_ref::<GeomError>(), Some(GeomError::InvalidResolution(16)));
    }

    #[test]
    fn cell_outline_is_closed_hexagon() {
        let cell = LatLng::new(-22.9, -43.2).unwrap().to_cell(Resolution::Eight);
        let outline = cell_polygon(cell);
        assert!(outline.0[0].exterior().0.len() >= 7);
        assert!(outline.unsigned_area() > 0.0);
    }
}
