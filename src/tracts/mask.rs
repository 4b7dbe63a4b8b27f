use anyhow::Result;
use geo::{Area, BooleanOps, BoundingRect, MultiPolygon, Rect};
use tracing::{info, warn};

use crate::{
    geom::{Geometries, buffer},
    tracts::TractLayer,
};

/// Margin added around the dissolved urban footprint, in meters, to keep peri-urban tracts.
pub const URBAN_MASK_BUFFER_M: f64 = 500.0;

/// Dissolve the footprint polygons overlapping `bbox` into a single buffered mask in EPSG:`epsg`.
/// `bbox` is expressed in the target CRS. No overlapping footprint yields an empty mask.
pub fn create_urban_mask(footprint: &Geometries, bbox: Rect<f64>, epsg: u32) -> Result<Geometries> {
    let footprint = footprint.reproject(epsg)?;

    let mut hits = footprint.candidates(&bbox).collect::<Vec<_>>();
    if hits.is_empty() {
        warn!("urban footprint does not reach the tract extent, mask is empty");
        return Ok(Geometries::new(Vec::new(), epsg));
    }
    hits.sort_unstable();

    let union = footprint.subset(&hits).union();
    if union.0.is_empty() {
        return Ok(Geometries::new(Vec::new(), epsg));
    }
    info!("urban mask built from {} footprint polygons", hits.len());

    Ok(Geometries::new(vec![buffer(&union, URBAN_MASK_BUFFER_M)], epsg))
}

/// Intersect every tract with the mask, dropping tracts left with no area.
/// An empty mask keeps no tracts.
pub fn clip(tracts: &TractLayer, mask: &Geometries) -> Result<TractLayer> {
    let mask = mask.reproject(tracts.epsg())?;
    let mask_shape = if mask.len() == 1 { mask.shapes()[0].clone() } else { mask.union() };

    let mut rows = Vec::new();
    let mut shapes = Vec::new();

    if !mask_shape.0.is_empty() {
        for (i, shape) in tracts.geoms().shapes().iter().enumerate() {
            let Some(rect) = shape.bounding_rect() else { continue };
            if mask.candidates(&rect).next().is_none() {
                continue;
            }
            let clipped: MultiPolygon<f64> = shape.intersection(&mask_shape);
            if clipped.0.is_empty() || clipped.unsigned_area() <= 0.0 {
                continue;
            }
            rows.push(i);
            shapes.push(clipped);
        }
    }

    info!("retained {} of {} tracts after clip", rows.len(), tracts.len());
    tracts.with_rows(&rows, shapes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracts::{RawTracts, prepare_tracts};
    use geo::coord;

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Rect::new(coord! { x: x, y: y }, coord! { x: x + size, y: y + size }).to_polygon()])
    }

    fn tracts() -> TractLayer {
        prepare_tracts(RawTracts {
            codes: vec!["1".into(), "2".into(), "3".into()],
            shapes: vec![square(0.0, 0.0, 1000.0), square(1000.0, 0.0, 1000.0), square(10_000.0, 0.0, 1000.0)],
            epsg: 31983,
        }).unwrap()
    }

    #[test]
    fn empty_mask_clips_everything() {
        let layer = tracts();
        let mask = Geometries::new(Vec::new(), 31983);

        let clipped = clip(&layer, &mask).unwrap();

        assert_eq!(clipped.len(), 0);
        assert_eq!(clipped.data().height(), 0);
        assert_eq!(clipped.data().get_column_names(), layer.data().get_column_names());
    }

    #[test]
    fn footprint_outside_extent_gives_empty_mask() {
        let footprint = Geometries::new(vec![square(50_000.0, 50_000.0, 100.0)], 31983);
        let bbox = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2000.0, y: 1000.0 });

        let mask = create_urban_mask(&footprint, bbox, 31983).unwrap();
        assert!(mask.is_empty());
        assert_eq!(clip(&tracts(), &mask).unwrap().len(), 0);
    }

    #[test]
    fn mask_is_buffered_and_clips_tracts() {
        let footprint = Geometries::new(vec![square(900.0, 200.0, 100.0), square(5_000.0, 5_000.0, 10.0)], 31983);
        let bbox = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2000.0, y: 1000.0 });

        let mask = create_urban_mask(&footprint, bbox, 31983).unwrap();
        assert_eq!(mask.len(), 1);
        // 100 m square grown by 500 m: 100^2 + 4 * 100 * 500 + pi * 500^2
        assert!((mask.areas()[0] - 995_398.0).abs() < 5_000.0);

        let clipped = clip(&tracts(), &mask).unwrap();
        let ids = clipped.ids().iter().map(|id| id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["000000000000001", "000000000000002"]);
        assert!(clipped.geoms().areas()[0] <= 1_000_000.0 + 1e-6);
    }
}
