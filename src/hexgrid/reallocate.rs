use anyhow::{Result, bail};
use geo::{Area, BoundingRect};
use polars::frame::DataFrame;
use tracing::{debug, info, warn};

use crate::{
    common::column_f64,
    geom::{Geometries, intersection_area},
    hexgrid::HexLayer,
    tracts::TractLayer,
};

/// Overlap between source shape `source` and target shape `target`.
#[derive(Debug, Clone, Copy)]
struct Overlap {
    source: usize,
    target: usize,
    area: f64,
}

/// Source/target pairs with positive intersection area, found through the target R-tree.
fn overlaps(source: &Geometries, target: &Geometries) -> Vec<Overlap> {
    let mut pairs = Vec::new();
    for (i, shape) in source.shapes().iter().enumerate() {
        let Some(rect) = shape.bounding_rect() else { continue };
        for j in target.candidates(&rect) {
            let area = intersection_area(shape, &target.shapes()[j]);
            if area > 0.0 {
                pairs.push(Overlap { source: i, target: j, area });
            }
        }
    }
    pairs
}

/// Areal-weighted estimates of source attributes on target shapes.
///
/// Extensive values (counts) are split by the share of each source's area falling in each target.
/// Shares are taken over the source's full area, or over its covered part when `preserve_totals`,
/// in which case the result is also rescaled so its total equals the source total.
/// Intensive values (means, rates) become the overlap-area-weighted mean of the non-null sources;
/// targets touching no such source get null.
pub(crate) fn interpolate(
    source: &Geometries,
    data: &DataFrame,
    target: &Geometries,
    extensive: &[String],
    intensive: &[String],
    preserve_totals: bool,
) -> Result<Vec<(String, Vec<Option<f64>>)>> {
    if data.height() != source.len() {
        bail!("{} source rows but {} source shapes", data.height(), source.len());
    }

    let source = if source.epsg() != target.epsg() {
        info!("reprojecting source (EPSG:{}) to the target CRS (EPSG:{})", source.epsg(), target.epsg());
        source.reproject(target.epsg())?
    } else {
        source.clone()
    };

    let pairs = overlaps(&source, target);
    debug!("{} source/target overlaps", pairs.len());

    let denominators = if preserve_totals {
        let mut covered = vec![0.0; source.len()];
        for pair in &pairs {
            covered[pair.source] += pair.area;
        }
        covered
    } else {
        source.shapes().iter().map(|shape| shape.unsigned_area()).collect()
    };

    let mut columns = Vec::with_capacity(extensive.len() + intensive.len());

    for name in extensive {
        let Some(values) = column_f64(data, name)? else {
            warn!("extensive column '{name}' not found, skipping");
            continue;
        };

        let mut estimates = vec![0.0; target.len()];
        for pair in &pairs {
            let den = denominators[pair.source];
            if den > 0.0 {
                estimates[pair.target] += values[pair.source].unwrap_or(0.0) * pair.area / den;
            }
        }

        if preserve_totals {
            let source_total: f64 = values.iter().flatten().sum();
            let allocated: f64 = estimates.iter().sum();
            if allocated > 0.0 {
                let scale = source_total / allocated;
                estimates.iter_mut().for_each(|v| *v *= scale);
            } else if source_total != 0.0 {
                warn!("'{name}': no source area overlaps the target, total of {source_total} not allocated");
            }
        }

        columns.push((name.clone(), estimates.into_iter().map(Some).collect()));
    }

    for name in intensive {
        let Some(values) = column_f64(data, name)? else {
            warn!("intensive column '{name}' not found, skipping");
            continue;
        };

        let mut weighted = vec![0.0; target.len()];
        let mut weights = vec![0.0; target.len()];
        for pair in &pairs {
            if let Some(value) = values[pair.source] {
                weighted[pair.target] += value * pair.area;
                weights[pair.target] += pair.area;
            }
        }

        let estimates = weighted.into_iter().zip(weights)
            .map(|(sum, weight)| (weight > 0.0).then(|| sum / weight))
            .collect();
        columns.push((name.clone(), estimates));
    }

    Ok(columns)
}

/// Re-express tract attributes on a hex grid by areal weighting.
/// The tract layer is reprojected to the grid CRS when they differ.
pub fn reallocate(
    source: &TractLayer,
    target: &HexLayer,
    extensive: &[String],
    intensive: &[String],
    preserve_totals: bool,
) -> Result<HexLayer> {
    let columns = interpolate(source.geoms(), source.data(), target.geoms(), extensive, intensive, preserve_totals)?;

    let mut out = target.clone();
    out.add_columns(columns)?;
    info!("interpolated {} tracts onto {} hexagons", source.len(), out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, Rect, coord};
    use polars::prelude::Column;

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Rect::new(coord! { x: x, y: y }, coord! { x: x + size, y: y + size }).to_polygon()])
    }

    /// Two 2x2 sources side by side; targets are a 1x2 strip, a 2x2 square straddling both sources, and one far away.
    fn fixture() -> (Geometries, DataFrame, Geometries) {
        let source = Geometries::new(vec![square(0.0, 0.0, 2.0), square(2.0, 0.0, 2.0)], 31983);
        let data = DataFrame::new(vec![
            Column::new("habitantes".into(), vec![Some(100.0), Some(40.0)]),
            Column::new("rendimento_medio".into(), vec![Some(1000.0), None]),
        ]).unwrap();
        let target = Geometries::new(vec![
            MultiPolygon::new(vec![Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 2.0 }).to_polygon()]),
            MultiPolygon::new(vec![Rect::new(coord! { x: 1.0, y: 0.0 }, coord! { x: 3.0, y: 2.0 }).to_polygon()]),
            square(50.0, 50.0, 1.0),
        ], 31983);
        (source, data, target)
    }

    fn column<'a>(columns: &'a [(String, Vec<Option<f64>>)], name: &str) -> &'a [Option<f64>] {
        &columns.iter().find(|(n, _)| n == name).unwrap().1
    }

    fn assert_close(actual: &[Option<f64>], expected: &[Option<f64>]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            match (a, e) {
                (Some(a), Some(e)) => assert!((a - e).abs() < 1e-6, "{actual:?} != {expected:?}"),
                _ => assert_eq!(a, e),
            }
        }
    }

    #[test]
    fn extensive_split_by_area_share() {
        let (source, data, target) = fixture();
        let out = interpolate(&source, &data, &target, &["habitantes".into()], &[], false).unwrap();

        // source 0: half in target 0, half in target 1; source 1: half in target 1, half uncovered
        assert_close(column(&out, "habitantes"), &[Some(50.0), Some(70.0), Some(0.0)]);
    }

    #[test]
    fn preserve_totals_conserves_mass() {
        let (source, data, target) = fixture();
        let out = interpolate(&source, &data, &target, &["habitantes".into()], &[], true).unwrap();

        let total: f64 = column(&out, "habitantes").iter().flatten().sum();
        assert!(((total - 140.0) / 140.0).abs() < 1e-6);
    }

    #[test]
    fn intensive_is_area_weighted_mean_and_null_without_overlap() {
        let (source, data, target) = fixture();
        let out = interpolate(&source, &data, &target, &[], &["rendimento_medio".into()], true).unwrap();

        // the null source does not dilute target 1
        assert_close(column(&out, "rendimento_medio"), &[Some(1000.0), Some(1000.0), None]);
    }

    #[test]
    fn row_count_must_match_shapes() {
        let (source, data, target) = fixture();
        let data = data.head(Some(1));
        assert!(interpolate(&source, &data, &target, &[], &[], false).is_err());
    }
}
