use std::collections::hash_map::Entry;

use ahash::AHashMap;
use anyhow::{Context, Result, ensure};
use geo::{MultiPolygon, Rect};
use polars::{frame::DataFrame, prelude::{Column, DataType, IdxCa, IdxSize, NewChunkedArray}};
use tracing::{debug, info, warn};

use crate::{
    catalog::ID_COLUMN,
    common::{column_f64, column_strings, write_to_geojson_bytes},
    geom::{Geometries, WGS84, repair},
    tracts::TractId,
};

/// Tract geometry as delivered by a provider: codes in any spelling, shapes in any supported CRS.
#[derive(Debug, Clone)]
pub struct RawTracts {
    pub codes: Vec<String>,
    pub shapes: Vec<MultiPolygon<f64>>,
    pub epsg: u32,
}

impl From<TractLayer> for RawTracts {
    fn from(layer: TractLayer) -> Self {
        let epsg = layer.geoms.epsg();
        Self {
            codes: layer.ids.into_iter().map(|id| id.to_string()).collect(),
            shapes: layer.geoms.into_shapes(),
            epsg,
        }
    }
}

/// Census tracts in a metric CRS with their attribute table.
/// `data` row `i` describes `ids[i]` and `geoms.shapes()[i]`.
#[derive(Debug, Clone)]
pub struct TractLayer {
    ids: Vec<TractId>,
    geoms: Geometries,
    data: DataFrame,
}

impl TractLayer {
    /// Assemble a layer; `data` starts as the id column alone.
    pub fn new(ids: Vec<TractId>, geoms: Geometries) -> Result<Self> {
        ensure!(ids.len() == geoms.len(), "{} tract ids but {} geometries", ids.len(), geoms.len());
        let data = DataFrame::new(vec![Column::new(
            ID_COLUMN.into(),
            ids.iter().map(TractId::as_str).collect::<Vec<_>>(),
        )])?;
        Ok(Self { ids, geoms, data })
    }

    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    #[inline] pub fn ids(&self) -> &[TractId] { &self.ids }

    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    #[inline] pub fn epsg(&self) -> u32 { self.geoms.epsg() }

    #[inline] pub fn bounds(&self) -> Option<Rect<f64>> { self.geoms.bounds() }

    /// Attribute column names, without the id.
    pub fn attribute_columns(&self) -> Vec<String> {
        self.data.get_column_names().into_iter()
            .filter(|name| name.as_str() != ID_COLUMN)
            .map(|name| name.to_string())
            .collect()
    }

    /// Keep the rows at `rows`, in order, replacing their shapes.
    pub(crate) fn with_rows(&self, rows: &[usize], shapes: Vec<MultiPolygon<f64>>) -> Result<Self> {
        let idx = IdxCa::from_vec("idx".into(), rows.iter().map(|&r| r as IdxSize).collect());
        Ok(Self {
            ids: rows.iter().map(|&r| self.ids[r].clone()).collect(),
            geoms: Geometries::new(shapes, self.epsg()),
            data: self.data.take(&idx)?,
        })
    }

    /// Left-join `df` on `id_setor_censitario`. Unmatched tracts get nulls; duplicate ids in `df` keep their first row.
    pub fn merge_data(&mut self, df: &DataFrame) -> Result<()> {
        let keys = column_strings(df, ID_COLUMN)?;
        let mut rows: AHashMap<&str, usize> = AHashMap::with_capacity(keys.len());
        let mut duplicates = 0usize;
        for (row, key) in keys.iter().enumerate() {
            let Some(key) = key.as_deref() else { continue };
            match rows.entry(key) {
                Entry::Occupied(_) => duplicates += 1,
                Entry::Vacant(slot) => { slot.insert(row); }
            }
        }
        if duplicates > 0 {
            warn!("{duplicates} duplicate tract ids in joined data, keeping the first row of each");
        }

        let gather = self.ids.iter().map(|id| rows.get(id.as_str()).copied()).collect::<Vec<_>>();
        let matched = gather.iter().filter(|r| r.is_some()).count();
        debug!("joined {matched} of {} tracts", self.ids.len());

        for column in df.get_columns() {
            let name = column.name().as_str();
            if name == ID_COLUMN {
                continue;
            }
            ensure!(self.data.column(name).is_err(), "column '{name}' is already present in the tract table");

            let aligned = if column.dtype().is_numeric() {
                let values = column_f64(df, name)?.unwrap_or_default();
                let values = gather.iter().map(|r| r.and_then(|r| values[r])).collect::<Vec<_>>();
                Column::new(name.into(), values)
            } else {
                let values = column.cast(&DataType::String)?;
                let values = values.str()?;
                let values = gather.iter().map(|r| r.and_then(|r| values.get(r))).collect::<Vec<_>>();
                Column::new(name.into(), values)
            };
            self.data.with_column(aligned)?;
        }
        Ok(())
    }

    /// Append a column holding `value` on every row.
    pub(crate) fn add_constant(&mut self, name: &str, value: i32) -> Result<()> {
        self.data.with_column(Column::new(name.into(), vec![value; self.len()]))?;
        Ok(())
    }

    /// GeoJSON FeatureCollection with lon/lat (WGS 84) geometry and every attribute as a property.
    pub fn to_geojson_bytes(&self) -> Result<Vec<u8>> {
        let geoms = self.geoms.reproject(WGS84)?;
        write_to_geojson_bytes(geoms.shapes(), &self.data)
    }
}

/// Standardize raw tracts: normalize codes, move geographic input to its local SIRGAS 2000 UTM zone,
/// and repair invalid shapes. Projected input keeps its CRS, so preparing twice changes nothing.
pub fn prepare_tracts(raw: RawTracts) -> Result<TractLayer> {
    ensure!(raw.codes.len() == raw.shapes.len(),
        "{} tract codes but {} geometries", raw.codes.len(), raw.shapes.len());

    let ids = raw.codes.iter()
        .map(|code| TractId::parse(code))
        .collect::<Result<Vec<_>>>()
        .context("failed to normalize tract codes")?;

    let geoms = Geometries::new(raw.shapes, raw.epsg).to_metric()?;
    let epsg = geoms.epsg();

    let mut repaired = 0usize;
    let shapes = geoms.into_shapes().into_iter()
        .map(|shape| {
            let fixed = repair(&shape);
            if fixed != shape {
                repaired += 1;
            }
            fixed
        })
        .collect();
    if repaired > 0 {
        info!("repaired {repaired} invalid tract geometries");
    }

    TractLayer::new(ids, Geometries::new(shapes, epsg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, coord, polygon};

    fn cell(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Rect::new(coord! { x: x, y: y }, coord! { x: x + size, y: y + size }).to_polygon()])
    }

    fn raw_rio() -> RawTracts {
        RawTracts {
            codes: vec!["330455705000001.0".into(), "330455705000002".into()],
            shapes: vec![cell(-43.21, -22.91, 0.01), cell(-43.20, -22.91, 0.01)],
            epsg: 4674,
        }
    }

    #[test]
    fn prepare_projects_and_normalizes() {
        let layer = prepare_tracts(raw_rio()).unwrap();

        assert_eq!(layer.epsg(), 31983);
        assert_eq!(layer.ids()[0].as_str(), "330455705000001");
        assert!(layer.ids().iter().all(|id| id.as_str().len() == 15 && id.municipality() == "3304557"));
        assert_eq!(layer.data().get_column_names(), vec![ID_COLUMN]);
    }

    #[test]
    fn prepare_is_idempotent() {
        let once = prepare_tracts(raw_rio()).unwrap();
        let twice = prepare_tracts(RawTracts::from(once.clone())).unwrap();

        assert_eq!(twice.epsg(), once.epsg());
        assert_eq!(twice.ids(), once.ids());
        assert_eq!(twice.geoms().shapes(), once.geoms().shapes());
    }

    #[test]
    fn invalid_shapes_are_repaired() {
        let bowtie = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0),
        ]]);
        let layer = prepare_tracts(RawTracts { codes: vec!["1".into()], shapes: vec![bowtie], epsg: 31983 }).unwrap();
        assert!((layer.geoms().shapes()[0].unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn merge_is_a_left_join() {
        let mut layer = prepare_tracts(raw_rio()).unwrap();
        let df = DataFrame::new(vec![
            Column::new(ID_COLUMN.into(), vec!["330455705000002", "999999999999999"]),
            Column::new("habitantes".into(), vec![20.0, 1.0]),
        ]).unwrap();

        layer.merge_data(&df).unwrap();

        let values: Vec<Option<f64>> = layer.data().column("habitantes").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![None, Some(20.0)]);
        assert_eq!(layer.attribute_columns(), vec!["habitantes"]);
        assert!(layer.merge_data(&df).is_err());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut raw = raw_rio();
        raw.codes.pop();
        assert!(prepare_tracts(raw).is_err());
    }
}
