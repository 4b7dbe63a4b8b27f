use anyhow::{Result, ensure};
use h3o::CellIndex;
use polars::{frame::DataFrame, prelude::Column};

use crate::{
    common::write_to_geojson_bytes,
    geom::{Geometries, WGS84},
};

/// Name of the cell id column.
pub const H3_COLUMN: &str = "h3_index";

/// Hexagonal cells with their outlines and attribute table. Row `i` of `data` describes `cells[i]`.
#[derive(Debug, Clone)]
pub struct HexLayer {
    cells: Vec<CellIndex>,
    geoms: Geometries,
    data: DataFrame,
}

impl HexLayer {
    pub fn new(cells: Vec<CellIndex>, geoms: Geometries) -> Result<Self> {
        ensure!(cells.len() == geoms.len(), "{} cells but {} outlines", cells.len(), geoms.len());
        let data = DataFrame::new(vec![Column::new(
            H3_COLUMN.into(),
            cells.iter().map(|cell| cell.to_string()).collect::<Vec<_>>(),
        )])?;
        Ok(Self { cells, geoms, data })
    }

    #[inline] pub fn len(&self) -> usize { self.cells.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.cells.is_empty() }

    #[inline] pub fn cells(&self) -> &[CellIndex] { &self.cells }

    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    #[inline] pub fn epsg(&self) -> u32 { self.geoms.epsg() }

    /// Append f64 attribute columns, one value per cell.
    pub(crate) fn add_columns(&mut self, columns: Vec<(String, Vec<Option<f64>>)>) -> Result<()> {
        for (name, values) in columns {
            ensure!(values.len() == self.len(), "column '{name}' has {} values for {} cells", values.len(), self.len());
            self.data.with_column(Column::new(name.as_str().into(), values))?;
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
