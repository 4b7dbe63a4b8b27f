use anyhow::{Context, Result, ensure};
use geo::MultiPolygon;
use polars::{frame::DataFrame, prelude::DataType};
use serde_json::{Map, Value, json};

/// Convert a MultiPolygon into GeoJSON coordinates: `[[exterior, hole, ...], ...]`.
fn multipolygon_coords(mp: &MultiPolygon<f64>) -> Value {
    let polygons = mp.0.iter()
        .map(|polygon| {
            let rings = std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(|ring| ring.coords().map(|c| json!([c.x, c.y])).collect::<Vec<_>>())
                .collect::<Vec<_>>();
            json!(rings)
        })
        .collect::<Vec<_>>();
    json!(polygons)
}

/// Turn every row of `data` into a JSON property map (strings stay strings, the rest become numbers).
fn row_properties(data: &DataFrame) -> Result<Vec<Map<String, Value>>> {
    let mut rows = vec![Map::new(); data.height()];

    for column in data.get_columns() {
        let name = column.name().to_string();
        if column.dtype() == &DataType::String {
            for (row, value) in rows.iter_mut().zip(column.str()?.into_iter()) {
                row.insert(name.clone(), value.map_or(Value::Null, |s| json!(s)));
            }
        } else {
            let values = column.cast(&DataType::Float64)
                .with_context(|| format!("[io::geojson] column '{name}' is not numeric"))?;
            for (row, value) in rows.iter_mut().zip(values.f64()?.into_iter()) {
                row.insert(name.clone(), value.map_or(Value::Null, |v| json!(v)));
            }
        }
    }
    Ok(rows)
}

/// Write geometries and their attribute rows to GeoJSON FeatureCollection bytes.
pub(crate) fn write_to_geojson_bytes(geoms: &[MultiPolygon<f64>], data: &DataFrame) -> Result<Vec<u8>> {
    ensure!(geoms.len() == data.height(),
        "[io::geojson] {} geometries but {} data rows", geoms.len(), data.height());

    let features = geoms.iter()
        .zip(row_properties(data)?)
        .map(|(mp, properties)| json!({
            "type": "Feature",
            "geometry": { "type": "MultiPolygon", "coordinates": multipolygon_coords(mp) },
            "properties": properties,
        }))
        .collect::<Vec<_>>();

    serde_json::to_vec(&json!({ "type": "FeatureCollection", "features": features }))
        .context("[io::geojson] failed to serialize GeoJSON")
}
