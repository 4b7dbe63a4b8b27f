//! SQL warehouse adapter: query construction and id normalization of the returned rows.

use anyhow::{Context, Result, ensure};
use polars::{frame::DataFrame, prelude::{Column, DataType}};
use tracing::info;

use crate::{
    catalog::{ID_COLUMN, ThemeSpec},
    tracts::normalize_tract_id,
};

/// Executes a SQL query against the analytical warehouse, billing `billing_project`.
pub trait WarehouseClient {
    fn read_sql(&self, query: &str, billing_project: &str) -> Result<DataFrame>;
}

/// Raw columns selected for a warehouse theme: required columns, or the rename sources when none are listed.
fn select_columns(spec: &ThemeSpec) -> Vec<&str> {
    let raw: Vec<&str> = if spec.required_columns.is_empty() {
        spec.column_map.iter().map(|(raw, _)| raw.as_str()).collect()
    } else {
        spec.required_columns.iter().map(String::as_str).collect()
    };

    let mut out: Vec<&str> = Vec::with_capacity(raw.len());
    for name in raw {
        if name != ID_COLUMN && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

/// Build the tract-level query for `spec`, restricted to the 7-digit municipality prefixes.
pub fn build_query(spec: &ThemeSpec, munis: &[u32]) -> Result<String> {
    let table = spec.table_id.as_deref()
        .with_context(|| format!("theme '{}' ({}) has no warehouse table", spec.theme, spec.year))?;
    ensure!(!munis.is_empty(), "no municipalities requested");

    let columns = select_columns(spec);
    ensure!(!columns.is_empty(), "theme '{}' ({}) selects no columns", spec.theme, spec.year);

    let codes = munis.iter().map(|m| format!("'{m:07}'")).collect::<Vec<_>>().join(", ");

    Ok(format!(
        "SELECT {ID_COLUMN}, {} FROM `{table}` WHERE SUBSTR({ID_COLUMN}, 1, 7) IN ({codes})",
        columns.join(", "),
    ))
}

/// Run the theme query and return its rows with normalized 15-digit ids.
pub fn fetch_from_warehouse(
    client: &dyn WarehouseClient,
    spec: &ThemeSpec,
    munis: &[u32],
    billing_project: &str,
) -> Result<DataFrame> {
    let query = build_query(spec, munis)?;
    info!("querying warehouse for {} {} ({} municipalities)", spec.theme, spec.year, munis.len());

    let mut df = client.read_sql(&query, billing_project)
        .with_context(|| format!("warehouse query failed for theme '{}' ({})", spec.theme, spec.year))?;

    let ids = df.column(ID_COLUMN)
        .with_context(|| format!("warehouse result has no '{ID_COLUMN}' column"))?
        .cast(&DataType::String)?;
    let ids = ids.str()?.into_iter()
        .map(|id| id.map(normalize_tract_id).transpose())
        .collect::<Result<Vec<Option<String>>>>()?;

    df.with_column(Column::new(ID_COLUMN.into(), ids))?;
    Ok(df)
}
