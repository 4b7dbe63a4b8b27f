//! Per (theme, year) transforms from fetched rows to the canonical schema.

mod age;
mod race;

use anyhow::{Result, ensure};
use polars::frame::DataFrame;
use tracing::{debug, warn};

use crate::{
    archive::fetch_census_archive,
    catalog::{ID_COLUMN, Layout, Strategy, Theme, ThemeSpec},
    common::{RemoteSource, SessionCache, column_f64, column_strings, frame_with_id},
    warehouse::{WarehouseClient, fetch_from_warehouse},
};

/// Transform applied to a theme's raw rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Renamed counts/means: keep the id plus the catalog's canonical columns.
    Basic,
    Income,
    /// Collapse raw age columns into the canonical brackets.
    AgeBrackets,
    /// Race totals, imputing children where the layout asks for it.
    Race,
    /// Rename only.
    PassThrough,
}

/// Handler for a (theme, year) pair. Unregistered pairs pass through unchanged.
pub fn handler_for(theme: Theme, year: u16) -> Handler {
    match (theme, year) {
        (Theme::Basic, 2010 | 2022) => Handler::Basic,
        (Theme::Income, 2010 | 2022) => Handler::Income,
        (Theme::Age, 2010 | 2022) => Handler::AgeBrackets,
        (Theme::Race, 2010 | 2022) => Handler::Race,
        _ => Handler::PassThrough,
    }
}

/// Apply the catalog rename map. Columns already carrying their canonical name are left alone.
pub fn apply_renames(mut df: DataFrame, spec: &ThemeSpec) -> Result<DataFrame> {
    for (raw, canonical) in &spec.column_map {
        let present = df.get_column_names().iter().any(|c| c.as_str() == raw.as_str());
        let taken = df.get_column_names().iter().any(|c| c.as_str() == canonical.as_str());
        if present && !taken {
            df.rename(raw, canonical.as_str().into())?;
        }
    }
    Ok(df)
}

/// Id plus every canonical column the theme declares (rename targets and tagged variables) that is present.
fn select_canonical(df: &DataFrame, spec: &ThemeSpec) -> Result<Option<DataFrame>> {
    let mut names: Vec<&str> = Vec::new();
    let declared = spec.column_map.iter().map(|(_, to)| to.as_str())
        .chain(spec.extensive_vars.iter().map(String::as_str))
        .chain(spec.intensive_vars.iter().map(String::as_str));
    for name in declared {
        if name != ID_COLUMN && !names.contains(&name) {
            names.push(name);
        }
    }

    let mut columns = Vec::new();
    for name in names {
        if let Some(values) = column_f64(df, name)? {
            columns.push((name.to_string(), values));
        }
    }
    if columns.is_empty() {
        return Ok(None);
    }
    Ok(Some(frame_with_id(ID_COLUMN, column_strings(df, ID_COLUMN)?, columns)?))
}

/// Map a raw fetched frame to the canonical schema for `spec`.
/// The result always carries `id_setor_censitario`.
pub fn harmonize(df: DataFrame, spec: &ThemeSpec) -> Result<DataFrame> {
    let df = apply_renames(df, spec)?;
    ensure!(df.column(ID_COLUMN).is_ok(), "harmonize: input has no '{ID_COLUMN}' column");

    let handler = handler_for(spec.theme, spec.year);
    debug!("harmonizing {} {} with {handler:?}", spec.theme, spec.year);

    let out = match (handler, &spec.layout) {
        (Handler::AgeBrackets, Layout::AgeBrackets(layout)) => age::age_brackets(&df, layout)?,
        (Handler::Race, Layout::RaceImputation(layout)) => race::impute_race(&df, layout)?,
        (Handler::Race, _) => Some(race::select_race_columns(&df)?),
        (Handler::Basic | Handler::Income, _) => select_canonical(&df, spec)?,
        (Handler::AgeBrackets, _) => {
            debug!("no age layout for {} {}, passing through", spec.theme, spec.year);
            None
        }
        (Handler::PassThrough, _) => None,
    };

    match out {
        Some(out) => Ok(out),
        None => {
            if matches!(handler, Handler::Basic | Handler::Income) {
                warn!("{} {}: nothing to harmonize, returning renamed input", spec.theme, spec.year);
            }
            Ok(df)
        }
    }
}

/// Where theme rows come from during one run.
pub struct Sources<'a> {
    pub archive: &'a dyn RemoteSource,
    pub warehouse: Option<&'a dyn WarehouseClient>,
    pub billing_id: Option<&'a str>,
    pub session: SessionCache,
}

impl<'a> Sources<'a> {
    /// Archive-only sources.
    pub fn archive(archive: &'a dyn RemoteSource) -> Self {
        Self { archive, warehouse: None, billing_id: None, session: SessionCache::new() }
    }

    pub fn with_warehouse(mut self, client: &'a dyn WarehouseClient, billing_id: &'a str) -> Self {
        self.warehouse = Some(client);
        self.billing_id = Some(billing_id);
        self
    }
}

/// Fetch a theme for the requested municipalities and harmonize it.
pub fn fetch_and_harmonize(spec: &ThemeSpec, munis: &[u32], sources: &mut Sources<'_>) -> Result<DataFrame> {
    let raw = match spec.strategy {
        Strategy::Warehouse => {
            let (Some(client), Some(billing_id)) = (sources.warehouse, sources.billing_id) else {
                anyhow::bail!("theme '{}' needs a warehouse client and billing project", spec.theme);
            };
            fetch_from_warehouse(client, spec, munis, billing_id)?
        }
        Strategy::Archive => fetch_census_archive(spec, munis, sources.archive, &mut sources.session)?,
    };
    harmonize(raw, spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AGE_BRACKETS, Catalog};
    use polars::prelude::Column;

    #[test]
    fn dispatch_defaults_to_pass_through() {
        assert_eq!(handler_for(Theme::Age, 2010), Handler::AgeBrackets);
        assert_eq!(handler_for(Theme::Race, 2022), Handler::Race);
        assert_eq!(handler_for(Theme::Income, 2000), Handler::PassThrough);
    }

    #[test]
    fn renames_are_idempotent() {
        let catalog = Catalog::census().unwrap();
        let spec = catalog.lookup(Theme::Basic, 2022, Strategy::Warehouse).unwrap();
        let df = DataFrame::new(vec![
            Column::new(ID_COLUMN.into(), vec!["330455705000001"]),
            Column::new("pessoas".into(), vec![10.0]),
            Column::new("domicilios".into(), vec![4.0]),
        ]).unwrap();

        let once = apply_renames(df, spec).unwrap();
        let twice = apply_renames(once.clone(), spec).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.get_column_names(), vec![ID_COLUMN, "habitantes", "total_domicilios"]);
    }

    #[test]
    fn basic_keeps_only_canonical_columns() {
        let catalog = Catalog::census().unwrap();
        let spec = catalog.lookup(Theme::Basic, 2010, Strategy::Warehouse).unwrap();
        let df = DataFrame::new(vec![
            Column::new(ID_COLUMN.into(), vec!["330455705000001"]),
            Column::new("v001".into(), vec![3.0]),
            Column::new("v002".into(), vec![10.0]),
            Column::new("v999".into(), vec![1.0]),
        ]).unwrap();

        let out = harmonize(df, spec).unwrap();
        assert_eq!(out.get_column_names(), vec![ID_COLUMN, "domicilios", "habitantes"]);
    }

    #[test]
    fn age_2010_archive_rows_become_brackets() {
        let catalog = Catalog::census().unwrap();
        let spec = catalog.lookup(Theme::Age, 2010, Strategy::Archive).unwrap();
        let df = DataFrame::new(vec![
            Column::new(ID_COLUMN.into(), vec!["330455705000001"]),
            Column::new("V022".into(), vec![1.0]),
            Column::new("V040".into(), vec![2.0]),
            Column::new("V050".into(), vec![3.0]),
            Column::new("V060".into(), vec![4.0]),
            Column::new("V120".into(), vec![5.0]),
        ]).unwrap();

        let out = harmonize(df, spec).unwrap();

        assert_eq!(out.get_column_names()[1..], AGE_BRACKETS);
        let sums = AGE_BRACKETS.iter()
            .map(|b| out.column(b).unwrap().f64().unwrap().get(0).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(sums, vec![3.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn archive_age_2022_passes_through() {
        let catalog = Catalog::census().unwrap();
        let spec = catalog.lookup(Theme::Age, 2022, Strategy::Archive).unwrap();
        let df = DataFrame::new(vec![
            Column::new(ID_COLUMN.into(), vec!["330455705000001"]),
            Column::new("V00644".into(), vec![1.0]),
        ]).unwrap();

        let out = harmonize(df.clone(), spec).unwrap();
        assert_eq!(out, df);
    }
}
