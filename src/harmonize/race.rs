//! Race totals, including the child imputation for tables that only break race down for 15+.

use ahash::AHashMap;
use anyhow::Result;
use polars::frame::DataFrame;
use tracing::warn;

use crate::{
    catalog::{ID_COLUMN, RACES, RaceLayout, race_column},
    common::{column_f64, column_strings, frame_with_id, sum_columns},
};

/// Adult race totals of one municipality.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct MunicipalAggregate {
    pub race_15p: [f64; 5],
    pub pop_15p: f64,
}

impl MunicipalAggregate {
    /// Share of each race in the 15+ population; all zero when there are no adults.
    pub fn shares(&self) -> [f64; 5] {
        if self.pop_15p > 0.0 {
            self.race_15p.map(|r| r / self.pop_15p)
        } else {
            [0.0; 5]
        }
    }
}

/// Estimate each sector's total population by race.
///
/// The tables publish race only for residents aged 15+. Children (total minus 15+,
/// floored at zero) are distributed with the 15+ race shares of their municipality,
/// which assumes race is distributed alike across age groups within a municipality.
/// The output is an estimate, not a count.
/// Returns `None` when the total population column is missing.
pub(crate) fn impute_race(df: &DataFrame, layout: &RaceLayout) -> Result<Option<DataFrame>> {
    let Some(total) = column_f64(df, &layout.total)? else {
        warn!("race total column '{}' missing, leaving race columns untouched", layout.total);
        return Ok(None);
    };

    let ids = column_strings(df, ID_COLUMN)?;
    let pop_15p = sum_columns(df, &layout.adults)?;
    let race_15p = layout.by_race.iter()
        .map(|cols| sum_columns(df, cols))
        .collect::<Result<Vec<_>>>()?;

    let munis = ids.iter()
        .map(|id| id.as_deref().map(|id| id.get(..7).unwrap_or(id)).unwrap_or_default())
        .collect::<Vec<_>>();

    let mut aggregates: AHashMap<&str, MunicipalAggregate> = AHashMap::new();
    for (row, &muni) in munis.iter().enumerate() {
        let agg = aggregates.entry(muni).or_default();
        agg.pop_15p += pop_15p[row];
        for (r, race) in race_15p.iter().enumerate() {
            agg.race_15p[r] += race[row];
        }
    }
    let shares: AHashMap<&str, [f64; 5]> = aggregates.iter()
        .map(|(&muni, agg)| (muni, agg.shares()))
        .collect();

    let columns = RACES.iter().enumerate()
        .map(|(r, race)| {
            let values = munis.iter().enumerate()
                .map(|(row, muni)| {
                    let children = (total[row].unwrap_or(0.0) - pop_15p[row]).max(0.0);
                    let share = shares.get(muni).map_or(0.0, |s| s[r]);
                    Some((race_15p[r][row] + children * share).max(0.0))
                })
                .collect();
            (race_column(race), values)
        })
        .collect();

    Ok(Some(frame_with_id(ID_COLUMN, ids, columns)?))
}

/// Keep only the canonical `cor_*` columns (tables that already publish full totals).
pub(crate) fn select_race_columns(df: &DataFrame) -> Result<DataFrame> {
    let columns = RACES.iter()
        .map(|race| race_column(race))
        .filter_map(|name| match column_f64(df, &name) {
            Ok(Some(values)) => Some(Ok((name, values))),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        })
        .collect::<Result<Vec<_>>>()?;

    frame_with_id(ID_COLUMN, column_strings(df, ID_COLUMN)?, columns)
}
