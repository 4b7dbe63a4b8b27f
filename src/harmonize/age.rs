use anyhow::Result;
use polars::frame::DataFrame;
use tracing::warn;

use crate::{
    catalog::{AGE_BRACKETS, AgeLayout, ID_COLUMN, Under15},
    common::{column_f64, column_strings, frame_with_id, sum_columns},
};

/// Collapse raw age columns into the four canonical brackets.
///
/// 15-19, 20-64 and 65+ are sums of their declared sub-columns. 0-14 is either a direct
/// sum or the residual of the sector total; every bracket is floored at zero, so totals
/// smaller than the sum of their parts never produce negative counts.
/// Returns `None` when the residual total column is missing.
pub(crate) fn age_brackets(df: &DataFrame, layout: &AgeLayout) -> Result<Option<DataFrame>> {
    let from_15 = sum_columns(df, &layout.from_15_to_19)?;
    let from_20 = sum_columns(df, &layout.from_20_to_64)?;
    let from_65 = sum_columns(df, &layout.from_65)?;

    let under_15 = match &layout.under_15 {
        Under15::Sum(cols) => sum_columns(df, cols)?,
        Under15::Residual { total } => {
            let Some(total) = column_f64(df, total)? else {
                warn!("age total column '{total}' missing, leaving age columns untouched");
                return Ok(None);
            };
            total.iter().enumerate()
                .map(|(i, t)| t.unwrap_or(0.0) - (from_15[i] + from_20[i] + from_65[i]))
                .collect()
        }
    };

    let clamp = |values: Vec<f64>| values.into_iter().map(|v| Some(v.max(0.0))).collect::<Vec<_>>();
    let brackets = [under_15, from_15, from_20, from_65];

    let columns = AGE_BRACKETS.iter()
        .zip(brackets)
        .map(|(name, values)| (name.to_string(), clamp(values)))
        .collect();

    Ok(Some(frame_with_id(ID_COLUMN, column_strings(df, ID_COLUMN)?, columns)?))
}
