use anyhow::{Context, Result};
use polars::{frame::DataFrame, prelude::{Column, DataType}};

/// Nullable f64 values of a column, or `None` when the column is absent.
pub(crate) fn column_f64(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    let Ok(column) = df.column(name) else { return Ok(None) };
    let values = column.cast(&DataType::Float64)
        .with_context(|| format!("column '{name}' is not numeric"))?;
    Ok(Some(values.f64()?.into_iter().collect()))
}

/// String values of a required column.
pub(crate) fn column_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)
        .with_context(|| format!("missing column '{name}'"))?
        .cast(&DataType::String)?;
    Ok(column.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Row-wise sum of the listed columns; absent columns and nulls count as zero.
pub(crate) fn sum_columns(df: &DataFrame, names: &[String]) -> Result<Vec<f64>> {
    let mut total = vec![0.0; df.height()];
    for name in names {
        if let Some(values) = column_f64(df, name)? {
            for (acc, v) in total.iter_mut().zip(values) {
                *acc += v.unwrap_or(0.0);
            }
        }
    }
    Ok(total)
}

/// Build a frame from an id column followed by named f64 columns.
pub(crate) fn frame_with_id(
    id_name: &str,
    ids: Vec<Option<String>>,
    columns: Vec<(String, Vec<Option<f64>>)>,
) -> Result<DataFrame> {
    let mut out = Vec::with_capacity(columns.len() + 1);
    out.push(Column::new(id_name.into(), ids));
    out.extend(columns.into_iter().map(|(name, values)| Column::new(name.as_str().into(), values)));
    DataFrame::new(out).context("failed to assemble frame")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_skip_missing_columns_and_nulls() {
        let df = DataFrame::new(vec![
            Column::new("a".into(), vec![Some(1.0), None]),
            Column::new("b".into(), vec![Some(2.0), Some(5.0)]),
        ]).unwrap();

        let names = vec!["a".to_string(), "b".to_string(), "zzz".to_string()];
        assert_eq!(sum_columns(&df, &names).unwrap(), vec![3.0, 5.0]);
        assert!(column_f64(&df, "zzz").unwrap().is_none());
    }
}
