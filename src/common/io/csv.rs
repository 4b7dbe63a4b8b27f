//! Delimited-text reading for census archive members.

use std::io::Cursor;

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerReader, prelude::{Column, CsvReadOptions, DataType}};

use crate::catalog::Encoding;

/// Tokens the census tables use for suppressed or missing values.
pub(crate) const NA_TOKENS: [&str; 6] = ["X", ".", "nan", "..", "...", "-"];

/// Decode raw member bytes into text.
pub(crate) fn decode_text(bytes: &[u8], encoding: Encoding) -> String {
    match encoding {
        // Latin-1 maps every byte to the code point of the same value.
        Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        Encoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Read delimited text with a header row; every column is read as a string.
pub(crate) fn read_delimited(text: &str, separator: u8) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|po| po.with_separator(separator))
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(text.as_bytes()))
        .finish()
        .context("[io::csv] failed to read delimited text")
}

/// Return only the header of delimited text (first line, trimmed names).
pub(crate) fn read_header(text: &str, separator: u8) -> Vec<String> {
    let line = text.lines().next().unwrap_or_default();
    line.split(separator as char)
        .map(|name| name.trim().trim_matches('"').to_string())
        .collect()
}

/// Parse a census cell: NA tokens and blanks are null, decimal comma is accepted.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let value = raw.trim();
    if value.is_empty() || NA_TOKENS.contains(&value) {
        return None;
    }
    value.replace(',', ".").parse::<f64>().ok()
        .filter(|v| v.is_finite())
}

/// Convert every string column except `keep` to Float64 using [`parse_number`].
pub(crate) fn coerce_numeric(df: DataFrame, keep: &[&str]) -> Result<DataFrame> {
    let columns = df.get_columns().iter()
        .map(|column| {
            let name = column.name().clone();
            if keep.contains(&name.as_str()) || column.dtype() != &DataType::String {
                return Ok(column.clone());
            }
            let values = column.str()?.into_iter()
                .map(|value| value.and_then(parse_number))
                .collect::<Vec<Option<f64>>>();
            Ok(Column::new(name, values))
        })
        .collect::<Result<Vec<_>>>()?;

    DataFrame::new(columns).context("[io::csv] failed to rebuild numeric frame")
}
