use std::fmt;

use anyhow::Result;

use crate::error::GeomError;

/// Width of a census tract code.
pub const TRACT_ID_LEN: usize = 15;

/// Canonical tract code: trimmed, without a float `.0` tail, zero-padded to 15 digits.
pub fn normalize_tract_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);

    if digits.is_empty() || digits.len() > TRACT_ID_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GeomError::InvalidTractId(raw.to_string()).into());
    }
    Ok(format!("{digits:0>TRACT_ID_LEN$}"))
}

/// A normalized 15-digit census tract code. The first 7 digits are the municipality code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TractId(String);

impl TractId {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(Self(normalize_tract_id(raw)?))
    }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }

    /// 7-digit municipality prefix.
    #[inline] pub fn municipality(&self) -> &str { &self.0[..7] }
}

impl fmt::Display for TractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}
