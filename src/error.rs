use thiserror::Error;

/// Failures looking up or registering a theme contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error(
        "no catalog entry for census {year} ('{theme}') using '{strategy}'; {}",
        available_message(.year, .strategy, .available)
    )]
    SpecNotFound {
        theme: String,
        year: u16,
        strategy: String,
        available: Vec<String>,
    },

    #[error("duplicate catalog entry for census {year} ('{theme}') using '{strategy}'")]
    Duplicate {
        theme: String,
        year: u16,
        strategy: String,
    },

    #[error("unknown theme: {0}")]
    UnknownTheme(String),

    #[error("unknown strategy: {0} (expected 'warehouse-query' or 'archive-csv')")]
    UnknownStrategy(String),
}

fn available_message(year: &u16, strategy: &str, available: &[String]) -> String {
    if available.is_empty() {
        "no themes are registered for this year/strategy combination".to_string()
    } else {
        format!("available themes for {year}/{strategy}: [{}]", available.join(", "))
    }
}

/// Failures turning a catalog entry into archive rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    #[error("no archive found for stem '{stem}' at {dir_url}")]
    NotFound { stem: String, dir_url: String },

    #[error("no valid states found for the requested municipalities")]
    NoRegions,

    #[error("no rows found for theme '{theme}' in any requested region")]
    NoRows { theme: String },

    #[error("archive member escapes the destination directory: {member}")]
    UnsafePath { member: String },
}

/// Failures in the spatial pipeline that callers may want to tell apart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeomError {
    #[error("column '{column}' is not classified as extensive or intensive")]
    Unclassified { column: String },

    #[error("unsupported CRS: EPSG:{0}")]
    UnsupportedCrs(u32),

    #[error("invalid tract id '{0}' (expected up to 15 digits)")]
    InvalidTractId(String),

    #[error("invalid H3 resolution: {0}")]
    InvalidResolution(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_not_found_lists_available_themes() {
        let err = CatalogError::SpecNotFound {
            theme: "income".into(),
            year: 2022,
            strategy: "warehouse-query".into(),
            available: vec!["age".into(), "basic".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'income'"));
        assert!(msg.contains("[age, basic]"));
    }

    #[test]
    fn spec_not_found_without_available_themes() {
        let err = CatalogError::SpecNotFound {
            theme: "income".into(),
            year: 1999,
            strategy: "warehouse-query".into(),
            available: vec![],
        };
        assert!(err.to_string().contains("no themes are registered"));
    }
}
