use std::{fmt, str::FromStr};

use crate::error::CatalogError;

/// Census theme (a bundle of variables fetched together).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Theme {
    Basic,
    Income,
    Age,
    Race,
}

impl Theme {
    pub fn to_str(&self) -> &'static str {
        match self {
            Theme::Basic => "basic",
            Theme::Income => "income",
            Theme::Age => "age",
            Theme::Race => "race",
        }
    }

    pub fn all() -> [Theme; 4] {
        [Theme::Basic, Theme::Income, Theme::Age, Theme::Race]
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.to_str()) }
}

impl FromStr for Theme {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::all().into_iter()
            .find(|theme| theme.to_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CatalogError::UnknownTheme(s.to_string()))
    }
}

/// Where a theme's rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    /// SQL query against the analytical warehouse.
    Warehouse,
    /// Zipped CSV dumps on the statistics office's file server.
    Archive,
}

impl Strategy {
    pub fn to_str(&self) -> &'static str {
        match self {
            Strategy::Warehouse => "warehouse-query",
            Strategy::Archive => "archive-csv",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.to_str()) }
}

impl FromStr for Strategy {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warehouse-query" | "warehouse" | "bd_table" => Ok(Strategy::Warehouse),
            "archive-csv" | "archive" | "ftp_csv" => Ok(Strategy::Archive),
            _ => Err(CatalogError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Text encoding of an archive member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Latin1,
    Utf8,
}

/// How the concrete archive URL is derived from the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveNaming {
    /// One national file; the template is the URL.
    Fixed,
    /// `{uf}` / `{stem}` substituted with the state abbreviation.
    PerRegion,
    /// `<STEM>_YYYYMMDD.zip` discovered from the directory listing of the template's parent.
    Dated,
}

/// One physical CSV resource, possibly inside a ZIP.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveResource {
    pub url_template: String,
    pub naming: ArchiveNaming,
    pub member_glob: String,
    pub separator: u8,
    pub encoding: Encoding,
    pub id_col: String,
}

impl ArchiveResource {
    pub fn new(url_template: impl Into<String>, naming: ArchiveNaming, member_glob: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            naming,
            member_glob: member_glob.into(),
            separator: b';',
            encoding: Encoding::Latin1,
            id_col: "Cod_setor".to_string(),
        }
    }

    pub fn with_id_col(mut self, id_col: impl Into<String>) -> Self {
        self.id_col = id_col.into();
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Directory part of the template (everything up to the last `/`, inclusive).
    pub fn dir_url(&self) -> &str {
        match self.url_template.rfind('/') {
            Some(i) => &self.url_template[..=i],
            None => &self.url_template,
        }
    }
}

/// The 0-14 bracket is either summed directly or recovered from a total.
#[derive(Debug, Clone, PartialEq)]
pub enum Under15 {
    Sum(Vec<String>),
    Residual { total: String },
}

/// Raw columns making up each canonical age bracket.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeLayout {
    pub under_15: Under15,
    pub from_15_to_19: Vec<String>,
    pub from_20_to_64: Vec<String>,
    pub from_65: Vec<String>,
}

/// Columns feeding the child race imputation.
/// `by_race[i]` holds the 15+ columns for `RACES[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceLayout {
    pub total: String,
    pub adults: Vec<String>,
    pub by_race: [Vec<String>; 5],
}

/// Theme-specific reshaping rules.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Layout {
    #[default]
    None,
    AgeBrackets(AgeLayout),
    RaceImputation(RaceLayout),
}

/// Whether a variable sums (counts) or averages (rates, means) under areal reallocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Extensive,
    Intensive,
}

/// The contract for one (theme, year, strategy) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeSpec {
    pub theme: Theme,
    pub year: u16,
    pub strategy: Strategy,

    // warehouse
    pub table_id: Option<String>,
    pub required_columns: Vec<String>,

    // archive
    pub resources: Vec<ArchiveResource>,

    /// raw -> canonical renames, applied before harmonization.
    pub column_map: Vec<(String, String)>,

    pub extensive_vars: Vec<String>,
    pub intensive_vars: Vec<String>,
    pub layout: Layout,
}

impl ThemeSpec {
    pub fn new(theme: Theme, year: u16, strategy: Strategy) -> Self {
        Self {
            theme,
            year,
            strategy,
            table_id: None,
            required_columns: Vec::new(),
            resources: Vec::new(),
            column_map: Vec::new(),
            extensive_vars: Vec::new(),
            intensive_vars: Vec::new(),
            layout: Layout::None,
        }
    }

    #[inline] pub fn key(&self) -> (Theme, u16, Strategy) { (self.theme, self.year, self.strategy) }

    /// Canonical name for a raw column, if the rename map has one.
    pub fn canonical_name(&self, raw: &str) -> Option<&str> {
        self.column_map.iter()
            .find(|(from, _)| from == raw)
            .map(|(_, to)| to.as_str())
    }

    /// Columns to read from archive members: rename-map keys, required columns and id columns.
    /// Empty means "read everything".
    pub fn desired_archive_columns(&self) -> Vec<String> {
        if self.column_map.is_empty() && self.required_columns.is_empty() {
            return Vec::new();
        }
        let mut cols: Vec<String> = Vec::new();
        let candidates = self.column_map.iter().map(|(raw, _)| raw)
            .chain(&self.required_columns)
            .chain(self.resources.iter().map(|res| &res.id_col));
        for col in candidates {
            if !cols.iter().any(|c| c.eq_ignore_ascii_case(col)) {
                cols.push(col.clone());
            }
        }
        cols
    }

    /// Explicit extensive/intensive tags for the canonical output columns.
    pub fn classification(&self) -> Vec<(String, VarKind)> {
        self.extensive_vars.iter().map(|v| (v.clone(), VarKind::Extensive))
            .chain(self.intensive_vars.iter().map(|v| (v.clone(), VarKind::Intensive)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn strategy_accepts_legacy_aliases() {
        assert_eq!("bd_table".parse::<Strategy>().unwrap(), Strategy::Warehouse);
        assert_eq!("ftp_csv".parse::<Strategy>().unwrap(), Strategy::Archive);
        assert_eq!("Archive-CSV".parse::<Strategy>().unwrap(), Strategy::Archive);
        assert_matches!("sftp".parse::<Strategy>(), Err(CatalogError::UnknownStrategy(_)));
    }

    #[test]
    fn theme_round_trips_through_display() {
        for theme in Theme::all() {
            assert_eq!(theme.to_string().parse::<Theme>().unwrap(), theme);
        }
        assert_matches!("employment".parse::<Theme>(), Err(CatalogError::UnknownTheme(_)));
    }

    #[test]
    fn desired_columns_are_deduplicated_case_insensitively() {
        let mut spec = ThemeSpec::new(Theme::Basic, 2010, Strategy::Archive);
        spec.resources.push(ArchiveResource::new("https://x/{stem}.zip", ArchiveNaming::Dated, "Basico_*.csv"));
        spec.column_map = vec![("Cod_setor".into(), "id_setor_censitario".into()), ("V002".into(), "habitantes".into())];
        spec.required_columns = vec!["v002".into()];

        assert_eq!(spec.desired_archive_columns(), vec!["Cod_setor", "V002"]);
    }

    #[test]
    fn dir_url_keeps_trailing_slash() {
        let res = ArchiveResource::new("https://host/a/b/{stem}.zip", ArchiveNaming::Dated, "*.csv");
        assert_eq!(res.dir_url(), "https://host/a/b/");
    }
}
