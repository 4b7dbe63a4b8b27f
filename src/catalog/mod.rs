mod census;
mod spec;

use std::collections::HashMap;

use anyhow::Result;

pub use spec::*;

use crate::error::CatalogError;

/// Canonical tract id column carried by every harmonized table.
pub const ID_COLUMN: &str = "id_setor_censitario";

/// Race categories, in the order the census tables publish them.
pub const RACES: [&str; 5] = ["branca", "preta", "amarela", "parda", "indigena"];

/// Canonical age bracket columns.
pub const AGE_BRACKETS: [&str; 4] = ["age_0_14", "age_15_19", "age_20_64", "age_65p"];

/// Canonical output column for a race category, e.g. `cor_parda`.
pub fn race_column(race: &str) -> String { format!("cor_{race}") }

/// Registry of theme contracts keyed by (theme, year, strategy).
#[derive(Debug, Clone)]
pub struct Catalog {
    specs: Vec<ThemeSpec>,
    index: HashMap<(Theme, u16, Strategy), usize>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate (theme, year, strategy) keys.
    pub fn new(specs: Vec<ThemeSpec>) -> Result<Self> {
        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.key(), i).is_some() {
                return Err(CatalogError::Duplicate {
                    theme: spec.theme.to_string(),
                    year: spec.year,
                    strategy: spec.strategy.to_string(),
                }.into());
            }
        }
        Ok(Self { specs, index })
    }

    /// The built-in 2010/2022 census registry.
    pub fn census() -> Result<Self> {
        Self::new(census::census_specs())
    }

    /// Exact lookup; never falls back to another year or strategy.
    pub fn lookup(&self, theme: Theme, year: u16, strategy: Strategy) -> Result<&ThemeSpec> {
        match self.index.get(&(theme, year, strategy)) {
            Some(&i) => Ok(&self.specs[i]),
            None => Err(CatalogError::SpecNotFound {
                theme: theme.to_string(),
                year,
                strategy: strategy.to_string(),
                available: self.themes_for(year, strategy).iter().map(|t| t.to_string()).collect(),
            }.into()),
        }
    }

    /// Themes registered for (year, strategy), sorted by name.
    pub fn themes_for(&self, year: u16, strategy: Strategy) -> Vec<Theme> {
        let mut themes = self.specs.iter()
            .filter(|spec| spec.year == year && spec.strategy == strategy)
            .map(|spec| spec.theme)
            .collect::<Vec<_>>();
        themes.sort_by_key(|theme| theme.to_str());
        themes.dedup();
        themes
    }

    #[inline] pub fn specs(&self) -> &[ThemeSpec] { &self.specs }

    #[inline] pub fn len(&self) -> usize { self.specs.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.specs.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn census_catalog_has_unique_keys() {
        let catalog = Catalog::census().unwrap();
        assert_eq!(catalog.len(), 15);
        assert_eq!(
            catalog.themes_for(2010, Strategy::Archive),
            vec![Theme::Age, Theme::Basic, Theme::Income, Theme::Race]
        );
    }

    #[test]
    fn lookup_is_exact() {
        let catalog = Catalog::census().unwrap();
        let spec = catalog.lookup(Theme::Income, 2022, Strategy::Archive).unwrap();
        assert_eq!(spec.key(), (Theme::Income, 2022, Strategy::Archive));

        // income has no 2022 warehouse contract; no fallback to the archive one
        let err = catalog.lookup(Theme::Income, 2022, Strategy::Warehouse).unwrap_err();
        assert_matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::SpecNotFound { available, .. }) if available == &["age", "basic", "race"]
        );
    }

    #[test]
    fn unknown_year_reports_no_available_themes() {
        let catalog = Catalog::census().unwrap();
        let err = catalog.lookup(Theme::Income, 1999, Strategy::Warehouse).unwrap_err();

        assert_matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::SpecNotFound { theme, year: 1999, available, .. })
                if theme == "income" && available.is_empty()
        );
        assert!(err.to_string().contains("no themes are registered"));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let spec = ThemeSpec::new(Theme::Basic, 2010, Strategy::Archive);
        let err = Catalog::new(vec![spec.clone(), spec]).unwrap_err();
        assert_matches!(err.downcast_ref::<CatalogError>(), Some(CatalogError::Duplicate { year: 2010, .. }));
    }
}
