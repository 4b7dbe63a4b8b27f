use std::collections::BTreeSet;

use anyhow::Result;
use tracing::warn;

use crate::error::ArchiveError;

/// First-level administrative regions (UFs) keyed by the 2-digit code prefix.
pub const STATES: [(u32, &str); 27] = [
    (11, "RO"), (12, "AC"), (13, "AM"), (14, "RR"), (15, "PA"), (16, "AP"), (17, "TO"),
    (21, "MA"), (22, "PI"), (23, "CE"), (24, "RN"), (25, "PB"), (26, "PE"), (27, "AL"),
    (28, "SE"), (29, "BA"), (31, "MG"), (32, "ES"), (33, "RJ"), (35, "SP"), (41, "PR"),
    (42, "SC"), (43, "RS"), (50, "MS"), (51, "MT"), (52, "GO"), (53, "DF"),
];

/// State code (first two digits) of a 7-digit municipality code.
#[inline] pub fn state_code(muni: u32) -> u32 { muni / 100_000 }

/// UF abbreviation for a municipality, if its prefix is a known state.
pub fn state_of(muni: u32) -> Option<&'static str> {
    let code = state_code(muni);
    STATES.iter().find(|(c, _)| *c == code).map(|(_, uf)| *uf)
}

/// Sorted, de-duplicated UFs for the requested municipalities.
/// Unknown prefixes are warned about and skipped.
pub fn required_states(munis: &[u32]) -> Result<Vec<&'static str>> {
    let mut states = BTreeSet::new();
    for &muni in munis {
        match state_of(muni) {
            Some(uf) => { states.insert(uf); }
            None => warn!("unknown state code for municipality {muni:07}, skipping"),
        }
    }
    if states.is_empty() {
        return Err(ArchiveError::NoRegions.into());
    }
    Ok(states.into_iter().collect())
}

/// Which requested municipalities of a region a stem covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Any,
    Only(u32),
    Except(u32),
}

impl Selector {
    #[inline]
    pub fn matches(&self, muni: u32) -> bool {
        match *self {
            Selector::Any => true,
            Selector::Only(code) => muni == code,
            Selector::Except(code) => muni != code,
        }
    }
}

/// A filename variant tried when the strict `<STEM>_YYYYMMDD.zip` form finds nothing.
/// The pattern's first capture group is the date token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyName {
    pub pattern: &'static str,
    /// Upper-cased substring that disqualifies a match.
    pub reject: Option<&'static str>,
}

/// One published archive of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StemPart {
    pub stem: &'static str,
    pub selector: Selector,
    pub fuzzy: &'static [FuzzyName],
}

/// A region published as several disjoint archives.
#[derive(Debug, Clone, Copy)]
pub struct RegionSplit {
    pub uf: &'static str,
    pub parts: &'static [StemPart],
}

const SP_CAPITAL: u32 = 3550308;

/// Regions whose archives are split. Everything else is one archive named after the UF.
pub static REGION_SPLITS: &[RegionSplit] = &[
    RegionSplit {
        uf: "SP",
        parts: &[
            StemPart {
                stem: "SP_Capital",
                selector: Selector::Only(SP_CAPITAL),
                fuzzy: &[FuzzyName { pattern: r"SP_.*Capital_(\d{8})\.zip", reject: Some("EXCETO") }],
            },
            StemPart {
                stem: "SP_Exceto_a_Capital",
                selector: Selector::Except(SP_CAPITAL),
                fuzzy: &[FuzzyName { pattern: r"SP_Exceto.*Capital_(\d{8})\.zip", reject: None }],
            },
        ],
    },
];

/// Stems needed for `uf` given every requested municipality.
/// A split part is needed iff some requested municipality of the region satisfies its selector.
pub fn stems_for_region(uf: &'static str, munis: &[u32]) -> Vec<StemPart> {
    let Some(split) = REGION_SPLITS.iter().find(|split| split.uf.eq_ignore_ascii_case(uf)) else {
        return vec![StemPart { stem: uf, selector: Selector::Any, fuzzy: &[] }];
    };

    let in_region = munis.iter().copied()
        .filter(|&muni| state_of(muni).is_some_and(|s| s == split.uf))
        .collect::<Vec<_>>();

    split.parts.iter()
        .filter(|part| in_region.iter().any(|&muni| part.selector.matches(muni)))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn stems(uf: &'static str, munis: &[u32]) -> Vec<&'static str> {
        stems_for_region(uf, munis).into_iter().map(|part| part.stem).collect()
    }

    #[test]
    fn capital_only_skips_the_interior_archive() {
        assert_eq!(stems("SP", &[3550308]), vec!["SP_Capital"]);
    }

    #[test]
    fn interior_only_skips_the_capital_archive() {
        assert_eq!(stems("SP", &[3509502]), vec!["SP_Exceto_a_Capital"]);
    }

    #[test]
    fn mixed_request_needs_both() {
        assert_eq!(stems("SP", &[3550308, 3509502, 3304557]), vec!["SP_Capital", "SP_Exceto_a_Capital"]);
    }

    #[test]
    fn unsplit_region_uses_its_abbreviation() {
        assert_eq!(stems("RJ", &[3304557]), vec!["RJ"]);
    }

    #[test]
    fn required_states_skips_unknown_prefixes() {
        assert_eq!(required_states(&[3304557, 9900001, 3550308]).unwrap(), vec!["RJ", "SP"]);
        let err = required_states(&[9900001]).unwrap_err();
        assert_matches!(err.downcast_ref::<ArchiveError>(), Some(ArchiveError::NoRegions));
    }
}
