use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use crate::{archive::StemPart, error::ArchiveError};

/// Date token used for an undated `<STEM>.zip`.
const UNDATED: &str = "00000000";

/// Every `href="...zip"` target in a directory listing page (case-insensitive).
pub fn parse_zip_listing(html: &[u8]) -> Vec<String> {
    let text: String = html.iter().map(|&b| b as char).collect();
    let Ok(re) = Regex::new(r#"(?i)href="([^"]+\.zip)""#) else { return Vec::new() };
    re.captures_iter(&text)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn anchored(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()
        .with_context(|| format!("invalid archive name pattern: {pattern}"))
}

#[inline]
fn basename(href: &str) -> &str {
    href.rsplit('/').next().unwrap_or(href)
}

/// (date, filename) candidates for a stem under the strict naming rules.
fn strict_candidates(files: &[String], stem: &str) -> Result<Vec<(String, String)>> {
    let stem_re = regex::escape(stem);
    let dated = anchored(&format!(r"{stem_re}_(\d{{8}})\.zip"))?;
    let exact = anchored(&format!(r"{stem_re}\.zip"))?;

    Ok(files.iter()
        .map(|href| basename(href))
        .filter_map(|name| {
            if let Some(caps) = dated.captures(name) {
                Some((caps[1].to_string(), name.to_string()))
            } else if exact.is_match(name) {
                Some((UNDATED.to_string(), name.to_string()))
            } else {
                None
            }
        })
        .collect())
}

/// (date, filename) candidates under the part's documented naming variants.
fn fuzzy_candidates(files: &[String], part: &StemPart) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for variant in part.fuzzy {
        let re = anchored(variant.pattern)?;
        for name in files.iter().map(|href| basename(href)) {
            let rejected = variant.reject
                .is_some_and(|token| name.to_ascii_uppercase().contains(token));
            if rejected { continue }
            if let Some(date) = re.captures(name).and_then(|caps| caps.get(1)) {
                out.push((date.as_str().to_string(), name.to_string()));
            }
        }
    }
    Ok(out)
}

/// Resolve the concrete archive URL for a stem from a directory listing.
/// The greatest date token wins; strict matches shadow the fuzzy variants entirely.
pub fn pick_archive(files: &[String], part: &StemPart, dir_url: &str) -> Result<String> {
    let mut candidates = strict_candidates(files, part.stem)?;
    if candidates.is_empty() {
        candidates = fuzzy_candidates(files, part)?;
    }

    let (_, name) = candidates.into_iter()
        .max_by(|a, b| a.0.cmp(&b.0))
        .ok_or_else(|| ArchiveError::NotFound { stem: part.stem.to_string(), dir_url: dir_url.to_string() })?;

    Ok(format!("{}/{name}", dir_url.trim_end_matches('/')))
}
