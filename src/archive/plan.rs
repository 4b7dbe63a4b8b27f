use anyhow::Result;
use tracing::{debug, error};

use crate::{
    archive::{parse_zip_listing, pick_archive, required_states, stems_for_region},
    catalog::{ArchiveNaming, ArchiveResource, ThemeSpec},
    common::{RemoteSource, SessionCache},
};

/// One concrete download target.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivePlanEntry {
    pub url: String,
    pub member_glob: String,
    /// Region or sub-split the entry covers (`"BR"` for national files).
    pub context: String,
    pub resource: ArchiveResource,
}

impl ArchivePlanEntry {
    fn new(url: String, context: &str, resource: &ArchiveResource) -> Self {
        Self {
            url,
            member_glob: if resource.member_glob.is_empty() { "*.csv".to_string() } else { resource.member_glob.clone() },
            context: context.to_string(),
            resource: resource.clone(),
        }
    }
}

/// Substitute `{uf}` / `{UF}` / `{stem}` placeholders.
fn fill_template(template: &str, value: &str) -> String {
    template.replace("{uf}", value).replace("{UF}", value).replace("{stem}", value)
}

/// Turn a catalog entry plus requested municipalities into download targets.
///
/// Dated archives are resolved against the (session-cached) directory listing.
/// A stem that cannot be resolved is logged and skipped; the call only fails when
/// nothing at all could be resolved.
pub fn resolve_plan(
    spec: &ThemeSpec,
    munis: &[u32],
    source: &dyn RemoteSource,
    session: &mut SessionCache,
) -> Result<Vec<ArchivePlanEntry>> {
    let mut entries: Vec<ArchivePlanEntry> = Vec::new();
    let mut first_failure: Option<anyhow::Error> = None;

    let needs_regions = spec.resources.iter().any(|res| res.naming != ArchiveNaming::Fixed);
    let states = if needs_regions { required_states(munis)? } else { Vec::new() };

    for resource in &spec.resources {
        match resource.naming {
            ArchiveNaming::Fixed => {
                entries.push(ArchivePlanEntry::new(resource.url_template.clone(), "BR", resource));
            }
            ArchiveNaming::PerRegion => {
                for uf in &states {
                    entries.push(ArchivePlanEntry::new(fill_template(&resource.url_template, uf), uf, resource));
                }
            }
            ArchiveNaming::Dated => {
                let dir_url = resource.dir_url();
                for &uf in &states {
                    for part in stems_for_region(uf, munis) {
                        let resolved = session.listing(source, dir_url, parse_zip_listing)
                            .and_then(|files| pick_archive(&files, &part, dir_url));
                        match resolved {
                            Ok(url) => {
                                debug!("resolved {} -> {url}", part.stem);
                                entries.push(ArchivePlanEntry::new(url, part.stem, resource));
                            }
                            Err(err) => {
                                error!("failed resolving {}: {err:#}", part.stem);
                                first_failure.get_or_insert(err);
                            }
                        }
                    }
                }
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    entries.retain(|e| seen.insert((e.url.clone(), e.member_glob.clone(), e.context.clone())));

    match first_failure {
        Some(err) if entries.is_empty() => Err(err),
        _ => Ok(entries),
    }
}
