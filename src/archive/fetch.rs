use std::{collections::HashSet, io::Read};

use ahash::AHashMap;
use anyhow::{Context, Result};
use polars::{frame::DataFrame, prelude::{BooleanChunked, Column, DataType, NewChunkedArray}};
use tracing::{error, info, warn};

use crate::{
    archive::{ArchivePlanEntry, match_members, resolve_plan},
    catalog::{ID_COLUMN, ThemeSpec},
    common::{RemoteSource, SessionCache, coerce_numeric, decode_text, open_zip, read_delimited, read_header},
    error::ArchiveError,
    tracts::normalize_tract_id,
};

/// Resolve `desired` against the actual header, case-insensitively.
/// Returns (actual header name, desired name) pairs; missing columns are warned about.
fn resolve_columns(header: &[String], desired: &[String], member: &str) -> Vec<(String, String)> {
    if desired.is_empty() {
        return header.iter().map(|h| (h.clone(), h.clone())).collect();
    }

    let by_lower: AHashMap<String, &String> = header.iter()
        .map(|h| (h.trim().to_lowercase(), h))
        .collect();

    let mut resolved = Vec::new();
    let mut missing = Vec::new();
    let mut seen = HashSet::new();
    for want in desired {
        match by_lower.get(&want.trim().to_lowercase()) {
            Some(&actual) => {
                if seen.insert(actual.clone()) {
                    resolved.push((actual.clone(), want.clone()));
                }
            }
            None => missing.push(want.as_str()),
        }
    }
    if !missing.is_empty() {
        warn!("missing columns in {member}: {missing:?}");
    }
    resolved
}

/// Parse one archive member into an id-keyed, numeric frame restricted to `munis`.
fn parse_member(
    text: &str,
    entry: &ArchivePlanEntry,
    spec: &ThemeSpec,
    desired: &[String],
    munis: &HashSet<String>,
    member: &str,
) -> Result<Option<DataFrame>> {
    let resource = &entry.resource;
    let header = read_header(text, resource.separator);
    let resolved = resolve_columns(&header, desired, member);

    let raw = read_delimited(text, resource.separator)?;

    // Project onto the resolved columns under their catalog spelling, then apply the rename map.
    let mut columns = Vec::with_capacity(resolved.len());
    for (actual, want) in &resolved {
        let Some(column) = raw.get_columns().iter().find(|c| c.name().trim() == actual.as_str()) else { continue };
        let name = spec.canonical_name(want).unwrap_or(want);
        let name = if want.eq_ignore_ascii_case(&resource.id_col) { ID_COLUMN } else { name };
        columns.push(column.clone().with_name(name.into()));
    }

    let Some(id_pos) = columns.iter().position(|c| c.name().as_str() == ID_COLUMN) else {
        anyhow::bail!("id column '{}' not found", resource.id_col);
    };

    let ids = columns[id_pos].cast(&DataType::String)?;
    let keep = ids.str()?.into_iter()
        .map(|id| id.and_then(|id| normalize_tract_id(id).ok()))
        .map(|id| id.filter(|id| munis.contains(&id[..7])))
        .collect::<Vec<Option<String>>>();

    let mask = keep.iter().map(|id| id.is_some()).collect::<Vec<_>>();
    if !mask.iter().any(|&m| m) {
        return Ok(None);
    }

    columns[id_pos] = Column::new(ID_COLUMN.into(), keep);
    let df = DataFrame::new(columns)?;
    let mask = BooleanChunked::from_slice("mask".into(), &mask);
    let df = df.filter(&mask)?;

    Ok(Some(coerce_numeric(df, &[ID_COLUMN])?))
}

/// Stack chunks whose column sets may differ; missing columns become null.
pub(crate) fn concat_aligned(chunks: &[DataFrame]) -> Result<DataFrame> {
    let mut names: Vec<String> = Vec::new();
    for chunk in chunks {
        for name in chunk.get_column_names() {
            if !names.iter().any(|n| n == name.as_str()) {
                names.push(name.to_string());
            }
        }
    }

    let mut ids: Vec<Option<String>> = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); names.len()];

    for chunk in chunks {
        let height = chunk.height();
        for (name, out) in names.iter().zip(values.iter_mut()) {
            if name == ID_COLUMN { continue }
            match chunk.column(name) {
                Ok(column) => out.extend(column.cast(&DataType::Float64)?.f64()?.into_iter()),
                Err(_) => out.extend(std::iter::repeat_n(None, height)),
            }
        }
        let chunk_ids = chunk.column(ID_COLUMN)
            .with_context(|| format!("chunk without '{ID_COLUMN}'"))?
            .cast(&DataType::String)?;
        ids.extend(chunk_ids.str()?.into_iter().map(|id| id.map(str::to_string)));
    }

    let columns = names.iter().zip(values)
        .map(|(name, vals)| if name == ID_COLUMN {
            Column::new(ID_COLUMN.into(), std::mem::take(&mut ids))
        } else {
            Column::new(name.as_str().into(), vals)
        })
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}

/// Fetch archive rows for `munis` (7-digit codes) following `spec`'s resources.
///
/// Per-stem download or archive failures are logged and skipped, as are members that
/// fail to parse. Fails with [`ArchiveError::NoRows`] only if nothing yields rows.
pub fn fetch_census_archive(
    spec: &ThemeSpec,
    munis: &[u32],
    source: &dyn RemoteSource,
    session: &mut SessionCache,
) -> Result<DataFrame> {
    let plan = resolve_plan(spec, munis, source, session)?;
    let desired = spec.desired_archive_columns();
    let wanted: HashSet<String> = munis.iter().map(|m| format!("{m:07}")).collect();

    let mut chunks = Vec::new();
    for entry in &plan {
        info!("fetching {} ({}) from {}", spec.theme, entry.context, entry.url);

        let archive = session.fetch(source, &entry.url)
            .and_then(|bytes| read_archive_members(&bytes, &entry.member_glob));
        let members = match archive {
            Ok(members) => members,
            Err(err) => {
                error!("failed to process {}: {err:#}", entry.context);
                continue;
            }
        };
        if members.is_empty() {
            warn!("no file matching '{}' in {} archive, skipping", entry.member_glob, entry.context);
            continue;
        }

        for (name, bytes) in members {
            let basename = name.rsplit('/').next().unwrap_or(&name).to_string();
            let text = decode_text(&bytes, entry.resource.encoding);
            match parse_member(&text, entry, spec, &desired, &wanted, &basename) {
                Ok(Some(df)) => chunks.push(df),
                Ok(None) => {}
                Err(err) => warn!("failed parsing {}/{basename}: {err:#}", entry.context),
            }
        }
    }

    if chunks.is_empty() {
        error!("no data found for any requested municipality");
        return Err(ArchiveError::NoRows { theme: spec.theme.to_string() }.into());
    }
    concat_aligned(&chunks)
}

/// Read every member matching `glob` out of zip `bytes`.
fn read_archive_members(bytes: &[u8], glob: &str) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = open_zip(bytes)?;
    let names = archive.file_names().map(str::to_string).collect::<Vec<_>>();
    let refs = names.iter().map(String::as_str).collect::<Vec<_>>();

    match_members(&refs, glob).into_iter()
        .map(|name| {
            let mut file = archive.by_name(name)
                .with_context(|| format!("missing member {name}"))?;
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)
                .with_context(|| format!("failed to read member {name}"))?;
            Ok((name.to_string(), buf))
        })
        .collect()
}
