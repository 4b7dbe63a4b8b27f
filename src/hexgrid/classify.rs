use anyhow::Result;
use tracing::warn;

use crate::{catalog::VarKind, error::GeomError};

/// Name fragments marking a column as a mean or rate.
const INTENSIVE_HINTS: [&str; 6] = ["rendimento", "taxa", "media", "mean", "rate", "pct"];

/// How to treat columns the catalog does not tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClassifyMode {
    /// Guess from the column name and warn.
    #[default]
    Heuristic,
    /// Refuse untagged columns.
    Strict,
}

fn guess(column: &str) -> VarKind {
    let lower = column.to_lowercase();
    if INTENSIVE_HINTS.iter().any(|hint| lower.contains(hint)) {
        VarKind::Intensive
    } else {
        VarKind::Extensive
    }
}

/// Split `columns` into (extensive, intensive) for areal interpolation.
/// Explicit `tags` win; anything else goes through the name heuristic, or fails in strict mode.
pub fn classify_columns(
    columns: &[String],
    tags: &[(String, VarKind)],
    mode: ClassifyMode,
) -> Result<(Vec<String>, Vec<String>)> {
    let mut extensive = Vec::new();
    let mut intensive = Vec::new();

    for column in columns {
        let kind = match tags.iter().find(|(name, _)| name == column) {
            Some((_, kind)) => *kind,
            None if mode == ClassifyMode::Strict => {
                return Err(GeomError::Unclassified { column: column.clone() }.into());
            }
            None => {
                let kind = guess(column);
                warn!("column '{column}' has no catalog tag, treating it as {kind:?} from its name");
                kind
            }
        };
        match kind {
            VarKind::Extensive => extensive.push(column.clone()),
            VarKind::Intensive => intensive.push(column.clone()),
        }
    }
    Ok((extensive, intensive))
}
