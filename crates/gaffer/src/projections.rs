// Expected-points projections from CSV, keyed by athlete id.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use gaffer_core::AthleteId;
use serde::Deserialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

/// One projection row. Extra columns (names, clubs, sources) are ignored.
#[derive(Debug, Deserialize)]
struct RawProjection {
    #[serde(alias = "player_id", alias = "athlete_id")]
    id: u32,
    #[serde(alias = "ep", alias = "xP")]
    expected_points: f64,
}

fn load_from_reader<R: Read>(rdr: R) -> Result<HashMap<AthleteId, f64>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut map = HashMap::new();
    for result in reader.deserialize::<RawProjection>() {
        match result {
            Ok(raw) => {
                if !raw.expected_points.is_finite() {
                    warn!("skipping projection for athlete {}: non-finite value", raw.id);
                    continue;
                }
                let id = AthleteId(raw.id);
                if map.insert(id, raw.expected_points).is_some() {
                    warn!("duplicate projection for athlete {}, using latest value", raw.id);
                }
            }
            Err(e) => {
                warn!("skipping malformed projection row: {}", e);
            }
        }
    }
    Ok(map)
}

/// Load projections from a CSV file with `id` and `expected_points` columns.
pub fn load_projections(path: &Path) -> Result<HashMap<AthleteId, f64>, ProjectionError> {
    let file = std::fs::File::open(path).map_err(|e| ProjectionError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let map = load_from_reader(file).map_err(|e| ProjectionError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if map.is_empty() {
        return Err(ProjectionError::Validation(format!(
            "{} produced zero valid rows",
            path.display()
        )));
    }
    Ok(map)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
