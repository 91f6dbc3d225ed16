//! Significant command - reduce a position trail to its significant points.

use std::path::PathBuf;
use std::sync::Arc;

use geovisit::config::ConfigFile;
use geovisit::model::TimeRange;
use geovisit::significance::filter_significant;
use geovisit::store::{MemoryStore, PositionStore};
use geovisit::Position;
use tracing::info;

use super::common::{read_json, runtime};
use crate::error::CliError;

/// Arguments for the significant command.
pub struct SignificantArgs {
    /// JSON array of positions.
    pub positions: PathBuf,
    /// RFC 3339 window bounds; both or neither.
    pub from: Option<String>,
    pub to: Option<String>,
}

pub fn run(args: SignificantArgs, config: &ConfigFile) -> Result<Vec<Position>, CliError> {
    let range = match (&args.from, &args.to) {
        (Some(from), Some(to)) => {
            Some(TimeRange::parse(from, to).map_err(|e| CliError::Input(e.to_string()))?)
        }
        (None, None) => None,
        _ => {
            return Err(CliError::Input(
                "--from and --to must be given together".to_string(),
            ))
        }
    };

    let raw: Vec<Position> = read_json(&args.positions)?;
    let store = Arc::new(MemoryStore::new());

    runtime()?.block_on(async {
        for p in raw {
            let position = Position::new(p.entity_id, p.latitude, p.longitude, p.observed_at)
                .map_err(|e| CliError::Input(e.to_string()))?;
            store.create_position(position).await?;
        }

        let positions = match range {
            Some(range) => store.positions_between(range.from, range.to).await?,
            None => store.all_positions().await?,
        };
        let significant = filter_significant(&positions, &config.filter);
        info!(
            input = positions.len(),
            output = significant.len(),
            "Trail filtered"
        );
        Ok::<_, CliError>(significant)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_trail(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("positions.json");
        let trail: Vec<String> = (0..5)
            .map(|i| {
                format!(
                    r#"{{"entity_id": 1, "latitude": 0.0, "longitude": 0.0, "observed_at": "2024-05-01T09:{:02}:00Z"}}"#,
                    i * 5
                )
            })
            .collect();
        std::fs::write(&path, format!("[{}]", trail.join(","))).unwrap();
        path
    }

    #[test]
    fn test_stationary_trail_collapses_to_one_point() {
        let temp = tempfile::tempdir().unwrap();
        let positions = write_trail(temp.path());

        let significant = run(
            SignificantArgs {
                positions,
                from: None,
                to: None,
            },
            &ConfigFile::default(),
        )
        .unwrap();
        assert_eq!(significant.len(), 1);
    }

    #[test]
    fn test_half_open_window_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let positions = write_trail(temp.path());

        let err = run(
            SignificantArgs {
                positions,
                from: Some("2024-05-01T09:00:00Z".into()),
                to: None,
            },
            &ConfigFile::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Input(_)));
    }
}
