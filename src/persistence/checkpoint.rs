use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

use crate::grid::Grid;

/// Everything needed to resume a run bit-for-bit: the grid plus the clock
/// and the root seed of the per-cell random streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub step: u64,
    pub time: f64,
    pub seed: u64,
    pub dt: f32,
    pub grid: Grid,
}

/// Metadata about a checkpoint file on disk.
#[derive(Debug, Clone)]
pub struct CheckpointMetadata {
    pub path: PathBuf,
    pub step: u64,
    pub timestamp_ms: u64,
    pub file_size: u64,
}

/// Errors that can occur during checkpoint operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Corrupt checkpoint: {}", .0.display())]
    Corrupt(PathBuf),
    #[error("No valid checkpoints found. Generate a new grid with: wildfire generate")]
    NoValidCheckpoints,
}

/// Build a checkpoint filename from step index and timestamp.
fn checkpoint_filename(step: u64, timestamp_ms: u64) -> String {
    format!("grid-step{}-{}.bin", step, timestamp_ms)
}

/// Parse step index and timestamp from a checkpoint filename.
/// Expected format: `grid-step{N}-{millis}.bin`
fn parse_checkpoint_filename(filename: &str) -> Option<(u64, u64)> {
    let stem = filename.strip_suffix(".bin")?;
    let rest = stem.strip_prefix("grid-step")?;
    let (step_str, ts_str) = rest.split_once('-')?;
    let step = step_str.parse::<u64>().ok()?;
    let ts = ts_str.parse::<u64>().ok()?;
    Some((step, ts))
}

fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Save a checkpoint to `dir` using atomic write.
///
/// Writes to a temporary file first, then renames it over the final path,
/// so a partial write never leaves a truncated checkpoint behind.
pub fn save_checkpoint(checkpoint: &Checkpoint, dir: &Path) -> Result<PathBuf, CheckpointError> {
    fs::create_dir_all(dir)?;

    let filename = checkpoint_filename(checkpoint.step, unix_millis_now());
    let target = dir.join(&filename);
    let tmp = dir.join(format!(".{}.tmp", filename));

    let encoded =
        bincode::serialize(checkpoint).map_err(|e| CheckpointError::Serialize(e.to_string()))?;

    if let Err(e) = fs::write(&tmp, &encoded) {
        let _ = fs::remove_file(&tmp);
        return Err(CheckpointError::Io(e));
    }

    if let Err(e) = fs::rename(&tmp, &target) {
        let _ = fs::remove_file(&tmp);
        return Err(CheckpointError::Io(e));
    }

    debug!(path = %target.display(), bytes = encoded.len(), "Checkpoint written");
    Ok(target)
}

/// Load a checkpoint file.
///
/// Rejects grids whose cell arrays do not match their declared shape or
/// that hold cell states the rule can never produce.
pub fn load_checkpoint(path: &Path) -> Result<Checkpoint, CheckpointError> {
    let data = fs::read(path)?;
    let checkpoint: Checkpoint =
        bincode::deserialize(&data).map_err(|e| CheckpointError::Deserialize(e.to_string()))?;

    if !checkpoint.grid.is_consistent() || !checkpoint.time.is_finite() {
        return Err(CheckpointError::Corrupt(path.to_path_buf()));
    }

    Ok(checkpoint)
}

/// List all checkpoints in a directory, newest first.
pub fn list_checkpoints(dir: &Path) -> Result<Vec<CheckpointMetadata>, CheckpointError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut checkpoints = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };

        // Skip temp files
        if filename.starts_with('.') {
            continue;
        }

        if let Some((step, timestamp_ms)) = parse_checkpoint_filename(&filename) {
            let file_size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            checkpoints.push(CheckpointMetadata {
                path: path.clone(),
                step,
                timestamp_ms,
                file_size,
            });
        }
    }

    checkpoints.sort_by(|a, b| {
        b.timestamp_ms
            .cmp(&a.timestamp_ms)
            .then(b.step.cmp(&a.step))
    });

    Ok(checkpoints)
}

/// Delete all but the `max_checkpoints` most recent checkpoints.
///
/// Returns the deleted paths.
pub fn prune_checkpoints(
    dir: &Path,
    max_checkpoints: usize,
) -> Result<Vec<PathBuf>, CheckpointError> {
    let checkpoints = list_checkpoints(dir)?;

    let mut deleted = Vec::new();
    if checkpoints.len() > max_checkpoints {
        for checkpoint in &checkpoints[max_checkpoints..] {
            fs::remove_file(&checkpoint.path)?;
            deleted.push(checkpoint.path.clone());
        }
    }

    Ok(deleted)
}

/// Load the most recent valid checkpoint, falling back to older ones if
/// newer files are corrupt.
pub fn load_latest_valid_checkpoint(dir: &Path) -> Result<Checkpoint, CheckpointError> {
    for checkpoint in &list_checkpoints(dir)? {
        match load_checkpoint(&checkpoint.path) {
            Ok(loaded) => return Ok(loaded),
            Err(e) => {
                warn!(
                    path = %checkpoint.path.display(),
                    error = %e,
                    "Corrupt checkpoint, trying next"
                );
            }
        }
    }

    Err(CheckpointError::NoValidCheckpoints)
}
