//! JSON-lines persistence shared by the source registry and ingest ledger.

use crag_core::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Read every record of a JSONL file. A missing file reads as empty.
pub(crate) fn read_records<T: DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open {:?}: {}", path, e)))?;

    let mut records = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            AppError::Knowledge(format!("Failed to read line {}: {}", line_num + 1, e))
        })?;

        if line.trim().is_empty() {
            continue;
        }

        let record = serde_json::from_str(&line).map_err(|e| {
            AppError::Knowledge(format!(
                "Failed to parse line {} in {:?}: {}",
                line_num + 1,
                path,
                e
            ))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Append one record, creating the file and its directory if needed.
pub(crate) fn append_record<T: Serialize>(path: &Path, record: &T) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open {:?}: {}", path, e)))?;

    let json_line = serde_json::to_string(record)?;

    writeln!(file, "{}", json_line)
        .map_err(|e| AppError::Knowledge(format!("Failed to write to {:?}: {}", path, e)))?;

    file.sync_all()
        .map_err(|e| AppError::Knowledge(format!("Failed to sync {:?}: {}", path, e)))?;

    Ok(())
}
