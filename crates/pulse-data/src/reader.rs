//! Spreadsheet-export discovery and loading.
//!
//! Reads the JSON exports of the studio's sheets (sessions, check-ins, sales,
//! leads) from a data directory and adapts every row to a [`RawRecord`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use pulse_core::data_processors::{value_as_text, RecordAdapter};
use pulse_core::error::{PulseError, Result};
use pulse_core::models::{is_placeholder, RawRecord, RecordKind};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

// ── Public API ────────────────────────────────────────────────────────────────

/// Everything read from one data directory.
#[derive(Debug, Clone, Default)]
pub struct LoadedData {
    pub records: Vec<RawRecord>,
    /// Files that contributed records.
    pub files_read: usize,
    /// Files skipped because their kind was unknown or they could not be read.
    pub files_skipped: usize,
    /// Rows dropped because their unique id was already seen.
    pub duplicates: usize,
}

/// Find all `.json` / `.jsonl` files recursively under `data_path`, sorted by
/// path.
pub fn find_data_files(data_path: &Path) -> Vec<PathBuf> {
    if !data_path.exists() {
        warn!("Data path does not exist: {}", data_path.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "json" || ext == "jsonl")
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Infer which feed a file holds from its file stem.
pub fn kind_from_path(path: &Path) -> Option<RecordKind> {
    let stem = path.file_stem()?.to_string_lossy().to_lowercase();
    // Check-ins first: "session_checkins" is a check-in feed.
    if stem.contains("checkin") || stem.contains("check-in") || stem.contains("check_in") {
        Some(RecordKind::Checkin)
    } else if stem.contains("session") || stem.contains("class") {
        Some(RecordKind::Session)
    } else if stem.contains("sale") || stem.contains("payment") {
        Some(RecordKind::Sale)
    } else if stem.contains("lead") {
        Some(RecordKind::Lead)
    } else {
        None
    }
}

/// Load every recognised export under `data_path`.
///
/// Fails only when the directory is missing or holds no data files;
/// individual bad files and rows are logged and skipped.
pub fn load_records(data_path: &Path) -> Result<LoadedData> {
    if !data_path.exists() {
        return Err(PulseError::DataPathNotFound(data_path.to_path_buf()));
    }
    let files = find_data_files(data_path);
    if files.is_empty() {
        return Err(PulseError::NoDataFiles(data_path.to_path_buf()));
    }

    let mut loaded = LoadedData::default();
    let mut seen_ids: HashSet<(RecordKind, String)> = HashSet::new();

    for file_path in &files {
        let Some(kind) = kind_from_path(file_path) else {
            warn!(
                "Skipping {}: cannot tell which feed it holds",
                file_path.display()
            );
            loaded.files_skipped += 1;
            continue;
        };

        let records = match load_file(file_path, kind) {
            Ok(records) => records,
            Err(e) => {
                warn!("{}", e);
                loaded.files_skipped += 1;
                continue;
            }
        };

        loaded.files_read += 1;
        for record in records {
            if !is_placeholder(&record.id) && !seen_ids.insert((kind, record.id.clone())) {
                loaded.duplicates += 1;
                continue;
            }
            loaded.records.push(record);
        }
    }

    info!(
        "Loaded {} records from {} files ({} skipped, {} duplicates)",
        loaded.records.len(),
        loaded.files_read,
        loaded.files_skipped,
        loaded.duplicates
    );

    Ok(loaded)
}

/// Read one export file and adapt its rows.
pub fn load_file(file_path: &Path, kind: RecordKind) -> Result<Vec<RawRecord>> {
    let content = std::fs::read_to_string(file_path).map_err(|source| PulseError::FileRead {
        path: file_path.to_path_buf(),
        source,
    })?;

    let rows = parse_rows(&content);
    let records: Vec<RawRecord> = rows
        .iter()
        .map(|row| RecordAdapter::adapt(kind, row))
        .collect();

    debug!(
        "File {}: {} {} rows",
        file_path.display(),
        records.len(),
        kind.as_str()
    );

    Ok(records)
}

// ── Row extraction ────────────────────────────────────────────────────────────

/// Split an export into row objects.
///
/// Accepts a JSON array of objects, a spreadsheet values response
/// (`{"values": [[header…], [cell…]]}`), a bare 2-D array with a header
/// row, a single object, or JSON lines.
pub fn parse_rows(content: &str) -> Vec<Value> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(obj)) => {
            if let Some(Value::Array(grid)) = obj.get("values") {
                return rows_from_grid(grid);
            }
            vec![Value::Object(obj)]
        }
        Ok(Value::Array(items)) => {
            if items.first().map(Value::is_array).unwrap_or(false) {
                rows_from_grid(&items)
            } else {
                items.into_iter().filter(Value::is_object).collect()
            }
        }
        Ok(_) => Vec::new(),
        Err(_) => parse_json_lines(trimmed),
    }
}

fn parse_json_lines(content: &str) -> Vec<Value> {
    let mut rows = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) if value.is_object() => rows.push(value),
            Ok(_) => debug!("Line {}: not an object, skipped", line_no + 1),
            Err(e) => debug!("Line {}: failed to parse JSON: {}", line_no + 1, e),
        }
    }
    rows
}

/// Turn a header-first grid into row objects. Short rows are padded with
/// empty cells; blank header cells are dropped.
fn rows_from_grid(grid: &[Value]) -> Vec<Value> {
    let Some((header_row, body)) = grid.split_first() else {
        return Vec::new();
    };
    let headers: Vec<Option<String>> = header_row
        .as_array()
        .map(|cells| cells.iter().map(value_as_text).collect())
        .unwrap_or_default();

    body.iter()
        .filter_map(Value::as_array)
        .filter(|cells| cells.iter().any(|c| value_as_text(c).is_some()))
        .map(|cells| {
            let mut row = Map::new();
            for (i, header) in headers.iter().enumerate() {
                let Some(header) = header else { continue };
                let cell = cells.get(i).cloned().unwrap_or(Value::String(String::new()));
                row.insert(header.clone(), cell);
            }
            Value::Object(row)
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
