//! CSV-backed scenario store
//!
//! Reads and writes scenario tables. Header rows are cached per absolute path
//! for the lifetime of the store: a scenario header is configuration, and a
//! file whose header changes under a running batch is treated as malformed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::ScenarioRecord;
use crate::common::{Error, Result};

/// Reads and writes scenario files, caching their headers
#[derive(Debug, Default)]
pub struct ScenarioStore {
    headers: RefCell<HashMap<PathBuf, Vec<String>>>,
}

/// Lazy pass over the rows of one scenario file
pub struct ScenarioRows {
    path: PathBuf,
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<File>,
}

impl ScenarioRows {
    /// Header row of the file being read
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for ScenarioRows {
    type Item = Result<ScenarioRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(match record {
            Ok(values) => Ok(ScenarioRecord::from_row(&self.headers, &values.iter().collect::<Vec<_>>())),
            Err(e) => Err(csv_to_scenario_error(&self.path, e)),
        })
    }
}

fn csv_to_scenario_error(path: &Path, e: csv::Error) -> Error {
    match e.kind() {
        csv::ErrorKind::UnequalLengths { .. } | csv::ErrorKind::Utf8 { .. } => {
            Error::malformed_scenario(path, e.to_string())
        }
        _ => Error::Csv(e),
    }
}

fn cache_key(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| Error::file_read(path, e))
}

impl ScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new pass over the rows of a scenario file
    ///
    /// Fails if the header row is missing, or differs from the header this
    /// store already saw for the same file.
    pub fn read_rows(&self, path: &Path) -> Result<ScenarioRows> {
        let key = cache_key(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_path(path)
            .map_err(|e| csv_to_scenario_error(path, e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| csv_to_scenario_error(path, e))?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(Error::malformed_scenario(path, "missing header row"));
        }

        let mut cache = self.headers.borrow_mut();
        match cache.get(&key) {
            Some(cached) if *cached != headers => {
                return Err(Error::malformed_scenario(
                    path,
                    format!(
                        "header changed from [{}] to [{}]",
                        cached.join(", "),
                        headers.join(", ")
                    ),
                ));
            }
            Some(_) => {}
            None => {
                cache.insert(key, headers.clone());
            }
        }

        Ok(ScenarioRows {
            path: path.to_path_buf(),
            headers,
            records: reader.into_records(),
        })
    }

    /// Ordered header of a scenario file
    pub fn headers(&self, path: &Path) -> Result<Vec<String>> {
        let key = cache_key(path)?;
        if let Some(headers) = self.headers.borrow().get(&key) {
            return Ok(headers.clone());
        }
        Ok(self.read_rows(path)?.headers().to_vec())
    }

    /// Check that `column` is one of the headers of `schema_path`
    pub fn validate_column(&self, schema_path: &Path, column: &str) -> Result<()> {
        if self.headers(schema_path)?.iter().any(|h| h == column) {
            Ok(())
        } else {
            Err(Error::UnknownColumn {
                column: column.to_string(),
                schema: schema_path.to_path_buf(),
            })
        }
    }

    /// Read the only row of a scenario file, all fields included
    ///
    /// With `tolerate_extra` unset, a second row is an error.
    pub fn read_single_row(&self, path: &Path, tolerate_extra: bool) -> Result<ScenarioRecord> {
        let mut rows = self.read_rows(path)?;
        let record = match rows.next() {
            Some(record) => record?,
            None => return Err(Error::malformed_scenario(path, "no scenario row")),
        };
        if rows.next().is_some() {
            if !tolerate_extra {
                return Err(Error::MultipleScenarioRows(path.to_path_buf()));
            }
            tracing::warn!("Ignoring extra rows in {}", path.display());
        }
        Ok(record)
    }

    /// Read the only row of a scenario file, projected to its concrete fields
    pub fn read_concrete_row(&self, path: &Path, tolerate_extra: bool) -> Result<ScenarioRecord> {
        Ok(self.read_single_row(path, tolerate_extra)?.concrete())
    }

    /// Overwrite a scenario file with a header and a single row
    ///
    /// `record` must carry exactly the fields of `field_order`, in that order.
    /// The file is written to a sibling and renamed over the target.
    pub fn write_row(&self, path: &Path, field_order: &[String], record: &ScenarioRecord) -> Result<()> {
        if !record.names().eq(field_order.iter().map(String::as_str)) {
            return Err(Error::schema(
                path,
                format!(
                    "record fields [{}] do not match header [{}]",
                    record.names().collect::<Vec<_>>().join(", "),
                    field_order.join(", ")
                ),
            ));
        }

        if let Ok(key) = path.canonicalize() {
            if let Some(cached) = self.headers.borrow().get(&key) {
                if cached.as_slice() != field_order {
                    return Err(Error::schema(
                        path,
                        format!(
                            "header [{}] differs from existing header [{}]",
                            field_order.join(", "),
                            cached.join(", ")
                        ),
                    ));
                }
            }
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| Error::Internal(format!("Not a file path: {}", path.display())))?;
        let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

        let mut writer = csv::Writer::from_path(&tmp)?;
        writer.write_record(field_order)?;
        writer.write_record(record.values())?;
        let file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, path)?;

        let key = cache_key(path)?;
        self.headers.borrow_mut().insert(key, field_order.to_vec());
        tracing::debug!("Wrote scenario {} to {}", record, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_read_rows_is_restartable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenarios.csv");
        fs::write(&path, "mode,duration?\ns2idle,10\ndeep,20\n").unwrap();

        let store = ScenarioStore::new();
        for _ in 0..2 {
            let rows: Vec<_> = store.read_rows(&path).unwrap().collect::<Result<_>>().unwrap();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[1].get("mode"), Some("deep"));
            assert_eq!(rows[1].get("duration?"), Some("20"));
        }
    }

    #[test]
    fn test_missing_header_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenarios.csv");
        fs::write(&path, "").unwrap();

        let err = ScenarioStore::new().read_rows(&path).err().unwrap();
        assert!(matches!(err, Error::MalformedScenarioFile { .. }));
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenarios.csv");
        fs::write(&path, "mode,result\ns2idle\n").unwrap();

        let mut rows = ScenarioStore::new().read_rows(&path).unwrap();
        assert!(matches!(rows.next(), Some(Err(Error::MalformedScenarioFile { .. }))));
    }

    #[test]
    fn test_header_change_between_reads_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenarios.csv");
        fs::write(&path, "mode,result\ns2idle,\n").unwrap();

        let store = ScenarioStore::new();
        store.read_rows(&path).unwrap();
        fs::write(&path, "mode,verdict\ns2idle,\n").unwrap();
        assert!(matches!(
            store.read_rows(&path).err(),
            Some(Error::MalformedScenarioFile { .. })
        ));
    }

    #[test]
    fn test_single_row_strict_and_tolerant() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.csv");
        fs::write(&path, "mode,notes?\ns2idle,a\ndeep,b\n").unwrap();

        let store = ScenarioStore::new();
        assert!(matches!(
            store.read_concrete_row(&path, false),
            Err(Error::MultipleScenarioRows(_))
        ));
        let row = store.read_concrete_row(&path, true).unwrap();
        assert_eq!(row.names().collect::<Vec<_>>(), vec!["mode"]);
        assert_eq!(row.get("mode"), Some("s2idle"));
    }

    #[test]
    fn test_single_row_requires_a_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.csv");
        fs::write(&path, "mode,result\n").unwrap();

        assert!(matches!(
            ScenarioStore::new().read_single_row(&path, false),
            Err(Error::MalformedScenarioFile { .. })
        ));
    }

    #[test]
    fn test_write_then_read_preserves_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.csv");
        fs::write(&path, "mode,result,duration?\ns2idle,,10\n").unwrap();

        let store = ScenarioStore::new();
        let headers = store.headers(&path).unwrap();
        let mut record = store.read_single_row(&path, false).unwrap();
        record.set("result", "pass");
        store.write_row(&path, &headers, &record).unwrap();

        let reread = ScenarioStore::new().read_single_row(&path, false).unwrap();
        assert_eq!(reread.names().collect::<Vec<_>>(), vec!["mode", "result", "duration?"]);
        assert_eq!(reread.values().collect::<Vec<_>>(), vec!["s2idle", "pass", "10"]);
        assert!(!dir.path().join(".scenario.csv.tmp").exists());
    }

    #[test]
    fn test_write_rejects_field_order_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.csv");
        let record = ScenarioRecord::from_row(&["result", "mode"], &["pass", "s2idle"]);

        let err = ScenarioStore::new()
            .write_row(&path, &strings(&["mode", "result"]), &record)
            .unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_rejects_header_change_for_known_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.csv");
        fs::write(&path, "mode,result\ns2idle,\n").unwrap();

        let store = ScenarioStore::new();
        store.headers(&path).unwrap();
        let record = ScenarioRecord::from_row(&["mode", "verdict"], &["s2idle", "pass"]);
        let err = store
            .write_row(&path, &strings(&["mode", "verdict"]), &record)
            .unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn test_validate_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenarios.csv");
        fs::write(&path, "mode,result\n").unwrap();

        let store = ScenarioStore::new();
        store.validate_column(&path, "result").unwrap();
        assert!(matches!(
            store.validate_column(&path, "verdict"),
            Err(Error::UnknownColumn { ref column, .. }) if column == "verdict"
        ));
    }
}
