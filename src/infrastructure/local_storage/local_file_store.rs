// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Local filesystem adapter for reports and stage output.
//!
//! Every write goes to a temporary file in the destination directory and is
//! then renamed over the target, so a reader never sees a half-written file.

use crate::domain::errors::{MigrationError, Result};
use crate::ports::report_port::ReportStore;
use crate::ports::workspace_port::Workspace;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    pub fn new() -> Self {
        Self
    }

    fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn read_optional(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl ReportStore for LocalFileStore {
    fn read_report(&self, path: &Path) -> Result<Option<String>> {
        match self.read_optional(path)? {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                MigrationError::InvalidReport {
                    path: path.display().to_string(),
                    reason: format!("not valid UTF-8: {}", e),
                }
            }),
            None => Ok(None),
        }
    }

    fn write_report(&self, path: &Path, json: &str) -> Result<()> {
        self.write_atomic(path, json.as_bytes())
    }

    fn remove_report(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Workspace for LocalFileStore {
    fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.write_atomic(path, content)
    }

    fn read_file(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        self.read_optional(path)
    }

    fn remove_dir(&self, dir: &Path) -> Result<()> {
        match fs::remove_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new();
        let path = dir.path().join("a/b/report.json");
        store.write_report(&path, "{\"v\":1}").unwrap();
        store.write_report(&path, "{\"v\":2}").unwrap();
        assert_eq!(store.read_report(&path).unwrap().unwrap(), "{\"v\":2}");
        // no temp files left behind
        assert_eq!(fs::read_dir(dir.path().join("a/b")).unwrap().count(), 1);
    }

    #[test]
    fn test_invalid_utf8_report_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new();
        let path = dir.path().join("tm1-analysis.json");
        fs::write(&path, b"{\"orgId\": \"\xff\xfe\"}").unwrap();
        let err = store.read_report(&path).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidReport { .. }));
    }

    #[test]
    fn test_remove_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new();
        let path = dir.path().join("tm1-extraction.json");
        store.write_report(&path, "{}").unwrap();
        store.remove_report(&path).unwrap();
        assert!(store.read_report(&path).unwrap().is_none());
        // already gone
        store.remove_report(&path).unwrap();
    }

    #[test]
    fn test_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new();
        assert!(store.read_report(&dir.path().join("nope.json")).unwrap().is_none());
        assert!(store.read_file(&dir.path().join("nope/a.csv")).unwrap().is_none());
        store.remove_dir(&dir.path().join("nope")).unwrap();
    }

    #[test]
    fn test_remove_dir_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new();
        for name in ["z.txt", "sub/b.txt", "sub/deeper/a.txt"] {
            store.write_file(&dir.path().join(name), b"x").unwrap();
        }
        store.remove_dir(&dir.path().join("sub")).unwrap();
        assert!(!dir.path().join("sub").exists());
        assert_eq!(store.read_file(&dir.path().join("z.txt")).unwrap().unwrap(), b"x");
    }
}
