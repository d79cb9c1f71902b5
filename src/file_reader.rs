/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Filesystem access behind a trait, so the front end's binary-include
//! `.DEFINE`s and the CLI's source loading can be driven from an
//! in-memory double in tests instead of touching disk.

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub trait FileReader {
    /// Reads `path` as BASIC source text.
    fn read_to_string(&self, path: &Path) -> Result<String>;
    /// Reads `path` as the raw bytes a binary-include `.DEFINE` slices from.
    fn read_binary(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Reads straight off disk.
pub struct SourceFileReader;

impl FileReader for SourceFileReader {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }
}

#[derive(Clone)]
enum FileData {
    Text(String),
    Binary(Vec<u8>),
}

/// An in-memory double. Text and binary files live in the same map but
/// are typed at insertion, so a test that defines a source file can't
/// accidentally have it read back through the binary-include path (or
/// vice versa) without an explicit error.
#[derive(Default)]
pub struct MockFileReader {
    files: HashMap<PathBuf, FileData>,
}

impl MockFileReader {
    pub fn add_file(&mut self, path: &str, content: &str) {
        self.files.insert(PathBuf::from(path), FileData::Text(content.to_string()));
    }

    pub fn add_binary_file(&mut self, path: &str, content: &[u8]) {
        self.files.insert(PathBuf::from(path), FileData::Binary(content.to_vec()));
    }
}

impl FileReader for MockFileReader {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.files.get(path) {
            Some(FileData::Text(content)) => Ok(content.clone()),
            Some(FileData::Binary(_)) => Err(anyhow::anyhow!("cannot read binary file as string: {}", path.display())),
            None => Err(anyhow::anyhow!("mock file not found: {}", path.display())),
        }
    }

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        match self.files.get(path) {
            Some(FileData::Binary(content)) => Ok(content.clone()),
            Some(FileData::Text(_)) => Err(anyhow::anyhow!("cannot read text file as binary: {}", path.display())),
            None => Err(anyhow::anyhow!("mock file not found: {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_reader_serves_back_what_was_added() {
        let mut reader = MockFileReader::default();
        reader.add_file("prog.bas", "10 PRINT 1\n");
        reader.add_binary_file("tiles.bin", &[1, 2, 3]);
        assert_eq!(reader.read_to_string(Path::new("prog.bas")).unwrap(), "10 PRINT 1\n");
        assert_eq!(reader.read_binary(Path::new("tiles.bin")).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn mock_reader_refuses_to_cross_text_and_binary() {
        let mut reader = MockFileReader::default();
        reader.add_file("prog.bas", "10 PRINT 1\n");
        reader.add_binary_file("tiles.bin", &[1, 2, 3]);
        assert!(reader.read_binary(Path::new("prog.bas")).is_err());
        assert!(reader.read_to_string(Path::new("tiles.bin")).is_err());
    }

    #[test]
    fn mock_reader_reports_missing_files() {
        let reader = MockFileReader::default();
        assert!(reader.read_to_string(Path::new("missing.bas")).is_err());
    }
}
