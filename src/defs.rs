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

//! Named compile-time macros (`.DEFINE`-style), each either a numeric
//! constant or a short string byte blob. Definitions are resolved to
//! literals during front-end IR construction and never survive into
//! the optimizer or later passes.

use crate::diagnostics::Bag;
use crate::errors::CompileError;
use crate::file_reader::FileReader;
use crate::vars::ascii_ident_eq;

pub const MAX_DEFS: usize = 512;
const MAX_STRING_DEF_LEN: usize = 247;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefId(pub u16);

#[derive(Debug, Clone)]
enum DefValue {
    Number(f64),
    String(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Def {
    name: String,
    value: Option<DefValue>,
}

#[derive(Debug, Default)]
pub struct DefTable {
    defs: Vec<Def>,
}

impl DefTable {
    pub fn new() -> Self {
        DefTable { defs: Vec::new() }
    }

    pub fn search(&self, name: &str) -> Option<DefId> {
        self.defs.iter().position(|d| ascii_ident_eq(&d.name, name)).map(|i| DefId(i as u16))
    }

    /// Declares a new definition, warning if its name shadows a
    /// reserved keyword spelling (checked by the caller, which has
    /// access to the token/statement tables).
    pub fn new_def(&mut self, name: &str, line: u32, warnings: &mut Bag) -> std::result::Result<DefId, CompileError> {
        if let Some(id) = self.search(name) {
            return Ok(id);
        }
        if self.defs.len() >= MAX_DEFS {
            return Err(CompileError::semantic(line, format!("too many definitions, cannot define '{name}'")));
        }
        if crate::tokens::is_reserved_spelling(name) {
            warnings.warn(line, format!("definition name '{name}' is a reserved keyword"));
        }
        self.defs.push(Def { name: name.to_string(), value: None });
        Ok(DefId((self.defs.len() - 1) as u16))
    }

    pub fn set_number(&mut self, id: DefId, v: f64) {
        self.defs[id.0 as usize].value = Some(DefValue::Number(v));
    }

    pub fn set_string(&mut self, id: DefId, bytes: Vec<u8>) {
        self.defs[id.0 as usize].value = Some(DefValue::String(bytes));
    }

    /// Reads up to 247 bytes from `path` starting at `offset`, through
    /// `reader`, and binds them as a string definition, matching the
    /// "include binary file" operation: bytes are spliced in verbatim
    /// as string content.
    pub fn set_binary_include(
        &mut self,
        id: DefId,
        path: &std::path::Path,
        offset: u64,
        line: u32,
        reader: &dyn FileReader,
    ) -> std::result::Result<(), CompileError> {
        let whole = reader
            .read_binary(path)
            .map_err(|e| CompileError::semantic(line, format!("cannot read '{}': {e}", path.display())))?;
        let start = offset as usize;
        if start > whole.len() {
            return Err(CompileError::semantic(line, format!("offset {offset} past end of '{}'", path.display())));
        }
        let end = (start + MAX_STRING_DEF_LEN).min(whole.len());
        self.set_string(id, whole[start..end].to_vec());
        Ok(())
    }

    pub fn get_number(&self, id: DefId) -> Option<f64> {
        match &self.defs[id.0 as usize].value {
            Some(DefValue::Number(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_string(&self, id: DefId) -> Option<&[u8]> {
        match &self.defs[id.0 as usize].value {
            Some(DefValue::String(v)) => Some(v),
            _ => None,
        }
    }

    pub fn is_string(&self, id: DefId) -> bool {
        matches!(self.defs[id.0 as usize].value, Some(DefValue::String(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_reader::MockFileReader;

    #[test]
    fn binary_include_slices_bytes_starting_at_the_given_offset() {
        let mut reader = MockFileReader::default();
        reader.add_binary_file("font.bin", b"ABCDEFGH");
        let mut d = DefTable::new();
        let mut warnings = Bag::new("t.bas");
        let id = d.new_def("FONT", 1, &mut warnings).unwrap();
        d.set_binary_include(id, std::path::Path::new("font.bin"), 2, 1, &reader).unwrap();
        assert_eq!(d.get_string(id), Some(&b"CDEFGH"[..]));
    }

    #[test]
    fn binary_include_caps_at_the_max_string_length() {
        let mut reader = MockFileReader::default();
        reader.add_binary_file("big.bin", &vec![0x7Au8; 1000]);
        let mut d = DefTable::new();
        let mut warnings = Bag::new("t.bas");
        let id = d.new_def("BIG", 1, &mut warnings).unwrap();
        d.set_binary_include(id, std::path::Path::new("big.bin"), 0, 1, &reader).unwrap();
        assert_eq!(d.get_string(id).unwrap().len(), MAX_STRING_DEF_LEN);
    }

    #[test]
    fn binary_include_past_end_of_file_is_a_semantic_error() {
        let mut reader = MockFileReader::default();
        reader.add_binary_file("small.bin", b"AB");
        let mut d = DefTable::new();
        let mut warnings = Bag::new("t.bas");
        let id = d.new_def("SMALL", 1, &mut warnings).unwrap();
        assert!(d.set_binary_include(id, std::path::Path::new("small.bin"), 10, 1, &reader).is_err());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut d = DefTable::new();
        let mut warnings = Bag::new("t.bas");
        let id = d.new_def("SCREEN_W", 1, &mut warnings).unwrap();
        assert_eq!(d.search("screen_w"), Some(id));
    }

    #[test]
    fn string_definitions_cap_at_247_bytes() {
        assert!(MAX_STRING_DEF_LEN == 247);
    }

    #[test]
    fn table_overflow_is_a_semantic_error() {
        let mut d = DefTable::new();
        let mut warnings = Bag::new("t.bas");
        for i in 0..MAX_DEFS {
            d.new_def(&format!("D{i}"), 1, &mut warnings).unwrap();
        }
        assert!(d.new_def("OVERFLOW", 1, &mut warnings).is_err());
    }
}
