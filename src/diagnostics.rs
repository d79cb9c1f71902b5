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

//! Warning collection for the compile pipeline.
//!
//! The original tool prints warnings straight to stderr through a
//! `do_debug`-gated macro (`dbg.h`). This crate routes the same
//! information through `log::warn!` for interactive use, but also
//! accumulates them in a `Bag` so callers (and tests) can inspect what
//! was emitted without scraping stderr.

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

/// Accumulates warnings for one compilation unit.
#[derive(Debug, Default, Clone)]
pub struct Bag {
    file: String,
    warnings: Vec<Diagnostic>,
}

impl Bag {
    pub fn new(file: impl Into<String>) -> Self {
        Bag { file: file.into(), warnings: Vec::new() }
    }

    pub fn warn(&mut self, line: u32, message: impl Into<String>) {
        let diag = Diagnostic { file: self.file.clone(), line, message: message.into() };
        log::warn!("{diag}");
        self.warnings.push(diag);
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}
