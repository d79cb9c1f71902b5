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

use thiserror::Error;

/// The error taxonomy from the compiler's pipeline: parse errors are
/// reported only as a count (the grammar itself is treated as an
/// external collaborator; only its output contract is specified here),
/// everything past that point carries a source line.
#[derive(Error, Debug, PartialEq)]
pub enum CompileError {
    #[error("parse failed with {count} error(s)")]
    Parse { count: usize },

    #[error("structural error on line {line}: {reason}")]
    Structural { line: u32, reason: String },

    #[error("semantic error on line {line}: {reason}")]
    Semantic { line: u32, reason: String },

    #[error("semantic error: {reason}")]
    SemanticNoLine { reason: String },

    #[error("encoder error: {reason}")]
    Encoder { reason: String },
}

impl CompileError {
    pub fn semantic(line: u32, reason: impl Into<String>) -> Self {
        CompileError::Semantic { line, reason: reason.into() }
    }

    pub fn structural(line: u32, reason: impl Into<String>) -> Self {
        CompileError::Structural { line, reason: reason.into() }
    }

    pub fn encoder(reason: impl Into<String>) -> Self {
        CompileError::Encoder { reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
