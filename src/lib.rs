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

pub mod bcd;
pub mod codegen;
pub mod defs;
pub mod diagnostics;
pub mod encoder;
pub mod errors;
pub mod file_reader;
pub mod front_end;
pub mod ir;
pub mod long_lister;
pub mod passes;
pub mod sbuf;
pub mod short_lister;
pub mod tokens;
pub mod vars;

extern crate pest;
extern crate pest_derive;

use std::path::Path;

use anyhow::{Context, Result};

use diagnostics::Bag;
use file_reader::FileReader;
use ir::FlatProgram;
use passes::optimizer::OptimizerConfig;
use short_lister::DEFAULT_LINE_LEN;

/// Which rendering of a compiled program the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// The tokenized `SAVE`-image binary.
    Binary,
    /// Compact re-listable source text, packed to `max_line_len`.
    ShortList,
    /// One flattened statement per line, for inspecting the middle end.
    LongList,
}

/// Everything the front end and middle end need beyond the source text
/// itself: the optimizer's pass toggles and, for `ShortList`, the
/// packer's line-width ceiling.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub mode: OutputMode,
    pub optimizer: OptimizerConfig,
    pub max_line_len: usize,
    pub max_line_bytes: u16,
    /// `-k`: keep `REM` statements in binary output. When false, comment
    /// statements are turned into the same no-op form the optimizer
    /// already uses for dead code, rather than growing the encoder a
    /// second comment-stripping code path.
    pub keep_comments: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            mode: OutputMode::Binary,
            optimizer: OptimizerConfig::default(),
            max_line_len: DEFAULT_LINE_LEN,
            max_line_bytes: 0xFF,
            keep_comments: true,
        }
    }
}

/// Runs the whole pipeline over already-read source text: parse, desugar
/// and optimize, then render in the requested `mode`. Returns the
/// rendered bytes plus whatever warnings the run accumulated. `reader`
/// is only consulted when the source contains a binary-include
/// `.DEFINE`; callers with no such directives can pass `&SourceFileReader`.
pub fn compile(
    source: &str,
    file_name: &str,
    opts: &CompileOptions,
    reader: &dyn FileReader,
) -> Result<(Vec<u8>, Bag), errors::CompileError> {
    let mut warnings = Bag::new(file_name);

    let program = front_end::parse_source(source, &mut warnings, reader)?;
    let mut flat: FlatProgram = passes::run(program, &opts.optimizer, &mut warnings)?;

    if !opts.keep_comments {
        for s in flat.stmts.iter_mut() {
            if s.code == tokens::StmtCode::Rem {
                s.code = tokens::StmtCode::RemHidden;
                s.text = None;
            }
        }
    }

    let rendered = match opts.mode {
        OutputMode::Binary => {
            let enc_opts = encoder::EncodeOptions { max_line_bytes: opts.max_line_bytes };
            encoder::encode(&flat, &enc_opts)?
        }
        OutputMode::ShortList => short_lister::list_short(&flat, opts.max_line_len, &mut warnings)?,
        OutputMode::LongList => {
            // Reaching this arm means every earlier stage already
            // succeeded, so this is the long output's compiling mode:
            // the register-machine lowering runs too, its form appended
            // after the flat statement trace.
            let mut text = long_lister::list_long(&flat);
            let lowered = codegen::lower(&flat);
            text.extend_from_slice(b"\n; register-machine lowering\n");
            text.extend(codegen::render(&lowered));
            text
        }
    };

    Ok((rendered, warnings))
}

/// Reads `source_path` through `reader` and compiles it per `opts`.
/// Thin filesystem wrapper around [`compile`] so callers that already
/// hold source text in memory (tests, editors) can skip file I/O.
pub fn compile_file<F: FileReader>(source_path: &Path, opts: &CompileOptions, reader: &F) -> Result<(Vec<u8>, Bag)> {
    let source = reader
        .read_to_string(source_path)
        .with_context(|| format!("failed to read {}", source_path.display()))?;
    let file_name = source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_path.display().to_string());
    compile(&source, &file_name, opts, reader).map_err(anyhow::Error::from)
}
