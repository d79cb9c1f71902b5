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

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{ArgAction, Parser};

use tbxlc::file_reader::{FileReader, SourceFileReader};
use tbxlc::passes::optimizer::OptimizerConfig;
use tbxlc::short_lister::{DEFAULT_LINE_LEN, MAX_LINE_LEN, MIN_LINE_LEN};
use tbxlc::{compile, CompileOptions, OutputMode};

const OPTIMIZER_PASS_NAMES: &[&str] = &["const-fold", "number-tok", "commute", "line-num", "const-vars", "fixed-vars"];

/// Compiles TurboBasic XL source to a `SAVE` image, a short re-listable
/// form, or a flat debug listing.
#[derive(Parser)]
#[command(version, author = "Connor Nolan")]
struct Opts {
    /// Source files to compile.
    inputs: Vec<PathBuf>,

    /// Binary `SAVE`-image output (default).
    #[arg(short = 'b')]
    binary: bool,
    /// Flat, one-statement-per-line debug listing.
    #[arg(short = 'l')]
    long_list: bool,
    /// Compact, re-listable short listing.
    #[arg(short = 's')]
    short_list: bool,

    /// Output path, or an extension (starting with `.`) applied per input file.
    #[arg(short = 'o')]
    output: Option<String>,
    /// Write output to stdout instead of a file.
    #[arg(short = 'c')]
    stdout: bool,

    /// Max line length: 16..511 chars for short listing, 16..255 bytes for binary.
    #[arg(short = 'n')]
    max_len: Option<u16>,

    /// Full variable names in binary output (unsupported: encoder always
    /// emits the short-name form; accepted for command-line compatibility).
    #[arg(short = 'f')]
    full_names: bool,
    /// Protected binary (unsupported; accepted for command-line compatibility).
    #[arg(short = 'x')]
    protected: bool,
    /// Keep `REM` comments in binary output.
    #[arg(short = 'k')]
    keep_comments: bool,

    /// ASCII-convert comments in long listing (unsupported; accepted for
    /// command-line compatibility).
    #[arg(short = 'a')]
    ascii_comments: bool,
    /// Atari BASIC dialect instead of TurboBasic XL (unsupported; accepted
    /// for command-line compatibility).
    #[arg(short = 'A')]
    atari_dialect: bool,

    /// Enable/disable one optimizer pass (`name`, `+name`, `-name`), or
    /// `help` to list pass names. Bare `-O` enables every pass.
    #[arg(short = 'O', num_args = 0..=1, default_missing_value = "", action = ArgAction::Append)]
    opt: Vec<String>,

    /// More verbose logging (repeatable).
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,
    /// Suppress warnings.
    #[arg(short = 'q')]
    quiet: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn resolve_optimizer_config(opt: &[String]) -> Result<OptimizerConfig> {
    let mut config = OptimizerConfig::default();
    for raw in opt {
        if raw.is_empty() {
            config = OptimizerConfig::default();
            continue;
        }
        if raw.eq_ignore_ascii_case("help") {
            println!("optimizer passes: {}", OPTIMIZER_PASS_NAMES.join(", "));
            std::process::exit(0);
        }
        if config.apply_flag(raw).is_none() {
            bail!("unknown optimizer pass '{raw}' (see -O help)");
        }
    }
    Ok(config)
}

fn output_mode(opts: &Opts) -> OutputMode {
    if opts.short_list {
        OutputMode::ShortList
    } else if opts.long_list {
        OutputMode::LongList
    } else {
        OutputMode::Binary
    }
}

fn output_path_for(input: &Path, output: &Option<String>, mode: OutputMode) -> PathBuf {
    match output {
        Some(spec) if spec.starts_with('.') => input.with_extension(spec.trim_start_matches('.')),
        Some(spec) => PathBuf::from(spec),
        None => {
            let ext = match mode {
                OutputMode::Binary => "bas.bin",
                OutputMode::ShortList => "lst.bas",
                OutputMode::LongList => "dbg.txt",
            };
            input.with_extension(ext)
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn compile_one(input: &Path, opts: &Opts, optimizer: OptimizerConfig, mode: OutputMode) -> Result<()> {
    let reader = SourceFileReader;
    let source = reader
        .read_to_string(input)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", input.display()))?;
    let file_name = input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| input.display().to_string());

    let max_line_len = match opts.max_len {
        Some(n) => (n as usize).clamp(MIN_LINE_LEN, MAX_LINE_LEN),
        None => DEFAULT_LINE_LEN,
    };
    let max_line_bytes = match opts.max_len {
        Some(n) => n.clamp(16, 255),
        None => 0xFF,
    };

    let compile_opts = CompileOptions { mode, optimizer, max_line_len, max_line_bytes, keep_comments: opts.keep_comments || mode != OutputMode::Binary };

    let (rendered, warnings) = compile(&source, &file_name, &compile_opts, &reader).map_err(|e| anyhow::anyhow!("{e}"))?;
    for w in warnings.warnings() {
        log::warn!("{w}");
    }

    if opts.stdout {
        std::io::stdout().write_all(&rendered)?;
        return Ok(());
    }

    let out_path = output_path_for(input, &opts.output, mode);
    if same_file(input, &out_path) {
        bail!("refusing to overwrite input file {}", input.display());
    }
    std::fs::write(&out_path, &rendered)?;
    println!("{} -> {}", input.display(), out_path.display());
    Ok(())
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    init_logging(opts.verbose, opts.quiet);

    if opts.inputs.is_empty() {
        bail!("no input files given");
    }

    let optimizer = resolve_optimizer_config(&opts.opt)?;
    let mode = output_mode(&opts);

    let mut any_failed = false;
    for input in &opts.inputs {
        if let Err(e) = compile_one(input, &opts, optimizer, mode) {
            eprintln!("{}: {e}", input.display());
            any_failed = true;
        }
    }

    if any_failed {
        std::process::exit(1);
    }
    Ok(())
}
