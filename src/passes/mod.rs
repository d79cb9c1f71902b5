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

//! The middle-end pipeline between parsing and output formatting:
//! PROC/EXEC lowering, control-flow desugaring, and the optimizer.

pub mod control_flow;
pub mod optimizer;
pub mod proc_lowering;

use crate::diagnostics::Bag;
use crate::errors::CompileError;
use crate::ir::{FlatProgram, Program};
use optimizer::OptimizerConfig;

/// Runs the full middle-end over a freshly parsed `Program`, returning
/// the flat, optimized form ready for code-generation or encoding.
pub fn run(mut program: Program, config: &OptimizerConfig, warnings: &mut Bag) -> Result<FlatProgram, CompileError> {
    proc_lowering::lower_procs(&mut program)?;
    let stmts = control_flow::desugar(&mut program, warnings)?;
    let mut flat = FlatProgram::from_program(program, stmts);
    optimizer::optimize(&mut flat, config, warnings)?;
    Ok(flat)
}
