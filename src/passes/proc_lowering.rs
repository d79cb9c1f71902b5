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

//! Rewrites parameterized procedures (`PROC name, params; locals` /
//! `EXEC name, args`) to the flat `PROC`/`EXEC` form the historical
//! interpreter understands: each parameter becomes a synthetic
//! variable, and every call site becomes a sequence of hidden
//! assignments immediately before a bare `EXEC`.

use std::collections::HashMap;

use crate::errors::CompileError;
use crate::ir::expr::{Expr, ExprId};
use crate::ir::stmt::{ProgramItem, Stmt};
use crate::ir::Program;
use crate::tokens::StmtCode;
use crate::vars::{VarId, VarType};

#[derive(Debug, Clone)]
struct Param {
    original: VarId,
    synthetic: VarId,
    is_string: bool,
    string_dim: Option<u32>,
}

#[derive(Debug, Clone)]
struct ProcDesc {
    label: VarId,
    params: Vec<Param>,
}

pub struct ProcLowering<'p> {
    program: &'p mut Program,
    procs: HashMap<VarId, ProcDesc>,
}

impl<'p> ProcLowering<'p> {
    pub fn new(program: &'p mut Program) -> Self {
        ProcLowering { program, procs: HashMap::new() }
    }

    pub fn run(mut self) -> Result<(), CompileError> {
        self.collect_descriptors()?;
        self.rewrite_bodies()?;
        self.rewrite_call_sites()?;
        self.emit_dim_prelude();
        Ok(())
    }

    fn proc_name(&self, label: VarId) -> String {
        self.program.vars.long_name(label).to_string()
    }

    /// Pass 1: find every `PROC_VAR` header and build its parameter
    /// descriptor list, synthesizing `_param_<proc>_<name>` and
    /// `_local_<proc>_<name>` variables.
    fn collect_descriptors(&mut self) -> Result<(), CompileError> {
        let items = self.program.items.clone();
        for item in items {
            let ProgramItem::Statement(s) = item else { continue };
            if s.code != StmtCode::ProcVar {
                continue;
            }
            let label = s.label.ok_or_else(|| CompileError::structural(s.line, "PROC missing its label"))?;
            let proc_name = self.proc_name(label);
            let mut params = Vec::new();
            for &arg in &s.args {
                let (orig, is_local, is_string) = self.describe_param(arg)?;
                let orig_name = self.program.vars.long_name(orig).to_string();
                let kind = if is_local { "local" } else { "param" };
                let synth_name = format!("_{kind}_{proc_name}_{orig_name}");
                let vtype = if is_string { VarType::String } else { VarType::Float };
                let synthetic = self.program.vars.new_var(&synth_name, vtype)
                    .map_err(|_| CompileError::semantic(s.line, "too many synthetic PROC variables"))?;
                params.push(Param { original: orig, synthetic, is_string, string_dim: None });
            }
            self.procs.insert(label, ProcDesc { label, params });
        }
        Ok(())
    }

    fn describe_param(&self, arg: ExprId) -> Result<(VarId, bool, bool), CompileError> {
        match self.program.exprs.get(arg) {
            Expr::VarNumber(v) => Ok((*v, false, false)),
            Expr::VarString(v) => Ok((*v, false, true)),
            _ => Err(CompileError::SemanticNoLine { reason: "PROC parameter must be a bare variable reference".into() }),
        }
    }

    /// Pass 2: inside every procedure body (`PROC_VAR` .. `ENDPROC`),
    /// replace references to an original parameter/local variable with
    /// its synthetic counterpart, and turn `PROC_VAR` into a plain
    /// `PROC` label.
    fn rewrite_bodies(&mut self) -> Result<(), CompileError> {
        let mut active: Option<VarId> = None;
        for item in self.program.items.iter_mut() {
            let ProgramItem::Statement(s) = item else { continue };
            if s.code == StmtCode::ProcVar {
                let label = s.label.expect("validated in collect_descriptors");
                active = Some(label);
                s.code = StmtCode::Proc;
                s.args.clear();
                continue;
            }
            if s.code == StmtCode::EndProc {
                active = None;
            }
            if let Some(label) = active {
                let desc = self.procs.get(&label).expect("collected above").clone();
                Self::remap_stmt(&mut self.program.exprs, s, &desc);
            }
        }
        Ok(())
    }

    fn remap_stmt(exprs: &mut crate::ir::expr::ExprArena, s: &mut Stmt, desc: &ProcDesc) {
        for a in s.args.iter().chain(s.target.iter()) {
            Self::remap_expr(exprs, *a, desc);
        }
    }

    fn remap_expr(exprs: &mut crate::ir::expr::ExprArena, id: ExprId, desc: &ProcDesc) {
        let children = exprs.operands(id);
        for c in children {
            Self::remap_expr(exprs, c, desc);
        }
        let node = exprs.get_mut(id);
        match node {
            Expr::VarNumber(v) | Expr::VarString(v) | Expr::VarArray(v) => {
                if let Some(p) = desc.params.iter().find(|p| p.original == *v) {
                    *v = p.synthetic;
                }
            }
            _ => {}
        }
    }

    /// Pass 3: for every `EXEC_PAR`/`EXEC`/`ON ... EXEC` call site,
    /// splice hidden `LET_INV` assignments in right-to-left argument
    /// order immediately before the call, then drop the argument list.
    fn rewrite_call_sites(&mut self) -> Result<(), CompileError> {
        let old_items = std::mem::take(&mut self.program.items);
        let mut new_items = Vec::with_capacity(old_items.len());
        for item in old_items {
            match item {
                ProgramItem::Statement(mut s) if s.code == StmtCode::ExecPar => {
                    let label = s.label.ok_or_else(|| CompileError::structural(s.line, "EXEC missing target"))?;
                    let desc = self
                        .procs
                        .get(&label)
                        .ok_or_else(|| CompileError::semantic(s.line, "EXEC target is not a declared PROC"))?
                        .clone();
                    if s.args.len() != desc.params.len() {
                        return Err(CompileError::semantic(
                            s.line,
                            format!("EXEC arity mismatch: expected {}, got {}", desc.params.len(), s.args.len()),
                        ));
                    }
                    for (param, arg) in desc.params.iter().zip(s.args.drain(..)).collect::<Vec<_>>().into_iter().rev() {
                        let target = self.program.alloc(
                            if param.is_string { Expr::VarString(param.synthetic) } else { Expr::VarNumber(param.synthetic) },
                            s.line,
                        );
                        new_items.push(ProgramItem::Statement(
                            Stmt::new(StmtCode::LetInv, s.line).with_target(target).with_args(vec![arg]),
                        ));
                    }
                    s.code = StmtCode::Exec;
                    new_items.push(ProgramItem::Statement(s));
                }
                other => new_items.push(other),
            }
        }
        self.program.items = new_items;
        Ok(())
    }

    /// Pass 4: emit a `DIM` prelude for every string parameter, at most
    /// 14 per statement, ahead of the first program line.
    fn emit_dim_prelude(&mut self) {
        let mut string_params: Vec<VarId> = self
            .procs
            .values()
            .flat_map(|d| d.params.iter())
            .filter(|p| p.is_string)
            .map(|p| p.synthetic)
            .collect();
        string_params.sort_by_key(|v| v.0);
        string_params.dedup();
        if string_params.is_empty() {
            return;
        }
        let mut prelude = Vec::new();
        for chunk in string_params.chunks(14) {
            let args: Vec<ExprId> = chunk
                .iter()
                .map(|&v| self.program.alloc(Expr::VarString(v), 0))
                .collect();
            prelude.push(ProgramItem::Statement(Stmt::new(StmtCode::Dim, 0).with_args(args)));
        }
        prelude.extend(std::mem::take(&mut self.program.items));
        self.program.items = prelude;
    }
}

pub fn lower_procs(program: &mut Program) -> Result<(), CompileError> {
    ProcLowering::new(program).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_mismatch_is_a_semantic_error() {
        let mut p = Program::new();
        let label = p.vars.new_var("GREET", VarType::Label).unwrap();
        let param = p.vars.new_var("NAME", VarType::String).unwrap();
        let param_e = p.alloc(Expr::VarString(param), 1);
        p.push_statement(Stmt::new(StmtCode::ProcVar, 1).with_label(label).with_args(vec![param_e]));
        p.push_statement(Stmt::new(StmtCode::EndProc, 2));
        p.push_statement(Stmt::new(StmtCode::ExecPar, 3).with_label(label));
        assert!(lower_procs(&mut p).is_err());
    }

    #[test]
    fn call_site_gets_hidden_assignment_before_exec() {
        let mut p = Program::new();
        let label = p.vars.new_var("GREET", VarType::Label).unwrap();
        let param = p.vars.new_var("NAME", VarType::String).unwrap();
        let param_e = p.alloc(Expr::VarString(param), 1);
        p.push_statement(Stmt::new(StmtCode::ProcVar, 1).with_label(label).with_args(vec![param_e]));
        p.push_statement(Stmt::new(StmtCode::EndProc, 2));
        let lit = p.alloc(Expr::ConstString(b"HI".to_vec()), 3);
        p.push_statement(Stmt::new(StmtCode::ExecPar, 3).with_label(label).with_args(vec![lit]));
        lower_procs(&mut p).unwrap();
        let codes: Vec<StmtCode> = p.statements().map(|s| s.code).collect();
        assert_eq!(codes, vec![StmtCode::Proc, StmtCode::Return, StmtCode::LetInv, StmtCode::Exec]);
    }
}
