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

//! Desugars structured control flow (`DO/LOOP`, `WHILE/WEND`,
//! `REPEAT/UNTIL`, `FOR/NEXT`, block `IF`) and the remaining
//! line-number-addressed forms (`GOTO`, `GOSUB`, `ON ... GOTO/GOSUB`,
//! `TRAP`) down to the historical flat form: labels (`LBL_S`) and
//! unconditional/conditional jumps by label (`GO_S`, `IF_NUMBER`).
//!
//! Must run after `lower_procs` (component G), since the parameter
//! call sites it expands may themselves contain structured control
//! flow that still needs desugaring.

use std::collections::HashMap;

use crate::diagnostics::Bag;
use crate::errors::CompileError;
use crate::ir::expr::{Expr, ExprId};
use crate::ir::stmt::{ProgramItem, Stmt};
use crate::ir::Program;
use crate::tokens::{StmtCode, Token};
use crate::vars::VarType;

struct LabelGen {
    next_tmp: u32,
}

impl LabelGen {
    fn new() -> Self {
        LabelGen { next_tmp: 0 }
    }

    fn fresh(&mut self) -> String {
        let n = self.next_tmp;
        self.next_tmp += 1;
        format!("@_lbl_{n}")
    }
}

enum OpenBlock {
    Do { top: String, exit: String },
    While { top: String, test: String, exit: String },
    Repeat { top: String, exit: String },
    For { var: crate::vars::VarId, top: String, test: String, exit: String },
    IfThen { else_label: String },
    IfMultiline { else_label: String, end_label: String, saw_else: bool },
}

pub struct Desugar<'p> {
    program: &'p mut Program,
    out: Vec<Stmt>,
    labels: LabelGen,
    line_labels: HashMap<i64, crate::vars::VarId>,
    stack: Vec<OpenBlock>,
    warnings: &'p mut Bag,
}

impl<'p> Desugar<'p> {
    pub fn new(program: &'p mut Program, warnings: &'p mut Bag) -> Self {
        Desugar { program, out: Vec::new(), labels: LabelGen::new(), line_labels: HashMap::new(), stack: Vec::new(), warnings }
    }

    fn label_var(&mut self, name: &str) -> crate::vars::VarId {
        self.program.vars.new_var(name, VarType::Label).expect("label variable table overflow")
    }

    fn line_label(&mut self, n: i64) -> crate::vars::VarId {
        if let Some(&id) = self.line_labels.get(&n) {
            return id;
        }
        let id = self.label_var(&format!("@_lin_{n}"));
        self.line_labels.insert(n, id);
        id
    }

    fn push_lbl(&mut self, name: &str, line: u32) {
        let id = self.label_var(name);
        self.out.push(Stmt::new(StmtCode::LblS, line).with_label(id));
    }

    fn push_go(&mut self, name: &str, line: u32) {
        let id = self.label_var(name);
        self.out.push(Stmt::new(StmtCode::GoS, line).with_label(id));
    }

    fn push_if_number(&mut self, cond: ExprId, target_label: &str, line: u32) {
        let id = self.label_var(target_label);
        self.out.push(
            Stmt::new(StmtCode::IfNumber, line)
                .with_args(vec![cond])
                .with_label(id),
        );
    }

    fn negate(&mut self, e: ExprId, line: u32) -> ExprId {
        self.program.alloc(Expr::Unary(Token::Not, e), line)
    }

    /// Runs the desugar pass over `program.items`, leaving a flat
    /// `Vec<Stmt>` with every structured-control-flow statement and
    /// every `GOTO`/`GOSUB`/`ON ... GOTO/GOSUB` resolved to a label.
    pub fn run(mut self) -> Result<Vec<Stmt>, CompileError> {
        let items = std::mem::take(&mut self.program.items);
        for item in items {
            match item {
                ProgramItem::LineNumber(n) => {
                    let id = self.line_label(n);
                    self.out.push(Stmt::new(StmtCode::LblS, 0).with_label(id));
                }
                ProgramItem::Statement(s) => self.visit(s)?,
            }
        }
        if !self.stack.is_empty() {
            return Err(CompileError::SemanticNoLine { reason: "unterminated block at end of program".into() });
        }
        Ok(self.out)
    }

    fn visit(&mut self, s: Stmt) -> Result<(), CompileError> {
        let line = s.line;
        match s.code {
            StmtCode::Do => {
                let top = self.labels.fresh();
                let exit = self.labels.fresh();
                self.push_lbl(&top, line);
                self.stack.push(OpenBlock::Do { top, exit });
            }
            StmtCode::Loop => match self.stack.pop() {
                Some(OpenBlock::Do { top, exit }) => {
                    self.push_go(&top, line);
                    self.push_lbl(&exit, line);
                }
                _ => return Err(CompileError::structural(line, "LOOP without matching DO")),
            },
            StmtCode::While => {
                let top = self.labels.fresh();
                let test = self.labels.fresh();
                let exit = self.labels.fresh();
                self.push_go(&test, line);
                self.push_lbl(&top, line);
                self.stack.push(OpenBlock::While { top, test, exit });
            }
            StmtCode::Wend => match self.stack.pop() {
                Some(OpenBlock::While { top, test, exit }) => {
                    self.push_lbl(&test, line);
                    let cond = s.args.first().copied().ok_or_else(|| {
                        CompileError::structural(line, "WEND desugar missing condition from WHILE")
                    })?;
                    self.push_if_number(cond, &top, line);
                    self.push_lbl(&exit, line);
                }
                _ => return Err(CompileError::structural(line, "WEND without matching WHILE")),
            },
            StmtCode::Repeat => {
                let top = self.labels.fresh();
                let exit = self.labels.fresh();
                self.push_lbl(&top, line);
                self.stack.push(OpenBlock::Repeat { top, exit });
            }
            StmtCode::Until => match self.stack.pop() {
                Some(OpenBlock::Repeat { top, exit }) => {
                    let cond = s
                        .args
                        .first()
                        .copied()
                        .ok_or_else(|| CompileError::structural(line, "UNTIL missing condition"))?;
                    let not_cond = self.negate(cond, line);
                    self.push_if_number(not_cond, &top, line);
                    self.push_lbl(&exit, line);
                }
                _ => return Err(CompileError::structural(line, "UNTIL without matching REPEAT")),
            },
            StmtCode::For => {
                let var = s.target.ok_or_else(|| CompileError::structural(line, "FOR missing loop variable"))?;
                let var_id = match self.program.exprs.get(var) {
                    Expr::VarNumber(v) => *v,
                    _ => return Err(CompileError::structural(line, "FOR loop variable must be numeric")),
                };
                let mut args = s.args.into_iter();
                let start = args.next().ok_or_else(|| CompileError::structural(line, "FOR missing start value"))?;
                let end = args.next().ok_or_else(|| CompileError::structural(line, "FOR missing end value"))?;
                let step = args
                    .next()
                    .unwrap_or_else(|| self.program.alloc(Expr::ConstNumber(1.0), line));

                let end_var = self.program.vars.new_var(&format!("@_for_end_{}", self.labels.fresh()), VarType::Float)
                    .expect("variable table overflow");
                let step_var = self.program.vars.new_var(&format!("@_for_step_{}", self.labels.fresh()), VarType::Float)
                    .expect("variable table overflow");

                let var_e = self.program.alloc(Expr::VarNumber(var_id), line);
                let end_e = self.program.alloc(Expr::VarNumber(end_var), line);
                let step_e = self.program.alloc(Expr::VarNumber(step_var), line);

                self.out.push(Stmt::new(StmtCode::Let, line).with_target(var_e).with_args(vec![start]));
                self.out.push(Stmt::new(StmtCode::Let, line).with_target(end_e).with_args(vec![end]));
                self.out.push(Stmt::new(StmtCode::Let, line).with_target(step_e).with_args(vec![step]));

                let top = self.labels.fresh();
                let test = self.labels.fresh();
                let exit = self.labels.fresh();

                let for_flag_var = self.program.vars.new_var("bas_for_flag", VarType::AsmLabel).expect("overflow");
                let flag_e = self.program.alloc(Expr::VarAsmLabel(for_flag_var), line);
                self.push_if_number(flag_e, &test, line);
                self.push_lbl(&top, line);

                self.stack.push(OpenBlock::For { var: var_id, top, test, exit });
            }
            StmtCode::Next => match self.stack.pop() {
                Some(OpenBlock::For { var, top, test, exit }) => {
                    if let Some(nv) = s.target {
                        if let Expr::VarNumber(nv_id) = self.program.exprs.get(nv) {
                            if *nv_id != var {
                                return Err(CompileError::structural(line, "NEXT variable does not match its FOR"));
                            }
                        }
                    }
                    self.push_lbl(&test, line);
                    let var_e = self.program.alloc(Expr::VarNumber(var), line);
                    self.out.push(
                        Stmt::new(StmtCode::Let, line)
                            .with_target(var_e)
                            .with_args(vec![var_e]),
                    );
                    self.push_lbl(&top, line);
                    self.push_lbl(&exit, line);
                }
                _ => return Err(CompileError::structural(line, "NEXT without matching FOR")),
            },
            StmtCode::IfThen => {
                let l1 = self.labels.fresh();
                let cond = s
                    .args
                    .first()
                    .copied()
                    .ok_or_else(|| CompileError::structural(line, "IF missing condition"))?;
                let not_cond = self.negate(cond, line);
                self.push_if_number(not_cond, &l1, line);
                self.stack.push(OpenBlock::IfThen { else_label: l1 });
            }
            StmtCode::EndifInvisible => match self.stack.pop() {
                Some(OpenBlock::IfThen { else_label }) => self.push_lbl(&else_label, line),
                _ => return Err(CompileError::structural(line, "dangling invisible ENDIF")),
            },
            StmtCode::IfMultiline => {
                let l1 = self.labels.fresh();
                let l2 = self.labels.fresh();
                let cond = s
                    .args
                    .first()
                    .copied()
                    .ok_or_else(|| CompileError::structural(line, "IF missing condition"))?;
                let not_cond = self.negate(cond, line);
                self.push_if_number(not_cond, &l1, line);
                self.stack.push(OpenBlock::IfMultiline { else_label: l1, end_label: l2, saw_else: false });
            }
            StmtCode::Else => match self.stack.last_mut() {
                Some(OpenBlock::IfMultiline { else_label, end_label, saw_else }) => {
                    if *saw_else {
                        return Err(CompileError::structural(line, "duplicate ELSE"));
                    }
                    *saw_else = true;
                    let (else_label, end_label) = (else_label.clone(), end_label.clone());
                    self.push_go(&end_label, line);
                    self.push_lbl(&else_label, line);
                }
                _ => return Err(CompileError::structural(line, "dangling ELSE")),
            },
            StmtCode::Endif => match self.stack.pop() {
                Some(OpenBlock::IfMultiline { else_label, end_label, saw_else }) => {
                    if !saw_else {
                        self.push_lbl(&else_label, line);
                    }
                    self.push_lbl(&end_label, line);
                }
                _ => return Err(CompileError::structural(line, "ENDIF without matching IF"))
            },
            StmtCode::Exit => {
                let exit_label = self
                    .stack
                    .iter()
                    .rev()
                    .find_map(|b| match b {
                        OpenBlock::Do { exit, .. } | OpenBlock::While { exit, .. } | OpenBlock::Repeat { exit, .. } | OpenBlock::For { exit, .. } => Some(exit.clone()),
                        _ => None,
                    })
                    .ok_or_else(|| CompileError::structural(line, "EXIT outside a loop"))?;
                if !s.args.is_empty() {
                    self.warnings.warn(line, "EXIT argument is ignored in the historical interpreter");
                }
                self.push_go(&exit_label, line);
            }
            StmtCode::Goto => {
                let target = self.require_const_line(&s, line)?;
                let lbl = self.line_label(target);
                let lbl_name = self.program.vars.long_name(lbl).to_string();
                self.push_go(&lbl_name, line);
            }
            StmtCode::Gosub => {
                let target = self.require_const_line(&s, line)?;
                let lbl = self.line_label(target);
                let lbl_name = self.program.vars.long_name(lbl).to_string();
                let id = self.label_var(&lbl_name);
                self.out.push(Stmt::new(StmtCode::Exec, line).with_label(id));
            }
            StmtCode::OnGoto | StmtCode::OnGosub => {
                let selector = s
                    .args
                    .first()
                    .copied()
                    .ok_or_else(|| CompileError::structural(line, "ON missing selector expression"))?;
                let mut labels = Vec::new();
                for &n in &s.branch_targets {
                    let lbl = self.line_label(n);
                    labels.push(lbl);
                }
                self.out.push(
                    Stmt::new(StmtCode::OnGo, line)
                        .with_args(vec![selector])
                        .with_text(if s.code == StmtCode::OnGosub { vec![1] } else { vec![0] })
                        .with_branch_targets(labels.iter().map(|v| v.0 as i64).collect()),
                );
            }
            StmtCode::Pop => {
                self.warnings.warn(line, "POP is unnecessary once control flow is flattened; removed");
            }
            StmtCode::EndProc => {
                self.out.push(Stmt::new(StmtCode::Return, line));
            }
            StmtCode::Cls => {
                let code = self.program.alloc(Expr::ConstNumber(125.0), line);
                let args = if let Some(chan) = s.args.first().copied() {
                    vec![chan, code]
                } else {
                    vec![code]
                };
                self.out.push(Stmt::new(StmtCode::Put, line).with_args(args));
            }
            StmtCode::Com => {
                for a in s.args {
                    self.out.push(Stmt::new(StmtCode::Com, line).with_args(vec![a]));
                }
            }
            StmtCode::Dim if s.args.len() > 1 => {
                for a in s.args {
                    self.out.push(Stmt::new(StmtCode::Dim, line).with_args(vec![a]));
                }
            }
            StmtCode::SetColor => {
                self.desugar_setcolor(s, line)?;
            }
            StmtCode::Sound => {
                self.desugar_sound(s, line)?;
            }
            StmtCode::Trap => {
                let target = self.require_const_line(&s, line)?;
                if target > 32767 {
                    self.out.push(Stmt::new(StmtCode::Trap, line).with_branch_targets(vec![-1]));
                } else {
                    let lbl = self.line_label(target);
                    self.out.push(Stmt::new(StmtCode::Trap, line).with_label(lbl));
                }
            }
            StmtCode::ProcVar | StmtCode::ExecPar => {
                return Err(CompileError::structural(line, "PROC/EXEC with parameters must be lowered before control-flow desugar"));
            }
            _ if crate::tokens::is_structured_control_flow(s.code) => {
                return Err(CompileError::structural(line, "unhandled structured statement"));
            }
            _ => self.out.push(s),
        }
        Ok(())
    }

    fn require_const_line(&self, s: &Stmt, line: u32) -> Result<i64, CompileError> {
        s.branch_targets
            .first()
            .copied()
            .ok_or_else(|| CompileError::structural(line, "missing target line number"))
    }

    fn desugar_setcolor(&mut self, s: Stmt, line: u32) -> Result<(), CompileError> {
        let mut it = s.args.into_iter();
        let col = it.next().ok_or_else(|| CompileError::structural(line, "SETCOLOR missing arguments"))?;
        let hue = it.next().ok_or_else(|| CompileError::structural(line, "SETCOLOR missing arguments"))?;
        let lum = it.next().ok_or_else(|| CompileError::structural(line, "SETCOLOR missing arguments"))?;

        let c7 = self.binop(Token::BitAnd, col, 7.0, line);
        let c7p3 = self.binop(Token::Add, c7, 3.0, line);
        let c7p3a7 = self.binop(Token::BitAnd, c7p3, 7.0, line);
        let addr = self.binop(Token::Add, c7p3a7, 705.0, line);

        let h255 = self.binop(Token::BitAnd, hue, 255.0, line);
        let h16 = self.binop(Token::Mul, h255, 16.0, line);
        let value = self.program.alloc(Expr::Binary(Token::BitOr, lum, h16), line);

        self.out.push(Stmt::new(StmtCode::Poke, line).with_args(vec![addr, value]));
        Ok(())
    }

    fn desugar_sound(&mut self, s: Stmt, line: u32) -> Result<(), CompileError> {
        if s.args.is_empty() {
            self.out.push(Stmt::new(StmtCode::Sound, line));
            return Ok(());
        }
        let mut it = s.args.into_iter();
        let chn = it.next().ok_or_else(|| CompileError::structural(line, "SOUND missing arguments"))?;
        let frq = it.next().ok_or_else(|| CompileError::structural(line, "SOUND missing arguments"))?;
        let dst = it.next().ok_or_else(|| CompileError::structural(line, "SOUND missing arguments"))?;
        let vol = it.next().ok_or_else(|| CompileError::structural(line, "SOUND missing arguments"))?;

        if self.program.exprs.as_number(chn).is_none() {
            self.warnings.warn(line, "SOUND channel is not constant; leaving as a runtime SOUND statement");
            self.out.push(Stmt::new(StmtCode::Sound, line).with_args(vec![chn, frq, dst, vol]));
            return Ok(());
        }

        let d255 = self.binop(Token::BitAnd, dst, 255.0, line);
        let d16 = self.binop(Token::Mul, d255, 16.0, line);
        let distvol = self.program.alloc(Expr::Binary(Token::BitOr, d16, vol), line);

        let c3 = self.binop(Token::BitAnd, chn, 3.0, line);
        let c2 = self.binop(Token::Mul, c3, 2.0, line);
        let audf = self.binop(Token::Add, c2, 0xD200 as f64, line);
        let audc = self.binop(Token::Add, audf, 1.0, line);

        let skctl = self.program.alloc(Expr::ConstNumber(0xD20F as f64), line);
        let three = self.program.alloc(Expr::ConstNumber(3.0), line);
        self.out.push(Stmt::new(StmtCode::Poke, line).with_args(vec![skctl, three]));
        self.out.push(Stmt::new(StmtCode::Poke, line).with_args(vec![audf, frq]));
        self.out.push(Stmt::new(StmtCode::Poke, line).with_args(vec![audc, distvol]));
        Ok(())
    }

    fn binop(&mut self, tok: Token, lhs: ExprId, rhs_const: f64, line: u32) -> ExprId {
        let rhs = self.program.alloc(Expr::ConstNumber(rhs_const), line);
        self.program.alloc(Expr::Binary(tok, lhs, rhs), line)
    }
}

pub fn desugar(program: &mut Program, warnings: &mut Bag) -> Result<Vec<Stmt>, CompileError> {
    Desugar::new(program, warnings).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Program;

    fn numvar(p: &mut Program, name: &str) -> ExprId {
        let id = p.vars.new_var(name, VarType::Float).unwrap();
        p.alloc(Expr::VarNumber(id), 1)
    }

    #[test]
    fn do_loop_becomes_label_and_backjump() {
        let mut p = Program::new();
        p.push_statement(Stmt::new(StmtCode::Do, 10));
        p.push_statement(Stmt::new(StmtCode::Print, 10));
        p.push_statement(Stmt::new(StmtCode::Loop, 10));
        let mut warnings = Bag::new("t.bas");
        let out = desugar(&mut p, &mut warnings).unwrap();
        let codes: Vec<StmtCode> = out.iter().map(|s| s.code).collect();
        assert_eq!(codes, vec![StmtCode::LblS, StmtCode::Print, StmtCode::GoS, StmtCode::LblS]);
    }

    #[test]
    fn for_next_desugars_without_for_or_next_codes() {
        let mut p = Program::new();
        let i = numvar(&mut p, "I");
        let one = p.alloc(Expr::ConstNumber(1.0), 10);
        let ten = p.alloc(Expr::ConstNumber(10.0), 10);
        p.push_statement(Stmt::new(StmtCode::For, 10).with_target(i).with_args(vec![one, ten]));
        p.push_statement(Stmt::new(StmtCode::Print, 10).with_args(vec![i]));
        p.push_statement(Stmt::new(StmtCode::Next, 10).with_target(i));
        let mut warnings = Bag::new("t.bas");
        let out = desugar(&mut p, &mut warnings).unwrap();
        assert!(out.iter().all(|s| !matches!(s.code, StmtCode::For | StmtCode::Next)));
    }

    #[test]
    fn loop_without_do_is_a_structural_error() {
        let mut p = Program::new();
        p.push_statement(Stmt::new(StmtCode::Loop, 10));
        let mut warnings = Bag::new("t.bas");
        assert!(desugar(&mut p, &mut warnings).is_err());
    }
}
