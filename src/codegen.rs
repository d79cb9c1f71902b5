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

//! Lowers a `FlatProgram` into register-machine form for the "long"
//! output in compiling mode. The downstream pseudo-assembler that would
//! turn this into real 6502 opcodes isn't part of this crate; this
//! module stops at the sequence of pseudo-instructions a such an
//! assembler would consume.
//!
//! The pseudo-registers mirror the real ones an Atari BASIC runtime
//! exposes to generated code: `AL` (8-bit), `AX` (16-bit), `FR0`/`FR1`
//! (6-byte BCD float accumulators). Parameter passing by convention:
//! first 16-bit argument in `AX`, second in `bas_param_1`, third in
//! `bas_param_2`; 8-bit arguments in `AL`; floating-point in `FR0`.

use crate::ir::expr::{Expr, ExprArena, ExprId};
use crate::ir::stmt::Stmt;
use crate::ir::FlatProgram;
use crate::tokens::StmtCode;
use crate::vars::VarId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Al,
    Ax,
    Fr0,
    Fr1,
}

/// How a value store targets memory: directly, or indirectly through a
/// pointer already loaded into a register (`I_XSTO`/`F_XSTO`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Int,
    Bool,
    Float,
    IndirectInt,
    IndirectFloat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegStmt {
    /// Loads `reg` with the lowered value of `value`, per `width`.
    LoadExpr { reg: Reg, value: ExprId, width: Width },
    /// Stores the current contents of `reg` into `target` using `kind`.
    Store { reg: Reg, target: ExprId, kind: StoreKind },
    /// Calls a named runtime routine; arguments are already staged in
    /// the conventional registers by preceding `LoadExpr` statements.
    ExecAsm { routine: String },
    /// Branches to `target` when `AL` is zero (BASIC's false).
    JumpCond { target: VarId },
    GoS { target: VarId },
    LblS { label: VarId },
    Return,
}

/// The lowered width an expression's value should be computed at. The
/// original picks the narrowest width a conservative interval analysis
/// can prove safe; this is a coarser approximation of the same idea,
/// since the full BASIC numeric-range analysis isn't reconstructable
/// from this corpus — it only narrows constants, falling through to
/// `Fp` for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    I8,
    I16,
    Fp,
}

fn classify_width(exprs: &ExprArena, id: ExprId) -> Width {
    match exprs.as_number(id) {
        Some(n) if n.fract() == 0.0 && (0.0..256.0).contains(&n) => Width::I8,
        Some(n) if n.fract() == 0.0 && (-32768.0..32768.0).contains(&n) => Width::I16,
        _ => Width::Fp,
    }
}

fn reg_for_width(width: Width) -> Reg {
    match width {
        Width::I8 => Reg::Al,
        Width::I16 => Reg::Ax,
        Width::Fp => Reg::Fr0,
    }
}

/// Expands one flat statement into its register-machine form. Control
/// statements (`LBL_S`, `GO_S`, `EXEC`, `IF_NUMBER`, `RETURN`) map
/// almost directly; everything else routes through a named runtime
/// call with its arguments staged in the conventional registers first.
/// The routine-name table covering every I/O and graphics statement
/// lives in the ROM and isn't part of this corpus, so routine names
/// here are descriptive placeholders rather than the real entry points.
pub fn lower_stmt(stmt: &Stmt, exprs: &ExprArena) -> Vec<RegStmt> {
    match stmt.code {
        StmtCode::LblS => stmt.label.map(|label| vec![RegStmt::LblS { label }]).unwrap_or_default(),
        StmtCode::GoS => stmt.label.map(|target| vec![RegStmt::GoS { target }]).unwrap_or_default(),
        StmtCode::Exec => stmt.label.map(|target| vec![RegStmt::GoS { target }]).unwrap_or_default(),
        StmtCode::Return => vec![RegStmt::Return],
        StmtCode::IfNumber => {
            let mut out = Vec::new();
            if let Some(&cond) = stmt.args.first() {
                let width = classify_width(exprs, cond);
                out.push(RegStmt::LoadExpr { reg: reg_for_width(width), value: cond, width });
            }
            if let Some(target) = stmt.label {
                out.push(RegStmt::JumpCond { target });
            }
            out
        }
        StmtCode::Let | StmtCode::LetInv => {
            let mut out = Vec::new();
            let Some(&value) = stmt.args.first() else { return out };
            let Some(target) = stmt.target else { return out };
            let width = classify_width(exprs, value);
            let reg = reg_for_width(width);
            out.push(RegStmt::LoadExpr { reg, value, width });
            let kind = match (exprs.get(target), width) {
                (Expr::VarString(_), _) => StoreKind::Float,
                (Expr::VarArray(_), Width::Fp) => StoreKind::IndirectFloat,
                (Expr::VarArray(_), _) => StoreKind::IndirectInt,
                (_, Width::Fp) => StoreKind::Float,
                (_, Width::I16) => StoreKind::Int,
                (_, Width::I8) => StoreKind::Bool,
            };
            out.push(RegStmt::Store { reg, target, kind });
            out
        }
        StmtCode::Stop | StmtCode::End | StmtCode::RemHidden | StmtCode::Rem => Vec::new(),
        StmtCode::Proc => Vec::new(),
        _ => {
            let mut out = Vec::new();
            for (i, &arg) in stmt.args.iter().enumerate() {
                let width = classify_width(exprs, arg);
                let reg = match i {
                    0 => reg_for_width(width),
                    _ => Reg::Fr1,
                };
                out.push(RegStmt::LoadExpr { reg, value: arg, width });
            }
            out.push(RegStmt::ExecAsm { routine: format!("bas_{}", crate::tokens::stmt_short(stmt.code).to_lowercase()) });
            out
        }
    }
}

/// Lowers every statement in `program` into its register-machine form,
/// in order.
pub fn lower(program: &FlatProgram) -> Vec<RegStmt> {
    program.stmts.iter().flat_map(|s| lower_stmt(s, &program.exprs)).collect()
}

fn reg_name(reg: Reg) -> &'static str {
    match reg {
        Reg::Al => "AL",
        Reg::Ax => "AX",
        Reg::Fr0 => "FR0",
        Reg::Fr1 => "FR1",
    }
}

fn store_kind_name(kind: StoreKind) -> &'static str {
    match kind {
        StoreKind::Int => "I_ASGN",
        StoreKind::Bool => "B_ASGN",
        StoreKind::Float => "F_ASGN",
        StoreKind::IndirectInt => "I_XSTO",
        StoreKind::IndirectFloat => "F_XSTO",
    }
}

/// Renders lowered register-machine statements one per line, for the
/// compiling-mode section of the long output. `value`/`target` operands
/// are printed as their arena index since the expression arena isn't
/// threaded through this stage's output.
pub fn render(ops: &[RegStmt]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in ops {
        match op {
            RegStmt::LoadExpr { reg, value, .. } => {
                out.extend(format!("LOAD {} <- #{}\n", reg_name(*reg), value.0).into_bytes());
            }
            RegStmt::Store { reg, target, kind } => {
                out.extend(format!("STORE {} -> #{} ({})\n", reg_name(*reg), target.0, store_kind_name(*kind)).into_bytes());
            }
            RegStmt::ExecAsm { routine } => {
                out.extend(format!("EXEC_ASM {routine}\n").into_bytes());
            }
            RegStmt::JumpCond { target } => {
                out.extend(format!("JUMP_COND @{}\n", target.0).into_bytes());
            }
            RegStmt::GoS { target } => {
                out.extend(format!("GO_S @{}\n", target.0).into_bytes());
            }
            RegStmt::LblS { label } => {
                out.extend(format!("LBL_S @{}\n", label.0).into_bytes());
            }
            RegStmt::Return => out.extend_from_slice(b"RETURN\n"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::DefTable;
    use crate::vars::{VarTable, VarType};

    #[test]
    fn small_integer_constant_lowers_to_al() {
        let mut exprs = ExprArena::new();
        let mut vars = VarTable::new();
        let target = vars.new_var("X", VarType::Float).unwrap();
        let target_e = exprs.alloc(Expr::VarNumber(target), 1);
        let five = exprs.alloc(Expr::ConstNumber(5.0), 1);
        let stmt = Stmt::new(StmtCode::Let, 1).with_target(target_e).with_args(vec![five]);
        let ops = lower_stmt(&stmt, &exprs);
        assert!(matches!(ops[0], RegStmt::LoadExpr { reg: Reg::Al, width: Width::I8, .. }));
        let _ = FlatProgram { exprs: ExprArena::new(), stmts: vec![], vars: VarTable::new(), defs: DefTable::new() };
    }

    #[test]
    fn large_float_constant_lowers_to_fr0() {
        let mut exprs = ExprArena::new();
        let mut vars = VarTable::new();
        let target = vars.new_var("X", VarType::Float).unwrap();
        let target_e = exprs.alloc(Expr::VarNumber(target), 1);
        let big = exprs.alloc(Expr::ConstNumber(123456.75), 1);
        let stmt = Stmt::new(StmtCode::Let, 1).with_target(target_e).with_args(vec![big]);
        let ops = lower_stmt(&stmt, &exprs);
        assert!(matches!(ops[0], RegStmt::LoadExpr { reg: Reg::Fr0, width: Width::Fp, .. }));
    }
}
