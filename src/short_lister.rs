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

//! Renders a `FlatProgram` as a compact textual listing: `tok_short`
//! spellings, statements packed as tightly as the configured line width
//! allows, and scientific-notation line numbers for round multiples of
//! 1000/10000.
//!
//! Jump targets reference a label's eventual line number, which (as in
//! `encoder`) isn't known until the whole program has been packed. The
//! encoder solves this with a byte-stable two-byte patch; text doesn't
//! have a fixed-width slot to patch in place. This module instead runs
//! the packer twice: a throwaway pass that only records where every
//! label lands, then a real pass that renders every target with its
//! true width. A forward jump whose number is wide enough to itself
//! push a line over the width limit can, in principle, shift that
//! line's packing between the two passes; see DESIGN.md.

use std::collections::HashMap;

use crate::errors::CompileError;
use crate::ir::expr::{Expr, ExprArena, ExprId};
use crate::ir::stmt::Stmt;
use crate::ir::FlatProgram;
use crate::sbuf::StringBuf;
use crate::tokens::{self, StmtCode, Token};
use crate::vars::{VarId, VarTable, VarType};
use crate::{bcd, diagnostics::Bag};

pub const MIN_LINE_LEN: usize = 16;
pub const MAX_LINE_LEN: usize = 511;
pub const DEFAULT_LINE_LEN: usize = 120;

const EOL: u8 = 0x9b;

fn num_len(n: i64) -> usize {
    if n > 9999 && n % 10000 == 0 {
        3
    } else if n > 999 && n % 1000 == 0 {
        if n > 9999 { 4 } else { 3 }
    } else if n > 9999 {
        5
    } else if n > 999 {
        4
    } else if n > 99 {
        3
    } else if n > 9 {
        2
    } else {
        1
    }
}

fn render_linenum(n: i64) -> Vec<u8> {
    let mut sb = StringBuf::new();
    if n > 9999 && n % 10000 == 0 {
        sb.append_dec(n / 10000);
        sb.append(b"E4");
    } else if n > 999 && n % 1000 == 0 {
        sb.append_dec(n / 1000);
        sb.append(b"E3");
    } else {
        sb.append_dec(n);
    }
    sb.into_vec()
}

fn is_prefix_unary(tok: Token) -> bool {
    matches!(tok, Token::UPlus | Token::UMinus | Token::Not)
}

/// The precedence a node presents to its parent for paren-insertion
/// purposes: the operator's own precedence for binary/prefix-unary
/// nodes, or the maximum (never needs parens) for anything that's
/// already self-delimiting — literals, variables, function calls.
fn outward_prec(exprs: &ExprArena, id: ExprId) -> i8 {
    match exprs.get(id) {
        Expr::Binary(tok, _, _) => tokens::tok_prec(*tok),
        Expr::Unary(tok, _) if is_prefix_unary(*tok) => tokens::tok_prec(*tok),
        _ => i8::MAX,
    }
}

struct ShortLister<'p> {
    program: &'p FlatProgram,
    max_line_len: usize,
    placeholder_mode: bool,
    label_positions: HashMap<u16, i64>,
}

impl<'p> ShortLister<'p> {
    fn resolve_target(&self, v: VarId) -> i64 {
        if self.placeholder_mode { 0 } else { *self.label_positions.get(&v.0).unwrap_or(&0) }
    }

    fn render_expr(&self, id: ExprId, out: &mut Vec<u8>) {
        let exprs = &self.program.exprs;
        match exprs.get(id) {
            Expr::Void => {}
            Expr::ConstNumber(n) | Expr::ConstHexNumber(n) => {
                let mut sb = StringBuf::new();
                bcd::format_bcd(bcd::to_bcd(*n), &mut sb);
                out.extend(sb.into_vec());
            }
            Expr::ConstString(s) => {
                out.push(b'"');
                out.extend_from_slice(s);
                out.push(b'"');
            }
            Expr::VarNumber(v) | Expr::VarLabel(v) | Expr::VarAsmLabel(v) => {
                out.extend_from_slice(self.program.vars.short_name(*v).as_bytes());
            }
            Expr::VarString(v) => {
                out.extend_from_slice(self.program.vars.short_name(*v).as_bytes());
                out.push(b'$');
            }
            Expr::VarArray(v) => {
                out.extend_from_slice(self.program.vars.short_name(*v).as_bytes());
                out.push(b'(');
            }
            Expr::DefNumber(_) | Expr::DefString(_) => {
                out.extend_from_slice(b"<def>");
            }
            Expr::Data { bytes, prev } => {
                if let Some(p) = prev {
                    self.render_expr(*p, out);
                    out.push(b',');
                }
                out.extend_from_slice(bytes);
            }
            Expr::Unary(tok, a) if is_prefix_unary(*tok) => {
                out.extend_from_slice(tokens::tok_short(*tok).as_bytes());
                let needs = tokens::needs_right_paren(*tok, outward_prec(exprs, *a));
                if needs {
                    out.push(b'(');
                }
                self.render_expr(*a, out);
                if needs {
                    out.push(b')');
                }
            }
            Expr::Unary(tok, a) => {
                out.extend_from_slice(tokens::tok_short(*tok).as_bytes());
                out.push(b'(');
                self.render_expr(*a, out);
                out.push(b')');
            }
            Expr::Binary(tok, a, b) => {
                let lp = tokens::needs_left_paren(*tok, outward_prec(exprs, *a));
                if lp {
                    out.push(b'(');
                }
                self.render_expr(*a, out);
                if lp {
                    out.push(b')');
                }
                out.extend_from_slice(tokens::tok_short(*tok).as_bytes());
                let rp = tokens::needs_right_paren(*tok, outward_prec(exprs, *b));
                if rp {
                    out.push(b'(');
                }
                self.render_expr(*b, out);
                if rp {
                    out.push(b')');
                }
            }
            Expr::SmallInt(tok) => out.extend_from_slice(tokens::tok_short(*tok).as_bytes()),
        }
    }

    fn render_expr_list(&self, ids: &[ExprId], out: &mut Vec<u8>) {
        for (i, &id) in ids.iter().enumerate() {
            if i > 0 {
                out.push(b',');
            }
            self.render_expr(id, out);
        }
    }

    /// Renders one statement's text, without the trailing colon/EOL.
    /// Returns `(text, skip_colon)`.
    fn render_stmt(&self, stmt: &Stmt) -> (Vec<u8>, bool) {
        let mut out = Vec::new();
        match stmt.code {
            StmtCode::Let | StmtCode::LetInv => {
                if let Some(target) = stmt.target {
                    self.render_expr(target, &mut out);
                }
                out.push(b'=');
                if let Some(&v) = stmt.args.first() {
                    self.render_expr(v, &mut out);
                }
                (out, false)
            }
            StmtCode::RemHidden => (out, false),
            StmtCode::Rem | StmtCode::BasError => {
                out.extend_from_slice(tokens::stmt_short(stmt.code).as_bytes());
                if let Some(text) = &stmt.text {
                    out.push(b' ');
                    out.extend_from_slice(text);
                }
                (out, true)
            }
            StmtCode::IfNumber => {
                out.extend_from_slice(b"IF");
                if let Some(&c) = stmt.args.first() {
                    out.push(b' ');
                    self.render_expr(c, &mut out);
                }
                out.extend_from_slice(b" THEN ");
                let target = stmt.label.map(|l| self.resolve_target(l)).unwrap_or(0);
                out.extend(render_linenum(target));
                (out, true)
            }
            StmtCode::GoS | StmtCode::Exec => {
                out.extend_from_slice(tokens::stmt_short(stmt.code).as_bytes());
                out.push(b' ');
                let target = stmt.label.map(|l| self.resolve_target(l)).unwrap_or(0);
                out.extend(render_linenum(target));
                (out, false)
            }
            StmtCode::Trap => {
                out.extend_from_slice(b"TRAP ");
                if stmt.branch_targets == [-1] {
                    out.extend_from_slice(b"32768");
                } else {
                    let target = stmt.label.map(|l| self.resolve_target(l)).unwrap_or(0);
                    out.extend(render_linenum(target));
                }
                (out, false)
            }
            StmtCode::OnGo => {
                out.extend_from_slice(b"ON ");
                if let Some(&s) = stmt.args.first() {
                    self.render_expr(s, &mut out);
                }
                out.extend_from_slice(b" GOTO ");
                for (i, &raw) in stmt.branch_targets.iter().enumerate() {
                    if i > 0 {
                        out.push(b',');
                    }
                    out.extend(render_linenum(self.resolve_target(VarId(raw as u16))));
                }
                (out, false)
            }
            StmtCode::Proc => {
                out.extend_from_slice(b"PROC");
                if let Some(l) = stmt.label {
                    out.push(b' ');
                    out.extend_from_slice(self.program.vars.short_name(l).as_bytes());
                }
                (out, false)
            }
            StmtCode::Print => {
                out.push(b'?');
                self.render_expr_list(&stmt.args, &mut out);
                (out, false)
            }
            StmtCode::Return | StmtCode::Stop | StmtCode::End => {
                out.extend_from_slice(tokens::stmt_short(stmt.code).as_bytes());
                (out, false)
            }
            _ => {
                let kw = tokens::stmt_short(stmt.code);
                out.extend_from_slice(kw.as_bytes());
                if !stmt.args.is_empty() {
                    if !kw.is_empty() {
                        out.push(b' ');
                    }
                    self.render_expr_list(&stmt.args, &mut out);
                }
                (out, false)
            }
        }
    }

    fn flush_line(&self, result: &mut Vec<u8>, out: &mut Vec<u8>, cur_line: i64, user_num: &mut bool) {
        let mut len = out.len();
        if len > 0 && out[len - 1] == b':' {
            len -= 1;
        }
        if len == 0 && !*user_num {
            out.clear();
            return;
        }
        result.extend(render_linenum(cur_line));
        result.extend_from_slice(&out[..len]);
        if len == 0 {
            result.extend_from_slice(b" .");
        }
        result.push(EOL);
        out.clear();
        *user_num = false;
    }

    fn run(&mut self) -> Result<Vec<u8>, CompileError> {
        let mut result = Vec::new();
        let mut out: Vec<u8> = Vec::new();
        let mut cur_line: i64 = -1;
        let mut user_num = false;

        for stmt in &self.program.stmts {
            if stmt.code == StmtCode::LblS {
                self.flush_line(&mut result, &mut out, cur_line.max(0), &mut user_num);
                cur_line += 1;
                if self.placeholder_mode {
                    if let Some(label) = stmt.label {
                        self.label_positions.insert(label.0, cur_line);
                    }
                }
                user_num = true;
                continue;
            }

            let (text, skip_colon) = self.render_stmt(stmt);
            if text.is_empty() {
                continue;
            }
            if cur_line < 0 {
                cur_line = 0;
                user_num = true;
            }

            let header = num_len(cur_line);
            let mut stmt_text = text;
            if !skip_colon {
                stmt_text.push(b':');
            }

            if tokens::stmt_is_label(stmt.code) && !out.is_empty() {
                self.flush_line(&mut result, &mut out, cur_line, &mut user_num);
                cur_line += 1;
            } else if header + out.len() + stmt_text.len() > self.max_line_len {
                if out.is_empty() {
                    return Err(CompileError::encoder(format!(
                        "statement on line {} can't fit within the {}-character line limit",
                        stmt.line, self.max_line_len
                    )));
                }
                self.flush_line(&mut result, &mut out, cur_line, &mut user_num);
                cur_line += 1;
            }

            out.extend(stmt_text);
        }
        self.flush_line(&mut result, &mut out, cur_line.max(0), &mut user_num);
        Ok(result)
    }
}

/// Renders `program` as a short listing, using `tok_short` spellings and
/// packing statements up to `max_line_len` characters per line.
pub fn list_short(program: &FlatProgram, max_line_len: usize, _warnings: &mut Bag) -> Result<Vec<u8>, CompileError> {
    let max_line_len = max_line_len.clamp(MIN_LINE_LEN, MAX_LINE_LEN);

    let mut probe = ShortLister { program, max_line_len, placeholder_mode: true, label_positions: HashMap::new() };
    probe.run()?;

    let mut real = ShortLister { program, max_line_len, placeholder_mode: false, label_positions: probe.label_positions };
    real.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::DefTable;

    fn flat(stmts: Vec<Stmt>, exprs: ExprArena, vars: VarTable) -> FlatProgram {
        FlatProgram { exprs, stmts, vars, defs: DefTable::new() }
    }

    #[test]
    fn renders_an_assignment_without_the_let_keyword() {
        let mut exprs = ExprArena::new();
        let mut vars = VarTable::new();
        let a = vars.new_var("A", VarType::Float).unwrap();
        let six = exprs.alloc(Expr::ConstNumber(6.0), 1);
        let a_e = exprs.alloc(Expr::VarNumber(a), 1);
        let stmts = vec![
            Stmt::new(StmtCode::LblS, 1).with_label(vars.new_var("@_lin_10", VarType::Label).unwrap()),
            Stmt::new(StmtCode::Let, 1).with_target(a_e).with_args(vec![six]),
        ];
        let program = flat(stmts, exprs, vars);
        let mut warnings = Bag::new("t.bas");
        let text = list_short(&program, DEFAULT_LINE_LEN, &mut warnings).unwrap();
        let text = String::from_utf8(text.iter().map(|&b| if b == EOL { b'\n' } else { b }).collect()).unwrap();
        assert!(text.contains("A=6"));
        assert!(!text.to_uppercase().contains("LET"));
    }

    #[test]
    fn a_goto_target_resolves_to_the_labels_assigned_line() {
        let mut exprs = ExprArena::new();
        let mut vars = VarTable::new();
        let target = vars.new_var("@_lin_100", VarType::Label).unwrap();
        let stmts = vec![
            Stmt::new(StmtCode::LblS, 1).with_label(vars.new_var("@_lin_10", VarType::Label).unwrap()),
            Stmt::new(StmtCode::GoS, 1).with_label(target),
            Stmt::new(StmtCode::LblS, 2).with_label(target),
            Stmt::new(StmtCode::Return, 2),
        ];
        let program = flat(stmts, exprs, vars);
        let mut warnings = Bag::new("t.bas");
        let text = list_short(&program, DEFAULT_LINE_LEN, &mut warnings).unwrap();
        let text = String::from_utf8_lossy(&text);
        assert!(text.contains("GOTO 2"));
    }
}
