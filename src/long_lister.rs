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

//! Renders a `FlatProgram` with one statement per line and full keyword
//! spellings (`tok_long`/`stmt_long`). By the time a program reaches
//! this stage the structured-control-flow statements are already gone
//! (desugared to labels and numeric `GOTO`/`GOSUB`/`IF...THEN`), so
//! unlike the original debug lister this has no block structure left
//! to indent against — it's a flat trace of the lowered form, meant
//! for inspecting what the middle-end produced rather than for
//! producing a readable program listing.

use crate::ir::expr::{Expr, ExprArena, ExprId};
use crate::ir::stmt::Stmt;
use crate::ir::FlatProgram;
use crate::sbuf::StringBuf;
use crate::tokens::{self, StmtCode};
use crate::vars::VarId;
use crate::bcd;

use helpers::outward_prec;

fn collect_label_positions(program: &FlatProgram) -> std::collections::HashMap<u16, i64> {
    let mut positions = std::collections::HashMap::new();
    let mut cur_line: i64 = 0;
    for stmt in &program.stmts {
        if stmt.code == StmtCode::LblS {
            if let Some(label) = stmt.label {
                positions.insert(label.0, cur_line);
            }
            cur_line += 1;
        }
    }
    positions
}

mod helpers {
    use crate::ir::expr::{Expr, ExprArena, ExprId};
    use crate::tokens::{self, Token};

    pub fn is_prefix_unary(tok: Token) -> bool {
        matches!(tok, Token::UPlus | Token::UMinus | Token::Not)
    }

    pub fn outward_prec(exprs: &ExprArena, id: ExprId) -> i8 {
        match exprs.get(id) {
            Expr::Binary(tok, _, _) => tokens::tok_prec(*tok),
            Expr::Unary(tok, _) if is_prefix_unary(*tok) => tokens::tok_prec(*tok),
            _ => i8::MAX,
        }
    }
}

struct LongLister<'p> {
    program: &'p FlatProgram,
    label_positions: std::collections::HashMap<u16, i64>,
}

impl<'p> LongLister<'p> {
    fn target(&self, v: VarId) -> i64 {
        *self.label_positions.get(&v.0).unwrap_or(&0)
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
                for &b in s {
                    if b == b'"' {
                        out.push(b'"');
                    }
                    out.push(b);
                }
                out.push(b'"');
            }
            Expr::VarNumber(v) | Expr::VarLabel(v) | Expr::VarAsmLabel(v) => {
                out.extend_from_slice(self.program.vars.long_name(*v).as_bytes());
            }
            Expr::VarString(v) => {
                out.extend_from_slice(self.program.vars.long_name(*v).as_bytes());
                out.push(b'$');
            }
            Expr::VarArray(v) => {
                out.extend_from_slice(self.program.vars.long_name(*v).as_bytes());
                out.extend_from_slice(b"( ");
            }
            Expr::DefNumber(_) | Expr::DefString(_) => out.extend_from_slice(b"<def>"),
            Expr::Data { bytes, prev } => {
                if let Some(p) = prev {
                    self.render_expr(*p, out);
                    out.extend_from_slice(b", ");
                }
                out.extend_from_slice(bytes);
            }
            Expr::Unary(tok, a) if helpers::is_prefix_unary(*tok) => {
                out.extend_from_slice(tokens::tok_long(*tok).as_bytes());
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
                out.extend_from_slice(tokens::tok_long(*tok).as_bytes());
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
                out.push(b' ');
                out.extend_from_slice(tokens::tok_long(*tok).as_bytes());
                out.push(b' ');
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
                out.extend_from_slice(b", ");
            }
            self.render_expr(id, out);
        }
    }

    fn render_stmt(&self, stmt: &Stmt, out: &mut Vec<u8>) {
        match stmt.code {
            StmtCode::Let | StmtCode::LetInv => {
                out.extend_from_slice(b"LET ");
                if let Some(target) = stmt.target {
                    self.render_expr(target, out);
                }
                out.extend_from_slice(b" = ");
                if let Some(&v) = stmt.args.first() {
                    self.render_expr(v, out);
                }
            }
            StmtCode::RemHidden => {}
            StmtCode::Rem | StmtCode::BasError => {
                out.extend_from_slice(tokens::stmt_long(stmt.code).as_bytes());
                if let Some(text) = &stmt.text {
                    out.push(b' ');
                    out.extend_from_slice(text);
                }
            }
            StmtCode::IfNumber => {
                out.extend_from_slice(b"IF ");
                if let Some(&c) = stmt.args.first() {
                    self.render_expr(c, out);
                }
                out.extend_from_slice(b" THEN ");
                let target = stmt.label.map(|l| self.target(l)).unwrap_or(0);
                out.extend(target.to_string().into_bytes());
            }
            StmtCode::GoS | StmtCode::Exec => {
                out.extend_from_slice(tokens::stmt_long(stmt.code).as_bytes());
                out.push(b' ');
                let target = stmt.label.map(|l| self.target(l)).unwrap_or(0);
                out.extend(target.to_string().into_bytes());
            }
            StmtCode::Trap => {
                out.extend_from_slice(b"TRAP ");
                if stmt.branch_targets == [-1] {
                    out.extend_from_slice(b"32768");
                } else {
                    let target = stmt.label.map(|l| self.target(l)).unwrap_or(0);
                    out.extend(target.to_string().into_bytes());
                }
            }
            StmtCode::OnGo => {
                out.extend_from_slice(b"ON ");
                if let Some(&s) = stmt.args.first() {
                    self.render_expr(s, out);
                }
                out.extend_from_slice(b" GOTO ");
                for (i, &raw) in stmt.branch_targets.iter().enumerate() {
                    if i > 0 {
                        out.extend_from_slice(b", ");
                    }
                    out.extend(self.target(VarId(raw as u16)).to_string().into_bytes());
                }
            }
            StmtCode::Proc => {
                out.extend_from_slice(b"PROC");
                if let Some(l) = stmt.label {
                    out.push(b' ');
                    out.extend_from_slice(self.program.vars.long_name(l).as_bytes());
                }
            }
            StmtCode::Return | StmtCode::Stop | StmtCode::End => {
                out.extend_from_slice(tokens::stmt_long(stmt.code).as_bytes());
            }
            _ => {
                let kw = tokens::stmt_long(stmt.code);
                out.extend_from_slice(kw.as_bytes());
                if !stmt.args.is_empty() {
                    if !kw.is_empty() {
                        out.push(b' ');
                    }
                    self.render_expr_list(&stmt.args, out);
                }
            }
        }
    }
}

/// Renders a program as a one-statement-per-line debug trace.
pub fn list_long(program: &FlatProgram) -> Vec<u8> {
    let lister = LongLister { program, label_positions: collect_label_positions(program) };

    let mut result = Vec::new();
    let mut cur_line: i64 = 0;
    for stmt in &program.stmts {
        if stmt.code == StmtCode::LblS {
            cur_line += 1;
            continue;
        }
        let mut line = Vec::new();
        lister.render_stmt(stmt, &mut line);
        if line.is_empty() {
            continue;
        }
        result.extend(cur_line.to_string().into_bytes());
        result.push(b' ');
        result.extend(line);
        result.push(b'\n');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::DefTable;
    use crate::ir::expr::Expr;
    use crate::vars::{VarTable, VarType};

    #[test]
    fn renders_the_let_keyword_and_full_variable_names() {
        let mut exprs = ExprArena::new();
        let mut vars = VarTable::new();
        let longname = vars.new_var("COUNTER", VarType::Float).unwrap();
        let five = exprs.alloc(Expr::ConstNumber(5.0), 1);
        let var_e = exprs.alloc(Expr::VarNumber(longname), 1);
        let program = FlatProgram {
            exprs,
            stmts: vec![
                Stmt::new(StmtCode::LblS, 1).with_label(vars.new_var("@_lin_10", VarType::Label).unwrap()),
                Stmt::new(StmtCode::Let, 1).with_target(var_e).with_args(vec![five]),
            ],
            vars,
            defs: DefTable::new(),
        };
        let text = String::from_utf8(list_long(&program)).unwrap();
        assert!(text.contains("LET COUNTER = 5"));
    }
}
