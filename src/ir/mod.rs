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

//! The compiler's intermediate representation: an expression arena plus
//! a flat statement stream, and the symbol tables every pass consults
//! alongside them.

pub mod expr;
pub mod stmt;

use crate::defs::DefTable;
use crate::vars::VarTable;
use expr::{Expr, ExprArena, ExprId};
use stmt::{ProgramItem, Stmt};

#[derive(Debug, Default)]
pub struct Program {
    pub exprs: ExprArena,
    pub items: Vec<ProgramItem>,
    pub vars: VarTable,
    pub defs: DefTable,
}

impl Program {
    pub fn new() -> Self {
        Program { exprs: ExprArena::new(), items: Vec::new(), vars: VarTable::new(), defs: DefTable::new() }
    }

    pub fn push_line_number(&mut self, n: i64) {
        self.items.push(ProgramItem::LineNumber(n));
    }

    pub fn push_statement(&mut self, s: Stmt) {
        self.items.push(ProgramItem::Statement(s));
    }

    pub fn alloc(&mut self, node: Expr, line: u32) -> ExprId {
        self.exprs.alloc(node, line)
    }

    /// Iterates `(line_number, &Stmt)` pairs in file order, as the
    /// binary encoder and listers need them.
    pub fn statements_by_line(&self) -> impl Iterator<Item = (i64, &Stmt)> {
        let mut cur = 0i64;
        self.items.iter().filter_map(move |item| match item {
            ProgramItem::LineNumber(n) => {
                cur = *n;
                None
            }
            ProgramItem::Statement(s) => Some((cur, s)),
        })
    }

    pub fn statements(&self) -> impl Iterator<Item = &Stmt> {
        self.items.iter().filter_map(|i| i.as_statement())
    }

    pub fn statements_mut(&mut self) -> impl Iterator<Item = &mut Stmt> {
        self.items.iter_mut().filter_map(|i| i.as_statement_mut())
    }

    pub fn line_numbers(&self) -> impl Iterator<Item = i64> + '_ {
        self.items.iter().filter_map(|i| match i {
            ProgramItem::LineNumber(n) => Some(*n),
            _ => None,
        })
    }
}

/// The program after `lower_procs` and `replace_complex_stmt` have run:
/// a flat statement stream addressed entirely by label, with no more
/// source-level line numbers. The optimizer, code-generator lowering,
/// encoder and listers all operate on this shape.
#[derive(Debug, Default)]
pub struct FlatProgram {
    pub exprs: ExprArena,
    pub stmts: Vec<Stmt>,
    pub vars: VarTable,
    pub defs: DefTable,
}

impl FlatProgram {
    pub fn from_program(program: Program, stmts: Vec<Stmt>) -> Self {
        FlatProgram { exprs: program.exprs, stmts, vars: program.vars, defs: program.defs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::StmtCode;

    #[test]
    fn statements_by_line_tracks_the_most_recent_line_number() {
        let mut p = Program::new();
        p.push_line_number(10);
        p.push_statement(Stmt::new(StmtCode::Stop, 1));
        p.push_line_number(20);
        p.push_statement(Stmt::new(StmtCode::End, 2));
        p.push_statement(Stmt::new(StmtCode::Rem, 2));
        let lines: Vec<i64> = p.statements_by_line().map(|(n, _)| n).collect();
        assert_eq!(lines, vec![10, 20, 20]);
    }
}
