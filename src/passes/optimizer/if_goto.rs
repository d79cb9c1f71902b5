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

//! Collapses the three-statement gadget control-flow desugar produces
//! for a single-line `IF e THEN GOTO n` — `IF NOT e THEN #L1`, `GOTO
//! n`, `#L1` — back into the historical one-statement `IF e THEN n`
//! form, when `L1` is used nowhere else.

use std::collections::HashMap;

use crate::ir::expr::{Expr, ExprArena};
use crate::ir::stmt::Stmt;
use crate::tokens::{StmtCode, Token};
use crate::vars::VarId;

fn label_use_counts(stmts: &[Stmt]) -> HashMap<VarId, u32> {
    let mut counts = HashMap::new();
    for s in stmts {
        if matches!(s.code, StmtCode::GoS | StmtCode::IfNumber | StmtCode::Exec | StmtCode::Trap) {
            if let Some(l) = s.label {
                *counts.entry(l).or_insert(0) += 1;
            }
        }
    }
    counts
}

pub fn run(stmts: &mut Vec<Stmt>, exprs: &mut ExprArena) -> bool {
    let uses = label_use_counts(stmts);
    let mut changed = false;
    let mut out: Vec<Stmt> = Vec::with_capacity(stmts.len());
    let mut i = 0;
    while i < stmts.len() {
        if i + 2 < stmts.len() {
            let is_pattern = stmts[i].code == StmtCode::IfNumber
                && stmts[i + 1].code == StmtCode::GoS
                && stmts[i + 2].code == StmtCode::LblS
                && stmts[i].label == stmts[i + 2].label
                && stmts[i].label.map(|l| uses.get(&l).copied().unwrap_or(0) == 1).unwrap_or(false);
            if is_pattern {
                let not_cond = stmts[i].args[0];
                let target = stmts[i + 1].label;
                let cond = match exprs.get(not_cond) {
                    Expr::Unary(Token::Not, inner) => *inner,
                    _ => exprs.alloc(Expr::Unary(Token::Not, not_cond), stmts[i].line),
                };
                let mut collapsed = Stmt::new(StmtCode::IfNumber, stmts[i].line).with_args(vec![cond]);
                collapsed.label = target;
                out.push(collapsed);
                i += 3;
                changed = true;
                continue;
            }
        }
        out.push(stmts[i].clone());
        i += 1;
    }
    *stmts = out;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::VarType;

    #[test]
    fn collapses_the_if_then_goto_gadget() {
        let mut vars = crate::vars::VarTable::new();
        let l1 = vars.new_var("@_lbl_0", VarType::Label).unwrap();
        let target = vars.new_var("@_lin_100", VarType::Label).unwrap();
        let mut exprs = ExprArena::new();
        let x = exprs.alloc(Expr::ConstNumber(1.0), 10);
        let not_x = exprs.alloc(Expr::Unary(Token::Not, x), 10);
        let mut stmts = vec![
            Stmt::new(StmtCode::IfNumber, 10).with_args(vec![not_x]).with_label(l1),
            Stmt::new(StmtCode::GoS, 10).with_label(target),
            Stmt::new(StmtCode::LblS, 10).with_label(l1),
        ];
        let changed = run(&mut stmts, &mut exprs);
        assert!(changed);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].code, StmtCode::IfNumber);
        assert_eq!(stmts[0].label, Some(target));
    }
}
