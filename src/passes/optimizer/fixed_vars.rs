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

//! Propagates the value of a variable written exactly once, with a
//! constant or a trivial constant expression (`±a op b` with a single
//! operator and constant operands), into every read site — then
//! retags the now-redundant assignment as a hidden comment.

use std::collections::HashMap;

use crate::ir::expr::{Expr, ExprArena, ExprId};
use crate::ir::stmt::Stmt;
use crate::tokens::{StmtCode, Token};
use crate::vars::VarId;

fn is_trivial_constant(exprs: &ExprArena, id: ExprId) -> Option<f64> {
    match exprs.get(id) {
        Expr::ConstNumber(n) => Some(*n),
        Expr::SmallInt(tok) => crate::tokens::small_int_for_per_token(*tok),
        Expr::Unary(Token::UMinus, a) => is_trivial_constant(exprs, *a).map(|v| -v),
        Expr::Binary(tok, a, b) if matches!(tok, Token::Add | Token::Sub | Token::Mul | Token::Div) => {
            let a = is_trivial_constant(exprs, *a)?;
            let b = is_trivial_constant(exprs, *b)?;
            Some(match tok {
                Token::Add => a + b,
                Token::Sub => a - b,
                Token::Mul => a * b,
                Token::Div => a / b,
                _ => unreachable!(),
            })
        }
        _ => None,
    }
}

fn var_of(exprs: &ExprArena, id: ExprId) -> Option<VarId> {
    match exprs.get(id) {
        Expr::VarNumber(v) => Some(*v),
        _ => None,
    }
}

fn single_write_candidates(stmts: &[Stmt], exprs: &ExprArena) -> HashMap<VarId, f64> {
    let mut write_counts: HashMap<VarId, u32> = HashMap::new();
    let mut write_value: HashMap<VarId, Option<f64>> = HashMap::new();
    for s in stmts {
        if !matches!(s.code, StmtCode::Let | StmtCode::LetInv) {
            continue;
        }
        let Some(target) = s.target else { continue };
        let Some(var) = var_of(exprs, target) else { continue };
        *write_counts.entry(var).or_insert(0) += 1;
        let value = s.args.first().and_then(|&a| is_trivial_constant(exprs, a));
        write_value.entry(var).or_insert(value);
    }
    write_counts
        .into_iter()
        .filter(|(_, n)| *n == 1)
        .filter_map(|(v, _)| write_value.get(&v).copied().flatten().map(|val| (v, val)))
        .collect()
}

/// Replaces reads of single-write constant variables and hides their
/// defining assignment. Returns whether any replacement happened.
pub fn run(stmts: &mut [Stmt], exprs: &mut ExprArena) -> bool {
    let candidates = single_write_candidates(stmts, exprs);
    if candidates.is_empty() {
        return false;
    }
    let mut changed = false;

    for i in 0..exprs.len() {
        let id = ExprId(i as u32);
        if let Expr::VarNumber(v) = exprs.get(id) {
            if let Some(&val) = candidates.get(v) {
                *exprs.get_mut(id) = Expr::ConstNumber(val);
                changed = true;
            }
        }
    }

    for s in stmts.iter_mut() {
        if !matches!(s.code, StmtCode::Let | StmtCode::LetInv) {
            continue;
        }
        let Some(target) = s.target else { continue };
        if let Some(var) = var_of(exprs, target) {
            if candidates.contains_key(&var) {
                s.code = StmtCode::RemHidden;
                s.text = Some(b"fixed variable propagated".to_vec());
                s.target = None;
                s.args.clear();
                changed = true;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::VarType;

    #[test]
    fn propagates_a_single_constant_write() {
        let mut vars = crate::vars::VarTable::new();
        let a = vars.new_var("A", VarType::Float).unwrap();
        let mut exprs = ExprArena::new();
        let lhs = exprs.alloc(Expr::VarNumber(a), 1);
        let five = exprs.alloc(Expr::ConstNumber(5.0), 1);
        let rhs_use = exprs.alloc(Expr::VarNumber(a), 2);
        let mut stmts = vec![
            Stmt::new(StmtCode::Let, 1).with_target(lhs).with_args(vec![five]),
            Stmt::new(StmtCode::Print, 2).with_args(vec![rhs_use]),
        ];
        let changed = run(&mut stmts, &mut exprs);
        assert!(changed);
        assert_eq!(stmts[0].code, StmtCode::RemHidden);
        assert_eq!(exprs.as_number(rhs_use), Some(5.0));
    }
}
