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

//! Hoists frequently repeated numeric/string constants into prelude
//! variables (`__n<k>`, `__n_<k>`, `__s<k>`) when doing so is net
//! smaller than leaving every occurrence inline. The byte-cost model
//! here is a simplified stand-in for the original's combinatorial
//! initializer search (see DESIGN.md): it prices every numeric
//! initializer at a flat per-assignment cost rather than searching for
//! the cheapest small-constant expression.

use std::collections::HashMap;

use crate::ir::expr::{Expr, ExprArena, ExprId};
use crate::ir::stmt::Stmt;
use crate::tokens::StmtCode;
use crate::vars::{VarTable, VarType};

const NUMERIC_OCCURRENCE_COST: u32 = 7;
const NUMERIC_INIT_COST: u32 = 10;
const STRING_INIT_OVERHEAD: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Number(u64), // f64 bits, so it can key a HashMap
    Str(Vec<u8>),
}

fn key_of(exprs: &ExprArena, id: ExprId) -> Option<Key> {
    match exprs.get(id) {
        Expr::ConstNumber(n) => Some(Key::Number(n.to_bits())),
        Expr::ConstString(s) => Some(Key::Str(s.clone())),
        _ => None,
    }
}

fn collect_occurrences(exprs: &ExprArena) -> HashMap<Key, Vec<ExprId>> {
    let mut map: HashMap<Key, Vec<ExprId>> = HashMap::new();
    for i in 0..exprs.len() {
        let id = ExprId(i as u32);
        if let Some(k) = key_of(exprs, id) {
            map.entry(k).or_default().push(id);
        }
    }
    map
}

fn savings(key: &Key, count: usize) -> i64 {
    let count = count as u32;
    match key {
        Key::Number(bits) => {
            let n = f64::from_bits(*bits);
            if matches!(n, 0.0 | 1.0 | 2.0 | 3.0) {
                return i64::MIN; // small-integer tokens are already a single byte
            }
            let inline_cost = NUMERIC_OCCURRENCE_COST as i64 * count as i64;
            let factored_cost = NUMERIC_INIT_COST as i64 + count as i64;
            inline_cost - factored_cost
        }
        Key::Str(s) => {
            let inline_cost = (s.len() as i64 + 2) * count as i64;
            let factored_cost = STRING_INIT_OVERHEAD as i64 + s.len() as i64 + count as i64;
            inline_cost - factored_cost
        }
    }
}

pub struct FactorResult {
    pub changed: bool,
    pub prelude: Vec<Stmt>,
}

pub fn run(stmts: &mut [Stmt], exprs: &mut ExprArena, vars: &mut VarTable) -> Result<FactorResult, crate::errors::CompileError> {
    let occurrences = collect_occurrences(exprs);
    let mut prelude = Vec::new();
    let mut changed = false;

    let mut candidates: Vec<(Key, Vec<ExprId>)> = occurrences
        .into_iter()
        .filter(|(k, v)| savings(k, v.len()) > 0)
        .collect();
    candidates.sort_by(|a, b| match (&a.0, &b.0) {
        (Key::Number(x), Key::Number(y)) => f64::from_bits(*x).partial_cmp(&f64::from_bits(*y)).unwrap(),
        (Key::Str(x), Key::Str(y)) => x.cmp(y),
        (Key::Number(_), Key::Str(_)) => std::cmp::Ordering::Less,
        (Key::Str(_), Key::Number(_)) => std::cmp::Ordering::Greater,
    });

    let mut numeric_idx = 0u32;
    let mut string_idx = 0u32;

    for (key, ids) in candidates {
        if vars.len() >= crate::vars::MAX_VARS {
            break;
        }
        match key {
            Key::Number(bits) => {
                let n = f64::from_bits(bits);
                let name = if n < 0.0 { format!("__n_{}", numeric_idx) } else { format!("__n{}", numeric_idx) };
                numeric_idx += 1;
                let var = vars.new_var(&name, VarType::Float)?;
                let var_e = exprs.alloc(Expr::VarNumber(var), 0);
                let init = exprs.alloc(Expr::ConstNumber(n), 0);
                prelude.push(Stmt::new(StmtCode::Let, 0).with_target(var_e).with_args(vec![init]));
                for id in ids {
                    *exprs.get_mut(id) = Expr::VarNumber(var);
                }
                changed = true;
            }
            Key::Str(bytes) => {
                let name = format!("__s{}", string_idx);
                string_idx += 1;
                let var = vars.new_var(&name, VarType::String)?;
                let var_dim_e = exprs.alloc(Expr::VarString(var), 0);
                let len_e = exprs.alloc(Expr::ConstNumber(bytes.len().max(1) as f64), 0);
                prelude.push(Stmt::new(StmtCode::Dim, 0).with_args(vec![var_dim_e, len_e]));
                let var_assign_e = exprs.alloc(Expr::VarString(var), 0);
                let init = exprs.alloc(Expr::ConstString(bytes), 0);
                prelude.push(Stmt::new(StmtCode::LetInv, 0).with_target(var_assign_e).with_args(vec![init]));
                for id in ids {
                    *exprs.get_mut(id) = Expr::VarString(var);
                }
                changed = true;
            }
        }
    }

    Ok(FactorResult { changed, prelude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factors_a_frequently_repeated_number() {
        let mut vars = VarTable::new();
        let mut exprs = ExprArena::new();
        let mut occurrences = Vec::new();
        for _ in 0..8 {
            occurrences.push(exprs.alloc(Expr::ConstNumber(12345.0), 1));
        }
        let mut stmts: Vec<Stmt> = occurrences.iter().map(|&e| Stmt::new(StmtCode::Print, 1).with_args(vec![e])).collect();
        let result = run(&mut stmts, &mut exprs, &mut vars).unwrap();
        assert!(result.changed);
        assert!(!result.prelude.is_empty());
        for &e in &occurrences {
            assert!(matches!(exprs.get(e), Expr::VarNumber(_)));
        }
    }

    #[test]
    fn small_integer_constants_are_never_factored() {
        let mut vars = VarTable::new();
        let mut exprs = ExprArena::new();
        for _ in 0..20 {
            exprs.alloc(Expr::ConstNumber(1.0), 1);
        }
        let mut stmts = Vec::new();
        let result = run(&mut stmts, &mut exprs, &mut vars).unwrap();
        assert!(!result.changed);
    }
}
