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

//! Drops variables with zero read/write occurrences, then — only when
//! the survivor count exceeds 127 — renumbers them most-used first
//! (each reference past the 127th variable costs an extra encoded
//! byte, so moving hot variables below that line is worth it).

use std::collections::HashMap;

use crate::ir::expr::{Expr, ExprArena, ExprId};
use crate::ir::stmt::Stmt;
use crate::tokens::StmtCode;
use crate::vars::{VarId, VarTable};

fn count_var_refs(exprs: &ExprArena, id: ExprId, counts: &mut HashMap<VarId, u32>) {
    match exprs.get(id) {
        Expr::VarNumber(v) | Expr::VarString(v) | Expr::VarArray(v) | Expr::VarLabel(v) | Expr::VarAsmLabel(v) => {
            *counts.entry(*v).or_insert(0) += 1;
        }
        _ => {}
    }
    for c in exprs.operands(id) {
        count_var_refs(exprs, c, counts);
    }
}

fn usage_counts(stmts: &[Stmt], exprs: &ExprArena) -> HashMap<VarId, u32> {
    let mut counts = HashMap::new();
    for s in stmts {
        if let Some(t) = s.target {
            count_var_refs(exprs, t, &mut counts);
        }
        for &a in &s.args {
            count_var_refs(exprs, a, &mut counts);
        }
        if let Some(l) = s.label {
            *counts.entry(l).or_insert(0) += 1;
        }
    }
    counts
}

fn remap_exprs(exprs: &mut ExprArena, remap: &HashMap<u16, u16>) {
    for i in 0..exprs.len() {
        let id = ExprId(i as u32);
        let new_node = match exprs.get(id) {
            Expr::VarNumber(v) => Some(Expr::VarNumber(VarId(remap[&v.0]))),
            Expr::VarString(v) => Some(Expr::VarString(VarId(remap[&v.0]))),
            Expr::VarArray(v) => Some(Expr::VarArray(VarId(remap[&v.0]))),
            Expr::VarLabel(v) => Some(Expr::VarLabel(VarId(remap[&v.0]))),
            Expr::VarAsmLabel(v) => Some(Expr::VarAsmLabel(VarId(remap[&v.0]))),
            _ => None,
        };
        if let Some(n) = new_node {
            *exprs.get_mut(id) = n;
        }
    }
}

/// Removes unused variables and, past 127 survivors, reorders by usage
/// frequency. Returns the new table; callers must swap it in along with
/// the remapped IR.
pub fn run(stmts: &mut [Stmt], exprs: &mut ExprArena, vars: &VarTable) -> (VarTable, bool) {
    let counts = usage_counts(stmts, exprs);
    let mut keep: Vec<VarId> = vars.ids().filter(|id| counts.get(id).copied().unwrap_or(0) > 0).collect();
    let dropped = keep.len() != vars.len();

    if keep.len() > 127 {
        keep.sort_by(|a, b| counts[b].cmp(&counts[a]));
    }

    let (fresh, remap) = vars.rebuild(&keep);
    if dropped || keep.len() > 127 {
        remap_exprs(exprs, &remap);
        for s in stmts.iter_mut() {
            if let Some(l) = s.label {
                s.label = Some(VarId(remap[&l.0]));
            }
        }
    }
    (fresh, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::VarType;

    #[test]
    fn drops_a_variable_with_no_references() {
        let mut vars = VarTable::new();
        let a = vars.new_var("A", VarType::Float).unwrap();
        let _c = vars.new_var("C", VarType::Float).unwrap();
        let mut exprs = ExprArena::new();
        let a_e = exprs.alloc(Expr::VarNumber(a), 1);
        let mut stmts = vec![Stmt::new(StmtCode::Let, 1).with_target(a_e)];
        let (fresh, dropped) = run(&mut stmts, &mut exprs, &vars);
        assert!(dropped);
        assert_eq!(fresh.len(), 1);
    }
}
