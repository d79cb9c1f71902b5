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

//! Retags `LBL_S` labels that nothing jumps to as hidden `REM`s
//! carrying the original label name as commentary, so they are
//! dropped from short/binary output but the source line they stood in
//! for is still documented.

use std::collections::HashSet;

use crate::diagnostics::Bag;
use crate::ir::stmt::Stmt;
use crate::tokens::StmtCode;
use crate::vars::VarId;

fn referenced_labels(stmts: &[Stmt]) -> HashSet<VarId> {
    let mut refs = HashSet::new();
    for s in stmts {
        match s.code {
            StmtCode::GoS | StmtCode::Exec | StmtCode::IfNumber | StmtCode::Trap | StmtCode::Proc => {
                if let Some(l) = s.label {
                    refs.insert(l);
                }
            }
            StmtCode::OnGo => {
                for &raw in &s.branch_targets {
                    refs.insert(VarId(raw as u16));
                }
            }
            _ => {}
        }
    }
    refs
}

/// Returns whether any label was retagged.
pub fn run(stmts: &mut [Stmt], vars: &crate::vars::VarTable, warnings: &mut Bag) -> bool {
    let live = referenced_labels(stmts);
    let mut changed = false;
    for s in stmts.iter_mut() {
        if s.code != StmtCode::LblS {
            continue;
        }
        let Some(label) = s.label else { continue };
        if live.contains(&label) {
            continue;
        }
        let name = vars.long_name(label).to_string();
        if name.starts_with("@_lin_") {
            // a source-level line number target, not a synthetic block label:
            // retag as a hidden REM so RENUM/LIST-style tooling still sees it.
            warnings.warn(s.line, format!("line number label '{name}' is never referenced"));
        }
        s.code = StmtCode::RemHidden;
        s.text = Some(name.into_bytes());
        s.label = None;
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::VarType;

    #[test]
    fn drops_unreferenced_labels_only() {
        let mut vars = crate::vars::VarTable::new();
        let used = vars.new_var("@_lbl_0", VarType::Label).unwrap();
        let unused = vars.new_var("@_lin_100", VarType::Label).unwrap();
        let mut stmts = vec![
            Stmt::new(StmtCode::LblS, 1).with_label(used),
            Stmt::new(StmtCode::GoS, 2).with_label(used),
            Stmt::new(StmtCode::LblS, 3).with_label(unused),
        ];
        let mut warnings = Bag::new("t.bas");
        let changed = run(&mut stmts, &vars, &mut warnings);
        assert!(changed);
        assert_eq!(stmts[0].code, StmtCode::LblS);
        assert_eq!(stmts[2].code, StmtCode::RemHidden);
    }
}
