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

//! Drives the optimizer passes to a fixpoint. Definition replacement,
//! dead-variable removal and the IF-GOTO collapse always run; the six
//! passes named on the `-O` flag can be individually disabled.

pub mod commute;
pub mod const_factor;
pub mod const_fold;
pub mod dead_vars;
pub mod fixed_vars;
pub mod if_goto;
pub mod line_liveness;
pub mod token_subst;

use crate::diagnostics::Bag;
use crate::errors::CompileError;
use crate::ir::expr::{Expr, ExprArena, ExprId};
use crate::ir::FlatProgram;
use crate::tokens::StmtCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerConfig {
    pub const_fold: bool,
    pub number_tok: bool,
    pub commute: bool,
    pub line_num: bool,
    pub const_vars: bool,
    pub fixed_vars: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig { const_fold: true, number_tok: true, commute: true, line_num: true, const_vars: true, fixed_vars: true }
    }
}

impl OptimizerConfig {
    pub fn all_disabled() -> Self {
        OptimizerConfig { const_fold: false, number_tok: false, commute: false, line_num: false, const_vars: false, fixed_vars: false }
    }

    /// Parses one `-O` token: `name`, `+name` (enable) or `-name`
    /// (disable). Returns `None` for an unrecognized pass name.
    pub fn apply_flag(&mut self, raw: &str) -> Option<()> {
        let (enable, name) = match raw.strip_prefix('-') {
            Some(rest) => (false, rest),
            None => (true, raw.strip_prefix('+').unwrap_or(raw)),
        };
        let slot = match name {
            "const-fold" => &mut self.const_fold,
            "number-tok" => &mut self.number_tok,
            "commute" => &mut self.commute,
            "line-num" => &mut self.line_num,
            "const-vars" => &mut self.const_vars,
            "fixed-vars" => &mut self.fixed_vars,
            _ => return None,
        };
        *slot = enable;
        Some(())
    }
}

fn replace_defs(exprs: &mut ExprArena, defs: &crate::defs::DefTable) -> bool {
    let mut changed = false;
    for i in 0..exprs.len() {
        let id = ExprId(i as u32);
        let replacement = match exprs.get(id) {
            Expr::DefNumber(d) => defs.get_number(*d).map(Expr::ConstNumber),
            Expr::DefString(d) => defs.get_string(*d).map(|s| Expr::ConstString(s.to_vec())),
            _ => None,
        };
        if let Some(r) = replacement {
            *exprs.get_mut(id) = r;
            changed = true;
        }
    }
    changed
}

/// Runs every enabled pass to a fixpoint, in the order §4.I specifies.
/// A pass returning an error aborts the remaining passes; the caller
/// still holds a partially optimized but well-formed program.
pub fn optimize(program: &mut FlatProgram, config: &OptimizerConfig, warnings: &mut Bag) -> Result<(), CompileError> {
    loop {
        let mut changed = replace_defs(&mut program.exprs, &program.defs);

        if config.const_fold {
            changed |= const_fold::run(&mut program.exprs, warnings);
        }
        if config.number_tok {
            changed |= token_subst::run(&mut program.exprs);
        }
        if config.commute {
            changed |= commute::run(&mut program.exprs);
        }
        if config.line_num {
            changed |= line_liveness::run(&mut program.stmts, &program.vars, warnings);
        }

        let (fresh_vars, dropped) = dead_vars::run(&mut program.stmts, &mut program.exprs, &program.vars);
        if dropped {
            program.vars = fresh_vars;
            changed = true;
        }

        if config.fixed_vars {
            changed |= fixed_vars::run(&mut program.stmts, &mut program.exprs);
        }

        changed |= if_goto::run(&mut program.stmts, &mut program.exprs);

        if !changed {
            break;
        }
    }

    if config.const_vars {
        let result = const_factor::run(&mut program.stmts, &mut program.exprs, &mut program.vars)?;
        if result.changed {
            let mut prelude = result.prelude;
            prelude.append(&mut program.stmts);
            program.stmts = prelude;
            // a fresh fold/dead-var pass catches anything the factoring prelude affects
            while const_fold::run(&mut program.exprs, warnings) {}
            let (fresh_vars, _) = dead_vars::run(&mut program.stmts, &mut program.exprs, &program.vars);
            program.vars = fresh_vars;
        }
    }

    strip_hidden_rems_metadata(&mut program.stmts);
    Ok(())
}

/// Hidden REMs never carry executable payload past this point; clear
/// any leftover argument list so later passes don't have to special-case it.
fn strip_hidden_rems_metadata(stmts: &mut [crate::ir::stmt::Stmt]) {
    for s in stmts.iter_mut() {
        if s.code == StmtCode::RemHidden {
            s.args.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expr::Expr;
    use crate::ir::stmt::Stmt;
    use crate::tokens::Token;
    use crate::vars::VarType;

    #[test]
    fn const_fold_and_token_subst_compose() {
        let mut fp = FlatProgram::default();
        let one = fp.exprs.alloc(Expr::ConstNumber(1.0), 1);
        let two = fp.exprs.alloc(Expr::ConstNumber(2.0), 1);
        let three = fp.exprs.alloc(Expr::ConstNumber(3.0), 1);
        let mul = fp.exprs.alloc(Expr::Binary(Token::Mul, two, three), 1);
        let add = fp.exprs.alloc(Expr::Binary(Token::Add, one, mul), 1);
        let lastone = fp.exprs.alloc(Expr::ConstNumber(1.0), 1);
        let sub = fp.exprs.alloc(Expr::Binary(Token::Sub, add, lastone), 1);
        let a = fp.vars.new_var("A", VarType::Float).unwrap();
        let a_e = fp.exprs.alloc(Expr::VarNumber(a), 1);
        fp.stmts.push(Stmt::new(StmtCode::Let, 1).with_target(a_e).with_args(vec![sub]));

        let mut warnings = Bag::new("t.bas");
        optimize(&mut fp, &OptimizerConfig::default(), &mut warnings).unwrap();

        assert_eq!(fp.exprs.as_number(sub), Some(6.0));
    }

    #[test]
    fn flag_parsing_handles_plus_and_minus() {
        let mut cfg = OptimizerConfig::all_disabled();
        assert!(cfg.apply_flag("+const-fold").is_some());
        assert!(cfg.const_fold);
        assert!(cfg.apply_flag("-const-fold").is_some());
        assert!(!cfg.const_fold);
        assert!(cfg.apply_flag("bogus").is_none());
    }
}
