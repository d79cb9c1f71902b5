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

//! Statements and the program-level item stream.
//!
//! The original threads every line number and statement through a
//! single linked list, alternating `et_lnum` and `et_stmt` nodes tied
//! together with a `prev` pointer the writer walks backwards. That
//! works for a single forward-only encoding pass, but it makes every
//! later pass (which needs to insert, delete or reorder statements)
//! walk and patch pointers by hand. A `Vec<ProgramItem>` gives the same
//! traversal order with ordinary slice operations instead.

use crate::ir::expr::ExprId;
use crate::tokens::StmtCode;
use crate::vars::VarId;

#[derive(Debug, Clone)]
pub struct Stmt {
    pub code: StmtCode,
    pub line: u32,
    /// Generic expression operands: the print list, the read target
    /// list, an assignment's right-hand side, etc.
    pub args: Vec<ExprId>,
    /// An assignment's left-hand side (`LET`/`LET_INV`).
    pub target: Option<ExprId>,
    /// A label this statement defines or, after `replace_complex_stmt`
    /// has run, a resolved jump target.
    pub label: Option<VarId>,
    /// Free text payload: `REM` commentary, or a `DATA` statement's raw
    /// bytes are instead represented as `Expr::Data` chains in `args`.
    pub text: Option<Vec<u8>>,
    /// Raw line-number targets before `replace_complex_stmt`/label
    /// resolution turns them into `label`s: `ON ... GOTO` lists, a
    /// structured `IF`'s implicit else-branch line, etc.
    pub branch_targets: Vec<i64>,
}

impl Stmt {
    pub fn new(code: StmtCode, line: u32) -> Self {
        Stmt { code, line, args: Vec::new(), target: None, label: None, text: None, branch_targets: Vec::new() }
    }

    pub fn with_args(mut self, args: Vec<ExprId>) -> Self {
        self.args = args;
        self
    }

    pub fn with_target(mut self, target: ExprId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_label(mut self, label: VarId) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_text(mut self, text: Vec<u8>) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_branch_targets(mut self, targets: Vec<i64>) -> Self {
        self.branch_targets = targets;
        self
    }
}

/// One element of the flattened program: either a line-number marker
/// or a statement. A `TOK` binary line corresponds to a `LineNumber`
/// followed by one or more `Statement`s up to (but not including) the
/// next `LineNumber`.
#[derive(Debug, Clone)]
pub enum ProgramItem {
    LineNumber(i64),
    Statement(Stmt),
}

impl ProgramItem {
    pub fn as_statement(&self) -> Option<&Stmt> {
        match self {
            ProgramItem::Statement(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_statement_mut(&mut self) -> Option<&mut Stmt> {
        match self {
            ProgramItem::Statement(s) => Some(s),
            _ => None,
        }
    }
}
