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

//! Walks the grammar's parse tree and builds a `Program`. Expression
//! precedence isn't encoded in the grammar (`expr` is a flat sequence
//! of unary-prefixed operands and binary operators); it's resolved
//! here by precedence climbing over `tokens::tok_prec`, so the two
//! stay in sync with the listers and encoder instead of duplicating
//! a second precedence table in the grammar.
//!
//! `WHILE`'s condition is evaluated again at the bottom of the loop
//! (the historical desugar re-tests at `WEND`, not at the top), so the
//! builder carries a small stack of pending conditions from `WHILE` to
//! its matching `WEND`; everything else maps one grammar production to
//! one (or a short fixed sequence of) `Stmt`s.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::diagnostics::Bag;
use crate::errors::CompileError;
use crate::file_reader::FileReader;
use crate::ir::expr::{Expr, ExprId};
use crate::ir::stmt::Stmt;
use crate::ir::Program;
use crate::tokens::{self, StmtCode, Token};
use crate::vars::{VarId, VarType};

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct BasicParser;

pub struct FrontEnd<'w> {
    program: Program,
    warnings: &'w mut Bag,
    line: u32,
    while_conds: Vec<ExprId>,
    reader: &'w dyn FileReader,
}

impl<'w> FrontEnd<'w> {
    pub fn new(warnings: &'w mut Bag, reader: &'w dyn FileReader) -> Self {
        FrontEnd { program: Program::new(), warnings, line: 0, while_conds: Vec::new(), reader }
    }

    /// Parses `source` into a complete `Program`. A grammar failure is
    /// reported only as a count, per the established error taxonomy;
    /// the grammar itself doesn't attempt multi-error recovery.
    pub fn parse(mut self, source: &str) -> Result<Program, CompileError> {
        let mut pairs = BasicParser::parse(Rule::program, source).map_err(|_| CompileError::Parse { count: 1 })?;
        let program_pair = pairs.next().expect("program rule always produces exactly one pair");
        for line_pair in program_pair.into_inner() {
            if line_pair.as_rule() == Rule::line {
                self.line += 1;
                self.build_line(line_pair)?;
            }
        }
        Ok(self.program)
    }

    fn build_line(&mut self, line_pair: Pair<Rule>) -> Result<(), CompileError> {
        let line = self.line;
        for inner in line_pair.into_inner() {
            match inner.as_rule() {
                Rule::lineno => {
                    let n: i64 = inner.as_str().parse().map_err(|_| CompileError::structural(line, "bad line number"))?;
                    self.program.push_line_number(n);
                }
                Rule::stmt_list => {
                    for stmt_pair in inner.into_inner() {
                        self.build_stmt(stmt_pair, line)?;
                    }
                }
                Rule::define_line => self.build_define(inner, line)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn build_stmt(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let inner = pair.into_inner().next().expect("stmt always wraps one alternative");
        match inner.as_rule() {
            Rule::rem_stmt => {
                self.build_rem(inner, line);
                Ok(())
            }
            Rule::if_then_line => self.build_if_then_line(inner, line),
            Rule::if_then_stmts => self.build_if_then_stmts(inner, line),
            Rule::if_multiline => self.build_if_multiline(inner, line),
            Rule::else_stmt => {
                self.program.push_statement(Stmt::new(StmtCode::Else, line));
                Ok(())
            }
            Rule::endif_stmt => {
                self.program.push_statement(Stmt::new(StmtCode::Endif, line));
                Ok(())
            }
            Rule::do_stmt => {
                self.program.push_statement(Stmt::new(StmtCode::Do, line));
                Ok(())
            }
            Rule::loop_stmt => {
                self.program.push_statement(Stmt::new(StmtCode::Loop, line));
                Ok(())
            }
            Rule::while_stmt => self.build_while(inner, line),
            Rule::wend_stmt => {
                self.build_wend(line);
                Ok(())
            }
            Rule::repeat_stmt => {
                self.program.push_statement(Stmt::new(StmtCode::Repeat, line));
                Ok(())
            }
            Rule::until_stmt => self.build_until(inner, line),
            Rule::exit_stmt => {
                self.program.push_statement(Stmt::new(StmtCode::Exit, line));
                Ok(())
            }
            Rule::for_stmt => self.build_for(inner, line),
            Rule::next_stmt => self.build_next(inner, line),
            Rule::ongoto_stmt => self.build_on(inner, line, false),
            Rule::ongosub_stmt => self.build_on(inner, line, true),
            Rule::goto_stmt => self.build_goto(inner, line, false),
            Rule::gosub_stmt => self.build_goto(inner, line, true),
            Rule::trap_stmt => self.build_trap(inner, line),
            Rule::proc_stmt => self.build_proc(inner, line),
            Rule::exec_stmt => self.build_exec(inner, line),
            Rule::zero_arg_stmt => self.build_zero_arg(inner, line),
            Rule::generic_stmt => self.build_generic(inner, line),
            Rule::let_stmt => self.build_let(inner, line),
            r => Err(CompileError::structural(line, format!("unhandled statement rule {r:?}"))),
        }
    }

    fn build_rem(&mut self, pair: Pair<Rule>, line: u32) {
        let raw = pair.as_str();
        let text = if let Some(rest) = raw.strip_prefix('\'') {
            rest.as_bytes().to_vec()
        } else {
            raw[3..].trim_start().as_bytes().to_vec()
        };
        self.program.push_statement(Stmt::new(StmtCode::Rem, line).with_text(text));
    }

    fn build_if_then_line(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let cond = self.build_expr(inner.next().unwrap(), line)?;
        let target: i64 = inner
            .next()
            .unwrap()
            .as_str()
            .parse()
            .map_err(|_| CompileError::structural(line, "bad line number"))?;
        self.program.push_statement(Stmt::new(StmtCode::IfThen, line).with_args(vec![cond]));
        self.program.push_statement(Stmt::new(StmtCode::Goto, line).with_branch_targets(vec![target]));
        self.program.push_statement(Stmt::new(StmtCode::EndifInvisible, line));
        Ok(())
    }

    fn build_if_then_stmts(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let cond = self.build_expr(inner.next().unwrap(), line)?;
        let stmt_list = inner.next().unwrap();
        self.program.push_statement(Stmt::new(StmtCode::IfThen, line).with_args(vec![cond]));
        for s in stmt_list.into_inner() {
            self.build_stmt(s, line)?;
        }
        self.program.push_statement(Stmt::new(StmtCode::EndifInvisible, line));
        Ok(())
    }

    fn build_if_multiline(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let cond = self.build_expr(pair.into_inner().next().unwrap(), line)?;
        self.program.push_statement(Stmt::new(StmtCode::IfMultiline, line).with_args(vec![cond]));
        Ok(())
    }

    fn build_while(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let cond = self.build_expr(pair.into_inner().next().unwrap(), line)?;
        self.while_conds.push(cond);
        self.program.push_statement(Stmt::new(StmtCode::While, line));
        Ok(())
    }

    fn build_wend(&mut self, line: u32) {
        let cond = self
            .while_conds
            .pop()
            .unwrap_or_else(|| self.program.alloc(Expr::SmallInt(Token::Per1), line));
        self.program.push_statement(Stmt::new(StmtCode::Wend, line).with_args(vec![cond]));
    }

    fn build_until(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let cond = self.build_expr(pair.into_inner().next().unwrap(), line)?;
        self.program.push_statement(Stmt::new(StmtCode::Until, line).with_args(vec![cond]));
        Ok(())
    }

    fn build_for(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let var_e = self.resolve_ident(inner.next().unwrap().as_str(), false, line)?;
        let start = self.build_expr(inner.next().unwrap(), line)?;
        let end = self.build_expr(inner.next().unwrap(), line)?;
        let mut args = vec![start, end];
        if let Some(step_pair) = inner.next() {
            args.push(self.build_expr(step_pair, line)?);
        }
        self.program.push_statement(Stmt::new(StmtCode::For, line).with_target(var_e).with_args(args));
        Ok(())
    }

    fn build_next(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let mut stmt = Stmt::new(StmtCode::Next, line);
        if let Some(ident_pair) = pair.into_inner().next() {
            stmt = stmt.with_target(self.resolve_ident(ident_pair.as_str(), false, line)?);
        }
        self.program.push_statement(stmt);
        Ok(())
    }

    fn build_goto(&mut self, pair: Pair<Rule>, line: u32, is_sub: bool) -> Result<(), CompileError> {
        let n: i64 = pair
            .into_inner()
            .next()
            .unwrap()
            .as_str()
            .parse()
            .map_err(|_| CompileError::structural(line, "bad line number"))?;
        let code = if is_sub { StmtCode::Gosub } else { StmtCode::Goto };
        self.program.push_statement(Stmt::new(code, line).with_branch_targets(vec![n]));
        Ok(())
    }

    fn build_on(&mut self, pair: Pair<Rule>, line: u32, is_sub: bool) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let selector = self.build_expr(inner.next().unwrap(), line)?;
        let mut targets = Vec::new();
        for p in inner {
            targets.push(p.as_str().parse().map_err(|_| CompileError::structural(line, "bad line number"))?);
        }
        let code = if is_sub { StmtCode::OnGosub } else { StmtCode::OnGoto };
        self.program
            .push_statement(Stmt::new(code, line).with_args(vec![selector]).with_branch_targets(targets));
        Ok(())
    }

    fn build_trap(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let n: i64 = pair
            .into_inner()
            .next()
            .unwrap()
            .as_str()
            .parse()
            .map_err(|_| CompileError::structural(line, "bad line number"))?;
        self.program.push_statement(Stmt::new(StmtCode::Trap, line).with_branch_targets(vec![n]));
        Ok(())
    }

    fn build_proc(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let label = self.program.vars.new_var(inner.next().unwrap().as_str(), VarType::Label)?;
        let mut params = Vec::new();
        for p in inner {
            params.push(self.build_var_ref(p, line)?);
        }
        self.program.push_statement(Stmt::new(StmtCode::ProcVar, line).with_label(label).with_args(params));
        Ok(())
    }

    fn build_exec(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let label = self.program.vars.new_var(inner.next().unwrap().as_str(), VarType::Label)?;
        let mut args = Vec::new();
        for p in inner {
            args.push(self.build_expr(p, line)?);
        }
        self.program.push_statement(Stmt::new(StmtCode::ExecPar, line).with_label(label).with_args(args));
        Ok(())
    }

    fn build_zero_arg(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let code = match pair.as_str().to_ascii_uppercase().as_str() {
            "STOP" => StmtCode::Stop,
            "END" => StmtCode::End,
            "RETURN" => StmtCode::Return,
            "POP" => StmtCode::Pop,
            "ENDPROC" => StmtCode::EndProc,
            other => return Err(CompileError::structural(line, format!("unknown statement '{other}'"))),
        };
        self.program.push_statement(Stmt::new(code, line));
        Ok(())
    }

    fn build_generic(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let kw_pair = inner.next().unwrap();
        let code = generic_keyword_code(kw_pair.as_str())
            .ok_or_else(|| CompileError::structural(line, format!("unknown statement '{}'", kw_pair.as_str())))?;
        let mut args = Vec::new();
        if let Some(list_pair) = inner.next() {
            for e in list_pair.into_inner() {
                args.push(self.build_expr(e, line)?);
            }
        }
        self.program.push_statement(Stmt::new(code, line).with_args(args));
        Ok(())
    }

    fn build_let(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let target = self.build_var_ref(inner.next().unwrap(), line)?;
        let value = self.build_expr(inner.next().unwrap(), line)?;
        self.program.push_statement(Stmt::new(StmtCode::Let, line).with_target(target).with_args(vec![value]));
        Ok(())
    }

    fn build_define(&mut self, pair: Pair<Rule>, line: u32) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let name = inner.next().unwrap().as_str().to_string();
        let value_pair = inner.next().unwrap();
        let id = self.program.defs.new_def(&name, line, self.warnings)?;
        match value_pair.as_rule() {
            Rule::number => {
                let text = value_pair.as_str();
                let v: f64 = if text.starts_with("0x") || text.starts_with("0X") {
                    i64::from_str_radix(&text[2..], 16).unwrap_or(0) as f64
                } else {
                    text.parse().unwrap_or(0.0)
                };
                self.program.defs.set_number(id, v);
            }
            Rule::string_lit => {
                let raw = value_pair.as_str();
                self.program.defs.set_string(id, raw[1..raw.len() - 1].as_bytes().to_vec());
            }
            Rule::binary_include => {
                let mut parts = value_pair.into_inner();
                let path_raw = parts.next().unwrap().as_str();
                let path = &path_raw[1..path_raw.len() - 1];
                let offset: u64 = parts.next().unwrap().as_str().parse().unwrap_or(0);
                self.program.defs.set_binary_include(id, std::path::Path::new(path), offset, line, self.reader)?;
            }
            _ => unreachable!("define_line only ever carries a number, a string literal, or a binary include"),
        }
        Ok(())
    }

    fn build_var_ref(&mut self, pair: Pair<Rule>, line: u32) -> Result<ExprId, CompileError> {
        let inner = pair.into_inner().next().expect("var_ref always wraps one alternative");
        match inner.as_rule() {
            Rule::string_ident => {
                let full = inner.as_str();
                self.resolve_ident(&full[..full.len() - 1], true, line)
            }
            Rule::ident => self.resolve_ident(inner.as_str(), false, line),
            r => unreachable!("var_ref wrapped unexpected rule {r:?}"),
        }
    }

    fn resolve_ident(&mut self, name: &str, is_string: bool, line: u32) -> Result<ExprId, CompileError> {
        if let Some(def_id) = self.program.defs.search(name) {
            let node = if self.program.defs.is_string(def_id) { Expr::DefString(def_id) } else { Expr::DefNumber(def_id) };
            return Ok(self.program.alloc(node, line));
        }
        let var = if is_string {
            self.program.vars.new_var(name, VarType::String)?
        } else {
            self.program.vars.new_var(name, VarType::Float)?
        };
        let node = if is_string { Expr::VarString(var) } else { Expr::VarNumber(var) };
        Ok(self.program.alloc(node, line))
    }

    fn build_array_ref(&mut self, pair: Pair<Rule>, line: u32) -> Result<ExprId, CompileError> {
        let mut inner = pair.into_inner();
        let name = inner.next().unwrap().as_str().to_string();
        // The subscript list is parsed (so a malformed one is still a
        // syntax error) but not retained: `Expr::VarArray` only tracks
        // which array is referenced, matching the listers, which never
        // render a subscript either.
        let var = self.program.vars.new_var(&name, VarType::Array)?;
        Ok(self.program.alloc(Expr::VarArray(var), line))
    }

    fn build_primary(&mut self, pair: Pair<Rule>, line: u32) -> Result<ExprId, CompileError> {
        let inner = pair.into_inner().next().expect("primary always wraps one alternative");
        match inner.as_rule() {
            Rule::number => Ok(self.build_number(inner, line)),
            Rule::string_lit => Ok(self.build_string_lit(inner, line)),
            Rule::func_call => self.build_func_call(inner, line),
            Rule::array_ref => self.build_array_ref(inner, line),
            Rule::expr => self.build_expr(inner, line),
            Rule::var_ref => self.build_var_ref(inner, line),
            r => Err(CompileError::structural(line, format!("unexpected expression term {r:?}"))),
        }
    }

    fn build_number(&mut self, pair: Pair<Rule>, line: u32) -> ExprId {
        let text = pair.as_str();
        if text.len() > 2 && (text.starts_with("0x") || text.starts_with("0X")) {
            let v = i64::from_str_radix(&text[2..], 16).unwrap_or(0) as f64;
            return self.program.alloc(Expr::ConstHexNumber(v), line);
        }
        let v: f64 = match text.parse() {
            Ok(v) => v,
            Err(_) => {
                self.warnings.warn(line, format!("unparsable numeric literal '{text}'"));
                0.0
            }
        };
        self.program.alloc(Expr::ConstNumber(v), line)
    }

    fn build_string_lit(&mut self, pair: Pair<Rule>, line: u32) -> ExprId {
        let raw = pair.as_str();
        let inner = &raw[1..raw.len() - 1];
        let mut bytes = Vec::with_capacity(inner.len());
        let mut chars = inner.bytes().peekable();
        while let Some(b) = chars.next() {
            if b == b'"' && chars.peek() == Some(&b'"') {
                chars.next();
            }
            bytes.push(b);
        }
        self.program.alloc(Expr::ConstString(bytes), line)
    }

    fn build_func_call(&mut self, pair: Pair<Rule>, line: u32) -> Result<ExprId, CompileError> {
        let mut inner = pair.into_inner();
        let tok = func_token(inner.next().unwrap().as_str());
        let arg = self.build_expr(inner.next().unwrap(), line)?;
        Ok(self.program.alloc(Expr::Unary(tok, arg), line))
    }

    /// Builds a flat `expr` pair (`unary_op* primary (bin_op unary_op*
    /// primary)*`) into a binary tree by precedence climbing over
    /// `tokens::tok_prec`. Unary operators only ever prefix a single
    /// primary term in this grammar, so they're applied eagerly before
    /// climbing rather than folded into the climb itself.
    fn build_expr(&mut self, pair: Pair<Rule>, line: u32) -> Result<ExprId, CompileError> {
        let mut operands = Vec::new();
        let mut operators = Vec::new();
        let mut pending_unary = Vec::new();
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::unary_op => pending_unary.push(unary_token(p.as_str())),
                Rule::primary => {
                    let mut e = self.build_primary(p, line)?;
                    for tok in pending_unary.drain(..).rev() {
                        e = self.program.alloc(Expr::Unary(tok, e), line);
                    }
                    operands.push(e);
                }
                Rule::bin_op => operators.push(bin_token(p.as_str())),
                _ => {}
            }
        }
        let mut idx = 0;
        Ok(self.climb(&operands, &operators, &mut idx, 0, line))
    }

    fn climb(&mut self, operands: &[ExprId], ops: &[Token], idx: &mut usize, min_prec: i8, line: u32) -> ExprId {
        let mut left = operands[*idx];
        *idx += 1;
        while *idx > 0 && *idx - 1 < ops.len() {
            let op = ops[*idx - 1];
            let prec = tokens::tok_prec(op);
            if prec < min_prec {
                break;
            }
            let right = self.climb(operands, ops, idx, prec + 1, line);
            left = self.program.alloc(Expr::Binary(op, left, right), line);
        }
        left
    }
}

fn unary_token(s: &str) -> Token {
    match s {
        "+" => Token::UPlus,
        "-" => Token::UMinus,
        _ => Token::Not,
    }
}

fn bin_token(s: &str) -> Token {
    match s.to_ascii_uppercase().as_str() {
        "<>" => Token::Ne,
        "<=" => Token::Le,
        ">=" => Token::Ge,
        "=" => Token::Eq,
        "<" => Token::Lt,
        ">" => Token::Gt,
        "!" => Token::BitOr,
        "&" => Token::BitAnd,
        "+" => Token::Add,
        "-" => Token::Sub,
        "*" => Token::Mul,
        "/" => Token::Div,
        "^" => Token::Pow,
        "OR" => Token::Or,
        "AND" => Token::And,
        "EXOR" => Token::BitXor,
        "DIV" => Token::IDiv,
        "MOD" => Token::IMod,
        other => unreachable!("grammar produced unknown binary operator '{other}'"),
    }
}

fn func_token(s: &str) -> Token {
    match s.to_ascii_uppercase().as_str() {
        "CHR$" => Token::ChrStr,
        "LEN" => Token::Len,
        "ASC" => Token::Asc,
        "DEC" => Token::Dec,
        "TRUNC" => Token::Trunc,
        "FRAC" => Token::Frac,
        "ABS" => Token::Abs,
        "SGN" => Token::Sgn,
        "SQR" => Token::Sqr,
        "LOG" => Token::Log,
        "EXP" => Token::Exp,
        "CLOG" => Token::Clog,
        "ATN" => Token::Atn,
        "COS" => Token::Cos,
        "SIN" => Token::Sin,
        "INT" => Token::Int,
        other => unreachable!("grammar produced unknown function name '{other}'"),
    }
}

fn generic_keyword_code(s: &str) -> Option<StmtCode> {
    Some(match s.to_ascii_uppercase().as_str() {
        "PRINT" | "?" => StmtCode::Print,
        "INPUT" => StmtCode::Input,
        "GET" => StmtCode::Get,
        "PUT" => StmtCode::Put,
        "DPOKE" => StmtCode::Dpoke,
        "POKE" => StmtCode::Poke,
        "PLOT" => StmtCode::Plot,
        "DRAWTO" => StmtCode::Drawto,
        "DATA" => StmtCode::Data,
        "READ" => StmtCode::Read,
        "RESTORE" => StmtCode::Restore,
        "OPEN" => StmtCode::Open,
        "CLOSE" => StmtCode::Close,
        "STATUS" => StmtCode::Status,
        "NOTE" => StmtCode::Note,
        "LOCATE" => StmtCode::Locate,
        "DIM" => StmtCode::Dim,
        "COM" => StmtCode::Com,
        "CLS" => StmtCode::Cls,
        "SETCOLOR" => StmtCode::SetColor,
        "SOUND" => StmtCode::Sound,
        _ => return None,
    })
}

/// Parses a complete source file into a `Program`, ready for
/// `lower_procs`/`desugar`. `reader` is only consulted when the source
/// contains a binary-include `.DEFINE`.
pub fn parse_source(source: &str, warnings: &mut Bag, reader: &dyn FileReader) -> Result<Program, CompileError> {
    FrontEnd::new(warnings, reader).parse(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_reader::MockFileReader;
    use crate::ir::expr::Expr;

    fn parse(source: &str, warnings: &mut Bag) -> Result<Program, CompileError> {
        parse_source(source, warnings, &MockFileReader::default())
    }

    #[test]
    fn assigns_a_constant_to_a_variable() {
        let mut warnings = Bag::new("t.bas");
        let program = parse("10 LET A = 5\n", &mut warnings).unwrap();
        let stmts: Vec<&Stmt> = program.statements().collect();
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].code, StmtCode::Let);
        let value = stmts[0].args[0];
        assert!(matches!(program.exprs.get(value), Expr::ConstNumber(n) if *n == 5.0));
    }

    #[test]
    fn binary_precedence_groups_multiplication_before_addition() {
        let mut warnings = Bag::new("t.bas");
        let program = parse("10 LET A = 1 + 2 * 3\n", &mut warnings).unwrap();
        let stmts: Vec<&Stmt> = program.statements().collect();
        let top = stmts[0].args[0];
        match program.exprs.get(top) {
            Expr::Binary(Token::Add, _, rhs) => {
                assert!(matches!(program.exprs.get(*rhs), Expr::Binary(Token::Mul, _, _)));
            }
            other => panic!("expected a top-level addition, got {other:?}"),
        }
    }

    #[test]
    fn if_then_with_a_line_number_desugars_to_a_goto_body() {
        let mut warnings = Bag::new("t.bas");
        let program = parse("10 IF A THEN 100\n", &mut warnings).unwrap();
        let codes: Vec<StmtCode> = program.statements().map(|s| s.code).collect();
        assert_eq!(codes, vec![StmtCode::IfThen, StmtCode::Goto, StmtCode::EndifInvisible]);
    }

    #[test]
    fn for_next_round_trips_the_loop_variable() {
        let mut warnings = Bag::new("t.bas");
        let program = parse("10 FOR I = 1 TO 10\n20 NEXT I\n", &mut warnings).unwrap();
        let codes: Vec<StmtCode> = program.statements().map(|s| s.code).collect();
        assert_eq!(codes, vec![StmtCode::For, StmtCode::Next]);
    }

    #[test]
    fn define_directive_is_resolved_instead_of_emitted_as_a_statement() {
        let mut warnings = Bag::new("t.bas");
        let program = parse(".DEFINE WIDTH 40\n10 PRINT WIDTH\n", &mut warnings).unwrap();
        let stmts: Vec<&Stmt> = program.statements().collect();
        assert_eq!(stmts.len(), 1);
        let arg = stmts[0].args[0];
        assert!(matches!(program.exprs.get(arg), Expr::DefNumber(_)));
    }

    #[test]
    fn binary_include_define_splices_file_bytes_as_a_string() {
        let mut reader = MockFileReader::default();
        reader.add_binary_file("tiles.bin", &[0x41, 0x42, 0x43, 0x44]);
        let mut warnings = Bag::new("t.bas");
        let program = parse_source(".DEFINE TILES \"tiles.bin\", 1\n10 PRINT TILES$\n", &mut warnings, &reader).unwrap();
        let id = program.defs.search("TILES").unwrap();
        assert_eq!(program.defs.get_string(id), Some(&[0x42, 0x43, 0x44][..]));
    }

    #[test]
    fn malformed_source_is_reported_as_a_parse_error_count() {
        let mut warnings = Bag::new("t.bas");
        let err = parse("10 LET = = =\n", &mut warnings).unwrap_err();
        assert!(matches!(err, CompileError::Parse { count: 1 }));
    }
}
