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

//! Packs a `FlatProgram` into the historical `SAVE`-image binary format:
//! a variable name table, a variable value table, and tokenized program
//! lines, wrapped in a seven-word header.
//!
//! Jump targets (`GOTO`/`GOSUB`/`IF...THEN`/`ON...GO#`/`TRAP`) address a
//! label by the binary line number the encoder itself assigns while
//! packing statements into lines, so a label's line number isn't known
//! until every statement before it (forward references included) has
//! been laid out. The encoder resolves this the way any single-pass
//! assembler resolves a forward branch: it emits a two-byte placeholder
//! at each jump site, remembers where that placeholder landed, and
//! patches every site once the whole program has been laid out.

use crate::bcd;
use crate::errors::CompileError;
use crate::ir::expr::{Expr, ExprArena, ExprId};
use crate::ir::stmt::Stmt;
use crate::ir::FlatProgram;
use crate::sbuf::StringBuf;
use crate::tokens::{self, StmtCode, Token};
use crate::vars::{VarId, VarTable, VarType};

/// Maximum combined size of VNT + VVT + tokenized lines.
const MAX_PROGRAM_BYTES: usize = 0x9500;
/// A single statement's encoded byte length, including its own length
/// prefix and statement code, must stay under this or it can never fit
/// on a line by itself.
const MAX_STATEMENT_BYTES: usize = 0xFB;

const SAVE_TRAILER: [u8; 11] = [0x00, 0x80, 0x0b, 0x0b, 0x19, 0x0f, 0x03, 0x44, 0x3a, 0x58, 0x16];

/// Maximum bytes a packed line (3-byte header + statement payload) may
/// occupy; configurable down to 16 by `-n`, defaulting to the hard
/// one-byte-length-prefix ceiling.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub max_line_bytes: u16,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions { max_line_bytes: 0xFF }
    }
}

fn put16(out: &mut Vec<u8>, v: u32) {
    out.push((v & 0xFF) as u8);
    out.push(((v >> 8) & 0xFF) as u8);
}

/// Builds the VNT (sigil-terminated short names) and VVT (fixed 8-byte
/// entries) sections, in variable-table order.
fn encode_vars(vars: &VarTable) -> (Vec<u8>, Vec<u8>) {
    let mut vnt = Vec::new();
    let mut vvt = Vec::new();

    for id in vars.ids() {
        let name = vars.short_name(id).as_bytes();
        match vars.var_type(id) {
            VarType::Array | VarType::String => {
                vnt.extend_from_slice(name);
                let sigil = if vars.var_type(id) == VarType::Array { b'(' } else { b'$' };
                vnt.push(sigil | 0x80);
            }
            _ => {
                let (last, rest) = name.split_last().expect("short names are never empty");
                vnt.extend_from_slice(rest);
                vnt.push(*last | 0x80);
            }
        }

        let type_byte = match vars.var_type(id) {
            VarType::Float => 0x00,
            VarType::String => 0x80,
            VarType::Array => 0x40,
            VarType::Label | VarType::AsmLabel => 0xC0,
        };
        vvt.push(type_byte);
        vvt.push(id.0 as u8);
        vvt.extend_from_slice(&[0; 6]);
    }
    vnt.push(0);

    (vnt, vvt)
}

fn encode_var_ref(id: VarId) -> Vec<u8> {
    let byte = (id.0 as u8) ^ 0x80;
    if id.0 <= 127 { vec![byte] } else { vec![0, byte] }
}

fn encode_number(n: f64, hex: bool) -> Vec<u8> {
    let bcd = bcd::to_bcd(n);
    let mut out = Vec::with_capacity(7);
    out.push(if hex { 0x0D } else { 0x0E });
    out.push(bcd.exp);
    out.extend_from_slice(&bcd.digits);
    out
}

fn encode_string_literal(bytes: &[u8]) -> Result<Vec<u8>, CompileError> {
    if bytes.len() > 0xFF {
        return Err(CompileError::encoder(format!("string literal of {} bytes exceeds the 255-byte limit", bytes.len())));
    }
    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(0x0F);
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
    Ok(out)
}

/// Walks a `DATA` item's `prev` chain back to front, returning the full
/// byte payload in source order.
fn flatten_data_chain(exprs: &ExprArena, mut id: ExprId) -> Vec<u8> {
    let mut chunks = Vec::new();
    loop {
        match exprs.get(id) {
            Expr::Data { bytes, prev } => {
                chunks.push(bytes.clone());
                match prev {
                    Some(p) => id = *p,
                    None => break,
                }
            }
            _ => break,
        }
    }
    chunks.reverse();
    chunks.concat()
}

fn encode_expr(exprs: &ExprArena, id: ExprId) -> Result<Vec<u8>, CompileError> {
    match exprs.get(id) {
        Expr::Void => Ok(Vec::new()),
        Expr::ConstNumber(n) => Ok(encode_number(*n, false)),
        Expr::ConstHexNumber(n) => Ok(encode_number(*n, true)),
        Expr::ConstString(s) => encode_string_literal(s),
        Expr::VarNumber(v) | Expr::VarString(v) | Expr::VarArray(v) | Expr::VarLabel(v) | Expr::VarAsmLabel(v) => {
            Ok(encode_var_ref(*v))
        }
        Expr::DefNumber(_) | Expr::DefString(_) => {
            Err(CompileError::encoder("internal error: unresolved definition reached the encoder"))
        }
        Expr::Data { .. } => encode_string_literal(&flatten_data_chain(exprs, id)),
        Expr::Unary(tok, a) => {
            let mut out = encode_expr(exprs, *a)?;
            out.push(0x10 + tokens::tok_code(*tok));
            Ok(out)
        }
        Expr::Binary(tok, a, b) => {
            let mut out = encode_expr(exprs, *a)?;
            out.extend(encode_expr(exprs, *b)?);
            out.push(0x10 + tokens::tok_code(*tok));
            Ok(out)
        }
        Expr::SmallInt(tok) => Ok(vec![0x10 + tokens::tok_code(*tok)]),
    }
}

fn encode_expr_list(exprs: &ExprArena, ids: &[ExprId]) -> Result<Vec<u8>, CompileError> {
    let mut out = Vec::new();
    for (i, &id) in ids.iter().enumerate() {
        if i > 0 {
            out.push(0x10 + tokens::TOK_COMMA);
        }
        out.extend(encode_expr(exprs, id)?);
    }
    Ok(out)
}

/// A two-byte placeholder site inside a statement's own byte buffer,
/// waiting to be patched with the binary line number `target` resolves
/// to once the whole program has been laid out.
struct Patch {
    local_offset: usize,
    target: VarId,
}

fn push_line_ref_placeholder(out: &mut Vec<u8>, target: VarId, patches: &mut Vec<Patch>) {
    patches.push(Patch { local_offset: out.len(), target });
    out.extend_from_slice(&[0, 0]);
}

/// Encodes one statement's `statement_code, tokens...` body (everything
/// but the leading cumulative-length byte and the trailing colon/EOL
/// byte, which the line packer in `encode` supplies). Returns `None` for
/// `LBL_S`, which is a pure layout marker contributing no bytes.
fn encode_stmt_body(stmt: &Stmt, exprs: &ExprArena) -> Result<Option<(Vec<u8>, Vec<Patch>)>, CompileError> {
    if stmt.code == StmtCode::LblS {
        return Ok(None);
    }

    let mut out = vec![tokens::stmt_encoding(stmt.code)];
    let mut patches = Vec::new();

    match stmt.code {
        StmtCode::Let | StmtCode::LetInv => {
            let target = stmt.target.ok_or_else(|| CompileError::encoder("LET with no assignment target"))?;
            out.extend(encode_expr(exprs, target)?);
            out.push(0x10 + tokens::tok_code(Token::Eq));
            let value = *stmt.args.first().ok_or_else(|| CompileError::encoder("LET with no right-hand side"))?;
            out.extend(encode_expr(exprs, value)?);
        }
        StmtCode::Dim | StmtCode::Com => {
            out.extend(encode_expr_list(exprs, &stmt.args)?);
        }
        StmtCode::IfNumber => {
            let cond = *stmt.args.first().ok_or_else(|| CompileError::encoder("IF with no condition"))?;
            out.extend(encode_expr(exprs, cond)?);
            out.push(0x10 + tokens::TOK_THEN);
            let target = stmt.label.ok_or_else(|| CompileError::encoder("IF...THEN with no resolved target"))?;
            push_line_ref_placeholder(&mut out, target, &mut patches);
        }
        StmtCode::GoS | StmtCode::Exec => {
            let target = stmt.label.ok_or_else(|| CompileError::encoder("GOTO/GOSUB with no resolved target"))?;
            push_line_ref_placeholder(&mut out, target, &mut patches);
        }
        StmtCode::Trap => {
            if stmt.branch_targets == [-1] {
                // the clear-trap sentinel: a plain out-of-range line number, not a jump
                out.extend_from_slice(&32768u16.to_le_bytes());
            } else {
                let target = stmt.label.ok_or_else(|| CompileError::encoder("TRAP with no resolved target"))?;
                push_line_ref_placeholder(&mut out, target, &mut patches);
            }
        }
        StmtCode::OnGo => {
            let selector = *stmt.args.first().ok_or_else(|| CompileError::encoder("ON with no selector expression"))?;
            out.extend(encode_expr(exprs, selector)?);
            for (i, &raw) in stmt.branch_targets.iter().enumerate() {
                if i > 0 {
                    out.push(0x10 + tokens::TOK_COMMA);
                }
                push_line_ref_placeholder(&mut out, VarId(raw as u16), &mut patches);
            }
        }
        StmtCode::Rem | StmtCode::BasError => {
            if let Some(text) = &stmt.text {
                out.extend_from_slice(text);
            }
        }
        StmtCode::RemHidden | StmtCode::Return | StmtCode::Proc | StmtCode::Stop | StmtCode::End => {
            // no payload
        }
        _ => {
            out.extend(encode_expr_list(exprs, &stmt.args)?);
        }
    }

    Ok(Some((out, patches)))
}

/// Flushes the statements accumulated in `bin_line` as one binary line
/// numbered `cur_line`, translating this line's pending patch sites into
/// absolute offsets into `toks`.
fn flush_line(toks: &mut Vec<u8>, cur_line: i64, bin_line: &mut Vec<u8>, pending: &mut Vec<Patch>, patches: &mut Vec<(usize, VarId)>) {
    if bin_line.is_empty() {
        pending.clear();
        return;
    }
    if let Some(last) = bin_line.last_mut() {
        if *last == 0x10 + tokens::TOK_COLON {
            *last = 0x10 + tokens::TOK_EOL;
        }
    }
    put16(toks, cur_line as u32);
    toks.push((bin_line.len() + 3) as u8);
    let base = toks.len();
    for p in pending.drain(..) {
        patches.push((base + p.local_offset, p.target));
    }
    toks.extend_from_slice(bin_line);
    bin_line.clear();
}

fn encode_statements(stmts: &[Stmt], exprs: &ExprArena, opts: &EncodeOptions) -> Result<Vec<u8>, CompileError> {
    let mut toks = Vec::new();
    let mut bin_line: Vec<u8> = Vec::new();
    let mut pending: Vec<Patch> = Vec::new();
    let mut patches: Vec<(usize, VarId)> = Vec::new();
    let mut label_positions: std::collections::HashMap<u16, i64> = std::collections::HashMap::new();
    let mut cur_line: i64 = 0;

    for stmt in stmts {
        if stmt.code == StmtCode::LblS {
            flush_line(&mut toks, cur_line, &mut bin_line, &mut pending, &mut patches);
            cur_line += 1;
            if cur_line > 32767 {
                return Err(CompileError::encoder("program needs more binary line numbers than fit in 0..32767"));
            }
            let label = stmt.label.ok_or_else(|| CompileError::encoder("LBL_S with no label identity"))?;
            label_positions.insert(label.0, cur_line);
            continue;
        }

        let Some((mut sb, sb_patches)) = encode_stmt_body(stmt, exprs)? else { continue };
        sb.push(0x10 + tokens::TOK_COLON);

        if sb.len() >= MAX_STATEMENT_BYTES {
            return Err(CompileError::encoder(format!("statement on line {} is too long to encode", stmt.line)));
        }

        // Labels (PROC definitions) always start a fresh line, per the
        // packing rules; otherwise a line is split once the next
        // statement would push it past the configured byte cap.
        let mut len_prefix = sb.len() + bin_line.len() + 4;
        let forces_new_line = tokens::stmt_is_label(stmt.code) && !bin_line.is_empty();
        if len_prefix > opts.max_line_bytes as usize || forces_new_line {
            flush_line(&mut toks, cur_line, &mut bin_line, &mut pending, &mut patches);
            cur_line += 1;
            if cur_line > 32767 {
                return Err(CompileError::encoder("program needs more binary line numbers than fit in 0..32767"));
            }
            len_prefix = sb.len() + bin_line.len() + 4;
        }

        let stmt_start = bin_line.len() + 1;
        bin_line.push(len_prefix as u8);
        bin_line.extend(sb);
        for p in sb_patches {
            pending.push(Patch { local_offset: stmt_start + p.local_offset, target: p.target });
        }
    }
    flush_line(&mut toks, cur_line, &mut bin_line, &mut pending, &mut patches);

    for (offset, target) in patches {
        let line = *label_positions
            .get(&target.0)
            .ok_or_else(|| CompileError::encoder("internal error: jump target never reached a LBL_S"))?;
        let bytes = (line as u16).to_le_bytes();
        toks[offset] = bytes[0];
        toks[offset + 1] = bytes[1];
    }

    toks.extend_from_slice(&SAVE_TRAILER);
    Ok(toks)
}

/// Encodes `program` into the full `SAVE`-image byte layout: header,
/// VNT, VVT, tokenized lines and trailer.
pub fn encode(program: &FlatProgram, opts: &EncodeOptions) -> Result<Vec<u8>, CompileError> {
    let (vnt, vvt) = encode_vars(&program.vars);
    let toks = encode_statements(&program.stmts, &program.exprs, opts)?;

    let total = vnt.len() + vvt.len() + toks.len();
    if total > MAX_PROGRAM_BYTES {
        let mut sb = StringBuf::new();
        sb.append(b"program too big: VNT=");
        sb.append_dec(vnt.len() as i64);
        sb.append(b" VVT=");
        sb.append_dec(vvt.len() as i64);
        sb.append(b" TOK=");
        sb.append_dec(toks.len() as i64);
        sb.append(b" total=");
        sb.append_dec(total as i64);
        sb.append(b" max=");
        sb.append_dec(MAX_PROGRAM_BYTES as i64);
        return Err(CompileError::encoder(String::from_utf8_lossy(&sb.into_vec()).into_owned()));
    }

    let mut out = Vec::with_capacity(14 + total);
    put16(&mut out, 0);
    put16(&mut out, 0x100);
    put16(&mut out, 0xFF + vnt.len() as u32);
    put16(&mut out, 0x100 + vnt.len() as u32);
    put16(&mut out, 0x100 + vnt.len() as u32 + vvt.len() as u32);
    put16(&mut out, 0x100 + vnt.len() as u32 + vvt.len() as u32 + toks.len() as u32 - 11);
    put16(&mut out, 0x100 + vnt.len() as u32 + vvt.len() as u32 + toks.len() as u32);
    out.extend(vnt);
    out.extend(vvt);
    out.extend(toks);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_for(stmts: Vec<Stmt>, exprs: ExprArena, vars: VarTable) -> FlatProgram {
        FlatProgram { exprs, stmts, vars, defs: crate::defs::DefTable::new() }
    }

    #[test]
    fn header_words_reflect_section_sizes() {
        let mut exprs = ExprArena::new();
        let mut vars = VarTable::new();
        let a = vars.new_var("A", VarType::Float).unwrap();
        let lbl = vars.new_var("@_lin_10", VarType::Label).unwrap();
        let five = exprs.alloc(Expr::ConstNumber(5.0), 1);
        let a_e = exprs.alloc(Expr::VarNumber(a), 1);
        let stmts = vec![
            Stmt::new(StmtCode::LblS, 1).with_label(lbl),
            Stmt::new(StmtCode::Let, 1).with_target(a_e).with_args(vec![five]),
        ];
        let program = flat_for(stmts, exprs, vars);
        let bytes = encode(&program, &EncodeOptions::default()).unwrap();

        let vnt_end = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;
        let vvt_start = u16::from_le_bytes([bytes[6], bytes[7]]) as usize;
        assert_eq!(vnt_end + 1, vvt_start);
        assert!(bytes.ends_with(&SAVE_TRAILER));
    }

    #[test]
    fn forward_goto_patches_the_target_line_number() {
        let mut exprs = ExprArena::new();
        let mut vars = VarTable::new();
        let target = vars.new_var("@_lin_100", VarType::Label).unwrap();
        let stmts = vec![
            Stmt::new(StmtCode::LblS, 1).with_label(vars.new_var("@_lin_10", VarType::Label).unwrap()),
            Stmt::new(StmtCode::GoS, 1).with_label(target),
            Stmt::new(StmtCode::LblS, 2).with_label(target),
            Stmt::new(StmtCode::Return, 2),
        ];
        let program = flat_for(stmts, exprs, vars);
        let bytes = encode(&program, &EncodeOptions::default()).unwrap();
        // the GOTO's line-number operand must equal the second LBL_S's assigned line (2)
        assert!(bytes.windows(2).any(|w| w == [2, 0]));
        let _ = &program.defs;
    }

    #[test]
    fn statement_too_long_is_a_hard_error() {
        let mut exprs = ExprArena::new();
        let vars = VarTable::new();
        let bytes = vec![b'x'; 250];
        let s = exprs.alloc(Expr::ConstString(bytes), 1);
        let stmts = vec![Stmt::new(StmtCode::Print, 1).with_args(vec![s])];
        let program = flat_for(stmts, exprs, vars);
        let err = encode(&program, &EncodeOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::Encoder { .. }));
    }
}
