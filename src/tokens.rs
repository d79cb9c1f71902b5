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

//! Fixed metadata tables for operator/function tokens and statement
//! codes: spellings for each output form, precedence levels, and the
//! handful of flags the binary encoder and listers key off of. These
//! are the single source of truth the pretty-printer, short-lister and
//! encoder consult — nothing downstream re-derives a spelling or a
//! precedence value independently.
//!
//! The real interpreter recognizes on the order of a hundred statements
//! and tokens; this table carries the representative subset this
//! crate's passes actually operate on; see DESIGN.md.

/// Operators, punctuation and intrinsic functions that can appear
/// inside an expression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    IDiv, // DIV
    IMod, // MOD
    // bitwise
    BitAnd, // &
    BitOr,  // !
    BitXor, // EXOR
    // comparisons
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    // logical
    And,
    Or,
    Not,
    // unary
    UPlus,
    UMinus,
    // string intrinsics
    ChrStr,
    Len,
    Asc,
    Dec,
    // math intrinsics
    Int,
    Trunc,
    Frac,
    Abs,
    Sgn,
    Sqr,
    Log,
    Exp,
    Clog,
    Atn,
    Cos,
    Sin,
    // small-integer literal tokens (§4.I.3)
    Per0,
    Per1,
    Per2,
    Per3,
}

struct TokMeta {
    tok_in: &'static str,
    tok_short: &'static str,
    tok_long: &'static str,
    /// -1..13; -1 is reserved for statement-level separators, which
    /// never appear as `Token` variants in the expression tree.
    prec: i8,
}

const fn meta(tok_in: &'static str, tok_short: &'static str, tok_long: &'static str, prec: i8) -> TokMeta {
    TokMeta { tok_in, tok_short, tok_long, prec }
}

fn token_meta(tok: Token) -> TokMeta {
    use Token::*;
    match tok {
        Or => meta("OR", "OR", "OR", 1),
        And => meta("AND", "AND", "AND", 2),
        Not => meta("NOT", "NOT", "NOT", 3),
        Eq => meta("=", "=", "=", 4),
        Ne => meta("<>", "<>", "<>", 4),
        Lt => meta("<", "<", "<", 4),
        Gt => meta(">", ">", ">", 4),
        Le => meta("<=", "<=", "<=", 4),
        Ge => meta(">=", ">=", ">=", 4),
        BitOr => meta("!", "!", "!", 5),
        BitXor => meta("EXOR", "EXOR", "EXOR", 5),
        BitAnd => meta("&", "&", "&", 6),
        Add => meta("+", "+", "+", 7),
        Sub => meta("-", "-", "-", 7),
        Mul => meta("*", "*", "*", 8),
        Div => meta("/", "/", "/", 8),
        IDiv => meta("DIV", "DIV", "DIV", 8),
        IMod => meta("MOD", "MOD", "MOD", 8),
        UPlus => meta("+", "+", "+", 9),
        UMinus => meta("-", "-", "-", 9),
        Pow => meta("^", "^", "^", 10),
        ChrStr => meta("CHR$", "CHR$", "CHR$", 13),
        Len => meta("LEN", "LEN", "LEN", 13),
        Asc => meta("ASC", "ASC", "ASC", 13),
        Dec => meta("DEC", "DEC", "DEC", 13),
        Int => meta("INT", "INT", "INT", 13),
        Trunc => meta("TRUNC", "TRNC", "TRUNC", 13),
        Frac => meta("FRAC", "FRAC", "FRAC", 13),
        Abs => meta("ABS", "ABS", "ABS", 13),
        Sgn => meta("SGN", "SGN", "SGN", 13),
        Sqr => meta("SQR", "SQR", "SQR", 13),
        Log => meta("LOG", "LOG", "LOG", 13),
        Exp => meta("EXP", "EXP", "EXP", 13),
        Clog => meta("CLOG", "CLOG", "CLOG", 13),
        Atn => meta("ATN", "ATN", "ATN", 13),
        Cos => meta("COS", "COS", "COS", 13),
        Sin => meta("SIN", "SIN", "SIN", 13),
        Per0 => meta("0", "0", "0", 13),
        Per1 => meta("1", "1", "1", 13),
        Per2 => meta("2", "2", "2", 13),
        Per3 => meta("3", "3", "3", 13),
    }
}

pub fn tok_in(tok: Token) -> &'static str {
    token_meta(tok).tok_in
}

pub fn tok_short(tok: Token) -> &'static str {
    token_meta(tok).tok_short
}

pub fn tok_long(tok: Token) -> &'static str {
    token_meta(tok).tok_long
}

pub fn tok_prec(tok: Token) -> i8 {
    token_meta(tok).prec
}

/// Reserved `0x10+tok` operands for the structural pseudo-tokens that
/// never appear as `Token` values: end-of-statement colon, end-of-line
/// (fixed at 6 so the EOL byte is `0x16`, per the binary format), the
/// `THEN` keyword and the list-separator comma.
pub const TOK_COLON: u8 = 0;
pub const TOK_EOL: u8 = 6;
pub const TOK_THEN: u8 = 7;
pub const TOK_COMMA: u8 = 8;
const RESERVED_CODES: &[u8] = &[TOK_COLON, TOK_EOL, TOK_THEN, TOK_COMMA];

/// The operand of `0x10+tok` in the binary encoding, for tokens that can
/// appear inside an expression tree.
pub fn tok_code(tok: Token) -> u8 {
    use Token::*;
    const ORDER: &[Token] = &[
        Or, And, Not, Eq, Ne, Lt, Gt, Le, Ge, BitOr, BitXor, BitAnd, Add, Sub, Mul, Div, IDiv,
        IMod, UPlus, UMinus, Pow, ChrStr, Len, Asc, Dec, Int, Trunc, Frac, Abs, Sgn, Sqr, Log,
        Exp, Clog, Atn, Cos, Sin,
    ];
    let mut idx = ORDER.iter().position(|&t| t == tok).expect("tok_code: token missing from encoding table");
    let mut code = 0u8;
    loop {
        if !RESERVED_CODES.contains(&code) {
            if idx == 0 {
                return code;
            }
            idx -= 1;
        }
        code += 1;
    }
}

pub fn is_binary(tok: Token) -> bool {
    !matches!(tok, Token::UPlus | Token::UMinus | Token::Not | Token::ChrStr |
        Token::Len | Token::Asc | Token::Dec | Token::Int | Token::Trunc | Token::Frac |
        Token::Abs | Token::Sgn | Token::Sqr | Token::Log | Token::Exp | Token::Clog |
        Token::Atn | Token::Cos | Token::Sin | Token::Per0 | Token::Per1 | Token::Per2 | Token::Per3)
}

pub fn is_commutative(tok: Token) -> bool {
    matches!(tok, Token::Add | Token::Mul | Token::BitAnd | Token::BitOr | Token::BitXor | Token::Eq | Token::Ne | Token::And | Token::Or)
}

/// §3 invariant (iii): the right child needs parens when its precedence
/// is `>=` the parent's.
pub fn needs_right_paren(parent: Token, child_prec: i8) -> bool {
    child_prec >= tok_prec(parent)
}

/// The left child needs parens whenever its precedence is strictly
/// lower than the parent's (it would otherwise be mis-grouped).
pub fn needs_left_paren(parent: Token, child_prec: i8) -> bool {
    child_prec < tok_prec(parent)
}

pub fn per_token_for_small_int(n: i64) -> Option<Token> {
    match n {
        0 => Some(Token::Per0),
        1 => Some(Token::Per1),
        2 => Some(Token::Per2),
        3 => Some(Token::Per3),
        _ => None,
    }
}

pub fn small_int_for_per_token(tok: Token) -> Option<f64> {
    match tok {
        Token::Per0 => Some(0.0),
        Token::Per1 => Some(1.0),
        Token::Per2 => Some(2.0),
        Token::Per3 => Some(3.0),
        _ => None,
    }
}

/// Statement codes. `replace_complex_stmt` (component H) removes the
/// structured-control-flow subset entirely; only the flat forms survive
/// into the optimizer and encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StmtCode {
    Let,
    LetInv, // prints without the LET keyword
    Print,
    Input,
    Get,
    Put,
    Poke,
    Dpoke,
    Plot,
    Drawto,
    Data,
    Read,
    Restore,
    Open,
    Close,
    Status,
    Note,
    Locate,
    Dim,
    Com,
    Stop,
    End,
    Rem,
    RemHidden,
    BasError,

    // structured control flow — removed by `replace_complex_stmt`
    Do,
    Loop,
    While,
    Wend,
    Repeat,
    Until,
    For,
    Next,
    IfMultiline,
    IfThen,
    Else,
    Endif,
    EndifInvisible,
    Goto,
    Gosub,
    OnGoto,
    OnGosub,
    Pop,
    Exit,
    ProcVar,
    ExecPar,
    Cls,
    SetColor,
    Sound,
    EndProc,

    // flat forms produced by desugaring
    LblS,
    GoS,
    Exec,
    IfNumber, // IF e THEN <line-number const>
    Trap,
    Return,
    Proc,
    OnGo, // the flat ON e GO#/EXEC label-list form
}

struct StmtMeta {
    stm_long: &'static str,
    stm_short: &'static str,
    min_abbrev: u8,
    is_label: bool,
}

const fn smeta(stm_long: &'static str, stm_short: &'static str, min_abbrev: u8, is_label: bool) -> StmtMeta {
    StmtMeta { stm_long, stm_short, min_abbrev, is_label }
}

fn stmt_meta(s: StmtCode) -> StmtMeta {
    use StmtCode::*;
    match s {
        Let => smeta("LET", "", 0, false), // LET itself is invisible in listings
        LetInv => smeta("", "", 0, false),
        Print => smeta("PRINT", "?", 1, false),
        Input => smeta("INPUT", "INPU", 4, false),
        Get => smeta("GET", "GET", 3, false),
        Put => smeta("PUT", "PUT", 3, false),
        Poke => smeta("POKE", "POKE", 4, false),
        Dpoke => smeta("DPOKE", "DPOK", 4, false),
        Plot => smeta("PLOT", "PLOT", 4, false),
        Drawto => smeta("DRAWTO", "DRAW", 4, false),
        Data => smeta("DATA", "DATA", 4, false),
        Read => smeta("READ", "READ", 4, false),
        Restore => smeta("RESTORE", "REST", 4, false),
        Open => smeta("OPEN", "OPEN", 4, false),
        Close => smeta("CLOSE", "CLOS", 4, false),
        Status => smeta("STATUS", "STAT", 4, false),
        Note => smeta("NOTE", "NOTE", 4, false),
        Locate => smeta("LOCATE", "LOCA", 4, false),
        Dim => smeta("DIM", "DIM", 3, false),
        Com => smeta("COM", "COM", 3, false),
        Stop => smeta("STOP", "STOP", 4, false),
        End => smeta("END", "END", 3, false),
        Rem => smeta("REM", "'", 1, false),
        RemHidden => smeta("REM", "'", 1, false),
        BasError => smeta("BAS_ERROR", "", 0, false),
        Do => smeta("DO", "DO", 2, false),
        Loop => smeta("LOOP", "LOOP", 4, false),
        While => smeta("WHILE", "WHIL", 4, false),
        Wend => smeta("WEND", "WEND", 4, false),
        Repeat => smeta("REPEAT", "REPE", 4, false),
        Until => smeta("UNTIL", "UNTI", 4, false),
        For => smeta("FOR", "FOR", 3, false),
        Next => smeta("NEXT", "NEXT", 4, false),
        IfMultiline => smeta("IF", "IF", 2, false),
        IfThen => smeta("IF", "IF", 2, false),
        Else => smeta("ELSE", "ELSE", 4, false),
        Endif => smeta("ENDIF", "ENDI", 4, false),
        EndifInvisible => smeta("", "", 0, false),
        Goto => smeta("GOTO", "GOTO", 4, false),
        Gosub => smeta("GOSUB", "GOSU", 4, false),
        OnGoto => smeta("ON", "ON", 2, false),
        OnGosub => smeta("ON", "ON", 2, false),
        Pop => smeta("POP", "POP", 3, false),
        Exit => smeta("EXIT", "EXIT", 4, false),
        ProcVar => smeta("PROC", "PROC", 4, true),
        ExecPar => smeta("EXEC", "EXEC", 4, false),
        Cls => smeta("CLS", "CLS", 3, false),
        SetColor => smeta("SETCOLOR", "SETC", 4, false),
        Sound => smeta("SOUND", "SOUN", 4, false),
        EndProc => smeta("ENDPROC", "ENDP", 4, false),
        LblS => smeta("", "", 0, true),
        GoS => smeta("GOTO", "GOTO", 4, false),
        Exec => smeta("GOSUB", "GOSU", 4, false),
        IfNumber => smeta("IF", "IF", 2, false),
        Trap => smeta("TRAP", "TRAP", 4, false),
        Return => smeta("RETURN", "RETU", 4, false),
        Proc => smeta("PROC", "PROC", 4, true),
        OnGo => smeta("ON", "ON", 2, false),
    }
}

pub fn stmt_long(s: StmtCode) -> &'static str {
    stmt_meta(s).stm_long
}

pub fn stmt_short(s: StmtCode) -> &'static str {
    stmt_meta(s).stm_short
}

pub fn stmt_min_abbrev(s: StmtCode) -> u8 {
    stmt_meta(s).min_abbrev
}

/// A `LBL_S`/`PROC` statement always starts a new binary-encoded line
/// (§4.K packing rules).
pub fn stmt_is_label(s: StmtCode) -> bool {
    stmt_meta(s).is_label
}

/// The one-byte statement code written immediately after a statement's
/// length prefix in the binary encoding. Assigned by declaration order
/// here rather than the historical ROM's codes, since only this
/// compiler's own encoder/decoder round-trip needs to agree on them.
pub fn stmt_encoding(s: StmtCode) -> u8 {
    use StmtCode::*;
    const ORDER: &[StmtCode] = &[
        Let, LetInv, Print, Input, Get, Put, Poke, Dpoke, Plot, Drawto, Data, Read, Restore, Open,
        Close, Status, Note, Locate, Dim, Com, Stop, End, Rem, RemHidden, BasError, LblS, GoS,
        Exec, IfNumber, Trap, Return, Proc, OnGo,
    ];
    ORDER.iter().position(|&c| c == s).expect("stmt_encoding: flat-form statement missing from table") as u8
}

/// True once `replace_complex_stmt` should have eliminated every
/// occurrence of `s` from the statement stream (§8 invariant).
pub fn is_structured_control_flow(s: StmtCode) -> bool {
    use StmtCode::*;
    matches!(
        s,
        Do | Loop | While | Wend | Repeat | Until | For | Next | IfMultiline | IfThen | Else
            | Endif | EndifInvisible | Goto | Gosub | OnGoto | OnGosub | Pop | Exit | ProcVar
            | ExecPar | Cls | Com | SetColor | EndProc
    )
}

/// Definition names and PROC-synthesized variable names must not
/// collide with a reserved token or statement spelling.
pub fn is_reserved_spelling(name: &str) -> bool {
    use crate::vars::ascii_ident_eq;
    const TOKENS: &[Token] = &[
        Token::Add, Token::Sub, Token::Mul, Token::Div, Token::Pow, Token::IDiv, Token::IMod,
        Token::BitAnd, Token::BitOr, Token::BitXor, Token::And, Token::Or, Token::Not,
        Token::ChrStr, Token::Len, Token::Asc, Token::Dec, Token::Int, Token::Trunc, Token::Frac,
        Token::Abs, Token::Sgn, Token::Sqr, Token::Log, Token::Exp, Token::Clog, Token::Atn,
        Token::Cos, Token::Sin,
    ];
    const STMTS: &[StmtCode] = &[
        StmtCode::Print, StmtCode::Input, StmtCode::Get, StmtCode::Put, StmtCode::Poke,
        StmtCode::Dpoke, StmtCode::Plot, StmtCode::Drawto, StmtCode::Data, StmtCode::Read,
        StmtCode::Restore, StmtCode::Open, StmtCode::Close, StmtCode::Dim, StmtCode::Com,
        StmtCode::Stop, StmtCode::End, StmtCode::Rem, StmtCode::Do, StmtCode::Loop,
        StmtCode::While, StmtCode::Wend, StmtCode::Repeat, StmtCode::Until, StmtCode::For,
        StmtCode::Next, StmtCode::Goto, StmtCode::Gosub, StmtCode::Pop, StmtCode::Exit,
        StmtCode::Cls, StmtCode::SetColor, StmtCode::Sound, StmtCode::Return, StmtCode::Trap,
    ];
    TOKENS.iter().any(|&t| ascii_ident_eq(tok_in(t), name))
        || STMTS.iter().any(|&s| !stmt_long(s).is_empty() && ascii_ident_eq(stmt_long(s), name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_child_at_or_above_parent_precedence_needs_parens() {
        // a - (b - c): Sub on the right with equal precedence.
        assert!(needs_right_paren(Token::Sub, tok_prec(Token::Sub)));
        assert!(!needs_right_paren(Token::Sub, tok_prec(Token::Mul)));
    }

    #[test]
    fn small_int_tokens_round_trip() {
        for n in 0..=3 {
            let t = per_token_for_small_int(n).unwrap();
            assert_eq!(small_int_for_per_token(t), Some(n as f64));
        }
        assert!(per_token_for_small_int(4).is_none());
    }

    #[test]
    fn reserved_spellings_catch_keywords_case_insensitively() {
        assert!(is_reserved_spelling("print"));
        assert!(is_reserved_spelling("Sqr"));
        assert!(!is_reserved_spelling("MY_COUNTER"));
    }
}
