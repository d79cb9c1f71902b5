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

//! Constant folding: collapses operator nodes whose operands are
//! already constants. Bitwise operators warn and fold to zero when an
//! operand falls outside `[0, 65535.5)`; integer division by zero
//! warns but still folds, carrying through an infinity exactly as the
//! historical tool does (see DESIGN.md for why this is kept as-is).

use crate::diagnostics::Bag;
use crate::ir::expr::{Expr, ExprArena, ExprId};
use crate::tokens::Token;

fn in_bitwise_range(x: f64) -> bool {
    (0.0..65535.5).contains(&x)
}

fn fold_numeric(tok: Token, a: f64, b: f64, line: u32, warnings: &mut Bag) -> Option<f64> {
    use Token::*;
    Some(match tok {
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        Div => a / b,
        Pow => a.powf(b),
        IMod => {
            if b == 0.0 {
                warnings.warn(line, "at 'MOD', integer division by 0");
            }
            (a as i64).checked_rem(b as i64).map(|v| v as f64).unwrap_or(f64::INFINITY)
        }
        BitAnd => {
            if !in_bitwise_range(a) || !in_bitwise_range(b) {
                warnings.warn(line, "operands to '&' out of range");
                0.0
            } else {
                ((a as u32) & (b as u32)) as f64
            }
        }
        BitOr => {
            if !in_bitwise_range(a) || !in_bitwise_range(b) {
                warnings.warn(line, "operands to '!' out of range");
                0.0
            } else {
                ((a as u32) | (b as u32)) as f64
            }
        }
        BitXor => {
            if !in_bitwise_range(a) || !in_bitwise_range(b) {
                warnings.warn(line, "operands to 'EXOR' out of range");
                0.0
            } else {
                ((a as u32) ^ (b as u32)) as f64
            }
        }
        Eq => bool_to_num(a == b),
        Ne => bool_to_num(a != b),
        Lt => bool_to_num(a < b),
        Gt => bool_to_num(a > b),
        Le => bool_to_num(a <= b),
        Ge => bool_to_num(a >= b),
        And => bool_to_num(a != 0.0 && b != 0.0),
        Or => bool_to_num(a != 0.0 || b != 0.0),
        _ => return None,
    })
}

fn bool_to_num(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn fold_idiv(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        f64::INFINITY.copysign(a)
    } else {
        (a as i64 / b as i64) as f64
    }
}

fn fold_string_cmp(tok: Token, a: &[u8], b: &[u8]) -> Option<f64> {
    use Token::*;
    Some(match tok {
        Eq => bool_to_num(a == b),
        Ne => bool_to_num(a != b),
        Lt => bool_to_num(a < b),
        Gt => bool_to_num(a > b),
        Le => bool_to_num(a <= b),
        Ge => bool_to_num(a >= b),
        _ => return None,
    })
}

fn fold_intrinsic(tok: Token, arg: &Expr, line: u32, warnings: &mut Bag) -> Option<Expr> {
    use Token::*;
    match (tok, arg) {
        (ChrStr, Expr::ConstNumber(n)) => Some(Expr::ConstString(vec![*n as u8])),
        (Len, Expr::ConstString(s)) => Some(Expr::ConstNumber(s.len() as f64)),
        (Asc, Expr::ConstString(s)) => Some(Expr::ConstNumber(*s.first().unwrap_or(&0) as f64)),
        (Dec, Expr::ConstString(s)) => {
            let text = String::from_utf8_lossy(s);
            Some(Expr::ConstNumber(text.trim().parse::<f64>().unwrap_or(0.0)))
        }
        (Int, Expr::ConstNumber(n)) => Some(Expr::ConstNumber(n.floor())),
        (Trunc, Expr::ConstNumber(n)) => Some(Expr::ConstNumber(n.trunc())),
        (Frac, Expr::ConstNumber(n)) => Some(Expr::ConstNumber(n.fract())),
        (Abs, Expr::ConstNumber(n)) => Some(Expr::ConstNumber(n.abs())),
        (Sgn, Expr::ConstNumber(n)) => Some(Expr::ConstNumber(if *n > 0.0 { 1.0 } else if *n < 0.0 { -1.0 } else { 0.0 })),
        (Sqr, Expr::ConstNumber(n)) => {
            if *n < 0.0 {
                warnings.warn(line, "at 'SQR', argument < 0");
            }
            Some(Expr::ConstNumber(n.abs().sqrt()))
        }
        (Log, Expr::ConstNumber(n)) => {
            if *n <= 0.0 {
                warnings.warn(line, "at 'LOG', argument <= 0");
            }
            Some(Expr::ConstNumber(n.ln()))
        }
        (Clog, Expr::ConstNumber(n)) => {
            if *n <= 0.0 {
                warnings.warn(line, "at 'CLOG', argument <= 0");
            }
            Some(Expr::ConstNumber(n.log10()))
        }
        (Exp, Expr::ConstNumber(n)) => Some(Expr::ConstNumber(n.exp())),
        (Not, Expr::ConstNumber(n)) => Some(Expr::ConstNumber(bool_to_num(*n == 0.0))),
        (UPlus, _) | (UMinus, Expr::ConstNumber(_)) => None,
        _ => None,
    }
}

/// Folds one pass over every node in the arena; returns whether any
/// node changed so the driver can iterate to a fixpoint.
pub fn run(exprs: &mut ExprArena, warnings: &mut Bag) -> bool {
    let mut changed = false;
    for i in 0..exprs.len() {
        let id = ExprId(i as u32);
        let line = exprs.line_of(id);
        let folded = match exprs.get(id).clone() {
            Expr::Unary(Token::UPlus, a) => Some(exprs.get(a).clone()),
            Expr::Unary(Token::UMinus, a) => match exprs.get(a) {
                Expr::ConstNumber(n) => Some(Expr::ConstNumber(-n)),
                _ => None,
            },
            Expr::Unary(tok, a) => fold_intrinsic(tok, exprs.get(a), line, warnings),
            Expr::Binary(tok, a, b) => match (exprs.get(a).clone(), exprs.get(b).clone()) {
                (Expr::ConstNumber(x), Expr::ConstNumber(y)) if matches!(tok, Token::IDiv) => {
                    Some(Expr::ConstNumber(fold_idiv(x, y)))
                }
                (Expr::ConstNumber(x), Expr::ConstNumber(y)) => {
                    fold_numeric(tok, x, y, line, warnings).map(Expr::ConstNumber)
                }
                (Expr::ConstString(x), Expr::ConstString(y)) => {
                    fold_string_cmp(tok, &x, &y).map(Expr::ConstNumber)
                }
                _ => None,
            },
            _ => None,
        };
        if let Some(new_node) = folded {
            *exprs.get_mut(id) = new_node;
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_arithmetic_chain() {
        let mut a = ExprArena::new();
        let mut warnings = Bag::new("t.bas");
        let one = a.alloc(Expr::ConstNumber(1.0), 1);
        let two = a.alloc(Expr::ConstNumber(2.0), 1);
        let three = a.alloc(Expr::ConstNumber(3.0), 1);
        let mul = a.alloc(Expr::Binary(Token::Mul, two, three), 1);
        let add = a.alloc(Expr::Binary(Token::Add, one, mul), 1);
        let lastone = a.alloc(Expr::ConstNumber(1.0), 1);
        let sub = a.alloc(Expr::Binary(Token::Sub, add, lastone), 1);
        while run(&mut a, &mut warnings) {}
        assert_eq!(a.as_number(sub), Some(6.0));
    }

    #[test]
    fn bitwise_out_of_range_warns_and_folds_to_zero() {
        let mut a = ExprArena::new();
        let mut warnings = Bag::new("t.bas");
        let x = a.alloc(Expr::ConstNumber(-1.0), 1);
        let y = a.alloc(Expr::ConstNumber(1.0), 1);
        let and = a.alloc(Expr::Binary(Token::BitAnd, x, y), 1);
        run(&mut a, &mut warnings);
        assert_eq!(a.as_number(and), Some(0.0));
        assert!(!warnings.warnings().is_empty());
    }
}
