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

//! Small-integer token substitution: numeric constants equal to
//! 0, 1, 2 or 3 are rewritten to `Expr::SmallInt`, which the encoder
//! emits as a single zero-byte token instead of a 6-byte BCD literal.
//! Must run after constant folding so folded results are also caught.

use crate::ir::expr::{Expr, ExprArena, ExprId};
use crate::tokens::per_token_for_small_int;

pub fn run(exprs: &mut ExprArena) -> bool {
    let mut changed = false;
    for i in 0..exprs.len() {
        let id = ExprId(i as u32);
        if let Expr::ConstNumber(n) = exprs.get(id) {
            if n.fract() == 0.0 {
                if let Some(tok) = per_token_for_small_int(*n as i64) {
                    if *n >= 0.0 {
                        *exprs.get_mut(id) = Expr::SmallInt(tok);
                        changed = true;
                    }
                }
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_small_integer_literals_only() {
        let mut a = ExprArena::new();
        let two = a.alloc(Expr::ConstNumber(2.0), 1);
        let big = a.alloc(Expr::ConstNumber(42.0), 1);
        run(&mut a);
        assert!(matches!(a.get(two), Expr::SmallInt(_)));
        assert!(matches!(a.get(big), Expr::ConstNumber(_)));
    }
}
