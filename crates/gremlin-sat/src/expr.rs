//! Tseitin expression layer
//!
//! Gate constructors over the clause interface, with structural caching so
//! repeated sub-expressions share literals. Vector helpers cover the word
//! operations the netlist encoder needs: bitwise logic, muxing, equality,
//! adders, comparisons, shifters, multiplication and division.

use crate::solver::{Lit, Solver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum GateKey {
    And(Lit, Lit),
    Xor(Lit, Lit),
    Ite(Lit, Lit, Lit),
}

fn ordered(a: Lit, b: Lit) -> (Lit, Lit) {
    if (a.var().index(), a.is_negative()) <= (b.var().index(), b.is_negative()) {
        (a, b)
    } else {
        (b, a)
    }
}

impl Solver {
    pub fn not(&mut self, a: Lit) -> Lit {
        !a
    }

    pub fn and(&mut self, a: Lit, b: Lit) -> Lit {
        let t = self.const_true();
        let f = !t;
        if a == f || b == f {
            return f;
        }
        if a == t {
            return b;
        }
        if b == t {
            return a;
        }
        if a == b {
            return a;
        }
        if a == !b {
            return f;
        }
        let (a, b) = ordered(a, b);
        if let Some(&y) = self.gate_cache.get(&GateKey::And(a, b)) {
            return y;
        }
        let y = self.literal();
        self.add_clause(&[!y, a]);
        self.add_clause(&[!y, b]);
        self.add_clause(&[y, !a, !b]);
        self.gate_cache.insert(GateKey::And(a, b), y);
        y
    }

    pub fn or(&mut self, a: Lit, b: Lit) -> Lit {
        !self.and(!a, !b)
    }

    pub fn xor(&mut self, a: Lit, b: Lit) -> Lit {
        let t = self.const_true();
        let f = !t;
        if a == f {
            return b;
        }
        if a == t {
            return !b;
        }
        if b == f {
            return a;
        }
        if b == t {
            return !a;
        }
        if a == b {
            return f;
        }
        if a == !b {
            return t;
        }
        let (a, b) = ordered(a, b);
        if let Some(&y) = self.gate_cache.get(&GateKey::Xor(a, b)) {
            return y;
        }
        let y = self.literal();
        self.add_clause(&[!y, a, b]);
        self.add_clause(&[!y, !a, !b]);
        self.add_clause(&[y, !a, b]);
        self.add_clause(&[y, a, !b]);
        self.gate_cache.insert(GateKey::Xor(a, b), y);
        y
    }

    pub fn iff(&mut self, a: Lit, b: Lit) -> Lit {
        !self.xor(a, b)
    }

    /// s ? a : b
    pub fn ite(&mut self, s: Lit, a: Lit, b: Lit) -> Lit {
        let t = self.const_true();
        let f = !t;
        if s == t {
            return a;
        }
        if s == f {
            return b;
        }
        if a == b {
            return a;
        }
        if let Some(&y) = self.gate_cache.get(&GateKey::Ite(s, a, b)) {
            return y;
        }
        let y = self.literal();
        self.add_clause(&[!s, !a, y]);
        self.add_clause(&[!s, a, !y]);
        self.add_clause(&[s, !b, y]);
        self.add_clause(&[s, b, !y]);
        self.gate_cache.insert(GateKey::Ite(s, a, b), y);
        y
    }

    pub fn expression_and(&mut self, lits: &[Lit]) -> Lit {
        let mut acc = self.const_true();
        for &l in lits {
            acc = self.and(acc, l);
        }
        acc
    }

    pub fn expression_or(&mut self, lits: &[Lit]) -> Lit {
        let mut acc = self.const_false();
        for &l in lits {
            acc = self.or(acc, l);
        }
        acc
    }

    // --- vector helpers ---

    pub fn vec_const(&mut self, value: u64, width: usize) -> Vec<Lit> {
        let t = self.const_true();
        (0..width)
            .map(|i| if (value >> i) & 1 == 1 { t } else { !t })
            .collect()
    }

    pub fn vec_literals(&mut self, width: usize) -> Vec<Lit> {
        (0..width).map(|_| self.literal()).collect()
    }

    pub fn vec_not(&mut self, a: &[Lit]) -> Vec<Lit> {
        a.iter().map(|&x| !x).collect()
    }

    pub fn vec_and(&mut self, a: &[Lit], b: &[Lit]) -> Vec<Lit> {
        debug_assert_eq!(a.len(), b.len());
        a.iter().zip(b).map(|(&x, &y)| self.and(x, y)).collect()
    }

    pub fn vec_or(&mut self, a: &[Lit], b: &[Lit]) -> Vec<Lit> {
        debug_assert_eq!(a.len(), b.len());
        a.iter().zip(b).map(|(&x, &y)| self.or(x, y)).collect()
    }

    pub fn vec_xor(&mut self, a: &[Lit], b: &[Lit]) -> Vec<Lit> {
        debug_assert_eq!(a.len(), b.len());
        a.iter().zip(b).map(|(&x, &y)| self.xor(x, y)).collect()
    }

    pub fn vec_iff(&mut self, a: &[Lit], b: &[Lit]) -> Vec<Lit> {
        debug_assert_eq!(a.len(), b.len());
        a.iter().zip(b).map(|(&x, &y)| self.iff(x, y)).collect()
    }

    /// s ? a : b, bitwise
    pub fn vec_ite(&mut self, s: Lit, a: &[Lit], b: &[Lit]) -> Vec<Lit> {
        debug_assert_eq!(a.len(), b.len());
        a.iter().zip(b).map(|(&x, &y)| self.ite(s, x, y)).collect()
    }

    pub fn vec_eq(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let bits = self.vec_iff(a, b);
        self.expression_and(&bits)
    }

    pub fn vec_reduce_and(&mut self, a: &[Lit]) -> Lit {
        self.expression_and(a)
    }

    pub fn vec_reduce_or(&mut self, a: &[Lit]) -> Lit {
        self.expression_or(a)
    }

    pub fn vec_reduce_xor(&mut self, a: &[Lit]) -> Lit {
        let mut acc = self.const_false();
        for &l in a {
            acc = self.xor(acc, l);
        }
        acc
    }

    /// Ripple-carry addition; result has the width of the operands, carry-out
    /// is returned separately.
    pub fn vec_add_carry(&mut self, a: &[Lit], b: &[Lit], carry_in: Lit) -> (Vec<Lit>, Lit) {
        debug_assert_eq!(a.len(), b.len());
        let mut carry = carry_in;
        let mut sum = Vec::with_capacity(a.len());
        for (&x, &y) in a.iter().zip(b) {
            let x_xor_y = self.xor(x, y);
            sum.push(self.xor(x_xor_y, carry));
            let x_and_y = self.and(x, y);
            let c_and_xor = self.and(carry, x_xor_y);
            carry = self.or(x_and_y, c_and_xor);
        }
        (sum, carry)
    }

    pub fn vec_add(&mut self, a: &[Lit], b: &[Lit]) -> Vec<Lit> {
        let f = self.const_false();
        self.vec_add_carry(a, b, f).0
    }

    pub fn vec_sub(&mut self, a: &[Lit], b: &[Lit]) -> Vec<Lit> {
        let t = self.const_true();
        let nb = self.vec_not(b);
        self.vec_add_carry(a, &nb, t).0
    }

    /// Unsigned a < b via the borrow chain.
    pub fn vec_lt_unsigned(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        debug_assert_eq!(a.len(), b.len());
        let mut borrow = self.const_false();
        for (&x, &y) in a.iter().zip(b) {
            let not_x_and_y = self.and(!x, y);
            let x_iff_y = self.iff(x, y);
            let keep = self.and(borrow, x_iff_y);
            borrow = self.or(not_x_and_y, keep);
        }
        borrow
    }

    /// Signed a < b: flip the sign bits and compare unsigned.
    pub fn vec_lt_signed(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        debug_assert!(!a.is_empty());
        let mut a = a.to_vec();
        let mut b = b.to_vec();
        let an = a.len();
        let bn = b.len();
        a[an - 1] = !a[an - 1];
        b[bn - 1] = !b[bn - 1];
        self.vec_lt_unsigned(&a, &b)
    }

    pub fn vec_lt(&mut self, a: &[Lit], b: &[Lit], signed: bool) -> Lit {
        if signed {
            self.vec_lt_signed(a, b)
        } else {
            self.vec_lt_unsigned(a, b)
        }
    }

    /// Two's complement negation.
    pub fn vec_neg(&mut self, a: &[Lit]) -> Vec<Lit> {
        let zero = self.vec_const(0, a.len());
        self.vec_sub(&zero, a)
    }

    /// Barrel shifter: shift `a` right by unsigned `b`, shifting in `fill`.
    /// With `left` the direction is reversed.
    pub fn vec_shift_unsigned(&mut self, a: &[Lit], b: &[Lit], left: bool, fill: Lit) -> Vec<Lit> {
        let width = a.len();
        let mut cur = a.to_vec();
        for (stage, &sel) in b.iter().enumerate() {
            let amount = 1usize.checked_shl(stage as u32).unwrap_or(usize::MAX);
            let shifted: Vec<Lit> = (0..width)
                .map(|i| {
                    let src = if left { i.checked_sub(amount) } else { i.checked_add(amount) };
                    match src {
                        Some(j) if j < width => cur[j],
                        _ => fill,
                    }
                })
                .collect();
            cur = self.vec_ite(sel, &shifted, &cur);
        }
        cur
    }

    /// Restoring long division; returns (quotient, remainder). Division by
    /// zero yields all-ones quotient and `a` as remainder; the encoder
    /// overrides that case according to its configuration.
    pub fn vec_divmod_unsigned(&mut self, a: &[Lit], b: &[Lit]) -> (Vec<Lit>, Vec<Lit>) {
        debug_assert_eq!(a.len(), b.len());
        let width = a.len();
        let f = self.const_false();
        let mut rem = vec![f; width];
        let mut quot = vec![f; width];
        for i in (0..width).rev() {
            // rem = (rem << 1) | a[i]
            let mut shifted = Vec::with_capacity(width);
            shifted.push(a[i]);
            shifted.extend_from_slice(&rem[..width - 1]);
            rem = shifted;
            let lt = self.vec_lt_unsigned(&rem, b);
            let ge = !lt;
            let diff = self.vec_sub(&rem, b);
            rem = self.vec_ite(ge, &diff, &rem);
            quot[i] = ge;
        }
        (quot, rem)
    }

    /// Shift-and-add multiplication truncated to the operand width.
    pub fn vec_mul(&mut self, a: &[Lit], b: &[Lit]) -> Vec<Lit> {
        debug_assert_eq!(a.len(), b.len());
        let width = a.len();
        let f = self.const_false();
        let mut acc = vec![f; width];
        for i in 0..width {
            let mut addend = vec![f; width];
            for j in 0..width - i {
                addend[i + j] = self.and(a[j], b[i]);
            }
            acc = self.vec_add(&acc, &addend);
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolveResult;

    fn assert_model_eq(solver: &mut Solver, vec: &[Lit], expect: u64) {
        assert_eq!(solver.solve(&[]).unwrap(), SolveResult::Sat);
        let mut got = 0u64;
        for (i, &l) in vec.iter().enumerate() {
            if solver.model_value(l) {
                got |= 1 << i;
            }
        }
        assert_eq!(got, expect);
    }

    #[test]
    fn test_and_or_cache() {
        let mut s = Solver::new();
        let a = s.literal();
        let b = s.literal();
        let y1 = s.and(a, b);
        let y2 = s.and(b, a);
        assert_eq!(y1, y2);
        s.assume(a);
        s.assume(b);
        s.assume(y1);
        assert_eq!(s.solve(&[]).unwrap(), SolveResult::Sat);
    }

    #[test]
    fn test_ite_semantics() {
        let mut s = Solver::new();
        let sel = s.literal();
        let a = s.literal();
        let b = s.literal();
        let y = s.ite(sel, a, b);
        s.assume(sel);
        s.assume(!a);
        s.assume(b);
        assert_eq!(s.solve(&[y]).unwrap(), SolveResult::Unsat);
        assert_eq!(s.solve(&[!y]).unwrap(), SolveResult::Sat);
    }

    #[test]
    fn test_vec_add() {
        let mut s = Solver::new();
        let a = s.vec_const(11, 8);
        let b = s.vec_const(23, 8);
        let y = s.vec_add(&a, &b);
        assert_model_eq(&mut s, &y, 34);
    }

    #[test]
    fn test_vec_sub_wraps() {
        let mut s = Solver::new();
        let a = s.vec_const(3, 4);
        let b = s.vec_const(5, 4);
        let y = s.vec_sub(&a, &b);
        assert_model_eq(&mut s, &y, 14); // 3 - 5 mod 16
    }

    #[test]
    fn test_vec_lt() {
        let mut s = Solver::new();
        let a = s.vec_const(3, 4);
        let b = s.vec_const(5, 4);
        let lt = s.vec_lt_unsigned(&a, &b);
        let gt = s.vec_lt_unsigned(&b, &a);
        s.assume(lt);
        s.assume(!gt);
        assert_eq!(s.solve(&[]).unwrap(), SolveResult::Sat);
        // signed: 0b1101 (-3) < 0b0101 (5)
        let sa = s.vec_const(0b1101, 4);
        let sb = s.vec_const(0b0101, 4);
        let slt = s.vec_lt_signed(&sa, &sb);
        s.assume(slt);
        assert_eq!(s.solve(&[]).unwrap(), SolveResult::Sat);
    }

    #[test]
    fn test_vec_shift() {
        let mut s = Solver::new();
        let a = s.vec_const(0b1100, 4);
        let b = s.vec_const(2, 2);
        let f = s.const_false();
        let right = s.vec_shift_unsigned(&a, &b, false, f);
        assert_model_eq(&mut s, &right, 0b0011);
        let left = s.vec_shift_unsigned(&a, &b, true, f);
        assert_model_eq(&mut s, &left, 0b0000);
        let c = s.vec_const(1, 2);
        let left1 = s.vec_shift_unsigned(&a, &c, true, f);
        assert_model_eq(&mut s, &left1, 0b1000);
    }

    #[test]
    fn test_vec_mul_divmod() {
        let mut s = Solver::new();
        let a = s.vec_const(6, 8);
        let b = s.vec_const(7, 8);
        let y = s.vec_mul(&a, &b);
        assert_model_eq(&mut s, &y, 42);

        let n = s.vec_const(43, 8);
        let d = s.vec_const(5, 8);
        let (q, r) = s.vec_divmod_unsigned(&n, &d);
        assert_model_eq(&mut s, &q, 8);
        assert_model_eq(&mut s, &r, 3);
    }
}
