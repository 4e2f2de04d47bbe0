//! Bit-level signal values
//!
//! A `SigBit` is either a constant `State` or one bit of a wire. A `SigSpec`
//! is an ordered bit vector (index 0 = LSB) supporting concatenation,
//! slicing, equality and substitution. A `Const` is a pure constant vector
//! and is also used for selector patterns, where `State::Sa` means
//! don't-care.

use crate::module::WireId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Constant bit state. `Sx` is undefined, `Sz` is high-impedance, `Sa` is
/// don't-care (only meaningful inside patterns and parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    S0,
    S1,
    Sx,
    Sz,
    Sa,
}

impl State {
    pub fn from_bool(b: bool) -> Self {
        if b {
            State::S1
        } else {
            State::S0
        }
    }

    /// True for `S0` and `S1`.
    pub fn is_defined(&self) -> bool {
        matches!(self, State::S0 | State::S1)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            State::S0 => Some(false),
            State::S1 => Some(true),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            State::S0 => '0',
            State::S1 => '1',
            State::Sx => 'x',
            State::Sz => 'z',
            State::Sa => '-',
        }
    }
}

/// A constant bit vector, LSB first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Const(pub Vec<State>);

impl Const {
    pub fn new(value: u64, width: usize) -> Self {
        Const((0..width).map(|i| State::from_bool((value >> i) & 1 == 1)).collect())
    }

    pub fn zero(width: usize) -> Self {
        Const(vec![State::S0; width])
    }

    pub fn undef(width: usize) -> Self {
        Const(vec![State::Sx; width])
    }

    pub fn dont_care(width: usize) -> Self {
        Const(vec![State::Sa; width])
    }

    pub fn from_states(states: Vec<State>) -> Self {
        Const(states)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bits(&self) -> &[State] {
        &self.0
    }

    pub fn bits_mut(&mut self) -> &mut Vec<State> {
        &mut self.0
    }

    pub fn is_fully_def(&self) -> bool {
        self.0.iter().all(|b| b.is_defined())
    }

    pub fn is_fully_undef(&self) -> bool {
        self.0.iter().all(|b| matches!(b, State::Sx))
    }

    /// Value as u64, defined bits only; `None` if any bit is not 0/1 or the
    /// vector is wider than 64 bits.
    pub fn as_u64(&self) -> Option<u64> {
        if self.0.len() > 64 {
            return None;
        }
        let mut v = 0u64;
        for (i, b) in self.0.iter().enumerate() {
            match b.as_bool() {
                Some(true) => v |= 1 << i,
                Some(false) => {}
                None => return None,
            }
        }
        Some(v)
    }

    pub fn as_bool(&self) -> bool {
        self.0.iter().any(|b| matches!(b, State::S1))
    }

    /// Extend to `width` with `fill` (truncates if narrower).
    pub fn extended(&self, width: usize, fill: State) -> Const {
        let mut bits = self.0.clone();
        bits.resize(width, fill);
        Const(bits)
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // MSB first, matching the textual netlist format
        for b in self.0.iter().rev() {
            write!(f, "{}", b.to_char())?;
        }
        Ok(())
    }
}

/// One signal bit: a constant or one bit of a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigBit {
    Const(State),
    Wire { wire: WireId, offset: u32 },
}

impl SigBit {
    pub fn wire(wire: WireId, offset: u32) -> Self {
        SigBit::Wire { wire, offset }
    }

    pub fn is_wire(&self) -> bool {
        matches!(self, SigBit::Wire { .. })
    }

    pub fn as_state(&self) -> Option<State> {
        match self {
            SigBit::Const(s) => Some(*s),
            SigBit::Wire { .. } => None,
        }
    }
}

impl From<State> for SigBit {
    fn from(s: State) -> Self {
        SigBit::Const(s)
    }
}

/// A contiguous run of bits, either constant or one wire slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigChunk {
    Const(Const),
    Wire { wire: WireId, offset: u32, len: u32 },
}

impl SigChunk {
    pub fn len(&self) -> usize {
        match self {
            SigChunk::Const(c) => c.len(),
            SigChunk::Wire { len, .. } => *len as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_wire(&self) -> bool {
        matches!(self, SigChunk::Wire { .. })
    }

    pub fn to_sig(&self) -> SigSpec {
        match self {
            SigChunk::Const(c) => SigSpec::from_const(c),
            SigChunk::Wire { wire, offset, len } => {
                SigSpec((0..*len).map(|i| SigBit::wire(*wire, offset + i)).collect())
            }
        }
    }
}

/// An ordered signal bit vector, LSB first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigSpec(pub Vec<SigBit>);

impl SigSpec {
    pub fn new() -> Self {
        SigSpec(Vec::new())
    }

    pub fn from_bit(bit: SigBit) -> Self {
        SigSpec(vec![bit])
    }

    pub fn from_const(c: &Const) -> Self {
        SigSpec(c.bits().iter().map(|s| SigBit::Const(*s)).collect())
    }

    pub fn from_state(s: State, width: usize) -> Self {
        SigSpec(vec![SigBit::Const(s); width])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bits(&self) -> &[SigBit] {
        &self.0
    }

    pub fn bit(&self, i: usize) -> SigBit {
        self.0[i]
    }

    pub fn push(&mut self, bit: SigBit) {
        self.0.push(bit);
    }

    pub fn append(&mut self, other: &SigSpec) {
        self.0.extend_from_slice(&other.0);
    }

    pub fn extract(&self, offset: usize, len: usize) -> SigSpec {
        SigSpec(self.0[offset..offset + len].to_vec())
    }

    pub fn contains(&self, bit: &SigBit) -> bool {
        self.0.contains(bit)
    }

    /// The bits of `self` that also occur in `other`, in `self` order.
    pub fn intersect(&self, other: &SigSpec) -> SigSpec {
        SigSpec(self.0.iter().filter(|b| other.contains(b)).copied().collect())
    }

    /// Position of `bit` within `self`, if present.
    pub fn find(&self, bit: &SigBit) -> Option<usize> {
        self.0.iter().position(|b| b == bit)
    }

    /// Substitute in place: wherever a bit of `self` equals a wire bit of
    /// `pattern`, take the bit at the same position from `with`.
    pub fn replace(&mut self, pattern: &SigSpec, with: &SigSpec) {
        debug_assert_eq!(pattern.len(), with.len());
        let map: HashMap<SigBit, SigBit> = pattern
            .0
            .iter()
            .zip(with.0.iter())
            .filter(|(p, _)| p.is_wire())
            .map(|(p, w)| (*p, *w))
            .collect();
        for bit in self.0.iter_mut() {
            if let Some(repl) = map.get(bit) {
                *bit = *repl;
            }
        }
    }

    /// Substitute into `other`: wherever a bit of `self` equals a wire bit of
    /// `pattern`, set the bit at that *position* of `other` from `with`.
    /// `self` and `other` must have the same length.
    pub fn replace_into(&self, pattern: &SigSpec, with: &SigSpec, other: &mut SigSpec) {
        debug_assert_eq!(pattern.len(), with.len());
        debug_assert_eq!(self.len(), other.len());
        let map: HashMap<SigBit, SigBit> = pattern
            .0
            .iter()
            .zip(with.0.iter())
            .filter(|(p, _)| p.is_wire())
            .map(|(p, w)| (*p, *w))
            .collect();
        for (i, bit) in self.0.iter().enumerate() {
            if let Some(repl) = map.get(bit) {
                other.0[i] = *repl;
            }
        }
    }

    /// Zero- or sign-extend to `width` (truncates if wider).
    pub fn extend_u0(&mut self, width: usize, signed: bool) {
        if self.0.len() > width {
            self.0.truncate(width);
            return;
        }
        let fill = if signed && !self.0.is_empty() {
            *self.0.last().unwrap()
        } else {
            SigBit::Const(State::S0)
        };
        while self.0.len() < width {
            self.0.push(fill);
        }
    }

    pub fn is_fully_const(&self) -> bool {
        self.0.iter().all(|b| !b.is_wire())
    }

    pub fn is_fully_def(&self) -> bool {
        self.0
            .iter()
            .all(|b| matches!(b, SigBit::Const(s) if s.is_defined()))
    }

    pub fn is_fully_undef(&self) -> bool {
        self.0.iter().all(|b| matches!(b, SigBit::Const(State::Sx)))
    }

    pub fn as_const(&self) -> Option<Const> {
        let mut states = Vec::with_capacity(self.0.len());
        for b in &self.0 {
            states.push(b.as_state()?);
        }
        Some(Const(states))
    }

    /// Whole-wire check: all bits belong to one wire in ascending offset
    /// order starting at 0 (the caller must still check the wire's width).
    pub fn as_wire(&self) -> Option<WireId> {
        let first = match self.0.first() {
            Some(SigBit::Wire { wire, offset: 0 }) => *wire,
            _ => return None,
        };
        for (i, b) in self.0.iter().enumerate() {
            match b {
                SigBit::Wire { wire, offset } if *wire == first && *offset as usize == i => {}
                _ => return None,
            }
        }
        Some(first)
    }

    pub fn remove_const(&mut self) {
        self.0.retain(|b| b.is_wire());
    }

    /// Deduplicate bits, keeping the first occurrence of each. Used to
    /// canonicalize selector vectors; order-preserving so results are
    /// deterministic.
    pub fn unify(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.0.retain(|b| seen.insert(*b));
    }

    /// Decompose into maximal contiguous chunks.
    pub fn chunks(&self) -> Vec<SigChunk> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < self.0.len() {
            match self.0[i] {
                SigBit::Const(s) => {
                    let mut c = vec![s];
                    i += 1;
                    while i < self.0.len() {
                        if let SigBit::Const(s2) = self.0[i] {
                            c.push(s2);
                            i += 1;
                        } else {
                            break;
                        }
                    }
                    out.push(SigChunk::Const(Const(c)));
                }
                SigBit::Wire { wire, offset } => {
                    let mut len = 1;
                    i += 1;
                    while i < self.0.len() {
                        match self.0[i] {
                            SigBit::Wire { wire: w2, offset: o2 }
                                if w2 == wire && o2 == offset + len =>
                            {
                                len += 1;
                                i += 1;
                            }
                            _ => break,
                        }
                    }
                    out.push(SigChunk::Wire { wire, offset, len });
                }
            }
        }
        out
    }
}

impl From<SigBit> for SigSpec {
    fn from(bit: SigBit) -> Self {
        SigSpec::from_bit(bit)
    }
}

impl From<&Const> for SigSpec {
    fn from(c: &Const) -> Self {
        SigSpec::from_const(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wbit(w: u32, o: u32) -> SigBit {
        SigBit::wire(WireId(w), o)
    }

    #[test]
    fn test_const_roundtrip() {
        let c = Const::new(0b1010, 4);
        assert_eq!(c.as_u64(), Some(10));
        assert!(c.is_fully_def());
        assert_eq!(c.to_string(), "1010");
    }

    #[test]
    fn test_sigspec_concat_slice() {
        let mut s = SigSpec::from_const(&Const::new(0b01, 2));
        s.append(&SigSpec::from_bit(wbit(3, 0)));
        assert_eq!(s.len(), 3);
        let hi = s.extract(2, 1);
        assert_eq!(hi.bit(0), wbit(3, 0));
    }

    #[test]
    fn test_replace_in_place() {
        let mut s = SigSpec(vec![wbit(1, 0), wbit(2, 0), SigBit::Const(State::S1)]);
        let pattern = SigSpec(vec![wbit(2, 0)]);
        let with = SigSpec(vec![SigBit::Const(State::S0)]);
        s.replace(&pattern, &with);
        assert_eq!(s.bit(1), SigBit::Const(State::S0));
        assert_eq!(s.bit(0), wbit(1, 0));
    }

    #[test]
    fn test_replace_into_positions() {
        let layout = SigSpec(vec![wbit(1, 0), wbit(1, 1)]);
        let mut other = layout.clone();
        let pattern = SigSpec(vec![wbit(1, 1)]);
        let with = SigSpec(vec![SigBit::Const(State::S1)]);
        layout.replace_into(&pattern, &with, &mut other);
        assert_eq!(other.bit(0), wbit(1, 0));
        assert_eq!(other.bit(1), SigBit::Const(State::S1));
    }

    #[test]
    fn test_chunks() {
        let s = SigSpec(vec![
            wbit(1, 0),
            wbit(1, 1),
            SigBit::Const(State::S0),
            SigBit::Const(State::S1),
            wbit(2, 4),
        ]);
        let chunks = s.chunks();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], SigChunk::Wire { wire: WireId(1), offset: 0, len: 2 });
        assert_eq!(chunks[1], SigChunk::Const(Const::new(0b10, 2)));
        assert_eq!(chunks[2], SigChunk::Wire { wire: WireId(2), offset: 4, len: 1 });
    }

    #[test]
    fn test_extend_u0() {
        let mut s = SigSpec::from_const(&Const::new(0b11, 2));
        s.extend_u0(4, false);
        assert_eq!(s.as_const().unwrap().as_u64(), Some(3));
        let mut t = SigSpec::from_const(&Const::new(0b10, 2));
        t.extend_u0(4, true);
        assert_eq!(t.as_const().unwrap().as_u64(), Some(0b1110));
    }

    #[test]
    fn test_as_wire() {
        let s = SigSpec(vec![wbit(5, 0), wbit(5, 1), wbit(5, 2)]);
        assert_eq!(s.as_wire(), Some(WireId(5)));
        let t = SigSpec(vec![wbit(5, 1), wbit(5, 2)]);
        assert_eq!(t.as_wire(), None);
    }
}
