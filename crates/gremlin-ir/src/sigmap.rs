//! Canonicalizing view over a module's signals
//!
//! Bits connected through identity connections share one representative.
//! The view is a snapshot: it must be rebuilt after any connect/disconnect
//! on the module.

use crate::module::Module;
use crate::signal::{SigBit, SigSpec};
use indexmap::IndexMap;
use petgraph::unionfind::UnionFind;
use std::collections::HashMap;

pub struct SigMap {
    ids: IndexMap<SigBit, usize>,
    representative: HashMap<usize, SigBit>,
    uf: UnionFind<usize>,
}

impl SigMap {
    /// Build the view from the module's current connections.
    pub fn new(module: &Module) -> Self {
        let mut ids: IndexMap<SigBit, usize> = IndexMap::new();
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let mut intern = |ids: &mut IndexMap<SigBit, usize>, bit: SigBit| -> usize {
            let next = ids.len();
            *ids.entry(bit).or_insert(next)
        };
        for (target, driver) in &module.connections {
            for (t, d) in target.bits().iter().zip(driver.bits().iter()) {
                let ti = intern(&mut ids, *t);
                let di = intern(&mut ids, *d);
                pairs.push((ti, di));
            }
        }
        let mut uf = UnionFind::new(ids.len());
        for (a, b) in pairs {
            uf.union(a, b);
        }
        // Pick one representative per class: prefer a constant bit, then the
        // earliest interned bit, so results are deterministic.
        let mut representative: HashMap<usize, SigBit> = HashMap::new();
        for (bit, &idx) in ids.iter() {
            let root = uf.find(idx);
            let current = representative.get(&root).copied();
            match current {
                Some(rep) if rep.is_wire() && !bit.is_wire() => {
                    representative.insert(root, *bit);
                }
                Some(_) => {}
                None => {
                    representative.insert(root, *bit);
                }
            }
        }
        SigMap { ids, representative, uf }
    }

    pub fn apply_bit(&self, bit: SigBit) -> SigBit {
        match self.ids.get(&bit) {
            Some(&idx) => {
                let root = self.uf.find(idx);
                *self.representative.get(&root).unwrap_or(&bit)
            }
            None => bit,
        }
    }

    pub fn apply(&self, sig: &SigSpec) -> SigSpec {
        SigSpec(sig.bits().iter().map(|b| self.apply_bit(*b)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{Const, State};

    #[test]
    fn test_identity_collapse() {
        let mut m = Module::new("top");
        let a = m.add_wire("a", 2).unwrap();
        let b = m.add_wire("b", 2).unwrap();
        let sa = m.wire_sig(a);
        let sb = m.wire_sig(b);
        m.connect(sb.clone(), sa.clone()).unwrap();
        let map = SigMap::new(&m);
        assert_eq!(map.apply(&sb), map.apply(&sa));
    }

    #[test]
    fn test_const_representative() {
        let mut m = Module::new("top");
        let a = m.add_wire("a", 1).unwrap();
        let sa = m.wire_sig(a);
        m.connect(sa.clone(), SigSpec::from_const(&Const::new(1, 1))).unwrap();
        let map = SigMap::new(&m);
        assert_eq!(map.apply_bit(sa.bit(0)), SigBit::Const(State::S1));
    }

    #[test]
    fn test_unmapped_bit_is_identity() {
        let mut m = Module::new("top");
        let a = m.add_wire("a", 1).unwrap();
        let sa = m.wire_sig(a);
        let map = SigMap::new(&m);
        assert_eq!(map.apply_bit(sa.bit(0)), sa.bit(0));
    }
}
