//! Driver and user maps over a canonicalizing view
//!
//! Bits are mapped through the module's `SigMap` before insertion and
//! lookup, so aliased signals resolve to the same entries.

use gremlin_ir::{CellId, Module, SigBit, SigMap, SigSpec};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Map from canonical signal bits to the cell ports touching them.
pub(crate) struct PortMap {
    map: HashMap<SigBit, Vec<(CellId, String)>>,
}

impl PortMap {
    /// Cell output ports (unknown cell types contribute every port, since
    /// their directions are not known).
    pub fn drivers(module: &Module, sigmap: &SigMap) -> Self {
        Self::build(module, sigmap, true)
    }

    /// Cell input ports (again, unknown cell types contribute every port).
    pub fn users(module: &Module, sigmap: &SigMap) -> Self {
        Self::build(module, sigmap, false)
    }

    fn build(module: &Module, sigmap: &SigMap, outputs: bool) -> Self {
        let mut map: HashMap<SigBit, Vec<(CellId, String)>> = HashMap::new();
        for cell in module.cells() {
            for (port, sig) in &cell.connections {
                let wanted = if outputs {
                    cell.ty.is_output_port(port) || !cell.ty.is_known()
                } else {
                    cell.ty.is_input_port(port) || !cell.ty.is_known()
                };
                if !wanted {
                    continue;
                }
                let mapped = sigmap.apply(sig);
                for bit in mapped.bits() {
                    if bit.is_wire() {
                        map.entry(*bit).or_default().push((cell.id, port.clone()));
                    }
                }
            }
        }
        PortMap { map }
    }

    /// All (cell, port) entries touching any bit of `sig` (already
    /// canonicalized by the caller), deduplicated and in cell-ID order.
    pub fn find(&self, sig: &SigSpec) -> Vec<(CellId, String)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for bit in sig.bits() {
            if let Some(entries) = self.map.get(bit) {
                for entry in entries {
                    if seen.insert(entry.clone()) {
                        out.push(entry.clone());
                    }
                }
            }
        }
        out.sort();
        out
    }
}

/// Map from canonical bits to driving cells, for the expander's worklist.
pub(crate) struct CellDriverMap {
    map: HashMap<SigBit, BTreeSet<CellId>>,
}

impl CellDriverMap {
    pub fn new() -> Self {
        CellDriverMap { map: HashMap::new() }
    }

    pub fn insert(&mut self, sig: &SigSpec, cell: CellId) {
        for bit in sig.bits() {
            if bit.is_wire() {
                self.map.entry(*bit).or_default().insert(cell);
            }
        }
    }

    pub fn find(&self, sig: &SigSpec) -> BTreeSet<CellId> {
        let mut out = BTreeSet::new();
        for bit in sig.bits() {
            if let Some(cells) = self.map.get(bit) {
                out.extend(cells.iter().copied());
            }
        }
        out
    }
}

/// The set of canonical bits that touch a module port.
pub(crate) fn port_bits(module: &Module, sigmap: &SigMap) -> HashSet<SigBit> {
    let mut set = HashSet::new();
    for wire in module.wires() {
        if wire.is_port() {
            let sig = sigmap.apply(&module.wire_sig(wire.id));
            set.extend(sig.bits().iter().copied());
        }
    }
    set
}

pub(crate) fn any_at_port(port_bits: &HashSet<SigBit>, sig: &SigSpec) -> bool {
    sig.bits().iter().any(|b| port_bits.contains(b))
}
