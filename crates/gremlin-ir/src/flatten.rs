//! Hierarchy flattening
//!
//! Inlines module instances into a top module, prefixing inner names with
//! the instance path. Runs to a fixpoint so nested instances are resolved.

use crate::cell::{CellId, CellType};
use crate::design::Design;
use crate::module::{Module, WireId};
use crate::signal::{SigBit, SigSpec};
use crate::{IrError, IrResult};
use indexmap::IndexMap;
use std::collections::HashMap;

const MAX_DEPTH: usize = 64;

/// Flatten all instances inside `top`, recursively.
pub fn flatten(design: &mut Design, top: &str) -> IrResult<()> {
    for _ in 0..MAX_DEPTH {
        let inst_ids: Vec<CellId> = {
            let module = design
                .module(top)
                .ok_or_else(|| IrError::MissingModule(top.to_string()))?;
            module
                .cell_ids()
                .into_iter()
                .filter(|id| matches!(module.cell(*id).ty, CellType::Instance(_)))
                .collect()
        };
        if inst_ids.is_empty() {
            return Ok(());
        }
        for inst_id in inst_ids {
            let (inst_name, sub_name, inst_conns) = {
                let cell = design.module(top).unwrap().cell(inst_id);
                let sub = match &cell.ty {
                    CellType::Instance(m) => m.clone(),
                    _ => unreachable!(),
                };
                (cell.name.clone(), sub, cell.connections.clone())
            };
            let sub = design
                .module(&sub_name)
                .cloned()
                .ok_or_else(|| IrError::Hierarchy(format!("instance of unknown module `{sub_name}`")))?;
            let top_mod = design.module_mut(top).unwrap();
            inline(top_mod, &inst_name, &sub, &inst_conns)?;
            top_mod.remove_cell(inst_id);
            log::debug!("flattened instance `{inst_name}` of `{sub_name}`");
        }
    }
    Err(IrError::Hierarchy(format!("instantiation loop while flattening `{top}`")))
}

fn inline(
    top: &mut Module,
    inst_name: &str,
    sub: &Module,
    conns: &IndexMap<String, SigSpec>,
) -> IrResult<()> {
    let mut wire_map: HashMap<WireId, WireId> = HashMap::new();
    for w in sub.wires().collect::<Vec<_>>() {
        let new_name = format!("$flatten${}.{}", inst_name, w.name);
        let nid = match top.add_wire(&new_name, w.width) {
            Ok(id) => id,
            Err(_) => top.add_wire_auto("flatten", w.width),
        };
        let nw = top.wire_mut(nid);
        nw.init = w.init.clone();
        nw.fsm_encoding = w.fsm_encoding.clone();
        nw.buggy = w.buggy;
        nw.attributes = w.attributes.clone();
        wire_map.insert(w.id, nid);
    }

    let remap = |sig: &SigSpec, wire_map: &HashMap<WireId, WireId>| -> SigSpec {
        SigSpec(
            sig.bits()
                .iter()
                .map(|b| match b {
                    SigBit::Wire { wire, offset } => SigBit::wire(wire_map[wire], *offset),
                    c => *c,
                })
                .collect(),
        )
    };

    for cell in sub.cells().collect::<Vec<_>>() {
        let new_name = format!("$flatten${}.{}", inst_name, cell.name);
        let nid = match top.add_cell(&new_name, cell.ty.clone()) {
            Ok(id) => id,
            Err(_) => top.add_cell_auto("flatten", cell.ty.clone()),
        };
        let nc = top.cell_mut(nid);
        nc.parameters = cell.parameters.clone();
        nc.attributes = cell.attributes.clone();
        nc.buggy = cell.buggy;
        for (port, sig) in &cell.connections {
            nc.connections.insert(port.clone(), remap(sig, &wire_map));
        }
    }

    for (target, driver) in &sub.connections {
        top.connect(remap(target, &wire_map), remap(driver, &wire_map))?;
    }

    // Bind instance ports: inputs are driven from the outer signal, outputs
    // drive it.
    for (port, outer) in conns {
        let wid = sub
            .wire_by_name(port)
            .ok_or_else(|| IrError::Hierarchy(format!("`{}` has no port `{port}`", sub.name)))?;
        let w = sub.wire(wid);
        if !w.is_port() {
            return Err(IrError::Hierarchy(format!("`{}`.`{port}` is not a port", sub.name)));
        }
        let inner = top.wire_sig(wire_map[&wid]);
        let mut outer = outer.clone();
        outer.extend_u0(w.width as usize, false);
        if w.port_input {
            top.connect(inner, outer)?;
        } else {
            top.connect(outer, inner)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Const;

    #[test]
    fn test_flatten_single_instance() {
        let mut design = Design::new();

        let mut sub = Module::new("inv");
        let a = sub.add_wire("a", 1).unwrap();
        let y = sub.add_wire("y", 1).unwrap();
        sub.wire_mut(a).port_input = true;
        sub.wire_mut(y).port_output = true;
        sub.fixup_ports();
        let not = sub.add_cell("u_not", CellType::Not).unwrap();
        let sa = sub.wire_sig(a);
        let sy = sub.wire_sig(y);
        sub.cell_mut(not).set_port("A", sa);
        sub.cell_mut(not).set_port("Y", sy);
        design.add_module(sub).unwrap();

        let mut top = Module::new("top");
        let x = top.add_wire("x", 1).unwrap();
        let z = top.add_wire("z", 1).unwrap();
        let inst = top.add_cell("u0", CellType::Instance("inv".into())).unwrap();
        let sx = top.wire_sig(x);
        let sz = top.wire_sig(z);
        top.cell_mut(inst).set_port("a", sx);
        top.cell_mut(inst).set_port("y", sz);
        design.add_module(top).unwrap();

        flatten(&mut design, "top").unwrap();
        let top = design.module("top").unwrap();
        assert_eq!(top.cells().count(), 1);
        assert!(matches!(top.cells().next().unwrap().ty, CellType::Not));
        // the port bindings became identity connections
        assert_eq!(top.connections.len(), 2);
    }

    #[test]
    fn test_flatten_unknown_module_fails() {
        let mut design = Design::new();
        let mut top = Module::new("top");
        top.add_cell("u0", CellType::Instance("ghost".into())).unwrap();
        design.add_module(top).unwrap();
        assert!(flatten(&mut design, "top").is_err());
    }

    #[test]
    fn test_flatten_carries_init() {
        let mut design = Design::new();
        let mut sub = Module::new("reg1");
        let q = sub.add_wire("q", 4).unwrap();
        sub.wire_mut(q).init = Some(Const::new(3, 4));
        design.add_module(sub).unwrap();

        let mut top = Module::new("top");
        top.add_cell("u0", CellType::Instance("reg1".into())).unwrap();
        design.add_module(top).unwrap();

        flatten(&mut design, "top").unwrap();
        let top = design.module("top").unwrap();
        let flat = top.wire_by_name("$flatten$u0.q").unwrap();
        assert_eq!(top.wire(flat).init, Some(Const::new(3, 4)));
    }
}
