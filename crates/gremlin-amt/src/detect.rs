//! Candidate wire detection
//!
//! Marks wires that look like finite-state-machine state, or more generally
//! the root of a priority-mux tree: the wire is driven by exactly one
//! (priority-)mux, is not itself consumed by another mux (that would make
//! it an interior node of a larger tree), never crosses a module port, and
//! its mux cone terminates in constants or leaf signals. Marked wires get
//! `fsm_encoding = inject`; wires carrying `fsm_encoding = none` are left
//! alone.

use crate::maps::{any_at_port, port_bits, PortMap};
use gremlin_ir::{CellId, Design, FsmEncoding, Module, SigBit, SigMap, SigSpec, WireId};
use std::collections::{HashMap, HashSet};

/// Run detection over all selected modules; returns the number of marked
/// wires.
pub fn detect_design(design: &mut Design) -> usize {
    let mut marked = 0;
    for name in design.selected_modules() {
        let module = design.module_mut(&name).expect("selected module exists");
        marked += detect_module(module);
    }
    marked
}

pub fn detect_module(module: &mut Module) -> usize {
    let sigmap = SigMap::new(module);
    let drivers = PortMap::drivers(module, &sigmap);
    let users = PortMap::users(module, &sigmap);
    let at_port = port_bits(module, &sigmap);

    let mut marked = Vec::new();
    for wire_id in module.wire_ids() {
        if detect_wire(module, wire_id, &sigmap, &drivers, &users, &at_port) {
            marked.push(wire_id);
        }
    }
    for wire_id in &marked {
        log::info!(
            "found an AMT root wire {}.{}",
            module.name,
            module.wire(*wire_id).name
        );
        module.wire_mut(*wire_id).fsm_encoding = Some(FsmEncoding::Inject);
    }
    marked.len()
}

fn detect_wire(
    module: &Module,
    wire_id: WireId,
    sigmap: &SigMap,
    drivers: &PortMap,
    users: &PortMap,
    at_port: &HashSet<SigBit>,
) -> bool {
    let wire = module.wire(wire_id);
    if matches!(wire.fsm_encoding, Some(FsmEncoding::None)) {
        return false;
    }
    let sig = module.wire_sig(wire_id);
    // aliased wires are handled through their representative only
    if sigmap.apply(&sig) != sig {
        return false;
    }

    let driver_list = drivers.find(&sig);
    if driver_list.len() > 1 {
        log::debug!("wire {} has multiple drivers", wire.name);
        return false;
    }
    let Some((driver_cell, driver_port)) = driver_list.first() else {
        log::debug!("wire {} has no drivers", wire.name);
        return false;
    };
    let driver = module.cell(*driver_cell);
    if !driver.ty.is_mux() || driver_port != "Y" {
        log::debug!("wire {} is not driven by a multiplexer", wire.name);
        return false;
    }

    if !check_users(module, &sig, users, at_port) {
        log::debug!("wire {} is not the root of a multiplexer tree", wire.name);
        return false;
    }

    check_mux_tree(module, &sig, sigmap, drivers, at_port)
}

/// The root must not feed another mux (it would be an interior node) and
/// must stay inside the module.
fn check_users(module: &Module, sig: &SigSpec, users: &PortMap, at_port: &HashSet<SigBit>) -> bool {
    if any_at_port(at_port, sig) {
        return false;
    }
    for (cell_id, _) in users.find(sig) {
        if module.cell(cell_id).ty.is_mux() {
            return false;
        }
    }
    true
}

enum Classified {
    Leaf(bool),
    Mux { cells: Vec<CellId>, children: Vec<SigSpec> },
}

struct Frame {
    sig: SigSpec,
    cells: Vec<CellId>,
    children: Vec<SigSpec>,
    next: usize,
}

/// Walk the mux cone with an explicit stack; `monitor` holds the cells on
/// the current path for cycle detection.
fn check_mux_tree(
    module: &Module,
    root: &SigSpec,
    sigmap: &SigMap,
    drivers: &PortMap,
    at_port: &HashSet<SigBit>,
) -> bool {
    let mut cache: HashMap<SigSpec, bool> = HashMap::new();
    let mut monitor: HashSet<CellId> = HashSet::new();
    let mut stack: Vec<Frame> = Vec::new();

    let classify = |sig: &SigSpec,
                    depth: usize,
                    cache: &HashMap<SigSpec, bool>,
                    monitor: &HashSet<CellId>|
     -> Classified {
        if let Some(&v) = cache.get(sig) {
            return Classified::Leaf(v);
        }
        if sig.is_fully_const() {
            return Classified::Leaf(true);
        }
        if any_at_port(at_port, sig) {
            return Classified::Leaf(false);
        }
        let mut cells = Vec::new();
        let mut children = Vec::new();
        for (cell_id, port) in drivers.find(sig) {
            let cell = module.cell(cell_id);
            if !cell.ty.is_mux() || port != "Y" {
                if depth == 0 {
                    log::debug!("wire not connected to a multiplexer");
                    return Classified::Leaf(false);
                }
                log::trace!("found leaf signal at depth {depth}");
                return Classified::Leaf(true);
            }
            if monitor.contains(&cell_id) {
                log::warn!(
                    "logic loop in mux tree at cell {} in module {}",
                    cell.name,
                    module.name
                );
                return Classified::Leaf(false);
            }
            let sig_a = sigmap.apply(cell.port("A").expect("mux A port"));
            let sig_b = sigmap.apply(cell.port("B").expect("mux B port"));
            children.push(sig_a.clone());
            let mut i = 0;
            while i + sig_a.len() <= sig_b.len() {
                children.push(sig_b.extract(i, sig_a.len()));
                i += sig_a.len();
            }
            cells.push(cell_id);
        }
        if cells.is_empty() && children.is_empty() {
            // driver-less non-port signal: treated as a leaf input
            return Classified::Leaf(true);
        }
        Classified::Mux { cells, children }
    };

    match classify(root, 0, &cache, &monitor) {
        Classified::Leaf(v) => return v,
        Classified::Mux { cells, children } => {
            monitor.extend(cells.iter().copied());
            stack.push(Frame { sig: root.clone(), cells, children, next: 0 });
        }
    }

    while let Some(frame) = stack.last_mut() {
        if frame.next < frame.children.len() {
            let child = frame.children[frame.next].clone();
            frame.next += 1;
            let depth = stack.len();
            match classify(&child, depth, &cache, &monitor) {
                Classified::Leaf(true) => {
                    cache.insert(child, true);
                }
                Classified::Leaf(false) => {
                    cache.insert(child, false);
                    return false;
                }
                Classified::Mux { cells, children } => {
                    monitor.extend(cells.iter().copied());
                    stack.push(Frame { sig: child, cells, children, next: 0 });
                }
            }
        } else {
            let frame = stack.pop().unwrap();
            for cell in &frame.cells {
                monitor.remove(cell);
            }
            cache.insert(frame.sig, true);
        }
    }
    true
}
