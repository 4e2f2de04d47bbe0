//! Driver mix-up bugs
//!
//! Internal cells are first exposed by buffering every port of every
//! non-state-holding cell through a fresh wire and an identity connection.
//! The module's connections then yield a pool of drivers (public wire
//! chunks and constants) and targets (wire-bearing connection left-hand
//! sides). Bugs splice a random driver over a random target's slice of an
//! existing connection; each mutated design is written together with an
//! unmutated reference copy, and the splice is reverted in memory.

use crate::emit::write_variant;
use crate::{InjectOptions, InjectResult};
use gremlin_ir::{Design, Module, SigChunk, SigSpec};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Inject driver mix-up bugs across the selected modules. Each bug writes
/// `<output_dir>/<index>/host_driver.rtlil` and
/// `<output_dir>/<index>/reference_driver.rtlil`. Returns the number of
/// bugs produced.
pub fn inject_driver_bugs(design: &mut Design, opts: &InjectOptions) -> InjectResult<usize> {
    let mut rng = StdRng::seed_from_u64(opts.seed);
    std::fs::create_dir_all(&opts.output_dir)?;

    let modules = design.selected_modules();
    let bugs_per_module = (opts.num_bugs / modules.len().max(1)).max(1);
    let mut index = 0;

    for name in modules {
        expose_cells(design.module_mut(&name).expect("selected module exists"));
        let (drivers, targets) = collect_drivers_targets(design.module(&name).expect("selected module exists"));
        if drivers.is_empty() || targets.is_empty() {
            log::warn!("module {name} offers nothing to mix up, skipping");
            continue;
        }

        let mut produced = 0;
        let attempt_limit = bugs_per_module.saturating_mul(1000);
        let mut attempts = 0;
        while produced < bugs_per_module && attempts < attempt_limit {
            attempts += 1;
            let driver = drivers[rng.gen_range(0..drivers.len())].clone();
            let target = targets[rng.gen_range(0..targets.len())].clone();

            // a driver must not already drive its target
            if !driver.intersect(&target).is_empty() {
                continue;
            }
            let Some((driver, target)) = adjust_widths(driver, target) else {
                continue;
            };

            let connection_index = design
                .module(&name)
                .expect("selected module exists")
                .connections
                .iter()
                .position(|(lhs, _)| !lhs.intersect(&target).is_empty());
            let Some(ci) = connection_index else {
                continue;
            };

            let (original, target_wire) = {
                let module = design.module_mut(&name).expect("selected module exists");
                let lhs = module.connections[ci].0.clone();
                let original = module.connections[ci].1.clone();
                lhs.replace_into(&target, &driver, &mut module.connections[ci].1);
                if module.connections[ci].1 == original {
                    continue;
                }
                let target_wire = target.as_wire().expect("wire-bearing target");
                module.wire_mut(target_wire).buggy = true;
                (original, target_wire)
            };

            produced += 1;
            index += 1;
            write_variant(design, &opts.output_dir, index, "host_driver.rtlil")?;

            let module = design.module_mut(&name).expect("selected module exists");
            module.wire_mut(target_wire).buggy = false;
            module.connections[ci].1 = original;
            write_variant(design, &opts.output_dir, index, "reference_driver.rtlil")?;
        }
        if produced < bugs_per_module {
            log::warn!(
                "module {name}: produced {produced}/{bugs_per_module} driver bugs before giving up"
            );
        }
    }
    log::info!("injected {index} driver bugs");
    Ok(index)
}

/// Buffer every port of every combinational cell through a fresh wire plus
/// an identity connection, making internal drivers and targets visible in
/// the module's connection list. State-holding cells keep their direct
/// connections.
pub fn expose_cells(module: &mut Module) {
    for cell_id in module.cell_ids() {
        let ty = module.cell(cell_id).ty.clone();
        if ty.is_memory() || ty.is_register() || ty.is_latch() {
            continue;
        }
        let ports: Vec<(String, SigSpec)> = module
            .cell(cell_id)
            .connections
            .iter()
            .map(|(p, s)| (p.clone(), s.clone()))
            .collect();
        for (port, sig) in ports {
            let wire = module.add_wire_auto("expose", sig.len() as u32);
            let intermediate = module.wire_sig(wire);
            module.cell_mut(cell_id).set_port(&port, intermediate.clone());
            if ty.is_input_port(&port) {
                module.connect(intermediate, sig).expect("equal widths");
            } else {
                module.connect(sig, intermediate).expect("equal widths");
            }
        }
    }
}

/// Drivers are chunks of connection right-hand sides that are constants or
/// public wires; targets are the matching left-hand slices. A connection
/// containing any private chunk contributes nothing.
pub fn collect_drivers_targets(module: &Module) -> (Vec<SigSpec>, Vec<SigSpec>) {
    let mut drivers = Vec::new();
    let mut targets = Vec::new();
    let mut driver_seen: HashSet<SigSpec> = HashSet::new();
    let mut target_seen: HashSet<SigSpec> = HashSet::new();

    for (lhs, rhs) in &module.connections {
        if lhs.as_wire().is_none() || rhs.is_empty() {
            continue;
        }
        let mut current: Vec<(SigSpec, SigSpec)> = Vec::new();
        let mut offset = 0;
        let mut all_visible = true;
        for chunk in rhs.chunks() {
            let visible = match &chunk {
                SigChunk::Const(_) => true,
                SigChunk::Wire { wire, .. } => module.wire(*wire).is_public(),
            };
            if !visible {
                all_visible = false;
                break;
            }
            let len = chunk.len();
            current.push((chunk.to_sig(), lhs.extract(offset, len)));
            offset += len;
        }
        if !all_visible {
            continue;
        }
        for (driver, target) in current {
            if driver_seen.insert(driver.clone()) {
                drivers.push(driver);
            }
            if target_seen.insert(target.clone()) {
                targets.push(target);
            }
        }
    }
    (drivers, targets)
}

/// Width adjustment: a narrower constant driver is sign-extended by its top
/// bit, a narrower non-constant driver truncates the target, a wider driver
/// is truncated. Targets that stop being wire-bearing are rejected.
pub fn adjust_widths(mut driver: SigSpec, mut target: SigSpec) -> Option<(SigSpec, SigSpec)> {
    if driver.len() < target.len() {
        if driver.is_fully_const() {
            let top = driver.bit(driver.len() - 1);
            while driver.len() < target.len() {
                driver.push(top);
            }
        } else {
            target = target.extract(0, driver.len());
        }
    } else if driver.len() > target.len() {
        driver = driver.extract(0, target.len());
    }
    target.as_wire()?;
    Some((driver, target))
}
