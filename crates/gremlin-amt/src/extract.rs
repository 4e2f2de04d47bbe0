//! Mux-cone extraction into `$amt` cells
//!
//! For each marked wire the mux cone is traversed depth-first, collecting
//! one row per leaf: the selector values constrained along the path and the
//! leaf's output signal. Row order is traversal order and becomes the
//! table's priority order. After unifying the per-row selector layout into
//! one canonical selector vector, an `$amt` cell is created and the old
//! drivers are rewired onto fresh unconnected wires.

use crate::maps::PortMap;
use crate::table::{log_table, write_table, Selection};
use crate::{AmtError, AmtResult, MAX_ROWS, MIN_ROWS};
use gremlin_ir::{CellType, Const, Design, FsmEncoding, Module, SigMap, SigSpec, State, WireId};

/// Run extraction over all selected modules; returns the number of AMT
/// cells created. Per-wire failures (capacity, IR inconsistency) are logged
/// and skipped.
pub fn extract_design(design: &mut Design) -> usize {
    let mut created = 0;
    for name in design.selected_modules() {
        let module = design.module_mut(&name).expect("selected module exists");
        created += extract_module(module);
    }
    created
}

pub fn extract_module(module: &mut Module) -> usize {
    let sigmap = SigMap::new(module);
    let drivers = PortMap::drivers(module, &sigmap);

    let marked: Vec<WireId> = module
        .wires()
        .filter(|w| {
            matches!(
                w.fsm_encoding,
                Some(FsmEncoding::Inject) | Some(FsmEncoding::Other(_))
            )
        })
        .map(|w| w.id)
        .collect();

    let mut created = 0;
    for wire_id in marked {
        let wire_name = module.wire(wire_id).name.clone();
        log::info!("extracting mux tree {} from module {}", wire_name, module.name);
        match extract_tree(module, wire_id, &sigmap, &drivers) {
            Ok(()) => created += 1,
            Err(err) => log::info!("  mux tree abstraction failed: {err}"),
        }
    }
    created
}

/// One step of the selector path: this mux's select signal took `value`.
#[derive(Clone)]
struct PathEntry {
    select: SigSpec,
    value: Const,
}

struct RawRow {
    path: Vec<PathEntry>,
    output: SigSpec,
}

enum Task {
    Visit(SigSpec),
    PushSel(PathEntry),
    PopSel,
}

fn extract_tree(
    module: &mut Module,
    wire_id: WireId,
    sigmap: &SigMap,
    drivers: &PortMap,
) -> AmtResult<()> {
    let output = sigmap.apply(&module.wire_sig(wire_id));
    let width = output.len();

    let mut select = SigSpec::new();
    let mut rows: Vec<RawRow> = Vec::new();
    let mut path: Vec<PathEntry> = Vec::new();
    let mut tasks = vec![Task::Visit(output.clone())];

    while let Some(task) = tasks.pop() {
        match task {
            Task::PushSel(entry) => path.push(entry),
            Task::PopSel => {
                path.pop();
            }
            Task::Visit(mut sig) => {
                sig.extend_u0(width, false);
                let sig = sigmap.apply(&sig);
                if sig.is_fully_const() {
                    if sig.is_fully_def() {
                        log::debug!("  input signal found in mux tree");
                        rows.push(RawRow { path: path.clone(), output: sig });
                    }
                    continue;
                }
                let driver_list = drivers.find(&sig);
                if driver_list.len() > 1 {
                    return Err(AmtError::MultipleDrivers(format!("{sig:?}")));
                }
                let Some((cell_id, port)) = driver_list.into_iter().next() else {
                    return Err(AmtError::NoDriver(format!("{sig:?}")));
                };
                if rows.len() > MAX_ROWS {
                    return Err(AmtError::TooLarge(MAX_ROWS));
                }
                let cell = module.cell(cell_id);
                if !cell.ty.is_mux() || port != "Y" {
                    log::debug!("  input signal found in mux tree");
                    rows.push(RawRow { path: path.clone(), output: sig });
                    continue;
                }

                let sig_a = sigmap.apply(cell.port("A").expect("mux A port"));
                let sig_b = sigmap.apply(cell.port("B").expect("mux B port"));
                let sig_s = sigmap.apply(cell.port("S").expect("mux S port"));
                let sig_y = sigmap.apply(cell.port("Y").expect("mux Y port"));

                for bit in sig_s.bits() {
                    if !select.contains(bit) {
                        select.push(*bit);
                    }
                }

                let mut sig_aa = sig.clone();
                sig_aa.replace(&sig_y, &sig_a);
                let parts = sig_b.len() / sig_a.len();
                let mut branch_sigs = Vec::with_capacity(parts);
                for i in 0..parts {
                    let mut s = sig.clone();
                    s.replace(&sig_y, &sig_b.extract(i * sig_a.len(), sig_a.len()));
                    branch_sigs.push(s);
                }

                // schedule: push(sel=0), visit A, then for each branch i:
                // swap to sel=1<<i, visit it; finally pop. Tasks run LIFO.
                let mut schedule = Vec::new();
                schedule.push(Task::PushSel(PathEntry {
                    select: sig_s.clone(),
                    value: Const::new(0, sig_s.len()),
                }));
                schedule.push(Task::Visit(sig_aa));
                for (i, branch) in branch_sigs.into_iter().enumerate() {
                    schedule.push(Task::PopSel);
                    schedule.push(Task::PushSel(PathEntry {
                        select: sig_s.clone(),
                        value: Const::new(1u64 << i, sig_s.len()),
                    }));
                    schedule.push(Task::Visit(branch));
                }
                schedule.push(Task::PopSel);
                for task in schedule.into_iter().rev() {
                    tasks.push(task);
                }
            }
        }
    }

    if rows.len() < MIN_ROWS {
        return Err(AmtError::TooSmall(rows.len()));
    }
    if rows.len() > MAX_ROWS {
        return Err(AmtError::TooLarge(MAX_ROWS));
    }

    select.unify();
    log::debug!("  select signal has {} bits", select.len());

    // unify the selector order across rows: positions a row did not
    // constrain become don't-care
    let mut selections = Vec::with_capacity(rows.len());
    let mut input = SigSpec::new();
    for row in &rows {
        let mut pattern = SigSpec::new();
        let mut with = SigSpec::new();
        for entry in &row.path {
            pattern.append(&entry.select);
            with.append(&SigSpec::from_const(&entry.value));
        }
        for bit in select.bits() {
            if !pattern.contains(bit) {
                pattern.push(*bit);
                with.push(State::Sa.into());
            }
        }
        let mut projected = select.clone();
        select.replace_into(&pattern, &with, &mut projected);
        let pattern_const = projected
            .as_const()
            .ok_or_else(|| AmtError::MalformedTable(format!("unconstrained selector in {projected:?}")))?;
        input.append(&row.output);
        selections.push(Selection::new(pattern_const, row.output.clone()));
    }

    // create the AMT cell and take over the output
    let wire = module.wire(wire_id);
    let cell_name = format!("$amt${}", wire.name);
    let attributes = wire.attributes.clone();
    let cell_id = match module.add_cell(cell_name, CellType::Amt) {
        Ok(id) => id,
        Err(_) => module.add_cell_auto("amt", CellType::Amt),
    };
    {
        let cell = module.cell_mut(cell_id);
        cell.attributes = attributes;
        cell.set_port("A", input);
        cell.set_port("S", select);
        cell.set_port("Y", output.clone());
        write_table(cell, &selections);
    }

    // rewire the old drivers of the output onto fresh unconnected wires
    for (drv_id, drv_port) in drivers.find(&output) {
        if drv_id == cell_id {
            continue;
        }
        let port_sig = sigmap.apply(module.cell(drv_id).port(&drv_port).expect("driver port"));
        let unconn_sig = port_sig.intersect(&output);
        if unconn_sig.is_empty() {
            continue;
        }
        let unconn_wire = module.add_wire_auto("amt_unconnect", unconn_sig.len() as u32);
        let unconn = module.wire_sig(unconn_wire);
        let mut actual = module.cell(drv_id).port(&drv_port).expect("driver port").clone();
        port_sig.replace_into(&unconn_sig, &unconn, &mut actual);
        module.cell_mut(drv_id).set_port(&drv_port, actual);
    }

    log_table(module.cell(cell_id), &selections);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_table;
    use gremlin_ir::SigBit;

    /// Two-level mux tree over a 2-bit selector with constant leaves
    /// {0,1,2,3}: y = s1 ? (s0 ? 3 : 2) : (s0 ? 1 : 0).
    fn tree_module() -> (Module, WireId) {
        let mut m = Module::new("t");
        let s0 = m.add_wire("s0", 1).unwrap();
        let s1 = m.add_wire("s1", 1).unwrap();
        let lo = m.add_wire("lo", 2).unwrap();
        let hi = m.add_wire("hi", 2).unwrap();
        let y = m.add_wire("y", 2).unwrap();
        let ss0 = m.wire_sig(s0);
        let ss1 = m.wire_sig(s1);
        let slo = m.wire_sig(lo);
        let shi = m.wire_sig(hi);
        let sy = m.wire_sig(y);

        let c_lo = m.add_cell("mux_lo", CellType::Mux).unwrap();
        {
            let cell = m.cell_mut(c_lo);
            cell.set_port("A", SigSpec::from_const(&Const::new(0, 2)));
            cell.set_port("B", SigSpec::from_const(&Const::new(1, 2)));
            cell.set_port("S", ss0.clone());
            cell.set_port("Y", slo.clone());
        }
        let c_hi = m.add_cell("mux_hi", CellType::Mux).unwrap();
        {
            let cell = m.cell_mut(c_hi);
            cell.set_port("A", SigSpec::from_const(&Const::new(2, 2)));
            cell.set_port("B", SigSpec::from_const(&Const::new(3, 2)));
            cell.set_port("S", ss0);
            cell.set_port("Y", shi.clone());
        }
        let c_top = m.add_cell("mux_top", CellType::Mux).unwrap();
        {
            let cell = m.cell_mut(c_top);
            cell.set_port("A", slo);
            cell.set_port("B", shi);
            cell.set_port("S", ss1);
            cell.set_port("Y", sy);
        }
        m.wire_mut(y).fsm_encoding = Some(FsmEncoding::Inject);
        (m, y)
    }

    #[test]
    fn test_extracts_four_leaf_tree() {
        let (mut m, y) = tree_module();
        assert_eq!(extract_module(&mut m), 1);
        let amt_id = m
            .cells()
            .find(|c| c.ty == CellType::Amt)
            .map(|c| c.id)
            .unwrap();
        let cell = m.cell(amt_id);
        assert_eq!(cell.port("Y").unwrap(), &m.wire_sig(y));
        assert_eq!(cell.port("S").unwrap().len(), 2);
        let rows = read_table(cell).unwrap();
        assert_eq!(rows.len(), 4);
        // selector order is discovery order: s1 first, then s0; outputs in
        // traversal order 0,1,2,3 with patterns (s1,s0) 00,01,10,11
        let expected: Vec<(u64, u64)> = vec![(0b00, 0), (0b10, 1), (0b01, 2), (0b11, 3)];
        for (row, (pat, out)) in rows.iter().zip(expected) {
            assert_eq!(row.pattern.as_u64(), Some(pat));
            assert_eq!(row.output.as_const().unwrap().as_u64(), Some(out));
            assert!(!row.buggy);
        }
        // invariants: |A| = n * |Y| and |STATE_TABLE| = n * (|S| + 1)
        assert_eq!(cell.port("A").unwrap().len(), 4 * 2);
        assert_eq!(cell.param("STATE_TABLE").unwrap().len(), 4 * 3);
    }

    #[test]
    fn test_old_driver_disconnected() {
        let (mut m, y) = tree_module();
        extract_module(&mut m);
        let sy = m.wire_sig(y);
        let top = m.cell_by_name("mux_top").unwrap();
        let top_y = m.cell(top).port("Y").unwrap();
        assert_ne!(top_y, &sy);
        assert!(top_y.bits().iter().all(|b| matches!(b, SigBit::Wire { .. })));
    }

    #[test]
    fn test_three_rows_not_extracted() {
        // single mux with a 2-entry pmux-style second level would give 3
        // leaves; simplest: one mux = 2 leaves, below the minimum of 4
        let mut m = Module::new("t");
        let s = m.add_wire("s", 1).unwrap();
        let y = m.add_wire("y", 1).unwrap();
        let ss = m.wire_sig(s);
        let sy = m.wire_sig(y);
        let c = m.add_cell("mux0", CellType::Mux).unwrap();
        {
            let cell = m.cell_mut(c);
            cell.set_port("A", SigSpec::from_const(&Const::new(0, 1)));
            cell.set_port("B", SigSpec::from_const(&Const::new(1, 1)));
            cell.set_port("S", ss);
            cell.set_port("Y", sy);
        }
        m.wire_mut(y).fsm_encoding = Some(FsmEncoding::Inject);
        assert_eq!(extract_module(&mut m), 0);
        assert!(m.cells().all(|c| c.ty != CellType::Amt));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let (mut m, _) = tree_module();
        assert_eq!(extract_module(&mut m), 1);
        // the wire is now driven by the AMT, so the second run finds a
        // single-leaf cone and rejects it as too small
        assert_eq!(extract_module(&mut m), 0);
        assert_eq!(m.cells().filter(|c| c.ty == CellType::Amt).count(), 1);
    }

    /// Mux chain with `n` muxes, giving `n + 1` leaves.
    fn chain_module(n: usize) -> Module {
        let mut m = Module::new("t");
        let y = m.add_wire("y", 1).unwrap();
        let mut below = SigSpec::from_const(&Const::new(0, 1));
        for i in 0..n {
            let s = m.add_wire(format!("s{i}"), 1).unwrap();
            let w = if i == n - 1 { y } else { m.add_wire(format!("n{i}"), 1).unwrap() };
            let ss = m.wire_sig(s);
            let sw = m.wire_sig(w);
            let c = m.add_cell(format!("mux{i}"), CellType::Mux).unwrap();
            let cell = m.cell_mut(c);
            cell.set_port("A", below.clone());
            cell.set_port("B", SigSpec::from_const(&Const::new(1, 1)));
            cell.set_port("S", ss);
            cell.set_port("Y", sw.clone());
            below = sw;
        }
        m.wire_mut(y).fsm_encoding = Some(FsmEncoding::Inject);
        m
    }

    #[test]
    fn test_forty_eight_rows_extracted() {
        let mut m = chain_module(47);
        assert_eq!(extract_module(&mut m), 1);
        let cell = m.cells().find(|c| c.ty == CellType::Amt).unwrap();
        assert_eq!(read_table(cell).unwrap().len(), 48);
    }

    #[test]
    fn test_forty_nine_rows_rejected() {
        let mut m = chain_module(48);
        assert_eq!(extract_module(&mut m), 0);
    }
}
