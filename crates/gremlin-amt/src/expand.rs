//! AMT table expansion
//!
//! Pulls combinational drivers of selector bits into the table so the bug
//! surface includes those driver functions. Candidate drivers are limited to
//! equality, bitwise AND/OR and NOT cells whose outputs are private
//! (generated) wires. Each candidate is enumerated as a truth table over at
//! most `MAX_DRIVER_INPUTS` input bits, minimized by adjacent merging, and
//! multiplied into the existing rows. The driver's input bits are appended
//! to the selector. Finally the table is filtered back to rows whose
//! projection onto the original selector matches an original row, keeping
//! the original semantics while exposing interior selector bits.

use crate::maps::CellDriverMap;
use crate::table::{log_table, read_table, write_table, Selection};
use crate::{AmtError, AmtResult, MAX_DRIVER_INPUTS, MAX_EXPANDED_ROWS};
use gremlin_ir::consteval::eval_cell;
use gremlin_ir::{Cell, CellId, CellType, Const, Design, Module, SigBit, SigMap, SigSpec, State};

/// Expand every AMT in the selected modules; returns how many tables grew.
pub fn expand_design(design: &mut Design) -> usize {
    let mut expanded = 0;
    for name in design.selected_modules() {
        let module = design.module_mut(&name).expect("selected module exists");
        expanded += expand_module(module);
    }
    expanded
}

pub fn expand_module(module: &mut Module) -> usize {
    let amt_ids: Vec<CellId> = module
        .cells()
        .filter(|c| c.ty == CellType::Amt)
        .map(|c| c.id)
        .collect();
    let mut expanded = 0;
    for id in amt_ids {
        let name = module.cell(id).name.clone();
        log::info!("expanding AMT {} from module {}", name, module.name);
        match expand_cell(module, id) {
            Ok(true) => expanded += 1,
            Ok(false) => {}
            Err(err) => log::info!("  expansion aborted: {err}"),
        }
    }
    expanded
}

/// Expand a single AMT cell. Returns `Ok(false)` when no candidate driver
/// was merged; on row overflow the cell is restored to its pre-expansion
/// state and an error is returned.
pub fn expand_cell(module: &mut Module, amt_id: CellId) -> AmtResult<bool> {
    let sigmap = SigMap::new(module);
    let drivers = build_driver_map(module, &sigmap);

    let mut select = module
        .cell(amt_id)
        .port("S")
        .cloned()
        .ok_or_else(|| AmtError::MalformedTable(module.cell(amt_id).name.clone()))?;
    let original_select = select.clone();
    let mut rows = read_table(module.cell(amt_id))?;
    let original_rows = rows.clone();

    let mut merged_any = false;
    let mut frontier_start = 0;
    loop {
        let frontier = select.extract(frontier_start, select.len() - frontier_start);
        let worklist = drivers.find(&sigmap.apply(&frontier));
        if worklist.is_empty() {
            break;
        }
        frontier_start = select.len();
        for cell_id in worklist {
            let dcell = module.cell(cell_id).clone();
            let Some((cell_input, cell_output, out_full)) =
                driver_columns(module, &dcell, &select, &sigmap)
            else {
                continue;
            };
            if cell_input.len() > MAX_DRIVER_INPUTS {
                log::debug!(
                    "  driver {} has {} input bits, skipping",
                    dcell.name,
                    cell_input.len()
                );
                continue;
            }
            log::debug!(
                "  merging driver {} ({} inputs, {} outputs)",
                dcell.name,
                cell_input.len(),
                cell_output.len()
            );

            let truth_tab = enumerate_driver(&dcell, &cell_input, &cell_output, &out_full, &sigmap)?;
            let truth_tab = minimize(truth_tab, cell_input.len());

            let old_select = select.clone();
            for bit in cell_input.bits() {
                if !select.contains(bit) {
                    select.push(*bit);
                }
            }

            rows = multiply_rows(&rows, &truth_tab, &old_select, &select, &cell_input, &cell_output);
            merged_any = true;

            if rows.len() > MAX_EXPANDED_ROWS {
                let cell = module.cell_mut(amt_id);
                cell.unset_port("S");
                cell.set_port("S", original_select);
                write_table(cell, &original_rows);
                return Err(AmtError::ExpansionOverflow(MAX_EXPANDED_ROWS));
            }
        }
    }

    if !merged_any {
        return Ok(false);
    }

    // keep only rows whose projection onto the original selector matches an
    // original row; all matches survive
    let mut filtered = Vec::new();
    for row in &rows {
        let projection: Vec<State> = original_select
            .bits()
            .iter()
            .map(|b| {
                let pos = select.find(b).expect("original bit still in selector");
                row.pattern.bits()[pos]
            })
            .collect();
        let projection = Const::from_states(projection);
        if original_rows.iter().any(|orig| orig.pattern == projection) {
            filtered.push(row.clone());
        }
    }

    let cell = module.cell_mut(amt_id);
    cell.unset_port("S");
    cell.set_port("S", select);
    write_table(cell, &filtered);
    log_table(module.cell(amt_id), &filtered);
    Ok(true)
}

fn build_driver_map(module: &Module, sigmap: &SigMap) -> CellDriverMap {
    let mut drivers = CellDriverMap::new();
    for cell in module.cells() {
        if !cell.ty.is_expandable() {
            continue;
        }
        for (port, sig) in &cell.connections {
            if !cell.ty.is_output_port(port) {
                continue;
            }
            let mapped = sigmap.apply(sig);
            let private: Vec<SigBit> = mapped
                .bits()
                .iter()
                .filter(|b| match b {
                    SigBit::Wire { wire, .. } => !module.wire(*wire).is_public(),
                    _ => false,
                })
                .copied()
                .collect();
            drivers.insert(&SigSpec(private), cell.id);
        }
    }
    drivers
}

/// The driver's relevant input and output columns: for AND/OR/NOT only the
/// columns whose output bit feeds the selector; for equality every input
/// bit. Constants are dropped and duplicates removed.
fn driver_columns(
    module: &Module,
    dcell: &Cell,
    select: &SigSpec,
    sigmap: &SigMap,
) -> Option<(SigSpec, SigSpec, SigSpec)> {
    let out_full = sigmap.apply(dcell.port("Y")?);
    let cell_output = out_full.intersect(select);
    if cell_output.is_empty() {
        return None;
    }
    let mut cell_input = SigSpec::new();
    match dcell.ty {
        CellType::And | CellType::Or => {
            let a = sigmap.apply(dcell.port("A")?);
            let b = sigmap.apply(dcell.port("B")?);
            for (i, bit) in out_full.bits().iter().enumerate() {
                if select.contains(bit) {
                    if i < a.len() {
                        cell_input.push(a.bit(i));
                    }
                    if i < b.len() {
                        cell_input.push(b.bit(i));
                    }
                }
            }
        }
        CellType::Not => {
            let a = sigmap.apply(dcell.port("A")?);
            for (i, bit) in out_full.bits().iter().enumerate() {
                if select.contains(bit) && i < a.len() {
                    cell_input.push(a.bit(i));
                }
            }
        }
        CellType::Eq => {
            cell_input.append(&sigmap.apply(dcell.port("A")?));
            cell_input.append(&sigmap.apply(dcell.port("B")?));
        }
        _ => return None,
    }
    cell_input.remove_const();
    cell_input.unify();
    Some((cell_input, cell_output, out_full))
}

/// Enumerate the driver over every assignment of its input bits, recording
/// (output-pattern, input-pattern) pairs; the output pattern is the value
/// observed on the selector-feeding output bits.
fn enumerate_driver(
    dcell: &Cell,
    cell_input: &SigSpec,
    cell_output: &SigSpec,
    out_full: &SigSpec,
    sigmap: &SigMap,
) -> AmtResult<Vec<(Const, Const)>> {
    let mut dcell = dcell.clone();
    if dcell.param("Y_WIDTH").is_none() {
        dcell.set_param("Y_WIDTH", Const::new(out_full.len() as u64, 32));
    }
    let subst = |port: &str, in_val: &Const| -> Const {
        let sig = match dcell.port(port) {
            Some(s) => sigmap.apply(s),
            None => return Const::zero(0),
        };
        let states = sig
            .bits()
            .iter()
            .map(|b| match cell_input.find(b) {
                Some(pos) => in_val.bits()[pos],
                None => b.as_state().unwrap_or(State::S0),
            })
            .collect();
        Const::from_states(states)
    };

    let mut truth_tab = Vec::with_capacity(1 << cell_input.len());
    for i in 0..(1u64 << cell_input.len()) {
        let in_val = Const::new(i, cell_input.len());
        let a = subst("A", &in_val);
        let b = subst("B", &in_val);
        let y = eval_cell(&dcell, &a, &b)?;
        let out_states: Vec<State> = cell_output
            .bits()
            .iter()
            .map(|bit| {
                let j = out_full.find(bit).expect("output bit in driver output");
                y.bits().get(j).copied().unwrap_or(State::Sx)
            })
            .collect();
        truth_tab.push((Const::from_states(out_states), in_val));
    }
    Ok(truth_tab)
}

/// Pairwise adjacent merging: two rows with the same output differing in
/// exactly one input bit collapse into one row with that bit don't-care.
fn minimize(mut truth_tab: Vec<(Const, Const)>, input_width: usize) -> Vec<(Const, Const)> {
    let mut merged = true;
    while merged {
        merged = false;
        'outer: for i in 0..truth_tab.len() {
            for j in (i + 1)..truth_tab.len() {
                if truth_tab[i].0 != truth_tab[j].0 {
                    continue;
                }
                let mut differing = None;
                let mut matching = 0;
                for k in 0..input_width {
                    if truth_tab[i].1.bits()[k] == truth_tab[j].1.bits()[k] {
                        matching += 1;
                    } else {
                        differing = Some(k);
                    }
                }
                if matching != input_width.saturating_sub(1) {
                    continue;
                }
                if let Some(k) = differing {
                    truth_tab[i].1.bits_mut()[k] = State::Sa;
                    truth_tab.remove(j);
                    merged = true;
                    break 'outer;
                }
            }
        }
    }
    truth_tab
}

/// Replace each row by its products with the truth table: output patterns
/// intersect, input patterns unify (don't-care is the identity).
/// Inconsistent products are dropped, so a row may vanish entirely.
fn multiply_rows(
    rows: &[Selection],
    truth_tab: &[(Const, Const)],
    old_select: &SigSpec,
    select: &SigSpec,
    cell_input: &SigSpec,
    cell_output: &SigSpec,
) -> Vec<Selection> {
    let project = |bits: &SigSpec, row: &Selection| -> Const {
        Const::from_states(
            bits.bits()
                .iter()
                .map(|b| match old_select.find(b) {
                    Some(pos) => row.pattern.bits()[pos],
                    None => b.as_state().unwrap_or(State::Sa),
                })
                .collect(),
        )
    };

    let mut out = Vec::new();
    for row in rows {
        let selection_output = project(cell_output, row);
        let selection_input = project(cell_input, row);
        let base: Vec<State> = select
            .bits()
            .iter()
            .map(|b| match old_select.find(b) {
                Some(pos) => row.pattern.bits()[pos],
                None => State::Sa,
            })
            .collect();

        if selection_output.bits().iter().all(|s| *s == State::Sa) {
            // the row does not constrain this driver's outputs; its inputs
            // stay unconstrained
            let mut pattern = base.clone();
            for bit in cell_input.bits() {
                if let Some(pos) = select.find(bit) {
                    pattern[pos] = State::Sa;
                }
            }
            out.push(Selection {
                pattern: Const::from_states(pattern),
                output: row.output.clone(),
                buggy: row.buggy,
            });
            continue;
        }

        for (tt_out, tt_in) in truth_tab {
            let compatible = tt_out
                .bits()
                .iter()
                .zip(selection_output.bits().iter())
                .all(|(a, b)| *a == State::Sa || *b == State::Sa || a == b);
            if !compatible {
                continue;
            }
            let mut pattern = base.clone();
            let mut ok = true;
            for (k, bit) in cell_input.bits().iter().enumerate() {
                let a = tt_in.bits()[k];
                let b = selection_input.bits()[k];
                let value = match (a, b) {
                    (State::Sa, x) => x,
                    (x, State::Sa) => x,
                    (x, y) if x == y => x,
                    _ => {
                        ok = false;
                        break;
                    }
                };
                let pos = select.find(bit).expect("input bit in selector");
                pattern[pos] = value;
            }
            if !ok {
                continue;
            }
            out.push(Selection {
                pattern: Const::from_states(pattern),
                output: row.output.clone(),
                buggy: row.buggy,
            });
        }
    }
    out
}
