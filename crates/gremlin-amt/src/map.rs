//! AMT lowering to primitive logic
//!
//! Each `$amt` cell becomes one equality cell per row (checking the defined
//! bits of the row's pattern against the selector) plus a priority mux over
//! the per-row outputs. The priority mux selects the lowest-index asserted
//! row, matching the table's first-match semantics; when no row matches the
//! output defaults to zero.

use crate::table::read_table;
use crate::{AmtResult, MAX_EXPANDED_ROWS};
use gremlin_ir::{CellId, CellType, Const, Design, Module, SigBit, SigMap, SigSpec, State};

/// Lower every AMT cell in the selected modules; returns how many were
/// mapped.
pub fn map_design(design: &mut Design) -> usize {
    let mut mapped = 0;
    for name in design.selected_modules() {
        let module = design.module_mut(&name).expect("selected module exists");
        mapped += map_module(module);
    }
    mapped
}

pub fn map_module(module: &mut Module) -> usize {
    let amt_ids: Vec<CellId> = module
        .cells()
        .filter(|c| c.ty == CellType::Amt)
        .map(|c| c.id)
        .collect();
    let mut mapped = 0;
    for id in amt_ids {
        match map_amt(module, id) {
            Ok(()) => mapped += 1,
            Err(err) => log::warn!("cannot map AMT: {err}"),
        }
    }
    mapped
}

fn map_amt(module: &mut Module, amt_id: CellId) -> AmtResult<()> {
    log::info!(
        "mapping AMT {} from module {}",
        module.cell(amt_id).name,
        module.name
    );
    let selections = read_table(module.cell(amt_id))?;
    debug_assert!(selections.len() <= MAX_EXPANDED_ROWS);

    let sigmap = SigMap::new(module);
    let cell = module.cell(amt_id);
    let amt_s = sigmap.apply(cell.port("S").expect("AMT S port"));
    let sig_y = sigmap.apply(cell.port("Y").expect("AMT Y port"));
    let sig_b = sigmap.apply(cell.port("A").expect("AMT A port"));
    let width = sig_y.len();

    let match_wire = module.add_wire_auto("amt_match", selections.len() as u32);
    let sig_s = module.wire_sig(match_wire);

    for (i, selection) in selections.iter().enumerate() {
        let mut eq_a = SigSpec::new();
        let mut eq_b = SigSpec::new();
        for (j, state) in selection.pattern.bits().iter().enumerate() {
            if state.is_defined() {
                eq_a.push(amt_s.bit(j));
                eq_b.push(SigBit::Const(*state));
            }
        }
        let eq_id = module.add_cell_auto("amt_eq", CellType::Eq);
        let eq = module.cell_mut(eq_id);
        eq.set_param("A_SIGNED", Const::new(0, 1));
        eq.set_param("B_SIGNED", Const::new(0, 1));
        eq.set_param("A_WIDTH", Const::new(eq_a.len() as u64, 32));
        eq.set_param("B_WIDTH", Const::new(eq_b.len() as u64, 32));
        eq.set_param("Y_WIDTH", Const::new(1, 32));
        eq.set_port("A", eq_a);
        eq.set_port("B", eq_b);
        eq.set_port("Y", sig_s.extract(i, 1));
    }

    let pmux_id = module.add_cell_auto("amt_pmux", CellType::Pmux);
    let pmux = module.cell_mut(pmux_id);
    pmux.set_param("WIDTH", Const::new(width as u64, 32));
    pmux.set_param("S_WIDTH", Const::new(selections.len() as u64, 32));
    pmux.set_port("A", SigSpec::from_const(&Const::zero(width)));
    pmux.set_port("B", sig_b);
    pmux.set_port("S", sig_s);
    pmux.set_port("Y", sig_y);

    module.remove_cell(amt_id);
    Ok(())
}
