//! AMT-table bugs
//!
//! For each AMT with at least four rows, defined selector bits are promoted
//! to don't-care (the mutated row also moves to index 0, escalating its
//! priority, and the original row is dropped) and don't-care bits are
//! specialized to a random constant. One additional variant removes a row
//! chosen uniformly at random. The per-bit mutation rate follows the
//! configured bug budget.
//!
//! While a variant is serialized the AMT cell and its output wire carry a
//! transient `buggy` marker; both the marker and the table are restored
//! before the next bug.

use crate::emit::write_variant;
use crate::{InjectOptions, InjectResult};
use gremlin_amt::{read_table, write_table, Selection};
use gremlin_ir::{CellId, CellType, Design, State};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MIN_TABLE_ROWS: usize = 4;

/// Inject AMT bugs across the selected modules, writing one
/// `<output_dir>/<index>/host_amt.rtlil` per variant. Returns the number of
/// variants written.
pub fn inject_amt_bugs(design: &mut Design, opts: &InjectOptions) -> InjectResult<usize> {
    let mut rng = StdRng::seed_from_u64(opts.seed);
    std::fs::create_dir_all(&opts.output_dir)?;

    let modules = design.selected_modules();
    let bugs_per_module = (opts.num_bugs / modules.len().max(1)).max(1);
    let mut index = 0;

    for name in modules {
        let amt_ids: Vec<CellId> = {
            let module = design.module(&name).expect("selected module exists");
            module
                .cells()
                .filter(|c| c.ty == CellType::Amt)
                .filter(|c| read_table(c).map(|t| t.len() >= MIN_TABLE_ROWS).unwrap_or(false))
                .map(|c| c.id)
                .collect()
        };
        if amt_ids.is_empty() {
            continue;
        }
        let bugs_per_cell = (bugs_per_module / amt_ids.len()).max(1);

        for amt_id in amt_ids {
            let selections = read_table(design.module(&name).expect("selected module exists").cell(amt_id))?;
            let bugs = generate_bugs(&selections, bugs_per_cell, &mut rng);
            if bugs.is_empty() {
                continue;
            }

            let y_wire = design
                .module(&name)
                .expect("selected module exists")
                .cell(amt_id)
                .port("Y")
                .and_then(|y| y.as_wire());
            set_buggy_markers(design, &name, amt_id, y_wire, true);
            for bug in &bugs {
                index += 1;
                write_table(design.module_mut(&name).expect("selected module exists").cell_mut(amt_id), bug);
                write_variant(design, &opts.output_dir, index, "host_amt.rtlil")?;
            }
            write_table(design.module_mut(&name).expect("selected module exists").cell_mut(amt_id), &selections);
            set_buggy_markers(design, &name, amt_id, y_wire, false);
        }
    }
    log::info!("injected {index} AMT bugs");
    Ok(index)
}

fn set_buggy_markers(
    design: &mut Design,
    module: &str,
    amt_id: CellId,
    y_wire: Option<gremlin_ir::WireId>,
    value: bool,
) {
    let module = design.module_mut(module).expect("module exists");
    module.cell_mut(amt_id).buggy = value;
    if let Some(wire) = y_wire {
        module.wire_mut(wire).buggy = value;
    }
}

/// Generate the mutated tables for one AMT. Each mutation yields a complete
/// table; the mutated row carries the buggy flag.
pub fn generate_bugs(
    selections: &[Selection],
    bugs_per_cell: usize,
    rng: &mut StdRng,
) -> Vec<Vec<Selection>> {
    let mut bugs = Vec::new();
    if selections.is_empty() {
        return bugs;
    }
    let k = selections[0].pattern.len();
    let one_in = (selections.len() * k / bugs_per_cell.max(1)).max(1);

    for (row_index, selection) in selections.iter().enumerate() {
        if selection.output.is_fully_undef() {
            continue;
        }
        for bit_pos in 0..k {
            if rng.gen_range(0..one_in) != 0 {
                continue;
            }
            match selection.pattern.bits()[bit_pos] {
                State::S0 | State::S1 => {
                    // promote to don't-care and escalate the row's priority
                    let mut mutated = selections.to_vec();
                    let mut row = mutated.remove(row_index);
                    row.pattern.bits_mut()[bit_pos] = State::Sa;
                    row.buggy = true;
                    mutated.insert(0, row);
                    bugs.push(mutated);
                }
                State::Sa => {
                    let mut mutated = selections.to_vec();
                    mutated[row_index].pattern.bits_mut()[bit_pos] =
                        if rng.gen::<bool>() { State::S1 } else { State::S0 };
                    mutated[row_index].buggy = true;
                    bugs.push(mutated);
                }
                _ => {}
            }
        }
    }

    // one row-removal variant per cell, independent of the bug budget
    let drop_index = rng.gen_range(0..selections.len());
    let mut removed = selections.to_vec();
    removed.remove(drop_index);
    bugs.push(removed);

    bugs
}
