//! Selection rows and the STATE_TABLE codec
//!
//! The `$amt` cell stores its table in the generic parameter channel as a
//! flat trit vector: n rows of k+1 entries, row-major, where k is the
//! selector width and the last entry of each row is the buggy flag. Port A
//! carries the per-row output values concatenated in row order, so
//! `|A| = n * |Y|` always holds.

use crate::{AmtError, AmtResult};
use gremlin_ir::{Cell, CellType, Const, SigSpec, State};

/// One decoded AMT row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Selector pattern, one trit per selector bit (don't-care = `Sa`)
    pub pattern: Const,
    /// Output value selected by this row
    pub output: SigSpec,
    pub buggy: bool,
}

impl Selection {
    pub fn new(pattern: Const, output: SigSpec) -> Self {
        Selection { pattern, output, buggy: false }
    }

    /// True if the pattern matches the concrete selector value `value`
    /// (don't-care bits match anything).
    pub fn matches(&self, value: &Const) -> bool {
        self.pattern
            .bits()
            .iter()
            .zip(value.bits().iter())
            .all(|(p, v)| match p {
                State::Sa => true,
                p => p == v,
            })
    }
}

/// Encode `selections` onto the cell: STATE_TABLE parameter plus a rebuilt
/// A port.
pub fn write_table(cell: &mut Cell, selections: &[Selection]) {
    let mut bits = Vec::new();
    let mut input = SigSpec::new();
    for sel in selections {
        bits.extend_from_slice(sel.pattern.bits());
        bits.push(if sel.buggy { State::S1 } else { State::S0 });
        input.append(&sel.output);
    }
    cell.set_param("STATE_TABLE", Const::from_states(bits));
    cell.unset_port("A");
    cell.set_port("A", input);
}

/// Decode the cell's STATE_TABLE into selection rows.
pub fn read_table(cell: &Cell) -> AmtResult<Vec<Selection>> {
    if cell.ty != CellType::Amt {
        return Err(AmtError::NotAmt(cell.name.clone()));
    }
    let select_size = cell
        .port("S")
        .map(|s| s.len())
        .ok_or_else(|| AmtError::MalformedTable(cell.name.clone()))?;
    let output_size = cell
        .port("Y")
        .map(|y| y.len())
        .ok_or_else(|| AmtError::MalformedTable(cell.name.clone()))?;
    let input = cell
        .port("A")
        .cloned()
        .ok_or_else(|| AmtError::MalformedTable(cell.name.clone()))?;
    let table = cell
        .param("STATE_TABLE")
        .ok_or_else(|| AmtError::MalformedTable(cell.name.clone()))?;

    let row_size = select_size + 1;
    if row_size == 0 || table.len() % row_size != 0 {
        return Err(AmtError::MalformedTable(cell.name.clone()));
    }
    let rows = table.len() / row_size;
    if input.len() != rows * output_size {
        return Err(AmtError::MalformedTable(cell.name.clone()));
    }

    let mut selections = Vec::with_capacity(rows);
    for i in 0..rows {
        let off = i * row_size;
        let pattern = Const::from_states(table.bits()[off..off + select_size].to_vec());
        let buggy = table.bits()[off + select_size] == State::S1;
        let output = input.extract(i * output_size, output_size);
        selections.push(Selection { pattern, output, buggy });
    }
    Ok(selections)
}

pub fn log_table(cell: &Cell, selections: &[Selection]) {
    log::debug!("AMT cell: {}", cell.name);
    for (i, sel) in selections.iter().enumerate() {
        log::debug!(
            "  {:5}: {} -> {:?}{}",
            i,
            sel.pattern,
            sel.output,
            if sel.buggy { " (buggy)" } else { "" }
        );
    }
}
