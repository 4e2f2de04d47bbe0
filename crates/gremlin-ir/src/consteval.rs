//! Constant evaluation for the cell types the expander enumerates
//!
//! Undefined input bits make the affected output bits undefined.

use crate::cell::{Cell, CellType};
use crate::signal::{Const, State};
use crate::{IrError, IrResult};

fn bit_and(a: State, b: State) -> State {
    match (a.as_bool(), b.as_bool()) {
        (Some(false), _) | (_, Some(false)) => State::S0,
        (Some(true), Some(true)) => State::S1,
        _ => State::Sx,
    }
}

fn bit_or(a: State, b: State) -> State {
    match (a.as_bool(), b.as_bool()) {
        (Some(true), _) | (_, Some(true)) => State::S1,
        (Some(false), Some(false)) => State::S0,
        _ => State::Sx,
    }
}

fn bit_not(a: State) -> State {
    match a.as_bool() {
        Some(v) => State::from_bool(!v),
        None => State::Sx,
    }
}

/// Evaluate a cell over constant operands. Operand widths are taken from the
/// arguments; the result is sized to the cell's `Y_WIDTH` (falling back to
/// the natural width).
pub fn eval_cell(cell: &Cell, a: &Const, b: &Const) -> IrResult<Const> {
    let a_signed = cell.param_bool("A_SIGNED");
    let b_signed = cell.param_bool("B_SIGNED");
    let y_width = cell.param_u32("Y_WIDTH").map(|w| w as usize);

    let ext = |c: &Const, width: usize, signed: bool| -> Const {
        let fill = if signed {
            c.bits().last().copied().unwrap_or(State::S0)
        } else {
            State::S0
        };
        c.extended(width, fill)
    };

    match &cell.ty {
        CellType::Eq | CellType::Ne => {
            let width = a.len().max(b.len());
            let ea = ext(a, width, a_signed);
            let eb = ext(b, width, b_signed);
            let mut result = State::S1;
            for (x, y) in ea.bits().iter().zip(eb.bits().iter()) {
                match (x.as_bool(), y.as_bool()) {
                    (Some(xa), Some(ya)) => {
                        if xa != ya {
                            result = State::S0;
                            break;
                        }
                    }
                    _ => {
                        if result != State::S0 {
                            result = State::Sx;
                        }
                    }
                }
            }
            if matches!(cell.ty, CellType::Ne) {
                result = bit_not(result);
            }
            let mut out = Const::from_states(vec![result]);
            if let Some(w) = y_width {
                out = out.extended(w, State::S0);
            }
            Ok(out)
        }
        CellType::And | CellType::Or => {
            let width = y_width.unwrap_or_else(|| a.len().max(b.len()));
            let ea = ext(a, width, a_signed);
            let eb = ext(b, width, b_signed);
            let op = if matches!(cell.ty, CellType::And) { bit_and } else { bit_or };
            Ok(Const::from_states(
                ea.bits().iter().zip(eb.bits().iter()).map(|(x, y)| op(*x, *y)).collect(),
            ))
        }
        CellType::Not => {
            let width = y_width.unwrap_or(a.len());
            let ea = ext(a, width, a_signed);
            Ok(Const::from_states(ea.bits().iter().map(|x| bit_not(*x)).collect()))
        }
        other => Err(IrError::NotEvaluable(other.name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;

    fn make_cell(ty: CellType, y_width: u32) -> Cell {
        let mut m = Module::new("t");
        let id = m.add_cell("c", ty).unwrap();
        let cell = m.cell_mut(id);
        cell.set_param("Y_WIDTH", Const::new(y_width as u64, 32));
        cell.clone()
    }

    #[test]
    fn test_eval_eq() {
        let cell = make_cell(CellType::Eq, 1);
        let y = eval_cell(&cell, &Const::new(5, 4), &Const::new(5, 4)).unwrap();
        assert_eq!(y.as_u64(), Some(1));
        let n = eval_cell(&cell, &Const::new(5, 4), &Const::new(6, 4)).unwrap();
        assert_eq!(n.as_u64(), Some(0));
    }

    #[test]
    fn test_eval_eq_undef() {
        let cell = make_cell(CellType::Eq, 1);
        let mut a = Const::new(5, 4);
        a.bits_mut()[0] = State::Sx;
        let y = eval_cell(&cell, &a, &Const::new(5, 4)).unwrap();
        assert_eq!(y.bits()[0], State::Sx);
        // a known mismatch dominates an undef bit
        let n = eval_cell(&cell, &a, &Const::new(0b1001, 4)).unwrap();
        assert_eq!(n.bits()[0], State::S0);
    }

    #[test]
    fn test_eval_and_not() {
        let and = make_cell(CellType::And, 4);
        let y = eval_cell(&and, &Const::new(0b1100, 4), &Const::new(0b1010, 4)).unwrap();
        assert_eq!(y.as_u64(), Some(0b1000));
        let not = make_cell(CellType::Not, 4);
        let y = eval_cell(&not, &Const::new(0b1100, 4), &Const::zero(0)).unwrap();
        assert_eq!(y.as_u64(), Some(0b0011));
    }
}
