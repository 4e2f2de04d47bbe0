//! Abstract mapping tables
//!
//! An AMT (`$amt` cell) replaces a priority-mux tree with a single tabular
//! primitive: rows map selector patterns (trits 0/1/don't-care) to output
//! values, first match wins. This crate provides:
//! - `table` - the `Selection` row type and the STATE_TABLE codec
//! - `detect` - marking of candidate mux-tree root wires
//! - `extract` - abstraction of marked mux cones into `$amt` cells
//! - `expand` - propagation of selector-driver logic into the table
//! - `map` - lowering of `$amt` cells back to primitive logic

pub mod detect;
pub mod expand;
pub mod extract;
pub mod map;
mod maps;
pub mod table;

pub use table::{read_table, write_table, Selection};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AmtError {
    #[error("mux tree has {0} rows, too small to abstract")]
    TooSmall(usize),
    #[error("mux tree has more than {0} rows, too large to abstract")]
    TooLarge(usize),
    #[error("signal `{0}` has multiple drivers")]
    MultipleDrivers(String),
    #[error("signal `{0}` has no driver")]
    NoDriver(String),
    #[error("cell `{0}` is not an AMT")]
    NotAmt(String),
    #[error("malformed STATE_TABLE on `{0}`")]
    MalformedTable(String),
    #[error("table expansion exceeded {0} rows")]
    ExpansionOverflow(usize),
    #[error(transparent)]
    Ir(#[from] gremlin_ir::IrError),
}

pub type AmtResult<T> = Result<T, AmtError>;

/// Extraction bounds: trees outside `MIN_ROWS..=MAX_ROWS` are not abstracted.
pub const MIN_ROWS: usize = 4;
pub const MAX_ROWS: usize = 48;
/// Expansion aborts when the table would exceed this many rows.
pub const MAX_EXPANDED_ROWS: usize = 100;
/// Drivers with more than this many input bits are not enumerated.
pub const MAX_DRIVER_INPUTS: usize = 8;
