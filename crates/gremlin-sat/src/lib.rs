//! Incremental SAT solving over netlists
//!
//! This crate provides:
//! - `Solver` - an incremental CNF solver (CaDiCaL backend) with
//!   assumptions, a per-solve wall-clock timeout and DIMACS dumps
//! - a Tseitin expression layer (NOT/AND/OR/XOR/IFF/ITE and `vec_*`
//!   helpers) on top of the clause interface
//! - `Encoder` - imports signals and cells of a module into the solver
//!   across an integer time axis, with optional four-valued semantics

pub mod encoder;
pub mod expr;
pub mod solver;

pub use encoder::{DivByZero, Encoder, EncoderOptions, TimeStep, UnknownCells, COMB_STEP};
pub use solver::{CnfFormula, Lit, SolveResult, Solver, Var};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SatError {
    #[error("solver timed out; instance is poisoned")]
    TimedOut,
    #[error("cannot encode cell `{0}` of type `{1}`")]
    UnknownCell(String, String),
    #[error("cell `{0}` cannot be imported into a combinational problem")]
    SequentialInCombProblem(String),
    #[error("cell `{0}` is missing port `{1}`")]
    MissingPort(String, String),
    #[error("size mismatch: {0}")]
    SizeMismatch(String),
    #[error(transparent)]
    Amt(#[from] gremlin_amt::AmtError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SatResult<T> = Result<T, SatError>;
