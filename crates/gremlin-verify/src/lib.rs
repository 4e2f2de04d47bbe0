//! Miter construction and bounded verification
//!
//! `miter` composes a host and a reference module into a single `miter`
//! module with shared inputs and parallel outputs, then lowers it to
//! flat primitive logic. `verify` runs the two-phase
//! sensitize-then-propagate loop over the miter with an incremental SAT
//! encoder.

pub mod miter;
pub mod verify;

pub use miter::{create_amt_miter, create_driver_miter, AmtMiter, HOST, MITER, REFERENCE};
pub use verify::{verify_miter, Phase, Verdict, VerifyOptions};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("can not find module `{0}` in current design")]
    MissingModule(String),
    #[error("module `{0}` has no wire `{1}`")]
    MissingWire(String, String),
    #[error("observable `{0}` is missing")]
    MissingObservable(String),
    #[error("can not find a buggy {0} in the host module")]
    MissingBuggy(&'static str),
    #[error("can not find the buggy {0} in the reference module")]
    MissingReferenceBuggy(&'static str),
    #[error("selection table sizes do not match: host {0}, reference {1}")]
    TableMismatch(usize, usize),
    #[error("{0} expression with different host and reference sizes")]
    PortSizeMismatch(&'static str),
    #[error(transparent)]
    Amt(#[from] gremlin_amt::AmtError),
    #[error(transparent)]
    Ir(#[from] gremlin_ir::IrError),
    #[error(transparent)]
    Sat(#[from] gremlin_sat::SatError),
}

pub type VerifyResult<T> = Result<T, VerifyError>;
