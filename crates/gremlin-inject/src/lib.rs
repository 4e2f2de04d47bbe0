//! Bug injection
//!
//! Produces buggy variants of a design in two families:
//! - AMT-table bugs (`amt_bugs`): selector-bit promotions and
//!   specializations plus row removal on extracted mapping tables
//! - driver mix-up bugs (`driver_bugs`): splicing a random driver over a
//!   random connection target
//!
//! Each variant is serialized to `<output_dir>/<index>/` and the in-memory
//! mutation is reverted before the next bug. All randomness flows from the
//! configured seed so corpora are reproducible.

pub mod amt_bugs;
pub mod driver_bugs;
pub mod emit;

pub use amt_bugs::inject_amt_bugs;
pub use driver_bugs::inject_driver_bugs;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InjectError {
    #[error(transparent)]
    Amt(#[from] gremlin_amt::AmtError),
    #[error(transparent)]
    Ir(#[from] gremlin_ir::IrError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type InjectResult<T> = Result<T, InjectError>;

#[derive(Debug, Clone)]
pub struct InjectOptions {
    pub output_dir: PathBuf,
    /// Desired number of bugs, distributed uniformly across the selected
    /// modules
    pub num_bugs: usize,
    pub seed: u64,
}

impl InjectOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        InjectOptions {
            output_dir: output_dir.into(),
            num_bugs: 1000,
            seed: 0,
        }
    }

    pub fn with_num_bugs(mut self, num_bugs: usize) -> Self {
        self.num_bugs = num_bugs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
