//! Netlist intermediate representation
//!
//! This crate provides the IR the injection and verification passes operate
//! on:
//! - `Design` / `Module` / `Wire` / `Cell` - arena-based netlist containers
//!   with dense integer IDs
//! - `SigBit` / `SigSpec` / `Const` - bit-level signal values
//! - `SigMap` - canonicalizing view collapsing identity connections
//! - `flatten` - hierarchy inlining
//! - `rtlil` - textual serialization of designs
//! - `Pipeline` - opaque string-command interface to an external synthesis
//!   framework

pub mod cell;
pub mod consteval;
pub mod design;
pub mod flatten;
pub mod module;
pub mod pipeline;
pub mod rtlil;
pub mod signal;
pub mod sigmap;

pub use cell::{Cell, CellId, CellType};
pub use design::Design;
pub use module::{FsmEncoding, Module, Wire, WireId};
pub use pipeline::{BasicPipeline, NullPipeline, Pipeline};
pub use signal::{Const, SigBit, SigChunk, SigSpec, State};
pub use sigmap::SigMap;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IrError {
    #[error("module `{0}` not found")]
    MissingModule(String),
    #[error("wire `{0}` not found")]
    MissingWire(String),
    #[error("duplicate name `{0}`")]
    DuplicateName(String),
    #[error("size mismatch: {0}")]
    SizeMismatch(String),
    #[error("invalid signal: {0}")]
    InvalidSignal(String),
    #[error("hierarchy error: {0}")]
    Hierarchy(String),
    #[error("cannot evaluate cell `{0}`")]
    NotEvaluable(String),
    #[error("unknown pipeline command `{0}`")]
    UnknownCommand(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type IrResult<T> = Result<T, IrError>;
