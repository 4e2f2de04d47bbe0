//! Typed netlist cells
//!
//! `CellType` enumerates the word-level cell library the encoder and the
//! injection passes understand, plus module instances and unknown types that
//! an external frontend may produce.

use crate::signal::{Const, SigSpec};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Unique identifier for a cell within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    // unary
    Not,
    Pos,
    Neg,
    // binary bitwise
    And,
    Or,
    Xor,
    Xnor,
    // reductions
    ReduceAnd,
    ReduceOr,
    ReduceXor,
    ReduceXnor,
    ReduceBool,
    // boolean logic
    LogicNot,
    LogicAnd,
    LogicOr,
    // shifts
    Shl,
    Shr,
    Sshl,
    Sshr,
    Shift,
    Shiftx,
    // comparisons
    Lt,
    Le,
    Eq,
    Ne,
    Eqx,
    Nex,
    Ge,
    Gt,
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // multiplexers
    Mux,
    Pmux,
    /// Abstract mapping table
    Amt,
    // registers and latches
    Ff,
    Dff,
    Dffe,
    Sdff,
    Sdffe,
    Sdffce,
    Adff,
    Adffe,
    Aldff,
    Aldffe,
    Dlatch,
    Adlatch,
    // memory
    Mem,
    // formal
    Assert,
    Assume,
    /// Instance of another module in the design
    Instance(String),
    /// A type this crate has no semantics for
    Unknown(String),
}

impl CellType {
    /// The `$`-prefixed type name used in serialized netlists.
    pub fn name(&self) -> String {
        match self {
            CellType::Not => "$not".into(),
            CellType::Pos => "$pos".into(),
            CellType::Neg => "$neg".into(),
            CellType::And => "$and".into(),
            CellType::Or => "$or".into(),
            CellType::Xor => "$xor".into(),
            CellType::Xnor => "$xnor".into(),
            CellType::ReduceAnd => "$reduce_and".into(),
            CellType::ReduceOr => "$reduce_or".into(),
            CellType::ReduceXor => "$reduce_xor".into(),
            CellType::ReduceXnor => "$reduce_xnor".into(),
            CellType::ReduceBool => "$reduce_bool".into(),
            CellType::LogicNot => "$logic_not".into(),
            CellType::LogicAnd => "$logic_and".into(),
            CellType::LogicOr => "$logic_or".into(),
            CellType::Shl => "$shl".into(),
            CellType::Shr => "$shr".into(),
            CellType::Sshl => "$sshl".into(),
            CellType::Sshr => "$sshr".into(),
            CellType::Shift => "$shift".into(),
            CellType::Shiftx => "$shiftx".into(),
            CellType::Lt => "$lt".into(),
            CellType::Le => "$le".into(),
            CellType::Eq => "$eq".into(),
            CellType::Ne => "$ne".into(),
            CellType::Eqx => "$eqx".into(),
            CellType::Nex => "$nex".into(),
            CellType::Ge => "$ge".into(),
            CellType::Gt => "$gt".into(),
            CellType::Add => "$add".into(),
            CellType::Sub => "$sub".into(),
            CellType::Mul => "$mul".into(),
            CellType::Div => "$div".into(),
            CellType::Mod => "$mod".into(),
            CellType::Mux => "$mux".into(),
            CellType::Pmux => "$pmux".into(),
            CellType::Amt => "$amt".into(),
            CellType::Ff => "$ff".into(),
            CellType::Dff => "$dff".into(),
            CellType::Dffe => "$dffe".into(),
            CellType::Sdff => "$sdff".into(),
            CellType::Sdffe => "$sdffe".into(),
            CellType::Sdffce => "$sdffce".into(),
            CellType::Adff => "$adff".into(),
            CellType::Adffe => "$adffe".into(),
            CellType::Aldff => "$aldff".into(),
            CellType::Aldffe => "$aldffe".into(),
            CellType::Dlatch => "$dlatch".into(),
            CellType::Adlatch => "$adlatch".into(),
            CellType::Mem => "$mem".into(),
            CellType::Assert => "$assert".into(),
            CellType::Assume => "$assume".into(),
            CellType::Instance(m) => m.clone(),
            CellType::Unknown(t) => t.clone(),
        }
    }

    pub fn is_mux(&self) -> bool {
        matches!(self, CellType::Mux | CellType::Pmux)
    }

    pub fn is_register(&self) -> bool {
        matches!(
            self,
            CellType::Ff
                | CellType::Dff
                | CellType::Dffe
                | CellType::Sdff
                | CellType::Sdffe
                | CellType::Sdffce
                | CellType::Adff
                | CellType::Adffe
                | CellType::Aldff
                | CellType::Aldffe
        )
    }

    pub fn is_latch(&self) -> bool {
        matches!(self, CellType::Dlatch | CellType::Adlatch)
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, CellType::Mem)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, CellType::Instance(_) | CellType::Unknown(_))
    }

    /// Cell types the expander may pull into an AMT selector.
    pub fn is_expandable(&self) -> bool {
        matches!(self, CellType::Eq | CellType::And | CellType::Or | CellType::Not)
    }

    pub fn is_output_port(&self, port: &str) -> bool {
        match self {
            t if t.is_register() || t.is_latch() => port == "Q",
            CellType::Mem => port == "RD_DATA",
            CellType::Assert | CellType::Assume => false,
            CellType::Instance(_) | CellType::Unknown(_) => false,
            _ => port == "Y",
        }
    }

    pub fn is_input_port(&self, port: &str) -> bool {
        self.is_known() && !self.is_output_port(port)
    }
}

/// A cell instance: typed node referencing signal vectors by port name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub name: String,
    pub ty: CellType,
    /// Port name -> connected signal
    pub connections: IndexMap<String, SigSpec>,
    /// Parameter name -> constant
    pub parameters: IndexMap<String, Const>,
    /// Transient marker set while a buggy variant is being emitted
    pub buggy: bool,
    pub attributes: IndexMap<String, Const>,
}

impl Cell {
    pub fn port(&self, name: &str) -> Option<&SigSpec> {
        self.connections.get(name)
    }

    pub fn set_port(&mut self, name: &str, sig: SigSpec) {
        self.connections.insert(name.to_string(), sig);
    }

    pub fn unset_port(&mut self, name: &str) {
        self.connections.shift_remove(name);
    }

    pub fn has_port(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    pub fn param(&self, name: &str) -> Option<&Const> {
        self.parameters.get(name)
    }

    pub fn set_param(&mut self, name: &str, value: Const) {
        self.parameters.insert(name.to_string(), value);
    }

    pub fn param_u32(&self, name: &str) -> Option<u32> {
        self.parameters.get(name).and_then(|c| c.as_u64()).map(|v| v as u32)
    }

    pub fn param_bool(&self, name: &str) -> bool {
        self.parameters
            .get(name)
            .map(|c| c.as_bool())
            .unwrap_or(false)
    }
}
