//! Modules, wires and their arenas
//!
//! Wires and cells live in per-module arenas addressed by dense IDs. Cells
//! can be removed (tombstoned); wires are never removed, matching the
//! lifecycle in which extraction rewires drivers onto fresh wires instead of
//! deleting old ones.

use crate::cell::{Cell, CellId, CellType};
use crate::signal::{Const, SigBit, SigSpec};
use crate::{IrError, IrResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Unique identifier for a wire within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WireId(pub u32);

/// Encoding directive for candidate state wires. Internal passes use this
/// field; the external attribute channel carries the same value as the
/// `fsm_encoding` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsmEncoding {
    /// Marked by the detector as an abstraction candidate
    Inject,
    /// Protected from detection
    None,
    /// Any other frontend-supplied value
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wire {
    pub id: WireId,
    pub name: String,
    pub width: u32,
    pub port_input: bool,
    pub port_output: bool,
    /// 1-based position in the module's port list; `None` for internal wires
    pub port_id: Option<u32>,
    /// Initial value constraint for registers driving this wire
    pub init: Option<Const>,
    pub fsm_encoding: Option<FsmEncoding>,
    /// Transient marker set while a buggy variant is being emitted
    pub buggy: bool,
    pub attributes: IndexMap<String, Const>,
}

impl Wire {
    /// Wires with generated (`$`-prefixed) names are private to the netlist.
    pub fn is_public(&self) -> bool {
        !self.name.starts_with('$')
    }

    pub fn is_port(&self) -> bool {
        self.port_input || self.port_output
    }
}

/// Named container of wires, cells and connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    wires: Vec<Wire>,
    cells: Vec<Option<Cell>>,
    wire_names: IndexMap<String, WireId>,
    cell_names: IndexMap<String, CellId>,
    /// (target, driver) pairs; targets are driven by drivers
    pub connections: Vec<(SigSpec, SigSpec)>,
    pub attributes: IndexMap<String, Const>,
    auto_index: u32,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            wires: Vec::new(),
            cells: Vec::new(),
            wire_names: IndexMap::new(),
            cell_names: IndexMap::new(),
            connections: Vec::new(),
            attributes: IndexMap::new(),
            auto_index: 0,
        }
    }

    // --- wires ---

    pub fn add_wire(&mut self, name: impl Into<String>, width: u32) -> IrResult<WireId> {
        let name = name.into();
        if self.wire_names.contains_key(&name) {
            return Err(IrError::DuplicateName(name));
        }
        let id = WireId(self.wires.len() as u32);
        self.wires.push(Wire {
            id,
            name: name.clone(),
            width,
            port_input: false,
            port_output: false,
            port_id: None,
            init: None,
            fsm_encoding: None,
            buggy: false,
            attributes: IndexMap::new(),
        });
        self.wire_names.insert(name, id);
        Ok(id)
    }

    /// Add a wire with a fresh generated name `$<prefix>$<n>`.
    pub fn add_wire_auto(&mut self, prefix: &str, width: u32) -> WireId {
        loop {
            self.auto_index += 1;
            let name = format!("${}${}", prefix, self.auto_index);
            if !self.wire_names.contains_key(&name) {
                return self.add_wire(name, width).expect("fresh name");
            }
        }
    }

    pub fn wire(&self, id: WireId) -> &Wire {
        &self.wires[id.0 as usize]
    }

    pub fn wire_mut(&mut self, id: WireId) -> &mut Wire {
        &mut self.wires[id.0 as usize]
    }

    pub fn wire_by_name(&self, name: &str) -> Option<WireId> {
        self.wire_names.get(name).copied()
    }

    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.wires.iter()
    }

    pub fn wire_ids(&self) -> Vec<WireId> {
        self.wires.iter().map(|w| w.id).collect()
    }

    /// The full-width signal of a wire.
    pub fn wire_sig(&self, id: WireId) -> SigSpec {
        let width = self.wire(id).width;
        SigSpec((0..width).map(|i| SigBit::wire(id, i)).collect())
    }

    // --- cells ---

    pub fn add_cell(&mut self, name: impl Into<String>, ty: CellType) -> IrResult<CellId> {
        let name = name.into();
        if self.cell_names.contains_key(&name) {
            return Err(IrError::DuplicateName(name));
        }
        let id = CellId(self.cells.len() as u32);
        self.cells.push(Some(Cell {
            id,
            name: name.clone(),
            ty,
            connections: IndexMap::new(),
            parameters: IndexMap::new(),
            buggy: false,
            attributes: IndexMap::new(),
        }));
        self.cell_names.insert(name, id);
        Ok(id)
    }

    /// Add a cell with a fresh generated name `$<prefix>$<n>`.
    pub fn add_cell_auto(&mut self, prefix: &str, ty: CellType) -> CellId {
        loop {
            self.auto_index += 1;
            let name = format!("${}${}", prefix, self.auto_index);
            if !self.cell_names.contains_key(&name) {
                return self.add_cell(name, ty).expect("fresh name");
            }
        }
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        self.cells[id.0 as usize].as_ref().expect("cell removed")
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        self.cells[id.0 as usize].as_mut().expect("cell removed")
    }

    pub fn has_cell(&self, id: CellId) -> bool {
        self.cells
            .get(id.0 as usize)
            .map(|c| c.is_some())
            .unwrap_or(false)
    }

    pub fn cell_by_name(&self, name: &str) -> Option<CellId> {
        let id = self.cell_names.get(name).copied()?;
        if self.has_cell(id) {
            Some(id)
        } else {
            None
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter_map(|c| c.as_ref())
    }

    pub fn cell_ids(&self) -> Vec<CellId> {
        self.cells.iter().filter_map(|c| c.as_ref().map(|c| c.id)).collect()
    }

    pub fn remove_cell(&mut self, id: CellId) {
        if let Some(cell) = self.cells[id.0 as usize].take() {
            self.cell_names.shift_remove(&cell.name);
        }
    }

    // --- connections ---

    pub fn connect(&mut self, target: SigSpec, driver: SigSpec) -> IrResult<()> {
        if target.len() != driver.len() {
            return Err(IrError::SizeMismatch(format!(
                "connect in `{}`: {} vs {} bits",
                self.name,
                target.len(),
                driver.len()
            )));
        }
        self.connections.push((target, driver));
        Ok(())
    }

    // --- ports ---

    /// Reassign port IDs: wires already carrying a port ID keep their
    /// relative order, newly marked port wires are appended in arena order.
    pub fn fixup_ports(&mut self) {
        let mut ports: Vec<WireId> = self
            .wires
            .iter()
            .filter(|w| w.is_port())
            .map(|w| w.id)
            .collect();
        ports.sort_by_key(|id| (self.wire(*id).port_id.unwrap_or(u32::MAX), id.0));
        for w in self.wires.iter_mut() {
            w.port_id = None;
        }
        for (i, id) in ports.iter().enumerate() {
            self.wire_mut(*id).port_id = Some(i as u32 + 1);
        }
    }

    /// Port wires in port-ID order.
    pub fn ports(&self) -> Vec<WireId> {
        let mut ports: Vec<&Wire> = self.wires.iter().filter(|w| w.port_id.is_some()).collect();
        ports.sort_by_key(|w| w.port_id);
        ports.iter().map(|w| w.id).collect()
    }

    pub fn input_wires(&self) -> Vec<WireId> {
        self.wires.iter().filter(|w| w.port_input).map(|w| w.id).collect()
    }

    pub fn output_wires(&self) -> Vec<WireId> {
        self.wires.iter().filter(|w| w.port_output).map(|w| w.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_arena() {
        let mut m = Module::new("top");
        let a = m.add_wire("a", 4).unwrap();
        let b = m.add_wire_auto("tmp", 2);
        assert_eq!(m.wire(a).width, 4);
        assert!(m.wire(a).is_public());
        assert!(!m.wire(b).is_public());
        assert!(m.add_wire("a", 1).is_err());
    }

    #[test]
    fn test_cell_tombstone() {
        let mut m = Module::new("top");
        let c = m.add_cell("u0", CellType::And).unwrap();
        assert!(m.has_cell(c));
        m.remove_cell(c);
        assert!(!m.has_cell(c));
        assert_eq!(m.cells().count(), 0);
        assert_eq!(m.cell_by_name("u0"), None);
    }

    #[test]
    fn test_fixup_ports() {
        let mut m = Module::new("top");
        let a = m.add_wire("a", 1).unwrap();
        let b = m.add_wire("b", 1).unwrap();
        m.wire_mut(b).port_input = true;
        m.wire_mut(a).port_output = true;
        m.fixup_ports();
        assert_eq!(m.wire(a).port_id, Some(1));
        assert_eq!(m.wire(b).port_id, Some(2));
    }

    #[test]
    fn test_connect_size_check() {
        let mut m = Module::new("top");
        let a = m.add_wire("a", 2).unwrap();
        let b = m.add_wire("b", 3).unwrap();
        let sa = m.wire_sig(a);
        let sb = m.wire_sig(b);
        assert!(m.connect(sa, sb).is_err());
    }
}
