//! Textual netlist serialization
//!
//! Writes designs in an RTLIL-style textual form. This is the persistence
//! format for bug variants; the file handle is scoped so it is closed on
//! every exit path.

use crate::cell::Cell;
use crate::design::Design;
use crate::module::{FsmEncoding, Module, Wire};
use crate::signal::{SigChunk, SigSpec};
use crate::IrResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn write_design_file(design: &Design, path: impl AsRef<Path>) -> IrResult<()> {
    let file = File::create(path.as_ref())?;
    let mut w = BufWriter::new(file);
    write_design(design, &mut w)?;
    w.flush()?;
    Ok(())
}

pub fn write_design(design: &Design, w: &mut impl Write) -> IrResult<()> {
    for module in design.modules.values() {
        write_module(module, w)?;
    }
    Ok(())
}

fn escape(name: &str) -> String {
    if name.starts_with('$') {
        name.to_string()
    } else {
        format!("\\{name}")
    }
}

fn format_sig(module: &Module, sig: &SigSpec) -> String {
    let chunks = sig.chunks();
    let fmt_chunk = |c: &SigChunk| -> String {
        match c {
            SigChunk::Const(value) => format!("{}'{}", value.len(), value),
            SigChunk::Wire { wire, offset, len } => {
                let w = module.wire(*wire);
                if *offset == 0 && *len == w.width {
                    escape(&w.name)
                } else if *len == 1 {
                    format!("{} [{}]", escape(&w.name), offset)
                } else {
                    format!("{} [{}:{}]", escape(&w.name), offset + len - 1, offset)
                }
            }
        }
    };
    if chunks.len() == 1 {
        fmt_chunk(&chunks[0])
    } else {
        // concatenations list the most significant chunk first
        let parts: Vec<String> = chunks.iter().rev().map(fmt_chunk).collect();
        format!("{{ {} }}", parts.join(" "))
    }
}

fn write_wire_attributes(wire: &Wire, w: &mut impl Write) -> IrResult<()> {
    if let Some(init) = &wire.init {
        writeln!(w, "  attribute \\init {}'{}", init.len(), init)?;
    }
    match &wire.fsm_encoding {
        Some(FsmEncoding::Inject) => writeln!(w, "  attribute \\fsm_encoding \"inject\"")?,
        Some(FsmEncoding::None) => writeln!(w, "  attribute \\fsm_encoding \"none\"")?,
        Some(FsmEncoding::Other(v)) => writeln!(w, "  attribute \\fsm_encoding \"{v}\"")?,
        None => {}
    }
    if wire.buggy {
        writeln!(w, "  attribute \\buggy \"buggy\"")?;
    }
    for (name, value) in &wire.attributes {
        writeln!(w, "  attribute {} {}'{}", escape(name), value.len(), value)?;
    }
    Ok(())
}

fn write_module(module: &Module, w: &mut impl Write) -> IrResult<()> {
    for (name, value) in &module.attributes {
        writeln!(w, "attribute {} {}'{}", escape(name), value.len(), value)?;
    }
    writeln!(w, "module {}", escape(&module.name))?;
    for wire in module.wires() {
        write_wire_attributes(wire, w)?;
        let mut decl = format!("  wire width {}", wire.width);
        if let Some(id) = wire.port_id {
            if wire.port_input {
                decl.push_str(&format!(" input {id}"));
            } else if wire.port_output {
                decl.push_str(&format!(" output {id}"));
            }
        }
        writeln!(w, "{} {}", decl, escape(&wire.name))?;
    }
    for cell in module.cells() {
        write_cell(module, cell, w)?;
    }
    for (target, driver) in &module.connections {
        writeln!(w, "  connect {} {}", format_sig(module, target), format_sig(module, driver))?;
    }
    writeln!(w, "end")?;
    Ok(())
}

fn write_cell(module: &Module, cell: &Cell, w: &mut impl Write) -> IrResult<()> {
    if cell.buggy {
        writeln!(w, "  attribute \\buggy \"buggy\"")?;
    }
    for (name, value) in &cell.attributes {
        writeln!(w, "  attribute {} {}'{}", escape(name), value.len(), value)?;
    }
    writeln!(w, "  cell {} {}", escape(&cell.ty.name()), escape(&cell.name))?;
    for (name, value) in &cell.parameters {
        writeln!(w, "    parameter {} {}'{}", escape(name), value.len(), value)?;
    }
    for (port, sig) in &cell.connections {
        writeln!(w, "    connect {} {}", escape(port), format_sig(module, sig))?;
    }
    writeln!(w, "  end")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellType;
    use crate::signal::{Const, SigBit, State};

    #[test]
    fn test_write_module_text() {
        let mut design = Design::new();
        let mut m = Module::new("top");
        let a = m.add_wire("a", 2).unwrap();
        m.wire_mut(a).port_input = true;
        let y = m.add_wire("y", 2).unwrap();
        m.wire_mut(y).port_output = true;
        m.fixup_ports();
        let c = m.add_cell("u_not", CellType::Not).unwrap();
        let sa = m.wire_sig(a);
        let sy = m.wire_sig(y);
        m.cell_mut(c).set_port("A", sa);
        m.cell_mut(c).set_port("Y", sy.clone());
        let mut mixed = SigSpec::from_bit(SigBit::Const(State::S1));
        mixed.append(&sy.extract(0, 1));
        m.connect(mixed.clone(), SigSpec::from_const(&Const::new(0b10, 2))).unwrap();
        design.add_module(m).unwrap();

        let mut out = Vec::new();
        write_design(&design, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("module \\top"));
        assert!(text.contains("wire width 2 input 1 \\a"));
        assert!(text.contains("cell $not \\u_not"));
        // concat is MSB first: y[0] above the constant 1
        assert!(text.contains("connect { \\y [0] 1'1 } 2'10"));
        assert!(text.contains("end"));
    }

    #[test]
    fn test_buggy_attribute_emitted() {
        let mut design = Design::new();
        let mut m = Module::new("top");
        let a = m.add_wire("a", 1).unwrap();
        m.wire_mut(a).buggy = true;
        design.add_module(m).unwrap();
        let mut out = Vec::new();
        write_design(&design, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("attribute \\buggy \"buggy\""));
    }
}
