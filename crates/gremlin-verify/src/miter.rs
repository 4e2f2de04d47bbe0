//! Miter construction
//!
//! The host and reference modules are given parallel output ports for the
//! signals of interest, then instantiated side by side in a fresh `miter`
//! module that shares every input and exposes
//! `{host,reference}_{output,select,observables}`. The composed miter is
//! lowered to flat primitive logic: AMTs are mapped to eq-cells plus a
//! priority mux, the hierarchy is flattened, and the remaining pipeline
//! commands are delegated to the external framework.

use crate::{VerifyError, VerifyResult};
use gremlin_amt::{map::map_design, read_table, Selection};
use gremlin_ir::{CellType, Design, Module, Pipeline, SigMap, SigSpec};

pub const HOST: &str = "host";
pub const REFERENCE: &str = "reference";
pub const MITER: &str = "miter";

/// What the verifier needs to know about an AMT miter: the host's table
/// rows (with their buggy flags) as they were before mapping.
#[derive(Debug, Clone)]
pub struct AmtMiter {
    pub selections: Vec<Selection>,
}

/// Build the miter for an AMT-table bug: the buggy cell's S and Y become
/// the `select` and `output` ports of both instances.
pub fn create_amt_miter(
    design: &mut Design,
    observables: &[String],
    pipeline: &mut dyn Pipeline,
) -> VerifyResult<AmtMiter> {
    let host = design
        .module(HOST)
        .ok_or_else(|| VerifyError::MissingModule(HOST.into()))?;
    let reference = design
        .module(REFERENCE)
        .ok_or_else(|| VerifyError::MissingModule(REFERENCE.into()))?;

    let host_cell = host
        .cells()
        .find(|c| c.buggy && c.ty == CellType::Amt)
        .ok_or(VerifyError::MissingBuggy("cell"))?;
    let reference_cell = reference
        .cell_by_name(&host_cell.name)
        .map(|id| reference.cell(id))
        .ok_or(VerifyError::MissingReferenceBuggy("cell"))?;

    let host_selections = read_table(host_cell)?;
    let reference_selections = read_table(reference_cell)?;
    if host_selections.len() != reference_selections.len() {
        return Err(VerifyError::TableMismatch(
            host_selections.len(),
            reference_selections.len(),
        ));
    }

    let host_select = host_cell.port("S").cloned().unwrap_or_default();
    let host_output = host_cell.port("Y").cloned().unwrap_or_default();
    let reference_select = reference_cell.port("S").cloned().unwrap_or_default();
    let reference_output = reference_cell.port("Y").cloned().unwrap_or_default();
    if host_select.len() != reference_select.len() {
        return Err(VerifyError::PortSizeMismatch("select"));
    }
    if host_output.len() != reference_output.len() {
        return Err(VerifyError::PortSizeMismatch("output"));
    }

    add_miter_ports(design, HOST, &host_output, Some(&host_select), observables)?;
    add_miter_ports(design, REFERENCE, &reference_output, Some(&reference_select), observables)?;
    compose_miter(design, true)?;
    synthesize_miter(design, pipeline)?;
    Ok(AmtMiter { selections: host_selections })
}

/// Build the miter for a driver mix-up bug: the buggy wire becomes the
/// `output` port; there is no select.
pub fn create_driver_miter(
    design: &mut Design,
    observables: &[String],
    pipeline: &mut dyn Pipeline,
) -> VerifyResult<()> {
    let host = design
        .module(HOST)
        .ok_or_else(|| VerifyError::MissingModule(HOST.into()))?;
    let reference = design
        .module(REFERENCE)
        .ok_or_else(|| VerifyError::MissingModule(REFERENCE.into()))?;

    let host_wire = host
        .wires()
        .find(|w| w.buggy)
        .ok_or(VerifyError::MissingBuggy("wire"))?;
    let reference_wire = reference
        .wire_by_name(&host_wire.name)
        .ok_or(VerifyError::MissingReferenceBuggy("wire"))?;

    let host_output = host.wire_sig(host_wire.id);
    let reference_output = reference.wire_sig(reference_wire);
    if host_output.len() != reference_output.len() {
        return Err(VerifyError::PortSizeMismatch("output"));
    }

    add_miter_ports(design, HOST, &host_output, None, observables)?;
    add_miter_ports(design, REFERENCE, &reference_output, None, observables)?;
    compose_miter(design, false)?;
    synthesize_miter(design, pipeline)?;
    Ok(())
}

/// Give `module` output ports `output`, optional `select`, and
/// `observables` (the concatenation of the nominated wires).
fn add_miter_ports(
    design: &mut Design,
    module_name: &str,
    output: &SigSpec,
    select: Option<&SigSpec>,
    observables: &[String],
) -> VerifyResult<()> {
    let module = design
        .module_mut(module_name)
        .ok_or_else(|| VerifyError::MissingModule(module_name.into()))?;
    let sigmap = SigMap::new(module);

    let mut observables_sig = SigSpec::new();
    for observable in observables {
        let wire = module
            .wire_by_name(observable)
            .ok_or_else(|| VerifyError::MissingObservable(observable.clone()))?;
        observables_sig.append(&module.wire_sig(wire));
    }

    let port = |module: &mut Module, name: &str, sig: &SigSpec| -> VerifyResult<()> {
        let wire = module.add_wire(name, sig.len() as u32)?;
        module.wire_mut(wire).port_output = true;
        let port_sig = module.wire_sig(wire);
        module.connect(port_sig, sigmap.apply(sig))?;
        Ok(())
    };

    if let Some(select) = select {
        port(module, "select", select)?;
    }
    port(module, "output", output)?;
    port(module, "observables", &observables_sig)?;
    module.fixup_ports();
    Ok(())
}

/// Instantiate host and reference side by side with shared inputs and
/// parallel outputs.
fn compose_miter(design: &mut Design, with_select: bool) -> VerifyResult<()> {
    let host = design.module(HOST).expect("host module exists");
    let inputs: Vec<(String, u32)> = host
        .wires()
        .filter(|w| w.port_input)
        .map(|w| (w.name.clone(), w.width))
        .collect();
    let mut outputs = vec![("output".to_string(), host.wire_by_name("output").map(|w| host.wire(w).width).unwrap_or(0))];
    if with_select {
        outputs.push((
            "select".to_string(),
            host.wire_by_name("select").map(|w| host.wire(w).width).unwrap_or(0),
        ));
    }
    outputs.push((
        "observables".to_string(),
        host.wire_by_name("observables").map(|w| host.wire(w).width).unwrap_or(0),
    ));

    let mut miter = Module::new(MITER);
    let host_cell = miter.add_cell(HOST, CellType::Instance(HOST.into()))?;
    let reference_cell = miter.add_cell(REFERENCE, CellType::Instance(REFERENCE.into()))?;

    for (name, width) in &inputs {
        let wire = miter.add_wire(format!("in_{name}"), *width)?;
        miter.wire_mut(wire).port_input = true;
        let sig = miter.wire_sig(wire);
        miter.cell_mut(host_cell).set_port(name, sig.clone());
        miter.cell_mut(reference_cell).set_port(name, sig);
    }
    for (name, width) in &outputs {
        let host_wire = miter.add_wire(format!("host_{name}"), *width)?;
        miter.wire_mut(host_wire).port_output = true;
        let sig = miter.wire_sig(host_wire);
        miter.cell_mut(host_cell).set_port(name, sig);

        let reference_wire = miter.add_wire(format!("reference_{name}"), *width)?;
        miter.wire_mut(reference_wire).port_output = true;
        let sig = miter.wire_sig(reference_wire);
        miter.cell_mut(reference_cell).set_port(name, sig);
    }
    miter.fixup_ports();
    design.add_module(miter)?;
    Ok(())
}

/// Lower the composed miter: AMTs to primitive logic in-tree, the rest of
/// the sequence through the external pipeline.
fn synthesize_miter(design: &mut Design, pipeline: &mut dyn Pipeline) -> VerifyResult<()> {
    map_design(design);
    for command in [
        "opt",
        "hierarchy -check -top miter",
        "flatten",
        "opt",
        "wreduce",
        "peepopt",
        "opt_clean",
        "memory -nomap",
        "opt_clean",
        "opt -fast -full",
        "memory_map",
        "opt -full",
        "clk2fflogic",
        "opt -full -fine",
    ] {
        pipeline.run(design, command)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gremlin_amt::write_table;
    use gremlin_ir::{BasicPipeline, Const};

    /// host/reference pair with a 1-bit-select AMT; host row `sel`
    /// optionally maps to a different output.
    pub(crate) fn amt_pair(host_out_for_one: u64) -> Design {
        let mut design = Design::new();
        for (name, out_for_one) in [(HOST, host_out_for_one), (REFERENCE, 1u64)] {
            let mut m = Module::new(name);
            let s = m.add_wire("in_sel", 1).unwrap();
            m.wire_mut(s).port_input = true;
            let obs = m.add_wire("obs", 1).unwrap();
            let y = m.add_wire("y", 1).unwrap();
            m.fixup_ports();
            let (ss, sy, sobs) = (m.wire_sig(s), m.wire_sig(y), m.wire_sig(obs));
            m.connect(sobs, sy.clone()).unwrap();
            let amt = m.add_cell("amt0", CellType::Amt).unwrap();
            {
                let cell = m.cell_mut(amt);
                cell.set_port("S", ss);
                cell.set_port("Y", sy);
                let mut rows = vec![
                    Selection::new(Const::new(0, 1), SigSpec::from_const(&Const::new(0, 1))),
                    Selection::new(
                        Const::new(1, 1),
                        SigSpec::from_const(&Const::new(out_for_one, 1)),
                    ),
                ];
                if name == HOST {
                    rows[1].buggy = true;
                }
                write_table(cell, &rows);
                if name == HOST {
                    cell.buggy = true;
                }
            }
            design.add_module(m).unwrap();
        }
        design
    }

    #[test]
    fn test_amt_miter_shape() {
        let mut design = amt_pair(0);
        let mut pipeline = BasicPipeline::new();
        let info = create_amt_miter(&mut design, &["obs".into()], &mut pipeline).unwrap();
        assert_eq!(info.selections.len(), 2);
        assert!(info.selections[1].buggy);

        let miter = design.module(MITER).unwrap();
        for port in [
            "in_in_sel",
            "host_output",
            "reference_output",
            "host_select",
            "reference_select",
            "host_observables",
            "reference_observables",
        ] {
            assert!(miter.wire_by_name(port).is_some(), "missing {port}");
        }
        // flattened: no instances, no AMT cells left anywhere in the miter
        assert!(miter.cells().all(|c| !matches!(c.ty, CellType::Instance(_))));
        assert!(miter.cells().all(|c| c.ty != CellType::Amt));
    }

    #[test]
    fn test_missing_observable_fails() {
        let mut design = amt_pair(0);
        let mut pipeline = BasicPipeline::new();
        let err = create_amt_miter(&mut design, &["ghost".into()], &mut pipeline).unwrap_err();
        assert!(matches!(err, VerifyError::MissingObservable(_)));
    }

    #[test]
    fn test_missing_host_fails() {
        let mut design = Design::new();
        let mut pipeline = BasicPipeline::new();
        let err = create_amt_miter(&mut design, &[], &mut pipeline).unwrap_err();
        assert!(matches!(err, VerifyError::MissingModule(_)));
    }

    #[test]
    fn test_missing_buggy_marker_fails() {
        let mut design = amt_pair(0);
        // clear the transient marker
        let host = design.module_mut(HOST).unwrap();
        let amt = host.cell_by_name("amt0").unwrap();
        host.cell_mut(amt).buggy = false;
        let mut pipeline = BasicPipeline::new();
        let err = create_amt_miter(&mut design, &[], &mut pipeline).unwrap_err();
        assert!(matches!(err, VerifyError::MissingBuggy(_)));
    }
}
