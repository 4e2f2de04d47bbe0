//! End-to-end miter verification scenarios
//!
//! Each test builds a host/reference pair in memory, composes and lowers
//! the miter, and runs the two-phase bounded search with a real solver.

use gremlin_amt::{write_table, Selection};
use gremlin_ir::{BasicPipeline, CellType, Const, Design, Module, SigSpec};
use gremlin_verify::{
    create_amt_miter, create_driver_miter, verify_miter, Verdict, VerifyOptions, HOST, REFERENCE,
};

/// Host/reference pair around a 2-bit-select AMT. The row for S=10 maps to
/// `host_value` in the host and to 1 in the reference; the AMT output feeds
/// the observable wire.
fn amt_design(host_value: u64) -> Design {
    let mut design = Design::new();
    for (name, value) in [(HOST, host_value), (REFERENCE, 1u64)] {
        let mut m = Module::new(name);
        let s = m.add_wire("in_sel", 2).unwrap();
        m.wire_mut(s).port_input = true;
        let y = m.add_wire("y", 1).unwrap();
        let obs = m.add_wire("obs", 1).unwrap();
        m.fixup_ports();
        let (ss, sy, sobs) = (m.wire_sig(s), m.wire_sig(y), m.wire_sig(obs));
        m.connect(sobs, sy.clone()).unwrap();
        let amt = m.add_cell("amt0", CellType::Amt).unwrap();
        let cell = m.cell_mut(amt);
        cell.set_port("S", ss);
        cell.set_port("Y", sy);
        let mut rows = vec![
            Selection::new(Const::new(0b00, 2), SigSpec::from_const(&Const::new(0, 1))),
            Selection::new(Const::new(0b01, 2), SigSpec::from_const(&Const::new(0, 1))),
            Selection::new(Const::new(0b10, 2), SigSpec::from_const(&Const::new(value, 1))),
            Selection::new(Const::new(0b11, 2), SigSpec::from_const(&Const::new(0, 1))),
        ];
        rows[2].buggy = name == HOST;
        write_table(cell, &rows);
        if name == HOST {
            cell.buggy = true;
        }
        design.add_module(m).unwrap();
    }
    design
}

#[test]
fn divergent_amt_row_propagates() {
    let mut design = amt_design(0);
    let mut pipeline = BasicPipeline::new();
    let info = create_amt_miter(&mut design, &["obs".into()], &mut pipeline).unwrap();

    let opts = VerifyOptions { max_sensitization: 4, max_propagation: 8, ..Default::default() };
    let verdict = verify_miter(&design, Some(&info.selections), &opts).unwrap();
    assert_eq!(verdict, Verdict::Propagated { sensitized_at: 1, propagated_at: 2 });
}

#[test]
fn identical_modules_never_sensitize() {
    // host and reference agree on every row; only the marker differs
    let mut design = amt_design(1);
    let mut pipeline = BasicPipeline::new();
    let info = create_amt_miter(&mut design, &["obs".into()], &mut pipeline).unwrap();

    let opts = VerifyOptions { max_sensitization: 3, max_propagation: 4, ..Default::default() };
    let verdict = verify_miter(&design, Some(&info.selections), &opts).unwrap();
    assert_eq!(verdict, Verdict::NotSensitized);
}

/// Driver mix-up whose target is dead downstream: the host drives `y` from
/// `b` instead of `a`, but only `a` is observable.
fn driver_design() -> Design {
    let mut design = Design::new();
    for name in [HOST, REFERENCE] {
        let mut m = Module::new(name);
        let a = m.add_wire("a", 1).unwrap();
        let b = m.add_wire("b", 1).unwrap();
        m.wire_mut(a).port_input = true;
        m.wire_mut(b).port_input = true;
        let y = m.add_wire("y", 1).unwrap();
        let obs = m.add_wire("obs", 1).unwrap();
        m.fixup_ports();
        let (sa, sb) = (m.wire_sig(a), m.wire_sig(b));
        let (sy, sobs) = (m.wire_sig(y), m.wire_sig(obs));
        let driver = if name == HOST { sb } else { sa.clone() };
        m.connect(sy, driver).unwrap();
        m.connect(sobs, sa).unwrap();
        if name == HOST {
            m.wire_mut(y).buggy = true;
        }
        design.add_module(m).unwrap();
    }
    design
}

#[test]
fn dead_target_sensitizes_but_does_not_propagate() {
    let mut design = driver_design();
    let mut pipeline = BasicPipeline::new();
    create_driver_miter(&mut design, &["obs".into()], &mut pipeline).unwrap();

    let opts = VerifyOptions { max_sensitization: 3, max_propagation: 4, ..Default::default() };
    let verdict = verify_miter(&design, None, &opts).unwrap();
    assert_eq!(verdict, Verdict::NotPropagated { sensitized_at: 1 });
}

/// A sequential host: the buggy row only becomes selectable one step after
/// reset, exercising the register linking across time steps.
#[test]
fn sequential_divergence_found_after_reset_step() {
    let mut design = Design::new();
    for name in [HOST, REFERENCE] {
        let mut m = Module::new(name);
        let clk = m.add_wire("clk", 1).unwrap();
        m.wire_mut(clk).port_input = true;
        let din = m.add_wire("din", 1).unwrap();
        m.wire_mut(din).port_input = true;
        let q = m.add_wire("q", 1).unwrap();
        m.wire_mut(q).init = Some(Const::new(0, 1));
        let y = m.add_wire("y", 1).unwrap();
        let obs = m.add_wire("obs", 1).unwrap();
        m.fixup_ports();
        let (sclk, sdin) = (m.wire_sig(clk), m.wire_sig(din));
        let (sq, sy, sobs) = (m.wire_sig(q), m.wire_sig(y), m.wire_sig(obs));
        m.connect(sobs, sy.clone()).unwrap();

        let ff = m.add_cell("ff0", CellType::Dff).unwrap();
        {
            let cell = m.cell_mut(ff);
            cell.set_port("CLK", sclk);
            cell.set_port("D", sdin);
            cell.set_port("Q", sq.clone());
        }

        let amt = m.add_cell("amt0", CellType::Amt).unwrap();
        let cell = m.cell_mut(amt);
        cell.set_port("S", sq);
        cell.set_port("Y", sy);
        // q=1 selects the divergent row; q starts at 0
        let mut rows = vec![
            Selection::new(Const::new(0, 1), SigSpec::from_const(&Const::new(0, 1))),
            Selection::new(
                Const::new(1, 1),
                SigSpec::from_const(&Const::new(if name == HOST { 0 } else { 1 }, 1)),
            ),
        ];
        rows[1].buggy = name == HOST;
        write_table(cell, &rows);
        if name == HOST {
            cell.buggy = true;
        }
        design.add_module(m).unwrap();
    }

    let mut pipeline = BasicPipeline::new();
    let info = create_amt_miter(&mut design, &["obs".into()], &mut pipeline).unwrap();
    let opts = VerifyOptions { max_sensitization: 4, max_propagation: 6, ..Default::default() };
    let verdict = verify_miter(&design, Some(&info.selections), &opts).unwrap();
    // step 1 has q = 0 on both sides, so sensitization needs step 2; the
    // exact propagation step depends on the frozen value of the step-2
    // input, which the sensitization model left unconstrained
    match verdict {
        Verdict::Propagated { sensitized_at: 2, propagated_at } => {
            assert!((3..=6).contains(&propagated_at));
        }
        other => panic!("expected propagation from step 2, got {other:?}"),
    }
}

#[test]
fn set_init_zero_constrains_free_registers() {
    // without init attributes, a free register could diverge at step 1;
    // forcing zero initial state delays sensitization to step 2
    let mut design = Design::new();
    for name in [HOST, REFERENCE] {
        let mut m = Module::new(name);
        let clk = m.add_wire("clk", 1).unwrap();
        m.wire_mut(clk).port_input = true;
        let din = m.add_wire("din", 1).unwrap();
        m.wire_mut(din).port_input = true;
        let q = m.add_wire("q", 1).unwrap();
        let y = m.add_wire("y", 1).unwrap();
        let obs = m.add_wire("obs", 1).unwrap();
        m.fixup_ports();
        let (sclk, sdin) = (m.wire_sig(clk), m.wire_sig(din));
        let (sq, sy, sobs) = (m.wire_sig(q), m.wire_sig(y), m.wire_sig(obs));
        m.connect(sobs, sy.clone()).unwrap();
        let ff = m.add_cell("ff0", CellType::Dff).unwrap();
        {
            let cell = m.cell_mut(ff);
            cell.set_port("CLK", sclk);
            cell.set_port("D", sdin);
            cell.set_port("Q", sq.clone());
        }
        let amt = m.add_cell("amt0", CellType::Amt).unwrap();
        let cell = m.cell_mut(amt);
        cell.set_port("S", sq);
        cell.set_port("Y", sy);
        let mut rows = vec![
            Selection::new(Const::new(0, 1), SigSpec::from_const(&Const::new(0, 1))),
            Selection::new(
                Const::new(1, 1),
                SigSpec::from_const(&Const::new(if name == HOST { 0 } else { 1 }, 1)),
            ),
        ];
        rows[1].buggy = name == HOST;
        write_table(cell, &rows);
        if name == HOST {
            cell.buggy = true;
        }
        design.add_module(m).unwrap();
    }

    let mut pipeline = BasicPipeline::new();
    let info = create_amt_miter(&mut design, &["obs".into()], &mut pipeline).unwrap();
    let opts = VerifyOptions {
        max_sensitization: 4,
        max_propagation: 6,
        set_init_zero: true,
        ..Default::default()
    };
    let verdict = verify_miter(&design, Some(&info.selections), &opts).unwrap();
    match verdict {
        Verdict::Propagated { sensitized_at: 2, propagated_at } => {
            assert!((3..=6).contains(&propagated_at));
        }
        other => panic!("expected propagation from step 2, got {other:?}"),
    }
}
