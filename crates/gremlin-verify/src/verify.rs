//! Two-phase bounded verification
//!
//! Phase one (sensitization) searches for a time step at which a buggy AMT
//! row is selected on the host while host and reference outputs differ.
//! On success the whole model prefix is frozen as hard constraints and
//! phase two (propagation) extends the trace step by step until the
//! observables diverge. Timeouts are a distinct verdict and never mask an
//! earlier SAT.

use crate::miter::MITER;
use crate::{VerifyError, VerifyResult};
use gremlin_amt::Selection;
use gremlin_ir::{Design, Module, SigBit, SigSpec, State};
use gremlin_sat::{
    DivByZero, Encoder, EncoderOptions, Lit, SatError, SolveResult, Solver, TimeStep, UnknownCells,
};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Sensitization,
    Propagation,
}

/// Per-bug outcome of the bounded search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The divergence reached the observables
    Propagated { sensitized_at: TimeStep, propagated_at: TimeStep },
    /// The buggy location never produced a local divergence within the
    /// sensitization bound
    NotSensitized,
    /// Sensitized, but the divergence never reached the observables within
    /// the propagation bound
    NotPropagated { sensitized_at: TimeStep },
    /// A solve hit the wall-clock limit
    Timeout { phase: Phase },
}

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub max_sensitization: TimeStep,
    pub max_propagation: TimeStep,
    /// Per-solve wall-clock limit
    pub timeout: Option<Duration>,
    /// Enable the four-valued (undef) encoding
    pub model_undef: bool,
    /// Force all initial registers not otherwise constrained to zero
    pub set_init_zero: bool,
    /// Forbid undef initial registers (needs `model_undef`)
    pub set_init_def: bool,
    /// User-supplied initial values by wire name
    pub sets_init: Vec<(String, gremlin_ir::Const)>,
    pub ignore_unknown_cells: bool,
    pub div_by_zero: DivByZero,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        VerifyOptions {
            max_sensitization: 20,
            max_propagation: 32,
            timeout: None,
            model_undef: false,
            set_init_zero: false,
            set_init_def: false,
            sets_init: Vec::new(),
            ignore_unknown_cells: false,
            div_by_zero: DivByZero::default(),
        }
    }
}

/// Verify the `miter` module of `design`. For AMT bugs pass the host's
/// table rows so the sensitization predicate can require a buggy row to be
/// selected; for driver bugs pass `None`.
pub fn verify_miter(
    design: &Design,
    buggy_rows: Option<&[Selection]>,
    opts: &VerifyOptions,
) -> VerifyResult<Verdict> {
    let module = design
        .module(MITER)
        .ok_or_else(|| VerifyError::MissingModule(MITER.into()))?;

    let port = |name: &'static str| -> VerifyResult<SigSpec> {
        let wire = module
            .wire_by_name(name)
            .ok_or_else(|| VerifyError::MissingWire(MITER.into(), name.into()))?;
        Ok(module.wire_sig(wire))
    };
    let host_output = port("host_output")?;
    let reference_output = port("reference_output")?;
    if host_output.len() != reference_output.len() {
        return Err(VerifyError::PortSizeMismatch("output"));
    }
    let host_observables = port("host_observables")?;
    let reference_observables = port("reference_observables")?;
    if host_observables.len() != reference_observables.len() {
        return Err(VerifyError::PortSizeMismatch("observables"));
    }

    // the defined bits of every buggy row, against the host select port
    let mut buggy_patterns: Vec<(SigSpec, SigSpec)> = Vec::new();
    if let Some(rows) = buggy_rows {
        let select = port("host_select")?;
        for row in rows.iter().filter(|r| r.buggy) {
            let mut circuit = SigSpec::new();
            let mut value = SigSpec::new();
            for (j, state) in row.pattern.bits().iter().enumerate() {
                if state.is_defined() {
                    circuit.push(select.bit(j));
                    value.push(SigBit::Const(*state));
                }
            }
            log::debug!("buggy row constrains {} select bits", circuit.len());
            buggy_patterns.push((circuit, value));
        }
    }

    let mut solver = Solver::new();
    solver.set_solver_timeout(opts.timeout);
    let encoder_options = EncoderOptions {
        model_undef: opts.model_undef,
        div_by_zero: opts.div_by_zero,
        unknown_cells: if opts.ignore_unknown_cells {
            UnknownCells::Skip
        } else {
            UnknownCells::Fail
        },
    };
    let mut harness = MiterHarness {
        module,
        encoder: Encoder::new(module, solver, encoder_options),
        model_lits: Vec::new(),
        opts,
    };

    log::info!("sensitizing the bug");
    let mut t = 1;
    while t <= opts.max_sensitization {
        harness.setup(t, t == 1)?;

        let neq = {
            let eq = harness
                .encoder
                .signals_eq(&host_output, &reference_output, t, t);
            !eq
        };
        let condition = if buggy_patterns.is_empty() {
            neq
        } else {
            let mut clause = Vec::new();
            for (circuit, value) in &buggy_patterns {
                clause.push(harness.encoder.signals_eq(circuit, value, t, t));
            }
            let any_buggy = harness.encoder.solver_mut().expression_or(&clause);
            harness.encoder.solver_mut().and(any_buggy, neq)
        };

        match harness.solve(condition) {
            Ok(SolveResult::Sat) => {
                log::info!("sensitized the bug at step {t}");
                harness.lock_model();

                let mut t2 = t + 1;
                while t2 <= opts.max_propagation {
                    harness.setup(t2, t2 == 1)?;
                    let prop = {
                        let eq = harness.encoder.signals_eq(
                            &host_observables,
                            &reference_observables,
                            t2,
                            t2,
                        );
                        !eq
                    };
                    match harness.solve(prop) {
                        Ok(SolveResult::Sat) => {
                            log::info!("propagated the bug at step {t2}");
                            return Ok(Verdict::Propagated {
                                sensitized_at: t,
                                propagated_at: t2,
                            });
                        }
                        Ok(SolveResult::Unsat) => t2 += 1,
                        Err(SatError::TimedOut) => {
                            log::warn!("timed out during propagation");
                            return Ok(Verdict::Timeout { phase: Phase::Propagation });
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                log::info!("failed to propagate the bug");
                return Ok(Verdict::NotPropagated { sensitized_at: t });
            }
            Ok(SolveResult::Unsat) => t += 1,
            Err(SatError::TimedOut) => {
                log::warn!("timed out during sensitization");
                return Ok(Verdict::Timeout { phase: Phase::Sensitization });
            }
            Err(err) => return Err(err.into()),
        }
    }
    log::info!("failed to sensitize the bug");
    Ok(Verdict::NotSensitized)
}

struct MiterHarness<'a> {
    module: &'a Module,
    encoder: Encoder,
    /// Literals frozen as hard constraints once sensitization succeeds:
    /// inputs at every set-up step plus the initial-state pool
    model_lits: Vec<Lit>,
    opts: &'a VerifyOptions,
}

impl<'a> MiterHarness<'a> {
    /// Materialize all cells at time `t`; at the initial step apply the
    /// initial-state constraints.
    fn setup(&mut self, t: TimeStep, initstate: bool) -> VerifyResult<()> {
        log::debug!("setting up time step {t}");
        if initstate {
            self.encoder.set_init_state(t);
        }
        for cell_id in self.module.cell_ids() {
            self.encoder.import_cell(self.module, cell_id, t)?;
        }
        for wire_id in self.module.input_wires() {
            let sig = self.module.wire_sig(wire_id);
            let lits = self.encoder.import_sig(&sig, t);
            self.model_lits.extend(lits);
            if self.opts.model_undef {
                let undef = self.encoder.import_undef_sig(&sig, t);
                self.model_lits.extend(undef);
            }
        }
        if initstate {
            self.apply_initial_state(t)?;
        }
        Ok(())
    }

    fn apply_initial_state(&mut self, t: TimeStep) -> VerifyResult<()> {
        let pool: HashSet<SigBit> = self.encoder.initial_state_pool().iter().copied().collect();
        let mut constrained: HashSet<SigBit> = HashSet::new();

        let constrain_bit = |encoder: &mut Encoder,
                                 constrained: &mut HashSet<SigBit>,
                                 bit: SigBit,
                                 value: State| {
            let canonical = encoder.canonicalize(&SigSpec::from_bit(bit)).bit(0);
            if !pool.contains(&canonical) || !constrained.insert(canonical) {
                return;
            }
            match value.as_bool() {
                Some(v) => {
                    let lit = encoder.import_sig(&SigSpec::from_bit(bit), t)[0];
                    encoder.solver_mut().assume(if v { lit } else { !lit });
                }
                None => {
                    // an x initial value leaves the register free
                }
            }
        };

        // per-wire init attributes
        for wire in self.module.wires() {
            let Some(init) = wire.init.clone() else { continue };
            for (i, state) in init.bits().iter().enumerate() {
                if (i as u32) < wire.width {
                    constrain_bit(
                        &mut self.encoder,
                        &mut constrained,
                        SigBit::wire(wire.id, i as u32),
                        *state,
                    );
                }
            }
        }
        // user-supplied initial values
        for (name, value) in &self.opts.sets_init {
            let wire_id = self
                .module
                .wire_by_name(name)
                .ok_or_else(|| VerifyError::MissingWire(MITER.into(), name.clone()))?;
            for (i, state) in value.bits().iter().enumerate() {
                if (i as u32) < self.module.wire(wire_id).width {
                    constrain_bit(
                        &mut self.encoder,
                        &mut constrained,
                        SigBit::wire(wire_id, i as u32),
                        *state,
                    );
                }
            }
        }
        // remaining pool registers
        let remaining: Vec<SigBit> = self
            .encoder
            .initial_state_pool()
            .iter()
            .filter(|b| !constrained.contains(b))
            .copied()
            .collect();
        if self.opts.set_init_zero {
            for bit in &remaining {
                let lit = self.encoder.import_sig(&SigSpec::from_bit(*bit), t)[0];
                self.encoder.solver_mut().assume(!lit);
            }
        }
        if self.opts.set_init_def && self.opts.model_undef {
            for bit in self.encoder.initial_state_pool().to_vec() {
                let lit = self.encoder.import_undef_sig(&SigSpec::from_bit(bit), t)[0];
                self.encoder.solver_mut().assume(!lit);
            }
        }
        // the pool belongs to the frozen model prefix
        for bit in self.encoder.initial_state_pool().to_vec() {
            let lit = self.encoder.import_sig(&SigSpec::from_bit(bit), t)[0];
            self.model_lits.push(lit);
            if self.opts.model_undef {
                let undef = self.encoder.import_undef_sig(&SigSpec::from_bit(bit), t)[0];
                self.model_lits.push(undef);
            }
        }
        Ok(())
    }

    fn solve(&mut self, condition: Lit) -> Result<SolveResult, SatError> {
        let solver = self.encoder.solver_mut();
        log::debug!(
            "solving with {} variables and {} clauses",
            solver.num_vars(),
            solver.num_clauses()
        );
        solver.solve(&[condition])
    }

    /// Freeze the current model as hard constraints, fixing the
    /// counter-example prefix before the propagation phase.
    fn lock_model(&mut self) {
        let solver = self.encoder.solver_mut();
        for &lit in &self.model_lits {
            let value = solver.model_value(lit);
            solver.assume(if value { lit } else { !lit });
        }
    }
}
