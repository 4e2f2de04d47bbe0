//! Time-indexed netlist-to-CNF encoder
//!
//! Imports signal vectors and cells of one module into an incremental SAT
//! instance. Time step `-1` denotes the combinational (untimed) problem;
//! positive steps form a discrete clock axis on which register cells link
//! present state at `t` with the inputs sampled at `t-1`. Register outputs
//! first seen at step 1 are recorded in the initial-state pool.
//!
//! With `model_undef` enabled every bit gets a parallel undef literal;
//! cells gate their outputs conservatively: an undef input bit that can
//! influence an output forces the output's undef literal.

use crate::solver::{Lit, Solver};
use crate::{SatError, SatResult};
use gremlin_amt::read_table;
use gremlin_ir::{Cell, CellId, CellType, Const, Module, SigBit, SigMap, SigSpec, State};
use std::collections::{HashMap, HashSet};

pub type TimeStep = i32;

/// The combinational, untimed problem.
pub const COMB_STEP: TimeStep = -1;

/// Division-by-zero semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DivByZero {
    /// The result is entirely undefined
    #[default]
    Undef,
    /// The result is zero
    Zero,
}

/// What to do with cells this encoder has no semantics for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownCells {
    #[default]
    Fail,
    Skip,
}

#[derive(Debug, Clone, Default)]
pub struct EncoderOptions {
    pub model_undef: bool,
    pub div_by_zero: DivByZero,
    pub unknown_cells: UnknownCells,
}

pub struct Encoder {
    solver: Solver,
    sigmap: SigMap,
    options: EncoderOptions,
    imported: HashMap<(TimeStep, SigBit), Lit>,
    imported_undef: HashMap<(TimeStep, SigBit), Lit>,
    initial_state: Vec<SigBit>,
    initial_state_seen: HashSet<SigBit>,
    init_steps: HashSet<TimeStep>,
    asserts_at: HashMap<TimeStep, Vec<(SigSpec, SigSpec)>>,
    assumes_at: HashMap<TimeStep, Vec<(SigSpec, SigSpec)>>,
    mem_state: HashMap<(CellId, u64, TimeStep), Vec<Lit>>,
}

impl Encoder {
    /// Build an encoder over `module`'s current connections. The
    /// canonicalizing view is snapshotted here; the module's connections
    /// must not change while this encoder is in use.
    pub fn new(module: &Module, solver: Solver, options: EncoderOptions) -> Self {
        Encoder {
            solver,
            sigmap: SigMap::new(module),
            options,
            imported: HashMap::new(),
            imported_undef: HashMap::new(),
            initial_state: Vec::new(),
            initial_state_seen: HashSet::new(),
            init_steps: HashSet::new(),
            asserts_at: HashMap::new(),
            assumes_at: HashMap::new(),
            mem_state: HashMap::new(),
        }
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Register Q bits collected at time step 1, in first-seen order.
    pub fn initial_state_pool(&self) -> &[SigBit] {
        &self.initial_state
    }

    /// Apply the encoder's canonicalizing view to a signal.
    pub fn canonicalize(&self, sig: &SigSpec) -> SigSpec {
        self.sigmap.apply(sig)
    }

    /// Mark `t` as the time step carrying the design's initial state.
    pub fn set_init_state(&mut self, t: TimeStep) {
        self.init_steps.insert(t);
    }

    pub fn is_init_step(&self, t: TimeStep) -> bool {
        self.init_steps.contains(&t)
    }

    fn bit_name(bit: &SigBit, t: TimeStep) -> String {
        match bit {
            SigBit::Wire { wire, offset } => format!("t{}:w{}[{}]", t, wire.0, offset),
            SigBit::Const(s) => format!("t{}:{}", t, s.to_char()),
        }
    }

    fn import_bit(&mut self, bit: SigBit, t: TimeStep, dup_undef: bool) -> Lit {
        match bit {
            SigBit::Const(State::S1) => self.solver.const_true(),
            SigBit::Const(State::Sx) if self.options.model_undef && dup_undef => {
                self.solver.literal()
            }
            SigBit::Const(_) => self.solver.const_false(),
            SigBit::Wire { .. } => {
                if let Some(&lit) = self.imported.get(&(t, bit)) {
                    return lit;
                }
                let lit = self.solver.frozen_literal(Self::bit_name(&bit, t));
                self.imported.insert((t, bit), lit);
                lit
            }
        }
    }

    fn import_undef_bit(&mut self, bit: SigBit, t: TimeStep) -> Lit {
        match bit {
            SigBit::Const(State::Sx) => self.solver.const_true(),
            SigBit::Const(_) => self.solver.const_false(),
            SigBit::Wire { .. } => {
                if let Some(&lit) = self.imported_undef.get(&(t, bit)) {
                    return lit;
                }
                let name = format!("undef:{}", Self::bit_name(&bit, t));
                let lit = self.solver.frozen_literal(name);
                self.imported_undef.insert((t, bit), lit);
                lit
            }
        }
    }

    /// Import the value literals of a signal at time `t`.
    pub fn import_sig(&mut self, sig: &SigSpec, t: TimeStep) -> Vec<Lit> {
        let sig = self.sigmap.apply(sig);
        sig.bits().iter().map(|&b| self.import_bit(b, t, false)).collect()
    }

    /// Like `import_sig`, but constant undef bits become fresh free
    /// literals. Used for cell outputs.
    pub fn import_def_sig(&mut self, sig: &SigSpec, t: TimeStep) -> Vec<Lit> {
        let sig = self.sigmap.apply(sig);
        sig.bits().iter().map(|&b| self.import_bit(b, t, true)).collect()
    }

    /// Import the parallel undef literals of a signal at time `t`.
    pub fn import_undef_sig(&mut self, sig: &SigSpec, t: TimeStep) -> Vec<Lit> {
        let sig = self.sigmap.apply(sig);
        sig.bits().iter().map(|&b| self.import_undef_bit(b, t)).collect()
    }

    /// A literal that is true iff the two vectors agree at the given time
    /// steps: under four-valued semantics each bit pair must be either both
    /// undef, or both defined and equal.
    pub fn signals_eq(
        &mut self,
        a: &SigSpec,
        b: &SigSpec,
        t_a: TimeStep,
        t_b: TimeStep,
    ) -> Lit {
        let width = a.len().max(b.len());
        let mut a = a.clone();
        let mut b = b.clone();
        a.extend_u0(width, false);
        b.extend_u0(width, false);

        let va = self.import_sig(&a, t_a);
        let vb = self.import_sig(&b, t_b);
        if !self.options.model_undef {
            return self.solver.vec_eq(&va, &vb);
        }
        let ua = self.import_undef_sig(&a, t_a);
        let ub = self.import_undef_sig(&b, t_b);
        let mut eq_bits = Vec::with_capacity(width);
        for i in 0..width {
            let undef_eq = self.solver.iff(ua[i], ub[i]);
            let la = self.solver.or(va[i], ua[i]);
            let lb = self.solver.or(vb[i], ub[i]);
            let val_eq = self.solver.iff(la, lb);
            eq_bits.push(self.solver.and(undef_eq, val_eq));
        }
        self.solver.expression_and(&eq_bits)
    }

    /// Conjunction of all assertion cells imported at `t`: every enabled
    /// check bit must hold.
    pub fn import_asserts(&mut self, t: TimeStep) -> Lit {
        let pairs = self.asserts_at.get(&t).cloned().unwrap_or_default();
        self.checks_conjunction(&pairs, t)
    }

    /// Conjunction of all assumption cells imported at `t`.
    pub fn import_assumes(&mut self, t: TimeStep) -> Lit {
        let pairs = self.assumes_at.get(&t).cloned().unwrap_or_default();
        self.checks_conjunction(&pairs, t)
    }

    fn checks_conjunction(&mut self, pairs: &[(SigSpec, SigSpec)], t: TimeStep) -> Lit {
        let mut terms = Vec::new();
        for (a, en) in pairs {
            let (check, enable) = if self.options.model_undef {
                let va = self.import_def_sig(a, t);
                let ua = self.import_undef_sig(a, t);
                let ven = self.import_def_sig(en, t);
                let uen = self.import_undef_sig(en, t);
                let nua = self.solver.vec_not(&ua);
                let nuen = self.solver.vec_not(&uen);
                (self.solver.vec_and(&nua, &va), self.solver.vec_and(&nuen, &ven))
            } else {
                (self.import_sig(a, t), self.import_sig(en, t))
            };
            for (c, e) in check.iter().zip(enable.iter()) {
                terms.push(self.solver.or(*c, !*e));
            }
        }
        self.solver.expression_and(&terms)
    }

    // --- cell import ---

    /// Add clauses implementing `cell`'s behavior at time `t`.
    pub fn import_cell(&mut self, module: &Module, cell_id: CellId, t: TimeStep) -> SatResult<()> {
        let cell = module.cell(cell_id).clone();
        match &cell.ty {
            CellType::Not | CellType::Pos | CellType::Neg => self.import_unary(&cell, t),
            CellType::And | CellType::Or | CellType::Xor | CellType::Xnor => {
                self.import_bitwise(&cell, t)
            }
            CellType::ReduceAnd
            | CellType::ReduceOr
            | CellType::ReduceXor
            | CellType::ReduceXnor
            | CellType::ReduceBool
            | CellType::LogicNot => self.import_reduce(&cell, t),
            CellType::LogicAnd | CellType::LogicOr => self.import_logic_binary(&cell, t),
            CellType::Eq | CellType::Ne | CellType::Eqx | CellType::Nex => {
                self.import_compare_eq(&cell, t)
            }
            CellType::Lt | CellType::Le | CellType::Ge | CellType::Gt => {
                self.import_compare_order(&cell, t)
            }
            CellType::Add | CellType::Sub | CellType::Mul => self.import_arith(&cell, t),
            CellType::Div | CellType::Mod => self.import_divmod(&cell, t),
            CellType::Shl | CellType::Shr | CellType::Sshl | CellType::Sshr
            | CellType::Shift | CellType::Shiftx => self.import_shift(&cell, t),
            CellType::Mux => self.import_mux(&cell, t),
            CellType::Pmux => self.import_pmux(&cell, t),
            CellType::Amt => self.import_amt(&cell, t),
            CellType::Ff
            | CellType::Dff
            | CellType::Dffe
            | CellType::Sdff
            | CellType::Sdffe
            | CellType::Sdffce
            | CellType::Adff
            | CellType::Adffe
            | CellType::Aldff
            | CellType::Aldffe => self.import_ff(&cell, t),
            CellType::Dlatch | CellType::Adlatch => self.import_latch(&cell, t),
            CellType::Mem => self.import_mem(&cell, t),
            CellType::Assert => {
                let a = self.port(&cell, "A")?;
                let en = self.port(&cell, "EN")?;
                self.asserts_at.entry(t).or_default().push((a, en));
                Ok(())
            }
            CellType::Assume => {
                let a = self.port(&cell, "A")?;
                let en = self.port(&cell, "EN")?;
                self.assumes_at.entry(t).or_default().push((a, en));
                Ok(())
            }
            CellType::Instance(_) | CellType::Unknown(_) => match self.options.unknown_cells {
                UnknownCells::Fail => {
                    Err(SatError::UnknownCell(cell.name.clone(), cell.ty.name()))
                }
                UnknownCells::Skip => {
                    log::warn!("skipping cell `{}` of unknown type `{}`", cell.name, cell.ty.name());
                    Ok(())
                }
            },
        }
    }

    fn port(&self, cell: &Cell, name: &str) -> SatResult<SigSpec> {
        cell.port(name)
            .cloned()
            .ok_or_else(|| SatError::MissingPort(cell.name.clone(), name.to_string()))
    }

    /// Constrain the imported Y literals to `value`. With the undef plane
    /// enabled, the value is only forced where `undef` is false and the
    /// output undef literals are bound to `undef`.
    fn bind_output(
        &mut self,
        y: &SigSpec,
        t: TimeStep,
        value: &[Lit],
        undef: Option<Vec<Lit>>,
    ) {
        let ylits = self.import_def_sig(y, t);
        debug_assert_eq!(ylits.len(), value.len());
        if !self.options.model_undef {
            for (a, b) in ylits.iter().zip(value.iter()) {
                let eq = self.solver.iff(*a, *b);
                self.solver.assume(eq);
            }
            return;
        }
        let f = self.solver.const_false();
        let undef = undef.unwrap_or_else(|| vec![f; value.len()]);
        let yundef = self.import_undef_sig(y, t);
        for i in 0..value.len() {
            let eq = self.solver.iff(ylits[i], value[i]);
            let gated = self.solver.or(undef[i], eq);
            self.solver.assume(gated);
            let ueq = self.solver.iff(yundef[i], undef[i]);
            self.solver.assume(ueq);
        }
    }

    fn any_undef(&mut self, sigs: &[&SigSpec], t: TimeStep) -> Lit {
        if !self.options.model_undef {
            return self.solver.const_false();
        }
        let mut all = Vec::new();
        for sig in sigs {
            all.extend(self.import_undef_sig(sig, t));
        }
        self.solver.expression_or(&all)
    }

    fn all_undef_vec(&mut self, any: Lit, width: usize) -> Option<Vec<Lit>> {
        if self.options.model_undef {
            Some(vec![any; width])
        } else {
            None
        }
    }

    fn import_unary(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let width = y.len();
        let mut a = self.port(cell, "A")?;
        a.extend_u0(width, cell.param_bool("A_SIGNED"));
        let va = self.import_sig(&a, t);
        let (value, undef) = match cell.ty {
            CellType::Not => {
                let v = self.solver.vec_not(&va);
                let u = if self.options.model_undef {
                    Some(self.import_undef_sig(&a, t))
                } else {
                    None
                };
                (v, u)
            }
            CellType::Pos => {
                let u = if self.options.model_undef {
                    Some(self.import_undef_sig(&a, t))
                } else {
                    None
                };
                (va, u)
            }
            CellType::Neg => {
                let v = self.solver.vec_neg(&va);
                let any = self.any_undef(&[&a], t);
                (v, self.all_undef_vec(any, width))
            }
            _ => unreachable!(),
        };
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    fn import_bitwise(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let mut a = self.port(cell, "A")?;
        let mut b = self.port(cell, "B")?;
        let width = y.len().max(a.len()).max(b.len());
        a.extend_u0(width, cell.param_bool("A_SIGNED"));
        b.extend_u0(width, cell.param_bool("B_SIGNED"));
        let va = self.import_sig(&a, t);
        let vb = self.import_sig(&b, t);
        let mut value = match cell.ty {
            CellType::And => self.solver.vec_and(&va, &vb),
            CellType::Or => self.solver.vec_or(&va, &vb),
            CellType::Xor => self.solver.vec_xor(&va, &vb),
            CellType::Xnor => {
                let x = self.solver.vec_xor(&va, &vb);
                self.solver.vec_not(&x)
            }
            _ => unreachable!(),
        };
        let undef = if self.options.model_undef {
            let ua = self.import_undef_sig(&a, t);
            let ub = self.import_undef_sig(&b, t);
            let mut u = Vec::with_capacity(width);
            for i in 0..width {
                let either = self.solver.or(ua[i], ub[i]);
                let bit = match cell.ty {
                    CellType::And => {
                        // a defined 0 forces the output regardless of the
                        // other operand
                        let def0_a = {
                            let na = self.solver.not(va[i]);
                            let nua = self.solver.not(ua[i]);
                            self.solver.and(na, nua)
                        };
                        let def0_b = {
                            let nb = self.solver.not(vb[i]);
                            let nub = self.solver.not(ub[i]);
                            self.solver.and(nb, nub)
                        };
                        let forced = self.solver.or(def0_a, def0_b);
                        self.solver.and(either, !forced)
                    }
                    CellType::Or => {
                        let def1_a = {
                            let nua = self.solver.not(ua[i]);
                            self.solver.and(va[i], nua)
                        };
                        let def1_b = {
                            let nub = self.solver.not(ub[i]);
                            self.solver.and(vb[i], nub)
                        };
                        let forced = self.solver.or(def1_a, def1_b);
                        self.solver.and(either, !forced)
                    }
                    _ => either,
                };
                u.push(bit);
            }
            Some(u)
        } else {
            None
        };
        value.truncate(y.len());
        let undef = undef.map(|mut u| {
            u.truncate(y.len());
            u
        });
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    fn import_reduce(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let a = self.port(cell, "A")?;
        let va = self.import_sig(&a, t);
        let bit = match cell.ty {
            CellType::ReduceAnd => self.solver.vec_reduce_and(&va),
            CellType::ReduceOr | CellType::ReduceBool => self.solver.vec_reduce_or(&va),
            CellType::ReduceXor => self.solver.vec_reduce_xor(&va),
            CellType::ReduceXnor => {
                let x = self.solver.vec_reduce_xor(&va);
                !x
            }
            CellType::LogicNot => {
                let any = self.solver.vec_reduce_or(&va);
                !any
            }
            _ => unreachable!(),
        };
        let f = self.solver.const_false();
        let mut value = vec![f; y.len()];
        if !value.is_empty() {
            value[0] = bit;
        }
        let undef = if self.options.model_undef {
            let ua = self.import_undef_sig(&a, t);
            let any = self.solver.expression_or(&ua);
            // a defined controlling bit makes the reduction defined
            let forced = match cell.ty {
                CellType::ReduceAnd => {
                    let mut def0 = Vec::new();
                    for i in 0..va.len() {
                        let nv = self.solver.not(va[i]);
                        let nu = self.solver.not(ua[i]);
                        def0.push(self.solver.and(nv, nu));
                    }
                    self.solver.expression_or(&def0)
                }
                CellType::ReduceOr | CellType::ReduceBool | CellType::LogicNot => {
                    let mut def1 = Vec::new();
                    for i in 0..va.len() {
                        let nu = self.solver.not(ua[i]);
                        def1.push(self.solver.and(va[i], nu));
                    }
                    self.solver.expression_or(&def1)
                }
                _ => f,
            };
            let u0 = self.solver.and(any, !forced);
            let mut u = vec![f; y.len()];
            if !u.is_empty() {
                u[0] = u0;
            }
            Some(u)
        } else {
            None
        };
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    fn import_logic_binary(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let a = self.port(cell, "A")?;
        let b = self.port(cell, "B")?;
        let va = self.import_sig(&a, t);
        let vb = self.import_sig(&b, t);
        let bool_a = self.solver.vec_reduce_or(&va);
        let bool_b = self.solver.vec_reduce_or(&vb);
        let bit = match cell.ty {
            CellType::LogicAnd => self.solver.and(bool_a, bool_b),
            CellType::LogicOr => self.solver.or(bool_a, bool_b),
            _ => unreachable!(),
        };
        let f = self.solver.const_false();
        let mut value = vec![f; y.len()];
        if !value.is_empty() {
            value[0] = bit;
        }
        let any = self.any_undef(&[&a, &b], t);
        let undef = if self.options.model_undef {
            let mut u = vec![f; y.len()];
            if !u.is_empty() {
                u[0] = any;
            }
            Some(u)
        } else {
            None
        };
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    fn import_compare_eq(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let mut a = self.port(cell, "A")?;
        let mut b = self.port(cell, "B")?;
        let width = a.len().max(b.len());
        a.extend_u0(width, cell.param_bool("A_SIGNED"));
        b.extend_u0(width, cell.param_bool("B_SIGNED"));
        let exact = matches!(cell.ty, CellType::Eqx | CellType::Nex);
        let negate = matches!(cell.ty, CellType::Ne | CellType::Nex);

        let bit = if exact && self.options.model_undef {
            // eqx/nex compare undef bits as values and always produce a
            // defined result
            self.signals_eq(&a, &b, t, t)
        } else {
            let va = self.import_sig(&a, t);
            let vb = self.import_sig(&b, t);
            self.solver.vec_eq(&va, &vb)
        };
        let bit = if negate { !bit } else { bit };
        let f = self.solver.const_false();
        let mut value = vec![f; y.len()];
        if !value.is_empty() {
            value[0] = bit;
        }
        let undef = if self.options.model_undef && !exact {
            let any = self.any_undef(&[&a, &b], t);
            let mut u = vec![f; y.len()];
            if !u.is_empty() {
                u[0] = any;
            }
            Some(u)
        } else if self.options.model_undef {
            Some(vec![f; y.len()])
        } else {
            None
        };
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    fn import_compare_order(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let mut a = self.port(cell, "A")?;
        let mut b = self.port(cell, "B")?;
        let signed = cell.param_bool("A_SIGNED") && cell.param_bool("B_SIGNED");
        let width = a.len().max(b.len());
        a.extend_u0(width, cell.param_bool("A_SIGNED"));
        b.extend_u0(width, cell.param_bool("B_SIGNED"));
        let va = self.import_sig(&a, t);
        let vb = self.import_sig(&b, t);
        let bit = match cell.ty {
            CellType::Lt => self.solver.vec_lt(&va, &vb, signed),
            CellType::Gt => self.solver.vec_lt(&vb, &va, signed),
            CellType::Le => {
                let gt = self.solver.vec_lt(&vb, &va, signed);
                !gt
            }
            CellType::Ge => {
                let lt = self.solver.vec_lt(&va, &vb, signed);
                !lt
            }
            _ => unreachable!(),
        };
        let f = self.solver.const_false();
        let mut value = vec![f; y.len()];
        if !value.is_empty() {
            value[0] = bit;
        }
        let any = self.any_undef(&[&a, &b], t);
        let undef = if self.options.model_undef {
            let mut u = vec![f; y.len()];
            if !u.is_empty() {
                u[0] = any;
            }
            Some(u)
        } else {
            None
        };
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    fn import_arith(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let mut a = self.port(cell, "A")?;
        let mut b = self.port(cell, "B")?;
        let width = y.len().max(a.len()).max(b.len());
        a.extend_u0(width, cell.param_bool("A_SIGNED"));
        b.extend_u0(width, cell.param_bool("B_SIGNED"));
        let va = self.import_sig(&a, t);
        let vb = self.import_sig(&b, t);
        let mut value = match cell.ty {
            CellType::Add => self.solver.vec_add(&va, &vb),
            CellType::Sub => self.solver.vec_sub(&va, &vb),
            CellType::Mul => self.solver.vec_mul(&va, &vb),
            _ => unreachable!(),
        };
        value.truncate(y.len());
        let any = self.any_undef(&[&a, &b], t);
        let undef = self.all_undef_vec(any, y.len());
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    fn import_divmod(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let mut a = self.port(cell, "A")?;
        let mut b = self.port(cell, "B")?;
        let signed = cell.param_bool("A_SIGNED") && cell.param_bool("B_SIGNED");
        let width = y.len().max(a.len()).max(b.len());
        a.extend_u0(width, cell.param_bool("A_SIGNED"));
        b.extend_u0(width, cell.param_bool("B_SIGNED"));
        let va = self.import_sig(&a, t);
        let vb = self.import_sig(&b, t);

        let (abs_a, abs_b) = if signed {
            let sa = va[width - 1];
            let sb = vb[width - 1];
            let na = self.solver.vec_neg(&va);
            let nb = self.solver.vec_neg(&vb);
            (self.solver.vec_ite(sa, &na, &va), self.solver.vec_ite(sb, &nb, &vb))
        } else {
            (va.clone(), vb.clone())
        };
        let (quot, rem) = self.solver.vec_divmod_unsigned(&abs_a, &abs_b);
        let mut value = if matches!(cell.ty, CellType::Div) {
            if signed {
                let sa = va[width - 1];
                let sb = vb[width - 1];
                let neg_result = self.solver.xor(sa, sb);
                let nq = self.solver.vec_neg(&quot);
                self.solver.vec_ite(neg_result, &nq, &quot)
            } else {
                quot
            }
        } else if signed {
            // truncating semantics: the remainder takes the dividend's sign
            let sa = va[width - 1];
            let nr = self.solver.vec_neg(&rem);
            self.solver.vec_ite(sa, &nr, &rem)
        } else {
            rem
        };

        let b_nonzero = self.solver.vec_reduce_or(&vb);
        let b_zero = !b_nonzero;
        let mut undef_extra = None;
        match self.options.div_by_zero {
            DivByZero::Zero => {
                let zeros = self.solver.vec_const(0, width);
                value = self.solver.vec_ite(b_zero, &zeros, &value);
            }
            DivByZero::Undef => {
                if self.options.model_undef {
                    undef_extra = Some(b_zero);
                } else {
                    let free = self.solver.vec_literals(width);
                    value = self.solver.vec_ite(b_zero, &free, &value);
                }
            }
        }
        value.truncate(y.len());
        let any = self.any_undef(&[&a, &b], t);
        let undef = if self.options.model_undef {
            let base = match undef_extra {
                Some(z) => self.solver.or(any, z),
                None => any,
            };
            Some(vec![base; y.len()])
        } else {
            None
        };
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    fn import_shift(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let mut a = self.port(cell, "A")?;
        let b = self.port(cell, "B")?;
        let a_signed = cell.param_bool("A_SIGNED");
        let b_signed = cell.param_bool("B_SIGNED");
        let width = y.len().max(a.len());
        a.extend_u0(width, a_signed);
        let va = self.import_sig(&a, t);
        let vb = self.import_sig(&b, t);
        let f = self.solver.const_false();
        let sign_a = *va.last().unwrap_or(&f);

        let value = match cell.ty {
            CellType::Shl | CellType::Sshl => self.solver.vec_shift_unsigned(&va, &vb, true, f),
            CellType::Shr => self.solver.vec_shift_unsigned(&va, &vb, false, f),
            CellType::Sshr => {
                let fill = if a_signed { sign_a } else { f };
                self.solver.vec_shift_unsigned(&va, &vb, false, fill)
            }
            CellType::Shift | CellType::Shiftx => {
                let fill = if matches!(cell.ty, CellType::Shiftx) {
                    self.solver.literal()
                } else {
                    f
                };
                if b_signed {
                    // a negative shift amount shifts the other way
                    let sign_b = *vb.last().unwrap_or(&f);
                    let neg_b = self.solver.vec_neg(&vb);
                    let right = self.solver.vec_shift_unsigned(&va, &vb, false, fill);
                    let left = self.solver.vec_shift_unsigned(&va, &neg_b, true, fill);
                    self.solver.vec_ite(sign_b, &left, &right)
                } else {
                    self.solver.vec_shift_unsigned(&va, &vb, false, fill)
                }
            }
            _ => unreachable!(),
        };
        let mut value = value;
        value.truncate(y.len());
        let any = self.any_undef(&[&a, &b], t);
        let undef = self.all_undef_vec(any, y.len());
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    fn import_mux(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let a = self.port(cell, "A")?;
        let b = self.port(cell, "B")?;
        let s = self.port(cell, "S")?;
        let va = self.import_sig(&a, t);
        let vb = self.import_sig(&b, t);
        let vs = self.import_sig(&s, t);
        let sel = vs[0];
        let value = self.solver.vec_ite(sel, &vb, &va);
        let undef = if self.options.model_undef {
            let ua = self.import_undef_sig(&a, t);
            let ub = self.import_undef_sig(&b, t);
            let us = self.import_undef_sig(&s, t);
            let neq = {
                let iff = self.solver.vec_iff(&va, &vb);
                self.solver.vec_not(&iff)
            };
            let uab = self.solver.vec_or(&ua, &ub);
            let undef_ab = self.solver.vec_or(&neq, &uab);
            let sel_undef = self.solver.vec_ite(sel, &ub, &ua);
            Some(self.solver.vec_ite(us[0], &undef_ab, &sel_undef))
        } else {
            None
        };
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    /// Priority mux: the lowest-index asserted select bit wins.
    fn import_pmux(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let a = self.port(cell, "A")?;
        let b = self.port(cell, "B")?;
        let s = self.port(cell, "S")?;
        let width = y.len();
        let va = self.import_sig(&a, t);
        let vb = self.import_sig(&b, t);
        let vs = self.import_sig(&s, t);
        let mut value = va.clone();
        for i in (0..vs.len()).rev() {
            let part = vb[i * width..(i + 1) * width].to_vec();
            value = self.solver.vec_ite(vs[i], &part, &value);
        }
        let undef = if self.options.model_undef {
            let ua = self.import_undef_sig(&a, t);
            let ub = self.import_undef_sig(&b, t);
            let us = self.import_undef_sig(&s, t);
            let s_any = self.solver.expression_or(&us);
            let mut chain = ua;
            for i in (0..vs.len()).rev() {
                let part = ub[i * width..(i + 1) * width].to_vec();
                chain = self.solver.vec_ite(vs[i], &part, &chain);
            }
            Some(chain.iter().map(|&u| self.solver.or(u, s_any)).collect())
        } else {
            None
        };
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    /// AMT: output is the first row whose pattern matches S; if no row
    /// matches the output is unconstrained.
    fn import_amt(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let y = self.port(cell, "Y")?;
        let s = self.port(cell, "S")?;
        let rows = read_table(cell)?;
        let width = y.len();
        let vs = self.import_sig(&s, t);

        let mut matches = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut bits = Vec::new();
            for (j, p) in row.pattern.bits().iter().enumerate() {
                match p {
                    State::S1 => bits.push(vs[j]),
                    State::S0 => bits.push(!vs[j]),
                    _ => {}
                }
            }
            matches.push(self.solver.expression_and(&bits));
        }

        let mut value = self.solver.vec_literals(width);
        for i in (0..rows.len()).rev() {
            let out = self.import_sig(&rows[i].output, t);
            value = self.solver.vec_ite(matches[i], &out, &value);
        }
        let undef = if self.options.model_undef {
            let us = self.import_undef_sig(&s, t);
            let s_any = self.solver.expression_or(&us);
            let f = self.solver.const_false();
            let mut chain = vec![f; width];
            for i in (0..rows.len()).rev() {
                let uout = self.import_undef_sig(&rows[i].output, t);
                chain = self.solver.vec_ite(matches[i], &uout, &chain);
            }
            Some(chain.iter().map(|&u| self.solver.or(u, s_any)).collect())
        } else {
            None
        };
        self.bind_output(&y, t, &value, undef);
        Ok(())
    }

    fn import_ff(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        if t < 0 {
            return Err(SatError::SequentialInCombProblem(cell.name.clone()));
        }
        let q = self.port(cell, "Q")?;
        if t == 1 {
            self.pool_state(&q);
            return Ok(());
        }
        let d = self.port(cell, "D")?;
        let width = q.len();
        let vd = self.import_sig(&d, t - 1);
        let vq_prev = self.import_sig(&q, t - 1);

        let active = |enc: &mut Self, sig: &SigSpec, pol: bool| -> Lit {
            let v = enc.import_sig(sig, t - 1);
            if pol {
                v[0]
            } else {
                !v[0]
            }
        };
        let param_vec = |enc: &mut Self, cell: &Cell, name: &str, width: usize| -> Vec<Lit> {
            let value = cell
                .param(name)
                .cloned()
                .unwrap_or_else(|| Const::zero(width))
                .extended(width, State::S0);
            enc.import_sig(&SigSpec::from_const(&value), t)
        };

        let value = match cell.ty {
            CellType::Ff | CellType::Dff => vd,
            CellType::Dffe => {
                let en = self.port(cell, "EN")?;
                let en = active(self, &en, cell.param("EN_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                self.solver.vec_ite(en, &vd, &vq_prev)
            }
            CellType::Sdff => {
                let srst = self.port(cell, "SRST")?;
                let srst = active(self, &srst, cell.param("SRST_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                let val = param_vec(self, cell, "SRST_VALUE", width);
                self.solver.vec_ite(srst, &val, &vd)
            }
            CellType::Sdffe => {
                let srst = self.port(cell, "SRST")?;
                let srst = active(self, &srst, cell.param("SRST_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                let en = self.port(cell, "EN")?;
                let en = active(self, &en, cell.param("EN_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                let val = param_vec(self, cell, "SRST_VALUE", width);
                let loaded = self.solver.vec_ite(en, &vd, &vq_prev);
                self.solver.vec_ite(srst, &val, &loaded)
            }
            CellType::Sdffce => {
                let srst = self.port(cell, "SRST")?;
                let srst = active(self, &srst, cell.param("SRST_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                let en = self.port(cell, "EN")?;
                let en = active(self, &en, cell.param("EN_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                let val = param_vec(self, cell, "SRST_VALUE", width);
                let reset = self.solver.vec_ite(srst, &val, &vd);
                self.solver.vec_ite(en, &reset, &vq_prev)
            }
            CellType::Adff => {
                let arst = self.port(cell, "ARST")?;
                let arst = active(self, &arst, cell.param("ARST_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                let val = param_vec(self, cell, "ARST_VALUE", width);
                self.solver.vec_ite(arst, &val, &vd)
            }
            CellType::Adffe => {
                let arst = self.port(cell, "ARST")?;
                let arst = active(self, &arst, cell.param("ARST_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                let en = self.port(cell, "EN")?;
                let en = active(self, &en, cell.param("EN_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                let val = param_vec(self, cell, "ARST_VALUE", width);
                let loaded = self.solver.vec_ite(en, &vd, &vq_prev);
                self.solver.vec_ite(arst, &val, &loaded)
            }
            CellType::Aldff => {
                let aload = self.port(cell, "ALOAD")?;
                let aload = active(self, &aload, cell.param("ALOAD_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                let ad = self.port(cell, "AD")?;
                let vad = self.import_sig(&ad, t - 1);
                self.solver.vec_ite(aload, &vad, &vd)
            }
            CellType::Aldffe => {
                let aload = self.port(cell, "ALOAD")?;
                let aload = active(self, &aload, cell.param("ALOAD_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                let ad = self.port(cell, "AD")?;
                let vad = self.import_sig(&ad, t - 1);
                let en = self.port(cell, "EN")?;
                let en = active(self, &en, cell.param("EN_POLARITY").map(|p| p.as_bool()).unwrap_or(true));
                let loaded = self.solver.vec_ite(en, &vd, &vq_prev);
                self.solver.vec_ite(aload, &vad, &loaded)
            }
            _ => unreachable!(),
        };

        let undef = if self.options.model_undef {
            let inputs: Vec<SigSpec> = cell
                .connections
                .iter()
                .filter(|(p, _)| cell.ty.is_input_port(p) && p.as_str() != "CLK")
                .map(|(_, sig)| sig.clone())
                .collect();
            let refs: Vec<&SigSpec> = inputs.iter().collect();
            let mut any = self.any_undef(&refs, t - 1);
            let uq_prev = self.import_undef_sig(&q, t - 1);
            let prev_any = self.solver.expression_or(&uq_prev);
            any = self.solver.or(any, prev_any);
            Some(vec![any; width])
        } else {
            None
        };
        self.bind_output(&q, t, &value, undef);
        Ok(())
    }

    fn import_latch(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        if t < 0 {
            return Err(SatError::SequentialInCombProblem(cell.name.clone()));
        }
        let q = self.port(cell, "Q")?;
        if t == 1 {
            self.pool_state(&q);
            return Ok(());
        }
        let d = self.port(cell, "D")?;
        let en = self.port(cell, "EN")?;
        let width = q.len();
        let vd = self.import_sig(&d, t);
        let ven = self.import_sig(&en, t);
        let en_pol = cell.param("EN_POLARITY").map(|p| p.as_bool()).unwrap_or(true);
        let en_lit = if en_pol { ven[0] } else { !ven[0] };
        let vq_prev = self.import_sig(&q, t - 1);
        let mut value = self.solver.vec_ite(en_lit, &vd, &vq_prev);
        if cell.ty == CellType::Adlatch {
            let arst = self.port(cell, "ARST")?;
            let varst = self.import_sig(&arst, t);
            let pol = cell.param("ARST_POLARITY").map(|p| p.as_bool()).unwrap_or(true);
            let arst_lit = if pol { varst[0] } else { !varst[0] };
            let rst_value = cell
                .param("ARST_VALUE")
                .cloned()
                .unwrap_or_else(|| Const::zero(width))
                .extended(width, State::S0);
            let val = self.import_sig(&SigSpec::from_const(&rst_value), t);
            value = self.solver.vec_ite(arst_lit, &val, &value);
        }
        let undef = if self.options.model_undef {
            let any_in = self.any_undef(&[&d, &en], t);
            let uq_prev = self.import_undef_sig(&q, t - 1);
            let prev_any = self.solver.expression_or(&uq_prev);
            let any = self.solver.or(any_in, prev_any);
            Some(vec![any; width])
        } else {
            None
        };
        self.bind_output(&q, t, &value, undef);
        Ok(())
    }

    fn pool_state(&mut self, q: &SigSpec) {
        let mapped = self.sigmap.apply(q);
        for &bit in mapped.bits() {
            if bit.is_wire() && self.initial_state_seen.insert(bit) {
                self.initial_state.push(bit);
            }
        }
    }

    fn mem_word(
        &mut self,
        cell: &Cell,
        word: u64,
        t: TimeStep,
        width: usize,
        abits: usize,
        wr_ports: usize,
    ) -> SatResult<Vec<Lit>> {
        if let Some(lits) = self.mem_state.get(&(cell.id, word, t)) {
            return Ok(lits.clone());
        }
        let lits = if t <= 1 {
            match cell.param("INIT") {
                Some(init) if !init.is_fully_undef() => {
                    let off = word as usize * width;
                    let slice = if off + width <= init.len() {
                        Const::from_states(init.bits()[off..off + width].to_vec())
                    } else {
                        Const::undef(width)
                    };
                    slice
                        .bits()
                        .iter()
                        .map(|s| match s.as_bool() {
                            Some(true) => self.solver.const_true(),
                            Some(false) => self.solver.const_false(),
                            None => self.solver.literal(),
                        })
                        .collect()
                }
                _ => self.solver.vec_literals(width),
            }
        } else {
            let prev = self.mem_word(cell, word, t - 1, width, abits, wr_ports)?;
            let wr_addr = self.port(cell, "WR_ADDR")?;
            let wr_data = self.port(cell, "WR_DATA")?;
            let wr_en = self.port(cell, "WR_EN")?;
            let mut current = prev;
            for p in 0..wr_ports {
                let addr = wr_addr.extract(p * abits, abits);
                let vaddr = self.import_sig(&addr, t - 1);
                let wconst = self.solver.vec_const(word, abits);
                let sel = self.solver.vec_eq(&vaddr, &wconst);
                let data = wr_data.extract(p * width, width);
                let vdata = self.import_sig(&data, t - 1);
                let en = wr_en.extract(p * width, width);
                let ven = self.import_sig(&en, t - 1);
                for i in 0..width {
                    let write = self.solver.and(sel, ven[i]);
                    current[i] = self.solver.ite(write, vdata[i], current[i]);
                }
            }
            current
        };
        self.mem_state.insert((cell.id, word, t), lits.clone());
        Ok(lits)
    }

    fn import_mem(&mut self, cell: &Cell, t: TimeStep) -> SatResult<()> {
        let size = cell.param_u32("SIZE").unwrap_or(0) as u64;
        let abits = cell.param_u32("ABITS").unwrap_or(0) as usize;
        let width = cell.param_u32("WIDTH").unwrap_or(0) as usize;
        let rd_ports = cell.param_u32("RD_PORTS").unwrap_or(0) as usize;
        let wr_ports = cell.param_u32("WR_PORTS").unwrap_or(0) as usize;
        if t < 0 && wr_ports > 0 {
            return Err(SatError::SequentialInCombProblem(cell.name.clone()));
        }
        if rd_ports == 0 {
            return Ok(());
        }
        let word_step = if t < 0 { 1 } else { t };

        let rd_addr = self.port(cell, "RD_ADDR")?;
        let rd_data = self.port(cell, "RD_DATA")?;
        for p in 0..rd_ports {
            let addr = rd_addr.extract(p * abits, abits);
            let vaddr = self.import_sig(&addr, t);
            let mut value = self.solver.vec_literals(width);
            for word in (0..size).rev() {
                let wconst = self.solver.vec_const(word, abits);
                let sel = self.solver.vec_eq(&vaddr, &wconst);
                let stored = self.mem_word(cell, word, word_step, width, abits, wr_ports)?;
                value = self.solver.vec_ite(sel, &stored, &value);
            }
            let out = rd_data.extract(p * width, width);
            let undef = if self.options.model_undef {
                let any = self.any_undef(&[&addr], t);
                Some(vec![any; width])
            } else {
                None
            };
            self.bind_output(&out, t, &value, undef);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolveResult;
    use gremlin_amt::{write_table, Selection};
    use gremlin_ir::Module;

    fn solve_with(enc: &mut Encoder, assumptions: &[Lit]) -> SolveResult {
        enc.solver_mut().solve(assumptions).unwrap()
    }

    /// y = a + b over 4 bits, checked by forcing a concrete sum.
    #[test]
    fn test_add_cell() {
        let mut m = Module::new("t");
        let a = m.add_wire("a", 4).unwrap();
        let b = m.add_wire("b", 4).unwrap();
        let y = m.add_wire("y", 4).unwrap();
        let c = m.add_cell("add0", CellType::Add).unwrap();
        let (sa, sb, sy) = (m.wire_sig(a), m.wire_sig(b), m.wire_sig(y));
        {
            let cell = m.cell_mut(c);
            cell.set_port("A", sa.clone());
            cell.set_port("B", sb.clone());
            cell.set_port("Y", sy.clone());
        }
        let mut enc = Encoder::new(&m, Solver::new(), EncoderOptions::default());
        enc.import_cell(&m, c, COMB_STEP).unwrap();
        let five = SigSpec::from_const(&Const::new(5, 4));
        let six = SigSpec::from_const(&Const::new(6, 4));
        let eleven = SigSpec::from_const(&Const::new(11, 4));
        let ea = enc.signals_eq(&sa, &five, COMB_STEP, COMB_STEP);
        let eb = enc.signals_eq(&sb, &six, COMB_STEP, COMB_STEP);
        let ey = enc.signals_eq(&sy, &eleven, COMB_STEP, COMB_STEP);
        assert_eq!(solve_with(&mut enc, &[ea, eb, ey]), SolveResult::Sat);
        assert_eq!(solve_with(&mut enc, &[ea, eb, !ey]), SolveResult::Unsat);
    }

    /// Priority: with both select bits matching, row 0 wins.
    #[test]
    fn test_amt_first_match_wins() {
        let mut m = Module::new("t");
        let s = m.add_wire("s", 2).unwrap();
        let y = m.add_wire("y", 2).unwrap();
        let c = m.add_cell("amt0", CellType::Amt).unwrap();
        let (ss, sy) = (m.wire_sig(s), m.wire_sig(y));
        {
            let cell = m.cell_mut(c);
            cell.set_port("S", ss.clone());
            cell.set_port("Y", sy.clone());
            let rows = vec![
                Selection::new(
                    Const::from_states(vec![State::S1, State::Sa]),
                    SigSpec::from_const(&Const::new(1, 2)),
                ),
                Selection::new(Const::new(0b11, 2), SigSpec::from_const(&Const::new(2, 2))),
            ];
            write_table(cell, &rows);
        }
        let mut enc = Encoder::new(&m, Solver::new(), EncoderOptions::default());
        enc.import_cell(&m, c, COMB_STEP).unwrap();
        let s_both = SigSpec::from_const(&Const::new(0b11, 2));
        let y_one = SigSpec::from_const(&Const::new(1, 2));
        let es = enc.signals_eq(&ss, &s_both, COMB_STEP, COMB_STEP);
        let ey = enc.signals_eq(&sy, &y_one, COMB_STEP, COMB_STEP);
        assert_eq!(solve_with(&mut enc, &[es, ey]), SolveResult::Sat);
        assert_eq!(solve_with(&mut enc, &[es, !ey]), SolveResult::Unsat);
    }

    /// When no AMT row matches, the output is unconstrained.
    #[test]
    fn test_amt_default_dont_care() {
        let mut m = Module::new("t");
        let s = m.add_wire("s", 1).unwrap();
        let y = m.add_wire("y", 1).unwrap();
        let c = m.add_cell("amt0", CellType::Amt).unwrap();
        let (ss, sy) = (m.wire_sig(s), m.wire_sig(y));
        {
            let cell = m.cell_mut(c);
            cell.set_port("S", ss.clone());
            cell.set_port("Y", sy.clone());
            let rows = vec![Selection::new(
                Const::new(1, 1),
                SigSpec::from_const(&Const::new(0, 1)),
            )];
            write_table(cell, &rows);
        }
        let mut enc = Encoder::new(&m, Solver::new(), EncoderOptions::default());
        enc.import_cell(&m, c, COMB_STEP).unwrap();
        let zero = SigSpec::from_const(&Const::new(0, 1));
        let one = SigSpec::from_const(&Const::new(1, 1));
        let es0 = enc.signals_eq(&ss, &zero, COMB_STEP, COMB_STEP);
        let ey0 = enc.signals_eq(&sy, &zero, COMB_STEP, COMB_STEP);
        let ey1 = enc.signals_eq(&sy, &one, COMB_STEP, COMB_STEP);
        // both output values are reachable with s = 0
        assert_eq!(solve_with(&mut enc, &[es0, ey0]), SolveResult::Sat);
        assert_eq!(solve_with(&mut enc, &[es0, ey1]), SolveResult::Sat);
    }

    /// A register links time steps: q at t=2 equals d at t=1, and its Q
    /// lands in the initial-state pool.
    #[test]
    fn test_dff_links_time_steps() {
        let mut m = Module::new("t");
        let clk = m.add_wire("clk", 1).unwrap();
        let d = m.add_wire("d", 2).unwrap();
        let q = m.add_wire("q", 2).unwrap();
        let c = m.add_cell("ff0", CellType::Dff).unwrap();
        let (sclk, sd, sq) = (m.wire_sig(clk), m.wire_sig(d), m.wire_sig(q));
        {
            let cell = m.cell_mut(c);
            cell.set_port("CLK", sclk);
            cell.set_port("D", sd.clone());
            cell.set_port("Q", sq.clone());
        }
        let mut enc = Encoder::new(&m, Solver::new(), EncoderOptions::default());
        enc.import_cell(&m, c, 1).unwrap();
        assert_eq!(enc.initial_state_pool().len(), 2);
        enc.import_cell(&m, c, 2).unwrap();
        let three = SigSpec::from_const(&Const::new(3, 2));
        let ed = enc.signals_eq(&sd, &three, 1, 1);
        let eq2 = enc.signals_eq(&sq, &three, 2, 2);
        assert_eq!(solve_with(&mut enc, &[ed, eq2]), SolveResult::Sat);
        assert_eq!(solve_with(&mut enc, &[ed, !eq2]), SolveResult::Unsat);
    }

    #[test]
    fn test_dff_rejected_in_comb_problem() {
        let mut m = Module::new("t");
        let d = m.add_wire("d", 1).unwrap();
        let q = m.add_wire("q", 1).unwrap();
        let c = m.add_cell("ff0", CellType::Dff).unwrap();
        let (sd, sq) = (m.wire_sig(d), m.wire_sig(q));
        {
            let cell = m.cell_mut(c);
            cell.set_port("D", sd);
            cell.set_port("Q", sq);
        }
        let mut enc = Encoder::new(&m, Solver::new(), EncoderOptions::default());
        assert!(matches!(
            enc.import_cell(&m, c, COMB_STEP),
            Err(SatError::SequentialInCombProblem(_))
        ));
    }

    /// Division by zero: Zero mode forces a zero result.
    #[test]
    fn test_div_by_zero_modes() {
        let mut m = Module::new("t");
        let a = m.add_wire("a", 4).unwrap();
        let b = m.add_wire("b", 4).unwrap();
        let y = m.add_wire("y", 4).unwrap();
        let c = m.add_cell("div0", CellType::Div).unwrap();
        let (sa, sb, sy) = (m.wire_sig(a), m.wire_sig(b), m.wire_sig(y));
        {
            let cell = m.cell_mut(c);
            cell.set_port("A", sa.clone());
            cell.set_port("B", sb.clone());
            cell.set_port("Y", sy.clone());
        }
        let opts = EncoderOptions { div_by_zero: DivByZero::Zero, ..Default::default() };
        let mut enc = Encoder::new(&m, Solver::new(), opts);
        enc.import_cell(&m, c, COMB_STEP).unwrap();
        let zero = SigSpec::from_const(&Const::new(0, 4));
        let seven = SigSpec::from_const(&Const::new(7, 4));
        let eb = enc.signals_eq(&sb, &zero, COMB_STEP, COMB_STEP);
        let ea = enc.signals_eq(&sa, &seven, COMB_STEP, COMB_STEP);
        let ey = enc.signals_eq(&sy, &zero, COMB_STEP, COMB_STEP);
        assert_eq!(solve_with(&mut enc, &[ea, eb, ey]), SolveResult::Sat);
        assert_eq!(solve_with(&mut enc, &[ea, eb, !ey]), SolveResult::Unsat);
    }

    /// Assertion cells collect per time step; the conjunction literal holds
    /// exactly when every enabled check bit does.
    #[test]
    fn test_import_asserts_conjunction() {
        let mut m = Module::new("t");
        let a = m.add_wire("a", 1).unwrap();
        let en = m.add_wire("en", 1).unwrap();
        let c = m.add_cell("assert0", CellType::Assert).unwrap();
        let (sa, sen) = (m.wire_sig(a), m.wire_sig(en));
        {
            let cell = m.cell_mut(c);
            cell.set_port("A", sa.clone());
            cell.set_port("EN", sen.clone());
        }
        let mut enc = Encoder::new(&m, Solver::new(), EncoderOptions::default());
        enc.import_cell(&m, c, COMB_STEP).unwrap();
        let holds = enc.import_asserts(COMB_STEP);
        let va = enc.import_sig(&sa, COMB_STEP)[0];
        let ven = enc.import_sig(&sen, COMB_STEP)[0];
        // enabled and violated: the conjunction cannot hold
        assert_eq!(solve_with(&mut enc, &[holds, ven, !va]), SolveResult::Unsat);
        // disabled checks never fail
        assert_eq!(solve_with(&mut enc, &[holds, !ven, !va]), SolveResult::Sat);
        // a step with no assertions is vacuously true
        let empty = enc.import_asserts(5);
        assert_eq!(solve_with(&mut enc, &[!empty]), SolveResult::Unsat);
    }

    /// Four-valued equality is reflexive, and equality of two vectors
    /// implies equality after widening both with undef bits.
    #[test]
    fn test_signals_eq_reflexive_and_monotone() {
        let mut m = Module::new("t");
        let a = m.add_wire("a", 2).unwrap();
        let b = m.add_wire("b", 2).unwrap();
        let (sa, sb) = (m.wire_sig(a), m.wire_sig(b));
        let opts = EncoderOptions { model_undef: true, ..Default::default() };
        let mut enc = Encoder::new(&m, Solver::new(), opts);

        let refl = enc.signals_eq(&sa, &sa, COMB_STEP, COMB_STEP);
        assert_eq!(solve_with(&mut enc, &[!refl]), SolveResult::Unsat);

        let eq = enc.signals_eq(&sa, &sb, COMB_STEP, COMB_STEP);
        let mut wa = sa.clone();
        let mut wb = sb.clone();
        wa.push(SigBit::Const(State::Sx));
        wb.push(SigBit::Const(State::Sx));
        let weq = enc.signals_eq(&wa, &wb, COMB_STEP, COMB_STEP);
        // eq implies widened eq
        assert_eq!(solve_with(&mut enc, &[eq, !weq]), SolveResult::Unsat);
    }

    /// Four-valued equality: an undef input makes an AND output undef unless
    /// a defined zero forces it.
    #[test]
    fn test_undef_gating_on_and() {
        let mut m = Module::new("t");
        let a = m.add_wire("a", 1).unwrap();
        let y = m.add_wire("y", 1).unwrap();
        let c = m.add_cell("and0", CellType::And).unwrap();
        let (sa, sy) = (m.wire_sig(a), m.wire_sig(y));
        {
            let cell = m.cell_mut(c);
            cell.set_port("A", sa.clone());
            cell.set_port("B", SigSpec::from_const(&Const::undef(1)));
            cell.set_port("Y", sy.clone());
        }
        let opts = EncoderOptions { model_undef: true, ..Default::default() };
        let mut enc = Encoder::new(&m, Solver::new(), opts);
        enc.import_cell(&m, c, COMB_STEP).unwrap();
        let ua = enc.import_undef_sig(&sa, COMB_STEP)[0];
        let va = enc.import_sig(&sa, COMB_STEP)[0];
        let uy = enc.import_undef_sig(&sy, COMB_STEP)[0];
        // a = defined 0 -> y is defined
        assert_eq!(solve_with(&mut enc, &[!ua, !va, !uy]), SolveResult::Sat);
        assert_eq!(solve_with(&mut enc, &[!ua, !va, uy]), SolveResult::Unsat);
        // a = defined 1 -> y is undef
        assert_eq!(solve_with(&mut enc, &[!ua, va, uy]), SolveResult::Sat);
        assert_eq!(solve_with(&mut enc, &[!ua, va, !uy]), SolveResult::Unsat);
    }
}
