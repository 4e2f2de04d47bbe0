//! SAT solver wrapper using CaDiCaL
//!
//! Provides a small literal/variable API on top of CaDiCaL. Literal
//! identifiers are dense integers in allocation order; the solver owns every
//! literal it hands out. A per-solve wall-clock timeout is supported through
//! the CaDiCaL terminate callback; once a solve times out the instance is
//! poisoned and further solves are refused.

use crate::{SatError, SatResult};
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

/// A SAT variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var(pub usize);

impl Var {
    pub fn from_index(idx: usize) -> Self {
        Var(idx)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// A SAT literal (variable with polarity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lit {
    var: Var,
    negated: bool,
}

impl Lit {
    pub fn positive(var: Var) -> Self {
        Lit { var, negated: false }
    }

    pub fn negative(var: Var) -> Self {
        Lit { var, negated: true }
    }

    pub fn var(&self) -> Var {
        self.var
    }

    pub fn is_positive(&self) -> bool {
        !self.negated
    }

    pub fn is_negative(&self) -> bool {
        self.negated
    }

    /// Convert to CaDiCaL literal format (1-indexed, negative for negation)
    fn to_cadical(self) -> i32 {
        let var_num = (self.var.0 + 1) as i32;
        if self.negated {
            -var_num
        } else {
            var_num
        }
    }
}

impl std::ops::Not for Lit {
    type Output = Lit;

    fn not(self) -> Self::Output {
        Lit {
            var: self.var,
            negated: !self.negated,
        }
    }
}

/// CNF formula snapshot, kept alongside the solver for DIMACS dumps
#[derive(Default)]
pub struct CnfFormula {
    clauses: Vec<Vec<Lit>>,
    max_var: usize,
}

impl CnfFormula {
    pub fn new() -> Self {
        CnfFormula::default()
    }

    pub fn add_clause(&mut self, clause: &[Lit]) {
        for lit in clause {
            self.max_var = self.max_var.max(lit.var.0);
        }
        self.clauses.push(clause.to_vec());
    }

    pub fn clauses(&self) -> &[Vec<Lit>] {
        &self.clauses
    }

    pub fn max_var(&self) -> usize {
        self.max_var
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveResult {
    Sat,
    Unsat,
}

/// Incremental SAT solver
pub struct Solver {
    solver: cadical::Solver,
    formula: CnfFormula,
    num_vars: usize,
    names: HashMap<usize, String>,
    timeout: Option<Duration>,
    got_timeout: bool,
    const_true: Option<Lit>,
    pub(crate) gate_cache: HashMap<crate::expr::GateKey, Lit>,
}

impl Solver {
    pub fn new() -> Self {
        Solver {
            solver: cadical::Solver::new(),
            formula: CnfFormula::new(),
            num_vars: 0,
            names: HashMap::new(),
            timeout: None,
            got_timeout: false,
            const_true: None,
            gate_cache: HashMap::new(),
        }
    }

    /// Allocate a fresh variable and return its positive literal.
    pub fn literal(&mut self) -> Lit {
        let var = Var(self.num_vars);
        self.num_vars += 1;
        Lit::positive(var)
    }

    /// Allocate a named literal. Names are kept for DIMACS comments only.
    pub fn frozen_literal(&mut self, name: impl Into<String>) -> Lit {
        let lit = self.literal();
        self.names.insert(lit.var.0, name.into());
        lit
    }

    /// The constant-true literal (lazily constrained).
    pub fn const_true(&mut self) -> Lit {
        if let Some(t) = self.const_true {
            return t;
        }
        let t = self.frozen_literal("$true");
        self.add_clause(&[t]);
        self.const_true = Some(t);
        t
    }

    pub fn const_false(&mut self) -> Lit {
        !self.const_true()
    }

    pub fn add_clause(&mut self, clause: &[Lit]) {
        self.formula.add_clause(clause);
        self.solver
            .add_clause(clause.iter().map(|l| l.to_cadical()));
    }

    /// Add a permanent constraint that `lit` holds.
    pub fn assume(&mut self, lit: Lit) {
        self.add_clause(&[lit]);
    }

    pub fn set_solver_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// True once any solve has timed out; the instance must not be solved
    /// again.
    pub fn got_timeout(&self) -> bool {
        self.got_timeout
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn num_clauses(&self) -> usize {
        self.formula.clauses().len()
    }

    /// Solve under the given temporary assumptions.
    pub fn solve(&mut self, assumptions: &[Lit]) -> SatResult<SolveResult> {
        if self.got_timeout {
            return Err(SatError::TimedOut);
        }
        if let Some(timeout) = self.timeout {
            self.solver
                .set_callbacks(Some(cadical::Timeout::new(timeout.as_secs_f32())));
        } else {
            self.solver.set_callbacks(None);
        }
        let result = self
            .solver
            .solve_with(assumptions.iter().map(|l| l.to_cadical()));
        match result {
            Some(true) => Ok(SolveResult::Sat),
            Some(false) => Ok(SolveResult::Unsat),
            None => {
                self.got_timeout = true;
                Err(SatError::TimedOut)
            }
        }
    }

    /// Value of a literal in the current model. Only meaningful directly
    /// after a SAT result; unassigned variables read as false.
    pub fn model_value(&self, lit: Lit) -> bool {
        let v = self
            .solver
            .value((lit.var.0 + 1) as i32)
            .unwrap_or(false);
        v != lit.negated
    }

    /// Dump the accumulated CNF in DIMACS format.
    pub fn print_dimacs(&self, w: &mut impl Write) -> SatResult<()> {
        writeln!(w, "p cnf {} {}", self.num_vars, self.formula.clauses().len())?;
        let mut names: Vec<(&usize, &String)> = self.names.iter().collect();
        names.sort();
        for (var, name) in names {
            writeln!(w, "c var {} {}", var + 1, name)?;
        }
        for clause in self.formula.clauses() {
            for lit in clause {
                write!(w, "{} ", lit.to_cadical())?;
            }
            writeln!(w, "0")?;
        }
        Ok(())
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_sat() {
        // (x1 OR x2) AND (NOT x1 OR x2) => x2 must be true
        let mut solver = Solver::new();
        let x1 = solver.literal();
        let x2 = solver.literal();
        solver.add_clause(&[x1, x2]);
        solver.add_clause(&[!x1, x2]);

        assert_eq!(solver.solve(&[]).unwrap(), SolveResult::Sat);
        assert!(solver.model_value(x2));
    }

    #[test]
    fn test_simple_unsat() {
        let mut solver = Solver::new();
        let x1 = solver.literal();
        solver.add_clause(&[x1]);
        solver.add_clause(&[!x1]);
        assert_eq!(solver.solve(&[]).unwrap(), SolveResult::Unsat);
    }

    #[test]
    fn test_assumptions_are_temporary() {
        let mut solver = Solver::new();
        let x = solver.literal();
        assert_eq!(solver.solve(&[x]).unwrap(), SolveResult::Sat);
        assert_eq!(solver.solve(&[!x]).unwrap(), SolveResult::Sat);
        solver.assume(x);
        assert_eq!(solver.solve(&[!x]).unwrap(), SolveResult::Unsat);
        assert_eq!(solver.solve(&[x]).unwrap(), SolveResult::Sat);
    }

    #[test]
    fn test_dimacs_dump() {
        let mut solver = Solver::new();
        let x = solver.frozen_literal("x");
        let y = solver.literal();
        solver.add_clause(&[x, !y]);
        let mut out = Vec::new();
        solver.print_dimacs(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("p cnf 2 1"));
        assert!(text.contains("c var 1 x"));
        assert!(text.contains("1 -2 0"));
    }
}
