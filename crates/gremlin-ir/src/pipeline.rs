//! Opaque pipeline-command interface
//!
//! The miter builder drives an external synthesis framework through named
//! string commands (optimization, flattening, width reduction, …). The
//! framework itself is out of scope; `BasicPipeline` implements just enough
//! in-tree (hierarchy check + flatten + serialization) for self-contained
//! operation and treats the pure optimization commands as no-ops.

use crate::design::Design;
use crate::flatten::flatten;
use crate::rtlil::write_design_file;
use crate::{IrError, IrResult};

pub trait Pipeline {
    fn run(&mut self, design: &mut Design, command: &str) -> IrResult<()>;
}

/// Ignores every command. Useful in tests that build pre-flattened designs.
pub struct NullPipeline;

impl Pipeline for NullPipeline {
    fn run(&mut self, _design: &mut Design, command: &str) -> IrResult<()> {
        log::debug!("pipeline (null): ignoring `{command}`");
        Ok(())
    }
}

/// Minimal in-tree pipeline: `hierarchy -check -top <name>`, `flatten`,
/// `write_rtlil <file>`; optimization-style commands are accepted and do
/// nothing. Unknown commands are an error so typos do not pass silently.
#[derive(Default)]
pub struct BasicPipeline {
    top: Option<String>,
}

impl BasicPipeline {
    pub fn new() -> Self {
        BasicPipeline::default()
    }
}

const NOOP_COMMANDS: &[&str] = &[
    "opt",
    "opt_clean",
    "wreduce",
    "peepopt",
    "memory",
    "memory_map",
    "clk2fflogic",
];

impl Pipeline for BasicPipeline {
    fn run(&mut self, design: &mut Design, command: &str) -> IrResult<()> {
        let mut words = command.split_whitespace();
        let head = words.next().unwrap_or("");
        match head {
            "hierarchy" => {
                let args: Vec<&str> = words.collect();
                let mut top = None;
                let mut i = 0;
                while i < args.len() {
                    match args[i] {
                        "-check" => {}
                        "-top" if i + 1 < args.len() => {
                            top = Some(args[i + 1].to_string());
                            i += 1;
                        }
                        other => {
                            return Err(IrError::UnknownCommand(format!("hierarchy {other}")))
                        }
                    }
                    i += 1;
                }
                if let Some(top) = top {
                    if design.module(&top).is_none() {
                        return Err(IrError::MissingModule(top));
                    }
                    self.top = Some(top);
                }
                Ok(())
            }
            "flatten" => {
                let top = self
                    .top
                    .clone()
                    .ok_or_else(|| IrError::Hierarchy("flatten without a top module".into()))?;
                flatten(design, &top)
            }
            "write_rtlil" => {
                let path = words
                    .next()
                    .ok_or_else(|| IrError::UnknownCommand("write_rtlil without a file".into()))?;
                write_design_file(design, path)
            }
            cmd if NOOP_COMMANDS.contains(&cmd) => {
                log::debug!("pipeline: `{command}` is a no-op in the basic pipeline");
                Ok(())
            }
            other => Err(IrError::UnknownCommand(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;

    #[test]
    fn test_basic_pipeline_hierarchy_and_noops() {
        let mut design = Design::new();
        design.add_module(Module::new("miter")).unwrap();
        let mut pipe = BasicPipeline::new();
        pipe.run(&mut design, "hierarchy -check -top miter").unwrap();
        pipe.run(&mut design, "opt -full -fine").unwrap();
        pipe.run(&mut design, "flatten").unwrap();
        assert!(pipe.run(&mut design, "frobnicate").is_err());
        assert!(pipe.run(&mut design, "hierarchy -check -top ghost").is_err());
    }
}
