//! Hardware bug injection and bounded verification
//!
//! This crate ties the workspace together:
//! - [`gremlin_ir`] - the netlist IR, canonicalizing view, flattening and
//!   serialization
//! - [`gremlin_amt`] - abstract mapping table detection, extraction,
//!   expansion and lowering
//! - [`gremlin_sat`] - the incremental SAT solver and time-indexed encoder
//! - [`gremlin_inject`] - the AMT-table and driver mix-up bug families
//! - [`gremlin_verify`] - miter construction and the two-phase bounded
//!   verifier
//!
//! The typical flow over a prepared (synthesized, memory-mapped) design:
//!
//! ```ignore
//! gremlin_amt::detect::detect_design(&mut design);
//! gremlin_amt::extract::extract_design(&mut design);
//! gremlin_amt::expand::expand_design(&mut design);
//! gremlin_inject::inject_amt_bugs(&mut design, &opts)?;
//! // per bug: load host/reference, then
//! let info = gremlin_verify::create_amt_miter(&mut design, &observables, &mut pipeline)?;
//! let verdict = gremlin_verify::verify_miter(&design, Some(&info.selections), &verify_opts)?;
//! ```

pub use gremlin_amt as amt;
pub use gremlin_inject as inject;
pub use gremlin_ir as ir;
pub use gremlin_sat as sat;
pub use gremlin_verify as verify;
