//! Variant persistence
//!
//! Every bug gets its own numbered directory under the configured output
//! directory. File handles are scoped inside the writer, so they are closed
//! on every exit path.

use crate::InjectResult;
use gremlin_ir::rtlil::write_design_file;
use gremlin_ir::Design;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialize the whole design to `<output_dir>/<index>/<file>`.
pub fn write_variant(
    design: &Design,
    output_dir: &Path,
    index: usize,
    file: &str,
) -> InjectResult<PathBuf> {
    let dir = output_dir.join(index.to_string());
    fs::create_dir_all(&dir)?;
    let path = dir.join(file);
    write_design_file(design, &path)?;
    log::debug!("wrote bug variant {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gremlin_ir::Module;

    #[test]
    fn test_variant_layout() {
        let mut design = Design::new();
        design.add_module(Module::new("top")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_variant(&design, dir.path(), 3, "host_amt.rtlil").unwrap();
        assert!(path.ends_with("3/host_amt.rtlil"));
        assert!(path.exists());
    }
}
