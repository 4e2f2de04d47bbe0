//! Design container and module selection

use crate::module::Module;
use crate::{IrError, IrResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A design: named modules plus an optional working-set selection. With no
/// selection every module is in the working set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Design {
    pub modules: IndexMap<String, Module>,
    selection: Option<BTreeSet<String>>,
}

impl Design {
    pub fn new() -> Self {
        Design::default()
    }

    pub fn add_module(&mut self, module: Module) -> IrResult<()> {
        if self.modules.contains_key(&module.name) {
            return Err(IrError::DuplicateName(module.name));
        }
        self.modules.insert(module.name.clone(), module);
        Ok(())
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn module_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.get_mut(name)
    }

    pub fn remove_module(&mut self, name: &str) -> Option<Module> {
        self.modules.shift_remove(name)
    }

    /// Restrict the working set to the named modules.
    pub fn select(&mut self, names: impl IntoIterator<Item = String>) {
        self.selection = Some(names.into_iter().collect());
    }

    /// Clear the selection, putting every module back into the working set.
    pub fn select_all(&mut self) {
        self.selection = None;
    }

    pub fn is_selected(&self, name: &str) -> bool {
        match &self.selection {
            Some(sel) => sel.contains(name),
            None => true,
        }
    }

    /// Names of the selected modules, in design order.
    pub fn selected_modules(&self) -> Vec<String> {
        self.modules
            .keys()
            .filter(|n| self.is_selected(n))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection() {
        let mut d = Design::new();
        d.add_module(Module::new("a")).unwrap();
        d.add_module(Module::new("b")).unwrap();
        assert_eq!(d.selected_modules(), vec!["a".to_string(), "b".to_string()]);
        d.select(["b".to_string()]);
        assert_eq!(d.selected_modules(), vec!["b".to_string()]);
        assert!(!d.is_selected("a"));
        d.select_all();
        assert!(d.is_selected("a"));
    }
}
