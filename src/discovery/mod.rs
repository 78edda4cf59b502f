//! Runtime type and method discovery.
//!
//! Nothing here is an error when missing: lookups return `None` and callers degrade only the
//! feature that needed the result.

pub mod candidates;

pub use candidates::{scan_candidates, CandidateFilter, CandidateScan};

use std::sync::OnceLock;

use crate::host::{Host, MethodInfo, TypeHandle};

/// First type, across all loaded modules in host order, whose simple name equals `name`
/// (case-sensitive). Modules whose type list fails to load are skipped.
pub fn find_type(host: &dyn Host, name: &str) -> Option<TypeHandle> {
    host.module_names()
        .iter()
        .filter_map(|module| host.module_types(module).ok())
        .flatten()
        .find(|t| t.name == name)
}

/// First instance method of `ty` named `name`, public or not.
///
/// Overloads are not disambiguated: the first one in the host's declaration order wins.
pub fn find_method(host: &dyn Host, ty: &TypeHandle, name: &str) -> Option<MethodInfo> {
    host.type_methods(ty)
        .ok()?
        .into_iter()
        .find(|m| !m.is_static && m.name == name)
}

/// A type searched by name and, once found, its handle.
///
/// A successful resolution is kept for the probe's lifetime; a miss is retried on the next call.
#[derive(Debug)]
pub struct TargetTypeDescriptor {
    name: String,
    resolved: OnceLock<TypeHandle>,
}

impl TargetTypeDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resolved: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolve(&self, host: &dyn Host) -> Option<&TypeHandle> {
        if let Some(handle) = self.resolved.get() {
            return Some(handle);
        }
        let found = find_type(host, &self.name)?;
        Some(self.resolved.get_or_init(|| found))
    }

    pub fn handle(&self) -> Option<&TypeHandle> {
        self.resolved.get()
    }
}

/// A discovered method and whether this probe currently has it hooked.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    pub info: MethodInfo,
    installed: bool,
}

impl MethodDescriptor {
    pub fn new(info: MethodInfo) -> Self {
        Self {
            info,
            installed: false,
        }
    }

    pub fn declaring_type_name(&self) -> &str {
        &self.info.declaring_type_name
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// `Type.Method`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.info.declaring_type_name, self.info.name)
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub(crate) fn set_installed(&mut self, installed: bool) {
        self.installed = installed;
    }
}
