use super::MethodDescriptor;
use crate::config::DiscoveryConfig;
use crate::host::{Host, MethodInfo};

/// Leading character of compiler-synthesized member and type names.
const SYNTHESIZED_MARKER: char = '<';

/// Keyword heuristic selecting methods for gated tracing.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    keywords: Vec<String>,
    pub max_params: usize,
    pub max_candidates: usize,
}

impl CandidateFilter {
    pub fn new(keywords: &[String], max_params: usize, max_candidates: usize) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            max_params,
            max_candidates,
        }
    }

    pub fn from_config(cfg: &DiscoveryConfig) -> Self {
        Self::new(&cfg.keywords, cfg.max_params, cfg.max_candidates)
    }

    /// Keyword hit in the method or declaring type name, after excluding accessors,
    /// synthesized members and methods over the parameter ceiling.
    pub fn matches(&self, method: &MethodInfo) -> bool {
        if method.special_name
            || method.name.starts_with(SYNTHESIZED_MARKER)
            || method.declaring_type_name.starts_with(SYNTHESIZED_MARKER)
        {
            return false;
        }
        if method.params.len() > self.max_params {
            return false;
        }
        let name = method.name.to_lowercase();
        let type_name = method.declaring_type_name.to_lowercase();
        self.keywords
            .iter()
            .any(|k| name.contains(k.as_str()) || type_name.contains(k.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidateScan {
    pub module: String,
    /// False when the module is absent or its types could not be loaded.
    pub module_found: bool,
    /// Methods inspected before the scan ended.
    pub considered: usize,
    /// Methods that passed the filter.
    pub selected: usize,
    /// Selected methods the consumer accepted. This is what the budget counts.
    pub accepted: usize,
}

impl CandidateScan {
    pub fn capped(&self, filter: &CandidateFilter) -> bool {
        self.accepted >= filter.max_candidates
    }
}

/// Walks every method of every type in `module`, in host order, handing each match to
/// `accept`. The scan ends once `max_candidates` matches have been accepted; a rejected match
/// (typically one that could not be hooked) does not spend budget. Types whose methods cannot
/// be listed are skipped.
pub fn scan_candidates<F>(
    host: &dyn Host,
    module: &str,
    filter: &CandidateFilter,
    mut accept: F,
) -> CandidateScan
where
    F: FnMut(MethodDescriptor) -> bool,
{
    let mut scan = CandidateScan {
        module: module.to_string(),
        ..Default::default()
    };
    let types = match host.module_types(module) {
        Ok(types) => types,
        Err(_) => return scan,
    };
    scan.module_found = true;

    'types: for ty in &types {
        let methods = match host.type_methods(ty) {
            Ok(methods) => methods,
            Err(_) => continue,
        };
        for method in methods {
            if scan.capped(filter) {
                break 'types;
            }
            scan.considered += 1;
            if filter.matches(&method) {
                scan.selected += 1;
                if accept(MethodDescriptor::new(method)) {
                    scan.accepted += 1;
                }
            }
        }
    }
    scan
}
