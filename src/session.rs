//! Per-translation-unit compilation context.
//!
//! Everything the original kept in lazily-initialized globals (interned
//! member names, resolved template bindings) lives here instead and is
//! passed explicitly to every lowering call.

use crate::diagnostics::Warning;
use crate::hir::TypeTable;

/// Member names the coroutine protocol looks up. Interned once, by
/// construction, rather than on first keyword seen.
pub mod names {
    pub const PROMISE_TYPE: &str = "promise_type";
    pub const AWAIT_READY: &str = "await_ready";
    pub const AWAIT_SUSPEND: &str = "await_suspend";
    pub const AWAIT_RESUME: &str = "await_resume";
    pub const AWAIT_TRANSFORM: &str = "await_transform";
    pub const YIELD_VALUE: &str = "yield_value";
    pub const RETURN_VOID: &str = "return_void";
    pub const RETURN_VALUE: &str = "return_value";
    pub const INITIAL_SUSPEND: &str = "initial_suspend";
    pub const FINAL_SUSPEND: &str = "final_suspend";
    pub const GET_RETURN_OBJECT: &str = "get_return_object";
    pub const GRO_ON_ALLOC_FAIL: &str = "get_return_object_on_allocation_failure";
    pub const UNHANDLED_EXCEPTION: &str = "unhandled_exception";
    pub const OPERATOR_NEW: &str = "operator new";
    pub const OPERATOR_DELETE: &str = "operator delete";
}

#[derive(Debug, Clone, Copy)]
pub struct LowerConfig {
    /// Exception support in the target environment. When set, actor bodies
    /// are wrapped to route escaping failures to `unhandled_exception`.
    pub exceptions: bool,
}

impl Default for LowerConfig {
    fn default() -> Self {
        Self { exceptions: true }
    }
}

pub struct CompilerSession {
    pub types: TypeTable,
    pub config: LowerConfig,
    warnings: Vec<Warning>,
}

impl CompilerSession {
    pub fn new(types: TypeTable) -> Self {
        Self { types, config: LowerConfig::default(), warnings: Vec::new() }
    }

    pub fn with_config(types: TypeTable, config: LowerConfig) -> Self {
        Self { types, config, warnings: Vec::new() }
    }

    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}
