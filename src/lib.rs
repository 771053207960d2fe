pub mod cfg;
pub mod coro;
pub mod diagnostics;
pub mod hir;
pub mod range;
pub mod session;
pub mod span;

use cfg::Cfg;
use coro::LoweredCoroutine;
use diagnostics::CompileError;
use hir::Function;
use range::ranger::{GlobalRangeFact, Ranger};
use session::CompilerSession;

/// Lower one suspending function into its frame, ramp, actor, and destroy
/// routines. The session carries the type table the function's promise and
/// handle templates were registered with.
pub fn lower_coroutine(
    session: &mut CompilerSession,
    func: &Function,
) -> Result<LoweredCoroutine, CompileError> {
    coro::lower_coroutine(session, func)
}

/// Run range analysis over a CFG and persist everything it learns into the
/// variables' global metadata. Returns the learned facts.
pub fn analyze_ranges(cfg: &mut Cfg) -> Vec<GlobalRangeFact> {
    Ranger::new().export_global_ranges(cfg)
}
