//! Promise/handle resolution and the keyword-context validity gate.
//!
//! Every suspend keyword use is gated on the enclosing declaration first;
//! only then is the traits template instantiated with (return type,
//! parameter pack), its nested `promise_type` member extracted, and the
//! handle template instantiated with the promise.

use crate::diagnostics::CompileError;
use crate::hir::{Function, TypeId};
use crate::session::{names, CompilerSession};
use crate::span::Span;

/// Reject functions whose declaration cannot host a suspend keyword.
/// Checked before any resolution work.
pub fn check_context(func: &Function, kw: Span) -> Result<(), CompileError> {
    let f = &func.flags;
    if f.is_entry_point {
        return Err(CompileError::context(
            format!("suspend keywords cannot be used in the program entry point '{}'", func.name),
            kw,
        ));
    }
    if f.is_constexpr {
        return Err(CompileError::context(
            format!("suspend keywords cannot be used in the constant-evaluable function '{}'", func.name),
            kw,
        ));
    }
    if f.has_deduced_return {
        return Err(CompileError::context(
            format!("'{}' has a deduced return type and cannot be a coroutine", func.name),
            kw,
        ));
    }
    if f.is_varargs {
        return Err(CompileError::context(
            format!("the varargs function '{}' cannot be a coroutine", func.name),
            kw,
        ));
    }
    if f.is_ctor {
        return Err(CompileError::context("a constructor cannot be a coroutine", kw));
    }
    if f.is_dtor {
        return Err(CompileError::context("a destructor cannot be a coroutine", kw));
    }
    Ok(())
}

/// Resolve the promise and handle types for `func`. Returns
/// `(promise, handle)` or a diagnostic; on failure the caller must not
/// proceed with lowering.
pub fn resolve_promise_and_handle(
    session: &mut CompilerSession,
    func: &Function,
    kw: Span,
) -> Result<(TypeId, TypeId), CompileError> {
    let tt = &session.types;
    if !tt.traits_template_known() {
        return Err(CompileError::resolve(
            "coroutine traits template not found; include the coroutine header",
            kw,
        ));
    }
    let param_tys: Vec<TypeId> = func.params.iter().map(|p| p.ty).collect();
    let traits_inst = tt.instantiate_traits(func.ret, &param_tys).ok_or_else(|| {
        CompileError::resolve(
            format!(
                "cannot instantiate coroutine traits for '{}' (return type '{}')",
                func.name,
                tt.name_of(func.ret)
            ),
            kw,
        )
    })?;
    let promise = tt.nested_type(traits_inst, names::PROMISE_TYPE).ok_or_else(|| {
        CompileError::resolve(
            format!(
                "no member named '{}' in '{}'",
                names::PROMISE_TYPE,
                tt.name_of(traits_inst)
            ),
            kw,
        )
    })?;
    if !tt.is_complete_class(promise) {
        return Err(CompileError::resolve(
            format!("promise type '{}' is incomplete", tt.name_of(promise)),
            kw,
        ));
    }
    if !tt.handle_template_known() {
        return Err(CompileError::resolve(
            "coroutine handle template not found; include the coroutine header",
            kw,
        ));
    }
    let handle = session
        .types
        .instantiate_handle(promise)
        .ok_or_else(|| CompileError::resolve("cannot instantiate the coroutine handle", kw))?;
    Ok((promise, handle))
}
