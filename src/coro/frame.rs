//! Frame layout planning.
//!
//! One pass over the marker-rewritten body assigns a slot to everything
//! that must outlive a suspension: control fields first, then one slot
//! (pair) per suspend point in registration order, then used parameters,
//! then locals. The order is stable for a given body; nothing outside the
//! lowering relies on it.

use std::collections::HashMap;

use crate::diagnostics::CompileError;
use crate::hir::visit::{walk_expr, walk_stmt, Visitor};
use crate::hir::{
    Block, ClassType, Expr, FieldId, Function, IntType, ProxyId, Stmt, SuspendKind, Type, TypeId,
    TypeTable,
};
use crate::span::Spanned;

use super::await_build::SuspendReturnKind;
use super::LowerCtx;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    ResumeFn,
    DestroyFn,
    Promise,
    NeedsFree,
    ResumeIndex,
    SelfHandle,
    Awaiter { suspend: u32 },
    AwaitHandle { suspend: u32 },
    Param { original: String, by_ref: bool, moved: bool },
    Local { original: String, captured: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameField {
    pub name: String,
    pub ty: TypeId,
    pub kind: FieldKind,
}

/// Slots reserved for one suspend point. The handle slot exists only for
/// handle-returning `await_suspend`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuspendSlots {
    pub awaiter: FieldId,
    pub handle: Option<FieldId>,
}

#[derive(Debug)]
pub struct FrameLayout {
    pub frame_type: TypeId,
    pub fields: Vec<FrameField>,
    pub suspend_slots: Vec<SuspendSlots>,
    pub param_fields: Vec<FieldId>,
    pub local_fields: Vec<FieldId>,
    /// Per suspend point: frame locals already constructed when it parks,
    /// in construction order. Drives the destroy-path destructor runs.
    pub live_locals: Vec<Vec<FieldId>>,
    name_map: HashMap<String, FieldId>,
    proxy_map: HashMap<ProxyId, FieldId>,
}

impl FrameLayout {
    pub const RESUME_FN: FieldId = FieldId(0);
    pub const DESTROY_FN: FieldId = FieldId(1);
    pub const PROMISE: FieldId = FieldId(2);
    pub const NEEDS_FREE: FieldId = FieldId(3);
    pub const RESUME_AT: FieldId = FieldId(4);
    pub const SELF_HANDLE: FieldId = FieldId(5);

    pub fn field(&self, id: FieldId) -> &FrameField {
        &self.fields[id.0 as usize]
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn suspend_count(&self) -> usize {
        self.suspend_slots.len()
    }

    /// Index stored in `resume_at` when suspend point `i` parks.
    pub fn resume_index(&self, suspend: u32) -> u64 {
        2 * suspend as u64 + 2
    }

    /// Index the destroy dispatcher matches for suspend point `i`.
    pub fn destroy_index(&self, suspend: u32) -> u64 {
        self.resume_index(suspend) | 1
    }

    pub fn field_for_name(&self, name: &str) -> Option<FieldId> {
        self.name_map.get(name).copied()
    }

    pub fn field_for_proxy(&self, proxy: ProxyId) -> Option<FieldId> {
        self.proxy_map.get(&proxy).copied()
    }

    pub fn dump(&self, tt: &TypeTable) -> String {
        let mut out = String::new();
        for (i, f) in self.fields.iter().enumerate() {
            out.push_str(&format!("{:2}: {} : {}\n", i, f.name, tt.name_of(f.ty)));
        }
        out
    }
}

struct Planner {
    fields: Vec<FrameField>,
    name_map: HashMap<String, FieldId>,
    proxy_map: HashMap<ProxyId, FieldId>,
}

impl Planner {
    fn add(&mut self, name: String, ty: TypeId, kind: FieldKind) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(FrameField { name, ty, kind });
        id
    }
}

/// Lay out the frame for `func` once every suspend point is registered.
/// Consults the registry on `ctx` and materializes the frame class into
/// the type table.
pub fn plan_frame(
    ctx: &mut LowerCtx<'_>,
    func: &Function,
    body: &Block,
) -> Result<FrameLayout, CompileError> {
    if ctx.suspends.len() < 2 {
        return Err(CompileError::lowering(
            "frame planning requires at least the initial and final suspends",
        ));
    }

    let mut p = Planner { fields: Vec::new(), name_map: HashMap::new(), proxy_map: HashMap::new() };
    let tt = &mut ctx.session.types;

    let void = tt.add(Type::Void);
    let actor_fn_ty = tt.add(Type::FnPtr { params: vec![], ret: void });
    let bool_ty = tt.add(Type::Bool);
    let resume_at_ty = tt.add(Type::Int(IntType::U16));

    p.add("__resume".into(), actor_fn_ty, FieldKind::ResumeFn);
    p.add("__destroy".into(), actor_fn_ty, FieldKind::DestroyFn);
    p.add("__p".into(), ctx.info.promise, FieldKind::Promise);
    p.add("__frame_needs_free".into(), bool_ty, FieldKind::NeedsFree);
    p.add("__resume_at".into(), resume_at_ty, FieldKind::ResumeIndex);
    p.add("__self_h".into(), ctx.info.handle, FieldKind::SelfHandle);

    // One slot (pair) per suspend point, registration order.
    let mut suspend_slots = Vec::with_capacity(ctx.suspends.len());
    let last = ctx.suspends.len() - 1;
    for (i, sp) in ctx.suspends.iter().enumerate() {
        let tag = match sp.kind {
            SuspendKind::Initial => "is".to_string(),
            SuspendKind::Final => "fs".to_string(),
            _ => i.to_string(),
        };
        // Initial must be first and final last for the dispatch indices to
        // line up with registration order.
        if (i == 0) != (sp.kind == SuspendKind::Initial)
            || (i == last) != (sp.kind == SuspendKind::Final)
        {
            return Err(CompileError::lowering("suspend registry out of order"));
        }
        let awaiter = p.add(
            format!("__aw_s.{tag}"),
            sp.awaitable_ty,
            FieldKind::Awaiter { suspend: i as u32 },
        );
        p.proxy_map.insert(sp.awaiter_proxy, awaiter);
        let handle = if sp.suspend_return == SuspendReturnKind::Handle {
            Some(p.add(
                format!("__aw_h.{tag}"),
                ctx.info.handle,
                FieldKind::AwaitHandle { suspend: i as u32 },
            ))
        } else {
            None
        };
        suspend_slots.push(SuspendSlots { awaiter, handle });
    }

    // Used parameters. Usage is scanned across the rewritten body and the
    // registered awaitable initializers (those reference parameters too).
    let used = used_names(body, ctx);
    let mut param_fields = Vec::new();
    for param in &func.params {
        if !used.contains(&param.name) {
            continue;
        }
        let tt = &ctx.session.types;
        let by_ref = tt.is_ref(param.ty);
        let inner = tt.strip_refs(param.ty);
        // Value parameters of movable class type are moved into their
        // slot by the ramp rather than copied.
        let moved = !by_ref && matches!(tt.get(inner), Type::Class(c) if c.has_move_ctor);
        // A reference parameter is stored as a pointer to the referent.
        let slot_ty =
            if by_ref { ctx.session.types.add(Type::Pointer(inner)) } else { param.ty };
        let id = p.add(
            format!("__parm.{}", param.name),
            slot_ty,
            FieldKind::Param { original: param.name.clone(), by_ref, moved },
        );
        p.name_map.insert(param.name.clone(), id);
        param_fields.push(id);
    }

    // Every declared local gets a slot, provably-dead or not.
    let mut local_fields = Vec::new();
    let mut live_locals: Vec<Vec<FieldId>> = vec![Vec::new(); ctx.suspends.len()];
    collect_locals(ctx, body, 0, &mut p, &mut local_fields, &mut Vec::new(), &mut live_locals);

    let fields = p.fields;
    let mut class = ClassType::new(format!("{}.frame", func.name));
    for f in &fields {
        class.nested_types.insert(f.name.clone(), f.ty);
    }
    let frame_type = ctx.session.types.add_class(class);

    Ok(FrameLayout {
        frame_type,
        fields,
        suspend_slots,
        param_fields,
        local_fields,
        live_locals,
        name_map: p.name_map,
        proxy_map: p.proxy_map,
    })
}

fn used_names(body: &Block, ctx: &LowerCtx<'_>) -> std::collections::HashSet<String> {
    struct Uses {
        names: std::collections::HashSet<String>,
    }
    impl Visitor for Uses {
        fn visit_expr(&mut self, expr: &Spanned<Expr>) {
            if let Expr::Name(n) = &expr.node {
                self.names.insert(n.clone());
            }
            walk_expr(self, expr);
        }
    }
    let mut u = Uses { names: Default::default() };
    crate::hir::visit::walk_block(&mut u, body);
    for sp in &ctx.suspends {
        u.visit_expr(&sp.init);
    }
    u.names
}

/// Depth-first local discovery. `scope_stack` tracks fields constructed so
/// far on the path to the current statement; a suspend marker snapshots it
/// as that point's live set.
fn collect_locals(
    ctx: &LowerCtx<'_>,
    block: &Block,
    depth: u32,
    p: &mut Planner,
    local_fields: &mut Vec<FieldId>,
    scope_stack: &mut Vec<Vec<FieldId>>,
    live: &mut Vec<Vec<FieldId>>,
) {
    scope_stack.push(Vec::new());
    for stmt in &block.stmts {
        record_suspend_liveness(stmt, scope_stack, live);
        match stmt {
            Stmt::Let { name, ty, .. } => {
                let captured = ctx.promoted.contains_key(name);
                let id = p.add(
                    format!("__lv.{depth}.{name}"),
                    *ty,
                    FieldKind::Local { original: name.clone(), captured },
                );
                p.name_map.insert(name.clone(), id);
                local_fields.push(id);
                if let Some(top) = scope_stack.last_mut() {
                    top.push(id);
                }
            }
            Stmt::If { then_block, else_block, .. } => {
                collect_locals(ctx, then_block, depth + 1, p, local_fields, scope_stack, live);
                if let Some(b) = else_block {
                    collect_locals(ctx, b, depth + 1, p, local_fields, scope_stack, live);
                }
            }
            Stmt::While { body, .. } => {
                collect_locals(ctx, body, depth + 1, p, local_fields, scope_stack, live)
            }
            Stmt::Scope(b) => {
                collect_locals(ctx, b, depth + 1, p, local_fields, scope_stack, live)
            }
            Stmt::TryCatchAll { body, .. } => {
                collect_locals(ctx, body, depth + 1, p, local_fields, scope_stack, live)
            }
            _ => {}
        }
    }
    scope_stack.pop();
}

/// Snapshot the constructed-so-far set for each suspend marker in `stmt`'s
/// own expressions (not nested blocks; those snapshot themselves).
fn record_suspend_liveness(stmt: &Stmt, scope_stack: &[Vec<FieldId>], live: &mut Vec<Vec<FieldId>>) {
    struct Marks {
        ids: Vec<u32>,
    }
    impl Visitor for Marks {
        fn visit_expr(&mut self, expr: &Spanned<Expr>) {
            if let Expr::SuspendPoint(i) = &expr.node {
                self.ids.push(*i);
            }
            walk_expr(self, expr);
        }
        fn visit_stmt(&mut self, stmt: &Stmt) {
            // Stay within this statement's expressions.
            match stmt {
                Stmt::If { .. } | Stmt::While { .. } | Stmt::Scope(_) | Stmt::TryCatchAll { .. } => {}
                _ => walk_stmt(self, stmt),
            }
        }
    }
    let mut m = Marks { ids: Vec::new() };
    match stmt {
        Stmt::If { cond, .. } | Stmt::While { cond, .. } => m.visit_expr(cond),
        other => m.visit_stmt(other),
    }
    let snapshot: Vec<FieldId> = scope_stack.iter().flatten().copied().collect();
    for i in m.ids {
        if let Some(slot) = live.get_mut(i as usize) {
            *slot = snapshot.clone();
        }
    }
}
