//! Type table and the name-lookup oracle the lowering passes consult.
//!
//! The front end that would normally populate this is out of scope; tests
//! build tables by hand. The lowering passes only ever ask questions
//! (member lookup, completeness, template instantiation) and never mutate
//! user types, so the table is append-only.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TypeId(pub u32);

/// Integer width/signedness, shared with the range engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IntType {
    pub bits: u8,
    pub signed: bool,
}

impl IntType {
    pub const BOOL: IntType = IntType { bits: 1, signed: false };
    pub const I8: IntType = IntType { bits: 8, signed: true };
    pub const U8: IntType = IntType { bits: 8, signed: false };
    pub const I16: IntType = IntType { bits: 16, signed: true };
    pub const U16: IntType = IntType { bits: 16, signed: false };
    pub const I32: IntType = IntType { bits: 32, signed: true };
    pub const U32: IntType = IntType { bits: 32, signed: false };
    pub const I64: IntType = IntType { bits: 64, signed: true };
    pub const U64: IntType = IntType { bits: 64, signed: false };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassType {
    pub name: String,
    pub methods: Vec<Method>,
    /// Nested member types, e.g. `promise_type` inside a traits instance.
    pub nested_types: HashMap<String, TypeId>,
    pub complete: bool,
    pub has_move_ctor: bool,
    /// Constructor parameter lists (the default ctor is an empty list).
    pub ctors: Vec<Vec<TypeId>>,
}

impl ClassType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            nested_types: HashMap::new(),
            complete: true,
            has_move_ctor: false,
            ctors: vec![Vec::new()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Bool,
    Int(IntType),
    Pointer(TypeId),
    Reference { to: TypeId, rvalue: bool },
    FnPtr { params: Vec<TypeId>, ret: TypeId },
    Class(ClassType),
    /// Stand-in for `auto` before deduction; rejects coroutine lowering.
    Deduced,
}

/// Append-only type environment.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: Vec<Type>,
    /// Traits-template instantiations pre-resolved by the front end,
    /// keyed by (return type, parameter types).
    traits_instances: HashMap<(TypeId, Vec<TypeId>), TypeId>,
    traits_template_known: bool,
    handle_template_known: bool,
    /// Handle instantiations already materialized, keyed by promise.
    handle_instances: HashMap<TypeId, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    pub fn add_class(&mut self, class: ClassType) -> TypeId {
        self.add(Type::Class(class))
    }

    pub fn class(&self, id: TypeId) -> Option<&ClassType> {
        match self.get(id) {
            Type::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn class_mut(&mut self, id: TypeId) -> Option<&mut ClassType> {
        match &mut self.types[id.0 as usize] {
            Type::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_complete_class(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Class(c) if c.complete)
    }

    /// Strip references; the awaitable protocol looks through them.
    pub fn strip_refs(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Reference { to, .. } => self.strip_refs(*to),
            _ => id,
        }
    }

    pub fn is_rvalue_ref(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Reference { rvalue: true, .. })
    }

    pub fn is_ref(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Reference { .. })
    }

    pub fn lookup_method(&self, class: TypeId, name: &str) -> Option<&Method> {
        self.class(self.strip_refs(class))?
            .methods
            .iter()
            .find(|m| m.name == name)
    }

    pub fn nested_type(&self, class: TypeId, name: &str) -> Option<TypeId> {
        self.class(class)?.nested_types.get(name).copied()
    }

    pub fn name_of(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Void => "void".into(),
            Type::Bool => "bool".into(),
            Type::Int(it) => {
                format!("{}{}", if it.signed { "i" } else { "u" }, it.bits)
            }
            Type::Pointer(to) => format!("*{}", self.name_of(*to)),
            Type::Reference { to, rvalue } => {
                format!("{}{}", if *rvalue { "&&" } else { "&" }, self.name_of(*to))
            }
            Type::FnPtr { .. } => "fn-ptr".into(),
            Type::Class(c) => c.name.clone(),
            Type::Deduced => "auto".into(),
        }
    }

    // ---- template oracle ----

    /// Front-end registration: the traits template exists.
    pub fn register_traits_template(&mut self) {
        self.traits_template_known = true;
    }

    pub fn register_handle_template(&mut self) {
        self.handle_template_known = true;
    }

    /// Front-end registration of one traits instantiation result.
    pub fn register_traits_instance(
        &mut self,
        ret: TypeId,
        params: Vec<TypeId>,
        instance: TypeId,
    ) {
        self.traits_instances.insert((ret, params), instance);
    }

    pub fn traits_template_known(&self) -> bool {
        self.traits_template_known
    }

    pub fn handle_template_known(&self) -> bool {
        self.handle_template_known
    }

    /// Instantiate the traits template for (return type, parameter pack).
    /// `None` means the instantiation fails (no registration).
    pub fn instantiate_traits(&self, ret: TypeId, params: &[TypeId]) -> Option<TypeId> {
        self.traits_instances.get(&(ret, params.to_vec())).copied()
    }

    /// Instantiate the handle template with a promise type. Materializes a
    /// class exposing the handle protocol; memoized per promise.
    pub fn instantiate_handle(&mut self, promise: TypeId) -> Option<TypeId> {
        if !self.handle_template_known {
            return None;
        }
        if let Some(&id) = self.handle_instances.get(&promise) {
            return Some(id);
        }
        let void = self.add(Type::Void);
        let mut class = ClassType::new(format!(
            "coroutine_handle<{}>",
            self.name_of(promise)
        ));
        class.methods.push(Method { name: "resume".into(), params: vec![], ret: void });
        class.methods.push(Method { name: "destroy".into(), params: vec![], ret: void });
        let id = self.add_class(class);
        self.handle_instances.insert(promise, id);
        Some(id)
    }

    /// Is this type a coroutine-handle instantiation (of any promise)?
    pub fn is_handle_type(&self, id: TypeId) -> bool {
        self.handle_instances.values().any(|&h| h == id)
    }
}
