//! Nominal type registry for oomph
//!
//! Every type that exists during a compile lives in a single [`TypeRegistry`]
//! and is referred to by its [`TypeId`]. The registry hands out one canonical
//! entry per type name, and interns generic instantiations by
//! `(generic, argument)`, so type equality downstream is plain id equality.

use std::collections::HashMap;

/// Handle to a type in the registry. Cheap to copy, compares by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

/// The built-in generics. These are the only two; user-defined generics
/// do not exist in the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generic {
    List,
    Optional,
}

impl Generic {
    pub fn name(self) -> &'static str {
        match self {
            Generic::List => "List",
            Generic::Optional => "Optional",
        }
    }
}

/// The type of a callable: ordered argument types and an optional return type
/// (`None` means the function returns nothing).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub argtypes: Vec<TypeId>,
    pub returntype: Option<TypeId>,
}

impl FunctionType {
    pub fn new(argtypes: Vec<TypeId>, returntype: Option<TypeId>) -> Self {
        FunctionType {
            argtypes,
            returntype,
        }
    }
}

/// One entry in the registry.
///
/// Classes use `members` (ordered, they double as the constructor argument
/// list); unions use `type_members` (ordered, the index is the runtime tag).
#[derive(Debug, Clone)]
pub struct TypeData {
    pub name: String,
    /// Heap-allocated with a shared refcount header, or a plain value type.
    pub refcounted: bool,
    pub methods: HashMap<String, FunctionType>,
    pub members: Vec<(TypeId, String)>,
    pub constructor_argtypes: Option<Vec<TypeId>>,
    /// `Some` iff this type was produced by instantiating a generic.
    pub generic_origin: Option<(Generic, TypeId)>,
    /// `Some` iff this type is a union.
    pub type_members: Option<Vec<TypeId>>,
}

impl TypeData {
    fn new(name: String, refcounted: bool) -> Self {
        TypeData {
            name,
            refcounted,
            methods: HashMap::new(),
            members: Vec::new(),
            constructor_argtypes: None,
            generic_origin: None,
            type_members: None,
        }
    }
}

/// Append-only store of all types known to a compile.
///
/// The four built-in type ids are public fields so the rest of the compiler
/// can compare against them directly.
pub struct TypeRegistry {
    types: Vec<TypeData>,
    generic_cache: HashMap<(Generic, TypeId), TypeId>,
    pub int: TypeId,
    pub float: TypeId,
    pub boolean: TypeId,
    pub string: TypeId,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = TypeRegistry {
            types: Vec::new(),
            generic_cache: HashMap::new(),
            int: TypeId(0),
            float: TypeId(0),
            boolean: TypeId(0),
            string: TypeId(0),
        };
        registry.int = registry.add(TypeData::new("int".to_string(), false));
        registry.float = registry.add(TypeData::new("float".to_string(), false));
        registry.boolean = registry.add(TypeData::new("bool".to_string(), false));
        registry.string = registry.add(TypeData::new("Str".to_string(), true));
        crate::builtins::install_builtin_methods(&mut registry);
        registry
    }

    fn add(&mut self, data: TypeData) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(data);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeData {
        &self.types[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeData {
        &mut self.types[id.0 as usize]
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.get(id).name
    }

    /// Declare a user class. Members and methods are filled in later by the
    /// typer's declaration passes.
    pub fn add_class(&mut self, name: &str) -> TypeId {
        self.add(TypeData::new(name.to_string(), true))
    }

    /// Declare a user union. Members are set later with [`set_union_members`].
    ///
    /// [`set_union_members`]: TypeRegistry::set_union_members
    pub fn add_union(&mut self, name: &str) -> TypeId {
        let id = self.add(TypeData::new(name.to_string(), true));
        let to_string = FunctionType::new(vec![id], Some(self.string));
        self.get_mut(id).methods.insert("to_string".to_string(), to_string);
        id
    }

    /// Fix the ordered member list of a union. The position of a member is
    /// its runtime tag, so the order must never change afterwards.
    pub fn set_union_members(&mut self, union: TypeId, members: Vec<TypeId>) -> Result<(), String> {
        let union_name = self.name(union).to_string();
        if members.len() < 2 {
            return Err(format!("union '{}' needs at least two members", union_name));
        }
        for (index, &member) in members.iter().enumerate() {
            if members[..index].contains(&member) {
                return Err(format!(
                    "union '{}' lists member '{}' twice",
                    union_name,
                    self.name(member)
                ));
            }
            if !self.get(member).refcounted {
                return Err(format!(
                    "union '{}' member '{}' must be a reference-counted type",
                    union_name,
                    self.name(member)
                ));
            }
        }
        self.get_mut(union).type_members = Some(members);
        Ok(())
    }

    /// Instantiate `List[arg]` or `Optional[arg]`.
    ///
    /// Instantiations are interned: asking for the same `(generic, arg)` pair
    /// twice returns the same [`TypeId`], so identity comparison works for
    /// generic types too. A fresh instantiation synthesizes its method table
    /// from the generic's template.
    pub fn instantiate(&mut self, generic: Generic, arg: TypeId) -> TypeId {
        if let Some(&cached) = self.generic_cache.get(&(generic, arg)) {
            return cached;
        }

        let name = format!("{}[{}]", generic.name(), self.name(arg));
        let id = match generic {
            Generic::Optional => {
                let id = self.add(TypeData::new(name, false));
                let data = self.get_mut(id);
                data.constructor_argtypes = Some(vec![arg]);
                data.methods
                    .insert("get".to_string(), FunctionType::new(vec![id], Some(arg)));
                let is_null = FunctionType::new(vec![id], Some(self.boolean));
                self.get_mut(id).methods.insert("is_null".to_string(), is_null);
                id
            }
            Generic::List => {
                let id = self.add(TypeData::new(name, true));
                let int = self.int;
                let string = self.string;
                let data = self.get_mut(id);
                data.constructor_argtypes = Some(Vec::new());
                data.methods
                    .insert("get".to_string(), FunctionType::new(vec![id, int], Some(arg)));
                data.methods
                    .insert("length".to_string(), FunctionType::new(vec![id], Some(int)));
                data.methods
                    .insert("push".to_string(), FunctionType::new(vec![id, arg], None));
                if arg == string {
                    data.methods.insert(
                        "join".to_string(),
                        FunctionType::new(vec![id, string], Some(string)),
                    );
                }
                id
            }
        };

        let to_string = FunctionType::new(vec![id], Some(self.string));
        self.get_mut(id).methods.insert("to_string".to_string(), to_string);
        self.get_mut(id).generic_origin = Some((generic, arg));
        self.generic_cache.insert((generic, arg), id);
        id
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        TypeRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.name(registry.int), "int");
        assert_eq!(registry.name(registry.string), "Str");
        assert!(!registry.get(registry.int).refcounted);
        assert!(registry.get(registry.string).refcounted);
    }

    #[test]
    fn test_generic_instantiation_is_interned() {
        let mut registry = TypeRegistry::new();
        let a = registry.instantiate(Generic::List, registry.int);
        let b = registry.instantiate(Generic::List, registry.int);
        assert_eq!(a, b);
        assert_eq!(registry.name(a), "List[int]");

        let c = registry.instantiate(Generic::List, registry.float);
        assert_ne!(a, c);
    }

    #[test]
    fn test_list_of_str_has_join() {
        let mut registry = TypeRegistry::new();
        let list_str = registry.instantiate(Generic::List, registry.string);
        assert!(registry.get(list_str).methods.contains_key("join"));

        let list_int = registry.instantiate(Generic::List, registry.int);
        assert!(!registry.get(list_int).methods.contains_key("join"));
    }

    #[test]
    fn test_optional_is_a_value_type() {
        let mut registry = TypeRegistry::new();
        let opt = registry.instantiate(Generic::Optional, registry.string);
        assert!(!registry.get(opt).refcounted);
        assert!(registry.get(opt).methods.contains_key("is_null"));
        assert_eq!(registry.name(opt), "Optional[Str]");
    }

    #[test]
    fn test_union_members_must_be_refcounted() {
        let mut registry = TypeRegistry::new();
        let a = registry.add_class("BoxInt");
        let union = registry.add_union("Mixed");
        let err = registry
            .set_union_members(union, vec![a, registry.int])
            .unwrap_err();
        assert!(err.contains("must be a reference-counted type"));
    }

    #[test]
    fn test_union_needs_two_distinct_members() {
        let mut registry = TypeRegistry::new();
        let a = registry.add_class("BoxInt");
        let union = registry.add_union("Mixed");
        assert!(registry.set_union_members(union, vec![a]).is_err());
        assert!(registry.set_union_members(union, vec![a, a]).is_err());
    }
}
