//! The type lattice and its interner.
//!
//! Types live in an arena owned by the interner and are addressed by
//! `TypeId`. Interning guarantees that structurally equal types share one
//! id, so the validator compares types by id and only falls back to
//! [`TypeInterner::match_types`] for the lattice's extended rules (`Any` as
//! universal, `Invalid` as the absorbing bottom, `User` resolving to the
//! struct or union it names).

use crate::token::TokenKind;
use std::collections::HashMap;

/// Arena handle. The primitives are pre-interned at fixed ids so they are
/// plain constants rather than lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub const INVALID: TypeId = TypeId(0);
    pub const INT: TypeId = TypeId(1);
    pub const FLOAT: TypeId = TypeId(2);
    pub const BOOL: TypeId = TypeId(3);
    pub const STRING: TypeId = TypeId(4);
    pub const VOID: TypeId = TypeId(5);
    pub const ANY: TypeId = TypeId(6);

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Invalid,
    Int,
    Float,
    Bool,
    String,
    Void,
    Any,
    /// Homogeneous array; payload is the element type.
    Array(TypeId),
    /// Key and value types.
    Map(TypeId, TypeId),
    /// Return type plus ordered parameter types. Not assignable.
    Function { ret: TypeId, params: Vec<TypeId> },
    /// Growable set of function signatures. Reserved for overload
    /// resolution; nothing selects between the entries yet.
    FunctionCollection(Vec<TypeId>),
    /// A named reference to a struct or union, resolved by name.
    User(Box<str>),
    Struct { name: Box<str>, members: Vec<(Box<str>, TypeId)> },
    Union { name: Box<str>, variants: Vec<TypeId> },
}

#[derive(Debug, Default)]
pub struct TypeInterner {
    arena: Vec<Type>,
    dedup: HashMap<Type, TypeId>,
    /// Declared struct/union names, for resolving `User` references.
    names: HashMap<Box<str>, TypeId>,
}

impl TypeInterner {
    pub fn new() -> TypeInterner {
        let mut interner = TypeInterner::default();
        // Order must agree with the TypeId constants.
        for t in [
            Type::Invalid,
            Type::Int,
            Type::Float,
            Type::Bool,
            Type::String,
            Type::Void,
            Type::Any,
        ] {
            interner.intern(t);
        }
        interner
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.arena[id.index()]
    }

    fn intern(&mut self, t: Type) -> TypeId {
        if let Some(id) = self.dedup.get(&t) {
            return *id;
        }
        let id = TypeId(self.arena.len() as u32);
        self.arena.push(t.clone());
        self.dedup.insert(t, id);
        id
    }

    /// The primitive type a literal or type-keyword token denotes.
    pub fn from_token(kind: TokenKind) -> Option<TypeId> {
        match kind {
            TokenKind::Int | TokenKind::IntLiteral => Some(TypeId::INT),
            TokenKind::Float | TokenKind::FloatLiteral => Some(TypeId::FLOAT),
            TokenKind::Bool | TokenKind::True | TokenKind::False => Some(TypeId::BOOL),
            TokenKind::String | TokenKind::StringLiteral => Some(TypeId::STRING),
            TokenKind::Any => Some(TypeId::ANY),
            _ => None,
        }
    }

    pub fn array(&mut self, elem: TypeId) -> TypeId {
        self.intern(Type::Array(elem))
    }

    pub fn map(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.intern(Type::Map(key, value))
    }

    pub fn function(&mut self, ret: TypeId, params: Vec<TypeId>) -> TypeId {
        self.intern(Type::Function { ret, params })
    }

    pub fn function_collection(&mut self, signatures: Vec<TypeId>) -> TypeId {
        self.intern(Type::FunctionCollection(signatures))
    }

    /// Intern a reference to a declared struct or union. `None` when no
    /// such name has been registered, which the parser reports as an
    /// unknown type.
    pub fn user(&mut self, name: &str) -> Option<TypeId> {
        if !self.names.contains_key(name) {
            return None;
        }
        Some(self.intern(Type::User(name.into())))
    }

    pub fn register_struct(&mut self, name: &str, members: Vec<(Box<str>, TypeId)>) -> TypeId {
        let id = self.intern(Type::Struct { name: name.into(), members });
        self.names.insert(name.into(), id);
        id
    }

    pub fn register_union(&mut self, name: &str, variants: Vec<TypeId>) -> TypeId {
        let id = self.intern(Type::Union { name: name.into(), variants });
        self.names.insert(name.into(), id);
        id
    }

    /// Follow a `User` reference to the struct/union it names. Other types
    /// resolve to themselves.
    pub fn resolve(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::User(name) => self.names.get(name.as_ref()).copied().unwrap_or(TypeId::INVALID),
            _ => id,
        }
    }

    fn name_of(&self, id: TypeId) -> Option<&str> {
        match self.get(id) {
            Type::User(name) => Some(name),
            Type::Struct { name, .. } => Some(name),
            Type::Union { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Extended identity: same id, `Any` matches everything, `Invalid`
    /// matches nothing, `User` matches the struct/union with the same
    /// name, and containers match element-wise. Function types match on
    /// their return types.
    pub fn match_types(&self, lhs: TypeId, rhs: TypeId) -> bool {
        if lhs == TypeId::INVALID || rhs == TypeId::INVALID {
            return false;
        }
        if lhs == TypeId::ANY || rhs == TypeId::ANY {
            return true;
        }
        if lhs == rhs {
            return true;
        }
        match (self.get(lhs), self.get(rhs)) {
            (Type::Array(l), Type::Array(r)) => self.match_types(*l, *r),
            (Type::Map(lk, lv), Type::Map(rk, rv)) => {
                self.match_types(*lk, *rk) && self.match_types(*lv, *rv)
            }
            (Type::Function { ret: l, .. }, Type::Function { ret: r, .. }) => {
                self.match_types(*l, *r)
            }
            (
                Type::User(_) | Type::Struct { .. } | Type::Union { .. },
                Type::User(_) | Type::Struct { .. } | Type::Union { .. },
            ) => self.name_of(lhs) == self.name_of(rhs),
            _ => false,
        }
    }

    /// Assignment compatibility: identity, `Any` targets, or a union target
    /// with a variant matching the source.
    pub fn check_assignment(&self, to: TypeId, from: TypeId) -> bool {
        if to == from {
            return true;
        }
        if to == TypeId::ANY {
            return true;
        }
        if self.match_types(to, from) {
            return true;
        }
        if let Type::Union { variants, .. } = self.get(self.resolve(to)) {
            return variants.iter().any(|v| self.match_types(*v, from));
        }
        false
    }

    /// The type an indexing or call expression produces.
    pub fn underlying(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Array(elem) => *elem,
            Type::Map(_, value) => *value,
            Type::Function { ret, .. } => *ret,
            _ => TypeId::INVALID,
        }
    }

    /// Numeric rank for operator result typing: Bool < Int < Float.
    /// Zero for everything non-numeric.
    pub fn rank(&self, id: TypeId) -> u8 {
        match id {
            TypeId::BOOL => 1,
            TypeId::INT => 2,
            TypeId::FLOAT => 3,
            _ => 0,
        }
    }

    pub fn display(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Invalid => "<invalid>".to_string(),
            Type::Int => "Int".to_string(),
            Type::Float => "Float".to_string(),
            Type::Bool => "Bool".to_string(),
            Type::String => "String".to_string(),
            Type::Void => "Void".to_string(),
            Type::Any => "Any".to_string(),
            Type::Array(elem) => format!("[{}]", self.display(*elem)),
            Type::Map(key, value) => format!("[{}, {}]", self.display(*key), self.display(*value)),
            Type::Function { ret, params } => {
                let params: Vec<_> = params.iter().map(|p| self.display(*p)).collect();
                format!("({}) -> {}", params.join(", "), self.display(*ret))
            }
            Type::FunctionCollection(signatures) => {
                format!("<{} overloads>", signatures.len())
            }
            Type::User(name) => name.to_string(),
            Type::Struct { name, .. } => name.to_string(),
            Type::Union { name, .. } => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structurally_equal_types_share_an_id() {
        let mut types = TypeInterner::new();
        let a = types.array(TypeId::INT);
        let b = types.array(TypeId::INT);
        assert_eq!(a, b);

        let f1 = types.function(TypeId::INT, vec![TypeId::INT, TypeId::FLOAT]);
        let f2 = types.function(TypeId::INT, vec![TypeId::INT, TypeId::FLOAT]);
        let f3 = types.function(TypeId::INT, vec![TypeId::FLOAT]);
        assert_eq!(f1, f2);
        assert_ne!(f1, f3);
    }

    #[test]
    fn user_references_need_a_declaration() {
        let mut types = TypeInterner::new();
        assert_eq!(types.user("P"), None);

        types.register_struct("P", vec![("x".into(), TypeId::INT)]);
        let user = types.user("P").expect("declared");
        assert!(matches!(types.get(user), Type::User(_)));
    }

    #[test]
    fn user_matches_its_struct_by_name() {
        let mut types = TypeInterner::new();
        let strukt = types.register_struct("P", vec![("x".into(), TypeId::INT)]);
        let user = types.user("P").unwrap();
        assert!(types.match_types(user, strukt));
        assert!(types.match_types(strukt, user));
        assert_eq!(types.resolve(user), strukt);

        types.register_struct("Q", vec![("y".into(), TypeId::INT)]);
        let other = types.user("Q").unwrap();
        assert!(!types.match_types(user, other));
    }

    #[test]
    fn any_is_universal_and_invalid_absorbs() {
        let types = TypeInterner::new();
        assert!(types.match_types(TypeId::ANY, TypeId::INT));
        assert!(types.match_types(TypeId::STRING, TypeId::ANY));
        assert!(!types.match_types(TypeId::INVALID, TypeId::ANY));
        assert!(!types.match_types(TypeId::INT, TypeId::INVALID));
    }

    #[test]
    fn unions_accept_their_variants() {
        let mut types = TypeInterner::new();
        let number = types.register_union("Number", vec![TypeId::INT, TypeId::FLOAT]);
        assert!(types.check_assignment(number, TypeId::INT));
        assert!(types.check_assignment(number, TypeId::FLOAT));
        assert!(!types.check_assignment(number, TypeId::STRING));
        assert!(!types.check_assignment(TypeId::INT, number));
    }

    #[test]
    fn function_types_are_not_assignment_targets_for_ints() {
        let mut types = TypeInterner::new();
        let f = types.function(TypeId::VOID, vec![]);
        assert!(!types.check_assignment(f, TypeId::INT));
        assert!(types.check_assignment(TypeId::ANY, f));
    }

    #[test]
    fn function_collections_intern_without_resolving() {
        let mut types = TypeInterner::new();
        let f = types.function(TypeId::INT, vec![]);
        let collection = types.function_collection(vec![f]);
        assert!(matches!(types.get(collection), Type::FunctionCollection(_)));
        assert!(!types.match_types(collection, f));
        assert_eq!(types.display(collection), "<1 overloads>");
    }

    #[test]
    fn rank_orders_bool_int_float() {
        let types = TypeInterner::new();
        assert!(types.rank(TypeId::BOOL) < types.rank(TypeId::INT));
        assert!(types.rank(TypeId::INT) < types.rank(TypeId::FLOAT));
        assert_eq!(types.rank(TypeId::STRING), 0);
    }

    #[test]
    fn display_renders_nested_types() {
        let mut types = TypeInterner::new();
        let arr = types.array(TypeId::INT);
        let f = types.function(arr, vec![TypeId::INT, TypeId::BOOL]);
        assert_eq!(types.display(f), "(Int, Bool) -> [Int]");
        let m = types.map(TypeId::STRING, arr);
        assert_eq!(types.display(m), "[String, [Int]]");
    }
}
