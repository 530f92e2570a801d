//! Type System for Vire

use std::collections::HashMap;
use std::fmt;

/// A resolved or placeholder type
///
/// `Void` doubles as the "not yet inferred" placeholder: a declaration
/// without a type, or an array declaration without an element type, carries
/// `Void` at the root or at the bottom of its array chain until the analyzer
/// resolves it from the initializer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    Char,
    Int,
    Float,
    Double,
    Array { element: Box<Type>, length: usize },
    /// A struct, union or class, compared by name
    Custom(String),
}

impl Type {
    /// Map a type name to its type; unknown names become `Custom`
    pub fn construct(name: &str) -> Self {
        match name {
            "void" => Type::Void,
            "bool" => Type::Bool,
            "char" => Type::Char,
            "int" => Type::Int,
            "float" => Type::Float,
            "double" => Type::Double,
            other => Type::Custom(other.to_string()),
        }
    }

    pub fn array(element: Type, length: usize) -> Self {
        Type::Array {
            element: Box::new(element),
            length,
        }
    }

    /// Structural equality with the array placeholder wildcard
    pub fn is_same(&self, other: &Type) -> bool {
        match (self, other) {
            (
                Type::Array { element: a, length: la },
                Type::Array { element: b, length: lb },
            ) => {
                la == lb
                    && (matches!(**a, Type::Void) || matches!(**b, Type::Void) || a.is_same(b))
            }
            (Type::Custom(a), Type::Custom(b)) => a == b,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }

    /// Byte size; custom types are looked up in `registry`
    ///
    /// Saturates at `usize::MAX` when the layout does not fit.
    pub fn size(&self, registry: &TypeRegistry) -> usize {
        self.checked_size(registry).unwrap_or(usize::MAX)
    }

    /// Byte size, or `None` when it overflows `usize`
    pub fn checked_size(&self, registry: &TypeRegistry) -> Option<usize> {
        match self {
            Type::Void => Some(0),
            Type::Bool | Type::Char => Some(1),
            Type::Int | Type::Float => Some(4),
            Type::Double => Some(8),
            Type::Array { element, length } => {
                element.checked_size(registry)?.checked_mul(*length)
            }
            Type::Custom(name) => Some(registry.size_of(name).unwrap_or(0)),
        }
    }

    /// True for `Void` or an array chain that bottoms out in `Void`
    pub fn is_placeholder(&self) -> bool {
        matches!(self.bottom(), Type::Void)
    }

    /// The innermost element type of an array chain (or `self`)
    pub fn bottom(&self) -> &Type {
        match self {
            Type::Array { element, .. } => element.bottom(),
            other => other,
        }
    }

    /// Number of nested array levels
    pub fn depth(&self) -> usize {
        match self {
            Type::Array { element, .. } => 1 + element.depth(),
            _ => 0,
        }
    }

    /// The type left after indexing `n` times
    pub fn element_after(&self, n: usize) -> Option<&Type> {
        if n == 0 {
            return Some(self);
        }
        match self {
            Type::Array { element, .. } => element.element_after(n - 1),
            _ => None,
        }
    }

    pub fn array_length(&self) -> Option<usize> {
        match self {
            Type::Array { length, .. } => Some(*length),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Type::Custom(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Char | Type::Int | Type::Float | Type::Double)
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self, Type::Float | Type::Double)
    }

    /// Non-void scalar types that implicit casts may convert between
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::Bool | Type::Char | Type::Int | Type::Float | Type::Double
        )
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::Void
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Custom(name) => write!(f, "{}", name),
            Type::Array { .. } => {
                write!(f, "{}", self.bottom())?;
                let mut current = self;
                while let Type::Array { element, length } = current {
                    write!(f, "[{}]", length)?;
                    current = element;
                }
                Ok(())
            }
        }
    }
}

// ==================== Type Registry ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Struct,
    Union,
    Class,
}

/// A verified struct, union or class layout
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub kind: RecordKind,
    /// Members in declaration order
    pub members: Vec<(String, Type)>,
    pub size: usize,
}

impl Record {
    pub fn member(&self, name: &str) -> Option<&Type> {
        self.members.iter().find(|(n, _)| n == name).map(|(_, ty)| ty)
    }
}

/// Registered user-defined types, keyed by name
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    records: HashMap<String, Record>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record; returns false when the name is already taken
    pub fn register(&mut self, record: Record) -> bool {
        if self.records.contains_key(&record.name) {
            return false;
        }
        self.records.insert(record.name.clone(), record);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }

    pub fn size_of(&self, name: &str) -> Option<usize> {
        self.records.get(name).map(|r| r.size)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMITIVES: [&str; 6] = ["void", "bool", "char", "int", "float", "double"];

    #[test]
    fn test_primitive_same_iff_names_equal() {
        for a in PRIMITIVES {
            for b in PRIMITIVES {
                assert_eq!(
                    Type::construct(a).is_same(&Type::construct(b)),
                    a == b,
                    "{} vs {}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_construct_custom() {
        assert_eq!(Type::construct("Point"), Type::Custom("Point".to_string()));
        assert!(Type::construct("Point").is_same(&Type::construct("Point")));
        assert!(!Type::construct("Point").is_same(&Type::construct("Line")));
        assert!(!Type::construct("Point").is_same(&Type::Int));
    }

    #[test]
    fn test_void_array_is_wildcard_of_same_length() {
        let wildcard = Type::array(Type::Void, 4);
        for concrete in [Type::Int, Type::Double, Type::Custom("P".into()), Type::array(Type::Char, 2)] {
            assert!(wildcard.is_same(&Type::array(concrete.clone(), 4)));
            assert!(Type::array(concrete.clone(), 4).is_same(&wildcard));
            assert!(!wildcard.is_same(&Type::array(concrete, 5)));
        }
    }

    #[test]
    fn test_nested_arrays_compare_every_length() {
        let a = Type::array(Type::array(Type::Int, 3), 2);
        let b = Type::array(Type::array(Type::Void, 3), 2);
        let c = Type::array(Type::array(Type::Int, 4), 2);
        assert!(a.is_same(&b));
        assert!(!a.is_same(&c));
        assert!(!a.is_same(&Type::array(Type::array(Type::Float, 3), 2)));
    }

    #[test]
    fn test_sizes() {
        let mut registry = TypeRegistry::new();
        assert_eq!(Type::Bool.size(&registry), 1);
        assert_eq!(Type::Char.size(&registry), 1);
        assert_eq!(Type::Int.size(&registry), 4);
        assert_eq!(Type::Float.size(&registry), 4);
        assert_eq!(Type::Double.size(&registry), 8);
        assert_eq!(Type::array(Type::array(Type::Double, 3), 2).size(&registry), 48);
        assert_eq!(Type::Custom("Point".into()).size(&registry), 0);

        registry.register(Record {
            name: "Point".into(),
            kind: RecordKind::Struct,
            members: vec![("x".into(), Type::Int), ("y".into(), Type::Int)],
            size: 8,
        });
        assert_eq!(Type::array(Type::Custom("Point".into()), 3).size(&registry), 24);
    }

    #[test]
    fn test_oversized_array_saturates() {
        let registry = TypeRegistry::new();
        let huge = Type::array(Type::array(Type::Double, 1 << 40), 1 << 40);
        assert_eq!(huge.checked_size(&registry), None);
        assert_eq!(huge.size(&registry), usize::MAX);
        assert_eq!(Type::array(Type::Int, 3).checked_size(&registry), Some(12));
    }

    #[test]
    fn test_registry_rejects_redefinition() {
        let mut registry = TypeRegistry::new();
        let record = Record {
            name: "A".into(),
            kind: RecordKind::Union,
            members: vec![],
            size: 0,
        };
        assert!(registry.register(record.clone()));
        assert!(!registry.register(record));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_shape_helpers() {
        let ty = Type::array(Type::array(Type::Void, 3), 2);
        assert!(ty.is_placeholder());
        assert_eq!(ty.depth(), 2);
        assert_eq!(ty.element_after(1), Some(&Type::array(Type::Void, 3)));
        assert_eq!(ty.element_after(3), None);
        assert_eq!(Type::array(Type::array(Type::Int, 3), 2).to_string(), "int[2][3]");
        assert!(!Type::Int.is_placeholder());
    }
}
