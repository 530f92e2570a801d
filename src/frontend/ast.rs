//! Abstract Syntax Tree definitions for Vire
//!
//! Every node is a closed enum variant; the tree is single-owner. The
//! analyzer annotates `Expr::ty` in place and wraps values in `Cast` nodes.

use std::collections::HashMap;

use crate::frontend::token::TokenKind;
use crate::types::Type;
use crate::utils::Span;

/// A compilation unit
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Top-level statements, spliced into `main` by the analyzer
    pub pre_execution: Vec<Expr>,
    pub functions: Vec<FunctionItem>,
    pub classes: Vec<ClassDef>,
    pub types: Vec<TypeDef>,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&FunctionItem> {
        self.functions.iter().find(|f| f.name() == name)
    }

    /// The `main` function body, if one is defined
    pub fn main(&self) -> Option<&Function> {
        self.functions.iter().find_map(|f| match f {
            FunctionItem::Function(func) if func.proto.name.name == "main" => Some(func),
            _ => None,
        })
    }
}

/// Identifier with its position
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

// ==================== Declarations ====================

/// `var`, `let` or `const`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Var,
    Let,
    Const,
}

impl std::fmt::Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binding::Var => write!(f, "var"),
            Binding::Let => write!(f, "let"),
            Binding::Const => write!(f, "const"),
        }
    }
}

/// Variable definition; also used for parameters and class members
#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: Ident,
    pub binding: Binding,
    /// Declared type; `Void` (or a `Void`-bottomed array) when omitted
    pub declared: Type,
    pub value: Option<Box<Expr>>,
    /// Set when the declared type was inferred from the value
    pub uses_value_type: bool,
}

impl VariableDef {
    pub fn new(name: Ident, binding: Binding, declared: Type, value: Option<Expr>) -> Self {
        Self {
            name,
            binding,
            declared,
            value: value.map(Box::new),
            uses_value_type: false,
        }
    }

    /// The variable's effective type
    pub fn ty(&self) -> &Type {
        match &self.value {
            Some(value) if self.uses_value_type => &value.ty,
            _ => &self.declared,
        }
    }
}

/// Function signature shared by prototypes, externs and definitions
#[derive(Debug, Clone)]
pub struct Prototype {
    pub name: Ident,
    pub params: Vec<VariableDef>,
    pub ret: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub proto: Prototype,
    pub body: Vec<Expr>,
    /// Every variable defined in the body, in definition order
    pub locals: Vec<(String, Type)>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum FunctionItem {
    Prototype(Prototype),
    Extern(Prototype),
    Function(Function),
}

impl FunctionItem {
    pub fn proto(&self) -> &Prototype {
        match self {
            FunctionItem::Prototype(p) | FunctionItem::Extern(p) => p,
            FunctionItem::Function(f) => &f.proto,
        }
    }

    pub fn name(&self) -> &str {
        &self.proto().name.name
    }
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: Ident,
    pub parent: Option<Ident>,
    pub members: Vec<VariableDef>,
    pub methods: Vec<FunctionItem>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDefKind {
    Struct,
    Union,
}

/// Struct or union member
#[derive(Debug, Clone)]
pub enum Member {
    Field { name: Ident, ty: Type },
    Nested(TypeDef),
}

impl Member {
    pub fn name(&self) -> &Ident {
        match self {
            Member::Field { name, .. } => name,
            Member::Nested(def) => &def.name,
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Member::Field { ty, .. } => ty.clone(),
            Member::Nested(def) => Type::Custom(def.name.name.clone()),
        }
    }
}

/// Struct or union definition
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub kind: TypeDefKind,
    pub name: Ident,
    /// Members in declaration order
    pub members: Vec<Member>,
    /// Member name -> position in `members` (first occurrence)
    pub index: HashMap<String, usize>,
    /// Byte size, computed by the analyzer
    pub size: usize,
    pub span: Span,
}

impl TypeDef {
    pub fn new(kind: TypeDefKind, name: Ident, members: Vec<Member>, span: Span) -> Self {
        let mut index = HashMap::new();
        for (i, member) in members.iter().enumerate() {
            index.entry(member.name().name.clone()).or_insert(i);
        }
        Self {
            kind,
            name,
            members,
            index,
            size: 0,
            span,
        }
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.index.get(name).map(|&i| &self.members[i])
    }
}

// ==================== Expressions ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_token(kind: &TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            TokenKind::StarStar => BinaryOp::Pow,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::AndAnd => BinaryOp::And,
            TokenKind::OrOr => BinaryOp::Or,
            _ => return None,
        })
    }

    /// Operator for a compound assignment token (`+=` -> `+`)
    pub fn from_compound_assign(kind: &TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::PlusEq => BinaryOp::Add,
            TokenKind::MinusEq => BinaryOp::Sub,
            TokenKind::StarEq => BinaryOp::Mul,
            TokenKind::SlashEq => BinaryOp::Div,
            TokenKind::PercentEq => BinaryOp::Mod,
            _ => return None,
        })
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// One `if`/`else if`/`else` arm; `condition` is `None` for the trailing `else`
#[derive(Debug, Clone)]
pub struct IfThen {
    pub condition: Option<Box<Expr>>,
    pub body: Vec<Expr>,
    pub span: Span,
}

/// An expression or statement node with its resolved type
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    /// `Void` until the analyzer resolves it
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    // Literals
    Int(i64),
    Float(f64),
    Double(f64),
    Char(char),
    Str(String),
    Bool(bool),
    /// Array literal; the parser stores `Array { Void, len }` in `ty`
    Array(Vec<Expr>),

    // Variables
    Variable(String),
    VariableDef(Box<VariableDef>),
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    ArrayAccess {
        base: Box<Expr>,
        indices: Vec<Expr>,
    },
    IncrDecr {
        target: Box<Expr>,
        increment: bool,
        prefix: bool,
    },

    // Operators
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },

    // Control flow
    If {
        head: IfThen,
        ladder: Vec<IfThen>,
    },
    For {
        init: Box<Expr>,
        cond: Box<Expr>,
        step: Box<Expr>,
        body: Vec<Expr>,
    },
    While {
        cond: Box<Expr>,
        body: Vec<Expr>,
    },
    Break(Option<Box<Expr>>),
    Continue(Option<Box<Expr>>),
    Return(Option<Box<Expr>>),

    /// Implicit conversion inserted by the analyzer; the destination is `Expr::ty`
    Cast {
        value: Box<Expr>,
        from: Type,
    },

    // Memory tagging
    Unsafe(Vec<Expr>),
    Reference(Box<Expr>),

    // Records
    TypeDef(Box<TypeDef>),
    /// `parent.child`; chains nest to the right
    Access {
        parent: Box<Expr>,
        child: Box<Expr>,
    },
    New {
        class: Ident,
        args: Vec<Expr>,
    },
    Delete(Ident),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            ty: Type::Void,
            span,
        }
    }

    pub fn with_type(kind: ExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    /// Wrap `value` in a cast to `to`
    pub fn cast(value: Expr, to: Type) -> Self {
        let span = value.span;
        let from = value.ty.clone();
        Self {
            kind: ExprKind::Cast {
                value: Box::new(value),
                from,
            },
            ty: to,
            span,
        }
    }

    /// Node kind name used in messages
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            ExprKind::Int(_) => "int literal",
            ExprKind::Float(_) => "float literal",
            ExprKind::Double(_) => "double literal",
            ExprKind::Char(_) => "char literal",
            ExprKind::Str(_) => "string literal",
            ExprKind::Bool(_) => "bool literal",
            ExprKind::Array(_) => "array literal",
            ExprKind::Variable(_) => "variable",
            ExprKind::VariableDef(_) => "variable definition",
            ExprKind::Assign { .. } => "assignment",
            ExprKind::ArrayAccess { .. } => "array access",
            ExprKind::IncrDecr { .. } => "increment/decrement",
            ExprKind::Unary { .. } => "unary expression",
            ExprKind::Binary { .. } => "binary expression",
            ExprKind::Call { .. } => "call",
            ExprKind::If { .. } => "if",
            ExprKind::For { .. } => "for",
            ExprKind::While { .. } => "while",
            ExprKind::Break(_) => "break",
            ExprKind::Continue(_) => "continue",
            ExprKind::Return(_) => "return",
            ExprKind::Cast { .. } => "cast",
            ExprKind::Unsafe(_) => "unsafe block",
            ExprKind::Reference(_) => "reference",
            ExprKind::TypeDef(_) => "type definition",
            ExprKind::Access { .. } => "member access",
            ExprKind::New { .. } => "new",
            ExprKind::Delete(_) => "delete",
        }
    }

    /// Whether the node may stand on the left of `=`
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Variable(_) | ExprKind::ArrayAccess { .. } | ExprKind::Access { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_def_reads_through_to_value_type() {
        let value = Expr::with_type(ExprKind::Int(3), Type::Int, Span::dummy());
        let mut def = VariableDef::new(
            Ident::new("y", Span::dummy()),
            Binding::Let,
            Type::Void,
            Some(value),
        );
        assert_eq!(def.ty(), &Type::Void);
        def.uses_value_type = true;
        assert_eq!(def.ty(), &Type::Int);
    }

    #[test]
    fn test_type_def_index_keeps_first_occurrence() {
        let field = |name: &str, ty| Member::Field { name: Ident::new(name, Span::dummy()), ty };
        let def = TypeDef::new(
            TypeDefKind::Struct,
            Ident::new("P", Span::dummy()),
            vec![field("x", Type::Int), field("y", Type::Char), field("x", Type::Double)],
            Span::dummy(),
        );
        assert_eq!(def.index["x"], 0);
        assert_eq!(def.member("y").map(Member::ty), Some(Type::Char));
    }

    #[test]
    fn test_cast_records_source_type() {
        let value = Expr::with_type(ExprKind::Double(2.5), Type::Double, Span::dummy());
        let cast = Expr::cast(value, Type::Int);
        assert_eq!(cast.ty, Type::Int);
        assert!(matches!(cast.kind, ExprKind::Cast { from: Type::Double, .. }));
    }
}
