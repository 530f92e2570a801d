//! Error handling for the Vire front end

use crate::utils::diagnostics::ErrorKind;
use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Front end error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Lexer Errors ====================

    #[error("Unknown character: '{ch}'")]
    UnknownChar { ch: char, span: Span },

    #[error("Unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("Unterminated character literal")]
    UnterminatedChar { span: Span },

    #[error("Empty character literal")]
    EmptyChar { span: Span },

    #[error("Malformed number literal `{text}`: {reason}")]
    MalformedNumber {
        text: String,
        reason: String,
        span: Span,
    },

    // ==================== Parser Errors ====================

    #[error("Unexpected token: expected {expected}, got `{got}`")]
    UnexpectedToken {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Unexpected end of file: {context}")]
    UnexpectedEof { context: String, span: Span },

    #[error("Expected expression, got `{got}`")]
    ExpectedExpr { got: String, span: Span },

    #[error("Member access target must be a variable, call or access")]
    InvalidAccess { span: Span },

    #[error("Invalid assignment target")]
    InvalidAssignTarget { span: Span },

    #[error("`{word}` is a reserved keyword")]
    ReservedKeyword { word: String, span: Span },

    #[error("Array length {length} exceeds the maximum of {max}")]
    ArrayTooLong { length: i64, max: usize, span: Span },

    // ==================== Semantic Errors ====================

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String, span: Span },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String, span: Span },

    #[error("Undefined type: {name}")]
    UndefinedType { name: String, span: Span },

    #[error("Variable `{name}` is already defined")]
    Redeclaration { name: String, span: Span },

    #[error("`{binding} {name}` requires a type or a value")]
    TypeRequired {
        binding: String,
        name: String,
        span: Span,
    },

    #[error("Type of `{name}` cannot be inferred here, a concrete type is required")]
    UnresolvedType { name: String, span: Span },

    #[error("Type {ty} is too large")]
    TypeTooLarge { ty: String, span: Span },

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Cannot initialize `{name}` from an array that is not an array literal")]
    ArrayCopy { name: String, span: Span },

    #[error("Array elements do not match: expected {expected}, got {got}")]
    MixedArrayElements {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Operand must be numeric, got {got}")]
    NotNumeric { got: String, span: Span },

    #[error("Cannot assign to constant `{name}`")]
    AssignToConst { name: String, span: Span },

    #[error("`{name}` is not an array")]
    NotAnArray { name: String, span: Span },

    #[error("Array index count mismatch: array has {expected} dimension(s), got {got} index(es)")]
    IndexCountMismatch {
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("Array index {index} is out of bounds for length {length}")]
    IndexOutOfBounds {
        index: i64,
        length: usize,
        span: Span,
    },

    #[error("Array index must be int, got {got}")]
    NonIntegerIndex { got: String, span: Span },

    #[error("Argument count mismatch calling `{name}`: expected {expected}, got {got}")]
    ArgCountMismatch {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("Argument {index} of `{name}` has type {got}, expected {expected}")]
    ArgTypeMismatch {
        name: String,
        index: usize,
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Cannot call `main`, it is the entry point")]
    MainCalled { span: Span },

    #[error("Invalid {construct} condition: {reason}")]
    InvalidCondition {
        construct: String,
        reason: String,
        span: Span,
    },

    #[error("Invalid for-loop {clause}: expected {expected}")]
    InvalidLoopClause {
        clause: String,
        expected: String,
        span: Span,
    },

    #[error("Duplicate definition: {name}")]
    DuplicateDefinition { name: String, span: Span },

    #[error("Duplicate member `{member}` in `{owner}`")]
    DuplicateMember {
        member: String,
        owner: String,
        span: Span,
    },

    #[error("No member `{member}` in `{owner}`")]
    UnknownMember {
        member: String,
        owner: String,
        span: Span,
    },

    #[error("Type {got} has no members")]
    NotARecord { got: String, span: Span },

    #[error("Extern function `{name}` is not allowed inside class `{class}`")]
    ExternInClass {
        name: String,
        class: String,
        span: Span,
    },
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Span {
        match self {
            Self::UnknownChar { span, .. }
            | Self::UnterminatedString { span }
            | Self::UnterminatedChar { span }
            | Self::EmptyChar { span }
            | Self::MalformedNumber { span, .. }
            | Self::UnexpectedToken { span, .. }
            | Self::UnexpectedEof { span, .. }
            | Self::ExpectedExpr { span, .. }
            | Self::InvalidAccess { span }
            | Self::InvalidAssignTarget { span }
            | Self::ArrayTooLong { span, .. }
            | Self::ReservedKeyword { span, .. }
            | Self::UndefinedVariable { span, .. }
            | Self::UndefinedFunction { span, .. }
            | Self::UndefinedType { span, .. }
            | Self::Redeclaration { span, .. }
            | Self::TypeRequired { span, .. }
            | Self::UnresolvedType { span, .. }
            | Self::TypeTooLarge { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::ArrayCopy { span, .. }
            | Self::MixedArrayElements { span, .. }
            | Self::NotNumeric { span, .. }
            | Self::AssignToConst { span, .. }
            | Self::NotAnArray { span, .. }
            | Self::IndexCountMismatch { span, .. }
            | Self::IndexOutOfBounds { span, .. }
            | Self::NonIntegerIndex { span, .. }
            | Self::ArgCountMismatch { span, .. }
            | Self::ArgTypeMismatch { span, .. }
            | Self::MainCalled { span }
            | Self::InvalidCondition { span, .. }
            | Self::InvalidLoopClause { span, .. }
            | Self::DuplicateDefinition { span, .. }
            | Self::DuplicateMember { span, .. }
            | Self::UnknownMember { span, .. }
            | Self::NotARecord { span, .. }
            | Self::ExternInClass { span, .. } => *span,
        }
    }

    /// The diagnostic category this error is reported under
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownChar { .. } => ErrorKind::UnknownChar,
            Self::UnterminatedString { .. }
            | Self::UnterminatedChar { .. }
            | Self::EmptyChar { .. } => ErrorKind::UnterminatedLiteral,
            Self::MalformedNumber { .. } => ErrorKind::MalformedNumber,
            Self::UnexpectedToken { .. } | Self::ExpectedExpr { .. } => ErrorKind::UnexpectedToken,
            Self::UnexpectedEof { .. } => ErrorKind::UnexpectedEof,
            Self::InvalidAccess { .. }
            | Self::InvalidAssignTarget { .. }
            | Self::ReservedKeyword { .. } => ErrorKind::InvalidSyntax,
            Self::UndefinedVariable { .. }
            | Self::UndefinedFunction { .. }
            | Self::UndefinedType { .. } => ErrorKind::UndefinedSymbol,
            Self::Redeclaration { .. } => ErrorKind::Redeclaration,
            Self::TypeRequired { .. } => ErrorKind::TypeRequired,
            Self::UnresolvedType { .. }
            | Self::TypeTooLarge { .. }
            | Self::ArrayTooLong { .. } => ErrorKind::InvalidType,
            Self::TypeMismatch { .. }
            | Self::ArrayCopy { .. }
            | Self::MixedArrayElements { .. }
            | Self::NotNumeric { .. } => ErrorKind::TypeMismatch,
            Self::AssignToConst { .. } => ErrorKind::ConstViolation,
            Self::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            Self::NotAnArray { .. }
            | Self::IndexCountMismatch { .. }
            | Self::NonIntegerIndex { .. } => ErrorKind::InvalidIndex,
            Self::ArgCountMismatch { .. } | Self::ArgTypeMismatch { .. } => {
                ErrorKind::ArgumentMismatch
            }
            Self::MainCalled { .. } | Self::ExternInClass { .. } => ErrorKind::InvalidCall,
            Self::InvalidCondition { .. } | Self::InvalidLoopClause { .. } => {
                ErrorKind::InvalidCondition
            }
            Self::DuplicateDefinition { .. } => ErrorKind::DuplicateDefinition,
            Self::DuplicateMember { .. }
            | Self::UnknownMember { .. }
            | Self::NotARecord { .. } => ErrorKind::InvalidMember,
        }
    }
}
