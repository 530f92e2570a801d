//! Type model shared by the parser and the analyzer

pub mod type_system;

pub use type_system::{Record, RecordKind, Type, TypeRegistry};
