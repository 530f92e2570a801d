//! Vire compiler front end
//!
//! Tokenizer, precedence-climbing parser and semantic analyzer producing a
//! verified, fully typed syntax tree.

pub mod config;
pub mod feedback;
pub mod frontend;
pub mod types;
pub mod utils;

pub use config::Config;
pub use frontend::check_source;
