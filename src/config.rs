//! Front end configuration
//!
//! Holds the binary-operator precedence table used by the parser and the
//! prefix printed in front of every diagnostic. Both can be overridden from a
//! JSON file; entries in the file are merged over the defaults.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Operator text -> precedence; higher binds tighter
    pub binop_precedence: BTreeMap<String, i32>,
    /// Prefix for rendered diagnostics
    pub diagnostic_prefix: String,
}

impl Config {
    pub fn new() -> Self {
        let mut config = Self {
            binop_precedence: BTreeMap::new(),
            diagnostic_prefix: "This program".to_string(),
        };
        config.install_default_binops();
        config
    }

    /// Default table: comparisons, then additive, multiplicative and power
    pub fn install_default_binops(&mut self) {
        for op in ["<", ">", "<=", ">=", "==", "!="] {
            self.binop_precedence.insert(op.to_string(), 10);
        }
        for op in ["+", "-"] {
            self.binop_precedence.insert(op.to_string(), 20);
        }
        for op in ["*", "/", "%"] {
            self.binop_precedence.insert(op.to_string(), 40);
        }
        self.binop_precedence.insert("**".to_string(), 60);
    }

    /// Precedence of a binary operator, or -1 when `op` is not one
    pub fn binop_precedence(&self, op: &str) -> i32 {
        match self.binop_precedence.get(op) {
            Some(&prec) if prec > 0 => prec,
            _ => -1,
        }
    }

    pub fn set_binop_precedence(&mut self, op: impl Into<String>, prec: i32) {
        self.binop_precedence.insert(op.into(), prec);
    }

    /// Parse a JSON config, merging its operator table over the defaults
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let overrides: Config = serde_json::from_str(text).context("invalid config JSON")?;
        let mut config = Self::new();
        config.binop_precedence.extend(overrides.binop_precedence);
        config.diagnostic_prefix = overrides.diagnostic_prefix;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in config file {}", path.display()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
