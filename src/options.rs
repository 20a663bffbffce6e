//! Option model: values, override sets and the typed option table.
//!
//! Option table file format (JSON object, key -> spec):
//! {
//!   "timeout":         {"type": "int", "default": 10},
//!   "body_size_limit": {"type": "str", "default": null, "optional": true},
//!   "callback":        {"type": "map", "default": {}, "help": "callback addon settings"}
//! }
//!
//! Kinds: bool | int | float | str | seq | map | any. `float` also accepts
//! integers; `null` is accepted only for optional specs and for `any`.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::ConfigFault;

/// Opaque option value. Whatever `get` returns is accepted back by `update`.
pub type OptionValue = Value;

/// Requested overrides, key -> new value. Applied in ascending key order.
pub type OverrideSet = BTreeMap<String, OptionValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Bool,
    Int,
    Float,
    Str,
    Seq,
    Map,
    Any,
}

impl OptionKind {
    fn accepts(self, v: &Value) -> bool {
        match self {
            OptionKind::Bool => v.is_boolean(),
            OptionKind::Int => v.is_i64() || v.is_u64(),
            OptionKind::Float => v.is_number(),
            OptionKind::Str => v.is_string(),
            OptionKind::Seq => v.is_array(),
            OptionKind::Map => v.is_object(),
            OptionKind::Any => true,
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptionKind::Bool => "bool",
            OptionKind::Int => "int",
            OptionKind::Float => "float",
            OptionKind::Str => "str",
            OptionKind::Seq => "seq",
            OptionKind::Map => "map",
            OptionKind::Any => "any",
        };
        f.write_str(s)
    }
}

/// JSON type name of a value, for error messages.
pub fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Declaration of a single option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    #[serde(rename = "type")]
    pub kind: OptionKind,
    #[serde(default)]
    pub default: OptionValue,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl OptionSpec {
    pub fn new(kind: OptionKind, default: OptionValue) -> Self {
        Self {
            kind,
            default,
            optional: false,
            help: None,
        }
    }

    /// Allow `null` as a value.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Check `v` against this declaration.
    pub fn validate(&self, v: &Value) -> std::result::Result<(), ConfigFault> {
        if v.is_null() {
            if self.optional || self.kind == OptionKind::Any {
                return Ok(());
            }
            return Err(ConfigFault::NullNotAllowed);
        }
        if self.kind.accepts(v) {
            Ok(())
        } else {
            Err(ConfigFault::TypeMismatch {
                expected: self.kind,
                found: value_type_name(v),
            })
        }
    }
}

/// Ordered set of option declarations, usually loaded from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionTable {
    specs: BTreeMap<String, OptionSpec>,
}

impl OptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let table: OptionTable = serde_json::from_str(s).context("parse option table")?;
        table.check_defaults()?;
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read option table {}", path.display()))?;
        Self::from_json_str(&s).with_context(|| format!("load {}", path.display()))
    }

    /// Add a declaration; fails if the key exists or the default does not fit.
    pub fn insert<K: Into<String>>(&mut self, key: K, spec: OptionSpec) -> Result<()> {
        let key = key.into();
        if self.specs.contains_key(&key) {
            return Err(anyhow!("option '{}' declared twice", key));
        }
        spec.validate(&spec.default)
            .map_err(|f| anyhow!("default of option '{}': {}", key, f))?;
        self.specs.insert(key, spec);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&OptionSpec> {
        self.specs.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionSpec)> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    fn check_defaults(&self) -> Result<()> {
        for (key, spec) in &self.specs {
            spec.validate(&spec.default)
                .map_err(|f| anyhow!("default of option '{}': {}", key, f))?;
        }
        Ok(())
    }
}

impl IntoIterator for OptionTable {
    type Item = (String, OptionSpec);
    type IntoIter = std::collections::btree_map::IntoIter<String, OptionSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn float_accepts_integers_but_int_rejects_floats() {
        let f = OptionSpec::new(OptionKind::Float, json!(1.5));
        assert!(f.validate(&json!(3)).is_ok());

        let i = OptionSpec::new(OptionKind::Int, json!(1));
        assert_eq!(
            i.validate(&json!(2.5)),
            Err(ConfigFault::TypeMismatch {
                expected: OptionKind::Int,
                found: "float"
            })
        );
    }

    #[test]
    fn null_only_for_optional_or_any() {
        let s = OptionSpec::new(OptionKind::Str, json!("3m"));
        assert_eq!(s.validate(&Value::Null), Err(ConfigFault::NullNotAllowed));
        assert!(s.clone().optional().validate(&Value::Null).is_ok());
        assert!(OptionSpec::new(OptionKind::Any, Value::Null)
            .validate(&Value::Null)
            .is_ok());
    }

    #[test]
    fn table_parses_file_format() {
        let t = OptionTable::from_json_str(
            r#"{
                "timeout": {"type": "int", "default": 10},
                "body_size_limit": {"type": "str", "default": null, "optional": true},
                "callback": {"type": "map", "default": {}, "help": "callback addon"}
            }"#,
        )
        .expect("must parse");
        assert_eq!(t.len(), 3);
        assert_eq!(t.get("timeout").map(|s| s.kind), Some(OptionKind::Int));
        assert_eq!(
            t.get("callback").and_then(|s| s.help.as_deref()),
            Some("callback addon")
        );
    }

    #[test]
    fn table_rejects_bad_default_and_duplicates() {
        let bad = OptionTable::from_json_str(r#"{"timeout": {"type": "int", "default": "x"}}"#);
        assert!(bad.is_err());

        let mut t = OptionTable::new();
        t.insert("a", OptionSpec::new(OptionKind::Int, json!(1))).unwrap();
        assert!(t.insert("a", OptionSpec::new(OptionKind::Int, json!(2))).is_err());
    }
}
