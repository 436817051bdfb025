//! Defines [`Fields`], the string-keyed map used for both document front
//! matter and site configuration, and its conversion into template
//! [`Value`]s.

use gtmpl_value::Value;
use serde_yaml::Value as Yaml;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A string-keyed map of YAML values. Consumers narrow the handful of keys
/// they care about through [`Fields::get_scalar`]; everything else passes
/// through to templates untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields(BTreeMap<String, Yaml>);

impl Fields {
    pub fn new() -> Fields {
        Fields::default()
    }

    /// Builds [`Fields`] from a parsed YAML document. `null` (an empty
    /// document) yields an empty map; anything else that isn't a mapping is
    /// rejected.
    pub fn from_yaml(yaml: Yaml) -> Result<Fields, NotAMappingError> {
        match yaml {
            Yaml::Null => Ok(Fields::new()),
            Yaml::Mapping(mapping) => {
                let mut fields = Fields::new();
                for (key, value) in mapping {
                    let key = match key {
                        Yaml::String(s) => s,
                        Yaml::Number(n) => n.to_string(),
                        Yaml::Bool(b) => b.to_string(),
                        other => return Err(NotAMappingError(describe(&other))),
                    };
                    fields.0.insert(key, value);
                }
                Ok(fields)
            }
            other => Err(NotAMappingError(describe(&other))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Yaml> {
        self.0.get(key)
    }

    /// Returns the value for `key` as a string if it is a string, number, or
    /// boolean. Sequences, mappings, and `null` count as absent.
    pub fn get_scalar(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Yaml::String(s) => Some(s.clone()),
            Yaml::Number(n) => Some(n.to_string()),
            Yaml::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: String, value: Yaml) -> Option<Yaml> {
        self.0.insert(key, value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

fn describe(yaml: &Yaml) -> &'static str {
    match yaml {
        Yaml::Null => "null",
        Yaml::Bool(_) => "a boolean",
        Yaml::Number(_) => "a number",
        Yaml::String(_) => "a string",
        Yaml::Sequence(_) => "a sequence",
        Yaml::Mapping(_) => "a mapping",
    }
}

/// Converts a YAML value into a template [`Value`]. Mappings become
/// [`Value::Map`] so that templates can probe for keys that aren't there.
pub fn yaml_to_value(yaml: &Yaml) -> Value {
    match yaml {
        Yaml::Null => Value::Nil,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                Value::from(n.as_f64().unwrap_or_default())
            }
        }
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(items) => Value::Array(items.iter().map(yaml_to_value).collect()),
        Yaml::Mapping(mapping) => {
            let mut m: HashMap<String, Value> = HashMap::new();
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s.clone(),
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    _ => continue,
                };
                m.insert(key, yaml_to_value(value));
            }
            Value::Map(m)
        }
    }
}

impl From<&Fields> for Value {
    fn from(fields: &Fields) -> Value {
        Value::Map(
            fields
                .0
                .iter()
                .map(|(k, v)| (k.clone(), yaml_to_value(v)))
                .collect(),
        )
    }
}

/// Returned when a YAML document that should hold key-value pairs holds
/// something else (or a mapping key can't be used as a string).
#[derive(Debug, PartialEq)]
pub struct NotAMappingError(&'static str);

impl fmt::Display for NotAMappingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "expected a mapping of string keys, found {}", self.0)
    }
}

impl std::error::Error for NotAMappingError {}
