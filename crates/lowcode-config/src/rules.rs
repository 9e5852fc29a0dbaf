//! Per-field normalization rules.
//!
//! Every configurable field is described by a [`FieldRule`]: the key it is
//! read from, a validator, and a formatter that folds the raw value into
//! [`ResolvedOptions`]. Rules run in table order against each raw layer
//! (config file, then CLI overrides), so a later layer merges on top of the
//! result of an earlier one.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::merge::{kind_of, merge_values};
use crate::options::{LowcodeOptions, ResolvedOptions, resolve_against};

type Validator = fn(&Value) -> bool;
type Formatter = fn(&Value, &mut ResolvedOptions) -> Result<()>;

/// Normalization rule for one field.
#[derive(Clone, Copy)]
pub struct FieldRule {
    field: &'static str,
    source: &'static str,
    expected: &'static str,
    validate: Validator,
    format: Option<Formatter>,
}

impl FieldRule {
    /// Rule reading `field` from the key of the same name.
    ///
    /// Defaults: any non-null value passes, and the value is assigned to the
    /// field as-is.
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            source: field,
            expected: "value",
            validate: |value| !value.is_null(),
            format: None,
        }
    }

    /// Read from a different raw key.
    pub fn source(mut self, source: &'static str) -> Self {
        self.source = source;
        self
    }

    pub fn expect(mut self, expected: &'static str, validate: Validator) -> Self {
        self.expected = expected;
        self.validate = validate;
        self
    }

    pub fn format(mut self, format: Formatter) -> Self {
        self.format = Some(format);
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Apply this rule to one raw layer. Absent or null values are skipped.
    pub fn apply(&self, raw: &Map<String, Value>, options: &mut ResolvedOptions) -> Result<()> {
        let Some(value) = raw.get(self.source).filter(|value| !value.is_null()) else {
            return Ok(());
        };

        if !(self.validate)(value) {
            return Err(type_error(self.field, self.expected, value));
        }

        match self.format {
            Some(format) => format(value, options),
            None => assign(self.field, value, options),
        }
    }
}

/// The rule table, in application order.
pub fn field_rules() -> [FieldRule; 6] {
    [
        FieldRule::new("format")
            .expect("string", |value| value.is_string() || is_string_array(value))
            .format(format_tokens),
        FieldRule::new("library").expect("string", Value::is_string),
        FieldRule::new("lowcode.metaDir")
            .source("metaPath")
            .expect("string", Value::is_string)
            .format(|value, options| {
                let dir = value.as_str().unwrap_or_default();
                options.lowcode.meta_dir = resolve_against(&options.context, dir.as_ref());
                Ok(())
            }),
        FieldRule::new("lowcode")
            .expect("object", Value::is_object)
            .format(merge_lowcode),
        FieldRule::new("externals")
            .expect("object", |value| value.is_object() || value.is_array())
            .format(merge_externals),
        FieldRule::new("outDir")
            .expect("string", Value::is_string)
            .format(|value, options| {
                let dir = value.as_str().unwrap_or_default();
                options.out_dir = resolve_against(&options.context, dir.as_ref());
                Ok(())
            }),
    ]
}

fn type_error(field: &str, expected: &'static str, value: &Value) -> ConfigError {
    ConfigError::Type {
        field: field.to_string(),
        expected,
        actual: kind_of(value),
    }
}

fn is_string_array(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string))
}

/// Default formatter: round-trip the options through JSON with the field replaced.
fn assign(field: &str, value: &Value, options: &mut ResolvedOptions) -> Result<()> {
    let mut doc = serde_json::to_value(&*options).map_err(|_| type_error(field, "value", value))?;
    if let Value::Object(map) = &mut doc {
        map.insert(field.to_string(), value.clone());
    }
    *options = serde_json::from_value(doc).map_err(|_| type_error(field, "value", value))?;
    Ok(())
}

/// `"cjs,esm"` or `["cjs", "esm"]` into a de-duplicated token list.
fn format_tokens(value: &Value, options: &mut ResolvedOptions) -> Result<()> {
    let raw: Vec<&str> = match value {
        Value::String(list) => list.split(',').collect(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => return Err(type_error("format", "string", value)),
    };

    let mut tokens: Vec<String> = Vec::with_capacity(raw.len());
    for token in raw.into_iter().map(str::trim).filter(|t| !t.is_empty()) {
        if !tokens.iter().any(|seen| seen == token) {
            tokens.push(token.to_string());
        }
    }
    options.format = tokens;
    Ok(())
}

/// Object form merges in; array form parses `name=Global` / `:name=Global` tokens.
fn merge_externals(value: &Value, options: &mut ResolvedOptions) -> Result<()> {
    match value {
        Value::Array(tokens) => {
            for token in tokens.iter().filter_map(Value::as_str) {
                let Some((key, global)) = token.split_once('=') else {
                    debug!(token, "ignoring externals token without '='");
                    continue;
                };
                let key = key.strip_prefix(':').unwrap_or(key);
                if key.is_empty() || global.is_empty() {
                    continue;
                }
                options.externals.insert(key.to_string(), global.to_string());
            }
        }
        Value::Object(map) => {
            for (key, global) in map {
                let Some(global) = global.as_str() else {
                    return Err(type_error(&format!("externals.{key}"), "string", global));
                };
                options.externals.insert(key.clone(), global.to_string());
            }
        }
        _ => return Err(type_error("externals", "object", value)),
    }
    Ok(())
}

/// Merge a partial `lowcode` object without clobbering unrelated defaults.
///
/// Strings win outright, arrays replace, objects deep-merge.
fn merge_lowcode(value: &Value, options: &mut ResolvedOptions) -> Result<()> {
    let Some(incoming) = value.as_object() else {
        return Err(type_error("lowcode", "object", value));
    };

    let mut current = serde_json::to_value(&options.lowcode)
        .map_err(|_| type_error("lowcode", "object", value))?;

    for (key, sub) in incoming {
        if sub.is_null() {
            continue;
        }

        let (expected, valid) = match key.as_str() {
            "metaDir" => ("string", sub.is_string()),
            "baseUrl" => (
                "string",
                sub.is_string()
                    || sub
                        .as_object()
                        .is_some_and(|modes| modes.values().all(Value::is_string)),
            ),
            "groups" | "categories" => ("array", is_string_array(sub)),
            "npmInfo" => ("object", sub.is_object()),
            "builtinAssets" => {
                let Some(assets) = sub.as_object() else {
                    return Err(type_error("lowcode.builtinAssets", "object", sub));
                };
                if let Some((name, list)) = assets.iter().find(|(_, list)| !list.is_array()) {
                    return Err(type_error(
                        &format!("lowcode.builtinAssets.{name}"),
                        "array",
                        list,
                    ));
                }
                ("object", true)
            }
            other => {
                debug!(field = other, "ignoring unknown lowcode option");
                continue;
            }
        };

        if !valid {
            return Err(type_error(&format!("lowcode.{key}"), expected, sub));
        }

        if let Value::Object(map) = &mut current {
            merge_values(map.entry(key.clone()).or_insert(Value::Null), sub);
        }
    }

    let mut lowcode: LowcodeOptions =
        serde_json::from_value(current).map_err(|_| type_error("lowcode", "object", value))?;
    lowcode.meta_dir = resolve_against(&options.context, &lowcode.meta_dir);
    options.lowcode = lowcode;
    Ok(())
}
