//! Structural normalization of model-produced filter objects.
//!
//! The model rarely gets the *shape* of the filter object exactly right: it
//! wraps the whole thing in an envelope, nests fields under section headings
//! ("person", "company"...), uses old field names, wraps plain lists in
//! include/exclude objects, or emits a string where a list is expected. This
//! stage fixes shape only. Values are left untouched for [`super::repair`].

use serde_json::{Map, Value};

use super::schema::{ENUM_FIELDS, KNOWN_FIELDS, OBJECT_FIELDS, STRING_LIST_FIELDS, TEXT_FIELDS};
use super::tables::{ENVELOPE_KEYS, FIELD_ALIASES};

/// Maximum nesting depth of wrapper sections that gets flattened.
const MAX_WRAPPER_DEPTH: usize = 3;

/// Untyped output of the generation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFilters(pub Value);

impl RawFilters {
    pub fn new(value: Value) -> Self {
        Self(value)
    }
}

/// A flat object whose keys are (mostly) [`KNOWN_FIELDS`] and whose values
/// have the right JSON shape for their field.
///
/// Keys that are still unknown after normalization are kept so strict
/// validation can reject them and lenient recovery can drop them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFilters(pub Map<String, Value>);

impl NormalizedFilters {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Run every structural rule over a raw object.
pub fn normalize(raw: RawFilters) -> NormalizedFilters {
    let Some(root) = into_object(raw.0) else {
        tracing::debug!("filter output is not an object, starting from empty");
        return NormalizedFilters::default();
    };

    let root = unwrap_envelope(root);
    let mut flat = Map::new();
    flatten_into(&mut flat, root, 0);
    let renamed = apply_aliases(flat);

    let mut out = Map::new();
    for (key, value) in renamed {
        if let Some(fixed) = fix_shape(&key, value) {
            out.insert(key, fixed);
        }
    }
    NormalizedFilters(out)
}

// ─── Envelope & wrappers ─────────────────────────────────────────────────────

/// Accept an object, or a string that contains one.
fn into_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::String(text) => {
            let trimmed = strip_code_fence(text.trim());
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            }
        }
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// `{"search_filters": {...}, ...}` → the inner object, with sibling keys
/// merged in underneath it.
fn unwrap_envelope(mut root: Map<String, Value>) -> Map<String, Value> {
    for key in ENVELOPE_KEYS {
        if root.get(*key).is_some_and(Value::is_object) {
            let Some(Value::Object(mut inner)) = root.remove(*key) else {
                continue;
            };
            for (k, v) in root {
                inner.entry(k).or_insert(v);
            }
            return unwrap_envelope(inner);
        }
    }
    root
}

fn is_wrapper(key: &str, value: &Value) -> bool {
    value.is_object() && !KNOWN_FIELDS.contains(&key) && !OBJECT_FIELDS.contains(&alias_target(key))
}

fn alias_target(key: &str) -> &str {
    FIELD_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, target)| *target)
        .unwrap_or(key)
}

/// Lift wrapper sections into `out`. Earlier (shallower) keys win.
fn flatten_into(out: &mut Map<String, Value>, source: Map<String, Value>, depth: usize) {
    let mut wrappers = Vec::new();
    for (key, value) in source {
        if is_wrapper(&key, &value) && depth < MAX_WRAPPER_DEPTH {
            wrappers.push((key, value));
        } else if !out.contains_key(&key) {
            out.insert(key, value);
        }
    }
    for (key, value) in wrappers {
        tracing::debug!(wrapper = %key, depth, "flattening filter wrapper section");
        if let Value::Object(inner) = value {
            flatten_into(out, inner, depth + 1);
        }
    }
}

fn apply_aliases(map: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    let mut aliased = Vec::new();
    for (key, value) in map {
        let target = alias_target(&key);
        if target == key {
            out.insert(key, value);
        } else {
            aliased.push((target.to_string(), key, value));
        }
    }
    for (target, alias, value) in aliased {
        tracing::debug!(from = %alias, to = %target, "renaming filter field");
        match out.get_mut(&target) {
            None => {
                out.insert(target, value);
            }
            Some(Value::Array(existing)) => match value {
                Value::Array(items) => existing.extend(items),
                other => existing.push(other),
            },
            Some(_) => {}
        }
    }
    out
}

// ─── Per-field shape ─────────────────────────────────────────────────────────

/// Coerce one field's value into the JSON shape its schema expects.
/// `None` drops the key.
fn fix_shape(key: &str, value: Value) -> Option<Value> {
    if value.is_null() {
        return None;
    }
    if ENUM_FIELDS.contains(&key) || STRING_LIST_FIELDS.contains(&key) {
        return string_list(value).map(Value::Array);
    }
    if TEXT_FIELDS.contains(&key) {
        let text = single_text(value)?;
        let text = if key == "lookalike_domain" {
            bare_domain(&text)
        } else {
            text
        };
        return (!text.is_empty()).then_some(Value::String(text));
    }
    match key {
        "names" | "company_names" => include_exclude(value),
        "locations" => locations(value),
        "location_filter_type" => location_filter_type(value),
        "skip_owned_leads" | "show_one_lead_per_company" => Some(boolean(value)),
        _ => Some(value),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Any of `"x"`, `["x", ...]`, `{"include": [...]}` → a list of strings.
fn string_list(value: Value) -> Option<Vec<Value>> {
    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("include") {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => return None,
        },
        other => vec![other],
    };
    let list: Vec<Value> = items
        .iter()
        .filter_map(scalar_text)
        .map(Value::String)
        .collect();
    (!list.is_empty()).then_some(list)
}

/// Any of `"x"`, `["x", "y"]`, `{"include": ...}` → one string.
fn single_text(value: Value) -> Option<String> {
    match value {
        Value::Object(mut map) => map.remove("include").and_then(single_text),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_text).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        other => scalar_text(&other),
    }
}

fn bare_domain(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    without_www
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn include_exclude(value: Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for side in ["include", "exclude"] {
                if let Some(list) = map.get(side).cloned().and_then(string_list) {
                    out.insert(side.to_string(), Value::Array(list));
                }
            }
            (!out.is_empty()).then_some(Value::Object(out))
        }
        other => {
            let list = string_list(other)?;
            let mut out = Map::new();
            out.insert("include".to_string(), Value::Array(list));
            Some(Value::Object(out))
        }
    }
}

fn locations(value: Value) -> Option<Value> {
    match value {
        Value::String(_) => string_list(value).map(Value::Array),
        Value::Array(items) => {
            // Resolved places stay as objects; bare strings stay as names.
            if items.iter().any(Value::is_object) {
                Some(Value::Array(items.into_iter().filter(Value::is_object).collect()))
            } else {
                string_list(Value::Array(items)).map(Value::Array)
            }
        }
        Value::Object(map) => {
            let include = map.get("include").cloned().unwrap_or(Value::Null);
            let names_only = match &include {
                Value::Array(items) => items.iter().all(Value::is_string),
                Value::String(_) => true,
                _ => false,
            };
            if names_only && !map.contains_key("exclude") {
                string_list(include).map(Value::Array)
            } else {
                Some(Value::Object(map))
            }
        }
        _ => None,
    }
}

fn location_filter_type(value: Value) -> Option<Value> {
    let text = single_text(value)?.to_lowercase();
    let mapped = match text.as_str() {
        "contact" | "person" | "lead" => "contact",
        "company_hq" | "company" | "hq" | "headquarters" | "company hq" => "company_hq",
        _ => return Some(Value::String(text)),
    };
    Some(Value::String(mapped.to_string()))
}

fn boolean(value: Value) -> Value {
    if let Value::String(s) = &value {
        match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => return Value::Bool(true),
            "false" | "no" | "0" => return Value::Bool(false),
            _ => {}
        }
    }
    value
}

// ─── Tests ───────────────────────────────────────────────────────────────────
