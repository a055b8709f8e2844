//! Natural language → [`SearchFilters`].
//!
//! [`FilterCompiler::compile`] never fails. When generation fails or yields
//! nothing usable, a keyword scan of the user's text stands in for the model.
//! When the repaired object does not pass the strict schema as a whole, each
//! field is validated on its own and only the survivors are kept.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::locations::known_location_names;
use super::normalize::{normalize, RawFilters};
use super::repair::{headcount_buckets, parse_headcount_range, repair, Terms};
use super::schema::{Department, EmployeeCount, FilterEnum, Industry, Level, Revenue, SearchFilters};
use super::tables::{EMPLOYEE_COUNT_SYNONYMS, INDUSTRY_SYNONYMS, REVENUE_SYNONYMS, TITLE_VARIANTS};
use crate::inference::{generate_json, CompletionService, JsonRequest, ModelRole};
use crate::usage::UsageSink;

/// Usage-log action name for ICP parsing.
pub const PARSE_ACTION: &str = "icp-parse";

const HEADCOUNT_WORDS: &[&str] = &[
    "employees",
    "employee",
    "employés",
    "salariés",
    "people",
    "staff",
    "headcount",
];

/// Compiles free-text ideal-customer descriptions into search filters.
pub struct FilterCompiler {
    completion: Arc<dyn CompletionService>,
    usage: Arc<dyn UsageSink>,
}

impl FilterCompiler {
    pub fn new(completion: Arc<dyn CompletionService>, usage: Arc<dyn UsageSink>) -> Self {
        Self { completion, usage }
    }

    /// Compile `free_text` into a schema-valid filter set.
    pub async fn compile(&self, free_text: &str, workspace_id: &str) -> SearchFilters {
        match self.generate(free_text, workspace_id).await {
            Ok(value) => {
                let filters = compile_value(RawFilters::new(value), Some(free_text));
                if !filters.is_trivial() {
                    return filters;
                }
                tracing::info!("generated filters were empty, falling back to keyword extraction");
            }
            Err(err) => {
                tracing::warn!(error = %err, "ICP generation failed, falling back to keyword extraction");
            }
        }
        compile_value(RawFilters::new(heuristic_filters(free_text)), Some(free_text))
    }

    async fn generate(&self, free_text: &str, workspace_id: &str) -> Result<Value, crate::inference::InferenceError> {
        let request = JsonRequest {
            action: PARSE_ACTION.to_string(),
            system: instructions(),
            prompt: free_text.to_string(),
            role: ModelRole::Primary,
            temperature: None,
            max_tokens: None,
        };
        generate_json::<Value>(self.completion.as_ref(), &self.usage, workspace_id, request).await
    }
}

/// Run the post-generation pipeline over an untyped filter object.
///
/// With `free_text`, the intent rule and level/department inference run
/// too; tool inputs that already went through compilation skip them.
pub fn compile_value(raw: RawFilters, free_text: Option<&str>) -> SearchFilters {
    let mut repaired = repair(normalize(raw));
    repaired.expand_title_variants();
    if let Some(text) = free_text {
        repaired.apply_intent_rule(text);
        repaired.infer_missing();
    }
    if !repaired.dropped.is_empty() {
        tracing::info!(dropped = repaired.dropped.len(), "filter values dropped during repair");
    }

    let mut filters = validate(repaired.into_map());
    filters.force_dedup();
    filters
}

/// Bring filters supplied as a tool argument back to a valid value.
pub fn coerce(value: Value) -> SearchFilters {
    compile_value(RawFilters::new(value), None)
}

// ─── Validation ──────────────────────────────────────────────────────────────

fn validate(map: Map<String, Value>) -> SearchFilters {
    let whole = Value::Object(map);
    match SearchFilters::deserialize(&whole) {
        Ok(filters) if !filters.is_trivial() => return filters,
        Ok(_) => tracing::debug!("strict validation produced an empty filter set"),
        Err(err) => tracing::debug!(error = %err, "strict validation failed, recovering per field"),
    }
    let Value::Object(map) = whole else {
        return SearchFilters::default();
    };
    lenient(map)
}

/// Keep only the fields that pass validation individually.
fn lenient(map: Map<String, Value>) -> SearchFilters {
    let mut kept = Map::new();
    for (key, value) in map {
        let mut single = Map::new();
        single.insert(key.clone(), value);
        let single = Value::Object(single);
        match SearchFilters::deserialize(&single) {
            Ok(_) => {
                if let Value::Object(entry) = single {
                    kept.extend(entry);
                }
            }
            Err(err) => {
                tracing::warn!(field = %key, error = %err, "dropping filter field that fails validation");
            }
        }
    }
    SearchFilters::deserialize(&Value::Object(kept)).unwrap_or_default()
}

// ─── Keyword extraction ──────────────────────────────────────────────────────

/// Whole-word, case-sensitive match for short uppercase tokens ("US", "IT").
fn mentions_acronym(text: &str, acronym: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|word| word == acronym)
}

fn mentions(terms: &Terms, text: &str, key: &str) -> bool {
    if key.chars().count() <= 3 {
        mentions_acronym(text, &key.to_uppercase())
    } else {
        terms.contains(key)
    }
}

fn display_name(name: &str) -> String {
    if name.chars().count() <= 3 {
        return name.to_uppercase();
    }
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn headcount_clause(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let idx = HEADCOUNT_WORDS.iter().filter_map(|w| lower.find(w)).min()?;
    let clause = lower[..idx].rsplit([',', ';', '(', '.']).next()?.trim();
    let (lo, hi) = parse_headcount_range(clause)?;
    if headcount_buckets(lo, hi).is_empty() {
        return None;
    }
    Some(match hi {
        Some(h) if h == lo => lo.to_string(),
        Some(h) => format!("{lo}-{h}"),
        None => format!("{lo}+"),
    })
}

/// Scan the user's text for table terms. Produces the same loose shape the
/// model would, so it goes through the normal pipeline afterwards.
pub(crate) fn heuristic_filters(text: &str) -> Value {
    let terms = Terms::new(text);
    let lower = text.to_lowercase();
    let mut map = Map::new();

    let mut put = |key: &str, values: Vec<String>| {
        if !values.is_empty() {
            map.insert(key.to_string(), Value::from(values));
        }
    };

    put(
        "job_titles",
        TITLE_VARIANTS
            .iter()
            .filter(|(key, _)| mentions(&terms, text, key))
            .map(|(key, _)| key.to_string())
            .collect(),
    );

    let industries = Industry::ALL
        .iter()
        .map(|v| v.as_str())
        .chain(INDUSTRY_SYNONYMS.iter().map(|(key, _)| *key))
        .filter(|key| mentions(&terms, text, key))
        .map(str::to_string)
        .collect();
    put(Industry::FIELD, industries);

    let departments = Department::ALL
        .iter()
        .filter(|d| **d != Department::Other)
        .map(|d| d.as_str())
        .filter(|key| terms.contains(key))
        .map(str::to_string)
        .collect();
    put(Department::FIELD, departments);

    let levels = Level::ALL
        .iter()
        .map(|l| l.as_str())
        .filter(|key| terms.contains(key))
        .map(str::to_string)
        .collect();
    put(Level::FIELD, levels);

    let mut headcount: Vec<String> = EMPLOYEE_COUNT_SYNONYMS
        .iter()
        .map(|(key, _)| *key)
        .filter(|key| key.chars().all(|c| c.is_alphabetic() || c == ' ' || c == '-'))
        .filter(|key| mentions(&terms, text, key))
        .map(str::to_string)
        .collect();
    headcount.extend(headcount_clause(text));
    put(EmployeeCount::FIELD, headcount);

    let revenue = Revenue::ALL
        .iter()
        .map(|r| r.as_str())
        .chain(REVENUE_SYNONYMS.iter().map(|(key, _)| *key))
        .filter(|key| lower.contains(&key.to_lowercase()))
        .map(str::to_string)
        .collect();
    put(Revenue::FIELD, revenue);

    let locations = known_location_names()
        .filter(|name| mentions(&terms, text, name))
        .map(display_name)
        .collect();
    put("locations", locations);

    Value::Object(map)
}

// ─── Instructions ────────────────────────────────────────────────────────────

fn enum_line<E: FilterEnum>() -> String {
    let values: Vec<&str> = E::ALL.iter().map(|v| v.as_str()).collect();
    format!("- {}: {}", E::FIELD, values.join(" | "))
}

/// System instructions for filter generation.
pub(crate) fn instructions() -> String {
    let variants: Vec<String> = TITLE_VARIANTS
        .iter()
        .map(|(key, titles)| format!("- \"{key}\" → {}", titles.join(", ")))
        .collect();

    format!(
        "You translate a description of an ideal customer profile into lead search filters.\n\
         Return one flat JSON object. Use only these keys: job_titles, level, department, names, \
         industries, employee_count, revenue, funding_type, company_names, domains, locations, \
         location_filter_type, keyword_filter, technologies, lookalike_domain, news, job_listing.\n\
         Omit anything the description does not mention.\n\n\
         Enumerated fields take arrays of these exact strings:\n{}\n{}\n{}\n{}\n{}\n\n\
         job_titles, funding_type, domains and technologies are arrays of free strings.\n\
         locations is an array of country or region names in English.\n\
         location_filter_type is \"contact\" or \"company_hq\".\n\
         keyword_filter, lookalike_domain, news and job_listing are plain strings.\n\
         Only add CEO, Founder or President titles when the description asks for them.\n\n\
         Title equivalents:\n{}",
        enum_line::<Level>(),
        enum_line::<Department>(),
        enum_line::<Industry>(),
        enum_line::<EmployeeCount>(),
        enum_line::<Revenue>(),
        variants.join("\n"),
    )
}

// ─── Tests ───────────────────────────────────────────────────────────────────
